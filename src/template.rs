//! Read-only view of an OpenSSL `.cnf` template
//!
//! The reconciler only ever asks for a named section, so the lookup is
//! modelled as the narrow [`SectionLookup`] trait. [`CnfFile`] is the on-disk
//! implementation used by the evaluator.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CertError, CertResult};

/// Key/value pairs of one template section.
pub type Section = BTreeMap<String, String>;

/// Section holding keys that appear before the first header.
pub const DEFAULT_SECTION: &str = "default";

/// Name → section lookup over a parsed template.
pub trait SectionLookup {
    fn section(&self, name: &str) -> Option<&Section>;
}

impl SectionLookup for BTreeMap<String, Section> {
    fn section(&self, name: &str) -> Option<&Section> {
        self.get(name)
    }
}

static SECTION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\[\s*([^\]]*?)\s*\]\s*(?:#.*)?$").expect("section header pattern is valid")
});

static KEY_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([^\s=]+)\s*=(.*)$").expect("key/value pattern is valid")
});

static COMMENT_OR_BLANK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([#;].*)?$").expect("comment pattern is valid"));

/// Parsed `.cnf` file.
#[derive(Debug, Clone, Default)]
pub struct CnfFile {
    path: PathBuf,
    sections: BTreeMap<String, Section>,
}

impl CnfFile {
    /// Read and parse the template at `path`.
    pub fn load(path: &Path) -> CertResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| CertError::from_io(path, e))?;
        Self::parse(path, &text)
    }

    /// Parse template text; `path` is only used for error reporting.
    ///
    /// A repeated section header continues the earlier section, and a
    /// repeated key keeps its last value.
    pub fn parse(path: &Path, text: &str) -> CertResult<Self> {
        let mut sections: BTreeMap<String, Section> = BTreeMap::new();
        let mut current = DEFAULT_SECTION.to_string();

        for (idx, line) in text.lines().enumerate() {
            if COMMENT_OR_BLANK.is_match(line) {
                continue;
            }
            if let Some(caps) = SECTION_HEADER.captures(line) {
                current = caps[1].to_string();
                sections.entry(current.clone()).or_default();
                continue;
            }
            if let Some(caps) = KEY_VALUE.captures(line) {
                sections
                    .entry(current.clone())
                    .or_default()
                    .insert(caps[1].to_string(), strip_inline_comment(&caps[2]).to_string());
                continue;
            }
            return Err(CertError::TemplateParse {
                path: path.to_path_buf(),
                line: idx + 1,
                message: format!("unrecognised line '{}'", line.trim()),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            sections,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Cut a value at the first `#` outside quotes that is not escaped with `\`,
/// then trim it.
fn strip_inline_comment(value: &str) -> &str {
    let mut quote = None;
    let mut escaped = false;
    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (c, quote) {
            ('\\', _) => escaped = true,
            ('"' | '\'', None) => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            ('#', None) => return value[..i].trim(),
            _ => {}
        }
    }
    value.trim()
}

impl SectionLookup for CnfFile {
    fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }
}
