use std::fs;
use std::path::PathBuf;

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::dsa::Dsa;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::symm::Cipher;
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509, X509NameBuilder};
use tempfile::{TempDir, tempdir};
use x509ctl::record::CertificateRecord;
use x509ctl::{
    Algorithm, CertError, CertificateState, Descriptor, DescriptorParams, Ensure, Mismatch,
    Outcome, Provider, Secret, needs_action,
};

struct Scratch {
    dir: TempDir,
}

impl Scratch {
    fn new() -> Self {
        Self {
            dir: tempdir().expect("tempdir should be created"),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, contents).expect("write should succeed");
        path
    }

    fn params(&self) -> DescriptorParams {
        DescriptorParams::new(self.path("c.crt").to_string_lossy().into_owned())
    }
}

fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).expect("rsa keygen")).expect("pkey")
}

fn certificate(key: &PKey<Private>, cn: &str, dns: &[&str], ips: &[&str]) -> Vec<u8> {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("C", "US").unwrap();
    name.append_entry_by_text("O", "Example").unwrap();
    name.append_entry_by_text("CN", cn).unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();

    if !dns.is_empty() || !ips.is_empty() {
        let mut san = SubjectAlternativeName::new();
        for d in dns {
            san.dns(d);
        }
        for ip in ips {
            san.ip(ip);
        }
        let ext = san.build(&builder.x509v3_context(None, None)).unwrap();
        builder.append_extension(ext).unwrap();
    }

    builder.sign(key, MessageDigest::sha256()).unwrap();
    builder.build().to_pem().unwrap()
}

#[test]
fn missing_certificate_is_absent() {
    let scratch = Scratch::new();
    let d = Descriptor::new(scratch.params()).unwrap();
    assert_eq!(needs_action(&d).unwrap(), CertificateState::Absent);
}

#[test]
fn record_renders_subject_and_san_like_openssl() {
    let scratch = Scratch::new();
    let key = rsa_key();
    let path = scratch.write(
        "c.crt",
        certificate(&key, "example.com", &["example.com"], &["10.0.0.1", "::1"]),
    );

    let record = CertificateRecord::load(&path).unwrap();
    assert_eq!(record.subject(), "/C=US/O=Example/CN=example.com");
    assert_eq!(record.common_name().as_deref(), Some("example.com"));
    assert_eq!(
        record.subject_alt_name(),
        Some("DNS:example.com, IP Address:10.0.0.1, IP Address:0:0:0:0:0:0:0:1")
    );
}

#[test]
fn san_template_matches_certificate() {
    let scratch = Scratch::new();
    let key = rsa_key();
    scratch.write(
        "c.crt",
        certificate(&key, "example.com", &["example.com"], &["10.0.0.1"]),
    );
    scratch.write(
        "c.cnf",
        "[ req_ext ]\nsubjectAltName = \"DNS:example.com, IP: 10.0.0.1\"\n",
    );

    let d = Descriptor::new(scratch.params()).unwrap();
    assert_eq!(needs_action(&d).unwrap(), CertificateState::Conforming);
}

#[test]
fn san_precedence_ignores_common_name_mismatch() {
    let scratch = Scratch::new();
    let key = rsa_key();
    scratch.write(
        "c.crt",
        certificate(&key, "not-the-template-cn", &["example.com"], &[]),
    );
    scratch.write(
        "c.cnf",
        "[req_distinguished_name]\ncommonName = example.com\n\n[req_ext]\nsubjectAltName = DNS:example.com\n",
    );

    let d = Descriptor::new(scratch.params()).unwrap();
    assert_eq!(needs_action(&d).unwrap(), CertificateState::Conforming);
}

#[test]
fn common_name_mismatch_is_non_conforming() {
    let scratch = Scratch::new();
    let key = rsa_key();
    scratch.write("c.crt", certificate(&key, "old.example.com", &[], &[]));
    scratch.write(
        "c.cnf",
        "[req_distinguished_name]\ncommonName = new.example.com\n",
    );

    let d = Descriptor::new(scratch.params()).unwrap();
    assert_eq!(
        needs_action(&d).unwrap(),
        CertificateState::NonConforming(Mismatch::CommonName {
            expected: "new.example.com".into(),
            actual: Some("old.example.com".into()),
        })
    );
}

#[test]
fn template_without_constraints_conforms() {
    let scratch = Scratch::new();
    let key = rsa_key();
    scratch.write("c.crt", certificate(&key, "anything", &[], &[]));
    scratch.write("c.cnf", "[req]\nprompt = no\n");

    let d = Descriptor::new(scratch.params()).unwrap();
    assert_eq!(needs_action(&d).unwrap(), CertificateState::Conforming);
}

#[test]
fn missing_template_is_reported() {
    let scratch = Scratch::new();
    let key = rsa_key();
    scratch.write("c.crt", certificate(&key, "anything", &[], &[]));

    let d = Descriptor::new(scratch.params()).unwrap();
    assert!(matches!(needs_action(&d), Err(CertError::NotFound(_))));
}

#[test]
fn forced_key_mismatch_wins_over_subject_equivalence() {
    let scratch = Scratch::new();
    let cert_key = rsa_key();
    let other_key = rsa_key();
    scratch.write("c.crt", certificate(&cert_key, "example.com", &[], &[]));
    scratch.write("c.key", other_key.private_key_to_pem_pkcs8().unwrap());
    scratch.write("c.cnf", "[req_distinguished_name]\ncommonName = example.com\n");

    let mut params = scratch.params();
    params.force = true;
    let d = Descriptor::new(params).unwrap();
    assert_eq!(
        needs_action(&d).unwrap(),
        CertificateState::NonConforming(Mismatch::PrivateKey)
    );

    // Without force the key is not consulted at all.
    let d = Descriptor::new(scratch.params()).unwrap();
    assert_eq!(needs_action(&d).unwrap(), CertificateState::Conforming);
}

#[test]
fn forced_matching_encrypted_key_conforms() {
    let scratch = Scratch::new();
    let rsa = Rsa::generate(2048).unwrap();
    let pem = rsa
        .private_key_to_pem_passphrase(Cipher::aes_256_cbc(), b"changeit")
        .unwrap();
    let key = PKey::from_rsa(rsa).unwrap();
    scratch.write("c.crt", certificate(&key, "example.com", &[], &[]));
    scratch.write("c.key", pem);
    scratch.write("c.cnf", "[req_distinguished_name]\ncommonName = example.com\n");

    let mut params = scratch.params();
    params.force = true;
    params.password = Some(Secret::new("changeit"));
    let d = Descriptor::new(params.clone()).unwrap();
    assert_eq!(needs_action(&d).unwrap(), CertificateState::Conforming);

    params.password = Some(Secret::new("wrong"));
    let d = Descriptor::new(params).unwrap();
    assert!(matches!(needs_action(&d), Err(CertError::KeyLoad { .. })));
}

#[test]
fn forced_dsa_key_is_matched() {
    let scratch = Scratch::new();
    let key = PKey::from_dsa(Dsa::generate(2048).unwrap()).unwrap();
    let pem = key.private_key_to_pem_pkcs8().unwrap();
    scratch.write("c.crt", certificate(&key, "dsa.example.com", &[], &[]));
    scratch.write("c.key", pem);
    scratch.write("c.cnf", "[req]\nprompt = no\n");

    let mut params = scratch.params();
    params.force = true;
    params.authentication = Some("dsa".into());
    let d = Descriptor::new(params).unwrap();
    assert_eq!(d.algorithm(), Algorithm::Dsa);
    assert_eq!(needs_action(&d).unwrap(), CertificateState::Conforming);
}

#[test]
fn ensure_absent_removes_certificate() {
    let scratch = Scratch::new();
    let key = rsa_key();
    scratch.write("c.crt", certificate(&key, "example.com", &[], &[]));

    let d = Descriptor::new(scratch.params()).unwrap();
    let provider = Provider::openssl();
    assert_eq!(
        provider.reconcile(&d, Ensure::Absent).unwrap(),
        Outcome::Removed
    );
    assert!(matches!(provider.destroy(&d), Err(CertError::NotFound(_))));
}

fn openssl_available() -> bool {
    which::which("openssl").is_ok()
}

fn write_template(scratch: &Scratch, cn: &str) -> PathBuf {
    scratch.write(
        "c.cnf",
        format!(
            "[ req ]\nprompt = no\ndistinguished_name = req_distinguished_name\n\n\
             [ req_distinguished_name ]\nO = Example\ncommonName = {cn}\n\n\
             [ serverAuth ]\nextendedKeyUsage = serverAuth\n"
        ),
    )
}

#[test]
fn create_then_evaluate_is_idempotent() {
    if !openssl_available() {
        eprintln!("openssl not on PATH, skipping");
        return;
    }
    let scratch = Scratch::new();
    scratch.write("c.key", rsa_key().private_key_to_pem_pkcs8().unwrap());
    write_template(&scratch, "idempotent.example.com");

    let mut params = scratch.params();
    params.ca = true;
    params.server_only = true;
    params.force = true;
    params.days = Some("30".into());
    let d = Descriptor::new(params).unwrap();

    let provider = Provider::openssl();
    assert_eq!(provider.reconcile(&d, Ensure::Present).unwrap(), Outcome::Created);
    assert_eq!(needs_action(&d).unwrap(), CertificateState::Conforming);
    assert_eq!(
        provider.reconcile(&d, Ensure::Present).unwrap(),
        Outcome::Unchanged
    );

    write_template(&scratch, "renamed.example.com");
    assert!(matches!(
        provider.reconcile(&d, Ensure::Present).unwrap(),
        Outcome::Regenerated(Mismatch::CommonName { .. })
    ));
    assert_eq!(needs_action(&d).unwrap(), CertificateState::Conforming);
}

#[test]
fn created_san_certificate_conforms_to_its_template() {
    if !openssl_available() {
        eprintln!("openssl not on PATH, skipping");
        return;
    }
    let scratch = Scratch::new();
    scratch.write("c.key", rsa_key().private_key_to_pem_pkcs8().unwrap());
    scratch.write(
        "c.cnf",
        "[ req ]\nprompt = no\ndistinguished_name = req_distinguished_name\n\n\
         [ req_distinguished_name ]\nO = Example\ncommonName = unrelated.example.org\n\n\
         [ req_ext ]\nsubjectAltName = \"DNS:example.com, IP: 10.0.0.1\"\n",
    );

    let mut params = scratch.params();
    params.ca = true;
    params.req_ext = true;
    params.days = Some("30".into());
    let d = Descriptor::new(params).unwrap();

    let provider = Provider::openssl();
    assert_eq!(provider.reconcile(&d, Ensure::Present).unwrap(), Outcome::Created);
    let record = CertificateRecord::load(d.path()).unwrap();
    assert_eq!(
        record.subject_alt_name(),
        Some("DNS:example.com, IP Address:10.0.0.1")
    );
    assert_eq!(needs_action(&d).unwrap(), CertificateState::Conforming);
    assert_eq!(
        provider.reconcile(&d, Ensure::Present).unwrap(),
        Outcome::Unchanged
    );
}

#[test]
fn failing_tool_surfaces_process_error() {
    if !openssl_available() {
        eprintln!("openssl not on PATH, skipping");
        return;
    }
    let scratch = Scratch::new();
    write_template(&scratch, "example.com");
    // No key file: openssl req cannot load it.

    let mut params = scratch.params();
    params.ca = true;
    let d = Descriptor::new(params).unwrap();

    let err = Provider::openssl().create(&d).unwrap_err();
    match err {
        CertError::ProcessFailed { code, .. } => assert_ne!(code, Some(0)),
        other => panic!("expected ProcessFailed, got {other:?}"),
    }
}
