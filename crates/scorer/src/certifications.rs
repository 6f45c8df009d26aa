//! Certification requirement detection.
//!
//! Tenders rarely carry structured certification fields, so requirements are
//! detected by scanning the description for a fixed table of well-known
//! certification names.

use domain::text::contains_word;
use once_cell::sync::Lazy;

/// Canonical certification name plus the lowercase patterns that signal it.
struct CertPattern {
    name: &'static str,
    patterns: &'static [&'static str],
}

static CERT_TABLE: Lazy<Vec<CertPattern>> = Lazy::new(|| {
    vec![
        CertPattern {
            name: "ISO 9001",
            patterns: &["iso 9001", "iso9001"],
        },
        CertPattern {
            name: "ISO 14001",
            patterns: &["iso 14001", "iso14001"],
        },
        CertPattern {
            name: "ISO 27001",
            patterns: &["iso 27001", "iso27001", "iso/iec 27001"],
        },
        CertPattern {
            name: "OHSAS 18001",
            patterns: &["ohsas 18001", "ohsas18001"],
        },
        CertPattern {
            name: "HACCP",
            patterns: &["haccp"],
        },
        CertPattern {
            name: "CIDB",
            patterns: &["cidb"],
        },
    ]
});

/// Certifications the tender text appears to require, in table order.
/// `text` must already be lowercased.
pub fn detect_required_certs(text: &str) -> Vec<&'static str> {
    CERT_TABLE
        .iter()
        .filter(|cert| cert.patterns.iter().any(|p| contains_word(text, p)))
        .map(|cert| cert.name)
        .collect()
}
