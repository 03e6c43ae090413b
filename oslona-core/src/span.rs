// oslona-core/src/span.rs
//! Provides core data structures for candidate and unified spans,
//! provenance records, and PII-safe debug logging within the
//! `oslona-core` library.

use serde::{Deserialize, Serialize};
use log::debug;
use std::fmt;

use lazy_static::lazy_static;

lazy_static! {
    /// A static boolean that is initialized once to determine if PII is allowed in debug logs.
    static ref PII_DEBUG_ALLOWED: bool = {
        std::env::var("OSLONA_ALLOW_DEBUG_PII")
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    };
}

/// Redaction category of a detected span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Person,
    Pesel,
    Nip,
    Regon,
    Iban,
    Card,
    IdCard,
    Phone,
    Email,
    PostalCode,
    Address,
    Uuid,
    TransactionId,
    Location,
    Org,
    QuasiId,
}

impl Category {
    /// The fixed replacement token for this category. Deliberately
    /// non-unique per instance: no index or hash that could re-link
    /// entities across records.
    pub fn token(&self) -> &'static str {
        match self {
            Category::Person => "[OSOBA]",
            Category::Pesel => "[PESEL]",
            Category::Nip => "[NIP]",
            Category::Regon => "[REGON]",
            Category::Iban => "[IBAN]",
            Category::Card => "[KARTA]",
            Category::IdCard => "[DOWOD]",
            Category::Phone => "[TELEFON]",
            Category::Email => "[EMAIL]",
            Category::PostalCode => "[KOD_POCZTOWY]",
            Category::Address => "[ADRES]",
            Category::Uuid => "[UUID]",
            Category::TransactionId => "[ID_TRANSAKCJI]",
            Category::Location => "[MIEJSCOWOSC]",
            Category::Org => "[INSTYTUCJA]",
            Category::QuasiId => "[CECHA_UNIKALNA]",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Person => "PERSON",
            Category::Pesel => "PESEL",
            Category::Nip => "NIP",
            Category::Regon => "REGON",
            Category::Iban => "IBAN",
            Category::Card => "CARD",
            Category::IdCard => "ID_CARD",
            Category::Phone => "PHONE",
            Category::Email => "EMAIL",
            Category::PostalCode => "POSTAL_CODE",
            Category::Address => "ADDRESS",
            Category::Uuid => "UUID",
            Category::TransactionId => "TRANSACTION_ID",
            Category::Location => "LOCATION",
            Category::Org => "ORG",
            Category::QuasiId => "QUASI_ID",
        };
        f.write_str(name)
    }
}

/// Which component proposed a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Pattern,
    Entity,
    Dictionary,
    Heuristics,
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetectorKind::Pattern => "pattern",
            DetectorKind::Entity => "entity",
            DetectorKind::Dictionary => "dictionary",
            DetectorKind::Heuristics => "heuristics",
        };
        f.write_str(name)
    }
}

/// A span proposed by a single detector, in normalized-text byte
/// coordinates. Candidates from different detectors may overlap freely.
///
/// Candidates deliberately carry no captured substring: the text is
/// sliced from the owning `NormalizedText` only where a decision needs
/// it, and discarded immediately after.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSpan {
    pub start: usize,
    pub end: usize,
    pub category: Category,
    /// Calibrated confidence in [0, 1].
    pub confidence: f64,
    pub detector: DetectorKind,
    /// Identifier of the rule, model, or dictionary tier that fired.
    pub rule_id: String,
}

impl CandidateSpan {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn overlaps(&self, other_start: usize, other_end: usize) -> bool {
        ranges_overlap(self.start, self.end, other_start, other_end)
    }
}

/// A span accepted by the unifier. The accepted set is pairwise
/// disjoint in `[start, end)` ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedSpan {
    pub start: usize,
    pub end: usize,
    pub category: Category,
    pub confidence: f64,
    pub detector: DetectorKind,
    pub rule_id: String,
}

impl UnifiedSpan {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn overlaps(&self, other_start: usize, other_end: usize) -> bool {
        ranges_overlap(self.start, self.end, other_start, other_end)
    }
}

impl From<CandidateSpan> for UnifiedSpan {
    fn from(c: CandidateSpan) -> Self {
        Self {
            start: c.start,
            end: c.end,
            category: c.category,
            confidence: c.confidence,
            detector: c.detector,
            rule_id: c.rule_id,
        }
    }
}

/// Half-open interval overlap.
pub fn ranges_overlap(a_start: usize, a_end: usize, b_start: usize, b_end: usize) -> bool {
    !(a_end <= b_start || a_start >= b_end)
}

/// A single, auditable record of one redaction decision.
///
/// Invariant: never contains the captured substring. Category-level
/// information only, plus the versions needed to reconstruct why the
/// decision was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub category: Category,
    pub detector: DetectorKind,
    pub rule_id: String,
    /// Version of the winning component: rule-set version for pattern and
    /// dictionary decisions, model hash for entity decisions.
    pub component_version: String,
    pub span_length: usize,
    /// RFC 3339 decision timestamp.
    pub timestamp: String,
}

/// One input unit. Immutable once ingested; lives only for the duration
/// of a single pipeline pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub record_id: String,
    pub raw_text: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub source_system: Option<String>,
}

impl Record {
    pub fn new(record_id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            raw_text: raw_text.into(),
            locale: None,
            source_system: None,
        }
    }
}

/// The pipeline's output for one record: redacted text plus the full
/// provenance list, ordered by span start offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactedRecord {
    pub record_id: String,
    pub redacted_text: String,
    pub provenance: Vec<ProvenanceEntry>,
}

pub fn redact_sensitive(s: &str) -> String {
    const MAX_LEN: usize = 8;
    if s.len() <= MAX_LEN {
        "[REDACTED]".to_string()
    } else {
        format!("[REDACTED: {} chars]", s.len())
    }
}

fn get_loggable_content(sensitive_content: &str) -> String {
    if *PII_DEBUG_ALLOWED {
        sensitive_content.to_string()
    } else {
        redact_sensitive(sensitive_content)
    }
}

/// Debug-logs a candidate decision without leaking the matched value.
pub fn log_candidate_debug(module_path: &str, rule_id: &str, snippet: &str) {
    debug!(
        "{} candidate for rule '{}': '{}'",
        module_path,
        rule_id,
        get_loggable_content(snippet)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_sensitive_short_string() {
        assert_eq!(redact_sensitive("abc"), "[REDACTED]".to_string());
    }

    #[test]
    fn test_redact_sensitive_long_string() {
        assert_eq!(redact_sensitive("123456789"), "[REDACTED: 9 chars]".to_string());
    }

    #[test]
    fn test_ranges_overlap() {
        assert!(ranges_overlap(0, 5, 4, 8));
        assert!(!ranges_overlap(0, 5, 5, 8));
        assert!(ranges_overlap(2, 3, 0, 10));
    }

    #[test]
    fn test_category_tokens_are_fixed_literals() {
        assert_eq!(Category::Pesel.token(), "[PESEL]");
        assert_eq!(Category::Person.token(), "[OSOBA]");
        // No per-instance component in any token.
        assert!(!Category::Email.token().contains('{'));
    }

    #[test]
    fn test_provenance_serializes_category_names() {
        let entry = ProvenanceEntry {
            category: Category::IdCard,
            detector: DetectorKind::Pattern,
            rule_id: "id_card".into(),
            component_version: "1.0.0".into(),
            span_length: 9,
            timestamp: "1970-01-01T00:00:00Z".into(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"ID_CARD\""));
        assert!(json.contains("\"pattern\""));
    }
}
