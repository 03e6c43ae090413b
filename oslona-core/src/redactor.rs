// oslona-core/src/redactor.rs
//! Category-token redaction and provenance emission.
//!
//! Each final span is replaced by a single stable token per category (a
//! fixed literal, never an incrementing index, so token order cannot be
//! used to re-link entities across records). One provenance entry is
//! emitted per replaced span; the captured substring is discarded at
//! this boundary and appears in no returned structure and no log line.

use chrono::Utc;

use crate::errors::OslonaError;
use crate::normalizer::NormalizedText;
use crate::pipeline::ActiveVersions;
use crate::span::{DetectorKind, ProvenanceEntry, UnifiedSpan};

/// Applies the final span set to the normalized text.
///
/// Spans must be disjoint; this re-checks the invariant at the output
/// boundary and fails the record if it does not hold.
pub fn redact(
    normalized: &NormalizedText,
    spans: &[UnifiedSpan],
    versions: &ActiveVersions,
) -> Result<(String, Vec<ProvenanceEntry>), OslonaError> {
    let text = normalized.text();
    let mut sorted: Vec<&UnifiedSpan> = spans.iter().collect();
    sorted.sort_by_key(|s| s.start);

    for pair in sorted.windows(2) {
        if pair[0].end > pair[1].start {
            return Err(OslonaError::UnificationConflict(
                pair[0].start,
                pair[0].end,
                pair[1].start,
                pair[1].end,
            ));
        }
    }

    let mut redacted = String::with_capacity(text.len());
    let mut provenance = Vec::with_capacity(sorted.len());
    let mut last_end = 0usize;

    for span in sorted {
        redacted.push_str(&text[last_end..span.start]);
        redacted.push_str(span.category.token());
        last_end = span.end;

        provenance.push(ProvenanceEntry {
            category: span.category,
            detector: span.detector,
            rule_id: span.rule_id.clone(),
            component_version: component_version(span.detector, versions),
            span_length: span.len(),
            timestamp: Utc::now().to_rfc3339(),
        });
    }
    redacted.push_str(&text[last_end..]);

    Ok((redacted, provenance))
}

/// The version recorded against a decision: rule-set version for pattern
/// decisions, lexicon version for dictionary and heuristic decisions,
/// model hash for entity decisions.
fn component_version(detector: DetectorKind, versions: &ActiveVersions) -> String {
    match detector {
        DetectorKind::Pattern => versions.rule_set.clone(),
        DetectorKind::Entity => versions.entity_model.clone(),
        DetectorKind::Dictionary | DetectorKind::Heuristics => versions.lexicon.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;
    use crate::span::Category;

    fn versions() -> ActiveVersions {
        ActiveVersions {
            rule_set: "rules-1".into(),
            lexicon: "lex-1".into(),
            entity_model: "model-1".into(),
        }
    }

    fn span(start: usize, end: usize, category: Category, detector: DetectorKind) -> UnifiedSpan {
        UnifiedSpan {
            start,
            end,
            category,
            confidence: 0.9,
            detector,
            rule_id: "r".into(),
        }
    }

    #[test]
    fn spans_are_replaced_by_fixed_tokens() {
        let normalized = normalize("PESEL 44051401359 klienta");
        let spans = vec![span(6, 17, Category::Pesel, DetectorKind::Pattern)];
        let (redacted, provenance) = redact(&normalized, &spans, &versions()).unwrap();
        assert_eq!(redacted, "PESEL [PESEL] klienta");
        assert_eq!(provenance.len(), 1);
        assert_eq!(provenance[0].span_length, 11);
        assert_eq!(provenance[0].component_version, "rules-1");
    }

    #[test]
    fn provenance_never_contains_the_substring() {
        let normalized = normalize("PESEL 44051401359 klienta");
        let spans = vec![span(6, 17, Category::Pesel, DetectorKind::Pattern)];
        let (_, provenance) = redact(&normalized, &spans, &versions()).unwrap();
        let json = serde_json::to_string(&provenance).unwrap();
        assert!(!json.contains("44051401359"));
    }

    #[test]
    fn overlapping_spans_fail_the_record() {
        let normalized = normalize("abcdefghij");
        let spans = vec![
            span(0, 5, Category::Person, DetectorKind::Entity),
            span(3, 8, Category::Person, DetectorKind::Entity),
        ];
        let err = redact(&normalized, &spans, &versions()).unwrap_err();
        assert!(matches!(err, OslonaError::UnificationConflict(..)));
    }

    #[test]
    fn component_version_follows_the_winning_detector() {
        let normalized = normalize("Jan Kowalski w Warszawie");
        let spans = vec![
            span(0, 12, Category::Person, DetectorKind::Entity),
            span(15, 24, Category::Location, DetectorKind::Dictionary),
        ];
        let (_, provenance) = redact(&normalized, &spans, &versions()).unwrap();
        assert_eq!(provenance[0].component_version, "model-1");
        assert_eq!(provenance[1].component_version, "lex-1");
    }
}
