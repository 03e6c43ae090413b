// oslona-core/src/detectors/dictionary.rs
//! Dictionary matcher: lemma-aware lookup against curated name,
//! locality, and institution lists, wrapping the low-level
//! `oslona-lexicon` engine.
//!
//! Confidence is fixed per dictionary tier and sits below validated
//! patterns and high-confidence entity results in the unification order.

use std::sync::Arc;

use anyhow::Result;

use oslona_lexicon::{EntryKind, LexiconMatch, LexiconMatcher, Tier};

use crate::normalizer::NormalizedText;
use crate::span::{CandidateSpan, Category, DetectorKind};

/// Fixed confidence of the curated high-frequency tier.
pub const CURATED_CONFIDENCE: f64 = 0.65;
/// Fixed confidence of the supplementary extension tier.
pub const EXTENSION_CONFIDENCE: f64 = 0.5;
/// Confidence of a fused first-name + surname pair.
pub const FULL_NAME_CONFIDENCE: f64 = 0.7;

#[derive(Debug)]
pub struct DictionaryDetector {
    matcher: Arc<LexiconMatcher>,
}

impl DictionaryDetector {
    pub fn new(matcher: Arc<LexiconMatcher>) -> Self {
        Self { matcher }
    }

    fn tier_confidence(tier: Tier) -> f64 {
        match tier {
            Tier::Curated => CURATED_CONFIDENCE,
            Tier::Extension => EXTENSION_CONFIDENCE,
        }
    }

    fn candidate_for(&self, hit: &LexiconMatch) -> Option<CandidateSpan> {
        let entry = self.matcher.lexicon().entry(hit.entry);
        let (category, rule_id) = match entry.kind {
            EntryKind::FirstName => (Category::Person, "dict_first_name"),
            EntryKind::Surname => (Category::Person, "dict_surname"),
            EntryKind::Locality => (Category::Location, "dict_locality"),
            EntryKind::Institution => (Category::Org, "dict_institution"),
            // Occupations are uniqueness amplifiers, not PII on their
            // own; the residual heuristics engine consumes them.
            EntryKind::Occupation => return None,
        };
        Some(CandidateSpan {
            start: hit.start,
            end: hit.end,
            category,
            confidence: Self::tier_confidence(entry.tier),
            detector: DetectorKind::Dictionary,
            rule_id: rule_id.to_string(),
        })
    }

    /// Fuses an adjacent first-name hit and surname hit into a single
    /// higher-confidence PERSON candidate ("Jan" + "Kowalski").
    fn fuse_full_names(&self, text: &str, hits: &[LexiconMatch], out: &mut Vec<CandidateSpan>) {
        let lexicon = self.matcher.lexicon();
        for first in hits {
            if lexicon.entry(first.entry).kind != EntryKind::FirstName {
                continue;
            }
            for second in hits {
                if lexicon.entry(second.entry).kind != EntryKind::Surname {
                    continue;
                }
                if second.start == first.end + 1 && text[first.end..second.start] == *" " {
                    out.push(CandidateSpan {
                        start: first.start,
                        end: second.end,
                        category: Category::Person,
                        confidence: FULL_NAME_CONFIDENCE,
                        detector: DetectorKind::Dictionary,
                        rule_id: "dict_full_name".to_string(),
                    });
                }
            }
        }
    }
}

impl super::Detector for DictionaryDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Dictionary
    }

    fn detect(&self, normalized: &NormalizedText) -> Result<Vec<CandidateSpan>> {
        let text = normalized.text();
        let hits = self.matcher.find(text);

        let mut out: Vec<CandidateSpan> = hits
            .iter()
            .filter_map(|hit| self.candidate_for(hit))
            .collect();
        self.fuse_full_names(text, &hits, &mut out);

        out.sort_by(|a, b| {
            (a.start, a.end, a.rule_id.as_str()).cmp(&(b.start, b.end, b.rule_id.as_str()))
        });
        out.dedup_by(|a, b| a.start == b.start && a.end == b.end && a.rule_id == b.rule_id);
        Ok(out)
    }
}
