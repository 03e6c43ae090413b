// oslona-core/src/heuristics.rs
//! Residual uniqueness heuristics.
//!
//! Re-scans the unified output plus surrounding context for uniqueness
//! amplifiers no single detector fires on alone: a rare-occupation token
//! co-occurring with a small-locality reference inside a bounded token
//! window. This is a deliberately narrow, rule-based escalation so every
//! decision stays auditable; it only ever adds spans, never removes one.

use std::sync::Arc;

use log::debug;

use oslona_lexicon::{EntryKind, LexiconMatcher};

use crate::normalizer::NormalizedText;
use crate::span::{Category, DetectorKind, UnifiedSpan};

pub const RULE_ID: &str = "rare_occupation_small_locality";

/// Confidence assigned to escalated quasi-identifier spans. They never
/// compete in unification (they are added after it), so this value is
/// recorded for provenance only.
const QUASI_CONFIDENCE: f64 = 0.9;

#[derive(Debug)]
pub struct ResidualHeuristics {
    matcher: Arc<LexiconMatcher>,
    window_tokens: usize,
}

#[derive(Debug, Clone, Copy)]
struct QuasiHit {
    start: usize,
    end: usize,
    token_index: usize,
    kind: EntryKind,
}

impl ResidualHeuristics {
    pub fn new(matcher: Arc<LexiconMatcher>, window_tokens: usize) -> Self {
        Self { matcher, window_tokens }
    }

    /// Augments the unified span set in place. New spans are added for
    /// each uncovered member of a rare-occupation/small-locality pair.
    pub fn augment(&self, normalized: &NormalizedText, unified: &mut Vec<UnifiedSpan>) {
        let hits = self.quasi_hits(normalized);
        let occupations: Vec<&QuasiHit> =
            hits.iter().filter(|h| h.kind == EntryKind::Occupation).collect();
        let localities: Vec<&QuasiHit> =
            hits.iter().filter(|h| h.kind == EntryKind::Locality).collect();
        if occupations.is_empty() || localities.is_empty() {
            return;
        }

        let mut added = 0usize;
        for occupation in &occupations {
            for locality in &localities {
                let distance = occupation.token_index.abs_diff(locality.token_index);
                if distance > self.window_tokens {
                    continue;
                }
                for member in [occupation, locality] {
                    if unified.iter().any(|s| s.overlaps(member.start, member.end)) {
                        continue;
                    }
                    unified.push(UnifiedSpan {
                        start: member.start,
                        end: member.end,
                        category: Category::QuasiId,
                        confidence: QUASI_CONFIDENCE,
                        detector: DetectorKind::Heuristics,
                        rule_id: RULE_ID.to_string(),
                    });
                    added += 1;
                }
            }
        }
        if added > 0 {
            debug!("Residual heuristics escalated {} quasi-identifier span(s).", added);
            unified.sort_by_key(|s| s.start);
        }
    }

    /// Quasi-marked lexicon hits (rare occupations, small localities)
    /// annotated with their word-token index.
    fn quasi_hits(&self, normalized: &NormalizedText) -> Vec<QuasiHit> {
        let text = normalized.text();
        let lexicon = self.matcher.lexicon();
        self.matcher
            .find(text)
            .into_iter()
            .filter_map(|hit| {
                let entry = lexicon.entry(hit.entry);
                if !entry.quasi {
                    return None;
                }
                match entry.kind {
                    EntryKind::Occupation | EntryKind::Locality => Some(QuasiHit {
                        start: hit.start,
                        end: hit.end,
                        token_index: token_index_at(text, hit.start),
                        kind: entry.kind,
                    }),
                    _ => None,
                }
            })
            .collect()
    }
}

/// Number of word tokens strictly before the given byte offset.
fn token_index_at(text: &str, offset: usize) -> usize {
    let mut count = 0usize;
    let mut in_word = false;
    for (idx, ch) in text.char_indices() {
        if idx >= offset {
            break;
        }
        if ch.is_alphanumeric() {
            if !in_word {
                count += 1;
                in_word = true;
            }
        } else {
            in_word = false;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;
    use oslona_lexicon::Lexicon;

    fn engine(window: usize) -> ResidualHeuristics {
        let lexicon = Arc::new(Lexicon::embedded());
        ResidualHeuristics::new(Arc::new(LexiconMatcher::new(lexicon)), window)
    }

    #[test]
    fn rare_occupation_near_small_locality_escalates() {
        let normalized = normalize("jedyny ludwisarz w gminie Wiżajny złożył skargę");
        let mut unified = Vec::new();
        engine(8).augment(&normalized, &mut unified);
        assert_eq!(unified.len(), 2);
        assert!(unified.iter().all(|s| s.category == Category::QuasiId));
    }

    #[test]
    fn distance_beyond_window_does_not_escalate() {
        let filler = "bardzo ".repeat(12);
        let text = format!("ludwisarz {} Wiżajny", filler);
        let normalized = normalize(&text);
        let mut unified = Vec::new();
        engine(8).augment(&normalized, &mut unified);
        assert!(unified.is_empty());
    }

    #[test]
    fn occupation_alone_is_not_escalated() {
        let normalized = normalize("pracuje jako ludwisarz w Warszawie");
        let mut unified = Vec::new();
        engine(8).augment(&normalized, &mut unified);
        assert!(unified.is_empty());
    }

    #[test]
    fn covered_members_are_not_duplicated_and_nothing_is_removed() {
        let normalized = normalize("ludwisarz z Wiżajny");
        let text = normalized.text();
        let loc_start = text.find("Wiżajny").unwrap();
        let existing = UnifiedSpan {
            start: loc_start,
            end: loc_start + "Wiżajny".len(),
            category: Category::Location,
            confidence: 0.65,
            detector: DetectorKind::Dictionary,
            rule_id: "dict_locality".into(),
        };
        let mut unified = vec![existing.clone()];
        engine(8).augment(&normalized, &mut unified);
        // The locality is already covered; only the occupation is added.
        assert!(unified.contains(&existing));
        assert_eq!(unified.len(), 2);
        let added = unified.iter().find(|s| s.category == Category::QuasiId).unwrap();
        assert_eq!(&text[added.start..added.end], "ludwisarz");
    }
}
