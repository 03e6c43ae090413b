// oslona-core/src/unifier.rs
//! Deterministic unification of competing candidate spans.
//!
//! Candidates from all detectors are merged into a single non-overlapping
//! span set using a fixed priority order: validated pattern matches, then
//! high-confidence entity results, then dictionary matches, then
//! low-confidence entity results. Within a tier, higher confidence wins,
//! then longer spans (to avoid sub-token fragments), then the earlier
//! start offset. The result is reproducible regardless of detector
//! invocation order: an explicit ranked merge, never score blending.

use log::{debug, warn};

use crate::config::PipelineSettings;
use crate::errors::OslonaError;
use crate::normalizer::NormalizedText;
use crate::span::{CandidateSpan, Category, DetectorKind, UnifiedSpan};

/// Priority tier of a candidate; lower ranks first.
fn tier(candidate: &CandidateSpan, entity_threshold: f64) -> u8 {
    match candidate.detector {
        DetectorKind::Pattern => 0,
        DetectorKind::Entity => {
            if candidate.confidence >= entity_threshold {
                1
            } else {
                3
            }
        }
        DetectorKind::Dictionary => 2,
        DetectorKind::Heuristics => 4,
    }
}

/// Merges all candidate spans into a non-overlapping unified set.
pub fn unify(
    candidates: Vec<CandidateSpan>,
    normalized: &NormalizedText,
    settings: &PipelineSettings,
) -> Result<Vec<UnifiedSpan>, OslonaError> {
    let text = normalized.text();
    let mut candidates = sanitize_candidates(candidates, text);

    apply_whitelist(&mut candidates, text, settings);

    // Per-category confidence floors.
    candidates.retain(|c| {
        settings
            .category_thresholds
            .get(&c.category)
            .map_or(true, |threshold| c.confidence >= *threshold)
    });

    // The fixed priority key. The trailing fields exist purely to make
    // the ordering total, so re-runs are byte-identical.
    candidates.sort_by(|a, b| {
        tier(a, settings.entity_threshold)
            .cmp(&tier(b, settings.entity_threshold))
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| b.len().cmp(&a.len()))
            .then_with(|| a.start.cmp(&b.start))
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });

    let mut accepted: Vec<UnifiedSpan> = Vec::new();
    for candidate in candidates {
        if accepted
            .iter()
            .any(|kept| kept.overlaps(candidate.start, candidate.end))
        {
            continue;
        }
        accepted.push(candidate.into());
    }

    accepted.sort_by_key(|s| s.start);
    verify_disjoint(&accepted)?;
    debug!("Unified {} spans.", accepted.len());
    Ok(accepted)
}

/// Drops degenerate candidates: empty ranges, ranges outside the text,
/// and ranges not aligned to character boundaries.
fn sanitize_candidates(candidates: Vec<CandidateSpan>, text: &str) -> Vec<CandidateSpan> {
    candidates
        .into_iter()
        .filter(|c| {
            let ok = c.start < c.end
                && c.end <= text.len()
                && text.is_char_boundary(c.start)
                && text.is_char_boundary(c.end);
            if !ok {
                warn!(
                    "Dropping malformed candidate [{}, {}) from {} rule '{}'.",
                    c.start, c.end, c.detector, c.rule_id
                );
            }
            ok
        })
        .collect()
}

/// Institution whitelist, consulted before ranking. A candidate whose
/// exact text matches a known institution name is downgraded to ORG; a
/// person candidate lying inside a detected institution span is
/// suppressed.
fn apply_whitelist(candidates: &mut Vec<CandidateSpan>, text: &str, settings: &PipelineSettings) {
    let whitelist: Vec<String> = settings
        .whitelist
        .iter()
        .map(|w| w.to_lowercase())
        .collect();

    let institution_ranges: Vec<(usize, usize)> = candidates
        .iter()
        .filter(|c| c.category == Category::Org)
        .map(|c| (c.start, c.end))
        .collect();

    candidates.retain(|c| {
        if c.category != Category::Person {
            return true;
        }
        // Contained in a recognized institution name: the institution
        // span carries the redaction; the person reading is spurious.
        let contained = institution_ranges
            .iter()
            .any(|&(s, e)| s <= c.start && c.end <= e && (s, e) != (c.start, c.end));
        !contained
    });

    for candidate in candidates.iter_mut() {
        if candidate.category != Category::Person {
            continue;
        }
        let matched = text[candidate.start..candidate.end].to_lowercase();
        if whitelist.iter().any(|w| *w == matched) {
            debug!(
                "Whitelist downgrade of '{}' candidate [{}, {}) to ORG.",
                candidate.rule_id, candidate.start, candidate.end
            );
            candidate.category = Category::Org;
            candidate.confidence = candidate.confidence.min(0.65);
            candidate.rule_id = "whitelist_downgrade".to_string();
        }
    }
}

/// Re-checks the non-overlap invariant on the accepted set. A violation
/// indicates a priority-ordering bug and is fatal for the record.
fn verify_disjoint(spans: &[UnifiedSpan]) -> Result<(), OslonaError> {
    for pair in spans.windows(2) {
        if pair[0].end > pair[1].start {
            return Err(OslonaError::UnificationConflict(
                pair[0].start,
                pair[0].end,
                pair[1].start,
                pair[1].end,
            ));
        }
    }
    Ok(())
}
