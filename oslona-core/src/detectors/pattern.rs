// oslona-core/src/detectors/pattern.rs
//! Regex-based recognizer for rigid identifier formats, gated by
//! checksum validators and contextual label cues.
//!
//! A span is emitted only if the regex matches AND the rule's checksum
//! validator (if any) passes. Checksum failures are suppressed outright,
//! not down-weighted: an invoice number that happens to be 11 digits
//! must not surface as a national-ID candidate.

use std::sync::Arc;

use anyhow::Result;
use log::warn;

use crate::normalizer::NormalizedText;
use crate::rules::{CompiledRule, CompiledRules};
use crate::span::{log_candidate_debug, CandidateSpan, DetectorKind};
use crate::validators;

#[derive(Debug)]
pub struct PatternDetector {
    compiled_rules: Arc<CompiledRules>,
    context_window_bytes: usize,
}

impl PatternDetector {
    pub fn new(compiled_rules: Arc<CompiledRules>, context_window_bytes: usize) -> Self {
        Self { compiled_rules, context_window_bytes }
    }

    /// Runs the rule's checksum validator over the matched text. Rules
    /// without a validator always pass.
    fn validator_passes(&self, rule: &CompiledRule, matched: &str) -> bool {
        match rule.validator.as_deref() {
            Some("pesel") => validators::is_valid_pesel(matched),
            Some("nip") => validators::is_valid_nip(matched),
            Some("regon") => validators::is_valid_regon(matched),
            Some("iban") => validators::is_valid_iban(matched),
            Some("card") => validators::is_valid_card(matched),
            Some("id_card") => validators::is_valid_polish_id_card(matched),
            Some(other) => {
                warn!("Rule '{}' references unknown validator '{}'; suppressing match.", rule.name, other);
                false
            }
            None => true,
        }
    }

    /// Emits a candidate for a validated match at `[start, end)`, with
    /// confidence raised when a context cue precedes it.
    fn emit(
        &self,
        rule: &CompiledRule,
        text: &str,
        start: usize,
        end: usize,
        out: &mut Vec<CandidateSpan>,
    ) {
        let cue_present = !rule.cue_scanner.is_empty()
            && rule
                .cue_scanner
                .scan_preceding(text.as_bytes(), start, self.context_window_bytes);
        if rule.cue_required && !cue_present {
            return;
        }
        let confidence = if cue_present {
            rule.cue_confidence.unwrap_or(rule.confidence)
        } else {
            rule.confidence
        };

        log_candidate_debug(module_path!(), &rule.name, &text[start..end]);
        out.push(CandidateSpan {
            start,
            end,
            category: rule.category,
            confidence,
            detector: DetectorKind::Pattern,
            rule_id: rule.name.clone(),
        });
    }
}

/// Rejects matches glued to surrounding digits. Stands in for the
/// original lookaround guards, which the regex engine does not support.
fn digit_bounded(bytes: &[u8], start: usize, end: usize) -> bool {
    let prefix_ok = start == 0 || !bytes[start - 1].is_ascii_digit();
    let suffix_ok = end >= bytes.len() || !bytes[end].is_ascii_digit();
    prefix_ok && suffix_ok
}

impl super::Detector for PatternDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Pattern
    }

    fn detect(&self, normalized: &NormalizedText) -> Result<Vec<CandidateSpan>> {
        let text = normalized.text();
        let bytes = text.as_bytes();
        let mut out = Vec::new();

        for rule in &self.compiled_rules.rules {
            if let Some(false) = rule.enabled {
                continue;
            }

            for m in rule.regex.find_iter(text) {
                if rule.digit_bounded && !digit_bounded(bytes, m.start(), m.end()) {
                    continue;
                }
                if !self.validator_passes(rule, m.as_str()) {
                    continue; // checksum failure: suppression, not an error
                }
                self.emit(rule, text, m.start(), m.end(), &mut out);
            }

            // Second pass over compacted digit runs, so separator
            // obfuscation ("44.05.14.01.359") cannot defeat the format.
            if rule.scan_digit_runs {
                for run in normalized.digit_runs() {
                    let full_match = rule
                        .regex
                        .find(&run.digits)
                        .map_or(false, |m| m.start() == 0 && m.end() == run.digits.len());
                    if !full_match || !self.validator_passes(rule, &run.digits) {
                        continue;
                    }
                    self.emit(rule, text, run.start, run.end, &mut out);
                }
            }
        }

        // The text pass and the digit-run pass can produce the same span.
        out.sort_by(|a, b| {
            (a.start, a.end, a.rule_id.as_str()).cmp(&(b.start, b.end, b.rule_id.as_str()))
        });
        out.dedup_by(|a, b| a.start == b.start && a.end == b.end && a.rule_id == b.rule_id);
        Ok(out)
    }
}
