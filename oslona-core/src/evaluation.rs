// oslona-core/src/evaluation.rs
//! Pure gold-corpus evaluation entry point for the governance workflow.
//!
//! Rule and dictionary change requests must carry a regression run
//! against a fixed gold corpus. This module runs the pipeline over
//! annotated records and returns a precision/recall/false-positive
//! breakdown by category, without requiring the governance tooling to
//! understand pipeline internals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;
use crate::span::{ranges_overlap, Category, Record};

/// An expected span in a gold record, in normalized-text byte
/// coordinates (gold corpora are authored against normalized text so
/// annotations survive rule-set changes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldAnnotation {
    pub category: Category,
    pub start: usize,
    pub end: usize,
}

/// One annotated record of the gold corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldRecord {
    pub record_id: String,
    pub raw_text: String,
    pub annotations: Vec<GoldAnnotation>,
}

/// Counts and derived rates for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryMetrics {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl CategoryMetrics {
    pub fn precision(&self) -> f64 {
        let denominator = self.true_positives + self.false_positives;
        if denominator == 0 {
            0.0
        } else {
            self.true_positives as f64 / denominator as f64
        }
    }

    pub fn recall(&self) -> f64 {
        let denominator = self.true_positives + self.false_negatives;
        if denominator == 0 {
            0.0
        } else {
            self.true_positives as f64 / denominator as f64
        }
    }
}

/// Per-category breakdown over a corpus run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub per_category: BTreeMap<Category, CategoryMetrics>,
    /// Records excluded because a pipeline stage failed.
    pub failed_records: usize,
}

/// Runs the pipeline over the gold corpus. A predicted span counts as a
/// true positive when it overlaps a gold annotation of the same
/// category; unmatched predictions are false positives, unmatched
/// annotations false negatives.
pub fn evaluate_corpus(pipeline: &Pipeline, corpus: &[GoldRecord]) -> EvaluationReport {
    let mut report = EvaluationReport::default();

    for gold in corpus {
        let record = Record::new(gold.record_id.clone(), gold.raw_text.clone());
        let predicted = match pipeline.analyze(&record) {
            Ok(spans) => spans,
            Err(_) => {
                report.failed_records += 1;
                continue;
            }
        };

        let mut gold_matched = vec![false; gold.annotations.len()];
        for span in &predicted {
            let mut matched = false;
            for (idx, annotation) in gold.annotations.iter().enumerate() {
                if annotation.category == span.category
                    && ranges_overlap(span.start, span.end, annotation.start, annotation.end)
                {
                    gold_matched[idx] = true;
                    matched = true;
                }
            }
            let metrics = report.per_category.entry(span.category).or_default();
            if matched {
                metrics.true_positives += 1;
            } else {
                metrics.false_positives += 1;
            }
        }

        for (idx, annotation) in gold.annotations.iter().enumerate() {
            if !gold_matched[idx] {
                report
                    .per_category
                    .entry(annotation.category)
                    .or_default()
                    .false_negatives += 1;
            }
        }
    }

    report
}
