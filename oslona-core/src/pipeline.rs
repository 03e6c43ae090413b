// oslona-core/src/pipeline.rs
//! Per-record orchestration of the detection-and-unification pipeline.
//!
//! A `Pipeline` owns only immutable, `Arc`-shared resources (compiled
//! rules, lexicon, entity model), so `process` is a pure function of the
//! record: independent records may be processed concurrently with no
//! shared mutable state. Hot-reloading a rule set between batches means
//! constructing a new `Pipeline`; nothing mutates mid-record.

use std::sync::Arc;

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use oslona_lexicon::{Lexicon, LexiconMatcher};

use crate::config::{validate_rules, PipelineSettings, RuleSet};
use crate::detectors::dictionary::DictionaryDetector;
use crate::detectors::entity::{EntityDetector, EntityModel, HeuristicEntityModel};
use crate::detectors::pattern::PatternDetector;
use crate::detectors::Detector;
use crate::errors::OslonaError;
use crate::heuristics::ResidualHeuristics;
use crate::normalizer::{normalize, NormalizedText};
use crate::redactor::redact;
use crate::span::{CandidateSpan, Record, RedactedRecord, UnifiedSpan};
use crate::unifier::unify;

/// Versions of the shared resources active for a pipeline instance,
/// recorded against every emitted provenance entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveVersions {
    pub rule_set: String,
    pub lexicon: String,
    pub entity_model: String,
}

/// The full Normalizer -> Redactor pass over single records.
pub struct Pipeline {
    settings: PipelineSettings,
    pattern: PatternDetector,
    entity: EntityDetector,
    dictionary: DictionaryDetector,
    heuristics: ResidualHeuristics,
    versions: ActiveVersions,
}

impl Pipeline {
    /// Builds a pipeline with the default heuristic entity model and the
    /// embedded lexicon.
    pub fn new(rule_set: RuleSet) -> Result<Self, OslonaError> {
        Self::with_components(
            rule_set,
            Arc::new(HeuristicEntityModel::new()),
            Arc::new(Lexicon::embedded()),
        )
    }

    /// Builds a pipeline with an explicit entity model and lexicon. All
    /// shared resources are loaded here, once, and treated as immutable
    /// for the lifetime of the pipeline.
    pub fn with_components(
        rule_set: RuleSet,
        model: Arc<dyn EntityModel>,
        lexicon: Arc<Lexicon>,
    ) -> Result<Self, OslonaError> {
        validate_rules(&rule_set.rules).map_err(|e| OslonaError::InvalidRuleSet(e.to_string()))?;
        let compiled = crate::rules::get_or_compile_rules(&rule_set)?;
        let matcher = Arc::new(LexiconMatcher::new(Arc::clone(&lexicon)));

        let rule_set_version = if rule_set.version.is_empty() {
            rule_set.fingerprint()[..12].to_string()
        } else {
            rule_set.version.clone()
        };
        let versions = ActiveVersions {
            rule_set: rule_set_version,
            lexicon: lexicon.version().to_string(),
            entity_model: model.version().to_string(),
        };
        let settings = rule_set.settings.clone();

        Ok(Self {
            pattern: PatternDetector::new(compiled, settings.context_window_bytes),
            entity: EntityDetector::new(model),
            dictionary: DictionaryDetector::new(matcher.clone()),
            heuristics: ResidualHeuristics::new(matcher, settings.heuristics_window),
            settings,
            versions,
        })
    }

    pub fn versions(&self) -> &ActiveVersions {
        &self.versions
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Processes one record through the full pipeline. Returns either a
    /// fully redacted record with complete provenance, or the error of
    /// the stage that failed; partial output is never returned.
    pub fn process(&self, record: &Record) -> Result<RedactedRecord, OslonaError> {
        let normalized = normalize(&record.raw_text);
        let spans = self.unified_spans(&normalized)?;
        let (redacted_text, provenance) = redact(&normalized, &spans, &self.versions)?;

        debug!(
            "Record '{}': {} span(s) redacted.",
            record.record_id,
            provenance.len()
        );
        Ok(RedactedRecord {
            record_id: record.record_id.clone(),
            redacted_text,
            provenance,
        })
    }

    /// Detection and unification without redaction. Used by the gold
    /// corpus evaluation entry point; returns span coordinates and
    /// categories only, never captured text.
    pub fn analyze(&self, record: &Record) -> Result<Vec<UnifiedSpan>, OslonaError> {
        let normalized = normalize(&record.raw_text);
        self.unified_spans(&normalized)
    }

    fn unified_spans(&self, normalized: &NormalizedText) -> Result<Vec<UnifiedSpan>, OslonaError> {
        let mut candidates: Vec<CandidateSpan> = Vec::new();
        for detector in [
            &self.pattern as &dyn Detector,
            &self.entity,
            &self.dictionary,
        ] {
            let found = detector.detect(normalized).map_err(|e| {
                OslonaError::DetectorUnavailable {
                    detector: detector.kind(),
                    message: format!("{e:#}"),
                }
            })?;
            candidates.extend(found);
        }

        let mut spans = unify(candidates, normalized, &self.settings)?;
        self.heuristics.augment(normalized, &mut spans);
        Ok(spans)
    }

    /// Processes independent records in parallel. Each record either
    /// completes the full pipeline or fails atomically; failures do not
    /// affect sibling records.
    pub fn process_batch(&self, records: &[Record]) -> Vec<Result<RedactedRecord, OslonaError>> {
        let run_id = Uuid::new_v4();
        info!(
            "Starting batch run {} over {} record(s) (rule set {}, lexicon {}, model {}).",
            run_id,
            records.len(),
            self.versions.rule_set,
            self.versions.lexicon,
            self.versions.entity_model
        );
        let results: Vec<Result<RedactedRecord, OslonaError>> =
            records.par_iter().map(|record| self.process(record)).collect();
        let failed = results.iter().filter(|r| r.is_err()).count();
        info!("Batch run {} finished: {} ok, {} failed.", run_id, results.len() - failed, failed);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Category;
    use anyhow::anyhow;

    fn pipeline() -> Pipeline {
        Pipeline::new(RuleSet::load_default().unwrap()).unwrap()
    }

    #[test]
    fn versions_are_exposed_for_forensics() {
        let p = pipeline();
        assert_eq!(p.versions().rule_set, "2025.08.0");
        assert!(p.versions().entity_model.starts_with("heuristic-ner-"));
        assert!(!p.versions().lexicon.is_empty());
    }

    #[test]
    fn analyze_returns_disjoint_spans_without_text() {
        let p = pipeline();
        let record = Record::new("r1", "Klient Jan Kowalski, PESEL 44051401359.");
        let spans = p.analyze(&record).unwrap();
        assert!(spans.iter().any(|s| s.category == Category::Pesel));
        for pair in spans.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }

    struct FailingModel;

    impl EntityModel for FailingModel {
        fn version(&self) -> &str {
            "failing-model"
        }
        fn predict(&self, _text: &str) -> anyhow::Result<Vec<crate::detectors::entity::EntityPrediction>> {
            Err(anyhow!("inference backend unavailable"))
        }
    }

    #[test]
    fn detector_failure_excludes_the_record_with_a_distinct_status() {
        let p = Pipeline::with_components(
            RuleSet::load_default().unwrap(),
            Arc::new(FailingModel),
            Arc::new(Lexicon::embedded()),
        )
        .unwrap();
        let record = Record::new("r1", "Jan Kowalski, PESEL 44051401359");
        let err = p.process(&record).unwrap_err();
        assert!(matches!(err, OslonaError::DetectorUnavailable { .. }));
        assert_eq!(err.stage(), "detection");
    }
}
