// oslona-core/src/lib.rs
//! # Oslona Core Library
//!
//! `oslona-core` provides the detection-and-unification pipeline for
//! irreversible PII redaction of Polish free-text narratives. It
//! canonicalizes raw text, proposes candidate spans from three
//! independent detectors (deterministic patterns with checksum
//! validation, probabilistic named-entity recognition, dictionary/lemma
//! matching), unifies them under a fixed priority order, escalates
//! residual quasi-identifiers, and replaces the winners with stable
//! category tokens plus category-level provenance.
//!
//! The library is pure and stateless per record: all shared resources
//! (compiled rules, dictionaries, the entity model) are loaded once and
//! treated as immutable, so independent records can be processed
//! concurrently. Ingestion, export, model training, persistent audit
//! storage, and user-facing wrappers are callers' concerns.
//!
//! ## Modules
//!
//! * `config`: Defines `PatternRule`s, `PipelineSettings`, and versioned `RuleSet`s.
//! * `normalizer`: Canonical text form plus an offset map back to the raw input.
//! * `detectors`: The pattern, entity, and dictionary candidate-span detectors.
//! * `validators`: Checksum validation for rigid identifier formats.
//! * `rules`: Compilation and caching of pattern rules.
//! * `unifier`: Deterministic ranked merge of competing candidates.
//! * `heuristics`: Rare-occupation/small-locality quasi-identifier escalation.
//! * `redactor`: Category-token substitution and provenance emission.
//! * `pipeline`: Per-record orchestration and record-parallel batch processing.
//! * `evaluation`: Gold-corpus precision/recall breakdown for governance.
//! * `span`: Core span, record, and provenance data structures.
//! * `errors`: The `OslonaError` taxonomy.
//!
//! ## Usage Example
//!
//! ```rust
//! use oslona_core::{Pipeline, Record, RuleSet};
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     // 1. Load the built-in rule set and build a pipeline.
//!     let rule_set = RuleSet::load_default()?;
//!     let pipeline = Pipeline::new(rule_set)?;
//!
//!     // 2. Process a record.
//!     let record = Record::new(
//!         "skarga-0001",
//!         "Klient Jan Kowalski, PESEL 44051401359, dzwonił z numeru 500-600-700.",
//!     );
//!     let redacted = pipeline.process(&record)?;
//!
//!     // 3. The output carries fixed category tokens and provenance,
//!     //    never the captured values.
//!     println!("{}", redacted.redacted_text);
//!     for entry in &redacted.provenance {
//!         println!("{} via {} ({})", entry.category, entry.detector, entry.rule_id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Fallible operations return `anyhow::Error` at configuration seams and
//! the structured [`OslonaError`] from the pipeline itself. A record
//! either completes fully or fails atomically with the stage named;
//! partially redacted output is never produced.
//!
//! ## Design Principles
//!
//! * **Deterministic:** Identical input and component versions yield
//!   byte-identical output and provenance ordering.
//! * **Pluggable:** The entity model sits behind the [`EntityModel`]
//!   trait; any implementation returning calibrated spans is
//!   substitutable.
//! * **Irreversible:** Captured substrings are discarded at the redactor
//!   boundary; provenance is category-level only.
//!
//! ---
//! License: MIT OR Apache-2.0

// All modules must be declared before they can be used.
pub mod config;
pub mod detectors;
pub mod errors;
pub mod evaluation;
pub mod heuristics;
pub mod normalizer;
pub mod pipeline;
pub mod redactor;
pub mod rules;
pub mod span;
pub mod unifier;
pub mod validators;

/// Re-exports the public configuration types and functions for managing rule sets.
pub use config::{
    load_rule_set_by_name,
    merge_rules,
    rule_set_candidate_paths,
    sign_rule_set,
    validate_rules,
    PatternRule,
    PipelineSettings,
    RuleSet,
    KNOWN_VALIDATORS,
    MAX_PATTERN_LENGTH,
};

/// Re-exports the custom error type for clear error reporting.
pub use errors::OslonaError;

/// Re-exports the core span, record, and provenance data structures.
pub use span::{
    CandidateSpan, Category, DetectorKind, ProvenanceEntry, Record, RedactedRecord, UnifiedSpan,
};

/// Re-exports the normalizer entry points.
pub use normalizer::{normalize, normalize_bytes, NormalizedText};

/// Re-exports the detector trait and the pluggable entity-model seam.
pub use detectors::entity::{EntityModel, EntityPrediction, HeuristicEntityModel};
pub use detectors::Detector;

/// Re-exports the pipeline and its version record.
pub use pipeline::{ActiveVersions, Pipeline};

/// Re-exports the governance evaluation entry point.
pub use evaluation::{evaluate_corpus, EvaluationReport, GoldAnnotation, GoldRecord};

// Re-export key types from the rules::compiler module for advanced usage.
pub use rules::{compile_rules, CompiledRule, CompiledRules};
