//! errors.rs - Custom error types for the oslona-core library.
//!
//! This module defines a structured error enum for the library, providing
//! specific, actionable error types that can be handled programmatically.
//! A record either completes the full pipeline or fails atomically with
//! one of these variants; partial output is never produced.
//!
//! License: MIT OR APACHE 2.0

use thiserror::Error;

use crate::span::DetectorKind;

/// This enum represents all possible error types in the `oslona-core` library.
///
/// By using `#[non_exhaustive]`, we signal to consumers of this library that
/// new variants may be added in future versions. This prevents them from
/// matching all variants exhaustively, thus avoiding breaking changes.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum OslonaError {
    #[error("Failed to compile pattern rule '{0}': {1}")]
    RuleCompilationError(String, regex::Error),

    #[error("Rule '{0}': pattern length ({1}) exceeds maximum allowed ({2})")]
    PatternLengthExceeded(String, usize, usize),

    /// A detector could not produce its candidate set. The record is
    /// excluded from output; it is never emitted partially redacted.
    #[error("Detector unavailable: {detector} ({message})")]
    DetectorUnavailable { detector: DetectorKind, message: String },

    /// Two accepted spans overlap. This indicates a priority-ordering bug
    /// and is fatal for the record.
    #[error("Unification conflict: accepted spans [{0}, {1}) and [{2}, {3}) overlap")]
    UnificationConflict(usize, usize, usize, usize),

    #[error("Invalid rule set: {0}")]
    InvalidRuleSet(String),

    #[error("An unexpected I/O error occurred: {0}")]
    IoError(#[from] std::io::Error),

    #[error("A critical system error occurred: {0}")]
    AnyhowWrapper(#[from] anyhow::Error),

    #[error("A fatal error occurred: {0}")]
    Fatal(String),
}

impl OslonaError {
    /// Name of the pipeline stage that produced this error, reported to
    /// callers alongside the failure status.
    pub fn stage(&self) -> &'static str {
        match self {
            OslonaError::RuleCompilationError(..)
            | OslonaError::PatternLengthExceeded(..)
            | OslonaError::InvalidRuleSet(_) => "configuration",
            OslonaError::DetectorUnavailable { .. } => "detection",
            OslonaError::UnificationConflict(..) => "unification",
            OslonaError::IoError(_) => "io",
            OslonaError::AnyhowWrapper(_) | OslonaError::Fatal(_) => "internal",
        }
    }
}
