// oslona-lexicon/src/lib.rs
//! Lemma-aware dictionary matching for Polish text.
//!
//! This crate provides the low-level lexical machinery used by
//! `oslona-core`'s dictionary detector and residual heuristics:
//! tiered word lists (first names, surnames, localities, institutions,
//! occupations), a suffix-based candidate lemmatizer for inflected
//! Polish surface forms, and Aho-Corasick scanning over text.
//!
//! License: MIT OR Apache-2.0

pub mod context;
pub mod lemma;
pub mod lexicon;
pub mod matcher;

pub use context::KeywordScanner;
pub use lexicon::{EntryKind, Lexicon, LexiconBuilder, LexiconEntry, Tier};
pub use matcher::{LexiconMatch, LexiconMatcher};
