//! compiler.rs - Manages the compilation and caching of pattern rules.
//!
//! This module provides a thread-safe, cached mechanism to convert a
//! `RuleSet` into `CompiledRules`, which are optimized for efficient
//! detection. It uses a global, shared cache to avoid redundant
//! compilation when pipelines are rebuilt between batches.
//!
//! License: MIT OR APACHE 2.0

use anyhow::Result;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::RegexBuilder;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use oslona_lexicon::KeywordScanner;

use crate::config::{PatternRule, RuleSet, MAX_PATTERN_LENGTH};
use crate::errors::OslonaError;
use crate::span::Category;

/// A single compiled pattern rule, ready for efficient application.
#[derive(Debug)]
pub struct CompiledRule {
    /// The compiled regular expression used for matching.
    pub regex: regex::Regex,
    /// The unique name of the rule.
    pub name: String,
    pub category: Category,
    /// Name of the checksum validator gating emission, if any.
    pub validator: Option<String>,
    /// Scanner over the rule's context-cue keywords; empty when the rule
    /// declares none.
    pub cue_scanner: KeywordScanner,
    pub cue_required: bool,
    pub confidence: f64,
    pub cue_confidence: Option<f64>,
    pub digit_bounded: bool,
    pub scan_digit_runs: bool,
    pub enabled: Option<bool>,
}

/// The complete set of compiled rules for one rule-set version.
#[derive(Debug)]
pub struct CompiledRules {
    pub rules: Vec<CompiledRule>,
}

lazy_static! {
    /// A thread-safe, global cache for compiled rules.
    /// The key is a hash of the sorted rule list.
    static ref COMPILED_RULES_CACHE: RwLock<HashMap<u64, Arc<CompiledRules>>> =
        RwLock::new(HashMap::new());
}

/// Hashes the rule list to create a stable, unique cache key. Rules are
/// sorted by name first so the key is order-independent.
fn hash_rules(rules: &[PatternRule]) -> u64 {
    let mut hasher = DefaultHasher::new();
    let mut rules_to_hash = rules.to_vec();
    rules_to_hash.sort_by(|a, b| a.name.cmp(&b.name));
    rules_to_hash.hash(&mut hasher);
    hasher.finish()
}

/// Compiles a list of `PatternRule`s into `CompiledRules`.
/// This is the low-level function that performs the actual regex compilation.
pub fn compile_rules(rules_to_compile: Vec<PatternRule>) -> Result<CompiledRules, OslonaError> {
    debug!("Starting compilation of {} rules.", rules_to_compile.len());

    let mut compiled_rules = Vec::new();
    let mut compilation_errors = Vec::new();

    for rule in rules_to_compile {
        let Some(pattern) = rule.pattern.as_ref() else {
            warn!("Skipping rule '{}' because its pattern is missing.", &rule.name);
            continue;
        };

        if pattern.len() > MAX_PATTERN_LENGTH {
            compilation_errors.push(OslonaError::PatternLengthExceeded(
                rule.name,
                pattern.len(),
                MAX_PATTERN_LENGTH,
            ));
            continue;
        }

        let regex_result = RegexBuilder::new(pattern)
            .multi_line(rule.multiline)
            .size_limit(10 * (1 << 20)) // 10 MB limit for compiled regex
            .build();

        match regex_result {
            Ok(regex) => {
                debug!("Rule '{}' compiled successfully.", &rule.name);
                compiled_rules.push(CompiledRule {
                    regex,
                    name: rule.name,
                    category: rule.category,
                    validator: rule.validator,
                    cue_scanner: KeywordScanner::new(&rule.context_cues),
                    cue_required: rule.cue_required,
                    confidence: rule.confidence,
                    cue_confidence: rule.cue_confidence,
                    digit_bounded: rule.digit_bounded,
                    scan_digit_runs: rule.scan_digit_runs,
                    enabled: rule.enabled,
                });
            }
            Err(e) => {
                compilation_errors.push(OslonaError::RuleCompilationError(rule.name, e));
            }
        }
    }

    if !compilation_errors.is_empty() {
        let error_message = compilation_errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<String>>()
            .join("\n");
        Err(OslonaError::Fatal(format!(
            "Failed to compile {} rule(s):\n{}",
            compilation_errors.len(),
            error_message
        )))
    } else {
        debug!("Finished compiling rules. Total compiled: {}.", compiled_rules.len());
        Ok(CompiledRules { rules: compiled_rules })
    }
}

/// Gets a `CompiledRules` instance from the cache or compiles them if not
/// found. Returns an `Arc` so every concurrent record-processing task can
/// share the same immutable compiled set.
pub fn get_or_compile_rules(rule_set: &RuleSet) -> Result<Arc<CompiledRules>> {
    let cache_key = hash_rules(&rule_set.rules);

    {
        let cache = COMPILED_RULES_CACHE.read().unwrap();
        if let Some(rules) = cache.get(&cache_key) {
            debug!("Serving compiled rules from cache for key: {}", &cache_key);
            return Ok(Arc::clone(rules));
        }
    } // Read lock is released here.

    debug!("Compiled rules not found in cache. Compiling now.");
    let compiled = compile_rules(rule_set.rules.clone())?;
    let compiled_arc = Arc::new(compiled);

    COMPILED_RULES_CACHE
        .write()
        .unwrap()
        .insert(cache_key, Arc::clone(&compiled_arc));

    debug!("Successfully compiled and cached rules for key: {}", &cache_key);
    Ok(compiled_arc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleSet;

    #[test]
    fn default_rules_compile() {
        let rule_set = RuleSet::load_default().unwrap();
        let compiled = compile_rules(rule_set.rules).unwrap();
        assert!(compiled.rules.iter().any(|r| r.name == "pesel"));
        assert!(compiled.rules.iter().any(|r| r.name == "address_line"));
    }

    #[test]
    fn cache_returns_shared_instance() {
        let rule_set = RuleSet::load_default().unwrap();
        let a = get_or_compile_rules(&rule_set).unwrap();
        let b = get_or_compile_rules(&rule_set).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn invalid_pattern_is_a_compilation_error() {
        let rule = PatternRule {
            name: "broken".into(),
            pattern: Some("(".into()),
            ..PatternRule::default()
        };
        assert!(compile_rules(vec![rule]).is_err());
    }
}
