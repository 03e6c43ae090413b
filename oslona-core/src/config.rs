//! Configuration management for `oslona-core`.
//!
//! This module defines the pattern rules and pipeline settings that make up
//! a versioned rule set. It handles serialization/deserialization of YAML
//! configurations and provides utilities for loading, merging, validating
//! and (optionally) signature-verifying them. Rule sets are immutable once
//! a pipeline is constructed; hot reload between batches means building a
//! new pipeline from a new rule set.
//!
//! License: MIT OR Apache-2.0

use anyhow::{anyhow, bail, Context, Result};
use hmac::{Hmac, Mac};
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::span::Category;

type HmacSha256 = Hmac<Sha256>;

/// Maximum allowed length for a regex pattern string.
pub const MAX_PATTERN_LENGTH: usize = 500;

/// Checksum validators that rules may reference by name.
pub const KNOWN_VALIDATORS: &[&str] = &["pesel", "nip", "regon", "iban", "card", "id_card"];

/// Represents a single pattern rule used by the pattern detector.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PatternRule {
    /// Unique identifier for the rule (e.g., "pesel").
    pub name: String,
    /// Human-readable description of what the rule targets.
    pub description: Option<String>,
    /// The regex pattern string.
    pub pattern: Option<String>,
    /// Redaction category emitted for matches of this rule.
    pub category: Category,
    /// Checksum validator gating emission; format matches failing the
    /// checksum are suppressed entirely, not down-weighted.
    pub validator: Option<String>,
    /// Label keywords whose presence in the preceding window raises
    /// confidence (e.g. "nip" before a tax-ID-shaped number).
    pub context_cues: Vec<String>,
    /// If true, the rule emits only when a context cue is present.
    pub cue_required: bool,
    /// Base confidence of a validated match.
    pub confidence: f64,
    /// Confidence when a context cue is found nearby.
    pub cue_confidence: Option<f64>,
    /// If true, matches adjacent to another digit are rejected
    /// (replaces the original lookaround guards).
    pub digit_bounded: bool,
    /// If true, the rule is also checked against compacted digit runs.
    pub scan_digit_runs: bool,
    /// If true, enables multiline mode for the regex engine.
    pub multiline: bool,
    /// If true, the rule is disabled unless explicitly enabled.
    pub opt_in: bool,
    /// Explicit override for enabling/disabling the rule.
    pub enabled: Option<bool>,
    pub version: String,
    pub created_at: String,
    pub updated_at: String,
    pub author: String,
    /// Security severity level (e.g., "high", "medium").
    pub severity: Option<String>,
    /// Metadata tags for categorization.
    pub tags: Option<Vec<String>>,
}

impl Hash for PatternRule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.pattern.hash(state);
        self.category.hash(state);
        self.validator.hash(state);
        self.context_cues.hash(state);
        self.cue_required.hash(state);
        self.confidence.to_bits().hash(state);
        self.cue_confidence.map(f64::to_bits).hash(state);
        self.digit_bounded.hash(state);
        self.scan_digit_runs.hash(state);
        self.multiline.hash(state);
        self.opt_in.hash(state);
        self.enabled.hash(state);
        self.version.hash(state);
    }
}

impl Default for PatternRule {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            pattern: None,
            category: Category::TransactionId,
            validator: None,
            context_cues: Vec::new(),
            cue_required: false,
            confidence: 0.9,
            cue_confidence: None,
            digit_bounded: false,
            scan_digit_runs: false,
            multiline: false,
            opt_in: false,
            enabled: None,
            version: "1.0.0".to_string(),
            created_at: "1970-01-01T00:00:00Z".to_string(),
            updated_at: "1970-01-01T00:00:00Z".to_string(),
            author: "Oslona Team".to_string(),
            severity: None,
            tags: None,
        }
    }
}

/// Policy parameters of the pipeline. These are tuning knobs, re-fit
/// against the gold corpus rather than hard-coded invariants.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Entity-detector confidence at or above which a candidate ranks in
    /// the high-confidence tier.
    pub entity_threshold: f64,
    /// Minimum confidence per category; candidates below are dropped
    /// before unification. Ordered so serialization is deterministic.
    pub category_thresholds: BTreeMap<Category, f64>,
    /// Token window for the residual rare-occupation/small-locality
    /// heuristic.
    pub heuristics_window: usize,
    /// Byte window scanned backwards for context cues.
    pub context_window_bytes: usize,
    /// Institution names (in addition to the lexicon's institution list)
    /// that must never be treated as personal names.
    pub whitelist: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            entity_threshold: 0.7,
            category_thresholds: BTreeMap::new(),
            heuristics_window: 8,
            context_window_bytes: 32,
            whitelist: Vec::new(),
        }
    }
}

impl Hash for PipelineSettings {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entity_threshold.to_bits().hash(state);
        for (category, threshold) in &self.category_thresholds {
            category.hash(state);
            threshold.to_bits().hash(state);
        }
        self.heuristics_window.hash(state);
        self.context_window_bytes.hash(state);
        self.whitelist.hash(state);
    }
}

/// A versioned rule set: pattern rules plus pipeline settings.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RuleSet {
    /// Rule-set version, recorded against every provenance entry.
    pub version: String,
    pub rules: Vec<PatternRule>,
    pub settings: PipelineSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_alg: Option<String>,
}

impl RuleSet {
    /// Loads a rule set from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading rule set from: {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rule set file {}", path.display()))?;
        let rule_set: RuleSet = serde_yml::from_str(&text)
            .with_context(|| format!("Failed to parse rule set file {}", path.display()))?;

        validate_rules(&rule_set.rules)?;
        info!("Loaded {} rules from file {}.", rule_set.rules.len(), path.display());

        Ok(rule_set)
    }

    /// Loads the built-in default rule set from the embedded configuration.
    pub fn load_default() -> Result<Self> {
        debug!("Loading default rules from embedded string...");
        let default_yaml = include_str!("../config/default_rules.yaml");
        let rule_set: RuleSet = serde_yml::from_str(default_yaml)
            .context("Failed to parse default rules")?;

        validate_rules(&rule_set.rules)?;
        debug!("Loaded {} default rules.", rule_set.rules.len());
        Ok(rule_set)
    }

    /// Filters active rules based on enable/disable lists.
    pub fn set_active_rules(&mut self, enable_rules: &[String], disable_rules: &[String]) {
        let enable_set: HashSet<&str> = enable_rules.iter().map(String::as_str).collect();
        let disable_set: HashSet<&str> = disable_rules.iter().map(String::as_str).collect();

        let all_rule_names: HashSet<&str> = self.rules.iter().map(|r| r.name.as_str()).collect();
        for rule_name in enable_set.difference(&all_rule_names) {
            warn!("Rule '{}' in `enable_rules` list does not exist.", rule_name);
        }
        for rule_name in disable_set.difference(&all_rule_names) {
            warn!("Rule '{}' in `disable_rules` list does not exist.", rule_name);
        }

        self.rules.retain(|rule| {
            let name = rule.name.as_str();
            !disable_set.contains(name) && (!rule.opt_in || enable_set.contains(name))
        });

        debug!("Final active rules count after filtering: {}", self.rules.len());
    }

    /// Stable content fingerprint, used as the compiled-rule cache key
    /// component and recorded in batch metadata.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.version.as_bytes());
        let mut rules = self.rules.clone();
        rules.sort_by(|a, b| a.name.cmp(&b.name));
        for rule in &rules {
            let mut h = std::collections::hash_map::DefaultHasher::new();
            rule.hash(&mut h);
            hasher.update(std::hash::Hasher::finish(&h).to_be_bytes());
        }
        let mut h = std::collections::hash_map::DefaultHasher::new();
        self.settings.hash(&mut h);
        hasher.update(std::hash::Hasher::finish(&h).to_be_bytes());
        hex::encode(hasher.finalize())
    }

    /// The canonical serialization used as signing input: the rule set
    /// with the signature fields cleared. Sign and verify both hash this
    /// form, so the signature survives YAML reformatting.
    fn canonical_unsigned_yaml(&self) -> Result<String> {
        let mut unsigned = self.clone();
        unsigned.signature = None;
        unsigned.signature_alg = None;
        serde_yml::to_string(&unsigned).context("Failed to serialize rule set for signing.")
    }

    /// Verifies the HMAC-SHA256 signature of the rule set against the
    /// provided secret key.
    pub fn verify_signature(&self, key: &[u8]) -> Result<bool> {
        let Some(stored_signature) = self.signature.as_ref() else {
            debug!("Rule set '{}' is unsigned, skipping signature verification.", self.version);
            return Ok(true);
        };

        if self.signature_alg.as_deref() != Some("hmac-sha256") {
            bail!(
                "Rule set '{}' signature verification failed: unsupported algorithm '{}'.",
                self.version,
                self.signature_alg.as_deref().unwrap_or("none")
            );
        }

        let canonical = self.canonical_unsigned_yaml()?;
        let mut mac = HmacSha256::new_from_slice(key)
            .map_err(|e| anyhow!("Failed to initialize HMAC-SHA256 with key: {}", e))?;
        mac.update(canonical.as_bytes());
        let computed = hex::encode(mac.finalize().into_bytes());

        if computed.eq_ignore_ascii_case(stored_signature) {
            debug!("Rule set '{}' signature verification succeeded.", self.version);
            Ok(true)
        } else {
            warn!("Rule set '{}' signature verification failed.", self.version);
            Err(anyhow!(
                "Rule set signature verification failed for version '{}'. The file may have been tampered with.",
                self.version
            ))
        }
    }
}

/// Signs a rule set file with an HMAC-SHA256 key and updates it in place.
/// Intended for the governance tooling that versions rule changes.
pub fn sign_rule_set(path: &Path, key: &[u8]) -> Result<()> {
    let raw_bytes = std::fs::read(path)
        .with_context(|| format!("reading rule set file {}", path.display()))?;
    let mut rule_set: RuleSet = serde_yml::from_slice(&raw_bytes)
        .with_context(|| format!("parsing rule set YAML for signing {}", path.display()))?;

    let canonical = rule_set.canonical_unsigned_yaml()?;
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| anyhow!("Failed to initialize HMAC-SHA256 for signing: {}", e))?;
    mac.update(canonical.as_bytes());
    rule_set.signature = Some(hex::encode(mac.finalize().into_bytes()));
    rule_set.signature_alg = Some("hmac-sha256".to_string());

    let updated = serde_yml::to_string(&rule_set).context("Failed to re-serialize signed rule set.")?;
    std::fs::write(path, updated)
        .with_context(|| format!("writing signed rule set to {}", path.display()))?;
    Ok(())
}

/// Candidate locations for a named rule set file.
pub fn rule_set_candidate_paths(name: &str) -> Vec<PathBuf> {
    let base_dirs = vec![
        dirs::home_dir().map(|p| p.join(".oslona").join("rulesets")),
        dirs::config_dir().map(|p| p.join("oslona").join("rulesets")),
        Some(PathBuf::from("/etc/oslona/rulesets")),
        Some(PathBuf::from("./config")),
        Some(PathBuf::from("../config")),
    ];

    base_dirs
        .into_iter()
        .flatten()
        .map(|dir| dir.join(format!("{}.yaml", name)))
        .collect()
}

/// Loads a rule set by file path or by name from the candidate locations,
/// verifying its signature when `OSLONA_RULESET_KEY` is set.
pub fn load_rule_set_by_name(name_or_path: &str) -> Result<RuleSet> {
    debug!("Attempting to load rule set from: '{}'", name_or_path);

    let path_to_load = {
        let path = Path::new(name_or_path);
        if path.exists() && path.is_file() {
            Some(path.to_path_buf())
        } else {
            rule_set_candidate_paths(name_or_path)
                .into_iter()
                .find(|p| p.exists())
        }
    }
    .context("Rule set not found. It is not a valid file path, and was not found in expected locations.")?;

    let raw_bytes = std::fs::read(&path_to_load)
        .with_context(|| format!("reading rule set file {}", path_to_load.display()))?;
    let rule_set: RuleSet = serde_yml::from_slice(&raw_bytes)
        .with_context(|| format!("parsing rule set YAML {}", path_to_load.display()))?;
    validate_rules(&rule_set.rules)?;

    if let Ok(key_hex) = std::env::var("OSLONA_RULESET_KEY") {
        let key_bytes = hex::decode(&key_hex)
            .context("Failed to decode OSLONA_RULESET_KEY from hex.")?;
        rule_set.verify_signature(&key_bytes)?;
    } else if rule_set.signature.is_some() {
        warn!(
            "Rule set '{}' is signed, but OSLONA_RULESET_KEY is not set. Signature verification skipped.",
            rule_set.version
        );
    }

    Ok(rule_set)
}

/// Merges user-defined rules and settings with defaults. User rules
/// replace default rules of the same name; user settings win wholesale.
pub fn merge_rules(default_set: RuleSet, user_set: Option<RuleSet>) -> RuleSet {
    debug!("merge_rules called. Initial default rules count: {}", default_set.rules.len());

    let mut final_rules_map: HashMap<String, PatternRule> = default_set
        .rules
        .into_iter()
        .map(|rule| (rule.name.clone(), rule))
        .collect();

    let mut version = default_set.version;
    let mut settings = default_set.settings;

    if let Some(user) = user_set {
        debug!("User rule set provided. Merging {} user rules.", user.rules.len());
        for user_rule in user.rules {
            final_rules_map.insert(user_rule.name.clone(), user_rule);
        }
        settings = user.settings;
        if !user.version.is_empty() {
            version = user.version;
        }
    }

    let mut final_rules: Vec<PatternRule> = final_rules_map.into_values().collect();
    final_rules.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("Final total rules after merge: {}", final_rules.len());

    RuleSet { version, rules: final_rules, settings, signature: None, signature_alg: None }
}

/// Validates rule integrity (names, regex compilation, confidences,
/// validator references).
pub fn validate_rules(rules: &[PatternRule]) -> Result<()> {
    let mut rule_names = HashSet::new();
    let mut errors = Vec::new();

    for rule in rules {
        if rule.name.is_empty() {
            errors.push("A rule has an empty `name` field.".to_string());
        } else if !rule_names.insert(rule.name.clone()) {
            errors.push(format!("Duplicate rule name found: '{}'.", rule.name));
        }

        let pattern = match &rule.pattern {
            Some(p) => p,
            None => {
                errors.push(format!("Rule '{}' is missing the `pattern` field.", rule.name));
                continue;
            }
        };

        if pattern.is_empty() {
            errors.push(format!("Rule '{}' has an empty `pattern` field.", rule.name));
        }
        if pattern.len() > MAX_PATTERN_LENGTH {
            errors.push(format!(
                "Rule '{}': pattern length ({}) exceeds maximum allowed ({}).",
                rule.name,
                pattern.len(),
                MAX_PATTERN_LENGTH
            ));
        }
        if let Err(e) = Regex::new(pattern) {
            errors.push(format!("Rule '{}' has an invalid regex pattern: {}", rule.name, e));
        }

        if let Some(validator) = &rule.validator {
            if !KNOWN_VALIDATORS.contains(&validator.as_str()) {
                errors.push(format!(
                    "Rule '{}' references unknown validator '{}'.",
                    rule.name, validator
                ));
            }
        }

        if !(0.0..=1.0).contains(&rule.confidence) {
            errors.push(format!("Rule '{}': confidence must be within [0, 1].", rule.name));
        }
        if let Some(cue_confidence) = rule.cue_confidence {
            if !(0.0..=1.0).contains(&cue_confidence) {
                errors.push(format!("Rule '{}': cue_confidence must be within [0, 1].", rule.name));
            }
        }
        if rule.cue_required && rule.context_cues.is_empty() {
            errors.push(format!(
                "Rule '{}' requires a context cue but declares none.",
                rule.name
            ));
        }
    }

    if !errors.is_empty() {
        Err(anyhow!("Rule validation failed:\n{}", errors.join("\n")))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rule_set_parses_and_validates() {
        let rule_set = RuleSet::load_default().unwrap();
        assert!(!rule_set.rules.is_empty());
        assert!(rule_set.rules.iter().any(|r| r.name == "pesel"));
        let pesel = rule_set.rules.iter().find(|r| r.name == "pesel").unwrap();
        assert_eq!(pesel.validator.as_deref(), Some("pesel"));
        assert_eq!(pesel.category, Category::Pesel);
    }

    #[test]
    fn duplicate_rule_names_are_rejected() {
        let rule = PatternRule {
            name: "dup".into(),
            pattern: Some("x".into()),
            ..PatternRule::default()
        };
        let err = validate_rules(&[rule.clone(), rule]).unwrap_err();
        assert!(err.to_string().contains("Duplicate rule name"));
    }

    #[test]
    fn unknown_validator_is_rejected() {
        let rule = PatternRule {
            name: "bad".into(),
            pattern: Some("x".into()),
            validator: Some("nope".into()),
            ..PatternRule::default()
        };
        assert!(validate_rules(&[rule]).is_err());
    }

    #[test]
    fn fingerprint_is_stable_across_rule_order() {
        let mut a = RuleSet::load_default().unwrap();
        let b = a.clone();
        a.rules.reverse();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn merge_prefers_user_rules() {
        let default_set = RuleSet::load_default().unwrap();
        let user_rule = PatternRule {
            name: "pesel".into(),
            pattern: Some(r"\d{11}".into()),
            category: Category::Pesel,
            ..PatternRule::default()
        };
        let user_set = RuleSet {
            version: "user-1".into(),
            rules: vec![user_rule],
            ..RuleSet::default()
        };
        let merged = merge_rules(default_set, Some(user_set));
        let pesel = merged.rules.iter().find(|r| r.name == "pesel").unwrap();
        assert_eq!(pesel.pattern.as_deref(), Some(r"\d{11}"));
        assert_eq!(merged.version, "user-1");
    }
}
