// oslona-core/tests/rule_set_integration_tests.rs
use anyhow::Result;
use std::io::Write;
use tempfile::NamedTempFile;

use oslona_core::config::{self, RuleSet};
use oslona_core::{Category, PatternRule};

#[test]
fn test_load_default_rules() {
    let rule_set = RuleSet::load_default().unwrap();
    assert!(!rule_set.rules.is_empty());
    assert!(rule_set.rules.iter().any(|r| r.name == "email"));
    // Checksum-gated rules carry their validator name.
    let pesel = rule_set.rules.iter().find(|r| r.name == "pesel").unwrap();
    assert_eq!(pesel.validator.as_deref(), Some("pesel"));
    // Rules without a checksum have no validator.
    let email = rule_set.rules.iter().find(|r| r.name == "email").unwrap();
    assert!(email.validator.is_none());
}

#[test]
fn test_load_from_file() -> Result<()> {
    let yaml_content = r#"
version: "test-1"
rules:
  - name: test_rule
    pattern: "test"
    category: TRANSACTION_ID
    description: "A test rule"
    confidence: 0.9
    author: "test-author"
    created_at: "2023-01-01T00:00:00Z"
    updated_at: "2023-01-01T00:00:00Z"
    version: "1.0"
"#;
    let mut file = NamedTempFile::new()?;
    file.write_all(yaml_content.as_bytes())?;
    let rule_set = RuleSet::load_from_file(file.path())?;
    assert_eq!(rule_set.version, "test-1");
    assert_eq!(rule_set.rules.len(), 1);
    assert_eq!(rule_set.rules[0].name, "test_rule");
    assert_eq!(rule_set.rules[0].category, Category::TransactionId);
    assert_eq!(rule_set.rules[0].pattern, Some("test".to_string()));
    // cue_required is omitted, so it should default to false.
    assert!(!rule_set.rules[0].cue_required);
    Ok(())
}

#[test]
fn test_load_from_file_rejects_invalid_regex() -> Result<()> {
    let yaml_content = r#"
version: "test-2"
rules:
  - name: broken
    pattern: "("
    category: PHONE
"#;
    let mut file = NamedTempFile::new()?;
    file.write_all(yaml_content.as_bytes())?;
    assert!(RuleSet::load_from_file(file.path()).is_err());
    Ok(())
}

#[test]
fn test_merge_rules_no_user_config() {
    let default_set = RuleSet::load_default().unwrap();
    let rule_count = default_set.rules.len();
    let merged = config::merge_rules(default_set, None);
    assert_eq!(merged.rules.len(), rule_count);
}

#[test]
fn test_merge_rules_user_overrides_and_adds() {
    let default_set = RuleSet::load_default().unwrap();
    let rule_count = default_set.rules.len();

    let override_rule = PatternRule {
        name: "phone".into(),
        pattern: Some(r"\d{3} \d{3} \d{3}".into()),
        category: Category::Phone,
        ..PatternRule::default()
    };
    let new_rule = PatternRule {
        name: "passport".into(),
        pattern: Some(r"\b[A-Z]{2}\d{7}\b".into()),
        category: Category::IdCard,
        ..PatternRule::default()
    };
    let user_set = RuleSet {
        version: "user-2".into(),
        rules: vec![override_rule, new_rule],
        ..RuleSet::default()
    };

    let merged = config::merge_rules(default_set, Some(user_set));
    assert_eq!(merged.rules.len(), rule_count + 1);
    assert_eq!(merged.version, "user-2");
    let phone = merged.rules.iter().find(|r| r.name == "phone").unwrap();
    assert_eq!(phone.pattern.as_deref(), Some(r"\d{3} \d{3} \d{3}"));
    assert!(merged.rules.iter().any(|r| r.name == "passport"));
}

#[test]
fn test_set_active_rules_respects_opt_in_and_disable() {
    let mut rule_set = RuleSet::load_default().unwrap();
    let opt_in_rule = PatternRule {
        name: "aggressive_rule".into(),
        pattern: Some(r"\d{5}".into()),
        category: Category::TransactionId,
        opt_in: true,
        ..PatternRule::default()
    };
    rule_set.rules.push(opt_in_rule);

    let mut filtered = rule_set.clone();
    filtered.set_active_rules(&[], &["email".to_string()]);
    assert!(!filtered.rules.iter().any(|r| r.name == "email"));
    // Opt-in rules stay out unless explicitly enabled.
    assert!(!filtered.rules.iter().any(|r| r.name == "aggressive_rule"));

    let mut enabled = rule_set.clone();
    enabled.set_active_rules(&["aggressive_rule".to_string()], &[]);
    assert!(enabled.rules.iter().any(|r| r.name == "aggressive_rule"));
}

#[test]
fn test_signature_roundtrip() -> Result<()> {
    let yaml_content = r#"
version: "signed-1"
rules:
  - name: test_rule
    pattern: "test"
    category: TRANSACTION_ID
"#;
    let mut file = NamedTempFile::new()?;
    file.write_all(yaml_content.as_bytes())?;

    let key = b"governance-secret";
    config::sign_rule_set(file.path(), key)?;

    let raw = std::fs::read(file.path())?;
    let rule_set: RuleSet = serde_yml::from_slice(&raw)?;
    assert!(rule_set.signature.is_some());
    assert_eq!(rule_set.signature_alg.as_deref(), Some("hmac-sha256"));
    assert!(rule_set.verify_signature(key)?);
    // A different key must fail verification.
    assert!(rule_set.verify_signature(b"wrong-key").is_err());
    Ok(())
}

#[test]
fn test_fingerprint_changes_with_rules() {
    let a = RuleSet::load_default().unwrap();
    let mut b = a.clone();
    b.rules.push(PatternRule {
        name: "extra".into(),
        pattern: Some("x".into()),
        category: Category::TransactionId,
        ..PatternRule::default()
    });
    assert_ne!(a.fingerprint(), b.fingerprint());
}
