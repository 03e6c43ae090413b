// oslona-core/src/rules/mod.rs
//! Compilation of pattern rules into their efficient runtime form.

pub mod compiler;

pub use compiler::{compile_rules, get_or_compile_rules, CompiledRule, CompiledRules};
