//! GoodTube Filter List Compiler
//!
//! This crate turns ABP-style filter lists into the dynamic blocking rules the
//! extension installs.

pub mod parser;
pub mod optimizer;
pub mod builder;

pub use builder::{build_rules, compile_rules, CompileOutput};
pub use optimizer::{optimize_patterns, union_pattern_sets, OptimizeStats};
pub use parser::{extract_patterns, PatternSet, PROTECTED_DOMAINS};
