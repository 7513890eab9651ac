use gt_core::types::BlockingRule;

use crate::optimizer::{optimize_patterns, union_pattern_sets, OptimizeStats};
use crate::parser::PatternSet;

/// Map patterns to block rules with ids `1..=patterns.len()`.
pub fn build_rules(patterns: &[String]) -> Vec<BlockingRule> {
    patterns
        .iter()
        .enumerate()
        .map(|(i, pattern)| BlockingRule::block(i as u32 + 1, pattern.as_str()))
        .collect()
}

pub struct CompileOutput {
    pub rules: Vec<BlockingRule>,
    pub stats: OptimizeStats,
}

/// Union the per-source sets, dedupe, cap at `max_rules` and build rules.
pub fn compile_rules<I>(sets: I, max_rules: usize) -> CompileOutput
where
    I: IntoIterator<Item = PatternSet>,
{
    let mut patterns = union_pattern_sets(sets);
    let stats = optimize_patterns(&mut patterns, max_rules);
    let rules = build_rules(&patterns);

    log::debug!(
        "Compiled {} patterns into {} rules ({} duplicates, {} over cap)",
        stats.before,
        rules.len(),
        stats.deduped,
        stats.truncated
    );

    CompileOutput { rules, stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gt_core::types::{validate_rule_set, ResourceTypes, RuleAction, MAX_RULES};

    use crate::parser::extract_patterns;

    fn numbered_set(prefix: &str, count: usize) -> PatternSet {
        (0..count).map(|i| format!("*{}{}.example.com*", prefix, i)).collect()
    }

    #[test]
    fn test_build_rules_metadata() {
        let rules = build_rules(&["*adservice.google.com*".to_string(), "*/ads/*".to_string()]);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].id, 1);
        assert_eq!(rules[1].id, 2);
        assert_eq!(rules[1].condition.url_filter, "*/ads/*");
        for rule in &rules {
            assert_eq!(rule.priority, 1);
            assert_eq!(rule.action, RuleAction::Block);
            assert_eq!(rule.condition.resource_types, ResourceTypes::BLOCKED);
        }
    }

    #[test]
    fn test_cap_gives_dense_ids() {
        let output = compile_rules(
            vec![
                numbered_set("a", 20_000),
                numbered_set("b", 20_000),
                numbered_set("a", 5_000),
            ],
            MAX_RULES,
        );

        assert_eq!(output.rules.len(), MAX_RULES);
        assert_eq!(output.stats.deduped, 5_000);
        assert_eq!(output.stats.truncated, 10_000);
        assert!(validate_rule_set(&output.rules, MAX_RULES).is_ok());
        assert_eq!(output.rules.last().map(|r| r.id), Some(MAX_RULES as u32));
    }

    #[test]
    fn test_empty_source_contributes_nothing() {
        let output = compile_rules(
            vec![
                extract_patterns("||tracker.example.com^"),
                extract_patterns(""),
                extract_patterns("||metrics.example.net^"),
            ],
            MAX_RULES,
        );
        let filters: Vec<&str> = output
            .rules
            .iter()
            .map(|r| r.condition.url_filter.as_str())
            .collect();
        assert_eq!(filters, vec!["*tracker.example.com*", "*metrics.example.net*"]);
    }

    #[test]
    fn test_identical_input_identical_rules() {
        let lists = [
            "||a-tracker.example^\n/ads/x\n",
            "||b-tracker.example^\n||a-tracker.example^\n",
        ];
        let first = compile_rules(lists.iter().map(|t| extract_patterns(t)), MAX_RULES);
        let second = compile_rules(lists.iter().map(|t| extract_patterns(t)), MAX_RULES);
        assert_eq!(first.rules, second.rules);
        assert_eq!(
            serde_json::to_string(&first.rules).unwrap(),
            serde_json::to_string(&second.rules).unwrap()
        );
    }
}
