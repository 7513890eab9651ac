use std::collections::HashSet;

use crate::parser::PatternSet;

pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub deduped: usize,
    pub truncated: usize,
}

/// Concatenate per-source pattern sets in source order.
pub fn union_pattern_sets<I>(sets: I) -> Vec<String>
where
    I: IntoIterator<Item = PatternSet>,
{
    sets.into_iter().flatten().collect()
}

/// Drop repeated patterns, keeping the first occurrence, then cut the list
/// down to `max_rules`.
///
/// Overlapping patterns (a broad domain and one of its subdomains) are distinct
/// strings and are both kept.
pub fn optimize_patterns(patterns: &mut Vec<String>, max_rules: usize) -> OptimizeStats {
    let before = patterns.len();

    let mut seen: HashSet<String> = HashSet::with_capacity(patterns.len());
    let mut deduped = 0usize;
    patterns.retain(|pattern| {
        if seen.contains(pattern) {
            deduped += 1;
            false
        } else {
            seen.insert(pattern.clone());
            true
        }
    });

    let truncated = patterns.len().saturating_sub(max_rules);
    patterns.truncate(max_rules);

    OptimizeStats {
        before,
        after: patterns.len(),
        deduped,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str]) -> PatternSet {
        patterns.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_union_dedupes_across_sources() {
        let mut patterns = union_pattern_sets(vec![
            set(&["*a.example*", "*b.example*"]),
            set(&["*b.example*", "*c.example*"]),
            PatternSet::new(),
        ]);
        let stats = optimize_patterns(&mut patterns, 100);

        assert_eq!(patterns, vec!["*a.example*", "*b.example*", "*c.example*"]);
        assert_eq!(stats.before, 4);
        assert_eq!(stats.after, 3);
        assert_eq!(stats.deduped, 1);
        assert_eq!(stats.truncated, 0);
    }

    #[test]
    fn test_truncates_to_cap() {
        let mut patterns: Vec<String> = (0..10).map(|i| format!("*host{}.example*", i)).collect();
        let stats = optimize_patterns(&mut patterns, 4);

        assert_eq!(patterns.len(), 4);
        assert_eq!(patterns[3], "*host3.example*");
        assert_eq!(stats.truncated, 6);
    }

    #[test]
    fn test_overlapping_patterns_kept() {
        let mut patterns = union_pattern_sets(vec![
            set(&["*example.com*"]),
            set(&["*ads.example.com*"]),
        ]);
        optimize_patterns(&mut patterns, 100);
        assert_eq!(patterns.len(), 2);
    }
}
