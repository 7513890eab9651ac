use std::collections::HashSet;

/// First-party substrings that must never end up in a blocking pattern.
pub const PROTECTED_DOMAINS: &[&str] = &["youtube.com", "googlevideo.com", "ytimg.com"];

/// Shortest domain accepted, before wrapping.
pub const MIN_DOMAIN_LEN: usize = 7;

/// Line markers that make a line worth searching for an ad path fragment.
const AD_KEYWORDS: &[&str] = &[
    "/ad/",
    "/ads/",
    "adservice",
    "doubleclick",
    "googlesyndication",
    "pagead",
    "banner",
];

/// Unique patterns in first-insertion order.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<String>,
    seen: HashSet<String>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the pattern was already present.
    pub fn insert(&mut self, pattern: String) -> bool {
        if self.seen.contains(&pattern) {
            return false;
        }
        self.seen.insert(pattern.clone());
        self.patterns.push(pattern);
        true
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.seen.contains(pattern)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.patterns
    }
}

impl PartialEq for PatternSet {
    /// Set equality; insertion order is not compared.
    fn eq(&self, other: &Self) -> bool {
        self.seen == other.seen
    }
}

impl Eq for PatternSet {}

impl FromIterator<String> for PatternSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = PatternSet::new();
        for pattern in iter {
            set.insert(pattern);
        }
        set
    }
}

impl IntoIterator for PatternSet {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.patterns.into_iter()
    }
}

/// Extract blocking glob patterns (`*fragment*`) from one filter list.
pub fn extract_patterns(text: &str) -> PatternSet {
    let mut patterns = PatternSet::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || is_comment_line(line) {
            continue;
        }

        if let Some(pattern) = match_domain(line).and_then(domain_pattern) {
            patterns.insert(pattern);
        }

        if is_ad_line(line) {
            if let Some(fragment) = ad_path_fragment(line) {
                patterns.insert(format!("*{}*", fragment.to_ascii_lowercase()));
            }
        }
    }

    patterns
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[')
}

fn is_domain_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'.' || b == b'-'
}

fn is_path_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-'
}

/// Length of the run of domain bytes starting at `start`.
fn domain_run_len(bytes: &[u8], start: usize) -> usize {
    bytes[start..].iter().take_while(|&&b| is_domain_byte(b)).count()
}

/// Longest prefix of a domain run that ends in `.` plus two or more letters.
///
/// The run stops at `^`, `$` and every other separator, so anchors never make it
/// into the result.
fn domain_prefix(run: &str) -> Option<&str> {
    let bytes = run.as_bytes();
    for dot in (1..bytes.len()).rev() {
        if bytes[dot] != b'.' {
            continue;
        }
        let letters = bytes[dot + 1..]
            .iter()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        if letters >= 2 {
            return Some(&run[..dot + 1 + letters]);
        }
    }
    None
}

/// Domain after a `|` or `||` anchor, falling back to the first bare domain on
/// the line.
fn match_domain(line: &str) -> Option<&str> {
    anchored_domain(line).or_else(|| bare_domain(line))
}

fn anchored_domain(line: &str) -> Option<&str> {
    let bytes = line.as_bytes();

    for (pos, &b) in bytes.iter().enumerate() {
        if b != b'|' {
            continue;
        }
        let mut start = pos + 1;
        if bytes.get(start) == Some(&b'|') {
            start += 1;
        }
        if start >= bytes.len() {
            break;
        }
        let len = domain_run_len(bytes, start);
        if let Some(domain) = domain_prefix(&line[start..start + len]) {
            return Some(domain);
        }
    }

    None
}

fn bare_domain(line: &str) -> Option<&str> {
    let bytes = line.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        if !is_domain_byte(bytes[pos]) {
            pos += 1;
            continue;
        }
        let len = domain_run_len(bytes, pos);
        if let Some(domain) = domain_prefix(&line[pos..pos + len]) {
            return Some(domain);
        }
        pos += len;
    }

    None
}

/// Lowercase and wrap a matched domain, or reject it.
fn domain_pattern(domain: &str) -> Option<String> {
    let domain = domain.to_ascii_lowercase();

    if domain.len() < MIN_DOMAIN_LEN || domain.contains('*') {
        return None;
    }

    if PROTECTED_DOMAINS.iter().any(|protected| domain.contains(protected)) {
        return None;
    }

    Some(format!("*{}*", domain))
}

fn is_ad_line(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    AD_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// First `/segment/` whose segment mentions `ad`, slashes included.
fn ad_path_fragment(line: &str) -> Option<&str> {
    let bytes = line.as_bytes();

    for (pos, &b) in bytes.iter().enumerate() {
        if b != b'/' {
            continue;
        }
        let seg_start = pos + 1;
        let seg_len = bytes[seg_start..].iter().take_while(|&&b| is_path_byte(b)).count();
        let seg_end = seg_start + seg_len;
        if bytes.get(seg_end) != Some(&b'/') {
            continue;
        }
        let segment = &line[seg_start..seg_end];
        if segment.to_ascii_lowercase().contains("ad") {
            return Some(&line[pos..=seg_end]);
        }
    }

    None
}
