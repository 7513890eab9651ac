//! Sponsor segments and the seek decision made while a video plays.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Community segment database endpoint.
pub const SPONSOR_API_URL: &str = "https://sponsor.ajay.app/api/skipSegments";

/// How often the page polls the playback position.
pub const SKIP_POLL_INTERVAL_MS: u64 = 600;

/// Seek this far past a segment end so the same segment doesn't match again.
pub const SKIP_PAST_END_SECS: f64 = 0.1;

/// One skippable range of a video, as returned by the segment API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SponsorSegment {
    /// `[start, end]` in seconds
    pub segment: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub action_type: Option<String>,
    #[serde(default, rename = "UUID", skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub uuid: Option<String>,
}

impl SponsorSegment {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            segment: [start, end],
            category: None,
            action_type: None,
            uuid: None,
        }
    }

    pub fn start(&self) -> f64 {
        self.segment[0]
    }

    pub fn end(&self) -> f64 {
        self.segment[1]
    }

    /// Half-open: `start <= t < end`.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start() && t < self.end()
    }
}

/// Decode an API response body. Anything that isn't a segment array yields no
/// segments.
pub fn parse_segments(body: &str) -> Vec<SponsorSegment> {
    match serde_json::from_str::<Vec<SponsorSegment>>(body) {
        Ok(segments) => segments
            .into_iter()
            .filter(|s| s.start().is_finite() && s.end().is_finite() && s.end() > s.start())
            .collect(),
        Err(e) => {
            log::debug!("Ignoring malformed segment response: {}", e);
            Vec::new()
        }
    }
}

/// Segment list for the video currently playing.
#[derive(Debug, Clone, Default)]
pub struct SegmentSkipper {
    segments: Vec<SponsorSegment>,
}

impl SegmentSkipper {
    pub fn new(segments: Vec<SponsorSegment>) -> Self {
        Self { segments }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[SponsorSegment] {
        &self.segments
    }

    /// Where playback should jump to from `current`, if it sits inside a
    /// segment. Segments are checked in order and jumps chain, so back-to-back
    /// segments are skipped in one step.
    pub fn seek_target(&self, current: f64) -> Option<f64> {
        let mut position = current;
        let mut target = None;
        for segment in &self.segments {
            if segment.contains(position) {
                position = segment.end() + SKIP_PAST_END_SECS;
                target = Some(position);
            }
        }
        target
    }
}

fn is_video_id_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn valid_video_id(id: &str) -> Option<&str> {
    if !id.is_empty() && id.bytes().all(is_video_id_byte) {
        Some(id)
    } else {
        None
    }
}

/// Video id from a watch URL's `v` parameter, or a bare id.
pub fn video_id(input: &str) -> Option<&str> {
    let input = input.trim();
    let query_start = match input.find('?') {
        Some(pos) => pos + 1,
        None => return valid_video_id(input),
    };

    let query = &input[query_start..];
    let query = match query.find('#') {
        Some(pos) => &query[..pos],
        None => query,
    };

    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "v")
        .and_then(|(_, value)| valid_video_id(value))
}

/// Request URL for a video's segments, or `None` for an unusable id.
pub fn segments_url(base: &str, video_id: &str) -> Option<String> {
    valid_video_id(video_id).map(|id| format!("{}?videoID={}", base, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments() {
        let body = r#"[
            {"segment":[10.5,42.0],"category":"sponsor","UUID":"abc","actionType":"skip"},
            {"segment":[100,120]}
        ]"#;
        let segments = parse_segments(body);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].category.as_deref(), Some("sponsor"));
        assert_eq!(segments[0].uuid.as_deref(), Some("abc"));
        assert_eq!(segments[1].start(), 100.0);
    }

    #[test]
    fn test_parse_segments_failure_is_empty() {
        assert!(parse_segments("Not Found").is_empty());
        assert!(parse_segments("{}").is_empty());
        assert!(parse_segments(r#"[{"segment":[5,1]}]"#).is_empty());
    }

    #[test]
    fn test_seek_target() {
        let skipper = SegmentSkipper::new(vec![
            SponsorSegment::new(10.0, 20.0),
            SponsorSegment::new(50.0, 60.0),
        ]);
        assert_eq!(skipper.seek_target(5.0), None);
        assert_eq!(skipper.seek_target(10.0), Some(20.1));
        assert_eq!(skipper.seek_target(19.9), Some(20.1));
        assert_eq!(skipper.seek_target(20.0), None);
        assert_eq!(skipper.seek_target(55.0), Some(60.1));
    }

    #[test]
    fn test_seek_target_chains_adjacent_segments() {
        let skipper = SegmentSkipper::new(vec![
            SponsorSegment::new(0.0, 30.0),
            SponsorSegment::new(30.05, 45.0),
        ]);
        assert_eq!(skipper.seek_target(1.0), Some(45.1));
    }

    #[test]
    fn test_video_id() {
        assert_eq!(video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), Some("dQw4w9WgXcQ"));
        assert_eq!(
            video_id("https://www.youtube.com/watch?list=PL1&v=abc_-123&t=10#frag"),
            Some("abc_-123")
        );
        assert_eq!(video_id("dQw4w9WgXcQ"), Some("dQw4w9WgXcQ"));
        assert_eq!(video_id("https://www.youtube.com/feed?x=1"), None);
        assert_eq!(video_id("https://www.youtube.com/watch?v=a%20b"), None);
    }

    #[test]
    fn test_segments_url() {
        assert_eq!(
            segments_url(SPONSOR_API_URL, "abc").as_deref(),
            Some("https://sponsor.ajay.app/api/skipSegments?videoID=abc")
        );
        assert_eq!(segments_url(SPONSOR_API_URL, "a&b"), None);
    }
}
