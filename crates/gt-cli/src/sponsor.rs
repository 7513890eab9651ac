use gt_core::segments::{parse_segments, segments_url, SponsorSegment};

use crate::fetcher::Transport;

/// Sponsor segment lookups. Every failure reads as "no segments".
pub struct SponsorClient<T> {
    transport: T,
    base_url: String,
}

impl<T: Transport> SponsorClient<T> {
    pub fn new(transport: T, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
        }
    }

    pub async fn fetch_segments(&self, video_id: &str) -> Vec<SponsorSegment> {
        let url = match segments_url(&self.base_url, video_id) {
            Some(url) => url,
            None => {
                log::debug!("Not a video id: '{}'", video_id);
                return Vec::new();
            }
        };

        match self.transport.get(&url).await {
            Ok(response) if response.is_success() => parse_segments(&response.body),
            Ok(response) => {
                log::debug!("No segments for {} (HTTP {})", video_id, response.status);
                Vec::new()
            }
            Err(e) => {
                log::debug!("Segment lookup for {} failed: {}", video_id, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::tests::MockTransport;
    use gt_core::segments::SPONSOR_API_URL;

    const URL: &str = "https://sponsor.ajay.app/api/skipSegments?videoID=abc123";

    #[tokio::test]
    async fn test_segments_found() {
        let transport =
            MockTransport::new().ok(URL, r#"[{"segment":[1.5,9.0],"category":"sponsor"}]"#);
        let client = SponsorClient::new(transport, SPONSOR_API_URL);
        let segments = client.fetch_segments("abc123").await;
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].end(), 9.0);
    }

    #[tokio::test]
    async fn test_not_found_is_empty() {
        let transport = MockTransport::new().status(URL, 404);
        let client = SponsorClient::new(transport, SPONSOR_API_URL);
        assert!(client.fetch_segments("abc123").await.is_empty());
    }

    #[tokio::test]
    async fn test_network_error_is_empty() {
        let transport = MockTransport::new().network_error(URL);
        let client = SponsorClient::new(transport, SPONSOR_API_URL);
        assert!(client.fetch_segments("abc123").await.is_empty());
    }

    #[tokio::test]
    async fn test_bad_id_makes_no_request() {
        let client = SponsorClient::new(MockTransport::new(), SPONSOR_API_URL);
        assert!(client.fetch_segments("../admin").await.is_empty());
        assert!(client.transport.calls.lock().unwrap().is_empty());
    }
}
