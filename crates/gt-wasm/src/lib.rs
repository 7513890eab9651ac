//! WebAssembly bindings for GoodTube

use wasm_bindgen::prelude::*;

use gt_core::{
    message::{PageMessage, RuntimeMessage},
    page::{self, DomSnapshot, HostConfig, PageAction, PageController, PageEvent},
    schedule::{self, UPDATE_INTERVAL_MS},
    segments::{self, parse_segments, SegmentSkipper, SPONSOR_API_URL},
    settings::UserSettings,
    storage::{KeyValueStore, MemoryStore},
    types::{rule_ids_up_to, MAX_RULES},
};

fn warn(message: &str) {
    web_sys::console::warn_1(&JsValue::from_str(message));
}

/// JSON text to a JS value, or `fallback` if either step fails.
fn json_to_js(json: Result<String, serde_json::Error>, fallback: JsValue) -> JsValue {
    match json {
        Ok(text) => js_sys::JSON::parse(&text).unwrap_or_else(|_| {
            warn("goodtube: failed to parse generated JSON");
            fallback
        }),
        Err(e) => {
            warn(&format!("goodtube: failed to encode value: {}", e));
            fallback
        }
    }
}

fn actions_to_js(actions: &[PageAction]) -> JsValue {
    json_to_js(serde_json::to_string(actions), js_sys::Array::new().into())
}

/// Settings from a stored-settings JSON object; missing or unreadable keys
/// keep their defaults.
fn settings_from_json(json: Option<&str>) -> UserSettings {
    let text = match json {
        Some(text) if !text.trim().is_empty() => text,
        _ => return UserSettings::default(),
    };

    let object = match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(text) {
        Ok(object) => object,
        Err(_) => return UserSettings::default(),
    };

    let store = MemoryStore::new();
    for (key, value) in object {
        if store.set(&key, value).is_err() {
            return UserSettings::default();
        }
    }
    UserSettings::load(&store)
}

// =============================================================================
// Rule compilation
// =============================================================================

#[wasm_bindgen]
pub fn extract_patterns(list_text: &str) -> Vec<String> {
    gt_compiler::extract_patterns(list_text).into_vec()
}

#[wasm_bindgen]
pub fn compile_rules(list_texts: JsValue) -> Result<JsValue, JsValue> {
    let list_array = js_sys::Array::from(&list_texts);
    let list_count = list_array.length() as usize;

    let mut sets = Vec::with_capacity(list_count);
    let mut line_counts: Vec<usize> = Vec::with_capacity(list_count);

    for value in list_array.iter() {
        let text = value
            .as_string()
            .ok_or_else(|| JsValue::from_str("List text must be a string"))?;
        line_counts.push(text.lines().count());
        sets.push(gt_compiler::extract_patterns(&text));
    }

    let pattern_counts: Vec<usize> = sets.iter().map(|set| set.len()).collect();
    let output = gt_compiler::compile_rules(sets, MAX_RULES);

    let rules_json = serde_json::to_string(&output.rules)
        .map_err(|e| JsValue::from_str(&format!("Failed to encode rules: {}", e)))?;
    let rules = js_sys::JSON::parse(&rules_json)?;

    let stats = &output.stats;
    let js_result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&js_result, &"rules".into(), &rules);
    let _ = js_sys::Reflect::set(
        &js_result,
        &"patternsBefore".into(),
        &JsValue::from(stats.before as u32),
    );
    let _ = js_sys::Reflect::set(
        &js_result,
        &"patternsAfter".into(),
        &JsValue::from(stats.after as u32),
    );
    let _ = js_sys::Reflect::set(
        &js_result,
        &"deduped".into(),
        &JsValue::from(stats.deduped as u32),
    );
    let _ = js_sys::Reflect::set(
        &js_result,
        &"truncated".into(),
        &JsValue::from(stats.truncated as u32),
    );

    let list_stats = js_sys::Array::new_with_length(list_count as u32);
    for i in 0..list_count {
        let stat = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&stat, &"lines".into(), &JsValue::from(line_counts[i] as u32));
        let _ = js_sys::Reflect::set(
            &stat,
            &"patterns".into(),
            &JsValue::from(pattern_counts[i] as u32),
        );
        list_stats.set(i as u32, stat.into());
    }
    let _ = js_sys::Reflect::set(&js_result, &"listStats".into(), &list_stats);

    Ok(js_result.into())
}

/// Every id a previous rule set may occupy.
#[wasm_bindgen]
pub fn rule_ids_to_remove() -> Vec<u32> {
    rule_ids_up_to(MAX_RULES)
}

// =============================================================================
// Background helpers
// =============================================================================

/// `last_update` and `now` are epoch milliseconds as JS numbers.
#[wasm_bindgen]
pub fn should_update(last_update: Option<f64>, now: f64) -> bool {
    let last = last_update
        .filter(|value| value.is_finite() && *value >= 0.0)
        .map(|value| value as u64);
    schedule::should_update(last, now.max(0.0) as u64, UPDATE_INTERVAL_MS)
}

/// The message as a tagged object, or `null` if it is not one of ours.
#[wasm_bindgen]
pub fn parse_runtime_message(json: &str) -> JsValue {
    match RuntimeMessage::parse(json) {
        Some(message) => json_to_js(message.to_json(), JsValue::NULL),
        None => JsValue::NULL,
    }
}

// =============================================================================
// Page scripts
// =============================================================================

#[wasm_bindgen]
pub fn ad_block_css() -> String {
    page::ad_block_css()
}

/// Selectors and timings for every page action, as one object.
#[wasm_bindgen]
pub fn host_config() -> JsValue {
    json_to_js(serde_json::to_string(&HostConfig::default()), JsValue::NULL)
}

/// `id` of the injected ad stylesheet element.
#[wasm_bindgen]
pub fn ad_style_id() -> String {
    page::AD_STYLE_ID.to_string()
}

/// Selector list for `removeAdElements`.
#[wasm_bindgen]
pub fn ad_remove_selector() -> String {
    page::AD_REMOVE_SELECTORS.join(", ")
}

#[wasm_bindgen]
pub fn skip_button_selector() -> String {
    page::SKIP_BUTTON_SELECTOR.to_string()
}

#[wasm_bindgen]
pub fn ad_showing_selector() -> String {
    page::AD_SHOWING_SELECTOR.to_string()
}

/// `[link, container]` selectors for `hideShorts`.
#[wasm_bindgen]
pub fn shorts_selectors() -> Vec<String> {
    vec![
        page::SHORTS_LINK_SELECTOR.to_string(),
        page::SHORTS_CONTAINER_SELECTOR.to_string(),
    ]
}

#[wasm_bindgen]
pub fn element_wait_timeout_ms() -> u32 {
    page::ELEMENT_WAIT_TIMEOUT_MS as u32
}

#[wasm_bindgen]
pub fn skip_poll_interval_ms() -> u32 {
    segments::SKIP_POLL_INTERVAL_MS as u32
}

/// Sponsor API request URL for a video id or watch URL.
#[wasm_bindgen]
pub fn sponsor_segments_url(video: &str) -> Option<String> {
    segments::video_id(video).and_then(|id| segments::segments_url(SPONSOR_API_URL, id))
}

/// One page's controller. Every method returns the actions to perform.
#[wasm_bindgen]
pub struct PageSession {
    controller: PageController,
}

#[wasm_bindgen]
impl PageSession {
    #[wasm_bindgen(constructor)]
    pub fn new(settings_json: Option<String>) -> PageSession {
        PageSession {
            controller: PageController::new(settings_from_json(settings_json.as_deref())),
        }
    }

    pub fn start(&mut self) -> JsValue {
        actions_to_js(&self.controller.start())
    }

    pub fn stop(&mut self) -> JsValue {
        actions_to_js(&self.controller.stop())
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    #[wasm_bindgen(js_name = domChanged)]
    pub fn dom_changed(
        &mut self,
        has_video: bool,
        ad_showing: bool,
        skip_button_visible: bool,
        video_id: Option<String>,
    ) -> JsValue {
        let snapshot = DomSnapshot {
            has_video,
            ad_showing,
            skip_button_visible,
            video_id,
        };
        actions_to_js(&self.controller.handle(PageEvent::DomChanged(snapshot)))
    }

    #[wasm_bindgen(js_name = navigationStarted)]
    pub fn navigation_started(&mut self) -> JsValue {
        actions_to_js(&self.controller.handle(PageEvent::NavigationStarted))
    }

    #[wasm_bindgen(js_name = navigationFinished)]
    pub fn navigation_finished(&mut self) -> JsValue {
        actions_to_js(&self.controller.handle(PageEvent::NavigationFinished))
    }

    /// Apply a posted page message; anything unrecognised does nothing.
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&mut self, message_json: &str) -> JsValue {
        match PageMessage::parse(message_json) {
            Some(message) => actions_to_js(&self.controller.handle(PageEvent::Message(message))),
            None => js_sys::Array::new().into(),
        }
    }
}

/// Sponsor segments of the video currently playing.
#[wasm_bindgen]
pub struct SkipSession {
    skipper: SegmentSkipper,
}

#[wasm_bindgen]
impl SkipSession {
    /// Build from a segment API response body; a bad body gives no segments.
    #[wasm_bindgen(constructor)]
    pub fn new(response_body: &str) -> SkipSession {
        SkipSession {
            skipper: SegmentSkipper::new(parse_segments(response_body)),
        }
    }

    #[wasm_bindgen(js_name = segmentCount)]
    pub fn segment_count(&self) -> usize {
        self.skipper.segments().len()
    }

    /// Playback position to seek to, if `current_time` is inside a segment.
    #[wasm_bindgen(js_name = seekTarget)]
    pub fn seek_target(&self, current_time: f64) -> Option<f64> {
        self.skipper.seek_target(current_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_json() {
        assert_eq!(settings_from_json(None), UserSettings::default());
        assert_eq!(settings_from_json(Some("not json")), UserSettings::default());

        let settings = settings_from_json(Some(r#"{"skipIntro":false}"#));
        assert!(settings.hide_ads);
        assert!(!settings.skip_intro);
    }

    #[test]
    fn test_should_update_from_js_numbers() {
        let now = 1_700_000_000_000.0;
        assert!(should_update(None, now));
        assert!(should_update(Some(f64::NAN), now));
        assert!(!should_update(Some(now - 1000.0), now));
        assert!(should_update(Some(now - UPDATE_INTERVAL_MS as f64 - 1.0), now));
    }

    #[test]
    fn test_skip_session() {
        let session = SkipSession::new(r#"[{"segment":[0,5]},{"segment":[5.05,9]}]"#);
        assert_eq!(session.segment_count(), 2);
        let target = session.seek_target(1.0).unwrap();
        assert!((target - 9.1).abs() < 1e-9);
        assert_eq!(session.seek_target(20.0), None);
    }

    #[test]
    fn test_sponsor_segments_url() {
        assert_eq!(
            sponsor_segments_url("https://www.youtube.com/watch?v=abc_123").as_deref(),
            Some("https://sponsor.ajay.app/api/skipSegments?videoID=abc_123")
        );
        assert_eq!(sponsor_segments_url("https://www.youtube.com/feed"), None);
    }

    #[test]
    fn test_extract_patterns_binding() {
        assert_eq!(extract_patterns("||doubleclick.net^"), vec!["*doubleclick.net*".to_string()]);
    }

    #[test]
    fn test_host_selectors_and_timings() {
        assert_eq!(ad_style_id(), "goodtube-ad-style");
        assert_eq!(ad_remove_selector(), HostConfig::default().ad_remove_selector);
        assert!(ad_remove_selector().contains(".video-ads"));
        assert_eq!(skip_button_selector(), ".ytp-ad-skip-button, .ytp-ad-overlay-close-button");
        assert_eq!(ad_showing_selector(), ".ad-showing");
        assert_eq!(shorts_selectors()[0], "a[href*=\"/shorts/\"]");
        assert!(shorts_selectors()[1].contains("ytd-rich-grid-media"));
        assert_eq!(element_wait_timeout_ms(), 5_000);
        assert_eq!(skip_poll_interval_ms(), 600);
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    fn get(value: &JsValue, key: &str) -> JsValue {
        js_sys::Reflect::get(value, &key.into()).unwrap()
    }

    fn kinds(actions: &JsValue) -> Vec<String> {
        js_sys::Array::from(actions)
            .iter()
            .map(|action| get(&action, "kind").as_string().unwrap())
            .collect()
    }

    #[wasm_bindgen_test]
    fn test_compile_rules_object() {
        let lists = js_sys::Array::new();
        lists.push(&JsValue::from_str("||adservice.google.com^\n||googlevideo.com^"));
        lists.push(&JsValue::from_str("||adservice.google.com^\n||doubleclick.net^"));

        let result = compile_rules(lists.into()).unwrap();
        let rules = js_sys::Array::from(&get(&result, "rules"));
        assert_eq!(rules.length(), 2);

        let first = rules.get(0);
        assert_eq!(get(&first, "id").as_f64(), Some(1.0));
        let condition = get(&first, "condition");
        assert_eq!(
            get(&condition, "urlFilter").as_string().as_deref(),
            Some("*adservice.google.com*")
        );

        assert_eq!(get(&result, "patternsBefore").as_f64(), Some(3.0));
        assert_eq!(get(&result, "deduped").as_f64(), Some(1.0));

        let list_stats = js_sys::Array::from(&get(&result, "listStats"));
        assert_eq!(list_stats.length(), 2);
        assert_eq!(get(&list_stats.get(0), "lines").as_f64(), Some(2.0));
        assert_eq!(get(&list_stats.get(0), "patterns").as_f64(), Some(1.0));
    }

    #[wasm_bindgen_test]
    fn test_compile_rules_rejects_non_string() {
        let lists = js_sys::Array::new();
        lists.push(&JsValue::from(42));
        assert!(compile_rules(lists.into()).is_err());
    }

    #[wasm_bindgen_test]
    fn test_parse_runtime_message_object() {
        let message = parse_runtime_message(r#"{"type":"GOODTUBE_FORCE_UPDATE"}"#);
        assert_eq!(get(&message, "type").as_string().as_deref(), Some("GOODTUBE_FORCE_UPDATE"));
        assert!(parse_runtime_message("{\"type\":\"OTHER\"}").is_null());
    }

    #[wasm_bindgen_test]
    fn test_page_session_actions() {
        let mut session = PageSession::new(Some(r#"{"hideAds":true,"skipIntro":true}"#.into()));
        assert_eq!(kinds(&session.start()), vec!["injectAdStyle"]);

        let actions = session.dom_changed(true, false, false, Some("abc".into()));
        assert_eq!(kinds(&actions), vec!["removeAdElements", "hideShorts", "fetchSegments"]);
        let fetch = js_sys::Array::from(&actions).get(2);
        assert_eq!(get(&fetch, "videoId").as_string().as_deref(), Some("abc"));

        let off = session.handle_message(r#"{"type":"GOODTUBE_ADS_TOGGLE","enabled":false}"#);
        assert_eq!(kinds(&off), vec!["removeAdStyle"]);
        assert!(kinds(&session.handle_message("not a message")).is_empty());
    }

    #[wasm_bindgen_test]
    fn test_host_config_object() {
        let config = host_config();
        assert_eq!(get(&config, "adStyleId").as_string().as_deref(), Some("goodtube-ad-style"));
        assert_eq!(get(&config, "skipPollIntervalMs").as_f64(), Some(600.0));
    }
}
