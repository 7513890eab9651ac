//! Page-script controller.
//!
//! The host feeds DOM and navigation events in; the controller answers with the
//! actions to perform. All script lifecycle state lives in one `PageController`
//! rather than in page globals, and `start`/`stop` can be called any number of
//! times.

use serde::Serialize;
use ts_rs::TS;

use crate::message::PageMessage;
use crate::segments::SKIP_POLL_INTERVAL_MS;
use crate::settings::UserSettings;

/// How long element lookups wait before giving up.
pub const ELEMENT_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Selectors hidden by the injected stylesheet.
pub const AD_HIDE_SELECTORS: &[&str] = &[
    "ytd-display-ad-renderer",
    "ytd-ad-slot-renderer",
    "ytd-player-legacy-desktop-watch-ads-renderer",
    ".ytp-ad-module",
    ".ytp-ad-overlay-slot",
    ".ytp-ad-player-overlay",
    ".ytp-ad-text-overlay",
    "#player-ads",
    "#masthead-ad",
    ".ytd-promoted-sparkles-text-search-renderer",
    ".ytd-companion-slot-renderer",
    "ytd-promoted-video-renderer",
    "ytd-promoted-sparkles-web-renderer",
    "ytd-rich-item-renderer:has(ytd-promoted-sparkles-web-renderer)",
    "ytd-rich-section-renderer:has(ytd-promoted-sparkles-web-renderer)",
    "ytd-action-companion-ad-renderer",
    "#ad_creative_3",
    "#ad_creative_4",
];

/// Selectors whose elements are removed outright on every DOM change.
pub const AD_REMOVE_SELECTORS: &[&str] = &[
    "ytd-display-ad-renderer",
    ".ytp-ad-module",
    ".ytp-ad-player-overlay",
    ".ytp-ad-overlay-slot",
    ".ytp-ad-text-overlay",
    ".video-ads",
    "ytd-promoted-video-renderer",
];

pub const SKIP_BUTTON_SELECTOR: &str = ".ytp-ad-skip-button, .ytp-ad-overlay-close-button";
pub const AD_SHOWING_SELECTOR: &str = ".ad-showing";
pub const SHORTS_LINK_SELECTOR: &str = "a[href*=\"/shorts/\"]";
pub const SHORTS_CONTAINER_SELECTOR: &str =
    "ytd-rich-grid-media, ytd-video-renderer, ytd-compact-video-renderer";
pub const AD_STYLE_ID: &str = "goodtube-ad-style";

/// Stylesheet text that hides every ad selector.
pub fn ad_block_css() -> String {
    let mut css = AD_HIDE_SELECTORS.join(",\n");
    css.push_str(" {\n  display: none !important;\n");
    css.push_str("  visibility: hidden !important;\n  opacity: 0 !important;\n}\n");
    css
}

/// Selectors and timings the host needs to carry out `PageAction`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HostConfig {
    /// `id` of the `<style>` element added by `InjectAdStyle`
    pub ad_style_id: String,
    /// `querySelectorAll` list for `RemoveAdElements`
    pub ad_remove_selector: String,
    pub skip_button_selector: String,
    pub ad_showing_selector: String,
    /// Links whose container `HideShorts` hides
    pub shorts_link_selector: String,
    pub shorts_container_selector: String,
    pub element_wait_timeout_ms: u32,
    pub skip_poll_interval_ms: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            ad_style_id: AD_STYLE_ID.to_string(),
            ad_remove_selector: AD_REMOVE_SELECTORS.join(", "),
            skip_button_selector: SKIP_BUTTON_SELECTOR.to_string(),
            ad_showing_selector: AD_SHOWING_SELECTOR.to_string(),
            shorts_link_selector: SHORTS_LINK_SELECTOR.to_string(),
            shorts_container_selector: SHORTS_CONTAINER_SELECTOR.to_string(),
            element_wait_timeout_ms: ELEMENT_WAIT_TIMEOUT_MS as u32,
            skip_poll_interval_ms: SKIP_POLL_INTERVAL_MS as u32,
        }
    }
}

// =============================================================================
// Events and actions
// =============================================================================

/// What the host observed when the DOM changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomSnapshot {
    pub has_video: bool,
    pub ad_showing: bool,
    pub skip_button_visible: bool,
    /// `v` parameter of the current page, if any
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    DomChanged(DomSnapshot),
    NavigationStarted,
    NavigationFinished,
    Message(PageMessage),
}

/// Work for the host to carry out, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "kind", rename_all = "camelCase")]
#[ts(export)]
pub enum PageAction {
    /// Add the `ad_block_css` stylesheet
    InjectAdStyle,
    RemoveAdStyle,
    /// Remove elements matching `AD_REMOVE_SELECTORS`
    RemoveAdElements,
    HideShorts,
    ClickSkipButton,
    /// Mute and seek a playing ad to its end
    FastForwardAd,
    FetchSegments {
        #[serde(rename = "videoId")]
        video_id: String,
    },
    StopSegmentPolling,
}

// =============================================================================
// Controller
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageScript {
    AdCleaner,
    SkipIntro,
}

#[derive(Debug, Clone)]
pub struct PageController {
    settings: UserSettings,
    ad_cleaner: Lifecycle,
    skip_intro: Lifecycle,
    /// Video whose segments were already requested on this page
    segments_requested: Option<String>,
}

impl PageController {
    pub fn new(settings: UserSettings) -> Self {
        Self {
            settings,
            ad_cleaner: Lifecycle::Stopped,
            skip_intro: Lifecycle::Stopped,
            segments_requested: None,
        }
    }

    pub fn settings(&self) -> UserSettings {
        self.settings
    }

    pub fn lifecycle(&self, script: PageScript) -> Lifecycle {
        match script {
            PageScript::AdCleaner => self.ad_cleaner,
            PageScript::SkipIntro => self.skip_intro,
        }
    }

    pub fn is_running(&self) -> bool {
        self.ad_cleaner == Lifecycle::Running || self.skip_intro == Lifecycle::Running
    }

    /// Start every script the settings allow. Already running scripts are left
    /// alone.
    pub fn start(&mut self) -> Vec<PageAction> {
        let actions = self.start_ad_cleaner();
        if self.settings.skip_intro {
            self.skip_intro = Lifecycle::Running;
        }
        actions
    }

    /// Stop every running script.
    pub fn stop(&mut self) -> Vec<PageAction> {
        let mut actions = self.stop_skip_intro();
        if self.ad_cleaner == Lifecycle::Running {
            self.ad_cleaner = Lifecycle::Stopped;
            if self.settings.hide_ads {
                actions.push(PageAction::RemoveAdStyle);
            }
        }
        actions
    }

    pub fn handle(&mut self, event: PageEvent) -> Vec<PageAction> {
        match event {
            PageEvent::DomChanged(snapshot) => self.reconcile(&snapshot),
            PageEvent::NavigationStarted => {
                let mut actions = Vec::new();
                if self.skip_intro == Lifecycle::Running {
                    actions.push(PageAction::StopSegmentPolling);
                }
                self.segments_requested = None;
                actions
            }
            PageEvent::NavigationFinished => {
                if self.cleaning_ads() {
                    vec![PageAction::RemoveAdElements, PageAction::HideShorts]
                } else {
                    Vec::new()
                }
            }
            PageEvent::Message(message) => self.apply_message(message),
        }
    }

    fn cleaning_ads(&self) -> bool {
        self.ad_cleaner == Lifecycle::Running && self.settings.hide_ads
    }

    fn start_ad_cleaner(&mut self) -> Vec<PageAction> {
        if self.ad_cleaner == Lifecycle::Running {
            return Vec::new();
        }
        self.ad_cleaner = Lifecycle::Running;
        if self.settings.hide_ads {
            vec![PageAction::InjectAdStyle]
        } else {
            Vec::new()
        }
    }

    fn stop_skip_intro(&mut self) -> Vec<PageAction> {
        if self.skip_intro != Lifecycle::Running {
            return Vec::new();
        }
        self.skip_intro = Lifecycle::Stopped;
        self.segments_requested = None;
        vec![PageAction::StopSegmentPolling]
    }

    fn apply_message(&mut self, message: PageMessage) -> Vec<PageAction> {
        match message {
            PageMessage::AdsToggle { enabled } => {
                if self.settings.hide_ads == enabled {
                    return Vec::new();
                }
                self.settings.hide_ads = enabled;
                match (self.ad_cleaner, enabled) {
                    (Lifecycle::Running, true) => {
                        vec![PageAction::InjectAdStyle, PageAction::RemoveAdElements]
                    }
                    (Lifecycle::Running, false) => vec![PageAction::RemoveAdStyle],
                    (Lifecycle::Stopped, _) => Vec::new(),
                }
            }
            PageMessage::SkipToggle { enabled } => {
                self.settings.skip_intro = enabled;
                if !enabled {
                    return self.stop_skip_intro();
                }
                if self.ad_cleaner == Lifecycle::Running {
                    self.skip_intro = Lifecycle::Running;
                }
                Vec::new()
            }
        }
    }

    fn reconcile(&mut self, snapshot: &DomSnapshot) -> Vec<PageAction> {
        let mut actions = Vec::new();

        if self.cleaning_ads() {
            actions.push(PageAction::RemoveAdElements);
            actions.push(PageAction::HideShorts);
            if snapshot.skip_button_visible {
                actions.push(PageAction::ClickSkipButton);
            }
            if snapshot.has_video && snapshot.ad_showing {
                actions.push(PageAction::FastForwardAd);
            }
        }

        if self.skip_intro == Lifecycle::Running && self.settings.skip_intro && snapshot.has_video {
            if let Some(video_id) = &snapshot.video_id {
                if self.segments_requested.as_ref() != Some(video_id) {
                    self.segments_requested = Some(video_id.clone());
                    actions.push(PageAction::FetchSegments {
                        video_id: video_id.clone(),
                    });
                }
            }
        }

        actions
    }
}
