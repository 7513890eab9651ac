//! Tagged messages exchanged between the extension's parts.
//!
//! The wire form is a JSON object whose `type` field names the variant, as the
//! extension runtime and `window.postMessage` carry them.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Messages sent to the background updater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type")]
#[ts(export)]
pub enum RuntimeMessage {
    /// Rebuild and apply the rules now, regardless of the last update time
    #[serde(rename = "GOODTUBE_FORCE_UPDATE")]
    ForceUpdate,
}

/// Messages posted from the content script to the injected page scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type")]
#[ts(export)]
pub enum PageMessage {
    #[serde(rename = "GOODTUBE_ADS_TOGGLE")]
    AdsToggle { enabled: bool },
    #[serde(rename = "GOODTUBE_SKIP_TOGGLE")]
    SkipToggle { enabled: bool },
}

impl RuntimeMessage {
    /// Parse a runtime message; anything unrecognised is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text.trim()).ok()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl PageMessage {
    /// Parse a page message; anything unrecognised is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text.trim()).ok()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
