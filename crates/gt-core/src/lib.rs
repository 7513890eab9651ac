//! GoodTube Core Library
//!
//! This crate holds the types and decision logic shared by the rule compiler,
//! the updater CLI and the WebAssembly bindings used by the browser extension.
//!
//! # Architecture
//!
//! The extension keeps a set of dynamic blocking rules regenerated from third-party
//! filter lists, plus page scripts that clean up ads and skip sponsor segments on the
//! video site. Everything that is a decision (which rules, when to update, what the
//! page script should do next) lives here; the host only executes the result.
//!
//! # Modules
//!
//! - `types`: Blocking rule records and resource-type sets
//! - `storage`: Flat key-value persistence (in-memory and JSON file)
//! - `settings`: User settings with storage fallback
//! - `message`: Closed tagged message types
//! - `schedule`: Update triggers and the elapsed-time decision
//! - `segments`: Sponsor segments and seek decisions
//! - `page`: Page-script controller driven by DOM and navigation events

pub mod message;
pub mod page;
pub mod schedule;
pub mod segments;
pub mod settings;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use message::{PageMessage, RuntimeMessage};
pub use page::{DomSnapshot, HostConfig, PageAction, PageController, PageEvent};
pub use schedule::{should_update, UpdateTrigger, UPDATE_INTERVAL_MS};
pub use segments::{SegmentSkipper, SponsorSegment};
pub use settings::{SettingKey, UserSettings};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore, StorageError};
pub use types::{
    BlockingRule, FilterSource, ResourceType, ResourceTypes, RuleAction, RuleCondition, MAX_RULES,
};
