//! Core type definitions for GoodTube
//!
//! These types map directly to the host content-blocking API's dynamic rule
//! schema and are what the compiler emits and the applier installs.

use std::collections::HashSet;

use serde::de::Deserializer;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Maximum number of dynamic rules the host accepts at once.
pub const MAX_RULES: usize = 30_000;

/// Priority given to every generated rule.
pub const RULE_PRIORITY: u32 = 1;

/// Storage key holding the epoch-millisecond time of the last successful apply.
pub const LAST_UPDATE_KEY: &str = "goodtube_rules_last_update";

// =============================================================================
// Filter Sources
// =============================================================================

/// One remote filter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FilterSource {
    pub name: String,
    pub url: String,
}

impl FilterSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// The lists rules are generated from unless configured otherwise.
pub fn default_sources() -> Vec<FilterSource> {
    vec![
        FilterSource::new(
            "EasyList",
            "https://raw.githubusercontent.com/easylist/easylist/master/easylist/easylist_general_block.txt",
        ),
        FilterSource::new(
            "AdGuard",
            "https://raw.githubusercontent.com/AdguardTeam/AdguardFilters/master/BaseFilter/sections/adservers.txt",
        ),
        FilterSource::new(
            "uBlock",
            "https://raw.githubusercontent.com/uBlockOrigin/uAssets/master/filters/filters.txt",
        ),
    ]
}

// =============================================================================
// Rule Actions
// =============================================================================

/// Action to take for a matched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "lowercase")]
#[ts(export)]
pub enum RuleAction {
    /// Cancel the request
    Block,
}

// =============================================================================
// Resource Types
// =============================================================================

/// Resource type names understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Font,
    Object,
    Xmlhttprequest,
    Ping,
    CspReport,
    Media,
    Websocket,
    Other,
}

impl ResourceType {
    /// All resource types in host declaration order.
    pub const ALL: [ResourceType; 13] = [
        Self::MainFrame,
        Self::SubFrame,
        Self::Stylesheet,
        Self::Script,
        Self::Image,
        Self::Font,
        Self::Object,
        Self::Xmlhttprequest,
        Self::Ping,
        Self::CspReport,
        Self::Media,
        Self::Websocket,
        Self::Other,
    ];

    fn flag(self) -> ResourceTypes {
        match self {
            Self::MainFrame => ResourceTypes::MAIN_FRAME,
            Self::SubFrame => ResourceTypes::SUB_FRAME,
            Self::Stylesheet => ResourceTypes::STYLESHEET,
            Self::Script => ResourceTypes::SCRIPT,
            Self::Image => ResourceTypes::IMAGE,
            Self::Font => ResourceTypes::FONT,
            Self::Object => ResourceTypes::OBJECT,
            Self::Xmlhttprequest => ResourceTypes::XMLHTTPREQUEST,
            Self::Ping => ResourceTypes::PING,
            Self::CspReport => ResourceTypes::CSP_REPORT,
            Self::Media => ResourceTypes::MEDIA,
            Self::Websocket => ResourceTypes::WEBSOCKET,
            Self::Other => ResourceTypes::OTHER,
        }
    }
}

bitflags::bitflags! {
    /// Resource type bit mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceTypes: u16 {
        const MAIN_FRAME = 1 << 0;
        const SUB_FRAME = 1 << 1;
        const STYLESHEET = 1 << 2;
        const SCRIPT = 1 << 3;
        const IMAGE = 1 << 4;
        const FONT = 1 << 5;
        const OBJECT = 1 << 6;
        const XMLHTTPREQUEST = 1 << 7;
        const PING = 1 << 8;
        const CSP_REPORT = 1 << 9;
        const MEDIA = 1 << 10;
        const WEBSOCKET = 1 << 11;
        const OTHER = 1 << 12;

        /// Types every generated rule applies to
        const BLOCKED = Self::MAIN_FRAME.bits()
            | Self::SUB_FRAME.bits()
            | Self::SCRIPT.bits()
            | Self::IMAGE.bits()
            | Self::XMLHTTPREQUEST.bits()
            | Self::MEDIA.bits()
            | Self::OTHER.bits();
    }
}

impl ResourceTypes {
    /// Member types in host declaration order.
    pub fn types(self) -> Vec<ResourceType> {
        ResourceType::ALL
            .into_iter()
            .filter(|ty| self.contains(ty.flag()))
            .collect()
    }
}

impl FromIterator<ResourceType> for ResourceTypes {
    fn from_iter<I: IntoIterator<Item = ResourceType>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ResourceTypes::empty(), |acc, ty| acc | ty.flag())
    }
}

impl Serialize for ResourceTypes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let types = self.types();
        let mut seq = serializer.serialize_seq(Some(types.len()))?;
        for ty in &types {
            seq.serialize_element(ty)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for ResourceTypes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let types = Vec::<ResourceType>::deserialize(deserializer)?;
        Ok(types.into_iter().collect())
    }
}

// =============================================================================
// Blocking Rules
// =============================================================================

/// Request condition of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RuleCondition {
    /// Glob pattern (`*fragment*`) matched against the request URL
    pub url_filter: String,
    #[ts(as = "Vec<ResourceType>")]
    pub resource_types: ResourceTypes,
}

/// One dynamic blocking rule as accepted by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BlockingRule {
    pub id: u32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

impl BlockingRule {
    /// Block rule for `url_filter` with the fixed priority and resource types.
    pub fn block(id: u32, url_filter: impl Into<String>) -> Self {
        Self {
            id,
            priority: RULE_PRIORITY,
            action: RuleAction::Block,
            condition: RuleCondition {
                url_filter: url_filter.into(),
                resource_types: ResourceTypes::BLOCKED,
            },
        }
    }
}

/// Ids covering every slot a rule set may occupy, `1..=max`.
pub fn rule_ids_up_to(max: usize) -> Vec<u32> {
    (1..=max as u32).collect()
}

// =============================================================================
// Rule Set Validation
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleSetError {
    #[error("Rule count {count} exceeds maximum {max}")]
    TooManyRules { count: usize, max: usize },
    #[error("Rule at position {position} has id {id}, expected {expected}")]
    NonContiguousId { position: usize, id: u32, expected: u32 },
    #[error("Duplicate url filter '{0}'")]
    DuplicateFilter(String),
    #[error("Rule {0} has an empty url filter")]
    EmptyFilter(u32),
}

/// Check that a generated rule set has dense 1-based ids, unique filters and
/// respects `max`.
pub fn validate_rule_set(rules: &[BlockingRule], max: usize) -> Result<(), RuleSetError> {
    if rules.len() > max {
        return Err(RuleSetError::TooManyRules {
            count: rules.len(),
            max,
        });
    }

    let mut seen = HashSet::with_capacity(rules.len());
    for (position, rule) in rules.iter().enumerate() {
        let expected = position as u32 + 1;
        if rule.id != expected {
            return Err(RuleSetError::NonContiguousId {
                position,
                id: rule.id,
                expected,
            });
        }
        if rule.condition.url_filter.is_empty() {
            return Err(RuleSetError::EmptyFilter(rule.id));
        }
        if !seen.insert(rule.condition.url_filter.as_str()) {
            return Err(RuleSetError::DuplicateFilter(rule.condition.url_filter.clone()));
        }
    }

    Ok(())
}
