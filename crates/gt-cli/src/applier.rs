use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use gt_core::types::BlockingRule;

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("Rule set of {count} rules exceeds the limit of {limit}")]
    TooManyRules { count: usize, limit: usize },
    #[error("Duplicate rule id {0}")]
    DuplicateId(u32),
    #[error("Failed to access rules file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid rules file '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Host-side dynamic rule store.
#[async_trait]
pub trait RuleApplier: Send + Sync {
    /// Remove every rule whose id is in `remove_ids`, then add `add_rules`.
    /// Either all of it happens or none of it does. Returns the number of
    /// rules active afterwards.
    async fn replace_rules(
        &self,
        remove_ids: &[u32],
        add_rules: Vec<BlockingRule>,
    ) -> Result<usize, ApplyError>;
}

/// Merge an update into `current` the way the host's rule store does.
pub fn merge_rule_update(
    current: Vec<BlockingRule>,
    remove_ids: &[u32],
    add_rules: Vec<BlockingRule>,
    limit: usize,
) -> Result<Vec<BlockingRule>, ApplyError> {
    let remove: HashSet<u32> = remove_ids.iter().copied().collect();

    let mut merged: Vec<BlockingRule> = current
        .into_iter()
        .filter(|rule| !remove.contains(&rule.id))
        .collect();
    merged.extend(add_rules);

    if merged.len() > limit {
        return Err(ApplyError::TooManyRules {
            count: merged.len(),
            limit,
        });
    }

    let mut ids = HashSet::with_capacity(merged.len());
    for rule in &merged {
        if !ids.insert(rule.id) {
            return Err(ApplyError::DuplicateId(rule.id));
        }
    }

    Ok(merged)
}

/// Keeps the active rule set in a JSON file, in the host's rule format.
pub struct JsonFileApplier {
    path: PathBuf,
    limit: usize,
}

impl JsonFileApplier {
    pub fn new(path: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            path: path.into(),
            limit,
        }
    }
}

/// Read a rules file; a missing file is an empty rule set.
pub fn load_rules(path: &Path) -> Result<Vec<BlockingRule>, ApplyError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ApplyError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_slice(&bytes).map_err(|source| ApplyError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `rules` next to `path` and rename into place.
pub fn write_rules(path: &Path, rules: &[BlockingRule]) -> Result<(), ApplyError> {
    let io_error = |source: io::Error| ApplyError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
    }

    let bytes = serde_json::to_vec_pretty(rules).map_err(|source| ApplyError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(io_error)?;
    fs::rename(&tmp, path).map_err(io_error)
}

#[async_trait]
impl RuleApplier for JsonFileApplier {
    async fn replace_rules(
        &self,
        remove_ids: &[u32],
        add_rules: Vec<BlockingRule>,
    ) -> Result<usize, ApplyError> {
        let current = load_rules(&self.path)?;
        let merged = merge_rule_update(current, remove_ids, add_rules, self.limit)?;
        write_rules(&self.path, &merged)?;
        Ok(merged.len())
    }
}
