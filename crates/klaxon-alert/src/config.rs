use serde::{Deserialize, Serialize};

/// Engine configuration, loaded from a TOML file. Every field has a
/// default, so an empty file (or a missing section) is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub id: IdConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

/// Snowflake generator identity. Each process needs a distinct
/// (machine_id, node_id) pair for ids to stay unique across processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdConfig {
    #[serde(default = "default_machine_id")]
    pub machine_id: i32,
    #[serde(default = "default_node_id")]
    pub node_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Concurrent per-id record fetches of one criteria query.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            machine_id: default_machine_id(),
            node_id: default_node_id(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

fn default_machine_id() -> i32 {
    1
}

fn default_node_id() -> i32 {
    1
}

fn default_fetch_concurrency() -> usize {
    8
}

impl EngineConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Applies the process-wide parts of the configuration. The `[query]`
    /// section is not process-wide: the caller threads it into the alerts
    /// service at construction, via
    /// `AlertsService::new(store).with_fetch_concurrency(config.query.fetch_concurrency)`.
    pub fn apply(&self) {
        klaxon_common::id::init(self.id.machine_id, self.id.node_id);
    }
}
