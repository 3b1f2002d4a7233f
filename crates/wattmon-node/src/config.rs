use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context as _;
use wattmon_group::GroupConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// This process's position in the group; 0 is the coordinator.
    pub rank: u32,
    /// One address per rank, in rank order. The list length is the group
    /// size; only the first entry is ever dialed.
    pub members: Vec<String>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Bounded round count; absent means run until stopped.
    pub rounds: Option<u64>,
    #[serde(default = "default_recv_timeout_secs")]
    pub recv_timeout_secs: u64,
    #[serde(default = "default_join_timeout_secs")]
    pub join_timeout_secs: u64,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub output_mode: OutputMode,
    /// Stop the run once this process disappears (checked on the
    /// coordinator, between rounds). Also the process the I/O sampler
    /// follows; absent means the wattmon process itself.
    pub watch_pid: Option<u32>,
}

/// How round documents reach disk: one bulk array at run end, or one JSON
/// line appended per round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Batch,
    Stream,
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_recv_timeout_secs() -> u64 {
    10
}

fn default_join_timeout_secs() -> u64 {
    30
}

fn default_output_dir() -> String {
    ".".to_string()
}

impl NodeConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path}"))?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn group_config(&self) -> anyhow::Result<GroupConfig> {
        let members = self
            .members
            .iter()
            .map(|member| {
                member
                    .parse::<SocketAddr>()
                    .with_context(|| format!("bad member address '{member}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(GroupConfig {
            rank: self.rank,
            members,
            join_timeout: Duration::from_secs(self.join_timeout_secs),
            recv_timeout: Duration::from_secs(self.recv_timeout_secs),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_secs(self.recv_timeout_secs)
    }
}
