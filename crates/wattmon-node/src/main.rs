use anyhow::Result;
use chrono::Utc;
use tracing_subscriber::EnvFilter;

use wattmon_collector::SamplerSet;
use wattmon_node::config::NodeConfig;
use wattmon_node::context::ClusterContext;
use wattmon_node::scheduler::{BatchScheduler, ScheduleOptions};
use wattmon_node::sink::SnapshotLog;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("wattmon=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/node.toml".to_string());
    let config = NodeConfig::load(&config_path)?;
    tracing::info!(
        rank = config.rank,
        size = config.members.len(),
        "wattmon-node starting"
    );

    let ctx = ClusterContext::establish(&config.group_config()?).await?;
    let samplers = SamplerSet::host_defaults(config.watch_pid);
    let log = SnapshotLog::new(&config.output_dir, config.output_mode, Utc::now());
    let scheduler = BatchScheduler::new(
        ctx,
        samplers,
        log,
        ScheduleOptions {
            interval: config.poll_interval(),
            rounds: config.rounds,
            recv_timeout: config.recv_timeout(),
            watch_pid: config.watch_pid,
        },
    );

    let report = scheduler.run().await?;
    if let Some(path) = &report.output {
        tracing::info!(
            rounds = report.log.len(),
            path = %path.display(),
            "run document written"
        );
    }
    tracing::info!(outcome = ?report.outcome, "wattmon-node finished");
    Ok(())
}
