use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::{signal, time};
use wattmon_collector::SamplerSet;
use wattmon_common::snapshot::RoundDocument;
use wattmon_group::Directive;

use crate::context::ClusterContext;
use crate::sink::SnapshotLog;

/// Scheduler lifecycle. `Running` loops while no stop condition holds;
/// reaching the configured round bound completes the run, an operator
/// interrupt or watched-process exit stops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Stopped,
    Completed,
}

/// How a run ended. Workers always report `Stopped`: the Stop directive
/// carries no reason, only the coordinator knows which condition fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Stopped,
    Completed,
}

#[derive(Debug, Clone)]
pub struct ScheduleOptions {
    /// Fixed inter-round delay.
    pub interval: Duration,
    /// Bounded round count; `None` runs until stopped.
    pub rounds: Option<u64>,
    /// Per-receive window before an unresponsive rank is substituted.
    pub recv_timeout: Duration,
    /// Stop once this process disappears (coordinator only).
    pub watch_pid: Option<u32>,
}

/// What a finished run leaves behind.
pub struct RunReport {
    pub outcome: RunOutcome,
    pub log: SnapshotLog,
    pub output: Option<PathBuf>,
}

/// Drives a bounded or unbounded sequence of gather rounds.
///
/// Stop conditions are checked on the coordinator only, between rounds;
/// every decision reaches the workers as the next round's directive, so all
/// ranks terminate together. Workers hold no timer of their own; they are
/// paced entirely by the coordinator's control frames.
pub struct BatchScheduler {
    ctx: ClusterContext,
    samplers: SamplerSet,
    log: SnapshotLog,
    options: ScheduleOptions,
    state: RunState,
}

struct WatchedProcess {
    system: System,
    pid: Pid,
}

impl WatchedProcess {
    fn new(pid: u32) -> Self {
        Self {
            system: System::new(),
            pid: Pid::from_u32(pid),
        }
    }

    fn is_alive(&mut self) -> bool {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        self.system.process(self.pid).is_some()
    }
}

impl BatchScheduler {
    pub fn new(
        ctx: ClusterContext,
        samplers: SamplerSet,
        log: SnapshotLog,
        options: ScheduleOptions,
    ) -> Self {
        Self {
            ctx,
            samplers,
            log,
            options,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Runs to completion, then leaves the group and flushes the log. A
    /// document write failure is reported, never fatal; the documents stay
    /// in the returned report.
    pub async fn run(mut self) -> anyhow::Result<RunReport> {
        self.state = RunState::Running;
        let outcome = if self.ctx.is_coordinator() {
            self.run_coordinator().await?
        } else {
            self.run_worker().await?
        };
        self.state = match outcome {
            RunOutcome::Stopped => RunState::Stopped,
            RunOutcome::Completed => RunState::Completed,
        };

        let BatchScheduler { ctx, mut log, .. } = self;
        ctx.shutdown().await?;
        let output = match log.finish() {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(error = %e, "run document write failed, documents retained in memory");
                None
            }
        };
        Ok(RunReport {
            outcome,
            log,
            output,
        })
    }

    async fn run_coordinator(&mut self) -> anyhow::Result<RunOutcome> {
        let mut watch = self.options.watch_pid.map(WatchedProcess::new);
        let mut interrupted = false;
        let mut round: u64 = 0;

        loop {
            if let Some(limit) = self.options.rounds {
                if round >= limit {
                    tracing::info!(rounds = limit, "configured round count reached");
                    self.ctx.group.begin_round(round, Directive::Stop).await?;
                    return Ok(RunOutcome::Completed);
                }
            }
            if interrupted {
                self.ctx.group.begin_round(round, Directive::Stop).await?;
                return Ok(RunOutcome::Stopped);
            }
            if let Some(watched) = watch.as_mut() {
                if !watched.is_alive() {
                    tracing::info!(pid = watched.pid.as_u32(), "watched process gone, stopping");
                    self.ctx.group.begin_round(round, Directive::Stop).await?;
                    return Ok(RunOutcome::Stopped);
                }
            }

            self.ctx
                .group
                .begin_round(round, Directive::Continue)
                .await?;
            let timestamp = Utc::now();
            let own = self.samplers.sample_record();
            let snapshot = self
                .ctx
                .group
                .gather(own, timestamp, &self.ctx.schema, self.options.recv_timeout)
                .await?;
            self.log.push(RoundDocument::from_snapshot(&snapshot));
            tracing::debug!(round, nodes = snapshot.len(), "round recorded");
            round += 1;

            tokio::select! {
                _ = time::sleep(self.options.interval) => {}
                _ = signal::ctrl_c() => {
                    tracing::info!("interrupt received, stopping");
                    interrupted = true;
                }
            }
        }
    }

    async fn run_worker(&mut self) -> anyhow::Result<RunOutcome> {
        loop {
            let (round, directive) = self.ctx.group.await_directive().await?;
            if directive == Directive::Stop {
                tracing::info!(round, "stop directive received");
                return Ok(RunOutcome::Stopped);
            }
            let record = self.samplers.sample_record();
            self.ctx
                .group
                .send_record(&record, &self.ctx.schema)
                .await?;
        }
    }
}
