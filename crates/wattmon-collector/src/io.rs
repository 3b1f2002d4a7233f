use crate::Sampler;
use anyhow::{anyhow, Result};
use std::time::Instant;
use sysinfo::{Pid, ProcessesToUpdate, System};
use wattmon_common::record::NodeRecord;

const MB: f64 = 1024.0 * 1024.0;

/// Byte rates for the one designated local process.
pub struct IoSampler {
    system: System,
    pid: Pid,
    last: Instant,
}

impl IoSampler {
    /// `watch_pid = None` follows the wattmon process itself.
    pub fn new(watch_pid: Option<u32>) -> Self {
        let pid = watch_pid.map(Pid::from_u32).unwrap_or_else(|| {
            sysinfo::get_current_pid().unwrap_or_else(|_| Pid::from_u32(std::process::id()))
        });
        Self {
            system: System::new(),
            pid,
            last: Instant::now(),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }
}

impl Sampler for IoSampler {
    fn name(&self) -> &'static str {
        "io"
    }

    fn sample(&mut self, record: &mut NodeRecord) -> Result<()> {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        let elapsed = self.last.elapsed().as_secs_f64();
        self.last = Instant::now();

        record.io.process_id = self.pid.as_u32() as i64;

        let process = self
            .system
            .process(self.pid)
            .ok_or_else(|| anyhow!("watched process {} not found", self.pid))?;

        if elapsed > 0.0 {
            let usage = process.disk_usage();
            record.io.data_read = usage.read_bytes as f64 / MB / elapsed;
            record.io.data_written = usage.written_bytes as f64 / MB / elapsed;
        }
        // Latencies and per-operation rates need block-layer accounting the
        // process API does not expose; they stay at the sentinel.
        Ok(())
    }
}
