use crate::Sampler;
use anyhow::Result;
use sysinfo::{ProcessStatus, ProcessesToUpdate, System};
use wattmon_common::record::NodeRecord;

pub struct SystemSampler {
    system: System,
}

impl SystemSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SystemSampler {
    fn name(&self) -> &'static str {
        "system"
    }

    fn sample(&mut self, record: &mut NodeRecord) -> Result<()> {
        self.system
            .refresh_processes(ProcessesToUpdate::All, true);

        let mut running = 0i64;
        let mut blocked = 0i64;
        for process in self.system.processes().values() {
            match process.status() {
                ProcessStatus::Run => running += 1,
                ProcessStatus::UninterruptibleDiskSleep => blocked += 1,
                _ => {}
            }
        }

        record.system.processes_all = self.system.processes().len() as i64;
        record.system.processes_running = running;
        record.system.processes_blocked = blocked;
        // Context-switch and interrupt rates have no portable counter
        // source; they stay at the sentinel.
        Ok(())
    }
}
