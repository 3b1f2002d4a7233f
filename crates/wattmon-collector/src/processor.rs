use crate::Sampler;
use anyhow::Result;
use sysinfo::System;
use wattmon_common::record::NodeRecord;

pub struct ProcessorSampler {
    system: System,
}

impl ProcessorSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self { system }
    }
}

impl Default for ProcessorSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for ProcessorSampler {
    fn name(&self) -> &'static str {
        "processor"
    }

    fn sample(&mut self, record: &mut NodeRecord) -> Result<()> {
        self.system.refresh_cpu_all();
        let cpus = self.system.cpus();
        if !cpus.is_empty() {
            let mhz: u64 = cpus.iter().map(|cpu| cpu.frequency()).sum();
            record.processor.frequency_relative = mhz as f64 / cpus.len() as f64;
        }
        // Time-in-state counters and the perf-counter fields (instructions,
        // cycles, cache events) need a counter source this sampler does not
        // bind; they stay at the sentinel.
        Ok(())
    }
}
