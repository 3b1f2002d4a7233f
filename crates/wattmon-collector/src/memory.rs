use crate::Sampler;
use anyhow::Result;
use sysinfo::System;
use wattmon_common::record::NodeRecord;

const MB: f64 = 1024.0 * 1024.0;

pub struct MemorySampler {
    system: System,
}

impl MemorySampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for MemorySampler {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn sample(&mut self, record: &mut NodeRecord) -> Result<()> {
        self.system.refresh_memory();

        record.memory.memory_used = self.system.used_memory() as f64 / MB;
        // Reclaimable page cache, approximated as available minus free.
        let cached = self
            .system
            .available_memory()
            .saturating_sub(self.system.free_memory());
        record.memory.memory_cached = cached as f64 / MB;
        record.memory.swap_used = self.system.used_swap() as f64 / MB;
        // Active/inactive split, swap cache, paging and bandwidth rates all
        // come from kernel accounting this API does not surface; they stay
        // at the sentinel.
        Ok(())
    }
}
