use crate::Sampler;
use anyhow::Result;
use wattmon_common::record::NodeRecord;

/// Power draw sampler.
///
/// Hardware power measurement (RAPL counters, accelerator management
/// libraries) is out of scope for this node; the whole section rides as
/// sentinels so the record shape stays identical across the group.
pub struct PowerSampler {
    reported: bool,
}

impl PowerSampler {
    pub fn new() -> Self {
        Self { reported: false }
    }
}

impl Default for PowerSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for PowerSampler {
    fn name(&self) -> &'static str {
        "power"
    }

    fn sample(&mut self, _record: &mut NodeRecord) -> Result<()> {
        if !self.reported {
            tracing::debug!("no power measurement source bound, power fields stay unmeasured");
            self.reported = true;
        }
        Ok(())
    }
}
