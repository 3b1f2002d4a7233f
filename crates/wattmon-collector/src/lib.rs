//! Local metric sampling for the wattmon node.
//!
//! Each [`Sampler`] implementation fills one section of the per-round
//! [`NodeRecord`] (system, processor, I/O, memory, network, power) from the
//! `sysinfo` system APIs. The gather protocol treats the whole set as an
//! opaque collaborator: [`SamplerSet::sample_record`] always returns a
//! complete record, substituting the sentinel constants for anything that
//! could not be measured, so a local sampling failure never aborts a round.

pub mod io;
pub mod memory;
pub mod network;
pub mod power;
pub mod processor;
pub mod system;

use anyhow::Result;
use wattmon_common::record::NodeRecord;

pub use io::IoSampler;
pub use memory::MemorySampler;
pub use network::NetworkSampler;
pub use power::PowerSampler;
pub use processor::ProcessorSampler;
pub use system::SystemSampler;

/// A sampler for one section of the node record.
///
/// Implementations are run once per round in registration order. The record
/// starts out all-sentinel; a sampler writes only the fields it can measure.
///
/// # Errors
///
/// Returns an error if the underlying system API fails; the caller logs it
/// and leaves the sampler's fields at their sentinels.
pub trait Sampler: Send {
    /// Sampler name (e.g. `"system"`, `"network"`), used for logging.
    fn name(&self) -> &'static str;

    /// Fills this sampler's fields of `record` with current values.
    fn sample(&mut self, record: &mut NodeRecord) -> Result<()>;
}

/// The full sampler set for one node.
pub struct SamplerSet {
    samplers: Vec<Box<dyn Sampler>>,
}

impl SamplerSet {
    /// The production set: one sampler per record section. `watch_pid`
    /// designates the process the I/O sampler follows; `None` means this
    /// process.
    pub fn host_defaults(watch_pid: Option<u32>) -> Self {
        Self::from_samplers(vec![
            Box::new(SystemSampler::new()),
            Box::new(ProcessorSampler::new()),
            Box::new(IoSampler::new(watch_pid)),
            Box::new(MemorySampler::new()),
            Box::new(NetworkSampler::new()),
            Box::new(PowerSampler::new()),
        ])
    }

    pub fn from_samplers(samplers: Vec<Box<dyn Sampler>>) -> Self {
        Self { samplers }
    }

    /// Produces this node's record for the current tick. Never fails: a
    /// sampler error is logged and its section rides as sentinels.
    pub fn sample_record(&mut self) -> NodeRecord {
        let mut record = NodeRecord::unmeasured();
        for sampler in &mut self.samplers {
            if let Err(e) = sampler.sample(&mut record) {
                tracing::warn!(
                    sampler = sampler.name(),
                    error = %e,
                    "sampling failed, fields stay unmeasured"
                );
            }
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wattmon_common::record::{UNMEASURED, UNMEASURED_COUNT};

    struct FailingSampler;

    impl Sampler for FailingSampler {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn sample(&mut self, _record: &mut NodeRecord) -> Result<()> {
            anyhow::bail!("no counter source")
        }
    }

    struct MarkerSampler;

    impl Sampler for MarkerSampler {
        fn name(&self) -> &'static str {
            "marker"
        }

        fn sample(&mut self, record: &mut NodeRecord) -> Result<()> {
            record.system.processes_all = 7;
            Ok(())
        }
    }

    #[test]
    fn failing_sampler_leaves_sentinels_and_the_round_continues() {
        let mut set =
            SamplerSet::from_samplers(vec![Box::new(FailingSampler), Box::new(MarkerSampler)]);
        let record = set.sample_record();
        assert_eq!(record.system.processes_all, 7);
        assert_eq!(record.system.context_switch_rate, UNMEASURED_COUNT);
        assert_eq!(record.power.cores_power, UNMEASURED);
    }

    #[test]
    fn host_defaults_produce_a_complete_record() {
        let mut set = SamplerSet::host_defaults(None);
        let record = set.sample_record();
        // Power measurement is out of scope on every platform; the section
        // must ride as sentinels rather than disappear.
        assert_eq!(record.power.system_power, UNMEASURED);
        // The I/O sampler watches this process by default.
        assert_eq!(record.io.process_id, std::process::id() as i64);
    }
}
