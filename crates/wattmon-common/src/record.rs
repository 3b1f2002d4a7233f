use serde::{Deserialize, Serialize};

/// Sentinel for an unmeasured float field.
///
/// Every field of a [`NodeRecord`] is always present; a source that cannot
/// measure a field reports this constant instead of omitting the field.
/// Consumers must compare against the sentinel, never test for absence.
///
/// # Examples
///
/// ```
/// use wattmon_common::record::{MemorySample, UNMEASURED};
///
/// let mem = MemorySample::unmeasured();
/// assert_eq!(mem.page_fault_rate, UNMEASURED);
/// ```
pub const UNMEASURED: f64 = -666.0;

/// Sentinel for an unmeasured integer counter.
pub const UNMEASURED_COUNT: i64 = -666;

/// Sentinel for the one unsigned energy counter, where the negative family
/// is unrepresentable.
pub const UNMEASURED_ENERGY: u64 = u64::MAX;

/// Process scheduler and interrupt counters for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSample {
    pub processes_running: i64,
    pub processes_all: i64,
    pub processes_blocked: i64,
    pub context_switch_rate: i64,
    pub interrupt_rate: i64,
}

/// CPU time-in-state counters plus cache and frequency figures.
///
/// The perf-counter sourced fields (instructions, cycles, cache events) ride
/// as sentinels on hosts without a counter source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorSample {
    pub time_user: i64,
    pub time_nice: i64,
    pub time_system: i64,
    pub time_idle: i64,
    pub time_io_wait: i64,
    pub time_irq: i64,
    pub time_soft_irq: i64,
    pub time_steal: i64,
    pub time_guest: i64,
    pub instructions_retired: i64,
    pub cycles: i64,
    pub frequency_relative: f64,
    pub unhalted_frequency: f64,
    pub cache_l2_requests: i64,
    pub cache_l2_misses: i64,
    pub cache_llc_loads: i64,
    pub cache_llc_stores: i64,
    pub cache_llc_load_misses: i64,
    pub cache_llc_load_miss_rate: f64,
    pub cache_llc_store_misses: i64,
    pub cache_llc_store_miss_rate: f64,
}

/// I/O rates and latencies for the one designated local process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IoSample {
    pub process_id: i64,
    pub data_read: f64,
    pub read_time: f64,
    pub read_operations_rate: f64,
    pub data_written: f64,
    pub write_time: f64,
    pub write_operations_rate: f64,
    pub flush_time: f64,
    pub flush_operations_rate: f64,
}

/// Memory, swap and paging figures, in MB and events per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySample {
    pub memory_used: f64,
    pub memory_cached: f64,
    pub swap_used: f64,
    pub swap_cached: f64,
    pub memory_active: f64,
    pub memory_inactive: f64,
    pub page_in_rate: f64,
    pub page_out_rate: f64,
    pub page_fault_rate: f64,
    pub page_faults_major_rate: f64,
    pub page_free_rate: f64,
    pub page_activate_rate: f64,
    pub page_deactivate_rate: f64,
    pub memory_read_rate: f64,
    pub memory_write_rate: f64,
    pub memory_io_rate: f64,
}

/// Packet counters and throughput rates across all interfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSample {
    pub packets_received: i64,
    pub receive_rate: f64,
    pub packets_sent: i64,
    pub send_rate: f64,
}

/// Power draw for the CPU domains and the optional accelerator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerSample {
    pub cores_power: f64,
    pub processor_power: f64,
    pub memory_power: f64,
    pub system_power: f64,
    pub gpu_power: f64,
    pub gpu_energy_total: u64,
    pub gpu_temperature: f64,
    pub gpu_fan_speed: f64,
    pub gpu_memory_total: f64,
    pub gpu_memory_used: f64,
    pub gpu_memory_free: f64,
    pub gpu_clock_sm: f64,
    pub gpu_clock_memory: f64,
}

/// One node's complete metric sample for one polling tick.
///
/// Field count and order are identical on every node, which is what lets a
/// single composite wire schema describe every node's message. A record is
/// created fresh each round, sent once, and discarded once the round's
/// document is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(rename = "systemMetrics")]
    pub system: SystemSample,
    #[serde(rename = "processorMetrics")]
    pub processor: ProcessorSample,
    #[serde(rename = "inputOutputMetrics")]
    pub io: IoSample,
    #[serde(rename = "memoryMetrics")]
    pub memory: MemorySample,
    #[serde(rename = "networkMetrics")]
    pub network: NetworkSample,
    #[serde(rename = "powerMetrics")]
    pub power: PowerSample,
}

impl SystemSample {
    pub fn unmeasured() -> Self {
        Self {
            processes_running: UNMEASURED_COUNT,
            processes_all: UNMEASURED_COUNT,
            processes_blocked: UNMEASURED_COUNT,
            context_switch_rate: UNMEASURED_COUNT,
            interrupt_rate: UNMEASURED_COUNT,
        }
    }
}

impl ProcessorSample {
    pub fn unmeasured() -> Self {
        Self {
            time_user: UNMEASURED_COUNT,
            time_nice: UNMEASURED_COUNT,
            time_system: UNMEASURED_COUNT,
            time_idle: UNMEASURED_COUNT,
            time_io_wait: UNMEASURED_COUNT,
            time_irq: UNMEASURED_COUNT,
            time_soft_irq: UNMEASURED_COUNT,
            time_steal: UNMEASURED_COUNT,
            time_guest: UNMEASURED_COUNT,
            instructions_retired: UNMEASURED_COUNT,
            cycles: UNMEASURED_COUNT,
            frequency_relative: UNMEASURED,
            unhalted_frequency: UNMEASURED,
            cache_l2_requests: UNMEASURED_COUNT,
            cache_l2_misses: UNMEASURED_COUNT,
            cache_llc_loads: UNMEASURED_COUNT,
            cache_llc_stores: UNMEASURED_COUNT,
            cache_llc_load_misses: UNMEASURED_COUNT,
            cache_llc_load_miss_rate: UNMEASURED,
            cache_llc_store_misses: UNMEASURED_COUNT,
            cache_llc_store_miss_rate: UNMEASURED,
        }
    }
}

impl IoSample {
    pub fn unmeasured() -> Self {
        Self {
            process_id: UNMEASURED_COUNT,
            data_read: UNMEASURED,
            read_time: UNMEASURED,
            read_operations_rate: UNMEASURED,
            data_written: UNMEASURED,
            write_time: UNMEASURED,
            write_operations_rate: UNMEASURED,
            flush_time: UNMEASURED,
            flush_operations_rate: UNMEASURED,
        }
    }
}

impl MemorySample {
    pub fn unmeasured() -> Self {
        Self {
            memory_used: UNMEASURED,
            memory_cached: UNMEASURED,
            swap_used: UNMEASURED,
            swap_cached: UNMEASURED,
            memory_active: UNMEASURED,
            memory_inactive: UNMEASURED,
            page_in_rate: UNMEASURED,
            page_out_rate: UNMEASURED,
            page_fault_rate: UNMEASURED,
            page_faults_major_rate: UNMEASURED,
            page_free_rate: UNMEASURED,
            page_activate_rate: UNMEASURED,
            page_deactivate_rate: UNMEASURED,
            memory_read_rate: UNMEASURED,
            memory_write_rate: UNMEASURED,
            memory_io_rate: UNMEASURED,
        }
    }
}

impl NetworkSample {
    pub fn unmeasured() -> Self {
        Self {
            packets_received: UNMEASURED_COUNT,
            receive_rate: UNMEASURED,
            packets_sent: UNMEASURED_COUNT,
            send_rate: UNMEASURED,
        }
    }
}

impl PowerSample {
    pub fn unmeasured() -> Self {
        Self {
            cores_power: UNMEASURED,
            processor_power: UNMEASURED,
            memory_power: UNMEASURED,
            system_power: UNMEASURED,
            gpu_power: UNMEASURED,
            gpu_energy_total: UNMEASURED_ENERGY,
            gpu_temperature: UNMEASURED,
            gpu_fan_speed: UNMEASURED,
            gpu_memory_total: UNMEASURED,
            gpu_memory_used: UNMEASURED,
            gpu_memory_free: UNMEASURED,
            gpu_clock_sm: UNMEASURED,
            gpu_clock_memory: UNMEASURED,
        }
    }
}

impl NodeRecord {
    /// The all-sentinel record: what a node reports when nothing could be
    /// measured, and what the coordinator substitutes for an unresponsive
    /// rank.
    pub fn unmeasured() -> Self {
        Self {
            system: SystemSample::unmeasured(),
            processor: ProcessorSample::unmeasured(),
            io: IoSample::unmeasured(),
            memory: MemorySample::unmeasured(),
            network: NetworkSample::unmeasured(),
            power: PowerSample::unmeasured(),
        }
    }
}

impl Default for NodeRecord {
    fn default() -> Self {
        Self::unmeasured()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmeasured_record_is_all_sentinel() {
        let record = NodeRecord::unmeasured();
        assert_eq!(record.system.processes_all, UNMEASURED_COUNT);
        assert_eq!(record.processor.frequency_relative, UNMEASURED);
        assert_eq!(record.memory.memory_used, UNMEASURED);
        assert_eq!(record.power.gpu_energy_total, UNMEASURED_ENERGY);
    }

    #[test]
    fn serialized_record_uses_document_key_names() {
        let value = serde_json::to_value(NodeRecord::unmeasured()).unwrap();
        for key in [
            "systemMetrics",
            "processorMetrics",
            "inputOutputMetrics",
            "memoryMetrics",
            "networkMetrics",
            "powerMetrics",
        ] {
            assert!(value.get(key).is_some(), "missing section {key}");
        }
        assert_eq!(
            value["systemMetrics"]["processesRunning"],
            serde_json::json!(UNMEASURED_COUNT)
        );
        assert_eq!(
            value["inputOutputMetrics"]["flushOperationsRate"],
            serde_json::json!(UNMEASURED)
        );
    }
}
