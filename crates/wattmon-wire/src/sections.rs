//! Wire descriptors for the six record sections.
//!
//! Field lists mirror the structs in `wattmon_common::record` one for one,
//! in declaration order, using the document key names. The schema registry's
//! startup self-check catches any drift between a descriptor and its
//! write/read implementation.

use wattmon_common::record::{
    IoSample, MemorySample, NetworkSample, PowerSample, ProcessorSample, SystemSample,
};

use crate::schema::{FieldDescriptor, FieldReader, FieldWriter, SectionDescriptor, WireSection};
use crate::{Result, WireKind};

/// The composite record layout: section constructors in transmission order.
pub(crate) const RECORD_SECTIONS: [fn() -> SectionDescriptor; 6] = [
    <SystemSample as WireSection>::descriptor,
    <ProcessorSample as WireSection>::descriptor,
    <IoSample as WireSection>::descriptor,
    <MemorySample as WireSection>::descriptor,
    <NetworkSample as WireSection>::descriptor,
    <PowerSample as WireSection>::descriptor,
];

fn field(name: &'static str, kind: WireKind) -> FieldDescriptor {
    FieldDescriptor::new(name, kind)
}

impl WireSection for SystemSample {
    const SECTION: &'static str = "systemMetrics";

    fn descriptor() -> SectionDescriptor {
        SectionDescriptor::new(
            Self::SECTION,
            vec![
                field("processesRunning", WireKind::I64),
                field("processesAll", WireKind::I64),
                field("processesBlocked", WireKind::I64),
                field("contextSwitchRate", WireKind::I64),
                field("interruptRate", WireKind::I64),
            ],
        )
    }

    fn write_fields(&self, w: &mut FieldWriter<'_>) -> Result<()> {
        w.i64(self.processes_running)?;
        w.i64(self.processes_all)?;
        w.i64(self.processes_blocked)?;
        w.i64(self.context_switch_rate)?;
        w.i64(self.interrupt_rate)?;
        Ok(())
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            processes_running: r.i64()?,
            processes_all: r.i64()?,
            processes_blocked: r.i64()?,
            context_switch_rate: r.i64()?,
            interrupt_rate: r.i64()?,
        })
    }
}

impl WireSection for ProcessorSample {
    const SECTION: &'static str = "processorMetrics";

    fn descriptor() -> SectionDescriptor {
        SectionDescriptor::new(
            Self::SECTION,
            vec![
                field("timeUser", WireKind::I64),
                field("timeNice", WireKind::I64),
                field("timeSystem", WireKind::I64),
                field("timeIdle", WireKind::I64),
                field("timeIoWait", WireKind::I64),
                field("timeIrq", WireKind::I64),
                field("timeSoftIrq", WireKind::I64),
                field("timeSteal", WireKind::I64),
                field("timeGuest", WireKind::I64),
                field("instructionsRetired", WireKind::I64),
                field("cycles", WireKind::I64),
                field("frequencyRelative", WireKind::F64),
                field("unhaltedFrequency", WireKind::F64),
                field("cacheL2Requests", WireKind::I64),
                field("cacheL2Misses", WireKind::I64),
                field("cacheLlcLoads", WireKind::I64),
                field("cacheLlcStores", WireKind::I64),
                field("cacheLlcLoadMisses", WireKind::I64),
                field("cacheLlcLoadMissRate", WireKind::F64),
                field("cacheLlcStoreMisses", WireKind::I64),
                field("cacheLlcStoreMissRate", WireKind::F64),
            ],
        )
    }

    fn write_fields(&self, w: &mut FieldWriter<'_>) -> Result<()> {
        w.i64(self.time_user)?;
        w.i64(self.time_nice)?;
        w.i64(self.time_system)?;
        w.i64(self.time_idle)?;
        w.i64(self.time_io_wait)?;
        w.i64(self.time_irq)?;
        w.i64(self.time_soft_irq)?;
        w.i64(self.time_steal)?;
        w.i64(self.time_guest)?;
        w.i64(self.instructions_retired)?;
        w.i64(self.cycles)?;
        w.f64(self.frequency_relative)?;
        w.f64(self.unhalted_frequency)?;
        w.i64(self.cache_l2_requests)?;
        w.i64(self.cache_l2_misses)?;
        w.i64(self.cache_llc_loads)?;
        w.i64(self.cache_llc_stores)?;
        w.i64(self.cache_llc_load_misses)?;
        w.f64(self.cache_llc_load_miss_rate)?;
        w.i64(self.cache_llc_store_misses)?;
        w.f64(self.cache_llc_store_miss_rate)?;
        Ok(())
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            time_user: r.i64()?,
            time_nice: r.i64()?,
            time_system: r.i64()?,
            time_idle: r.i64()?,
            time_io_wait: r.i64()?,
            time_irq: r.i64()?,
            time_soft_irq: r.i64()?,
            time_steal: r.i64()?,
            time_guest: r.i64()?,
            instructions_retired: r.i64()?,
            cycles: r.i64()?,
            frequency_relative: r.f64()?,
            unhalted_frequency: r.f64()?,
            cache_l2_requests: r.i64()?,
            cache_l2_misses: r.i64()?,
            cache_llc_loads: r.i64()?,
            cache_llc_stores: r.i64()?,
            cache_llc_load_misses: r.i64()?,
            cache_llc_load_miss_rate: r.f64()?,
            cache_llc_store_misses: r.i64()?,
            cache_llc_store_miss_rate: r.f64()?,
        })
    }
}

impl WireSection for IoSample {
    const SECTION: &'static str = "inputOutputMetrics";

    fn descriptor() -> SectionDescriptor {
        SectionDescriptor::new(
            Self::SECTION,
            vec![
                field("processId", WireKind::I64),
                field("dataRead", WireKind::F64),
                field("readTime", WireKind::F64),
                field("readOperationsRate", WireKind::F64),
                field("dataWritten", WireKind::F64),
                field("writeTime", WireKind::F64),
                field("writeOperationsRate", WireKind::F64),
                field("flushTime", WireKind::F64),
                field("flushOperationsRate", WireKind::F64),
            ],
        )
    }

    fn write_fields(&self, w: &mut FieldWriter<'_>) -> Result<()> {
        w.i64(self.process_id)?;
        w.f64(self.data_read)?;
        w.f64(self.read_time)?;
        w.f64(self.read_operations_rate)?;
        w.f64(self.data_written)?;
        w.f64(self.write_time)?;
        w.f64(self.write_operations_rate)?;
        w.f64(self.flush_time)?;
        w.f64(self.flush_operations_rate)?;
        Ok(())
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            process_id: r.i64()?,
            data_read: r.f64()?,
            read_time: r.f64()?,
            read_operations_rate: r.f64()?,
            data_written: r.f64()?,
            write_time: r.f64()?,
            write_operations_rate: r.f64()?,
            flush_time: r.f64()?,
            flush_operations_rate: r.f64()?,
        })
    }
}

impl WireSection for MemorySample {
    const SECTION: &'static str = "memoryMetrics";

    fn descriptor() -> SectionDescriptor {
        SectionDescriptor::new(
            Self::SECTION,
            vec![
                field("memoryUsed", WireKind::F64),
                field("memoryCached", WireKind::F64),
                field("swapUsed", WireKind::F64),
                field("swapCached", WireKind::F64),
                field("memoryActive", WireKind::F64),
                field("memoryInactive", WireKind::F64),
                field("pageInRate", WireKind::F64),
                field("pageOutRate", WireKind::F64),
                field("pageFaultRate", WireKind::F64),
                field("pageFaultsMajorRate", WireKind::F64),
                field("pageFreeRate", WireKind::F64),
                field("pageActivateRate", WireKind::F64),
                field("pageDeactivateRate", WireKind::F64),
                field("memoryReadRate", WireKind::F64),
                field("memoryWriteRate", WireKind::F64),
                field("memoryIoRate", WireKind::F64),
            ],
        )
    }

    fn write_fields(&self, w: &mut FieldWriter<'_>) -> Result<()> {
        w.f64(self.memory_used)?;
        w.f64(self.memory_cached)?;
        w.f64(self.swap_used)?;
        w.f64(self.swap_cached)?;
        w.f64(self.memory_active)?;
        w.f64(self.memory_inactive)?;
        w.f64(self.page_in_rate)?;
        w.f64(self.page_out_rate)?;
        w.f64(self.page_fault_rate)?;
        w.f64(self.page_faults_major_rate)?;
        w.f64(self.page_free_rate)?;
        w.f64(self.page_activate_rate)?;
        w.f64(self.page_deactivate_rate)?;
        w.f64(self.memory_read_rate)?;
        w.f64(self.memory_write_rate)?;
        w.f64(self.memory_io_rate)?;
        Ok(())
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            memory_used: r.f64()?,
            memory_cached: r.f64()?,
            swap_used: r.f64()?,
            swap_cached: r.f64()?,
            memory_active: r.f64()?,
            memory_inactive: r.f64()?,
            page_in_rate: r.f64()?,
            page_out_rate: r.f64()?,
            page_fault_rate: r.f64()?,
            page_faults_major_rate: r.f64()?,
            page_free_rate: r.f64()?,
            page_activate_rate: r.f64()?,
            page_deactivate_rate: r.f64()?,
            memory_read_rate: r.f64()?,
            memory_write_rate: r.f64()?,
            memory_io_rate: r.f64()?,
        })
    }
}

impl WireSection for NetworkSample {
    const SECTION: &'static str = "networkMetrics";

    fn descriptor() -> SectionDescriptor {
        SectionDescriptor::new(
            Self::SECTION,
            vec![
                field("packetsReceived", WireKind::I64),
                field("receiveRate", WireKind::F64),
                field("packetsSent", WireKind::I64),
                field("sendRate", WireKind::F64),
            ],
        )
    }

    fn write_fields(&self, w: &mut FieldWriter<'_>) -> Result<()> {
        w.i64(self.packets_received)?;
        w.f64(self.receive_rate)?;
        w.i64(self.packets_sent)?;
        w.f64(self.send_rate)?;
        Ok(())
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            packets_received: r.i64()?,
            receive_rate: r.f64()?,
            packets_sent: r.i64()?,
            send_rate: r.f64()?,
        })
    }
}

impl WireSection for PowerSample {
    const SECTION: &'static str = "powerMetrics";

    fn descriptor() -> SectionDescriptor {
        SectionDescriptor::new(
            Self::SECTION,
            vec![
                field("coresPower", WireKind::F64),
                field("processorPower", WireKind::F64),
                field("memoryPower", WireKind::F64),
                field("systemPower", WireKind::F64),
                field("gpuPower", WireKind::F64),
                field("gpuEnergyTotal", WireKind::U64),
                field("gpuTemperature", WireKind::F64),
                field("gpuFanSpeed", WireKind::F64),
                field("gpuMemoryTotal", WireKind::F64),
                field("gpuMemoryUsed", WireKind::F64),
                field("gpuMemoryFree", WireKind::F64),
                field("gpuClockSm", WireKind::F64),
                field("gpuClockMemory", WireKind::F64),
            ],
        )
    }

    fn write_fields(&self, w: &mut FieldWriter<'_>) -> Result<()> {
        w.f64(self.cores_power)?;
        w.f64(self.processor_power)?;
        w.f64(self.memory_power)?;
        w.f64(self.system_power)?;
        w.f64(self.gpu_power)?;
        w.u64(self.gpu_energy_total)?;
        w.f64(self.gpu_temperature)?;
        w.f64(self.gpu_fan_speed)?;
        w.f64(self.gpu_memory_total)?;
        w.f64(self.gpu_memory_used)?;
        w.f64(self.gpu_memory_free)?;
        w.f64(self.gpu_clock_sm)?;
        w.f64(self.gpu_clock_memory)?;
        Ok(())
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            cores_power: r.f64()?,
            processor_power: r.f64()?,
            memory_power: r.f64()?,
            system_power: r.f64()?,
            gpu_power: r.f64()?,
            gpu_energy_total: r.u64()?,
            gpu_temperature: r.f64()?,
            gpu_fan_speed: r.f64()?,
            gpu_memory_total: r.f64()?,
            gpu_memory_used: r.f64()?,
            gpu_memory_free: r.f64()?,
            gpu_clock_sm: r.f64()?,
            gpu_clock_memory: r.f64()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wattmon_common::record::NodeRecord;

    #[test]
    fn descriptors_cover_every_struct_field() {
        // Field counts per the schema; a mismatch here means a descriptor
        // was not updated alongside its struct.
        assert_eq!(SystemSample::descriptor().fields.len(), 5);
        assert_eq!(ProcessorSample::descriptor().fields.len(), 21);
        assert_eq!(IoSample::descriptor().fields.len(), 9);
        assert_eq!(MemorySample::descriptor().fields.len(), 16);
        assert_eq!(NetworkSample::descriptor().fields.len(), 4);
        assert_eq!(PowerSample::descriptor().fields.len(), 13);
    }

    #[test]
    fn descriptor_names_match_document_keys() {
        // The wire descriptors and the serde output name the same fields,
        // section by section.
        let value = serde_json::to_value(NodeRecord::unmeasured()).unwrap();
        for descriptor in super::RECORD_SECTIONS.iter().map(|build| build()) {
            let section = value[descriptor.name]
                .as_object()
                .unwrap_or_else(|| panic!("section {} missing", descriptor.name));
            let mut document_keys: Vec<&str> = section.keys().map(String::as_str).collect();
            let mut descriptor_keys: Vec<&str> =
                descriptor.fields.iter().map(|f| f.name).collect();
            document_keys.sort_unstable();
            descriptor_keys.sort_unstable();
            assert_eq!(document_keys, descriptor_keys, "{}", descriptor.name);
        }
    }
}
