use bytes::{BufMut, Bytes, BytesMut};
use wattmon_common::record::NodeRecord;

use crate::frame::{HEADER_BYTES, MAX_FRAME_BYTES};
use crate::sections::RECORD_SECTIONS;
use crate::{Result, WireError, WireKind};

/// One field of a section: its document name and primitive kind, in
/// declaration order.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: WireKind,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, kind: WireKind) -> Self {
        Self { name, kind }
    }
}

/// The transmissible description of one sample type.
#[derive(Debug, Clone)]
pub struct SectionDescriptor {
    pub name: &'static str,
    pub fields: Vec<FieldDescriptor>,
}

impl SectionDescriptor {
    pub fn new(name: &'static str, fields: Vec<FieldDescriptor>) -> Self {
        Self { name, fields }
    }

    pub fn encoded_len(&self) -> usize {
        self.fields.iter().map(|f| f.kind.encoded_len()).sum()
    }
}

/// A sample type that can cross the wire as part of the composite record.
///
/// `write_fields` and `read_fields` must touch every field in descriptor
/// order; [`FieldWriter`]/[`FieldReader`] verify kind and count against the
/// descriptor as they go, so a section that drifts from its own declaration
/// fails loudly instead of producing a silently skewed record.
pub trait WireSection: Sized {
    const SECTION: &'static str;

    fn descriptor() -> SectionDescriptor;
    fn write_fields(&self, w: &mut FieldWriter<'_>) -> Result<()>;
    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self>;
}

/// Descriptor-checked writer for one section's fields.
pub struct FieldWriter<'a> {
    descriptor: &'a SectionDescriptor,
    buf: &'a mut BytesMut,
    next: usize,
}

impl<'a> FieldWriter<'a> {
    fn new(descriptor: &'a SectionDescriptor, buf: &'a mut BytesMut) -> Self {
        Self {
            descriptor,
            buf,
            next: 0,
        }
    }

    fn expect(&mut self, kind: WireKind) -> Result<()> {
        let field = self.descriptor.fields.get(self.next).ok_or_else(|| {
            WireError::FieldOverrun {
                section: self.descriptor.name,
                declared: self.descriptor.fields.len(),
            }
        })?;
        if field.kind != kind {
            return Err(WireError::KindMismatch {
                section: self.descriptor.name,
                field: field.name,
                expected: field.kind.name(),
                actual: kind.name(),
            });
        }
        self.next += 1;
        Ok(())
    }

    pub fn i64(&mut self, value: i64) -> Result<()> {
        self.expect(WireKind::I64)?;
        self.buf.put_i64(value);
        Ok(())
    }

    pub fn u64(&mut self, value: u64) -> Result<()> {
        self.expect(WireKind::U64)?;
        self.buf.put_u64(value);
        Ok(())
    }

    pub fn f64(&mut self, value: f64) -> Result<()> {
        self.expect(WireKind::F64)?;
        self.buf.put_f64(value);
        Ok(())
    }

    fn finish(self) -> Result<()> {
        if self.next != self.descriptor.fields.len() {
            return Err(WireError::FieldShortfall {
                section: self.descriptor.name,
                expected: self.descriptor.fields.len(),
                actual: self.next,
            });
        }
        Ok(())
    }
}

/// Descriptor-checked reader for one section's fields.
pub struct FieldReader<'a> {
    descriptor: &'a SectionDescriptor,
    payload: &'a [u8],
    pos: usize,
    next: usize,
}

impl<'a> FieldReader<'a> {
    fn new(descriptor: &'a SectionDescriptor, payload: &'a [u8]) -> Self {
        Self {
            descriptor,
            payload,
            pos: 0,
            next: 0,
        }
    }

    fn take(&mut self, kind: WireKind) -> Result<[u8; 8]> {
        let field = self.descriptor.fields.get(self.next).ok_or_else(|| {
            WireError::FieldOverrun {
                section: self.descriptor.name,
                declared: self.descriptor.fields.len(),
            }
        })?;
        if field.kind != kind {
            return Err(WireError::KindMismatch {
                section: self.descriptor.name,
                field: field.name,
                expected: field.kind.name(),
                actual: kind.name(),
            });
        }
        let width = kind.encoded_len();
        let slice = self
            .payload
            .get(self.pos..self.pos + width)
            .ok_or(WireError::ShortPayload {
                needed: width,
                remaining: self.payload.len().saturating_sub(self.pos),
            })?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(slice);
        self.pos += width;
        self.next += 1;
        Ok(bytes)
    }

    pub fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take(WireKind::I64)?))
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take(WireKind::U64)?))
    }

    pub fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.take(WireKind::F64)?))
    }

    fn finish(self) -> Result<()> {
        if self.next != self.descriptor.fields.len() {
            return Err(WireError::FieldShortfall {
                section: self.descriptor.name,
                expected: self.descriptor.fields.len(),
                actual: self.next,
            });
        }
        Ok(())
    }
}

/// The composite wire type for a whole [`NodeRecord`].
///
/// Built once at startup and owned by the cluster context for the process
/// lifetime. Construction validates the descriptor table and performs an
/// encode self-check; any failure is fatal before the first round. A record
/// that cannot be described exactly is never silently coerced onto the wire.
#[derive(Debug)]
pub struct RecordSchema {
    version: u16,
    sections: Vec<SectionDescriptor>,
    offsets: Vec<usize>,
    encoded_len: usize,
}

impl RecordSchema {
    /// Builds and validates the registry.
    pub fn build() -> Result<Self> {
        let sections: Vec<SectionDescriptor> =
            RECORD_SECTIONS.iter().map(|build| build()).collect();

        let mut offsets = Vec::with_capacity(sections.len());
        let mut offset = 0usize;
        for (i, section) in sections.iter().enumerate() {
            if section.fields.is_empty() {
                return Err(WireError::EmptySection {
                    section: section.name,
                });
            }
            if sections[..i].iter().any(|s| s.name == section.name) {
                return Err(WireError::DuplicateSection {
                    section: section.name,
                });
            }
            for (j, field) in section.fields.iter().enumerate() {
                if section.fields[..j].iter().any(|f| f.name == field.name) {
                    return Err(WireError::DuplicateField {
                        section: section.name,
                        field: field.name,
                    });
                }
            }
            offsets.push(offset);
            offset += section.encoded_len();
        }

        let max_body = MAX_FRAME_BYTES - 4 - HEADER_BYTES;
        if offset > max_body {
            return Err(WireError::RecordTooLarge {
                len: offset,
                max: max_body,
            });
        }

        let schema = Self {
            version: crate::SCHEMA_VERSION,
            sections,
            offsets,
            encoded_len: offset,
        };

        // Commit-time self-check: the descriptors and the section
        // write_fields implementations must agree byte for byte.
        let probe = schema.encode(&NodeRecord::unmeasured())?;
        if probe.len() != schema.encoded_len {
            return Err(WireError::LayoutMismatch {
                expected: schema.encoded_len,
                actual: probe.len(),
            });
        }

        Ok(schema)
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    /// Exact byte length of every encoded record.
    pub fn encoded_len(&self) -> usize {
        self.encoded_len
    }

    pub fn sections(&self) -> &[SectionDescriptor] {
        &self.sections
    }

    /// Byte offset of each section within the record body.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Encodes one record as a single contiguous message body.
    pub fn encode(&self, record: &NodeRecord) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len);
        self.encode_section(&record.system, 0, &mut buf)?;
        self.encode_section(&record.processor, 1, &mut buf)?;
        self.encode_section(&record.io, 2, &mut buf)?;
        self.encode_section(&record.memory, 3, &mut buf)?;
        self.encode_section(&record.network, 4, &mut buf)?;
        self.encode_section(&record.power, 5, &mut buf)?;
        if buf.len() != self.encoded_len {
            return Err(WireError::LayoutMismatch {
                expected: self.encoded_len,
                actual: buf.len(),
            });
        }
        Ok(buf.freeze())
    }

    /// Decodes one record body. The payload must be exactly
    /// [`encoded_len`](Self::encoded_len) bytes; anything else is malformed
    /// and fatal.
    pub fn decode(&self, payload: &[u8]) -> Result<NodeRecord> {
        if payload.len() != self.encoded_len {
            return Err(WireError::PayloadSizeMismatch {
                expected: self.encoded_len,
                actual: payload.len(),
            });
        }
        Ok(NodeRecord {
            system: self.decode_section(0, payload)?,
            processor: self.decode_section(1, payload)?,
            io: self.decode_section(2, payload)?,
            memory: self.decode_section(3, payload)?,
            network: self.decode_section(4, payload)?,
            power: self.decode_section(5, payload)?,
        })
    }

    fn encode_section<S: WireSection>(
        &self,
        section: &S,
        index: usize,
        buf: &mut BytesMut,
    ) -> Result<()> {
        let mut writer = FieldWriter::new(&self.sections[index], buf);
        section.write_fields(&mut writer)?;
        writer.finish()
    }

    fn decode_section<S: WireSection>(&self, index: usize, payload: &[u8]) -> Result<S> {
        let start = self.offsets[index];
        let end = start + self.sections[index].encoded_len();
        let mut reader = FieldReader::new(&self.sections[index], &payload[start..end]);
        let section = S::read_fields(&mut reader)?;
        reader.finish()?;
        Ok(section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wattmon_common::record::{UNMEASURED, UNMEASURED_COUNT, UNMEASURED_ENERGY};

    #[test]
    fn registry_builds_and_declares_a_stable_layout() {
        let schema = RecordSchema::build().unwrap();
        assert_eq!(schema.version(), crate::SCHEMA_VERSION);
        assert_eq!(schema.sections().len(), 6);
        // 5 + 21 + 9 + 16 + 4 + 13 fields, eight bytes each.
        assert_eq!(schema.encoded_len(), 68 * 8);
        assert_eq!(schema.offsets()[0], 0);
        assert_eq!(schema.offsets()[1], 5 * 8);
    }

    #[test]
    fn record_round_trips_through_the_codec() {
        let schema = RecordSchema::build().unwrap();
        let mut record = NodeRecord::unmeasured();
        record.system.processes_all = 1234;
        record.processor.frequency_relative = 2950.5;
        record.io.data_read = 17.25;
        record.memory.memory_used = 15872.0;
        record.network.packets_sent = 99_000_001;
        record.power.gpu_energy_total = 42;

        let payload = schema.encode(&record).unwrap();
        assert_eq!(payload.len(), schema.encoded_len());
        let back = schema.decode(&payload).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn sentinels_survive_the_codec_unchanged() {
        let schema = RecordSchema::build().unwrap();
        let payload = schema.encode(&NodeRecord::unmeasured()).unwrap();
        let back = schema.decode(&payload).unwrap();
        assert_eq!(back.system.interrupt_rate, UNMEASURED_COUNT);
        assert_eq!(back.memory.page_in_rate, UNMEASURED);
        assert_eq!(back.power.gpu_energy_total, UNMEASURED_ENERGY);
    }

    #[test]
    fn undersized_payload_is_rejected() {
        let schema = RecordSchema::build().unwrap();
        let payload = schema.encode(&NodeRecord::unmeasured()).unwrap();
        let err = schema.decode(&payload[..payload.len() - 8]).unwrap_err();
        assert!(matches!(err, WireError::PayloadSizeMismatch { .. }));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let schema = RecordSchema::build().unwrap();
        let mut bytes = schema.encode(&NodeRecord::unmeasured()).unwrap().to_vec();
        bytes.extend_from_slice(&[0u8; 8]);
        let err = schema.decode(&bytes).unwrap_err();
        assert!(matches!(err, WireError::PayloadSizeMismatch { .. }));
    }

    #[test]
    fn writer_rejects_kind_drift() {
        let descriptor = SectionDescriptor::new(
            "probe",
            vec![FieldDescriptor::new("counter", WireKind::I64)],
        );
        let mut buf = BytesMut::new();
        let mut writer = FieldWriter::new(&descriptor, &mut buf);
        let err = writer.f64(1.0).unwrap_err();
        assert!(matches!(err, WireError::KindMismatch { .. }));
    }

    #[test]
    fn writer_rejects_extra_fields() {
        let descriptor = SectionDescriptor::new(
            "probe",
            vec![FieldDescriptor::new("counter", WireKind::I64)],
        );
        let mut buf = BytesMut::new();
        let mut writer = FieldWriter::new(&descriptor, &mut buf);
        writer.i64(7).unwrap();
        let err = writer.i64(8).unwrap_err();
        assert!(matches!(err, WireError::FieldOverrun { .. }));
    }
}
