//! Typed wire schema and framing for wattmon records.
//!
//! Every node describes its [`NodeRecord`](wattmon_common::record::NodeRecord)
//! with the same composite schema, built once at startup by
//! [`RecordSchema::build`]: an explicit field-descriptor list per section,
//! consumed by a portable fixed-width big-endian encode/decode pair. No raw
//! in-memory layout crosses the transport, so heterogeneous node
//! architectures interoperate as long as they agree on [`SCHEMA_VERSION`].
//!
//! [`frame`] wraps encoded bodies in a length-prefixed, crc32-checked frame
//! for the point-to-point links.

pub mod frame;
pub mod schema;
mod sections;

pub use frame::{Directive, Frame, FrameKind, HEADER_BYTES, MAX_FRAME_BYTES};
pub use schema::{
    FieldDescriptor, FieldReader, FieldWriter, RecordSchema, SectionDescriptor, WireSection,
};

/// Version of the composite record schema.
///
/// v1 was the draft field set (a strict subset of v2); peers reject any
/// frame that does not carry the version they were built with.
pub const SCHEMA_VERSION: u16 = 2;

/// Primitive kinds with a direct transport representation.
///
/// Each kind occupies a fixed eight bytes on the wire, big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireKind {
    I64,
    U64,
    F64,
}

impl WireKind {
    pub const fn encoded_len(self) -> usize {
        8
    }

    pub const fn name(self) -> &'static str {
        match self {
            WireKind::I64 => "i64",
            WireKind::U64 => "u64",
            WireKind::F64 => "f64",
        }
    }
}

/// Errors raised by the schema registry and the frame codec.
///
/// Everything here is fatal to the process: schema validation failures abort
/// before the first round, and a malformed frame mid-round violates the
/// trusted co-scheduled process model.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("wire: duplicate section '{section}' in record schema")]
    DuplicateSection { section: &'static str },

    #[error("wire: duplicate field '{field}' in section '{section}'")]
    DuplicateField {
        section: &'static str,
        field: &'static str,
    },

    #[error("wire: section '{section}' declares no fields")]
    EmptySection { section: &'static str },

    #[error("wire: encoded record is {len} bytes, exceeding the {max}-byte frame cap")]
    RecordTooLarge { len: usize, max: usize },

    #[error("wire: schema self-check failed, descriptors declare {expected} bytes but encoding produced {actual}")]
    LayoutMismatch { expected: usize, actual: usize },

    #[error("wire: field '{field}' in section '{section}' is declared {expected} but written/read as {actual}")]
    KindMismatch {
        section: &'static str,
        field: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("wire: section '{section}' accessed past its {declared} declared fields")]
    FieldOverrun {
        section: &'static str,
        declared: usize,
    },

    #[error("wire: section '{section}' covered {actual} of {expected} declared fields")]
    FieldShortfall {
        section: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("wire: payload exhausted, needed {needed} more bytes but {remaining} remain")]
    ShortPayload { needed: usize, remaining: usize },

    #[error("wire: record payload is {actual} bytes, schema requires exactly {expected}")]
    PayloadSizeMismatch { expected: usize, actual: usize },

    #[error("wire: peer speaks schema version {actual}, this build requires {expected}")]
    VersionMismatch { expected: u16, actual: u16 },

    #[error("wire: unknown frame kind {0:#04x}")]
    UnknownFrameKind(u8),

    #[error("wire: frame checksum mismatch")]
    ChecksumMismatch,

    #[error("wire: frame of {len} bytes exceeds the {max}-byte cap")]
    FrameTooLarge { len: usize, max: usize },

    #[error("wire: frame truncated, header needs {needed} bytes but only {actual} arrived")]
    TruncatedFrame { needed: usize, actual: usize },

    #[error("wire: {frame} body is {actual} bytes, expected {expected}")]
    BodySizeMismatch {
        frame: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("wire: invalid control directive {0:#04x}")]
    InvalidDirective(u8),
}

/// Convenience `Result` alias for wire operations.
pub type Result<T> = std::result::Result<T, WireError>;
