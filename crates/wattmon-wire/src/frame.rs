//! Length-prefixed, checksummed frames for the group links.
//!
//! Layout: `[len: u32][kind: u8][version: u16][rank: u32][crc32: u32][body]`,
//! all big-endian; `len` counts everything after itself and the crc covers
//! the body. A frame that fails any header check is fatal to the process;
//! the group is a trusted, co-scheduled set, not an adversarial network.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Result, WireError, SCHEMA_VERSION};

/// Hard cap on a frame, length prefix included. A longer length prefix is
/// rejected before the body is read.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Header bytes after the length prefix: kind, version, rank, crc32.
pub const HEADER_BYTES: usize = 1 + 2 + 4 + 4;

const CONTROL_BODY_BYTES: usize = 1 + 8;
const JOIN_ACK_BODY_BYTES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Worker announces its rank to the coordinator.
    Join,
    /// Coordinator confirms the group is complete, body carries the size.
    JoinAck,
    /// Coordinator opens a round (or ends the run), body carries the round
    /// index and a [`Directive`].
    Control,
    /// One encoded `NodeRecord`.
    Record,
}

impl FrameKind {
    fn as_u8(self) -> u8 {
        match self {
            FrameKind::Join => 1,
            FrameKind::JoinAck => 2,
            FrameKind::Control => 3,
            FrameKind::Record => 4,
        }
    }

    fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            1 => Ok(FrameKind::Join),
            2 => Ok(FrameKind::JoinAck),
            3 => Ok(FrameKind::Control),
            4 => Ok(FrameKind::Record),
            other => Err(WireError::UnknownFrameKind(other)),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            FrameKind::Join => "Join",
            FrameKind::JoinAck => "JoinAck",
            FrameKind::Control => "Control",
            FrameKind::Record => "Record",
        }
    }
}

/// Coordinator's per-round instruction to the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Stop,
    Continue,
}

impl Directive {
    fn as_u8(self) -> u8 {
        match self {
            Directive::Stop => 0,
            Directive::Continue => 1,
        }
    }

    fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(Directive::Stop),
            1 => Ok(Directive::Continue),
            other => Err(WireError::InvalidDirective(other)),
        }
    }
}

/// A decoded frame: kind, sender rank and raw body.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    pub rank: u32,
    pub body: Bytes,
}

impl Frame {
    pub fn join(rank: u32) -> Self {
        Self {
            kind: FrameKind::Join,
            rank,
            body: Bytes::new(),
        }
    }

    pub fn join_ack(size: u32) -> Self {
        let mut body = BytesMut::with_capacity(JOIN_ACK_BODY_BYTES);
        body.put_u32(size);
        Self {
            kind: FrameKind::JoinAck,
            rank: 0,
            body: body.freeze(),
        }
    }

    pub fn control(round: u64, directive: Directive) -> Self {
        let mut body = BytesMut::with_capacity(CONTROL_BODY_BYTES);
        body.put_u8(directive.as_u8());
        body.put_u64(round);
        Self {
            kind: FrameKind::Control,
            rank: 0,
            body: body.freeze(),
        }
    }

    pub fn record(rank: u32, payload: Bytes) -> Self {
        Self {
            kind: FrameKind::Record,
            rank,
            body: payload,
        }
    }

    /// Full wire bytes, length prefix included.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let len = HEADER_BYTES + self.body.len();
        if 4 + len > MAX_FRAME_BYTES {
            return Err(WireError::FrameTooLarge {
                len: 4 + len,
                max: MAX_FRAME_BYTES,
            });
        }
        let mut buf = BytesMut::with_capacity(4 + len);
        buf.put_u32(len as u32);
        buf.put_u8(self.kind.as_u8());
        buf.put_u16(SCHEMA_VERSION);
        buf.put_u32(self.rank);
        buf.put_u32(crc32fast::hash(&self.body));
        buf.extend_from_slice(&self.body);
        Ok(buf.freeze())
    }

    /// Parses the bytes after the length prefix.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_BYTES {
            return Err(WireError::TruncatedFrame {
                needed: HEADER_BYTES,
                actual: buf.len(),
            });
        }
        let kind = FrameKind::from_u8(buf[0])?;
        let version = u16::from_be_bytes([buf[1], buf[2]]);
        if version != SCHEMA_VERSION {
            return Err(WireError::VersionMismatch {
                expected: SCHEMA_VERSION,
                actual: version,
            });
        }
        let rank = u32::from_be_bytes([buf[3], buf[4], buf[5], buf[6]]);
        let crc = u32::from_be_bytes([buf[7], buf[8], buf[9], buf[10]]);
        let body = &buf[HEADER_BYTES..];
        if crc32fast::hash(body) != crc {
            return Err(WireError::ChecksumMismatch);
        }
        Ok(Self {
            kind,
            rank,
            body: Bytes::copy_from_slice(body),
        })
    }

    /// Reads the group size out of a JoinAck body.
    pub fn parse_join_ack(&self) -> Result<u32> {
        if self.body.len() != JOIN_ACK_BODY_BYTES {
            return Err(WireError::BodySizeMismatch {
                frame: "JoinAck",
                expected: JOIN_ACK_BODY_BYTES,
                actual: self.body.len(),
            });
        }
        Ok(u32::from_be_bytes([
            self.body[0],
            self.body[1],
            self.body[2],
            self.body[3],
        ]))
    }

    /// Reads the round index and directive out of a Control body.
    pub fn parse_control(&self) -> Result<(u64, Directive)> {
        if self.body.len() != CONTROL_BODY_BYTES {
            return Err(WireError::BodySizeMismatch {
                frame: "Control",
                expected: CONTROL_BODY_BYTES,
                actual: self.body.len(),
            });
        }
        let directive = Directive::from_u8(self.body[0])?;
        let mut round = [0u8; 8];
        round.copy_from_slice(&self.body[1..9]);
        Ok((u64::from_be_bytes(round), directive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(frame: Frame) -> Frame {
        let bytes = frame.to_bytes().unwrap();
        let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(len, bytes.len() - 4);
        Frame::parse(&bytes[4..]).unwrap()
    }

    #[test]
    fn join_and_ack_round_trip() {
        let join = round_trip(Frame::join(3));
        assert_eq!(join.kind, FrameKind::Join);
        assert_eq!(join.rank, 3);

        let ack = round_trip(Frame::join_ack(8));
        assert_eq!(ack.parse_join_ack().unwrap(), 8);
    }

    #[test]
    fn control_round_trips_both_directives() {
        let go = round_trip(Frame::control(41, Directive::Continue));
        assert_eq!(go.parse_control().unwrap(), (41, Directive::Continue));

        let halt = round_trip(Frame::control(42, Directive::Stop));
        assert_eq!(halt.parse_control().unwrap(), (42, Directive::Stop));
    }

    #[test]
    fn record_frame_carries_payload_untouched() {
        let payload = Bytes::from_static(&[7u8; 96]);
        let frame = round_trip(Frame::record(2, payload.clone()));
        assert_eq!(frame.kind, FrameKind::Record);
        assert_eq!(frame.rank, 2);
        assert_eq!(frame.body, payload);
    }

    #[test]
    fn corrupted_body_fails_the_checksum() {
        let bytes = Frame::record(1, Bytes::from_static(b"watts")).to_bytes().unwrap();
        let mut raw = bytes.to_vec();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        let err = Frame::parse(&raw[4..]).unwrap_err();
        assert!(matches!(err, WireError::ChecksumMismatch));
    }

    #[test]
    fn version_skew_is_rejected() {
        let bytes = Frame::join(1).to_bytes().unwrap();
        let mut raw = bytes.to_vec();
        raw[5] = 0;
        raw[6] = 1; // version 1 draft schema
        let err = Frame::parse(&raw[4..]).unwrap_err();
        assert!(matches!(
            err,
            WireError::VersionMismatch { actual: 1, .. }
        ));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let bytes = Frame::join(1).to_bytes().unwrap();
        let mut raw = bytes.to_vec();
        raw[4] = 0x7f;
        let err = Frame::parse(&raw[4..]).unwrap_err();
        assert!(matches!(err, WireError::UnknownFrameKind(0x7f)));
    }

    #[test]
    fn truncated_header_is_rejected() {
        let err = Frame::parse(&[1, 0]).unwrap_err();
        assert!(matches!(err, WireError::TruncatedFrame { .. }));
    }

    #[test]
    fn oversized_body_is_rejected_at_encode() {
        let frame = Frame::record(0, Bytes::from(vec![0u8; MAX_FRAME_BYTES]));
        let err = frame.to_bytes().unwrap_err();
        assert!(matches!(err, WireError::FrameTooLarge { .. }));
    }

    #[test]
    fn directive_bytes_outside_the_set_are_invalid() {
        let mut frame = Frame::control(0, Directive::Continue);
        let mut body = frame.body.to_vec();
        body[0] = 9;
        frame.body = Bytes::from(body);
        let err = frame.parse_control().unwrap_err();
        assert!(matches!(err, WireError::InvalidDirective(9)));
    }
}
