use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use wattmon_wire::{Frame, WireError, MAX_FRAME_BYTES};

use crate::{GroupError, Result};

pub(crate) async fn write_frame(stream: &mut TcpStream, frame: &Frame) -> Result<()> {
    let bytes = frame.to_bytes()?;
    stream.write_all(&bytes).await?;
    Ok(())
}

pub(crate) async fn read_frame(stream: &mut TcpStream) -> Result<Frame> {
    let mut len_bytes = [0u8; 4];
    stream.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    // Reject an oversized announcement before allocating for it.
    if 4 + len > MAX_FRAME_BYTES {
        return Err(GroupError::Wire(WireError::FrameTooLarge {
            len: 4 + len,
            max: MAX_FRAME_BYTES,
        }));
    }
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(Frame::parse(&buf)?)
}
