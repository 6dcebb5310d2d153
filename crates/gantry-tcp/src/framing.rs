use std::io::{self, Cursor, ErrorKind};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload accepted from the peer.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

const HEADER_LEN: usize = 8;

/// Frame kinds on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    /// Client to server: one [`Request`](gantry_core::remote::Request).
    Request = 1,
    /// Server to client: one [`ResponseFrame`](gantry_core::remote::ResponseFrame).
    Response = 2,
}

impl Opcode {
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Opcode::Request),
            2 => Some(Opcode::Response),
            _ => None,
        }
    }
}

/// Packs the opcode, payload length, and JSON payload into a byte vector.
pub fn encode<T: Serialize>(opcode: Opcode, payload: &T) -> io::Result<Vec<u8>> {
    let payload = serde_json::to_vec(payload).map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or_else(|| io::Error::new(ErrorKind::InvalidData, format!("payload of {} bytes is too large", payload.len())))?;

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    WriteBytesExt::write_u32::<LittleEndian>(&mut frame, opcode as u32)?;
    WriteBytesExt::write_u32::<LittleEndian>(&mut frame, len)?;
    frame.extend_from_slice(&payload);
    Ok(frame)
}

pub async fn write_frame<W, T>(writer: &mut W, opcode: Opcode, payload: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode(opcode, payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await
}

/// Reads one frame. `Ok(None)` means the peer closed the connection cleanly
/// between frames.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<(u32, Vec<u8>)>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(ErrorKind::UnexpectedEof, "connection closed inside a frame header"));
        }
        filled += n;
    }

    let mut cursor = Cursor::new(header);
    let opcode = ReadBytesExt::read_u32::<LittleEndian>(&mut cursor)?;
    let len = ReadBytesExt::read_u32::<LittleEndian>(&mut cursor)?;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds the {} byte limit", len, MAX_FRAME_LEN),
        ));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(Some((opcode, payload)))
}

/// Reads one frame of the `expected` kind and decodes its payload.
pub async fn read_message<R, T>(reader: &mut R, expected: Opcode) -> io::Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let Some((opcode, payload)) = read_frame(reader).await? else {
        return Ok(None);
    };
    if Opcode::from_u32(opcode) != Some(expected) {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            format!("expected {:?} frame, got opcode {}", expected, opcode),
        ));
    }
    serde_json::from_slice(&payload)
        .map(Some)
        .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
}
