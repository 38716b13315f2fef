//! PTY Host Wire Protocol
//!
//! Framed messages exchanged between a [`ProcessSession`](super::ProcessSession)
//! and the `blackscreen-pty-host` process it spawns. The host's stdout carries
//! child→parent messages, its stdin carries parent→child messages.
//!
//! ## Framing
//!
//! ```text
//! +----------------------+---------+---------------------+
//! | length: u32 big-end. | tag: u8 | payload (length-1)  |
//! +----------------------+---------+---------------------+
//! ```
//!
//! `length` counts the tag byte plus the payload, so it is never zero.
//!
//! | tag    | direction    | message | payload                          |
//! |--------|--------------|---------|----------------------------------|
//! | `0x01` | child→parent | Data    | raw bytes                        |
//! | `0x02` | child→parent | Exit    | `i32` big-endian                 |
//! | `0x10` | parent→child | Input   | raw bytes                        |
//! | `0x11` | parent→child | Resize  | `u16` BE columns, `u16` BE rows  |
//! | `0x12` | parent→child | Signal  | UTF-8 signal name                |
//!
//! Anything else is a [`ProtocolError`] and is fatal to the session.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame (tag + payload)
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Largest payload that fits in one frame next to its tag byte
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN as usize - 1;

/// Frame tags
pub mod tag {
    pub const DATA: u8 = 0x01;
    pub const EXIT: u8 = 0x02;
    pub const INPUT: u8 = 0x10;
    pub const RESIZE: u8 = 0x11;
    pub const SIGNAL: u8 = 0x12;
}

/// Protocol violations and transport failures
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown message tag 0x{0:02x}")]
    UnknownTag(u8),

    #[error("message tag 0x{0:02x} is not valid in this direction")]
    WrongDirection(u8),

    #[error("zero-length frame")]
    EmptyFrame,

    #[error("frame of {0} bytes exceeds the 16 MiB limit")]
    FrameTooLarge(u64),

    #[error("payload for tag 0x{tag:02x} must be {expected} bytes, got {actual}")]
    BadPayloadLength {
        tag: u8,
        expected: usize,
        actual: usize,
    },

    #[error("signal name must be non-empty UTF-8")]
    InvalidSignalName,

    #[error("stream ended in the middle of a frame")]
    Truncated,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A raw frame before it is interpreted as a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Serialize the frame including its length prefix.
    ///
    /// Frames the reader would reject are refused here as well.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::FrameTooLarge(self.payload.len() as u64 + 1));
        }
        let len = (self.payload.len() + 1) as u32;
        let mut out = Vec::with_capacity(self.payload.len() + 5);
        out.extend_from_slice(&len.to_be_bytes());
        out.push(self.tag);
        out.extend_from_slice(&self.payload);
        Ok(out)
    }
}

/// Message sent by the host on behalf of the child process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildMessage {
    /// Output produced by the child on its terminal
    Data(Vec<u8>),
    /// The child exited with the given code
    Exit(i32),
}

/// Message sent by the session owner to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentMessage {
    /// Bytes to type into the child's terminal
    Input(Vec<u8>),
    /// New terminal size
    Resize { columns: u16, rows: u16 },
    /// Signal to deliver to the child, by name (e.g. `SIGINT`)
    Signal(String),
}

/// A message type that can travel in one direction of the channel
pub trait WireMessage: Sized {
    fn to_frame(&self) -> Frame;
    fn from_frame(frame: Frame) -> Result<Self, ProtocolError>;
}

fn fixed_payload<const N: usize>(frame: &Frame) -> Result<[u8; N], ProtocolError> {
    frame
        .payload
        .as_slice()
        .try_into()
        .map_err(|_| ProtocolError::BadPayloadLength {
            tag: frame.tag,
            expected: N,
            actual: frame.payload.len(),
        })
}

impl WireMessage for ChildMessage {
    fn to_frame(&self) -> Frame {
        match self {
            ChildMessage::Data(data) => Frame {
                tag: tag::DATA,
                payload: data.clone(),
            },
            ChildMessage::Exit(code) => Frame {
                tag: tag::EXIT,
                payload: code.to_be_bytes().to_vec(),
            },
        }
    }

    fn from_frame(frame: Frame) -> Result<Self, ProtocolError> {
        match frame.tag {
            tag::DATA => Ok(ChildMessage::Data(frame.payload)),
            tag::EXIT => Ok(ChildMessage::Exit(i32::from_be_bytes(fixed_payload(&frame)?))),
            tag::INPUT | tag::RESIZE | tag::SIGNAL => Err(ProtocolError::WrongDirection(frame.tag)),
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }
}

impl WireMessage for ParentMessage {
    fn to_frame(&self) -> Frame {
        match self {
            ParentMessage::Input(data) => Frame {
                tag: tag::INPUT,
                payload: data.clone(),
            },
            ParentMessage::Resize { columns, rows } => {
                let mut payload = Vec::with_capacity(4);
                payload.extend_from_slice(&columns.to_be_bytes());
                payload.extend_from_slice(&rows.to_be_bytes());
                Frame {
                    tag: tag::RESIZE,
                    payload,
                }
            }
            ParentMessage::Signal(name) => Frame {
                tag: tag::SIGNAL,
                payload: name.as_bytes().to_vec(),
            },
        }
    }

    fn from_frame(frame: Frame) -> Result<Self, ProtocolError> {
        match frame.tag {
            tag::INPUT => Ok(ParentMessage::Input(frame.payload)),
            tag::RESIZE => {
                let raw: [u8; 4] = fixed_payload(&frame)?;
                Ok(ParentMessage::Resize {
                    columns: u16::from_be_bytes([raw[0], raw[1]]),
                    rows: u16::from_be_bytes([raw[2], raw[3]]),
                })
            }
            tag::SIGNAL => match String::from_utf8(frame.payload) {
                Ok(name) if !name.is_empty() => Ok(ParentMessage::Signal(name)),
                _ => Err(ProtocolError::InvalidSignalName),
            },
            tag::DATA | tag::EXIT => Err(ProtocolError::WrongDirection(frame.tag)),
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }
}

/// Read one frame. Returns `Ok(None)` on a clean EOF at a frame boundary.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    let first = reader.read(&mut len_buf[..1]).await?;
    if first == 0 {
        return Ok(None);
    }
    read_exact_or_truncated(reader, &mut len_buf[1..]).await?;

    let len = u32::from_be_bytes(len_buf);
    if len == 0 {
        return Err(ProtocolError::EmptyFrame);
    }
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len.into()));
    }

    let mut body = vec![0u8; len as usize];
    read_exact_or_truncated(reader, &mut body).await?;
    let payload = body.split_off(1);
    Ok(Some(Frame {
        tag: body[0],
        payload,
    }))
}

async fn read_exact_or_truncated<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(ProtocolError::Truncated),
        Err(e) => Err(ProtocolError::Io(e)),
    }
}

/// Reads typed messages from one side of the channel
pub struct MessageReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Next message, or `None` once the peer closed the stream cleanly
    pub async fn recv<M: WireMessage>(&mut self) -> Result<Option<M>, ProtocolError> {
        match read_frame(&mut self.inner).await? {
            Some(frame) => M::from_frame(frame).map(Some),
            None => Ok(None),
        }
    }
}

/// Writes typed messages to one side of the channel
pub struct MessageWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Write and flush a single message
    pub async fn send<M: WireMessage>(&mut self, message: &M) -> Result<(), ProtocolError> {
        let bytes = message.to_frame().to_bytes()?;
        self.inner.write_all(&bytes).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Close the underlying stream
    pub async fn shutdown(&mut self) -> Result<(), ProtocolError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
