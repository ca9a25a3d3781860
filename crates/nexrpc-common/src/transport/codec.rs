use bytes::{Buf, BufMut, BytesMut};
use std::sync::Arc;
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::error::{Result, RpcError};
use crate::protocol::{Request, Response};
use crate::transport::serializer::{Serializer, SerializerRegistry};

/// Constant identifying a NexRPC frame.
pub const MAGIC_NUMBER: u32 = 0xCAFE_BABE;

/// Size of the fixed frame header: magic, kind, serializer code, payload length.
pub const HEADER_LEN: usize = 16;

/// Maximum payload size (100 MB)
pub const MAX_FRAME_LEN: usize = 100 * 1024 * 1024;

/// Kind of message carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
}

impl MessageKind {
    pub fn code(&self) -> u32 {
        match self {
            MessageKind::Request => 0,
            MessageKind::Response => 1,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(MessageKind::Request),
            1 => Some(MessageKind::Response),
            _ => None,
        }
    }
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Request(_) => MessageKind::Request,
            Message::Response(_) => MessageKind::Response,
        }
    }
}

/// One wire frame: a message plus the plugin its payload is encoded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub serializer: Serializer,
    pub message: Message,
}

impl Frame {
    pub fn request(serializer: Serializer, request: Request) -> Self {
        Frame {
            serializer,
            message: Message::Request(request),
        }
    }

    pub fn response(serializer: Serializer, response: Response) -> Self {
        Frame {
            serializer,
            message: Message::Response(response),
        }
    }
}

/// Frame codec for NexRPC connections.
///
/// # Wire Protocol
///
/// Every message is sent as a 16-byte header followed by the payload. All
/// header fields are big-endian `u32`:
///
/// ```text
/// [magic 0xCAFEBABE] [kind] [serializer code] [payload length] [payload]
/// ```
///
/// The decoder never yields partial frames: it returns `Ok(None)` until the
/// header and the declared payload are fully buffered. A bad magic value, an
/// unknown kind or serializer code, or a payload above the configured limit
/// is a protocol violation, and the connection must be dropped.
///
/// # Example
///
/// ```
/// use bytes::BytesMut;
/// use nexrpc_common::protocol::Request;
/// use nexrpc_common::transport::{Frame, FrameCodec, Serializer};
/// use tokio_util::codec::{Decoder, Encoder};
///
/// let mut codec = FrameCodec::new();
/// let frame = Frame::request(Serializer::Json, Request::heartbeat());
///
/// let mut buf = BytesMut::new();
/// codec.encode(frame.clone(), &mut buf).unwrap();
/// assert_eq!(codec.decode(&mut buf).unwrap(), Some(frame));
/// ```
#[derive(Debug, Clone)]
pub struct FrameCodec {
    registry: Arc<SerializerRegistry>,
    max_frame_len: usize,
}

impl FrameCodec {
    /// Creates a codec accepting every built-in serializer.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(SerializerRegistry::new()))
    }

    pub fn with_registry(registry: Arc<SerializerRegistry>) -> Self {
        Self {
            registry,
            max_frame_len: MAX_FRAME_LEN,
        }
    }

    /// Sets the largest payload this codec will encode or accept.
    pub fn max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len > self.max_frame_len {
            return Err(RpcError::Protocol(format!(
                "Frame too large: {} bytes (max {} bytes)",
                len, self.max_frame_len
            )));
        }
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = RpcError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.len() < HEADER_LEN {
            src.reserve(HEADER_LEN - src.len());
            return Ok(None);
        }

        let mut header = &src[..HEADER_LEN];
        let magic = header.get_u32();
        let kind_code = header.get_u32();
        let serializer_code = header.get_u32();
        let len = header.get_u32() as usize;

        if magic != MAGIC_NUMBER {
            tracing::error!(magic, "Unrecognized frame magic");
            return Err(RpcError::Protocol(format!(
                "Unrecognized magic number {:#010x}",
                magic
            )));
        }
        let kind = MessageKind::from_code(kind_code).ok_or_else(|| {
            RpcError::Protocol(format!("Unrecognized message kind {}", kind_code))
        })?;
        let serializer = self.registry.get(serializer_code).ok_or_else(|| {
            RpcError::Protocol(format!("Unrecognized serializer code {}", serializer_code))
        })?;
        self.check_len(len)?;

        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(len);

        let message = match kind {
            MessageKind::Request => Message::Request(serializer.deserialize(&payload)?),
            MessageKind::Response => Message::Response(serializer.deserialize(&payload)?),
        };

        Ok(Some(Frame {
            serializer,
            message,
        }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = RpcError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let payload = match &frame.message {
            Message::Request(request) => frame.serializer.serialize(request)?,
            Message::Response(response) => frame.serializer.serialize(response)?,
        };
        self.check_len(payload.len())?;

        dst.reserve(HEADER_LEN + payload.len());
        dst.put_u32(MAGIC_NUMBER);
        dst.put_u32(frame.message.kind().code());
        dst.put_u32(frame.serializer.code());
        dst.put_u32(payload.len() as u32);
        dst.extend_from_slice(&payload);

        Ok(())
    }
}
