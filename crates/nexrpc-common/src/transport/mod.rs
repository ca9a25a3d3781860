//! NexRPC Transport Layer
//!
//! This module provides the wire codec, the payload serializer plugins and
//! the liveness primitives shared by clients and servers.
//!
//! # Architecture
//!
//! - **Transport**: long-lived TCP connections multiplexing many calls
//! - **Codec**: [`FrameCodec`], a `tokio_util` codec over a fixed 16-byte header
//! - **Payload**: encoded by the [`Serializer`] named in the frame header
//!
//! # Components
//!
//! - **[`FrameCodec`]** / **[`Frame`]**: frame and unframe protocol messages
//! - **[`Serializer`]** / **[`SerializerRegistry`]**: code-addressed payload plugins
//! - **[`LivenessSupervisor`]**: read/write idle tracking for heartbeats and eviction
//!
//! # Frame Size Limits
//!
//! Codecs reject payloads above 100 MB by default to prevent memory
//! exhaustion; see [`FrameCodec::max_frame_len`].

pub mod codec;
pub mod liveness;
pub mod serializer;

pub use codec::{Frame, FrameCodec, Message, MessageKind, HEADER_LEN, MAGIC_NUMBER, MAX_FRAME_LEN};
pub use liveness::{
    sleep_until_idle, IdleConfig, IdleEvent, LivenessSupervisor, DEFAULT_READ_IDLE,
    DEFAULT_WRITE_IDLE,
};
pub use serializer::{Serializer, SerializerRegistry};
