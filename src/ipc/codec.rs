//! Basic codec for message bodies.
//!
//! Every message starts with an 8-byte header:
//! ```text
//! word0 (u32 LE) = version(8) | service(8) | request(8) | message_type(8)
//! word1 (u32 LE) = sequence
//! ```
//! followed by the arguments or results, each encoded little-endian.
//! Binaries and strings carry a `u32` length prefix.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::types::CodecError;

/// Codec version carried in the top byte of every header.
pub const CODEC_VERSION: u8 = 1;

/// Encoded size of [`MessageHeader`].
pub const MESSAGE_HEADER_LEN: usize = 8;

/// Kind of message carried in a frame.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MessageType {
    /// Call that expects a reply.
    Invocation = 0,
    /// Call without a reply.
    Oneway = 1,
    /// Reply to an invocation.
    Reply = 2,
    Notification = 3,
}

impl TryFrom<u8> for MessageType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageType::Invocation),
            1 => Ok(MessageType::Oneway),
            2 => Ok(MessageType::Reply),
            3 => Ok(MessageType::Notification),
            other => Err(CodecError::InvalidMessageType(other)),
        }
    }
}

/// Routing information at the front of every message.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MessageHeader {
    pub message_type: MessageType,
    pub service: u8,
    pub request: u8,
    pub sequence: u32,
}

impl MessageHeader {
    /// Header of the reply answering this invocation.
    pub fn reply(&self) -> Self {
        Self {
            message_type: MessageType::Reply,
            ..*self
        }
    }

    fn to_word(self) -> u32 {
        (u32::from(CODEC_VERSION) << 24)
            | (u32::from(self.service) << 16)
            | (u32::from(self.request) << 8)
            | self.message_type as u32
    }
}

/// Writes a message into a growable buffer.
#[derive(Debug, Default)]
pub struct BasicEncoder {
    buf: BytesMut,
}

macro_rules! encode_scalar {
    ($($name:ident => $ty:ty, $put:ident;)*) => {
        $(
            pub fn $name(&mut self, value: $ty) {
                self.buf.$put(value);
            }
        )*
    };
}

impl BasicEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a message with its header.
    pub fn with_header(header: &MessageHeader) -> Self {
        let mut encoder = Self {
            buf: BytesMut::with_capacity(64),
        };
        encoder.write_header(header);
        encoder
    }

    pub fn write_header(&mut self, header: &MessageHeader) {
        self.write_u32(header.to_word());
        self.write_u32(header.sequence);
    }

    encode_scalar! {
        write_u8 => u8, put_u8;
        write_i8 => i8, put_i8;
        write_u16 => u16, put_u16_le;
        write_i16 => i16, put_i16_le;
        write_u32 => u32, put_u32_le;
        write_i32 => i32, put_i32_le;
        write_u64 => u64, put_u64_le;
        write_i64 => i64, put_i64_le;
        write_f32 => f32, put_f32_le;
        write_f64 => f64, put_f64_le;
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    pub fn write_binary(&mut self, data: &[u8]) -> Result<(), CodecError> {
        self.write_length(data.len())?;
        self.buf.put_slice(data);
        Ok(())
    }

    pub fn write_str(&mut self, value: &str) -> Result<(), CodecError> {
        self.write_binary(value.as_bytes())
    }

    pub fn start_write_list(&mut self, length: usize) -> Result<(), CodecError> {
        self.write_length(length)
    }

    pub fn start_write_union(&mut self, discriminator: i32) {
        self.write_i32(discriminator);
    }

    pub fn write_null_flag(&mut self, is_null: bool) {
        self.write_u8(u8::from(is_null));
    }

    /// Encode `callback` as its index in `callbacks`. A table with a single
    /// entry needs no bytes on the wire.
    pub fn write_callback<T: PartialEq>(
        &mut self,
        callbacks: &[T],
        callback: &T,
    ) -> Result<(), CodecError> {
        let index = callbacks
            .iter()
            .position(|candidate| candidate == callback)
            .ok_or(CodecError::InvalidCallback)?;
        if callbacks.len() > 1 {
            let index = u8::try_from(index).map_err(|_| CodecError::InvalidCallback)?;
            self.write_u8(index);
        }
        Ok(())
    }

    fn write_length(&mut self, length: usize) -> Result<(), CodecError> {
        let length = u32::try_from(length).map_err(|_| CodecError::LengthOverflow(length))?;
        self.write_u32(length);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Reads a message body; every read checks the remaining length first.
#[derive(Debug, Clone)]
pub struct BasicDecoder {
    buf: Bytes,
}

macro_rules! decode_scalar {
    ($($name:ident => $ty:ty, $get:ident;)*) => {
        $(
            pub fn $name(&mut self) -> Result<$ty, CodecError> {
                self.ensure(std::mem::size_of::<$ty>())?;
                Ok(self.buf.$get())
            }
        )*
    };
}

impl BasicDecoder {
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self { buf: buf.into() }
    }

    /// Decode the header at the front of a message.
    pub fn read_header(&mut self) -> Result<MessageHeader, CodecError> {
        let word = self.read_u32()?;
        let sequence = self.read_u32()?;
        let [version, service, request, message_type] = word.to_be_bytes();
        if version != CODEC_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        Ok(MessageHeader {
            message_type: MessageType::try_from(message_type)?,
            service,
            request,
            sequence,
        })
    }

    decode_scalar! {
        read_u8 => u8, get_u8;
        read_i8 => i8, get_i8;
        read_u16 => u16, get_u16_le;
        read_i16 => i16, get_i16_le;
        read_u32 => u32, get_u32_le;
        read_i32 => i32, get_i32_le;
        read_u64 => u64, get_u64_le;
        read_i64 => i64, get_i64_le;
        read_f32 => f32, get_f32_le;
        read_f64 => f64, get_f64_le;
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_binary(&mut self) -> Result<Bytes, CodecError> {
        let length = self.read_u32()? as usize;
        self.ensure(length)?;
        Ok(self.buf.split_to(length))
    }

    pub fn read_str(&mut self) -> Result<String, CodecError> {
        let raw = self.read_binary()?;
        Ok(std::str::from_utf8(&raw)?.to_owned())
    }

    pub fn start_read_list(&mut self) -> Result<usize, CodecError> {
        Ok(self.read_u32()? as usize)
    }

    pub fn start_read_union(&mut self) -> Result<i32, CodecError> {
        self.read_i32()
    }

    pub fn read_null_flag(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? != 0)
    }

    /// Inverse of [`BasicEncoder::write_callback`].
    pub fn read_callback<T: Clone>(&mut self, callbacks: &[T]) -> Result<T, CodecError> {
        let index = match callbacks.len() {
            0 => return Err(CodecError::InvalidCallback),
            1 => 0,
            _ => usize::from(self.read_u8()?),
        };
        callbacks
            .get(index)
            .cloned()
            .ok_or(CodecError::InvalidCallback)
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), CodecError> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(CodecError::NotEnoughData { needed, remaining });
        }
        Ok(())
    }
}
