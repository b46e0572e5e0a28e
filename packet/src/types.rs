// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use bincode::{
    config,
    error::{DecodeError, EncodeError},
    Decode, Encode,
};
use thiserror::Error;

use crate::PacketId;

/// A complete, typed Bancho packet payload.
///
/// [`serialize`](Self::serialize) appends a full frame (header
/// included) to `dst`; [`deserialize_no_hdr`](Self::deserialize_no_hdr)
/// decodes a payload that has already been split out of the stream by
/// [`crate::PacketReader`].
pub trait BanchoPacket:
    std::fmt::Debug + PartialEq + Clone + Default + bincode::Encode + bincode::Decode + 'static
{
    const ID: PacketId;

    fn serialize(&self, dst: &mut Vec<u8>) -> Result<usize, PacketSerializeError> {
        let start = dst.len();
        // reserve size for header
        dst.resize(start + Header::SIZE, 0u8);
        // serialize into the rest of the vector
        let payload_len = bincode::encode_into_std_write(self, dst, config::legacy())?;
        let len: u32 = payload_len
            .try_into()
            .map_err(|_| PacketSerializeError::PayloadTooLong { payload_len })?;
        let hdr = Header::new(Self::ID, len);
        hdr.serialize(&mut dst[start..start + Header::SIZE])?;
        Ok(Header::SIZE + payload_len)
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.serialize(&mut bytes)
            .expect("in-memory frame serialization failed");
        bytes
    }

    fn deserialize_no_hdr(data: &[u8]) -> Result<Self, PacketDeserializeError> {
        let (obj, len) = bincode::decode_from_slice::<Self, _>(data, config::legacy())?;
        if len != data.len() {
            return Err(PacketDeserializeError::PacketTooLong {
                len: data.len(),
                parsed: len,
            });
        }
        Ok(obj)
    }
}

#[macro_export]
macro_rules! impl_bancho_packet {
    ($pkt:ident, $id:ident) => {
        impl $crate::BanchoPacket for $pkt {
            const ID: $crate::PacketId = $crate::PacketId::$id;
        }
    };
}

/// The 7-byte frame header: packet id, one zero pad byte, payload
/// length. All little-endian.
#[derive(Debug, PartialEq, Encode, Decode)]
pub struct Header {
    pub id: u16,
    pub pad: u8,
    pub len: u32,
}

impl Header {
    pub const SIZE: usize = 7;

    pub fn new(id: PacketId, len: u32) -> Header {
        Header {
            id: id.into(),
            pad: 0,
            len,
        }
    }

    pub fn serialize(&self, dst: &mut [u8]) -> Result<usize, EncodeError> {
        let hdr_len = bincode::encode_into_slice(self, dst, config::legacy())?;
        debug_assert_eq!(hdr_len, Header::SIZE);
        Ok(hdr_len)
    }

    pub fn deserialize(src: &[u8]) -> Result<Self, DecodeError> {
        let (hdr, len) = bincode::decode_from_slice::<Header, _>(src, config::legacy())?;
        debug_assert_eq!(len, Header::SIZE);
        Ok(hdr)
    }
}

#[derive(Error, Debug)]
pub enum PacketSerializeError {
    #[error("Payload is too long ({payload_len:#x}). Doesn't fit the u32 length field")]
    PayloadTooLong { payload_len: usize },
    #[error("Serialize failed: {0}")]
    SerializeError(#[from] EncodeError),
}

#[derive(Error, Debug)]
pub enum PacketDeserializeError {
    #[error("Packet is too long. Frame carries {len} bytes, but only {parsed} could be parsed")]
    PacketTooLong { len: usize, parsed: usize },
    #[error("Deserialize failed ({0})")]
    DeserializeError(#[from] DecodeError),
}
