// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use std::ops::{Deref, DerefMut};

use bincode::{
    de::{read::Reader, BorrowDecoder, Decoder},
    enc::{write::Writer, Encoder},
    error::{DecodeError, EncodeError},
    BorrowDecode, Decode, Encode,
};

pub(crate) fn write_uleb128<W: Writer>(writer: &mut W, mut value: u64) -> Result<(), EncodeError> {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        writer.write(&[byte])?;
        if value == 0 {
            return Ok(());
        }
    }
}

pub(crate) fn read_uleb128<R: Reader>(reader: &mut R) -> Result<u64, DecodeError> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    loop {
        let mut byte = [0u8; 1];
        reader.read(&mut byte)?;
        value |= ((byte[0] & 0x7f) as u64) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift > 63 {
            return Err(DecodeError::Other("uleb128 value does not fit in 64 bits"));
        }
    }
}

/// The Bancho string: one discriminator byte, `0x00` for the empty
/// string or `0x0b` followed by a ULEB128 byte length and UTF-8 data.
/// Any other discriminator is a decode error.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OsuString(pub String);

impl Encode for OsuString {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        if self.0.is_empty() {
            return encoder.writer().write(&[0x00]);
        }
        encoder.writer().write(&[0x0b])?;
        write_uleb128(encoder.writer(), self.0.len() as u64)?;
        encoder.writer().write(self.0.as_bytes())
    }
}

impl Decode for OsuString {
    fn decode<D: Decoder>(decoder: &mut D) -> Result<Self, DecodeError> {
        let mut prefix = [0u8; 1];
        decoder.reader().read(&mut prefix)?;
        match prefix[0] {
            0x00 => Ok(Self(String::new())),
            0x0b => {
                let len = read_uleb128(decoder.reader())? as usize;
                decoder.claim_bytes_read(len)?;
                let mut bytes = vec![0u8; len];
                decoder.reader().read(&mut bytes)?;
                let str = String::from_utf8(bytes)
                    .map_err(|e| DecodeError::Utf8 { inner: e.utf8_error() })?;
                Ok(Self(str))
            }
            _ => Err(DecodeError::Other("invalid string discriminator byte")),
        }
    }
}

impl<'a> BorrowDecode<'a> for OsuString {
    fn borrow_decode<D: BorrowDecoder<'a>>(decoder: &mut D) -> Result<Self, DecodeError> {
        Self::decode(decoder)
    }
}

impl From<String> for OsuString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for OsuString {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Deref for OsuString {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for OsuString {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// A u16 element count followed by that many i32 values.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IntList(pub Vec<i32>);

impl Encode for IntList {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        encoder
            .writer()
            .write(&(self.0.len() as u16).to_le_bytes())?;
        for value in &self.0 {
            encoder.writer().write(&value.to_le_bytes())?;
        }
        Ok(())
    }
}

impl Decode for IntList {
    fn decode<D: Decoder>(decoder: &mut D) -> Result<Self, DecodeError> {
        let mut lenbuf = [0u8; 2];
        decoder.reader().read(&mut lenbuf)?;
        let len = u16::from_le_bytes(lenbuf) as usize;

        decoder.claim_bytes_read(len * 4)?;
        let mut vec = Vec::with_capacity(len);
        for _ in 0..len {
            let mut intbuf = [0u8; 4];
            decoder.reader().read(&mut intbuf)?;
            vec.push(i32::from_le_bytes(intbuf));
        }
        Ok(Self(vec))
    }
}

impl<'a> BorrowDecode<'a> for IntList {
    fn borrow_decode<D: BorrowDecoder<'a>>(decoder: &mut D) -> Result<Self, DecodeError> {
        Self::decode(decoder)
    }
}

impl From<Vec<i32>> for IntList {
    fn from(value: Vec<i32>) -> Self {
        Self(value)
    }
}

impl Deref for IntList {
    type Target = Vec<i32>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Opaque bytes spanning the rest of the payload. Encodes without any
/// length prefix; decoding consumes every remaining source byte.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RawBytes(pub Vec<u8>);

impl Encode for RawBytes {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        encoder.writer().write(&self.0)
    }
}

impl Decode for RawBytes {
    fn decode<D: Decoder>(decoder: &mut D) -> Result<Self, DecodeError> {
        // The decoder does not expose the remaining length directly;
        // probe with an oversized read and let UnexpectedEnd tell us.
        const FULL_PACKET_SIZE: usize = 65536 + 1;
        let mut unused_buf = [0u8; FULL_PACKET_SIZE];
        let len = match decoder.reader().read(&mut unused_buf) {
            Err(DecodeError::UnexpectedEnd { additional }) => {
                debug_assert!(additional <= FULL_PACKET_SIZE);
                FULL_PACKET_SIZE - additional
            }
            Err(err) => return Err(err),
            Ok(_) => {
                return Err(DecodeError::Other("payload has no end"));
            }
        };

        decoder.claim_bytes_read(len)?;
        let mut vec = vec![0u8; len];
        decoder.reader().read(&mut vec)?;
        Ok(Self(vec))
    }
}

impl<'a> BorrowDecode<'a> for RawBytes {
    fn borrow_decode<D: BorrowDecoder<'a>>(decoder: &mut D) -> Result<Self, DecodeError> {
        Self::decode(decoder)
    }
}

impl From<Vec<u8>> for RawBytes {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for RawBytes {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl Deref for RawBytes {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bincode::config;

    fn roundtrip<T: Encode + Decode + PartialEq + std::fmt::Debug + Clone>(value: T) {
        let bytes = bincode::encode_to_vec(value.clone(), config::legacy()).unwrap();
        let (decoded, len) = bincode::decode_from_slice::<T, _>(&bytes, config::legacy()).unwrap();
        assert_eq!(len, bytes.len());
        assert_eq!(decoded, value);
    }

    #[test]
    fn scalar_roundtrips() {
        roundtrip(0x5au8);
        roundtrip(-5i8);
        roundtrip(0xbeefu16);
        roundtrip(-12345i16);
        roundtrip(0xdeadbeefu32);
        roundtrip(i32::MIN);
        roundtrip(u64::MAX);
        roundtrip(i64::MIN);
        roundtrip(19.0760f32);
    }

    #[test]
    fn scalars_are_little_endian() {
        let bytes = bincode::encode_to_vec(0x0102_0304u32, config::legacy()).unwrap();
        assert_eq!(bytes, [0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn empty_string_is_a_single_zero_byte() {
        let bytes = bincode::encode_to_vec(OsuString("".into()), config::legacy()).unwrap();
        assert_eq!(bytes, [0x00]);
    }

    #[test]
    fn string_roundtrips() {
        for s in ["", "hi", "#osu", "Męski oszuścik", &"x".repeat(300)] {
            roundtrip(OsuString(s.to_owned()));
        }
    }

    #[test]
    fn string_wire_layout() {
        let bytes = bincode::encode_to_vec(OsuString("osu!".into()), config::legacy()).unwrap();
        assert_eq!(bytes, [0x0b, 4, b'o', b's', b'u', b'!']);
    }

    #[test]
    fn long_string_uses_multibyte_length() {
        let s = "a".repeat(200);
        let bytes = bincode::encode_to_vec(OsuString(s.clone()), config::legacy()).unwrap();
        // 200 = 0xc8 -> uleb128 [0xc8, 0x01]
        assert_eq!(&bytes[..3], &[0x0b, 0xc8, 0x01]);
        assert_eq!(bytes.len(), 3 + 200);
        roundtrip(OsuString(s));
    }

    #[test]
    fn zero_prefix_decodes_to_empty() {
        let (s, len) =
            bincode::decode_from_slice::<OsuString, _>(&[0x00], config::legacy()).unwrap();
        assert_eq!(len, 1);
        assert_eq!(&*s, "");
    }

    #[test]
    fn bad_string_prefix_is_an_error() {
        let err = bincode::decode_from_slice::<OsuString, _>(&[0x42, 0x01], config::legacy());
        assert!(err.is_err());
    }

    #[test]
    fn int_list_roundtrip() {
        roundtrip(IntList(vec![]));
        roundtrip(IntList(vec![1]));
        roundtrip(IntList(vec![1, -1, i32::MAX, i32::MIN, 2137]));
    }

    #[test]
    fn int_list_wire_layout() {
        let bytes = bincode::encode_to_vec(IntList(vec![1, 2]), config::legacy()).unwrap();
        assert_eq!(bytes, [2, 0, 1, 0, 0, 0, 2, 0, 0, 0]);
    }

    #[test]
    fn raw_bytes_consume_everything() {
        let (raw, len) =
            bincode::decode_from_slice::<RawBytes, _>(&[1, 2, 3, 4, 5], config::legacy()).unwrap();
        assert_eq!(len, 5);
        assert_eq!(&*raw, &[1, 2, 3, 4, 5]);

        let (raw, _) = bincode::decode_from_slice::<RawBytes, _>(&[], config::legacy()).unwrap();
        assert!(raw.is_empty());
    }
}
