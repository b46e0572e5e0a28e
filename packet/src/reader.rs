// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use thiserror::Error;

use crate::Header;

/// Borrowing cursor over one request body: a concatenation of Bancho
/// frames. [`read_header`](Self::read_header) and
/// [`read`](Self::read) advance the position; a truncated tail is a
/// typed error so a malformed trailing frame never panics the server.
#[derive(Debug)]
pub struct PacketReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Read the next 7-byte frame header, returning the raw packet id
    /// and the payload length. The id is left raw so that unknown ids
    /// can be logged and skipped rather than aborting the stream.
    pub fn read_header(&mut self) -> Result<(u16, u32), PacketReadError> {
        let bytes = self.read(Header::SIZE)?;
        let hdr = Header::deserialize(bytes).map_err(|_| PacketReadError::Truncated {
            wanted: Header::SIZE,
            remaining: 0,
        })?;
        Ok((hdr.id, hdr.len))
    }

    pub fn read(&mut self, len: usize) -> Result<&'a [u8], PacketReadError> {
        if self.remaining() < len {
            return Err(PacketReadError::Truncated {
                wanted: len,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum PacketReadError {
    #[error("truncated stream: wanted {wanted} more bytes, {remaining} left")]
    Truncated { wanted: usize, remaining: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkt_server::{LoginReply, Notification, SilenceEnd};
    use crate::{BanchoPacket, PacketId};

    #[test]
    fn frames_iterate_back_in_order() {
        let mut body = Vec::new();
        LoginReply { user_id: 3 }.serialize(&mut body).unwrap();
        Notification {
            message: "hello".into(),
        }
        .serialize(&mut body)
        .unwrap();
        SilenceEnd { seconds_left: 0 }.serialize(&mut body).unwrap();

        let mut reader = PacketReader::new(&body);
        let mut frames = Vec::new();
        while !reader.is_empty() {
            let (id, len) = reader.read_header().unwrap();
            let payload = reader.read(len as usize).unwrap();
            frames.push((id, payload.to_vec()));
        }

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].0, u16::from(PacketId::SrvLoginReply));
        assert_eq!(frames[1].0, u16::from(PacketId::SrvNotification));
        assert_eq!(frames[2].0, u16::from(PacketId::SrvSilenceEnd));
        assert_eq!(
            Notification::deserialize_no_hdr(&frames[1].1)
                .unwrap()
                .message
                .0,
            "hello"
        );
    }

    #[test]
    fn truncated_tail_is_reported() {
        let mut body = LoginReply { user_id: 3 }.to_bytes();
        body.truncate(body.len() - 2);

        let mut reader = PacketReader::new(&body);
        let (_, len) = reader.read_header().unwrap();
        assert_eq!(
            reader.read(len as usize),
            Err(PacketReadError::Truncated {
                wanted: 4,
                remaining: 2
            })
        );
    }
}
