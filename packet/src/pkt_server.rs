// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

//! Frames the server emits. Layouts are byte-for-byte what the stable
//! osu! client expects; field order is load-bearing (note that
//! presence carries longitude before latitude).

use bincode::{Decode, Encode};

use crate::pkt_client::Message;
use crate::{impl_bancho_packet, IntList, OsuString, RawBytes};

/// The user id on success, or a negative error code (-1: wrong
/// credentials).
#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct LoginReply {
    pub user_id: i32,
}
impl_bancho_packet!(LoginReply, SrvLoginReply);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct ProtocolVersion {
    pub version: i32,
}
impl_bancho_packet!(ProtocolVersion, SrvProtocolVersion);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct Notification {
    pub message: OsuString,
}
impl_bancho_packet!(Notification, SrvNotification);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct SendMessage {
    pub msg: Message,
}
impl_bancho_packet!(SendMessage, SrvSendMessage);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct UserStats {
    pub user_id: i32,
    pub action: u8,
    pub action_text: OsuString,
    pub action_md5: OsuString,
    pub mods: u32,
    pub mode: u8,
    pub beatmap_id: i32,
    pub ranked_score: i64,
    /// Stored percentage divided by 100, i.e. 1.0 is 100%.
    pub accuracy: f32,
    pub playcount: i32,
    pub total_score: i64,
    pub rank: i32,
    pub pp: i32,
}
impl_bancho_packet!(UserStats, SrvUserStats);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct UserPresence {
    pub user_id: i32,
    pub username: OsuString,
    /// UTC offset shifted by +24 on the wire.
    pub utc_offset: u8,
    pub country_code: u8,
    pub privileges: u8,
    pub longitude: f32,
    pub latitude: f32,
    pub rank: i32,
}
impl_bancho_packet!(UserPresence, SrvUserPresence);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct UserLogout {
    pub user_id: i32,
    pub state: u8,
}
impl_bancho_packet!(UserLogout, SrvUserLogout);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct SpectatorJoined {
    pub user_id: i32,
}
impl_bancho_packet!(SpectatorJoined, SrvSpectatorJoined);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct SpectatorLeft {
    pub user_id: i32,
}
impl_bancho_packet!(SpectatorLeft, SrvSpectatorLeft);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct FellowSpectatorJoined {
    pub user_id: i32,
}
impl_bancho_packet!(FellowSpectatorJoined, SrvFellowSpectatorJoined);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct FellowSpectatorLeft {
    pub user_id: i32,
}
impl_bancho_packet!(FellowSpectatorLeft, SrvFellowSpectatorLeft);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct SpectateFrames {
    pub frames: RawBytes,
}
impl_bancho_packet!(SpectateFrames, SrvSpectateFrames);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct SpectatorCantSpectate {
    pub user_id: i32,
}
impl_bancho_packet!(SpectatorCantSpectate, SrvSpectatorCantSpectate);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct ChannelInfo {
    pub name: OsuString,
    pub topic: OsuString,
    pub user_count: i16,
}
impl_bancho_packet!(ChannelInfo, SrvChannelInfo);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct ChannelJoinSuccess {
    pub name: OsuString,
}
impl_bancho_packet!(ChannelJoinSuccess, SrvChannelJoinSuccess);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct ChannelKick {
    pub name: OsuString,
}
impl_bancho_packet!(ChannelKick, SrvChannelKick);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct ChannelInfoEnd {
    pub unused: u32,
}
impl_bancho_packet!(ChannelInfoEnd, SrvChannelInfoEnd);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct SilenceEnd {
    pub seconds_left: u32,
}
impl_bancho_packet!(SilenceEnd, SrvSilenceEnd);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct LoginPrivileges {
    pub privileges: u32,
}
impl_bancho_packet!(LoginPrivileges, SrvPrivileges);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct FriendsList {
    pub user_ids: IntList,
}
impl_bancho_packet!(FriendsList, SrvFriendsList);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct Restart {
    pub millis: i32,
}
impl_bancho_packet!(Restart, SrvRestart);

/// Message-shaped refusal: only the recipient field is populated with
/// the unreachable target's name.
#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct UserDmBlocked {
    pub msg: Message,
}
impl_bancho_packet!(UserDmBlocked, SrvUserDmBlocked);

impl UserDmBlocked {
    pub fn target(target: &str) -> Self {
        Self {
            msg: Message {
                target: target.into(),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct TargetIsSilenced {
    pub msg: Message,
}
impl_bancho_packet!(TargetIsSilenced, SrvTargetIsSilenced);

impl TargetIsSilenced {
    pub fn target(target: &str) -> Self {
        Self {
            msg: Message {
                target: target.into(),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BanchoPacket, Header};

    #[test]
    fn notification_wire_layout() {
        let bytes = Notification {
            message: "hi".into(),
        }
        .to_bytes();
        assert_eq!(bytes, [24, 0, 0, 4, 0, 0, 0, 0x0b, 2, b'h', b'i']);
    }

    #[test]
    fn user_stats_layout() {
        let pkt = UserStats {
            user_id: 3,
            action: 2,
            action_text: "song".into(),
            action_md5: "".into(),
            mods: 0,
            mode: 0,
            beatmap_id: 42,
            ranked_score: 1_000_000,
            accuracy: 0.9876,
            playcount: 17,
            total_score: 2_000_000,
            rank: 1,
            pp: 727,
        };
        let bytes = pkt.to_bytes();
        // 7 header + 4 + 1 + 6 + 1 + 4 + 1 + 4 + 8 + 4 + 4 + 8 + 4 + 4
        assert_eq!(bytes.len(), Header::SIZE + 53);
        assert_eq!(
            UserStats::deserialize_no_hdr(&bytes[Header::SIZE..]).unwrap(),
            pkt
        );
    }

    #[test]
    fn presence_writes_longitude_first() {
        let pkt = UserPresence {
            user_id: 1,
            username: "a".into(),
            utc_offset: 26,
            country_code: 184,
            privileges: 5,
            longitude: 125.762524,
            latitude: 39.039219,
            rank: 7,
        };
        let bytes = pkt.to_bytes();
        let lon = f32::from_le_bytes(bytes[Header::SIZE + 10..Header::SIZE + 14].try_into().unwrap());
        assert!((lon - 125.762524).abs() < f32::EPSILON);
    }

    #[test]
    fn dm_blocked_carries_only_the_target() {
        let bytes = UserDmBlocked::target("bob").to_bytes();
        let decoded = UserDmBlocked::deserialize_no_hdr(&bytes[Header::SIZE..]).unwrap();
        assert_eq!(&*decoded.msg.target, "bob");
        assert!(decoded.msg.sender.is_empty());
        assert_eq!(decoded.msg.sender_id, 0);
    }
}
