// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

//! Payloads the game client sends. Fields are kept at wire width;
//! converting e.g. the raw action byte into [`crate::Action`] is the
//! dispatcher's job so that a bad value is a handled error, not a
//! decode abort.

use bincode::{Decode, Encode};

use crate::{impl_bancho_packet, IntList, OsuString, RawBytes};

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct ChangeAction {
    pub action: u8,
    pub action_text: OsuString,
    pub action_md5: OsuString,
    pub mods: u32,
    pub mode: u8,
    pub beatmap_id: i32,
}
impl_bancho_packet!(ChangeAction, OsuChangeAction);

/// Shared shape of public and private chat messages. The sender field
/// is blank on the way in; the server fills it on fan-out.
#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct Message {
    pub sender: OsuString,
    pub body: OsuString,
    pub target: OsuString,
    pub sender_id: i32,
}

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct PublicMessage {
    pub msg: Message,
}
impl_bancho_packet!(PublicMessage, OsuSendPublicMessage);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct PrivateMessage {
    pub msg: Message,
}
impl_bancho_packet!(PrivateMessage, OsuSendPrivateMessage);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct StartSpectating {
    pub target_id: i32,
}
impl_bancho_packet!(StartSpectating, OsuStartSpectating);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct SpectateFrames {
    pub frames: RawBytes,
}
impl_bancho_packet!(SpectateFrames, OsuSpectateFrames);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct ChannelJoin {
    pub name: OsuString,
}
impl_bancho_packet!(ChannelJoin, OsuChannelJoin);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct ChannelPart {
    pub name: OsuString,
}
impl_bancho_packet!(ChannelPart, OsuChannelPart);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct FriendAdd {
    pub user_id: i32,
}
impl_bancho_packet!(FriendAdd, OsuFriendAdd);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct FriendRemove {
    pub user_id: i32,
}
impl_bancho_packet!(FriendRemove, OsuFriendRemove);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct StatsRequest {
    pub user_ids: IntList,
}
impl_bancho_packet!(StatsRequest, OsuUserStatsRequest);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct PresenceRequest {
    pub user_ids: IntList,
}
impl_bancho_packet!(PresenceRequest, OsuUserPresenceRequest);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct ReceiveUpdates {
    pub filter: i32,
}
impl_bancho_packet!(ReceiveUpdates, OsuReceiveUpdates);

#[derive(Debug, Default, Clone, PartialEq, Encode, Decode)]
pub struct ToggleBlockNonFriendDms {
    pub value: i32,
}
impl_bancho_packet!(ToggleBlockNonFriendDms, OsuToggleBlockNonFriendDms);
