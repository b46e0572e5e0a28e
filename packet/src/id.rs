// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Every packet id the stable osu! client speaks. `Osu*` ids arrive
/// from the client, `Srv*` ids are emitted by the server. The numeric
/// gaps are the protocol's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum PacketId {
    OsuChangeAction = 0,
    OsuSendPublicMessage = 1,
    OsuLogout = 2,
    OsuRequestStatusUpdate = 3,
    OsuHeartbeat = 4,
    SrvLoginReply = 5,
    SrvSendMessage = 7,
    SrvHeartbeat = 8,
    SrvUserStats = 11,
    SrvUserLogout = 12,
    SrvSpectatorJoined = 13,
    SrvSpectatorLeft = 14,
    SrvSpectateFrames = 15,
    OsuStartSpectating = 16,
    OsuStopSpectating = 17,
    OsuSpectateFrames = 18,
    SrvVersionUpdate = 19,
    OsuErrorReport = 20,
    OsuCantSpectate = 21,
    SrvSpectatorCantSpectate = 22,
    SrvGetAttention = 23,
    SrvNotification = 24,
    OsuSendPrivateMessage = 25,
    SrvUpdateMatch = 26,
    SrvNewMatch = 27,
    SrvDisposeMatch = 28,
    OsuPartLobby = 29,
    OsuJoinLobby = 30,
    OsuCreateMatch = 31,
    OsuJoinMatch = 32,
    OsuPartMatch = 33,
    SrvToggleBlockNonFriendDms = 34,
    SrvMatchJoinSuccess = 36,
    SrvMatchJoinFail = 37,
    OsuMatchChangeSlot = 38,
    OsuMatchReady = 39,
    OsuMatchLock = 40,
    OsuMatchChangeSettings = 41,
    SrvFellowSpectatorJoined = 42,
    SrvFellowSpectatorLeft = 43,
    OsuMatchStart = 44,
    SrvAllPlayersLoaded = 45,
    SrvMatchStart = 46,
    OsuMatchScoreUpdate = 47,
    SrvMatchScoreUpdate = 48,
    OsuMatchComplete = 49,
    SrvMatchTransferHost = 50,
    OsuMatchChangeMods = 51,
    OsuMatchLoadComplete = 52,
    SrvMatchAllPlayersLoaded = 53,
    OsuMatchNoBeatmap = 54,
    OsuMatchUnready = 55,
    OsuMatchFailed = 56,
    SrvMatchPlayerFailed = 57,
    SrvMatchComplete = 58,
    OsuMatchHasBeatmap = 59,
    OsuMatchSkipRequest = 60,
    SrvMatchSkip = 61,
    OsuChannelJoin = 63,
    SrvChannelJoinSuccess = 64,
    SrvChannelInfo = 65,
    SrvChannelKick = 66,
    SrvChannelAutoJoin = 67,
    OsuBeatmapInfoRequest = 68,
    SrvBeatmapInfoReply = 69,
    OsuMatchTransferHost = 70,
    SrvPrivileges = 71,
    SrvFriendsList = 72,
    OsuFriendAdd = 73,
    OsuFriendRemove = 74,
    SrvProtocolVersion = 75,
    SrvMainMenuIcon = 76,
    OsuMatchChangeTeam = 77,
    OsuChannelPart = 78,
    OsuReceiveUpdates = 79,
    SrvMatchPlayerSkipped = 81,
    OsuSetAwayMessage = 82,
    SrvUserPresence = 83,
    OsuUserStatsRequest = 85,
    SrvRestart = 86,
    OsuMatchInvite = 87,
    SrvMatchInvite = 88,
    SrvChannelInfoEnd = 89,
    OsuMatchChangePassword = 90,
    SrvMatchChangePassword = 91,
    SrvSilenceEnd = 92,
    OsuTournamentMatchInfoRequest = 93,
    SrvUserSilenced = 94,
    SrvUserPresenceSingle = 95,
    SrvUserPresenceBundle = 96,
    OsuUserPresenceRequest = 97,
    OsuUserPresenceRequestAll = 98,
    OsuToggleBlockNonFriendDms = 99,
    SrvUserDmBlocked = 100,
    SrvTargetIsSilenced = 101,
    SrvVersionUpdateForced = 102,
    SrvSwitchServer = 103,
    SrvAccountRestricted = 104,
    SrvRtx = 105,
    SrvMatchAbort = 106,
    SrvSwitchTournamentServer = 107,
    OsuTournamentJoinMatchChannel = 108,
    OsuTournamentLeaveMatchChannel = 109,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_conversions() {
        assert_eq!(PacketId::try_from(83u16), Ok(PacketId::SrvUserPresence));
        assert_eq!(u16::from(PacketId::SrvUserStats), 11);
        // 6, 35, 62, 80, 84 are holes in the protocol's id space
        for hole in [6u16, 35, 62, 80, 84, 110, 9999] {
            assert!(PacketId::try_from(hole).is_err());
        }
    }
}
