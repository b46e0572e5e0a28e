// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use packet::pkt_server::{UserPresence, UserStats};
use packet::{Action, BanchoPacket, Mode, Privileges};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::geoloc::Geolocation;

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Lowercased, trimmed, whitespace collapsed to underscores. Unique
/// across all accounts.
pub fn safe_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

pub fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

#[derive(Debug, Default, Clone)]
pub struct UserStatus {
    pub action: Action,
    pub action_text: String,
    pub action_md5: String,
    pub mods: u32,
    pub mode: Mode,
    pub beatmap_id: i32,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ModeStats {
    pub ranked_score: u64,
    pub total_score: u64,
    pub pp: u32,
    /// Percentage, 0.0 to 100.0; divided by 100 on the wire.
    pub accuracy: f32,
    pub playcount: u32,
    pub playtime: u32,
    pub max_combo: u32,
    pub total_hits: u32,
    pub rank: i32,
}

pub struct SessionConfig {
    pub user_id: i32,
    pub username: String,
    pub token: String,
    pub osu_version: String,
    pub utc_offset: i32,
    pub pm_private: bool,
    pub privileges: Privileges,
    pub geo: Geolocation,
    pub silence_end: u64,
    pub is_bot: bool,
}

/// One live login. Identity fields never change after creation; the
/// mutable state sits behind its own locks so that other sessions'
/// request tasks can append to the outbound queue or read presence
/// without coordinating with this session's task.
pub struct Session {
    pub user_id: i32,
    pub username: String,
    pub username_safe: String,
    pub token: String,
    pub osu_version: String,
    pub utc_offset: i32,
    pub geo: Geolocation,
    pub is_bot: bool,
    pub login_time: u64,

    pub privileges: AtomicU32,
    pub pm_private: AtomicBool,
    pub in_lobby: AtomicBool,
    pub silence_end: AtomicU64,
    pub latest_activity: AtomicU64,

    pub status: Mutex<UserStatus>,
    pub stats: Mutex<[ModeStats; 4]>,
    pub friends: Mutex<HashSet<i32>>,
    pub blocks: Mutex<HashSet<i32>>,
    /// Channel names this session is a member of. Kept in sync with
    /// `Channel::users` at all times.
    pub channels: Mutex<HashSet<String>>,
    /// Host id of the watch party this session is in. Hosts point at
    /// themselves.
    pub watch_party: Mutex<Option<i32>>,

    queue: Mutex<Vec<u8>>,
}

impl Session {
    pub fn new(cfg: SessionConfig) -> Session {
        let now = unix_now();
        Session {
            user_id: cfg.user_id,
            username_safe: safe_name(&cfg.username),
            username: cfg.username,
            token: cfg.token,
            osu_version: cfg.osu_version,
            utc_offset: cfg.utc_offset,
            geo: cfg.geo,
            is_bot: cfg.is_bot,
            login_time: now,
            privileges: AtomicU32::new(cfg.privileges.0),
            pm_private: AtomicBool::new(cfg.pm_private),
            in_lobby: AtomicBool::new(false),
            silence_end: AtomicU64::new(cfg.silence_end),
            latest_activity: AtomicU64::new(now),
            status: Mutex::new(UserStatus::default()),
            stats: Mutex::new([ModeStats::default(); 4]),
            friends: Mutex::new(HashSet::new()),
            blocks: Mutex::new(HashSet::new()),
            channels: Mutex::new(HashSet::new()),
            watch_party: Mutex::new(None),
            queue: Mutex::new(Vec::new()),
        }
    }

    pub fn privileges(&self) -> Privileges {
        Privileges(self.privileges.load(Ordering::Relaxed))
    }

    pub fn is_restricted(&self) -> bool {
        self.privileges().is_restricted()
    }

    pub fn is_silenced(&self) -> bool {
        unix_now() < self.silence_end.load(Ordering::Relaxed)
    }

    pub fn pm_private(&self) -> bool {
        self.pm_private.load(Ordering::Relaxed)
    }

    pub fn touch(&self) {
        self.latest_activity.store(unix_now(), Ordering::Relaxed);
    }

    /// Append raw frame bytes to the outbound queue. The bot consumes
    /// nothing; its queue stays empty.
    pub fn enqueue(&self, bytes: &[u8]) {
        if self.is_bot {
            return;
        }
        self.queue.lock().unwrap().extend_from_slice(bytes);
    }

    pub fn send(&self, pkt: &impl BanchoPacket) {
        self.enqueue(&pkt.to_bytes());
    }

    /// Take everything queued since the last poll.
    pub fn drain(&self) -> Vec<u8> {
        std::mem::take(&mut *self.queue.lock().unwrap())
    }

    /// Stats for the mode the session is currently playing. The bot
    /// reports a synthetic line instead of stored numbers.
    pub fn current_stats(&self) -> ModeStats {
        if self.is_bot {
            return ModeStats {
                pp: 2137,
                accuracy: 100.0,
                ..Default::default()
            };
        }
        let mode = self.status.lock().unwrap().mode;
        self.stats.lock().unwrap()[usize::from(u8::from(mode))]
    }

    pub fn presence_frame(&self) -> Vec<u8> {
        let stats = self.current_stats();
        UserPresence {
            user_id: self.user_id,
            username: self.username.as_str().into(),
            utc_offset: (self.utc_offset + 24) as u8,
            country_code: self.geo.country_code,
            privileges: self.privileges().0 as u8,
            longitude: self.geo.longitude,
            latitude: self.geo.latitude,
            rank: stats.rank,
        }
        .to_bytes()
    }

    pub fn stats_frame(&self) -> Vec<u8> {
        let status = self.status.lock().unwrap().clone();
        let stats = self.current_stats();
        UserStats {
            user_id: self.user_id,
            action: status.action.into(),
            action_text: status.action_text.into(),
            action_md5: status.action_md5.into(),
            mods: status.mods,
            mode: status.mode.into(),
            beatmap_id: status.beatmap_id,
            ranked_score: stats.ranked_score as i64,
            accuracy: stats.accuracy / 100.0,
            playcount: stats.playcount as i32,
            total_score: stats.total_score as i64,
            rank: stats.rank,
            pp: stats.pp as i32,
        }
        .to_bytes()
    }

    pub fn presence_and_stats(&self) -> Vec<u8> {
        let mut bytes = self.presence_frame();
        bytes.extend_from_slice(&self.stats_frame());
        bytes
    }
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (#{})", self.username, self.user_id)
    }
}
