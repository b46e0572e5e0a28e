// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::{debug, info};
use packet::pkt_server::{ChannelInfo, ChannelJoinSuccess, ChannelKick};
use packet::{BanchoPacket, Privileges};

use super::session::Session;
use super::AppState;
use crate::store::ChannelRow;

/// Channels the client "parts" as a side effect of its UI but which
/// are not real channels here.
const IGNORED_CHANNELS: &[&str] = &["#userlog", "#highlight"];

#[derive(Debug, Clone)]
pub struct Channel {
    pub name: String,
    pub topic: String,
    pub read_privs: Privileges,
    pub write_privs: Privileges,
    pub auto_join: bool,
    pub temporary: bool,
    /// Membership in join order. Mirrored by `Session::channels`.
    pub users: Vec<i32>,
}

impl Channel {
    pub fn from_row(row: ChannelRow) -> Self {
        Self {
            name: row.name,
            topic: row.topic,
            read_privs: Privileges(row.read_privs),
            write_privs: Privileges(row.write_privs),
            auto_join: row.auto_join,
            temporary: false,
            users: Vec::new(),
        }
    }

    /// A temporary watch-party room; deleted once the last member
    /// leaves.
    pub fn spectator(host_id: i32) -> Self {
        Self {
            name: spec_channel_name(host_id),
            topic: "Watch together.".to_owned(),
            read_privs: Privileges::PLAYER,
            write_privs: Privileges::PLAYER,
            auto_join: false,
            temporary: true,
            users: Vec::new(),
        }
    }

    pub fn can_read(&self, privs: Privileges) -> bool {
        self.read_privs.intersects(privs)
    }

    pub fn can_write(&self, privs: Privileges) -> bool {
        self.write_privs.intersects(privs)
    }

    /// Instanced channels present themselves to the client under a
    /// generic name.
    pub fn display_name(&self) -> &str {
        if self.name.starts_with("#spec_") {
            "#spectator"
        } else if self.name.starts_with("#multi_") {
            "#multiplayer"
        } else {
            &self.name
        }
    }

    pub fn info_frame(&self) -> Vec<u8> {
        ChannelInfo {
            name: self.display_name().into(),
            topic: self.topic.as_str().into(),
            user_count: self.users.len() as i16,
        }
        .to_bytes()
    }
}

pub fn spec_channel_name(host_id: i32) -> String {
    format!("#spec_{host_id}")
}

pub struct Channels {
    inner: RwLock<HashMap<String, Channel>>,
}

impl Channels {
    pub fn new(rows: Vec<ChannelRow>) -> Self {
        let inner = rows
            .into_iter()
            .map(Channel::from_row)
            .map(|ch| (ch.name.clone(), ch))
            .collect();
        Self {
            inner: RwLock::new(inner),
        }
    }

    pub fn insert(&self, channel: Channel) {
        self.inner
            .write()
            .unwrap()
            .insert(channel.name.clone(), channel);
    }

    pub fn get(&self, name: &str) -> Option<Channel> {
        self.inner.read().unwrap().get(name).cloned()
    }

    /// Info frames for every auto-join channel `privs` may read, in a
    /// stable order, paired with each channel's read privileges so the
    /// caller can fan the frame out to other eligible sessions.
    pub fn auto_join_infos(&self, privs: Privileges) -> Vec<(Privileges, Vec<u8>)> {
        let inner = self.inner.read().unwrap();
        let mut channels: Vec<&Channel> = inner
            .values()
            .filter(|ch| ch.auto_join && ch.can_read(privs))
            .collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        channels
            .iter()
            .map(|ch| (ch.read_privs, ch.info_frame()))
            .collect()
    }
}

/// Join `session` to the channel. Permission: the channel's read bits
/// must intersect the session's privileges, and `#lobby` additionally
/// requires the client to have entered the multiplayer lobby.
pub fn join(state: &AppState, session: &Arc<Session>, name: &str) -> bool {
    let info = {
        let mut map = state.channels.inner.write().unwrap();
        let Some(channel) = map.get_mut(name) else {
            debug!("{session}: tried to join nonexistent channel {name}");
            return false;
        };
        if !channel.can_read(session.privileges()) {
            info!("{session}: no read privileges for {name}");
            return false;
        }
        if name == "#lobby" && !session.in_lobby.load(std::sync::atomic::Ordering::Relaxed) {
            debug!("{session}: joining #lobby while not in the lobby");
            return false;
        }

        if !channel.users.contains(&session.user_id) {
            channel.users.push(session.user_id);
        }
        session
            .channels
            .lock()
            .unwrap()
            .insert(name.to_owned());

        session.send(&ChannelJoinSuccess {
            name: channel.display_name().into(),
        });
        channel.info_frame()
    };

    broadcast_info(state, name, &info);
    true
}

/// Remove `session` from the channel. A kick additionally tells the
/// client to close its tab. Empty temporary channels are deleted.
pub fn part(state: &AppState, session: &Arc<Session>, name: &str, kick: bool) {
    if IGNORED_CHANNELS.contains(&name) {
        return;
    }

    let info = {
        let mut map = state.channels.inner.write().unwrap();
        session.channels.lock().unwrap().remove(name);
        let Some(channel) = map.get_mut(name) else {
            return;
        };
        channel.users.retain(|&uid| uid != session.user_id);

        if kick {
            session.send(&ChannelKick {
                name: channel.display_name().into(),
            });
        }

        if channel.temporary && channel.users.is_empty() {
            info!("deleting empty temporary channel {name}");
            map.remove(name);
            return;
        }
        channel.info_frame()
    };

    broadcast_info(state, name, &info);
}

/// Fan the channel's info frame out to every session allowed to read
/// it, so user counts stay current.
fn broadcast_info(state: &AppState, name: &str, info: &[u8]) {
    let Some(read_privs) = state
        .channels
        .inner
        .read()
        .unwrap()
        .get(name)
        .map(|ch| ch.read_privs)
    else {
        return;
    };
    for session in state.registry.sessions() {
        if read_privs.intersects(session.privileges()) {
            session.enqueue(info);
        }
    }
}
