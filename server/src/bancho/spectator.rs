// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::{error, info};
use packet::pkt_server::{
    FellowSpectatorJoined, FellowSpectatorLeft, Notification, SpectateFrames, SpectatorCantSpectate,
    SpectatorJoined,
};
use packet::{BanchoPacket, RawBytes};

use super::channel::{self, spec_channel_name, Channel};
use super::session::Session;
use super::AppState;
use crate::bancho::bot::BOT_USER_ID;

/// One host being watched by one or more spectators, bound to a
/// temporary `#spec_{host}` channel.
#[derive(Debug, Clone)]
pub struct WatchParty {
    pub host_id: i32,
    pub watchers: Vec<i32>,
}

pub struct WatchParties {
    inner: RwLock<HashMap<i32, WatchParty>>,
}

impl WatchParties {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, host_id: i32) -> Option<WatchParty> {
        self.inner.read().unwrap().get(&host_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WatchParties {
    fn default() -> Self {
        Self::new()
    }
}

/// Attach `session` as a watcher of `target_id`, creating the party
/// and its temporary channel on first watch.
pub fn start(state: &AppState, session: &Arc<Session>, target_id: i32) {
    if target_id == BOT_USER_ID {
        session.send(&Notification {
            message: "The bot has nothing to show you.".into(),
        });
        session.send(&FellowSpectatorLeft {
            user_id: session.user_id,
        });
        return;
    }

    let Some(target) = state.registry.by_user_id(target_id) else {
        error!("{session}: tried to spectate offline user #{target_id}");
        return;
    };
    if target_id == session.user_id {
        error!("{session}: tried to spectate themselves");
        return;
    }

    // one party per watcher at a time
    let current = *session.watch_party.lock().unwrap();
    if let Some(current) = current {
        if current == session.user_id {
            error!("{session}: cannot spectate while hosting a watch party");
            return;
        }
        stop(state, session);
    }

    let chan_name = spec_channel_name(target_id);
    let created = {
        let mut parties = state.parties.inner.write().unwrap();
        match parties.get_mut(&target_id) {
            Some(party) => {
                if !party.watchers.contains(&session.user_id) {
                    party.watchers.push(session.user_id);
                }
                false
            }
            None => {
                parties.insert(
                    target_id,
                    WatchParty {
                        host_id: target_id,
                        watchers: vec![session.user_id],
                    },
                );
                true
            }
        }
    };

    if created {
        state.channels.insert(Channel::spectator(target_id));
        *target.watch_party.lock().unwrap() = Some(target_id);
        channel::join(state, &target, &chan_name);
    }
    *session.watch_party.lock().unwrap() = Some(target_id);
    channel::join(state, session, &chan_name);

    // both frames land on the host queue; the client tolerates it and
    // live servers have always sent it this way
    target.send(&FellowSpectatorJoined {
        user_id: session.user_id,
    });
    target.send(&SpectatorJoined {
        user_id: session.user_id,
    });

    info!("{session}: now spectating {target}");
}

/// Detach `session` from the party it watches. When the last watcher
/// leaves, the host leaves the temporary channel too, deleting it.
pub fn stop(state: &AppState, session: &Arc<Session>) {
    let Some(host_id) = session.watch_party.lock().unwrap().take() else {
        error!("{session}: stop-spectating while not spectating anyone");
        return;
    };
    if host_id == session.user_id {
        // hosts are detached through their watchers leaving
        *session.watch_party.lock().unwrap() = Some(host_id);
        error!("{session}: host cannot stop-spectate its own party");
        return;
    }

    let chan_name = spec_channel_name(host_id);
    let remaining = {
        let mut parties = state.parties.inner.write().unwrap();
        let Some(party) = parties.get_mut(&host_id) else {
            return;
        };
        party.watchers.retain(|&uid| uid != session.user_id);
        let remaining = party.watchers.len();
        if remaining == 0 {
            parties.remove(&host_id);
        }
        remaining
    };

    channel::part(state, session, &chan_name, false);

    if let Some(host) = state.registry.by_user_id(host_id) {
        host.send(&FellowSpectatorLeft {
            user_id: session.user_id,
        });
        if remaining == 0 {
            *host.watch_party.lock().unwrap() = None;
            channel::part(state, &host, &chan_name, false);
        }
    }

    info!("{session}: stopped spectating #{host_id}");
}

/// Replay frames from the host, fanned out to every watcher. Frames
/// submitted by anyone else are dropped.
pub fn frames(state: &AppState, session: &Arc<Session>, blob: &[u8]) {
    let hosted = *session.watch_party.lock().unwrap();
    if hosted != Some(session.user_id) {
        error!("{session}: submitted spectate frames while not hosting");
        return;
    }
    let Some(party) = state.parties.get(session.user_id) else {
        return;
    };

    let frame = SpectateFrames {
        frames: RawBytes(blob.to_vec()),
    }
    .to_bytes();
    for watcher_id in &party.watchers {
        if let Some(watcher) = state.registry.by_user_id(*watcher_id) {
            watcher.enqueue(&frame);
        }
    }
}

/// The sender has no local copy of the host's beatmap; tell every
/// watcher of the party.
pub fn cant_spectate(state: &AppState, session: &Arc<Session>) {
    let Some(host_id) = *session.watch_party.lock().unwrap() else {
        error!("{session}: cant-spectate outside a watch party");
        return;
    };
    let Some(party) = state.parties.get(host_id) else {
        return;
    };

    let frame = SpectatorCantSpectate {
        user_id: session.user_id,
    }
    .to_bytes();
    for watcher_id in &party.watchers {
        if let Some(watcher) = state.registry.by_user_id(*watcher_id) {
            watcher.enqueue(&frame);
        }
    }
}

/// Logout path: watchers detach normally, hosts take the whole party
/// down with them.
pub fn leave_all(state: &AppState, session: &Arc<Session>) {
    let Some(host_id) = *session.watch_party.lock().unwrap() else {
        return;
    };

    if host_id != session.user_id {
        stop(state, session);
        return;
    }

    let chan_name = spec_channel_name(host_id);
    let party = state.parties.inner.write().unwrap().remove(&host_id);
    if let Some(party) = party {
        for watcher_id in party.watchers {
            if let Some(watcher) = state.registry.by_user_id(watcher_id) {
                *watcher.watch_party.lock().unwrap() = None;
                channel::part(state, &watcher, &chan_name, false);
            }
        }
    }
    *session.watch_party.lock().unwrap() = None;
    channel::part(state, session, &chan_name, false);
}
