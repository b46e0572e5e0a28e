// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use packet::pkt_server::{
    ChannelInfoEnd, FriendsList, LoginPrivileges, LoginReply, Notification, ProtocolVersion,
    SilenceEnd, UserLogout,
};
use packet::{BanchoPacket, Mode, Privileges};
use rand::seq::SliceRandom;

use super::bot::BOT_USER_ID;
use super::session::{random_token, safe_name, unix_now, ModeStats, Session, SessionConfig};
use super::{channel, spectator, AppState};
use crate::geoloc::Geolocation;
use crate::store::{RelationKind, StatsRow, UserRow};

pub const PROTOCOL_VERSION: i32 = 19;
pub const INVALID_PASSWORD_TOKEN: &str = "invalid-password";

/// The login notification pool.
pub const QUOTES: &[&str] = &[
    "Commit your RealistikPanel changes.",
    "Den Bensch.",
    "I'm a bot, I don't have feelings. - GitHub Copilot",
    "Męski oszuścik is gonna get you.",
    "The sigma is crying.",
    "Kill yourself",
    "KYS - Kuopion yliopistollinen sairaala",
    "'shoot yourself' - 'i mean shoot your shot",
];

pub struct LoginOutcome {
    /// Goes out in the `cho-token` response header.
    pub token: String,
    pub body: Vec<u8>,
}

#[derive(Debug)]
struct LoginRequest {
    username: String,
    password_md5: String,
    osu_version: String,
    utc_offset: i32,
    pm_private: bool,
}

/// `username\npassword_md5\nversion|utc_offset|_|client_hashes|pm_private\n`
fn parse_login_body(body: &[u8]) -> Result<LoginRequest> {
    let text = std::str::from_utf8(body).context("login body is not utf-8")?;
    let mut lines = text.split('\n');
    let username = lines.next().context("missing username line")?.to_owned();
    let password_md5 = lines.next().context("missing password line")?.to_owned();
    let client_info = lines.next().context("missing client info line")?;

    let mut fields = client_info.split('|');
    let osu_version = fields.next().context("missing client version")?.to_owned();
    let utc_offset: i32 = fields
        .next()
        .context("missing utc offset")?
        .parse()
        .context("malformed utc offset")?;
    let _display_city = fields.next().context("missing display-city field")?;
    let _client_hashes = fields.next().context("missing client hashes")?;
    let pm_private = fields.next().context("missing pm_private field")? == "1";

    Ok(LoginRequest {
        username,
        password_md5,
        osu_version,
        utc_offset,
        pm_private,
    })
}

/// The whole login pipeline: resolve-or-register the account, verify
/// the password, build a session, seed relations and leaderboards,
/// evict any previous login and emit the hello packet sequence.
pub async fn handle_login(
    state: &Arc<AppState>,
    body: &[u8],
    geo: Geolocation,
) -> Result<LoginOutcome> {
    let req = parse_login_body(body)?;
    let username_safe = safe_name(&req.username);

    let existing = state
        .store
        .users
        .find(|u| u.username_safe == username_safe)
        .await;
    let (row, is_new) = match existing {
        Some(row) => (row, false),
        None => {
            let user_id = state.store.next_user_id().await;
            let row = UserRow {
                user_id,
                username: req.username.clone(),
                username_safe: username_safe.clone(),
                password_md5: req.password_md5.clone(),
                email: String::new(),
                privileges: (Privileges::PLAYER | Privileges::SUPPORTER).0,
                country: geo.country_acronym.to_lowercase(),
                silence_end: 0,
                latest_activity: unix_now(),
            };
            state.store.users.insert(row.clone()).await?;
            for mode in Mode::ALL {
                state.store.stats.insert(StatsRow::zeroed(user_id, mode)).await?;
            }
            info!("registered new user {} (#{user_id})", req.username);
            (row, true)
        }
    };

    if row.password_md5 != req.password_md5 {
        info!("{}: failed login (wrong password)", req.username);
        let mut body = Vec::new();
        LoginReply { user_id: -1 }.serialize(&mut body)?;
        Notification {
            message: "onecho!: Invalid password.".into(),
        }
        .serialize(&mut body)?;
        return Ok(LoginOutcome {
            token: INVALID_PASSWORD_TOKEN.to_owned(),
            body,
        });
    }

    let session = Arc::new(Session::new(SessionConfig {
        user_id: row.user_id,
        username: row.username.clone(),
        token: random_token(),
        osu_version: req.osu_version,
        utc_offset: req.utc_offset,
        pm_private: req.pm_private,
        privileges: Privileges(row.privileges),
        geo,
        silence_end: row.silence_end,
        is_bot: false,
    }));

    // relations; the bot befriends everyone
    let relations = state
        .store
        .relations
        .filter(|r| r.user_id == row.user_id)
        .await;
    {
        let mut friends = session.friends.lock().unwrap();
        let mut blocks = session.blocks.lock().unwrap();
        friends.insert(BOT_USER_ID);
        for relation in relations {
            match relation.kind {
                RelationKind::Friend => friends.insert(relation.friend_id),
                RelationKind::Block => blocks.insert(relation.friend_id),
            };
        }
    }

    if is_new {
        for mode in Mode::ALL {
            state.leaderboards.upsert(mode, row.user_id, 0).await;
        }
    }

    let stats_rows = state
        .store
        .stats
        .filter(|s| s.user_id == row.user_id)
        .await;
    {
        let mut stats = session.stats.lock().unwrap();
        for s in &stats_rows {
            stats[usize::from(u8::from(s.mode))] = ModeStats {
                ranked_score: s.ranked_score,
                total_score: s.total_score,
                pp: s.pp,
                accuracy: s.accuracy,
                playcount: s.playcount,
                playtime: s.playtime,
                max_combo: s.max_combo,
                total_hits: s.total_hits,
                rank: 0,
            };
        }
    }
    for mode in Mode::ALL {
        let rank = state.leaderboards.rank(mode, row.user_id).await;
        session.stats.lock().unwrap()[usize::from(u8::from(mode))].rank = rank.unwrap_or(0);
    }

    // a fresh login steals the slot of any previous one
    if let Some(prev) = state.registry.by_user_id(row.user_id) {
        info!("{prev}: evicted by a new login");
        logout(state, &prev);
    }
    if let Some(prev) = state.registry.by_name(&username_safe) {
        info!("{prev}: evicted by a name conflict");
        logout(state, &prev);
    }
    state
        .registry
        .register(session.clone())
        .map_err(|e| anyhow!("cannot register the session: {e}"))?;

    session.send(&LoginReply {
        user_id: session.user_id,
    });
    session.send(&ProtocolVersion {
        version: PROTOCOL_VERSION,
    });

    for (read_privs, frame) in state.channels.auto_join_infos(session.privileges()) {
        session.enqueue(&frame);
        for other in state.registry.sessions() {
            if other.user_id != session.user_id && read_privs.intersects(other.privileges()) {
                other.enqueue(&frame);
            }
        }
    }
    session.send(&ChannelInfoEnd { unused: 0 });
    session.send(&SilenceEnd {
        seconds_left: row.silence_end as u32,
    });
    session.send(&LoginPrivileges {
        privileges: row.privileges,
    });

    for other in state.registry.sessions() {
        if other.user_id != session.user_id && !other.is_restricted() {
            session.enqueue(&other.presence_and_stats());
        }
    }
    session.enqueue(&session.presence_and_stats());

    let mut friend_ids: Vec<i32> = session.friends.lock().unwrap().iter().copied().collect();
    friend_ids.sort_unstable();
    session.send(&FriendsList {
        user_ids: friend_ids.into(),
    });

    let quote = QUOTES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("onecho! - because it's that simple!");
    session.send(&Notification {
        message: quote.into(),
    });

    if !session.is_restricted() {
        state
            .registry
            .broadcast(&session.presence_and_stats(), &[session.user_id]);
    }

    let persisted = state
        .store
        .users
        .update(
            |u| u.user_id == row.user_id,
            UserRow {
                latest_activity: unix_now(),
                ..row.clone()
            },
        )
        .await?;
    if !persisted {
        warn!("{session}: user row vanished while logging in");
    }

    info!("{session}: logged in");
    Ok(LoginOutcome {
        token: session.token.clone(),
        body: session.drain(),
    })
}

/// Tear a session down: leave every channel and watch party, drop it
/// from the registry and tell the world, unless the world was never
/// able to see it.
pub fn logout(state: &AppState, session: &Arc<Session>) {
    let names: Vec<String> = session.channels.lock().unwrap().iter().cloned().collect();
    for name in names {
        channel::part(state, session, &name, false);
    }
    spectator::leave_all(state, session);
    state.registry.unregister(session);

    if !session.is_restricted() {
        state.registry.broadcast(
            &UserLogout {
                user_id: session.user_id,
                state: 0,
            }
            .to_bytes(),
            &[session.user_id],
        );
    }
    info!("{session}: logged out");
}
