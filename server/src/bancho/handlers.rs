// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

//! One handler per client packet, and the dispatch table tying raw
//! packet ids to them. Handler failures are logged and the offending
//! frame dropped; the rest of the request keeps processing.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use log::{debug, info, warn};
use packet::pkt_client::{
    ChangeAction, ChannelJoin, ChannelPart, FriendAdd, FriendRemove, Message, PresenceRequest,
    PrivateMessage, PublicMessage, SpectateFrames, StartSpectating, StatsRequest,
    ToggleBlockNonFriendDms,
};
use packet::pkt_server::{SendMessage, TargetIsSilenced, UserDmBlocked};
use packet::{Action, BanchoPacket, Mode, PacketId};

use super::bot::{self, BOT_USER_ID, BOT_USERNAME};
use super::channel::{self, spec_channel_name};
use super::login;
use super::session::{safe_name, Session};
use super::spectator;
use super::AppState;
use crate::store::{RelationKind, RelationRow};

/// Packets a restricted account may still execute.
fn allowed_while_restricted(id: PacketId) -> bool {
    matches!(
        id,
        PacketId::OsuHeartbeat
            | PacketId::OsuChangeAction
            | PacketId::OsuRequestStatusUpdate
            | PacketId::OsuUserStatsRequest
            | PacketId::OsuChannelJoin
            | PacketId::OsuChannelPart
            | PacketId::OsuLogout
            | PacketId::OsuReceiveUpdates
    )
}

pub async fn dispatch(state: &Arc<AppState>, session: &Arc<Session>, raw_id: u16, payload: &[u8]) {
    let Ok(id) = PacketId::try_from(raw_id) else {
        warn!(
            "{session}: unknown packet id {raw_id}, skipping {} bytes",
            payload.len()
        );
        return;
    };

    if session.is_restricted() && !allowed_while_restricted(id) {
        debug!("{session}: dropping {id:?} from restricted account");
        return;
    }

    let result = match id {
        PacketId::OsuHeartbeat => Ok(()),
        PacketId::OsuChangeAction => change_action(state, session, payload).await,
        PacketId::OsuRequestStatusUpdate => request_status_update(session),
        PacketId::OsuUserStatsRequest => stats_request(state, session, payload),
        PacketId::OsuUserPresenceRequest => presence_request(state, session, payload),
        PacketId::OsuUserPresenceRequestAll => presence_request_all(state, session),
        PacketId::OsuSendPublicMessage => public_message(state, session, payload),
        PacketId::OsuSendPrivateMessage => private_message(state, session, payload),
        PacketId::OsuLogout => {
            login::logout(state, session);
            Ok(())
        }
        PacketId::OsuStartSpectating => start_spectating(state, session, payload),
        PacketId::OsuStopSpectating => {
            spectator::stop(state, session);
            Ok(())
        }
        PacketId::OsuSpectateFrames => spectate_frames(state, session, payload),
        PacketId::OsuCantSpectate => {
            spectator::cant_spectate(state, session);
            Ok(())
        }
        PacketId::OsuChannelJoin => channel_join(state, session, payload),
        PacketId::OsuChannelPart => channel_part(state, session, payload),
        PacketId::OsuFriendAdd => friend_add(state, session, payload).await,
        PacketId::OsuFriendRemove => friend_remove(state, session, payload).await,
        PacketId::OsuJoinLobby => {
            session.in_lobby.store(true, Ordering::Relaxed);
            Ok(())
        }
        PacketId::OsuPartLobby => {
            session.in_lobby.store(false, Ordering::Relaxed);
            Ok(())
        }
        PacketId::OsuToggleBlockNonFriendDms => toggle_block_dms(session, payload),
        PacketId::OsuReceiveUpdates | PacketId::OsuSetAwayMessage => Ok(()),
        PacketId::OsuErrorReport => {
            warn!("{session}: client reported an error");
            Ok(())
        }
        other => {
            debug!("{session}: no handler for {other:?}, dropping");
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!("{session}: failed to handle {id:?}: {e}");
    }
}

async fn change_action(
    state: &Arc<AppState>,
    session: &Arc<Session>,
    payload: &[u8],
) -> Result<()> {
    let p = ChangeAction::deserialize_no_hdr(payload)?;
    let mode = Mode::try_from(p.mode)?;
    {
        let mut status = session.status.lock().unwrap();
        status.action = Action::try_from(p.action)?;
        status.action_text = p.action_text.0;
        status.action_md5 = p.action_md5.0;
        status.mods = p.mods;
        status.mode = mode;
        status.beatmap_id = p.beatmap_id;
    }

    let rank = state.leaderboards.rank(mode, session.user_id).await;
    session.stats.lock().unwrap()[usize::from(u8::from(mode))].rank = rank.unwrap_or(0);

    let frame = session.stats_frame();
    if session.is_restricted() {
        session.enqueue(&frame);
    } else {
        state.registry.broadcast(&frame, &[]);
    }
    Ok(())
}

fn request_status_update(session: &Arc<Session>) -> Result<()> {
    let frame = session.stats_frame();
    session.enqueue(&frame);
    Ok(())
}

fn stats_request(state: &Arc<AppState>, session: &Arc<Session>, payload: &[u8]) -> Result<()> {
    let p = StatsRequest::deserialize_no_hdr(payload)?;
    send_presences(state, session, &p.user_ids);
    Ok(())
}

fn presence_request(state: &Arc<AppState>, session: &Arc<Session>, payload: &[u8]) -> Result<()> {
    let p = PresenceRequest::deserialize_no_hdr(payload)?;
    send_presences(state, session, &p.user_ids);
    Ok(())
}

fn presence_request_all(state: &Arc<AppState>, session: &Arc<Session>) -> Result<()> {
    for other in state.registry.sessions() {
        if other.user_id != session.user_id && !other.is_restricted() {
            session.enqueue(&other.presence_frame());
        }
    }
    Ok(())
}

fn send_presences(state: &Arc<AppState>, session: &Arc<Session>, user_ids: &[i32]) {
    for &user_id in user_ids.iter().filter(|&&uid| uid != session.user_id) {
        let Some(other) = state.registry.by_user_id(user_id) else {
            continue;
        };
        if other.is_restricted() {
            continue;
        }
        session.enqueue(&other.presence_frame());
    }
}

const MESSAGE_LIMIT: usize = 2000;

fn clamp_message(body: &str) -> String {
    if body.chars().count() <= MESSAGE_LIMIT {
        return body.to_owned();
    }
    let mut clamped: String = body.chars().take(MESSAGE_LIMIT).collect();
    clamped.push_str("...");
    clamped
}

/// The client addresses instanced channels by their display name;
/// map it back to the canonical one.
fn resolve_channel_name(session: &Session, target: &str) -> Option<String> {
    match target {
        "#spectator" => session.watch_party.lock().unwrap().map(spec_channel_name),
        name if name.starts_with('#') => Some(name.to_owned()),
        _ => None,
    }
}

fn public_message(state: &Arc<AppState>, session: &Arc<Session>, payload: &[u8]) -> Result<()> {
    let p = PublicMessage::deserialize_no_hdr(payload)?;

    if session.is_silenced() {
        debug!("{session}: dropping chat message while silenced");
        return Ok(());
    }
    let Some(chan_name) = resolve_channel_name(session, &p.msg.target) else {
        warn!("{session}: message to unresolvable target {:?}", &*p.msg.target);
        return Ok(());
    };
    let Some(chan) = state.channels.get(&chan_name) else {
        warn!("{session}: message to nonexistent channel {chan_name}");
        return Ok(());
    };
    if !chan.users.contains(&session.user_id) {
        // the client thinks it is in the channel; kick to resync
        warn!("{session}: message to {chan_name} without membership");
        channel::part(state, session, &chan_name, true);
        return Ok(());
    }
    if !chan.can_write(session.privileges()) {
        warn!("{session}: no write privileges for {chan_name}");
        return Ok(());
    }

    let body = clamp_message(&p.msg.body);
    let frame = SendMessage {
        msg: Message {
            sender: session.username.as_str().into(),
            body: body.as_str().into(),
            target: chan.display_name().into(),
            sender_id: session.user_id,
        },
    }
    .to_bytes();
    for &member_id in chan.users.iter().filter(|&&uid| uid != session.user_id) {
        if let Some(member) = state.registry.by_user_id(member_id) {
            member.enqueue(&frame);
        }
    }

    if body.starts_with('!') {
        let reply = bot::handle_command(session, &body);
        let reply_frame = SendMessage {
            msg: Message {
                sender: BOT_USERNAME.into(),
                body: reply.response.into(),
                target: chan.display_name().into(),
                sender_id: BOT_USER_ID,
            },
        }
        .to_bytes();
        if reply.visible {
            for &member_id in &chan.users {
                if let Some(member) = state.registry.by_user_id(member_id) {
                    member.enqueue(&reply_frame);
                }
            }
        } else {
            session.enqueue(&reply_frame);
        }
    }
    Ok(())
}

fn private_message(state: &Arc<AppState>, session: &Arc<Session>, payload: &[u8]) -> Result<()> {
    let p = PrivateMessage::deserialize_no_hdr(payload)?;
    let Some(target) = state.registry.by_name(&safe_name(&p.msg.target)) else {
        warn!("{session}: DM to unknown user {:?}", &*p.msg.target);
        return Ok(());
    };
    let body = clamp_message(&p.msg.body);

    if target.is_bot {
        let reply = bot::handle_command(session, &body);
        session.send(&SendMessage {
            msg: Message {
                sender: BOT_USERNAME.into(),
                body: reply.response.into(),
                target: session.username.as_str().into(),
                sender_id: BOT_USER_ID,
            },
        });
        return Ok(());
    }

    if target.blocks.lock().unwrap().contains(&session.user_id) {
        info!("{session}: DM to {target} refused (blocked)");
        session.send(&UserDmBlocked::target(&target.username));
        return Ok(());
    }
    if target.pm_private() && !target.friends.lock().unwrap().contains(&session.user_id) {
        info!("{session}: DM to {target} refused (private DMs)");
        session.send(&UserDmBlocked::target(&target.username));
        return Ok(());
    }
    if target.is_silenced() {
        session.send(&TargetIsSilenced::target(&target.username));
        return Ok(());
    }

    target.send(&SendMessage {
        msg: Message {
            sender: session.username.as_str().into(),
            body: body.into(),
            target: target.username.as_str().into(),
            sender_id: session.user_id,
        },
    });
    Ok(())
}

fn start_spectating(state: &Arc<AppState>, session: &Arc<Session>, payload: &[u8]) -> Result<()> {
    let p = StartSpectating::deserialize_no_hdr(payload)?;
    spectator::start(state, session, p.target_id);
    Ok(())
}

fn spectate_frames(state: &Arc<AppState>, session: &Arc<Session>, payload: &[u8]) -> Result<()> {
    let p = SpectateFrames::deserialize_no_hdr(payload)?;
    spectator::frames(state, session, &p.frames);
    Ok(())
}

fn channel_join(state: &Arc<AppState>, session: &Arc<Session>, payload: &[u8]) -> Result<()> {
    let p = ChannelJoin::deserialize_no_hdr(payload)?;
    let Some(name) = resolve_channel_name(session, &p.name) else {
        warn!("{session}: join of unresolvable channel {:?}", &*p.name);
        return Ok(());
    };
    if !channel::join(state, session, &name) {
        info!("{session}: channel join refused for {name}");
    }
    Ok(())
}

fn channel_part(state: &Arc<AppState>, session: &Arc<Session>, payload: &[u8]) -> Result<()> {
    let p = ChannelPart::deserialize_no_hdr(payload)?;
    let Some(name) = resolve_channel_name(session, &p.name) else {
        return Ok(());
    };
    channel::part(state, session, &name, false);
    Ok(())
}

async fn friend_add(state: &Arc<AppState>, session: &Arc<Session>, payload: &[u8]) -> Result<()> {
    let p = FriendAdd::deserialize_no_hdr(payload)?;
    let friend_id = p.user_id;
    if friend_id == BOT_USER_ID {
        debug!("{session}: the bot needs no befriending");
        return Ok(());
    }

    let had_block = session.blocks.lock().unwrap().remove(&friend_id);
    if had_block {
        state
            .store
            .relations
            .delete(|r| {
                r.user_id == session.user_id
                    && r.friend_id == friend_id
                    && r.kind == RelationKind::Block
            })
            .await?;
    }
    if !session.friends.lock().unwrap().insert(friend_id) {
        return Ok(());
    }
    state
        .store
        .relations
        .insert(RelationRow {
            user_id: session.user_id,
            friend_id,
            kind: RelationKind::Friend,
            since: super::session::unix_now(),
        })
        .await?;
    info!("{session}: added friend #{friend_id}");
    Ok(())
}

async fn friend_remove(
    state: &Arc<AppState>,
    session: &Arc<Session>,
    payload: &[u8],
) -> Result<()> {
    let p = FriendRemove::deserialize_no_hdr(payload)?;
    let friend_id = p.user_id;
    if friend_id == BOT_USER_ID {
        debug!("{session}: the bot cannot be unfriended");
        return Ok(());
    }
    if !session.friends.lock().unwrap().remove(&friend_id) {
        return Ok(());
    }
    state
        .store
        .relations
        .delete(|r| {
            r.user_id == session.user_id
                && r.friend_id == friend_id
                && r.kind == RelationKind::Friend
        })
        .await?;
    info!("{session}: removed friend #{friend_id}");
    Ok(())
}

fn toggle_block_dms(session: &Arc<Session>, payload: &[u8]) -> Result<()> {
    let p = ToggleBlockNonFriendDms::deserialize_no_hdr(payload)?;
    session.pm_private.store(p.value != 0, Ordering::Relaxed);
    Ok(())
}
