// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

mod common;

use std::sync::atomic::Ordering;

use common::*;
use packet::pkt_client::{ChannelJoin, ChannelPart, FriendAdd, Message, PrivateMessage, PublicMessage};
use packet::pkt_server::SendMessage;
use packet::{BanchoPacket, PacketId};
use server::bancho::session::unix_now;

fn join_osu(state: &std::sync::Arc<server::bancho::AppState>, token: &str) {
    let session = session_for(state, token);
    post(
        state,
        &session,
        &frame(&ChannelJoin {
            name: "#osu".into(),
        }),
    );
}

fn public_message(body: &str, target: &str) -> Vec<u8> {
    frame(&PublicMessage {
        msg: Message {
            sender: "".into(),
            body: body.into(),
            target: target.into(),
            sender_id: 0,
        },
    })
}

fn private_message(body: &str, target: &str) -> Vec<u8> {
    frame(&PrivateMessage {
        msg: Message {
            sender: "".into(),
            body: body.into(),
            target: target.into(),
            sender_id: 0,
        },
    })
}

#[test]
fn public_chat_reaches_everyone_but_the_sender() {
    let (_dir, state) = open_state();
    let (alice_token, _) = login(&state, "alice");
    let (bob_token, _) = login(&state, "bob");
    join_osu(&state, &alice_token);
    join_osu(&state, &bob_token);

    let alice = session_for(&state, &alice_token);
    let bob = session_for(&state, &bob_token);
    alice.drain();
    bob.drain();

    let alice_response = post(&state, &alice, &public_message("hi", "#osu"));

    let bob_poll = bob.drain();
    let messages = frames_with_id(&bob_poll, PacketId::SrvSendMessage);
    assert_eq!(messages.len(), 1);
    let msg = SendMessage::deserialize_no_hdr(&messages[0]).unwrap();
    assert_eq!(&*msg.msg.sender, "alice");
    assert_eq!(&*msg.msg.body, "hi");
    assert_eq!(&*msg.msg.target, "#osu");
    assert_eq!(msg.msg.sender_id, alice.user_id);

    // alice does not hear her own message back
    assert!(frames_with_id(&alice_response, PacketId::SrvSendMessage).is_empty());
}

#[test]
fn channel_membership_is_mirrored() {
    let (_dir, state) = open_state();
    let (token, _) = login(&state, "alice");
    let alice = session_for(&state, &token);

    join_osu(&state, &token);
    let chan = state.channels.get("#osu").unwrap();
    assert!(chan.users.contains(&alice.user_id));
    assert!(alice.channels.lock().unwrap().contains("#osu"));

    post(
        &state,
        &alice,
        &frame(&ChannelPart {
            name: "#osu".into(),
        }),
    );
    let chan = state.channels.get("#osu").unwrap();
    assert!(!chan.users.contains(&alice.user_id));
    assert!(!alice.channels.lock().unwrap().contains("#osu"));

    // parting UI pseudo-channels is a no-op
    post(
        &state,
        &alice,
        &frame(&ChannelPart {
            name: "#userlog".into(),
        }),
    );
}

#[test]
fn lobby_channel_needs_the_lobby() {
    let (_dir, state) = open_state();
    let (token, _) = login(&state, "alice");
    let alice = session_for(&state, &token);
    alice.drain();

    post(
        &state,
        &alice,
        &frame(&ChannelJoin {
            name: "#lobby".into(),
        }),
    );
    assert!(!alice.channels.lock().unwrap().contains("#lobby"));

    // OSU_JOIN_LOBBY (30) carries no payload
    post(&state, &alice, &bogus_frame(30, &[]));
    post(
        &state,
        &alice,
        &frame(&ChannelJoin {
            name: "#lobby".into(),
        }),
    );
    assert!(alice.channels.lock().unwrap().contains("#lobby"));
}

#[test]
fn dm_blocked_by_privacy() {
    let (_dir, state) = open_state();
    let (alice_token, _) = login(&state, "alice");
    let (bob_token, _) = login_with(&state, "bob", PASSWORD_MD5, true);

    let alice = session_for(&state, &alice_token);
    let bob = session_for(&state, &bob_token);
    alice.drain();
    bob.drain();

    let response = post(&state, &alice, &private_message("hey bob", "bob"));

    let refusals = frames_with_id(&response, PacketId::SrvUserDmBlocked);
    assert_eq!(refusals.len(), 1);
    let refusal = packet::pkt_server::UserDmBlocked::deserialize_no_hdr(&refusals[0]).unwrap();
    assert_eq!(&*refusal.msg.target, "bob");

    assert!(bob.drain().is_empty(), "bob must receive nothing");
}

#[test]
fn dm_flows_between_friends_despite_privacy() {
    let (_dir, state) = open_state();
    let (alice_token, _) = login(&state, "alice");
    let (bob_token, _) = login_with(&state, "bob", PASSWORD_MD5, true);

    let alice = session_for(&state, &alice_token);
    let bob = session_for(&state, &bob_token);

    post(
        &state,
        &bob,
        &frame(&FriendAdd {
            user_id: alice.user_id,
        }),
    );
    alice.drain();
    bob.drain();

    post(&state, &alice, &private_message("hey bob", "bob"));

    let bob_poll = bob.drain();
    let messages = frames_with_id(&bob_poll, PacketId::SrvSendMessage);
    assert_eq!(messages.len(), 1);
    let msg = SendMessage::deserialize_no_hdr(&messages[0]).unwrap();
    assert_eq!(&*msg.msg.sender, "alice");
    assert_eq!(&*msg.msg.target, "bob");
}

#[test]
fn dm_to_silenced_target_is_bounced() {
    let (_dir, state) = open_state();
    let (alice_token, _) = login(&state, "alice");
    let (bob_token, _) = login(&state, "bob");

    let alice = session_for(&state, &alice_token);
    let bob = session_for(&state, &bob_token);
    bob.silence_end.store(unix_now() + 600, Ordering::Relaxed);
    alice.drain();
    bob.drain();

    let response = post(&state, &alice, &private_message("hello?", "bob"));
    assert_eq!(
        frames_with_id(&response, PacketId::SrvTargetIsSilenced).len(),
        1
    );
    assert!(bob.drain().is_empty());
}

#[test]
fn silenced_sender_cannot_chat_publicly() {
    let (_dir, state) = open_state();
    let (alice_token, _) = login(&state, "alice");
    let (bob_token, _) = login(&state, "bob");
    join_osu(&state, &alice_token);
    join_osu(&state, &bob_token);

    let alice = session_for(&state, &alice_token);
    let bob = session_for(&state, &bob_token);
    alice.silence_end.store(unix_now() + 600, Ordering::Relaxed);
    alice.drain();
    bob.drain();

    post(&state, &alice, &public_message("can you hear me", "#osu"));
    assert!(frames_with_id(&bob.drain(), PacketId::SrvSendMessage).is_empty());
}

#[test]
fn long_messages_are_clamped() {
    let (_dir, state) = open_state();
    let (alice_token, _) = login(&state, "alice");
    let (bob_token, _) = login(&state, "bob");
    join_osu(&state, &alice_token);
    join_osu(&state, &bob_token);

    let alice = session_for(&state, &alice_token);
    let bob = session_for(&state, &bob_token);
    alice.drain();
    bob.drain();

    let wall = "x".repeat(5000);
    post(&state, &alice, &public_message(&wall, "#osu"));

    let messages = frames_with_id(&bob.drain(), PacketId::SrvSendMessage);
    let msg = SendMessage::deserialize_no_hdr(&messages[0]).unwrap();
    assert_eq!(msg.msg.body.chars().count(), 2003);
    assert!(msg.msg.body.ends_with("..."));
}

#[test]
fn bang_commands_reply_in_both_modes() {
    let (_dir, state) = open_state();
    let (alice_token, _) = login(&state, "alice");
    let (bob_token, _) = login(&state, "bob");
    join_osu(&state, &alice_token);
    join_osu(&state, &bob_token);

    let alice = session_for(&state, &alice_token);
    let bob = session_for(&state, &bob_token);
    alice.drain();
    bob.drain();

    // invisible: only alice sees the reply, bob sees just the command
    let response = post(&state, &alice, &public_message("!help", "#osu"));
    assert_eq!(frames_with_id(&response, PacketId::SrvSendMessage).len(), 1);
    assert_eq!(
        frames_with_id(&bob.drain(), PacketId::SrvSendMessage).len(),
        1
    );

    // visible: both see the command and the bot's answer
    let response = post(&state, &alice, &public_message("!roll", "#osu"));
    assert_eq!(
        frames_with_id(&response, PacketId::SrvSendMessage).len(),
        1
    );
    assert_eq!(
        frames_with_id(&bob.drain(), PacketId::SrvSendMessage).len(),
        2
    );
}

#[test]
fn messaging_the_bot_answers_directly() {
    let (_dir, state) = open_state();
    let (alice_token, _) = login(&state, "alice");
    let alice = session_for(&state, &alice_token);
    alice.drain();

    let response = post(
        &state,
        &alice,
        &private_message("hello there", "Męski oszuścik"),
    );
    let messages = frames_with_id(&response, PacketId::SrvSendMessage);
    assert_eq!(messages.len(), 1);
    let msg = SendMessage::deserialize_no_hdr(&messages[0]).unwrap();
    assert_eq!(&*msg.msg.body, "Command not found.");
    assert_eq!(msg.msg.sender_id, 1);
}
