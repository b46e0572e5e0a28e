// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;

use packet::{BanchoPacket, Header, PacketReader};
use server::bancho::session::Session;
use server::bancho::{handlers, login, AppState};
use server::geoloc::Geolocation;
use tempfile::TempDir;

pub const PASSWORD_MD5: &str = "5f4dcc3b5aa765d61d8327deb882cf99";

pub fn open_state() -> (TempDir, Arc<AppState>) {
    server::setup_log(false, true);
    let dir = tempfile::tempdir().unwrap();
    let state = smol::block_on(AppState::open(dir.path())).unwrap();
    (dir, state)
}

pub fn login_body(username: &str, password_md5: &str, pm_private: bool) -> Vec<u8> {
    let pm = if pm_private { "1" } else { "0" };
    format!("{username}\n{password_md5}\nb20240820.1|2|0|deadbeef|{pm}\n").into_bytes()
}

/// Run the login pipeline with the offline fallback location and hand
/// back the issued token plus the response body.
pub fn login(state: &Arc<AppState>, username: &str) -> (String, Vec<u8>) {
    login_with(state, username, PASSWORD_MD5, false)
}

pub fn login_with(
    state: &Arc<AppState>,
    username: &str,
    password_md5: &str,
    pm_private: bool,
) -> (String, Vec<u8>) {
    let body = login_body(username, password_md5, pm_private);
    let outcome =
        smol::block_on(login::handle_login(state, &body, Geolocation::fallback())).unwrap();
    (outcome.token, outcome.body)
}

pub fn session_for(state: &Arc<AppState>, token: &str) -> Arc<Session> {
    state.registry.by_token(token).unwrap()
}

/// Simulate one HTTP poll: dispatch every frame in `body`, then drain
/// the outbound queue.
pub fn post(state: &Arc<AppState>, session: &Arc<Session>, body: &[u8]) -> Vec<u8> {
    smol::block_on(async {
        let mut reader = PacketReader::new(body);
        while !reader.is_empty() {
            let (id, len) = reader.read_header().unwrap();
            let payload = reader.read(len as usize).unwrap();
            handlers::dispatch(state, session, id, payload).await;
        }
        session.touch();
        session.drain()
    })
}

pub fn frame<P: BanchoPacket>(pkt: &P) -> Vec<u8> {
    pkt.to_bytes()
}

/// Split a response body back into (id, payload) frames.
pub fn split_frames(body: &[u8]) -> Vec<(u16, Vec<u8>)> {
    let mut reader = PacketReader::new(body);
    let mut frames = Vec::new();
    while !reader.is_empty() {
        let (id, len) = reader.read_header().unwrap();
        let payload = reader.read(len as usize).unwrap();
        frames.push((id, payload.to_vec()));
    }
    frames
}

pub fn frame_ids(body: &[u8]) -> Vec<u16> {
    split_frames(body).iter().map(|(id, _)| *id).collect()
}

pub fn frames_with_id(body: &[u8], wanted: packet::PacketId) -> Vec<Vec<u8>> {
    split_frames(body)
        .into_iter()
        .filter(|(id, _)| *id == u16::from(wanted))
        .map(|(_, payload)| payload)
        .collect()
}

/// A frame with an id the protocol never assigned.
pub fn bogus_frame(raw_id: u16, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&raw_id.to_le_bytes());
    bytes.push(0);
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(payload);
    debug_assert!(bytes.len() == Header::SIZE + payload.len());
    bytes
}
