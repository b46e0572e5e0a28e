// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use std::sync::Arc;

use packet::{Action, Privileges};
use rand::Rng;

use super::session::{random_token, Session, SessionConfig};
use crate::geoloc::{country_code, Geolocation};

pub const BOT_USER_ID: i32 = 1;
pub const BOT_USERNAME: &str = "Męski oszuścik";

/// The resident bot. A session like any other, except its outbound
/// queue discards everything and its stats are synthetic.
pub fn bot_session() -> Arc<Session> {
    let session = Session::new(SessionConfig {
        user_id: BOT_USER_ID,
        username: BOT_USERNAME.to_owned(),
        token: random_token(),
        osu_version: "bot".to_owned(),
        utc_offset: 2,
        pm_private: false,
        privileges: Privileges::PLAYER | Privileges::DEVELOPER,
        geo: Geolocation {
            // flies a Romanian flag out of Pyongyang
            country_acronym: "RO".to_owned(),
            country_code: country_code("ro"),
            latitude: 39.039219,
            longitude: 125.762524,
        },
        silence_end: 0,
        is_bot: true,
    });
    {
        let mut status = session.status.lock().unwrap();
        status.action = Action::Testing;
        status.action_text = "users patience.".to_owned();
    }
    Arc::new(session)
}

pub struct CommandReply {
    pub response: String,
    /// Visible replies go to the whole channel as the bot; invisible
    /// ones only back to the sender.
    pub visible: bool,
}

/// Evaluate a `!command` chat line. Anything unrecognised (including
/// plain messages sent directly to the bot) earns the stock reply.
pub fn handle_command(sender: &Session, text: &str) -> CommandReply {
    let mut words = text.split_whitespace();
    let command = words.next().unwrap_or("");

    match command {
        "!help" => CommandReply {
            response: format!(
                "Hey, {}! Available commands: !help, !roll [max]",
                sender.username
            ),
            visible: false,
        },
        "!roll" => {
            let max: u32 = words
                .next()
                .and_then(|arg| arg.parse().ok())
                .filter(|&max| max > 0)
                .unwrap_or(100);
            let rolled = rand::thread_rng().gen_range(0..=max);
            CommandReply {
                response: format!("{} rolls {rolled} points!", sender.username),
                visible: true,
            }
        }
        _ => CommandReply {
            response: "Command not found.".to_owned(),
            visible: false,
        },
    }
}
