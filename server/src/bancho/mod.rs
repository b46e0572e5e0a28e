// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

pub mod bot;
pub mod channel;
pub mod handlers;
pub mod leaderboard;
pub mod login;
pub mod registry;
pub mod session;
pub mod spectator;

use std::net::{IpAddr, Shutdown, TcpListener, TcpStream};
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::{Arc, Weak};

use anyhow::{anyhow, Result};
use futures::io::BufReader;
use futures::FutureExt;
use log::{debug, error, info, warn};
use packet::pkt_server::{Notification, Restart};
use packet::{BanchoPacket, PacketReader};
use rand::seq::SliceRandom;
use smol::Async;

use crate::executor;
use crate::geoloc::{self, Geolocation};
use crate::http;
use crate::store::Store;
use channel::Channels;
use leaderboard::Leaderboards;
use registry::Registry;
use session::Session;
use spectator::WatchParties;

/// Every piece of process-wide mutable state, owned by the listener
/// and handed to handlers explicitly.
pub struct AppState {
    pub registry: Registry,
    pub channels: Channels,
    pub parties: WatchParties,
    pub leaderboards: Leaderboards,
    pub store: Store,
    pub bot: Arc<Session>,
}

impl AppState {
    pub async fn open(data_dir: &Path) -> Result<Arc<AppState>> {
        let store = Store::open(data_dir).await?;
        let channels = Channels::new(store.channels.all().await);
        let leaderboards = Leaderboards::new();
        leaderboards.seed(&store.stats.all().await).await;

        let bot = bot::bot_session();
        let state = Arc::new(AppState {
            registry: Registry::new(),
            channels,
            parties: WatchParties::new(),
            leaderboards,
            store,
            bot: bot.clone(),
        });
        state
            .registry
            .register(bot)
            .map_err(|e| anyhow!("cannot register the bot session: {e}"))?;
        Ok(state)
    }
}

pub struct Listener {
    me: Weak<Listener>,
    tcp_listener: Async<TcpListener>,
    state: Arc<AppState>,
    args: Arc<crate::args::Config>,
}

impl std::fmt::Display for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "Bancho:{}",
            self.tcp_listener.get_ref().local_addr().unwrap().port()
        ))
    }
}

impl Listener {
    pub fn new(
        tcp_listener: Async<TcpListener>,
        state: Arc<AppState>,
        args: Arc<crate::args::Config>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            tcp_listener,
            state,
            args,
        })
    }

    pub async fn listen(&self) -> Result<()> {
        info!(
            "{self}: started on {}",
            self.tcp_listener.get_ref().local_addr()?
        );

        loop {
            let (stream, _) = self.tcp_listener.accept().await?;
            let listener = self.me.upgrade().unwrap();
            // Give the request its own background task
            executor::spawn_local(async move {
                if let Err(err) = listener.handle_conn(stream).await {
                    debug!("Listener: connection error: {err}");
                }
            })
            .detach();
        }
    }

    async fn handle_conn(self: Arc<Self>, stream: Async<TcpStream>) -> Result<()> {
        let peer_ip = stream.get_ref().peer_addr().ok().map(|addr| addr.ip());
        let mut stream = BufReader::with_capacity(65536, stream);
        let request = http::read_request(&mut stream).await?;

        let response = match AssertUnwindSafe(self.route(&request, peer_ip))
            .catch_unwind()
            .await
        {
            Ok(response) => response,
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                error!("handler panicked: {msg}");
                http::Response::internal_error(&msg)
            }
        };

        let mut stream = stream.into_inner();
        // a client that hung up mid-response is not our problem
        if let Err(e) = http::write_response(&mut stream, &response).await {
            debug!("dropping response: {e}");
        }
        let _ = stream.get_ref().shutdown(Shutdown::Both);

        info!(
            "Handled {} {}{}",
            request.method,
            request.header("host").unwrap_or_default(),
            request.path
        );
        Ok(())
    }

    async fn route(&self, request: &http::Request, peer_ip: Option<IpAddr>) -> http::Response {
        let host = request.header("host").unwrap_or_default();
        if host.starts_with("a.") {
            return match request.method.as_str() {
                "GET" => self.avatar(request).await,
                _ => http::Response::method_not_allowed(),
            };
        }

        match (request.method.as_str(), request.path.as_str()) {
            ("POST", "/") if request.header("user-agent") == Some("osu!") => {
                self.bancho_post(request, peer_ip).await
            }
            ("GET" | "POST", "/") => landing_page(),
            _ => http::Response::not_found(),
        }
    }

    /// The bancho pipeline: no token means login, a known token means
    /// a packet-stream poll, an unknown token means the client is
    /// stale and must relog.
    async fn bancho_post(&self, request: &http::Request, peer_ip: Option<IpAddr>) -> http::Response {
        let state = &self.state;

        let Some(token) = request.header("osu-token") else {
            let ip = request
                .header("x-forwarded-for")
                .and_then(|forwarded| forwarded.split(',').next())
                .and_then(|ip| ip.trim().parse().ok())
                .or(peer_ip);
            let geo = match geoloc::lookup(ip).await {
                Ok(geo) => geo,
                Err(e) => {
                    warn!("geolocation of {ip:?} failed: {e}");
                    Geolocation::fallback()
                }
            };
            return match login::handle_login(state, &request.body, geo).await {
                Ok(outcome) => http::Response::octet_stream(outcome.body)
                    .with_header("cho-token", outcome.token),
                Err(e) => {
                    error!("login failed: {e:#}");
                    http::Response::internal_error(&format!("{e:#}"))
                }
            };
        };

        let Some(session) = state.registry.by_token(token) else {
            let mut body = Notification {
                message: "Server has restarted!".into(),
            }
            .to_bytes();
            body.extend_from_slice(&Restart { millis: 0 }.to_bytes());
            return http::Response::octet_stream(body);
        };

        let mut reader = PacketReader::new(&request.body);
        while !reader.is_empty() {
            let (id, len) = match reader.read_header() {
                Ok(hdr) => hdr,
                Err(e) => {
                    warn!("{session}: malformed frame header: {e}");
                    break;
                }
            };
            let payload = match reader.read(len as usize) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("{session}: truncated frame {id}: {e}");
                    break;
                }
            };
            handlers::dispatch(state, &session, id, payload).await;
        }
        session.touch();

        http::Response::octet_stream(session.drain())
    }

    async fn avatar(&self, request: &http::Request) -> http::Response {
        let id = request.path.trim_start_matches('/');
        let dir = self.args.data_dir.join("avatars");
        let named = smol::fs::read(dir.join(format!("{id}.png"))).await;
        let bytes = match named {
            Ok(bytes) => bytes,
            Err(_) => match smol::fs::read(dir.join("default.png")).await {
                Ok(bytes) => bytes,
                Err(_) => return http::Response::not_found(),
            },
        };
        http::Response::new(200).with_body("image/png", bytes)
    }
}

static GIFS: &[&str] = &[
    "https://media1.tenor.com/m/omHmObRADasAAAAd/finnish-hospital-kys.gif",
    "https://media1.tenor.com/m/fkVF3jbeRw0AAAAC/tusk.gif",
    "https://media1.tenor.com/m/5U1iPUrdTc0AAAAC/computer-works-for-me.gif",
    "https://media1.tenor.com/m/uGN34orccIEAAAAC/skillissue-skill.gif",
    "https://media1.tenor.com/m/9B2tvz_W9OQAAAAd/im-in-your-walls.gif",
    "https://media1.tenor.com/m/vRL2z5-nwa8AAAAd/furina-sad.gif",
];

fn landing_page() -> http::Response {
    let mut rng = rand::thread_rng();
    let quote = login::QUOTES.choose(&mut rng).copied().unwrap_or("onecho!");
    let gif = GIFS.choose(&mut rng).copied().unwrap_or_default();
    let body = format!(
        "<center style='font-family: \"Comic Sans MS\", \"Comic Sans\", cursive;'>\n\
         <h1>onecho!</h1> <h2>{quote}</h2> <br> <img src='{gif}'>\n\
         </center>"
    );
    http::Response::html(body)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_owned()
    }
}
