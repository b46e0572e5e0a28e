// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

// Binary part of the application.
// Everything else is in lib.rs so it can be unit tested.

use std::net::{IpAddr, TcpListener};
use std::sync::Arc;

use clap::Parser;
use log::error;
use server::bancho::{AppState, Listener};
use server::executor;
use smol::Async;

fn main() {
    let args = Arc::new(server::args::Config::parse());
    server::setup_log(args.debug, false);

    let host: IpAddr = args
        .http_host
        .parse()
        .expect("HTTP_HOST is not a valid address");
    let sock = Async::<TcpListener>::bind((host, args.http_port))
        .unwrap_or_else(|e| panic!("Cannot bind to {}:{}: {e}", args.http_host, args.http_port));

    executor::run_until(async move {
        let state = match AppState::open(&args.data_dir).await {
            Ok(state) => state,
            Err(e) => {
                error!("Cannot open the data store at {:?}: {e}", args.data_dir);
                return;
            }
        };

        let listener = Listener::new(sock, state, args.clone());
        if let Err(e) = listener.listen().await {
            error!("Listener terminated: {e}");
        }
    });
}
