// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use std::path::PathBuf;

use clap::Parser;

/// onecho - the single-binary osu! server
#[derive(Parser, Debug)]
#[clap(name = "onecho", version)]
pub struct Config {
    /// Domain the bancho and avatar subdomains hang off of
    #[clap(long, env = "MAIN_DOMAIN", default_value = "localhost")]
    pub main_domain: String,

    /// Address to bind
    #[clap(long, env = "HTTP_HOST", default_value = "0.0.0.0")]
    pub http_host: String,

    /// Port to bind
    #[clap(long, env = "HTTP_PORT", default_value_t = 2137)]
    pub http_port: u16,

    /// Directory holding the CSV tables and avatars
    #[clap(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Enable debug logging
    #[clap(long)]
    pub debug: bool,
}
