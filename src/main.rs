/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::fs;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::{error, info};

use tecnicofs::args::Args;
use tecnicofs::config::Config;
use tecnicofs::engine::Engine;
use tecnicofs::server::Server;

fn main() {
    let status = run();
    if let Err(ref err) = status {
        error!("{:?}", err);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    log4rs::init_file("log4rs.yml", Default::default()).with_context(|| "failed to init logger")?;
    info!("init logger");

    let config = match fs::read_to_string(&args.config_path) {
        Ok(contents) => {
            toml::from_str(&contents).with_context(|| "failed to parse configuration")?
        }
        Err(_) => {
            info!(
                "no configuration file at '{}', using defaults",
                args.config_path
            );
            Config::default()
        }
    };

    info!(
        "starting tecnicofs with {} worker thread(s) on socket '{}'",
        args.num_threads, args.server_socket_path
    );
    let engine = Arc::new(Engine::new(&config.table));
    let server = Server::bind(&args.server_socket_path)
        .with_context(|| format!("failed to bind socket at '{}'", args.server_socket_path))?;

    server
        .run(engine, args.num_threads, &config.server)
        .with_context(|| "server run loop failed")
}
