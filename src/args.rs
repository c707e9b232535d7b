/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use clap::Parser;

fn positive_usize(s: &str) -> Result<usize, String> {
    let value: usize = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if value == 0 {
        return Err("number of threads must be a positive integer".to_owned());
    }
    Ok(value)
}

/// `<binary> <num_threads> <server_socket_path>`, matching the two
/// positional arguments `original_source/server-main.c`'s `main` requires.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Number of worker threads draining the server socket
    #[arg(value_parser = positive_usize)]
    pub num_threads: usize,

    /// Filesystem path the server's Unix datagram socket is bound to
    pub server_socket_path: String,

    /// Path to configuration file in TOML format
    #[arg(long, default_value_t = String::from("./config.toml"))]
    pub config_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_threads() {
        let err = Args::try_parse_from(["tecnicofs", "0", "/tmp/sock"]).unwrap_err();
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn parses_positional_args() {
        let args = Args::try_parse_from(["tecnicofs", "4", "/tmp/sock"]).unwrap();
        assert_eq!(args.num_threads, 4);
        assert_eq!(args.server_socket_path, "/tmp/sock");
        assert_eq!(args.config_path, "./config.toml");
    }
}
