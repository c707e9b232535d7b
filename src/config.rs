/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use serde::{Deserialize, Serialize};

/// Tunables for the inode table, defaulting to the constants the original
/// C server hardcoded (`INODE_TABLE_SIZE`, `MAX_DIR_ENTRIES`,
/// `MAX_FILE_NAME` in `tecnicofs-api-constants.h`).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct TableConfig {
    pub inode_table_size: usize,
    pub max_dir_entries: usize,
    pub max_file_name: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        TableConfig {
            inode_table_size: 50,
            max_dir_entries: 20,
            max_file_name: 40,
        }
    }
}

/// Server-level knobs that have no counterpart in the wire protocol.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub heartbeat_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            heartbeat_interval_secs: 10,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub table: TableConfig,
    pub server: ServerConfig,
}
