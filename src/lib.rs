/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

pub mod args;
pub mod barrier;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod inode;
pub mod mover;
pub mod mutator;
pub mod path;
pub mod server;
pub mod tree;
