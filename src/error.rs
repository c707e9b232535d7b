/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use thiserror::Error;

use crate::path::PathName;

pub type Result<T> = std::result::Result<T, FsError>;

/// Errors produced by the tree engine. Each variant corresponds to one of
/// the reject conditions an operation can hit while walking or mutating the
/// inode table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("invalid path '{0}'")]
    InvalidPath(PathName),
    #[error("node at path '{0}' not found")]
    NotFound(PathName),
    #[error("'{0}' is not a directory")]
    NotADir(PathName),
    #[error("'{0}' is not a file")]
    NotAFile(PathName),
    #[error("node at '{0}' already exists")]
    AlreadyExists(PathName),
    #[error("directory '{0}' is not empty")]
    NotEmpty(PathName),
    #[error("directory '{0}' has no free entry slots")]
    DirFull(PathName),
    #[error("inode table has no free slots")]
    TableFull,
    #[error("removing the root is forbidden")]
    RootRemoval,
    #[error("'{1}' is an ancestor of '{0}', move would create a cycle")]
    Cycle(PathName, PathName),
}

/// Fatal conditions that leave the engine's invariants unclear to trust any
/// further. These are not protocol-level failures: a client never sees one,
/// the process aborts instead, the way the original server calls
/// `exit(EXIT_FAILURE)` when a lock primitive itself misbehaves.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("lock for inode {0} is poisoned")]
    LockPoisoned(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
