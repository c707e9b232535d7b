/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::sync::{RwLockReadGuard, RwLockWriteGuard};

use crate::error::FsError;
use crate::inode::{InodeKind, InodeState, InodeTable, FS_ROOT};
use crate::path::PathName;

/// A held lock on one inode, read or write.
pub enum NodeGuard<'a> {
    Read(RwLockReadGuard<'a, InodeState>),
    Write(RwLockWriteGuard<'a, InodeState>),
}

impl<'a> NodeGuard<'a> {
    pub fn state(&self) -> &InodeState {
        match self {
            NodeGuard::Read(g) => g,
            NodeGuard::Write(g) => g,
        }
    }

    pub fn as_write(&mut self) -> &mut RwLockWriteGuard<'a, InodeState> {
        match self {
            NodeGuard::Write(g) => g,
            NodeGuard::Read(_) => panic!("node held for reading, not writing"),
        }
    }
}

/// The set of locks a path walk acquired, held in root-to-leaf acquisition
/// order. Released in the reverse order they were taken, same as the
/// walker this is modeled on: unwinding a walk from the leaf back up to the
/// root.
pub struct LockedPath<'a> {
    nodes: Vec<(usize, NodeGuard<'a>)>,
}

impl<'a> LockedPath<'a> {
    /// Builds a locked-path handle out of guards acquired elsewhere, so the
    /// same reverse-order release applies no matter how the guards were
    /// assembled. Used by the move engine, which acquires its two walks'
    /// guards under its own ordering protocol rather than a single
    /// top-down `walk`.
    pub(crate) fn from_guards(nodes: Vec<(usize, NodeGuard<'a>)>) -> Self {
        LockedPath { nodes }
    }

    pub fn guard_mut(&mut self, inumber: usize) -> Option<&mut NodeGuard<'a>> {
        self.nodes
            .iter_mut()
            .find(|(i, _)| *i == inumber)
            .map(|(_, g)| g)
    }

    pub fn terminal_inumber(&self) -> usize {
        self.nodes.last().expect("a locked path is never empty").0
    }

    pub fn terminal(&self) -> &NodeGuard<'a> {
        &self.nodes.last().expect("a locked path is never empty").1
    }

    pub fn terminal_mut(&mut self) -> &mut NodeGuard<'a> {
        &mut self.nodes.last_mut().expect("a locked path is never empty").1
    }

    /// Inumbers from root to leaf, for tests and diagnostics.
    pub fn chain(&self) -> Vec<usize> {
        self.nodes.iter().map(|(i, _)| *i).collect()
    }
}

impl<'a> Drop for LockedPath<'a> {
    fn drop(&mut self) {
        while self.nodes.pop().is_some() {}
    }
}

enum TerminalMode {
    Read,
    Write,
}

fn walk<'a>(table: &'a InodeTable, path: &PathName, terminal: TerminalMode) -> Result<LockedPath<'a>, FsError> {
    // spec.md §3: a trailing `/` is stripped, not treated as malformed.
    // `split` already normalizes this way for create/delete/move's parent
    // paths; a whole-path walk (lookup, print's per-subtree resolution)
    // needs the same normalization before checking validity or segments.
    let normalized = path.normalize();
    if !normalized.is_valid() {
        return Err(FsError::InvalidPath(path.clone()));
    }

    let segments = normalized.segments();
    if segments.iter().any(|s| s.len() > table.max_file_name()) {
        return Err(FsError::InvalidPath(path.clone()));
    }
    let mut nodes = Vec::with_capacity(segments.len() + 1);

    let lock_root_as_write = segments.is_empty() && matches!(terminal, TerminalMode::Write);
    nodes.push((
        FS_ROOT,
        if lock_root_as_write {
            NodeGuard::Write(table.write_lock(FS_ROOT))
        } else {
            NodeGuard::Read(table.read_lock(FS_ROOT))
        },
    ));

    let last_index = segments.len().saturating_sub(1);
    for (i, segment) in segments.iter().enumerate() {
        let current = nodes.last().unwrap();
        if current.1.state().kind() != Some(InodeKind::Directory) {
            return Err(FsError::NotADir(path.clone()));
        }
        let next = current
            .1
            .state()
            .lookup(segment)
            .ok_or_else(|| FsError::NotFound(path.clone()))?;

        let is_terminal = i == last_index;
        let guard = if is_terminal && matches!(terminal, TerminalMode::Write) {
            NodeGuard::Write(table.write_lock(next))
        } else {
            NodeGuard::Read(table.read_lock(next))
        };
        nodes.push((next, guard));
    }

    Ok(LockedPath { nodes })
}

/// Rejects a standalone component name (already split off a path, so not
/// covered by a walk's own per-segment check) that exceeds `MAX_FILE_NAME`.
/// Used by create/delete/move for the terminal name a path splits into,
/// which a walk over the *parent* path alone never inspects.
pub fn check_name_length(table: &InodeTable, path: &PathName, name: &str) -> Result<(), FsError> {
    if name.len() > table.max_file_name() {
        return Err(FsError::InvalidPath(path.clone()));
    }
    Ok(())
}

/// Resolves `path`, read-locking every node visited from the root down to
/// and including the target. Used for lookups and for print's consistency
/// requirement on individual subtrees.
pub fn read_walk<'a>(table: &'a InodeTable, path: &PathName) -> Result<LockedPath<'a>, FsError> {
    walk(table, path, TerminalMode::Read)
}

/// Resolves `path`, read-locking every ancestor and write-locking the
/// target itself. Used by create and delete, which need exclusive access
/// to mutate the target directory's entry table while only needing to
/// guard against ancestor deletion on the way down.
pub fn write_walk<'a>(table: &'a InodeTable, path: &PathName) -> Result<LockedPath<'a>, FsError> {
    walk(table, path, TerminalMode::Write)
}

/// Resolves `path` to its chain of inumbers without holding any lock
/// across more than one hop. Each hop takes a momentary read lock just
/// long enough to copy out the next inumber. The result is a snapshot: by
/// the time the caller acts on it, the tree may have changed underneath.
/// This is deliberate — it mirrors the move engine's lock-free pre-pass
/// that measures path lengths and samples candidate inumbers before
/// entering its own locking protocol, which re-validates everything that
/// matters while the real locks are held.
pub fn resolve_unlocked(table: &InodeTable, path: &PathName) -> Result<Vec<usize>, FsError> {
    let normalized = path.normalize();
    if !normalized.is_valid() {
        return Err(FsError::InvalidPath(path.clone()));
    }
    if normalized.segments().iter().any(|s| s.len() > table.max_file_name()) {
        return Err(FsError::InvalidPath(path.clone()));
    }

    let mut chain = vec![FS_ROOT];
    let mut current = FS_ROOT;
    for segment in normalized.segments() {
        let next = {
            let guard = table.read_lock(current);
            if guard.kind() != Some(InodeKind::Directory) {
                return Err(FsError::NotADir(path.clone()));
            }
            guard.lookup(segment)
        };
        let next = next.ok_or_else(|| FsError::NotFound(path.clone()))?;
        chain.push(next);
        current = next;
    }
    Ok(chain)
}
