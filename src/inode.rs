/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use log::error;

use crate::error::EngineError;
use crate::path::Name;

/// Raised when a directory's fixed-size entry table has no free slot left.
/// Carries no path: callers attach the path they were resolving when they
/// convert this into an [`crate::error::FsError::DirFull`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirFullError;

/// Raised when every slot in the inode table is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableFullError;

/// Inumber of the tree root. Fixed for the lifetime of the engine.
pub const FS_ROOT: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    File,
    Directory,
}

#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: Name,
    pub inumber: usize,
}

/// The part of an inode's state a move must carry across to the
/// reinitialized slot at its destination: a directory's entries, or a
/// file's payload bytes.
#[derive(Debug, Clone)]
pub enum Payload {
    File(Vec<u8>),
    Directory(Vec<Option<DirEntry>>),
}

/// Contents of one inode slot. `Free` marks an unallocated slot, mirroring
/// `T_NONE` in the inode table this engine is modeled on: the slot's data
/// vector is only allocated once the slot is claimed as a directory.
#[derive(Debug, Clone)]
pub enum InodeState {
    Free,
    File(Vec<u8>),
    Directory(Vec<Option<DirEntry>>),
}

impl InodeState {
    pub fn kind(&self) -> Option<InodeKind> {
        match self {
            InodeState::Free => None,
            InodeState::File(_) => Some(InodeKind::File),
            InodeState::Directory(_) => Some(InodeKind::Directory),
        }
    }

    /// Clones out this slot's payload, for a move to restore onto the
    /// slot's reinitialized state at its new location. Panics on a free
    /// slot; callers only snapshot nodes they have already resolved.
    pub fn snapshot_payload(&self) -> Payload {
        match self {
            InodeState::Free => unreachable!("snapshot_payload called on a free inode"),
            InodeState::File(bytes) => Payload::File(bytes.clone()),
            InodeState::Directory(entries) => Payload::Directory(entries.clone()),
        }
    }

    /// Overwrites this slot's payload with a previously captured snapshot.
    /// The slot must already have been reinitialized to the matching kind.
    pub fn restore_payload(&mut self, payload: Payload) {
        match (self, payload) {
            (InodeState::File(bytes), Payload::File(snapshot)) => *bytes = snapshot,
            (InodeState::Directory(entries), Payload::Directory(snapshot)) => {
                *entries = snapshot
            }
            _ => unreachable!("restore_payload called with a mismatched kind"),
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, InodeState::Free)
    }

    /// Looks up `name` among this directory's live entries. Panics if self
    /// is not a directory; callers must have already checked the kind.
    pub fn lookup(&self, name: &str) -> Option<usize> {
        match self {
            InodeState::Directory(entries) => entries
                .iter()
                .flatten()
                .find(|e| e.name == name)
                .map(|e| e.inumber),
            _ => unreachable!("lookup called on a non-directory inode"),
        }
    }

    pub fn has_free_dir_slot(&self) -> bool {
        match self {
            InodeState::Directory(entries) => entries.iter().any(|e| e.is_none()),
            _ => unreachable!("has_free_dir_slot called on a non-directory inode"),
        }
    }

    pub fn is_empty_dir(&self) -> bool {
        match self {
            InodeState::Directory(entries) => entries.iter().all(|e| e.is_none()),
            _ => unreachable!("is_empty_dir called on a non-directory inode"),
        }
    }

    fn add_entry(&mut self, name: Name, inumber: usize) -> Result<(), DirFullError> {
        match self {
            InodeState::Directory(entries) => {
                let slot = entries.iter_mut().find(|e| e.is_none());
                match slot {
                    Some(slot) => {
                        *slot = Some(DirEntry { name, inumber });
                        Ok(())
                    }
                    None => Err(DirFullError),
                }
            }
            _ => unreachable!("add_entry called on a non-directory inode"),
        }
    }

    fn remove_entry(&mut self, inumber: usize) {
        match self {
            InodeState::Directory(entries) => {
                if let Some(slot) = entries.iter_mut().find(|e| {
                    matches!(e, Some(entry) if entry.inumber == inumber)
                }) {
                    *slot = None;
                }
            }
            _ => unreachable!("remove_entry called on a non-directory inode"),
        }
    }
}

pub enum TryLockOutcome<G> {
    Acquired(G),
    WouldBlock,
}

/// Fixed-size table of independently rw-locked inode slots. There is no
/// table-wide lock: allocation scans for a free slot using non-blocking
/// try-write, the same protocol the path walker uses for ordinary node
/// access, so a scan never blocks behind a node some other thread is
/// already holding.
pub struct InodeTable {
    slots: Vec<RwLock<InodeState>>,
    max_dir_entries: usize,
    max_file_name: usize,
}

impl InodeTable {
    pub fn new(size: usize, max_dir_entries: usize, max_file_name: usize) -> Self {
        let slots = (0..size).map(|_| RwLock::new(InodeState::Free)).collect();
        InodeTable {
            slots,
            max_dir_entries,
            max_file_name,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Bound on a single path component's length, `MAX_FILE_NAME` in the
    /// original server's constants header.
    pub fn max_file_name(&self) -> usize {
        self.max_file_name
    }

    fn abort_poisoned(&self, inumber: usize) -> ! {
        let err = EngineError::LockPoisoned(inumber);
        error!("{err}, a holder panicked while mutating the tree; aborting");
        std::process::abort();
    }

    pub fn read_lock(&self, inumber: usize) -> RwLockReadGuard<'_, InodeState> {
        self.slots[inumber]
            .read()
            .unwrap_or_else(|_| self.abort_poisoned(inumber))
    }

    pub fn write_lock(&self, inumber: usize) -> RwLockWriteGuard<'_, InodeState> {
        self.slots[inumber]
            .write()
            .unwrap_or_else(|_| self.abort_poisoned(inumber))
    }

    pub fn try_read_lock(&self, inumber: usize) -> TryLockOutcome<RwLockReadGuard<'_, InodeState>> {
        match self.slots[inumber].try_read() {
            Ok(guard) => TryLockOutcome::Acquired(guard),
            Err(TryLockError::WouldBlock) => TryLockOutcome::WouldBlock,
            Err(TryLockError::Poisoned(_)) => self.abort_poisoned(inumber),
        }
    }

    pub fn try_write_lock(
        &self,
        inumber: usize,
    ) -> TryLockOutcome<RwLockWriteGuard<'_, InodeState>> {
        match self.slots[inumber].try_write() {
            Ok(guard) => TryLockOutcome::Acquired(guard),
            Err(TryLockError::WouldBlock) => TryLockOutcome::WouldBlock,
            Err(TryLockError::Poisoned(_)) => self.abort_poisoned(inumber),
        }
    }

    /// Initializes a held slot as a node of the given kind, in place. Used
    /// both for ordinary allocation (over a slot already confirmed `Free`)
    /// and by the move engine, which reinitializes the moved inode's own
    /// slot at its new location without ever releasing the write lock
    /// taken on it at the start of the move — the inumber, and the thread's
    /// hold on it, never changes.
    pub fn init_slot(&self, guard: &mut RwLockWriteGuard<'_, InodeState>, kind: InodeKind) {
        **guard = match kind {
            InodeKind::File => InodeState::File(Vec::new()),
            InodeKind::Directory => {
                InodeState::Directory(vec![None; self.max_dir_entries])
            }
        };
    }

    pub fn free_slot(&self, guard: &mut RwLockWriteGuard<'_, InodeState>) {
        **guard = InodeState::Free;
    }

    /// Scans the table for a free slot and claims it for `kind`, returning
    /// the held write guard so the caller can link it into its parent
    /// directory before releasing anything. Mirrors the original table's
    /// allocator: a non-blocking scan that skips nodes it can't try-lock or
    /// that turn out to already be in use.
    pub fn allocate(
        &self,
        kind: InodeKind,
    ) -> Result<(usize, RwLockWriteGuard<'_, InodeState>), TableFullError> {
        for inumber in 0..self.slots.len() {
            match self.try_write_lock(inumber) {
                TryLockOutcome::Acquired(mut guard) => {
                    if guard.is_free() {
                        self.init_slot(&mut guard, kind);
                        return Ok((inumber, guard));
                    }
                }
                TryLockOutcome::WouldBlock => continue,
            }
        }
        Err(TableFullError)
    }

    pub fn dir_add_entry(
        &self,
        guard: &mut RwLockWriteGuard<'_, InodeState>,
        name: Name,
        inumber: usize,
    ) -> Result<(), DirFullError> {
        guard.add_entry(name, inumber)
    }

    pub fn dir_remove_entry(&self, guard: &mut RwLockWriteGuard<'_, InodeState>, inumber: usize) {
        guard.remove_entry(inumber)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_claims_first_free_slot() {
        let table = InodeTable::new(4, 4, 64);
        let (inumber, guard) = table.allocate(InodeKind::Directory).unwrap();
        assert_eq!(inumber, 0);
        assert_eq!(guard.kind(), Some(InodeKind::Directory));
    }

    #[test]
    fn allocate_skips_in_use_slots() {
        let table = InodeTable::new(2, 4, 64);
        let (first, _first_guard) = table.allocate(InodeKind::File).unwrap();
        let (second, _second_guard) = table.allocate(InodeKind::File).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn allocate_fails_when_table_full() {
        let table = InodeTable::new(1, 4, 64);
        let (_inumber, _guard) = table.allocate(InodeKind::File).unwrap();
        assert_eq!(table.allocate(InodeKind::File), Err(TableFullError));
    }

    #[test]
    fn dir_add_and_lookup_and_remove() {
        let table = InodeTable::new(4, 4, 64);
        let mut root = table.write_lock(0);
        table.init_slot(&mut root, InodeKind::Directory);
        table.dir_add_entry(&mut root, "a".into(), 1).unwrap();
        assert_eq!(root.lookup("a"), Some(1));
        table.dir_remove_entry(&mut root, 1);
        assert_eq!(root.lookup("a"), None);
    }

    #[test]
    fn payload_round_trips_through_reinitialization() {
        let table = InodeTable::new(4, 4, 64);
        let mut guard = table.write_lock(0);
        table.init_slot(&mut guard, InodeKind::Directory);
        table.dir_add_entry(&mut guard, "a".into(), 1).unwrap();
        let snapshot = guard.snapshot_payload();

        table.init_slot(&mut guard, InodeKind::Directory);
        assert!(guard.is_empty_dir());
        guard.restore_payload(snapshot);
        assert_eq!(guard.lookup("a"), Some(1));
    }

    #[test]
    fn dir_full_when_entries_exhausted() {
        let table = InodeTable::new(4, 1, 64);
        let mut root = table.write_lock(0);
        table.init_slot(&mut root, InodeKind::Directory);
        table.dir_add_entry(&mut root, "a".into(), 1).unwrap();
        assert_eq!(
            table.dir_add_entry(&mut root, "b".into(), 2),
            Err(DirFullError)
        );
    }
}
