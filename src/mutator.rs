/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use log::debug;

use crate::error::{FsError, Result};
use crate::inode::{InodeKind, InodeTable};
use crate::path::PathName;
use crate::tree::{check_name_length, write_walk};

/// Creates a new node of `kind` at `path`. The parent directory is
/// write-locked for the whole operation; ancestors above it are only
/// read-locked, matching the locking a plain lookup would need to get
/// there.
pub fn create(table: &InodeTable, path: &PathName, kind: InodeKind) -> Result<usize> {
    if path.is_root() {
        return Err(FsError::AlreadyExists(path.clone()));
    }
    let (parent_path, name) = path.split();
    check_name_length(table, path, &name)?;

    let mut locked_parent = write_walk(table, &parent_path)?;
    let parent_guard = locked_parent.terminal_mut().as_write();
    if parent_guard.kind() != Some(InodeKind::Directory) {
        return Err(FsError::NotADir(parent_path));
    }
    if parent_guard.lookup(&name).is_some() {
        return Err(FsError::AlreadyExists(path.clone()));
    }

    let (child_inumber, mut child_guard) = table
        .allocate(kind)
        .map_err(|_| FsError::TableFull)?;

    if table.dir_add_entry(parent_guard, name, child_inumber).is_err() {
        // Roll back the allocation rather than leak a claimed-but-unlinked
        // slot: the parent's entry table had no room left for it.
        table.free_slot(&mut child_guard);
        return Err(FsError::DirFull(parent_path));
    }

    debug!("created {path} (inumber {child_inumber})");
    Ok(child_inumber)
}

/// Removes the node at `path`. Directories must be empty. The root itself
/// can never be removed.
pub fn delete(table: &InodeTable, path: &PathName) -> Result<()> {
    if path.is_root() {
        return Err(FsError::RootRemoval);
    }
    let (parent_path, name) = path.split();

    let mut locked_parent = write_walk(table, &parent_path)?;
    let parent_guard = locked_parent.terminal_mut().as_write();
    if parent_guard.kind() != Some(InodeKind::Directory) {
        return Err(FsError::NotADir(parent_path));
    }
    let child_inumber = parent_guard
        .lookup(&name)
        .ok_or_else(|| FsError::NotFound(path.clone()))?;

    let mut child_guard = table.write_lock(child_inumber);
    if child_guard.kind() == Some(InodeKind::Directory) && !child_guard.is_empty_dir() {
        return Err(FsError::NotEmpty(path.clone()));
    }

    table.dir_remove_entry(parent_guard, child_inumber);
    table.free_slot(&mut child_guard);

    debug!("deleted {path} (inumber {child_inumber})");
    Ok(())
}
