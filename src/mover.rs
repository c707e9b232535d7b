/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use log::debug;

use crate::error::{FsError, Result};
use crate::inode::{InodeKind, InodeState, InodeTable, FS_ROOT};
use crate::path::PathName;
use crate::tree::{check_name_length, resolve_unlocked, LockedPath, NodeGuard};

/// Relocates the node at `from` to `to`, preserving its inumber (and so
/// its identity and its whole subtree, without copying anything). Returns
/// the inumber that was moved.
///
/// The two paths are resolved, lock-free, before any lock is taken, to
/// learn the inumbers involved. Locking then happens in a single pass over
/// every node either path touches — ancestors and the three nodes this move
/// mutates (the source parent, the moved node, and the destination parent)
/// alike — in one global ascending-inumber order, taking a write lock where
/// the node is one of the three mutated and a read lock everywhere else.
/// Grouping by role instead (all reads, then all writes) is what the lock
/// order must NOT do: a concurrent pair of moves can each need one of the
/// other's write targets as a mere read-ancestor, and if both acquire their
/// reads before their writes, each can block forever on the other's write
/// while still holding a read the other is waiting on. A single order
/// keyed only on inumber, covering every lock this call will take, rules
/// that out: two moves contending for the same pair of nodes always
/// request them in the same relative order, whichever role each plays.
pub fn mv(table: &InodeTable, from: &PathName, to: &PathName) -> Result<usize> {
    if from.is_root() {
        return Err(FsError::RootRemoval);
    }
    if to.is_root() {
        return Err(FsError::AlreadyExists(to.clone()));
    }

    let (parent1_path, child1_name) = from.split();
    let (parent2_path, child2_name) = to.split();
    check_name_length(table, to, &child2_name)?;

    let ancestors1 = resolve_unlocked(table, &parent1_path)?;
    let ancestors2 = resolve_unlocked(table, &parent2_path)?;
    let parent1_inumber = *ancestors1.last().expect("resolved chain is never empty");
    let parent2_inumber = *ancestors2.last().expect("resolved chain is never empty");

    let moved_inumber = {
        let parent1_state = table.read_lock(parent1_inumber);
        if parent1_state.kind() != Some(InodeKind::Directory) {
            return Err(FsError::NotADir(parent1_path));
        }
        parent1_state
            .lookup(&child1_name)
            .ok_or_else(|| FsError::NotFound(from.clone()))?
    };

    // Cheap pre-lock rejection against the unlocked snapshot: catches the
    // common case before any lock is taken. Not authoritative by itself —
    // the tree can change between this snapshot and lock acquisition, so
    // `perform_move` redoes this same check against the held lock set
    // before committing anything, per spec.md's "evaluated after lock
    // acquisition" rule.
    if ancestors2.contains(&moved_inumber) {
        return Err(FsError::Cycle(to.clone(), from.clone()));
    }

    let mut write_targets = vec![parent1_inumber, moved_inumber, parent2_inumber];
    write_targets.sort_unstable();
    write_targets.dedup();

    let mut all_targets: Vec<usize> = ancestors1
        .iter()
        .chain(ancestors2.iter())
        .copied()
        .chain(write_targets.iter().copied())
        .collect();
    all_targets.sort_unstable();
    all_targets.dedup();

    let mut nodes = Vec::with_capacity(all_targets.len());
    for inumber in all_targets {
        let guard = if write_targets.contains(&inumber) {
            NodeGuard::Write(table.write_lock(inumber))
        } else {
            NodeGuard::Read(table.read_lock(inumber))
        };
        nodes.push((inumber, guard));
    }

    let result = perform_move(
        table,
        &mut nodes,
        parent1_inumber,
        &child1_name,
        parent2_inumber,
        &parent2_path,
        child2_name,
        moved_inumber,
        from,
        to,
    );

    drop(LockedPath::from_guards(nodes));
    let inumber = result?;
    debug!("moved {from} to {to} (inumber {inumber})");
    Ok(inumber)
}

#[allow(clippy::too_many_arguments)]
fn perform_move(
    table: &InodeTable,
    nodes: &mut [(usize, NodeGuard<'_>)],
    parent1_inumber: usize,
    child1_name: &str,
    parent2_inumber: usize,
    parent2_path: &PathName,
    child2_name: String,
    moved_inumber: usize,
    from: &PathName,
    to: &PathName,
) -> Result<usize> {
    {
        let parent1_guard = find_write(nodes, parent1_inumber);
        if parent1_guard.kind() != Some(InodeKind::Directory) {
            return Err(FsError::NotADir(from.clone()));
        }
        match parent1_guard.lookup(child1_name) {
            Some(inumber) if inumber == moved_inumber => {}
            _ => return Err(FsError::NotFound(from.clone())),
        }
    }

    {
        let parent2_guard = find_write(nodes, parent2_inumber);
        if parent2_guard.kind() != Some(InodeKind::Directory) {
            return Err(FsError::NotADir(to.clone()));
        }
        if parent2_guard.lookup(&child2_name).is_some() {
            return Err(FsError::AlreadyExists(to.clone()));
        }
        if !parent2_guard.has_free_dir_slot() {
            return Err(FsError::DirFull(to.clone()));
        }
    }

    // Re-run the ancestor-cycle check against the held lock set, per
    // spec.md's "evaluated after lock acquisition" rule: the unlocked
    // pre-pass in `mv` can go stale if some other move relocates a subtree
    // between that snapshot and the locks above actually landing. Walking
    // `parent2_path` again here, through the guards already held rather
    // than by taking new locks, re-validates against the tree as it
    // actually stands right before this move commits.
    let fresh_ancestors2 = revalidate_ancestor_chain(nodes, parent2_path)?;
    if fresh_ancestors2.contains(&moved_inumber) {
        return Err(FsError::Cycle(to.clone(), from.clone()));
    }

    let (moved_kind, payload) = {
        let moved_guard = find_write(nodes, moved_inumber);
        let kind = moved_guard
            .kind()
            .expect("moved node was resolved under lock");
        (kind, moved_guard.snapshot_payload())
    };

    {
        let parent1_guard = find_write(nodes, parent1_inumber);
        table.dir_remove_entry(parent1_guard, moved_inumber);
    }

    {
        let moved_guard = find_write(nodes, moved_inumber);
        table.init_slot(moved_guard, moved_kind);
        moved_guard.restore_payload(payload);
    }

    {
        let parent2_guard = find_write(nodes, parent2_inumber);
        table
            .dir_add_entry(parent2_guard, child2_name, moved_inumber)
            .expect("room in the destination directory was already verified");
    }

    Ok(moved_inumber)
}

/// Re-walks `parent2_path` from the root, entirely through locks this
/// move's caller already holds, to learn the destination's *current*
/// ancestor chain rather than trust the lock-free snapshot taken before
/// acquisition. Every node on this path is guaranteed present in `nodes`:
/// it's exactly the set the acquisition phase locked as `ancestors2`.
fn revalidate_ancestor_chain(
    nodes: &[(usize, NodeGuard<'_>)],
    parent2_path: &PathName,
) -> Result<Vec<usize>> {
    let mut chain = vec![FS_ROOT];
    let mut current = FS_ROOT;
    for segment in parent2_path.segments() {
        let state = find_state(nodes, current);
        if state.kind() != Some(InodeKind::Directory) {
            return Err(FsError::NotADir(parent2_path.clone()));
        }
        let next = state
            .lookup(segment)
            .ok_or_else(|| FsError::NotFound(parent2_path.clone()))?;
        chain.push(next);
        current = next;
    }
    Ok(chain)
}

fn find_write<'a, 'g>(
    nodes: &'g mut [(usize, NodeGuard<'a>)],
    inumber: usize,
) -> &'g mut std::sync::RwLockWriteGuard<'a, InodeState> {
    nodes
        .iter_mut()
        .find(|(i, _)| *i == inumber)
        .expect("inode was locked by the move's acquisition phase")
        .1
        .as_write()
}

fn find_state<'g>(nodes: &'g [(usize, NodeGuard<'_>)], inumber: usize) -> &'g InodeState {
    nodes
        .iter()
        .find(|(i, _)| *i == inumber)
        .expect("inode was locked by the move's acquisition phase")
        .1
        .state()
}
