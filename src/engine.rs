/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::io::{self, Write};

use log::{debug, info};

use crate::barrier::PrintBarrier;
use crate::config::TableConfig;
use crate::error::Result;
use crate::inode::{FS_ROOT, InodeKind, InodeState, InodeTable};
use crate::mover;
use crate::mutator;
use crate::path::PathName;
use crate::tree::read_walk;

/// Owns the inode table and the print barrier for one running server. A
/// server holds a single `Engine` behind a shared reference and hands it to
/// every worker thread; there is no other global state.
pub struct Engine {
    table: InodeTable,
    barrier: PrintBarrier,
}

impl Engine {
    pub fn new(config: &TableConfig) -> Self {
        let table = InodeTable::new(
            config.inode_table_size,
            config.max_dir_entries,
            config.max_file_name,
        );
        let (root, guard) = table
            .allocate(InodeKind::Directory)
            .expect("a freshly created table always has room for the root");
        assert_eq!(root, FS_ROOT, "root must be allocated at inumber 0");
        drop(guard);
        info!(
            "engine initialized ({} inode slots, {} entries per directory)",
            config.inode_table_size, config.max_dir_entries
        );
        Engine {
            table,
            barrier: PrintBarrier::new(),
        }
    }

    pub fn create(&self, path: &PathName, kind: InodeKind) -> Result<usize> {
        let _guard = self.barrier.begin_mutation();
        mutator::create(&self.table, path, kind)
    }

    pub fn delete(&self, path: &PathName) -> Result<()> {
        let _guard = self.barrier.begin_mutation();
        mutator::delete(&self.table, path)
    }

    /// Not gated by the print barrier: a lookup only takes per-inode read
    /// locks, which is safe to run alongside a print (which excludes
    /// mutators, not readers) and alongside other lookups.
    pub fn lookup(&self, path: &PathName) -> Option<usize> {
        read_walk(&self.table, path)
            .ok()
            .map(|locked| locked.terminal_inumber())
    }

    pub fn mv(&self, from: &PathName, to: &PathName) -> Result<usize> {
        let _guard = self.barrier.begin_mutation();
        mover::mv(&self.table, from, to)
    }

    /// Size of the underlying inode table, for the server's heartbeat log
    /// line. Not a live occupancy count: scanning every slot would itself
    /// need a lock per slot, which a heartbeat has no business taking.
    pub fn table_size(&self) -> usize {
        self.table.len()
    }

    /// Serializes the whole tree, depth-first, parent before children, one
    /// path per line. Runs under the print barrier's exclusive claim, so
    /// the walk below takes no per-inode locks: no mutator can be running
    /// while this guard is held.
    pub fn print<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let _guard = self.barrier.begin_print();
        debug!("print: tree walk starting");
        self.print_subtree(out, FS_ROOT, &PathName::from("/"))
    }

    fn print_subtree<W: Write>(&self, out: &mut W, inumber: usize, path: &PathName) -> io::Result<()> {
        writeln!(out, "{path}")?;
        let state = self.table.read_lock(inumber);
        if let InodeState::Directory(entries) = &*state {
            let children: Vec<_> = entries.iter().flatten().cloned().collect();
            drop(state);
            for entry in children {
                let child_path = path.join(entry.name);
                self.print_subtree(out, entry.inumber, &child_path)?;
            }
        }
        Ok(())
    }
}
