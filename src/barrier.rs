/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::sync::{Condvar, Mutex};

/// Coordinates the set of all mutators (create/delete/move) against a full
/// tree print, independently of the per-inode locks those operations also
/// take. This is not a reader/writer lock over the whole tree — many
/// mutators still run concurrently against each other and are serialized
/// only where their own locked paths overlap. The barrier only keeps a
/// print from observing a tree that some mutator is mid-edit on, and keeps
/// mutators from starting while a print is under way.
#[derive(Default)]
struct State {
    mutating: u32,
    printing: bool,
}

pub struct PrintBarrier {
    state: Mutex<State>,
    can_print: Condvar,
    can_modify: Condvar,
}

/// Held for the duration of one mutating operation. Dropping it clears the
/// mutator's claim and wakes a waiting printer.
pub struct MutationGuard<'a> {
    barrier: &'a PrintBarrier,
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.barrier.state.lock().unwrap();
        state.mutating -= 1;
        if state.mutating == 0 {
            self.barrier.can_print.notify_all();
        }
    }
}

/// Held for the duration of a print. Dropping it clears the printer's claim
/// and wakes any mutators waiting behind it.
pub struct PrintGuard<'a> {
    barrier: &'a PrintBarrier,
}

impl Drop for PrintGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.barrier.state.lock().unwrap();
        state.printing = false;
        self.barrier.can_modify.notify_all();
    }
}

impl PrintBarrier {
    pub fn new() -> Self {
        PrintBarrier {
            state: Mutex::new(State::default()),
            can_print: Condvar::new(),
            can_modify: Condvar::new(),
        }
    }

    /// Blocks while a print is in progress, then registers as one more
    /// concurrent mutator. Multiple mutators hold this at once; only a
    /// print excludes them, never each other.
    pub fn begin_mutation(&self) -> MutationGuard<'_> {
        let mut state = self.state.lock().unwrap();
        while state.printing {
            state = self.can_modify.wait(state).unwrap();
        }
        state.mutating += 1;
        MutationGuard { barrier: self }
    }

    /// Blocks while any mutator is active, then takes the print's exclusive
    /// claim. Tree reads taken under this guard need no per-inode locking:
    /// no mutator can be running.
    pub fn begin_print(&self) -> PrintGuard<'_> {
        let mut state = self.state.lock().unwrap();
        while state.mutating > 0 {
            state = self.can_print.wait(state).unwrap();
        }
        state.printing = true;
        PrintGuard { barrier: self }
    }
}

impl Default for PrintBarrier {
    fn default() -> Self {
        Self::new()
    }
}
