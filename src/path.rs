/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::fmt::Display;

/// A path into the tree, e.g. `/a/b/c`. A leading `/` is tolerated but not
/// required — `a/b/c` names the same node as `/a/b/c` — and a path never
/// ends with a trailing `/` unless it names the root itself.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct PathName(String);

/// A single path component.
pub type Name = String;

impl Display for PathName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PathName {
    fn from(value: &str) -> Self {
        PathName(value.to_owned())
    }
}

impl From<String> for PathName {
    fn from(value: String) -> Self {
        PathName(value)
    }
}

impl PathName {
    /// Splits a path into its parent directory path and final component.
    /// `/a/b` splits into (`/a`, `b`); `/a` and `a` both split into
    /// (`/`, `a`) — a path with no internal `/` names a direct child of the
    /// root, whether or not it carries a leading slash of its own.
    pub fn split(&self) -> (PathName, Name) {
        let trimmed = self.0.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(split_at) => {
                let (parent, name) = (&trimmed[..split_at], &trimmed[split_at + 1..]);
                if parent.is_empty() {
                    ("/".into(), name.to_owned())
                } else {
                    (parent.into(), name.to_owned())
                }
            }
            None => ("/".into(), trimmed.to_owned()),
        }
    }

    /// Path components in root-to-leaf order, empty for the root itself.
    pub fn segments(&self) -> Vec<&str> {
        self.0.split('/').filter(|s| !s.is_empty()).collect()
    }

    pub fn join(&self, name: Name) -> PathName {
        if self.is_root() {
            format!("/{}", name).into()
        } else {
            format!("{}/{}", self.0, name).into()
        }
    }

    /// Strips a trailing `/` the way spec.md §3 mandates ("a trailing `/`
    /// is stripped"), the same `trim_end_matches('/')` `split` already
    /// applies before splitting off a path's final component. Callers that
    /// walk a whole path rather than splitting it — `read_walk`/
    /// `write_walk`/`resolve_unlocked` — need this same normalization
    /// before checking validity or taking segments, or a perfectly
    /// resolvable path like `/a/` gets rejected as malformed purely for
    /// carrying the trailing slash §3 says to tolerate.
    pub fn normalize(&self) -> PathName {
        if self.is_root() {
            return self.clone();
        }
        let trimmed = self.0.trim_end_matches('/');
        if trimmed.is_empty() {
            "/".into()
        } else {
            trimmed.into()
        }
    }

    /// A non-empty path with no doubled slashes (no empty components
    /// anywhere in it) that does not end in a trailing slash unless it is
    /// exactly the root. A leading `/` is optional either way, per
    /// `original_source/server-operations.c`'s `split_parent_child_from_path`,
    /// which resolves `a/b` and `/a/b` identically. Checked against a
    /// path's own literal form — callers that need §3's trailing-slash
    /// tolerance normalize with [`PathName::normalize`] first.
    pub fn is_valid(&self) -> bool {
        if self.0.is_empty() {
            return false;
        }
        if self.is_root() {
            return true;
        }
        if self.0.ends_with('/') {
            return false;
        }
        !self.0.contains("//")
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Number of path components, used to pick the shorter of two walks
    /// during a move (the original server's lock-ordering protocol keys off
    /// this length).
    pub fn depth(&self) -> usize {
        self.segments().len()
    }
}
