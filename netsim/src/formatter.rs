// NetSim: Packet-level network simulator and graph toolkit written in Rust
// Copyright (C) 2023-2024 The NetSim developers
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Utilities to display graph handles. Handles are plain indices; rendering
//! them requires the [`GraphStorage`] that owns the objects behind them.

use itertools::Itertools;

use crate::net::{GraphStorage, LinkSequence};
use crate::types::{LinkId, NodeId, PathId};

/// Render a graph handle with the storage that owns it.
pub trait NetFormatter {
    /// Return a human-readable representation of `self`.
    fn fmt(&self, storage: &GraphStorage) -> String;
}

impl NetFormatter for NodeId {
    fn fmt(&self, storage: &GraphStorage) -> String {
        storage.node_name(*self).to_string()
    }
}

impl NetFormatter for LinkId {
    fn fmt(&self, storage: &GraphStorage) -> String {
        let link = storage.link(*self);
        format!(
            "{}:{}->{}:{}",
            storage.node_name(link.src()),
            link.src_port(),
            storage.node_name(link.dst()),
            link.dst_port(),
        )
    }
}

impl NetFormatter for LinkSequence {
    fn fmt(&self, storage: &GraphStorage) -> String {
        format!(
            "[{}]",
            self.links().iter().map(|l| l.fmt(storage)).join(", ")
        )
    }
}

impl NetFormatter for PathId {
    fn fmt(&self, storage: &GraphStorage) -> String {
        let path = storage.path(*self);
        format!(
            "{} {:?}",
            path.link_sequence().fmt_compact(storage),
            path.delay()
        )
    }
}

impl LinkSequence {
    /// Short representation without ports, in the form `[A->B->C]`.
    pub fn fmt_compact(&self, storage: &GraphStorage) -> String {
        if self.is_empty() {
            return "[]".to_string();
        }
        let mut out = String::from("[");
        for link in self.links() {
            out.push_str(storage.node_name(storage.link(*link).src()));
            out.push_str("->");
        }
        out.push_str(storage.node_name(storage.link(*self.links().last().unwrap()).dst()));
        out.push(']');
        out
    }
}
