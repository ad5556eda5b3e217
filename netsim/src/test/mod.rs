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

use std::time::Duration;

use crate::net::{GraphDescription, GraphStorage};
use crate::types::Bandwidth;

mod test_event;
mod test_net;

/// A graph with two nodes and a single unidirectional link A -> B.
pub(crate) fn single_edge() -> (GraphDescription, GraphStorage) {
    let mut desc = GraphDescription::new();
    desc.add_edge(
        "A",
        "B",
        Duration::from_millis(1),
        Bandwidth::from_mbps(100),
    );
    let storage = GraphStorage::from_description(&desc).unwrap();
    (desc, storage)
}

/// A diamond-shaped graph with a shortcut in the middle (the wiring of
/// Braess's paradox): bidirectional A - B, A - C, B - D and C - D edges
/// plus the unidirectional shortcut B -> C.
pub(crate) fn braess() -> (GraphDescription, GraphStorage) {
    let bw = Bandwidth::from_mbps(1000);
    let ms = Duration::from_millis;

    let mut desc = GraphDescription::new();
    desc.add_bi_edge("A", "B", ms(5), bw);
    desc.add_bi_edge("A", "C", ms(5), bw);
    desc.add_edge("B", "C", ms(1), bw);
    desc.add_bi_edge("B", "D", ms(5), bw);
    desc.add_bi_edge("C", "D", ms(10), bw);
    let storage = GraphStorage::from_description(&desc).unwrap();
    (desc, storage)
}
