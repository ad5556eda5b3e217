// PathPlan: Constrained path enumeration and multi-commodity flows
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

//! A cache of all loopless paths per endpoint pair.
//!
//! The cache owns its [`GraphStorage`] and enumerates, lazily per
//! (source, destination) pair, the full delay-sorted list of paths
//! permitted by a fixed request template. All queries are answered from
//! that list. A single lock protects the path interning and the per-pair
//! result lists; the first access to a pair runs the search while holding
//! it.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use itertools::Itertools;
use netsim::net::{GraphStorage, LinkSequence};
use netsim::types::{LinkId, NodeId, PathId};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::dfs::constraint::Constraint;
use crate::dfs::{CompactGraph, Dfs, DfsRequest};
use crate::error::PlanError;

/// Delay penalty applied per shared link when selecting diverse paths.
const DIVERSE_PATHS_DELAY_PENALTY: Duration = Duration::from_secs(1);

/// Everything guarded by the cache lock.
struct CacheState {
    storage: GraphStorage,
    /// Compiled graphs, one per destination.
    compact: HashMap<NodeId, CompactGraph>,
    /// Delay-sorted paths per (source, destination) pair.
    paths: HashMap<(NodeId, NodeId), Vec<LinkSequence>>,
}

/// Caches all paths between sources and destinations.
pub struct PathCache {
    state: Mutex<CacheState>,
    template: DfsRequest,
    cancel: Arc<AtomicBool>,
}

impl PathCache {
    /// Create a cache over a storage. The request template fixes the hop,
    /// weight and duration budgets (and the node-disjoint flag) used for
    /// every pair; its source field is replaced per query.
    pub fn new(storage: GraphStorage, template: DfsRequest) -> Result<Self, PlanError> {
        template.validate()?;
        let compact = storage
            .nodes()
            .map(|dst| (dst, CompactGraph::towards(&storage, dst)))
            .collect();
        Ok(Self {
            state: Mutex::new(CacheState {
                storage,
                compact,
                paths: HashMap::new(),
            }),
            template,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The request template used for enumeration.
    pub fn template(&self) -> &DfsRequest {
        &self.template
    }

    /// Access the underlying storage, e.g. to resolve returned path ids or
    /// to compile constraints. Holds the cache lock.
    pub fn storage(&self) -> MappedMutexGuard<'_, GraphStorage> {
        MutexGuard::map(self.state.lock(), |state| &mut state.storage)
    }

    /// Cancel the currently running enumeration (if any) and all future
    /// ones. Blocked queries return with whatever was discovered so far.
    pub fn terminate(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// The lowest-delay path from `src` to `dst` satisfying the
    /// constraint, or the empty path if no path satisfies it.
    pub fn lowest_delay(
        &self,
        constraint: &Constraint,
        src: &str,
        dst: &str,
        cookie: u64,
        delay_limit: Option<Duration>,
    ) -> Result<PathId, PlanError> {
        let mut state = self.state.lock();
        let (src, dst) = resolve_pair(&state.storage, src, dst)?;
        self.ensure_cached(&mut state, src, dst)?;

        let CacheState {
            storage, paths, ..
        } = &mut *state;
        for seq in &paths[&(src, dst)] {
            if over_limit(seq, delay_limit) {
                break;
            }
            if constraint.complies(seq) {
                return Ok(storage.path_from_links(seq, cookie));
            }
        }
        Ok(storage.empty_path())
    }

    /// The `k` lowest-delay paths satisfying the constraint, in delay
    /// order.
    pub fn k_lowest(
        &self,
        constraint: &Constraint,
        k: usize,
        src: &str,
        dst: &str,
        cookie: u64,
        delay_limit: Option<Duration>,
    ) -> Result<Vec<PathId>, PlanError> {
        let mut out = Vec::with_capacity(k);
        if k == 0 {
            return Ok(out);
        }

        let mut state = self.state.lock();
        let (src, dst) = resolve_pair(&state.storage, src, dst)?;
        self.ensure_cached(&mut state, src, dst)?;

        let CacheState {
            storage, paths, ..
        } = &mut *state;
        for seq in &paths[&(src, dst)] {
            if over_limit(seq, delay_limit) {
                break;
            }
            if constraint.complies(seq) {
                out.push(storage.path_from_links(seq, cookie));
                if out.len() == k {
                    break;
                }
            }
        }
        Ok(out)
    }

    /// The lowest-delay path `P` plus every other constraint-satisfying
    /// path with at most `hops(P) + k` hops, in delay order.
    pub fn k_hops_from_lowest(
        &self,
        constraint: &Constraint,
        k: usize,
        src: &str,
        dst: &str,
        cookie: u64,
        delay_limit: Option<Duration>,
    ) -> Result<Vec<PathId>, PlanError> {
        let shortest = self.lowest_delay(constraint, src, dst, cookie, delay_limit)?;

        let mut state = self.state.lock();
        let (src, dst) = resolve_pair(&state.storage, src, dst)?;
        let CacheState {
            storage, paths, ..
        } = &mut *state;

        let shortest_tag = storage.path(shortest).tag();
        let hop_limit = storage.path(shortest).len() + k;
        let mut out = vec![shortest];

        for seq in &paths[&(src, dst)] {
            if over_limit(seq, delay_limit) {
                break;
            }
            if seq.len() > hop_limit || !constraint.complies(seq) {
                continue;
            }
            let path = storage.path_from_links(seq, cookie);
            if storage.path(path).tag() != shortest_tag {
                out.push(path);
            }
        }
        Ok(out)
    }

    /// Up to `k` constraint-satisfying paths that share as few links as
    /// possible, selected greedily: in each round every candidate is
    /// scored with its delay plus a one-second penalty per link already
    /// chosen, and the best candidate's links join the avoid set. If fewer
    /// than `k` distinct paths come out, the result is topped up from the
    /// delay-sorted list. Returned in delay order.
    pub fn k_diverse(
        &self,
        constraint: &Constraint,
        k: usize,
        src: &str,
        dst: &str,
        cookie: u64,
        delay_limit: Option<Duration>,
    ) -> Result<Vec<PathId>, PlanError> {
        let mut state = self.state.lock();
        let (src, dst) = resolve_pair(&state.storage, src, dst)?;
        self.ensure_cached(&mut state, src, dst)?;

        let CacheState {
            storage, paths, ..
        } = &mut *state;
        let all = &paths[&(src, dst)];

        let candidates: Vec<&LinkSequence> = all
            .iter()
            .filter(|seq| !over_limit(seq, delay_limit) && constraint.complies(seq))
            .collect();

        let mut links_to_avoid: HashSet<LinkId> = HashSet::new();
        let mut chosen: BTreeSet<PathId> = BTreeSet::new();
        for _ in 0..k {
            let best = match candidates.iter().position_min_by_key(|seq| {
                let shared = seq
                    .links()
                    .iter()
                    .filter(|l| links_to_avoid.contains(l))
                    .count() as u32;
                seq.delay() + DIVERSE_PATHS_DELAY_PENALTY * shared
            }) {
                Some(index) => candidates[index],
                None => break,
            };
            links_to_avoid.extend(best.links().iter().copied());
            chosen.insert(storage.path_from_links(best, cookie));
        }

        // the greedy selection can pick the same path twice; top up from
        // the delay-sorted list
        if chosen.len() < k {
            for seq in all {
                chosen.insert(storage.path_from_links(seq, cookie));
                if chosen.len() == k {
                    break;
                }
            }
        }

        let mut out: Vec<PathId> = chosen.into_iter().collect();
        out.sort_by_key(|id| storage.path(*id).delay());
        Ok(out)
    }

    /// Populate the cache for all (source, destination) pairs.
    pub fn cache_all_pairs(&self) -> Result<(), PlanError> {
        let mut state = self.state.lock();
        let nodes: Vec<NodeId> = state.storage.nodes().collect();
        for (src, dst) in nodes.iter().cartesian_product(nodes.iter()) {
            if src != dst {
                self.ensure_cached(&mut state, *src, *dst)?;
            }
        }
        let num_paths: usize = state.paths.values().map(Vec::len).sum();
        log::info!("cached {num_paths} paths for {} pairs", state.paths.len());
        Ok(())
    }

    /// Run the enumeration for one pair if its result list is missing.
    fn ensure_cached(
        &self,
        state: &mut CacheState,
        src: NodeId,
        dst: NodeId,
    ) -> Result<(), PlanError> {
        if state.paths.contains_key(&(src, dst)) {
            return Ok(());
        }

        let CacheState {
            storage, compact, ..
        } = &mut *state;
        let graph = compact
            .get(&dst)
            .ok_or_else(|| PlanError::DestinationNotFound(storage.node_name(dst).to_string()))?;

        let mut request = self.template.clone();
        request.src = storage.node_name(src).to_string();

        let mut found: Vec<LinkSequence> = Vec::new();
        let mut dfs = Dfs::new(&request, graph, storage, |seq| {
            found.push(seq.clone());
            true
        })?;
        dfs.set_cancel_handle(self.cancel.clone());
        let termination = dfs.search();
        drop(dfs);
        log::debug!(
            "enumerated {} paths {} -> {} ({termination:?})",
            found.len(),
            storage.node_name(src),
            storage.node_name(dst),
        );

        found.sort_by_key(LinkSequence::delay);
        state.paths.insert((src, dst), found);
        Ok(())
    }
}

impl std::fmt::Debug for PathCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PathCache")
            .field("template", &self.template)
            .field("cached_pairs", &state.paths.len())
            .finish_non_exhaustive()
    }
}

fn resolve_pair(
    storage: &GraphStorage,
    src: &str,
    dst: &str,
) -> Result<(NodeId, NodeId), PlanError> {
    let src_id = storage
        .node_by_name(src)
        .ok_or_else(|| PlanError::SourceNotFound(src.to_string()))?;
    let dst_id = storage
        .node_by_name(dst)
        .ok_or_else(|| PlanError::DestinationNotFound(dst.to_string()))?;
    Ok((src_id, dst_id))
}

fn over_limit(seq: &LinkSequence, delay_limit: Option<Duration>) -> bool {
    matches!(delay_limit, Some(limit) if seq.delay() > limit)
}
