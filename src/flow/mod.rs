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

//! The multi-commodity flow engine.
//!
//! Expresses standard node-balance linear programs over a graph and a list
//! of commodities: one non-negative variable per (link, commodity), one
//! capacity row per link, and flow-conservation rows per (commodity, node).
//! Answers feasibility, max-flow, max-scale and max-increment queries and
//! recovers per-commodity path decompositions from solved flows.

use std::collections::{BTreeMap, HashSet};

use netsim::formatter::NetFormatter;
use netsim::net::{GraphStorage, LinkSequence};
use netsim::types::{LinkId, NodeId};

use crate::error::PlanError;

pub mod lp;

use lp::{Direction, MatrixElement, Problem, Solution, VariableIndex, INFINITY};

/// Flows below this value are treated as zero during path recovery.
const FLOW_EPSILON: f64 = 1e-6;

const MAX_SCALE_FACTOR: f64 = 10_000_000.0;
/// Binary searches stop once the interval is smaller than this.
const STOP_THRESHOLD: f64 = 1e-4;

/// A single commodity in a multi-commodity problem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Commodity {
    /// Node where the flow originates.
    pub source: NodeId,
    /// Node where the flow terminates.
    pub sink: NodeId,
    /// Volume of the commodity, in the same units as link bandwidth scaled
    /// by the capacity multiplier.
    pub demand: f64,
}

/// A path and the flow over it.
pub type FlowAndPath = (f64, LinkSequence);

/// Map from a link to one variable per commodity.
type VarMap = BTreeMap<LinkId, Vec<VariableIndex>>;

/// A multi-commodity flow problem. Link capacities are the bandwidth
/// values of the graph's links times a capacity multiplier.
#[derive(Debug, Clone)]
pub struct McProblem<'a> {
    storage: &'a GraphStorage,
    capacity_multiplier: f64,
    commodities: Vec<Commodity>,
    links: Vec<LinkId>,
    // per node, the links leaving it and the links entering it
    adjacent: BTreeMap<NodeId, (Vec<LinkId>, Vec<LinkId>)>,
}

impl<'a> McProblem<'a> {
    /// Create a problem over a graph. The demand of every commodity added
    /// later is interpreted in units of link bandwidth times
    /// `capacity_multiplier`.
    pub fn new(storage: &'a GraphStorage, capacity_multiplier: f64) -> Self {
        let mut adjacent: BTreeMap<NodeId, (Vec<LinkId>, Vec<LinkId>)> = BTreeMap::new();
        let mut links = Vec::new();
        for (link_id, link) in storage.links() {
            adjacent.entry(link.src()).or_default().0.push(link_id);
            adjacent.entry(link.dst()).or_default().1.push(link_id);
            links.push(link_id);
        }
        Self {
            storage,
            capacity_multiplier,
            commodities: Vec::new(),
            links,
            adjacent,
        }
    }

    /// Add a commodity between two named nodes.
    pub fn add_commodity(
        &mut self,
        source: &str,
        sink: &str,
        demand: f64,
    ) -> Result<(), PlanError> {
        let source = self.storage.require_node(source)?;
        let sink = self.storage.require_node(sink)?;
        self.add_commodity_between(source, sink, demand);
        Ok(())
    }

    /// Add a commodity between two nodes.
    pub fn add_commodity_between(&mut self, source: NodeId, sink: NodeId, demand: f64) {
        self.commodities.push(Commodity {
            source,
            sink,
            demand,
        });
    }

    /// The commodities added so far.
    pub fn commodities(&self) -> &[Commodity] {
        &self.commodities
    }

    /// True if the commodities and their demands fit into the network.
    pub fn is_feasible(&self) -> bool {
        let (problem, _) = self.build(false);
        problem.solve().is_feasible()
    }

    /// The factor by which all demands can be multiplied before the
    /// problem becomes infeasible. Zero if the problem is already
    /// infeasible or all demands are zero.
    pub fn max_commodity_scale_factor(&self) -> f64 {
        if !self.is_feasible() || self.commodities.iter().all(|c| c.demand == 0.0) {
            return 0.0;
        }

        let mut min_bound = 1.0;
        let mut max_bound = MAX_SCALE_FACTOR;
        let mut estimate = max_bound;
        while max_bound - min_bound > STOP_THRESHOLD {
            let guess = min_bound + (max_bound - min_bound) / 2.0;
            if self.scaled(guess, 0.0).is_feasible() {
                estimate = guess;
                min_bound = guess;
            } else {
                max_bound = guess;
            }
        }
        estimate
    }

    /// The demand that can be added to every commodity before the problem
    /// becomes infeasible. Zero if the problem is already infeasible or
    /// has no commodities.
    pub fn max_commodity_increment(&self) -> f64 {
        if !self.is_feasible() || self.commodities.is_empty() {
            return 0.0;
        }

        // the increment can never exceed the largest link capacity
        let max_capacity = self
            .links
            .iter()
            .map(|l| self.storage.link(*l).bandwidth().bps())
            .max()
            .unwrap_or(0) as f64;

        let mut min_bound = 1.0;
        let mut max_bound = max_capacity;
        let mut estimate = max_capacity;
        while max_bound - min_bound > STOP_THRESHOLD {
            let guess = min_bound + (max_bound - min_bound) / 2.0;
            if self.scaled(1.0, guess).is_feasible() {
                estimate = guess;
                min_bound = guess;
            } else {
                max_bound = guess;
            }
        }
        estimate
    }

    /// The maximum total flow over all commodities, in the same units as
    /// link bandwidth times the capacity multiplier. `None` if some
    /// commodity cannot meet its demand.
    pub fn max_flow(&self) -> Option<f64> {
        let (problem, _) = self.build(true);
        let solution = problem.solve();
        solution.is_feasible().then(|| solution.objective_value())
    }

    /// Like [`Self::max_flow`], but also returns, per commodity, the paths
    /// carrying the flow.
    pub fn max_flow_with_paths(&self) -> Option<(f64, Vec<Vec<FlowAndPath>>)> {
        let (problem, var_map) = self.build(true);
        let solution = problem.solve();
        if !solution.is_feasible() {
            return None;
        }
        let paths = self.recover_paths(&var_map, &solution);
        Some((solution.objective_value(), paths))
    }

    /// The same problem with all demands scaled and incremented.
    fn scaled(&self, scale_factor: f64, increment: f64) -> McProblem<'a> {
        let mut scaled = self.clone();
        for commodity in &mut scaled.commodities {
            commodity.demand = commodity.demand * scale_factor + increment;
        }
        scaled
    }

    /// Build the LP: one non-negative variable per (link, commodity), a
    /// capacity row per link, and conservation rows per (commodity, node).
    /// With `maximize_flow`, the flow leaving each commodity's source forms
    /// the objective.
    fn build(&self, maximize_flow: bool) -> (Problem, VarMap) {
        let mut problem = Problem::new(Direction::Maximize);
        let mut matrix = Vec::new();

        // the sum of all commodities over a link must fit its capacity
        let mut var_map = VarMap::new();
        for link_id in &self.links {
            let link = self.storage.link(*link_id);
            let capacity_row = problem.add_constraint();
            let scaled_limit = link.bandwidth().bps() as f64 * self.capacity_multiplier;
            problem.set_constraint_range(capacity_row, 0.0, scaled_limit);

            let vars = var_map.entry(*link_id).or_default();
            for _ in 0..self.commodities.len() {
                let var = problem.add_variable();
                problem.set_variable_range(var, 0.0, INFINITY);
                matrix.push(MatrixElement::new(capacity_row, var, 1.0));
                vars.push(var);
            }
        }

        // per-commodity flow conservation: flow into the source is zero,
        // flow out of the sink is zero, and everywhere else the flow in
        // equals the flow out; traffic leaving the source must cover the
        // commodity's demand
        for (c_index, commodity) in self.commodities.iter().enumerate() {
            for (node, (links_out, links_in)) in &self.adjacent {
                let conservation_row = problem.add_constraint();
                problem.set_constraint_range(conservation_row, 0.0, 0.0);

                if *node == commodity.source {
                    for link in links_in {
                        matrix.push(MatrixElement::new(
                            conservation_row,
                            var_map[link][c_index],
                            1.0,
                        ));
                    }

                    let source_load_row = problem.add_constraint();
                    problem.set_constraint_range(source_load_row, commodity.demand, INFINITY);
                    for link in links_out {
                        let var = var_map[link][c_index];
                        matrix.push(MatrixElement::new(source_load_row, var, 1.0));
                        if maximize_flow {
                            problem.set_objective_coefficient(var, 1.0);
                        }
                    }
                } else if *node == commodity.sink {
                    for link in links_out {
                        matrix.push(MatrixElement::new(
                            conservation_row,
                            var_map[link][c_index],
                            1.0,
                        ));
                    }
                } else {
                    for link in links_out {
                        matrix.push(MatrixElement::new(
                            conservation_row,
                            var_map[link][c_index],
                            -1.0,
                        ));
                    }
                    for link in links_in {
                        matrix.push(MatrixElement::new(
                            conservation_row,
                            var_map[link][c_index],
                            1.0,
                        ));
                    }
                }
            }
        }

        problem.set_matrix(matrix);
        (problem, var_map)
    }

    /// Decompose the link flows of a solution into per-commodity paths, by
    /// repeatedly walking a positive-flow path from source to sink and
    /// subtracting its bottleneck flow.
    fn recover_paths(&self, var_map: &VarMap, solution: &Solution) -> Vec<Vec<FlowAndPath>> {
        let mut out = Vec::with_capacity(self.commodities.len());
        for (c_index, commodity) in self.commodities.iter().enumerate() {
            let mut flow_over_links: BTreeMap<LinkId, f64> = var_map
                .iter()
                .filter_map(|(link, vars)| {
                    let flow = solution.variable_value(vars[c_index]);
                    (flow > FLOW_EPSILON).then_some((*link, flow))
                })
                .collect();

            let mut paths: Vec<FlowAndPath> = Vec::new();
            'decompose: loop {
                let mut at = commodity.source;
                let mut links: Vec<LinkId> = Vec::new();
                let mut taken: HashSet<LinkId> = HashSet::new();
                let mut bottleneck = INFINITY;

                while at != commodity.sink {
                    let next = self.adjacent.get(&at).and_then(|(out_links, _)| {
                        out_links.iter().copied().find(|l| {
                            !taken.contains(l)
                                && flow_over_links.get(l).copied().unwrap_or(0.0) > FLOW_EPSILON
                        })
                    });
                    match next {
                        Some(link) => {
                            bottleneck = bottleneck.min(flow_over_links[&link]);
                            taken.insert(link);
                            links.push(link);
                            at = self.storage.link(link).dst();
                        }
                        None if links.is_empty() => break 'decompose,
                        None => {
                            // residual circulation that never reaches the
                            // sink; nothing more to decompose
                            log::warn!(
                                "flow of commodity {c_index} stuck at {}",
                                at.fmt(self.storage)
                            );
                            break 'decompose;
                        }
                    }
                }

                if links.is_empty() {
                    // source equals sink, nothing to decompose
                    break;
                }
                for link in &links {
                    let flow = flow_over_links.get_mut(link).unwrap();
                    *flow -= bottleneck;
                }
                let seq = LinkSequence::new(links, self.storage)
                    .expect("recovered flow paths are simple");
                paths.push((bottleneck, seq));
            }
            out.push(paths);
        }
        out
    }
}
