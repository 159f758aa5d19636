//! Gate-time estimates from off-resonant leakage into competing transitions.
//!
//! For a transition `from -> to` (oriented so that `from` has the lower
//! rotational number), every other transition leaving `from` upward or leaving
//! `to` downward is driven off-resonantly by the same field. With relative
//! coupling `g` and detuning `δ`, each contributes a population error
//! ```text
//! r = (4 g^2 + g^4) / δ^2
//! ```
//! and the gate time needed to keep the total error in check is
//! ```text
//! T = (π / 4) sqrt(Σ r)
//! ```

use std::f64::consts::FRAC_PI_4;
use ndarray as nd;
use crate::transitions::{ Direction, TransitionGraph };

/// Which competing transitions are counted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GatePolicy {
    /// All six channels of both endpoints.
    Unpolarized,
    /// Only the channel sharing the target's polarization.
    Polarized,
}

impl GatePolicy {
    pub const ALL: [Self; 2] = [Self::Unpolarized, Self::Polarized];

    /// Short tag used in archive keys.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Unpolarized => "unpol",
            Self::Polarized => "pol",
        }
    }
}

/// Gate times of a single edge under both policies.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EdgeGateTime {
    pub unpolarized: f64,
    pub polarized: f64,
}

impl EdgeGateTime {
    pub fn get(&self, policy: GatePolicy) -> f64 {
        match policy {
            GatePolicy::Unpolarized => self.unpolarized,
            GatePolicy::Polarized => self.polarized,
        }
    }
}

/// Gate times of every edge at one field sample.
#[derive(Clone, Debug, PartialEq)]
pub struct GateTimes {
    pub unpolarized: nd::Array1<f64>,
    pub polarized: nd::Array1<f64>,
    /// Edges that cannot be driven at this field, either because their own
    /// coupling vanishes or because a competitor makes the estimate diverge;
    /// their gate times are `+∞`.
    pub unusable: Vec<usize>,
}

impl GateTimes {
    pub fn get(&self, policy: GatePolicy) -> &nd::Array1<f64> {
        match policy {
            GatePolicy::Unpolarized => &self.unpolarized,
            GatePolicy::Polarized => &self.polarized,
        }
    }
}

/// Estimate the gate time of edge `edge` at one field sample.
///
/// `energies` is indexed by node and `couplings` by edge. Returns `None` if the
/// edge's own coupling is zero or not finite, or if the estimate itself is not
/// finite (a resonant competitor, or a coupling ratio that overflows).
pub fn edge_gate_time(
    graph: &TransitionGraph,
    edge: usize,
    energies: nd::ArrayView1<f64>,
    couplings: nd::ArrayView1<f64>,
    hbar: f64,
) -> Option<EdgeGateTime>
{
    let target = graph.edge(edge)?.upward();
    let channel = target.channel();
    let lower = graph.blocks(target.from_index)?;
    let upper = graph.blocks(target.to_index)?;

    // reference coupling is the one stored on the lower node's up-block
    let reference = lower.range(channel).start + target.to.d as usize;
    let c0 = couplings[reference];
    if c0 == 0.0 || !c0.is_finite() { return None; }

    let rate = |e: usize, far: usize, near: usize| -> f64 {
        let g = (couplings[e] / c0).abs();
        if g == 0.0 { return 0.0; }
        let delta = (energies[far] - energies[near]).abs() / hbar;
        let g2 = g * g;
        (4.0 * g2 + g2 * g2) / (delta * delta)
    };

    let edges = graph.edges();
    let pol_up = lower.range(channel);
    let pol_down = upper.range(channel.reversed());
    let mut sum_unpol: f64 = 0.0;
    let mut sum_pol: f64 = 0.0;
    for e in lower.direction_range(Direction::Up) {
        let far = edges[e].to_index;
        if far == target.to_index { continue; }
        let r = rate(e, far, target.to_index);
        sum_unpol += r;
        if pol_up.contains(&e) { sum_pol += r; }
    }
    for e in upper.direction_range(Direction::Down) {
        let far = edges[e].to_index;
        if far == target.from_index { continue; }
        let r = rate(e, far, target.from_index);
        sum_unpol += r;
        if pol_down.contains(&e) { sum_pol += r; }
    }
    let unpolarized = FRAC_PI_4 * sum_unpol.sqrt();
    let polarized = FRAC_PI_4 * sum_pol.sqrt();
    (unpolarized.is_finite() && polarized.is_finite())
        .then_some(EdgeGateTime { unpolarized, polarized })
}

/// Estimate gate times of every edge at one field sample.
pub fn gate_times(
    graph: &TransitionGraph,
    energies: nd::ArrayView1<f64>,
    couplings: nd::ArrayView1<f64>,
    hbar: f64,
) -> GateTimes
{
    let n = graph.num_edges();
    let mut unpolarized: nd::Array1<f64> = nd::Array1::zeros(n);
    let mut polarized: nd::Array1<f64> = nd::Array1::zeros(n);
    let mut unusable: Vec<usize> = Vec::new();
    for e in 0..n {
        match edge_gate_time(graph, e, energies, couplings, hbar) {
            Some(t) => {
                unpolarized[e] = t.unpolarized;
                polarized[e] = t.polarized;
            },
            None => {
                unpolarized[e] = f64::INFINITY;
                polarized[e] = f64::INFINITY;
                unusable.push(e);
            },
        }
    }
    GateTimes { unpolarized, polarized, unusable }
}
