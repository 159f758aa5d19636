//! Closed-form transfer fidelities and field selection helpers.
//!
//! A resonant pulse of duration `T` on `|1> -> |2>` also drives `|1> -> |3>`
//! with relative coupling `g` at detuning `Δ`; with `k = Δ T / h` the two
//! fidelities below follow from the exact three-level solution.

use std::f64::consts::TAU;
use ndarray as nd;
use crate::transitions::{ Channel, Direction, TransitionGraph };

/// Twice the average transfer fidelity over one Rabi cycle.
pub fn twice_average_fidelity(k: f64, g: f64) -> f64 {
    if g == 0.0 { return 1.0; }
    let g2 = g * g;
    let k2 = k * k;
    ((1.0 + g2).powi(2) + 8.0 * k2 * (-1.0 + 2.0 * g2) + 16.0 * k2 * k2)
        / ((1.0 + g2).powi(3) + (-8.0 + 20.0 * g2 + g2 * g2) * k2 + 16.0 * k2 * k2)
}

/// Maximum transfer fidelity reachable within the first Rabi cycle.
///
/// Returns exactly `1` for `g = 0`, where the general expression degenerates
/// to `0/0` at `k = 1/2`.
pub fn maximum_fidelity(k: f64, g: f64) -> f64 {
    if g == 0.0 { return 1.0; }
    let g2 = g * g;
    let k2 = k * k;
    let a = 3.0 + 3.0 * g2 + 4.0 * k2;
    let a32 = a.powf(1.5);
    let phi
        = (k * (18.0 - 9.0 * g2 - 8.0 * k2) / a32).clamp(-1.0, 1.0).acos()
        / 3.0;
    let denominator
        = 54.0 * (
            (1.0 + g2).powi(3)
            + (-8.0 + 20.0 * g2 + g2 * g2) * k2
            + 16.0 * k2 * k2
        );
    let numerator
        = 36.0 * (g2 * g2 + (1.0 - 4.0 * k2).powi(2) + 2.0 * g2 * (1.0 + 8.0 * k2))
        + 32.0 * k * a32 * phi.cos()
        - 64.0 * k2 * a * (2.0 * phi).cos()
        - 4.0 * a * a * (4.0 * phi).cos();
    numerator / denominator
}

/// Estimated efficiency of driving edge `edge` with a pulse of duration
/// `pulse_time`: the product of [`maximum_fidelity`] over every other
/// transition leaving the same source with the same polarization.
///
/// Returns `None` if the edge does not exist or its own coupling vanishes.
pub fn transfer_efficiency(
    graph: &TransitionGraph,
    edge: usize,
    energies: nd::ArrayView1<f64>,
    couplings: nd::ArrayView1<f64>,
    pulse_time: f64,
    hbar: f64,
) -> Option<f64>
{
    let target = graph.edge(edge)?;
    let blocks = graph.blocks(target.from_index)?;
    let c0 = couplings[edge];
    if c0 == 0.0 || !c0.is_finite() { return None; }
    let polarization = target.channel().polarization;
    let planck = TAU * hbar;
    let efficiency: f64
        = Direction::ALL.into_iter()
        .flat_map(|dir| blocks.range(Channel::new(dir, polarization)))
        .filter(|e| graph.edges()[*e].to_index != target.to_index)
        .map(|e| {
            let g = (couplings[e] / c0).abs();
            let far = graph.edges()[e].to_index;
            let k
                = (energies[far] - energies[target.to_index]).abs() / planck
                * pulse_time;
            maximum_fidelity(k, g)
        })
        .product();
    Some(efficiency)
}

/// Field index at which the magnetic moments of `nodes` lie closest together,
/// along with the spread `max - min` there.
///
/// `moments` is `[node, field]`. Fields with non-finite moments are skipped;
/// returns `None` if no field qualifies or a node is out of range.
pub fn moment_coincidence(moments: nd::ArrayView2<f64>, nodes: &[usize])
    -> Option<(usize, f64)>
{
    if nodes.is_empty() || nodes.iter().any(|k| *k >= moments.nrows()) {
        return None;
    }
    moments.axis_iter(nd::Axis(1)).enumerate()
        .filter_map(|(bi, mu)| {
            let (lo, hi)
                = nodes.iter()
                .map(|k| mu[*k])
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), m| {
                    (lo.min(m), hi.max(m))
                });
            let spread = hi - lo;
            nodes.iter().all(|k| mu[*k].is_finite()).then_some((bi, spread))
        })
        .min_by(|l, r| l.1.total_cmp(&r.1).then(l.0.cmp(&r.0)))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        labels::{ LabelSpace, StateLabel },
        spin::SpinTotal,
    };

    fn close(a: f64, b: f64) -> bool { (a - b).abs() <= 1e-12 }

    #[test]
    fn average_fidelity_reference_values() {
        assert_eq!(twice_average_fidelity(0.0, 0.0), 1.0);
        assert_eq!(twice_average_fidelity(0.5, 0.0), 1.0);
        assert!(close(twice_average_fidelity(0.0, 1.0), 0.5));
        assert!(close(twice_average_fidelity(1.0, 1.0), 0.7567567567567568));
        assert!(close(twice_average_fidelity(2.0, 0.5), 0.9811512343720251));
        assert!(close(twice_average_fidelity(0.5, 2.0), 0.2702702702702703));
    }

    #[test]
    fn maximum_fidelity_reference_values() {
        assert_eq!(maximum_fidelity(0.5, 0.0), 1.0);
        assert!(close(maximum_fidelity(0.0, 1.0), 0.5));
        assert!(close(maximum_fidelity(1.0, 1.0), 0.8724949769563916));
        assert!(close(maximum_fidelity(2.0, 0.5), 0.9893183443463135));
        assert!(close(maximum_fidelity(10.0, 1.0), 0.9971238726345072));
        assert!(close(maximum_fidelity(0.5, 2.0), 0.3603203084504493));
    }

    #[test]
    fn far_detuning_approaches_unity() {
        let f = maximum_fidelity(100.0, 1.0);
        assert!(f < 1.0 && f > 0.9999);
        assert!(maximum_fidelity(1.0, 1.0) >= twice_average_fidelity(1.0, 1.0));
    }

    #[test]
    fn efficiency_counts_same_polarization_only() {
        let labels = LabelSpace::new(1, SpinTotal::new(1), SpinTotal::new(1));
        let graph = TransitionGraph::new(&labels);
        let energies: nd::Array1<f64>
            = (0..labels.num_states()).map(|k| k as f64).collect();
        let mut couplings: nd::Array1<f64> = nd::Array1::zeros(graph.num_edges());
        let a = labels.index_of(&StateLabel::new(0, 0, 0)).unwrap();
        let b = labels.index_of(&StateLabel::new(1, 0, 0)).unwrap();
        let c = labels.index_of(&StateLabel::new(1, 0, 1)).unwrap();
        let s = labels.index_of(&StateLabel::new(1, 2, 0)).unwrap();
        let ab = graph.find_edge(a, b).unwrap();
        couplings[ab] = 0.5;
        couplings[graph.find_edge(a, c).unwrap()] = -0.25;
        couplings[graph.find_edge(a, s).unwrap()] = 0.5;
        // h = 1, so k = |E(c) - E(b)| * pulse_time = 2
        let hbar = 1.0 / TAU;
        let eff = transfer_efficiency(
            &graph, ab, energies.view(), couplings.view(), 2.0, hbar).unwrap();
        assert!(close(eff, 0.9893183443463135));

        couplings[ab] = 0.0;
        assert!(
            transfer_efficiency(
                &graph, ab, energies.view(), couplings.view(), 2.0, hbar)
            .is_none()
        );
    }

    #[test]
    fn coincidence_picks_smallest_spread() {
        let moments = nd::array![
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 2.5, 3.2, f64::NAN],
            [0.0, 0.0, 0.0, 0.0],
        ];
        let (bi, spread) = moment_coincidence(moments.view(), &[0, 1]).unwrap();
        assert_eq!(bi, 2);
        assert!(close(spread, 0.2));
        let (bi, spread) = moment_coincidence(moments.view(), &[0, 2]).unwrap();
        assert_eq!((bi, spread), (0, 1.0));
        assert!(moment_coincidence(moments.view(), &[]).is_none());
        assert!(moment_coincidence(moments.view(), &[3]).is_none());
    }
}
