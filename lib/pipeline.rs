//! Per-field processing and its parallel fan-out over the field grid.
//!
//! Each field sample is handled by [`process_field`], a pure function of the
//! shared topology and that sample's slices. [`precompute`] runs it across all
//! samples and scatters the results into `[edge, field]` and `[node, field]`
//! tables. A failed sample leaves NaN (or [`NO_PREDECESSOR`]) in its columns
//! and is recorded; the remaining samples are unaffected.

use ndarray as nd;
use rayon::iter::{ IntoParallelIterator, ParallelIterator };
use tracing::{ debug, info, warn };
use crate::{
    error::SampleFailure,
    gate_time::{ GatePolicy, GateTimes, gate_times },
    planner::{ NO_PREDECESSOR, ShortestPaths, build_graph, shortest_paths },
    sampler::{ FieldData, FieldGrid, gather_couplings, pair_resonance },
    transitions::TransitionGraph,
};

/// Everything computed at a single field sample.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldResult {
    /// Sparse per-edge couplings.
    pub couplings: nd::Array1<f64>,
    /// Per-edge transition angular frequencies.
    pub resonance: nd::Array1<f64>,
    pub gate_times: GateTimes,
    pub unpolarized: ShortestPaths,
    pub polarized: ShortestPaths,
}

impl FieldResult {
    pub fn paths(&self, policy: GatePolicy) -> &ShortestPaths {
        match policy {
            GatePolicy::Unpolarized => &self.unpolarized,
            GatePolicy::Polarized => &self.polarized,
        }
    }
}

/// Process field sample `bi`: gather couplings, estimate gate times and plan
/// shortest paths from `initial` under both policies.
pub fn process_field(
    graph: &TransitionGraph,
    data: &FieldData,
    bi: usize,
    initial: &[usize],
    hbar: f64,
) -> Result<FieldResult, SampleFailure>
{
    let fail = |reason: String| SampleFailure { field_index: bi, reason };
    if bi >= data.num_fields() {
        return Err(fail(format!("no field sample {}", bi)));
    }
    let energies = data.energies_at(bi);
    if let Some(k) = energies.iter().position(|e| !e.is_finite()) {
        return Err(fail(format!("non-finite energy at node {}", k)));
    }
    if let Some(k) = initial.iter().find(|k| **k >= graph.num_states()) {
        return Err(fail(format!("initial node {} out of range", k)));
    }

    let couplings = gather_couplings(graph, data, bi);
    let resonance = pair_resonance(graph, energies, hbar);
    let gate_times = gate_times(graph, energies, couplings.view(), hbar);
    if !gate_times.unusable.is_empty() {
        debug!(
            field_index = bi,
            unusable = gate_times.unusable.len(),
            "unusable edges"
        );
    }

    let plan = |policy: GatePolicy| -> Result<ShortestPaths, SampleFailure> {
        let g = build_graph(graph, gate_times.get(policy).view())
            .map_err(|err| fail(format!("{} ({})", err, policy.tag())))?;
        shortest_paths(&g, initial)
            .map_err(|err| fail(format!("{} ({})", err, policy.tag())))
    };
    let unpolarized = plan(GatePolicy::Unpolarized)?;
    let polarized = plan(GatePolicy::Polarized)?;
    debug!(field_index = bi, "field sample done");

    Ok(FieldResult { couplings, resonance, gate_times, unpolarized, polarized })
}

/// Gate-time and planning tables of one policy across the field grid.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyTables {
    /// `[edge, field]`
    pub gate_times: nd::Array2<f64>,
    /// `[node, field]`
    pub cumulative: nd::Array2<f64>,
    /// `[node, field]`, [`NO_PREDECESSOR`] for initial, unreachable and failed
    /// entries.
    pub predecessor: nd::Array2<i64>,
}

impl PolicyTables {
    fn new(num_edges: usize, num_states: usize, num_fields: usize) -> Self {
        Self {
            gate_times: nd::Array2::from_elem((num_edges, num_fields), f64::NAN),
            cumulative: nd::Array2::from_elem((num_states, num_fields), f64::NAN),
            predecessor:
                nd::Array2::from_elem((num_states, num_fields), NO_PREDECESSOR),
        }
    }

    fn fill(&mut self, bi: usize, gate_times: &nd::Array1<f64>, paths: &ShortestPaths) {
        self.gate_times.column_mut(bi).assign(gate_times);
        self.cumulative.column_mut(bi).assign(&paths.cumulative);
        self.predecessor.column_mut(bi).assign(&paths.predecessor_array());
    }
}

/// All field-dependent outputs of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct Precomputed {
    pub grid: FieldGrid,
    pub initial: Vec<usize>,
    /// `[edge, field]`
    pub couplings: nd::Array2<f64>,
    /// `[edge, field]`
    pub resonance: nd::Array2<f64>,
    pub unpolarized: PolicyTables,
    pub polarized: PolicyTables,
    pub failures: Vec<SampleFailure>,
}

impl Precomputed {
    pub fn get(&self, policy: GatePolicy) -> &PolicyTables {
        match policy {
            GatePolicy::Unpolarized => &self.unpolarized,
            GatePolicy::Polarized => &self.polarized,
        }
    }

    fn get_mut(&mut self, policy: GatePolicy) -> &mut PolicyTables {
        match policy {
            GatePolicy::Unpolarized => &mut self.unpolarized,
            GatePolicy::Polarized => &mut self.polarized,
        }
    }

    /// Indices of field samples that failed.
    pub fn failed_indices(&self) -> nd::Array1<i64> {
        self.failures.iter().map(|f| f.field_index as i64).collect()
    }
}

/// Run [`process_field`] over every field sample in parallel.
pub fn precompute(
    graph: &TransitionGraph,
    data: &FieldData,
    initial: &[usize],
    hbar: f64,
) -> Precomputed
{
    let nb = data.num_fields();
    let ne = graph.num_edges();
    let nn = graph.num_states();
    info!(
        fields = nb,
        states = nn,
        transitions = ne,
        initial = initial.len(),
        "precomputing gate times and paths"
    );

    let results: Vec<Result<FieldResult, SampleFailure>>
        = (0..nb).into_par_iter()
        .map(|bi| process_field(graph, data, bi, initial, hbar))
        .collect();

    let mut out = Precomputed {
        grid: data.grid().clone(),
        initial: initial.to_vec(),
        couplings: nd::Array2::from_elem((ne, nb), f64::NAN),
        resonance: nd::Array2::from_elem((ne, nb), f64::NAN),
        unpolarized: PolicyTables::new(ne, nn, nb),
        polarized: PolicyTables::new(ne, nn, nb),
        failures: Vec::new(),
    };
    let mut unusable: usize = 0;
    for (bi, res) in results.into_iter().enumerate() {
        match res {
            Ok(field) => {
                out.couplings.column_mut(bi).assign(&field.couplings);
                out.resonance.column_mut(bi).assign(&field.resonance);
                for policy in GatePolicy::ALL {
                    out.get_mut(policy).fill(
                        bi, field.gate_times.get(policy), field.paths(policy));
                }
                unusable += field.gate_times.unusable.len();
            },
            Err(failure) => {
                warn!(field_index = failure.field_index, "{}", failure.reason);
                out.failures.push(failure);
            },
        }
    }
    if unusable > 0 {
        warn!(
            unusable,
            "unusable edge samples were given infinite gate time"
        );
    }
    info!(failed = out.failures.len(), "precompute finished");
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        labels::LabelSpace,
        sampler::test::{ decoupled, poisoned, synthetic },
        spin::SpinTotal,
    };

    fn space() -> (LabelSpace, TransitionGraph) {
        let labels = LabelSpace::new(2, SpinTotal::new(1), SpinTotal::new(1));
        let graph = TransitionGraph::new(&labels);
        (labels, graph)
    }

    const HBAR: f64 = 1.054571817e-34;

    #[test]
    fn runs_are_deterministic() {
        let (labels, graph) = space();
        let data = synthetic(&labels, 4);
        let initial = [0, 5];
        let a = precompute(&graph, &data, &initial, HBAR);
        let b = precompute(&graph, &data, &initial, HBAR);
        assert_eq!(a, b);
        assert!(a.failures.is_empty());
        assert_eq!(a.couplings.shape(), [graph.num_edges(), 4]);
        assert_eq!(a.unpolarized.cumulative.shape(), [labels.num_states(), 4]);
    }

    #[test]
    fn columns_match_single_samples() {
        let (labels, graph) = space();
        let data = synthetic(&labels, 3);
        let initial = [2];
        let all = precompute(&graph, &data, &initial, HBAR);
        for bi in 0..3 {
            let one = process_field(&graph, &data, bi, &initial, HBAR).unwrap();
            assert_eq!(all.couplings.column(bi), one.couplings);
            assert_eq!(all.resonance.column(bi), one.resonance);
            for policy in GatePolicy::ALL {
                let tables = all.get(policy);
                assert_eq!(tables.gate_times.column(bi), *one.gate_times.get(policy));
                assert_eq!(tables.cumulative.column(bi), one.paths(policy).cumulative);
                assert_eq!(
                    tables.predecessor.column(bi),
                    one.paths(policy).predecessor_array(),
                );
            }
        }
    }

    #[test]
    fn initial_nodes_start_at_zero() {
        let (labels, graph) = space();
        let data = synthetic(&labels, 2);
        let initial = [0, 3];
        let out = precompute(&graph, &data, &initial, HBAR);
        for policy in GatePolicy::ALL {
            let tables = out.get(policy);
            for bi in 0..2 {
                for &k in &initial {
                    assert_eq!(tables.cumulative[[k, bi]], 0.0);
                    assert_eq!(tables.predecessor[[k, bi]], NO_PREDECESSOR);
                }
                // fully coupled synthetic input leaves nothing unreachable
                assert!(tables.cumulative.column(bi).iter().all(|t| t.is_finite()));
            }
        }
        // polarized never costs more per edge
        let u = &out.unpolarized.gate_times;
        let p = &out.polarized.gate_times;
        assert!(u.iter().zip(p.iter()).all(|(u, p)| p <= u));
    }

    #[test]
    fn uncoupled_pair_is_never_crossed() {
        let (labels, graph) = space();
        let a = 0;
        let b = graph.edge(0).unwrap().to_index;
        let up = graph.find_edge(a, b).unwrap();
        let dn = graph.find_edge(b, a).unwrap();
        let data = decoupled(&labels, 2, a, b);
        let initial = [a];
        let crosses = |pred: &[Option<usize>]| {
            pred[b] == Some(a) || pred[a] == Some(b)
        };

        for bi in 0..2 {
            let field = process_field(&graph, &data, bi, &initial, HBAR).unwrap();
            let mut unusable = field.gate_times.unusable.clone();
            unusable.sort_unstable();
            assert_eq!(unusable, vec![up.min(dn), up.max(dn)]);
            for policy in GatePolicy::ALL {
                let times = field.gate_times.get(policy);
                assert_eq!(times[up], f64::INFINITY);
                assert_eq!(times[dn], f64::INFINITY);
                let paths = field.paths(policy);
                assert!(!crosses(&paths.predecessor));
                // still reachable the long way round
                assert!(paths.cumulative[b].is_finite());
                let path = paths.path_to(b).unwrap();
                assert!(path.len() > 2);
            }
        }

        let out = precompute(&graph, &data, &initial, HBAR);
        assert!(out.failures.is_empty());
        for policy in GatePolicy::ALL {
            let tables = out.get(policy);
            for bi in 0..2 {
                assert_eq!(tables.gate_times[[up, bi]], f64::INFINITY);
                assert_eq!(tables.gate_times[[dn, bi]], f64::INFINITY);
                assert_ne!(tables.predecessor[[b, bi]], a as i64);
                assert_ne!(tables.predecessor[[a, bi]], b as i64);
            }
        }
    }

    #[test]
    fn failed_sample_is_isolated() {
        let (labels, graph) = space();
        let clean = precompute(&graph, &synthetic(&labels, 3), &[1], HBAR);
        let bad = precompute(&graph, &poisoned(&labels, 3, 1), &[1], HBAR);
        assert_eq!(bad.failures.len(), 1);
        assert_eq!(bad.failures[0].field_index, 1);
        assert_eq!(bad.failed_indices().to_vec(), vec![1]);
        for bi in [0, 2] {
            assert_eq!(bad.couplings.column(bi), clean.couplings.column(bi));
            for policy in GatePolicy::ALL {
                let (b, c) = (bad.get(policy), clean.get(policy));
                assert_eq!(b.gate_times.column(bi), c.gate_times.column(bi));
                assert_eq!(b.cumulative.column(bi), c.cumulative.column(bi));
                assert_eq!(b.predecessor.column(bi), c.predecessor.column(bi));
            }
        }
        assert!(bad.couplings.column(1).iter().all(|x| x.is_nan()));
        assert!(bad.resonance.column(1).iter().all(|x| x.is_nan()));
        for policy in GatePolicy::ALL {
            let b = bad.get(policy);
            assert!(b.gate_times.column(1).iter().all(|x| x.is_nan()));
            assert!(b.cumulative.column(1).iter().all(|x| x.is_nan()));
            assert!(b.predecessor.column(1).iter().all(|x| *x == NO_PREDECESSOR));
        }
    }

    #[test]
    fn out_of_range_initial_fails_every_sample() {
        let (labels, graph) = space();
        let data = synthetic(&labels, 2);
        let out = precompute(&graph, &data, &[labels.num_states()], HBAR);
        assert_eq!(out.failed_indices().to_vec(), vec![0, 1]);
        let err = process_field(&graph, &data, 0, &[labels.num_states()], HBAR);
        assert!(err.unwrap_err().reason.contains("out of range"));
    }
}
