//! Field-dependent inputs and their reshaping into the canonical sparse layout.
//!
//! The external diagonalization step supplies, per field sample, one dense
//! coupling matrix per [`Polarization`] and a per-node energy vector, all
//! indexed in canonical node order. Everything here is a pure gather or a
//! pointwise derived quantity; shapes are checked once, at construction.

use ndarray::{ self as nd, s };
use num_complex::Complex64 as C64;
use serde::Deserialize;
use crate::{
    error::{ Error, Result },
    labels::LabelSpace,
    transitions::{ Channel, Polarization, TransitionGraph },
};

/// One tesla in gauss.
pub const GAUSS: f64 = 1e-4;

/// A half-open arithmetic range of field values in gauss, `[start, stop)`.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
pub struct FieldSegment {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl FieldSegment {
    /// Field values of the segment in tesla.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        let n
            = if self.step > 0.0 && self.stop > self.start {
                ((self.stop - self.start) / self.step).ceil() as usize
            } else {
                0
            };
        (0..n).map(move |k| (self.start + k as f64 * self.step) * GAUSS)
    }
}

/// An ordered, strictly increasing sequence of field magnitudes in tesla.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldGrid(nd::Array1<f64>);

impl FieldGrid {
    /// Wrap a sequence of field values, checking that it is non-empty, finite
    /// and strictly increasing.
    pub fn new(b: nd::Array1<f64>) -> Result<Self> {
        if b.is_empty() {
            return Err(Error::FieldGrid("empty field grid".into()));
        }
        if let Some(k) = b.iter().position(|x| !x.is_finite()) {
            return Err(Error::FieldGrid(format!("non-finite value at {}", k)));
        }
        if let Some(k)
            = b.iter().zip(b.iter().skip(1)).position(|(l, r)| r <= l)
        {
            return Err(Error::FieldGrid(
                format!("not strictly increasing at {}", k + 1)
            ));
        }
        Ok(Self(b))
    }

    /// Concatenate a series of segments given in gauss.
    pub fn from_segments(segments: &[FieldSegment]) -> Result<Self> {
        Self::new(segments.iter().flat_map(FieldSegment::values).collect())
    }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn values(&self) -> &nd::Array1<f64> { &self.0 }

    /// Return `true` if both grids have the same length and agree to within a
    /// relative tolerance.
    pub fn matches(&self, other: &Self, rtol: f64) -> bool {
        self.len() == other.len()
            && self.0.iter().zip(other.0.iter())
                .all(|(a, b)| (a - b).abs() <= rtol * a.abs().max(b.abs()))
    }
}

/// Eigenvectors of every field sample and the linear-Zeeman operator, needed
/// only for magnetic moments.
#[derive(Clone, Debug)]
pub struct Eigenstates {
    // [field, uncoupled, node]
    states: nd::Array3<C64>,
    hz: nd::Array2<C64>,
}

impl Eigenstates {
    pub fn states(&self) -> &nd::Array3<C64> { &self.states }

    pub fn hz(&self) -> &nd::Array2<C64> { &self.hz }
}

/// Per-field energies and dense couplings, already in canonical node order.
#[derive(Clone, Debug)]
pub struct FieldData {
    grid: FieldGrid,
    // [node, field]
    energies: nd::Array2<f64>,
    // per polarization, [field, node, node]
    couplings: [nd::Array3<f64>; 3],
    eigenstates: Option<Eigenstates>,
}

impl FieldData {
    /// Bundle the outputs of the external diagonalization, checking every
    /// shape against the label space.
    ///
    /// `couplings` is ordered as [`Polarization::ALL`].
    pub fn new(
        labels: &LabelSpace,
        grid: FieldGrid,
        energies: nd::Array2<f64>,
        couplings: [nd::Array3<f64>; 3],
    ) -> Result<Self>
    {
        let n = labels.num_states();
        let nb = grid.len();
        if energies.shape() != [n, nb] {
            return Err(Error::shape("energies", &[n, nb], energies.shape()));
        }
        for (pol, c) in Polarization::ALL.iter().zip(&couplings) {
            if c.shape() != [nb, n, n] {
                let name = match pol {
                    Polarization::Pi => "couplings_zero",
                    Polarization::SigmaPlus => "couplings_plus",
                    Polarization::SigmaMinus => "couplings_minus",
                };
                return Err(Error::shape(name, &[nb, n, n], c.shape()));
            }
        }
        Ok(Self { grid, energies, couplings, eigenstates: None })
    }

    /// Attach eigenvectors (`[field, uncoupled, node]`) and the linear-Zeeman
    /// operator (`[uncoupled, uncoupled]`).
    pub fn with_eigenstates(
        mut self,
        states: nd::Array3<C64>,
        hz: nd::Array2<C64>,
    ) -> Result<Self>
    {
        let n = self.num_states();
        let nb = self.num_fields();
        if states.shape() != [nb, n, n] {
            return Err(Error::shape("states", &[nb, n, n], states.shape()));
        }
        if hz.shape() != [n, n] {
            return Err(Error::shape("hz", &[n, n], hz.shape()));
        }
        self.eigenstates = Some(Eigenstates { states, hz });
        Ok(self)
    }

    pub fn grid(&self) -> &FieldGrid { &self.grid }

    pub fn num_fields(&self) -> usize { self.grid.len() }

    pub fn num_states(&self) -> usize { self.energies.nrows() }

    /// Energies, `[node, field]`.
    pub fn energies(&self) -> &nd::Array2<f64> { &self.energies }

    /// Energies of all nodes at field sample `bi`.
    pub fn energies_at(&self, bi: usize) -> nd::ArrayView1<'_, f64> {
        self.energies.column(bi)
    }

    /// Dense `[node, node]` coupling matrix of one polarization at field sample
    /// `bi`.
    pub fn couplings_at(&self, bi: usize, pol: Polarization)
        -> nd::ArrayView2<'_, f64>
    {
        self.couplings[pol.index()].slice(s![bi, .., ..])
    }

    /// Dense couplings of one polarization over all fields, `[field, node,
    /// node]`.
    pub fn couplings_dense(&self, pol: Polarization) -> &nd::Array3<f64> {
        &self.couplings[pol.index()]
    }

    pub fn eigenstates(&self) -> Option<&Eigenstates> {
        self.eigenstates.as_ref()
    }

    /// Magnetic moments `Re <ψ_i| -Hz |ψ_i>`, `[node, field]`, if eigenvectors
    /// were supplied.
    pub fn magnetic_moments(&self) -> Option<nd::Array2<f64>> {
        let eig = self.eigenstates.as_ref()?;
        let mut mu: nd::Array2<f64>
            = nd::Array2::zeros((self.num_states(), self.num_fields()));
        for (bi, psi) in eig.states.outer_iter().enumerate() {
            let hpsi: nd::Array2<C64> = eig.hz.dot(&psi);
            psi.axis_iter(nd::Axis(1)).zip(hpsi.axis_iter(nd::Axis(1)))
                .enumerate()
                .for_each(|(i, (v, hv))| {
                    let expval: C64
                        = v.iter().zip(hv.iter())
                        .map(|(a, b)| a.conj() * b)
                        .sum();
                    mu[[i, bi]] = -expval.re;
                });
        }
        Some(mu)
    }
}

/// Gather the sparse per-edge couplings of field sample `bi` from the dense
/// per-polarization matrices.
pub fn gather_couplings(graph: &TransitionGraph, data: &FieldData, bi: usize)
    -> nd::Array1<f64>
{
    let mut sparse: nd::Array1<f64> = nd::Array1::zeros(graph.num_edges());
    let dense: Vec<nd::ArrayView2<f64>>
        = Polarization::ALL.iter()
        .map(|pol| data.couplings_at(bi, *pol))
        .collect();
    for node in 0..graph.num_states() {
        let Some(blocks) = graph.blocks(node) else { continue; };
        for channel in Channel::ORDER {
            let c = &dense[channel.polarization.index()];
            for e in blocks.range(channel) {
                sparse[e] = c[[node, graph.edges()[e].to_index]];
            }
        }
    }
    sparse
}

/// Transition angular frequencies `|E(from) - E(to)| / ħ` of every edge.
pub fn pair_resonance(
    graph: &TransitionGraph,
    energies: nd::ArrayView1<f64>,
    hbar: f64,
) -> nd::Array1<f64>
{
    graph.edges().iter()
        .map(|e| (energies[e.from_index] - energies[e.to_index]).abs() / hbar)
        .collect()
}
