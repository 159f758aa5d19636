//! Canonical enumeration of molecular sublevels.
//!
//! Sublevels are labeled by rotational number `N`, doubled total projection
//! `MF_D` and a degeneracy index `d`. Node indices are assigned with `N`
//! ascending, then `MF_D` ascending, then `d` ascending; every per-node array in
//! the crate is addressed by this order.

use itertools::iproduct;
use ndarray as nd;
use crate::spin::{ SpinProj, SpinTotal };

/// A single sublevel label `(N, MF_D, d)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateLabel {
    /// Rotational quantum number.
    pub n: u32,
    /// Total projection, in halves.
    pub mf: SpinProj,
    /// Degeneracy index within the `(N, MF_D)` group.
    pub d: u32,
}

impl StateLabel {
    pub fn new(n: u32, mf_d: i32, d: u32) -> Self {
        Self { n, mf: SpinProj::new(mf_d), d }
    }

    /// Return the label as a bare `[N, MF_D, d]` row.
    pub fn to_row(&self) -> [i64; 3] {
        [i64::from(self.n), i64::from(self.mf.halves()), i64::from(self.d)]
    }
}

impl From<(u32, i32, u32)> for StateLabel {
    fn from(t: (u32, i32, u32)) -> Self { Self::new(t.0, t.1, t.2) }
}

impl std::fmt::Display for StateLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.n, self.mf.halves(), self.d)
    }
}

/// A state of the uncoupled basis `(N, MN, M_I1, M_I2)`, with all projections in
/// halves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct UncoupledLabel {
    pub n: u32,
    pub mn: SpinProj,
    pub mi1: SpinProj,
    pub mi2: SpinProj,
}

/// The immutable sublevel enumeration together with its lookup tables.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelSpace {
    n_max: u32,
    i1: SpinTotal,
    i2: SpinTotal,
    labels: Vec<StateLabel>,
    // [N, (MF_D + F_D_MAX) / 2]
    degeneracy: nd::Array2<usize>,
    jump: nd::Array2<usize>,
}

impl LabelSpace {
    /// Enumerate all sublevels up to rotational number `n_max` for two nuclei
    /// of spins `i1` and `i2`.
    pub fn new(n_max: u32, i1: SpinTotal, i2: SpinTotal) -> Self {
        let f_max = (2 * n_max + i1.halves() + i2.halves()) as usize;
        let mut degeneracy: nd::Array2<usize>
            = nd::Array2::zeros((n_max as usize + 1, f_max + 1));
        let mut jump: nd::Array2<usize>
            = nd::Array2::zeros((n_max as usize + 1, f_max + 1));
        let mut labels: Vec<StateLabel> = Vec::new();
        for n in 0..=n_max {
            let f = SpinTotal::integer(n) + i1 + i2;
            for mf in f {
                let col = Self::column(f_max, mf);
                jump[[n as usize, col]] = labels.len();
                let count = count_combinations(n, i1, i2, mf);
                degeneracy[[n as usize, col]] = count;
                labels.extend(
                    (0..count as u32).map(|d| StateLabel { n, mf, d })
                );
            }
        }
        Self { n_max, i1, i2, labels, degeneracy, jump }
    }

    fn column(f_max: usize, mf: SpinProj) -> usize {
        (mf.halves() + f_max as i32) as usize / 2
    }

    /// Maximum rotational quantum number.
    pub fn n_max(&self) -> u32 { self.n_max }

    /// Largest total projection over the whole space, in halves.
    pub fn f_max(&self) -> u32 {
        2 * self.n_max + self.i1.halves() + self.i2.halves()
    }

    /// Largest total projection in rotational level `n`, in halves.
    pub fn f_max_at(&self, n: u32) -> SpinTotal {
        SpinTotal::integer(n) + self.i1 + self.i2
    }

    /// Number of sublevels.
    pub fn num_states(&self) -> usize { self.labels.len() }

    /// Number of sublevels per rotational projection, `(2 I1 + 1)(2 I2 + 1)`.
    pub fn per_mn(&self) -> usize {
        self.i1.multiplicity() * self.i2.multiplicity()
    }

    /// All labels in canonical order.
    pub fn labels(&self) -> &[StateLabel] { &self.labels }

    /// Position of the `(n, mf)` group in the lookup tables, if the group can
    /// exist at all.
    fn group(&self, n: u32, mf: SpinProj) -> Option<(usize, usize)> {
        (n <= self.n_max && self.f_max_at(n).admits(mf))
            .then(|| (n as usize, Self::column(self.f_max() as usize, mf)))
    }

    /// Number of sublevels sharing `(n, mf)`; zero for any group outside the
    /// enumerated space.
    pub fn degeneracy(&self, n: u32, mf: SpinProj) -> usize {
        self.group(n, mf).map(|ij| self.degeneracy[ij]).unwrap_or(0)
    }

    /// Node index of a label, or `None` if the label is not part of the
    /// enumerated space.
    pub fn index_of(&self, label: &StateLabel) -> Option<usize> {
        let ij = self.group(label.n, label.mf)?;
        ((label.d as usize) < self.degeneracy[ij])
            .then(|| self.jump[ij] + label.d as usize)
    }

    /// Label of a node index.
    pub fn label(&self, index: usize) -> Option<&StateLabel> {
        self.labels.get(index)
    }

    /// Labels as an `[N_STATES, 3]` table of `(N, MF_D, d)`.
    pub fn label_table(&self) -> nd::Array2<i64> {
        let mut table: nd::Array2<i64> = nd::Array2::zeros((self.labels.len(), 3));
        table.outer_iter_mut().zip(&self.labels)
            .for_each(|(mut row, label)| {
                row.iter_mut().zip(label.to_row())
                    .for_each(|(r, x)| { *r = x; });
            });
        table
    }

    /// Degeneracy cache indexed by `[N, (MF_D + F_D_MAX) / 2]`.
    pub fn degeneracy_table(&self) -> &nd::Array2<usize> { &self.degeneracy }

    /// Starting node index of each `(N, MF_D)` group, indexed like
    /// [`Self::degeneracy_table`].
    pub fn jump_table(&self) -> &nd::Array2<usize> { &self.jump }

    /// Enumerate the uncoupled basis in its own order: `N` ascending, then `MN`,
    /// `M_I1` and `M_I2` each descending.
    pub fn uncoupled_labels(&self) -> Vec<UncoupledLabel> {
        (0..=self.n_max)
            .flat_map(|n| {
                iproduct!(
                    SpinTotal::integer(n).iter_rev(),
                    self.i1.iter_rev(),
                    self.i2.iter_rev()
                )
                .map(move |(mn, mi1, mi2)| {
                    UncoupledLabel { n, mn, mi1, mi2 }
                })
            })
            .collect()
    }

    /// Uncoupled labels as an `[N_STATES, 4]` table of
    /// `(N, MN, M_I1_D, M_I2_D)`; note `MN` is stored as a plain integer.
    pub fn uncoupled_table(&self) -> nd::Array2<i64> {
        let uncoupled = self.uncoupled_labels();
        let mut table: nd::Array2<i64> = nd::Array2::zeros((uncoupled.len(), 4));
        table.outer_iter_mut().zip(&uncoupled)
            .for_each(|(mut row, u)| {
                row[0] = i64::from(u.n);
                row[1] = i64::from(u.mn.halves() / 2);
                row[2] = i64::from(u.mi1.halves());
                row[3] = i64::from(u.mi2.halves());
            });
        table
    }
}

/// Count the ways `2 MN + M_I1 + M_I2 = MF` can be satisfied in rotational
/// level `n`, by direct enumeration over all three projection ranges.
fn count_combinations(n: u32, i1: SpinTotal, i2: SpinTotal, mf: SpinProj)
    -> usize
{
    iproduct!(SpinTotal::integer(n).iter(), i1.iter(), i2.iter())
        .filter(|(mn, mi1, mi2)| *mn + *mi1 + *mi2 == mf)
        .count()
}
