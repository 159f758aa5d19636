//! Field-independent layout of all dipole-allowed transitions.
//!
//! Every node owns six contiguous blocks of outgoing edges in the global edge
//! array, in the fixed order given by [`Channel::ORDER`]:
//!
//! | block | direction | polarization | `dMF_D`  |
//! |-------|-----------|--------------|----------|
//! | 0     | up        | π            | `0`      |
//! | 1     | up        | σ⁺           | `-2`     |
//! | 2     | up        | σ⁻           | `+2`     |
//! | 3     | down      | π            | `0`      |
//! | 4     | down      | σ⁺           | `+2`     |
//! | 5     | down      | σ⁻           | `-2`     |
//!
//! i.e. `dMF_D ∈ {0, -2 dN, +2 dN}`. An offset table holds the seven block
//! boundaries of each node.

use std::ops::Range;
use ndarray as nd;
use crate::labels::{ LabelSpace, StateLabel };

/// Change in rotational number across a transition.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `dN = +1`
    Up,
    /// `dN = -1`
    Down,
}

impl Direction {
    /// Both directions, in block order.
    pub const ALL: [Self; 2] = [Self::Up, Self::Down];

    /// Change in rotational number.
    pub fn dn(self) -> i32 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    /// The opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

/// Polarization channel of a dipole transition.
///
/// The index of each variant is also its block position within a direction
/// and the position of its coupling matrix in [`crate::sampler::FieldData`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Polarization {
    /// `dMF_D = 0`
    Pi = 0,
    /// `dMF_D = -2 dN`
    SigmaPlus = 1,
    /// `dMF_D = +2 dN`
    SigmaMinus = 2,
}

impl Polarization {
    /// All polarizations, in block order.
    pub const ALL: [Self; 3] = [Self::Pi, Self::SigmaPlus, Self::SigmaMinus];

    pub fn index(self) -> usize { self as usize }

    /// Change in doubled total projection for a transition in direction `dir`.
    pub fn dmf(self, dir: Direction) -> i32 {
        match self {
            Self::Pi => 0,
            Self::SigmaPlus => -2 * dir.dn(),
            Self::SigmaMinus => 2 * dir.dn(),
        }
    }
}

/// A single (direction, polarization) block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Channel {
    pub direction: Direction,
    pub polarization: Polarization,
}

impl Channel {
    /// Block order shared by the edge layout and the coupling gather.
    pub const ORDER: [Self; 6] = [
        Self::new(Direction::Up, Polarization::Pi),
        Self::new(Direction::Up, Polarization::SigmaPlus),
        Self::new(Direction::Up, Polarization::SigmaMinus),
        Self::new(Direction::Down, Polarization::Pi),
        Self::new(Direction::Down, Polarization::SigmaPlus),
        Self::new(Direction::Down, Polarization::SigmaMinus),
    ];

    pub const fn new(direction: Direction, polarization: Polarization) -> Self {
        Self { direction, polarization }
    }

    /// Position of this channel among a node's six blocks.
    pub fn block(self) -> usize {
        let base = match self.direction {
            Direction::Up => 0,
            Direction::Down => 3,
        };
        base + self.polarization.index()
    }

    /// Same polarization, opposite direction.
    pub fn reversed(self) -> Self {
        Self::new(self.direction.reversed(), self.polarization)
    }

    pub fn dn(self) -> i32 { self.direction.dn() }

    pub fn dmf(self) -> i32 { self.polarization.dmf(self.direction) }
}

/// A directed dipole-allowed transition between two nodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Transition {
    pub from: StateLabel,
    pub to: StateLabel,
    pub from_index: usize,
    pub to_index: usize,
    // block of `from` this edge was enumerated in
    channel: Channel,
}

impl Transition {
    /// Return the same pair with endpoints ordered so that `from` has the
    /// lower rotational number.
    pub fn upward(self) -> Self {
        if self.from.n > self.to.n {
            Self {
                from: self.to,
                to: self.from,
                from_index: self.to_index,
                to_index: self.from_index,
                channel: self.channel.reversed(),
            }
        } else {
            self
        }
    }

    /// Channel of this transition as seen from `from`.
    pub fn channel(&self) -> Channel { self.channel }
}

/// Block boundaries of a single node, with access to the global edge array.
#[derive(Copy, Clone, Debug)]
pub struct EdgeBlocks<'a> {
    offsets: [usize; 7],
    edges: &'a [Transition],
}

impl<'a> EdgeBlocks<'a> {
    /// Global edge-index range of one channel.
    pub fn range(&self, channel: Channel) -> Range<usize> {
        let b = channel.block();
        self.offsets[b]..self.offsets[b + 1]
    }

    /// Global edge-index range of all three blocks in one direction.
    pub fn direction_range(&self, direction: Direction) -> Range<usize> {
        match direction {
            Direction::Up => self.offsets[0]..self.offsets[3],
            Direction::Down => self.offsets[3]..self.offsets[6],
        }
    }

    /// Global edge-index range of all six blocks.
    pub fn all(&self) -> Range<usize> { self.offsets[0]..self.offsets[6] }

    /// Edges of one channel.
    pub fn channel(&self, channel: Channel) -> &'a [Transition] {
        &self.edges[self.range(channel)]
    }

    /// The global edge array.
    pub fn edges(&self) -> &'a [Transition] { self.edges }
}

/// The immutable edge layout for a [`LabelSpace`].
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionGraph {
    edges: Vec<Transition>,
    // [node, 7]
    offsets: nd::Array2<usize>,
}

impl TransitionGraph {
    /// Enumerate all transitions of a label space.
    pub fn new(labels: &LabelSpace) -> Self {
        let n_states = labels.num_states();
        let mut edges: Vec<Transition> = Vec::new();
        let mut offsets: nd::Array2<usize> = nd::Array2::zeros((n_states, 7));
        let n_max = labels.n_max() as i64;
        for (from_index, from) in labels.labels().iter().enumerate() {
            offsets[[from_index, 0]] = edges.len();
            for channel in Channel::ORDER {
                let n_to = i64::from(from.n) + i64::from(channel.dn());
                if (0..=n_max).contains(&n_to) {
                    let n_to = n_to as u32;
                    let mf_to = from.mf.shifted(channel.dmf());
                    let count = labels.degeneracy(n_to, mf_to);
                    edges.extend(
                        (0..count as u32)
                        .filter_map(|d| {
                            let to = StateLabel { n: n_to, mf: mf_to, d };
                            labels.index_of(&to)
                                .map(|to_index| {
                                    Transition {
                                        from: *from,
                                        to,
                                        from_index,
                                        to_index,
                                        channel,
                                    }
                                })
                        })
                    );
                }
                offsets[[from_index, channel.block() + 1]] = edges.len();
            }
        }
        Self { edges, offsets }
    }

    /// Number of directed transitions.
    pub fn num_edges(&self) -> usize { self.edges.len() }

    /// Number of nodes.
    pub fn num_states(&self) -> usize { self.offsets.nrows() }

    /// All transitions in global edge order.
    pub fn edges(&self) -> &[Transition] { &self.edges }

    pub fn edge(&self, index: usize) -> Option<&Transition> {
        self.edges.get(index)
    }

    /// Block boundaries for a node index.
    pub fn blocks(&self, node: usize) -> Option<EdgeBlocks<'_>> {
        (node < self.offsets.nrows())
            .then(|| {
                let row = self.offsets.row(node);
                let mut offsets = [0; 7];
                offsets.iter_mut().zip(row.iter())
                    .for_each(|(o, r)| { *o = *r; });
                EdgeBlocks { offsets, edges: &self.edges }
            })
    }

    /// Block boundaries for a label, or `None` if the label does not exist.
    pub fn edges_for(&self, labels: &LabelSpace, label: &StateLabel)
        -> Option<EdgeBlocks<'_>>
    {
        labels.index_of(label).and_then(|k| self.blocks(k))
    }

    /// Global index of the edge `from -> to`, if they are connected.
    pub fn find_edge(&self, from: usize, to: usize) -> Option<usize> {
        let blocks = self.blocks(from)?;
        blocks.all().find(|&e| self.edges[e].to_index == to)
    }

    /// Offset table, `[N_STATES, 7]`.
    pub fn offset_table(&self) -> &nd::Array2<usize> { &self.offsets }

    /// Transition labels as an `[N_TRANSITIONS, 6]` table of
    /// `(N, MF_D, d)` for source then destination.
    pub fn label_table(&self) -> nd::Array2<i64> {
        let mut table: nd::Array2<i64> = nd::Array2::zeros((self.edges.len(), 6));
        table.outer_iter_mut().zip(&self.edges)
            .for_each(|(mut row, edge)| {
                row.iter_mut()
                    .zip(edge.from.to_row().into_iter().chain(edge.to.to_row()))
                    .for_each(|(r, x)| { *r = x; });
            });
        table
    }

    /// Transition endpoints as an `[N_TRANSITIONS, 2]` table of node indices.
    pub fn index_table(&self) -> nd::Array2<i64> {
        let mut table: nd::Array2<i64> = nd::Array2::zeros((self.edges.len(), 2));
        table.outer_iter_mut().zip(&self.edges)
            .for_each(|(mut row, edge)| {
                row[0] = edge.from_index as i64;
                row[1] = edge.to_index as i64;
            });
        table
    }
}
