//! Integer lattice indices of a graphene layer, used to place the atoms of a
//! commensurate tight-binding supercell.

use crate::error::BasisError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Six nearest-neighbour steps of the triangular Bravais lattice.
pub const NEIGHBOUR_STEPS: [(i32, i32); 6] = [(1, 0), (0, 1), (-1, 0), (0, -1), (1, -1), (-1, 1)];

/// Default round cap used by the tight-binding model.
pub const DEFAULT_MAX_ROUNDS: usize = 4096;

/// Lattice index `(i, j)` meaning `i·a1 + j·a2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LatticeIndex {
    pub i: i32,
    pub j: i32,
}

impl LatticeIndex {
    pub const ORIGIN: LatticeIndex = LatticeIndex { i: 0, j: 0 };

    pub fn new(i: i32, j: i32) -> Self {
        LatticeIndex { i, j }
    }

    /// Number of nearest-neighbour steps needed to reach this index.
    pub fn hex_distance(&self) -> i32 {
        self.i.abs().max(self.j.abs()).max((self.i + self.j).abs())
    }

    fn step(self, (di, dj): (i32, i32)) -> Self {
        LatticeIndex::new(self.i + di, self.j + dj)
    }
}

/// Lattice indices in breadth-first order, together with the number of
/// rounds it took to include the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatticeIndexSet {
    indices: Vec<LatticeIndex>,
    rounds: usize,
}

impl LatticeIndexSet {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn contains(&self, index: &LatticeIndex) -> bool {
        self.indices.contains(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LatticeIndex> {
        self.indices.iter()
    }
}

/// Index that has to be covered to hold a supercell built from `(m0, r)`.
pub fn commensurate_target(m0: u32, r: u32) -> LatticeIndex {
    LatticeIndex::new(m0 as i32, (m0 + r) as i32)
}

/// Grows the index set from the origin, one full ring per round, until
/// `target` is included. Fails after `max_rounds` rounds.
pub fn expand_until(target: LatticeIndex, max_rounds: usize) -> Result<LatticeIndexSet, BasisError> {
    let mut visited = HashSet::from([LatticeIndex::ORIGIN]);
    let mut indices = vec![LatticeIndex::ORIGIN];
    let mut frontier = vec![LatticeIndex::ORIGIN];
    let mut rounds = 0;

    while !visited.contains(&target) {
        if rounds == max_rounds {
            return Err(BasisError::NotConverged {
                i: target.i,
                j: target.j,
                rounds,
            });
        }

        let mut next = Vec::with_capacity(frontier.len() + 6);
        for index in &frontier {
            for step in NEIGHBOUR_STEPS {
                let candidate = index.step(step);
                if visited.insert(candidate) {
                    next.push(candidate);
                }
            }
        }
        indices.extend_from_slice(&next);
        frontier = next;
        rounds += 1;
    }

    debug!(
        "lattice closure reached ({}, {}) after {} rounds with {} indices",
        target.i,
        target.j,
        rounds,
        indices.len()
    );

    Ok(LatticeIndexSet { indices, rounds })
}
