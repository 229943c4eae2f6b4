//! Plane-wave basis of the continuum model, grown by alternating
//! inter-layer hops from the bottom-layer origin.

use crate::basis::{BasisSet, BasisVector};
use std::collections::BTreeSet;
use tracing::debug;

/// Expands `{(0, 0; L1)}` by `loop_times` single hops (1→2 first, then
/// alternating). Only vectors not already present seed the next hop.
pub fn generate(loop_times: usize) -> BasisSet {
    let mut vectors = BTreeSet::from([BasisVector::ORIGIN]);
    let mut frontier = BTreeSet::from([BasisVector::ORIGIN]);

    for hop in 0..loop_times {
        let mut next = BTreeSet::new();
        for vector in &frontier {
            for partner in vector.hop_partners() {
                if vectors.insert(partner) {
                    next.insert(partner);
                }
            }
        }
        debug!(
            "hop {}: {} new vectors, {} in total",
            hop + 1,
            next.len(),
            vectors.len()
        );
        frontier = next;
    }

    BasisSet::from_parts(vectors, frontier, loop_times)
}
