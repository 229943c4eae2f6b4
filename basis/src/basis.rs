use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Layer tag of a plane-wave component. `Bottom` is layer 1, `Top` is layer 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    Bottom,
    Top,
}

impl Layer {
    pub fn tag(self) -> u8 {
        match self {
            Layer::Bottom => 1,
            Layer::Top => 2,
        }
    }

    pub fn other(self) -> Layer {
        match self {
            Layer::Bottom => Layer::Top,
            Layer::Top => Layer::Bottom,
        }
    }
}

/// Which inter-layer coupling matrix links a bottom vector to a top vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hop {
    /// Same reciprocal index on both layers.
    Same,
    /// Top index shifted by `+b₊`.
    AlongPlus,
    /// Top index shifted by `+b₋`.
    AlongMinus,
}

/// Integer reciprocal-lattice coordinates `(m, n)` on one layer.
///
/// Field order matters: the derived `Ord` sorts by layer first, so a
/// `BasisSet` iterates the whole bottom layer before the top one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BasisVector {
    pub layer: Layer,
    pub m: i32,
    pub n: i32,
}

impl BasisVector {
    pub const ORIGIN: BasisVector = BasisVector {
        layer: Layer::Bottom,
        m: 0,
        n: 0,
    };

    pub fn new(m: i32, n: i32, layer: Layer) -> Self {
        BasisVector { layer, m, n }
    }

    pub fn shifted(self, dm: i32, dn: i32) -> Self {
        BasisVector {
            m: self.m + dm,
            n: self.n + dn,
            ..self
        }
    }

    /// `m·b1 + n·b2`
    pub fn wave_vector(&self, b1: &Vector2<f64>, b2: &Vector2<f64>) -> Vector2<f64> {
        b1 * self.m as f64 + b2 * self.n as f64
    }

    /// The three vectors on the opposite layer coupled to this one.
    pub fn hop_partners(self) -> [BasisVector; 3] {
        let target = self.layer.other();
        let (m, n) = (self.m, self.n);
        match self.layer {
            Layer::Bottom => [
                BasisVector::new(m, n, target),
                BasisVector::new(m + 1, n, target),
                BasisVector::new(m, n + 1, target),
            ],
            Layer::Top => [
                BasisVector::new(m, n, target),
                BasisVector::new(m - 1, n, target),
                BasisVector::new(m, n - 1, target),
            ],
        }
    }

    /// Classifies the coupling between a bottom vector and a top vector.
    /// Returns `None` for vectors that are not hop partners (including
    /// pairs on the same layer).
    pub fn hop_to(&self, top: &BasisVector) -> Option<Hop> {
        if self.layer != Layer::Bottom || top.layer != Layer::Top {
            return None;
        }
        match (top.m - self.m, top.n - self.n) {
            (0, 0) => Some(Hop::Same),
            (1, 0) => Some(Hop::AlongPlus),
            (0, 1) => Some(Hop::AlongMinus),
            _ => None,
        }
    }
}

impl fmt::Display for BasisVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}; L{})", self.m, self.n, self.layer.tag())
    }
}

/// A finite set of plane-wave components closed under inter-layer hops,
/// except on the outermost shell reached by the last expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasisSet {
    vectors: BTreeSet<BasisVector>,
    frontier: BTreeSet<BasisVector>,
    hops: usize,
}

impl BasisSet {
    pub(crate) fn from_parts(
        vectors: BTreeSet<BasisVector>,
        frontier: BTreeSet<BasisVector>,
        hops: usize,
    ) -> Self {
        BasisSet {
            vectors,
            frontier,
            hops,
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn hops(&self) -> usize {
        self.hops
    }

    pub fn contains(&self, vector: &BasisVector) -> bool {
        self.vectors.contains(vector)
    }

    /// Ordered by `(layer, m, n)`.
    pub fn iter(&self) -> impl Iterator<Item = &BasisVector> {
        self.vectors.iter()
    }

    pub fn layer(&self, layer: Layer) -> Vec<BasisVector> {
        self.vectors
            .iter()
            .filter(|v| v.layer == layer)
            .copied()
            .collect()
    }

    pub fn layer_len(&self, layer: Layer) -> usize {
        self.vectors.iter().filter(|v| v.layer == layer).count()
    }

    /// Vectors added by the last hop.
    pub fn frontier(&self) -> &BTreeSet<BasisVector> {
        &self.frontier
    }

    /// Hop partners missing from the set, paired with the vector that
    /// references them. Only frontier vectors may appear on the left.
    pub fn dangling_hops(&self) -> Vec<(BasisVector, BasisVector)> {
        self.vectors
            .iter()
            .flat_map(|v| v.hop_partners().into_iter().map(move |p| (*v, p)))
            .filter(|(_, p)| !self.vectors.contains(p))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.dangling_hops()
            .iter()
            .all(|(source, _)| self.frontier.contains(source))
    }
}
