use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BasisError {
    #[error("lattice closure did not reach index ({i}, {j}) within {rounds} rounds")]
    NotConverged { i: i32, j: i32, rounds: usize },
}
