use basis::BasisError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Phase of the per-k pipeline in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    HamiltonianAssembly,
    EigenDecomposition,
    Aggregation,
    Evaluation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::HamiltonianAssembly => "Hamiltonian assembly",
            Stage::EigenDecomposition => "eigen-decomposition",
            Stage::Aggregation => "aggregation",
            Stage::Evaluation => "evaluation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum TbgError {
    #[error("basis generation failed: {0}")]
    Basis(#[from] BasisError),

    #[error("dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("numerical failure during {stage}: {message}")]
    Numerical { stage: Stage, message: String },

    #[error("worker for chunk {chunk} failed during {stage}: {message}")]
    WorkerFailure {
        chunk: usize,
        stage: Stage,
        message: String,
    },

    #[error("cache error for `{key}`: {message}")]
    Cache { key: String, message: String },

    #[error("export to `{path}` failed: {message}")]
    Export { path: String, message: String },

    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
}

impl TbgError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        TbgError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn stage(&self) -> Stage {
        match self {
            TbgError::Numerical { stage, .. } | TbgError::WorkerFailure { stage, .. } => *stage,
            TbgError::DimensionMismatch { .. } => Stage::HamiltonianAssembly,
            _ => Stage::Evaluation,
        }
    }
}

pub type Result<T> = std::result::Result<T, TbgError>;
