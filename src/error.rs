//! Crate-wide error type.
//!
//! Fatal conditions (bad configuration, assembly problems, failed linear
//! solves) surface as [`TopOptError`]. Non-fatal optimizer conditions (OC
//! bisection cap, infeasible MMA subproblem) are not errors; they are logged
//! and flagged in the per-iteration diagnostics instead.

use std::fmt;
use thiserror::Error;

use crate::config::ConfigError;
use crate::linalg::SolveError;

/// Stage of the outer optimization loop, used to tag fatal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Configuration,
    Filter,
    Assembly,
    Solve,
    Evaluate,
    Sensitivity,
    Update,
    Check,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configuration => "configuration",
            Stage::Filter => "filter",
            Stage::Assembly => "assembly",
            Stage::Solve => "solve",
            Stage::Evaluate => "evaluate",
            Stage::Sensitivity => "sensitivity",
            Stage::Update => "update",
            Stage::Check => "check",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum TopOptError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("assembly failed: {0}")]
    Assembly(String),

    #[error("response evaluation failed: {0}")]
    Evaluation(String),

    #[error("linear solve failed: {0}")]
    Solve(#[from] SolveError),

    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    Dimension {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{stage} stage failed at iteration {iteration}: {source}")]
    Stage {
        stage: Stage,
        iteration: usize,
        #[source]
        source: Box<TopOptError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to write history: {0}")]
    History(#[from] csv::Error),
}

impl TopOptError {
    /// Wrap an error with the stage and iteration it occurred in.
    pub fn at(self, stage: Stage, iteration: usize) -> Self {
        match self {
            // Already tagged errors keep their original stage.
            tagged @ TopOptError::Stage { .. } => tagged,
            other => TopOptError::Stage {
                stage,
                iteration,
                source: Box::new(other),
            },
        }
    }

    /// Stage this error was raised in, if it has been tagged.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            TopOptError::Stage { stage, .. } => Some(*stage),
            TopOptError::Config(_) => Some(Stage::Configuration),
            _ => None,
        }
    }

    pub(crate) fn check_len(context: &'static str, expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(TopOptError::Dimension {
                context,
                expected,
                actual,
            })
        }
    }
}

pub type Result<T> = std::result::Result<T, TopOptError>;
