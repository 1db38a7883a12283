use std::fmt;

/// Which half of a solve an error occurred in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolvePass {
    /// The fixed-point iteration producing the reconstruction.
    Forward,
    /// The adjoint iteration producing gradients.
    Backward,
}

impl fmt::Display for SolvePass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolvePass::Forward => write!(f, "forward"),
            SolvePass::Backward => write!(f, "backward"),
        }
    }
}

/// Errors raised while configuring or running a reconstruction network.
///
/// Configuration variants surface eagerly, before any iteration executes.
/// `Divergence` is the only variant raised mid-solve; cap exhaustion and
/// adjoint truncation are reported through solve reports instead, so a
/// degraded result still reaches the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum UnfoldError {
    /// The step declares a parameter the set does not provide.
    MissingParameter {
        /// Name declared by the step.
        name: &'static str,
    },
    /// The set provides a parameter the step never declared.
    UnknownParameter {
        /// Offending entry name.
        name: String,
    },
    /// A per-iteration entry does not cover the iteration horizon.
    PerIterationLength {
        /// Offending entry name.
        name: String,
        /// Horizon the schedule was built for.
        expected: usize,
        /// Number of values the entry provides.
        actual: usize,
    },
    /// A parameter was requested for an iteration outside the horizon.
    BeyondHorizon {
        /// Requested iteration index.
        iteration: usize,
        /// Horizon the schedule was built for.
        horizon: usize,
    },
    /// A tolerance is not a finite positive number.
    InvalidTolerance {
        /// Which tolerance was rejected.
        context: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// A solver that needs at least one iteration was given a cap of zero.
    ZeroIterationCap {
        /// Which cap was rejected.
        context: &'static str,
    },
    /// The output extraction reads the trajectory, which this solver never
    /// retains.
    TrajectoryUnsupported,
    /// An iterate contained a non-finite value.
    Divergence {
        /// Which solve pass produced the value.
        pass: SolvePass,
        /// Index of the iteration that produced it.
        iteration: usize,
    },
    /// A vector had the wrong length for the slot it was handed to.
    ShapeMismatch {
        /// Which slot was being filled.
        context: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },
}

impl fmt::Display for UnfoldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnfoldError::MissingParameter { name } => {
                write!(
                    f,
                    "step requires parameter \"{}\" but the set does not provide it",
                    name
                )
            }
            UnfoldError::UnknownParameter { name } => {
                write!(f, "parameter \"{}\" is not declared by the step", name)
            }
            UnfoldError::PerIterationLength {
                name,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "per-iteration parameter \"{}\" provides {} values for a horizon of {}",
                    name, actual, expected
                )
            }
            UnfoldError::BeyondHorizon { iteration, horizon } => {
                write!(
                    f,
                    "iteration {} is outside the schedule horizon of {}",
                    iteration, horizon
                )
            }
            UnfoldError::InvalidTolerance { context, value } => {
                write!(
                    f,
                    "{} tolerance must be finite and positive, got {}",
                    context, value
                )
            }
            UnfoldError::ZeroIterationCap { context } => {
                write!(f, "{} requires an iteration cap of at least 1", context)
            }
            UnfoldError::TrajectoryUnsupported => {
                write!(
                    f,
                    "the output extraction reads the trajectory, which this solver does not retain"
                )
            }
            UnfoldError::Divergence { pass, iteration } => {
                write!(
                    f,
                    "{} iterate became non-finite at iteration {}",
                    pass, iteration
                )
            }
            UnfoldError::ShapeMismatch {
                context,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "{}: expected length {}, got {}",
                    context, expected, actual
                )
            }
        }
    }
}

impl std::error::Error for UnfoldError {}
