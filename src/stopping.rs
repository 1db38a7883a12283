use crate::error::UnfoldError;
use crate::state::State;
use crate::Float;

/// Which norm a state-distance test uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormKind {
    /// Euclidean norm over both state blocks.
    L2,
    /// Largest entrywise absolute value over both state blocks.
    LInf,
}

impl NormKind {
    /// Distance between consecutive states under this norm.
    pub fn distance<F: Float>(&self, prev: &State<F>, next: &State<F>) -> F {
        match self {
            NormKind::L2 => prev.distance(next),
            NormKind::LInf => prev.max_diff(next),
        }
    }
}

/// Relative residual `‖next − prev‖ / (1 + ‖prev‖)` between consecutive
/// states. This is the quantity solve reports carry.
pub fn relative_residual<F: Float>(prev: &State<F>, next: &State<F>) -> F {
    prev.distance(next) / (F::one() + prev.norm())
}

/// Decides when the fixed-point loop halts.
///
/// Every tolerance variant carries a hard iteration cap so that a run
/// terminates even on non-convergent sequences. Reaching the cap with the
/// tolerance unmet is reported through the solve report, not treated as
/// success.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StoppingCriterion<F> {
    /// Run exactly `count` iterations.
    FixedCount {
        /// Number of iterations to run.
        count: usize,
    },
    /// Stop when the distance between consecutive states falls below the
    /// tolerance, or at the cap.
    ToleranceOnState {
        /// Distance below which the iteration counts as converged.
        tolerance: F,
        /// Norm the distance is measured in.
        norm: NormKind,
        /// Hard iteration cap.
        max_iterations: usize,
    },
    /// Stop when the relative residual `‖Δ‖ / (1 + ‖prev‖)` falls below the
    /// tolerance, or at the cap.
    ToleranceOnResidual {
        /// Relative residual below which the iteration counts as converged.
        tolerance: F,
        /// Hard iteration cap.
        max_iterations: usize,
    },
}

impl<F: Float> StoppingCriterion<F> {
    /// Hard bound on the number of iterations.
    pub fn cap(&self) -> usize {
        match self {
            StoppingCriterion::FixedCount { count } => *count,
            StoppingCriterion::ToleranceOnState { max_iterations, .. } => *max_iterations,
            StoppingCriterion::ToleranceOnResidual { max_iterations, .. } => *max_iterations,
        }
    }

    pub(crate) fn is_fixed_count(&self) -> bool {
        matches!(self, StoppingCriterion::FixedCount { .. })
    }

    /// Check that the tolerance, if any, is finite and positive.
    pub fn validate(&self, context: &'static str) -> Result<(), UnfoldError> {
        let tolerance = match self {
            StoppingCriterion::FixedCount { .. } => return Ok(()),
            StoppingCriterion::ToleranceOnState { tolerance, .. } => *tolerance,
            StoppingCriterion::ToleranceOnResidual { tolerance, .. } => *tolerance,
        };
        if !tolerance.is_finite() || tolerance <= F::zero() {
            return Err(UnfoldError::InvalidTolerance {
                context,
                value: tolerance.to_f64().unwrap_or(f64::NAN),
            });
        }
        Ok(())
    }

    /// True when the tolerance test passes for the step from `prev` to
    /// `next`. `FixedCount` has no tolerance and never stops early.
    pub fn tolerance_met(&self, prev: &State<F>, next: &State<F>) -> bool {
        match self {
            StoppingCriterion::FixedCount { .. } => false,
            StoppingCriterion::ToleranceOnState {
                tolerance, norm, ..
            } => norm.distance(prev, next) < *tolerance,
            StoppingCriterion::ToleranceOnResidual { tolerance, .. } => {
                relative_residual(prev, next) < *tolerance
            }
        }
    }

    /// Whether the loop halts after iteration `iteration` produced `next`
    /// from `prev`: either the tolerance test passes or the cap is reached.
    pub fn should_stop(&self, iteration: usize, prev: &State<F>, next: &State<F>) -> bool {
        iteration + 1 >= self.cap() || self.tolerance_met(prev, next)
    }
}
