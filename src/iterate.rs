//! The fixed-point loop shared by unrolled and equilibrium solvers.

use crate::error::{SolvePass, UnfoldError};
use crate::report::{SolveReport, Termination};
use crate::schedule::ParamSchedule;
use crate::state::{Problem, State};
use crate::step::{StepContext, StepPair};
use crate::stopping::{relative_residual, StoppingCriterion};
use crate::Float;

/// Everything one forward run of the fixed-point loop produces.
#[derive(Clone, Debug)]
pub struct RunOutcome<F> {
    /// Final state.
    pub state: State<F>,
    /// States visited, entry `k` the state after `k` iterations; `None`
    /// unless trajectory retention was requested.
    pub trajectory: Option<Vec<State<F>>>,
    /// Loop summary.
    pub report: SolveReport<F>,
}

/// Drive the fixed-point loop from `initial` until `stopping` fires.
///
/// Each iteration resolves the parameters for its index, applies `step_f`
/// then `step_g`, and tests the stopping criterion on the consecutive pair
/// of states. A produced state with a non-finite entry aborts the run with
/// [`UnfoldError::Divergence`] naming the iteration that produced it; no
/// partial result is returned.
///
/// The schedule must cover the stopping cap.
pub fn run<F, A, S>(
    step: &S,
    problem: &Problem<'_, F, A>,
    schedule: &ParamSchedule<'_, F>,
    stopping: &StoppingCriterion<F>,
    initial: State<F>,
    keep_trajectory: bool,
) -> Result<RunOutcome<F>, UnfoldError>
where
    F: Float,
    S: StepPair<F, A>,
{
    let cap = stopping.cap();
    assert!(
        schedule.horizon() >= cap,
        "schedule horizon ({}) must cover the stopping cap ({})",
        schedule.horizon(),
        cap
    );

    let mut state = initial;
    let mut trajectory = if keep_trajectory {
        Some(vec![state.clone()])
    } else {
        None
    };
    let mut iterations = 0;
    let mut residual = F::zero();
    let mut met = false;

    for k in 0..cap {
        let ctx = StepContext {
            observation: problem.observation,
            operator: problem.operator,
            iteration: k,
            params: schedule.at(k),
        };
        let mid = step.step_f(&state, &ctx);
        if !mid.is_finite() {
            return Err(UnfoldError::Divergence {
                pass: SolvePass::Forward,
                iteration: k,
            });
        }
        let next = step.step_g(&mid, &ctx);
        if !next.is_finite() {
            return Err(UnfoldError::Divergence {
                pass: SolvePass::Forward,
                iteration: k,
            });
        }

        residual = relative_residual(&state, &next);
        met = stopping.tolerance_met(&state, &next);
        state = next;
        if let Some(t) = trajectory.as_mut() {
            t.push(state.clone());
        }
        iterations = k + 1;
        if met {
            break;
        }
    }

    let termination = if met {
        Termination::ToleranceReached
    } else if stopping.is_fixed_count() {
        Termination::Completed
    } else {
        Termination::CapReached
    };

    Ok(RunOutcome {
        state,
        trajectory,
        report: SolveReport {
            iterations,
            residual,
            termination,
        },
    })
}
