//! Memory-bounded equilibrium search.
//!
//! Runs the shared fixed-point loop without trajectory retention. Gradient
//! information is recovered afterwards by the adjoint solver in
//! [`crate::implicit`] instead of by differentiating the iteration history,
//! so memory stays constant in the iteration count.

use pangolin::iterate;
use pangolin::{
    Float, ParamSchedule, Problem, SolveReport, State, StepPair, StoppingCriterion, UnfoldError,
};

/// The state an equilibrium search settled on.
#[derive(Clone, Debug)]
pub struct EquilibriumResult<F> {
    /// Last iterate. The equilibrium when the report says converged,
    /// otherwise the best state available at the cap.
    pub state: State<F>,
    /// Forward loop summary.
    pub report: SolveReport<F>,
}

/// Iterate the step pair to a fixed point, keeping only the current state.
///
/// Hitting the cap without meeting the tolerance is reported, not raised:
/// the caller receives the last state and a report whose
/// [`converged`](SolveReport::converged) flag is false. Divergence is still
/// an error.
pub fn equilibrium_solve<F, A, S>(
    step: &S,
    problem: &Problem<'_, F, A>,
    schedule: &ParamSchedule<'_, F>,
    stopping: &StoppingCriterion<F>,
    initial: State<F>,
) -> Result<EquilibriumResult<F>, UnfoldError>
where
    F: Float,
    S: StepPair<F, A>,
{
    let outcome = iterate::run(step, problem, schedule, stopping, initial, false)?;

    // Debug check: warn when the search stopped on the cap.
    #[cfg(debug_assertions)]
    {
        if !outcome.report.converged() {
            eprintln!(
                "WARNING: equilibrium_solve hit the iteration cap ({}) with residual {:?}. \
                 Implicit gradients assume a converged fixed point.",
                outcome.report.iterations,
                outcome.report.residual.to_f64()
            );
        }
    }

    Ok(EquilibriumResult {
        state: outcome.state,
        report: outcome.report,
    })
}
