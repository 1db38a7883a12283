//! The step-pair trait iteration schemes implement.
//!
//! One iteration applies `step_f` then `step_g`. Forward-only solvers
//! implement just those two; differentiable ones also supply the reverse
//! products (`vjp_f`, `vjp_g`), which the default implementations leave
//! panicking.

use crate::schedule::IterationParams;
use crate::state::State;
use crate::Float;

/// Read-only side inputs handed to a step: the observation, the operator,
/// the iteration index, and the parameters resolved for this iteration.
pub struct StepContext<'a, F, A> {
    /// Measured data y.
    pub observation: &'a [F],
    /// Forward operator A.
    pub operator: &'a A,
    /// Zero-based iteration index.
    pub iteration: usize,
    /// Parameters resolved for this iteration.
    pub params: IterationParams<'a, F>,
}

/// Cotangents of one half-step, produced by a reverse-mode pass.
#[derive(Clone, Debug)]
pub struct StepCotangent<F> {
    /// Cotangent with respect to the incoming state.
    pub state: State<F>,
    /// Cotangent with respect to the observation. Always observation-length,
    /// zeros when the half-step does not read y.
    pub observation: Vec<F>,
    /// Cotangents with respect to this iteration's parameters, keyed by
    /// declared name. Parameters the half-step does not read may be omitted.
    pub params: Vec<(&'static str, Vec<F>)>,
}

/// A pair of update maps defining one iteration of the reconstruction.
///
/// One iteration is `step_g(step_f(state))`: the data-fidelity move runs
/// first, the regularization/prior move second. By convention `step_f` reads
/// the primal block and writes the dual block and `step_g` does the reverse.
/// The solvers only require that each half returns the full next state, so a
/// half-step must copy through the block it does not update, and its reverse
/// products must route that block's cotangent accordingly.
///
/// Steps must be pure with respect to the state (no hidden iteration
/// counters) and must tolerate being invoked at partially converged states
/// during gradient-tracked refinement.
pub trait StepPair<F: Float, A> {
    /// Parameter names this step reads from the schedule.
    fn param_names(&self) -> &'static [&'static str];

    /// Data-fidelity half-step.
    fn step_f(&self, state: &State<F>, ctx: &StepContext<'_, F, A>) -> State<F>;

    /// Regularization half-step.
    fn step_g(&self, state: &State<F>, ctx: &StepContext<'_, F, A>) -> State<F>;

    /// Reverse-mode pass through `step_f` at `state`: pull the output
    /// cotangent back onto the input state, the observation, and this
    /// iteration's parameters.
    ///
    /// Default implementation panics. Only solvers that compute gradients
    /// call this.
    fn vjp_f(
        &self,
        state: &State<F>,
        ctx: &StepContext<'_, F, A>,
        cotangent: &State<F>,
    ) -> StepCotangent<F> {
        let _ = (state, ctx, cotangent);
        unimplemented!("vjp_f not implemented for this step")
    }

    /// Reverse-mode pass through `step_g` at `state`.
    ///
    /// Default implementation panics. Only solvers that compute gradients
    /// call this.
    fn vjp_g(
        &self,
        state: &State<F>,
        ctx: &StepContext<'_, F, A>,
        cotangent: &State<F>,
    ) -> StepCotangent<F> {
        let _ = (state, ctx, cotangent);
        unimplemented!("vjp_g not implemented for this step")
    }

    /// State part of [`StepPair::vjp_f`] alone.
    ///
    /// The adjoint fixed-point iteration calls this once per sweep; override
    /// it when the state cotangent is cheaper to compute without the
    /// observation and parameter parts.
    fn vjp_f_state(
        &self,
        state: &State<F>,
        ctx: &StepContext<'_, F, A>,
        cotangent: &State<F>,
    ) -> State<F> {
        self.vjp_f(state, ctx, cotangent).state
    }

    /// State part of [`StepPair::vjp_g`] alone.
    fn vjp_g_state(
        &self,
        state: &State<F>,
        ctx: &StepContext<'_, F, A>,
        cotangent: &State<F>,
    ) -> State<F> {
        self.vjp_g(state, ctx, cotangent).state
    }
}
