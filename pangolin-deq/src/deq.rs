//! Equilibrium reconstruction networks.
//!
//! A [`DeqNet`] reconstructs through the fixed point of its step pair
//! instead of through a fixed unrolling depth. The forward pass searches for
//! the equilibrium with constant memory; the backward pass solves the
//! adjoint fixed-point equation at that equilibrium, so gradient cost does
//! not depend on how many iterations the search took. An optional short
//! gradient-tracked tail of extra iterations from the equilibrium improves
//! gradient accuracy at a bounded memory cost.

use pangolin::{
    Extract, Float, Gradients, InitRule, ParamSchedule, ParamSet, Problem, Reconstruction,
    SolvePass, SolveReport, State, StepContext, StepPair, StoppingCriterion, UnfoldError,
};

use crate::equilibrium::equilibrium_solve;
use crate::implicit::{adjoint_solve, BackwardReport, ImplicitConfig};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A traced equilibrium run: everything the backward pass revisits.
///
/// Unlike an unrolled trace this never holds the search trajectory, only the
/// equilibrium itself and the short refinement tail.
#[derive(Clone, Debug)]
pub struct DeqRun<F> {
    /// Extracted output.
    pub output: Vec<F>,
    /// The state the equilibrium search settled on.
    pub equilibrium: State<F>,
    /// States after each gradient-tracked refinement iteration.
    pub refined: Vec<State<F>>,
    /// Iteration index the backward pass linearizes at: the last one the
    /// search executed.
    pub linearization: usize,
    /// Equilibrium search summary. Refinement iterations are not counted.
    pub report: SolveReport<F>,
}

impl<F> DeqRun<F> {
    /// The state the output was extracted from.
    pub fn final_state(&self) -> &State<F> {
        self.refined.last().unwrap_or(&self.equilibrium)
    }
}

/// An equilibrium reconstruction network with implicit gradients.
///
/// Composes the memory-bounded equilibrium search with the adjoint
/// fixed-point solver. Parameters are owned by the training procedure and
/// passed by reference into every call, exactly as with
/// [`UnfoldedNet`](pangolin::UnfoldedNet); swapping one network for the
/// other changes how gradients are computed, not how the training loop
/// drives them.
pub struct DeqNet<F, S, I, E> {
    step: S,
    stopping: StoppingCriterion<F>,
    implicit: ImplicitConfig<F>,
    refinement: usize,
    init: I,
    extract: E,
}

impl<F, S, I, E> DeqNet<F, S, I, E>
where
    F: Float,
    E: Extract<F>,
{
    /// Assemble a network. One refinement iteration is kept by default; see
    /// [`DeqNet::with_refinement`].
    ///
    /// Fails on an invalid stopping rule or backward configuration, on a
    /// zero iteration cap (the linearization point requires at least one
    /// executed iteration), and on trajectory-based extraction, which has no
    /// meaning when no trajectory exists.
    pub fn new(
        step: S,
        stopping: StoppingCriterion<F>,
        implicit: ImplicitConfig<F>,
        init: I,
        extract: E,
    ) -> Result<Self, UnfoldError> {
        stopping.validate("equilibrium stopping")?;
        if stopping.cap() == 0 {
            return Err(UnfoldError::ZeroIterationCap {
                context: "equilibrium stopping",
            });
        }
        implicit.validate()?;
        if extract.needs_trajectory() {
            return Err(UnfoldError::TrajectoryUnsupported);
        }
        Ok(DeqNet {
            step,
            stopping,
            implicit,
            refinement: 1,
            init,
            extract,
        })
    }

    /// Set the number of gradient-tracked iterations run from the
    /// equilibrium before extraction. Zero disables refinement.
    pub fn with_refinement(mut self, refinement: usize) -> Self {
        self.refinement = refinement;
        self
    }

    /// Reconstruct one problem.
    pub fn forward<A>(
        &self,
        problem: &Problem<'_, F, A>,
        params: &ParamSet<F>,
    ) -> Result<Reconstruction<F>, UnfoldError>
    where
        S: StepPair<F, A>,
        I: InitRule<F, A>,
    {
        let run = self.forward_traced(problem, params)?;
        Ok(Reconstruction {
            output: run.output,
            report: run.report,
        })
    }

    /// Reconstruct one problem, keeping what a subsequent
    /// [`DeqNet::backward`] call needs: the equilibrium and the refinement
    /// tail, never the search trajectory.
    pub fn forward_traced<A>(
        &self,
        problem: &Problem<'_, F, A>,
        params: &ParamSet<F>,
    ) -> Result<DeqRun<F>, UnfoldError>
    where
        S: StepPair<F, A>,
        I: InitRule<F, A>,
    {
        let schedule = ParamSchedule::new(params, self.stopping.cap(), self.step.param_names())?;
        let eq = equilibrium_solve(
            &self.step,
            problem,
            &schedule,
            &self.stopping,
            self.init.init(problem),
        )?;
        // At least one iteration ran, so the last executed index is valid.
        let lin = eq.report.iterations - 1;
        let ctx = StepContext {
            observation: problem.observation,
            operator: problem.operator,
            iteration: lin,
            params: schedule.at(lin),
        };

        let mut refined = Vec::with_capacity(self.refinement);
        let mut state = eq.state.clone();
        for j in 0..self.refinement {
            let mid = self.step.step_f(&state, &ctx);
            if !mid.is_finite() {
                return Err(UnfoldError::Divergence {
                    pass: SolvePass::Forward,
                    iteration: eq.report.iterations + j,
                });
            }
            let next = self.step.step_g(&mid, &ctx);
            if !next.is_finite() {
                return Err(UnfoldError::Divergence {
                    pass: SolvePass::Forward,
                    iteration: eq.report.iterations + j,
                });
            }
            refined.push(next.clone());
            state = next;
        }

        let output = self.extract.extract(&state, None);
        Ok(DeqRun {
            output,
            equilibrium: eq.state,
            refined,
            linearization: lin,
            report: eq.report,
        })
    }

    /// Map an output cotangent to gradients.
    ///
    /// The cotangent first walks back through the refinement tail the way an
    /// unrolled network would, then enters the adjoint fixed-point solve at
    /// the equilibrium; the solved adjoint is contracted with the step's
    /// observation and parameter dependencies. Everything linearizes at the
    /// parameters of `run.linearization`. Nothing flows into the
    /// initialization rule: within its basin the equilibrium does not depend
    /// on where the search started.
    ///
    /// Returns the gradients together with the adjoint solve's report, which
    /// records whether the backward iteration converged or fell back to a
    /// truncated adjoint.
    pub fn backward<A>(
        &self,
        problem: &Problem<'_, F, A>,
        params: &ParamSet<F>,
        run: &DeqRun<F>,
        output_cotangent: &[F],
    ) -> Result<(Gradients<F>, BackwardReport<F>), UnfoldError>
    where
        S: StepPair<F, A>,
        I: InitRule<F, A>,
    {
        let schedule = ParamSchedule::new(params, self.stopping.cap(), self.step.param_names())?;
        if output_cotangent.len() != run.output.len() {
            return Err(UnfoldError::ShapeMismatch {
                context: "output cotangent",
                expected: run.output.len(),
                actual: output_cotangent.len(),
            });
        }
        let lin = run.linearization;
        let ctx = StepContext {
            observation: problem.observation,
            operator: problem.operator,
            iteration: lin,
            params: schedule.at(lin),
        };

        let ext = self
            .extract
            .vjp(run.final_state(), None, output_cotangent);
        let mut state_cot = ext.final_state;

        let mut grads = Gradients::zeros(params, problem.observation.len());

        for j in (0..run.refined.len()).rev() {
            let prev = if j == 0 {
                &run.equilibrium
            } else {
                &run.refined[j - 1]
            };
            let mid = self.step.step_f(prev, &ctx);
            let cg = self.step.vjp_g(&mid, &ctx, &state_cot);
            grads.accumulate_observation(&cg.observation);
            for (name, cot) in &cg.params {
                grads.accumulate_param(name, lin, cot);
            }
            let cf = self.step.vjp_f(prev, &ctx, &cg.state);
            grads.accumulate_observation(&cf.observation);
            for (name, cot) in &cf.params {
                grads.accumulate_param(name, lin, cot);
            }
            state_cot = cf.state;
        }

        let solution = adjoint_solve(&self.step, &run.equilibrium, &ctx, &state_cot, &self.implicit)?;
        grads.accumulate_observation(&solution.observation);
        for (name, cot) in &solution.params {
            grads.accumulate_param(name, lin, cot);
        }

        Ok((grads, solution.report))
    }

    /// Reconstruct a batch of independent problems in parallel.
    ///
    /// Parameters are shared read-only across the batch; each problem gets
    /// its own equilibrium search.
    #[cfg(feature = "parallel")]
    pub fn forward_batch<A>(
        &self,
        problems: &[Problem<'_, F, A>],
        params: &ParamSet<F>,
    ) -> Result<Vec<Reconstruction<F>>, UnfoldError>
    where
        S: StepPair<F, A> + Sync,
        I: InitRule<F, A> + Sync,
        E: Sync,
        A: Sync,
    {
        problems
            .par_iter()
            .map(|problem| self.forward(problem, params))
            .collect()
    }
}
