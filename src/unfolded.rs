//! Unrolled reconstruction networks.
//!
//! An unfolded network repeats a step pair for a bounded number of
//! iterations and differentiates the reconstruction by walking the recorded
//! trajectory backward, chaining each iteration's reverse products. Memory
//! grows with the iteration count, which is acceptable at the small depths
//! unrolled networks run at; the equilibrium variant with constant-memory
//! gradients lives in the companion `pangolin-deq` crate.

use crate::error::UnfoldError;
use crate::gradients::Gradients;
use crate::iterate;
use crate::report::SolveReport;
use crate::rules::{Extract, InitRule};
use crate::schedule::{ParamSchedule, ParamSet};
use crate::state::{Problem, State};
use crate::step::{StepContext, StepPair};
use crate::stopping::StoppingCriterion;
use crate::Float;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Output of one forward reconstruction.
#[derive(Clone, Debug)]
pub struct Reconstruction<F> {
    /// Extracted output.
    pub output: Vec<F>,
    /// Forward loop summary.
    pub report: SolveReport<F>,
}

/// A traced forward run: the output plus everything the backward walk
/// revisits.
#[derive(Clone, Debug)]
pub struct UnfoldedRun<F> {
    /// Extracted output.
    pub output: Vec<F>,
    /// All states, entry `k` the state after `k` iterations.
    pub trajectory: Vec<State<F>>,
    /// Forward loop summary.
    pub report: SolveReport<F>,
}

/// An unrolled reconstruction network: step pair, stopping rule,
/// initialization, and output extraction.
///
/// Parameters are not part of the network; the training procedure owns one
/// [`ParamSet`] and passes it by reference into every call, so updates flow
/// through that single object. The trajectory is retained exactly when the
/// extraction rule asks for it.
pub struct UnfoldedNet<F, S, I, E> {
    step: S,
    stopping: StoppingCriterion<F>,
    init: I,
    extract: E,
}

impl<F, S, I, E> UnfoldedNet<F, S, I, E>
where
    F: Float,
    E: Extract<F>,
{
    /// Assemble a network. Fails if the stopping rule carries an invalid
    /// tolerance.
    pub fn new(
        step: S,
        stopping: StoppingCriterion<F>,
        init: I,
        extract: E,
    ) -> Result<Self, UnfoldError> {
        stopping.validate("forward stopping")?;
        Ok(UnfoldedNet {
            step,
            stopping,
            init,
            extract,
        })
    }

    /// The stopping rule this network runs under.
    pub fn stopping(&self) -> &StoppingCriterion<F> {
        &self.stopping
    }

    /// Reconstruct one problem.
    ///
    /// Validates `params` against the step's declared names and the stopping
    /// cap before any iteration runs.
    pub fn forward<A>(
        &self,
        problem: &Problem<'_, F, A>,
        params: &ParamSet<F>,
    ) -> Result<Reconstruction<F>, UnfoldError>
    where
        S: StepPair<F, A>,
        I: InitRule<F, A>,
    {
        let schedule = ParamSchedule::new(params, self.stopping.cap(), self.step.param_names())?;
        let keep = self.extract.needs_trajectory();
        let outcome = iterate::run(
            &self.step,
            problem,
            &schedule,
            &self.stopping,
            self.init.init(problem),
            keep,
        )?;
        let output = self
            .extract
            .extract(&outcome.state, outcome.trajectory.as_deref());
        Ok(Reconstruction {
            output,
            report: outcome.report,
        })
    }

    /// Reconstruct one problem, keeping the full trajectory for a subsequent
    /// [`UnfoldedNet::backward`] call.
    pub fn forward_traced<A>(
        &self,
        problem: &Problem<'_, F, A>,
        params: &ParamSet<F>,
    ) -> Result<UnfoldedRun<F>, UnfoldError>
    where
        S: StepPair<F, A>,
        I: InitRule<F, A>,
    {
        let schedule = ParamSchedule::new(params, self.stopping.cap(), self.step.param_names())?;
        let outcome = iterate::run(
            &self.step,
            problem,
            &schedule,
            &self.stopping,
            self.init.init(problem),
            true,
        )?;
        let trajectory = match outcome.trajectory {
            Some(t) => t,
            None => unreachable!("trajectory retention was requested"),
        };
        let traj_arg = if self.extract.needs_trajectory() {
            Some(trajectory.as_slice())
        } else {
            None
        };
        let output = self.extract.extract(&outcome.state, traj_arg);
        Ok(UnfoldedRun {
            output,
            trajectory,
            report: outcome.report,
        })
    }

    /// Map an output cotangent to gradients by walking the recorded
    /// trajectory in reverse.
    ///
    /// At each executed iteration the mid state is recomputed with `step_f`,
    /// the cotangent is pulled through `step_g` then `step_f`, observation
    /// and parameter contributions are accumulated, and the walk finishes
    /// through the initialization rule. Gradients flow through every
    /// executed iteration; per-iteration entries accumulate into the slot of
    /// the iteration that read them.
    ///
    /// `run` must come from [`UnfoldedNet::forward_traced`] with the same
    /// problem and parameters.
    pub fn backward<A>(
        &self,
        problem: &Problem<'_, F, A>,
        params: &ParamSet<F>,
        run: &UnfoldedRun<F>,
        output_cotangent: &[F],
    ) -> Result<Gradients<F>, UnfoldError>
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
        let n = run.report.iterations;
        let traj = &run.trajectory;
        assert_eq!(
            traj.len(),
            n + 1,
            "trajectory must hold one state per executed iteration plus the initial state"
        );

        let traj_arg = if self.extract.needs_trajectory() {
            Some(traj.as_slice())
        } else {
            None
        };
        let ext = self.extract.vjp(&traj[n], traj_arg, output_cotangent);

        let mut state_cot = ext.final_state;
        let traj_cots = ext.trajectory;
        if let Some(tc) = &traj_cots {
            assert_eq!(
                tc.len(),
                traj.len(),
                "extraction must return one trajectory cotangent per state"
            );
            state_cot.add_in_place(&tc[n]);
        }

        let mut grads = Gradients::zeros(params, problem.observation.len());

        for k in (0..n).rev() {
            let ctx = StepContext {
                observation: problem.observation,
                operator: problem.operator,
                iteration: k,
                params: schedule.at(k),
            };
            // The mid state is recomputed instead of stored.
            let mid = self.step.step_f(&traj[k], &ctx);

            let cg = self.step.vjp_g(&mid, &ctx, &state_cot);
            grads.accumulate_observation(&cg.observation);
            for (name, cot) in &cg.params {
                grads.accumulate_param(name, k, cot);
            }

            let cf = self.step.vjp_f(&traj[k], &ctx, &cg.state);
            grads.accumulate_observation(&cf.observation);
            for (name, cot) in &cf.params {
                grads.accumulate_param(name, k, cot);
            }

            state_cot = cf.state;
            if let Some(tc) = &traj_cots {
                state_cot.add_in_place(&tc[k]);
            }
        }

        grads.accumulate_observation(&self.init.vjp(problem, &state_cot));
        Ok(grads)
    }

    /// Reconstruct a batch of independent problems in parallel.
    ///
    /// Parameters are shared read-only across the batch; each problem gets
    /// its own state.
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
