//! Implicit gradients at a fixed point.
//!
//! At an equilibrium z* of the composed step `step_g ∘ step_f`, the gradient
//! of a loss with respect to anything the step reads solves the adjoint
//! fixed-point equation `v = Jᵀ·v + u`, where J is the Jacobian of the
//! composed step at z* and u the incoming cotangent of z*. The equation is
//! solved by iterating `v ← Jᵀ·v + u` from `v₀ = u`, one reverse product per
//! sweep through a single application of the step, so nothing about the
//! forward trajectory is ever stored.
//!
//! The iteration contracts when the spectral radius of J is below one near
//! the equilibrium. When it stops contracting instead, the solver falls back
//! to the result of a small fixed number of sweeps (a truncated-series
//! approximation of the same gradient) and reports it rather than aborting.

use std::fmt;

use pangolin::{
    relative_residual, Float, SolvePass, State, StepContext, StepPair, UnfoldError,
};

/// Configuration for the adjoint fixed-point iteration.
#[derive(Clone, Debug)]
pub struct ImplicitConfig<F> {
    /// Maximum backward sweeps.
    pub max_iterations: usize,
    /// Relative tolerance on the adjoint update.
    pub tolerance: F,
    /// Sweep count of the fallback adjoint kept in case the iteration stops
    /// contracting.
    pub fallback_iterations: usize,
}

impl Default for ImplicitConfig<f64> {
    fn default() -> Self {
        ImplicitConfig {
            max_iterations: 100,
            tolerance: 1e-10,
            fallback_iterations: 5,
        }
    }
}

impl Default for ImplicitConfig<f32> {
    fn default() -> Self {
        ImplicitConfig {
            max_iterations: 100,
            tolerance: 1e-5,
            fallback_iterations: 5,
        }
    }
}

impl<F: Float> ImplicitConfig<F> {
    /// Check tolerance and cap.
    pub fn validate(&self) -> Result<(), UnfoldError> {
        if !(self.tolerance.is_finite() && self.tolerance > F::zero()) {
            return Err(UnfoldError::InvalidTolerance {
                context: "implicit backward",
                value: self.tolerance.to_f64().unwrap_or(f64::NAN),
            });
        }
        if self.max_iterations == 0 {
            return Err(UnfoldError::ZeroIterationCap {
                context: "implicit backward",
            });
        }
        Ok(())
    }
}

/// Why the adjoint iteration stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackwardTermination {
    /// Update fell below the tolerance.
    Converged,
    /// Cap reached; the returned adjoint is the last iterate.
    CapReached,
    /// Update-norm growth detected; the returned adjoint is the fallback.
    Truncated,
}

impl fmt::Display for BackwardTermination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackwardTermination::Converged => write!(f, "adjoint tolerance reached"),
            BackwardTermination::CapReached => {
                write!(f, "backward cap reached without convergence")
            }
            BackwardTermination::Truncated => {
                write!(f, "backward iteration truncated after residual growth")
            }
        }
    }
}

/// Summary of one adjoint solve.
#[derive(Clone, Debug)]
pub struct BackwardReport<F> {
    /// Reverse sweeps executed.
    pub sweeps: usize,
    /// Last relative update `‖v_{k+1} − v_k‖ / (1 + ‖v_k‖)`.
    pub residual: F,
    /// Why the iteration stopped.
    pub termination: BackwardTermination,
}

impl<F> BackwardReport<F> {
    /// Whether the adjoint equation was solved to tolerance. A false value
    /// still comes with a usable best-effort adjoint.
    pub fn converged(&self) -> bool {
        self.termination == BackwardTermination::Converged
    }
}

/// A solved adjoint system and the gradients contracted with it.
#[derive(Clone, Debug)]
pub struct AdjointSolution<F> {
    /// The adjoint state v satisfying `v = Jᵀ·v + u` (to tolerance).
    pub adjoint: State<F>,
    /// Gradient with respect to the observation, `(∂step/∂y)ᵀ·v`.
    pub observation: Vec<F>,
    /// Gradients with respect to the parameters read at the linearization
    /// iteration, by name.
    pub params: Vec<(&'static str, Vec<F>)>,
    /// How the iteration went.
    pub report: BackwardReport<F>,
}

/// Solve the adjoint fixed-point equation at `equilibrium` and contract the
/// result with the step's remaining inputs.
///
/// `seed` is the incoming cotangent u of the equilibrium state; the
/// iteration starts from `v₀ = u`. Each sweep applies one reverse pass
/// through `step_g` at the recomputed mid state, one through `step_f` at the
/// equilibrium, and re-adds the seed. `ctx` fixes the linearization point:
/// the sweeps and the final contraction read the parameters it resolves.
///
/// Non-finite adjoint states are a hard error. A finite iteration whose
/// update norm grows past an order of magnitude over its best is truncated
/// to `fallback_iterations` sweeps and reported through the solution's
/// [`BackwardReport`].
pub fn adjoint_solve<F, A, S>(
    step: &S,
    equilibrium: &State<F>,
    ctx: &StepContext<'_, F, A>,
    seed: &State<F>,
    config: &ImplicitConfig<F>,
) -> Result<AdjointSolution<F>, UnfoldError>
where
    F: Float,
    S: StepPair<F, A>,
{
    config.validate()?;

    // The mid state of the linearized iteration, recomputed once.
    let mid = step.step_f(equilibrium, ctx);
    if !mid.is_finite() {
        return Err(UnfoldError::Divergence {
            pass: SolvePass::Backward,
            iteration: 0,
        });
    }

    let growth = F::from(10.0).unwrap_or_else(|| F::infinity());
    let mut v = seed.clone();
    let mut snapshot = v.clone();
    let mut best_delta = F::infinity();
    let mut sweeps = 0;
    let mut residual = F::zero();
    let mut termination = BackwardTermination::CapReached;

    for k in 0..config.max_iterations {
        // v_new = Jᵀ·v + u, with Jᵀ applied as (∂f/∂z)ᵀ ∘ (∂g/∂mid)ᵀ.
        let pulled = step.vjp_g_state(&mid, ctx, &v);
        let mut v_new = step.vjp_f_state(equilibrium, ctx, &pulled);
        v_new.add_in_place(seed);
        if !v_new.is_finite() {
            return Err(UnfoldError::Divergence {
                pass: SolvePass::Backward,
                iteration: k,
            });
        }

        residual = relative_residual(&v, &v_new);
        // Instability is judged on the absolute update: under an expanding
        // Jacobian the relative residual plateaus while the update norm
        // keeps growing.
        let delta = v.distance(&v_new);
        sweeps = k + 1;
        v = v_new;

        if residual < config.tolerance {
            termination = BackwardTermination::Converged;
            break;
        }
        if delta > growth * best_delta {
            termination = BackwardTermination::Truncated;
            break;
        }
        if delta < best_delta {
            best_delta = delta;
        }
        if sweeps == config.fallback_iterations {
            snapshot = v.clone();
        }
    }

    if termination == BackwardTermination::Truncated {
        v = snapshot;
    }

    // Debug check: warn when the adjoint is best-effort.
    #[cfg(debug_assertions)]
    {
        match termination {
            BackwardTermination::CapReached => eprintln!(
                "WARNING: adjoint_solve hit the backward cap ({}) with residual {:?}. \
                 Returning the last iterate.",
                config.max_iterations,
                residual.to_f64()
            ),
            BackwardTermination::Truncated => eprintln!(
                "WARNING: adjoint_solve stopped contracting after {} sweeps (residual {:?}). \
                 Falling back to the {}-sweep adjoint.",
                sweeps,
                residual.to_f64(),
                config.fallback_iterations
            ),
            BackwardTermination::Converged => {}
        }
    }

    // One full reverse pass with the settled adjoint picks up the
    // observation and parameter contributions.
    let cg = step.vjp_g(&mid, ctx, &v);
    let cf = step.vjp_f(equilibrium, ctx, &cg.state);

    let mut observation = cg.observation;
    assert_eq!(
        cf.observation.len(),
        observation.len(),
        "observation cotangent length"
    );
    for i in 0..observation.len() {
        observation[i] = observation[i] + cf.observation[i];
    }

    let mut params = cg.params;
    for (name, cot) in cf.params {
        match params.iter_mut().find(|(n, _)| *n == name) {
            Some((_, acc)) => {
                assert_eq!(
                    acc.len(),
                    cot.len(),
                    "cotangent length for parameter \"{}\"",
                    name
                );
                for i in 0..cot.len() {
                    acc[i] = acc[i] + cot[i];
                }
            }
            None => params.push((name, cot)),
        }
    }

    Ok(AdjointSolution {
        adjoint: v,
        observation,
        params,
        report: BackwardReport {
            sweeps,
            residual,
            termination,
        },
    })
}
