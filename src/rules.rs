use crate::operator::LinearOperator;
use crate::state::{Problem, State};
use crate::Float;

/// Builds the starting state of a solve from the problem.
pub trait InitRule<F: Float, A> {
    /// Starting state for `problem`.
    fn init(&self, problem: &Problem<'_, F, A>) -> State<F>;

    /// Reverse-mode pass through the initialization: pull a cotangent of the
    /// starting state back onto the observation.
    ///
    /// Default implementation panics. Only solvers that compute gradients
    /// call this.
    fn vjp(&self, problem: &Problem<'_, F, A>, cotangent: &State<F>) -> Vec<F> {
        let _ = (problem, cotangent);
        unimplemented!("vjp not implemented for this initialization rule")
    }
}

/// Start both blocks from the adjoint applied to the observation,
/// `x₀ = Aᵀ·y`. The usual crude-inversion start for linear problems.
#[derive(Clone, Copy, Debug, Default)]
pub struct AdjointInit;

impl<F: Float, A: LinearOperator<F>> InitRule<F, A> for AdjointInit {
    fn init(&self, problem: &Problem<'_, F, A>) -> State<F> {
        State::from_primal(problem.operator.adjoint(problem.observation))
    }

    fn vjp(&self, problem: &Problem<'_, F, A>, cotangent: &State<F>) -> Vec<F> {
        // Both blocks start from A^T y, so their cotangents sum before A
        // carries them back to observation space.
        let mut c = cotangent.primal.clone();
        for i in 0..c.len() {
            c[i] = c[i] + cotangent.dual[i];
        }
        problem.operator.apply(&c)
    }
}

/// Start both blocks at zero, with a fixed block length.
#[derive(Clone, Copy, Debug)]
pub struct ZeroInit {
    /// Length of each state block.
    pub len: usize,
}

impl ZeroInit {
    /// Zero start of block length `len`.
    pub fn new(len: usize) -> Self {
        ZeroInit { len }
    }
}

impl<F: Float, A> InitRule<F, A> for ZeroInit {
    fn init(&self, _problem: &Problem<'_, F, A>) -> State<F> {
        State::zeros(self.len)
    }

    fn vjp(&self, problem: &Problem<'_, F, A>, _cotangent: &State<F>) -> Vec<F> {
        // The start does not depend on the observation.
        vec![F::zero(); problem.observation.len()]
    }
}

/// Cotangents of an output extraction.
#[derive(Clone, Debug)]
pub struct ExtractCotangent<F> {
    /// Cotangent of the final state.
    pub final_state: State<F>,
    /// Cotangents of trajectory entries, aligned with the trajectory passed
    /// to [`Extract::vjp`]; `None` for extractions that read only the final
    /// state.
    pub trajectory: Option<Vec<State<F>>>,
}

/// Maps a finished solve to the reconstruction output.
///
/// Trajectory convention: entry `k` is the state after `k` iterations, so
/// entry 0 is the initial state and the last entry equals the final state.
pub trait Extract<F: Float> {
    /// True when the extraction reads the whole trajectory rather than just
    /// the final state. Unrolled solvers retain the trajectory when this is
    /// set; equilibrium solvers reject such extractions at build time.
    fn needs_trajectory(&self) -> bool {
        false
    }

    /// Output from the final state and, when requested, the trajectory.
    fn extract(&self, final_state: &State<F>, trajectory: Option<&[State<F>]>) -> Vec<F>;

    /// Reverse-mode pass through the extraction: scatter the output
    /// cotangent back onto the states it was read from.
    ///
    /// Each contribution must land in exactly one slot of the result; the
    /// solvers add the trajectory slot of the last state on top of the
    /// final-state slot.
    ///
    /// Default implementation panics. Only solvers that compute gradients
    /// call this.
    fn vjp(
        &self,
        final_state: &State<F>,
        trajectory: Option<&[State<F>]>,
        cotangent: &[F],
    ) -> ExtractCotangent<F> {
        let _ = (final_state, trajectory, cotangent);
        unimplemented!("vjp not implemented for this extraction rule")
    }
}

/// Return the primal block of the final state.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrimalExtract;

impl<F: Float> Extract<F> for PrimalExtract {
    fn extract(&self, final_state: &State<F>, _trajectory: Option<&[State<F>]>) -> Vec<F> {
        final_state.primal.clone()
    }

    fn vjp(
        &self,
        final_state: &State<F>,
        _trajectory: Option<&[State<F>]>,
        cotangent: &[F],
    ) -> ExtractCotangent<F> {
        assert_eq!(
            cotangent.len(),
            final_state.primal.len(),
            "output cotangent length must match the primal block"
        );
        ExtractCotangent {
            final_state: State::new(
                cotangent.to_vec(),
                vec![F::zero(); final_state.dual.len()],
            ),
            trajectory: None,
        }
    }
}

/// Average the primal block over the whole trajectory, initial state
/// included. Exercises trajectory-based losses.
#[derive(Clone, Copy, Debug, Default)]
pub struct MeanPrimalExtract;

impl<F: Float> Extract<F> for MeanPrimalExtract {
    fn needs_trajectory(&self) -> bool {
        true
    }

    fn extract(&self, final_state: &State<F>, trajectory: Option<&[State<F>]>) -> Vec<F> {
        let traj = match trajectory {
            Some(t) => t,
            None => panic!("mean-primal extraction requires the trajectory"),
        };
        let scale = F::one() / F::from_usize(traj.len()).unwrap_or_else(F::one);
        let mut out = vec![F::zero(); final_state.primal.len()];
        for s in traj {
            for i in 0..out.len() {
                out[i] = out[i] + s.primal[i];
            }
        }
        for v in out.iter_mut() {
            *v = *v * scale;
        }
        out
    }

    fn vjp(
        &self,
        final_state: &State<F>,
        trajectory: Option<&[State<F>]>,
        cotangent: &[F],
    ) -> ExtractCotangent<F> {
        let traj = match trajectory {
            Some(t) => t,
            None => panic!("mean-primal extraction requires the trajectory"),
        };
        assert_eq!(
            cotangent.len(),
            final_state.primal.len(),
            "output cotangent length must match the primal block"
        );
        let scale = F::one() / F::from_usize(traj.len()).unwrap_or_else(F::one);
        let per_state: Vec<State<F>> = traj
            .iter()
            .map(|s| {
                State::new(
                    cotangent.iter().map(|&c| c * scale).collect(),
                    vec![F::zero(); s.dual.len()],
                )
            })
            .collect();
        ExtractCotangent {
            final_state: final_state.zeros_like(),
            trajectory: Some(per_state),
        }
    }
}
