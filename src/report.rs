use std::fmt;

/// Why the fixed-point loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Ran the planned fixed number of iterations.
    Completed,
    /// A tolerance test passed before the cap.
    ToleranceReached,
    /// Hit the iteration cap with the tolerance still unmet.
    CapReached,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Completed => write!(f, "fixed iteration count completed"),
            Termination::ToleranceReached => write!(f, "tolerance reached"),
            Termination::CapReached => write!(f, "iteration cap reached without convergence"),
        }
    }
}

/// Summary of one forward solve.
#[derive(Clone, Debug)]
pub struct SolveReport<F> {
    /// Number of iterations executed.
    pub iterations: usize,
    /// Relative residual between the last two states; zero when no iteration
    /// ran.
    pub residual: F,
    /// Why the loop stopped.
    pub termination: Termination,
}

impl<F> SolveReport<F> {
    /// False exactly when a tolerance criterion exhausted its cap. Callers
    /// tracking solve quality over training read this flag.
    pub fn converged(&self) -> bool {
        self.termination != Termination::CapReached
    }
}
