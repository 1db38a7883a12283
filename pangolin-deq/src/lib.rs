pub mod deq;
pub mod equilibrium;
pub mod implicit;

pub use deq::{DeqNet, DeqRun};
pub use equilibrium::{equilibrium_solve, EquilibriumResult};
pub use implicit::{
    adjoint_solve, AdjointSolution, BackwardReport, BackwardTermination, ImplicitConfig,
};
