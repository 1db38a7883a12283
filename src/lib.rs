use std::fmt::{Debug, Display};

use num_traits::{Float as NumFloat, FloatConst, FromPrimitive};

pub mod error;
pub mod gradients;
pub mod iterate;
pub mod operator;
pub mod report;
pub mod rules;
pub mod schedule;
pub mod state;
pub mod step;
pub mod stopping;
pub mod unfolded;

pub use error::{SolvePass, UnfoldError};
pub use gradients::Gradients;
pub use iterate::RunOutcome;
pub use operator::{DenseOperator, IdentityOperator, LinearOperator, MaskOperator};
pub use report::{SolveReport, Termination};
pub use rules::{
    AdjointInit, Extract, ExtractCotangent, InitRule, MeanPrimalExtract, PrimalExtract, ZeroInit,
};
pub use schedule::{IterationParams, ParamEntry, ParamSchedule, ParamSet, ParamValues};
pub use state::{Problem, State};
pub use step::{StepContext, StepCotangent, StepPair};
pub use stopping::{relative_residual, NormKind, StoppingCriterion};
pub use unfolded::{Reconstruction, UnfoldedNet, UnfoldedRun};

/// Marker trait for base floating-point types (`f32`, `f64`).
///
/// Bundles the numeric and utility traits needed throughout pangolin.
/// State vectors, parameters, and tolerances are all generic over this trait.
pub trait Float:
    NumFloat + FloatConst + FromPrimitive + Copy + Send + Sync + Default + Debug + Display + 'static
{
}

impl Float for f32 {}
impl Float for f64 {}
