use std::collections::BTreeMap;

use crate::error::UnfoldError;
use crate::Float;

/// Storage for one named parameter across the iteration horizon.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParamValues<F> {
    /// One vector reused by every iteration.
    Shared(Vec<F>),
    /// One vector per iteration, indexed by iteration number.
    PerIteration(Vec<Vec<F>>),
}

impl<F: Float> ParamValues<F> {
    /// Value used at iteration `k`.
    ///
    /// For per-iteration storage, `k` must be within the provided range;
    /// schedule validation guarantees this for solver-driven lookups.
    pub fn at(&self, k: usize) -> &[F] {
        match self {
            ParamValues::Shared(v) => v,
            ParamValues::PerIteration(vs) => &vs[k],
        }
    }

    /// Zero-filled storage of the same shape.
    pub fn zeros_like(&self) -> ParamValues<F> {
        match self {
            ParamValues::Shared(v) => ParamValues::Shared(vec![F::zero(); v.len()]),
            ParamValues::PerIteration(vs) => {
                ParamValues::PerIteration(vs.iter().map(|v| vec![F::zero(); v.len()]).collect())
            }
        }
    }
}

/// One named parameter: its values and whether training requests gradients
/// for it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParamEntry<F> {
    /// Shared or per-iteration values.
    pub values: ParamValues<F>,
    /// True if gradients should be accumulated for this entry.
    pub learnable: bool,
}

/// Named collection of iteration parameters.
///
/// The training procedure owns the set and passes it by reference into every
/// forward and backward call; learnable entries are the only state it updates
/// between calls. Entries iterate in name order, so repeated runs with equal
/// inputs are bit-identical.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParamSet<F> {
    entries: BTreeMap<String, ParamEntry<F>>,
}

impl<F> Default for ParamSet<F> {
    fn default() -> Self {
        ParamSet {
            entries: BTreeMap::new(),
        }
    }
}

impl<F: Float> ParamSet<F> {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixed parameter shared by every iteration.
    pub fn shared(mut self, name: &str, values: Vec<F>) -> Self {
        self.insert(name, ParamValues::Shared(values), false);
        self
    }

    /// Add a learnable parameter shared by every iteration.
    pub fn shared_learnable(mut self, name: &str, values: Vec<F>) -> Self {
        self.insert(name, ParamValues::Shared(values), true);
        self
    }

    /// Add a fixed parameter with one value per iteration.
    pub fn per_iteration(mut self, name: &str, values: Vec<Vec<F>>) -> Self {
        self.insert(name, ParamValues::PerIteration(values), false);
        self
    }

    /// Add a learnable parameter with one value per iteration.
    pub fn per_iteration_learnable(mut self, name: &str, values: Vec<Vec<F>>) -> Self {
        self.insert(name, ParamValues::PerIteration(values), true);
        self
    }

    fn insert(&mut self, name: &str, values: ParamValues<F>, learnable: bool) {
        self.entries
            .insert(name.to_string(), ParamEntry { values, learnable });
    }

    /// Entry for `name`, if present.
    pub fn get(&self, name: &str) -> Option<&ParamEntry<F>> {
        self.entries.get(name)
    }

    /// Mutable entry for `name`; this is the training update path.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ParamEntry<F>> {
        self.entries.get_mut(name)
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamEntry<F>)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the set has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A [`ParamSet`] validated against an iteration horizon and the parameter
/// names a step declares.
///
/// Construction fails eagerly, before any iteration runs: every declared name
/// must be present, no undeclared entry may be present, and per-iteration
/// entries must cover the horizon.
#[derive(Clone, Copy, Debug)]
pub struct ParamSchedule<'a, F> {
    set: &'a ParamSet<F>,
    horizon: usize,
}

impl<'a, F: Float> ParamSchedule<'a, F> {
    /// Validate `set` for `horizon` iterations of a step declaring `required`
    /// parameter names.
    pub fn new(
        set: &'a ParamSet<F>,
        horizon: usize,
        required: &[&'static str],
    ) -> Result<Self, UnfoldError> {
        for &name in required {
            if set.get(name).is_none() {
                return Err(UnfoldError::MissingParameter { name });
            }
        }
        for (name, entry) in set.iter() {
            if !required.iter().any(|&r| r == name) {
                return Err(UnfoldError::UnknownParameter {
                    name: name.to_string(),
                });
            }
            if let ParamValues::PerIteration(vs) = &entry.values {
                if vs.len() < horizon {
                    return Err(UnfoldError::PerIterationLength {
                        name: name.to_string(),
                        expected: horizon,
                        actual: vs.len(),
                    });
                }
            }
        }
        Ok(ParamSchedule { set, horizon })
    }

    /// The iteration horizon this schedule was validated for.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// The underlying parameter set.
    pub fn set(&self) -> &'a ParamSet<F> {
        self.set
    }

    /// Value of `name` at iteration `iteration`.
    ///
    /// The schedule is not implicitly extended: indices at or beyond the
    /// horizon are an error.
    pub fn value_for(&self, name: &str, iteration: usize) -> Result<&'a [F], UnfoldError> {
        if iteration >= self.horizon {
            return Err(UnfoldError::BeyondHorizon {
                iteration,
                horizon: self.horizon,
            });
        }
        match self.set.get(name) {
            Some(entry) => Ok(entry.values.at(iteration)),
            None => Err(UnfoldError::UnknownParameter {
                name: name.to_string(),
            }),
        }
    }

    /// Infallible view of the parameters for one iteration, for use inside
    /// the solver loop.
    ///
    /// Panics if `iteration` is outside the horizon.
    pub fn at(&self, iteration: usize) -> IterationParams<'a, F> {
        assert!(
            iteration < self.horizon,
            "iteration {} outside schedule horizon {}",
            iteration,
            self.horizon
        );
        IterationParams {
            set: self.set,
            iteration,
        }
    }
}

/// Parameters resolved for a single iteration.
#[derive(Clone, Copy, Debug)]
pub struct IterationParams<'a, F> {
    set: &'a ParamSet<F>,
    iteration: usize,
}

impl<'a, F: Float> IterationParams<'a, F> {
    /// Value of `name` at this iteration.
    ///
    /// Panics if `name` was not validated into the schedule; steps must only
    /// read names they declare.
    pub fn get(&self, name: &str) -> &'a [F] {
        match self.set.get(name) {
            Some(entry) => entry.values.at(self.iteration),
            None => panic!("parameter \"{}\" was not validated into the schedule", name),
        }
    }

    /// Zero-based index of this iteration.
    pub fn iteration(&self) -> usize {
        self.iteration
    }
}
