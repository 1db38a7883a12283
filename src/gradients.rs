use std::collections::BTreeMap;

use crate::schedule::{ParamSet, ParamValues};
use crate::Float;

/// Gradients of a scalar function of the reconstruction with respect to the
/// observation and every learnable parameter.
///
/// Parameter slots mirror the storage of their entries: a shared entry
/// accumulates one vector across all iterations, a per-iteration entry keeps
/// one slot per iteration. Entries not marked learnable get no slot and
/// their cotangents are dropped.
#[derive(Clone, Debug)]
pub struct Gradients<F> {
    /// Cotangent of the observation y.
    pub observation: Vec<F>,
    /// Cotangents of learnable parameters, by name.
    pub params: BTreeMap<String, ParamValues<F>>,
}

impl<F: Float> Gradients<F> {
    /// Zero gradients shaped for `set`'s learnable entries and an
    /// observation of length `observation_len`.
    pub fn zeros(set: &ParamSet<F>, observation_len: usize) -> Self {
        let mut params = BTreeMap::new();
        for (name, entry) in set.iter() {
            if entry.learnable {
                params.insert(name.to_string(), entry.values.zeros_like());
            }
        }
        Gradients {
            observation: vec![F::zero(); observation_len],
            params,
        }
    }

    /// Gradient slot for `name`, if learnable.
    pub fn param(&self, name: &str) -> Option<&ParamValues<F>> {
        self.params.get(name)
    }

    /// Add `cotangent` into the observation slot.
    pub fn accumulate_observation(&mut self, cotangent: &[F]) {
        assert_eq!(
            cotangent.len(),
            self.observation.len(),
            "observation cotangent length"
        );
        for i in 0..cotangent.len() {
            self.observation[i] = self.observation[i] + cotangent[i];
        }
    }

    /// Add `cotangent` into the slot of `name` at iteration `k`.
    ///
    /// Names without a slot (fixed parameters) are skipped, so callers can
    /// forward every cotangent a step returns without filtering.
    pub fn accumulate_param(&mut self, name: &str, k: usize, cotangent: &[F]) {
        let slot = match self.params.get_mut(name) {
            Some(slot) => slot,
            None => return,
        };
        let values = match slot {
            ParamValues::Shared(v) => v.as_mut_slice(),
            ParamValues::PerIteration(vs) => vs[k].as_mut_slice(),
        };
        assert_eq!(
            cotangent.len(),
            values.len(),
            "cotangent length for parameter \"{}\"",
            name
        );
        for i in 0..cotangent.len() {
            values[i] = values[i] + cotangent[i];
        }
    }
}
