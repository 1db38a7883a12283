use crate::Float;

/// Compute the L2 norm of a vector.
pub fn norm<F: Float>(v: &[F]) -> F {
    let mut s = F::zero();
    for &x in v {
        s = s + x * x;
    }
    s.sqrt()
}

/// Compute the dot product of two vectors.
pub fn dot<F: Float>(a: &[F], b: &[F]) -> F {
    debug_assert_eq!(a.len(), b.len());
    let mut s = F::zero();
    for i in 0..a.len() {
        s = s + a[i] * b[i];
    }
    s
}

/// True if every entry of the vector is finite.
pub fn all_finite<F: Float>(v: &[F]) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// The iterate of a fixed-point reconstruction: a primal estimate paired
/// with the dual/auxiliary variable threaded between the two half-steps.
///
/// Owned exclusively by the running solver during a pass; a copy becomes the
/// returned result.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct State<F> {
    /// Primal estimate x.
    pub primal: Vec<F>,
    /// Dual/auxiliary variable z.
    pub dual: Vec<F>,
}

impl<F: Float> State<F> {
    /// State from explicit primal and dual blocks.
    pub fn new(primal: Vec<F>, dual: Vec<F>) -> Self {
        State { primal, dual }
    }

    /// State with the dual block initialized to a copy of the primal block.
    pub fn from_primal(primal: Vec<F>) -> Self {
        let dual = primal.clone();
        State { primal, dual }
    }

    /// Zero state with both blocks of length `len`.
    pub fn zeros(len: usize) -> Self {
        State {
            primal: vec![F::zero(); len],
            dual: vec![F::zero(); len],
        }
    }

    /// Zero state with the same block lengths as `self`.
    pub fn zeros_like(&self) -> State<F> {
        State {
            primal: vec![F::zero(); self.primal.len()],
            dual: vec![F::zero(); self.dual.len()],
        }
    }

    /// Length of the primal block.
    pub fn len(&self) -> usize {
        self.primal.len()
    }

    /// True if the primal block is empty.
    pub fn is_empty(&self) -> bool {
        self.primal.is_empty()
    }

    /// True if every entry of both blocks is finite.
    pub fn is_finite(&self) -> bool {
        all_finite(&self.primal) && all_finite(&self.dual)
    }

    /// L2 norm over both blocks.
    pub fn norm(&self) -> F {
        let mut s = F::zero();
        for &x in self.primal.iter().chain(self.dual.iter()) {
            s = s + x * x;
        }
        s.sqrt()
    }

    /// L2 distance to `other` over both blocks.
    pub fn distance(&self, other: &State<F>) -> F {
        debug_assert_eq!(self.primal.len(), other.primal.len());
        debug_assert_eq!(self.dual.len(), other.dual.len());
        let mut s = F::zero();
        for i in 0..self.primal.len() {
            let d = self.primal[i] - other.primal[i];
            s = s + d * d;
        }
        for i in 0..self.dual.len() {
            let d = self.dual[i] - other.dual[i];
            s = s + d * d;
        }
        s.sqrt()
    }

    /// Largest entrywise absolute difference to `other` over both blocks.
    pub fn max_diff(&self, other: &State<F>) -> F {
        debug_assert_eq!(self.primal.len(), other.primal.len());
        debug_assert_eq!(self.dual.len(), other.dual.len());
        let mut m = F::zero();
        for i in 0..self.primal.len() {
            let d = (self.primal[i] - other.primal[i]).abs();
            if d > m {
                m = d;
            }
        }
        for i in 0..self.dual.len() {
            let d = (self.dual[i] - other.dual[i]).abs();
            if d > m {
                m = d;
            }
        }
        m
    }

    /// Entrywise sum with `other`, in place.
    pub fn add_in_place(&mut self, other: &State<F>) {
        debug_assert_eq!(self.primal.len(), other.primal.len());
        debug_assert_eq!(self.dual.len(), other.dual.len());
        for i in 0..self.primal.len() {
            self.primal[i] = self.primal[i] + other.primal[i];
        }
        for i in 0..self.dual.len() {
            self.dual[i] = self.dual[i] + other.dual[i];
        }
    }
}

/// One inverse-problem instance: the observation and the forward operator,
/// both externally owned and read-only for the duration of a pass.
///
/// The operator type is opaque to the solvers; only the step pair and the
/// initialization rule interpret it.
pub struct Problem<'a, F, A> {
    /// Measured data y.
    pub observation: &'a [F],
    /// Forward operator A.
    pub operator: &'a A,
}

impl<'a, F, A> Problem<'a, F, A> {
    /// Problem from borrowed observation and operator.
    pub fn new(observation: &'a [F], operator: &'a A) -> Self {
        Problem {
            observation,
            operator,
        }
    }
}

impl<F, A> Clone for Problem<'_, F, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F, A> Copy for Problem<'_, F, A> {}
