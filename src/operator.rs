use crate::Float;

/// A linear forward operator A together with its adjoint Aᵀ.
///
/// Step pairs and initialization rules call through this trait; the solvers
/// themselves never interpret the operator. `adjoint` must be the true
/// adjoint of `apply` under the Euclidean inner product, otherwise gradient
/// checks of any map built on top of it will fail.
pub trait LinearOperator<F: Float> {
    /// Length of the vectors `apply` accepts.
    fn input_len(&self) -> usize;

    /// Length of the vectors `apply` produces.
    fn output_len(&self) -> usize;

    /// Apply A to `x`.
    fn apply(&self, x: &[F]) -> Vec<F>;

    /// Apply Aᵀ to `y`.
    fn adjoint(&self, y: &[F]) -> Vec<F>;
}

/// The identity operator on vectors of a fixed length.
#[derive(Clone, Copy, Debug)]
pub struct IdentityOperator {
    len: usize,
}

impl IdentityOperator {
    /// Identity on vectors of length `len`.
    pub fn new(len: usize) -> Self {
        IdentityOperator { len }
    }
}

impl<F: Float> LinearOperator<F> for IdentityOperator {
    fn input_len(&self) -> usize {
        self.len
    }

    fn output_len(&self) -> usize {
        self.len
    }

    fn apply(&self, x: &[F]) -> Vec<F> {
        assert_eq!(x.len(), self.len, "identity operator input length");
        x.to_vec()
    }

    fn adjoint(&self, y: &[F]) -> Vec<F> {
        assert_eq!(y.len(), self.len, "identity operator adjoint input length");
        y.to_vec()
    }
}

/// Inpainting-style masking operator: entries where the mask is set pass
/// through, the rest are zeroed.
///
/// Square and self-adjoint (A = Aᵀ = diag(mask)).
#[derive(Clone, Debug)]
pub struct MaskOperator {
    mask: Vec<bool>,
}

impl MaskOperator {
    /// Operator keeping the entries where `mask` is `true`.
    pub fn new(mask: Vec<bool>) -> Self {
        MaskOperator { mask }
    }

    /// The measurement mask.
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }
}

impl<F: Float> LinearOperator<F> for MaskOperator {
    fn input_len(&self) -> usize {
        self.mask.len()
    }

    fn output_len(&self) -> usize {
        self.mask.len()
    }

    fn apply(&self, x: &[F]) -> Vec<F> {
        assert_eq!(x.len(), self.mask.len(), "mask operator input length");
        x.iter()
            .zip(&self.mask)
            .map(|(&v, &keep)| if keep { v } else { F::zero() })
            .collect()
    }

    fn adjoint(&self, y: &[F]) -> Vec<F> {
        self.apply(y)
    }
}

/// Dense matrix operator, row-major storage.
#[derive(Clone, Debug)]
pub struct DenseOperator<F> {
    rows: usize,
    cols: usize,
    data: Vec<F>,
}

impl<F: Float> DenseOperator<F> {
    /// Operator from `rows * cols` entries in row-major order.
    pub fn new(rows: usize, cols: usize, data: Vec<F>) -> Self {
        assert_eq!(
            data.len(),
            rows * cols,
            "dense operator needs rows * cols entries"
        );
        DenseOperator { rows, cols, data }
    }
}

impl<F: Float> LinearOperator<F> for DenseOperator<F> {
    fn input_len(&self) -> usize {
        self.cols
    }

    fn output_len(&self) -> usize {
        self.rows
    }

    fn apply(&self, x: &[F]) -> Vec<F> {
        assert_eq!(x.len(), self.cols, "dense operator input length");
        let mut out = vec![F::zero(); self.rows];
        for i in 0..self.rows {
            let row = &self.data[i * self.cols..(i + 1) * self.cols];
            let mut s = F::zero();
            for j in 0..self.cols {
                s = s + row[j] * x[j];
            }
            out[i] = s;
        }
        out
    }

    fn adjoint(&self, y: &[F]) -> Vec<F> {
        assert_eq!(y.len(), self.rows, "dense operator adjoint input length");
        let mut out = vec![F::zero(); self.cols];
        for i in 0..self.rows {
            let row = &self.data[i * self.cols..(i + 1) * self.cols];
            for j in 0..self.cols {
                out[j] = out[j] + row[j] * y[i];
            }
        }
        out
    }
}
