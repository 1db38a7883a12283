use pangolin::{LinearOperator, State, StepContext, StepCotangent, StepPair};

// ─── Soft threshold ────────────────────────────────────────────────────────

/// sign(x) · max(|x| − t, 0)
pub fn soft(x: f64, t: f64) -> f64 {
    if x > t {
        x - t
    } else if x < -t {
        x + t
    } else {
        0.0
    }
}

// ─── Proximal gradient step ────────────────────────────────────────────────
// One PGD iteration for  min_x  ½‖Ax − y‖² + λ‖x‖₁. The fixed point of the
// active components is y − λ·sign(p*), independent of the step size τ, so a
// correct implicit gradient reports zero for τ and −sign(p*) pattern for λ.

pub struct ProxGradStep;

impl<A: LinearOperator<f64>> StepPair<f64, A> for ProxGradStep {
    fn param_names(&self) -> &'static [&'static str] {
        &["tau", "lambda"]
    }

    fn step_f(&self, state: &State<f64>, ctx: &StepContext<'_, f64, A>) -> State<f64> {
        let tau = ctx.params.get("tau")[0];
        let mut r = ctx.operator.apply(&state.primal);
        for i in 0..r.len() {
            r[i] -= ctx.observation[i];
        }
        let back = ctx.operator.adjoint(&r);
        let dual: Vec<f64> = state
            .primal
            .iter()
            .zip(&back)
            .map(|(&p, &b)| p - tau * b)
            .collect();
        State::new(state.primal.clone(), dual)
    }

    fn step_g(&self, state: &State<f64>, ctx: &StepContext<'_, f64, A>) -> State<f64> {
        let theta = ctx.params.get("tau")[0] * ctx.params.get("lambda")[0];
        let primal: Vec<f64> = state.dual.iter().map(|&d| soft(d, theta)).collect();
        State::new(primal, state.dual.clone())
    }

    fn vjp_f(
        &self,
        state: &State<f64>,
        ctx: &StepContext<'_, f64, A>,
        cotangent: &State<f64>,
    ) -> StepCotangent<f64> {
        let tau = ctx.params.get("tau")[0];
        let a_cd = ctx.operator.apply(&cotangent.dual);
        let ata_cd = ctx.operator.adjoint(&a_cd);
        let primal: Vec<f64> = (0..state.primal.len())
            .map(|i| cotangent.primal[i] + cotangent.dual[i] - tau * ata_cd[i])
            .collect();
        let observation: Vec<f64> = a_cd.iter().map(|&v| tau * v).collect();

        let mut r = ctx.operator.apply(&state.primal);
        for i in 0..r.len() {
            r[i] -= ctx.observation[i];
        }
        let back = ctx.operator.adjoint(&r);
        let tau_bar: f64 = back
            .iter()
            .zip(&cotangent.dual)
            .map(|(&b, &c)| -b * c)
            .sum();

        StepCotangent {
            state: State::new(primal, vec![0.0; state.dual.len()]),
            observation,
            params: vec![("tau", vec![tau_bar])],
        }
    }

    fn vjp_g(
        &self,
        state: &State<f64>,
        ctx: &StepContext<'_, f64, A>,
        cotangent: &State<f64>,
    ) -> StepCotangent<f64> {
        let tau = ctx.params.get("tau")[0];
        let lambda = ctx.params.get("lambda")[0];
        let theta = tau * lambda;
        let mut dual = cotangent.dual.clone();
        let mut theta_bar = 0.0;
        for i in 0..state.dual.len() {
            let d = state.dual[i];
            if d.abs() > theta {
                dual[i] += cotangent.primal[i];
                theta_bar -= d.signum() * cotangent.primal[i];
            }
        }
        StepCotangent {
            state: State::new(vec![0.0; state.primal.len()], dual),
            observation: vec![0.0; ctx.observation.len()],
            params: vec![
                ("tau", vec![lambda * theta_bar]),
                ("lambda", vec![tau * theta_bar]),
            ],
        }
    }
}

// ─── Linear contraction step ───────────────────────────────────────────────
// step_f: d = a·p + (1 − a)·y, step_g: p = d. Fixed point p* = d* = y for
// any a ≠ 1; the composed Jacobian is a·I, so a rate above one gives a
// cleanly expanding adjoint iteration.

pub struct ContractionStep;

impl<A> StepPair<f64, A> for ContractionStep {
    fn param_names(&self) -> &'static [&'static str] {
        &["rate"]
    }

    fn step_f(&self, state: &State<f64>, ctx: &StepContext<'_, f64, A>) -> State<f64> {
        let a = ctx.params.get("rate")[0];
        let dual: Vec<f64> = state
            .primal
            .iter()
            .zip(ctx.observation)
            .map(|(&p, &y)| a * p + (1.0 - a) * y)
            .collect();
        State::new(state.primal.clone(), dual)
    }

    fn step_g(&self, state: &State<f64>, _ctx: &StepContext<'_, f64, A>) -> State<f64> {
        State::new(state.dual.clone(), state.dual.clone())
    }

    fn vjp_f(
        &self,
        state: &State<f64>,
        ctx: &StepContext<'_, f64, A>,
        cotangent: &State<f64>,
    ) -> StepCotangent<f64> {
        let a = ctx.params.get("rate")[0];
        let primal: Vec<f64> = cotangent
            .primal
            .iter()
            .zip(&cotangent.dual)
            .map(|(&cp, &cd)| cp + a * cd)
            .collect();
        let observation: Vec<f64> = cotangent.dual.iter().map(|&c| (1.0 - a) * c).collect();
        let rate_bar: f64 = state
            .primal
            .iter()
            .zip(ctx.observation)
            .zip(&cotangent.dual)
            .map(|((&p, &y), &c)| (p - y) * c)
            .sum();
        StepCotangent {
            state: State::new(primal, vec![0.0; state.dual.len()]),
            observation,
            params: vec![("rate", vec![rate_bar])],
        }
    }

    fn vjp_g(
        &self,
        state: &State<f64>,
        ctx: &StepContext<'_, f64, A>,
        cotangent: &State<f64>,
    ) -> StepCotangent<f64> {
        let dual: Vec<f64> = cotangent
            .primal
            .iter()
            .zip(&cotangent.dual)
            .map(|(&cp, &cd)| cp + cd)
            .collect();
        StepCotangent {
            state: State::new(vec![0.0; state.primal.len()], dual),
            observation: vec![0.0; ctx.observation.len()],
            params: Vec::new(),
        }
    }
}

// ─── Gradient check helpers ────────────────────────────────────────────────

/// Central finite difference of a scalar map.
pub fn central_diff(f: impl Fn(f64) -> f64, x: f64, h: f64) -> f64 {
    (f(x + h) - f(x - h)) / (2.0 * h)
}

/// Weighted sum Σ w_i·out_i used as the scalar loss in gradient checks; its
/// output cotangent is w itself.
pub fn weighted_loss(out: &[f64], w: &[f64]) -> f64 {
    out.iter().zip(w).map(|(&o, &wi)| o * wi).sum()
}

/// Deterministic weights 0.1, 0.2, ..., one per output entry.
pub fn ramp_weights(n: usize) -> Vec<f64> {
    (1..=n).map(|i| 0.1 * i as f64).collect()
}
