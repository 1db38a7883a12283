use pangolin::{IdentityOperator, State, StepContext, StepCotangent, StepPair};

// ─── Soft threshold ────────────────────────────────────────────────────────

pub fn soft(x: f64, t: f64) -> f64 {
    if x > t {
        x - t
    } else if x < -t {
        x + t
    } else {
        0.0
    }
}

// ─── Denoising step ────────────────────────────────────────────────────────
// Proximal gradient iteration for ½‖x − y‖² + λ‖x‖₁ with step size τ. The
// identity forward operator keeps the per-iteration cost linear in n, so the
// benchmarks measure solver overhead rather than operator products.

pub struct DenoiseStep;

impl StepPair<f64, IdentityOperator> for DenoiseStep {
    fn param_names(&self) -> &'static [&'static str] {
        &["tau", "lambda"]
    }

    fn step_f(
        &self,
        state: &State<f64>,
        ctx: &StepContext<'_, f64, IdentityOperator>,
    ) -> State<f64> {
        let tau = ctx.params.get("tau")[0];
        let dual: Vec<f64> = state
            .primal
            .iter()
            .zip(ctx.observation)
            .map(|(&p, &y)| p - tau * (p - y))
            .collect();
        State::new(state.primal.clone(), dual)
    }

    fn step_g(
        &self,
        state: &State<f64>,
        ctx: &StepContext<'_, f64, IdentityOperator>,
    ) -> State<f64> {
        let theta = ctx.params.get("tau")[0] * ctx.params.get("lambda")[0];
        let primal: Vec<f64> = state.dual.iter().map(|&d| soft(d, theta)).collect();
        State::new(primal, state.dual.clone())
    }

    fn vjp_f(
        &self,
        state: &State<f64>,
        ctx: &StepContext<'_, f64, IdentityOperator>,
        cotangent: &State<f64>,
    ) -> StepCotangent<f64> {
        let tau = ctx.params.get("tau")[0];
        let primal: Vec<f64> = cotangent
            .primal
            .iter()
            .zip(&cotangent.dual)
            .map(|(&cp, &cd)| cp + (1.0 - tau) * cd)
            .collect();
        let observation: Vec<f64> = cotangent.dual.iter().map(|&c| tau * c).collect();
        let tau_bar: f64 = state
            .primal
            .iter()
            .zip(ctx.observation)
            .zip(&cotangent.dual)
            .map(|((&p, &y), &c)| -(p - y) * c)
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
        ctx: &StepContext<'_, f64, IdentityOperator>,
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

// ─── Helpers ───────────────────────────────────────────────────────────────

/// Deterministic observation with entries on both sides of the threshold.
pub fn make_observation(n: usize) -> Vec<f64> {
    (0..n).map(|i| 2.0 * (0.7 * i as f64).sin()).collect()
}

/// Deterministic output cotangent.
pub fn make_cotangent(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.1 * ((i % 7) + 1) as f64).collect()
}
