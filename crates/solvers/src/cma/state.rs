use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Search distribution and its learning rates.
///
/// The covariance is kept as `C = B diag(D²) Bᵀ`, refreshed after every
/// update.
pub(super) struct State {
    dim: usize,
    lambda: usize,
    weights: Vec<f64>,
    mu_eff: f64,
    c_sigma: f64,
    d_sigma: f64,
    c_c: f64,
    c_1: f64,
    c_mu: f64,
    expected_norm: f64,
    pub(super) mean: DVector<f64>,
    pub(super) sigma: f64,
    pub(super) sigma0: f64,
    cov: DMatrix<f64>,
    basis: DMatrix<f64>,
    scale: DVector<f64>,
    p_sigma: DVector<f64>,
    pub(super) p_c: DVector<f64>,
    generation: usize,
    /// Set when the covariance could not be decomposed.
    pub(super) degenerate: bool,
}

impl State {
    /// Creates the distribution around `x0` with covariance `diag(stds²)`.
    pub(super) fn new(x0: &[f64], sigma0: f64, stds: &[f64], lambda: usize) -> Self {
        let dim = x0.len();
        #[allow(clippy::cast_precision_loss)]
        let n = dim as f64;

        let mu = lambda / 2;
        #[allow(clippy::cast_precision_loss)]
        let raw: Vec<f64> = (0..mu)
            .map(|i| (mu as f64 + 0.5).ln() - ((i + 1) as f64).ln())
            .collect();
        let total: f64 = raw.iter().sum();
        let weights: Vec<f64> = raw.iter().map(|w| w / total).collect();
        let mu_eff = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();

        let c_sigma = (mu_eff + 2.0) / (n + mu_eff + 5.0);
        let d_sigma = 1.0 + 2.0 * (((mu_eff - 1.0) / (n + 1.0)).sqrt() - 1.0).max(0.0) + c_sigma;
        let c_c = (4.0 + mu_eff / n) / (n + 4.0 + 2.0 * mu_eff / n);
        let c_1 = 2.0 / ((n + 1.3).powi(2) + mu_eff);
        let c_mu =
            (2.0 * (mu_eff - 2.0 + 1.0 / mu_eff) / ((n + 2.0).powi(2) + mu_eff)).min(1.0 - c_1);
        let expected_norm = n.sqrt() * (1.0 - 1.0 / (4.0 * n) + 1.0 / (21.0 * n.powi(2)));

        let scale = DVector::from_column_slice(stds);
        Self {
            dim,
            lambda,
            weights,
            mu_eff,
            c_sigma,
            d_sigma,
            c_c,
            c_1,
            c_mu,
            expected_norm,
            mean: DVector::from_column_slice(x0),
            sigma: sigma0,
            sigma0,
            cov: DMatrix::from_diagonal(&scale.map(|s| s * s)),
            basis: DMatrix::identity(dim, dim),
            scale,
            p_sigma: DVector::zeros(dim),
            p_c: DVector::zeros(dim),
            generation: 0,
            degenerate: false,
        }
    }

    pub(super) fn lambda(&self) -> usize {
        self.lambda
    }

    pub(super) fn mu(&self) -> usize {
        self.weights.len()
    }

    pub(super) fn c_sigma(&self) -> f64 {
        self.c_sigma
    }

    pub(super) fn d_sigma(&self) -> f64 {
        self.d_sigma
    }

    /// Draws `lambda` candidates `x = m + σ B (D ⊙ z)` with `z ~ N(0, I)`.
    pub(super) fn sample(&self, rng: &mut impl Rng) -> Vec<DVector<f64>> {
        let transform = &self.basis * DMatrix::from_diagonal(&self.scale);
        (0..self.lambda)
            .map(|_| {
                let z: DVector<f64> =
                    DVector::from_iterator(self.dim, (0..self.dim).map(|_| StandardNormal.sample(&mut *rng)));
                &self.mean + self.sigma * &transform * z
            })
            .collect()
    }

    /// Moves the distribution toward the `mu` best candidates.
    ///
    /// `ranked` lists candidate indices best first.
    pub(super) fn update(&mut self, population: &[DVector<f64>], ranked: &[usize]) {
        let old_mean = self.mean.clone();
        let steps: Vec<DVector<f64>> = ranked
            .iter()
            .take(self.mu())
            .map(|&k| (&population[k] - &old_mean) / self.sigma)
            .collect();

        let mut y_w: DVector<f64> = DVector::zeros(self.dim);
        for (w, y) in self.weights.iter().zip(&steps) {
            y_w += *w * y;
        }
        self.mean = &old_mean + self.sigma * &y_w;

        let inv_sqrt = &self.basis
            * DMatrix::from_diagonal(&self.scale.map(|d| 1.0 / d))
            * self.basis.transpose();
        self.p_sigma = (1.0 - self.c_sigma) * &self.p_sigma
            + (self.c_sigma * (2.0 - self.c_sigma) * self.mu_eff).sqrt() * inv_sqrt * &y_w;

        self.generation += 1;
        #[allow(clippy::cast_precision_loss)]
        let decay = 1.0 - (1.0 - self.c_sigma).powf(2.0 * self.generation as f64);
        let p_sigma_norm = self.p_sigma.norm();
        #[allow(clippy::cast_precision_loss)]
        let stalled = p_sigma_norm / decay.sqrt() / self.expected_norm
            >= 1.4 + 2.0 / (self.dim as f64 + 1.0);
        let h_sigma = if stalled { 0.0 } else { 1.0 };

        self.p_c = (1.0 - self.c_c) * &self.p_c
            + h_sigma * (self.c_c * (2.0 - self.c_c) * self.mu_eff).sqrt() * &y_w;

        let mut rank_mu: DMatrix<f64> = DMatrix::zeros(self.dim, self.dim);
        for (w, y) in self.weights.iter().zip(&steps) {
            rank_mu += *w * y * y.transpose();
        }
        let delta_h = (1.0 - h_sigma) * self.c_c * (2.0 - self.c_c);
        self.cov = (1.0 - self.c_1 - self.c_mu + self.c_1 * delta_h) * &self.cov
            + self.c_1 * &self.p_c * self.p_c.transpose()
            + self.c_mu * rank_mu;
        self.cov = (&self.cov + self.cov.transpose()) * 0.5;

        self.sigma *= ((self.c_sigma / self.d_sigma) * (p_sigma_norm / self.expected_norm - 1.0)).exp();

        self.decompose();
    }

    /// Scales the step size, used to escape flat fitness.
    pub(super) fn inflate_sigma(&mut self, factor: f64) {
        self.sigma *= factor;
    }

    fn decompose(&mut self) {
        if self.cov.iter().any(|c| !c.is_finite()) {
            self.degenerate = true;
            return;
        }
        match SymmetricEigen::try_new(self.cov.clone(), f64::EPSILON, 10_000) {
            Some(eigen) => {
                self.scale = eigen.eigenvalues.map(|v| v.max(f64::MIN_POSITIVE).sqrt());
                self.basis = eigen.eigenvectors;
            }
            None => self.degenerate = true,
        }
    }

    /// Per-dimension standard deviations, `σ sqrt(diag(C))`.
    pub(super) fn stds(&self) -> Vec<f64> {
        self.cov.diagonal().iter().map(|c| self.sigma * c.sqrt()).collect()
    }

    /// Largest and smallest axis lengths of the distribution, `max(D)` and `min(D)`.
    pub(super) fn axis_range(&self) -> (f64, f64) {
        (self.scale.max(), self.scale.min())
    }
}
