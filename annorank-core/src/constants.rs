/// Rating difference at which the stronger item is expected to win ten times
/// as often as the weaker one. Standard chess Elo scale.
pub const ELO_SCALE: f64 = 400.0;

/// Default Elo step size. Larger values react faster to each comparison and
/// settle less.
pub const DEFAULT_K_FACTOR: f64 = 30.0;

/// Starting Elo rating for every item before any comparison is replayed.
pub const DEFAULT_INITIAL_RATING: f64 = 1000.0;

/// Additive regularization for the Luce spectral fitter.
///
/// Every ordered pair of items receives this much pseudo-transition rate, which
/// keeps the Markov chain irreducible when the comparison graph is sparse or
/// split into components. With 0.0 the stationary distribution is not unique
/// on a disconnected graph and the fit fails.
pub const DEFAULT_REGULARIZATION: f64 = 0.01;

/// Maximum number of spectral iterations before the fit is declared
/// non-convergent.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// L1 distance between successive centered parameter vectors below which the
/// fit is considered converged.
pub const DEFAULT_TOLERANCE: f64 = 1e-8;

/// Name of the pooled annotator whose records are the union of everyone else's.
pub const COMBINED_ANNOTATOR: &str = "Combined";
