
mod sage;

/// A smooth function to be minimized by the quasi-Newton solver
pub trait Objective {
    /// Number of coordinates of a point
    fn dimension( &self ) -> usize;

    /// Returns the value at point and writes the gradient into the buffer
    fn evaluate( &self, point: &[f64], gradient: &mut [f64] ) -> f64;

    /// Writes a positive estimate of the Hessian diagonal at point.
    /// Used to scale the initial inverse curvature of the solver.
    fn diagonal_curvature( &self, _point: &[f64], diagonal: &mut [f64] ) {
	diagonal.fill( 1.0 );
    }
}

/// Models with a non-smooth objective that admits a smooth quadratic bound.
pub trait Model {
    /// Per-coordinate quadratic bound on the non-smooth part of the objective
    type Bound;

    fn dimension( &self ) -> usize;

    /// Bound used before any fit, when no anchor point is meaningful yet
    fn initial_bound( &self ) -> Self::Bound;

    /// Computes the bound touching the objective at the given point (E-step)
    fn bound( &self, point: &[f64] ) -> Self::Bound;

    /// Evaluates the negated surrogate objective and its gradient under the bound
    fn evaluate_surrogate( &self, bound: &Self::Bound, point: &[f64], gradient: &mut [f64] ) -> f64;

    /// Hessian diagonal of the negated surrogate
    fn surrogate_curvature( &self, bound: &Self::Bound, point: &[f64], diagonal: &mut [f64] );

    /// Calculates the exact objective (to be maximized) at the given point
    fn calc_objective( &self, point: &[f64] ) -> f64;
}

/// The smooth surrogate of a model under a fixed bound
pub struct Surrogate<'a, M: Model> {
    model: &'a M,
    bound: &'a M::Bound,
}

impl<'a, M: Model> Surrogate<'a, M> {
    pub fn new( model: &'a M, bound: &'a M::Bound ) -> Surrogate<'a, M> {
	Surrogate { model, bound }
    }
}

impl<'a, M: Model> Objective for Surrogate<'a, M> {
    fn dimension( &self ) -> usize {
	self.model.dimension()
    }

    fn evaluate( &self, point: &[f64], gradient: &mut [f64] ) -> f64 {
	self.model.evaluate_surrogate( self.bound, point, gradient )
    }

    fn diagonal_curvature( &self, point: &[f64], diagonal: &mut [f64] ) {
	self.model.surrogate_curvature( self.bound, point, diagonal );
    }
}

pub use sage::{SparseDeviation, Precision, Estimate, Status, EstimateFormatter, LabeledEstimate};

/// Log of the sum of exponentials, shifted by the maximum to avoid overflow.
/// Returns negative infinity for an empty slice.
pub fn log_sum_exp( values: &[f64] ) -> f64 {
    let max = values.iter().copied().fold( f64::NEG_INFINITY, f64::max );
    if !max.is_finite() {
	return max;
    }
    let sum: f64 = values.iter().map( |v| ( v - max ).exp() ).sum();
    max + sum.ln()
}

/// Writes softmax( values ) into probabilities and returns the log normalizer
pub fn softmax_into( values: &[f64], probabilities: &mut [f64] ) -> f64 {
    let normalizer = log_sum_exp( values );
    for (p, v) in probabilities.iter_mut().zip( values ) {
	*p = ( v - normalizer ).exp();
    }
    normalizer
}
