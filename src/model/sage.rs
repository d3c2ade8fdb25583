
mod serialize; // serialization and pretty printing of estimates

use statrs::distribution::{Laplace, Continuous};

use crate::*;
use crate::data::{check_counts, check_log_probability, check_hyperparameter};

use super::*;

pub use serialize::{EstimateFormatter, LabeledEstimate};

/// Anchors closer to zero than this are clamped, which caps the bound's precision at tau / ANCHOR_FLOOR
const ANCHOR_FLOOR: f64 = 1e-6;

#[derive( Debug, Clone )]
/// Multinomial word distribution exp( mu + eta ) with a Laplace prior on each deviation eta.
pub struct SparseDeviation<'a> {
    /// observed counts of the target collection
    counts: &'a [Count],
    /// baseline log probabilities
    mu: &'a [f64],
    /// total number of observed tokens
    total: Count,
    /// rate of the Laplace prior
    tau: f64,
    prior: Laplace,
}

#[derive( Debug, Clone, PartialEq )]
/// Precisions w of the quadratic bound tau * |eta| <= w / 2 * eta^2 + const
pub struct Precision( Vec<f64> );

#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Status {
    Converged,
    /// The iteration budget ran out; the estimate is the best one found
    DidNotConverge,
}

#[derive( Debug, Clone, PartialEq )]
/// Result of a single estimation call
pub struct Estimate {
    eta: DeviationVector,
    /// penalized log likelihood of eta
    objective: f64,
    /// penalized log likelihood at eta = 0
    initial_objective: f64,
    iterations: usize,
    status: Status,
    /// line search steps that had to be retried with a shorter step
    rejected_steps: usize,
}

impl<'a> Model for SparseDeviation<'a> {
    type Bound = Precision;

    fn dimension( &self ) -> usize {
	self.counts.len()
    }

    fn initial_bound( &self ) -> Precision {
	// anchored at |eta| = 1, the bound at exactly zero would pin every coordinate there
	Precision( vec!( self.tau; self.dimension() ))
    }

    fn bound( &self, point: &[f64] ) -> Precision {
	Precision( point.iter().map( |eta| self.tau / eta.abs().max( ANCHOR_FLOOR )).collect() )
    }

    fn evaluate_surrogate( &self, bound: &Precision, point: &[f64], gradient: &mut [f64] ) -> f64 {
	let log_rates = self.log_rates( point );
	// the gradient buffer holds probabilities until it is finished below
	let normalizer = softmax_into( &log_rates, gradient );

	let mut value = self.total * normalizer;
	for v in 0 .. point.len() {
	    let (count, eta, precision) = ( self.counts[ v ], point[ v ], bound.0[ v ] );
	    value -= count * log_rates[ v ];
	    value += 0.5 * precision * eta * eta;
	    gradient[ v ] = self.total * gradient[ v ] - count + precision * eta;
	}
	value
    }

    fn surrogate_curvature( &self, bound: &Precision, point: &[f64], diagonal: &mut [f64] ) {
	let log_rates = self.log_rates( point );
	softmax_into( &log_rates, diagonal );
	for (d, precision) in diagonal.iter_mut().zip( &bound.0 ) {
	    *d = self.total * *d * ( 1.0 - *d ) + precision;
	}
    }

    fn calc_objective( &self, point: &[f64] ) -> f64 {
	self.calc_loglik( point ) + self.calc_logprior( point )
    }
}

impl<'a> SparseDeviation<'a> {

    /// Validates the inputs and sets up the model. Fails naming the offending argument.
    pub fn new( counts: &'a [Count], mu: &'a [f64], tau: f64 ) -> Result<SparseDeviation<'a>> {
	let total = check_counts( "counts", counts )?;
	check_log_probability( "mu", mu, counts.len() )?;
	check_hyperparameter( "tau", tau )?;
	let prior = Laplace::new( 0.0, 1.0 / tau )
	    .map_err( |e| Error::invalid_input( "tau", e.to_string() ))?;

	Ok( SparseDeviation { counts, mu, total, tau, prior } )
    }

    /// Multinomial log likelihood of the counts under softmax( mu + eta )
    pub fn calc_loglik( &self, eta: &[f64] ) -> f64 {
	let log_rates = self.log_rates( eta );
	let normalizer = log_sum_exp( &log_rates );
	let explained: f64 = self.counts.iter().zip( &log_rates )
	    .filter( |(count, _)| **count > 0.0 )
	    .map( |(count, rate)| count * rate )
	    .sum();
	explained - self.total * normalizer
    }

    /// Log density of eta under the Laplace prior
    pub fn calc_logprior( &self, eta: &[f64] ) -> f64 {
	eta.iter().map( |e| self.prior.ln_pdf( *e )).sum()
    }

    fn log_rates( &self, eta: &[f64] ) -> Vec<f64> {
	self.mu.iter().zip( eta ).map( |(m, e)| m + e ).collect()
    }
}

impl Precision {
    pub fn get( &self, index: usize ) -> f64 {
	self.0[ index ]
    }
}

impl Estimate {
    pub fn new( eta: DeviationVector, objective: f64, initial_objective: f64, iterations: usize, status: Status, rejected_steps: usize ) -> Estimate {
	Estimate { eta, objective, initial_objective, iterations, status, rejected_steps }
    }

    pub fn eta( &self ) -> &[f64] {
	&self.eta
    }

    pub fn into_eta( self ) -> DeviationVector {
	self.eta
    }

    pub fn objective( &self ) -> f64 {
	self.objective
    }

    pub fn initial_objective( &self ) -> f64 {
	self.initial_objective
    }

    pub fn iterations( &self ) -> usize {
	self.iterations
    }

    pub fn status( &self ) -> Status {
	self.status
    }

    pub fn is_converged( &self ) -> bool {
	self.status == Status::Converged
    }

    pub fn rejected_steps( &self ) -> usize {
	self.rejected_steps
    }

    /// Number of coordinates with |eta| at most the threshold
    pub fn count_near_zero( &self, threshold: f64 ) -> usize {
	self.eta.iter().filter( |e| e.abs() <= threshold ).count()
    }

    /// Normalized log probabilities of the fitted distribution, mu + eta - logsumexp( mu + eta )
    pub fn fitted_log_probability( &self, mu: &[f64] ) -> Result<Vec<f64>> {
	check_log_probability( "mu", mu, self.eta.len() )?;
	let log_rates: Vec<f64> = mu.iter().zip( &self.eta ).map( |(m, e)| m + e ).collect();
	let normalizer = log_sum_exp( &log_rates );
	Ok( log_rates.iter().map( |r| r - normalizer ).collect() )
    }
}

impl Loggable for Estimate {
    fn log( &self, message: &str, level: Level ) {
	let summary = format!( "{message}: {:?} after {} iterations, objective {:.3} (initial {:.3}), {} of {} coordinates near zero, {} rejected steps",
			       self.status, self.iterations, self.objective, self.initial_objective,
			       self.count_near_zero( 1e-3 ), self.eta.len(), self.rejected_steps );
	log_at( level, &summary );
    }
}

impl<'a> Loggable for SparseDeviation<'a> {
    fn log( &self, message: &str, level: Level ) {
	let summary = format!( "{message}: {} words, {} tokens, tau {}", self.dimension(), self.total, self.tau );
	log_at( level, &summary );
    }
}
