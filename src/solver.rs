
use std::collections::VecDeque;

use crate::*;
use crate::model::Objective;

/// Sufficient decrease constant of the Armijo condition
const ARMIJO: f64 = 1e-4;
/// Largest number of halvings of a step before a line search gives up
const MAX_BACKTRACKS: usize = 40;
/// Decreases below this multiple of the objective's magnitude are lost in rounding
const RESOLUTION: f64 = 16.0 * f64::EPSILON;

/// Limited-memory BFGS with a diagonal initial inverse Hessian and backtracking line search
#[derive( Debug, Clone )]
pub struct QuasiNewton {
    max_iterations: usize,
    /// largest absolute gradient entry at which the solve counts as converged
    tolerance: f64,
    /// number of curvature pairs kept
    memory: usize,
    /// largest change of a single coordinate in one step
    max_step: f64,
}

#[derive( Debug, Clone, PartialEq )]
pub struct SolverReport {
    pub iterations: usize,
    pub converged: bool,
    /// line search trials that failed the sufficient decrease test
    pub rejected_steps: usize,
    /// line searches that gave up entirely
    pub failed_searches: usize,
    pub value: f64,
    pub gradient_norm: f64,
}

/// Curvature pair s = x' - x, y = g' - g with rho = 1 / s.y
struct CurvaturePair {
    s: Vec<f64>,
    y: Vec<f64>,
    rho: f64,
}

struct Trial {
    point: Vec<f64>,
    value: f64,
    gradient: Vec<f64>,
}

impl QuasiNewton {
    pub fn new( max_iterations: usize, tolerance: f64, memory: usize, max_step: f64 ) -> QuasiNewton {
	QuasiNewton { max_iterations, tolerance, memory, max_step }
    }

    /// Minimizes the objective starting from point, which holds the best point found on return.
    /// A line search that cannot decrease the objective leaves the point where it is.
    pub fn minimize <O: Objective> ( &self, objective: &O, point: &mut Vec<f64> ) -> SolverReport {
	let n = objective.dimension();
	debug_assert_eq!( n, point.len() );

	let mut gradient = vec!( 0.0; n );
	let mut value = objective.evaluate( point, &mut gradient );
	let mut report = SolverReport {
	    iterations: 0,
	    converged: false,
	    rejected_steps: 0,
	    failed_searches: 0,
	    value,
	    gradient_norm: max_norm( &gradient ),
	};
	if !value.is_finite() {
	    warn!( "Objective is not finite at the starting point" );
	    return report;
	}

	let mut history: VecDeque<CurvaturePair> = VecDeque::with_capacity( self.memory );
	let mut diagonal = vec!( 0.0; n );

	while report.iterations < self.max_iterations {
	    report.gradient_norm = max_norm( &gradient );
	    if report.gradient_norm <= self.tolerance {
		report.converged = true;
		break;
	    }
	    report.iterations += 1;

	    objective.diagonal_curvature( point, &mut diagonal );
	    let mut direction = two_loop( &gradient, &history, &diagonal );
	    let mut slope = dot( &direction, &gradient );
	    if !( slope < 0.0 ) {
		// stale curvature, fall back to the preconditioned gradient
		trace!( "Direction is not a descent direction (slope {slope:e}), resetting memory" );
		history.clear();
		direction = two_loop( &gradient, &history, &diagonal );
		slope = dot( &direction, &gradient );
	    }
	    if -slope <= RESOLUTION * value.abs().max( 1.0 ) {
		// no decrease is measurable any more
		report.converged = true;
		break;
	    }

	    let longest = max_norm( &direction );
	    if longest > self.max_step {
		let scale = self.max_step / longest;
		direction.iter_mut().for_each( |d| *d *= scale );
		slope *= scale;
	    }

	    match self.line_search( objective, point, value, slope, &direction, &mut report ) {
		Some( trial ) => {
		    let s: Vec<f64> = trial.point.iter().zip( point.iter() ).map( |(new, old)| new - old ).collect();
		    let y: Vec<f64> = trial.gradient.iter().zip( &gradient ).map( |(new, old)| new - old ).collect();
		    let curvature = dot( &s, &y );
		    if curvature > f64::EPSILON * dot( &y, &y ).sqrt() * dot( &s, &s ).sqrt() {
			if history.len() == self.memory {
			    history.pop_front();
			}
			history.push_back( CurvaturePair { s, y, rho: 1.0 / curvature } );
		    }
		    trace!( "Step {} decreased {:.6e} to {:.6e}", report.iterations, value, trial.value );
		    *point = trial.point;
		    value = trial.value;
		    gradient = trial.gradient;
		},
		None => {
		    report.failed_searches += 1;
		    if history.is_empty() {
			warn!( "Line search failed along the preconditioned gradient, keeping the current point" );
			break;
		    }
		    warn!( "Line search failed, discarding curvature memory and retrying" );
		    history.clear();
		},
	    }
	}

	report.value = value;
	report.gradient_norm = max_norm( &gradient );
	if !report.converged && report.gradient_norm <= self.tolerance {
	    report.converged = true;
	}
	report
    }

    /// Backtracks from the full step until the Armijo condition holds
    fn line_search <O: Objective> ( &self, objective: &O, point: &[f64], value: f64, slope: f64, direction: &[f64], report: &mut SolverReport ) -> Option<Trial> {
	let mut step = 1.0;
	let mut gradient = vec!( 0.0; point.len() );
	for _ in 0 .. MAX_BACKTRACKS {
	    let candidate: Vec<f64> = point.iter().zip( direction ).map( |(x, d)| x + step * d ).collect();
	    let candidate_value = objective.evaluate( &candidate, &mut gradient );
	    if candidate_value.is_finite() && candidate_value <= value + ARMIJO * step * slope {
		return Some( Trial { point: candidate, value: candidate_value, gradient } );
	    }
	    report.rejected_steps += 1;
	    trace!( "Rejected step {step:e}: {candidate_value:.6e} over {value:.6e}" );
	    step *= 0.5;
	}
	None
    }
}

/// Computes the quasi-Newton direction -H g with the diagonal initial inverse Hessian 1 / curvature
fn two_loop( gradient: &[f64], history: &VecDeque<CurvaturePair>, curvature: &[f64] ) -> Vec<f64> {
    let mut q = gradient.to_vec();
    let mut alphas = Vec::with_capacity( history.len() );
    for pair in history.iter().rev() {
	let alpha = pair.rho * dot( &pair.s, &q );
	axpy( -alpha, &pair.y, &mut q );
	alphas.push( alpha );
    }
    for (r, c) in q.iter_mut().zip( curvature ) {
	*r /= c.max( f64::MIN_POSITIVE );
    }
    for (pair, alpha) in history.iter().zip( alphas.iter().rev() ) {
	let beta = pair.rho * dot( &pair.y, &q );
	axpy( alpha - beta, &pair.s, &mut q );
    }
    q.iter_mut().for_each( |r| *r = -*r );
    q
}

fn dot( left: &[f64], right: &[f64] ) -> f64 {
    left.iter().zip( right ).map( |(l, r)| l * r ).sum()
}

/// target += scale * source
fn axpy( scale: f64, source: &[f64], target: &mut [f64] ) {
    for (t, s) in target.iter_mut().zip( source ) {
	*t += scale * s;
    }
}

fn max_norm( values: &[f64] ) -> f64 {
    values.iter().fold( 0.0, |acc, v| acc.max( v.abs() ))
}
