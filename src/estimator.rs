
use rayon::prelude::*;

use crate::*;
use crate::data::check_hyperparameter;
use crate::model::{Model, Surrogate, SparseDeviation, Estimate, Status};
use crate::solver::{QuasiNewton, SolverReport};

/// Default rate of the Laplace prior
pub const DEFAULT_TAU: f64 = 1.0;

#[derive( Debug, Clone, PartialEq )]
/// Settings of the majorize-maximize estimator
pub struct EstimatorOptions {
    /// rate of the Laplace prior, larger values shrink more
    pub tau: f64,
    /// cap on outer (bound, fit) iterations
    pub max_iterations: usize,
    /// relative change of the penalized likelihood at which the outer loop stops
    pub tolerance: f64,
    /// cap on quasi-Newton iterations per fit
    pub max_inner_iterations: usize,
    /// largest gradient entry at which a fit stops
    pub inner_tolerance: f64,
    /// number of curvature pairs of the quasi-Newton solver
    pub memory: usize,
    /// largest change of a single deviation in one solver step
    pub max_step: f64,
}

impl Default for EstimatorOptions {
    fn default() -> Self {
	EstimatorOptions {
	    tau: DEFAULT_TAU,
	    max_iterations: 50,
	    tolerance: 1e-6,
	    max_inner_iterations: 200,
	    inner_tolerance: 1e-7,
	    memory: 10,
	    max_step: 10.0,
	}
    }
}

impl EstimatorOptions {
    pub fn with_tau( mut self, tau: f64 ) -> Self { self.tau = tau; self }
    pub fn with_max_iterations( mut self, max_iterations: usize ) -> Self { self.max_iterations = max_iterations; self }
    pub fn with_tolerance( mut self, tolerance: f64 ) -> Self { self.tolerance = tolerance; self }
    pub fn with_max_inner_iterations( mut self, max_inner_iterations: usize ) -> Self { self.max_inner_iterations = max_inner_iterations; self }
    pub fn with_inner_tolerance( mut self, inner_tolerance: f64 ) -> Self { self.inner_tolerance = inner_tolerance; self }
    pub fn with_memory( mut self, memory: usize ) -> Self { self.memory = memory; self }
    pub fn with_max_step( mut self, max_step: f64 ) -> Self { self.max_step = max_step; self }

    pub fn validate( &self ) -> Result<()> {
	check_hyperparameter( "tau", self.tau )?;
	check_hyperparameter( "tolerance", self.tolerance )?;
	check_hyperparameter( "inner_tolerance", self.inner_tolerance )?;
	check_hyperparameter( "max_step", self.max_step )?;
	if self.max_iterations == 0 {
	    return Err( Error::invalid_input( "max_iterations", "must be at least 1" ));
	}
	if self.max_inner_iterations == 0 {
	    return Err( Error::invalid_input( "max_inner_iterations", "must be at least 1" ));
	}
	if self.memory == 0 {
	    return Err( Error::invalid_input( "memory", "must be at least 1" ));
	}
	Ok( () )
    }
}

/// Estimates sparse deviations by alternating a quadratic bound on the prior (E-step)
/// with a quasi-Newton fit of the bounded objective (M-step).
/// Holds no state between calls.
#[derive( Debug, Clone )]
pub struct Estimator {
    options: EstimatorOptions,
    solver: QuasiNewton,
}

/// Outcome of fitting a model
#[derive( Debug, Clone )]
pub struct Fit {
    pub point: Vec<f64>,
    pub objective: f64,
    pub initial_objective: f64,
    pub iterations: usize,
    pub status: Status,
    pub rejected_steps: usize,
}

impl Estimator {
    pub fn new( options: EstimatorOptions ) -> Result<Estimator> {
	options.validate()?;
	let solver = QuasiNewton::new( options.max_inner_iterations, options.inner_tolerance, options.memory, options.max_step );
	Ok( Estimator { options, solver } )
    }

    pub fn with_tau( tau: f64 ) -> Result<Estimator> {
	Estimator::new( EstimatorOptions::default().with_tau( tau ))
    }

    pub fn options( &self ) -> &EstimatorOptions {
	&self.options
    }

    /// Estimates the deviations of the counts from the baseline log probabilities mu
    pub fn estimate( &self, counts: &[Count], mu: &[f64] ) -> Result<Estimate> {
	let model = SparseDeviation::new( counts, mu, self.options.tau )?;
	let fit = self.fit( &model );
	let estimate = Estimate::new( fit.point, fit.objective, fit.initial_objective, fit.iterations, fit.status, fit.rejected_steps );
	if !estimate.is_converged() {
	    warn!( "Estimate did not converge within {} iterations, returning the best one found", self.options.max_iterations );
	}
	Ok( estimate )
    }

    /// Estimates every target against the same baseline in parallel. Results keep the input order.
    pub fn estimate_batch( &self, targets: &[CountVector], mu: &[f64] ) -> Result<Vec<Estimate>> {
	targets.par_iter()
	    .map( |counts| self.estimate( counts, mu ))
	    .collect()
    }

    /// Maximizes the model's objective from the origin. Returns the best point found.
    pub fn fit <M: Model + Loggable> ( &self, model: &M ) -> Fit {
	let (mut point, initial_objective) = self.initialize( model );
	let mut best_point = point.clone();
	let mut best_objective = initial_objective;
	let mut objective = initial_objective;
	let mut bound = model.initial_bound();
	let mut status = Status::DidNotConverge;
	let mut rejected_steps = 0;
	let mut iterations = 0;

	while iterations < self.options.max_iterations {
	    iterations += 1;
	    let _iteration_span = info_span!( "iteration", number = iterations ).entered();

	    let report = self.step( model, &bound, &mut point );
	    rejected_steps += report.rejected_steps;
	    let next_objective = model.calc_objective( &point );
	    debug!( "Objective changed from {objective:.6} to {next_objective:.6}" );

	    if !next_objective.is_finite() {
		warn!( "Objective became {next_objective}, keeping the best estimate" );
		break;
	    }
	    if next_objective > best_objective {
		best_point.clone_from( &point );
		best_objective = next_objective;
	    }

	    let change = ( next_objective - objective ).abs() / objective.abs().max( 1.0 );
	    objective = next_objective;
	    // the first bound is not anchored at the current point, so its fit cannot confirm convergence
	    if iterations > 1 && change < self.options.tolerance {
		status = Status::Converged;
		break;
	    }
	    bound = model.bound( &point );
	}

	if objective < initial_objective {
	    error!( "Objective decreased from {initial_objective:.6} to {objective:.6}, returning the best estimate" );
	}
	debug_assert!( best_objective >= initial_objective );
	debug!( "Finished after {iterations} iterations with objective {best_objective:.6}" );

	Fit {
	    point: best_point,
	    objective: best_objective,
	    initial_objective,
	    iterations,
	    status,
	    rejected_steps,
	}
    }

    fn initialize <M: Model + Loggable> ( &self, model: &M ) -> (Vec<f64>, f64) {
	let _init_span = info_span!( "initialization" ).entered();
	let point = vec!( 0.0; model.dimension() );
	let objective = model.calc_objective( &point );

	model.log( "initial model", Level::DEBUG );
	debug!( "initial objective {objective:.6}" );

	(point, objective)
    }

    /// Fits the bounded objective, starting from the current point
    fn step <M: Model> ( &self, model: &M, bound: &M::Bound, point: &mut Vec<f64> ) -> SolverReport {
	let surrogate = Surrogate::new( model, bound );
	let report = self.solver.minimize( &surrogate, point );
	if let Some( message ) = describe_instability( &report ) {
	    warn!( "{message}" );
	}
	debug!( "Fit took {} steps, surrogate {:.6}, gradient {:.3e}, converged {}",
		report.iterations, report.value, report.gradient_norm, report.converged );
	report
    }
}

/// Summarizes the line search trouble of one fit, if there was any
fn describe_instability( report: &SolverReport ) -> Option<String> {
    if report.failed_searches > 0 {
	Some( format!( "{} line searches failed after {} rejected steps", report.failed_searches, report.rejected_steps ))
    } else if report.rejected_steps > 0 {
	Some( format!( "{} line search steps rejected in {} solver steps", report.rejected_steps, report.iterations ))
    } else {
	None
    }
}
