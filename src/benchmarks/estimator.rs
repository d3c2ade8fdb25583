use tracing::{info, debug};

use rand::prelude::*;
use rand::distributions::WeightedIndex;

use std::time::*;

use sage::*;

fn main() -> std::result::Result<(), String> {
    prepare_logging();

    let tokens = 100_000;
    let mut generator = StdRng::seed_from_u64( 7 );

    for size in [1_000, 5_000, 20_000] {
	benchmark_estimate( size, tokens, &mut generator ).map_err( |err| err.to_string() )?;
    }
    benchmark_batch( 5_000, tokens, 8, &mut generator ).map_err( |err| err.to_string() )?;

    Ok( () )
}

/// Estimates one synthetic collection whose distribution deviates from the baseline in a few words
fn benchmark_estimate( size: usize, tokens: usize, generator: &mut StdRng ) -> Result<()> {
    let mu = zipf_log_probability( size );
    let target = perturb( &mu, generator );
    let counts = sample_counts( &target, tokens, generator )?;

    info!( "Start benchmark: {size} words, {tokens} tokens" );
    let estimator = Estimator::with_tau( DEFAULT_TAU )?;
    let start = Instant::now();
    let estimate = estimator.estimate( &counts, &mu )?;
    let time_spent = Instant::now().duration_since( start );

    info!( "Result: {:?} after {} iterations in {}ms, {} of {size} near zero",
	   estimate.status(), estimate.iterations(), time_spent.as_millis(), estimate.count_near_zero( 1e-3 ));
    Ok( () )
}

/// Estimates several collections against one baseline in parallel
fn benchmark_batch( size: usize, tokens: usize, number_targets: usize, generator: &mut StdRng ) -> Result<()> {
    let mu = zipf_log_probability( size );
    let mut targets = Vec::with_capacity( number_targets );
    for _ in 0 .. number_targets {
	let target = perturb( &mu, generator );
	targets.push( sample_counts( &target, tokens, generator )? );
    }

    info!( "Start benchmark: batch of {number_targets} with {size} words" );
    let estimator = Estimator::with_tau( DEFAULT_TAU )?;
    let start = Instant::now();
    let estimates = estimator.estimate_batch( &targets, &mu )?;
    let time_spent = Instant::now().duration_since( start );
    let converged = estimates.iter().filter( |e| e.is_converged() ).count();
    info!( "Result: {converged} of {number_targets} converged in {}ms", time_spent.as_millis() );
    Ok( () )
}

/// Log probabilities proportional to 1 / rank
fn zipf_log_probability( size: usize ) -> Vec<f64> {
    let weights: Vec<f64> = ( 1 ..= size ).map( |rank| -( rank as f64 ).ln() ).collect();
    let normalizer = model::log_sum_exp( &weights );
    weights.iter().map( |w| w - normalizer ).collect()
}

/// Shifts the log probability of a few random words
fn perturb( mu: &[f64], generator: &mut StdRng ) -> Vec<f64> {
    let mut target = mu.to_vec();
    for (index, log_probability) in target.iter_mut().enumerate() {
	// on average one word in fifty deviates
	if generator.gen_bool( 0.02 ) {
	    let shift = if generator.gen_bool( 0.5 ) { 1.0 } else { -1.0 };
	    *log_probability += shift;
	    debug!( "word {index} shifted by {shift}" );
	}
    }
    target
}

/// Draws a multinomial sample of the given number of tokens
fn sample_counts( log_probability: &[f64], tokens: usize, generator: &mut StdRng ) -> Result<Vec<f64>> {
    let weights: Vec<f64> = log_probability.iter().map( |l| l.exp() ).collect();
    let distribution = WeightedIndex::new( &weights )
	.map_err( |err| Error::invalid_input( "log_probability", err.to_string() ))?;
    let mut counts = vec!( 0.0; weights.len() );
    for _ in 0 .. tokens {
	counts[ distribution.sample( generator ) ] += 1.0;
    }
    Ok( counts )
}

fn prepare_logging() {
    tracing_subscriber::fmt::fmt()
	.with_max_level( tracing_subscriber::filter::LevelFilter::INFO )
	.init();
}
