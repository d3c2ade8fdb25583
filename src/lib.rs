
// float comparisons for the unit tests of every module
#[cfg(test)]
macro_rules! assert_approx {
    ($real:expr, $expected:expr, $delta:expr) => {
	if !( $real >= $expected - $delta && $real <= $expected + $delta ) {
	    panic!( "Violate {:.6e} == {:.6e} (+-{:.1e})", $real, $expected, $delta );
	}
    }
}

pub mod data;
pub mod error;
pub mod estimator;
pub mod io;
pub mod model;
pub mod rank;
pub mod solver;

use tracing::*;

pub use data::{Count, CountVector, BaselineLogProbability, DeviationVector, WordCounts, Vocabulary};
pub use error::{Error, Result};
pub use estimator::{Estimator, EstimatorOptions, DEFAULT_TAU};
pub use model::{Estimate, Status};
pub use rank::{top_k, negate};

/// Objects that can be recorded in the log
pub trait Loggable {
    fn log( &self, message: &str, level: tracing::Level );
}

/// Estimates the sparse deviation of the counts from the baseline log probabilities mu.
/// Uses the default options with the given prior rate; see `Estimator` for diagnostics.
pub fn estimate( counts: &[Count], mu: &[f64], tau: f64 ) -> Result<DeviationVector> {
    let estimator = Estimator::with_tau( tau )?;
    Ok( estimator.estimate( counts, mu )?.into_eta() )
}

/// Emits the message as an event of the given level
pub(crate) fn log_at( level: Level, message: &str ) {
    if level == Level::ERROR {
	error!( "{message}" );
    } else if level == Level::WARN {
	warn!( "{message}" );
    } else if level == Level::INFO {
	info!( "{message}" );
    } else if level == Level::DEBUG {
	debug!( "{message}" );
    } else {
	trace!( "{message}" );
    }
}
