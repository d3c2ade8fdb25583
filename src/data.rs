
use std::collections::HashSet;
use rustc_hash::FxHashMap;

use crate::*;

/// Observed frequency of a word; fractional after smoothing
pub type Count = f64;
/// Counts of the target collection, aligned with a vocabulary
pub type CountVector = Vec<Count>;
/// Log probabilities of the baseline distribution, aligned with a vocabulary
pub type BaselineLogProbability = Vec<f64>;
/// Per-word offset of the target's log probabilities from the baseline
pub type DeviationVector = Vec<f64>;
/// Raw counts keyed by word, as read from a count file
pub type WordCounts = FxHashMap<String, Count>;

#[derive( Debug, Clone, PartialEq, Eq )]
/// Ordered set of unique words. The position of a word is its index in every aligned vector.
pub struct Vocabulary {
    words: Vec<String>,
}

impl Vocabulary {

    /// Creates a vocabulary in the given order. Duplicate words are rejected.
    pub fn new <I, S> ( words: I ) -> Result<Vocabulary> where
	I: IntoIterator<Item = S>,
	S: Into<String>,
    {
	let words: Vec<String> = words.into_iter().map( |w| w.into() ).collect();
	let duplicate = {
	    let mut seen: HashSet<&str> = HashSet::with_capacity( words.len() );
	    words.iter().find( |word| !seen.insert( word.as_str() )).cloned()
	};
	if let Some( word ) = duplicate {
	    return Err( Error::invalid_input( "vocabulary", format!( "duplicate word {word:?}" )));
	}
	Ok( Vocabulary { words } )
    }

    /// Selects the `size` most frequent words, ordered by decreasing count.
    /// Ties are broken alphabetically so the selection does not depend on map order.
    pub fn from_top_counts( counts: &WordCounts, size: usize ) -> Vocabulary {
	let mut ranked: Vec<(&String, &Count)> = counts.iter().collect();
	ranked.sort_unstable_by( |left, right| right.1.total_cmp( left.1 ).then_with( || left.0.cmp( right.0 )));
	let words = ranked.into_iter().take( size ).map( |(word, _)| word.clone() ).collect();
	Vocabulary { words }
    }

    pub fn len( &self ) -> usize {
	self.words.len()
    }

    pub fn is_empty( &self ) -> bool {
	self.words.is_empty()
    }

    pub fn words( &self ) -> &[String] {
	&self.words
    }

    pub fn get( &self, index: usize ) -> Option<&str> {
	self.words.get( index ).map( |w| w.as_str() )
    }

    /// Looks up the count of every word, missing words count zero, and adds the smoothing constant
    pub fn align( &self, counts: &WordCounts, smoothing: Count ) -> Result<CountVector> {
	if !smoothing.is_finite() || smoothing < 0.0 {
	    return Err( Error::invalid_input( "smoothing", format!( "must be finite and non-negative, got {smoothing}" )));
	}
	Ok( self.words.iter()
	    .map( |word| counts.get( word ).copied().unwrap_or( 0.0 ) + smoothing )
	    .collect() )
    }

    /// Log probabilities of the smoothed counts, ln( (c + s) / sum( c + s ) ).
    /// The smoothing constant must be positive so no word gets probability zero.
    pub fn baseline_log_probability( &self, counts: &WordCounts, smoothing: Count ) -> Result<BaselineLogProbability> {
	if !( smoothing > 0.0 ) {
	    return Err( Error::invalid_input( "smoothing", format!( "a baseline needs positive smoothing, got {smoothing}" )));
	}
	let smoothed = self.align( counts, smoothing )?;
	check_counts( "counts", &smoothed )?;
	let log_total = smoothed.iter().sum::<f64>().ln();
	Ok( smoothed.iter().map( |c| c.ln() - log_total ).collect() )
    }

    /// Log ratio of the smoothed empirical target distribution to the normalized baseline.
    /// This is the unregularized counterpart of the estimated deviations.
    pub fn empirical_log_odds( &self, counts: &[Count], mu: &[f64], smoothing: Count ) -> Result<Vec<f64>> {
	check_counts( "counts", counts )?;
	if counts.len() != self.len() {
	    return Err( Error::invalid_input( "counts", format!( "expected {} entries, got {}", self.len(), counts.len() )));
	}
	check_log_probability( "mu", mu, counts.len() )?;
	if !( smoothing > 0.0 ) || !smoothing.is_finite() {
	    return Err( Error::invalid_input( "smoothing", format!( "must be positive, got {smoothing}" )));
	}
	let log_total = counts.iter().map( |c| c + smoothing ).sum::<f64>().ln();
	let log_normalizer = model::log_sum_exp( mu );
	Ok( counts.iter().zip( mu )
	    .map( |(c, m)| ( ( c + smoothing ).ln() - log_total ) - ( m - log_normalizer ))
	    .collect() )
    }
}

/// Checks that counts are non-empty, finite and non-negative. Returns their sum.
pub fn check_counts( argument: &'static str, counts: &[Count] ) -> Result<Count> {
    if counts.is_empty() {
	return Err( Error::invalid_input( argument, "must not be empty" ));
    }
    if let Some( (index, value) ) = counts.iter().enumerate().find( |(_, c)| !c.is_finite() || **c < 0.0 ) {
	return Err( Error::invalid_input( argument, format!( "entry {index} is {value}, counts must be finite and non-negative" )));
    }
    Ok( counts.iter().sum() )
}

/// Checks that a log probability vector is finite and has the expected length
pub fn check_log_probability( argument: &'static str, values: &[f64], expected_len: usize ) -> Result<()> {
    if values.len() != expected_len {
	return Err( Error::invalid_input( argument, format!( "expected {expected_len} entries, got {}", values.len() )));
    }
    if let Some( (index, value) ) = values.iter().enumerate().find( |(_, v)| !v.is_finite() ) {
	return Err( Error::invalid_input( argument, format!( "entry {index} is {value}, smooth the baseline counts before taking logs" )));
    }
    Ok( () )
}

/// Checks that a hyperparameter is finite and positive
pub fn check_hyperparameter( argument: &'static str, value: f64 ) -> Result<()> {
    if !( value > 0.0 ) || !value.is_finite() {
	return Err( Error::invalid_input( argument, format!( "must be finite and positive, got {value}" )));
    }
    Ok( () )
}

#[cfg(test)]
mod test {
    use super::*;

    fn word_counts( pairs: &[(&str, Count)] ) -> WordCounts {
	pairs.iter().map( |(w, c)| (w.to_string(), *c) ).collect()
    }

    #[test]
    fn test_duplicate_words() {
	let err = Vocabulary::new( ["a", "b", "a"] ).unwrap_err();
	assert_eq!( err.argument(), Some( "vocabulary" ));
    }

    #[test]
    /// Top words are ordered by count, ties alphabetically
    fn test_top_counts() {
	let counts = word_counts( &[("the", 50.0), ("cat", 3.0), ("dog", 3.0), ("a", 20.0), ("zebra", 1.0)] );
	let vocabulary = Vocabulary::from_top_counts( &counts, 4 );
	assert_eq!( vocabulary.words(), &["the", "a", "cat", "dog"] );

	let everything = Vocabulary::from_top_counts( &counts, 100 );
	assert_eq!( everything.len(), 5 );
	assert_eq!( everything.get( 4 ), Some( "zebra" ));
    }

    #[test]
    fn test_align() {
	let vocabulary = Vocabulary::new( ["x", "y", "z"] ).unwrap();
	let counts = word_counts( &[("x", 4.0), ("z", 1.0), ("other", 9.0)] );
	assert_eq!( vocabulary.align( &counts, 0.0 ).unwrap(), vec!( 4.0, 0.0, 1.0 ));
	assert_eq!( vocabulary.align( &counts, 1.0 ).unwrap(), vec!( 5.0, 1.0, 2.0 ));
	assert!( vocabulary.align( &counts, -1.0 ).is_err() );
    }

    #[test]
    /// Smoothing keeps words missing from the baseline finite
    fn test_baseline() {
	let vocabulary = Vocabulary::new( ["x", "y"] ).unwrap();
	let counts = word_counts( &[("x", 2.0)] );
	let mu = vocabulary.baseline_log_probability( &counts, 1.0 ).unwrap();
	assert_approx!( mu[ 0 ], f64::ln( 0.75 ), 1e-12 );
	assert_approx!( mu[ 1 ], f64::ln( 0.25 ), 1e-12 );

	let err = vocabulary.baseline_log_probability( &counts, 0.0 ).unwrap_err();
	assert_eq!( err.argument(), Some( "smoothing" ));
    }

    #[test]
    fn test_empirical_log_odds() {
	let vocabulary = Vocabulary::new( ["x", "y"] ).unwrap();
	// target 3:1, baseline 1:1 (unnormalized)
	let log_odds = vocabulary.empirical_log_odds( &[2.5, 0.5], &[0.0, 0.0], 0.5 ).unwrap();
	assert_approx!( log_odds[ 0 ], f64::ln( 0.75 / 0.5 ), 1e-12 );
	assert_approx!( log_odds[ 1 ], f64::ln( 0.25 / 0.5 ), 1e-12 );
    }

    #[test]
    fn test_checks() {
	assert_eq!( check_counts( "counts", &[1.0, 2.5] ).unwrap(), 3.5 );
	assert!( check_counts( "counts", &[] ).is_err() );
	assert!( check_counts( "counts", &[1.0, f64::NAN] ).is_err() );
	assert!( check_log_probability( "mu", &[0.0, f64::NEG_INFINITY], 2 ).is_err() );
	assert!( check_log_probability( "mu", &[0.0], 2 ).is_err() );
	assert!( check_hyperparameter( "tau", f64::INFINITY ).is_err() );
	assert!( check_hyperparameter( "tau", -1.0 ).is_err() );
	assert!( check_hyperparameter( "tau", 0.5 ).is_ok() );
    }
}
