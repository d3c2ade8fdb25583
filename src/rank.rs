
use std::cmp::Ordering;

use crate::*;

/// Returns the words of the k largest deviations, in descending order.
/// Ties keep the vocabulary order. Pass the negated vector to get the most under-represented words.
pub fn top_k<'v>( eta: &[f64], vocabulary: &'v Vocabulary, k: usize ) -> Result<Vec<&'v str>> {
    if eta.len() != vocabulary.len() {
	return Err( Error::invalid_input( "eta", format!( "has {} entries for a vocabulary of {} words", eta.len(), vocabulary.len() )));
    }
    let ranked = top_k_indices( eta, k )?;
    Ok( ranked.iter()
	.filter_map( |(index, _)| vocabulary.get( *index ))
	.collect() )
}

/// Returns the indices and scores of the k largest scores, in descending order with stable ties.
/// NaN ranks below every number.
pub fn top_k_indices( scores: &[f64], k: usize ) -> Result<Vec<(usize, f64)>> {
    if k > scores.len() {
	return Err( Error::invalid_input( "k", format!( "{k} exceeds the vocabulary size {}", scores.len() )));
    }
    let mut ranked: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();
    // stable, so equal scores keep their input order
    ranked.sort_by( |left, right| compare_descending( left.1, right.1 ));
    ranked.truncate( k );
    Ok( ranked )
}

/// Flips the sign of every deviation
pub fn negate( eta: &[f64] ) -> Vec<f64> {
    eta.iter().map( |e| -e ).collect()
}

fn compare_descending( left: f64, right: f64 ) -> Ordering {
    let key = | x: f64 | if x.is_nan() { f64::NEG_INFINITY } else { x };
    key( right ).partial_cmp( &key( left )).unwrap_or( Ordering::Equal )
}

#[cfg(test)]
mod test {
    use super::*;

    fn vocabulary( size: usize ) -> Vocabulary {
	Vocabulary::new( ( 0 .. size ).map( |i| format!( "w{i}" ))).unwrap()
    }

    #[test]
    fn test_top_k_order() {
	let words = Vocabulary::new( ["a", "b", "c", "d"] ).unwrap();
	let eta = vec!( 0.5, -1.0, 2.0, 0.0 );
	assert_eq!( top_k( &eta, &words, 2 ).unwrap(), vec!( "c", "a" ));
	assert_eq!( top_k( &negate( &eta ), &words, 2 ).unwrap(), vec!( "b", "d" ));
	assert_eq!( top_k( &eta, &words, 4 ).unwrap(), vec!( "c", "a", "d", "b" ));
    }

    #[test]
    fn test_top_k_edges() {
	let words = vocabulary( 3 );
	let eta = vec!( 1.0, 2.0, 3.0 );
	assert!( top_k( &eta, &words, 0 ).unwrap().is_empty() );
	let err = top_k( &eta, &words, 4 ).unwrap_err();
	assert_eq!( err.argument(), Some( "k" ));
	let err = top_k( &eta[ .. 2 ], &words, 1 ).unwrap_err();
	assert_eq!( err.argument(), Some( "eta" ));
    }

    #[test]
    /// Ties are broken by vocabulary order, also across signed zeros
    fn test_top_k_ties() {
	let words = vocabulary( 5 );
	let eta = vec!( 0.0, 1.0, 0.0, 1.0, -0.0 );
	assert_eq!( top_k( &eta, &words, 5 ).unwrap(), vec!( "w1", "w3", "w0", "w2", "w4" ));
	assert_eq!( top_k( &negate( &eta ), &words, 3 ).unwrap(), vec!( "w0", "w2", "w4" ));
    }

    #[test]
    fn test_nan_ranks_last() {
	let ranked = top_k_indices( &[f64::NAN, -5.0, 1.0], 3 ).unwrap();
	let indices: Vec<usize> = ranked.iter().map( |(i, _)| *i ).collect();
	assert_eq!( indices, vec!( 2, 1, 0 ));
    }

    #[test]
    /// The top k are a prefix of the full descending sort
    fn test_prefix_of_full_sort() {
	let eta: Vec<f64> = ( 0 .. 50 ).map( |i| ( ( i * 37 ) % 11 ) as f64 - 5.0 ).collect();
	let full = top_k_indices( &eta, eta.len() ).unwrap();
	for window in full.windows( 2 ) {
	    assert!( window[ 0 ].1 >= window[ 1 ].1 );
	    if window[ 0 ].1 == window[ 1 ].1 {
		assert!( window[ 0 ].0 < window[ 1 ].0 );
	    }
	}
	for k in [0, 1, 7, 25, 50] {
	    assert_eq!( top_k_indices( &eta, k ).unwrap(), full[ .. k ].to_vec() );
	}
    }
}
