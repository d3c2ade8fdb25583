
use serde::ser::SerializeStruct;

use crate::*;
use crate::io::{PrettyFormatter, produce_word_list};
use crate::rank::{top_k_indices, negate};

use super::{Estimate, Status};

/// Prints the most over- and under-represented words of an estimate
pub struct EstimateFormatter<'v> {
    vocabulary: &'v Vocabulary,
    k: usize,
    show_over: bool,
    show_under: bool,
    show_summary: bool,
}

/// An estimate together with the words its coordinates belong to
pub struct LabeledEstimate<'a> {
    vocabulary: &'a Vocabulary,
    estimate: &'a Estimate,
}

impl<'v> PrettyFormatter<Estimate> for EstimateFormatter<'v> {

    fn format_pretty( &self, estimate: &Estimate ) -> String {
	let mut output = String::new();
	output.push( '\n' ); // so output begins on a new line

	if self.show_summary {
	    let near_zero = estimate.count_near_zero( 1e-3 );
	    output = join_lines( output, format!( "{:?} after {} iterations, {} of {} deviations near zero",
						  estimate.status(), estimate.iterations(), near_zero, estimate.eta().len() ));
	}

	// a mismatched vocabulary or k beyond its size prints nothing instead of failing
	let k = self.k.min( self.vocabulary.len() );
	if self.show_over {
	    output = join_lines( output, String::from( "over-represented:" ));
	    if let Ok( ranked ) = top_k_indices( estimate.eta(), k ) {
		output = self.format_ranking( output, &ranked, 1.0 );
	    }
	}
	if self.show_under {
	    output = join_lines( output, String::from( "under-represented:" ));
	    if let Ok( ranked ) = top_k_indices( &negate( estimate.eta() ), k ) {
		output = self.format_ranking( output, &ranked, -1.0 );
	    }
	}
	output
    }
}

impl<'v> EstimateFormatter<'v> {
    pub fn new( vocabulary: &'v Vocabulary, k: usize ) -> EstimateFormatter<'v> {
	EstimateFormatter {
	    vocabulary,
	    k,
	    show_over: false,
	    show_under: false,
	    show_summary: false,
	}
    }

    pub fn show_over( &mut self ) { self.show_over = true; }
    pub fn show_under( &mut self ) { self.show_under = true; }
    pub fn show_summary( &mut self ) { self.show_summary = true; }

    /// Formats the top words of a single direction, restoring the sign of negated scores
    pub fn format_words( &self, estimate: &Estimate, under: bool ) -> String {
	let scores = if under { negate( estimate.eta() ) } else { estimate.eta().to_vec() };
	let k = self.k.min( self.vocabulary.len() );
	let ranked = top_k_indices( &scores, k ).unwrap_or_default();
	let words = ranked.iter().filter_map( |(index, _)| self.vocabulary.get( *index ));
	produce_word_list( words, "[", ", ", "]" )
    }

    fn format_ranking( &self, output: String, ranked: &[(usize, f64)], sign: f64 ) -> String {
	ranked.iter()
	    .filter_map( |(index, score)| self.vocabulary.get( *index ).map( |word| format_word( word, sign * score )))
	    .fold( output, join_lines )
    }
}

impl<'a> LabeledEstimate<'a> {
    pub fn new( vocabulary: &'a Vocabulary, estimate: &'a Estimate ) -> LabeledEstimate<'a> {
	LabeledEstimate { vocabulary, estimate }
    }
}

impl serde::Serialize for Estimate {
    fn serialize<S>( &self, serializer: S ) -> std::result::Result<S::Ok, S::Error> where S: serde::Serializer {
	let mut state = serializer.serialize_struct( "Estimate", 6 )?;
	state.serialize_field( "eta", &self.eta )?;
	state.serialize_field( "objective", &self.objective )?;
	state.serialize_field( "initial_objective", &self.initial_objective )?;
	state.serialize_field( "iterations", &self.iterations )?;
	state.serialize_field( "converged", &( self.status == Status::Converged ))?;
	state.serialize_field( "rejected_steps", &self.rejected_steps )?;
	state.end()
    }
}

impl<'a> serde::Serialize for LabeledEstimate<'a> {
    fn serialize<S>( &self, serializer: S ) -> std::result::Result<S::Ok, S::Error> where S: serde::Serializer {
	let mut state = serializer.serialize_struct( "LabeledEstimate", 2 )?;
	state.serialize_field( "words", self.vocabulary.words() )?;
	state.serialize_field( "estimate", self.estimate )?;
	state.end()
    }
}

fn format_word( word: &str, deviation: f64 ) -> String {
    format!( "{word:>20}  {deviation:+.3}" )
}

fn join_lines( mut accumulator: String, addition: String ) -> String {
    accumulator.push_str( addition.as_str() );
    accumulator.push( '\n' );
    accumulator
}
