use std::path::Path;
use std::fs::File;
use std::io::{BufReader, BufRead, Write};

use crate::*;
use crate::model::LabeledEstimate;

/// Converts a structure into a string
pub trait PrettyFormatter<T> {
    fn format_pretty( &self, object: &T ) -> String;
}

/// Reads whitespace separated `word count` lines into a map from word to count.
/// Blank lines are skipped, repeated words accumulate.
pub fn read_counts( path: &str ) -> Result<WordCounts> {
    let file = File::open( Path::new( path ))?;
    read_counts_from( BufReader::new( file ))
}

/// Reads `word count` lines from any buffered reader
pub fn read_counts_from <R: BufRead> ( reader: R ) -> Result<WordCounts> {
    let mut counts = WordCounts::default();
    for (index, line) in reader.lines().enumerate() {
	let line = line?;
	let parsed = parse_count_line( &line )
	    .map_err( |reason| Error::Parse { line: index + 1, reason } )?;
	if let Some( (word, count) ) = parsed {
	    *counts.entry( word.to_string() ).or_insert( 0.0 ) += count;
	}
    }
    debug!( "Read {} distinct words", counts.len() );
    Ok( counts )
}

/// Parses a single `word count` line. Returns None for blank lines.
pub fn parse_count_line( line: &str ) -> std::result::Result<Option<(&str, Count)>, String> {
    let mut fields = line.split_whitespace();
    let word = match fields.next() {
	Some( word ) => word,
	None => return Ok( None ),
    };
    let count = fields.next().ok_or_else( || format!( "missing count for {word:?}" ))?;
    if let Some( extra ) = fields.next() {
	return Err( format!( "unexpected field {extra:?} after the count" ));
    }
    let count: Count = count.parse().map_err( |_| format!( "count {count:?} is not a number" ))?;
    if !count.is_finite() || count < 0.0 {
	return Err( format!( "count {count} must be finite and non-negative" ));
    }
    Ok( Some( (word, count) ))
}

/// Creates a delimited string from an iterator over words
pub fn produce_word_list <'w, I: Iterator<Item = &'w str>> ( words: I, left_delimiter: &str, separator: &str, right_delimiter: &str ) -> String {
    let mut list = String::new();
    list.push_str( left_delimiter );
    for (index, word) in words.enumerate() {
	if index > 0 {
	    list.push_str( separator );
	}
	list.push_str( word );
    }
    list.push_str( right_delimiter );
    list
}

/// Writes the estimate with its words as JSON to a file
pub fn write_estimate( estimate: &Estimate, vocabulary: &Vocabulary, path: &str ) -> Result<()> {
    if estimate.eta().len() != vocabulary.len() {
	return Err( Error::invalid_input( "vocabulary", format!( "has {} words for {} deviations", vocabulary.len(), estimate.eta().len() )));
    }
    let labeled = LabeledEstimate::new( vocabulary, estimate );
    let json = serde_json::to_string_pretty( &labeled ).map_err( |err| Error::Serialization( err.to_string() ))?;
    let mut file = File::create( Path::new( path ))?;
    writeln!( file, "{json}" )?;
    Ok( () )
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_line() {
	assert_eq!( parse_count_line( "word 12" ), Ok( Some( ("word", 12.0) )));
	assert_eq!( parse_count_line( "  tabbed\t3.5  " ), Ok( Some( ("tabbed", 3.5) )));
	assert_eq!( parse_count_line( "   " ), Ok( None ));
	assert!( parse_count_line( "lonely" ).is_err() );
	assert!( parse_count_line( "word x" ).is_err() );
	assert!( parse_count_line( "word -1" ).is_err() );
	assert!( parse_count_line( "word 1 2" ).is_err() );
    }

    #[test]
    fn test_read_counts() {
	let input = "the 10\ncat 2\n\nthe 5\n";
	let counts = read_counts_from( Cursor::new( input )).unwrap();
	assert_eq!( counts.len(), 2 );
	assert_eq!( counts[ "the" ], 15.0 );
	assert_eq!( counts[ "cat" ], 2.0 );
    }

    #[test]
    /// Errors name the line they occur on
    fn test_read_counts_error_line() {
	let input = "the 10\n\ncat\n";
	match read_counts_from( Cursor::new( input )) {
	    Err( Error::Parse { line, .. } ) => assert_eq!( line, 3 ),
	    other => panic!( "expected a parse error, got {other:?}" ),
	}
    }

    #[test]
    fn test_produce_word_list() {
	let words = vec!( "a", "b", "c" );
	assert_eq!( produce_word_list( words.into_iter(), "(", " ", ")" ), "(a b c)" );
	assert_eq!( produce_word_list( std::iter::empty(), "[", ", ", "]" ), "[]" );
    }

    #[test]
    /// Files round trip through read_counts and the JSON output is readable
    fn test_files() {
	let directory = std::env::temp_dir().join( format!( "sage-io-test-{}", std::process::id() ));
	std::fs::create_dir_all( &directory ).unwrap();
	let counts_path = directory.join( "counts.txt" );
	std::fs::write( &counts_path, "alpha 3\nbeta 1\n" ).unwrap();
	let counts = read_counts( counts_path.to_str().unwrap() ).unwrap();
	assert_eq!( counts[ "alpha" ], 3.0 );

	let vocabulary = Vocabulary::from_top_counts( &counts, 2 );
	let estimate = Estimate::new( vec!( 0.5, 0.0 ), -1.0, -2.0, 3, Status::Converged, 0 );
	let output_path = directory.join( "estimate.json" );
	write_estimate( &estimate, &vocabulary, output_path.to_str().unwrap() ).unwrap();
	let written: serde_json::Value = serde_json::from_str( &std::fs::read_to_string( &output_path ).unwrap() ).unwrap();
	assert_eq!( written[ "words" ][ 0 ], "alpha" );
	assert_eq!( written[ "estimate" ][ "eta" ][ 0 ], 0.5 );

	let short = Vocabulary::new( ["alpha"] ).unwrap();
	assert!( write_estimate( &estimate, &short, output_path.to_str().unwrap() ).is_err() );
	std::fs::remove_dir_all( &directory ).unwrap();

	assert!( matches!( read_counts( counts_path.to_str().unwrap() ), Err( Error::Io( _ ))));
    }
}
