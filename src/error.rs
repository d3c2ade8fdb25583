
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive( Error, Debug )]
pub enum Error {
    /// The caller passed arguments violating a precondition
    #[error( "invalid input `{argument}`: {reason}" )]
    InvalidInput { argument: &'static str, reason: String },

    /// A line of a count file could not be read as `word count`
    #[error( "parse error on line {line}: {reason}" )]
    Parse { line: usize, reason: String },

    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "serialization error: {0}" )]
    Serialization( String ),
}

impl Error {
    pub fn invalid_input <R: Into<String>> ( argument: &'static str, reason: R ) -> Error {
	Error::InvalidInput { argument, reason: reason.into() }
    }

    /// Name of the offending argument for input errors
    pub fn argument( &self ) -> Option<&'static str> {
	match self {
	    Error::InvalidInput { argument, .. } => Some( *argument ),
	    _ => None,
	}
    }
}
