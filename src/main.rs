
use clap::Parser;
use tracing::*;
use tracing_subscriber::EnvFilter;

use sage::*;
use sage::io::{read_counts, write_estimate, PrettyFormatter};
use sage::model::EstimateFormatter;

/// Finds the words whose frequency in a target collection deviates from a baseline collection
#[derive( Parser, Debug )]
#[command( name = "sage", version, about )]
struct Cli {
    /// `word count` file of the target collection
    #[arg( long )]
    target: String,

    /// `word count` file of the baseline collection
    #[arg( long )]
    baseline: String,

    /// Number of most frequent target words forming the vocabulary
    #[arg( long, default_value_t = 5000 )]
    vocabulary_size: usize,

    /// Rate of the sparsity prior
    #[arg( long, default_value_t = DEFAULT_TAU )]
    tau: f64,

    /// Number of words to print per direction
    #[arg( long, default_value_t = 10 )]
    top: usize,

    /// Pseudo count added to every baseline count
    #[arg( long, default_value_t = 1.0 )]
    smoothing: f64,

    /// Cap on outer iterations
    #[arg( long, default_value_t = 50 )]
    max_iterations: usize,

    /// Writes the estimate as JSON to this file
    #[arg( long )]
    output: Option<String>,
}

fn main() -> std::result::Result<(), String> {
    prepare_logging();
    let cli = Cli::parse();
    run( &cli ).map_err( |err| err.to_string() )
}

fn run( cli: &Cli ) -> sage::Result<()> {
    let target = read_counts( &cli.target )?;
    let baseline = read_counts( &cli.baseline )?;
    info!( "Read {} target and {} baseline words", target.len(), baseline.len() );

    let vocabulary = Vocabulary::from_top_counts( &target, cli.vocabulary_size );
    let counts = vocabulary.align( &target, 0.0 )?;
    let mu = vocabulary.baseline_log_probability( &baseline, cli.smoothing )?;

    let options = EstimatorOptions::default()
	.with_tau( cli.tau )
	.with_max_iterations( cli.max_iterations );
    let estimator = Estimator::new( options )?;
    debug!( "Estimator options {:?}", estimator.options() );
    let estimate = estimator.estimate( &counts, &mu )?;
    estimate.log( "estimate", Level::INFO );

    let mut formatter = EstimateFormatter::new( &vocabulary, cli.top );
    formatter.show_summary();
    formatter.show_over();
    formatter.show_under();
    println!( "{}", formatter.format_pretty( &estimate ));
    info!( "Most over-represented {}", formatter.format_words( &estimate, false ));
    info!( "Most under-represented {}", formatter.format_words( &estimate, true ));

    if let Some( path ) = &cli.output {
	write_estimate( &estimate, &vocabulary, path )?;
	info!( "Wrote estimate to {path}" );
    }
    Ok( () )
}

fn prepare_logging() {
    tracing_subscriber::fmt()
	.with_env_filter( EnvFilter::try_from_default_env().unwrap_or_else( |_| EnvFilter::new( "sage=info" )))
	.with_writer( std::io::stderr )
	.init();
}
