mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "zchuyot",
    version,
    about = "Building-rights table extraction for Hebrew statutory plan PDFs"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the building-rights tables of one plan PDF
    Extract {
        /// Path to the plan PDF
        input_file: PathBuf,

        /// Plan number (default: the file name without extension)
        #[arg(short, long)]
        plan: Option<String>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Write the outcomes to a JSON file
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,

        /// JSON file overriding extraction settings
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Custom header vocabulary (default: the built-in Mavat vocabulary)
        #[arg(long, value_name = "FILE")]
        vocabulary: Option<PathBuf>,
    },
    /// Extract several plan PDFs in parallel and print a summary
    Batch {
        /// Paths to plan PDFs (plan numbers are taken from the file names),
        /// or plan numbers when --cache-dir is given
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Fetch each plan's PDF from this directory (`<plan>.pdf`) and
        /// record its extraction state
        #[arg(long, value_name = "DIR")]
        cache_dir: Option<PathBuf>,

        /// Write all outcomes to a JSON file
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,

        /// JSON file overriding extraction settings
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Custom header vocabulary
        #[arg(long, value_name = "FILE")]
        vocabulary: Option<PathBuf>,
    },
    /// Inspect and validate header vocabularies
    Vocab {
        #[command(subcommand)]
        action: VocabAction,
    },
}

#[derive(Subcommand)]
enum VocabAction {
    /// List predefined vocabularies
    List,
    /// Print the header variants of a predefined vocabulary
    Show {
        /// Preset name (e.g., "mavat")
        preset: String,
    },
    /// Validate a custom vocabulary file
    Validate {
        /// Path to JSON vocabulary file
        file: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Extract {
            input_file,
            plan,
            output,
            out,
            config,
            vocabulary,
        } => commands::extract::run(input_file, plan, &output, out, config, vocabulary),
        Commands::Batch {
            inputs,
            cache_dir: Some(dir),
            out,
            config,
            vocabulary,
        } => commands::batch::run_cached(inputs, dir, out, config, vocabulary),
        Commands::Batch {
            inputs,
            cache_dir: None,
            out,
            config,
            vocabulary,
        } => commands::batch::run(
            inputs.into_iter().map(PathBuf::from).collect(),
            out,
            config,
            vocabulary,
        ),
        Commands::Vocab { action } => match action {
            VocabAction::List => commands::vocab::list(),
            VocabAction::Show { preset } => commands::vocab::show(&preset),
            VocabAction::Validate { file } => commands::vocab::validate(&file),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
