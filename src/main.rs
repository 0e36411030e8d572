use clap::{ArgAction, Parser, Subcommand};
use shroud::cli::{extract_bundle, protect_file, run_bundle, show_info, Interpreter, ProtectOptions};
use shroud::config::{Compression, ShroudConfig, TagHash};
use shroud::supervisor::RecoveryOutcome;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

/// Version info from build.rs
const VERSION: &str = env!("SHROUD_VERSION");
const BUILD: &str = env!("SHROUD_BUILD");
const PROFILE: &str = env!("SHROUD_PROFILE");
const GIT_HASH: &str = env!("SHROUD_GIT_HASH");

fn get_version() -> &'static str {
    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();
    VERSION_STRING.get_or_init(|| format!("{} {} build {} ({})", PROFILE, VERSION, BUILD, GIT_HASH))
}

#[derive(Parser)]
#[command(name = "shroud")]
#[command(author, about = "Self-decrypting payload bundles", long_about = None)]
struct Cli {
    /// Print version
    #[arg(short = 'V', long)]
    version: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Protect a payload into a bundle
    #[command(alias = "p")]
    Protect {
        /// Payload file
        input: PathBuf,

        /// Output bundle
        output: PathBuf,

        /// File holding the password
        #[arg(long, required = true)]
        password_file: PathBuf,

        /// JSON config file; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Transform layers per fragment
        #[arg(long)]
        layers: Option<usize>,

        /// Number of partitions
        #[arg(long)]
        partitions: Option<usize>,

        /// Fragment count of the first partition
        #[arg(long)]
        fragments: Option<usize>,

        /// Envelope compression
        #[arg(long, value_parser = parse_compression)]
        compression: Option<Compression>,

        /// Hash for the layer authentication tag
        #[arg(long, value_parser = parse_hash)]
        hash: Option<TagHash>,

        /// Validation endpoint (disabled unless set)
        #[arg(long)]
        validate_url: Option<String>,
    },

    /// Recover a bundle and execute its payload
    #[command(alias = "r")]
    Run {
        /// Bundle to run
        bundle: PathBuf,

        /// Interpreter that receives the payload on stdin (default: print it)
        #[arg(long)]
        interpreter: Option<String>,

        /// Arguments for the interpreter, after `--`
        #[arg(last = true)]
        interpreter_args: Vec<String>,
    },

    /// Recover a bundle's payload into a file
    #[command(alias = "x")]
    Extract {
        /// Input bundle
        bundle: PathBuf,

        /// Output file
        output: PathBuf,
    },

    /// Show information about a bundle
    #[command(alias = "i")]
    Info {
        /// Bundle to inspect
        file: PathBuf,
    },
}

fn parse_hash(s: &str) -> Result<TagHash, String> {
    s.parse().map_err(|e| format!("{}", e))
}

fn parse_compression(s: &str) -> Result<Compression, String> {
    s.parse().map_err(|e| format!("{}", e))
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("shroud {}", get_version());
        return ExitCode::SUCCESS;
    }

    init_logging(cli.verbose);

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            use clap::CommandFactory;
            let _ = Cli::command().print_help();
            println!();
            return ExitCode::SUCCESS;
        }
    };

    let result = match command {
        Commands::Protect {
            input,
            output,
            password_file,
            config,
            layers,
            partitions,
            fragments,
            compression,
            hash,
            validate_url,
        } => {
            let base = match config {
                Some(path) => ShroudConfig::from_file(&path),
                None => Ok(ShroudConfig::default()),
            };

            base.and_then(|mut config| {
                if let Some(layers) = layers {
                    config.layers = layers;
                }
                if let Some(partitions) = partitions {
                    config.partitions = partitions;
                }
                if let Some(fragments) = fragments {
                    config.base_fragments = fragments;
                }
                if let Some(compression) = compression {
                    config.compression = compression;
                }
                if let Some(hash) = hash {
                    config.tag_hash = hash;
                }
                if validate_url.is_some() {
                    config.validation.endpoint = validate_url;
                }

                let options = ProtectOptions {
                    password_file,
                    config,
                };
                protect_file(&input, &output, &options)
            })
            .map(|summary| {
                println!(
                    "Protected {} into {} ({} bytes, fragments {:?})",
                    input.display(),
                    output.display(),
                    summary.bytes_written,
                    summary.fragment_counts
                );
            })
        }

        Commands::Run {
            bundle,
            interpreter,
            interpreter_args,
        } => {
            let interpreter = interpreter.map(|program| Interpreter {
                program,
                args: interpreter_args,
            });
            let report = run_bundle(&bundle, interpreter.as_ref());
            if report.outcome == RecoveryOutcome::Quiet {
                eprintln!("initialization completed");
            }
            // Recovery never reports failure to the caller
            return ExitCode::SUCCESS;
        }

        Commands::Extract { bundle, output } => extract_bundle(&bundle, &output).map(|bytes| {
            println!("Extracted {} bytes to {}", bytes, output.display());
        }),

        Commands::Info { file } => show_info(&file).map(|info| print!("{}", info)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
