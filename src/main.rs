use anyhow::Result;
use std::path::PathBuf;

use shoebox::config::Config;
use shoebox::ingest::Ingestor;
use shoebox::{logging, report};

struct Args {
    config_path: Option<PathBuf>,
    report_path: Option<PathBuf>,
    dry_run: bool,
}

fn parse_args() -> Args {
    let argv: Vec<String> = std::env::args().collect();
    let mut args = Args {
        config_path: None,
        report_path: None,
        dry_run: false,
    };

    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("shoebox {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < argv.len() {
                    args.config_path = Some(PathBuf::from(&argv[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--report" | "-r" => {
                if i + 1 < argv.len() {
                    args.report_path = Some(PathBuf::from(&argv[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --report requires a path argument");
                    std::process::exit(1);
                }
            }
            "--dry-run" | "-n" => {
                args.dry_run = true;
            }
            _ => {
                eprintln!("Unknown argument: {}", argv[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    args
}

fn print_help() {
    println!(
        r#"shoebox - deduplicating photo archive ingestion

USAGE:
    shoebox [OPTIONS]

OPTIONS:
    --config, -c PATH   Path to config file
    --report, -r PATH   Write a JSON run report to PATH
    --dry-run, -n       Show what would be archived without writing anything
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    SHOEBOX_LOG         Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/shoebox/config.toml"#
    );
}

fn main() -> Result<()> {
    let args = parse_args();

    // Initialize logging (uses journald on Linux, file fallback otherwise)
    let _ = logging::init(Some(Config::config_dir().join("logs")));

    // Load configuration
    let config = match args.config_path {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let ingestor = Ingestor::new(config.ingest, config.convert);
    let run_report = if args.dry_run {
        ingestor.preview()?
    } else {
        ingestor.run()?
    };

    if let Some(ref path) = args.report_path {
        report::write_report(&run_report, path)?;
    }

    println!(
        "{}: {} processed, {} skipped, {} failed",
        if args.dry_run { "Dry run" } else { "Done" },
        run_report.processed.len(),
        run_report.skipped.len(),
        run_report.failed.len()
    );
    for (path, error) in &run_report.failed {
        eprintln!("  failed: {}: {}", path.display(), error);
    }

    if run_report.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}
