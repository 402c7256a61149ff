//! sheetsplit - export every sheet of a spreadsheet to its own CSV file

mod exit_codes;

use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use sheetsplit::{ConvertError, ConvertOptions, NamePolicy, SessionConfig};
use tracing_subscriber::EnvFilter;

use exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser, Debug)]
#[command(name = "sheetsplit")]
#[command(
    author,
    version,
    about = "Export each sheet of a spreadsheet to a CSV file using a running LibreOffice"
)]
struct Cli {
    /// Spreadsheet to split (any format LibreOffice can open)
    input: PathBuf,

    /// Directory for the CSV files (created if missing)
    output_dir: PathBuf,

    /// Name files sheet-1.csv, sheet-2.csv, ... instead of after the sheets
    #[arg(long)]
    ignore_sheet_names: bool,

    /// Pause one second before and after each export
    #[arg(long)]
    slow: bool,

    /// Host the office process listens on
    #[arg(short = 'H', long, default_value = "localhost")]
    host: String,

    /// Port the office process listens on
    #[arg(short = 'P', long, default_value_t = 2002)]
    port: u16,

    /// Seconds to wait for the connection
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    connect_timeout: u64,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            host: self.host.clone(),
            port: self.port,
            connect_timeout: Duration::from_secs(self.connect_timeout),
        }
    }

    fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            naming: if self.ignore_sheet_names {
                NamePolicy::ByIndex
            } else {
                NamePolicy::ByName
            },
            slow: self.slow,
            ..ConvertOptions::default()
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = prepare_paths(&cli.input, &cli.output_dir) {
        eprintln!("error: {e:#}");
        return ExitCode::from(EXIT_USAGE);
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let config = cli.session_config();
    let outcome = runtime.block_on(sheetsplit::convert_file(
        &config,
        &cli.input,
        &cli.output_dir,
        &cli.convert_options(),
    ));

    match outcome {
        Ok(report) => {
            if !cli.quiet {
                for path in report.paths() {
                    println!("{}", path.display());
                }
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            report_error(&e, &config);
            ExitCode::from(exit_codes::for_error(&e))
        }
    }
}

/// Default filter unless `RUST_LOG` is set.
fn log_filter(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn,sheetsplit=info,sheetsplit_urp=warn",
        (false, 1) => "info,sheetsplit=debug,sheetsplit_urp=debug",
        (false, _) => "debug,sheetsplit=trace,sheetsplit_urp=trace",
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(verbose, quiet)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Check the input and make sure the output directory exists.
fn prepare_paths(input: &Path, output_dir: &Path) -> Result<()> {
    if !input.is_file() {
        bail!("input file '{}' does not exist or is not a file", input.display());
    }
    if output_dir.exists() && !output_dir.is_dir() {
        bail!("'{}' is not a directory", output_dir.display());
    }
    std::fs::create_dir_all(output_dir).with_context(|| {
        format!("failed to create output directory '{}'", output_dir.display())
    })?;
    Ok(())
}

fn report_error(err: &ConvertError, config: &SessionConfig) {
    eprintln!("error: {err}");
    let mut cause = err.source();
    while let Some(e) = cause {
        eprintln!("  caused by: {e}");
        cause = e.source();
    }
    if let ConvertError::Connection { .. } = err {
        eprintln!(
            "hint: start LibreOffice with\n  soffice --headless \"--accept=socket,host={},port={};urp;StarOffice.ComponentContext\"",
            config.host, config.port
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetsplit_urp::UrpError;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["sheetsplit", "book.ods", "out"]).unwrap();
        assert_eq!(cli.session_config(), SessionConfig::default());
        let options = cli.convert_options();
        assert_eq!(options.naming, NamePolicy::ByName);
        assert!(!options.slow);
    }

    #[test]
    fn all_flags() {
        let cli = Cli::try_parse_from([
            "sheetsplit",
            "--ignore-sheet-names",
            "--slow",
            "-H",
            "office.local",
            "-P",
            "8100",
            "--connect-timeout",
            "3",
            "-vv",
            "book.ods",
            "out",
        ])
        .unwrap();
        let config = cli.session_config();
        assert_eq!(config.host, "office.local");
        assert_eq!(config.port, 8100);
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        let options = cli.convert_options();
        assert_eq!(options.naming, NamePolicy::ByIndex);
        assert!(options.slow);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn missing_output_dir_is_a_usage_error() {
        assert!(Cli::try_parse_from(["sheetsplit", "book.ods"]).is_err());
        assert!(Cli::try_parse_from(["sheetsplit", "-q", "-v", "a", "b"]).is_err());
    }

    #[test]
    fn log_levels() {
        assert_eq!(log_filter(0, true), "error");
        assert_eq!(log_filter(0, false), "warn,sheetsplit=info,sheetsplit_urp=warn");
        assert!(log_filter(5, false).contains("trace"));
    }

    #[test]
    fn output_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("book.ods");
        std::fs::write(&input, b"x").unwrap();
        let out = dir.path().join("nested").join("out");

        prepare_paths(&input, &out).unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn bad_paths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("book.ods");

        let err = prepare_paths(&input, dir.path()).unwrap_err();
        assert!(err.to_string().contains("does not exist"));

        std::fs::write(&input, b"x").unwrap();
        let err = prepare_paths(&input, &input).unwrap_err();
        assert!(err.to_string().contains("is not a directory"));
    }

    #[test]
    fn exit_codes_follow_the_failed_stage() {
        let err = ConvertError::Connection {
            host: "localhost".into(),
            port: 2002,
            source: UrpError::ConnectionClosed,
        };
        assert_eq!(exit_codes::for_error(&err), exit_codes::EXIT_CONNECTION);

        let err = ConvertError::Export {
            sheet: "Q1".into(),
            target: PathBuf::from("out/Q1.csv"),
            source: UrpError::ConnectionClosed,
        };
        assert_eq!(exit_codes::for_error(&err), exit_codes::EXIT_EXPORT);
    }
}
