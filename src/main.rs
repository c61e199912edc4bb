//! trngd command-line entry point.
//!
//! Parses flags, resolves the configuration, then hands over to
//! [`Daemon`](trngd::Daemon). Every failure is logged and mapped to a
//! distinct exit code.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use trngd::{
    config::{Config, Overrides},
    error::{exit, DaemonError},
    guard::DEFAULT_PID_FILE,
    logging::{self, LogTarget},
    pipe::DEFAULT_SINK_PATH,
    Daemon, DaemonOptions,
};
use tracing::{error, info};

/// Feed a hardware TRNG into the kernel entropy pool.
#[derive(Debug, Parser)]
#[command(name = "trngd", version)]
struct Cli {
    /// Detach and run in the background
    #[arg(short = 'd', long)]
    daemonize: bool,

    /// Bytes moved per cycle
    #[arg(short = 'b', long, value_name = "BYTES")]
    bytes: Option<u32>,

    /// Seconds to sleep between cycles
    #[arg(short = 'i', long, value_name = "SECONDS")]
    interval: Option<u64>,

    /// Config file with DEVICE, BYTES and INTERVAL settings
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Pid file guarding against a second instance
    #[arg(short = 'p', long, value_name = "FILE", default_value = DEFAULT_PID_FILE)]
    pid_file: PathBuf,

    /// Kernel entropy device to feed
    #[arg(long, value_name = "PATH", default_value = DEFAULT_SINK_PATH)]
    sink: PathBuf,

    /// Log to syslog even in the foreground
    #[arg(long)]
    syslog: bool,

    /// Write Prometheus metrics to this file after every cycle
    #[arg(long, value_name = "FILE")]
    metrics_file: Option<PathBuf>,

    /// Print the resolved configuration and exit
    #[arg(long)]
    check_config: bool,

    /// TRNG character device, e.g. /dev/trng0
    device: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { exit::USAGE } else { exit::OK };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    logging::init(if cli.syslog || cli.daemonize {
        LogTarget::Syslog
    } else {
        LogTarget::Stderr
    });

    let overrides = Overrides {
        config_file: cli.config,
        device: cli.device,
        bytes: cli.bytes,
        interval: cli.interval,
    };
    let config = match Config::resolve(&overrides) {
        Ok(config) => config,
        Err(e) => return fail(e.into()),
    };

    if cli.check_config {
        return match toml::to_string_pretty(&config) {
            Ok(text) => {
                print!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "Cannot render configuration");
                ExitCode::from(exit::CONFIG)
            }
        };
    }

    let options = DaemonOptions {
        pid_file: cli.pid_file,
        sink: cli.sink,
        daemonize: cli.daemonize,
        metrics_file: cli.metrics_file,
    };

    match Daemon::new(config, options).run() {
        Ok(summary) => {
            info!(
                cycles = summary.cycles,
                bytes = summary.bytes,
                "trngd: shutting down"
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn fail(e: DaemonError) -> ExitCode {
    error!("{e}");
    ExitCode::from(e.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_short_flags() {
        let cli =
            Cli::try_parse_from(["trngd", "-d", "-b", "32", "-i", "5", "/dev/trng0"]).unwrap();
        assert!(cli.daemonize);
        assert_eq!(cli.bytes, Some(32));
        assert_eq!(cli.interval, Some(5));
        assert_eq!(cli.device, Some(PathBuf::from("/dev/trng0")));
        assert_eq!(cli.pid_file, PathBuf::from(DEFAULT_PID_FILE));
    }

    #[test]
    fn test_malformed_number_is_usage_error() {
        let err = Cli::try_parse_from(["trngd", "-b", "many", "/dev/trng0"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_extra_positional_rejected() {
        assert!(Cli::try_parse_from(["trngd", "/dev/a", "/dev/b"]).is_err());
    }
}
