use clap::Parser;
use std::path::PathBuf;

use crate::inspect::DEFAULT_MAX_MEMBER_SIZE;

#[derive(Parser, Debug)]
#[command(name = "apkarch")]
#[command(version)]
#[command(about = "Report the architecture of native libraries inside APK packages", long_about = None)]
#[command(after_help = "Examples:\n  \
  apkarch app.apk                      list native libraries in app.apk\n  \
  apkarch -d ./apks -j 4               scan every package in ./apks, four at a time\n  \
  apkarch https://example.com/app.apk  inspect a remote package via Range requests")]
pub struct Cli {
    /// Package paths or HTTP URLs
    #[arg(value_name = "FILES", required_unless_present = "dir")]
    pub files: Vec<String>,

    /// Inspect every file in a directory (not recursive)
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Number of packages inspected concurrently
    #[arg(short = 'j', long = "jobs", value_name = "N", default_value_t = 1)]
    pub jobs: usize,

    /// Skip members declaring more than this many bytes
    #[arg(long = "max-member-size", value_name = "BYTES", default_value_t = DEFAULT_MAX_MEMBER_SIZE)]
    pub max_member_size: u64,

    /// More log output (-vv for trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (q, _) if q > 1 => "off",
            (1, _) => "error",
            (0, 0) => "warn",
            (0, 1) => "debug",
            _ => "trace",
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }
}
