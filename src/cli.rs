use clap::{ArgAction, Parser};
use decant_compress::{Compression, Options};
use decant_config::Config;
use std::path::PathBuf;
use std::time::Duration;

/// Decompress gzip, bzip2 and xz transparently; anything else passes through untouched.
#[derive(Debug, Parser)]
#[command(name = "decant", version, about)]
pub struct Cli {
    /// Disable gzip decompression and pass through raw input.
    #[arg(short = 'G', long)]
    pub disable_gzip: bool,
    /// Disable bzip2 decompression and pass through raw input.
    #[arg(short = 'B', long)]
    pub disable_bzip2: bool,
    /// Disable xz decompression and pass through raw input.
    #[arg(short = 'X', long)]
    pub disable_xz: bool,
    /// Only use in-process decoders; never start an external decompressor.
    #[arg(short = 'n', long)]
    pub force_native: bool,
    /// Write the decompressed data to standard output instead of a file. This implies --keep.
    #[arg(short = 'c', long = "stdout")]
    pub to_stdout: bool,
    /// Don't delete the input files.
    #[arg(short, long)]
    pub keep: bool,
    /// No effect; accepted so that decant works with `tar -I`.
    #[arg(short, long)]
    pub decompress: bool,
    /// Configuration file (TOML, YAML or JSON) to use instead of the per-user one.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Seconds to wait for an external decompressor to stop when input is abandoned.
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    /// Files to decompress. With none, or `-`, standard input is filtered to standard output.
    pub files: Vec<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    Stdin,
    File(PathBuf),
}

impl Cli {
    /// Configured options with the command-line flags applied on top.
    pub fn options(&self, config: &Config) -> Options {
        let mut options = Options::from(config);
        for (disabled, format) in [
            (self.disable_gzip, Compression::Gzip),
            (self.disable_bzip2, Compression::Bzip2),
            (self.disable_xz, Compression::Xz),
        ] {
            if disabled {
                options = options.disable(format);
            }
        }
        if self.force_native {
            options = options.force_native(true);
        }
        if let Some(secs) = self.timeout {
            options = options.with_termination_timeout(Duration::from_secs(secs));
        }
        options
    }

    pub fn keep(&self) -> bool {
        self.keep || self.to_stdout
    }

    pub fn inputs(&self) -> Vec<Input> {
        if self.files.is_empty() {
            return vec![Input::Stdin];
        }
        self.files
            .iter()
            .map(|file| if file.as_os_str() == "-" { Input::Stdin } else { Input::File(file.clone()) })
            .collect()
    }

    /// `warn` by default, each `-v` one level noisier.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
