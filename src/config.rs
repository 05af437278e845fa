// Run configuration: command-line flags with environment fallbacks.
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

pub const INPUT_ENV: &str = "MARKETPLACE_REPORT_INPUT";
pub const OUT_DIR_ENV: &str = "MARKETPLACE_REPORT_OUT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub input: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub top_n: usize,
    pub preview_rows: usize,
    pub batch: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            input: None,
            out_dir: PathBuf::from("."),
            top_n: 10,
            preview_rows: 50,
            batch: false,
        }
    }
}

impl AppConfig {
    /// Build the config from the environment, then let `std::env::args()`
    /// override it.
    pub fn from_env() -> Result<Self> {
        let defaults = AppConfig::default();
        let base = AppConfig {
            input: std::env::var_os(INPUT_ENV).map(PathBuf::from),
            out_dir: std::env::var_os(OUT_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.out_dir.clone()),
            ..defaults
        };
        Self::parse_over(base, std::env::args().skip(1))
    }

    /// Parse flags on top of the defaults.
    ///
    /// Accepted: `[PATH]`, `--input PATH`, `--out-dir DIR`, `--top N`,
    /// `--preview N`, `--batch`.
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        Self::parse_over(AppConfig::default(), args)
    }

    fn parse_over<I>(mut cfg: AppConfig, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut positional = false;
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--input" | "-i" => cfg.input = Some(PathBuf::from(next_value(&mut args, &arg)?)),
                "--out-dir" | "-o" => cfg.out_dir = PathBuf::from(next_value(&mut args, &arg)?),
                "--top" => cfg.top_n = parse_count(&next_value(&mut args, &arg)?, &arg)?,
                "--preview" => cfg.preview_rows = parse_count(&next_value(&mut args, &arg)?, &arg)?,
                "--batch" => cfg.batch = true,
                flag if flag.starts_with('-') => bail!("unknown flag: {flag}"),
                path => {
                    if positional {
                        bail!("only one input file is supported, got extra: {path}");
                    }
                    positional = true;
                    cfg.input = Some(PathBuf::from(path));
                }
            }
        }
        if cfg.batch && cfg.input.is_none() {
            bail!("--batch requires an input file");
        }
        Ok(cfg)
    }
}

fn next_value<I>(args: &mut I, flag: &str) -> Result<String>
where
    I: Iterator<Item = String>,
{
    args.next()
        .with_context(|| format!("missing value for {flag}"))
}

fn parse_count(value: &str, flag: &str) -> Result<usize> {
    value
        .parse::<usize>()
        .with_context(|| format!("{flag} expects a non-negative integer, got {value:?}"))
}
