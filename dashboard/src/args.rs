use clap::{Parser, ValueEnum};
use fieldcore::processing::TargetRect;
use fieldcore::ProducerMode;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless FieldScan dashboard")]
pub struct Args {
    /// Load client settings from YAML
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Rover base URL, overriding the config file
    #[arg(long)]
    pub endpoint: Option<String>,
    #[arg(long, value_enum, default_value_t = ModeArg::Remote)]
    pub mode: ModeArg,
    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(long)]
    pub duration: Option<u64>,
    /// Surface the overlay is projected onto, e.g. 1280x720
    #[arg(long, value_parser = parse_target, default_value = "1280x720")]
    pub target: TargetRect,
    #[arg(long, default_value_t = false)]
    pub start_scan: bool,
    /// Simulate a declined camera permission prompt
    #[arg(long, default_value_t = false)]
    pub deny_camera: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Remote,
    Local,
}

impl From<ModeArg> for ProducerMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Remote => ProducerMode::Remote,
            ModeArg::Local => ProducerMode::Local,
        }
    }
}

pub fn parse_target(value: &str) -> Result<TargetRect, String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value:?}"))?;
    let width: f32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width {width:?}"))?;
    let height: f32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height {height:?}"))?;
    if width <= 0.0 || height <= 0.0 {
        return Err(format!("target must be positive, got {value:?}"));
    }
    Ok(TargetRect::new(width, height))
}
