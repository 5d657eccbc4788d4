use clap::{Parser, ValueEnum};

use consonance_sweep::core::notes::SweepMode;

#[derive(Parser, Debug, Clone)]
#[command(name = "consonance-sweep", author, version, about)]
pub struct Args {
    /// Path to config TOML (written with commented defaults if missing)
    #[arg(long, default_value = "consonance.toml")]
    pub config: String,

    /// Worker threads for the sweep (defaults to available parallelism)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Sweep mode (overrides config)
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Added notes in cents, comma separated (overrides config)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub add: Option<Vec<i32>>,

    /// Upper end of the sweep in cents (overrides config)
    #[arg(long)]
    pub max_x: Option<i32>,

    /// Mirror the sweep below zero (overrides config)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub negative_x: Option<bool>,

    /// Report the snapped position and preview notes for this cursor (cents)
    #[arg(long, allow_hyphen_values = true)]
    pub cursor: Option<f32>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Interval,
    Chord,
    Conchord,
}

impl From<ModeArg> for SweepMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Interval => SweepMode::Interval,
            ModeArg::Chord => SweepMode::Chord,
            ModeArg::Conchord => SweepMode::Conchord,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `x,y` rows
    Csv,
    /// Curve, extrema, snap points and grid as one JSON document
    Json,
    /// Extrema and snap points only
    Summary,
}
