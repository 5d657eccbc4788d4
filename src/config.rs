use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::core::notes::SweepMode;
use crate::core::roughness_kernel::KernelParams;
use crate::core::snapping::SnapOption;
use crate::core::sweep::SweepRange;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "SweepConfig::default_edo")]
    pub edo: u32,
    #[serde(default = "SweepConfig::default_max_x")]
    pub max_x: i32,
    #[serde(default)]
    pub negative_x: bool,
    #[serde(default = "SweepConfig::default_snapping_distance")]
    pub snapping_distance: f32,
    #[serde(default = "SweepConfig::default_snapping")]
    pub snapping: Vec<SnapOption>,
    #[serde(default = "SweepConfig::default_main_frequency")]
    pub main_frequency: f32,
    #[serde(default = "SweepConfig::default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub mode: SweepMode,
    #[serde(default)]
    pub added_notes: Vec<i32>,
    #[serde(default)]
    pub saved_chords: Vec<Vec<i32>>,
}

impl SweepConfig {
    fn default_edo() -> u32 {
        12
    }
    fn default_max_x() -> i32 {
        1200
    }
    fn default_snapping_distance() -> f32 {
        15.0
    }
    fn default_snapping() -> Vec<SnapOption> {
        vec![SnapOption::Auto]
    }
    fn default_main_frequency() -> f32 {
        261.62
    }
    fn default_volume() -> f32 {
        5.0
    }

    /// Left edge of the visible sweep.
    pub fn min_x(&self) -> i32 {
        if self.negative_x { self.max_x.saturating_neg() } else { 0 }
    }

    /// Visible sweep `[min_x, max_x]`.
    pub fn view(&self) -> SweepRange {
        SweepRange {
            from: self.min_x(),
            to: self.max_x,
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            edo: Self::default_edo(),
            max_x: Self::default_max_x(),
            negative_x: false,
            snapping_distance: Self::default_snapping_distance(),
            snapping: Self::default_snapping(),
            main_frequency: Self::default_main_frequency(),
            volume: Self::default_volume(),
            mode: SweepMode::default(),
            added_notes: Vec::new(),
            saved_chords: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OvertoneConfig {
    #[serde(default = "OvertoneConfig::default_formula_cent")]
    pub formula_cent: String,
    #[serde(default = "OvertoneConfig::default_formula_intensity")]
    pub formula_intensity: String,
    #[serde(default = "OvertoneConfig::default_max_i")]
    pub max_i: u32,
}

impl OvertoneConfig {
    fn default_formula_cent() -> String {
        "log2(i)".to_string()
    }
    fn default_formula_intensity() -> String {
        "1/i".to_string()
    }
    fn default_max_i() -> u32 {
        10
    }
}

impl Default for OvertoneConfig {
    fn default() -> Self {
        Self {
            formula_cent: Self::default_formula_cent(),
            formula_intensity: Self::default_formula_intensity(),
            max_i: Self::default_max_i(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    #[serde(default = "KernelConfig::default_r")]
    pub r: f32,
    #[serde(default = "KernelConfig::default_v")]
    pub v: f32,
    #[serde(default = "KernelConfig::default_t")]
    pub t: f32,
    #[serde(default = "KernelConfig::default_rm")]
    pub rm: f32,
    #[serde(default = "KernelConfig::default_resolution")]
    pub resolution: usize,
}

impl KernelConfig {
    fn default_r() -> f32 {
        KernelParams::default().r
    }
    fn default_v() -> f32 {
        KernelParams::default().v
    }
    fn default_t() -> f32 {
        KernelParams::default().t
    }
    fn default_rm() -> f32 {
        KernelParams::default().rm
    }
    fn default_resolution() -> usize {
        KernelParams::default().resolution
    }

    pub fn params(&self) -> KernelParams {
        KernelParams {
            r: self.r,
            v: self.v,
            t: self.t,
            rm: self.rm,
            resolution: self.resolution,
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        let p = KernelParams::default();
        Self {
            r: p.r,
            v: p.v,
            t: p.t,
            rm: p.rm,
            resolution: p.resolution,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub overtone: OvertoneConfig,
    #[serde(default)]
    pub kernel: KernelConfig,
}

impl AppConfig {
    fn round_f32(x: f32) -> f32 {
        (x * 1_000_000.0).round() / 1_000_000.0
    }

    fn format_f32_compact(x: f32) -> String {
        // shortest representation that round-trips through f32
        let mut s = x.to_string();
        if !s.contains('.') && !s.contains('e') && !s.contains("inf") && !s.contains("NaN") {
            s.push_str(".0");
        }
        s
    }

    fn rounded(mut self) -> Self {
        self.sweep.snapping_distance = Self::round_f32(self.sweep.snapping_distance);
        self.sweep.main_frequency = Self::round_f32(self.sweep.main_frequency);
        self.sweep.volume = Self::round_f32(self.sweep.volume);
        self.kernel.r = Self::round_f32(self.kernel.r);
        self.kernel.v = Self::round_f32(self.kernel.v);
        self.kernel.t = Self::round_f32(self.kernel.t);
        self.kernel.rm = Self::round_f32(self.kernel.rm);
        self
    }

    /// Parse a TOML file; missing fields take their defaults.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Load `path`, or write a fully commented default file there and use defaults.
    pub fn load_or_default(path: &str) -> Self {
        let path_obj = Path::new(path);
        if path_obj.exists() {
            return match Self::load(path) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("{err}. Using defaults.");
                    Self::default()
                }
            };
        }

        let default_cfg = Self::default().rounded();
        match toml::to_string_pretty(&default_cfg) {
            Ok(text) => {
                if let Err(err) = fs::write(path_obj, Self::commented(&text)) {
                    warn!("Failed to write default config to {path}: {err}");
                }
            }
            Err(err) => warn!("Failed to serialize default config ({err}); continuing with defaults"),
        }
        default_cfg
    }

    /// Comment out every key line, keeping section headers; floats written compactly.
    fn commented(text: &str) -> String {
        let mut commented = String::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                commented.push('\n');
            } else if trimmed.starts_with('[') && trimmed.ends_with(']') {
                commented.push_str(line);
                commented.push('\n');
            } else {
                let mut out_line = line.to_string();
                if let Some((lhs, rhs)) = line.split_once('=') {
                    let rhs_trim = rhs.trim();
                    let has_decimal = rhs_trim.contains('.');
                    if has_decimal
                        && !rhs_trim.contains('"')
                        && !rhs_trim.starts_with('[')
                    {
                        if let Ok(val) = rhs_trim.parse::<f32>() {
                            let formatted = Self::format_f32_compact(val);
                            out_line = format!("{} = {}", lhs.trim(), formatted);
                        }
                    }
                }
                commented.push_str("# ");
                commented.push_str(&out_line);
                commented.push('\n');
            }
        }
        commented
    }
}
