use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, StatsError};
use crate::models::{AgeBuckets, AgeRange, PriceBands};

/// Address value the data generator writes for users living outside China.
pub const DEFAULT_PLACEHOLDER_ADDRESS: &str = "Non-Chinese Address Placeholder";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Demographic and purchasing statistics over a directory of user parquet files
#[derive(Parser, Debug, Clone)]
#[command(
    name = "userstats",
    about = "Demographic and purchasing statistics over a directory of user parquet files",
    version
)]
pub struct Settings {
    /// Directory containing the input files [default: data]
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Directory chart artifacts are written to [default: output]
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// File-name glob selecting the input files [default: *.parquet]
    #[arg(long)]
    pub pattern: Option<String>,

    /// Country correction rule [default: placeholder]
    #[arg(long, value_enum)]
    pub country_policy: Option<CountryPolicy>,

    /// JSON configuration file; command-line values take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the effective configuration to this path before running
    #[arg(long)]
    pub dump_config: Option<PathBuf>,

    /// Print the console summary only, without writing charts
    #[arg(long)]
    pub no_charts: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path (in addition to stderr)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Parse the process arguments and resolve the effective configuration.
    pub fn load() -> Result<(Settings, AnalysisConfig)> {
        Self::load_from_args(std::env::args_os().collect())
    }

    /// Same as [`Settings::load`] with an explicit argument list.
    pub fn load_from_args(args: Vec<std::ffi::OsString>) -> Result<(Settings, AnalysisConfig)> {
        let mut settings = Settings::parse_from(args);
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        let config = settings.resolve_config()?;
        Ok((settings, config))
    }

    /// Start from the config file (or the built-in defaults), apply every
    /// value given on the command line, expand `~/` and validate.
    pub fn resolve_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::load_from(&expand_home(path))?,
            None => AnalysisConfig::default(),
        };

        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(pattern) = &self.pattern {
            config.file_pattern = pattern.clone();
        }
        if let Some(policy) = self.country_policy {
            config.country_policy = policy;
        }

        config.data_dir = expand_home(&config.data_dir);
        config.output_dir = expand_home(&config.output_dir);
        config.validate()?;
        Ok(config)
    }
}

// ── CountryPolicy ──────────────────────────────────────────────────────────────

/// How the `country` field is corrected from the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CountryPolicy {
    /// Any address other than the placeholder string is a Chinese address.
    #[default]
    Placeholder,
    /// Only addresses naming a Chinese province, municipality or SAR are
    /// Chinese addresses; everything else keeps its original country.
    RegionNames,
}

// ── ColumnNames ────────────────────────────────────────────────────────────────

/// Names of the columns read from every input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub user_id: String,
    pub age: String,
    pub gender: String,
    pub address: String,
    pub country: String,
    pub purchase_history: String,
    pub login_history: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            user_id: "user_name".to_string(),
            age: "age".to_string(),
            gender: "gender".to_string(),
            address: "address".to_string(),
            country: "country".to_string(),
            purchase_history: "purchase_history".to_string(),
            login_history: "login_history".to_string(),
        }
    }
}

impl ColumnNames {
    pub fn names(&self) -> [&str; 7] {
        [
            self.user_id.as_str(),
            self.age.as_str(),
            self.gender.as_str(),
            self.address.as_str(),
            self.country.as_str(),
            self.purchase_history.as_str(),
            self.login_history.as_str(),
        ]
    }
}

// ── AnalysisConfig ─────────────────────────────────────────────────────────────

/// Every tunable of an analysis run. `Default` is the stock dataset layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub file_pattern: String,
    pub columns: ColumnNames,
    pub placeholder_address: String,
    /// Country label assigned to users with a Chinese address.
    pub corrected_country: String,
    pub country_policy: CountryPolicy,
    /// Bounds of the age-in-range counter.
    pub age_in_range: AgeRange,
    pub age_buckets: AgeBuckets,
    /// Width in years of each age histogram bin.
    pub age_bin_width: i64,
    /// The two gender values tracked by the gender cross tables.
    pub binary_genders: Vec<String>,
    pub price_bands: PriceBands,
    /// Number of categories (by volume) shown in the price heatmap.
    pub heatmap_top_categories: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            file_pattern: "*.parquet".to_string(),
            columns: ColumnNames::default(),
            placeholder_address: DEFAULT_PLACEHOLDER_ADDRESS.to_string(),
            corrected_country: "China".to_string(),
            country_policy: CountryPolicy::default(),
            age_in_range: AgeRange::new(18, 70),
            age_buckets: AgeBuckets::default(),
            age_bin_width: 5,
            binary_genders: vec!["男".to_string(), "女".to_string()],
            price_bands: PriceBands::default(),
            heatmap_top_categories: 10,
        }
    }
}

impl AnalysisConfig {
    /// Load a JSON config file. Absent keys take their default values.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| StatsError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content)
            .map_err(|e| StatsError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Atomically write the config as pretty JSON, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Reject configurations the pipeline cannot interpret.
    pub fn validate(&self) -> Result<()> {
        if self.file_pattern.trim().is_empty() {
            return Err(StatsError::Config("file pattern is empty".to_string()));
        }
        if self.columns.names().iter().any(|n| n.trim().is_empty()) {
            return Err(StatsError::Config("column names must not be empty".to_string()));
        }
        let ranges = [
            ("age_in_range", self.age_in_range),
            ("age_buckets.young", self.age_buckets.young),
            ("age_buckets.middle_aged", self.age_buckets.middle_aged),
            ("age_buckets.senior", self.age_buckets.senior),
        ];
        for (name, range) in ranges {
            if range.min > range.max {
                return Err(StatsError::Config(format!(
                    "{} has min {} above max {}",
                    name, range.min, range.max
                )));
            }
        }
        if self.age_bin_width < 1 {
            return Err(StatsError::Config(format!(
                "age_bin_width must be at least 1, got {}",
                self.age_bin_width
            )));
        }
        if self.binary_genders.len() != 2 {
            return Err(StatsError::Config(format!(
                "binary_genders needs exactly two values, got {}",
                self.binary_genders.len()
            )));
        }
        if !self.price_bands.is_valid() {
            return Err(StatsError::Config(
                "price_bands must be finite and strictly ascending".to_string(),
            ));
        }
        if self.heatmap_top_categories == 0 {
            return Err(StatsError::Config(
                "heatmap_top_categories must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────────

/// Expand a leading `~` to the home directory; other paths are returned as-is.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
