// Configuration loading and parsing (league.toml, server.toml).

use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::trade::rules::{
    CapRuleTable, CapThresholds, RosterBounds, DEFAULT_MAX_SALARY, DEFAULT_MIN_SALARY,
};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub cap_seasons: Vec<CapSeason>,
    pub ws_host: String,
    pub ws_port: u16,
    pub db_path: String,
    pub import: ImportPaths,
}

impl Config {
    pub fn roster_bounds(&self) -> RosterBounds {
        RosterBounds {
            min: self.league.min_roster_size,
            max: self.league.max_roster_size,
        }
    }

    /// Rule table holding the configured seasons for the configured league.
    pub fn cap_rule_table(&self) -> Result<CapRuleTable, ConfigError> {
        let mut table = CapRuleTable::new();
        for (i, season) in self.cap_seasons.iter().enumerate() {
            table
                .insert(&self.league.sport, season.year, season.thresholds())
                .map_err(|e| ConfigError::ValidationError {
                    field: format!("cap_seasons[{i}]"),
                    message: e.to_string(),
                })?;
        }
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for league.toml.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueConfig,
    #[serde(default)]
    cap_seasons: Vec<CapSeason>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    pub name: String,
    pub sport: String,
    #[serde(default = "default_min_roster")]
    pub min_roster_size: u32,
    #[serde(default = "default_max_roster")]
    pub max_roster_size: u32,
}

fn default_min_roster() -> u32 {
    RosterBounds::default().min
}

fn default_max_roster() -> u32 {
    RosterBounds::default().max
}

/// One `[[cap_seasons]]` entry. Amounts are in millions.
#[derive(Debug, Clone, Deserialize)]
pub struct CapSeason {
    pub year: i32,
    pub salary_cap: f64,
    pub tax_line: f64,
    pub first_apron: f64,
    pub second_apron: f64,
    #[serde(default)]
    pub min_salary: Option<f64>,
    #[serde(default)]
    pub max_salary: Option<f64>,
}

impl CapSeason {
    pub fn thresholds(&self) -> CapThresholds {
        CapThresholds {
            salary_cap: self.salary_cap,
            tax_line: self.tax_line,
            first_apron: self.first_apron,
            second_apron: self.second_apron,
            min_salary: self.min_salary.unwrap_or(DEFAULT_MIN_SALARY),
            max_salary: self.max_salary.unwrap_or(DEFAULT_MAX_SALARY),
        }
    }
}

// ---------------------------------------------------------------------------
// server.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct ServerFile {
    websocket: WebsocketSection,
    database: DatabaseSection,
    #[serde(default)]
    import: ImportPaths,
}

#[derive(Debug, Clone, Deserialize)]
struct WebsocketSection {
    #[serde(default = "default_host")]
    host: String,
    port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

/// Optional CSV snapshots imported into the ledger at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportPaths {
    pub rosters_csv: Option<String>,
    pub picks_csv: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/league.toml` and
/// `config/server.toml` relative to `base_dir`. Does not copy defaults;
/// `load_config()` does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let league_path = config_dir.join("league.toml");
    let league_file: LeagueFile = parse_file(&league_path)?;

    let server_path = config_dir.join("server.toml");
    let server_file: ServerFile = parse_file(&server_path)?;

    let config = Config {
        league: league_file.league,
        cap_seasons: league_file.cap_seasons,
        ws_host: server_file.websocket.host,
        ws_port: server_file.websocket.port,
        db_path: server_file.database.path,
        import: server_file.import,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Load config relative to the current working directory, copying
/// defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.league.sport.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "league.sport".into(),
            message: "must not be empty".into(),
        });
    }

    let league = &config.league;
    if league.min_roster_size > league.max_roster_size {
        return Err(ConfigError::ValidationError {
            field: "league.min_roster_size".into(),
            message: format!(
                "must not exceed max_roster_size ({} > {})",
                league.min_roster_size, league.max_roster_size
            ),
        });
    }

    let mut years = BTreeSet::new();
    for (i, season) in config.cap_seasons.iter().enumerate() {
        if !years.insert(season.year) {
            return Err(ConfigError::ValidationError {
                field: format!("cap_seasons[{i}].year"),
                message: format!("season {} is listed more than once", season.year),
            });
        }
        season
            .thresholds()
            .validate()
            .map_err(|e| ConfigError::ValidationError {
                field: format!("cap_seasons[{i}]"),
                message: e.to_string(),
            })?;
    }

    if config.ws_port == 0 {
        return Err(ConfigError::ValidationError {
            field: "websocket.port".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.db_path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "database.path".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}
