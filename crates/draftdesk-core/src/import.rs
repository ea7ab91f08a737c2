// Roster snapshot import.
//
// Reads CSV snapshots of team rosters and draft-pick holdings and upserts
// them into the ledger. Rows that fail to parse or validate are skipped with
// a warning so one bad line never blocks the rest of the snapshot.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::db::Database;
use crate::ledger::{PickAsset, RosterPlayer, ACTIVE_STATUS};

const ROSTER_COLUMNS: [&str; 3] = ["id", "team_code", "name"];
const PICK_COLUMNS: [&str; 5] = ["id", "team_code", "description", "year", "round"];

/// Label used in errors for reader-based imports.
const READER_LABEL: &str = "<reader>";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("{path} is missing required column `{column}`")]
    MissingColumn { path: String, column: String },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Raw CSV rows
// ---------------------------------------------------------------------------

/// One roster snapshot row. Unknown columns are ignored.
#[derive(Debug, Deserialize)]
struct RawRosterRow {
    id: i64,
    team_code: String,
    name: String,
    #[serde(default)]
    position: String,
    #[serde(default)]
    cap_hit: Option<f64>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    sport: String,
}

#[derive(Debug, Deserialize)]
struct RawPickRow {
    id: i64,
    team_code: String,
    description: String,
    year: i32,
    round: u32,
    #[serde(default)]
    sport: String,
}

struct Parsed<T> {
    rows: Vec<T>,
    skipped: usize,
}

fn or_default_sport(sport: &str, default_sport: &str) -> String {
    let sport = sport.trim();
    if sport.is_empty() {
        default_sport.to_uppercase()
    } else {
        sport.to_uppercase()
    }
}

// ---------------------------------------------------------------------------
// Reader-based parsers
// ---------------------------------------------------------------------------

fn check_columns<R: Read>(
    reader: &mut csv::Reader<R>,
    required: &[&str],
    path: &str,
) -> Result<(), ImportError> {
    let headers = reader.headers().map_err(|e| ImportError::Csv {
        path: path.to_string(),
        source: e,
    })?;
    for column in required {
        if !headers.iter().any(|h| h.trim() == *column) {
            return Err(ImportError::MissingColumn {
                path: path.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

fn parse_roster_rows<R: Read>(
    rdr: R,
    default_sport: &str,
    path: &str,
) -> Result<Parsed<RosterPlayer>, ImportError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    check_columns(&mut reader, &ROSTER_COLUMNS, path)?;

    let mut rows = Vec::new();
    let mut skipped = 0;
    for result in reader.deserialize::<RawRosterRow>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed roster row in {}: {}", path, e);
                skipped += 1;
                continue;
            }
        };
        if raw.team_code.is_empty() || raw.name.is_empty() {
            warn!("skipping roster row {}: missing team code or name", raw.id);
            skipped += 1;
            continue;
        }
        if raw.cap_hit.is_some_and(|c| !c.is_finite() || c < 0.0) {
            warn!("skipping roster row {} ({}): invalid cap hit", raw.id, raw.name);
            skipped += 1;
            continue;
        }
        let status = if raw.status.is_empty() {
            ACTIVE_STATUS.to_string()
        } else {
            raw.status.to_lowercase()
        };
        rows.push(RosterPlayer {
            id: raw.id,
            team_code: raw.team_code.to_uppercase(),
            name: raw.name,
            position: raw.position,
            cap_hit: raw.cap_hit,
            status,
            sport: or_default_sport(&raw.sport, default_sport),
        });
    }
    Ok(Parsed { rows, skipped })
}

fn parse_pick_rows<R: Read>(
    rdr: R,
    default_sport: &str,
    path: &str,
) -> Result<Parsed<PickAsset>, ImportError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    check_columns(&mut reader, &PICK_COLUMNS, path)?;

    let mut rows = Vec::new();
    let mut skipped = 0;
    for result in reader.deserialize::<RawPickRow>() {
        match result {
            Ok(raw) if raw.team_code.is_empty() || raw.round == 0 => {
                warn!("skipping pick row {}: missing team code or round", raw.id);
                skipped += 1;
            }
            Ok(raw) => rows.push(PickAsset {
                id: raw.id,
                team_code: raw.team_code.to_uppercase(),
                description: raw.description,
                year: raw.year,
                round: raw.round,
                sport: or_default_sport(&raw.sport, default_sport),
            }),
            Err(e) => {
                warn!("skipping malformed pick row in {}: {}", path, e);
                skipped += 1;
            }
        }
    }
    Ok(Parsed { rows, skipped })
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

/// Upsert every valid row of a roster snapshot. Rows without a `sport`
/// column value are assigned `default_sport`.
pub fn import_roster_csv<R: Read>(
    db: &Database,
    rdr: R,
    default_sport: &str,
) -> Result<ImportReport, ImportError> {
    import_rosters_labeled(db, rdr, default_sport, READER_LABEL)
}

pub fn import_pick_csv<R: Read>(
    db: &Database,
    rdr: R,
    default_sport: &str,
) -> Result<ImportReport, ImportError> {
    import_picks_labeled(db, rdr, default_sport, READER_LABEL)
}

pub fn import_roster_file(
    db: &Database,
    path: &Path,
    default_sport: &str,
) -> Result<ImportReport, ImportError> {
    let label = path.display().to_string();
    let file = open(path)?;
    import_rosters_labeled(db, file, default_sport, &label)
}

pub fn import_pick_file(
    db: &Database,
    path: &Path,
    default_sport: &str,
) -> Result<ImportReport, ImportError> {
    let label = path.display().to_string();
    let file = open(path)?;
    import_picks_labeled(db, file, default_sport, &label)
}

fn open(path: &Path) -> Result<std::fs::File, ImportError> {
    std::fs::File::open(path).map_err(|e| ImportError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

fn import_rosters_labeled<R: Read>(
    db: &Database,
    rdr: R,
    default_sport: &str,
    label: &str,
) -> Result<ImportReport, ImportError> {
    let parsed = parse_roster_rows(rdr, default_sport, label)?;
    let imported = db.upsert_roster_players(&parsed.rows)?;
    info!(
        "Imported {} roster player(s) from {} ({} skipped)",
        imported, label, parsed.skipped
    );
    Ok(ImportReport {
        imported,
        skipped: parsed.skipped,
    })
}

fn import_picks_labeled<R: Read>(
    db: &Database,
    rdr: R,
    default_sport: &str,
    label: &str,
) -> Result<ImportReport, ImportError> {
    let parsed = parse_pick_rows(rdr, default_sport, label)?;
    let imported = db.upsert_pick_assets(&parsed.rows)?;
    info!(
        "Imported {} draft pick asset(s) from {} ({} skipped)",
        imported, label, parsed.skipped
    );
    Ok(ImportReport {
        imported,
        skipped: parsed.skipped,
    })
}
