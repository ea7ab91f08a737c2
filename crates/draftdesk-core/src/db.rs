// SQLite persistence layer for rosters, pick assets, cap settings and
// trade proposals.

use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

use crate::ledger::{Ledger, PickAsset, RosterPlayer, ACTIVE_STATUS};
use crate::trade::proposal::{
    AppliedTradeSummary, NewTradeProposal, ProposalStatus, TeamRosterSummary, TradeError,
    TradeLeg, TradeProposal,
};
use crate::trade::rules::{normalize_year, CapThresholds};
use crate::trade::validator::ValidationResult;

/// SQLite-backed ledger and proposal store.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS roster_players (
                id        INTEGER PRIMARY KEY,
                team_code TEXT NOT NULL,
                name      TEXT NOT NULL,
                position  TEXT NOT NULL DEFAULT '',
                cap_hit   REAL,
                status    TEXT NOT NULL DEFAULT 'active',
                sport     TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS draft_pick_assets (
                id          INTEGER PRIMARY KEY,
                team_code   TEXT NOT NULL,
                description TEXT NOT NULL,
                year        INTEGER NOT NULL,
                round       INTEGER NOT NULL,
                sport       TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cap_settings (
                year         INTEGER NOT NULL,
                sport        TEXT NOT NULL,
                salary_cap   REAL NOT NULL,
                tax_line     REAL NOT NULL,
                first_apron  REAL NOT NULL,
                second_apron REAL NOT NULL,
                min_salary   REAL NOT NULL,
                max_salary   REAL NOT NULL,
                PRIMARY KEY (year, sport)
            );

            CREATE TABLE IF NOT EXISTS trade_proposals (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                name              TEXT NOT NULL,
                sport             TEXT NOT NULL,
                status            TEXT NOT NULL DEFAULT 'draft',
                legs              TEXT NOT NULL,
                validation_result TEXT,
                created_at        TEXT NOT NULL,
                executed_at       TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_roster_players_team
                ON roster_players(sport, team_code);
            CREATE INDEX IF NOT EXISTS idx_pick_assets_team
                ON draft_pick_assets(sport, team_code);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Roster players
    // ------------------------------------------------------------------

    pub fn upsert_roster_player(&self, player: &RosterPlayer) -> Result<()> {
        self.upsert_roster_players(std::slice::from_ref(player))
            .map(|_| ())
    }

    /// Insert or update a batch of players in one transaction. Returns the
    /// number of rows written.
    pub fn upsert_roster_players(&self, players: &[RosterPlayer]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin roster transaction")?;

        for p in players {
            tx.execute(
                "INSERT INTO roster_players (id, team_code, name, position, cap_hit, status, sport)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    team_code = excluded.team_code,
                    name      = excluded.name,
                    position  = excluded.position,
                    cap_hit   = excluded.cap_hit,
                    status    = excluded.status,
                    sport     = excluded.sport",
                params![
                    p.id,
                    p.team_code,
                    p.name,
                    p.position,
                    p.cap_hit,
                    p.status,
                    p.sport.to_uppercase(),
                ],
            )
            .with_context(|| format!("failed to upsert roster player {}", p.id))?;
        }

        tx.commit().context("failed to commit roster upsert")?;
        Ok(players.len())
    }

    /// Every player on a team regardless of status, ordered by id.
    pub fn roster_players(&self, team_code: &str, sport: &str) -> Result<Vec<RosterPlayer>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, team_code, name, position, cap_hit, status, sport
                 FROM roster_players WHERE team_code = ?1 AND sport = ?2 ORDER BY id",
            )
            .context("failed to prepare roster query")?;

        let players = stmt
            .query_map(params![team_code, sport.to_uppercase()], |row| {
                Ok(RosterPlayer {
                    id: row.get(0)?,
                    team_code: row.get(1)?,
                    name: row.get(2)?,
                    position: row.get(3)?,
                    cap_hit: row.get(4)?,
                    status: row.get(5)?,
                    sport: row.get(6)?,
                })
            })
            .context("failed to query roster")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map roster rows")?;

        Ok(players)
    }

    // ------------------------------------------------------------------
    // Draft pick assets
    // ------------------------------------------------------------------

    pub fn upsert_pick_assets(&self, picks: &[PickAsset]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin pick asset transaction")?;

        for p in picks {
            tx.execute(
                "INSERT INTO draft_pick_assets (id, team_code, description, year, round, sport)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    team_code   = excluded.team_code,
                    description = excluded.description,
                    year        = excluded.year,
                    round       = excluded.round,
                    sport       = excluded.sport",
                params![
                    p.id,
                    p.team_code,
                    p.description,
                    p.year,
                    p.round,
                    p.sport.to_uppercase(),
                ],
            )
            .with_context(|| format!("failed to upsert pick asset {}", p.id))?;
        }

        tx.commit().context("failed to commit pick asset upsert")?;
        Ok(picks.len())
    }

    /// Picks held by a team, earliest draft first.
    pub fn team_pick_assets(&self, team_code: &str, sport: &str) -> Result<Vec<PickAsset>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, team_code, description, year, round, sport
                 FROM draft_pick_assets WHERE team_code = ?1 AND sport = ?2
                 ORDER BY year, round, id",
            )
            .context("failed to prepare pick asset query")?;

        let picks = stmt
            .query_map(params![team_code, sport.to_uppercase()], |row| {
                Ok(PickAsset {
                    id: row.get(0)?,
                    team_code: row.get(1)?,
                    description: row.get(2)?,
                    year: row.get(3)?,
                    round: row.get(4)?,
                    sport: row.get(5)?,
                })
            })
            .context("failed to query pick assets")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map pick asset rows")?;

        Ok(picks)
    }

    // ------------------------------------------------------------------
    // Cap settings
    // ------------------------------------------------------------------

    /// Store thresholds for a season, replacing any existing record.
    pub fn upsert_cap_setting(&self, year: i32, sport: &str, t: &CapThresholds) -> Result<()> {
        t.validate()
            .with_context(|| format!("invalid cap settings for {sport} {year}"))?;

        self.conn()
            .execute(
                "INSERT OR REPLACE INTO cap_settings
                    (year, sport, salary_cap, tax_line, first_apron, second_apron, min_salary, max_salary)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    normalize_year(year),
                    sport.to_uppercase(),
                    t.salary_cap,
                    t.tax_line,
                    t.first_apron,
                    t.second_apron,
                    t.min_salary,
                    t.max_salary,
                ],
            )
            .context("failed to upsert cap setting")?;
        Ok(())
    }

    pub fn cap_setting(&self, year: i32, sport: &str) -> Result<Option<CapThresholds>> {
        self.conn()
            .query_row(
                "SELECT salary_cap, tax_line, first_apron, second_apron, min_salary, max_salary
                 FROM cap_settings WHERE year = ?1 AND sport = ?2",
                params![normalize_year(year), sport.to_uppercase()],
                thresholds_from_row,
            )
            .optional()
            .context("failed to query cap setting")
    }

    /// All stored seasons for a league, oldest first.
    pub fn cap_settings(&self, sport: &str) -> Result<Vec<(i32, CapThresholds)>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT salary_cap, tax_line, first_apron, second_apron, min_salary, max_salary, year
                 FROM cap_settings WHERE sport = ?1 ORDER BY year",
            )
            .context("failed to prepare cap settings query")?;

        let rows = stmt
            .query_map(params![sport.to_uppercase()], |row| {
                Ok((row.get::<_, i32>(6)?, thresholds_from_row(row)?))
            })
            .context("failed to query cap settings")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map cap setting rows")?;

        Ok(rows)
    }

    /// Write thresholds for every season in `seasons` that has no stored
    /// record yet. Returns how many seasons were added.
    pub fn seed_cap_settings(
        &self,
        sport: &str,
        seasons: impl IntoIterator<Item = (i32, CapThresholds)>,
    ) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin cap seed transaction")?;

        let mut seeded = 0;
        for (year, t) in seasons {
            seeded += tx
                .execute(
                    "INSERT OR IGNORE INTO cap_settings
                        (year, sport, salary_cap, tax_line, first_apron, second_apron, min_salary, max_salary)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        normalize_year(year),
                        sport.to_uppercase(),
                        t.salary_cap,
                        t.tax_line,
                        t.first_apron,
                        t.second_apron,
                        t.min_salary,
                        t.max_salary,
                    ],
                )
                .context("failed to seed cap setting")?;
        }

        tx.commit().context("failed to commit cap seed")?;
        if seeded > 0 {
            info!("Seeded {} {} cap season(s)", seeded, sport.to_uppercase());
        }
        Ok(seeded)
    }

    // ------------------------------------------------------------------
    // Trade proposals
    // ------------------------------------------------------------------

    pub fn create_trade_proposal(&self, new: &NewTradeProposal) -> Result<TradeProposal, TradeError> {
        new.check()?;

        let legs_json = serde_json::to_string(&new.legs).context("failed to serialize legs")?;
        let created_at = Utc::now();
        let sport = new.sport.to_uppercase();

        let id = {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO trade_proposals (name, sport, status, legs, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    new.name,
                    sport,
                    ProposalStatus::Draft.as_str(),
                    legs_json,
                    created_at.to_rfc3339(),
                ],
            )
            .context("failed to insert trade proposal")?;
            conn.last_insert_rowid()
        };

        debug!("Created trade proposal {} ({} legs)", id, new.legs.len());

        Ok(TradeProposal {
            id,
            name: new.name.clone(),
            sport,
            status: ProposalStatus::Draft,
            legs: new.legs.clone(),
            validation_result: None,
            created_at,
        })
    }

    pub fn trade_proposal(&self, id: i64) -> Result<Option<TradeProposal>> {
        let conn = self.conn();
        load_proposal(&conn, id)
    }

    /// Proposals for a league, newest first.
    pub fn trade_proposals(&self, sport: &str) -> Result<Vec<TradeProposal>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PROPOSAL_COLUMNS} FROM trade_proposals WHERE sport = ?1 ORDER BY id DESC"
            ))
            .context("failed to prepare trade proposal query")?;

        let rows = stmt
            .query_map(params![sport.to_uppercase()], ProposalRow::from_row)
            .context("failed to query trade proposals")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map trade proposal rows")?;

        rows.into_iter().map(ProposalRow::into_proposal).collect()
    }

    /// Cache a validation verdict on a proposal. Valid proposals become
    /// `validated`; invalid ones fall back to `draft`.
    pub fn record_validation(
        &self,
        id: i64,
        result: &ValidationResult,
    ) -> Result<TradeProposal, TradeError> {
        let conn = self.conn();
        let mut proposal = load_proposal(&conn, id)?.ok_or(TradeError::NotFound(id))?;
        proposal.ensure_mutable()?;

        let status = if result.is_valid {
            ProposalStatus::Validated
        } else {
            ProposalStatus::Draft
        };
        let result_json =
            serde_json::to_string(result).context("failed to serialize validation result")?;

        conn.execute(
            "UPDATE trade_proposals SET status = ?1, validation_result = ?2 WHERE id = ?3",
            params![status.as_str(), result_json, id],
        )
        .context("failed to store validation result")?;

        proposal.status = status;
        proposal.validation_result = Some(result.clone());
        Ok(proposal)
    }

    pub fn delete_trade_proposal(&self, id: i64) -> Result<(), TradeError> {
        let conn = self.conn();
        let proposal = load_proposal(&conn, id)?.ok_or(TradeError::NotFound(id))?;
        proposal.ensure_mutable()?;

        conn.execute("DELETE FROM trade_proposals WHERE id = ?1", params![id])
            .context("failed to delete trade proposal")?;
        Ok(())
    }

    /// Execute a proposal: move every listed player and pick to its leg's
    /// destination and mark the proposal executed, all in one immediate
    /// transaction. Any asset no longer held by its leg's source team
    /// aborts the whole trade.
    pub fn apply_trade(&self, id: i64) -> Result<AppliedTradeSummary, TradeError> {
        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to begin trade transaction")?;

        let proposal = load_proposal(&tx, id)?.ok_or(TradeError::NotFound(id))?;
        proposal.ensure_mutable()?;

        for team_code in proposal.team_codes() {
            if !team_known(&tx, &team_code, &proposal.sport)? {
                return Err(TradeError::Conflict(format!("unknown team {team_code}")));
            }
        }

        let mut players_moved = 0;
        let mut picks_moved = 0;

        for leg in &proposal.legs {
            for player_id in &leg.player_ids {
                if !reassign_player(&tx, *player_id, leg, &proposal.sport)? {
                    return Err(TradeError::Conflict(format!(
                        "player {player_id} is no longer on {}",
                        leg.from_team_code
                    )));
                }
                players_moved += 1;
            }

            for pick_id in &leg.pick_ids {
                if !reassign_pick(&tx, *pick_id, leg, &proposal.sport)? {
                    return Err(TradeError::Conflict(format!(
                        "pick {pick_id} is no longer held by {}",
                        leg.from_team_code
                    )));
                }
                picks_moved += 1;
            }
        }

        tx.execute(
            "UPDATE trade_proposals SET status = ?1, executed_at = ?2 WHERE id = ?3",
            params![ProposalStatus::Executed.as_str(), Utc::now().to_rfc3339(), id],
        )
        .context("failed to mark proposal executed")?;

        let mut rosters = Vec::new();
        for team_code in proposal.team_codes() {
            let (roster_size, total_salary): (i64, f64) = tx
                .query_row(
                    "SELECT COUNT(*), COALESCE(SUM(cap_hit), 0.0)
                     FROM roster_players
                     WHERE team_code = ?1 AND sport = ?2 AND lower(status) = ?3",
                    params![team_code, proposal.sport, ACTIVE_STATUS],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .context("failed to total roster")?;
            rosters.push(TeamRosterSummary {
                team_code,
                roster_size: roster_size as usize,
                total_salary,
            });
        }

        tx.commit().context("failed to commit trade")?;

        info!(
            "Applied trade proposal {}: {} player(s), {} pick(s) moved",
            id, players_moved, picks_moved
        );

        Ok(AppliedTradeSummary {
            proposal_id: id,
            players_moved,
            picks_moved,
            rosters,
        })
    }
}

impl Ledger for Database {
    fn roster(&self, team_code: &str, sport: &str) -> Result<Vec<RosterPlayer>> {
        Ok(self
            .roster_players(team_code, sport)?
            .into_iter()
            .filter(RosterPlayer::is_active)
            .collect())
    }

    fn pick_assets(&self, team_code: &str, sport: &str) -> Result<Vec<PickAsset>> {
        self.team_pick_assets(team_code, sport)
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

/// Move one player along a leg. False when the source team no longer
/// holds them.
/// Same rule as [`Ledger::team_exists`], read inside a transaction.
fn team_known(conn: &Connection, team_code: &str, sport: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(
             SELECT 1 FROM roster_players
             WHERE team_code = ?1 AND sport = ?2 AND lower(status) = ?3
         ) OR EXISTS(
             SELECT 1 FROM draft_pick_assets WHERE team_code = ?1 AND sport = ?2
         )",
        params![team_code, sport, ACTIVE_STATUS],
        |row| row.get(0),
    )
    .context("failed to look up team")
}

fn reassign_player(conn: &Connection, player_id: i64, leg: &TradeLeg, sport: &str) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE roster_players SET team_code = ?1
             WHERE id = ?2 AND team_code = ?3 AND sport = ?4",
            params![leg.to_team_code, player_id, leg.from_team_code, sport],
        )
        .context("failed to reassign player")?;
    Ok(changed == 1)
}

fn reassign_pick(conn: &Connection, pick_id: i64, leg: &TradeLeg, sport: &str) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE draft_pick_assets SET team_code = ?1
             WHERE id = ?2 AND team_code = ?3 AND sport = ?4",
            params![leg.to_team_code, pick_id, leg.from_team_code, sport],
        )
        .context("failed to reassign pick")?;
    Ok(changed == 1)
}

const PROPOSAL_COLUMNS: &str = "id, name, sport, status, legs, validation_result, created_at";

fn thresholds_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CapThresholds> {
    Ok(CapThresholds {
        salary_cap: row.get(0)?,
        tax_line: row.get(1)?,
        first_apron: row.get(2)?,
        second_apron: row.get(3)?,
        min_salary: row.get(4)?,
        max_salary: row.get(5)?,
    })
}

/// Raw proposal columns; JSON and enum decoding happens outside rusqlite's
/// row mapper so failures carry context.
struct ProposalRow {
    id: i64,
    name: String,
    sport: String,
    status: String,
    legs: String,
    validation_result: Option<String>,
    created_at: String,
}

impl ProposalRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(ProposalRow {
            id: row.get(0)?,
            name: row.get(1)?,
            sport: row.get(2)?,
            status: row.get(3)?,
            legs: row.get(4)?,
            validation_result: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_proposal(self) -> Result<TradeProposal> {
        let status = ProposalStatus::parse(&self.status)
            .ok_or_else(|| anyhow!("proposal {} has unknown status {:?}", self.id, self.status))?;
        let legs: Vec<TradeLeg> = serde_json::from_str(&self.legs)
            .with_context(|| format!("proposal {} has malformed legs", self.id))?;
        let validation_result = self
            .validation_result
            .as_deref()
            .map(serde_json::from_str::<ValidationResult>)
            .transpose()
            .with_context(|| format!("proposal {} has malformed validation result", self.id))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .with_context(|| format!("proposal {} has malformed created_at", self.id))?
            .with_timezone(&Utc);

        Ok(TradeProposal {
            id: self.id,
            name: self.name,
            sport: self.sport,
            status,
            legs,
            validation_result,
            created_at,
        })
    }
}

fn load_proposal(conn: &Connection, id: i64) -> Result<Option<TradeProposal>> {
    conn.query_row(
        &format!("SELECT {PROPOSAL_COLUMNS} FROM trade_proposals WHERE id = ?1"),
        params![id],
        ProposalRow::from_row,
    )
    .optional()
    .context("failed to query trade proposal")?
    .map(ProposalRow::into_proposal)
    .transpose()
}
