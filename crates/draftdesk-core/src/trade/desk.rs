// Trade desk: the service layer tying the ledger, the cap rule table and
// the validator together.

use std::ops::RangeInclusive;
use std::sync::Arc;

use tracing::info;

use super::proposal::{AppliedTradeSummary, NewTradeProposal, TradeError, TradeProposal};
use super::rules::{CapRuleTable, CapThresholds, RosterBounds, DEFAULT_SPORT};
use super::validator::{
    validate_with_findings, StructureReport, ValidationRequest, ValidationResult,
};
use crate::db::Database;
use crate::ledger::Ledger;

/// Seasons written to storage by [`TradeDesk::seed_cap_settings`].
pub const SEEDED_SEASONS: RangeInclusive<i32> = 2025..=2031;

pub struct TradeDesk {
    db: Arc<Database>,
    rules: CapRuleTable,
    roster: RosterBounds,
}

impl TradeDesk {
    pub fn new(db: Arc<Database>, rules: CapRuleTable, roster: RosterBounds) -> Self {
        Self { db, rules, roster }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Thresholds for a season: a stored cap setting wins over the
    /// configured rule table, which falls back to built-in defaults.
    pub fn thresholds(&self, year: i32, sport: &str) -> Result<CapThresholds, TradeError> {
        match self.db.cap_setting(year, sport)? {
            Some(t) => Ok(t),
            None => Ok(self.rules.thresholds(year, sport)),
        }
    }

    /// Store the rule table's thresholds for every seeded season lacking a
    /// record.
    pub fn seed_cap_settings(&self, sport: &str) -> Result<usize, TradeError> {
        let seasons = SEEDED_SEASONS.map(|year| (year, self.rules.thresholds(year, sport)));
        Ok(self.db.seed_cap_settings(sport, seasons)?)
    }

    /// Validate caller-supplied team states. The ledger is only consulted
    /// to confirm each team exists.
    pub fn validate(&self, request: &ValidationRequest) -> Result<ValidationResult, TradeError> {
        let sport = request.sport.as_deref().unwrap_or(DEFAULT_SPORT);
        let mut thresholds = self.thresholds(request.year, sport)?;
        if let Some(overrides) = &request.cap_overrides {
            thresholds = thresholds.with_overrides(overrides);
        }

        let mut findings = StructureReport::default();
        for team in &request.teams {
            let code = team.team_code.as_str();
            if !code.is_empty() && !self.db.team_exists(code, sport)? {
                findings.fail(format!("Unknown team {code}."), &[code]);
            }
        }
        Ok(validate_with_findings(&request.teams, &thresholds, self.roster, findings))
    }

    pub fn save_proposal(&self, proposal: &NewTradeProposal) -> Result<TradeProposal, TradeError> {
        self.db.create_trade_proposal(proposal)
    }

    pub fn proposal(&self, id: i64) -> Result<TradeProposal, TradeError> {
        self.db.trade_proposal(id)?.ok_or(TradeError::NotFound(id))
    }

    pub fn proposals(&self, sport: &str) -> Result<Vec<TradeProposal>, TradeError> {
        Ok(self.db.trade_proposals(sport)?)
    }

    /// Validate a stored proposal against the current ledger and cache the
    /// verdict on it.
    pub fn validate_proposal(&self, id: i64, year: i32) -> Result<TradeProposal, TradeError> {
        let proposal = self.proposal(id)?;
        proposal.ensure_mutable()?;

        let thresholds = self.thresholds(year, &proposal.sport)?;
        let snapshot = proposal.team_states(self.db.as_ref(), thresholds.salary_cap)?;
        let result =
            validate_with_findings(&snapshot.teams, &thresholds, self.roster, snapshot.findings);

        info!(
            "Trade proposal {} validated for {}: valid={}",
            id, year, result.is_valid
        );

        self.db.record_validation(id, &result)
    }

    pub fn apply(&self, id: i64) -> Result<AppliedTradeSummary, TradeError> {
        self.db.apply_trade(id)
    }

    pub fn delete_proposal(&self, id: i64) -> Result<(), TradeError> {
        self.db.delete_trade_proposal(id)
    }
}
