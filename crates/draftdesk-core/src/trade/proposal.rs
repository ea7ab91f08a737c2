// Trade proposals: the persisted form of a composed trade, its lifecycle,
// and the errors raised while validating or applying one.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::validator::{
    StructureReport, TeamFinancialState, TradedPick, TradedPlayer, ValidationResult,
};
use crate::ledger::Ledger;

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("trade proposal {0} not found")]
    NotFound(i64),

    #[error("trade proposal {0} has already been executed")]
    AlreadyExecuted(i64),

    #[error("trade conflict: {0}")]
    Conflict(String),

    #[error("malformed trade proposal: {0}")]
    Malformed(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// One directed transfer of assets between two teams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeLeg {
    #[serde(deserialize_with = "super::validator::deserialize_team_code")]
    pub from_team_code: String,
    #[serde(deserialize_with = "super::validator::deserialize_team_code")]
    pub to_team_code: String,
    #[serde(default)]
    pub player_ids: Vec<i64>,
    #[serde(default)]
    pub pick_ids: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Draft,
    Validated,
    Executed,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Draft => "draft",
            ProposalStatus::Validated => "validated",
            ProposalStatus::Executed => "executed",
        }
    }

    /// Parse a stored status. `applied` is accepted as a legacy spelling of
    /// `executed`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ProposalStatus::Draft),
            "validated" => Some(ProposalStatus::Validated),
            "executed" | "applied" => Some(ProposalStatus::Executed),
            _ => None,
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trade as composed by a user, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTradeProposal {
    pub name: String,
    #[serde(default = "default_sport")]
    pub sport: String,
    pub legs: Vec<TradeLeg>,
}

fn default_sport() -> String {
    super::rules::DEFAULT_SPORT.to_string()
}

impl NewTradeProposal {
    /// Reject legs that can never be applied.
    pub fn check(&self) -> Result<(), TradeError> {
        if self.name.trim().is_empty() {
            return Err(TradeError::Malformed("proposal needs a name".into()));
        }
        if self.legs.is_empty() {
            return Err(TradeError::Malformed("proposal has no legs".into()));
        }
        for leg in &self.legs {
            if leg.from_team_code.trim().is_empty() || leg.to_team_code.trim().is_empty() {
                return Err(TradeError::Malformed("leg is missing a team code".into()));
            }
            if leg.from_team_code == leg.to_team_code {
                return Err(TradeError::Malformed(format!(
                    "leg sends assets from {} to itself",
                    leg.from_team_code
                )));
            }
            if leg.player_ids.is_empty() && leg.pick_ids.is_empty() {
                return Err(TradeError::Malformed(format!(
                    "leg {} -> {} moves nothing",
                    leg.from_team_code, leg.to_team_code
                )));
            }
        }
        Ok(())
    }
}

/// A stored trade proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeProposal {
    pub id: i64,
    pub name: String,
    pub sport: String,
    pub status: ProposalStatus,
    pub legs: Vec<TradeLeg>,
    pub validation_result: Option<ValidationResult>,
    pub created_at: DateTime<Utc>,
}

impl TradeProposal {
    /// Team codes in order of first appearance across the legs.
    pub fn team_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = Vec::new();
        for leg in &self.legs {
            for code in [&leg.from_team_code, &leg.to_team_code] {
                if !codes.contains(code) {
                    codes.push(code.clone());
                }
            }
        }
        codes
    }

    pub fn ensure_mutable(&self) -> Result<(), TradeError> {
        if self.status == ProposalStatus::Executed {
            return Err(TradeError::AlreadyExecuted(self.id));
        }
        Ok(())
    }

    /// Build each participating team's financial view from the ledger.
    ///
    /// Teams the ledger does not know, and players or picks no longer held
    /// by their leg's source team, are returned as findings. Such assets are
    /// left out of the team states.
    pub fn team_states<L: Ledger + ?Sized>(
        &self,
        ledger: &L,
        salary_cap: f64,
    ) -> Result<ProposalSnapshot, TradeError> {
        let codes = self.team_codes();
        let mut findings = StructureReport::default();
        let mut teams: Vec<TeamFinancialState> = Vec::with_capacity(codes.len());
        let mut index: HashMap<String, usize> = HashMap::new();

        for code in &codes {
            if !ledger.team_exists(code, &self.sport)? {
                findings.fail(format!("Unknown team {code}."), &[code.as_str()]);
            }
            let roster = ledger.roster(code, &self.sport)?;
            index.insert(code.clone(), teams.len());
            teams.push(TeamFinancialState {
                team_code: code.clone(),
                current_salary: roster.iter().map(|p| p.salary()).sum(),
                cap_space: ledger.cap_space(code, &self.sport, salary_cap)?,
                roster_size: roster.len() as u32,
                players_out: vec![],
                players_in: vec![],
                picks_out: vec![],
                picks_in: vec![],
            });
        }

        for leg in &self.legs {
            let from = leg.from_team_code.as_str();
            let roster = ledger.roster(from, &self.sport)?;
            let picks = ledger.pick_assets(from, &self.sport)?;

            for id in &leg.player_ids {
                let Some(player) = roster.iter().find(|p| p.id == *id) else {
                    findings.fail(
                        format!("Player {id} is not on {from}'s active roster."),
                        &[from],
                    );
                    continue;
                };
                let traded = TradedPlayer {
                    id: player.id,
                    name: player.name.clone(),
                    salary: player.salary(),
                };
                teams[index[from]].players_out.push(traded.clone());
                teams[index[&leg.to_team_code]].players_in.push(traded);
            }

            for id in &leg.pick_ids {
                let Some(pick) = picks.iter().find(|p| p.id == *id) else {
                    findings.fail(format!("Pick {id} is not owned by {from}."), &[from]);
                    continue;
                };
                let traded = TradedPick {
                    id: pick.id,
                    description: pick.description.clone(),
                };
                teams[index[from]].picks_out.push(traded.clone());
                teams[index[&leg.to_team_code]].picks_in.push(traded);
            }
        }

        Ok(ProposalSnapshot { teams, findings })
    }
}

/// Team states for a stored proposal plus the problems found building them.
#[derive(Debug, Default)]
pub struct ProposalSnapshot {
    pub teams: Vec<TeamFinancialState>,
    pub findings: StructureReport,
}

/// Post-trade roster totals for one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRosterSummary {
    pub team_code: String,
    pub roster_size: usize,
    pub total_salary: f64,
}

/// What an executed trade changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedTradeSummary {
    pub proposal_id: i64,
    pub players_moved: usize,
    pub picks_moved: usize,
    pub rosters: Vec<TeamRosterSummary>,
}
