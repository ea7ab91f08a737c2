// Asset ledger: the read-only view of rosters and pick holdings that trade
// validation is computed from.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Roster status that counts toward payroll and roster size.
pub const ACTIVE_STATUS: &str = "active";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterPlayer {
    pub id: i64,
    pub team_code: String,
    pub name: String,
    pub position: String,
    /// Cap hit in millions. Missing cap hits count as zero.
    pub cap_hit: Option<f64>,
    pub status: String,
    pub sport: String,
}

impl RosterPlayer {
    pub fn salary(&self) -> f64 {
        self.cap_hit.unwrap_or(0.0)
    }

    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case(ACTIVE_STATUS)
    }
}

/// A tradeable draft pick held by a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickAsset {
    pub id: i64,
    pub team_code: String,
    pub description: String,
    pub year: i32,
    pub round: u32,
    pub sport: String,
}

/// Source of the snapshot a trade is evaluated against.
pub trait Ledger {
    /// Active roster of a team.
    fn roster(&self, team_code: &str, sport: &str) -> Result<Vec<RosterPlayer>>;

    fn pick_assets(&self, team_code: &str, sport: &str) -> Result<Vec<PickAsset>>;

    /// A team is known once it holds an active player or a pick.
    fn team_exists(&self, team_code: &str, sport: &str) -> Result<bool> {
        Ok(!self.roster(team_code, sport)?.is_empty()
            || !self.pick_assets(team_code, sport)?.is_empty())
    }

    /// Room under `salary_cap`; negative when over.
    fn cap_space(&self, team_code: &str, sport: &str, salary_cap: f64) -> Result<f64> {
        let payroll: f64 = self
            .roster(team_code, sport)?
            .iter()
            .map(RosterPlayer::salary)
            .sum();
        Ok(salary_cap - payroll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLedger {
        players: Vec<RosterPlayer>,
        picks: Vec<PickAsset>,
    }

    impl Ledger for FixedLedger {
        fn roster(&self, team_code: &str, _sport: &str) -> Result<Vec<RosterPlayer>> {
            Ok(self
                .players
                .iter()
                .filter(|p| p.team_code == team_code && p.is_active())
                .cloned()
                .collect())
        }

        fn pick_assets(&self, team_code: &str, _sport: &str) -> Result<Vec<PickAsset>> {
            Ok(self
                .picks
                .iter()
                .filter(|p| p.team_code == team_code)
                .cloned()
                .collect())
        }
    }

    fn player(id: i64, team: &str, cap_hit: Option<f64>, status: &str) -> RosterPlayer {
        RosterPlayer {
            id,
            team_code: team.into(),
            name: format!("Player {id}"),
            position: "G".into(),
            cap_hit,
            status: status.into(),
            sport: "NBA".into(),
        }
    }

    fn ledger() -> FixedLedger {
        FixedLedger {
            players: vec![
                player(1, "LAL", Some(40.0), "active"),
                player(2, "LAL", Some(30.0), "Active"),
                player(3, "LAL", Some(99.0), "injured_reserve"),
                player(4, "LAL", None, "active"),
                player(5, "BOS", Some(10.0), "active"),
                player(6, "SEA", Some(10.0), "waived"),
            ],
            picks: vec![PickAsset {
                id: 50,
                team_code: "OKC".into(),
                description: "2027 OKC 1st".into(),
                year: 2027,
                round: 1,
                sport: "NBA".into(),
            }],
        }
    }

    #[test]
    fn cap_space_sums_active_cap_hits() {
        let space = ledger().cap_space("LAL", "NBA", 148.1).unwrap();
        assert!((space - (148.1 - 70.0)).abs() < 1e-9);
    }

    #[test]
    fn team_exists_needs_an_active_player_or_a_pick() {
        let ledger = ledger();
        assert!(ledger.team_exists("BOS", "NBA").unwrap());
        assert!(ledger.team_exists("OKC", "NBA").unwrap());
        assert!(!ledger.team_exists("SEA", "NBA").unwrap());
        assert!(!ledger.team_exists("ZZZ", "NBA").unwrap());
    }

    #[test]
    fn missing_cap_hit_is_zero_salary() {
        assert_eq!(player(1, "LAL", None, "active").salary(), 0.0);
    }
}
