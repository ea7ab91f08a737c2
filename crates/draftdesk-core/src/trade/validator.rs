// Salary-cap trade validation.
//
// Structural checks (distinct teams, asset conservation) run first and are
// reported in `overall_reasons`. Every team not implicated in a structural
// failure is then evaluated against the season's band ladder and the roster
// bounds. Rule failures are ordinary results, never errors.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use super::rules::{CapOverrides, CapRuleTable, CapThresholds, RosterBounds, TaxStatus};

/// Maximum number of teams in one trade.
pub const MAX_TRADE_TEAMS: usize = 4;

/// Slack applied when comparing incoming salary to the allowed maximum, so
/// amounts that only differ by float noise are not rejected.
const SALARY_EPSILON: f64 = 0.001;

/// Season assumed when a request does not name one.
pub const DEFAULT_TRADE_YEAR: i32 = 2026;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// A player changing teams, with the cap hit that moves with them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradedPlayer {
    pub id: i64,
    pub name: String,
    pub salary: f64,
}

/// A draft pick changing teams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradedPick {
    pub id: i64,
    pub description: String,
}

/// One team's side of a proposed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamFinancialState {
    #[serde(deserialize_with = "deserialize_team_code")]
    pub team_code: String,
    /// Sum of active cap hits before the trade.
    pub current_salary: f64,
    /// Room under the cap; negative when over.
    pub cap_space: f64,
    pub roster_size: u32,
    #[serde(default)]
    pub players_out: Vec<TradedPlayer>,
    #[serde(default)]
    pub players_in: Vec<TradedPlayer>,
    #[serde(default)]
    pub picks_out: Vec<TradedPick>,
    #[serde(default)]
    pub picks_in: Vec<TradedPick>,
}

impl TeamFinancialState {
    pub fn salary_out(&self) -> f64 {
        self.players_out.iter().map(|p| p.salary).sum()
    }

    pub fn salary_in(&self) -> f64 {
        self.players_in.iter().map(|p| p.salary).sum()
    }

    fn moves_assets(&self) -> bool {
        !self.players_out.is_empty() || !self.picks_out.is_empty()
    }
}

/// A validation call as it arrives over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub teams: Vec<TeamFinancialState>,
    #[serde(default = "default_year")]
    pub year: i32,
    #[serde(default)]
    pub sport: Option<String>,
    #[serde(default)]
    pub cap_overrides: Option<CapOverrides>,
}

fn default_year() -> i32 {
    DEFAULT_TRADE_YEAR
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamValidationOutcome {
    pub team_code: String,
    pub salary_out: f64,
    pub salary_in: f64,
    pub net_change: f64,
    pub roster_size_after: i64,
    pub tax_status: TaxStatus,
    pub max_allowed_incoming: f64,
    pub passed: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub team_results: Vec<TeamValidationOutcome>,
    pub overall_reasons: Vec<String>,
}

impl ValidationResult {
    pub fn team(&self, team_code: &str) -> Option<&TeamValidationOutcome> {
        self.team_results.iter().find(|t| t.team_code == team_code)
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Validates proposals against a rule table and roster bounds.
#[derive(Debug, Clone, Copy)]
pub struct TradeValidator<'a> {
    rules: &'a CapRuleTable,
    roster: RosterBounds,
    sport: &'a str,
}

impl<'a> TradeValidator<'a> {
    pub fn new(rules: &'a CapRuleTable, roster: RosterBounds) -> Self {
        TradeValidator {
            rules,
            roster,
            sport: super::rules::DEFAULT_SPORT,
        }
    }

    pub fn for_sport(mut self, sport: &'a str) -> Self {
        self.sport = sport;
        self
    }

    pub fn validate(&self, teams: &[TeamFinancialState], year: i32) -> ValidationResult {
        self.validate_with_overrides(teams, year, None)
    }

    pub fn validate_with_overrides(
        &self,
        teams: &[TeamFinancialState],
        year: i32,
        overrides: Option<&CapOverrides>,
    ) -> ValidationResult {
        let mut thresholds = self.rules.thresholds(year, self.sport);
        if let Some(o) = overrides {
            thresholds = thresholds.with_overrides(o);
        }
        validate_against(teams, &thresholds, self.roster)
    }
}

/// Validate a proposal against already-resolved thresholds.
pub fn validate_against(
    teams: &[TeamFinancialState],
    thresholds: &CapThresholds,
    roster: RosterBounds,
) -> ValidationResult {
    validate_with_findings(teams, thresholds, roster, StructureReport::default())
}

/// Like [`validate_against`], folding in structural problems found while
/// the team states were assembled (unknown teams, assets the ledger does
/// not place on their sending team).
pub fn validate_with_findings(
    teams: &[TeamFinancialState],
    thresholds: &CapThresholds,
    roster: RosterBounds,
    mut structure: StructureReport,
) -> ValidationResult {
    let found = check_structure(teams);
    structure.reasons.extend(found.reasons);
    structure.implicated.extend(found.implicated);

    let team_results: Vec<TeamValidationOutcome> = teams
        .iter()
        .filter(|t| !structure.implicated.contains(&t.team_code))
        .map(|t| evaluate_team(t, thresholds, roster))
        .collect();

    let is_valid = structure.reasons.is_empty() && team_results.iter().all(|t| t.passed);

    debug!(
        "Validated {}-team trade: valid={}, {} structural issue(s)",
        teams.len(),
        is_valid,
        structure.reasons.len()
    );

    ValidationResult {
        is_valid,
        team_results,
        overall_reasons: structure.reasons,
    }
}

/// Evaluate one team's side of a trade against the band ladder.
pub fn evaluate_team(
    team: &TeamFinancialState,
    thresholds: &CapThresholds,
    roster: RosterBounds,
) -> TeamValidationOutcome {
    let mut reasons = Vec::new();

    let salary_out = team.salary_out();
    let salary_in = team.salary_in();
    let net_change = salary_in - salary_out;

    let roster_size_after = i64::from(team.roster_size) - team.players_out.len() as i64
        + team.players_in.len() as i64;
    if roster_size_after < i64::from(roster.min) {
        reasons.push(format!(
            "Roster would drop to {roster_size_after} players (minimum {}).",
            roster.min
        ));
    } else if roster_size_after > i64::from(roster.max) {
        reasons.push(format!(
            "Roster would increase to {roster_size_after} players (maximum {}).",
            roster.max
        ));
    }

    // Band is decided by payroll after sending, before receiving.
    let band = thresholds.band_for(team.current_salary - salary_out);
    let max_allowed = band.rule.max_incoming(salary_out, team.cap_space);

    if salary_in > max_allowed + SALARY_EPSILON {
        reasons.push(format!(
            "Incoming salary {} exceeds max allowed {} under {} rules.",
            money(salary_in),
            money(max_allowed),
            band.status
        ));
    }

    TeamValidationOutcome {
        team_code: team.team_code.clone(),
        salary_out: round2(salary_out),
        salary_in: round2(salary_in),
        net_change: round2(net_change),
        roster_size_after,
        tax_status: band.status,
        max_allowed_incoming: round2(max_allowed),
        passed: reasons.is_empty(),
        reasons,
    }
}

// ---------------------------------------------------------------------------
// Structural checks
// ---------------------------------------------------------------------------

/// Outcome of the structural pass: human-readable reasons and the teams
/// that must not be evaluated further.
#[derive(Debug, Default)]
pub struct StructureReport {
    pub reasons: Vec<String>,
    pub implicated: HashSet<String>,
}

impl StructureReport {
    pub fn fail(&mut self, reason: String, teams: &[&str]) {
        self.reasons.push(reason);
        self.implicated
            .extend(teams.iter().map(|t| (*t).to_string()));
    }
}

/// Check team identity and asset conservation.
pub fn check_structure(teams: &[TeamFinancialState]) -> StructureReport {
    let mut report = StructureReport::default();

    if teams.len() < 2 {
        report.reasons.push("A trade must involve at least 2 teams.".into());
    }
    if teams.len() > MAX_TRADE_TEAMS {
        report.reasons.push(format!(
            "A trade may involve at most {MAX_TRADE_TEAMS} teams, got {}.",
            teams.len()
        ));
    }
    if !teams.iter().any(TeamFinancialState::moves_assets) {
        report
            .reasons
            .push("No players or picks are being traded.".into());
    }

    let mut seen = HashSet::new();
    for team in teams {
        if team.team_code.trim().is_empty() {
            report.fail("A team in the trade has no team code.".into(), &[""]);
        } else if !seen.insert(team.team_code.as_str()) {
            report.fail(
                format!("Team {} appears more than once.", team.team_code),
                &[team.team_code.as_str()],
            );
        }
    }

    check_assets(
        &mut report,
        "Player",
        teams.iter().map(|t| {
            (
                t.team_code.as_str(),
                t.players_out.iter().map(|p| (p.id, Some(p.salary))).collect(),
                t.players_in.iter().map(|p| (p.id, Some(p.salary))).collect(),
            )
        }),
    );
    check_assets(
        &mut report,
        "Pick",
        teams.iter().map(|t| {
            (
                t.team_code.as_str(),
                t.picks_out.iter().map(|p| (p.id, None)).collect(),
                t.picks_in.iter().map(|p| (p.id, None)).collect(),
            )
        }),
    );

    report
}

type AssetSide = Vec<(i64, Option<f64>)>;

/// Conservation check for one asset namespace. Each team contributes its
/// outgoing and incoming `(id, salary)` lists.
fn check_assets<'t, I>(report: &mut StructureReport, kind: &str, sides: I)
where
    I: Iterator<Item = (&'t str, AssetSide, AssetSide)>,
{
    // id -> [(team, salary)]
    let mut senders: BTreeMap<i64, Vec<(&str, Option<f64>)>> = BTreeMap::new();
    let mut receivers: BTreeMap<i64, Vec<(&str, Option<f64>)>> = BTreeMap::new();

    for (team, outgoing, incoming) in sides {
        let out_ids: HashSet<i64> = outgoing.iter().map(|(id, _)| *id).collect();
        let mut reported = HashSet::new();
        for (id, _) in &incoming {
            if out_ids.contains(id) && reported.insert(*id) {
                report.fail(
                    format!("{kind} {id} is both sent and received by {team}."),
                    &[team],
                );
            }
        }
        for (id, salary) in outgoing {
            senders.entry(id).or_default().push((team, salary));
        }
        for (id, salary) in incoming {
            receivers.entry(id).or_default().push((team, salary));
        }
    }

    let empty = Vec::new();
    for (id, sent_by) in &senders {
        let received_by = receivers.get(id).unwrap_or(&empty);
        let teams: Vec<&str> = sent_by
            .iter()
            .chain(received_by.iter())
            .map(|(t, _)| *t)
            .collect();

        if sent_by.len() > 1 {
            report.fail(format!("{kind} {id} is sent by more than one team."), &teams);
            continue;
        }
        let (sender, sent_salary) = sent_by[0];
        let others: Vec<&(&str, Option<f64>)> =
            received_by.iter().filter(|(t, _)| *t != sender).collect();

        match others.as_slice() {
            [] => report.fail(
                format!("{kind} {id} leaves {sender} but no other team receives it."),
                &teams,
            ),
            [(receiver, received_salary)] => {
                if let (Some(a), Some(b)) = (sent_salary, received_salary) {
                    if (a - b).abs() > SALARY_EPSILON {
                        report.fail(
                            format!(
                                "{kind} {id} salary differs between {sender} ({}) and {receiver} ({}).",
                                money(a),
                                money(*b)
                            ),
                            &[sender, *receiver],
                        );
                    }
                }
            }
            _ => report.fail(
                format!("{kind} {id} is received by more than one team."),
                &teams,
            ),
        }
    }

    let mut orphans: HashMap<i64, Vec<&str>> = HashMap::new();
    for (id, received_by) in &receivers {
        if !senders.contains_key(id) {
            orphans
                .entry(*id)
                .or_default()
                .extend(received_by.iter().map(|(t, _)| *t));
        }
    }
    let mut orphan_ids: Vec<_> = orphans.into_iter().collect();
    orphan_ids.sort_by_key(|(id, _)| *id);
    for (id, teams) in orphan_ids {
        report.fail(
            format!(
                "{kind} {id} arrives at {} but no team sends it.",
                teams.join(", ")
            ),
            &teams,
        );
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Canonical form of a team code: trimmed and uppercased.
pub fn normalize_team_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Serde hook applying [`normalize_team_code`] to incoming codes.
pub fn deserialize_team_code<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|code| normalize_team_code(&code))
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn money(v: f64) -> String {
    format!("${v:.2}M")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::rules::{default_thresholds, CapRuleTable};

    fn caps() -> CapThresholds {
        CapThresholds::new(140.0, 170.0, 178.0, 189.0)
    }

    fn player(id: i64, salary: f64) -> TradedPlayer {
        TradedPlayer {
            id,
            name: format!("Player {id}"),
            salary,
        }
    }

    fn pick(id: i64) -> TradedPick {
        TradedPick {
            id,
            description: format!("2027 R1 #{id}"),
        }
    }

    fn team(code: &str, current_salary: f64, roster_size: u32) -> TeamFinancialState {
        TeamFinancialState {
            team_code: code.to_string(),
            current_salary,
            cap_space: 140.0 - current_salary,
            roster_size,
            players_out: vec![],
            players_in: vec![],
            picks_out: vec![],
            picks_in: vec![],
        }
    }

    /// Two-team swap: `a` sends `out` to `b`, `b` sends `back` to `a`.
    fn swap(
        mut a: TeamFinancialState,
        mut b: TeamFinancialState,
        out: Vec<TradedPlayer>,
        back: Vec<TradedPlayer>,
    ) -> Vec<TeamFinancialState> {
        a.players_out = out.clone();
        b.players_in = out;
        b.players_out = back.clone();
        a.players_in = back;
        vec![a, b]
    }

    #[test]
    fn balanced_taxpayer_swap_passes() {
        let teams = swap(
            team("LAL", 175.0, 14),
            team("BOS", 172.0, 14),
            vec![player(1, 5.0)],
            vec![player(2, 10.0)],
        );
        let result = validate_against(&teams, &caps(), RosterBounds::default());

        assert!(result.is_valid, "{:?}", result);
        assert!(result.overall_reasons.is_empty());
        let lal = result.team("LAL").unwrap();
        assert_eq!(lal.tax_status, TaxStatus::Taxpayer);
        assert_eq!(lal.max_allowed_incoming, 10.25);
        assert_eq!(lal.net_change, 5.0);
    }

    #[test]
    fn taxpayer_over_matching_limit_fails_with_reason() {
        let teams = swap(
            team("LAL", 175.0, 14),
            team("BOS", 160.0, 14),
            vec![player(1, 5.0)],
            vec![player(2, 11.0)],
        );
        let result = validate_against(&teams, &caps(), RosterBounds::default());

        assert!(!result.is_valid);
        let lal = result.team("LAL").unwrap();
        assert!(!lal.passed);
        assert_eq!(
            lal.reasons,
            vec!["Incoming salary $11.00M exceeds max allowed $10.25M under taxpayer rules."]
        );
        assert!(result.team("BOS").unwrap().passed);
    }

    #[test]
    fn under_cap_team_absorbs_with_room() {
        let mut a = team("OKC", 120.0, 13);
        a.cap_space = 20.0;
        let teams = swap(a, team("MEM", 150.0, 14), vec![player(1, 2.0)], vec![player(2, 22.0)]);
        let result = validate_against(&teams, &caps(), RosterBounds::default());

        let okc = result.team("OKC").unwrap();
        assert_eq!(okc.tax_status, TaxStatus::UnderCap);
        assert_eq!(okc.max_allowed_incoming, 22.0);
        assert!(okc.passed);
    }

    #[test]
    fn incoming_equal_to_limit_is_permitted() {
        let teams = swap(
            team("DEN", 215.0, 14),
            team("PHX", 150.0, 14),
            vec![player(1, 20.0)],
            vec![player(2, 20.0)],
        );
        let result = validate_against(&teams, &caps(), RosterBounds::default());
        let den = result.team("DEN").unwrap();
        // 215 - 20 = 195 -> second apron, limit is exactly the outgoing 20.
        assert_eq!(den.tax_status, TaxStatus::SecondApron);
        assert_eq!(den.max_allowed_incoming, 20.0);
        assert!(den.passed);
    }

    #[test]
    fn second_apron_is_hard_capped_at_outgoing() {
        let teams = swap(
            team("GSW", 215.0, 14),
            team("SAC", 150.0, 14),
            vec![player(1, 10.0)],
            vec![player(2, 10.5)],
        );
        let result = validate_against(&teams, &caps(), RosterBounds::default());
        let gsw = result.team("GSW").unwrap();
        assert_eq!(gsw.tax_status, TaxStatus::SecondApron);
        assert_eq!(gsw.max_allowed_incoming, 10.0);
        assert!(!gsw.passed);
        assert!(gsw.reasons[0].contains("second_apron"));
    }

    #[test]
    fn tax_status_uses_salary_after_sending() {
        // 185 - 10 = 175: taxpayer, not first apron.
        let teams = swap(
            team("MIA", 185.0, 14),
            team("ORL", 150.0, 14),
            vec![player(1, 10.0)],
            vec![player(2, 17.0)],
        );
        let result = validate_against(&teams, &caps(), RosterBounds::default());
        assert_eq!(result.team("MIA").unwrap().tax_status, TaxStatus::Taxpayer);
    }

    #[test]
    fn roster_bounds_are_enforced() {
        let teams = swap(
            team("NYK", 150.0, 12),
            team("BKN", 150.0, 15),
            vec![player(1, 3.0), player(2, 3.0)],
            vec![player(3, 3.0)],
        );
        let result = validate_against(&teams, &caps(), RosterBounds::default());

        let nyk = result.team("NYK").unwrap();
        assert_eq!(nyk.roster_size_after, 11);
        assert_eq!(
            nyk.reasons,
            vec!["Roster would drop to 11 players (minimum 12)."]
        );
        let bkn = result.team("BKN").unwrap();
        assert_eq!(bkn.roster_size_after, 16);
        assert!(!bkn.passed);
        assert!(!result.is_valid);
    }

    #[test]
    fn picks_only_trade_is_structurally_sound() {
        let mut a = team("UTA", 150.0, 14);
        let mut b = team("SAS", 150.0, 14);
        a.picks_out = vec![pick(7)];
        b.picks_in = vec![pick(7)];
        let result = validate_against(&[a, b], &caps(), RosterBounds::default());
        assert!(result.is_valid, "{:?}", result);
    }

    #[test]
    fn single_team_is_rejected() {
        let result = validate_against(&[team("LAL", 150.0, 14)], &caps(), RosterBounds::default());
        assert!(!result.is_valid);
        assert!(result
            .overall_reasons
            .contains(&"A trade must involve at least 2 teams.".to_string()));
    }

    #[test]
    fn empty_trade_is_rejected() {
        let result = validate_against(
            &[team("LAL", 180.0, 14), team("BOS", 190.0, 14)],
            &caps(),
            RosterBounds::default(),
        );
        assert!(!result.is_valid);
        assert_eq!(
            result.overall_reasons,
            vec!["No players or picks are being traded."]
        );
        // Structural issues that implicate no team still evaluate every team.
        assert_eq!(result.team_results.len(), 2);
    }

    #[test]
    fn unreceived_player_is_structural_failure() {
        let mut a = team("LAL", 150.0, 14);
        a.players_out = vec![player(1, 5.0)];
        let b = team("BOS", 150.0, 14);
        let result = validate_against(&[a, b], &caps(), RosterBounds::default());

        assert!(!result.is_valid);
        assert_eq!(
            result.overall_reasons,
            vec!["Player 1 leaves LAL but no other team receives it."]
        );
        assert!(result.team("LAL").is_none());
        assert!(result.team("BOS").is_some());
    }

    #[test]
    fn player_received_twice_is_structural_failure() {
        let mut a = team("LAL", 150.0, 14);
        let mut b = team("BOS", 150.0, 14);
        let mut c = team("NYK", 150.0, 14);
        a.players_out = vec![player(1, 5.0)];
        b.players_in = vec![player(1, 5.0)];
        c.players_in = vec![player(1, 5.0)];
        let result = validate_against(&[a, b, c], &caps(), RosterBounds::default());

        assert!(result
            .overall_reasons
            .contains(&"Player 1 is received by more than one team.".to_string()));
        assert!(result.team_results.is_empty());
    }

    #[test]
    fn orphan_incoming_pick_is_reported() {
        let mut a = team("LAL", 150.0, 14);
        let mut b = team("BOS", 150.0, 14);
        a.players_out = vec![player(1, 5.0)];
        b.players_in = vec![player(1, 5.0)];
        a.picks_in = vec![pick(9)];
        let result = validate_against(&[a, b], &caps(), RosterBounds::default());
        assert_eq!(
            result.overall_reasons,
            vec!["Pick 9 arrives at LAL but no team sends it."]
        );
    }

    #[test]
    fn same_asset_in_and_out_of_one_team() {
        let mut a = team("LAL", 150.0, 14);
        let mut b = team("BOS", 150.0, 14);
        a.players_out = vec![player(1, 5.0)];
        a.players_in = vec![player(1, 5.0)];
        b.players_in = vec![player(1, 5.0)];
        let result = validate_against(&[a, b], &caps(), RosterBounds::default());
        assert!(result
            .overall_reasons
            .contains(&"Player 1 is both sent and received by LAL.".to_string()));
        assert!(!result.is_valid);
    }

    #[test]
    fn duplicate_team_code_is_rejected() {
        let teams = swap(
            team("LAL", 150.0, 14),
            team("LAL", 150.0, 14),
            vec![player(1, 5.0)],
            vec![player(2, 5.0)],
        );
        let result = validate_against(&teams, &caps(), RosterBounds::default());
        assert!(result
            .overall_reasons
            .contains(&"Team LAL appears more than once.".to_string()));
        assert!(result.team_results.is_empty());
    }

    #[test]
    fn mismatched_salary_between_sides() {
        let mut a = team("LAL", 150.0, 14);
        let mut b = team("BOS", 150.0, 14);
        a.players_out = vec![player(1, 5.0)];
        b.players_in = vec![player(1, 6.0)];
        let result = validate_against(&[a, b], &caps(), RosterBounds::default());
        assert_eq!(result.overall_reasons.len(), 1);
        assert!(result.overall_reasons[0].contains("salary differs"));
    }

    #[test]
    fn validator_resolves_table_and_overrides() {
        let table = CapRuleTable::new();
        let validator = TradeValidator::new(&table, RosterBounds::default());
        let teams = swap(
            team("LAL", 175.0, 14),
            team("BOS", 150.0, 14),
            vec![player(1, 5.0)],
            vec![player(2, 5.0)],
        );

        // 2026 defaults: cap 148.1, tax 179.0 -> 170 is over_cap.
        let result = validator.validate(&teams, 2026);
        assert_eq!(result.team("LAL").unwrap().tax_status, TaxStatus::OverCap);
        assert_eq!(default_thresholds(2026).tax_line, 179.0);

        let overrides = CapOverrides {
            tax_line: Some(160.0),
            ..Default::default()
        };
        let result = validator.validate_with_overrides(&teams, 2026, Some(&overrides));
        assert_eq!(result.team("LAL").unwrap().tax_status, TaxStatus::Taxpayer);
    }

    #[test]
    fn request_deserializes_camel_case_with_defaults() {
        let json = r#"{
            "teams": [
                {"teamCode":"LAL","currentSalary":180,"capSpace":10,"rosterSize":14,
                 "playersOut":[{"id":1,"name":"A","salary":5}],"playersIn":[],"picksOut":[],"picksIn":[]},
                {"teamCode":"BOS","currentSalary":190,"capSpace":5,"rosterSize":14,
                 "playersIn":[{"id":1,"name":"A","salary":5}]}
            ]
        }"#;
        let req: ValidationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.year, DEFAULT_TRADE_YEAR);
        assert_eq!(req.teams[1].players_out.len(), 0);
        assert!(req.cap_overrides.is_none());
    }

    #[test]
    fn request_team_codes_are_normalized() {
        let json = r#"{
            "teams": [
                {"teamCode":" lal ","currentSalary":130,"capSpace":10,"rosterSize":14,
                 "playersOut":[{"id":1,"name":"A","salary":5}]},
                {"teamCode":"LAL","currentSalary":130,"capSpace":10,"rosterSize":14,
                 "playersIn":[{"id":1,"name":"A","salary":5}]},
                {"teamCode":"   ","currentSalary":130,"capSpace":10,"rosterSize":14}
            ]
        }"#;
        let req: ValidationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.teams[0].team_code, "LAL");
        assert_eq!(req.teams[2].team_code, "");

        let result = validate_against(&req.teams, &caps(), RosterBounds::default());
        assert!(!result.is_valid);
        assert!(result
            .overall_reasons
            .iter()
            .any(|r| r == "Team LAL appears more than once."));
        assert!(result
            .overall_reasons
            .iter()
            .any(|r| r == "A team in the trade has no team code."));
        assert!(result.team("").is_none());
    }

    #[test]
    fn outside_findings_are_structural() {
        let teams = swap(
            team("LAL", 130.0, 14),
            team("BOS", 130.0, 14),
            vec![player(1, 5.0)],
            vec![player(2, 5.0)],
        );
        let mut findings = StructureReport::default();
        findings.fail("Unknown team BOS.".into(), &["BOS"]);

        let result = validate_with_findings(&teams, &caps(), RosterBounds::default(), findings);
        assert!(!result.is_valid);
        assert_eq!(result.overall_reasons, vec!["Unknown team BOS."]);
        assert!(result.team("BOS").is_none());
        assert!(result.team("LAL").unwrap().passed);
    }

    #[test]
    fn result_serializes_camel_case() {
        let teams = swap(
            team("LAL", 175.0, 14),
            team("BOS", 172.0, 14),
            vec![player(1, 5.0)],
            vec![player(2, 10.0)],
        );
        let result = validate_against(&teams, &caps(), RosterBounds::default());
        let v = serde_json::to_value(&result).unwrap();
        assert_eq!(v["isValid"], true);
        assert_eq!(v["teamResults"][0]["taxStatus"], "taxpayer");
        assert_eq!(v["teamResults"][0]["maxAllowedIncoming"], 10.25);
    }
}
