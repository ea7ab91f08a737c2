// Cap rule table: per-season league thresholds and the ordered tax-band
// ladder used for salary matching.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// League used when a caller does not name one.
pub const DEFAULT_SPORT: &str = "NBA";

pub const DEFAULT_MIN_SALARY: f64 = 1.1;
pub const DEFAULT_MAX_SALARY: f64 = 51.4;

/// First season with a published record; earlier years resolve to it.
const FIRST_SEASON: i32 = 2025;

/// Published thresholds: (year, cap, tax line, first apron, second apron).
const PUBLISHED_SEASONS: [(i32, f64, f64, f64, f64); 3] = [
    (2025, 140.6, 170.8, 178.1, 188.9),
    (2026, 148.1, 179.0, 186.5, 197.5),
    (2027, 155.0, 187.0, 195.0, 206.0),
];

/// Yearly growth applied when projecting past the last published season.
const PROJECTION_GROWTH: f64 = 1.05;

/// Salary-matching tiers for teams over the cap but below the first apron:
/// (outgoing salary upper bound, multiplier). Scanned in order.
const MATCHING_TIERS: [(f64, f64); 3] = [(7.5, 2.0), (29.0, 1.75), (f64::INFINITY, 1.25)];
const MATCHING_ALLOWANCE: f64 = 0.25;

const FIRST_APRON_MULTIPLIER: f64 = 1.10;
const FIRST_APRON_ALLOWANCE: f64 = 0.10;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("`{field}` must be a positive finite amount, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error(
        "thresholds must ascend (cap < tax line < first apron < second apron), \
         got {salary_cap} / {tax_line} / {first_apron} / {second_apron}"
    )]
    NotAscending {
        salary_cap: f64,
        tax_line: f64,
        first_apron: f64,
        second_apron: f64,
    },

    #[error("minimum salary {min} exceeds maximum salary {max}")]
    SalaryRange { min: f64, max: f64 },
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Financial thresholds for one league season, in millions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapThresholds {
    pub salary_cap: f64,
    pub tax_line: f64,
    pub first_apron: f64,
    pub second_apron: f64,
    #[serde(default = "default_min_salary")]
    pub min_salary: f64,
    #[serde(default = "default_max_salary")]
    pub max_salary: f64,
}

fn default_min_salary() -> f64 {
    DEFAULT_MIN_SALARY
}

fn default_max_salary() -> f64 {
    DEFAULT_MAX_SALARY
}

/// Partial replacement for any of the four band thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapOverrides {
    pub salary_cap: Option<f64>,
    pub tax_line: Option<f64>,
    pub first_apron: Option<f64>,
    pub second_apron: Option<f64>,
}

impl CapThresholds {
    pub fn new(salary_cap: f64, tax_line: f64, first_apron: f64, second_apron: f64) -> Self {
        CapThresholds {
            salary_cap,
            tax_line,
            first_apron,
            second_apron,
            min_salary: DEFAULT_MIN_SALARY,
            max_salary: DEFAULT_MAX_SALARY,
        }
    }

    /// Check that every amount is positive and the four bands ascend strictly.
    pub fn validate(&self) -> Result<(), ThresholdError> {
        let fields = [
            ("salary_cap", self.salary_cap),
            ("tax_line", self.tax_line),
            ("first_apron", self.first_apron),
            ("second_apron", self.second_apron),
            ("min_salary", self.min_salary),
            ("max_salary", self.max_salary),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(ThresholdError::NotPositive { field, value });
            }
        }

        if !(self.salary_cap < self.tax_line
            && self.tax_line < self.first_apron
            && self.first_apron < self.second_apron)
        {
            return Err(ThresholdError::NotAscending {
                salary_cap: self.salary_cap,
                tax_line: self.tax_line,
                first_apron: self.first_apron,
                second_apron: self.second_apron,
            });
        }

        if self.min_salary > self.max_salary {
            return Err(ThresholdError::SalaryRange {
                min: self.min_salary,
                max: self.max_salary,
            });
        }

        Ok(())
    }

    /// Layer overrides on top of these thresholds.
    pub fn with_overrides(self, overrides: &CapOverrides) -> Self {
        CapThresholds {
            salary_cap: overrides.salary_cap.unwrap_or(self.salary_cap),
            tax_line: overrides.tax_line.unwrap_or(self.tax_line),
            first_apron: overrides.first_apron.unwrap_or(self.first_apron),
            second_apron: overrides.second_apron.unwrap_or(self.second_apron),
            ..self
        }
    }

    /// The band ladder for this season, lowest floor first.
    pub fn bands(&self) -> [TaxBand; 5] {
        [
            TaxBand {
                floor: f64::NEG_INFINITY,
                status: TaxStatus::UnderCap,
                rule: IncomingRule::CapRoom,
            },
            TaxBand {
                floor: self.salary_cap,
                status: TaxStatus::OverCap,
                rule: IncomingRule::Matching,
            },
            TaxBand {
                floor: self.tax_line,
                status: TaxStatus::Taxpayer,
                rule: IncomingRule::Matching,
            },
            TaxBand {
                floor: self.first_apron,
                status: TaxStatus::FirstApron,
                rule: IncomingRule::Scaled {
                    multiplier: FIRST_APRON_MULTIPLIER,
                    allowance: FIRST_APRON_ALLOWANCE,
                },
            },
            TaxBand {
                floor: self.second_apron,
                status: TaxStatus::SecondApron,
                rule: IncomingRule::HardCap,
            },
        ]
    }

    /// Highest band whose floor `salary` reaches. Reaching a floor exactly
    /// counts as crossing into that band.
    pub fn band_for(&self, salary: f64) -> TaxBand {
        let bands = self.bands();
        let mut current = bands[0];
        for band in bands {
            if salary >= band.floor {
                current = band;
            }
        }
        current
    }

    pub fn tax_status(&self, salary: f64) -> TaxStatus {
        self.band_for(salary).status
    }
}

// ---------------------------------------------------------------------------
// Bands
// ---------------------------------------------------------------------------

/// Where a team's payroll sits relative to the season thresholds. Variants
/// are declared from most to least permissive, so `Ord` ranks restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxStatus {
    UnderCap,
    /// Over the cap but below the tax line. Uses taxpayer matching.
    OverCap,
    Taxpayer,
    FirstApron,
    SecondApron,
}

impl TaxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxStatus::UnderCap => "under_cap",
            TaxStatus::OverCap => "over_cap",
            TaxStatus::Taxpayer => "taxpayer",
            TaxStatus::FirstApron => "first_apron",
            TaxStatus::SecondApron => "second_apron",
        }
    }
}

impl fmt::Display for TaxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much incoming salary a band allows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IncomingRule {
    /// Cap space plus whatever is sent out.
    CapRoom,
    /// Tiered multiplier on outgoing salary plus a fixed allowance.
    Matching,
    /// Flat multiplier on outgoing salary plus a fixed allowance.
    Scaled { multiplier: f64, allowance: f64 },
    /// Incoming may not exceed outgoing.
    HardCap,
}

impl IncomingRule {
    pub fn max_incoming(&self, salary_out: f64, cap_space: f64) -> f64 {
        match *self {
            IncomingRule::CapRoom => cap_space + salary_out,
            IncomingRule::Matching => matching_limit(salary_out),
            IncomingRule::Scaled {
                multiplier,
                allowance,
            } => salary_out * multiplier + allowance,
            IncomingRule::HardCap => salary_out,
        }
    }
}

/// One rung of the band ladder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxBand {
    pub floor: f64,
    pub status: TaxStatus,
    pub rule: IncomingRule,
}

/// Tiered salary-matching limit for over-cap teams below the first apron.
pub fn matching_limit(salary_out: f64) -> f64 {
    let multiplier = MATCHING_TIERS
        .iter()
        .find(|(upper, _)| salary_out <= *upper)
        .map(|(_, m)| *m)
        .unwrap_or(MATCHING_TIERS[MATCHING_TIERS.len() - 1].1);
    salary_out * multiplier + MATCHING_ALLOWANCE
}

// ---------------------------------------------------------------------------
// Roster bounds
// ---------------------------------------------------------------------------

/// Inclusive active-roster size limits after a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterBounds {
    pub min: u32,
    pub max: u32,
}

impl Default for RosterBounds {
    fn default() -> Self {
        RosterBounds { min: 12, max: 15 }
    }
}

impl RosterBounds {
    pub fn contains(&self, size: i64) -> bool {
        size >= i64::from(self.min) && size <= i64::from(self.max)
    }
}

// ---------------------------------------------------------------------------
// Season lookup
// ---------------------------------------------------------------------------

/// Expand two-digit season years (`26` -> `2026`).
pub fn normalize_year(year: i32) -> i32 {
    if (0..100).contains(&year) {
        year + 2000
    } else {
        year
    }
}

/// Built-in thresholds for a season. Seasons before the first published one
/// use it; seasons past the last are projected at 5% yearly growth.
pub fn default_thresholds(year: i32) -> CapThresholds {
    let year = normalize_year(year).max(FIRST_SEASON);

    if let Some(&(_, cap, tax, first, second)) =
        PUBLISHED_SEASONS.iter().find(|(y, ..)| *y == year)
    {
        return CapThresholds::new(cap, tax, first, second);
    }

    let (last_year, cap, tax, first, second) = PUBLISHED_SEASONS[PUBLISHED_SEASONS.len() - 1];
    let growth = PROJECTION_GROWTH.powi(year - last_year);
    let project = |v: f64| (v * growth * 10.0).round() / 10.0;
    CapThresholds::new(project(cap), project(tax), project(first), project(second))
}

/// Versioned threshold lookup keyed by `(league, season)`. Seasons without
/// a record fall back to [`default_thresholds`].
#[derive(Debug, Clone, Default)]
pub struct CapRuleTable {
    records: BTreeMap<(String, i32), CapThresholds>,
}

impl CapRuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(league, season, thresholds)` records, rejecting
    /// the first record that fails validation.
    pub fn from_records<I>(records: I) -> Result<Self, ThresholdError>
    where
        I: IntoIterator<Item = (String, i32, CapThresholds)>,
    {
        let mut table = CapRuleTable::new();
        for (sport, year, thresholds) in records {
            table.insert(&sport, year, thresholds)?;
        }
        Ok(table)
    }

    pub fn insert(
        &mut self,
        sport: &str,
        year: i32,
        thresholds: CapThresholds,
    ) -> Result<(), ThresholdError> {
        thresholds.validate()?;
        self.records
            .insert((sport.to_uppercase(), normalize_year(year)), thresholds);
        Ok(())
    }

    /// Record for the exact league and season, if one was loaded.
    pub fn record(&self, year: i32, sport: &str) -> Option<CapThresholds> {
        self.records
            .get(&(sport.to_uppercase(), normalize_year(year)))
            .copied()
    }

    pub fn thresholds(&self, year: i32, sport: &str) -> CapThresholds {
        self.record(year, sport)
            .unwrap_or_else(|| default_thresholds(year))
    }

    /// All loaded seasons for a league, oldest first.
    pub fn seasons(&self, sport: &str) -> Vec<(i32, CapThresholds)> {
        let sport = sport.to_uppercase();
        self.records
            .iter()
            .filter(|((s, _), _)| *s == sport)
            .map(|((_, year), t)| (*year, *t))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_caps() -> CapThresholds {
        CapThresholds::new(140.0, 170.0, 178.0, 189.0)
    }

    #[test]
    fn published_season_lookup() {
        let t = default_thresholds(2026);
        assert_eq!(t.salary_cap, 148.1);
        assert_eq!(t.second_apron, 197.5);
        assert_eq!(t.min_salary, DEFAULT_MIN_SALARY);
    }

    #[test]
    fn two_digit_year_normalized() {
        assert_eq!(default_thresholds(26), default_thresholds(2026));
    }

    #[test]
    fn early_years_use_first_season() {
        assert_eq!(default_thresholds(2019), default_thresholds(2025));
    }

    #[test]
    fn later_years_are_projected() {
        let t = default_thresholds(2028);
        // 155.0 * 1.05 = 162.75 -> 162.8
        assert!((t.salary_cap - 162.8).abs() < 1e-9);
        assert!((t.second_apron - 216.3).abs() < 1e-9);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn over_cap_under_tax_is_its_own_band() {
        assert_eq!(example_caps().tax_status(150.0), TaxStatus::OverCap);
    }

    #[test]
    fn reaching_a_floor_crosses_into_the_band() {
        let caps = example_caps();
        assert_eq!(caps.tax_status(139.99), TaxStatus::UnderCap);
        assert_eq!(caps.tax_status(140.0), TaxStatus::OverCap);
        assert_eq!(caps.tax_status(170.0), TaxStatus::Taxpayer);
        assert_eq!(caps.tax_status(178.0), TaxStatus::FirstApron);
        assert_eq!(caps.tax_status(189.0), TaxStatus::SecondApron);
    }

    #[test]
    fn matching_tiers() {
        assert!((matching_limit(5.0) - 10.25).abs() < 1e-9);
        assert!((matching_limit(7.5) - 15.25).abs() < 1e-9);
        assert!((matching_limit(20.0) - 35.25).abs() < 1e-9);
        assert!((matching_limit(40.0) - 50.25).abs() < 1e-9);
    }

    #[test]
    fn band_rules() {
        let caps = example_caps();
        assert_eq!(caps.band_for(100.0).rule.max_incoming(5.0, 12.0), 17.0);
        assert!((caps.band_for(180.0).rule.max_incoming(10.0, 0.0) - 11.1).abs() < 1e-9);
        assert_eq!(caps.band_for(200.0).rule.max_incoming(10.0, -50.0), 10.0);
    }

    #[test]
    fn validate_rejects_unordered_thresholds() {
        let bad = CapThresholds::new(140.0, 130.0, 178.0, 189.0);
        assert!(matches!(bad.validate(), Err(ThresholdError::NotAscending { .. })));

        let equal = CapThresholds::new(140.0, 170.0, 170.0, 189.0);
        assert!(equal.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_positive() {
        let bad = CapThresholds::new(0.0, 170.0, 178.0, 189.0);
        assert_eq!(
            bad.validate(),
            Err(ThresholdError::NotPositive {
                field: "salary_cap",
                value: 0.0
            })
        );
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let t = example_caps().with_overrides(&CapOverrides {
            tax_line: Some(171.0),
            ..Default::default()
        });
        assert_eq!(t.salary_cap, 140.0);
        assert_eq!(t.tax_line, 171.0);
    }

    #[test]
    fn table_prefers_records_and_falls_back() {
        let table =
            CapRuleTable::from_records(vec![("nba".to_string(), 2026, example_caps())]).unwrap();
        assert_eq!(table.thresholds(2026, "NBA"), example_caps());
        assert_eq!(table.thresholds(2027, "NBA"), default_thresholds(2027));
        assert_eq!(table.seasons("NBA").len(), 1);
        assert!(table.seasons("NFL").is_empty());
    }

    #[test]
    fn table_rejects_invalid_record() {
        let bad = CapThresholds::new(200.0, 170.0, 178.0, 189.0);
        assert!(CapRuleTable::from_records(vec![("NBA".to_string(), 2026, bad)]).is_err());
    }

    #[test]
    fn roster_bounds_inclusive() {
        let b = RosterBounds::default();
        assert!(!b.contains(11));
        assert!(b.contains(12));
        assert!(b.contains(15));
        assert!(!b.contains(16));
    }
}
