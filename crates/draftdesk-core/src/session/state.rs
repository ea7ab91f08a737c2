// Draft session state machine: the authoritative state of one shared mock
// draft and the transitions clients may request.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Rounds a session holds before a draft is configured.
pub const DEFAULT_ROUNDS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("draft has already started")]
    AlreadyStarted,

    #[error("draft is already completed")]
    AlreadyCompleted,

    #[error("draft has not started")]
    NotStarted,

    #[error("invalid draft setup: {0}")]
    InvalidStart(String),

    #[error("pick {submitted} is stale; pick {current} is on the clock")]
    StalePick { submitted: usize, current: usize },

    #[error("player {0} is not available")]
    PlayerUnavailable(String),

    #[error("pick does not name a player")]
    MissingPlayer,

    #[error("invalid session code {0:?}")]
    InvalidCode(String),

    #[error("join a session first")]
    NotJoined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    #[serde(alias = "USER", alias = "user")]
    Human,
    #[serde(alias = "CPU", alias = "cpu", alias = "sim")]
    Simulated,
}

/// Who makes a team's picks. Accepts either a bare kind (`"human"`) or an
/// object (`{"type": "USER", "name": "Sam"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ControllerRepr")]
pub struct TeamController {
    #[serde(rename = "type")]
    pub kind: ControllerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ControllerRepr {
    Kind(ControllerKind),
    Detailed {
        #[serde(rename = "type")]
        kind: ControllerKind,
        #[serde(default)]
        name: Option<String>,
    },
}

impl From<ControllerRepr> for TeamController {
    fn from(repr: ControllerRepr) -> Self {
        match repr {
            ControllerRepr::Kind(kind) => TeamController { kind, name: None },
            ControllerRepr::Detailed { kind, name } => TeamController { kind, name },
        }
    }
}

impl TeamController {
    pub fn human() -> Self {
        TeamController {
            kind: ControllerKind::Human,
            name: None,
        }
    }

    pub fn simulated() -> Self {
        TeamController {
            kind: ControllerKind::Simulated,
            name: None,
        }
    }
}

/// One selection. Fields the server does not interpret are carried through
/// to every client untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPick {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_code: Option<String>,
    /// Pick slot the client believed was on the clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pick_index: Option<usize>,
    #[serde(default)]
    pub auto: bool,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl SessionPick {
    pub fn for_player(player_id: impl Into<String>) -> Self {
        SessionPick {
            player_id: Some(player_id.into()),
            ..SessionPick::default()
        }
    }

    /// The picked player's id, from `playerId` or a nested `player.id`.
    pub fn resolved_player_id(&self) -> Option<String> {
        if let Some(id) = &self.player_id {
            return Some(id.clone());
        }
        match self.details.get("player")?.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Team named by a client that sent `team` instead of `teamCode`.
    fn client_team(&self) -> Option<String> {
        self.details
            .get("team")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Draft configuration supplied by `start_draft`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSetup {
    pub team_controllers: BTreeMap<String, TeamController>,
    pub rounds: u32,
    pub available_player_ids: Vec<String>,
    #[serde(default)]
    pub draft_order: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSession {
    pub code: String,
    pub status: SessionStatus,
    pub sport: String,
    pub rounds: u32,
    pub current_pick_index: usize,
    pub team_controllers: BTreeMap<String, TeamController>,
    pub draft_order: Vec<String>,
    pub picks: Vec<SessionPick>,
    pub available_player_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl DraftSession {
    pub fn new(code: impl Into<String>, sport: impl Into<String>) -> Self {
        DraftSession {
            code: code.into(),
            status: SessionStatus::Waiting,
            sport: sport.into(),
            rounds: DEFAULT_ROUNDS,
            current_pick_index: 0,
            team_controllers: BTreeMap::new(),
            draft_order: Vec::new(),
            picks: Vec::new(),
            available_player_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Teams picking each round: the explicit order when one was given,
    /// otherwise every controlled team.
    pub fn team_count(&self) -> usize {
        if self.draft_order.is_empty() {
            self.team_controllers.len()
        } else {
            self.draft_order.len()
        }
    }

    pub fn total_picks(&self) -> usize {
        self.rounds as usize * self.team_count()
    }

    /// Team whose pick is current, if the draft is running.
    pub fn on_the_clock(&self) -> Option<&str> {
        if self.status != SessionStatus::InProgress || self.team_count() == 0 {
            return None;
        }
        let slot = self.current_pick_index % self.team_count();
        if self.draft_order.is_empty() {
            self.team_controllers.keys().nth(slot).map(String::as_str)
        } else {
            self.draft_order.get(slot).map(String::as_str)
        }
    }

    pub fn start_draft(&mut self, setup: DraftSetup) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::Waiting => {}
            SessionStatus::InProgress => return Err(SessionError::AlreadyStarted),
            SessionStatus::Completed => return Err(SessionError::AlreadyCompleted),
        }
        if setup.rounds < 1 {
            return Err(SessionError::InvalidStart("rounds must be at least 1".into()));
        }
        if setup.team_controllers.is_empty() && setup.draft_order.is_empty() {
            return Err(SessionError::InvalidStart("no teams in the draft".into()));
        }

        let mut seen = HashSet::new();
        let pool: Vec<String> = setup
            .available_player_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        if pool.is_empty() {
            return Err(SessionError::InvalidStart("player pool is empty".into()));
        }

        self.team_controllers = setup.team_controllers;
        self.draft_order = setup.draft_order;
        self.rounds = setup.rounds;
        self.available_player_ids = pool;
        self.picks.clear();
        self.current_pick_index = 0;
        self.status = SessionStatus::InProgress;
        Ok(())
    }

    /// Record a human selection.
    pub fn pick(&mut self, pick: SessionPick) -> Result<SessionPick, SessionError> {
        self.record(pick, false)
    }

    /// Record a simulated selection. A pick without a player takes the
    /// first player left in the pool.
    pub fn sim_pick(&mut self, mut pick: SessionPick) -> Result<SessionPick, SessionError> {
        if pick.resolved_player_id().is_none() && self.status == SessionStatus::InProgress {
            pick.player_id = self.available_player_ids.first().cloned();
        }
        self.record(pick, true)
    }

    fn record(&mut self, mut pick: SessionPick, auto: bool) -> Result<SessionPick, SessionError> {
        match self.status {
            SessionStatus::InProgress => {}
            SessionStatus::Waiting => return Err(SessionError::NotStarted),
            SessionStatus::Completed => return Err(SessionError::AlreadyCompleted),
        }
        if let Some(submitted) = pick.pick_index {
            if submitted != self.current_pick_index {
                return Err(SessionError::StalePick {
                    submitted,
                    current: self.current_pick_index,
                });
            }
        }

        let player_id = pick.resolved_player_id().ok_or(SessionError::MissingPlayer)?;
        let Some(pos) = self.available_player_ids.iter().position(|id| *id == player_id) else {
            return Err(SessionError::PlayerUnavailable(player_id));
        };

        if pick.team_code.is_none() {
            pick.team_code = pick
                .client_team()
                .or_else(|| self.on_the_clock().map(str::to_string));
        }
        pick.player_id = Some(player_id);
        pick.pick_index = Some(self.current_pick_index);
        pick.auto = auto;

        self.available_player_ids.remove(pos);
        self.picks.push(pick.clone());
        self.current_pick_index += 1;

        if self.current_pick_index >= self.total_picks() || self.available_player_ids.is_empty() {
            self.status = SessionStatus::Completed;
        }
        Ok(pick)
    }

    /// Return to an empty waiting session. Valid from any state.
    pub fn reset_draft(&mut self) {
        self.status = SessionStatus::Waiting;
        self.rounds = DEFAULT_ROUNDS;
        self.current_pick_index = 0;
        self.team_controllers.clear();
        self.draft_order.clear();
        self.picks.clear();
        self.available_player_ids.clear();
    }
}
