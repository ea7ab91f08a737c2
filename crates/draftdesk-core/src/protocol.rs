// Wire protocol for the draft-session WebSocket: JSON text frames tagged
// by `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::session::{DraftSession, DraftSetup, SessionPick};
use crate::trade::proposal::{AppliedTradeSummary, NewTradeProposal, TradeProposal};
use crate::trade::validator::{ValidationRequest, ValidationResult, DEFAULT_TRADE_YEAR};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("message has no `type` field")]
    MissingType,

    #[error("malformed `{kind}` message: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        code: String,
    },
    /// Join a brand-new session under a server-minted code.
    Create,
    Pick {
        pick: SessionPick,
    },
    SimPick {
        #[serde(default)]
        pick: SessionPick,
    },
    StartDraft(DraftSetup),
    ResetDraft,

    ValidateTrade(ValidationRequest),
    SaveTrade(NewTradeProposal),
    #[serde(rename_all = "camelCase")]
    ValidateProposal {
        proposal_id: i64,
        #[serde(default = "default_year")]
        year: i32,
    },
    #[serde(rename_all = "camelCase")]
    ApplyTrade {
        proposal_id: i64,
    },
    #[serde(rename_all = "camelCase")]
    GetTrade {
        proposal_id: i64,
    },
    ListTrades {
        #[serde(default)]
        sport: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    DeleteTrade {
        proposal_id: i64,
    },
}

fn default_year() -> i32 {
    DEFAULT_TRADE_YEAR
}

/// Every `type` value [`ClientMessage`] understands.
const CLIENT_TYPES: &[&str] = &[
    "join",
    "create",
    "pick",
    "sim_pick",
    "start_draft",
    "reset_draft",
    "validate_trade",
    "save_trade",
    "validate_proposal",
    "apply_trade",
    "get_trade",
    "list_trades",
    "delete_trade",
];

impl ClientMessage {
    /// True for messages that only make sense inside a joined session.
    pub fn needs_session(&self) -> bool {
        matches!(
            self,
            ClientMessage::Pick { .. }
                | ClientMessage::SimPick { .. }
                | ClientMessage::StartDraft(_)
                | ClientMessage::ResetDraft
        )
    }
}

/// Parse one text frame. Unknown `type` values yield `Ok(None)`.
pub fn parse_client_message(text: &str) -> Result<Option<ClientMessage>, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?
        .to_string();

    if !CLIENT_TYPES.contains(&kind.as_str()) {
        return Ok(None);
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|source| ProtocolError::Malformed { kind, source })
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    SessionState {
        session: DraftSession,
        clients: usize,
    },
    ClientCount {
        clients: usize,
    },
    PickMade {
        pick: SessionPick,
        session: DraftSession,
    },
    DraftStarted {
        session: DraftSession,
    },
    DraftReset {
        session: DraftSession,
    },
    Error {
        message: String,
    },

    TradeValidated {
        result: ValidationResult,
    },
    TradeSaved {
        proposal: TradeProposal,
    },
    TradeApplied {
        summary: AppliedTradeSummary,
    },
    TradeProposal {
        proposal: TradeProposal,
    },
    TradeList {
        proposals: Vec<TradeProposal>,
    },
    #[serde(rename_all = "camelCase")]
    TradeDeleted {
        proposal_id: i64,
    },
}

impl ServerMessage {
    pub fn error(message: impl std::fmt::Display) -> Self {
        ServerMessage::Error {
            message: message.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
