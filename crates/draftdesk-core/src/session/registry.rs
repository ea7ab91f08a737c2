// Session registry: every live draft session keyed by join code.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::info;
use uuid::Uuid;

use super::state::{DraftSession, SessionError};

/// Join-code characters. Omits I, O, 0 and 1 so codes read back cleanly.
pub const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LEN: usize = 6;
pub const MAX_CODE_LEN: usize = 8;

/// Mint a random join code.
pub fn generate_code() -> String {
    Uuid::new_v4().as_bytes()[..CODE_LEN]
        .iter()
        .map(|b| CODE_ALPHABET[*b as usize % CODE_ALPHABET.len()] as char)
        .collect()
}

/// Uppercase a client-supplied code and check its shape.
pub fn normalize_code(raw: &str) -> Result<String, SessionError> {
    let code = raw.trim().to_ascii_uppercase();
    if code.is_empty()
        || code.len() > MAX_CODE_LEN
        || !code.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(SessionError::InvalidCode(raw.to_string()));
    }
    Ok(code)
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, DraftSession>,
    sport: String,
}

impl SessionRegistry {
    /// Empty registry whose new sessions belong to `sport`.
    pub fn new(sport: impl Into<String>) -> Self {
        SessionRegistry {
            sessions: HashMap::new(),
            sport: sport.into(),
        }
    }

    /// Create a session under a freshly minted, unused code.
    pub fn create(&mut self) -> &mut DraftSession {
        let code = loop {
            let candidate = generate_code();
            if !self.sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        info!("Created draft session {}", code);
        let session = DraftSession::new(code.clone(), self.sport.clone());
        self.sessions.entry(code).or_insert(session)
    }

    /// Look up a session, creating a waiting one on first use of a code.
    /// The flag is true when the session was created by this call.
    pub fn get_or_create(&mut self, raw_code: &str) -> Result<(&mut DraftSession, bool), SessionError> {
        let code = normalize_code(raw_code)?;
        match self.sessions.entry(code) {
            Entry::Occupied(e) => Ok((e.into_mut(), false)),
            Entry::Vacant(e) => {
                info!("Created draft session {} on first join", e.key());
                let session = DraftSession::new(e.key().clone(), self.sport.clone());
                Ok((e.insert(session), true))
            }
        }
    }

    pub fn get(&self, code: &str) -> Option<&DraftSession> {
        self.sessions.get(&code.to_ascii_uppercase())
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut DraftSession> {
        self.sessions.get_mut(&code.to_ascii_uppercase())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
