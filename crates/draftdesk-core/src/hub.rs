// Session hub: the single task that owns every draft session and every
// connection, applies client commands in arrival order and fans results
// out to session members.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::protocol::{parse_client_message, ClientMessage, ServerMessage};
use crate::session::{SessionError, SessionRegistry};
use crate::trade::desk::TradeDesk;
use crate::trade::rules::DEFAULT_SPORT;
use crate::ws_server::{ConnId, WsEvent};

/// One open connection.
#[derive(Debug)]
struct Member {
    addr: String,
    session: Option<String>,
    outbox: mpsc::UnboundedSender<String>,
}

pub struct SessionHub {
    registry: SessionRegistry,
    members: HashMap<ConnId, Member>,
    desk: Option<Arc<TradeDesk>>,
}

impl SessionHub {
    pub fn new(registry: SessionRegistry) -> Self {
        SessionHub {
            registry,
            members: HashMap::new(),
            desk: None,
        }
    }

    /// Route trade requests to `desk`.
    pub fn with_trade_desk(mut self, desk: Arc<TradeDesk>) -> Self {
        self.desk = Some(desk);
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn connection_count(&self) -> usize {
        self.members.len()
    }

    /// Members currently joined to `code`.
    pub fn client_count(&self, code: &str) -> usize {
        self.members
            .values()
            .filter(|m| m.session.as_deref() == Some(code))
            .count()
    }

    pub fn handle_event(&mut self, event: WsEvent) {
        match event {
            WsEvent::Connected {
                conn_id,
                addr,
                outbox,
            } => {
                debug!("Connection {} registered from {}", conn_id, addr);
                self.members.insert(
                    conn_id,
                    Member {
                        addr,
                        session: None,
                        outbox,
                    },
                );
            }
            WsEvent::Message { conn_id, text } => self.handle_text(conn_id, &text),
            WsEvent::Disconnected { conn_id } => self.disconnect(conn_id),
        }
    }

    fn disconnect(&mut self, conn_id: ConnId) {
        let Some(member) = self.members.remove(&conn_id) else {
            return;
        };
        info!("Connection {} ({}) closed", conn_id, member.addr);
        if let Some(code) = member.session {
            self.broadcast_count(&code);
        }
    }

    fn handle_text(&mut self, conn_id: ConnId, text: &str) {
        if !self.members.contains_key(&conn_id) {
            warn!("Message from unknown connection {}", conn_id);
            return;
        }

        let msg = match parse_client_message(text) {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                debug!("Ignoring unrecognized message from {}: {}", conn_id, text);
                return;
            }
            Err(e) => {
                warn!("Bad message from {}: {}", conn_id, e);
                self.send_to(conn_id, &ServerMessage::error(e));
                return;
            }
        };

        match msg {
            ClientMessage::Join { code } => self.join(conn_id, &code),
            ClientMessage::Create => {
                let code = self.registry.create().code.clone();
                self.join(conn_id, &code);
            }
            msg if msg.needs_session() => self.apply_session_command(conn_id, msg),
            msg => self.dispatch_trade(conn_id, msg),
        }
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    fn join(&mut self, conn_id: ConnId, raw_code: &str) {
        let code = match self.registry.get_or_create(raw_code) {
            Ok((session, _)) => session.code.clone(),
            Err(e) => {
                self.send_to(conn_id, &ServerMessage::error(e));
                return;
            }
        };

        let previous = self
            .members
            .get_mut(&conn_id)
            .and_then(|m| m.session.replace(code.clone()));
        if let Some(previous) = previous.filter(|p| *p != code) {
            self.broadcast_count(&previous);
        }

        let clients = self.client_count(&code);
        info!("Connection {} joined session {} ({} client(s))", conn_id, code, clients);

        if let Some(session) = self.registry.get(&code) {
            let state = ServerMessage::SessionState {
                session: session.clone(),
                clients,
            };
            self.send_to(conn_id, &state);
        }
        self.broadcast_count(&code);
    }

    fn apply_session_command(&mut self, conn_id: ConnId, msg: ClientMessage) {
        let code = self.members.get(&conn_id).and_then(|m| m.session.clone());
        let Some(session) = code.as_deref().and_then(|c| self.registry.get_mut(c)) else {
            self.send_to(conn_id, &ServerMessage::error(SessionError::NotJoined));
            return;
        };

        let outcome = match msg {
            ClientMessage::Pick { pick } => session.pick(pick).map(|pick| ServerMessage::PickMade {
                pick,
                session: session.clone(),
            }),
            ClientMessage::SimPick { pick } => {
                session.sim_pick(pick).map(|pick| ServerMessage::PickMade {
                    pick,
                    session: session.clone(),
                })
            }
            ClientMessage::StartDraft(setup) => {
                session
                    .start_draft(setup)
                    .map(|()| ServerMessage::DraftStarted {
                        session: session.clone(),
                    })
            }
            ClientMessage::ResetDraft => {
                session.reset_draft();
                Ok(ServerMessage::DraftReset {
                    session: session.clone(),
                })
            }
            other => {
                warn!("Session command expected, got {:?}", other);
                return;
            }
        };

        let code = session.code.clone();
        match outcome {
            Ok(update) => self.broadcast(&code, &update),
            Err(e) => {
                debug!("Rejected command from {} in {}: {}", conn_id, code, e);
                self.send_to(conn_id, &ServerMessage::error(e));
            }
        }
    }

    // ------------------------------------------------------------------
    // Trades
    // ------------------------------------------------------------------

    /// Run a trade request on the blocking pool and reply to the sender
    /// only. Ledger access never stalls session traffic.
    fn dispatch_trade(&mut self, conn_id: ConnId, msg: ClientMessage) {
        let Some(outbox) = self.members.get(&conn_id).map(|m| m.outbox.clone()) else {
            return;
        };
        let Some(desk) = self.desk.clone() else {
            self.send_to(conn_id, &ServerMessage::error("trade desk is not available"));
            return;
        };

        tokio::task::spawn_blocking(move || {
            let reply = handle_trade(&desk, msg).unwrap_or_else(|e| {
                warn!("Trade request from {} failed: {}", conn_id, e);
                ServerMessage::error(e)
            });
            match reply.to_json() {
                Ok(json) => {
                    let _ = outbox.send(json);
                }
                Err(e) => warn!("Failed to serialize trade reply: {}", e),
            }
        });
    }

    // ------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------

    fn send_to(&mut self, conn_id: ConnId, msg: &ServerMessage) {
        let json = match msg.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize message: {}", e);
                return;
            }
        };
        let delivered = self
            .members
            .get(&conn_id)
            .is_some_and(|m| m.outbox.send(json).is_ok());
        if !delivered {
            self.disconnect(conn_id);
        }
    }

    fn broadcast_count(&mut self, code: &str) {
        let clients = self.client_count(code);
        self.broadcast(code, &ServerMessage::ClientCount { clients });
    }

    /// Queue `msg` for every member of `code`. Members whose outbox is gone
    /// are dropped and the remaining members get a fresh count.
    fn broadcast(&mut self, code: &str, msg: &ServerMessage) {
        let json = match msg.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize broadcast for {}: {}", code, e);
                return;
            }
        };

        let dead: Vec<ConnId> = self
            .members
            .iter()
            .filter(|(_, m)| m.session.as_deref() == Some(code))
            .filter(|(_, m)| m.outbox.send(json.clone()).is_err())
            .map(|(id, _)| *id)
            .collect();

        if dead.is_empty() {
            return;
        }
        for id in dead {
            debug!("Dropping closed connection {}", id);
            self.members.remove(&id);
        }
        self.broadcast_count(code);
    }
}

fn handle_trade(desk: &TradeDesk, msg: ClientMessage) -> anyhow::Result<ServerMessage> {
    let reply = match msg {
        ClientMessage::ValidateTrade(request) => ServerMessage::TradeValidated {
            result: desk.validate(&request)?,
        },
        ClientMessage::SaveTrade(proposal) => ServerMessage::TradeSaved {
            proposal: desk.save_proposal(&proposal)?,
        },
        ClientMessage::ValidateProposal { proposal_id, year } => ServerMessage::TradeSaved {
            proposal: desk.validate_proposal(proposal_id, year)?,
        },
        ClientMessage::ApplyTrade { proposal_id } => ServerMessage::TradeApplied {
            summary: desk.apply(proposal_id)?,
        },
        ClientMessage::GetTrade { proposal_id } => ServerMessage::TradeProposal {
            proposal: desk.proposal(proposal_id)?,
        },
        ClientMessage::ListTrades { sport } => ServerMessage::TradeList {
            proposals: desk.proposals(sport.as_deref().unwrap_or(DEFAULT_SPORT))?,
        },
        ClientMessage::DeleteTrade { proposal_id } => {
            desk.delete_proposal(proposal_id)?;
            ServerMessage::TradeDeleted { proposal_id }
        }
        other => anyhow::bail!("not a trade request: {:?}", other),
    };
    Ok(reply)
}

/// Drive the hub from the WebSocket event channel until every sender is
/// gone.
pub async fn run(mut rx: mpsc::Receiver<WsEvent>, mut hub: SessionHub) -> anyhow::Result<()> {
    info!("Session hub started");
    while let Some(event) = rx.recv().await {
        hub.handle_event(event);
    }
    info!(
        "Session hub stopped with {} session(s)",
        hub.registry.len()
    );
    Ok(())
}
