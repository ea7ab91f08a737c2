// Integration tests for the draft-room protocol, driven through the session
// hub the way the WebSocket server drives it.

use std::sync::Arc;

use draftdesk_core::db::Database;
use draftdesk_core::hub::{self, SessionHub};
use draftdesk_core::ledger::RosterPlayer;
use draftdesk_core::session::SessionRegistry;
use draftdesk_core::trade::desk::TradeDesk;
use draftdesk_core::trade::rules::{CapRuleTable, RosterBounds};
use draftdesk_core::ws_server::{ConnId, WsEvent};
use serde_json::Value;
use tokio::sync::mpsc;

// ===========================================================================
// Test helpers
// ===========================================================================

struct TestClient {
    id: ConnId,
    rx: mpsc::UnboundedReceiver<String>,
}

impl TestClient {
    async fn recv(&mut self) -> Value {
        let text = tokio::time::timeout(std::time::Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("outbox closed");
        serde_json::from_str(&text).unwrap()
    }

    /// Next message whose `type` is not a client count.
    async fn recv_update(&mut self) -> Value {
        loop {
            let msg = self.recv().await;
            if msg["type"] != "client_count" {
                return msg;
            }
        }
    }
}

async fn connect(tx: &mpsc::Sender<WsEvent>, id: ConnId) -> TestClient {
    let (outbox, rx) = mpsc::unbounded_channel();
    tx.send(WsEvent::Connected {
        conn_id: id,
        addr: format!("10.0.0.{id}:5000"),
        outbox,
    })
    .await
    .unwrap();
    TestClient { id, rx }
}

async fn send(tx: &mpsc::Sender<WsEvent>, client: &TestClient, text: &str) {
    tx.send(WsEvent::Message {
        conn_id: client.id,
        text: text.to_string(),
    })
    .await
    .unwrap();
}

fn spawn_hub(hub: SessionHub) -> (mpsc::Sender<WsEvent>, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(64);
    let handle = tokio::spawn(async move {
        hub::run(rx, hub).await.unwrap();
    });
    (tx, handle)
}

fn trade_desk() -> Arc<TradeDesk> {
    let db = Arc::new(Database::open(":memory:").unwrap());
    let mut players = Vec::new();
    for i in 0..13 {
        for (team, base, salary) in [("LAL", 0, 10.0), ("BOS", 100, 13.0)] {
            players.push(RosterPlayer {
                id: base + i,
                team_code: team.into(),
                name: format!("{team} {i}"),
                position: "G".into(),
                cap_hit: Some(salary),
                status: "active".into(),
                sport: "NBA".into(),
            });
        }
    }
    db.upsert_roster_players(&players).unwrap();
    Arc::new(TradeDesk::new(db, CapRuleTable::new(), RosterBounds::default()))
}

const START_DRAFT: &str = r#"{
    "type": "start_draft",
    "teamControllers": {"BUF": {"type": "USER", "name": "Sam"}, "KC": {"type": "CPU"}},
    "draftOrder": ["KC", "BUF"],
    "rounds": 2,
    "availablePlayerIds": ["qb1", "wr1", "rb1", "te1", "k1"]
}"#;

// ===========================================================================
// Draft sessions
// ===========================================================================

#[tokio::test]
async fn join_by_code_creates_waiting_session() {
    let (tx, _hub) = spawn_hub(SessionHub::new(SessionRegistry::new("NFL")));
    let mut client = connect(&tx, 1).await;

    send(&tx, &client, r#"{"type":"join","code":"AB12CD"}"#).await;
    let state = client.recv().await;
    assert_eq!(state["type"], "session_state");
    assert_eq!(state["session"]["code"], "AB12CD");
    assert_eq!(state["session"]["status"], "waiting");
    assert_eq!(state["session"]["currentPickIndex"], 0);
    assert_eq!(state["session"]["picks"].as_array().unwrap().len(), 0);
    assert_eq!(state["clients"], 1);
}

#[tokio::test]
async fn full_draft_is_seen_identically_by_all_members() {
    let (tx, _hub) = spawn_hub(SessionHub::new(SessionRegistry::new("NFL")));
    let mut host = connect(&tx, 1).await;
    let mut guest = connect(&tx, 2).await;

    send(&tx, &host, r#"{"type":"join","code":"ROOM42"}"#).await;
    assert_eq!(host.recv().await["type"], "session_state");
    send(&tx, &guest, r#"{"type":"join","code":"room42"}"#).await;
    assert_eq!(guest.recv().await["clients"], 2);

    send(&tx, &host, START_DRAFT).await;
    for client in [&mut host, &mut guest] {
        let started = client.recv_update().await;
        assert_eq!(started["type"], "draft_started");
        assert_eq!(started["session"]["status"], "in_progress");
    }

    // KC is first on the clock. Stale index 3 is rejected for the sender only.
    send(&tx, &guest, r#"{"type":"pick","pick":{"playerId":"wr1","pickIndex":3}}"#).await;
    let err = guest.recv_update().await;
    assert_eq!(err["type"], "error");
    assert!(err["message"].as_str().unwrap().contains("stale"));

    send(&tx, &guest, r#"{"type":"pick","pick":{"playerId":"wr1","pickIndex":0}}"#).await;
    send(&tx, &host, r#"{"type":"sim_pick"}"#).await;
    send(&tx, &host, r#"{"type":"pick","pick":{"player":{"id":"te1"}}}"#).await;
    send(&tx, &guest, r#"{"type":"sim_pick"}"#).await;

    let mut host_seen = Vec::new();
    let mut guest_seen = Vec::new();
    for _ in 0..4 {
        host_seen.push(host.recv_update().await);
        guest_seen.push(guest.recv_update().await);
    }
    assert_eq!(host_seen, guest_seen);

    let players: Vec<&str> = host_seen
        .iter()
        .map(|m| m["pick"]["playerId"].as_str().unwrap())
        .collect();
    assert_eq!(players, ["wr1", "qb1", "te1", "rb1"]);
    let teams: Vec<&str> = host_seen
        .iter()
        .map(|m| m["pick"]["teamCode"].as_str().unwrap())
        .collect();
    assert_eq!(teams, ["KC", "BUF", "KC", "BUF"]);

    let last = &host_seen[3]["session"];
    assert_eq!(last["status"], "completed");
    assert_eq!(last["currentPickIndex"], 4);
    assert_eq!(last["availablePlayerIds"], serde_json::json!(["k1"]));

    send(&tx, &host, r#"{"type":"sim_pick"}"#).await;
    assert_eq!(host.recv_update().await["type"], "error");

    send(&tx, &guest, r#"{"type":"reset_draft"}"#).await;
    for client in [&mut host, &mut guest] {
        let reset = client.recv_update().await;
        assert_eq!(reset["type"], "draft_reset");
        assert_eq!(reset["session"]["status"], "waiting");
        assert_eq!(reset["session"]["picks"].as_array().unwrap().len(), 0);
    }
}

#[tokio::test]
async fn pick_team_key_reaches_every_member() {
    let (tx, _hub) = spawn_hub(SessionHub::new(SessionRegistry::new("NFL")));
    let mut host = connect(&tx, 1).await;
    let mut guest = connect(&tx, 2).await;

    send(&tx, &host, r#"{"type":"join","code":"TEAM01"}"#).await;
    host.recv().await;
    send(&tx, &guest, r#"{"type":"join","code":"TEAM01"}"#).await;
    guest.recv().await;

    send(&tx, &host, START_DRAFT).await;
    host.recv_update().await;
    guest.recv_update().await;

    send(&tx, &host, r#"{"type":"pick","pick":{"playerId":"qb1","team":"KC","note":"franchise"}}"#).await;
    for client in [&mut host, &mut guest] {
        let made = client.recv_update().await;
        assert_eq!(made["pick"]["team"], "KC");
        assert_eq!(made["pick"]["teamCode"], "KC");
        assert_eq!(made["pick"]["note"], "franchise");
    }
}

#[tokio::test]
async fn sessions_are_isolated() {
    let (tx, _hub) = spawn_hub(SessionHub::new(SessionRegistry::new("NFL")));
    let mut a = connect(&tx, 1).await;
    let mut b = connect(&tx, 2).await;

    send(&tx, &a, r#"{"type":"join","code":"ALPHA1"}"#).await;
    send(&tx, &b, r#"{"type":"create"}"#).await;
    a.recv().await;
    let created = b.recv().await;
    assert_eq!(created["type"], "session_state");
    assert_ne!(created["session"]["code"], "ALPHA1");
    assert_eq!(created["session"]["code"].as_str().unwrap().len(), 6);

    send(&tx, &a, START_DRAFT).await;
    assert_eq!(a.recv_update().await["type"], "draft_started");

    // Anything `b` receives now must come from its own session.
    send(&tx, &b, r#"{"type":"reset_draft"}"#).await;
    let update = b.recv_update().await;
    assert_eq!(update["type"], "draft_reset");
    assert_eq!(update["session"]["code"], created["session"]["code"]);
}

#[tokio::test]
async fn hub_stops_when_server_side_closes() {
    let (tx, handle) = spawn_hub(SessionHub::new(SessionRegistry::new("NFL")));
    let client = connect(&tx, 1).await;
    send(&tx, &client, r#"{"type":"join","code":"BYE123"}"#).await;
    drop(tx);
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("hub did not stop")
        .unwrap();
}

// ===========================================================================
// Trades over the socket
// ===========================================================================

#[tokio::test]
async fn trade_requests_reply_to_sender() {
    let hub = SessionHub::new(SessionRegistry::new("NBA")).with_trade_desk(trade_desk());
    let (tx, _hub) = spawn_hub(hub);
    let mut gm = connect(&tx, 1).await;

    let validate = r#"{
        "type": "validate_trade",
        "year": 2026,
        "teams": [
            {"teamCode": "LAL", "currentSalary": 150.0, "capSpace": -1.9, "rosterSize": 13,
             "playersOut": [{"id": 1, "name": "A", "salary": 5.0}]},
            {"teamCode": "BOS", "currentSalary": 120.0, "capSpace": 28.1, "rosterSize": 13,
             "playersIn": [{"id": 1, "name": "A", "salary": 5.0}]}
        ]
    }"#;
    send(&tx, &gm, validate).await;
    let reply = gm.recv().await;
    assert_eq!(reply["type"], "trade_validated");
    assert_eq!(reply["result"]["isValid"], true);

    let save = r#"{
        "type": "save_trade",
        "name": "Swap",
        "legs": [
            {"fromTeamCode": "LAL", "toTeamCode": "BOS", "playerIds": [1]},
            {"fromTeamCode": "BOS", "toTeamCode": "LAL", "playerIds": [101]}
        ]
    }"#;
    send(&tx, &gm, save).await;
    let saved = gm.recv().await;
    assert_eq!(saved["type"], "trade_saved");
    assert_eq!(saved["proposal"]["status"], "draft");
    let id = saved["proposal"]["id"].as_i64().unwrap();

    send(&tx, &gm, &format!(r#"{{"type":"get_trade","proposalId":{id}}}"#)).await;
    let fetched = gm.recv().await;
    assert_eq!(fetched["type"], "trade_proposal");
    assert_eq!(fetched["proposal"]["name"], "Swap");
    assert_eq!(fetched["proposal"]["legs"][0]["toTeamCode"], "BOS");

    send(&tx, &gm, r#"{"type":"get_trade","proposalId":9999}"#).await;
    let missing = gm.recv().await;
    assert_eq!(missing["type"], "error");
    assert!(missing["message"].as_str().unwrap().contains("not found"));

    send(&tx, &gm, &format!(r#"{{"type":"validate_proposal","proposalId":{id}}}"#)).await;
    let validated = gm.recv().await;
    assert_eq!(validated["proposal"]["status"], "validated");

    send(&tx, &gm, &format!(r#"{{"type":"apply_trade","proposalId":{id}}}"#)).await;
    let applied = gm.recv().await;
    assert_eq!(applied["type"], "trade_applied");
    assert_eq!(applied["summary"]["playersMoved"], 2);

    send(&tx, &gm, &format!(r#"{{"type":"delete_trade","proposalId":{id}}}"#)).await;
    let err = gm.recv().await;
    assert_eq!(err["type"], "error");
    assert!(err["message"].as_str().unwrap().contains("already been executed"));

    send(&tx, &gm, r#"{"type":"list_trades","sport":"NBA"}"#).await;
    let list = gm.recv().await;
    assert_eq!(list["type"], "trade_list");
    assert_eq!(list["proposals"].as_array().unwrap().len(), 1);
}
