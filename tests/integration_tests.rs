use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tower::ServiceExt;

use smsc_broadcast::config::{AppConfig, SmscCredentials};
use smsc_broadcast::db::{self, queries};
use smsc_broadcast::models::{DeliveryStatus, MailingSummary, StatusMessage};
use smsc_broadcast::services::gateway::fake::FakeGateway;
use smsc_broadcast::services::reconciler::StatusReconciler;
use smsc_broadcast::state::AppState;

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 5000,
        database_url: ":memory:".to_string(),
        smsc: SmscCredentials {
            login: "test_user".to_string(),
            password: "test_password".to_string(),
        },
        smsc_host: "http://localhost".to_string(),
        valid_hours: 1,
        phones: vec!["79991112233".to_string(), "79991112234".to_string()],
        poll_interval: Duration::from_secs(1),
        fake_gateway: true,
    }
}

fn test_state_with_gateway() -> (Arc<AppState>, Arc<FakeGateway>) {
    test_state_with_capacity(16)
}

fn test_state_with_capacity(capacity: usize) -> (Arc<AppState>, Arc<FakeGateway>) {
    let conn = db::init_db(":memory:").unwrap();
    let db = Arc::new(Mutex::new(conn));
    let gateway = Arc::new(FakeGateway::new(0));
    (shared_state(db, gateway.clone(), capacity), gateway)
}

fn shared_state(db: Arc<Mutex<rusqlite::Connection>>, gateway: Arc<FakeGateway>, capacity: usize) -> Arc<AppState> {
    let (status_tx, _) = broadcast::channel(capacity);
    Arc::new(AppState {
        db,
        config: test_config(),
        gateway,
        status_tx,
    })
}

fn add_mailing(state: &AppState, id: &str, phones: &[&str], text: &str) {
    let phones: Vec<String> = phones.iter().map(|p| p.to_string()).collect();
    let db = state.db.lock().unwrap();
    queries::add_mailing(&db, id, &phones, text).unwrap();
}

fn summary(mailing_id: &str, delivered: usize) -> StatusMessage {
    StatusMessage {
        msg_type: "SMSMailingStatus".to_string(),
        sms_mailings: vec![MailingSummary {
            timestamp: 1_577_550_022,
            sms_text: "Storm warning".to_string(),
            mailing_id: mailing_id.to_string(),
            total_sms_amount: 2,
            delivered_sms_amount: delivered,
            failed_sms_amount: 0,
        }],
    }
}

type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect_ws(state: Arc<AppState>) -> WsClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, smsc_broadcast::router(state)).await.unwrap();
    });

    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    ws
}

async fn next_json(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let WsMessage::Text(data) = msg {
            return serde_json::from_str(&data).unwrap();
        }
    }
}

fn test_app(state: Arc<AppState>) -> Router {
    smsc_broadcast::router(state)
}

fn send_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/send/")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(res: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

// ── Pages ──

#[tokio::test]
async fn test_health() {
    let (state, _) = test_state_with_gateway();
    let res = test_app(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["status"], "ok");
}

#[tokio::test]
async fn test_index_page() {
    let (state, _) = test_state_with_gateway();
    let res = test_app(state)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("/ws"));
    assert!(html.contains("/send/"));
}

#[tokio::test]
async fn test_ws_requires_upgrade() {
    let (state, _) = test_state_with_gateway();
    let res = test_app(state)
        .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(res.status().is_client_error());
}

// ── Sending ──

#[tokio::test]
async fn test_send_uses_configured_phones() {
    let (state, gateway) = test_state_with_gateway();
    let res = test_app(state.clone())
        .oneshot(send_request("text=Thunderstorm+expected+tomorrow"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(
        json,
        serde_json::json!([
            {"mailingId": "430", "phone": "79991112233"},
            {"mailingId": "430", "phone": "79991112234"},
        ])
    );

    let sent = gateway.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, "Thunderstorm expected tomorrow");
    assert_eq!(sent[0].valid_hours, 1);

    let db = state.db.lock().unwrap();
    let mailing = queries::get_mailing(&db, "430").unwrap().unwrap();
    assert_eq!(mailing.phones_count(), 2);
    assert_eq!(mailing.count(DeliveryStatus::Pending), 2);
}

#[tokio::test]
async fn test_send_with_phone_override() {
    let (state, gateway) = test_state_with_gateway();
    let res = test_app(state)
        .oneshot(send_request(
            "text=Storm+warning&phones=%2B79990000001%3B+79990000002&valid=12",
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
    assert_eq!(json[0]["phone"], "+79990000001");

    let sent = gateway.sent();
    assert_eq!(sent[0].phones, vec!["+79990000001", "79990000002"]);
    assert_eq!(sent[0].valid_hours, 12);
}

#[tokio::test]
async fn test_send_publishes_snapshot() {
    let (state, _) = test_state_with_gateway();
    let mut rx = state.status_tx.subscribe();

    let res = test_app(state)
        .oneshot(send_request("text=Storm+warning"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let msg = rx.recv().await.unwrap();
    assert_eq!(msg.msg_type, "SMSMailingStatus");
    assert_eq!(msg.sms_mailings.len(), 1);
    assert_eq!(msg.sms_mailings[0].mailing_id, "430");
    assert_eq!(msg.sms_mailings[0].total_sms_amount, 2);
    assert_eq!(msg.sms_mailings[0].delivered_sms_amount, 0);
}

#[tokio::test]
async fn test_send_short_text_rejected() {
    let (state, gateway) = test_state_with_gateway();
    let res = test_app(state)
        .oneshot(send_request("text=Hi"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let json = json_body(res).await;
    assert!(json["errorMessage"].as_str().unwrap().contains("at least 5"));
    assert!(gateway.sent().is_empty());
}

#[tokio::test]
async fn test_send_invalid_phones_rejected() {
    let (state, gateway) = test_state_with_gateway();
    let res = test_app(state)
        .oneshot(send_request("text=Storm+warning&phones=7999abc1122"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(res).await["errorMessage"].is_string());
    assert!(gateway.sent().is_empty());
}

#[tokio::test]
async fn test_send_invalid_validity_rejected() {
    let (state, gateway) = test_state_with_gateway();
    let res = test_app(state)
        .oneshot(send_request("text=Storm+warning&valid=48"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(gateway.sent().is_empty());
}

#[tokio::test]
async fn test_send_non_numeric_validity_rejected() {
    let (state, gateway) = test_state_with_gateway();
    let res = test_app(state)
        .oneshot(send_request("text=Storm+warning&valid=abc"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let json = json_body(res).await;
    assert!(json["errorMessage"].as_str().unwrap().contains("'abc'"));
    assert!(gateway.sent().is_empty());
}

#[tokio::test]
async fn test_send_blank_validity_uses_configured() {
    let (state, gateway) = test_state_with_gateway();
    let res = test_app(state)
        .oneshot(send_request("text=Storm+warning&valid="))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(gateway.sent()[0].valid_hours, 1);
}

#[tokio::test]
async fn test_send_accepted_but_not_recorded() {
    let (state, gateway) = test_state_with_gateway();
    add_mailing(&state, "430", &["79990000001"], "Earlier mailing");

    let res = test_app(state.clone())
        .oneshot(send_request("text=Storm+warning"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(res).await;
    let error = json["errorMessage"].as_str().unwrap();
    assert!(error.contains("430"));
    assert!(error.contains("was sent but could not be recorded"));
    assert_eq!(gateway.sent().len(), 1);

    let db = state.db.lock().unwrap();
    let mailing = queries::get_mailing(&db, "430").unwrap().unwrap();
    assert_eq!(mailing.text, "Earlier mailing");
}

#[tokio::test]
async fn test_restarted_fake_gateway_continues_ids() {
    let (first, _) = test_state_with_gateway();
    let res = test_app(first.clone())
        .oneshot(send_request("text=Storm+warning"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Same store, fresh gateway
    let gateway = {
        let db = first.db.lock().unwrap();
        Arc::new(FakeGateway::for_store(&db, 0).unwrap())
    };
    let second = shared_state(Arc::clone(&first.db), gateway.clone(), 16);
    let res = test_app(second)
        .oneshot(send_request("text=Second+storm+warning"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    let ids: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["mailingId"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"430"));
    assert!(ids.contains(&"431"));
    assert_eq!(gateway.sent().len(), 1);
}

#[tokio::test]
async fn test_send_gateway_failure() {
    let (state, gateway) = test_state_with_gateway();
    gateway.fail_sends(2, "authorise error");

    let res = test_app(state.clone())
        .oneshot(send_request("text=Storm+warning"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let json = json_body(res).await;
    assert!(json["errorMessage"]
        .as_str()
        .unwrap()
        .contains("authorise error"));

    let db = state.db.lock().unwrap();
    assert!(queries::list_mailing_ids(&db).unwrap().is_empty());
}

// ── Reconciliation ──

#[tokio::test]
async fn test_send_then_reconcile() {
    let (state, gateway) = test_state_with_gateway();
    gateway.set_status("79991112233", 1);
    gateway.set_status("79991112234", 25);

    let res = test_app(state.clone())
        .oneshot(send_request("text=Storm+warning"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let mut rx = state.status_tx.subscribe();
    let report = StatusReconciler::from_state(&state)
        .reconcile_once()
        .await
        .unwrap();
    assert_eq!(report.polled, 2);
    assert_eq!(report.updated, 2);

    let msg = rx.recv().await.unwrap();
    let summary = &msg.sms_mailings[0];
    assert_eq!(summary.total_sms_amount, 2);
    assert_eq!(summary.delivered_sms_amount, 1);
    assert_eq!(summary.failed_sms_amount, 1);

    let db = state.db.lock().unwrap();
    assert!(queries::get_pending_entries(&db).unwrap().is_empty());
}

// ── Websocket ──

#[tokio::test]
async fn test_ws_sends_snapshot_then_updates() {
    let (state, _) = test_state_with_gateway();
    add_mailing(&state, "430", &["79991112233", "79991112234"], "Storm warning");

    let mut ws = connect_ws(state.clone()).await;

    let snapshot = next_json(&mut ws).await;
    assert_eq!(snapshot["msgType"], "SMSMailingStatus");
    let mailings = snapshot["SMSMailings"].as_array().unwrap();
    assert_eq!(mailings.len(), 1);
    assert_eq!(mailings[0]["mailingId"], "430");
    assert_eq!(mailings[0]["SMSText"], "Storm warning");
    assert_eq!(mailings[0]["totalSMSAmount"], 2);
    assert_eq!(mailings[0]["deliveredSMSAmount"], 0);
    assert_eq!(mailings[0]["failedSMSAmount"], 0);
    assert!(mailings[0]["timestamp"].is_i64());

    state.status_tx.send(summary("430", 1)).unwrap();

    let update = next_json(&mut ws).await;
    assert_eq!(
        update,
        serde_json::json!({
            "msgType": "SMSMailingStatus",
            "SMSMailings": [{
                "timestamp": 1577550022,
                "SMSText": "Storm warning",
                "mailingId": "430",
                "totalSMSAmount": 2,
                "deliveredSMSAmount": 1,
                "failedSMSAmount": 0,
            }],
        })
    );
}

#[tokio::test]
async fn test_ws_forwards_reconciler_output() {
    let (state, gateway) = test_state_with_gateway();
    gateway.set_status("79991112233", 2);
    add_mailing(&state, "430", &["79991112233"], "Storm warning");

    let mut ws = connect_ws(state.clone()).await;
    let snapshot = next_json(&mut ws).await;
    assert_eq!(snapshot["SMSMailings"][0]["deliveredSMSAmount"], 0);

    StatusReconciler::from_state(&state)
        .reconcile_once()
        .await
        .unwrap();

    let update = next_json(&mut ws).await;
    assert_eq!(update["SMSMailings"][0]["deliveredSMSAmount"], 1);
}

#[tokio::test]
async fn test_ws_lagging_subscriber_skips_to_latest() {
    let (state, _) = test_state_with_capacity(2);
    let mut ws = connect_ws(state.clone()).await;
    next_json(&mut ws).await;

    // The server task cannot run between these sends, so its receiver
    // falls behind and only the newest two survive
    for i in 0..10 {
        state.status_tx.send(summary(&format!("m{i}"), 0)).unwrap();
    }

    let first = next_json(&mut ws).await;
    assert_eq!(first["SMSMailings"][0]["mailingId"], "m8");
    let second = next_json(&mut ws).await;
    assert_eq!(second["SMSMailings"][0]["mailingId"], "m9");
}

#[tokio::test]
async fn test_ws_close_unsubscribes() {
    let (state, _) = test_state_with_gateway();
    let mut ws = connect_ws(state.clone()).await;
    next_json(&mut ws).await;
    assert_eq!(state.status_tx.receiver_count(), 1);

    ws.close(None).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while state.status_tx.receiver_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}
