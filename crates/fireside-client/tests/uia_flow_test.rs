//! End-to-end UIA engine tests against a scripted transport.
//!
//! The driver scripts server responses and asserts the state machine's
//! transitions: flow selection, strict stage ordering, completion tracking,
//! the BS-SPEKE rewind, and cancellation.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value, json};

use fireside_client::uia::stages;
use fireside_client::{ClientError, HttpResponse, Transport, TransportError, UiaSession, UiaState};

/// Transport that replays a scripted list of responses.
struct MockTransport {
    script: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<Value>>,
}

impl MockTransport {
    fn scripted(responses: impl IntoIterator<Item = HttpResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_request(&self) -> Value {
        self.requests.lock().unwrap().last().cloned().unwrap_or(Value::Null)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        _method: &str,
        _url: &str,
        _headers: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(body.cloned().unwrap_or(Value::Null));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::new("script exhausted"))
    }
}

fn status(code: u16, body: Value) -> HttpResponse {
    HttpResponse { status: code, body }
}

fn flows_response(completed: Vec<&str>) -> HttpResponse {
    status(
        401,
        json!({
            "session": "sess1",
            "flows": [{"stages": ["A", "B"]}, {"stages": ["C"]}],
            "completed": completed,
            "params": {},
        }),
    )
}

fn stage(name: &str) -> Vec<String> {
    vec![name.to_owned()]
}

fn flow(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_owned()).collect()
}

#[tokio::test]
async fn two_stage_flow_completes() {
    let transport = MockTransport::scripted([
        flows_response(vec![]),
        flows_response(vec!["A"]),
        status(200, json!({"user_id": "@a:x.org", "access_token": "tok"})),
    ]);
    let mut session = UiaSession::new("POST", "https://x.org/register", Map::new());

    session.connect(&transport).await.unwrap();
    session.select_flow(&flow(&["A", "B"])).unwrap();
    assert_eq!(session.remaining_stages(), flow(&["A", "B"]).as_slice());

    session.do_stage(&transport, "A", Map::new()).await.unwrap();
    assert_eq!(session.remaining_stages(), stage("B").as_slice());

    session.do_stage(&transport, "B", Map::new()).await.unwrap();
    let UiaState::Finished(body) = session.state() else {
        unreachable!("expected finished session, got {:?}", session.state().name());
    };
    assert_eq!(body["access_token"], "tok");
}

#[tokio::test]
async fn auth_object_carries_type_and_session() {
    let transport = MockTransport::scripted([
        flows_response(vec![]),
        flows_response(vec!["A"]),
    ]);
    let mut body = Map::new();
    body.insert("username".to_owned(), json!("alice"));
    let mut session = UiaSession::new("POST", "https://x.org/register", body);

    session.connect(&transport).await.unwrap();
    session.select_flow(&flow(&["A", "B"])).unwrap();
    session.do_stage(&transport, "A", Map::new()).await.unwrap();

    let request = transport.last_request();
    assert_eq!(request["username"], "alice", "real body fields are preserved");
    assert_eq!(request["auth"]["type"], "A");
    assert_eq!(request["auth"]["session"], "sess1");
}

#[tokio::test]
async fn wrong_stage_order_is_rejected_locally() {
    let transport = MockTransport::scripted([flows_response(vec![])]);
    let mut session = UiaSession::new("POST", "https://x.org/register", Map::new());

    session.connect(&transport).await.unwrap();
    session.select_flow(&flow(&["A", "B"])).unwrap();
    let requests_before = transport.request_count();

    let err = session.do_stage(&transport, "B", Map::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::WrongStageOrder { .. }));
    // No network call was made for the out-of-order attempt.
    assert_eq!(transport.request_count(), requests_before);
    assert_eq!(session.remaining_stages(), flow(&["A", "B"]).as_slice());
}

#[tokio::test]
async fn unoffered_flow_is_rejected() {
    let transport = MockTransport::scripted([flows_response(vec![])]);
    let mut session = UiaSession::new("POST", "https://x.org/register", Map::new());

    session.connect(&transport).await.unwrap();
    let err = session.select_flow(&flow(&["A", "Z"])).unwrap_err();
    assert!(matches!(err, ClientError::FlowNotOffered));
}

#[tokio::test]
async fn stage_rejection_does_not_advance() {
    let transport = MockTransport::scripted([
        flows_response(vec![]),
        // 401 whose completed list does NOT contain the attempted stage.
        flows_response(vec![]),
    ]);
    let mut session = UiaSession::new("POST", "https://x.org/register", Map::new());

    session.connect(&transport).await.unwrap();
    session.select_flow(&flow(&["A", "B"])).unwrap();
    let err = session.do_stage(&transport, "A", Map::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::AuthRejected { .. }));
    assert_eq!(session.remaining_stages(), flow(&["A", "B"]).as_slice());
}

#[tokio::test]
async fn immediate_success_skips_authentication() {
    let transport = MockTransport::scripted([status(200, json!({"ok": true}))]);
    let mut session = UiaSession::new("POST", "https://x.org/logout", Map::new());

    session.connect(&transport).await.unwrap();
    assert!(matches!(session.state(), UiaState::Finished(_)));
}

#[tokio::test]
async fn fatal_status_fails_the_session() {
    let transport = MockTransport::scripted([
        flows_response(vec![]),
        status(500, json!({"errcode": "M_UNKNOWN"})),
    ]);
    let mut session = UiaSession::new("POST", "https://x.org/register", Map::new());

    session.connect(&transport).await.unwrap();
    session.select_flow(&flow(&["A", "B"])).unwrap();
    let err = session.do_stage(&transport, "A", Map::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::UnexpectedStatus { status: 500 }));
    assert!(matches!(session.state(), UiaState::Failed(_)));
}

/// A valid compressed ristretto point, for scripting PAKE stage params.
fn some_point() -> String {
    let (_, blind) = fireside_crypto::blind("@a:x.org", "x.org", "seed", &mut rand::thread_rng());
    STANDARD.encode(blind)
}

fn bsspeke_flows(completed: Vec<&str>, with_verify_params: bool) -> HttpResponse {
    let mut params = json!({
        stages::LOGIN_BSSPEKE_OPRF: {"curve": "ristretto255"},
    });
    if with_verify_params {
        params[stages::LOGIN_BSSPEKE_VERIFY] = json!({
            "blind_salt": some_point(),
            "B": some_point(),
            "phf_params": {"iterations": 1, "blocks": 1},
        });
    }
    status(
        401,
        json!({
            "session": "sess-pake",
            "flows": [{"stages": [stages::LOGIN_BSSPEKE_OPRF, stages::LOGIN_BSSPEKE_VERIFY]}],
            "completed": completed,
            "params": params,
        }),
    )
}

#[tokio::test]
async fn bsspeke_login_flow_completes() {
    let transport = MockTransport::scripted([
        bsspeke_flows(vec![], false),
        bsspeke_flows(vec![stages::LOGIN_BSSPEKE_OPRF], true),
        status(200, json!({"access_token": "tok"})),
    ]);
    let mut session = UiaSession::new("POST", "https://x.org/login", Map::new());
    let mut rng = rand::thread_rng();

    session.connect(&transport).await.unwrap();
    session
        .select_flow(&flow(&[stages::LOGIN_BSSPEKE_OPRF, stages::LOGIN_BSSPEKE_VERIFY]))
        .unwrap();
    session
        .do_bsspeke_oprf_stage(
            &transport,
            stages::LOGIN_BSSPEKE_OPRF,
            "@a:x.org",
            "x.org",
            "hunter2",
            &mut rng,
        )
        .await
        .unwrap();
    session.do_bsspeke_verify_stage(&transport, &mut rng).await.unwrap();

    assert!(matches!(session.state(), UiaState::Finished(_)));
    assert!(session.pake_session_key().is_some());

    let request = transport.last_request();
    assert_eq!(request["auth"]["type"], stages::LOGIN_BSSPEKE_VERIFY);
    assert!(request["auth"]["A"].is_string());
    assert!(request["auth"]["verifier"].is_string());
}

#[tokio::test]
async fn rejected_verify_reinserts_oprf_stage() {
    let transport = MockTransport::scripted([
        bsspeke_flows(vec![], false),
        bsspeke_flows(vec![stages::LOGIN_BSSPEKE_OPRF], true),
        // Server rejects the verifier: wrong password.
        status(403, json!({"errcode": "M_FORBIDDEN", "error": "Invalid verifier"})),
    ]);
    let mut session = UiaSession::new("POST", "https://x.org/login", Map::new());
    let mut rng = rand::thread_rng();

    session.connect(&transport).await.unwrap();
    session
        .select_flow(&flow(&[stages::LOGIN_BSSPEKE_OPRF, stages::LOGIN_BSSPEKE_VERIFY]))
        .unwrap();
    session
        .do_bsspeke_oprf_stage(
            &transport,
            stages::LOGIN_BSSPEKE_OPRF,
            "@a:x.org",
            "x.org",
            "wrong password",
            &mut rng,
        )
        .await
        .unwrap();

    let err = session.do_bsspeke_verify_stage(&transport, &mut rng).await.unwrap_err();
    assert!(matches!(err, ClientError::AuthRejected { .. }));

    // The exchange must restart from blinding: OPRF ahead of verify again.
    assert_eq!(
        session.remaining_stages(),
        flow(&[stages::LOGIN_BSSPEKE_OPRF, stages::LOGIN_BSSPEKE_VERIFY]).as_slice(),
    );
    assert!(session.pake_session_key().is_none());
}

#[tokio::test]
async fn cancel_invokes_callback_and_blocks_stages() {
    static CANCELED: AtomicBool = AtomicBool::new(false);

    let transport = MockTransport::scripted([flows_response(vec![])]);
    let mut session = UiaSession::new("POST", "https://x.org/register", Map::new());
    session.on_cancel(|| CANCELED.store(true, Ordering::SeqCst));

    session.connect(&transport).await.unwrap();
    session.select_flow(&flow(&["A", "B"])).unwrap();
    session.cancel();

    assert!(CANCELED.load(Ordering::SeqCst));
    assert!(matches!(session.state(), UiaState::Canceled));

    let err = session.do_stage(&transport, "A", Map::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidState { .. }));
}
