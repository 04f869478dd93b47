//! Interactive-authentication (UIA) session state machine.
//!
//! The server advertises acceptable stage sequences ("flows") and the client
//! completes them one at a time against the same endpoint. Every request
//! carries the caller's real body plus an `auth` object naming the stage.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐ connect() ┌───────────┐ select_flow() ┌────────────┐
//! │ NotConnected │──────────>│ Connected │──────────────>│ InProgress │
//! └──────────────┘     │     └───────────┘               └─────┬──────┘
//!                      │ 200                     do_stage()    │   ┌───┐
//!                      ↓                  ┌────────────────────┼───┘   │
//!                ┌──────────┐   200       │    401+completed   ↓       │
//!                │ Finished │<────────────┴──────────────── advance ───┘
//!                └──────────┘
//!                      fatal status → Failed        cancel() → Canceled
//! ```
//!
//! Ordering is enforced locally: a stage that is not the head of the
//! remaining list is rejected without a network call. A rejected BS-SPEKE
//! verify/save stage re-inserts its OPRF stage, since the blinded ephemeral
//! state is single-use.

pub mod stages;

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use rand::{CryptoRng, RngCore};
use serde_json::{Map, Value, json};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use fireside_crypto::bsspeke::{self, BlindingState, PhfParams};

use crate::error::ClientError;
use crate::transport::Transport;

/// Server-side authentication state mirrored from 401 responses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiaServerState {
    /// Opaque session identifier, echoed on every stage attempt.
    pub session: Option<String>,
    /// Acceptable stage sequences.
    pub flows: Vec<Vec<String>>,
    /// Stages the server already considers complete.
    pub completed: Vec<String>,
    /// Per-stage parameters, keyed by stage id.
    pub params: Map<String, Value>,
    /// Server error code from the last response, if any.
    pub errcode: Option<String>,
    /// Server error message from the last response, if any.
    pub error: Option<String>,
}

impl UiaServerState {
    /// Parse a 401 body, tolerantly: absent sections default to empty.
    pub fn from_response(body: &Value) -> Self {
        let flows = body
            .get("flows")
            .and_then(Value::as_array)
            .map(|flows| {
                flows
                    .iter()
                    .filter_map(|flow| flow.get("stages").and_then(Value::as_array))
                    .map(|stages| {
                        stages.iter().filter_map(Value::as_str).map(str::to_owned).collect()
                    })
                    .collect()
            })
            .unwrap_or_default();
        let completed = body
            .get("completed")
            .and_then(Value::as_array)
            .map(|stages| stages.iter().filter_map(Value::as_str).map(str::to_owned).collect())
            .unwrap_or_default();
        let params = body
            .get("params")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Self {
            session: body.get("session").and_then(Value::as_str).map(str::to_owned),
            flows,
            completed,
            params,
            errcode: body.get("errcode").and_then(Value::as_str).map(str::to_owned),
            error: body.get("error").and_then(Value::as_str).map(str::to_owned),
        }
    }

    /// The advertised parameters for one stage, if any.
    pub fn stage_params(&self, stage: &str) -> Option<&Value> {
        self.params.get(stage)
    }
}

/// Why a session ended in [`UiaState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailure {
    /// The HTTP status that killed the session.
    pub status: u16,
    /// Server error code, when given.
    pub errcode: Option<String>,
    /// Server error message, when given.
    pub error: Option<String>,
}

/// Session state.
#[derive(Debug, Clone, PartialEq)]
pub enum UiaState {
    /// No request sent yet.
    NotConnected,
    /// The server has advertised its flows; none selected yet.
    Connected(UiaServerState),
    /// A flow is selected; `remaining` is consumed strictly left-to-right.
    InProgress {
        /// Mirrored server state from the latest 401.
        server: UiaServerState,
        /// Stages still to complete, a suffix of the selected flow.
        remaining: Vec<String>,
    },
    /// The server returned 200; carries the opaque success payload.
    Finished(Value),
    /// A fatal status ended the session.
    Failed(AuthFailure),
    /// The caller canceled the session.
    Canceled,
}

impl UiaState {
    /// Short state name for errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotConnected => "not connected",
            Self::Connected(_) => "connected",
            Self::InProgress { .. } => "in progress",
            Self::Finished(_) => "finished",
            Self::Failed(_) => "failed",
            Self::Canceled => "canceled",
        }
    }
}

/// One interactive-authentication negotiation against a single endpoint.
///
/// Owned by the caller; one logical mutator at a time. The one network call
/// per stage is the only suspension point, and a second call while one is in
/// flight is rejected with [`ClientError::Busy`].
pub struct UiaSession {
    method: String,
    url: String,
    access_token: Option<String>,
    request_body: Map<String, Value>,
    state: UiaState,
    in_flight: bool,
    cancel_callback: Option<Box<dyn FnOnce() + Send>>,
    pake: Option<BlindingState>,
    pake_session_key: Option<Zeroizing<[u8; 32]>>,
}

impl fmt::Debug for UiaSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiaSession")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("state", &self.state.name())
            .field("in_flight", &self.in_flight)
            .field("pake", &self.pake.as_ref().map(|_| "<blinding state>"))
            .finish_non_exhaustive()
    }
}

impl UiaSession {
    /// A new session for `method url`, submitting `request_body` once
    /// authentication completes.
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        request_body: Map<String, Value>,
    ) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            access_token: None,
            request_body,
            state: UiaState::NotConnected,
            in_flight: false,
            cancel_callback: None,
            pake: None,
            pake_session_key: None,
        }
    }

    /// Attach a pre-existing credential sent as a bearer token.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Register a callback invoked once if the session is canceled.
    pub fn on_cancel(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.cancel_callback = Some(Box::new(callback));
    }

    /// Current state.
    pub fn state(&self) -> &UiaState {
        &self.state
    }

    /// Stages still to complete; empty outside `InProgress`.
    pub fn remaining_stages(&self) -> &[String] {
        match &self.state {
            UiaState::InProgress { remaining, .. } => remaining,
            _ => &[],
        }
    }

    /// The session key derived by a completed BS-SPEKE verify stage.
    pub fn pake_session_key(&self) -> Option<&[u8; 32]> {
        self.pake_session_key.as_deref()
    }

    /// Send the initial unauthenticated request.
    ///
    /// A 401 carries the advertised flows (`Connected`); a 200 means no
    /// authentication was required and the session is `Finished`
    /// immediately. Anything else is fatal.
    pub async fn connect(&mut self, transport: &dyn Transport) -> Result<&UiaState, ClientError> {
        if self.in_flight {
            return Err(ClientError::Busy);
        }
        if !matches!(self.state, UiaState::NotConnected) {
            return Err(ClientError::InvalidState {
                operation: "connect",
                state: self.state.name(),
            });
        }
        let body = Value::Object(self.request_body.clone());
        self.in_flight = true;
        let result = self.send(transport, &body).await;
        self.in_flight = false;
        let response = result?;
        if matches!(self.state, UiaState::Canceled) {
            return Err(ClientError::Canceled);
        }

        match response.status {
            200 => self.state = UiaState::Finished(response.body),
            401 => {
                let server = UiaServerState::from_response(&response.body);
                debug!(flows = server.flows.len(), "uia connected");
                self.state = UiaState::Connected(server);
            }
            status => {
                self.state = UiaState::Failed(failure(status, &response.body));
                return Err(ClientError::UnexpectedStatus { status });
            }
        }
        Ok(&self.state)
    }

    /// Select one of the advertised flows.
    ///
    /// Stages the server already lists as completed are stripped from the
    /// front, so `remaining` is always a suffix of the flow.
    pub fn select_flow(&mut self, flow: &[String]) -> Result<&UiaState, ClientError> {
        let UiaState::Connected(server) = &self.state else {
            return Err(ClientError::InvalidState {
                operation: "select flow",
                state: self.state.name(),
            });
        };
        if !server.flows.iter().any(|offered| offered == flow) {
            return Err(ClientError::FlowNotOffered);
        }

        let completed = server.completed.clone();
        let remaining: Vec<String> = flow
            .iter()
            .skip_while(|stage| completed.contains(*stage))
            .cloned()
            .collect();
        trace!(?remaining, "flow selected");
        self.state = UiaState::InProgress { server: server.clone(), remaining };
        Ok(&self.state)
    }

    /// Attempt the next stage with a stage-specific payload.
    ///
    /// Only the head of the remaining list may be attempted; anything else
    /// is [`ClientError::WrongStageOrder`] with no network call. A 401
    /// listing the stage as completed advances the list; a 401 without it,
    /// or a 403, is [`ClientError::AuthRejected`] (with PAKE rewind where
    /// applicable); any other status is fatal.
    pub async fn do_stage(
        &mut self,
        transport: &dyn Transport,
        stage_id: &str,
        payload: Map<String, Value>,
    ) -> Result<&UiaState, ClientError> {
        if self.in_flight {
            return Err(ClientError::Busy);
        }
        let UiaState::InProgress { server, remaining } = &self.state else {
            return Err(ClientError::InvalidState {
                operation: "attempt stage",
                state: self.state.name(),
            });
        };
        if remaining.first().map(String::as_str) != Some(stage_id) {
            return Err(ClientError::WrongStageOrder {
                attempted: stage_id.to_owned(),
                expected: remaining.first().cloned(),
            });
        }

        let mut auth = payload;
        auth.insert("type".to_owned(), json!(stage_id));
        if let Some(session) = &server.session {
            auth.insert("session".to_owned(), json!(session));
        }
        let mut body = self.request_body.clone();
        body.insert("auth".to_owned(), Value::Object(auth));
        let body = Value::Object(body);

        self.in_flight = true;
        let result = self.send(transport, &body).await;
        self.in_flight = false;
        let response = result?;
        if matches!(self.state, UiaState::Canceled) {
            return Err(ClientError::Canceled);
        }

        match response.status {
            200 => {
                debug!(stage = stage_id, "uia finished");
                self.state = UiaState::Finished(response.body);
                Ok(&self.state)
            }
            401 => {
                let newer = UiaServerState::from_response(&response.body);
                if newer.completed.iter().any(|done| done.as_str() == stage_id) {
                    self.advance(stage_id, newer);
                    Ok(&self.state)
                } else {
                    Err(self.reject_stage(stage_id, newer))
                }
            }
            403 => {
                let newer = UiaServerState::from_response(&response.body);
                Err(self.reject_stage(stage_id, newer))
            }
            status => {
                self.state = UiaState::Failed(failure(status, &response.body));
                Err(ClientError::UnexpectedStatus { status })
            }
        }
    }

    /// Cancel the session.
    ///
    /// Cooperative: an in-flight request is not aborted, but its response
    /// can no longer advance state. The registered callback fires once.
    pub fn cancel(&mut self) {
        if matches!(self.state, UiaState::Finished(_) | UiaState::Canceled) {
            return;
        }
        debug!("uia canceled");
        self.state = UiaState::Canceled;
        self.pake = None;
        if let Some(callback) = self.cancel_callback.take() {
            callback();
        }
    }

    fn advance(&mut self, stage_id: &str, mut newer: UiaServerState) {
        let UiaState::InProgress { server, remaining } = &mut self.state else {
            return;
        };
        trace!(stage = stage_id, "stage completed");
        if newer.session.is_none() {
            newer.session.clone_from(&server.session);
        }
        if !remaining.is_empty() {
            remaining.remove(0);
        }
        *server = newer;
    }

    /// Record a stage rejection, rewinding the PAKE sub-flow if needed.
    fn reject_stage(&mut self, stage_id: &str, newer: UiaServerState) -> ClientError {
        let errcode = newer.errcode.clone();
        let error = newer.error.clone();
        if let UiaState::InProgress { server, remaining } = &mut self.state {
            let mut absorbed = newer;
            if absorbed.session.is_none() {
                absorbed.session.clone_from(&server.session);
            }
            *server = absorbed;
            if let Some(oprf) = stages::pake_oprf_counterpart(stage_id) {
                // The blinded ephemeral state died with the rejection; the
                // exchange restarts from blinding.
                self.pake = None;
                self.pake_session_key = None;
                if remaining.first().map(String::as_str) != Some(oprf) {
                    remaining.insert(0, oprf.to_owned());
                }
                debug!(stage = stage_id, "pake stage rejected, oprf re-inserted");
            }
        }
        ClientError::AuthRejected { stage: stage_id.to_owned(), errcode, error }
    }

    async fn send(
        &self,
        transport: &dyn Transport,
        body: &Value,
    ) -> Result<crate::transport::HttpResponse, ClientError> {
        let mut headers = vec![("Content-Type".to_owned(), "application/json".to_owned())];
        if let Some(token) = &self.access_token {
            headers.push(("Authorization".to_owned(), format!("Bearer {token}")));
        }
        Ok(transport.send(&self.method, &self.url, &headers, Some(body)).await?)
    }

    // ---- stage helpers -------------------------------------------------

    /// Attempt a password stage.
    pub async fn do_password_stage(
        &mut self,
        transport: &dyn Transport,
        user_id: &str,
        password: &str,
    ) -> Result<&UiaState, ClientError> {
        self.do_stage(transport, stages::LOGIN_PASSWORD, stages::password_payload(user_id, password))
            .await
    }

    /// Attempt a registration-token stage.
    pub async fn do_registration_token_stage(
        &mut self,
        transport: &dyn Transport,
        token: &str,
    ) -> Result<&UiaState, ClientError> {
        self.do_stage(
            transport,
            stages::LOGIN_REGISTRATION_TOKEN,
            stages::registration_token_payload(token),
        )
        .await
    }

    /// Accept the server's terms of service.
    pub async fn do_terms_stage(
        &mut self,
        transport: &dyn Transport,
    ) -> Result<&UiaState, ClientError> {
        self.do_stage(transport, stages::LOGIN_TERMS, Map::new()).await
    }

    /// Attempt the dummy stage.
    pub async fn do_dummy_stage(
        &mut self,
        transport: &dyn Transport,
    ) -> Result<&UiaState, ClientError> {
        self.do_stage(transport, stages::LOGIN_DUMMY, Map::new()).await
    }

    /// Email sub-flow: ask the server to send a token to `email`.
    pub async fn do_email_request_token_stage(
        &mut self,
        transport: &dyn Transport,
        stage_id: &str,
        email: &str,
        client_secret: &str,
    ) -> Result<&UiaState, ClientError> {
        self.do_stage(transport, stage_id, stages::email_request_token_payload(email, client_secret))
            .await
    }

    /// Email sub-flow: submit the token the user received.
    pub async fn do_email_submit_token_stage(
        &mut self,
        transport: &dyn Transport,
        stage_id: &str,
        token: &str,
        client_secret: &str,
    ) -> Result<&UiaState, ClientError> {
        self.do_stage(transport, stage_id, stages::email_submit_token_payload(token, client_secret))
            .await
    }

    /// App-Store sub-flow: submit a subscription receipt.
    pub async fn do_app_store_stage(
        &mut self,
        transport: &dyn Transport,
        stage_id: &str,
        receipt: &str,
    ) -> Result<&UiaState, ClientError> {
        self.do_stage(transport, stage_id, stages::app_store_payload(receipt)).await
    }

    /// BS-SPEKE first stage: blind the password and send the blind.
    ///
    /// The blinding state is held for the matching verify/save stage and
    /// destroyed on any failure.
    pub async fn do_bsspeke_oprf_stage<R: RngCore + CryptoRng>(
        &mut self,
        transport: &dyn Transport,
        stage_id: &str,
        user_id: &str,
        server_id: &str,
        password: &str,
        rng: &mut R,
    ) -> Result<&UiaState, ClientError> {
        let (blinding, blind) = bsspeke::blind(user_id, server_id, password, rng);
        self.pake = Some(blinding);
        let outcome = self
            .do_stage(transport, stage_id, stages::bsspeke_oprf_payload(&blind))
            .await
            .map(|_| ());
        match outcome {
            Ok(()) => Ok(&self.state),
            Err(err) => {
                self.pake = None;
                Err(err)
            }
        }
    }

    /// BS-SPEKE login second stage: derive the session key and send the
    /// verifier.
    pub async fn do_bsspeke_verify_stage<R: RngCore + CryptoRng>(
        &mut self,
        transport: &dyn Transport,
        rng: &mut R,
    ) -> Result<&UiaState, ClientError> {
        let stage_id = stages::LOGIN_BSSPEKE_VERIFY;
        let blind_salt = self.point_param(stage_id, "blind_salt")?;
        let server_ephemeral = self.point_param(stage_id, "B")?;
        let phf = self.phf_param(stage_id);
        let blinding = self.take_pake(stage_id)?;

        let login = blinding.finish_login(&blind_salt, &server_ephemeral, &phf, rng)?;
        self.pake_session_key = Some(Zeroizing::new(*login.session_key()));
        let payload = stages::bsspeke_verify_payload(&login.client_ephemeral, &login.verifier);
        let outcome = self.do_stage(transport, stage_id, payload).await.map(|_| ());
        match outcome {
            Ok(()) => Ok(&self.state),
            Err(err) => {
                self.pake_session_key = None;
                Err(err)
            }
        }
    }

    /// BS-SPEKE enrollment second stage: upload generator and public key.
    pub async fn do_bsspeke_save_stage(
        &mut self,
        transport: &dyn Transport,
    ) -> Result<&UiaState, ClientError> {
        let stage_id = stages::ENROLL_BSSPEKE_SAVE;
        let blind_salt = self.point_param(stage_id, "blind_salt")?;
        let phf = self.phf_param(stage_id);
        let blinding = self.take_pake(stage_id)?;

        let enrollment = blinding.finish_enrollment(&blind_salt, &phf)?;
        self.do_stage(transport, stage_id, stages::bsspeke_save_payload(&enrollment)).await
    }

    fn take_pake(&mut self, stage_id: &str) -> Result<BlindingState, ClientError> {
        self.pake.take().ok_or(ClientError::InvalidStageParam {
            stage: stage_id.to_owned(),
            param: "blinding state",
        })
    }

    /// A 32-byte base64 point from the stage's advertised params.
    fn point_param(&self, stage_id: &str, param: &'static str) -> Result<[u8; 32], ClientError> {
        let UiaState::InProgress { server, .. } = &self.state else {
            return Err(ClientError::InvalidState {
                operation: "read stage params",
                state: self.state.name(),
            });
        };
        let text = server
            .stage_params(stage_id)
            .and_then(|params| params.get(param))
            .and_then(Value::as_str)
            .ok_or(ClientError::InvalidStageParam { stage: stage_id.to_owned(), param })?;
        let bytes = STANDARD
            .decode(text)
            .or_else(|_| STANDARD_NO_PAD.decode(text))
            .map_err(|_| ClientError::InvalidStageParam { stage: stage_id.to_owned(), param })?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| ClientError::InvalidStageParam { stage: stage_id.to_owned(), param })
    }

    /// The stage's PHF params, defaulting when absent or unreadable.
    fn phf_param(&self, stage_id: &str) -> PhfParams {
        let UiaState::InProgress { server, .. } = &self.state else {
            return PhfParams::default();
        };
        server
            .stage_params(stage_id)
            .and_then(|params| params.get("phf_params"))
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }
}

fn failure(status: u16, body: &Value) -> AuthFailure {
    AuthFailure {
        status,
        errcode: body.get("errcode").and_then(Value::as_str).map(str::to_owned),
        error: body.get("error").and_then(Value::as_str).map(str::to_owned),
    }
}
