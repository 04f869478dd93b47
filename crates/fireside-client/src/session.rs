//! Top-level client session.
//!
//! Owns the room map and the collaborators, and drives the sync loop: fetch
//! one sync response through the transport, hand each room section to the
//! [`SyncApplier`], build invitation previews, and persist room snapshots
//! (room + messages together) through the [`StateStore`].
//!
//! State mutation is synchronous under this single owner; the one network
//! call per sync is the only suspension point, and a re-entrant sync while
//! one is in flight is rejected with [`ClientError::Busy`].

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::{debug, warn};

use fireside_core::{RoomError, RoomState, StrippedStateRoom, SyncApplier};
use fireside_proto::content::{DirectContent, EventContent};
use fireside_proto::{ContentRegistry, EventType, RoomId, ToDeviceEvent, UserId};

use crate::error::ClientError;
use crate::store::{StateStore, StoreKey};
use crate::transport::Transport;

const KIND_ROOM: &str = "room";

/// Outcome of one sync pass.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    /// Joined rooms that received updates this pass.
    pub updated: Vec<RoomId>,
    /// Rooms with a new or refreshed invitation preview.
    pub invited: Vec<RoomId>,
    /// Rooms left (or previews discarded) this pass.
    pub left: Vec<RoomId>,
    /// To-device events delivered this pass (room keys and the like), for
    /// the caller to hand to the crypto provider.
    pub to_device: Vec<ToDeviceEvent>,
}

/// A logged-in client session.
///
/// The session owns its rooms and auth material; the transport and store are
/// collaborators whose lifetimes the caller controls.
pub struct ClientSession<T: Transport, S: StateStore> {
    homeserver: String,
    user_id: UserId,
    access_token: Option<String>,
    transport: T,
    store: S,
    applier: SyncApplier,
    rooms: HashMap<RoomId, RoomState>,
    invites: HashMap<RoomId, StrippedStateRoom>,
    account_data: BTreeMap<EventType, EventContent>,
    since: Option<String>,
    syncing: bool,
}

impl<T: Transport, S: StateStore> ClientSession<T, S> {
    /// A session for `user_id` against `homeserver` (base URL, no trailing
    /// slash).
    pub fn new(
        homeserver: impl Into<String>,
        user_id: UserId,
        registry: ContentRegistry,
        transport: T,
        store: S,
    ) -> Self {
        Self {
            homeserver: homeserver.into(),
            user_id,
            access_token: None,
            transport,
            store,
            applier: SyncApplier::new(registry),
            rooms: HashMap::new(),
            invites: HashMap::new(),
            account_data: BTreeMap::new(),
            since: None,
            syncing: false,
        }
    }

    /// Attach the access token used for authenticated calls.
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = Some(token.into());
    }

    /// The session's user.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// A joined room, if known.
    pub fn room(&self, room_id: &RoomId) -> Option<&RoomState> {
        self.rooms.get(room_id)
    }

    /// An invitation preview, if one is pending.
    pub fn invite(&self, room_id: &RoomId) -> Option<&StrippedStateRoom> {
        self.invites.get(room_id)
    }

    /// Ids of all joined rooms.
    pub fn joined_room_ids(&self) -> impl Iterator<Item = &RoomId> {
        self.rooms.keys()
    }

    /// Ids of all pending invitation previews.
    pub fn invited_room_ids(&self) -> impl Iterator<Item = &RoomId> {
        self.invites.keys()
    }

    /// The sync token to resume from.
    pub fn since(&self) -> Option<&str> {
        self.since.as_deref()
    }

    /// Account-level content for a type (`m.direct`, …), if present.
    pub fn account_data(&self, event_type: &EventType) -> Option<&EventContent> {
        self.account_data.get(event_type)
    }

    /// Whether a room is marked as a direct chat in `m.direct`.
    pub fn is_direct_room(&self, room_id: &RoomId) -> bool {
        matches!(
            self.account_data.get(&EventType::Direct),
            Some(EventContent::Direct(DirectContent(map)))
                if map.values().any(|rooms| rooms.contains(room_id))
        )
    }

    /// Reload previously persisted rooms from the store.
    ///
    /// Returns how many rooms were restored. Snapshots that no longer decode
    /// are skipped with a warning rather than failing the whole restore.
    pub async fn restore_rooms(&mut self) -> Result<usize, ClientError> {
        let snapshots = self.store.load_all(KIND_ROOM).await?;
        let mut restored = 0;
        for snapshot in snapshots {
            match RoomState::from_snapshot(self.applier.registry(), &snapshot) {
                Ok(room) => {
                    self.rooms.insert(room.room_id().clone(), room);
                    restored += 1;
                }
                Err(err) => warn!(%err, "skipping unrestorable room snapshot"),
            }
        }
        Ok(restored)
    }

    /// Run one sync pass against the homeserver.
    pub async fn sync_once(&mut self) -> Result<SyncOutcome, ClientError> {
        if self.syncing {
            return Err(ClientError::Busy);
        }
        self.syncing = true;
        let result = self.sync_inner().await;
        self.syncing = false;
        result
    }

    async fn sync_inner(&mut self) -> Result<SyncOutcome, ClientError> {
        let mut url = format!("{}/_matrix/client/v3/sync", self.homeserver);
        if let Some(since) = &self.since {
            url.push_str("?since=");
            url.push_str(since);
        }
        let mut headers = Vec::new();
        if let Some(token) = &self.access_token {
            headers.push(("Authorization".to_owned(), format!("Bearer {token}")));
        }

        let response = self.transport.send("GET", &url, &headers, None).await?;
        if response.status != 200 {
            return Err(ClientError::UnexpectedStatus { status: response.status });
        }
        let body = response.body;

        let mut outcome = SyncOutcome::default();

        for (room_id, section) in room_sections(&body, "join") {
            let updates = self.applier.parse_updates(section);
            if updates.is_empty() {
                continue;
            }
            if let Some(room) = self.rooms.get_mut(&room_id) {
                self.applier.apply(room, updates);
            } else {
                match self.applier.build_room(room_id.clone(), updates) {
                    Ok(room) => {
                        self.rooms.insert(room_id.clone(), room);
                    }
                    Err(RoomError::MissingCreateEvent { .. }) => {
                        warn!(room = %room_id, "joined room section without create event");
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            let Some(room) = self.rooms.get(&room_id) else {
                continue;
            };
            // Room and messages persist together, one snapshot per room.
            let snapshot = room.snapshot();
            self.store
                .save(KIND_ROOM, StoreKey::primary(room_id.as_str()), snapshot)
                .await?;
            // A join resolves any pending invite preview.
            self.invites.remove(&room_id);
            outcome.updated.push(room_id);
        }

        for (room_id, section) in room_sections(&body, "invite") {
            match self.applier.parse_invite(room_id.clone(), section) {
                Ok(preview) => {
                    self.invites.insert(room_id.clone(), preview);
                    outcome.invited.push(room_id);
                }
                Err(err) => warn!(room = %room_id, %err, "skipping unusable invite preview"),
            }
        }

        for (room_id, _) in room_sections(&body, "leave") {
            self.rooms.remove(&room_id);
            self.invites.remove(&room_id);
            self.store.remove(KIND_ROOM, &StoreKey::primary(room_id.as_str())).await?;
            outcome.left.push(room_id);
        }

        if let Some(events) = body
            .get("account_data")
            .and_then(|section| section.get("events"))
            .and_then(Value::as_array)
        {
            for event in events {
                let Some(event_type) =
                    event.get("type").and_then(Value::as_str).map(EventType::from)
                else {
                    continue;
                };
                let content = event.get("content").unwrap_or(&Value::Null);
                match self.applier.registry().decode(&event_type, content) {
                    Ok(content) => {
                        self.account_data.insert(event_type, content);
                    }
                    Err(err) => debug!(%err, "skipping undecodable account data"),
                }
            }
        }

        if let Some(events) = body
            .get("to_device")
            .and_then(|section| section.get("events"))
            .and_then(Value::as_array)
        {
            for event in events {
                match ToDeviceEvent::from_value(self.applier.registry(), event.clone()) {
                    Ok(event) => outcome.to_device.push(event),
                    Err(err) => debug!(%err, "skipping undecodable to-device event"),
                }
            }
        }

        if let Some(next_batch) = body.get("next_batch").and_then(Value::as_str) {
            self.since = Some(next_batch.to_owned());
        }
        Ok(outcome)
    }
}

/// Iterate `rooms.<section>` entries with parseable room ids.
fn room_sections<'v>(
    body: &'v Value,
    section: &str,
) -> impl Iterator<Item = (RoomId, &'v Value)> {
    body.get("rooms")
        .and_then(|rooms| rooms.get(section))
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
        .filter_map(|(raw_id, value)| match RoomId::new(raw_id.as_str()) {
            Ok(room_id) => Some((room_id, value)),
            Err(err) => {
                warn!(%err, "skipping room section with invalid id");
                None
            }
        })
}
