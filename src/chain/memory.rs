//! In-memory chain for tests and offline runs.
//!
//! [`MemoryChain`] implements both read traits over plain maps. Failures
//! and latency can be injected per event type, per object, and per pool so
//! partial-failure paths can be driven deterministically.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::RwLock;

use super::{
    CommandResult, DynamicFieldKey, EventPage, EventSource, ObjectOptions, ObjectOwner,
    ObjectSource, OwnedObjectFilter, ProgrammableTx, SuiObject,
};
use crate::domain::{EventId, ObjectId, RawEvent};
use crate::error::GatewayError;

#[derive(Debug, Default)]
struct State {
    events: HashMap<String, Vec<RawEvent>>,
    objects: HashMap<ObjectId, SuiObject>,
    dynamic_fields: HashMap<(ObjectId, String), SuiObject>,
    owned: HashMap<(ObjectId, String), Vec<SuiObject>>,
    views: HashMap<(String, ObjectId, ObjectId), u64>,
    failing_event_types: HashSet<String>,
    failing_objects: HashMap<ObjectId, usize>,
    failing_views: HashSet<ObjectId>,
    event_delay: Option<Duration>,
}

/// In-memory [`EventSource`] and [`ObjectSource`].
#[derive(Debug, Default)]
pub struct MemoryChain {
    state: RwLock<State>,
    event_queries: AtomicUsize,
    object_reads: AtomicUsize,
}

fn field_key(key: &DynamicFieldKey) -> String {
    format!("{}|{}", key.type_name, key.value)
}

fn transport(what: &str) -> GatewayError {
    GatewayError::Transport(format!("injected failure: {what}"))
}

impl MemoryChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event under its Move event type.
    pub async fn push_event(&self, event: RawEvent) {
        let mut state = self.state.write().await;
        state
            .events
            .entry(event.event_type.clone())
            .or_default()
            .push(event);
    }

    /// Stores or replaces an object.
    pub async fn put_object(&self, object: SuiObject) {
        let mut state = self.state.write().await;
        state.objects.insert(object.object_id.clone(), object);
    }

    /// Removes an object.
    pub async fn remove_object(&self, id: &ObjectId) {
        self.state.write().await.objects.remove(id);
    }

    /// Stores a dynamic field under `parent`.
    pub async fn put_dynamic_field(&self, parent: &ObjectId, key: &DynamicFieldKey, object: SuiObject) {
        let mut state = self.state.write().await;
        state
            .dynamic_fields
            .insert((parent.clone(), field_key(key)), object);
    }

    /// Removes a dynamic field.
    pub async fn remove_dynamic_field(&self, parent: &ObjectId, key: &DynamicFieldKey) {
        let mut state = self.state.write().await;
        state.dynamic_fields.remove(&(parent.clone(), field_key(key)));
    }

    /// Records an object owned by `owner` with the given struct type.
    pub async fn put_owned(&self, owner: &ObjectId, struct_type: &str, object: SuiObject) {
        let mut state = self.state.write().await;
        state
            .owned
            .entry((owner.clone(), struct_type.to_string()))
            .or_default()
            .push(object);
    }

    /// Sets the value a view function returns for `(pool, owner)`.
    pub async fn set_view(&self, function: &str, pool: &ObjectId, owner: &ObjectId, value: u64) {
        let mut state = self.state.write().await;
        state
            .views
            .insert((function.to_string(), pool.clone(), owner.clone()), value);
    }

    /// Makes every query for `event_type` fail.
    pub async fn fail_event_type(&self, event_type: &str) {
        let mut state = self.state.write().await;
        state.failing_event_types.insert(event_type.to_string());
    }

    /// Makes the next `times` reads of `id` (as object or dynamic-field
    /// parent) fail with a transport error. `usize::MAX` fails forever.
    pub async fn fail_object(&self, id: &ObjectId, times: usize) {
        let mut state = self.state.write().await;
        state.failing_objects.insert(id.clone(), times);
    }

    /// Makes dev-inspect calls against `pool` fail.
    pub async fn fail_views(&self, pool: &ObjectId) {
        self.state.write().await.failing_views.insert(pool.clone());
    }

    /// Delays every event query.
    pub async fn set_event_delay(&self, delay: Duration) {
        self.state.write().await.event_delay = Some(delay);
    }

    /// Number of event queries served so far.
    #[must_use]
    pub fn event_queries(&self) -> usize {
        self.event_queries.load(Ordering::SeqCst)
    }

    /// Number of object and dynamic-field reads served so far.
    #[must_use]
    pub fn object_reads(&self) -> usize {
        self.object_reads.load(Ordering::SeqCst)
    }

    async fn check_object_failure(&self, id: &ObjectId) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        if let Some(remaining) = state.failing_objects.get_mut(id) {
            if *remaining == 0 {
                return Ok(());
            }
            if *remaining != usize::MAX {
                *remaining -= 1;
            }
            return Err(transport(id.as_str()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventSource for MemoryChain {
    async fn query_events(
        &self,
        event_type: &str,
        cursor: Option<&EventId>,
        limit: usize,
        descending: bool,
    ) -> Result<EventPage, GatewayError> {
        self.event_queries.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.read().await.event_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.read().await;
        if state.failing_event_types.contains(event_type) {
            return Err(transport(event_type));
        }
        let mut events = state.events.get(event_type).cloned().unwrap_or_default();
        events.sort_by_key(|e| e.timestamp_ms.unwrap_or_default());
        if descending {
            events.reverse();
        }

        let start = cursor
            .and_then(|c| events.iter().position(|e| &e.id == c))
            .map_or(0, |i| i + 1);
        let data: Vec<RawEvent> = events.iter().skip(start).take(limit).cloned().collect();
        let has_next_page = start + data.len() < events.len();
        Ok(EventPage {
            next_cursor: data.last().map(|e| e.id.clone()),
            has_next_page,
            data,
        })
    }
}

#[async_trait]
impl ObjectSource for MemoryChain {
    async fn get_object(
        &self,
        id: &ObjectId,
        _options: ObjectOptions,
    ) -> Result<Option<SuiObject>, GatewayError> {
        self.object_reads.fetch_add(1, Ordering::SeqCst);
        self.check_object_failure(id).await?;
        Ok(self.state.read().await.objects.get(id).cloned())
    }

    async fn get_dynamic_field_object(
        &self,
        parent: &ObjectId,
        key: &DynamicFieldKey,
    ) -> Result<Option<SuiObject>, GatewayError> {
        self.object_reads.fetch_add(1, Ordering::SeqCst);
        self.check_object_failure(parent).await?;
        let state = self.state.read().await;
        Ok(state
            .dynamic_fields
            .get(&(parent.clone(), field_key(key)))
            .cloned())
    }

    async fn get_owned_objects(
        &self,
        owner: &ObjectId,
        filter: &OwnedObjectFilter,
        _options: ObjectOptions,
    ) -> Result<Vec<SuiObject>, GatewayError> {
        self.check_object_failure(owner).await?;
        let OwnedObjectFilter::StructType(struct_type) = filter;
        let state = self.state.read().await;
        Ok(state
            .owned
            .get(&(owner.clone(), struct_type.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn dev_inspect(
        &self,
        sender: &ObjectId,
        tx: &ProgrammableTx,
    ) -> Result<Vec<CommandResult>, GatewayError> {
        let state = self.state.read().await;
        let pool = tx
            .shared_object_ids()
            .next()
            .cloned()
            .ok_or_else(|| GatewayError::Malformed("view call without pool".to_string()))?;
        if state.failing_views.contains(&pool) {
            return Err(transport(pool.as_str()));
        }
        tx.call_targets()
            .map(|target| -> Result<CommandResult, GatewayError> {
                let function = target.rsplit("::").next().unwrap_or_default().to_string();
                let value = state
                    .views
                    .get(&(function, pool.clone(), sender.clone()))
                    .copied()
                    .unwrap_or(0);
                let bytes = bcs::to_bytes(&value)
                    .map_err(|e| GatewayError::Internal(format!("bcs encoding: {e}")))?;
                Ok(CommandResult {
                    return_values: vec![(bytes, "u64".to_string())],
                })
            })
            .collect()
    }
}

/// Builders for the object shapes the engine reads.
pub mod fixtures {
    use super::*;

    /// A raw event with a checkpoint timestamp.
    #[must_use]
    pub fn raw_event(event_type: &str, tx: &str, timestamp_ms: u64, parsed_json: Value) -> RawEvent {
        RawEvent {
            id: EventId {
                tx_digest: tx.to_string(),
                event_seq: 0,
            },
            event_type: event_type.to_string(),
            sender: None,
            timestamp_ms: Some(timestamp_ms),
            parsed_json,
        }
    }

    /// A plain object with Move content and display.
    #[must_use]
    pub fn object(
        id: &ObjectId,
        object_type: &str,
        fields: Value,
        display: &[(&str, &str)],
    ) -> SuiObject {
        SuiObject {
            object_id: id.clone(),
            version: 1,
            object_type: Some(object_type.to_string()),
            owner: None,
            content: Some(json!({ "dataType": "moveObject", "type": object_type, "fields": fields })),
            display: display
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    /// A shared staking pool whose `staked_nfts` table has id `table_id`.
    #[must_use]
    pub fn pool(pool_id: &ObjectId, table_id: &ObjectId, initial_shared_version: u64) -> SuiObject {
        let mut pool = object(
            pool_id,
            "0x1234::staking::Pool",
            json!({
                "id": { "id": pool_id.as_str() },
                "staked_nfts": {
                    "type": "0x2::table::Table<0x2::object::ID, 0x1234::staking::StakeInfo>",
                    "fields": { "id": { "id": table_id.as_str() }, "size": "0" }
                }
            }),
            &[],
        );
        pool.owner = Some(ObjectOwner::Shared {
            initial_shared_version,
        });
        pool
    }

    /// A dynamic field wrapping `value`.
    #[must_use]
    pub fn dynamic_field(field_id: &ObjectId, parent: &ObjectId, value: Value) -> SuiObject {
        let mut field = object(
            field_id,
            "0x2::dynamic_field::Field",
            json!({ "id": { "id": field_id.as_str() }, "name": null, "value": value }),
            &[],
        );
        field.owner = Some(ObjectOwner::Object(parent.clone()));
        field
    }
}
