//! Read-only access to the chain.
//!
//! The engine never talks to a node directly. It depends on two traits,
//! [`EventSource`] and [`ObjectSource`], injected as `Arc<dyn ...>`. The
//! production implementation is [`rpc::SuiRpcClient`]; tests and offline
//! runs use [`memory::MemoryChain`].

pub mod content;
pub mod memory;
pub mod rpc;
pub mod tx;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::domain::{EventId, ObjectId, RawEvent};
use crate::error::GatewayError;

pub use memory::MemoryChain;
pub use rpc::SuiRpcClient;
pub use tx::ProgrammableTx;

/// One page of `suix_queryEvents` results.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    /// Events on this page, in the requested order.
    pub data: Vec<RawEvent>,
    /// Cursor to pass for the next page.
    pub next_cursor: Option<EventId>,
    /// Whether the node reports more pages.
    pub has_next_page: bool,
}

/// Which parts of an object to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct ObjectOptions {
    /// Include the Move type.
    pub show_type: bool,
    /// Include the owner.
    pub show_owner: bool,
    /// Include the Move content.
    pub show_content: bool,
    /// Include the resolved `Display`.
    pub show_display: bool,
}

impl ObjectOptions {
    /// Type, owner, content, and display.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            show_type: true,
            show_owner: true,
            show_content: true,
            show_display: true,
        }
    }

    /// Type and content only.
    #[must_use]
    pub const fn content() -> Self {
        Self {
            show_type: true,
            show_owner: false,
            show_content: true,
            show_display: false,
        }
    }

    /// Owner only.
    #[must_use]
    pub const fn owner() -> Self {
        Self {
            show_type: false,
            show_owner: true,
            show_content: false,
            show_display: false,
        }
    }
}

/// Ownership of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectOwner {
    /// Owned by an address.
    Address(ObjectId),
    /// Owned by another object (dynamic fields, wrapped objects).
    Object(ObjectId),
    /// Shared object.
    Shared {
        /// Version at which the object became shared.
        initial_shared_version: u64,
    },
    /// Frozen object.
    Immutable,
}

/// An object as read from the node.
#[derive(Debug, Clone, PartialEq)]
pub struct SuiObject {
    /// Object id.
    pub object_id: ObjectId,
    /// Current version.
    pub version: u64,
    /// Move type, when requested.
    pub object_type: Option<String>,
    /// Owner, when requested.
    pub owner: Option<ObjectOwner>,
    /// Move struct content (`{"type", "fields"}`), when requested.
    pub content: Option<Value>,
    /// Resolved `Display` fields, when requested.
    pub display: BTreeMap<String, String>,
}

impl SuiObject {
    /// Returns a field of the object's Move content.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.content.as_ref().and_then(|c| content::field(c, name))
    }
}

/// Typed key of a dynamic field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicFieldKey {
    /// Move type of the key.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Key value in JSON form.
    pub value: Value,
}

impl DynamicFieldKey {
    /// Key of a kiosk listing: `0x2::kiosk::Listing { id, is_exclusive: false }`.
    #[must_use]
    pub fn kiosk_listing(item_id: &ObjectId) -> Self {
        Self {
            type_name: "0x2::kiosk::Listing".to_string(),
            value: serde_json::json!({ "id": item_id.as_str(), "is_exclusive": false }),
        }
    }

    /// Key of a table entry indexed by `0x2::object::ID`.
    #[must_use]
    pub fn object_id(id: &ObjectId) -> Self {
        Self {
            type_name: "0x2::object::ID".to_string(),
            value: Value::String(id.as_str().to_string()),
        }
    }
}

/// Filter for `suix_getOwnedObjects`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OwnedObjectFilter {
    /// Objects of an exact Move struct type.
    StructType(String),
}

/// Return values of one command in a dev-inspect result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// `(bcs bytes, move type)` per returned value.
    pub return_values: Vec<(Vec<u8>, String)>,
}

impl CommandResult {
    /// Decodes the first return value as a BCS `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Malformed`] when there is no return value or
    /// it does not decode as exactly one `u64`.
    pub fn first_u64(&self) -> Result<u64, GatewayError> {
        let (bytes, type_name) = self
            .return_values
            .first()
            .ok_or_else(|| GatewayError::Malformed("no return value".to_string()))?;
        bcs::from_bytes::<u64>(bytes)
            .map_err(|e| GatewayError::Malformed(format!("{type_name} return value: {e}")))
    }
}

/// Source of chain events.
#[async_trait]
pub trait EventSource: Send + Sync + std::fmt::Debug {
    /// Queries one page of events of an exact Move event type.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] or [`GatewayError::Rpc`] when the
    /// node cannot answer.
    async fn query_events(
        &self,
        event_type: &str,
        cursor: Option<&EventId>,
        limit: usize,
        descending: bool,
    ) -> Result<EventPage, GatewayError>;
}

/// Source of object state.
#[async_trait]
pub trait ObjectSource: Send + Sync + std::fmt::Debug {
    /// Reads an object. `Ok(None)` when it does not exist or was deleted.
    ///
    /// # Errors
    ///
    /// Returns a transport or RPC error when the node cannot answer.
    async fn get_object(
        &self,
        id: &ObjectId,
        options: ObjectOptions,
    ) -> Result<Option<SuiObject>, GatewayError>;

    /// Reads a dynamic field object. `Ok(None)` when the field is absent.
    ///
    /// # Errors
    ///
    /// Returns a transport or RPC error when the node cannot answer.
    async fn get_dynamic_field_object(
        &self,
        parent: &ObjectId,
        key: &DynamicFieldKey,
    ) -> Result<Option<SuiObject>, GatewayError>;

    /// Lists every object owned by an address matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns a transport or RPC error when the node cannot answer.
    async fn get_owned_objects(
        &self,
        owner: &ObjectId,
        filter: &OwnedObjectFilter,
        options: ObjectOptions,
    ) -> Result<Vec<SuiObject>, GatewayError>;

    /// Executes a programmable transaction read-only and returns the
    /// results of each command.
    ///
    /// # Errors
    ///
    /// Returns a transport or RPC error when the node cannot answer, or
    /// [`GatewayError::Malformed`] when execution aborted.
    async fn dev_inspect(
        &self,
        sender: &ObjectId,
        tx: &ProgrammableTx,
    ) -> Result<Vec<CommandResult>, GatewayError>;
}
