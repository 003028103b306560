//! Sui JSON-RPC client.
//!
//! Thin `reqwest` wrapper issuing `jsonrpc: 2.0` POSTs. Transport failures
//! and JSON-RPC error objects surface as [`GatewayError::Transport`] and
//! [`GatewayError::Rpc`]; an absent object is `Ok(None)`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::content::{de_opt_u64, de_u64};
use super::{
    CommandResult, DynamicFieldKey, EventPage, EventSource, ObjectOptions, ObjectOwner,
    ObjectSource, OwnedObjectFilter, ProgrammableTx, SuiObject,
};
use crate::domain::{EventId, ObjectId, RawEvent};
use crate::error::GatewayError;

/// Page size for `suix_getOwnedObjects`.
const OWNED_PAGE_LIMIT: usize = 50;

/// Upper bound on owned-object pages walked for one owner.
const OWNED_MAX_PAGES: usize = 20;

fn rpc_request(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    })
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventPageWire {
    #[serde(default)]
    data: Vec<RawEvent>,
    next_cursor: Option<EventId>,
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct ObjectResponseWire {
    data: Option<ObjectDataWire>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectDataWire {
    object_id: String,
    #[serde(deserialize_with = "de_u64")]
    version: u64,
    #[serde(rename = "type")]
    object_type: Option<String>,
    owner: Option<Value>,
    content: Option<Value>,
    display: Option<DisplayWire>,
}

#[derive(Debug, Deserialize)]
struct DisplayWire {
    data: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnedPageWire {
    #[serde(default)]
    data: Vec<ObjectResponseWire>,
    next_cursor: Option<Value>,
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct DevInspectWire {
    effects: Option<Value>,
    error: Option<String>,
    #[serde(default)]
    results: Vec<ExecutionResultWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionResultWire {
    #[serde(default)]
    return_values: Vec<(Vec<u8>, String)>,
}

#[derive(Debug, Deserialize)]
struct SharedOwnerWire {
    #[serde(deserialize_with = "de_opt_u64", default)]
    initial_shared_version: Option<u64>,
}

fn parse_owner(value: &Value) -> Option<ObjectOwner> {
    if value.as_str() == Some("Immutable") {
        return Some(ObjectOwner::Immutable);
    }
    if let Some(address) = value.get("AddressOwner").and_then(Value::as_str) {
        return ObjectId::parse(address).ok().map(ObjectOwner::Address);
    }
    if let Some(parent) = value.get("ObjectOwner").and_then(Value::as_str) {
        return ObjectId::parse(parent).ok().map(ObjectOwner::Object);
    }
    let shared = value.get("Shared")?;
    let wire: SharedOwnerWire = serde_json::from_value(shared.clone()).ok()?;
    Some(ObjectOwner::Shared {
        initial_shared_version: wire.initial_shared_version?,
    })
}

impl ObjectResponseWire {
    /// Converts a node response into an object, `None` when absent.
    fn into_object(self) -> Result<Option<SuiObject>, GatewayError> {
        let Some(data) = self.data else {
            // `notExists`, `deleted`, `dynamicFieldNotFound` all mean absent.
            if let Some(error) = self.error {
                tracing::trace!(error = %error, "object not available");
            }
            return Ok(None);
        };
        let object_id = ObjectId::parse(&data.object_id)?;
        let display = data
            .display
            .and_then(|d| d.data)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(k, v)| super::content::scalar_string(&v).map(|s| (k, s)))
            .collect();
        Ok(Some(SuiObject {
            object_id,
            version: data.version,
            object_type: data.object_type,
            owner: data.owner.as_ref().and_then(parse_owner),
            content: data.content,
            display,
        }))
    }
}

fn event_cursor(cursor: &EventId) -> Value {
    json!({
        "txDigest": cursor.tx_digest,
        "eventSeq": cursor.event_seq.to_string(),
    })
}

/// JSON-RPC client for a Sui full node.
#[derive(Debug, Clone)]
pub struct SuiRpcClient {
    rpc_url: String,
    client: reqwest::Client,
}

impl SuiRpcClient {
    /// Creates a client for `rpc_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] if the HTTP client cannot be
    /// built.
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            rpc_url: rpc_url.into(),
            client,
        })
    }

    /// Node URL.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, GatewayError> {
        let request = rpc_request(method, params);

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("{method}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Transport(format!("{method}: HTTP {status}")));
        }

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(format!("{method}: {e}")))?;

        if let Some(error) = body.error {
            return Err(GatewayError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        body.result
            .ok_or_else(|| GatewayError::Malformed(format!("{method}: empty result")))
    }
}

#[async_trait]
impl EventSource for SuiRpcClient {
    async fn query_events(
        &self,
        event_type: &str,
        cursor: Option<&EventId>,
        limit: usize,
        descending: bool,
    ) -> Result<EventPage, GatewayError> {
        let params = json!([
            { "MoveEventType": event_type },
            cursor.map(event_cursor),
            limit,
            descending,
        ]);
        let page: EventPageWire = self.call("suix_queryEvents", params).await?;
        Ok(EventPage {
            data: page.data,
            next_cursor: page.next_cursor,
            has_next_page: page.has_next_page,
        })
    }
}

#[async_trait]
impl ObjectSource for SuiRpcClient {
    async fn get_object(
        &self,
        id: &ObjectId,
        options: ObjectOptions,
    ) -> Result<Option<SuiObject>, GatewayError> {
        let params = json!([id.as_str(), options]);
        let response: ObjectResponseWire = self.call("sui_getObject", params).await?;
        response.into_object()
    }

    async fn get_dynamic_field_object(
        &self,
        parent: &ObjectId,
        key: &DynamicFieldKey,
    ) -> Result<Option<SuiObject>, GatewayError> {
        let params = json!([parent.as_str(), key]);
        match self
            .call::<ObjectResponseWire>("suix_getDynamicFieldObject", params)
            .await
        {
            Ok(response) => response.into_object(),
            // Some node versions report a missing field as an RPC error.
            Err(GatewayError::Rpc { message, .. }) if message.contains("not found") => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_owned_objects(
        &self,
        owner: &ObjectId,
        filter: &OwnedObjectFilter,
        options: ObjectOptions,
    ) -> Result<Vec<SuiObject>, GatewayError> {
        let mut objects = Vec::new();
        let mut cursor: Option<Value> = None;

        for _ in 0..OWNED_MAX_PAGES {
            let params = json!([
                owner.as_str(),
                { "filter": filter, "options": options },
                cursor,
                OWNED_PAGE_LIMIT,
            ]);
            let page: OwnedPageWire = self.call("suix_getOwnedObjects", params).await?;
            for response in page.data {
                if let Some(object) = response.into_object()? {
                    objects.push(object);
                }
            }
            if !page.has_next_page || page.next_cursor.is_none() {
                break;
            }
            cursor = page.next_cursor;
        }
        Ok(objects)
    }

    async fn dev_inspect(
        &self,
        sender: &ObjectId,
        tx: &ProgrammableTx,
    ) -> Result<Vec<CommandResult>, GatewayError> {
        let params = json!([sender.as_str(), tx.to_base64()?, Value::Null, Value::Null]);
        let result: DevInspectWire = self.call("sui_devInspectTransactionBlock", params).await?;
        into_command_results(result)
    }
}

fn into_command_results(result: DevInspectWire) -> Result<Vec<CommandResult>, GatewayError> {
    if let Some(error) = result.error {
        return Err(GatewayError::Malformed(format!("dev-inspect aborted: {error}")));
    }
    let status = result
        .effects
        .as_ref()
        .and_then(|e| e.get("status"))
        .and_then(|s| s.get("status"))
        .and_then(Value::as_str);
    if let Some(status) = status
        && status != "success"
    {
        return Err(GatewayError::Malformed(format!("dev-inspect status {status}")));
    }
    Ok(result
        .results
        .into_iter()
        .map(|r| CommandResult {
            return_values: r.return_values,
        })
        .collect())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn object_response(value: Value) -> Result<Option<SuiObject>, GatewayError> {
        let Ok(wire) = serde_json::from_value::<ObjectResponseWire>(value) else {
            panic!("wire should deserialize");
        };
        wire.into_object()
    }

    #[test]
    fn request_envelope() {
        let request = rpc_request("sui_getObject", json!(["0x1"]));
        assert_eq!(request["jsonrpc"], "2.0");
        assert_eq!(request["method"], "sui_getObject");
        assert_eq!(request["params"][0], "0x1");
    }

    #[test]
    fn shared_object_response() {
        let response = object_response(json!({
            "data": {
                "objectId": "0xa",
                "version": "42",
                "digest": "abc",
                "type": "0x1234::staking::Pool",
                "owner": { "Shared": { "initial_shared_version": 7 } },
                "content": {
                    "dataType": "moveObject",
                    "type": "0x1234::staking::Pool",
                    "fields": { "staked_nfts": { "fields": { "id": { "id": "0xb" } } } }
                },
                "display": { "data": { "name": "Pool", "level": 3 }, "error": null }
            }
        }));
        let Ok(Some(object)) = response else {
            panic!("object expected");
        };
        assert_eq!(object.version, 42);
        assert_eq!(
            object.owner,
            Some(ObjectOwner::Shared {
                initial_shared_version: 7
            })
        );
        assert_eq!(object.display.get("level").map(String::as_str), Some("3"));
        assert!(object.field("staked_nfts").is_some());
    }

    #[test]
    fn missing_object_is_none() {
        let response = object_response(json!({
            "error": { "code": "notExists", "object_id": "0xa" }
        }));
        assert_eq!(response, Ok(None));
    }

    #[test]
    fn owner_shapes() {
        let Ok(addr) = ObjectId::parse("0xc0") else {
            panic!("valid id");
        };
        assert_eq!(
            parse_owner(&json!({ "AddressOwner": "0xc0" })),
            Some(ObjectOwner::Address(addr))
        );
        assert_eq!(parse_owner(&json!("Immutable")), Some(ObjectOwner::Immutable));
        assert_eq!(
            parse_owner(&json!({ "Shared": { "initial_shared_version": "9" } })),
            Some(ObjectOwner::Shared {
                initial_shared_version: 9
            })
        );
        assert_eq!(parse_owner(&json!({ "Unknown": 1 })), None);
    }

    #[test]
    fn event_page_deserializes() {
        let Ok(page) = serde_json::from_value::<EventPageWire>(json!({
            "data": [{
                "id": { "txDigest": "D1", "eventSeq": "0" },
                "type": "0x2::kiosk::ItemListed<0x9::nft::Nft>",
                "timestampMs": "1700000000000",
                "parsedJson": { "kiosk": "0xe1", "id": "0x5", "price": "100" }
            }],
            "nextCursor": { "txDigest": "D1", "eventSeq": "0" },
            "hasNextPage": false
        })) else {
            panic!("page should deserialize");
        };
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.next_cursor.map(|c| c.tx_digest), Some("D1".to_string()));
    }

    #[test]
    fn cursor_encodes_seq_as_string() {
        let cursor = event_cursor(&EventId {
            tx_digest: "D".to_string(),
            event_seq: 3,
        });
        assert_eq!(cursor["eventSeq"], "3");
    }

    #[test]
    fn dev_inspect_results() {
        let Ok(wire) = serde_json::from_value::<DevInspectWire>(json!({
            "effects": { "status": { "status": "success" } },
            "results": [{ "returnValues": [[[5, 0, 0, 0, 0, 0, 0, 0], "u64"]] }]
        })) else {
            panic!("wire should deserialize");
        };
        let Ok(results) = into_command_results(wire) else {
            panic!("results expected");
        };
        assert_eq!(results.first().map(CommandResult::first_u64), Some(Ok(5)));
    }

    #[test]
    fn dev_inspect_abort_is_error() {
        let Ok(wire) = serde_json::from_value::<DevInspectWire>(json!({
            "effects": { "status": { "status": "failure", "error": "MoveAbort" } },
            "results": []
        })) else {
            panic!("wire should deserialize");
        };
        assert!(matches!(
            into_command_results(wire),
            Err(GatewayError::Malformed(_))
        ));
    }
}
