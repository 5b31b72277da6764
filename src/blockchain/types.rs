//! Sui JSON-RPC payloads.
//!
//! Top-level responses keep every field they do not model in `extra` so the
//! full payload can be re-serialized for storage. Nested sections are kept as
//! raw JSON and viewed through the typed structs below when parsing.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasCostSummary {
    #[serde(default, deserialize_with = "decimal_string")]
    pub computation_cost: String,
    #[serde(default, deserialize_with = "decimal_string")]
    pub storage_cost: String,
    #[serde(default, deserialize_with = "decimal_string")]
    pub storage_rebate: String,
    #[serde(default, deserialize_with = "decimal_string")]
    pub non_refundable_storage_fee: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub digest: String,
    #[serde(default, deserialize_with = "decimal_string")]
    pub timestamp_ms: String,
    #[serde(default)]
    pub transactions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch_rolling_gas_cost_summary: Option<GasCostSummary>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBlockResponseOptions {
    pub show_input: bool,
    pub show_effects: bool,
    pub show_events: bool,
    pub show_object_changes: bool,
    pub show_balance_changes: bool,
}

impl TransactionBlockResponseOptions {
    /// Everything the indexing pipeline needs.
    pub fn full() -> Self {
        Self {
            show_input: true,
            show_effects: true,
            show_events: true,
            show_object_changes: true,
            show_balance_changes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBlockResponse {
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_changes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_changes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "optional_decimal_string")]
    pub timestamp_ms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "optional_decimal_string")]
    pub checkpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_local_execution: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TransactionBlockResponse {
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_ms
            .as_deref()
            .and_then(|ms| ms.parse().ok())
            .unwrap_or(0)
    }
}

/// `{ "AddressOwner": "0x.." }`, `{ "ObjectOwner": "0x.." }`, `{ "Shared": {..} }`
/// or `"Immutable"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum Owner {
    AddressOwner(String),
    ObjectOwner(String),
    Shared(Value),
    Immutable,
}

/// Owner field as it appears in the wild: a known owner shape, a bare address
/// string, or something this crate does not model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OwnerField {
    Known(Owner),
    Address(String),
    Other(Value),
}

impl OwnerField {
    pub fn address_owner(&self) -> Option<&str> {
        match self {
            OwnerField::Known(Owner::AddressOwner(address)) => Some(address.as_str()),
            _ => None,
        }
    }

    /// Address or object owner, falling back to a bare string.
    pub fn any_owner(&self) -> Option<&str> {
        match self {
            OwnerField::Known(Owner::AddressOwner(id)) | OwnerField::Known(Owner::ObjectOwner(id)) => {
                Some(id.as_str())
            }
            OwnerField::Address(address) => Some(address.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceChange {
    pub owner: Option<OwnerField>,
    #[serde(default)]
    pub coin_type: String,
    #[serde(default, deserialize_with = "decimal_string")]
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectChange {
    #[serde(rename = "type", default)]
    pub change_type: String,
    pub object_id: Option<String>,
    pub object_type: Option<String>,
    pub sender: Option<String>,
    pub recipient: Option<OwnerField>,
    pub owner: Option<OwnerField>,
    #[serde(default, deserialize_with = "optional_decimal_string")]
    pub amount: Option<String>,
    pub coin_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Event {
    pub sender: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExecutionStatus {
    #[serde(default)]
    pub status: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEffects {
    #[serde(default)]
    pub status: ExecutionStatus,
    #[serde(default)]
    pub gas_used: GasCostSummary,
    #[serde(default, deserialize_with = "optional_decimal_string")]
    pub gas_cost: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TransactionData {
    pub sender: Option<String>,
    pub transaction: Option<Value>,
}

/// `transaction.data` of a response with `showInput`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SenderSignedData {
    #[serde(default)]
    pub data: TransactionData,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MoveCall {
    pub package: Option<String>,
    pub module: Option<String>,
    pub function: Option<String>,
}

/// Transaction kind, tagged by the payload's `kind` field.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionKind {
    MoveCall(MoveCall),
    TransferObject,
    TransferSui,
    Pay,
    PaySui,
    PayAllSui,
    Publish,
    Upgrade,
    Batch,
    Raw(String),
}

impl TransactionKind {
    pub fn from_value(value: Option<&Value>) -> Self {
        let kind = value
            .and_then(|v| v.get("kind"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        match kind {
            "moveCall" => {
                let call = value
                    .and_then(|v| v.get("data"))
                    .cloned()
                    .and_then(|data| serde_json::from_value(data).ok())
                    .unwrap_or_default();
                TransactionKind::MoveCall(call)
            }
            "transferObject" => TransactionKind::TransferObject,
            "transferSui" => TransactionKind::TransferSui,
            "pay" => TransactionKind::Pay,
            "paySui" => TransactionKind::PaySui,
            "payAllSui" => TransactionKind::PayAllSui,
            "publish" => TransactionKind::Publish,
            "upgrade" => TransactionKind::Upgrade,
            "batch" => TransactionKind::Batch,
            other => TransactionKind::Raw(other.to_string()),
        }
    }

    /// The raw classifier as sent by the node.
    pub fn kind(&self) -> &str {
        match self {
            TransactionKind::MoveCall(_) => "moveCall",
            TransactionKind::TransferObject => "transferObject",
            TransactionKind::TransferSui => "transferSui",
            TransactionKind::Pay => "pay",
            TransactionKind::PaySui => "paySui",
            TransactionKind::PayAllSui => "payAllSui",
            TransactionKind::Publish => "publish",
            TransactionKind::Upgrade => "upgrade",
            TransactionKind::Batch => "batch",
            TransactionKind::Raw(kind) => kind,
        }
    }

    pub fn label(&self) -> String {
        let label = match self {
            TransactionKind::MoveCall(_) => "Move Function Call",
            TransactionKind::TransferObject => "Object Transfer",
            TransactionKind::TransferSui => "SUI Transfer",
            TransactionKind::Pay => "Payment",
            TransactionKind::PaySui => "SUI Payment",
            TransactionKind::PayAllSui => "Pay All SUI",
            TransactionKind::Publish => "Module Publish",
            TransactionKind::Upgrade => "Module Upgrade",
            TransactionKind::Batch => "Batch Transaction",
            TransactionKind::Raw(kind) => return format!("Unknown ({})", kind),
        };
        label.to_string()
    }
}

/// Sui encodes 64-bit quantities as decimal strings, but older nodes and
/// test fixtures sometimes send plain numbers.
fn decimal_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_decimal_string(deserializer)?.unwrap_or_default())
}

fn optional_decimal_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
