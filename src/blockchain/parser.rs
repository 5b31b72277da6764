// Turns a raw transaction block response into a `ParsedTransactionInfo`.
// Every step is a free function so it can be exercised on its own.

use crate::blockchain::types::{
    BalanceChange, Event, ObjectChange, SenderSignedData, TransactionBlockResponse,
    TransactionEffects, TransactionKind,
};
use crate::models::{
    datetime_from_millis, BalanceChangeInfo, BalanceChangeType, ObjectChangeInfo,
    ParsedTransactionInfo, TokenInfo, TransactionStatus,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

pub const UNKNOWN_SENDER: &str = "unknown";

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed {section} section: {source}")]
    Malformed {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid integer amount: {0:?}")]
    InvalidAmount(String),

    #[error("Gas cost overflow: {0} + {1}")]
    GasOverflow(String, String),
}

/// Typed views over the sections of a response the parser reads.
struct Sections {
    data: SenderSignedData,
    effects: TransactionEffects,
    events: Vec<Event>,
    object_changes: Vec<ObjectChange>,
    balance_changes: Vec<BalanceChange>,
}

fn section<T: DeserializeOwned + Default>(
    value: Option<&Value>,
    name: &'static str,
) -> Result<T, ParseError> {
    match value {
        None | Some(Value::Null) => Ok(T::default()),
        Some(v) => serde_json::from_value(v.clone()).map_err(|source| ParseError::Malformed {
            section: name,
            source,
        }),
    }
}

impl Sections {
    fn read(response: &TransactionBlockResponse) -> Result<Self, ParseError> {
        Ok(Self {
            data: section(response.transaction.as_ref(), "transaction")?,
            effects: section(response.effects.as_ref(), "effects")?,
            events: section(response.events.as_ref(), "events")?,
            object_changes: section(response.object_changes.as_ref(), "objectChanges")?,
            balance_changes: section(response.balance_changes.as_ref(), "balanceChanges")?,
        })
    }
}

/// Parse a raw response observed in checkpoint `block_number`.
pub fn parse_transaction(
    response: &TransactionBlockResponse,
    block_number: i64,
) -> Result<ParsedTransactionInfo, ParseError> {
    let sections = Sections::read(response)?;

    let sender = extract_sender(&sections.data);
    let recipients = extract_recipients(&sections.object_changes, &sections.balance_changes);
    let involved_addresses = extract_involved_addresses(&sender, &recipients, &sections.events);
    let kind = TransactionKind::from_value(sections.data.data.transaction.as_ref());
    let (module_name, function_name) = match &kind {
        TransactionKind::MoveCall(call) => (call.module.clone(), call.function.clone()),
        _ => (None, None),
    };
    let tokens = extract_tokens(&sections.balance_changes, &sections.object_changes);
    let balance_changes = parse_balance_changes(&sections.balance_changes)?;
    let object_changes = parse_object_changes(&sections.object_changes);
    let (status, error_message) = parse_status(&sections.effects);
    let gas_used = total_gas_used(
        &sections.effects.gas_used.computation_cost,
        &sections.effects.gas_used.storage_cost,
    )?;
    let gas_cost = sections
        .effects
        .gas_cost
        .clone()
        .unwrap_or_else(|| "0".to_string());

    Ok(ParsedTransactionInfo {
        digest: response.digest.clone(),
        timestamp: datetime_from_millis(response.timestamp_millis()),
        block_number,
        sender,
        recipients,
        involved_addresses,
        transaction_type: kind.label(),
        transaction_kind: kind.kind().to_string(),
        module_name,
        function_name,
        tokens,
        balance_changes,
        object_changes,
        status,
        error_message,
        gas_used,
        gas_cost,
    })
}

fn push_unique(list: &mut Vec<String>, seen: &mut HashSet<String>, value: &str) {
    if seen.insert(value.to_string()) {
        list.push(value.to_string());
    }
}

pub fn extract_sender(data: &SenderSignedData) -> String {
    data.data
        .sender
        .clone()
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string())
}

/// Object-change recipients followed by balance-change address owners, in
/// first-seen order.
pub fn extract_recipients(
    object_changes: &[ObjectChange],
    balance_changes: &[BalanceChange],
) -> Vec<String> {
    let mut recipients = Vec::new();
    let mut seen = HashSet::new();

    for change in object_changes {
        if let Some(recipient) = change.recipient.as_ref().and_then(|r| r.any_owner()) {
            push_unique(&mut recipients, &mut seen, recipient);
        }
    }
    for change in balance_changes {
        if let Some(owner) = change.owner.as_ref().and_then(|o| o.address_owner()) {
            push_unique(&mut recipients, &mut seen, owner);
        }
    }

    recipients
}

pub fn extract_involved_addresses(
    sender: &str,
    recipients: &[String],
    events: &[Event],
) -> Vec<String> {
    let mut addresses = Vec::new();
    let mut seen = HashSet::new();

    if sender != UNKNOWN_SENDER {
        push_unique(&mut addresses, &mut seen, sender);
    }
    for recipient in recipients {
        push_unique(&mut addresses, &mut seen, recipient);
    }
    for sender in events.iter().filter_map(|e| e.sender.as_deref()) {
        push_unique(&mut addresses, &mut seen, sender);
    }

    addresses
}

/// Symbol and decimals for well-known coin types.
const KNOWN_COINS: &[(&str, &str, u8)] = &[
    ("0x2::sui::SUI", "SUI", 9),
    ("0x2::usdc::USDC", "USDC", 6),
    ("0x2::usdt::USDT", "USDT", 6),
    ("0x2::btc::BTC", "BTC", 8),
    ("0x2::eth::ETH", "ETH", 18),
];

pub fn token_symbol(coin_type: &str) -> String {
    if let Some((_, symbol, _)) = KNOWN_COINS.iter().find(|(t, _, _)| *t == coin_type) {
        return symbol.to_string();
    }
    match coin_type.rsplit("::").next() {
        Some(last) if !last.is_empty() => last.to_string(),
        _ => "UNKNOWN".to_string(),
    }
}

pub fn token_decimals(coin_type: &str) -> u8 {
    KNOWN_COINS
        .iter()
        .find(|(t, _, _)| *t == coin_type)
        .map(|(_, _, decimals)| *decimals)
        .unwrap_or(0)
}

/// One entry per distinct coin type; the first sighting decides owner and
/// amount.
pub fn extract_tokens(
    balance_changes: &[BalanceChange],
    object_changes: &[ObjectChange],
) -> Vec<TokenInfo> {
    let mut tokens = Vec::new();
    let mut seen = HashSet::new();

    for change in balance_changes {
        if !seen.insert(change.coin_type.clone()) {
            continue;
        }
        let owner = change
            .owner
            .as_ref()
            .and_then(|o| o.any_owner())
            .unwrap_or("unknown");
        tokens.push(TokenInfo {
            coin_type: change.coin_type.clone(),
            symbol: token_symbol(&change.coin_type),
            decimals: token_decimals(&change.coin_type),
            amount: "0".to_string(),
            owner: owner.to_string(),
        });
    }

    for change in object_changes {
        let Some(coin_type) = change.coin_type.as_ref() else {
            continue;
        };
        if !seen.insert(coin_type.clone()) {
            continue;
        }
        let owner = change
            .owner
            .as_ref()
            .and_then(|o| o.any_owner())
            .unwrap_or("unknown");
        tokens.push(TokenInfo {
            coin_type: coin_type.clone(),
            symbol: token_symbol(coin_type),
            decimals: token_decimals(coin_type),
            amount: change.amount.clone().unwrap_or_else(|| "0".to_string()),
            owner: owner.to_string(),
        });
    }

    tokens
}

/// Split a signed decimal amount into its direction and magnitude.
pub fn classify_amount(amount: &str) -> Result<(BalanceChangeType, String), ParseError> {
    let value: i128 = amount
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidAmount(amount.to_string()))?;
    let change_type = if value > 0 {
        BalanceChangeType::Increase
    } else {
        BalanceChangeType::Decrease
    };
    Ok((change_type, value.unsigned_abs().to_string()))
}

pub fn parse_balance_changes(
    balance_changes: &[BalanceChange],
) -> Result<Vec<BalanceChangeInfo>, ParseError> {
    balance_changes
        .iter()
        .map(|change| {
            let (change_type, amount) = classify_amount(&change.amount)?;
            let owner = change
                .owner
                .as_ref()
                .and_then(|o| o.any_owner())
                .unwrap_or("unknown");
            Ok(BalanceChangeInfo {
                owner: owner.to_string(),
                coin_type: change.coin_type.clone(),
                symbol: token_symbol(&change.coin_type),
                amount,
                change_type,
            })
        })
        .collect()
}

pub fn parse_object_changes(object_changes: &[ObjectChange]) -> Vec<ObjectChangeInfo> {
    object_changes
        .iter()
        .map(|change| ObjectChangeInfo {
            change_type: change.change_type.clone(),
            object_id: change.object_id.clone(),
            object_type: change.object_type.clone(),
            sender: change.sender.clone(),
            recipient: change
                .recipient
                .as_ref()
                .and_then(|r| r.any_owner())
                .map(str::to_string),
            amount: change.amount.clone(),
            coin_type: change.coin_type.clone(),
        })
        .collect()
}

pub fn parse_status(effects: &TransactionEffects) -> (TransactionStatus, Option<String>) {
    let status = if effects.status.status == "success" {
        TransactionStatus::Success
    } else {
        TransactionStatus::Failure
    };
    (status, effects.status.error.clone())
}

/// `computation + storage` on decimal strings, without going through floats.
/// Missing operands count as zero.
pub fn total_gas_used(computation_cost: &str, storage_cost: &str) -> Result<String, ParseError> {
    let parse = |s: &str| -> Result<u128, ParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(0);
        }
        s.parse().map_err(|_| ParseError::InvalidAmount(s.to_string()))
    };
    let computation = parse(computation_cost)?;
    let storage = parse(storage_cost)?;
    computation
        .checked_add(storage)
        .map(|total| total.to_string())
        .ok_or_else(|| {
            ParseError::GasOverflow(computation_cost.to_string(), storage_cost.to_string())
        })
}

/// One human-readable line, e.g.
/// `[SUCCESS] SUI Transfer | 发送者: 0xa | 接收者: 0xb | 余额变化: +5 SUI`.
pub fn generate_summary(info: &ParsedTransactionInfo) -> String {
    let mut summary = format!(
        "[{}] {}",
        info.status.as_str().to_uppercase(),
        info.transaction_type
    );

    if info.sender != UNKNOWN_SENDER {
        summary.push_str(&format!(" | 发送者: {}", info.sender));
    }

    if !info.recipients.is_empty() {
        summary.push_str(&format!(" | 接收者: {}", info.recipients.join(", ")));
    }

    if !info.balance_changes.is_empty() {
        let changes: Vec<String> = info
            .balance_changes
            .iter()
            .map(|change| {
                let sign = match change.change_type {
                    BalanceChangeType::Increase => '+',
                    BalanceChangeType::Decrease => '-',
                };
                format!("{}{} {}", sign, change.amount, change.symbol)
            })
            .collect();
        summary.push_str(&format!(" | 余额变化: {}", changes.join(", ")));
    }

    summary
}

/// Render a raw integer amount with `decimals` fractional digits.
pub fn format_balance(amount: &str, decimals: u8) -> Result<String, ParseError> {
    let value: u128 = amount
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidAmount(amount.to_string()))?;
    let divisor = 10u128
        .checked_pow(u32::from(decimals))
        .ok_or_else(|| ParseError::InvalidAmount(amount.to_string()))?;
    let whole = value / divisor;
    let fraction = value % divisor;

    if fraction == 0 {
        return Ok(whole.to_string());
    }
    Ok(format!(
        "{}.{:0width$}",
        whole,
        fraction,
        width = decimals as usize
    ))
}
