// Decoding of inbound stream notifications into RawUpdate

use crate::core::types::{AccountSnapshot, RawUpdate};
use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Decode one text frame. Anything that is not a well-formed account or
/// transaction notification becomes `RawUpdate::Other`; decoding never fails.
pub fn decode_message(text: &str) -> RawUpdate {
    let notification: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return RawUpdate::Other,
    };

    let result = notification.get("params").and_then(|p| p.get("result"));

    match (notification.get("method").and_then(|m| m.as_str()), result) {
        (Some("programNotification"), Some(result)) => {
            decode_program_notification(result).unwrap_or(RawUpdate::Other)
        }
        (Some("transactionNotification"), Some(result)) => {
            let signature = result.get("signature").and_then(|s| s.as_str());
            let slot = result.get("slot").and_then(|s| s.as_u64());
            match (signature, slot) {
                (Some(signature), Some(slot)) => RawUpdate::Transaction {
                    signature: signature.to_string(),
                    slot,
                },
                _ => RawUpdate::Other,
            }
        }
        (Some("logsNotification"), Some(result)) => {
            let signature = result
                .get("value")
                .and_then(|v| v.get("signature"))
                .and_then(|s| s.as_str());
            match signature {
                Some(signature) => RawUpdate::Transaction {
                    signature: signature.to_string(),
                    slot: context_slot(result),
                },
                None => RawUpdate::Other,
            }
        }
        _ => RawUpdate::Other,
    }
}

fn context_slot(result: &Value) -> u64 {
    result
        .get("context")
        .and_then(|c| c.get("slot"))
        .and_then(|s| s.as_u64())
        .unwrap_or(0)
}

fn decode_program_notification(result: &Value) -> Option<RawUpdate> {
    let value = result.get("value")?;
    let account = value.get("account")?;

    let address = value
        .get("pubkey")
        .and_then(|v| v.as_str())
        .and_then(|s| Pubkey::from_str(s).ok())?;

    let owner = account
        .get("owner")
        .and_then(|v| v.as_str())
        .and_then(|s| Pubkey::from_str(s).ok())?;

    // ["<payload>", "base64"]
    let data = account
        .get("data")
        .and_then(|d| d.as_array())
        .filter(|arr| arr.len() >= 2 && arr[1].as_str() == Some("base64"))
        .and_then(|arr| arr[0].as_str())
        .and_then(|encoded| general_purpose::STANDARD.decode(encoded).ok())?;

    Some(RawUpdate::Account(AccountSnapshot {
        owner,
        address,
        data,
        slot: context_slot(result),
    }))
}
