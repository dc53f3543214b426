//! Human-readable revert reasons from failed calls.
//!
//! Nodes and wallets report reverts in several shapes: a reason embedded in the error
//! message (`execution reverted: <reason>`, Ganache's `VM Exception ... revert <reason>`,
//! Hardhat's `reverted with reason string '<reason>'`), or the raw ABI-encoded revert
//! payload in the error's `data` field. Messages are checked first, then payload bytes.

use alloy::hex;
use alloy::primitives::U256;
use alloy::sol_types::{Panic, Revert, SolError};
use serde_json::Value;

use crate::chain::RpcFailure;

/// Reason reported when a node says "execution reverted" with nothing after it.
pub const BARE_REVERT: &str = "Execution reverted";

/// Extract the revert reason from a failed call, if the failure is a revert at all.
pub fn extract_revert_reason(failure: &RpcFailure) -> Option<String> {
    let mut bare_revert = false;
    for message in candidate_messages(failure) {
        match reason_from_message(message) {
            Some(MessageReason::Reason(reason)) => return Some(reason),
            Some(MessageReason::Bare) => bare_revert = true,
            None => {}
        }
    }

    for data in candidate_payloads(failure) {
        if let Some(reason) = decode_revert_data(&data) {
            return Some(reason);
        }
    }

    bare_revert.then(|| BARE_REVERT.to_string())
}

/// Decode ABI-encoded revert bytes.
///
/// - `Error(string)` returns the string
/// - `Panic(uint256)` returns a labelled panic code
/// - any other 4-byte selector returns `UnknownError(0x<selector>)`
pub fn decode_revert_data(data: &[u8]) -> Option<String> {
    if data.len() < 4 {
        return None;
    }
    let selector: [u8; 4] = data[..4].try_into().ok()?;
    if selector == Revert::SELECTOR {
        return Revert::abi_decode(data).ok().map(|revert| revert.reason);
    }
    if selector == Panic::SELECTOR {
        return Panic::abi_decode(data).ok().map(|panic| panic_label(panic.code));
    }
    Some(format!("UnknownError(0x{})", hex::encode(selector)))
}

fn panic_label(code: U256) -> String {
    let description = match code.saturating_to::<u64>() {
        0x00 => "generic compiler panic",
        0x01 => "assertion failed",
        0x11 => "arithmetic overflow or underflow",
        0x12 => "division or modulo by zero",
        0x21 => "invalid enum value",
        0x22 => "invalid storage byte array access",
        0x31 => "pop on empty array",
        0x32 => "array index out of bounds",
        0x41 => "out of memory",
        0x51 => "call to zero-initialized function",
        _ => return format!("Panic(0x{code:02x})"),
    };
    format!("Panic(0x{code:02x}): {description}")
}

enum MessageReason {
    Reason(String),
    Bare,
}

/// Messages in lookup order: nested data messages before plain messages.
fn candidate_messages(failure: &RpcFailure) -> Vec<&str> {
    let mut messages = Vec::new();
    if let Some(message) = failure.data.as_ref().and_then(nested_message) {
        messages.push(message);
    }
    if let Some(cause) = failure.cause.as_deref() {
        if let Some(message) = cause.data.as_ref().and_then(nested_message) {
            messages.push(message);
        }
        messages.extend(cause.messages());
    }
    messages.push(failure.message.as_str());
    messages
}

fn nested_message(data: &Value) -> Option<&str> {
    data.get("message").and_then(Value::as_str)
}

/// Hex payloads in lookup order.
fn candidate_payloads(failure: &RpcFailure) -> Vec<Vec<u8>> {
    let mut payloads = Vec::new();
    let mut current = Some(failure);
    while let Some(failure) = current {
        if let Some(data) = failure.data.as_ref() {
            collect_hex(data, &mut payloads);
        }
        current = failure.cause.as_deref();
    }
    payloads
}

fn collect_hex(data: &Value, out: &mut Vec<Vec<u8>>) {
    match data {
        Value::String(raw) => {
            if let Some(bytes) = raw
                .strip_prefix("0x")
                .and_then(|stripped| hex::decode(stripped).ok())
            {
                out.push(bytes);
            }
        }
        Value::Object(map) => {
            if let Some(inner) = map.get("data") {
                collect_hex(inner, out);
            }
        }
        _ => {}
    }
}

fn reason_from_message(message: &str) -> Option<MessageReason> {
    let lower = message.to_ascii_lowercase();

    if let Some(reason) = quoted_after(message, &lower, "reverted with reason string ") {
        return Some(MessageReason::Reason(reason));
    }

    if let Some(index) = lower.find("execution reverted") {
        let rest = message[index + "execution reverted".len()..]
            .trim_start_matches(':')
            .trim();
        return Some(if rest.is_empty() {
            MessageReason::Bare
        } else {
            MessageReason::Reason(rest.to_string())
        });
    }

    if let Some(index) = lower.find("vm exception while processing transaction: revert") {
        let rest = message[index + "vm exception while processing transaction: revert".len()..].trim();
        return Some(if rest.is_empty() {
            MessageReason::Bare
        } else {
            MessageReason::Reason(rest.to_string())
        });
    }

    if let Some(index) = lower.find("revert") {
        if let Some(reason) = quoted_after(&message[index..], &lower[index..], "string ") {
            return Some(MessageReason::Reason(reason));
        }
    }

    None
}

/// Text inside the quotes that follow `marker`, accepting `'` or `"`.
fn quoted_after(message: &str, lower: &str, marker: &str) -> Option<String> {
    let start = lower.find(marker)? + marker.len();
    let rest = &message[start..];
    let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let body = &rest[1..];
    let end = body.find(quote)?;
    Some(body[..end].to_string())
}
