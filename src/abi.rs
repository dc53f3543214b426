//! Positional argument handling against JSON ABIs.
//!
//! Arguments arrive as JSON (an array, or a string holding a JSON array). Each value is
//! coerced to the Solidity type the ABI declares for its position; strings go through
//! the dynamic ABI parser so `"1000"`, `"0xabc..."` and `"[1,2]"` all work.

use alloy::dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy::hex;
use alloy::json_abi::{Function, JsonAbi, Param, StateMutability};
use serde_json::Value;

use crate::error::EngineError;

/// Parse call arguments. Absent, `null` and empty strings are no arguments.
pub fn parse_function_args(raw: Option<&Value>) -> Result<Vec<Value>, EngineError> {
    parse_json_array(raw).map_err(|reason| {
        EngineError::ArgumentFormat(format!(
            "Invalid functionArgs: {reason}. Provide a JSON array in positional order, e.g. [\"0xabc...\", 100]."
        ))
    })
}

/// Parse constructor arguments with the same rules.
pub fn parse_constructor_args(raw: Option<&Value>) -> Result<Vec<Value>, EngineError> {
    parse_json_array(raw)
        .map_err(|_| EngineError::ArgumentFormat("Invalid constructor arguments format.".to_string()))
}

fn parse_json_array(raw: Option<&Value>) -> Result<Vec<Value>, String> {
    match raw {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(Vec::new()),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text.trim()) {
            Ok(Value::Array(items)) => Ok(items),
            Ok(_) => Err("args must be a JSON array".to_string()),
            Err(e) => Err(e.to_string()),
        },
        Some(_) => Err("args must be an array or a JSON string array".to_string()),
    }
}

/// Pick the function named `name` whose input count matches `arity`.
///
/// Overloads are told apart by arity only; when none match, the arity error reports the
/// first declared overload.
pub fn select_function<'a>(abi: &'a JsonAbi, name: &str, arity: usize) -> Result<&'a Function, EngineError> {
    let overloads = abi
        .function(name)
        .filter(|overloads| !overloads.is_empty())
        .ok_or_else(|| EngineError::NotFound(format!("Function '{name}' not found in contract ABI.")))?;
    if let Some(function) = overloads.iter().find(|f| f.inputs.len() == arity) {
        return Ok(function);
    }
    Err(EngineError::Arity {
        function: name.to_string(),
        expected: overloads[0].inputs.len(),
        received: arity,
    })
}

/// Coerce positional JSON values to the declared parameter types.
pub fn coerce_params(params: &[Param], args: &[Value]) -> Result<Vec<DynSolValue>, String> {
    params
        .iter()
        .zip(args)
        .enumerate()
        .map(|(index, (param, arg))| {
            let ty = param
                .resolve()
                .map_err(|e| format!("unsupported parameter type {}: {e}", param.ty))?;
            coerce_value(&ty, arg).map_err(|reason| {
                format!(
                    "argument #{index} ({}:{}) is invalid: {reason}",
                    display_name(param, index),
                    param.ty
                )
            })
        })
        .collect()
}

pub fn coerce_value(ty: &DynSolType, value: &Value) -> Result<DynSolValue, String> {
    match (ty, value) {
        (DynSolType::Bool, Value::Bool(flag)) => Ok(DynSolValue::Bool(*flag)),
        (DynSolType::Array(inner), Value::Array(items)) => items
            .iter()
            .map(|item| coerce_value(inner, item))
            .collect::<Result<Vec<_>, _>>()
            .map(DynSolValue::Array),
        (DynSolType::FixedArray(inner, len), Value::Array(items)) => {
            if items.len() != *len {
                return Err(format!("expected {len} elements, got {}", items.len()));
            }
            items
                .iter()
                .map(|item| coerce_value(inner, item))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::FixedArray)
        }
        (DynSolType::Tuple(types), Value::Array(items)) => {
            if items.len() != types.len() {
                return Err(format!("expected {} tuple fields, got {}", types.len(), items.len()));
            }
            types
                .iter()
                .zip(items)
                .map(|(ty, item)| coerce_value(ty, item))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::Tuple)
        }
        (DynSolType::String, Value::String(text)) => Ok(DynSolValue::String(text.clone())),
        (_, Value::String(text)) => {
            let text = match ty {
                DynSolType::Address | DynSolType::Bool | DynSolType::Int(_) | DynSolType::Uint(_) => text.trim(),
                _ => text.as_str(),
            };
            ty.coerce_str(text).map_err(|e| e.to_string())
        }
        (_, Value::Number(number)) => ty.coerce_str(&number.to_string()).map_err(|e| e.to_string()),
        (_, Value::Bool(flag)) => ty.coerce_str(&flag.to_string()).map_err(|e| e.to_string()),
        (_, Value::Null) => Err("null is not a valid value".to_string()),
        (_, other) => Err(format!("cannot use {other} as {ty}")),
    }
}

/// Render a decoded value for previews.
pub fn format_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Address(address) => address.to_checksum(None),
        DynSolValue::Bool(flag) => flag.to_string(),
        DynSolValue::Int(int, _) => int.to_string(),
        DynSolValue::Uint(uint, _) => uint.to_string(),
        DynSolValue::FixedBytes(word, size) => format!("0x{}", hex::encode(&word[..*size])),
        DynSolValue::Bytes(bytes) => format!("0x{}", hex::encode(bytes)),
        DynSolValue::String(text) => text.clone(),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            let inner: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", inner.join(", "))
        }
        other => format!("{other:?}"),
    }
}

/// JSON form of a decoded value. Integers become decimal strings.
pub fn value_to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(flag) => Value::Bool(*flag),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(value_to_json).collect())
        }
        other => Value::String(format_value(other)),
    }
}

pub fn mutability_str(mutability: StateMutability) -> &'static str {
    match mutability {
        StateMutability::Pure => "pure",
        StateMutability::View => "view",
        StateMutability::NonPayable => "nonpayable",
        StateMutability::Payable => "payable",
    }
}

pub fn is_read_only(function: &Function) -> bool {
    matches!(
        function.state_mutability,
        StateMutability::Pure | StateMutability::View
    )
}

fn display_name(param: &Param, index: usize) -> String {
    if param.name.is_empty() {
        index.to_string()
    } else {
        param.name.clone()
    }
}

/// `0. to:address | 1. amount:uint256`
pub fn ordered_params(params: &[Param]) -> String {
    if params.is_empty() {
        return "—".to_string();
    }
    params
        .iter()
        .enumerate()
        .map(|(index, param)| {
            let name = if param.name.is_empty() { "_" } else { param.name.as_str() };
            format!("{index}. {name}:{}", param.ty)
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// `to=0xabc, amount=100`
pub fn labelled_args(params: &[Param], args: &[Value]) -> String {
    if args.is_empty() {
        return "—".to_string();
    }
    args.iter()
        .enumerate()
        .map(|(index, arg)| {
            let name = params
                .get(index)
                .map(|param| display_name(param, index))
                .unwrap_or_else(|| index.to_string());
            let shown = match arg {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            format!("{name}={shown}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Example call template such as `["<to:address>", "<amount:uint256>"]`.
pub fn args_template(params: &[Param]) -> String {
    let parts: Vec<_> = params
        .iter()
        .enumerate()
        .map(|(index, param)| format!("\"<{}:{}>\"", display_name(param, index), param.ty))
        .collect();
    format!("[{}]", parts.join(", "))
}
