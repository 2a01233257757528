//! Typed access to the engine fields of a wire message.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use tessera_core::wire::EnginePayload;

use crate::error::CryptoError;
use crate::hashing::Hash;

fn field<'a>(payload: &'a EnginePayload, key: &str) -> Result<&'a Value, CryptoError> {
    payload
        .get(key)
        .ok_or_else(|| CryptoError::MalformedPayload(format!("missing field '{}'", key)))
}

fn decode(key: &str, value: &Value) -> Result<Vec<u8>, CryptoError> {
    let s = value
        .as_str()
        .ok_or_else(|| CryptoError::MalformedPayload(format!("field '{}' is not a string", key)))?;
    BASE64
        .decode(s)
        .map_err(|e| CryptoError::MalformedPayload(format!("field '{}': {}", key, e)))
}

pub fn encode(bytes: &[u8]) -> Value {
    Value::String(BASE64.encode(bytes))
}

pub fn encode_list<B: AsRef<[u8]>>(items: &[B]) -> Value {
    Value::Array(items.iter().map(|b| encode(b.as_ref())).collect())
}

pub fn bytes(payload: &EnginePayload, key: &str) -> Result<Vec<u8>, CryptoError> {
    decode(key, field(payload, key)?)
}

pub fn optional_bytes(payload: &EnginePayload, key: &str) -> Result<Option<Vec<u8>>, CryptoError> {
    match payload.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => decode(key, value).map(Some),
    }
}

pub fn hash(payload: &EnginePayload, key: &str) -> Result<Hash, CryptoError> {
    let raw = bytes(payload, key)?;
    raw.try_into()
        .map_err(|_| CryptoError::MalformedPayload(format!("field '{}' must be 32 bytes", key)))
}

pub fn bytes_list(payload: &EnginePayload, key: &str) -> Result<Vec<Vec<u8>>, CryptoError> {
    field(payload, key)?
        .as_array()
        .ok_or_else(|| CryptoError::MalformedPayload(format!("field '{}' is not a list", key)))?
        .iter()
        .map(|v| decode(key, v))
        .collect()
}

pub fn hash_list(payload: &EnginePayload, key: &str) -> Result<Vec<Hash>, CryptoError> {
    bytes_list(payload, key)?
        .into_iter()
        .map(|raw| {
            raw.try_into().map_err(|_| {
                CryptoError::MalformedPayload(format!("entries of '{}' must be 32 bytes", key))
            })
        })
        .collect()
}

pub fn usize_field(payload: &EnginePayload, key: &str) -> Result<usize, CryptoError> {
    field(payload, key)?
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| CryptoError::MalformedPayload(format!("field '{}' is not a count", key)))
}

pub fn bool_field(payload: &EnginePayload, key: &str) -> bool {
    payload.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Objects of a list field.
pub fn object_list<'a>(
    payload: &'a EnginePayload,
    key: &str,
) -> Result<Vec<&'a EnginePayload>, CryptoError> {
    field(payload, key)?
        .as_array()
        .ok_or_else(|| CryptoError::MalformedPayload(format!("field '{}' is not a list", key)))?
        .iter()
        .map(|v| {
            v.as_object().ok_or_else(|| {
                CryptoError::MalformedPayload(format!("entries of '{}' must be objects", key))
            })
        })
        .collect()
}
