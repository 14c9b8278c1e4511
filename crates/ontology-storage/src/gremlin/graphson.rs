//! Decoding Gremlin Server responses

use crate::error::{EngineError, EngineResult};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Envelope {
    status: Status,
    #[serde(default)]
    result: Option<ResultSection>,
}

#[derive(Debug, Deserialize)]
struct Status {
    code: u16,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultSection {
    #[serde(default)]
    data: Value,
}

const SUCCESS: u16 = 200;
const NO_CONTENT: u16 = 204;

/// Strip GraphSON type wrappers (`{"@type": .., "@value": ..}`) recursively
pub fn untype(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.len() == 2 && map.contains_key("@type") => {
            match map.remove("@value") {
                Some(inner) => untype(inner),
                None => Value::Object(map),
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(untype).collect()),
        other => other,
    }
}

/// The result list of a response body, or the server's error status
pub fn decode_response(body: &[u8]) -> EngineResult<Vec<Value>> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| EngineError::Decode(format!("malformed response envelope: {}", e)))?;

    match envelope.status.code {
        SUCCESS => {}
        NO_CONTENT => return Ok(Vec::new()),
        code => {
            return Err(EngineError::GremlinStatus {
                code,
                message: envelope.status.message,
            })
        }
    }

    let data = envelope.result.map(|r| untype(r.data)).unwrap_or(Value::Null);
    match data {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        other => Err(EngineError::Decode(format!(
            "expected a list of results, got {}",
            other
        ))),
    }
}
