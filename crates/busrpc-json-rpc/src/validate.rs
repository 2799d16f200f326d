//! Envelope validation with violation aggregation.
//!
//! Both entry points run every structural check before reporting, so a
//! single error carries the complete diagnosis. Validation failures are
//! usually inspected asynchronously from logs, long after the message was
//! produced; a first-violation-only error would force a guessing game.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{PayloadError, RpcError, ValidateError};
use crate::request::JsonRpcRequest;
use crate::response::JsonRpcSuccess;
use crate::types::RequestId;
use crate::JSONRPC_VERSION;

const RESPONSE_PREFIX: &str = "json-rpc response is not valid";
const REQUEST_PREFIX: &str = "json-rpc request is not valid";

/// Validate a raw response body and narrow it to a typed success envelope.
///
/// Structural violations are aggregated into one [`ValidateError::Envelope`].
/// A body that is structurally sound but carries an `error` object is a
/// [`ValidateError::Protocol`]: the counterpart answered, just not with a
/// result. Only then is `result_validator` run against the `result` member;
/// its rejection surfaces unchanged as [`ValidateError::Payload`].
pub fn validate_response<T, F>(body: &Value, result_validator: F) -> Result<JsonRpcSuccess<T>, ValidateError>
where
    F: Fn(&Value) -> Result<T, PayloadError>,
{
    let error_diagnostic = error_reply_diagnostic(body);

    let mut violations: Vec<String> = Vec::new();
    check_version(body, &mut violations);

    let result = body.get("result");
    let error = body.get("error");
    if result.is_some() && error.is_some() {
        violations.push("it can hold only one of 'error' or 'result' at the same time".to_string());
    }
    if result.is_none() && error.is_none() {
        violations.push("it must hold 'error' or 'result'".to_string());
    }

    if !violations.is_empty() {
        // The error-object diagnostic is context, not a violation; it still
        // belongs in the one message the caller gets to see.
        let mut fragments = Vec::with_capacity(violations.len() + 1);
        fragments.extend(error_diagnostic);
        fragments.extend(violations);
        return Err(ValidateError::Envelope(RpcError::new(
            format!("{}: {}", RESPONSE_PREFIX, fragments.join("; ")),
            body.clone(),
        )));
    }

    if let Some(diagnostic) = error_diagnostic {
        return Err(ValidateError::Protocol(RpcError::new(diagnostic, body.clone())));
    }

    // Exactly one of result/error is present and error is not, so result is.
    let payload = result_validator(result.unwrap_or(&Value::Null))?;

    Ok(JsonRpcSuccess::new(lenient_id(body), payload))
}

/// Validate a raw request body and narrow it to a typed request envelope.
pub fn validate_request<T, F>(body: &Value, params_validator: F) -> Result<JsonRpcRequest<T>, ValidateError>
where
    F: Fn(&Value) -> Result<T, PayloadError>,
{
    let mut violations: Vec<String> = Vec::new();
    check_version(body, &mut violations);

    let method = body.get("method").and_then(Value::as_str).unwrap_or("");
    if method.is_empty() {
        violations.push("it must include a 'method' property as a non-empty string".to_string());
    }

    let params = body.get("params");
    if params.is_none() {
        violations.push("it must include a 'params' property".to_string());
    }

    let id = match request_id(body) {
        Ok(id) => id,
        Err(violation) => {
            violations.push(violation);
            None
        }
    };

    if !violations.is_empty() {
        return Err(ValidateError::Envelope(RpcError::new(
            format!("{}: {}", REQUEST_PREFIX, violations.join("; ")),
            body.clone(),
        )));
    }

    let payload = params_validator(params.unwrap_or(&Value::Null))?;

    Ok(JsonRpcRequest {
        version: crate::types::JsonRpcVersion::V2_0,
        method: method.to_string(),
        params: payload,
        id,
    })
}

/// Payload validator backed by serde for types that derive `Deserialize`
pub fn json_payload<T: DeserializeOwned>() -> impl Fn(&Value) -> Result<T, PayloadError> {
    |value: &Value| {
        serde_json::from_value(value.clone())
            .map_err(|err| PayloadError::new(format!("payload does not match expected shape: {}", err)))
    }
}

fn check_version(body: &Value, violations: &mut Vec<String>) {
    if body.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        violations.push(format!(
            "it must include a 'jsonrpc' property equal to \"{}\"",
            JSONRPC_VERSION
        ));
    }
}

/// Diagnostic fragment for a reply that carries an `error` object
fn error_reply_diagnostic(body: &Value) -> Option<String> {
    let error = body.get("error")?;

    let mut parts: Vec<String> = Vec::new();
    if let Some(code) = error.get("code").and_then(Value::as_i64) {
        parts.push(format!("code: {}", code));
    }
    if let Some(message) = error.get("message").and_then(Value::as_str) {
        parts.push(format!("message: {}", message));
    }
    if let Some(data) = error.get("data") {
        parts.push(format!("data: {}", data));
    }

    if parts.is_empty() {
        Some("reply carried an 'error' object".to_string())
    } else {
        Some(format!("reply carried an 'error' object, {}", parts.join(", ")))
    }
}

/// Strict id extraction for requests: string, number, or null only
fn request_id(body: &Value) -> Result<Option<RequestId>, String> {
    match body.get("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(RequestId::Str(s.clone()))),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(n) => Ok(Some(RequestId::Num(n))),
            None => Err("'id' property must be a string, number or null".to_string()),
        },
        Some(_) => Err("'id' property must be a string, number or null".to_string()),
    }
}

/// Lenient id extraction for responses: an unusable id is dropped, not fatal
fn lenient_id(body: &Value) -> Option<RequestId> {
    body.get("id")
        .and_then(|id| serde_json::from_value(id.clone()).ok())
}
