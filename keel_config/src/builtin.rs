//! The conversions every decode pass knows about, in the order
//! [`hooks`] composes them:
//!
//! 1. [`duration`]: human-readable durations (`"1m 30s"`) into
//!    [`std::time::Duration`].
//! 2. [`timestamp`]: RFC 3339 timestamps (`"2024-05-01T12:00:00Z"`) into
//!    [`std::time::SystemTime`].
//! 3. [`ip_network`]: `addr[/prefix]` strings into [`IpNetwork`].
//! 4. [`text`]: scalars into strings when a string is expected, and strings
//!    into booleans and numbers when those are expected.

use crate::{DecodeError, DecodeHook, HookChain, IpNetwork, KeyedHook, SourceKind, TargetKind};
use serde_value::Value;
use std::collections::BTreeMap;
use std::time::UNIX_EPOCH;

/// Composes all built-in hooks, in their canonical order.
pub fn hooks() -> HookChain {
    HookChain::new()
        .with(duration())
        .with(timestamp())
        .with(ip_network())
        .with(text())
}

/// Converts human-readable duration strings, as understood by `humantime`,
/// for [`Duration`](std::time::Duration) targets.
pub fn duration() -> impl DecodeHook {
    KeyedHook::new(SourceKind::Str, TargetKind::Struct("Duration"), |value| {
        let text = expect_string(value)?;
        let duration = humantime::parse_duration(text.trim())
            .map_err(|error| DecodeError::new(format!("invalid duration '{text}': {error}")))?;

        Ok(map_of([
            ("secs", Value::U64(duration.as_secs())),
            ("nanos", Value::U32(duration.subsec_nanos())),
        ]))
    })
}

/// Converts RFC 3339 timestamp strings for
/// [`SystemTime`](std::time::SystemTime) targets. The timezone suffix may be
/// omitted, in which case UTC is assumed.
pub fn timestamp() -> impl DecodeHook {
    KeyedHook::new(SourceKind::Str, TargetKind::Struct("SystemTime"), |value| {
        let text = expect_string(value)?;
        let time = humantime::parse_rfc3339_weak(text.trim())
            .map_err(|error| DecodeError::new(format!("invalid timestamp '{text}': {error}")))?;
        let since_epoch = time.duration_since(UNIX_EPOCH).map_err(|_| {
            DecodeError::new(format!("timestamp '{text}' is before the Unix epoch"))
        })?;

        Ok(map_of([
            ("secs_since_epoch", Value::U64(since_epoch.as_secs())),
            ("nanos_since_epoch", Value::U32(since_epoch.subsec_nanos())),
        ]))
    })
}

/// Converts `addr[/prefix]` strings for [`IpNetwork`] targets.
pub fn ip_network() -> impl DecodeHook {
    KeyedHook::new(SourceKind::Str, TargetKind::Struct("IpNetwork"), |value| {
        let text = expect_string(value)?;
        let network: IpNetwork = text.parse().map_err(DecodeError::new)?;

        Ok(map_of([
            ("addr", Value::String(network.addr().to_string())),
            ("prefix", Value::U8(network.prefix())),
        ]))
    })
}

/// Converts between text and scalars:
///
/// - a boolean, number or character decoded into a string target becomes its
///   textual form;
/// - a string decoded into a boolean target is parsed leniently (`true`,
///   `yes`, `on`, `1` and their opposites, in any case);
/// - a string decoded into a numeric target is parsed as a number.
///
/// Strings that do not parse are passed on unchanged, so that the target
/// reports the mismatch.
pub fn text() -> impl DecodeHook {
    |source: SourceKind, target: &TargetKind, value: Value| -> Result<Value, DecodeError> {
        if *target == TargetKind::Str && source != SourceKind::Str {
            return Ok(render(&value).map(Value::String).unwrap_or(value));
        }

        let parsed = match (&value, target) {
            (Value::String(text), TargetKind::Bool) => parse_bool(text.trim()).map(Value::Bool),
            (Value::String(text), TargetKind::Integer) => {
                let text = text.trim();
                text.parse::<i64>()
                    .map(Value::I64)
                    .or_else(|_| text.parse::<u64>().map(Value::U64))
                    .ok()
            }
            (Value::String(text), TargetKind::Float) => {
                text.trim().parse::<f64>().map(Value::F64).ok()
            }
            _ => None,
        };

        Ok(parsed.unwrap_or(value))
    }
}

fn expect_string(value: Value) -> Result<String, DecodeError> {
    match value {
        Value::String(text) => Ok(text),
        other => Err(DecodeError::new(format!(
            "expected a string, found {}",
            SourceKind::of(&other),
        ))),
    }
}

fn map_of<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(key, value)| (Value::String(key.to_string()), value))
            .collect::<BTreeMap<_, _>>(),
    )
}

fn render(scalar: &Value) -> Option<String> {
    let text = match scalar {
        Value::Bool(value) => value.to_string(),
        Value::Char(value) => value.to_string(),
        Value::U8(value) => value.to_string(),
        Value::U16(value) => value.to_string(),
        Value::U32(value) => value.to_string(),
        Value::U64(value) => value.to_string(),
        Value::I8(value) => value.to_string(),
        Value::I16(value) => value.to_string(),
        Value::I32(value) => value.to_string(),
        Value::I64(value) => value.to_string(),
        Value::F32(value) => value.to_string(),
        Value::F64(value) => value.to_string(),
        _ => return None,
    };

    Some(text)
}

fn parse_bool(text: &str) -> Option<bool> {
    const TRUE: &[&str] = &["true", "yes", "on", "1"];
    const FALSE: &[&str] = &["false", "no", "off", "0"];

    if TRUE.iter().any(|candidate| candidate.eq_ignore_ascii_case(text)) {
        Some(true)
    } else if FALSE.iter().any(|candidate| candidate.eq_ignore_ascii_case(text)) {
        Some(false)
    } else {
        None
    }
}
