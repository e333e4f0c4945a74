use keel_config::{
    DecodeError, DecodeHook, Document, HookChain, KeyedHook, SourceKind, TargetKind, builtin,
};
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_value::Value;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Deserialize, PartialEq)]
struct Settings {
    grace_period: Duration,
}

fn duration_value(secs: u64) -> Value {
    let mut map = BTreeMap::new();
    map.insert(Value::String("secs".into()), Value::U64(secs));
    map.insert(Value::String("nanos".into()), Value::U32(0));

    Value::Map(map)
}

/// Reads every duration string as a bare number of minutes.
fn minutes() -> impl DecodeHook {
    KeyedHook::new(SourceKind::Str, TargetKind::Struct("Duration"), |value| {
        let Value::String(text) = value else {
            return Err(DecodeError::new("expected a string"));
        };
        let minutes = text.trim().parse::<u64>().map_err(DecodeError::new)?;

        Ok(duration_value(minutes * 60))
    })
}

#[test]
fn global_hook_precedes_builtin() {
    // Given
    let document = Document::from_yaml("GracePeriod: '5'\n").unwrap();
    let chain = HookChain::new().with(minutes()).then(&builtin::hooks());

    // When
    let settings: Settings = document.decode(&chain).unwrap();

    // Then
    assert_eq!(settings.grace_period, Duration::from_secs(300));
}

#[test]
fn removing_global_hook_restores_builtin() {
    // Given
    let document = Document::from_yaml("GracePeriod: '5'\n").unwrap();

    // When
    let error = document.decode::<Settings>(&builtin::hooks()).unwrap_err();

    // Then
    assert_eq!(error.path(), Some("grace_period"));
    assert!(error.message().starts_with("invalid duration '5'"), "{error}");
}

#[test]
fn global_hook_claims_values_builtin_would_convert() {
    // Given
    let document = Document::from_yaml("grace_period: 2m\n").unwrap();
    let fixed = |source: SourceKind, target: &TargetKind, value: Value| -> Result<Value, DecodeError> {
        if source == SourceKind::Str && *target == TargetKind::Struct("Duration") {
            Ok(duration_value(7))
        } else {
            Ok(value)
        }
    };
    let chain = HookChain::new().with(fixed).then(&builtin::hooks());

    // When
    let hooked: Settings = document.decode(&chain).unwrap();
    let plain: Settings = document.decode(&builtin::hooks()).unwrap();

    // Then
    assert_eq!(hooked.grace_period, Duration::from_secs(7));
    assert_eq!(plain.grace_period, Duration::from_secs(120));
}

#[test]
fn document_is_reusable_across_passes() {
    // Given
    let document = Document::from_yaml("app: {local_time: 'yes'}\ngrace_period: 1m\n").unwrap();

    #[derive(Debug, Deserialize, PartialEq)]
    struct App {
        app: Flags,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Flags {
        local_time: bool,
    }

    // When
    let first: App = document.decode(&builtin::hooks()).unwrap();
    let second: Settings = document.decode(&builtin::hooks()).unwrap();
    let third: App = document.decode(&builtin::hooks()).unwrap();

    // Then
    assert_eq!(first, third);
    assert!(first.app.local_time);
    assert_eq!(second.grace_period, Duration::from_secs(60));
}
