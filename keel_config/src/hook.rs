use crate::{DecodeError, SourceKind, TargetKind};
use serde_value::Value;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A conversion applied to a raw document value right before it is decoded
/// into a target of the given kind.
///
/// A hook either converts the value (claims the conversion) or hands it back
/// unchanged (passes). Hooks must not have side effects: the same hook may
/// run for many values and for several decode passes over one document.
///
/// Any `Fn(SourceKind, &TargetKind, Value) -> Result<Value, DecodeError>`
/// closure is a hook.
pub trait DecodeHook: Send + Sync {
    /// Converts the given value, or returns it unchanged to pass.
    fn convert(
        &self,
        source: SourceKind,
        target: &TargetKind,
        value: Value,
    ) -> Result<Value, DecodeError>;
}

impl<F> DecodeHook for F
where
    F: Fn(SourceKind, &TargetKind, Value) -> Result<Value, DecodeError> + Send + Sync,
{
    fn convert(
        &self,
        source: SourceKind,
        target: &TargetKind,
        value: Value,
    ) -> Result<Value, DecodeError> {
        self(source, target, value)
    }
}

/// A [`DecodeHook`] that fires for exactly one (source kind, target kind)
/// pair and passes everything else.
pub struct KeyedHook<F> {
    source: SourceKind,
    target: TargetKind,
    convert: F,
}

impl<F> KeyedHook<F>
where
    F: Fn(Value) -> Result<Value, DecodeError> + Send + Sync,
{
    /// Creates a hook converting values of the `source` kind decoded into
    /// targets of the `target` kind.
    pub fn new(source: SourceKind, target: TargetKind, convert: F) -> Self {
        Self {
            source,
            target,
            convert,
        }
    }
}

impl<F> DecodeHook for KeyedHook<F>
where
    F: Fn(Value) -> Result<Value, DecodeError> + Send + Sync,
{
    fn convert(
        &self,
        source: SourceKind,
        target: &TargetKind,
        value: Value,
    ) -> Result<Value, DecodeError> {
        if source == self.source && *target == self.target {
            (self.convert)(value)
        } else {
            Ok(value)
        }
    }
}

/// An ordered composition of [`DecodeHook`]s.
///
/// Hooks run left to right, each receiving the output of the previous one.
/// Once a hook converts a value, its kind usually no longer matches what later
/// hooks look for, so effectively the first hook that claims a conversion
/// wins.
///
/// Chains are cheap to clone and to concatenate: hooks are shared.
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn DecodeHook>>,
}

impl HookChain {
    /// Creates an empty chain, which passes every value unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a chain of the [built-in](crate::builtin) hooks.
    pub fn builtin() -> Self {
        crate::builtin::hooks()
    }

    /// Appends a hook at the end of this chain.
    pub fn with(mut self, hook: impl DecodeHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Appends a hook at the end of this chain, in place.
    pub fn push(&mut self, hook: impl DecodeHook + 'static) {
        self.hooks.push(Arc::new(hook));
    }

    /// Appends all hooks of `other` after the hooks of this chain.
    pub fn extend(&mut self, other: &HookChain) {
        self.hooks.extend(other.hooks.iter().cloned());
    }

    /// Returns a new chain running this chain first and then `other`.
    pub fn then(&self, other: &HookChain) -> Self {
        let mut chain = self.clone();
        chain.extend(other);
        chain
    }

    /// The number of hooks in this chain.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Reports whether this chain has no hooks.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs the chain over one value about to be decoded into a target of the
    /// given kind.
    pub fn apply(&self, target: &TargetKind, value: Value) -> Result<Value, DecodeError> {
        if !target.is_hookable() {
            return Ok(value);
        }

        self.hooks.iter().try_fold(value, |value, hook| {
            let source = SourceKind::of(&value);
            hook.convert(source, target, value)
        })
    }
}

impl Debug for HookChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl FromIterator<Arc<dyn DecodeHook>> for HookChain {
    fn from_iter<I: IntoIterator<Item = Arc<dyn DecodeHook>>>(iter: I) -> Self {
        Self {
            hooks: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn constant(text: &'static str) -> KeyedHook<impl Fn(Value) -> Result<Value, DecodeError>> {
        KeyedHook::new(SourceKind::Str, TargetKind::Struct("Marker"), move |_| {
            Ok(Value::String(text.to_string()))
        })
    }

    #[test]
    fn empty_chain_passes() {
        // Given
        let chain = HookChain::new();

        // When
        let result = chain.apply(&TargetKind::Str, Value::U8(1)).unwrap();

        // Then
        assert_eq!(result, Value::U8(1));
        assert!(chain.is_empty());
    }

    #[test]
    fn keyed_hook_fires_only_for_its_pair() {
        // Given
        let chain = HookChain::new().with(constant("converted"));

        // When
        let matching = chain
            .apply(&TargetKind::Struct("Marker"), Value::String("raw".into()))
            .unwrap();
        let other_target = chain
            .apply(&TargetKind::Struct("Other"), Value::String("raw".into()))
            .unwrap();
        let other_source = chain
            .apply(&TargetKind::Struct("Marker"), Value::U8(7))
            .unwrap();

        // Then
        assert_eq!(matching, Value::String("converted".into()));
        assert_eq!(other_target, Value::String("raw".into()));
        assert_eq!(other_source, Value::U8(7));
    }

    #[test]
    fn hooks_run_left_to_right() {
        // Given
        let wrap = |source: SourceKind, _: &TargetKind, value: Value| {
            Ok::<_, DecodeError>(match (source, value) {
                (SourceKind::Str, Value::String(text)) => Value::String(format!("[{text}]")),
                (_, value) => value,
            })
        };
        let upper = |_: SourceKind, _: &TargetKind, value: Value| {
            Ok::<_, DecodeError>(match value {
                Value::String(text) => Value::String(text.to_uppercase()),
                value => value,
            })
        };
        let chain = HookChain::new().with(wrap).with(upper);

        // When
        let result = chain.apply(&TargetKind::Str, Value::String("abc".into())).unwrap();

        // Then
        assert_eq!(result, Value::String("[ABC]".into()));
    }

    #[test]
    fn first_claiming_hook_wins() {
        // Given
        let first = HookChain::new().with(constant("first"));
        let second = HookChain::new().with(constant("second"));
        let to_number = KeyedHook::new(SourceKind::Str, TargetKind::Struct("Marker"), |_| {
            Ok(Value::U8(0))
        });

        // When
        let chain = HookChain::new().with(to_number).then(&first).then(&second);
        let result = chain
            .apply(&TargetKind::Struct("Marker"), Value::String("raw".into()))
            .unwrap();

        // Then
        assert_eq!(chain.len(), 3);
        assert_eq!(result, Value::U8(0));
    }

    #[test]
    fn identifiers_are_never_hooked() {
        // Given
        let chain = HookChain::new().with(|_: SourceKind, _: &TargetKind, _: Value| {
            Err::<Value, _>(DecodeError::new("should not run"))
        });

        // When
        let result = chain.apply(&TargetKind::Identifier, Value::String("field".into()));

        // Then
        assert_eq!(result.unwrap(), Value::String("field".into()));
    }

    #[test]
    fn hook_errors_stop_the_chain() {
        // Given
        let chain = HookChain::new()
            .with(|_: SourceKind, _: &TargetKind, _: Value| {
                Err::<Value, _>(DecodeError::new("rejected"))
            })
            .with(constant("unreachable"));

        // When
        let error = chain
            .apply(&TargetKind::Struct("Marker"), Value::String("raw".into()))
            .unwrap_err();

        // Then
        assert_eq!(error.to_string(), "rejected");
    }
}
