use crate::{HookChain, SourceKind, TargetKind};
use keel_deserialize::{Slug, SlugIndex};
use serde::de::{
    self, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess, VariantAccess,
    Visitor,
};
use serde::Deserializer;
use serde_value::{Value, ValueDeserializer};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::vec;

/// Represents a failure to decode a configuration value.
///
/// Carries the dotted key path of the innermost value that failed, when
/// known (e.g. `app.logger.verbosity`, or `targets[2]` for sequences).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    path: Option<String>,
    message: String,
}

impl DecodeError {
    /// Creates a new error with the given message and no path.
    pub fn new(message: impl Display) -> Self {
        Self {
            path: None,
            message: message.to_string(),
        }
    }

    /// Attaches the given key path, unless a more specific one is already
    /// attached. An empty path denotes the document root and is ignored.
    pub fn at(mut self, path: &str) -> Self {
        if self.path.is_none() && !path.is_empty() {
            self.path = Some(path.to_string());
        }
        self
    }

    /// The key path of the failing value, if known.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// The description of the failure, without the path.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "at `{}`: {}", path, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DecodeError {}

impl de::Error for DecodeError {
    fn custom<T: Display>(message: T) -> Self {
        Self::new(message)
    }
}

/// A [`Deserializer`] over a raw document value that runs a [`HookChain`]
/// at every value before handing it to the target type.
///
/// Struct keys are matched against field names ignoring case and
/// punctuation, and so are enum variant names. Keys that match no field are
/// left for the target to ignore.
pub struct HookedDeserializer<'h> {
    value: Value,
    hooks: &'h HookChain,
    path: String,
}

impl<'h> HookedDeserializer<'h> {
    /// Creates a deserializer for the given value at the document root.
    pub fn new(value: Value, hooks: &'h HookChain) -> Self {
        Self::at(value, hooks, String::new())
    }

    fn at(value: Value, hooks: &'h HookChain, path: String) -> Self {
        Self { value, hooks, path }
    }

    fn child(&self, value: Value, segment: &str) -> Self {
        let path = if self.path.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{}", self.path, segment)
        };

        Self::at(value, self.hooks, path)
    }

    fn element(&self, value: Value, index: usize) -> Self {
        Self::at(value, self.hooks, format!("{}[{}]", self.path, index))
    }

    /// Runs the hook chain for the given target and returns the converted
    /// value.
    fn hooked(&mut self, target: TargetKind) -> Result<Value, DecodeError> {
        let value = std::mem::replace(&mut self.value, Value::Unit);

        self.hooks
            .apply(&target, value)
            .map_err(|error| error.at(&self.path))
    }

    fn plain(value: Value) -> ValueDeserializer<DecodeError> {
        ValueDeserializer::new(value)
    }
}

/// Renders a map key for use in a key path.
fn key_label(key: &Value) -> String {
    match key {
        Value::String(key) => key.clone(),
        Value::Char(key) => key.to_string(),
        Value::Bool(key) => key.to_string(),
        Value::U8(key) => key.to_string(),
        Value::U16(key) => key.to_string(),
        Value::U32(key) => key.to_string(),
        Value::U64(key) => key.to_string(),
        Value::I8(key) => key.to_string(),
        Value::I16(key) => key.to_string(),
        Value::I32(key) => key.to_string(),
        Value::I64(key) => key.to_string(),
        other => format!("{other:?}"),
    }
}

/// Forwards a primitive request to the plain value deserializer after
/// running the hook chain for the given target kind.
macro_rules! forward_hooked {
    ($($method:ident => $target:expr,)*) => {
        $(
            fn $method<V>(mut self, visitor: V) -> Result<V::Value, Self::Error>
            where
                V: Visitor<'de>,
            {
                let path = self.path.clone();
                let value = self.hooked($target)?;

                Self::plain(value)
                    .$method(visitor)
                    .map_err(|error| error.at(&path))
            }
        )*
    };
}

impl<'de, 'h> Deserializer<'de> for HookedDeserializer<'h> {
    type Error = DecodeError;

    fn deserialize_any<V>(mut self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let path = self.path.clone();
        let value = self.hooked(TargetKind::Any)?;

        let result = match value {
            Value::Map(map) => visitor.visit_map(HookedMap::new(self.hooks, path.clone(), map)),
            Value::Seq(seq) => visitor.visit_seq(HookedSeq::new(self.hooks, path.clone(), seq)),
            Value::Option(Some(inner)) => visitor.visit_some(self.child_in_place(*inner)),
            Value::Newtype(inner) => visitor.visit_newtype_struct(self.child_in_place(*inner)),
            other => Self::plain(other).deserialize_any(visitor),
        };

        result.map_err(|error| error.at(&path))
    }

    forward_hooked! {
        deserialize_bool => TargetKind::Bool,
        deserialize_i8 => TargetKind::Integer,
        deserialize_i16 => TargetKind::Integer,
        deserialize_i32 => TargetKind::Integer,
        deserialize_i64 => TargetKind::Integer,
        deserialize_u8 => TargetKind::Integer,
        deserialize_u16 => TargetKind::Integer,
        deserialize_u32 => TargetKind::Integer,
        deserialize_u64 => TargetKind::Integer,
        deserialize_f32 => TargetKind::Float,
        deserialize_f64 => TargetKind::Float,
        deserialize_char => TargetKind::Char,
        deserialize_str => TargetKind::Str,
        deserialize_string => TargetKind::Str,
        deserialize_bytes => TargetKind::Bytes,
        deserialize_byte_buf => TargetKind::Bytes,
        deserialize_unit => TargetKind::Unit,
        deserialize_identifier => TargetKind::Identifier,
        deserialize_ignored_any => TargetKind::Ignored,
    }

    fn deserialize_option<V>(mut self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let path = self.path.clone();
        let value = self.hooked(TargetKind::Option)?;

        let result = match value {
            Value::Unit | Value::Option(None) => visitor.visit_none(),
            Value::Option(Some(inner)) => visitor.visit_some(self.child_in_place(*inner)),
            other => visitor.visit_some(self.child_in_place(other)),
        };

        result.map_err(|error| error.at(&path))
    }

    fn deserialize_unit_struct<V>(
        mut self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let path = self.path.clone();
        let value = self.hooked(TargetKind::UnitStruct(name))?;

        Self::plain(value)
            .deserialize_unit_struct(name, visitor)
            .map_err(|error| error.at(&path))
    }

    fn deserialize_newtype_struct<V>(
        mut self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let path = self.path.clone();
        let value = match self.hooked(TargetKind::NewtypeStruct(name))? {
            Value::Newtype(inner) => *inner,
            other => other,
        };

        visitor
            .visit_newtype_struct(self.child_in_place(value))
            .map_err(|error| error.at(&path))
    }

    fn deserialize_seq<V>(mut self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let value = self.hooked(TargetKind::Seq)?;
        self.visit_sequence(value, visitor)
    }

    fn deserialize_tuple<V>(mut self, len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let value = self.hooked(TargetKind::Tuple)?;
        match value {
            Value::Seq(_) => self.visit_sequence(value, visitor),
            other => Self::plain(other)
                .deserialize_tuple(len, visitor)
                .map_err(|error| error.at(&self.path)),
        }
    }

    fn deserialize_tuple_struct<V>(
        mut self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let value = self.hooked(TargetKind::TupleStruct(name))?;
        match value {
            Value::Seq(_) => self.visit_sequence(value, visitor),
            other => Self::plain(other)
                .deserialize_tuple_struct(name, len, visitor)
                .map_err(|error| error.at(&self.path)),
        }
    }

    fn deserialize_map<V>(mut self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let path = self.path.clone();
        let value = self.hooked(TargetKind::Map)?;

        let result = match value {
            Value::Map(map) => visitor.visit_map(HookedMap::new(self.hooks, path.clone(), map)),
            other => Self::plain(other).deserialize_map(visitor),
        };

        result.map_err(|error| error.at(&path))
    }

    fn deserialize_struct<V>(
        mut self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let path = self.path.clone();
        let value = self.hooked(TargetKind::Struct(name))?;

        let map = match value {
            Value::Map(map) => map,
            other => {
                return Self::plain(other)
                    .deserialize_struct(name, fields, visitor)
                    .map_err(|error| error.at(&path));
            }
        };

        // Only keys naming a field are grouped; the rest pass through as-is
        let index = SlugIndex::new(fields);
        let mut known = BTreeMap::new();
        let mut unknown = Vec::new();
        for (key, value) in map {
            match &key {
                Value::String(text) if index.resolve(text).is_some() => {
                    known.insert(key, value);
                }
                Value::String(_) => unknown.push((key, value)),
                _ => {}
            }
        }

        let entries = Slug::group(known)
            .map_err(|error| DecodeError::new(error).at(&path))?
            .into_iter()
            .map(|(slug, value)| {
                let key = match index.resolve(slug.original()) {
                    Some(field) => field.to_string(),
                    None => slug.original().to_string(),
                };
                (Value::String(key), value)
            })
            .chain(unknown)
            .collect::<Vec<_>>();

        visitor
            .visit_map(HookedMap::from_entries(self.hooks, path.clone(), entries))
            .map_err(|error| error.at(&path))
    }

    fn deserialize_enum<V>(
        mut self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let path = self.path.clone();
        let value = self.hooked(TargetKind::Enum(name))?;
        let index = SlugIndex::new(variants);

        let (variant, content) = match value {
            Value::String(variant) => (variant, None),
            Value::Map(map) if map.len() == 1 => {
                let mut entries = map.into_iter();
                match entries.next() {
                    Some((Value::String(variant), content)) => (variant, Some(content)),
                    _ => {
                        return Err(DecodeError::new(format!(
                            "expected a variant name of enum {name} as the single key",
                        ))
                        .at(&path));
                    }
                }
            }
            other => {
                return Self::plain(other)
                    .deserialize_enum(name, variants, visitor)
                    .map_err(|error| error.at(&path));
            }
        };

        // Leave unknown names as they are, so the error names them
        let variant = index
            .resolve(&variant)
            .map(str::to_string)
            .unwrap_or(variant);
        let content = content.map(|content| self.child(content, &variant));

        visitor
            .visit_enum(HookedEnum { variant, content })
            .map_err(|error| error.at(&path))
    }
}

impl<'h> HookedDeserializer<'h> {
    /// Reuses this deserializer's path for a value that logically sits at
    /// the same position (e.g. the content of an option).
    fn child_in_place(&self, value: Value) -> Self {
        Self::at(value, self.hooks, self.path.clone())
    }

    fn visit_sequence<'de, V>(self, value: Value, visitor: V) -> Result<V::Value, DecodeError>
    where
        V: Visitor<'de>,
    {
        let path = self.path.clone();

        let result = match value {
            Value::Seq(seq) => visitor.visit_seq(HookedSeq::new(self.hooks, path.clone(), seq)),
            other => Self::plain(other).deserialize_seq(visitor),
        };

        result.map_err(|error| error.at(&path))
    }
}

struct HookedSeq<'h> {
    parent: HookedDeserializer<'h>,
    iter: vec::IntoIter<Value>,
    index: usize,
}

impl<'h> HookedSeq<'h> {
    fn new(hooks: &'h HookChain, path: String, seq: Vec<Value>) -> Self {
        Self {
            parent: HookedDeserializer::at(Value::Unit, hooks, path),
            iter: seq.into_iter(),
            index: 0,
        }
    }
}

impl<'de, 'h> SeqAccess<'de> for HookedSeq<'h> {
    type Error = DecodeError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        let Some(value) = self.iter.next() else {
            return Ok(None);
        };

        let element = self.parent.element(value, self.index);
        self.index += 1;

        seed.deserialize(element).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct HookedMap<'h> {
    parent: HookedDeserializer<'h>,
    iter: vec::IntoIter<(Value, Value)>,
    pending: Option<(String, Value)>,
}

impl<'h> HookedMap<'h> {
    fn new(
        hooks: &'h HookChain,
        path: String,
        map: std::collections::BTreeMap<Value, Value>,
    ) -> Self {
        Self::from_entries(hooks, path, map.into_iter().collect())
    }

    fn from_entries(hooks: &'h HookChain, path: String, entries: Vec<(Value, Value)>) -> Self {
        Self {
            parent: HookedDeserializer::at(Value::Unit, hooks, path),
            iter: entries.into_iter(),
            pending: None,
        }
    }
}

impl<'de, 'h> MapAccess<'de> for HookedMap<'h> {
    type Error = DecodeError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: DeserializeSeed<'de>,
    {
        let Some((key, value)) = self.iter.next() else {
            return Ok(None);
        };

        let label = key_label(&key);
        let key = seed
            .deserialize(HookedDeserializer::plain(key))
            .map_err(|error| error.at(&self.parent.child(Value::Unit, &label).path))?;
        self.pending = Some((label, value));

        Ok(Some(key))
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        match self.pending.take() {
            Some((label, value)) => seed.deserialize(self.parent.child(value, &label)),
            None => Err(DecodeError::new("map value requested before its key").at(&self.parent.path)),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct HookedEnum<'h> {
    variant: String,
    content: Option<HookedDeserializer<'h>>,
}

impl<'de, 'h> EnumAccess<'de> for HookedEnum<'h> {
    type Error = DecodeError;
    type Variant = HookedVariant<'h>;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant), Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        let name: de::value::StringDeserializer<DecodeError> = self.variant.into_deserializer();
        let variant = seed.deserialize(name)?;

        Ok((
            variant,
            HookedVariant {
                content: self.content,
            },
        ))
    }
}

struct HookedVariant<'h> {
    content: Option<HookedDeserializer<'h>>,
}

impl<'de, 'h> VariantAccess<'de> for HookedVariant<'h> {
    type Error = DecodeError;

    fn unit_variant(self) -> Result<(), Self::Error> {
        match self.content {
            None => Ok(()),
            Some(content) => match content.value {
                Value::Unit | Value::Option(None) => Ok(()),
                other => Err(DecodeError::new(format!(
                    "expected a variant without content, found {}",
                    SourceKind::of(&other),
                ))
                .at(&content.path)),
            },
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        match self.content {
            Some(content) => seed.deserialize(content),
            None => Err(DecodeError::new("expected a variant with content, found a name")),
        }
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.content {
            Some(content) => content.deserialize_seq(visitor),
            None => Err(DecodeError::new("expected a tuple variant, found a name")),
        }
    }

    fn struct_variant<V>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.content {
            Some(content) => content.deserialize_struct("", fields, visitor),
            None => Err(DecodeError::new("expected a struct variant, found a name")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KeyedHook, SourceKind};
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use std::collections::HashMap;

    fn yaml(text: &str) -> Value {
        serde_yml::from_str(text).unwrap()
    }

    fn decode<T: for<'de> Deserialize<'de>>(text: &str, hooks: &HookChain) -> Result<T, DecodeError> {
        T::deserialize(HookedDeserializer::new(yaml(text), hooks))
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "snake_case")]
    enum Mode {
        Fast,
        SlowAndSteady,
        Custom { factor: u8 },
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Nested {
        mode: Mode,
        #[serde(default)]
        label: Option<String>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Settings {
        local_time: bool,
        retries: u8,
        nested: Nested,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default)]
        limits: HashMap<String, u32>,
    }

    #[test]
    fn keys_and_variants_match_as_slugs() {
        // Given
        let text = r#"
LocalTime: true
RETRIES: 3
Nested:
  Mode: SLOW-AND-STEADY
  label: primary
Tags: [a, b]
limits:
  Connections: 10
unknown_key: ignored
"#;

        // When
        let settings: Settings = decode(text, &HookChain::new()).unwrap();

        // Then
        assert_eq!(
            settings,
            Settings {
                local_time: true,
                retries: 3,
                nested: Nested {
                    mode: Mode::SlowAndSteady,
                    label: Some("primary".to_string()),
                },
                tags: vec!["a".to_string(), "b".to_string()],
                limits: HashMap::from([("Connections".to_string(), 10)]),
            },
        );
    }

    #[test]
    fn struct_variant_content_is_decoded() {
        // Given
        let text = "mode:\n  Custom:\n    Factor: 4\n";

        // When
        let nested: Nested = decode(text, &HookChain::new()).unwrap();

        // Then
        assert_eq!(nested.mode, Mode::Custom { factor: 4 });
        assert_eq!(nested.label, None);
    }

    #[test]
    fn errors_carry_the_innermost_path() {
        // Given
        let text = "local_time: true\nretries: 3\nnested:\n  mode: sideways\n";

        // When
        let error = decode::<Settings>(text, &HookChain::new()).unwrap_err();

        // Then
        assert_eq!(error.path(), Some("nested.mode"));
        assert!(error.message().contains("sideways"), "{error}");
    }

    #[test]
    fn sequence_errors_carry_the_index() {
        // Given
        let text = "local_time: true\nretries: 3\nnested: {mode: fast}\ntags: [a, [b]]\n";

        // When
        let error = decode::<Settings>(text, &HookChain::new()).unwrap_err();

        // Then
        assert_eq!(error.path(), Some("tags[1]"));
    }

    #[test]
    fn hooks_run_at_every_level() {
        // Given
        let hooks = HookChain::new().with(KeyedHook::new(
            SourceKind::Str,
            TargetKind::Integer,
            |value| match value {
                Value::String(text) if text == "many" => Ok(Value::U8(100)),
                other => Ok(other),
            },
        ));
        let text = "local_time: false\nretries: many\nnested: {mode: fast}\nlimits: {a: many}\n";

        // When
        let settings: Settings = decode(text, &hooks).unwrap();

        // Then
        assert_eq!(settings.retries, 100);
        assert_eq!(settings.limits.get("a"), Some(&100));
    }

    #[test]
    fn hook_errors_carry_the_path() {
        // Given
        let hooks = HookChain::new().with(KeyedHook::new(
            SourceKind::Bool,
            TargetKind::Bool,
            |_| Err(DecodeError::new("booleans are forbidden here")),
        ));
        let text = "local_time: true\nretries: 1\nnested: {mode: fast}\n";

        // When
        let error = decode::<Settings>(text, &hooks).unwrap_err();

        // Then
        assert_eq!(error.to_string(), "at `local_time`: booleans are forbidden here");
    }

    #[test]
    fn colliding_scalar_keys_are_rejected() {
        // Given
        let text = "local_time: true\nLocalTime: false\nretries: 1\nnested: {mode: fast}\n";

        // When
        let error = decode::<Settings>(text, &HookChain::new()).unwrap_err();

        // Then
        assert!(error.message().contains("name the same setting"), "{error}");
    }

    #[test]
    fn unknown_keys_never_collide() {
        // Given
        let text = "local_time: true\nretries: 1\nnested: {mode: fast}\nmax_conns: 5\nmaxconns: 6\n";

        // When
        let settings = decode::<Settings>(text, &HookChain::new()).unwrap();

        // Then
        assert!(settings.local_time);
        assert_eq!(settings.retries, 1);
    }
}
