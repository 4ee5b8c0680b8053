//! Parameter sets: named parameters holding a scalar or a list of
//! candidate values.
//!
//! Entry order is significant. It is the order the sweep expander nests its
//! loops in, so deserialization keeps the document's key order instead of
//! going through a hash map.

mod file;

use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::SpecError;

pub use file::{ConstantDef, FileSummary, ParameterDef, ParameterFile};

/// A parameter's value: fixed, or a list of candidates to sweep over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(f64),
    List(Vec<f64>),
}

impl ParamValue {
    /// The candidate values; a scalar is a single candidate.
    pub fn candidates(&self) -> &[f64] {
        match self {
            ParamValue::Scalar(v) => std::slice::from_ref(v),
            ParamValue::List(values) => values,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ParamValue::List(_))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Scalar(v)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(values: Vec<f64>) -> Self {
        ParamValue::List(values)
    }
}

impl<const N: usize> From<[f64; N]> for ParamValue {
    fn from(values: [f64; N]) -> Self {
        ParamValue::List(values.to_vec())
    }
}

/// Ordered mapping from parameter name to [`ParamValue`]. Names are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSpec {
    entries: Vec<(String, ParamValue)>,
}

impl ParameterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs, rejecting duplicate names.
    pub fn from_entries<I, K, V>(entries: I) -> Result<Self, SpecError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        let mut spec = Self::new();
        for (name, value) in entries {
            spec.insert(name, value)?;
        }
        Ok(spec)
    }

    /// Append a parameter after the existing ones.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Result<(), SpecError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(SpecError::DuplicateName(name));
        }
        self.entries.push((name, value.into()));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of list-valued parameters (sweep dimensions)
    pub fn list_count(&self) -> usize {
        self.entries.iter().filter(|(_, v)| v.is_list()).count()
    }

    pub fn from_json(content: &str) -> Result<Self, SpecError> {
        serde_json::from_str(content).map_err(|e| SpecError::Parse(e.to_string()))
    }

    pub fn from_yaml(content: &str) -> Result<Self, SpecError> {
        serde_saphyr::from_str(content).map_err(|e| SpecError::Parse(e.to_string()))
    }
}

impl Serialize for ParameterSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParameterSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self {
            entries: deserialize_ordered(deserializer)?,
        })
    }
}

/// Deserialize a map into `(key, value)` pairs in document order, failing on
/// repeated keys.
pub(crate) fn deserialize_ordered<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct OrderedVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a mapping of unique names")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut entries: Vec<(String, V)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, value)) = access.next_entry::<String, V>()? {
                if entries.iter().any(|(k, _)| *k == key) {
                    return Err(de::Error::custom(format!("duplicate parameter '{key}'")));
                }
                entries.push((key, value));
            }
            Ok(entries)
        }

        // An empty YAML document comes through as unit
        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_map(OrderedVisitor(PhantomData))
}
