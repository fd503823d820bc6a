use std::collections::BTreeMap;

use crate::procedure::Procedures;

/// One field of a [`Document`].
///
/// Only these three shapes are visible to templates; there are no numbers,
/// booleans or nulls.
///
/// An empty `ObjectList` serializes as `[]`, which deserializes as an empty
/// `TextList`. Templates cannot tell the two apart: both loop zero times.
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(untagged))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Text(String),
    TextList(Vec<String>),
    ObjectList(Vec<Document>),
}

impl Value {
    pub fn text<T: Into<String>>(text: T) -> Self {
        Self::Text(text.into())
    }

    pub fn texts<I, T>(texts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::TextList(texts.into_iter().map(Into::into).collect())
    }

    pub fn objects<I: IntoIterator<Item = Document>>(objects: I) -> Self {
        Self::ObjectList(objects.into_iter().collect())
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<String>> for Value {
    fn from(texts: Vec<String>) -> Self {
        Self::TextList(texts)
    }
}

impl From<Vec<Document>> for Value {
    fn from(objects: Vec<Document>) -> Self {
        Self::ObjectList(objects)
    }
}

/// The input of a render: a mapping from field name to [`Value`].
///
/// The elements of an object list are documents themselves, so fields nest
/// to any depth.
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(transparent))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Document {
    fields: BTreeMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<N: AsRef<str>, V: Into<Value>>(&mut self, name: N, value: V) -> &mut Self {
        self.fields.insert(name.as_ref().to_string(), value.into());
        self
    }

    pub fn get<N: AsRef<str>>(&self, name: N) -> Option<&Value> {
        self.fields.get(name.as_ref())
    }

    pub fn contains<N: AsRef<str>>(&self, name: N) -> bool {
        self.fields.contains_key(name.as_ref())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

#[cfg(feature = "json")]
impl Document {
    /// Parses a JSON object into a document, dropping fields whose shape is
    /// not part of the document model.
    ///
    /// # Errors
    /// - If `json` is not valid JSON or its root is not an object.
    pub fn from_json(json: &str) -> crate::MailplateResult<Self> {
        serde_json::from_str(json).map_err(|e| crate::MailplateError::InvalidDocument {
            message: e.to_string(),
        })
    }

    /// Same as [`Document::from_json`] for an already parsed value.
    ///
    /// # Errors
    /// - If the root of `json` is not an object.
    pub fn from_json_value(json: &serde_json::Value) -> crate::MailplateResult<Self> {
        <Self as serde::Deserialize>::deserialize(json).map_err(|e: serde_json::Error| {
            crate::MailplateError::InvalidDocument {
                message: e.to_string(),
            }
        })
    }
}

/// Lenient deserialization: anything outside the string / string array /
/// object array model is treated as absent instead of failing.
#[cfg(feature = "serde")]
mod lenient {
    use std::fmt;

    use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};

    use super::{Document, Value};

    enum Raw {
        Text(String),
        List(Vec<Raw>),
        Object(Vec<(String, Raw)>),
        Other,
    }

    impl Raw {
        fn into_value(self) -> Option<Value> {
            match self {
                Self::Text(text) => Some(Value::Text(text)),
                Self::List(items) => {
                    let mut texts = Vec::new();
                    let mut objects = Vec::new();
                    for item in items {
                        match item {
                            Self::Text(text) => texts.push(text),
                            Self::Object(fields) => objects.push(into_document(fields)),
                            Self::List(_) | Self::Other => {}
                        }
                    }
                    // Any object makes this an object list; stray strings are dropped.
                    if objects.is_empty() {
                        Some(Value::TextList(texts))
                    } else {
                        Some(Value::ObjectList(objects))
                    }
                }
                Self::Object(_) | Self::Other => None,
            }
        }
    }

    fn into_document(fields: Vec<(String, Raw)>) -> Document {
        fields
            .into_iter()
            .filter_map(|(name, raw)| raw.into_value().map(|value| (name, value)))
            .collect()
    }

    struct RawVisitor;

    impl<'de> Visitor<'de> for RawVisitor {
        type Value = Raw;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("any JSON-like value")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Raw, E> {
            Ok(Raw::Text(v.to_string()))
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<Raw, E> {
            Ok(Raw::Text(v))
        }

        fn visit_bool<E: de::Error>(self, _v: bool) -> Result<Raw, E> {
            Ok(Raw::Other)
        }

        fn visit_i64<E: de::Error>(self, _v: i64) -> Result<Raw, E> {
            Ok(Raw::Other)
        }

        fn visit_u64<E: de::Error>(self, _v: u64) -> Result<Raw, E> {
            Ok(Raw::Other)
        }

        fn visit_f64<E: de::Error>(self, _v: f64) -> Result<Raw, E> {
            Ok(Raw::Other)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Raw, E> {
            Ok(Raw::Other)
        }

        fn visit_none<E: de::Error>(self) -> Result<Raw, E> {
            Ok(Raw::Other)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Raw, D::Error> {
            Raw::deserialize(deserializer)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Raw, A::Error> {
            let mut items = Vec::new();
            while let Some(item) = seq.next_element::<Raw>()? {
                items.push(item);
            }
            Ok(Raw::List(items))
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Raw, A::Error> {
            let mut fields = Vec::new();
            while let Some((name, value)) = map.next_entry::<String, Raw>()? {
                fields.push((name, value));
            }
            Ok(Raw::Object(fields))
        }
    }

    impl<'de> Deserialize<'de> for Raw {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(RawVisitor)
        }
    }

    impl<'de> Deserialize<'de> for Document {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            match Raw::deserialize(deserializer)? {
                Raw::Object(fields) => Ok(into_document(fields)),
                Raw::Text(_) | Raw::List(_) | Raw::Other => {
                    Err(de::Error::custom("document root must be an object"))
                }
            }
        }
    }

    impl<'de> Deserialize<'de> for Value {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            Raw::deserialize(deserializer)?
                .into_value()
                .ok_or_else(|| de::Error::custom("expected a string or an array"))
        }
    }
}

/// How a template uses a name.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReferenceKind {
    /// Printed, tested by `$if` or passed as a `$call` argument.
    Variable,
    /// Iterated by `$for`.
    Iterable,
    /// Invoked by `$call`.
    Procedure,
}

/// `MailplateInterface` is a trait for a registry of named templates, each
/// compiled once and rendered many times against per-call documents.
pub trait MailplateInterface {
    /// `add_template` tries to compile and register a new template.
    ///
    /// # Errors
    /// - If the template name is a duplicate.
    /// - If the template source does not parse.
    fn add_template<N: AsRef<str>, S: AsRef<str>>(
        &mut self,
        name: N,
        source: S,
    ) -> crate::MailplateResult<()>;

    /// `render` renders a template with the given document and procedures.
    ///
    /// Unbound names and unknown procedures render as empty text.
    ///
    /// # Errors
    /// - If the template name is not found.
    /// - If a procedure fails.
    fn render<N: AsRef<str>>(
        &self,
        template_name: N,
        document: &Document,
        procedures: &Procedures<'_>,
    ) -> crate::MailplateResult<String>;

    /// `references` lists every name the template uses, once per kind, in
    /// order of first appearance.
    ///
    /// # Errors
    /// - If the template name is not found.
    fn references<N: AsRef<str>>(
        &self,
        template_name: N,
    ) -> crate::MailplateResult<Vec<(&str, ReferenceKind)>>;
}
