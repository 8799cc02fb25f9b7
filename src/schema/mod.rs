//! Stream schemas
//!
//! A [`FieldSchema`] lists a stream's columns in declaration order together with
//! the semantic type each column's text value is coerced to. Most streams have a
//! static schema; `contacts` is discovered from the CallMiner metadata endpoint
//! (see [`DynamicSchemaResolver`]) and memoized by [`SchemaProvider`].

mod mapper;
mod provider;
mod resolver;

pub use mapper::{DEFAULT_SEMANTIC_TYPE, SchemaTypeMapper, TypeResolution};
pub use provider::{RemoteSchema, SchemaProvider};
pub use resolver::{ColumnMetadata, DiscoveredSchema, DynamicSchemaResolver};

use indexmap::IndexMap;
use serde_json::{Value, json};

/// Value type a column is coerced to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SemanticType {
    /// Signed integer within an inclusive range
    Integer {
        /// Smallest allowed value
        minimum: i64,
        /// Largest allowed value
        maximum: i64,
    },
    /// Floating point / decimal number
    Number,
    /// `true` / `false`
    Boolean,
    /// Plain text
    String,
    /// RFC 3339 date-time, kept as text
    DateTime,
    /// Calendar date, kept as text
    Date,
    /// Time of day or interval, kept as text
    Time,
    /// UUID, kept as text
    Uuid,
    /// Email address, kept as text
    Email,
}

impl SemanticType {
    /// 8-bit signed integer range
    pub const fn int8() -> Self {
        SemanticType::Integer {
            minimum: -(1 << 7),
            maximum: (1 << 7) - 1,
        }
    }

    /// 16-bit signed integer range
    pub const fn int16() -> Self {
        SemanticType::Integer {
            minimum: -(1 << 15),
            maximum: (1 << 15) - 1,
        }
    }

    /// 32-bit signed integer range
    pub const fn int32() -> Self {
        SemanticType::Integer {
            minimum: -(1 << 31),
            maximum: (1 << 31) - 1,
        }
    }

    /// Whether values are parsed as decimals
    pub fn is_numeric(&self) -> bool {
        matches!(self, SemanticType::Integer { .. } | SemanticType::Number)
    }

    /// JSON Schema fragment for this type (always nullable)
    pub fn to_json_schema(&self) -> Value {
        match self {
            SemanticType::Integer { minimum, maximum } => json!({
                "type": ["integer", "null"],
                "minimum": minimum,
                "maximum": maximum,
            }),
            SemanticType::Number => json!({"type": ["number", "null"]}),
            SemanticType::Boolean => json!({"type": ["boolean", "null"]}),
            SemanticType::String => json!({"type": ["string", "null"]}),
            SemanticType::DateTime => json!({"type": ["string", "null"], "format": "date-time"}),
            SemanticType::Date => json!({"type": ["string", "null"], "format": "date"}),
            SemanticType::Time => json!({"type": ["string", "null"], "format": "time"}),
            SemanticType::Uuid => json!({"type": ["string", "null"], "format": "uuid"}),
            SemanticType::Email => json!({"type": ["string", "null"], "format": "email"}),
        }
    }
}

/// Declared type and documentation of one column
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldProperty {
    /// Type the column's values are coerced to
    pub semantic_type: SemanticType,
    /// Human-readable column name
    pub title: Option<String>,
    /// Column description
    pub description: Option<String>,
}

impl FieldProperty {
    /// Property without title or description
    pub fn new(semantic_type: SemanticType) -> Self {
        Self {
            semantic_type,
            title: None,
            description: None,
        }
    }
}

/// Ordered column name to property mapping for one stream
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldSchema {
    fields: IndexMap<String, FieldProperty>,
}

impl FieldSchema {
    /// Empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from `(column, type)` pairs
    pub fn from_types<'a>(columns: impl IntoIterator<Item = (&'a str, SemanticType)>) -> Self {
        let fields = columns
            .into_iter()
            .map(|(name, semantic_type)| (name.to_string(), FieldProperty::new(semantic_type)))
            .collect();
        Self { fields }
    }

    /// Add or replace a column; replacing keeps the original position
    pub fn insert(&mut self, name: impl Into<String>, property: FieldProperty) {
        self.fields.insert(name.into(), property);
    }

    /// Property of a column, if declared
    pub fn get(&self, name: &str) -> Option<&FieldProperty> {
        self.fields.get(name)
    }

    /// Whether a column is declared
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Declared columns in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldProperty)> {
        self.fields.iter().map(|(n, p)| (n.as_str(), p))
    }

    /// Number of declared columns
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no columns are declared
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// JSON Schema object describing the stream
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for (name, property) in self.iter() {
            let mut prop = property.semantic_type.to_json_schema();
            if let Value::Object(obj) = &mut prop {
                if let Some(title) = &property.title {
                    obj.insert("title".into(), Value::String(title.clone()));
                }
                if let Some(description) = &property.description {
                    obj.insert("description".into(), Value::String(description.clone()));
                }
            }
            properties.insert(name.to_string(), prop);
        }
        json!({"type": "object", "properties": properties})
    }
}
