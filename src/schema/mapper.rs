//! .NET type tag to semantic type mapping

use super::SemanticType;
use tracing::warn;

/// Type used for columns whose .NET type has no mapping
pub const DEFAULT_SEMANTIC_TYPE: SemanticType = SemanticType::String;

/// Outcome of looking up a type tag
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeResolution {
    /// Resolved type (the default on a miss)
    pub semantic_type: SemanticType,
    /// False when the tag was not in the table
    pub mapped: bool,
}

/// Maps CallMiner `DotNetType` tags to semantic types
///
/// Unknown tags fall back to a default so the column still round-trips as
/// text instead of aborting the export.
#[derive(Clone, Copy, Debug)]
pub struct SchemaTypeMapper {
    default: SemanticType,
}

impl Default for SchemaTypeMapper {
    fn default() -> Self {
        Self {
            default: DEFAULT_SEMANTIC_TYPE,
        }
    }
}

impl SchemaTypeMapper {
    /// Mapper with a custom fallback type
    pub fn with_default(default: SemanticType) -> Self {
        Self { default }
    }

    /// Fallback used for unknown tags
    pub fn default_type(&self) -> SemanticType {
        self.default
    }

    /// Table lookup without fallback
    pub fn lookup(tag: &str) -> Option<SemanticType> {
        let semantic_type = match tag {
            "System.String" => SemanticType::String,
            "System.Byte" => SemanticType::int8(),
            "System.Int16" => SemanticType::int16(),
            "System.Int32" => SemanticType::int32(),
            "System.Single" | "System.Double" | "System.Decimal" => SemanticType::Number,
            "System.DateTime" => SemanticType::DateTime,
            "System.TimeSpan" => SemanticType::Time,
            "System.Guid" => SemanticType::Uuid,
            "System.Boolean" => SemanticType::Boolean,
            _ => return None,
        };
        Some(semantic_type)
    }

    /// Look up a tag, reporting whether the fallback was used. Does not log.
    pub fn classify(&self, tag: &str) -> TypeResolution {
        match Self::lookup(tag) {
            Some(semantic_type) => TypeResolution {
                semantic_type,
                mapped: true,
            },
            None => TypeResolution {
                semantic_type: self.default,
                mapped: false,
            },
        }
    }

    /// Resolve a tag, warning when it falls back to the default
    pub fn resolve(&self, tag: &str) -> SemanticType {
        let resolution = self.classify(tag);
        if !resolution.mapped {
            warn!(
                dotnet_type = tag,
                default = ?self.default,
                "no semantic type mapping defined for .NET type, using default"
            );
        }
        resolution.semantic_type
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tags_resolve_through_table() {
        let mapper = SchemaTypeMapper::default();
        let cases = [
            ("System.String", SemanticType::String),
            ("System.Byte", SemanticType::int8()),
            ("System.Int16", SemanticType::int16()),
            ("System.Int32", SemanticType::int32()),
            ("System.Single", SemanticType::Number),
            ("System.Double", SemanticType::Number),
            ("System.Decimal", SemanticType::Number),
            ("System.DateTime", SemanticType::DateTime),
            ("System.TimeSpan", SemanticType::Time),
            ("System.Guid", SemanticType::Uuid),
            ("System.Boolean", SemanticType::Boolean),
        ];

        for (tag, expected) in cases {
            assert_eq!(mapper.resolve(tag), expected, "{tag}");
            assert!(mapper.classify(tag).mapped, "{tag} should be mapped");
        }
    }

    #[test]
    fn unknown_tag_falls_back_to_string() {
        let mapper = SchemaTypeMapper::default();
        let resolution = mapper.classify("System.Int64");

        assert!(!resolution.mapped);
        assert_eq!(resolution.semantic_type, SemanticType::String);
        assert_eq!(mapper.resolve("System.Object"), SemanticType::String);
    }

    #[test]
    fn custom_default_is_used_on_miss() {
        let mapper = SchemaTypeMapper::with_default(SemanticType::Number);
        assert_eq!(mapper.resolve("Custom.Money"), SemanticType::Number);
        assert_eq!(mapper.default_type(), SemanticType::Number);
    }
}
