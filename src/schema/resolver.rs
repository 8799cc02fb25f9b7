//! Dynamic schema discovery for the contacts stream

use super::{FieldProperty, FieldSchema, SchemaTypeMapper};
use crate::client::ExportApi;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One entry of `GET /info/callmetadataconfig`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnMetadata {
    /// Column name as it appears in the export CSV header
    pub column_name: String,
    /// .NET type tag, e.g. `System.Int32`
    pub dot_net_type: String,
    /// Display name
    #[serde(default)]
    pub friendly_name: Option<String>,
    /// Column description
    #[serde(default)]
    pub description: Option<String>,
}

/// Schema built from column metadata plus the tags that had no mapping
#[derive(Clone, Debug)]
pub struct DiscoveredSchema {
    /// The resolved schema
    pub schema: FieldSchema,
    /// Distinct unmapped .NET tags, in first-seen order
    pub unmapped_tags: Vec<String>,
}

/// Builds the contacts schema from server metadata
#[derive(Clone, Copy, Debug, Default)]
pub struct DynamicSchemaResolver {
    mapper: SchemaTypeMapper,
}

impl DynamicSchemaResolver {
    /// Resolver using a specific type mapper
    pub fn new(mapper: SchemaTypeMapper) -> Self {
        Self { mapper }
    }

    /// Fetch column metadata and build the contacts schema
    ///
    /// # Errors
    /// Returns [`Error::Discovery`] if the metadata call fails; without a schema
    /// no contacts records can be coerced.
    pub async fn resolve_contacts_schema<A>(&self, api: &A) -> Result<FieldSchema>
    where
        A: ExportApi + ?Sized,
    {
        debug!("fetching call metadata config for contacts schema");

        let columns = api
            .call_metadata_config()
            .await
            .map_err(|e| Error::Discovery {
                stream: "contacts".to_string(),
                reason: e.to_string(),
            })?;

        let discovered = self.build_schema(&columns);
        info!(
            columns = discovered.schema.len(),
            unmapped = discovered.unmapped_tags.len(),
            "resolved contacts schema"
        );
        Ok(discovered.schema)
    }

    /// Build a schema from metadata, warning once per distinct unknown tag
    pub fn build_schema(&self, columns: &[ColumnMetadata]) -> DiscoveredSchema {
        let mut schema = FieldSchema::new();
        let mut unmapped_tags: Vec<String> = Vec::new();

        for column in columns {
            let resolution = self.mapper.classify(&column.dot_net_type);
            if !resolution.mapped && !unmapped_tags.contains(&column.dot_net_type) {
                warn!(
                    dotnet_type = %column.dot_net_type,
                    column = %column.column_name,
                    default = ?resolution.semantic_type,
                    "no semantic type mapping defined for .NET type, using default"
                );
                unmapped_tags.push(column.dot_net_type.clone());
            }

            schema.insert(
                column.column_name.clone(),
                FieldProperty {
                    semantic_type: resolution.semantic_type,
                    title: column.friendly_name.clone(),
                    description: column.description.clone(),
                },
            );
        }

        DiscoveredSchema {
            schema,
            unmapped_tags,
        }
    }
}
