//! Static or remotely discovered stream schemas

use super::{DynamicSchemaResolver, FieldSchema};
use crate::client::ExportApi;
use crate::error::Result;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Where a stream's schema comes from
pub enum SchemaProvider {
    /// Declared in code
    Static(Arc<FieldSchema>),
    /// Discovered from the API on first use and reused afterwards
    Remote(RemoteSchema),
}

impl SchemaProvider {
    /// Static provider
    pub fn fixed(schema: FieldSchema) -> Self {
        SchemaProvider::Static(Arc::new(schema))
    }

    /// Provider backed by the contacts metadata endpoint
    pub fn contacts() -> Self {
        SchemaProvider::Remote(RemoteSchema::new(DynamicSchemaResolver::default()))
    }

    /// The stream's schema, discovering it if needed
    ///
    /// A remote schema is fetched at most once per provider; concurrent callers
    /// wait for the same fetch. A failed fetch is not cached.
    pub async fn schema<A>(&self, api: &A) -> Result<Arc<FieldSchema>>
    where
        A: ExportApi + ?Sized,
    {
        match self {
            SchemaProvider::Static(schema) => Ok(Arc::clone(schema)),
            SchemaProvider::Remote(remote) => remote.get(api).await,
        }
    }

    /// The schema if it is available without a network call
    pub fn cached(&self) -> Option<Arc<FieldSchema>> {
        match self {
            SchemaProvider::Static(schema) => Some(Arc::clone(schema)),
            SchemaProvider::Remote(remote) => remote.cell.get().cloned(),
        }
    }
}

impl std::fmt::Debug for SchemaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaProvider::Static(schema) => {
                f.debug_tuple("Static").field(&schema.len()).finish()
            }
            SchemaProvider::Remote(remote) => f
                .debug_struct("Remote")
                .field("resolved", &remote.cell.initialized())
                .finish(),
        }
    }
}

/// Lazily resolved, memoized schema
pub struct RemoteSchema {
    resolver: DynamicSchemaResolver,
    cell: OnceCell<Arc<FieldSchema>>,
}

impl RemoteSchema {
    /// Unresolved schema using the given resolver
    pub fn new(resolver: DynamicSchemaResolver) -> Self {
        Self {
            resolver,
            cell: OnceCell::new(),
        }
    }

    async fn get<A>(&self, api: &A) -> Result<Arc<FieldSchema>>
    where
        A: ExportApi + ?Sized,
    {
        let schema = self
            .cell
            .get_or_try_init(|| async {
                debug!("contacts schema not cached, resolving");
                self.resolver
                    .resolve_contacts_schema(api)
                    .await
                    .map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(schema))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::FakeApi;
    use crate::schema::{ColumnMetadata, SemanticType};

    fn contacts_metadata() -> Vec<ColumnMetadata> {
        vec![ColumnMetadata {
            column_name: "ContactID".into(),
            dot_net_type: "System.Int32".into(),
            friendly_name: Some("Contact ID".into()),
            description: None,
        }]
    }

    #[tokio::test]
    async fn remote_schema_is_fetched_once() {
        let api = FakeApi::new();
        api.set_metadata(Ok(contacts_metadata()));
        let provider = SchemaProvider::contacts();

        assert!(provider.cached().is_none());
        let first = provider.schema(&api).await.unwrap();
        let second = provider.schema(&api).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(api.calls("call_metadata_config"), 1);
        assert_eq!(
            first.get("ContactID").unwrap().semantic_type,
            SemanticType::int32()
        );
        assert!(provider.cached().is_some());
    }

    #[tokio::test]
    async fn failed_discovery_is_not_cached() {
        let api = FakeApi::new();
        api.set_metadata(Err("HTTP 503".into()));
        let provider = SchemaProvider::contacts();

        let err = provider.schema(&api).await.unwrap_err();
        assert_eq!(err.error_code(), "discovery_failed");

        api.set_metadata(Ok(contacts_metadata()));
        provider.schema(&api).await.unwrap();
        assert_eq!(api.calls("call_metadata_config"), 2);
    }

    #[tokio::test]
    async fn static_schema_never_calls_api() {
        let api = FakeApi::new();
        let provider =
            SchemaProvider::fixed(FieldSchema::from_types([("ContactID", SemanticType::int32())]));

        let schema = provider.schema(&api).await.unwrap();
        assert_eq!(schema.len(), 1);
        assert_eq!(api.calls("call_metadata_config"), 0);
    }
}
