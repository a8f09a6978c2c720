//! OpenStack REST provider
//!
//! Implements [`ProviderClient`] for one registry kind by mapping the
//! capability calls onto the service's REST collection:
//!
//! | call          | request                                  |
//! |---------------|------------------------------------------|
//! | `fetch_by_id` | `GET {collection}/{id}` (404 -> `None`)  |
//! | `list_all`    | `GET {list_path}`, following next links  |
//! | `create`      | `POST {collection}` `{singular: attrs}`  |
//! | `update`      | `PUT {collection}/{id}` `{singular: f}`  |
//! | `delete`      | `DELETE {collection}/{id}`               |

use super::provider::{Attributes, ProviderClient, ResourceHandle};
use super::registry::{require_resource, ResourceDef};
use crate::openstack::client::{join_url, OsClient};
use crate::openstack::http::is_not_found;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde_json::Value;

/// Upper bound on followed pagination links, guards against link cycles
const MAX_PAGES: usize = 1000;

/// Provider for one resource kind backed by the OpenStack REST API
#[derive(Clone)]
pub struct RestProvider {
    client: OsClient,
    kind: String,
    def: &'static ResourceDef,
}

impl RestProvider {
    pub fn new(client: OsClient, kind: &str) -> Result<Self> {
        Ok(Self {
            client,
            kind: kind.to_string(),
            def: require_resource(kind)?,
        })
    }

    pub fn definition(&self) -> &'static ResourceDef {
        self.def
    }

    async fn collection_url(&self) -> Result<String> {
        self.client
            .service_url(&self.def.service_type, &self.def.collection_path)
            .await
    }

    async fn item_url(&self, id: &str) -> Result<String> {
        let collection = self.collection_url().await?;
        Ok(join_url(&collection, &urlencoding::encode(id)))
    }

    fn envelope(&self, attributes: &Attributes) -> Value {
        let mut body = Attributes::new();
        body.insert(
            self.def.singular_key.clone(),
            Value::Object(attributes.clone()),
        );
        Value::Object(body)
    }

    /// Unwrap `{singular: {...}}` and map it to a handle
    fn single_from(&self, mut body: Value) -> Result<ResourceHandle> {
        let doc = body
            .get_mut(&self.def.singular_key)
            .map(Value::take)
            .with_context(|| format!("Response has no '{}' object", self.def.singular_key))?;
        self.def.handle_from(doc)
    }

    /// Items of one list page plus the `next` link, if any
    fn page_from(&self, mut body: Value) -> Result<(Vec<ResourceHandle>, Option<String>)> {
        let items = match body.get_mut(&self.def.plural_key).map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => return Err(anyhow::anyhow!("Response has no '{}' list", self.def.plural_key)),
        };

        let links_key = format!("{}_links", self.def.plural_key);
        let next = body
            .get(&links_key)
            .and_then(Value::as_array)
            .and_then(|links| {
                links
                    .iter()
                    .find(|l| l.get("rel").and_then(Value::as_str) == Some("next"))
            })
            .and_then(|l| l.get("href"))
            .and_then(Value::as_str)
            .map(String::from);

        let handles = items
            .into_iter()
            .map(|doc| self.def.handle_from(doc))
            .collect::<Result<Vec<_>>>()?;
        Ok((handles, next))
    }
}

impl ProviderClient for RestProvider {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn fetch_by_id<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<ResourceHandle>>> {
        Box::pin(async move {
            let url = self.item_url(id).await?;
            match self.client.get(&url).await {
                Ok(body) => self.single_from(body).map(Some),
                Err(e) if is_not_found(&e) => {
                    tracing::debug!("{} {} not found", self.kind, id);
                    Ok(None)
                }
                Err(e) => Err(e.context(format!("Failed to fetch {} {}", self.kind, id))),
            }
        })
    }

    fn list_all(&self) -> BoxFuture<'_, Result<Vec<ResourceHandle>>> {
        Box::pin(async move {
            let mut url = self
                .client
                .service_url(&self.def.service_type, &self.def.list_path)
                .await?;
            let mut all_items = Vec::new();

            for _ in 0..MAX_PAGES {
                let body = self
                    .client
                    .get(&url)
                    .await
                    .with_context(|| format!("Failed to list {}", self.def.plural_key))?;
                let (items, next) = self.page_from(body)?;
                all_items.extend(items);

                match next {
                    Some(next) => url = next,
                    None => return Ok(all_items),
                }
            }

            // Never hand back a truncated listing
            Err(anyhow::anyhow!(
                "Stopped listing {} after {} pages",
                self.def.plural_key,
                MAX_PAGES
            ))
        })
    }

    fn create<'a>(&'a self, attributes: &'a Attributes) -> BoxFuture<'a, Result<ResourceHandle>> {
        Box::pin(async move {
            let url = self.collection_url().await?;
            let body = self
                .client
                .post(&url, &self.envelope(attributes))
                .await
                .with_context(|| format!("Failed to create {}", self.kind))?;
            self.single_from(body)
        })
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let url = self.item_url(id).await?;
            self.client
                .delete(&url)
                .await
                .with_context(|| format!("Failed to delete {} {}", self.kind, id))?;
            Ok(())
        })
    }

    fn update<'a>(&'a self, id: &'a str, fields: &'a Attributes) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let url = self.item_url(id).await?;
            self.client
                .put(&url, &self.envelope(fields))
                .await
                .with_context(|| format!("Failed to update {} {}", self.kind, id))?;
            Ok(())
        })
    }
}
