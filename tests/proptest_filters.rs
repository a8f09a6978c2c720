//! Property-based tests using proptest
//!
//! These tests verify identifier classification, attribute merging and
//! name resolution using randomized inputs.

use futures::future::BoxFuture;
use osops::resource::{
    is_canonical_id, merge_attributes, Attributes, ProviderClient, Reconciler, ResourceError,
    ResourceHandle,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Generate a flat attribute map with scalar values
fn arb_attributes() -> impl Strategy<Value = Attributes> {
    prop::collection::btree_map(
        "[a-z_]{1,12}",
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-zA-Z0-9 -]{0,16}".prop_map(Value::String),
        ],
        0..12,
    )
    .prop_map(|map| map.into_iter().collect())
}

mod canonical_id_tests {
    use super::*;

    proptest! {
        #[test]
        fn hyphenated_lowercase_uuid_is_canonical(bytes in any::<[u8; 16]>()) {
            let id = uuid::Uuid::from_bytes(bytes).hyphenated().to_string();
            prop_assert!(is_canonical_id(&id));
        }

        #[test]
        fn other_uuid_renderings_are_names(bytes in any::<[u8; 16]>()) {
            let uuid = uuid::Uuid::from_bytes(bytes);
            prop_assert!(!is_canonical_id(&uuid.simple().to_string()));
            prop_assert!(!is_canonical_id(&uuid.braced().to_string()));
            prop_assert!(!is_canonical_id(&uuid.urn().to_string()));
        }

        #[test]
        fn uppercase_uuid_is_a_name(bytes in any::<[u8; 16]>()) {
            let id = uuid::Uuid::from_bytes(bytes).hyphenated().to_string().to_uppercase();
            // All-digit UUIDs have no letters to uppercase
            prop_assume!(id.chars().any(|c| c.is_ascii_alphabetic()));
            prop_assert!(!is_canonical_id(&id));
        }

        #[test]
        fn short_names_are_never_canonical(name in "[a-z][a-z0-9_-]{0,30}") {
            prop_assert!(!is_canonical_id(&name));
        }
    }
}

mod merge_tests {
    use super::*;

    proptest! {
        #[test]
        fn override_values_win(
            defaults in arb_attributes(),
            overrides in arb_attributes()
        ) {
            let merged = merge_attributes(&defaults, &overrides);
            for (key, value) in &overrides {
                prop_assert_eq!(merged.get(key), Some(value));
            }
        }

        #[test]
        fn defaults_survive_when_not_overridden(
            defaults in arb_attributes(),
            overrides in arb_attributes()
        ) {
            let merged = merge_attributes(&defaults, &overrides);
            for (key, value) in &defaults {
                if !overrides.contains_key(key) {
                    prop_assert_eq!(merged.get(key), Some(value));
                }
            }
        }

        #[test]
        fn keys_are_the_union(
            defaults in arb_attributes(),
            overrides in arb_attributes()
        ) {
            let merged = merge_attributes(&defaults, &overrides);
            let mut expected: Vec<_> = defaults.keys().chain(overrides.keys()).cloned().collect();
            expected.sort();
            expected.dedup();
            let mut actual: Vec<_> = merged.keys().cloned().collect();
            actual.sort();
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn empty_overrides_is_identity(defaults in arb_attributes()) {
            prop_assert_eq!(merge_attributes(&defaults, &Attributes::new()), defaults);
        }
    }
}

mod resolution_tests {
    use super::*;

    /// Read-only provider over a fixed list
    struct ListProvider {
        items: Vec<ResourceHandle>,
        fetches: AtomicUsize,
        lists: AtomicUsize,
    }

    impl ListProvider {
        fn new(names: &[String]) -> Self {
            let items = names
                .iter()
                .map(|name| ResourceHandle {
                    id: uuid::Uuid::new_v4().to_string(),
                    name: name.clone(),
                    status: "available".to_string(),
                    attachments: Vec::new(),
                    raw: json!({"name": name}),
                })
                .collect();
            Self {
                items,
                fetches: AtomicUsize::new(0),
                lists: AtomicUsize::new(0),
            }
        }
    }

    impl ProviderClient for ListProvider {
        fn kind(&self) -> &str {
            "volume"
        }

        fn fetch_by_id<'a>(
            &'a self,
            id: &'a str,
        ) -> BoxFuture<'a, anyhow::Result<Option<ResourceHandle>>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let found = self.items.iter().find(|h| h.id == id).cloned();
            Box::pin(async move { Ok(found) })
        }

        fn list_all(&self) -> BoxFuture<'_, anyhow::Result<Vec<ResourceHandle>>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(self.items.clone()) })
        }

        fn create<'a>(
            &'a self,
            _attributes: &'a Attributes,
        ) -> BoxFuture<'a, anyhow::Result<ResourceHandle>> {
            Box::pin(async { Err(anyhow::anyhow!("read-only provider")) })
        }

        fn delete<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async { Err(anyhow::anyhow!("read-only provider")) })
        }

        fn update<'a>(
            &'a self,
            _id: &'a str,
            _fields: &'a Attributes,
        ) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async { Err(anyhow::anyhow!("read-only provider")) })
        }
    }

    proptest! {
        #[test]
        fn name_resolution_matches_exact_count(
            names in prop::collection::vec("[a-c]{1,2}", 0..20),
            wanted in "[a-c]{1,2}"
        ) {
            let provider = ListProvider::new(&names);
            let result = tokio_test::block_on(Reconciler::new(&provider).resolve(&wanted));
            let count = names.iter().filter(|n| **n == wanted).count();

            match (count, result) {
                (0, Err(ResourceError::NotFound { .. })) => {}
                (1, Ok(handle)) => prop_assert_eq!(handle.name, wanted),
                (n, Err(ResourceError::Ambiguous { count, .. })) if n >= 2 => {
                    prop_assert_eq!(count, n)
                }
                (n, other) => prop_assert!(false, "{} matches gave {:?}", n, other),
            }
            prop_assert_eq!(provider.lists.load(Ordering::SeqCst), 1);
            prop_assert_eq!(provider.fetches.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn canonical_ids_never_list(index in 0usize..8) {
            let names: Vec<String> = (0..8).map(|i| format!("vol-{}", i)).collect();
            let provider = ListProvider::new(&names);
            let id = provider.items[index].id.clone();

            let handle = tokio_test::block_on(Reconciler::new(&provider).resolve(&id))
                .expect("existing id should resolve");

            prop_assert_eq!(handle.name, names[index].clone());
            prop_assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);
            prop_assert_eq!(provider.lists.load(Ordering::SeqCst), 0);
        }
    }
}
