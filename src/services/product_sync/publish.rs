//! Sales channel targets for a freshly created product

use tracing::warn;

use crate::services::platform::PublicationMap;
use crate::types::StagingProduct;

/// Publication ids the product should be published to.
///
/// `Published = false` wins over any scope. `web` means the Online Store only,
/// `global` means every known channel. Any other scope publishes nowhere.
pub fn publication_targets(product: &StagingProduct, publications: &PublicationMap) -> Vec<String> {
    if product.published == Some(false) {
        return Vec::new();
    }

    match product.published_scope.as_deref() {
        Some("web") => match publications.online_store() {
            Some(id) => vec![id.to_string()],
            None => {
                warn!(
                    "Online Store publication not found on target store (product {})",
                    product.handle
                );
                Vec::new()
            }
        },
        Some("global") => publications.unique_ids(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::platform::Publication;

    fn publications() -> PublicationMap {
        PublicationMap::from_publications(&[
            Publication {
                id: "gid://shopify/Publication/1".into(),
                catalog_title: Some("Online Store".into()),
                app_title: Some("Online Store".into()),
                app_handle: Some("online_store".into()),
            },
            Publication {
                id: "gid://shopify/Publication/2".into(),
                catalog_title: Some("Point of Sale".into()),
                app_title: None,
                app_handle: Some("pos".into()),
            },
        ])
    }

    fn product(scope: Option<&str>, published: Option<bool>) -> StagingProduct {
        let mut p = StagingProduct::new("tee");
        p.published_scope = scope.map(Into::into);
        p.published = published;
        p
    }

    #[test]
    fn web_scope_targets_online_store() {
        let targets = publication_targets(&product(Some("web"), Some(true)), &publications());
        assert_eq!(targets, vec!["gid://shopify/Publication/1"]);
    }

    #[test]
    fn global_scope_targets_every_channel_once() {
        let targets = publication_targets(&product(Some("global"), None), &publications());
        assert_eq!(targets, vec!["gid://shopify/Publication/1", "gid://shopify/Publication/2"]);
    }

    #[test]
    fn unpublished_or_unknown_scope_targets_nothing() {
        assert!(publication_targets(&product(Some("global"), Some(false)), &publications()).is_empty());
        assert!(publication_targets(&product(None, Some(true)), &publications()).is_empty());
        assert!(publication_targets(&product(Some("pos"), None), &publications()).is_empty());
    }

    #[test]
    fn web_scope_without_online_store_targets_nothing() {
        let targets = publication_targets(&product(Some("web"), None), &PublicationMap::default());
        assert!(targets.is_empty());
    }
}
