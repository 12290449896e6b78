//! In-memory target platform
//!
//! Deterministic ids (`gid://shopify/Product/{n}`), recorded calls, and
//! per-handle failure injection. Used by tests and by `TARGET_BACKEND=mock`.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::{PlatformError, UserError};
use super::inputs::ProductSetInput;
use super::{
    Location, MetafieldDefinition, MetafieldOwnerType, ProductSetOutcome, Publication, TargetPlatform,
};

#[derive(Default)]
struct MockState {
    /// handle → product id
    products: HashMap<String, String>,
    collections: HashMap<String, String>,
    publications: Vec<Publication>,
    locations: Vec<Location>,
    definitions: HashMap<MetafieldOwnerType, Vec<MetafieldDefinition>>,
    product_set_errors: HashMap<String, Vec<UserError>>,
    publish_errors: HashMap<String, Vec<UserError>>,
    failing_handles: HashSet<String>,
    fail_setup: bool,
    next_id: u64,
    calls: Vec<String>,
    product_set_inputs: Vec<ProductSetInput>,
    created_definitions: Vec<(MetafieldOwnerType, MetafieldDefinition)>,
    publishes: Vec<(String, Vec<String>)>,
}

impl MockState {
    fn unavailable(label: &str) -> PlatformError {
        PlatformError::Http {
            label: label.to_string(),
            status: 503,
            body: "mock platform unavailable".to_string(),
        }
    }
}

/// Mock platform for testing - no network, full call history
#[derive(Default)]
pub struct MockPlatform {
    state: Mutex<MockState>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store with an Online Store channel, for dry runs
    pub fn dry_run() -> Self {
        Self::new().with_publication(Publication {
            id: "gid://shopify/Publication/1".to_string(),
            catalog_title: Some("Online Store".to_string()),
            app_title: Some("Online Store".to_string()),
            app_handle: Some("online_store".to_string()),
        })
    }

    pub fn with_publication(self, publication: Publication) -> Self {
        self.state.lock().publications.push(publication);
        self
    }
}

/// Seeding, failure injection and call history
#[cfg(test)]
impl MockPlatform {
    pub fn with_product(self, handle: &str, id: &str) -> Self {
        self.state.lock().products.insert(handle.to_string(), id.to_string());
        self
    }

    pub fn with_collection(self, handle: &str, id: &str) -> Self {
        self.state.lock().collections.insert(handle.to_string(), id.to_string());
        self
    }


    pub fn with_location(self, name: &str, id: &str) -> Self {
        self.state.lock().locations.push(Location {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_definition(self, owner: MetafieldOwnerType, definition: MetafieldDefinition) -> Self {
        self.state.lock().definitions.entry(owner).or_default().push(definition);
        self
    }

    /// `productSet` for this handle answers with user errors
    pub fn with_product_set_errors(self, handle: &str, errors: Vec<UserError>) -> Self {
        self.state.lock().product_set_errors.insert(handle.to_string(), errors);
        self
    }

    /// Publishing the product created for this handle answers with user errors
    pub fn with_publish_errors(self, handle: &str, errors: Vec<UserError>) -> Self {
        self.state.lock().publish_errors.insert(handle.to_string(), errors);
        self
    }

    /// Any call touching this handle fails at the transport level
    pub fn with_failing_handle(self, handle: &str) -> Self {
        self.state.lock().failing_handles.insert(handle.to_string());
        self
    }

    /// Collections, publications and locations queries fail
    pub fn with_failing_setup(self) -> Self {
        self.state.lock().fail_setup = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn product_set_inputs(&self) -> Vec<ProductSetInput> {
        self.state.lock().product_set_inputs.clone()
    }

    pub fn created_definitions(&self) -> Vec<(MetafieldOwnerType, MetafieldDefinition)> {
        self.state.lock().created_definitions.clone()
    }

    pub fn publishes(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().publishes.clone()
    }

    pub fn product_id(&self, handle: &str) -> Option<String> {
        self.state.lock().products.get(handle).cloned()
    }

    pub fn product_count(&self) -> usize {
        self.state.lock().products.len()
    }
}

#[async_trait]
impl TargetPlatform for MockPlatform {
    async fn collection_ids_by_handle(&self) -> Result<HashMap<String, String>, PlatformError> {
        let mut state = self.state.lock();
        state.calls.push("collections".to_string());
        if state.fail_setup {
            return Err(MockState::unavailable("collections"));
        }
        Ok(state.collections.clone())
    }

    async fn publications(&self) -> Result<Vec<Publication>, PlatformError> {
        let mut state = self.state.lock();
        state.calls.push("publications".to_string());
        if state.fail_setup {
            return Err(MockState::unavailable("publications"));
        }
        Ok(state.publications.clone())
    }

    async fn locations(&self) -> Result<Vec<Location>, PlatformError> {
        let mut state = self.state.lock();
        state.calls.push("locations".to_string());
        if state.fail_setup {
            return Err(MockState::unavailable("locations"));
        }
        Ok(state.locations.clone())
    }

    async fn metafield_definitions(
        &self,
        owner: MetafieldOwnerType,
    ) -> Result<Vec<MetafieldDefinition>, PlatformError> {
        let mut state = self.state.lock();
        state.calls.push(format!("metafieldDefinitions {}", owner.as_str()));
        Ok(state.definitions.get(&owner).cloned().unwrap_or_default())
    }

    async fn create_metafield_definition(
        &self,
        owner: MetafieldOwnerType,
        definition: &MetafieldDefinition,
    ) -> Result<Vec<UserError>, PlatformError> {
        let mut state = self.state.lock();
        state
            .calls
            .push(format!("metafieldDefinitionCreate {} {}", owner.as_str(), definition.full_key()));

        let exists = state
            .definitions
            .get(&owner)
            .map(|defs| defs.iter().any(|d| d.namespace == definition.namespace && d.key == definition.key))
            .unwrap_or(false);
        if exists {
            return Ok(vec![UserError::new(Some("TAKEN"), &["definition", "key"], "Key is in use")]);
        }

        state.definitions.entry(owner).or_default().push(definition.clone());
        state.created_definitions.push((owner, definition.clone()));
        Ok(Vec::new())
    }

    async fn product_id_by_handle(&self, handle: &str) -> Result<Option<String>, PlatformError> {
        let mut state = self.state.lock();
        state.calls.push(format!("productByHandle {}", handle));
        if state.failing_handles.contains(handle) {
            return Err(PlatformError::Http {
                label: format!("productByHandle {}", handle),
                status: 500,
                body: "Internal Server Error".to_string(),
            });
        }
        Ok(state.products.get(handle).cloned())
    }

    async fn product_set(&self, input: &ProductSetInput) -> Result<ProductSetOutcome, PlatformError> {
        let mut state = self.state.lock();
        state.calls.push(format!("productSet {}", input.handle));
        state.product_set_inputs.push(input.clone());

        if let Some(errors) = state.product_set_errors.get(&input.handle) {
            return Ok(ProductSetOutcome {
                product_id: None,
                user_errors: errors.clone(),
            });
        }

        let id = match state.products.get(&input.handle) {
            Some(id) => id.clone(),
            None => {
                state.next_id += 1;
                let id = format!("gid://shopify/Product/{}", state.next_id);
                state.products.insert(input.handle.clone(), id.clone());
                id
            }
        };

        Ok(ProductSetOutcome {
            product_id: Some(id),
            user_errors: Vec::new(),
        })
    }

    async fn publish(&self, product_id: &str, publication_ids: &[String]) -> Result<Vec<UserError>, PlatformError> {
        let mut state = self.state.lock();
        state.calls.push(format!("publishablePublish {}", product_id));

        let handle = state
            .products
            .iter()
            .find(|(_, id)| id.as_str() == product_id)
            .map(|(handle, _)| handle.clone());
        if let Some(errors) = handle.and_then(|h| state.publish_errors.get(&h).cloned()) {
            return Ok(errors);
        }

        state.publishes.push((product_id.to_string(), publication_ids.to_vec()));
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
