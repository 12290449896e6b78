//! Admin API GraphQL documents

/// Page size for every paginated setup query
pub const PAGE_SIZE: u32 = 250;

pub const COLLECTIONS_QUERY: &str = r#"
query Collections($first: Int!, $cursor: String) {
  collections(first: $first, after: $cursor) {
    nodes { id handle }
    pageInfo { hasNextPage endCursor }
  }
}"#;

pub const PUBLICATIONS_QUERY: &str = r#"
query Publications($first: Int!, $cursor: String) {
  publications(first: $first, after: $cursor) {
    nodes {
      id
      catalog { title }
      app { title handle }
    }
    pageInfo { hasNextPage endCursor }
  }
}"#;

pub const LOCATIONS_QUERY: &str = r#"
query Locations($first: Int!, $cursor: String) {
  locations(first: $first, after: $cursor) {
    nodes { id name }
    pageInfo { hasNextPage endCursor }
  }
}"#;

pub const METAFIELD_DEFINITIONS_QUERY: &str = r#"
query MetafieldDefinitions($first: Int!, $ownerType: MetafieldOwnerType!, $cursor: String) {
  metafieldDefinitions(first: $first, ownerType: $ownerType, after: $cursor) {
    nodes {
      namespace
      key
      type { name }
    }
    pageInfo { hasNextPage endCursor }
  }
}"#;

pub const METAFIELD_DEFINITION_CREATE: &str = r#"
mutation MetafieldDefinitionCreate($definition: MetafieldDefinitionInput!) {
  metafieldDefinitionCreate(definition: $definition) {
    createdDefinition { id }
    userErrors { code field message }
  }
}"#;

pub const PRODUCT_BY_HANDLE_QUERY: &str = r#"
query ProductByHandle($handle: String!) {
  productByHandle(handle: $handle) { id }
}"#;

pub const PRODUCT_SET_MUTATION: &str = r#"
mutation ProductSet($input: ProductSetInput!, $synchronous: Boolean!) {
  productSet(synchronous: $synchronous, input: $input) {
    product { id }
    productSetOperation {
      id
      status
      userErrors { code field message }
    }
    userErrors { code field message }
  }
}"#;

pub const PUBLISHABLE_PUBLISH_MUTATION: &str = r#"
mutation PublishablePublish($id: ID!, $input: [PublicationInput!]!) {
  publishablePublish(id: $id, input: $input) {
    userErrors { field message }
  }
}"#;
