//! Order orchestration.
//!
//! Creating an order validates the account, prices the requested products
//! from the catalog, persists the order atomically and then emits purchase
//! events off the request path. Reads enrich stored line items with one
//! batched catalog lookup.
//!
//! The account and catalog services are consumed through the
//! [`AccountGateway`] and [`CatalogGateway`] traits.

pub mod error;
pub mod gateway;
pub mod http;
pub mod memory;
pub mod orchestrator;
pub mod pricing;

pub use error::{OrderError, Result};
pub use gateway::{Account, AccountGateway, CatalogGateway, GatewayError, Product, ProductQuery};
pub use http::{HttpAccountGateway, HttpCatalogGateway};
pub use memory::{InMemoryAccountGateway, InMemoryCatalogGateway};
pub use orchestrator::{OrchestratorConfig, OrderOrchestrator};
pub use pricing::{MatchPolicy, PricedItems, RequestedItem, merge_requested, price_items};
