//! Contracts of the account and catalog services.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{AccountId, Money, ProductId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by a remote gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The requested entity does not exist.
    #[error("not found")]
    NotFound,

    /// The call did not complete within its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The service could not be reached or answered with a server error.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The service answered with a body that could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// A buyer account as the account service reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: String,
}

/// A catalog product with its current price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
}

/// Parameters of a catalog lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductQuery {
    pub ids: Vec<ProductId>,
    pub skip: u64,
    pub take: u64,
    pub query: String,
}

impl ProductQuery {
    /// Looks up exactly the given products.
    pub fn by_ids(ids: impl IntoIterator<Item = ProductId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            ..Default::default()
        }
    }
}

/// Account service client.
#[async_trait]
pub trait AccountGateway: Send + Sync {
    /// Fetches an account. Fails with `NotFound` if it does not exist.
    async fn get_account(&self, id: AccountId) -> Result<Account, GatewayError>;
}

/// Catalog service client.
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    /// Fetches products. Ids that match nothing are simply absent from the result.
    async fn get_products(&self, query: &ProductQuery) -> Result<Vec<Product>, GatewayError>;
}

#[async_trait]
impl<T: AccountGateway + ?Sized> AccountGateway for Arc<T> {
    async fn get_account(&self, id: AccountId) -> Result<Account, GatewayError> {
        (**self).get_account(id).await
    }
}

#[async_trait]
impl<T: CatalogGateway + ?Sized> CatalogGateway for Arc<T> {
    async fn get_products(&self, query: &ProductQuery) -> Result<Vec<Product>, GatewayError> {
        (**self).get_products(query).await
    }
}
