//! In-memory account and catalog services for development and testing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{AccountId, Money, ProductId};
use tokio::sync::RwLock;

use crate::{Account, AccountGateway, CatalogGateway, GatewayError, Product, ProductQuery};

#[derive(Debug, Default)]
struct AccountState {
    accounts: HashMap<AccountId, Account>,
    fail_with: Option<String>,
    delay: Option<Duration>,
    calls: usize,
}

/// Account service backed by a map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountGateway {
    state: Arc<RwLock<AccountState>>,
}

impl InMemoryAccountGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account.
    pub async fn insert(&self, account: Account) {
        self.state.write().await.accounts.insert(account.id, account);
    }

    /// Registers an account with a generated name and email.
    pub async fn with_account(self, id: u64) -> Self {
        self.insert(Account {
            id: AccountId::new(id),
            name: format!("account-{id}"),
            email: format!("account-{id}@example.com"),
        })
        .await;
        self
    }

    /// Makes every following call fail as unavailable.
    pub async fn set_unavailable(&self, reason: Option<&str>) {
        self.state.write().await.fail_with = reason.map(str::to_string);
    }

    /// Configures a delay applied before each call answers.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().await.delay = delay;
    }

    /// Number of `get_account` calls received.
    pub async fn call_count(&self) -> usize {
        self.state.read().await.calls
    }
}

#[async_trait]
impl AccountGateway for InMemoryAccountGateway {
    async fn get_account(&self, id: AccountId) -> Result<Account, GatewayError> {
        let delay = {
            let mut state = self.state.write().await;
            state.calls += 1;
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.read().await;
        if let Some(reason) = &state.fail_with {
            return Err(GatewayError::Unavailable(reason.clone()));
        }
        state
            .accounts
            .get(&id)
            .cloned()
            .ok_or(GatewayError::NotFound)
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    products: HashMap<ProductId, Product>,
    queries: Vec<ProductQuery>,
    fail_with: Option<String>,
    delay: Option<Duration>,
}

/// Catalog service backed by a map. Records every query it receives.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogGateway {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalogGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub async fn insert(&self, product: Product) {
        self.state
            .write()
            .await
            .products
            .insert(product.id.clone(), product);
    }

    /// Adds a product with a generated name.
    pub async fn with_product(self, id: &str, price: Money) -> Self {
        self.insert(Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: format!("Description of {id}"),
            price,
        })
        .await;
        self
    }

    /// Changes the current price of a known product. Returns false if unknown.
    pub async fn set_price(&self, id: &ProductId, price: Money) -> bool {
        match self.state.write().await.products.get_mut(id) {
            Some(product) => {
                product.price = price;
                true
            }
            None => false,
        }
    }

    /// Removes a product from the catalog.
    pub async fn remove(&self, id: &ProductId) {
        self.state.write().await.products.remove(id);
    }

    pub async fn set_unavailable(&self, reason: Option<&str>) {
        self.state.write().await.fail_with = reason.map(str::to_string);
    }

    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().await.delay = delay;
    }

    /// Queries received so far, in arrival order.
    pub async fn queries(&self) -> Vec<ProductQuery> {
        self.state.read().await.queries.clone()
    }

    /// Number of `get_products` calls received.
    pub async fn call_count(&self) -> usize {
        self.state.read().await.queries.len()
    }
}

#[async_trait]
impl CatalogGateway for InMemoryCatalogGateway {
    async fn get_products(&self, query: &ProductQuery) -> Result<Vec<Product>, GatewayError> {
        let delay = {
            let mut state = self.state.write().await;
            state.queries.push(query.clone());
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.read().await;
        if let Some(reason) = &state.fail_with {
            return Err(GatewayError::Unavailable(reason.clone()));
        }

        let needle = query.query.to_lowercase();
        let matches = |p: &Product| {
            needle.is_empty()
                || p.name.to_lowercase().contains(&needle)
                || p.description.to_lowercase().contains(&needle)
        };

        let mut products: Vec<Product> = if query.ids.is_empty() {
            let mut all: Vec<Product> = state.products.values().filter(|p| matches(p)).cloned().collect();
            all.sort_by(|a, b| a.id.cmp(&b.id));
            all
        } else {
            query
                .ids
                .iter()
                .filter_map(|id| state.products.get(id))
                .filter(|p| matches(p))
                .cloned()
                .collect()
        };

        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        products = products.into_iter().skip(skip).collect();
        if query.take > 0 {
            products.truncate(usize::try_from(query.take).unwrap_or(usize::MAX));
        }
        Ok(products)
    }
}
