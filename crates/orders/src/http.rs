//! HTTP clients for the account and catalog services.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{AccountId, Money, ProductId};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::{Account, AccountGateway, CatalogGateway, GatewayError, Product, ProductQuery};

fn build_client(timeout: Duration) -> Result<Arc<Client>, GatewayError> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GatewayError::Unavailable(format!("failed to build HTTP client: {e}")))?;
    Ok(Arc::new(client))
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout(timeout)
    } else {
        GatewayError::Unavailable(e.to_string())
    }
}

async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    params: &[(&str, String)],
    timeout: Duration,
) -> Result<T, GatewayError> {
    tracing::trace!(%url, "sending request");
    let mut request = client.get(url);
    if !params.is_empty() {
        request = request.query(params);
    }

    let response = request
        .send()
        .await
        .map_err(|e| transport_error(e, timeout))?;

    match response.status() {
        status if status.is_success() => response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string())),
        StatusCode::NOT_FOUND => Err(GatewayError::NotFound),
        status => {
            let body = response.text().await.unwrap_or_default();
            Err(GatewayError::Unavailable(format!("{status}: {body}")))
        }
    }
}

#[derive(Deserialize)]
struct AccountResponse {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
}

/// Account service client speaking JSON over HTTP.
///
/// `GET {base_url}/accounts/{id}`; a 404 means the account does not exist.
#[derive(Clone)]
pub struct HttpAccountGateway {
    base_url: String,
    client: Arc<Client>,
    timeout: Duration,
}

impl HttpAccountGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(timeout)?,
            timeout,
        })
    }
}

#[async_trait]
impl AccountGateway for HttpAccountGateway {
    async fn get_account(&self, id: AccountId) -> Result<Account, GatewayError> {
        let url = format!("{}/accounts/{}", self.base_url, id.value());
        let body: AccountResponse = get_json(&self.client, &url, &[], self.timeout).await?;
        Ok(Account {
            id: AccountId::new(body.id),
            name: body.name,
            email: body.email,
        })
    }
}

#[derive(Deserialize)]
struct ProductResponse {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    price: f64,
}

/// Catalog service client speaking JSON over HTTP.
///
/// `GET {base_url}/products?ids=a,b&skip=&take=&query=` answering with an
/// array of products priced in currency units. Prices are converted to cents
/// here.
#[derive(Clone)]
pub struct HttpCatalogGateway {
    base_url: String,
    client: Arc<Client>,
    timeout: Duration,
}

impl HttpCatalogGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(timeout)?,
            timeout,
        })
    }
}

#[async_trait]
impl CatalogGateway for HttpCatalogGateway {
    async fn get_products(&self, query: &ProductQuery) -> Result<Vec<Product>, GatewayError> {
        let url = format!("{}/products", self.base_url);

        let mut params = Vec::with_capacity(4);
        if !query.ids.is_empty() {
            let ids = query
                .ids
                .iter()
                .map(ProductId::as_str)
                .collect::<Vec<_>>()
                .join(",");
            params.push(("ids", ids));
        }
        if query.skip > 0 {
            params.push(("skip", query.skip.to_string()));
        }
        if query.take > 0 {
            params.push(("take", query.take.to_string()));
        }
        if !query.query.is_empty() {
            params.push(("query", query.query.clone()));
        }

        let body: Vec<ProductResponse> = get_json(&self.client, &url, &params, self.timeout).await?;
        body.into_iter()
            .map(|p| {
                if !p.price.is_finite() || p.price < 0.0 {
                    return Err(GatewayError::InvalidResponse(format!(
                        "product {} has invalid price {}",
                        p.id, p.price
                    )));
                }
                Ok(Product {
                    id: ProductId::new(p.id),
                    name: p.name,
                    description: p.description,
                    price: Money::from_decimal(p.price),
                })
            })
            .collect()
    }
}
