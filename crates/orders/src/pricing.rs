//! Matching requested items against catalog products.

use std::collections::HashMap;
use std::str::FromStr;

use common::{Money, ProductId};
use order_store::{LineItem, MAX_QUANTITY, ProductDetails};
use serde::{Deserialize, Serialize};

use crate::{OrderError, Product, Result};

/// What to do with requested products the catalog does not return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Reject the whole order, naming the unmatched products.
    Strict,
    /// Drop unmatched items and create the order from the rest.
    #[default]
    Lenient,
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(MatchPolicy::Strict),
            "lenient" => Ok(MatchPolicy::Lenient),
            other => Err(format!("unknown match policy: {other}")),
        }
    }
}

/// A product and quantity as the buyer requested them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl RequestedItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Line items priced from one catalog snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedItems {
    pub line_items: Vec<LineItem>,
    /// Sum of price times quantity over `line_items`.
    pub total: Money,
    /// Requested products the catalog did not return.
    pub unmatched: Vec<ProductId>,
}

/// Validates requested items and merges repeated products.
///
/// Quantities of a product requested more than once are summed; the first
/// occurrence fixes its position. A merged quantity above [`MAX_QUANTITY`]
/// is rejected here, before any remote call is made.
pub fn merge_requested(items: &[RequestedItem]) -> Result<Vec<RequestedItem>> {
    if items.is_empty() {
        return Err(OrderError::Validation(
            "an order needs at least one product".to_string(),
        ));
    }

    let mut merged: Vec<RequestedItem> = Vec::with_capacity(items.len());
    let mut positions: HashMap<&ProductId, usize> = HashMap::with_capacity(items.len());

    for item in items {
        if item.product_id.is_empty() {
            return Err(OrderError::Validation(
                "product id must not be empty".to_string(),
            ));
        }
        if item.quantity == 0 {
            return Err(OrderError::Validation(format!(
                "quantity for product {} must be greater than 0",
                item.product_id
            )));
        }

        let quantity = match positions.get(&item.product_id) {
            Some(&pos) => {
                let existing = &mut merged[pos];
                existing.quantity = existing.quantity.saturating_add(item.quantity);
                existing.quantity
            }
            None => {
                positions.insert(&item.product_id, merged.len());
                merged.push(item.clone());
                item.quantity
            }
        };
        if quantity > MAX_QUANTITY {
            return Err(OrderError::Validation(format!(
                "quantity for product {} must not exceed {MAX_QUANTITY}",
                item.product_id
            )));
        }
    }

    Ok(merged)
}

/// Prices requested items from a catalog snapshot.
///
/// Prices are taken from `products` as they are now; the resulting total is
/// what the order keeps.
pub fn price_items(
    requested: &[RequestedItem],
    products: &[Product],
    policy: MatchPolicy,
) -> Result<PricedItems> {
    let by_id: HashMap<&ProductId, &Product> = products.iter().map(|p| (&p.id, p)).collect();

    let mut line_items = Vec::with_capacity(requested.len());
    let mut unmatched = Vec::new();
    let mut total = Money::zero();

    for item in requested {
        let Some(product) = by_id.get(&item.product_id) else {
            unmatched.push(item.product_id.clone());
            continue;
        };

        total = product
            .price
            .checked_multiply(item.quantity)
            .and_then(|subtotal| total.checked_add(subtotal))
            .ok_or_else(|| {
                OrderError::Validation(format!(
                    "order total overflows at product {}",
                    item.product_id
                ))
            })?;
        line_items.push(
            LineItem::new(item.product_id.clone(), item.quantity).with_product(ProductDetails {
                name: product.name.clone(),
                description: product.description.clone(),
                price: product.price,
            }),
        );
    }

    if !unmatched.is_empty() {
        match policy {
            MatchPolicy::Strict => return Err(OrderError::ProductNotFound(unmatched)),
            MatchPolicy::Lenient => {
                tracing::warn!(
                    dropped = ?unmatched,
                    "dropping requested products missing from the catalog"
                );
            }
        }
    }

    Ok(PricedItems {
        line_items,
        total,
        unmatched,
    })
}
