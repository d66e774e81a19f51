//! Event payloads as they appear on the broker.

use common::{AccountId, ProductId};
use serde::{Deserialize, Serialize};

/// Broker topics this system produces to.
pub mod topics {
    /// Buyer interactions with products: purchases, views and listings.
    pub const INTERACTION_EVENTS: &str = "interaction_events";
    /// Catalog changes: product creation, update and deletion.
    pub const PRODUCT_EVENTS: &str = "product_events";
}

/// Envelope written to a topic: `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: serde_json::Value,
}

/// Kind of an interaction event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Purchase,
    View,
    List,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Purchase => "purchase",
            InteractionKind::View => "view",
            InteractionKind::List => "list",
        }
    }
}

/// Kind of a product event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductEventKind {
    Create,
    Update,
    Delete,
}

impl ProductEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductEventKind::Create => "create",
            ProductEventKind::Update => "update",
            ProductEventKind::Delete => "delete",
        }
    }
}

/// Payload of a product event. Fields a change does not touch are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductEventData {
    pub id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
}

impl Event {
    /// Creates an event from a type name and an already-built payload.
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }

    /// Creates an interaction event for `interaction_events`.
    pub fn interaction(kind: InteractionKind, account_id: AccountId, product_id: &ProductId) -> Self {
        Self::new(
            kind.as_str(),
            serde_json::json!({
                "user_id": account_id.value(),
                "product_id": product_id.as_str(),
            }),
        )
    }

    /// Creates a purchase event for one line item.
    pub fn purchase(account_id: AccountId, product_id: &ProductId) -> Self {
        Self::interaction(InteractionKind::Purchase, account_id, product_id)
    }

    /// Creates a product event for `product_events`.
    pub fn product(kind: ProductEventKind, data: &ProductEventData) -> Result<Self, serde_json::Error> {
        Ok(Self::new(kind.as_str(), serde_json::to_value(data)?))
    }

    /// Serializes the envelope for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchase_event_wire_format() {
        let event = Event::purchase(AccountId::new(42), &ProductId::new("prod-A"));
        let json: serde_json::Value = serde_json::from_slice(&event.to_bytes().unwrap()).unwrap();

        assert_eq!(json["type"], "purchase");
        assert_eq!(json["data"]["user_id"], 42);
        assert_eq!(json["data"]["product_id"], "prod-A");
    }

    #[test]
    fn product_event_omits_untouched_fields() {
        let data = ProductEventData {
            id: ProductId::new("prod-B"),
            price: Some(5.0),
            ..Default::default()
        };
        let event = Event::product(ProductEventKind::Update, &data).unwrap();

        assert_eq!(event.event_type, "update");
        assert_eq!(event.data["id"], "prod-B");
        assert_eq!(event.data["price"], 5.0);
        assert!(event.data.get("name").is_none());
    }

    #[test]
    fn view_and_list_kinds() {
        let product = ProductId::new("p");
        let view = Event::interaction(InteractionKind::View, AccountId::new(1), &product);
        let list = Event::interaction(InteractionKind::List, AccountId::new(1), &product);
        assert_eq!(view.event_type, "view");
        assert_eq!(list.event_type, "list");
    }
}
