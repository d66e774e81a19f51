//! Order store.
//!
//! Owns the `orders` and `order_products` tables. An order header and all of
//! its line items are written in one transaction; reads group the joined rows
//! back into one [`Order`] per order id.

pub mod error;
pub mod grouping;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{AccountId, Money, OrderId, PaymentStatus, ProductId};
pub use error::{Result, StoreError};
pub use grouping::{OrderAccumulator, OrderRow};
pub use memory::InMemoryOrderStore;
pub use model::{LineItem, NewOrder, Order, ProductDetails};
pub use postgres::PostgresOrderStore;
pub use store::{MAX_QUANTITY, OrderStore, validate_line_items};
