use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use cortado_catalog::InventoryItem;
use cortado_core::StorageError;

use crate::changes::ChangeRecord;
use crate::models::{NewOrder, Order, OrderStatus, PricedItem};

/// One open transaction scope for fulfillment work. Every mutation made
/// through it commits or rolls back together; nothing is visible to
/// other transactions until `commit`.
#[async_trait]
pub trait FulfillmentTx: Send {
    /// Current stock of one ingredient, observing uncommitted
    /// deductions made earlier in this transaction.
    async fn inventory_item(
        &mut self,
        ingredient_id: Uuid,
    ) -> Result<Option<InventoryItem>, StorageError>;

    /// Deduct `amount` from the ingredient's stock and return the
    /// remaining quantity.
    async fn deduct_stock(&mut self, ingredient_id: Uuid, amount: f64)
        -> Result<f64, StorageError>;

    /// Persist an order with its priced items and an initial
    /// status-history row; returns the created order.
    async fn insert_order(
        &mut self,
        order: &NewOrder,
        status: OrderStatus,
        total_cents: i64,
        items: &[PricedItem],
    ) -> Result<Order, StorageError>;

    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}

/// Opens fulfillment transaction scopes. The scope is the unit of
/// isolation: one order in the single-order path, the whole batch in
/// the batch path.
#[async_trait]
pub trait FulfillmentStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn FulfillmentTx>, StorageError>;
}

/// Persistence capability for orders outside the fulfillment path.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn order(&self, id: Uuid) -> Result<Option<Order>, StorageError>;

    async fn list_orders(&self) -> Result<Vec<Order>, StorageError>;

    /// Field update plus item upsert/delete; records a status-history
    /// row when the status differs from the stored one. Items with
    /// quantity 0 are removed; new items snapshot the current menu
    /// price.
    async fn update_order(&self, order: &Order) -> Result<(), StorageError>;

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<(), StorageError>;

    /// Removes the order, cascading item and status-history rows.
    /// Returns false when no such order existed.
    async fn delete_order(&self, id: Uuid) -> Result<bool, StorageError>;

    /// Menu item name → total ordered quantity over orders created
    /// within the inclusive date bounds; an absent bound is
    /// unconstrained.
    async fn ordered_items_count(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<BTreeMap<String, i64>, StorageError>;
}

/// Append-only audit log of field-level order mutations. A failed
/// append aborts the enclosing update.
#[async_trait]
pub trait ChangeHistoryRecorder: Send + Sync {
    async fn append(&self, order_id: Uuid, records: &[ChangeRecord]) -> Result<(), StorageError>;
}
