use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use cortado_catalog::{InventoryItem, InventoryReader, MenuCatalog, MenuItem};
use cortado_core::StorageError;

use crate::changes::ChangeRecord;
use crate::models::{NewOrder, Order, OrderItem, OrderStatus, PricedItem};
use crate::store::{ChangeHistoryRecorder, FulfillmentStore, FulfillmentTx, OrderStore};

#[derive(Debug, Clone)]
struct StatusHistoryRow {
    order_id: Uuid,
    status: OrderStatus,
    #[allow(dead_code)]
    changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    menu: HashMap<Uuid, MenuItem>,
    inventory: BTreeMap<Uuid, InventoryItem>,
    orders: HashMap<Uuid, Order>,
    priced_items: HashMap<Uuid, Vec<PricedItem>>,
    status_history: Vec<StatusHistoryRow>,
    change_history: Vec<(Uuid, ChangeRecord)>,
}

/// In-memory implementation of every store capability, used by tests
/// and local development. Transactions work on a staged copy of the
/// state that replaces the shared state wholesale on commit: rollback
/// and isolation hold for one open transaction at a time, but a commit
/// overwrites anything another task committed after `begin`. Callers
/// that need concurrent writers use the Postgres store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_menu_item(&self, item: MenuItem) {
        self.state.lock().await.menu.insert(item.id, item);
    }

    pub async fn put_inventory_item(&self, item: InventoryItem) {
        self.state.lock().await.inventory.insert(item.id, item);
    }

    /// Committed stock level of one ingredient.
    pub async fn stock_level(&self, ingredient_id: Uuid) -> Option<f64> {
        self.state
            .lock()
            .await
            .inventory
            .get(&ingredient_id)
            .map(|i| i.quantity)
    }

    pub async fn change_history(&self, order_id: Uuid) -> Vec<ChangeRecord> {
        self.state
            .lock()
            .await
            .change_history
            .iter()
            .filter(|(id, _)| *id == order_id)
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub async fn status_history(&self, order_id: Uuid) -> Vec<OrderStatus> {
        self.state
            .lock()
            .await
            .status_history
            .iter()
            .filter(|row| row.order_id == order_id)
            .map(|row| row.status)
            .collect()
    }
}

struct MemoryTx {
    state: Arc<Mutex<MemoryState>>,
    staged: MemoryState,
}

#[async_trait]
impl FulfillmentTx for MemoryTx {
    async fn inventory_item(
        &mut self,
        ingredient_id: Uuid,
    ) -> Result<Option<InventoryItem>, StorageError> {
        Ok(self.staged.inventory.get(&ingredient_id).cloned())
    }

    async fn deduct_stock(
        &mut self,
        ingredient_id: Uuid,
        amount: f64,
    ) -> Result<f64, StorageError> {
        let item = self
            .staged
            .inventory
            .get_mut(&ingredient_id)
            .ok_or_else(|| StorageError::database(format!("ingredient not found: {ingredient_id}")))?;
        if item.quantity < amount {
            return Err(StorageError::database(format!(
                "stock for {} would go negative",
                item.name
            )));
        }
        item.quantity -= amount;
        Ok(item.quantity)
    }

    async fn insert_order(
        &mut self,
        order: &NewOrder,
        status: OrderStatus,
        total_cents: i64,
        items: &[PricedItem],
    ) -> Result<Order, StorageError> {
        let now = Utc::now();
        let created = Order {
            id: Uuid::new_v4(),
            customer_name: order.customer_name.clone(),
            items: items
                .iter()
                .map(|p| OrderItem { menu_item_id: p.menu_item_id, quantity: p.quantity })
                .collect(),
            special_instructions: order.special_instructions.clone(),
            status,
            total_amount_cents: total_cents,
            created_at: now,
            updated_at: now,
        };
        self.staged.orders.insert(created.id, created.clone());
        self.staged.priced_items.insert(created.id, items.to_vec());
        self.staged.status_history.push(StatusHistoryRow {
            order_id: created.id,
            status,
            changed_at: now,
        });
        Ok(created)
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        *self.state.lock().await = self.staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }
}

#[async_trait]
impl FulfillmentStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn FulfillmentTx>, StorageError> {
        let staged = self.state.lock().await.clone();
        Ok(Box::new(MemoryTx { state: Arc::clone(&self.state), staged }))
    }
}

#[async_trait]
impl MenuCatalog for MemoryStore {
    async fn menu_item(&self, id: Uuid) -> Result<Option<MenuItem>, StorageError> {
        Ok(self.state.lock().await.menu.get(&id).cloned())
    }
}

#[async_trait]
impl InventoryReader for MemoryStore {
    async fn inventory_item(&self, id: Uuid) -> Result<Option<InventoryItem>, StorageError> {
        Ok(self.state.lock().await.inventory.get(&id).cloned())
    }

    async fn list_inventory(&self) -> Result<Vec<InventoryItem>, StorageError> {
        Ok(self.state.lock().await.inventory.values().cloned().collect())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn order(&self, id: Uuid) -> Result<Option<Order>, StorageError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StorageError> {
        let mut orders: Vec<Order> = self.state.lock().await.orders.values().cloned().collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn update_order(&self, order: &Order) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        let stored = state
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| StorageError::database(format!("order not found: {}", order.id)))?;

        let status_changed = stored.status != order.status;
        stored.customer_name = order.customer_name.clone();
        stored.items = order.items.iter().filter(|i| i.quantity > 0).copied().collect();
        stored.special_instructions = order.special_instructions.clone();
        stored.status = order.status;
        stored.updated_at = Utc::now();

        if status_changed {
            state.status_history.push(StatusHistoryRow {
                order_id: order.id,
                status: order.status,
                changed_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        let stored = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| StorageError::database(format!("order not found: {id}")))?;
        stored.status = status;
        stored.updated_at = Utc::now();
        state.status_history.push(StatusHistoryRow {
            order_id: id,
            status,
            changed_at: Utc::now(),
        });
        Ok(())
    }

    async fn delete_order(&self, id: Uuid) -> Result<bool, StorageError> {
        let mut state = self.state.lock().await;
        if state.orders.remove(&id).is_none() {
            return Ok(false);
        }
        state.priced_items.remove(&id);
        state.status_history.retain(|row| row.order_id != id);
        Ok(true)
    }

    async fn ordered_items_count(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<BTreeMap<String, i64>, StorageError> {
        let state = self.state.lock().await;
        let mut counts = BTreeMap::new();
        for order in state.orders.values() {
            let day = order.created_at.date_naive();
            if start.is_some_and(|s| day < s) || end.is_some_and(|e| day > e) {
                continue;
            }
            for item in &order.items {
                let name = state
                    .menu
                    .get(&item.menu_item_id)
                    .map(|m| m.name.clone())
                    .unwrap_or_else(|| item.menu_item_id.to_string());
                *counts.entry(name).or_insert(0) += i64::from(item.quantity);
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl ChangeHistoryRecorder for MemoryStore {
    async fn append(&self, order_id: Uuid, records: &[ChangeRecord]) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        for record in records {
            state.change_history.push((order_id, record.clone()));
        }
        Ok(())
    }
}
