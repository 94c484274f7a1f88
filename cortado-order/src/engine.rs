use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use cortado_catalog::{InventoryReservation, MenuCatalog};
use cortado_core::{EngineError, EngineResult};

use crate::changes::collect_changes;
use crate::models::{
    BatchSummary, NewOrder, Order, OrderOutcome, OrderStatus, RejectReason, UpdateOrder,
};
use crate::reservation::check_and_reserve;
use crate::store::{ChangeHistoryRecorder, FulfillmentStore, OrderStore};

/// Orchestrates catalog, inventory, and order persistence to process
/// submitted orders. All collaborators are injected capabilities so
/// the engine runs against the Postgres store and the in-memory store
/// alike.
pub struct FulfillmentEngine {
    catalog: Arc<dyn MenuCatalog>,
    store: Arc<dyn FulfillmentStore>,
    orders: Arc<dyn OrderStore>,
    history: Arc<dyn ChangeHistoryRecorder>,
}

impl FulfillmentEngine {
    pub fn new(
        catalog: Arc<dyn MenuCatalog>,
        store: Arc<dyn FulfillmentStore>,
        orders: Arc<dyn OrderStore>,
        history: Arc<dyn ChangeHistoryRecorder>,
    ) -> Self {
        Self {
            catalog,
            store,
            orders,
            history,
        }
    }

    /// Process a single submitted order: reserve its ingredient demand
    /// and persist it as `pending`, all in one transaction. Shortage
    /// and unknown references surface to the caller; nothing is
    /// deducted on failure.
    pub async fn submit_order(&self, order: NewOrder) -> EngineResult<Order> {
        order.validate()?;

        let mut tx = self.store.begin().await?;
        let outcome = match check_and_reserve(tx.as_mut(), self.catalog.as_ref(), &order.items).await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                let _ = tx.rollback().await;
                return Err(err);
            }
        };

        let created = match tx
            .insert_order(&order, OrderStatus::Pending, outcome.total_cents, &outcome.priced_items)
            .await
        {
            Ok(created) => created,
            Err(err) => {
                let _ = tx.rollback().await;
                return Err(err.into());
            }
        };
        tx.commit().await?;

        info!(order_id = %created.id, total_cents = created.total_amount_cents, "order created");
        Ok(created)
    }

    /// Process a batch of orders in one transaction, strictly in
    /// submission order so earlier orders claim scarce stock first.
    /// Shortage rejects the one order and processing continues; any
    /// storage fault rolls back the entire batch.
    pub async fn process_batch(&self, orders: Vec<NewOrder>) -> EngineResult<BatchSummary> {
        for order in &orders {
            order.validate()?;
        }

        let total_orders = orders.len();
        let mut outcomes = Vec::with_capacity(total_orders);
        let mut accepted = 0usize;
        let mut rejected = 0usize;
        let mut total_revenue_cents = 0i64;
        let mut updates: BTreeMap<Uuid, InventoryReservation> = BTreeMap::new();

        let mut tx = self.store.begin().await?;
        for order in &orders {
            let reservation =
                match check_and_reserve(tx.as_mut(), self.catalog.as_ref(), &order.items).await {
                    Ok(reservation) => reservation,
                    Err(EngineError::InsufficientStock(ingredient)) => {
                        warn!(customer = %order.customer_name, %ingredient, "order rejected");
                        rejected += 1;
                        outcomes.push(OrderOutcome::Rejected {
                            customer_name: order.customer_name.clone(),
                            reason: RejectReason::InsufficientInventory,
                        });
                        continue;
                    }
                    Err(err) => {
                        let _ = tx.rollback().await;
                        return Err(err);
                    }
                };

            let created = match tx
                .insert_order(
                    order,
                    OrderStatus::Accepted,
                    reservation.total_cents,
                    &reservation.priced_items,
                )
                .await
            {
                Ok(created) => created,
                Err(err) => {
                    let _ = tx.rollback().await;
                    return Err(err.into());
                }
            };

            accepted += 1;
            total_revenue_cents += reservation.total_cents;
            for r in reservation.reservations {
                updates
                    .entry(r.ingredient_id)
                    .and_modify(|u| {
                        u.quantity_used += r.quantity_used;
                        u.remaining = r.remaining;
                    })
                    .or_insert(r);
            }
            outcomes.push(OrderOutcome::Accepted {
                order_id: created.id,
                customer_name: order.customer_name.clone(),
                total_cents: reservation.total_cents,
            });
        }
        tx.commit().await?;

        info!(total_orders, accepted, rejected, total_revenue_cents, "batch processed");
        Ok(BatchSummary {
            total_orders,
            accepted,
            rejected,
            total_revenue_cents,
            outcomes,
            inventory_updates: updates.into_values().collect(),
        })
    }

    /// Update an existing order's fields, recording one change record
    /// per differing field before the mutation. Completed orders are
    /// terminal and never touched.
    pub async fn update_order(&self, id: Uuid, update: UpdateOrder) -> EngineResult<()> {
        let existing = self
            .orders
            .order(id)
            .await?
            .ok_or_else(|| EngineError::Reference(format!("order not found: {id}")))?;
        if existing.status == OrderStatus::Completed {
            return Err(EngineError::Conflict("cannot update a completed order".into()));
        }

        let records = collect_changes(id, &existing, &update, Utc::now());
        if !records.is_empty() {
            self.history.append(id, &records).await?;
        }

        let mut updated = existing;
        updated.customer_name = update.customer_name;
        updated.items = update.items;
        updated.special_instructions = update.special_instructions;
        if let Some(status) = update.status {
            updated.status = status;
        }
        self.orders.update_order(&updated).await?;

        info!(order_id = %id, changed_fields = records.len(), "order updated");
        Ok(())
    }

    /// Close an order as `completed`. No inventory effect: stock was
    /// already deducted when the order was accepted.
    pub async fn close_order(&self, id: Uuid) -> EngineResult<()> {
        let existing = self
            .orders
            .order(id)
            .await?
            .ok_or_else(|| EngineError::Reference(format!("order not found: {id}")))?;
        if existing.status == OrderStatus::Completed {
            return Err(EngineError::Conflict("order is already completed".into()));
        }

        self.orders.set_status(id, OrderStatus::Completed).await?;
        info!(order_id = %id, "order completed");
        Ok(())
    }

    /// Ordered quantity per menu item name over orders created within
    /// the inclusive bounds.
    pub async fn ordered_items_count(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> EngineResult<BTreeMap<String, i64>> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(EngineError::InvalidRange { start, end });
            }
        }
        Ok(self.orders.ordered_items_count(start, end).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::OrderItem;
    use cortado_catalog::{IngredientRequirement, InventoryItem, MenuItem};

    struct Fixture {
        engine: FulfillmentEngine,
        store: MemoryStore,
        latte: Uuid,
        milk: Uuid,
    }

    /// Latte at 450c needs 6.0 of milk per unit; 10.0 milk in stock.
    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let milk = Uuid::new_v4();
        store
            .put_inventory_item(InventoryItem {
                id: milk,
                name: "milk".to_string(),
                quantity: 10.0,
                unit: "dl".to_string(),
                price_cents: 30,
            })
            .await;
        let latte = Uuid::new_v4();
        store
            .put_menu_item(MenuItem {
                id: latte,
                name: "latte".to_string(),
                description: Some("flat and white".to_string()),
                price_cents: 450,
                categories: vec!["coffee".to_string()],
                allergens: vec!["lactose".to_string()],
                ingredients: vec![IngredientRequirement {
                    ingredient_id: milk,
                    quantity_per_unit: 6.0,
                }],
                created_at: Utc::now(),
            })
            .await;

        let shared = Arc::new(store.clone());
        let engine = FulfillmentEngine::new(shared.clone(), shared.clone(), shared.clone(), shared);
        Fixture { engine, store, latte, milk }
    }

    fn one_latte(customer: &str, quantity: u32, latte: Uuid) -> NewOrder {
        NewOrder {
            customer_name: customer.to_string(),
            items: vec![OrderItem { menu_item_id: latte, quantity }],
            special_instructions: vec![],
        }
    }

    #[tokio::test]
    async fn submitted_order_snapshots_total_and_deducts_stock() {
        let fx = fixture().await;

        let order = fx.engine.submit_order(one_latte("Ada", 1, fx.latte)).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount_cents, 450);
        assert_eq!(fx.store.stock_level(fx.milk).await, Some(4.0));
    }

    #[tokio::test]
    async fn rejected_submission_leaves_stock_untouched() {
        let fx = fixture().await;

        let err = fx.engine.submit_order(one_latte("Ada", 2, fx.latte)).await.unwrap_err();

        assert!(matches!(err, EngineError::InsufficientStock(ref n) if n == "milk"));
        assert_eq!(fx.store.stock_level(fx.milk).await, Some(10.0));
        assert!(fx.store.list_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_gives_priority_to_earlier_orders() {
        let fx = fixture().await;

        // Two orders of one latte each need 6.0 milk apiece; only the
        // first fits into the 10.0 in stock.
        let summary = fx
            .engine
            .process_batch(vec![one_latte("Ada", 1, fx.latte), one_latte("Grace", 1, fx.latte)])
            .await
            .unwrap();

        assert_eq!(summary.total_orders, 2);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.total_revenue_cents, 450);
        assert!(matches!(
            summary.outcomes[0],
            OrderOutcome::Accepted { total_cents: 450, .. }
        ));
        assert!(matches!(
            summary.outcomes[1],
            OrderOutcome::Rejected { reason: RejectReason::InsufficientInventory, .. }
        ));
        assert_eq!(summary.inventory_updates.len(), 1);
        assert_eq!(summary.inventory_updates[0].quantity_used, 6.0);
        assert_eq!(summary.inventory_updates[0].remaining, 4.0);
        assert_eq!(fx.store.stock_level(fx.milk).await, Some(4.0));
    }

    #[tokio::test]
    async fn reordering_a_scarce_batch_flips_the_winner() {
        let fx = fixture().await;

        let summary = fx
            .engine
            .process_batch(vec![one_latte("Grace", 1, fx.latte), one_latte("Ada", 1, fx.latte)])
            .await
            .unwrap();

        match &summary.outcomes[0] {
            OrderOutcome::Accepted { customer_name, .. } => assert_eq!(customer_name, "Grace"),
            other => panic!("expected first order accepted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_records_history_and_completed_orders_are_terminal() {
        let fx = fixture().await;
        let order = fx.engine.submit_order(one_latte("Ada", 1, fx.latte)).await.unwrap();

        let update = UpdateOrder {
            customer_name: "Ada L.".to_string(),
            items: order.items.clone(),
            special_instructions: vec![],
            status: None,
        };
        fx.engine.update_order(order.id, update.clone()).await.unwrap();

        let history = fx.store.change_history(order.id).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].event_type, format!("{}_changed", order.id));

        fx.engine.close_order(order.id).await.unwrap();
        let err = fx.engine.update_order(order.id, update).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));

        // Terminal: the rejected update left order and history alone.
        let stored = fx.store.order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Completed);
        assert_eq!(stored.customer_name, "Ada L.");
        assert_eq!(fx.store.change_history(order.id).await.len(), 1);
    }

    #[tokio::test]
    async fn closing_twice_conflicts_and_unknown_orders_are_references() {
        let fx = fixture().await;
        let order = fx.engine.submit_order(one_latte("Ada", 1, fx.latte)).await.unwrap();

        fx.engine.close_order(order.id).await.unwrap();
        assert!(matches!(
            fx.engine.close_order(order.id).await.unwrap_err(),
            EngineError::Conflict(_)
        ));
        assert!(matches!(
            fx.engine.close_order(Uuid::new_v4()).await.unwrap_err(),
            EngineError::Reference(_)
        ));
    }

    #[tokio::test]
    async fn reversed_report_range_is_invalid() {
        let fx = fixture().await;

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let err = fx.engine.ordered_items_count(Some(start), Some(end)).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidRange { .. }));
    }

    #[tokio::test]
    async fn ordered_items_count_sums_quantities_by_menu_name() {
        let fx = fixture().await;
        fx.engine.submit_order(one_latte("Ada", 1, fx.latte)).await.unwrap();

        let counts = fx.engine.ordered_items_count(None, None).await.unwrap();
        assert_eq!(counts.get("latte"), Some(&1));
    }
}
