use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Order, OrderItem, UpdateOrder};

/// One audit entry capturing a single field's old and new value on an
/// order update. Never mutated or deleted once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub old_value: String,
    pub new_value: String,
}

/// Diff an incoming update against the stored order: one record per
/// changed field, stamped with the write time and an event type
/// derived from the order id.
pub fn collect_changes(
    order_id: Uuid,
    existing: &Order,
    incoming: &UpdateOrder,
    at: DateTime<Utc>,
) -> Vec<ChangeRecord> {
    let event_type = format!("{order_id}_changed");
    let mut records = Vec::new();

    if existing.customer_name != incoming.customer_name {
        records.push(ChangeRecord {
            timestamp: at,
            event_type: event_type.clone(),
            old_value: existing.customer_name.clone(),
            new_value: incoming.customer_name.clone(),
        });
    }

    if !items_equal(&existing.items, &incoming.items) {
        records.push(ChangeRecord {
            timestamp: at,
            event_type,
            old_value: render_items(&existing.items),
            new_value: render_items(&incoming.items),
        });
    }

    records
}

/// Item lists are compared as ordered (menu item, quantity) pairs.
fn items_equal(old: &[OrderItem], new: &[OrderItem]) -> bool {
    old.len() == new.len()
        && old
            .iter()
            .zip(new)
            .all(|(a, b)| a.menu_item_id == b.menu_item_id && a.quantity == b.quantity)
}

fn render_items(items: &[OrderItem]) -> String {
    serde_json::to_string(items).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderStatus;

    fn stored_order(items: Vec<OrderItem>) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            customer_name: "Ada".to_string(),
            items,
            special_instructions: vec![],
            status: OrderStatus::Pending,
            total_amount_cents: 700,
            created_at: now,
            updated_at: now,
        }
    }

    fn update_from(order: &Order) -> UpdateOrder {
        UpdateOrder {
            customer_name: order.customer_name.clone(),
            items: order.items.clone(),
            special_instructions: order.special_instructions.clone(),
            status: None,
        }
    }

    #[test]
    fn unchanged_order_yields_no_records() {
        let order = stored_order(vec![OrderItem { menu_item_id: Uuid::new_v4(), quantity: 2 }]);
        let update = update_from(&order);
        assert!(collect_changes(order.id, &order, &update, Utc::now()).is_empty());
    }

    #[test]
    fn renamed_customer_yields_one_record_tagged_with_order_id() {
        let order = stored_order(vec![]);
        let mut update = update_from(&order);
        update.customer_name = "Grace".to_string();

        let records = collect_changes(order.id, &order, &update, Utc::now());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, format!("{}_changed", order.id));
        assert_eq!(records[0].old_value, "Ada");
        assert_eq!(records[0].new_value, "Grace");
    }

    #[test]
    fn quantity_change_yields_item_record() {
        let id = Uuid::new_v4();
        let order = stored_order(vec![OrderItem { menu_item_id: id, quantity: 2 }]);
        let mut update = update_from(&order);
        update.items[0].quantity = 3;

        let records = collect_changes(order.id, &order, &update, Utc::now());
        assert_eq!(records.len(), 1);
        assert!(records[0].old_value.contains("2"));
        assert!(records[0].new_value.contains("3"));
    }

    #[test]
    fn reordered_items_count_as_a_change() {
        let a = OrderItem { menu_item_id: Uuid::new_v4(), quantity: 1 };
        let b = OrderItem { menu_item_id: Uuid::new_v4(), quantity: 1 };
        let order = stored_order(vec![a, b]);
        let mut update = update_from(&order);
        update.items.reverse();

        assert_eq!(collect_changes(order.id, &order, &update, Utc::now()).len(), 1);
    }
}
