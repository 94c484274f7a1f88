use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cortado_catalog::InventoryReservation;
use cortado_core::EngineError;

/// Order lifecycle. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Completed,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "accepted" => Some(OrderStatus::Accepted),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            "rejected" => Some(OrderStatus::Rejected),
            _ => None,
        }
    }
}

/// One line of an order: a menu item and how many units of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub menu_item_id: Uuid,
    pub quantity: u32,
}

/// A persisted customer order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_name: String,
    pub items: Vec<OrderItem>,
    pub special_instructions: Vec<String>,
    pub status: OrderStatus,
    /// Σ(item quantity × menu price at processing time), in cents.
    /// Snapshotted when the order is accepted, never recomputed.
    pub total_amount_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A proposed order before it has an id or a total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_name: String,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub special_instructions: Vec<String>,
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.customer_name.trim().is_empty() {
            return Err(EngineError::Validation("customer name is empty".into()));
        }
        if self.items.is_empty() {
            return Err(EngineError::Validation("order has no items".into()));
        }
        for item in &self.items {
            if item.quantity == 0 {
                return Err(EngineError::Validation(format!(
                    "item {} has zero quantity",
                    item.menu_item_id
                )));
            }
        }
        Ok(())
    }
}

/// Update payload for an existing order. An item with quantity 0
/// removes that line; an absent status keeps the stored one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrder {
    pub customer_name: String,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub special_instructions: Vec<String>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

/// An order item with its price snapshot, ready for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedItem {
    pub menu_item_id: Uuid,
    pub quantity: u32,
    pub price_at_order_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InsufficientInventory,
}

/// Per-order outcome of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OrderOutcome {
    Accepted {
        order_id: Uuid,
        customer_name: String,
        total_cents: i64,
    },
    Rejected {
        customer_name: String,
        reason: RejectReason,
    },
}

/// Result of processing a batch of orders.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total_orders: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub total_revenue_cents: i64,
    pub outcomes: Vec<OrderOutcome>,
    /// Stock consumption aggregated by ingredient across all accepted
    /// orders; `remaining` is the level after the last deduction.
    pub inventory_updates: Vec<InventoryReservation>,
}
