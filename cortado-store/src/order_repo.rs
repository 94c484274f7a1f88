use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use cortado_catalog::InventoryItem;
use cortado_core::StorageError;
use cortado_order::{
    FulfillmentStore, FulfillmentTx, NewOrder, Order, OrderItem, OrderStatus, OrderStore,
    PricedItem,
};

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, StorageError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT menu_item_id, quantity FROM order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::database)?;
        Ok(rows.into_iter().map(OrderItemRow::into_item).collect())
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    order_id: Uuid,
    customer_name: String,
    total_amount_cents: i64,
    special_instructions: Vec<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, StorageError> {
        let status = OrderStatus::parse(&self.status)
            .ok_or_else(|| StorageError::database(format!("unknown order status: {}", self.status)))?;
        Ok(Order {
            id: self.order_id,
            customer_name: self.customer_name,
            items,
            special_instructions: self.special_instructions,
            status,
            total_amount_cents: self.total_amount_cents,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    menu_item_id: Uuid,
    quantity: i32,
}

impl OrderItemRow {
    fn into_item(self) -> OrderItem {
        OrderItem {
            menu_item_id: self.menu_item_id,
            quantity: self.quantity.max(0) as u32,
        }
    }
}

#[derive(sqlx::FromRow)]
struct InventoryRow {
    ingredient_id: Uuid,
    name: String,
    quantity: f64,
    unit: String,
    price_cents: i64,
}

impl InventoryRow {
    fn into_item(self) -> InventoryItem {
        InventoryItem {
            id: self.ingredient_id,
            name: self.name,
            quantity: self.quantity,
            unit: self.unit,
            price_cents: self.price_cents,
        }
    }
}

pub struct PgFulfillmentTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl FulfillmentTx for PgFulfillmentTx {
    async fn inventory_item(
        &mut self,
        ingredient_id: Uuid,
    ) -> Result<Option<InventoryItem>, StorageError> {
        // FOR UPDATE: concurrent reservations on the same ingredient
        // serialize on the row lock instead of double-spending stock.
        let row = sqlx::query_as::<_, InventoryRow>(
            "SELECT ingredient_id, name, quantity, unit, price_cents \
             FROM inventory WHERE ingredient_id = $1 FOR UPDATE",
        )
        .bind(ingredient_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(StorageError::database)?;
        Ok(row.map(InventoryRow::into_item))
    }

    async fn deduct_stock(
        &mut self,
        ingredient_id: Uuid,
        amount: f64,
    ) -> Result<f64, StorageError> {
        sqlx::query_scalar::<_, f64>(
            "UPDATE inventory SET quantity = quantity - $2, updated_at = NOW() \
             WHERE ingredient_id = $1 RETURNING quantity",
        )
        .bind(ingredient_id)
        .bind(amount)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(StorageError::database)
    }

    async fn insert_order(
        &mut self,
        order: &NewOrder,
        status: OrderStatus,
        total_cents: i64,
        items: &[PricedItem],
    ) -> Result<Order, StorageError> {
        let order_id = Uuid::new_v4();
        let (created_at, updated_at): (DateTime<Utc>, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO orders (order_id, customer_name, total_amount_cents, special_instructions, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING created_at, updated_at",
        )
        .bind(order_id)
        .bind(&order.customer_name)
        .bind(total_cents)
        .bind(&order.special_instructions)
        .bind(status.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(StorageError::database)?;

        for item in items {
            sqlx::query(
                "INSERT INTO order_items (order_id, menu_item_id, quantity, price_at_order_cents) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(order_id)
            .bind(item.menu_item_id)
            .bind(item.quantity as i32)
            .bind(item.price_at_order_cents)
            .execute(&mut *self.tx)
            .await
            .map_err(StorageError::database)?;
        }

        sqlx::query("INSERT INTO order_status_history (order_id, status) VALUES ($1, $2)")
            .bind(order_id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(StorageError::database)?;

        Ok(Order {
            id: order_id,
            customer_name: order.customer_name.clone(),
            items: items
                .iter()
                .map(|p| OrderItem { menu_item_id: p.menu_item_id, quantity: p.quantity })
                .collect(),
            special_instructions: order.special_instructions.clone(),
            status,
            total_amount_cents: total_cents,
            created_at,
            updated_at,
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.tx.commit().await.map_err(StorageError::database)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        self.tx.rollback().await.map_err(StorageError::database)
    }
}

#[async_trait]
impl FulfillmentStore for PgOrderStore {
    async fn begin(&self) -> Result<Box<dyn FulfillmentTx>, StorageError> {
        let tx = self.pool.begin().await.map_err(StorageError::database)?;
        Ok(Box::new(PgFulfillmentTx { tx }))
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn order(&self, id: Uuid) -> Result<Option<Order>, StorageError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT order_id, customer_name, total_amount_cents, special_instructions, status, \
             created_at, updated_at FROM orders WHERE order_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::database)?;

        match row {
            Some(row) => {
                let items = self.order_items(id).await?;
                Ok(Some(row.into_order(items)?))
            }
            None => Ok(None),
        }
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StorageError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT order_id, customer_name, total_amount_cents, special_instructions, status, \
             created_at, updated_at FROM orders ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::database)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.order_items(row.order_id).await?;
            orders.push(row.into_order(items)?);
        }
        Ok(orders)
    }

    async fn update_order(&self, order: &Order) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::database)?;

        let old_status: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE order_id = $1 FOR UPDATE")
                .bind(order.id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(StorageError::database)?;
        let old_status = old_status
            .ok_or_else(|| StorageError::database(format!("order not found: {}", order.id)))?;

        for item in &order.items {
            if item.quantity == 0 {
                sqlx::query("DELETE FROM order_items WHERE order_id = $1 AND menu_item_id = $2")
                    .bind(order.id)
                    .bind(item.menu_item_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(StorageError::database)?;
            } else {
                let updated = sqlx::query(
                    "UPDATE order_items SET quantity = $1 \
                     WHERE order_id = $2 AND menu_item_id = $3",
                )
                .bind(item.quantity as i32)
                .bind(order.id)
                .bind(item.menu_item_id)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::database)?;

                if updated.rows_affected() == 0 {
                    // New line: snapshot the current menu price.
                    sqlx::query(
                        "INSERT INTO order_items (order_id, menu_item_id, quantity, price_at_order_cents) \
                         VALUES ($1, $2, $3, \
                             (SELECT price_cents FROM menu_items WHERE menu_item_id = $2))",
                    )
                    .bind(order.id)
                    .bind(item.menu_item_id)
                    .bind(item.quantity as i32)
                    .execute(&mut *tx)
                    .await
                    .map_err(StorageError::database)?;
                }
            }
        }

        sqlx::query(
            "UPDATE orders SET customer_name = $1, special_instructions = $2, status = $3, \
             updated_at = NOW() WHERE order_id = $4",
        )
        .bind(&order.customer_name)
        .bind(&order.special_instructions)
        .bind(order.status.as_str())
        .bind(order.id)
        .execute(&mut *tx)
        .await
        .map_err(StorageError::database)?;

        if old_status != order.status.as_str() {
            sqlx::query("INSERT INTO order_status_history (order_id, status) VALUES ($1, $2)")
                .bind(order.id)
                .bind(order.status.as_str())
                .execute(&mut *tx)
                .await
                .map_err(StorageError::database)?;
        }

        tx.commit().await.map_err(StorageError::database)
    }

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::database)?;

        let updated = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE order_id = $2",
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(StorageError::database)?;
        if updated.rows_affected() == 0 {
            return Err(StorageError::database(format!("order not found: {id}")));
        }

        sqlx::query("INSERT INTO order_status_history (order_id, status) VALUES ($1, $2)")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(StorageError::database)?;

        tx.commit().await.map_err(StorageError::database)
    }

    async fn delete_order(&self, id: Uuid) -> Result<bool, StorageError> {
        // Item and status-history rows cascade with the order.
        let deleted = sqlx::query("DELETE FROM orders WHERE order_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::database)?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn ordered_items_count(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<BTreeMap<String, i64>, StorageError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT mi.name, COALESCE(SUM(oi.quantity), 0)::BIGINT \
             FROM order_items oi \
             JOIN menu_items mi ON mi.menu_item_id = oi.menu_item_id \
             JOIN orders o ON o.order_id = oi.order_id \
             WHERE ($1::date IS NULL OR o.created_at::date >= $1) \
               AND ($2::date IS NULL OR o.created_at::date <= $2) \
             GROUP BY mi.name",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::database)?;

        Ok(rows.into_iter().collect())
    }
}
