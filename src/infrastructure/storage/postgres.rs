//! PostgreSQL backing store with connection pooling

use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::domain::inventory::{
    InventoryItem, InventoryItemSummary, InventoryRepository, NewInventoryItem, OrderReference,
};
use crate::domain::order::{NewOrder, Order, OrderRepository, OrderSummary};
use crate::domain::pagination::PageRequest;
use crate::domain::DomainError;

const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL connection configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/inventory_tracker".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }
}

/// Opens a connection pool
pub async fn connect_pool(config: &PostgresConfig) -> Result<PgPool, DomainError> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))
}

/// Maps a database error, translating constraint violations
pub(crate) fn map_db_error(context: &str, e: sqlx::Error) -> DomainError {
    let code = e
        .as_database_error()
        .and_then(|db| db.code())
        .map(|c| c.into_owned());

    match code.as_deref() {
        Some(FOREIGN_KEY_VIOLATION) => {
            DomainError::not_found(format!("{}: referenced order does not exist", context))
        }
        Some(UNIQUE_VIOLATION) => DomainError::conflict(format!("{}: already exists", context)),
        _ => DomainError::storage(format!("{}: {}", context, e)),
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| DomainError::storage(format!("Failed to read column '{}': {}", name, e)))
}

fn item_from_row(row: &PgRow) -> Result<InventoryItem, DomainError> {
    InventoryItem::new(
        column(row, "id")?,
        column(row, "name")?,
        column(row, "quantity")?,
        column(row, "location")?,
        column(row, "order_id")?,
    )
}

/// Item row, plus the joined order columns when present
fn item_summary_from_row(row: &PgRow, with_order: bool) -> Result<InventoryItemSummary, DomainError> {
    let item = item_from_row(row)?;

    let order = match (with_order, item.order_id()) {
        (true, Some(order_id)) => Some(OrderReference {
            id: order_id,
            customer_name: column(row, "order_customer_name")?,
            date_placed: column(row, "order_date_placed")?,
        }),
        _ => None,
    };

    Ok(item.to_summary(order))
}

fn order_summary_from_row(row: &PgRow) -> Result<OrderSummary, DomainError> {
    let items_count: i64 = column(row, "items_count")?;

    Ok(OrderSummary {
        id: column(row, "id")?,
        customer_name: column(row, "customer_name")?,
        date_placed: column(row, "date_placed")?,
        items_count: items_count.max(0) as u64,
        items: None,
    })
}

const ITEM_COLUMNS: &str = "i.id, i.name, i.quantity, i.location, i.order_id";

const ITEM_WITH_ORDER_SELECT: &str = r#"
    SELECT i.id, i.name, i.quantity, i.location, i.order_id,
           o.customer_name AS order_customer_name,
           o.date_placed AS order_date_placed
    FROM inventory_items i
    LEFT JOIN orders o ON o.id = i.order_id
"#;

const ORDER_SUMMARY_SELECT: &str = r#"
    SELECT o.id, o.customer_name, o.date_placed,
           (SELECT COUNT(*) FROM inventory_items i WHERE i.order_id = o.id) AS items_count
    FROM orders o
"#;

/// PostgreSQL backing store
///
/// `inventory_items.order_id` references `orders.id` with `ON DELETE SET NULL`,
/// so deleting an order releases its items in the same statement.
#[derive(Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
}

impl Debug for PostgresDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDatabase")
            .field("pool", &"<PgPool>")
            .finish()
    }
}

impl PostgresDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &PostgresConfig) -> Result<Self, DomainError> {
        Ok(Self::new(connect_pool(config).await?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn items_of_orders(
        &self,
        order_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<InventoryItem>>, DomainError> {
        let query = format!(
            "SELECT {} FROM inventory_items i WHERE i.order_id = ANY($1) ORDER BY i.id",
            ITEM_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(order_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to load order items", e))?;

        let mut grouped: HashMap<i64, Vec<InventoryItem>> = HashMap::new();
        for row in &rows {
            let item = item_from_row(row)?;
            if let Some(order_id) = item.order_id() {
                grouped.entry(order_id).or_default().push(item);
            }
        }

        Ok(grouped)
    }

    async fn count(&self, table: &str) -> Result<u64, DomainError> {
        let query = format!("SELECT COUNT(*) FROM {}", table);

        let count: i64 = sqlx::query_scalar(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to count rows", e))?;

        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl OrderRepository for PostgresDatabase {
    async fn find(&self, id: i64) -> Result<Option<Order>, DomainError> {
        let row = sqlx::query("SELECT id, customer_name, date_placed FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to get order", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut items = self.items_of_orders(&[id]).await?;
        let order = Order::new(
            column(&row, "id")?,
            column(&row, "customer_name")?,
            column(&row, "date_placed")?,
        )
        .with_items(items.remove(&id).unwrap_or_default());

        Ok(Some(order))
    }

    async fn summary(&self, id: i64, with_items: bool) -> Result<Option<OrderSummary>, DomainError> {
        let query = format!("{} WHERE o.id = $1", ORDER_SUMMARY_SELECT);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to get order", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut summary = order_summary_from_row(&row)?;

        if with_items {
            let mut items = self.items_of_orders(&[id]).await?;
            summary.items = Some(
                items
                    .remove(&id)
                    .unwrap_or_default()
                    .iter()
                    .map(|i| i.to_summary(None))
                    .collect(),
            );
        }

        Ok(Some(summary))
    }

    async fn page(
        &self,
        page: PageRequest,
        with_items: bool,
    ) -> Result<(Vec<OrderSummary>, u64), DomainError> {
        let query = format!("{} ORDER BY o.id LIMIT $1 OFFSET $2", ORDER_SUMMARY_SELECT);

        let rows = sqlx::query(&query)
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to list orders", e))?;

        let mut summaries = rows
            .iter()
            .map(order_summary_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        if with_items && !summaries.is_empty() {
            let ids: Vec<i64> = summaries.iter().map(|s| s.id).collect();
            let mut items = self.items_of_orders(&ids).await?;

            for summary in &mut summaries {
                summary.items = Some(
                    items
                        .remove(&summary.id)
                        .unwrap_or_default()
                        .iter()
                        .map(|i| i.to_summary(None))
                        .collect(),
                );
            }
        }

        let total = self.count("orders").await?;
        Ok((summaries, total))
    }

    async fn create(&self, order: NewOrder) -> Result<Order, DomainError> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders (customer_name, date_placed)
            VALUES ($1, $2)
            RETURNING id, customer_name, date_placed
            "#,
        )
        .bind(&order.customer_name)
        .bind(order.date_placed)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to create order", e))?;

        Ok(Order::new(
            column(&row, "id")?,
            column(&row, "customer_name")?,
            column(&row, "date_placed")?,
        ))
    }

    async fn update(&self, order: &Order) -> Result<Order, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET customer_name = $2, date_placed = $3
            WHERE id = $1
            "#,
        )
        .bind(order.id())
        .bind(order.customer_name())
        .bind(order.date_placed())
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to update order", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("Order {} not found", order.id())));
        }

        OrderRepository::find(self, order.id())
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Order {} not found", order.id())))
    }

    async fn delete(&self, id: i64) -> Result<Option<Vec<i64>>, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("Failed to begin transaction", e))?;

        let released: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM inventory_items WHERE order_id = $1 ORDER BY id FOR UPDATE",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_db_error("Failed to load order items", e))?;

        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("Failed to delete order", e))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        tx.commit()
            .await
            .map_err(|e| map_db_error("Failed to commit order deletion", e))?;

        Ok(Some(released))
    }
}

#[async_trait]
impl InventoryRepository for PostgresDatabase {
    async fn find(&self, id: i64) -> Result<Option<InventoryItem>, DomainError> {
        let query = format!("SELECT {} FROM inventory_items i WHERE i.id = $1", ITEM_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to get inventory item", e))?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn summary(
        &self,
        id: i64,
        with_order: bool,
    ) -> Result<Option<InventoryItemSummary>, DomainError> {
        let query = format!("{} WHERE i.id = $1", ITEM_WITH_ORDER_SELECT);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to get inventory item", e))?;

        row.as_ref()
            .map(|row| item_summary_from_row(row, with_order))
            .transpose()
    }

    async fn page(
        &self,
        page: PageRequest,
        with_order: bool,
    ) -> Result<(Vec<InventoryItemSummary>, u64), DomainError> {
        let query = format!("{} ORDER BY i.id LIMIT $1 OFFSET $2", ITEM_WITH_ORDER_SELECT);

        let rows = sqlx::query(&query)
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to list inventory items", e))?;

        let summaries = rows
            .iter()
            .map(|row| item_summary_from_row(row, with_order))
            .collect::<Result<Vec<_>, _>>()?;

        let total = self.count("inventory_items").await?;
        Ok((summaries, total))
    }

    async fn create(&self, item: NewInventoryItem) -> Result<InventoryItem, DomainError> {
        item.validate()?;

        let row = sqlx::query(
            r#"
            INSERT INTO inventory_items (name, quantity, location, order_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, quantity, location, order_id
            "#,
        )
        .bind(&item.name)
        .bind(item.quantity)
        .bind(&item.location)
        .bind(item.order_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to create inventory item", e))?;

        item_from_row(&row)
    }

    async fn update(&self, item: &InventoryItem) -> Result<InventoryItem, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET name = $2, quantity = $3, location = $4, order_id = $5
            WHERE id = $1
            "#,
        )
        .bind(item.id())
        .bind(item.name())
        .bind(item.quantity())
        .bind(item.location())
        .bind(item.order_id())
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to update inventory item", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Inventory item {} not found",
                item.id()
            )));
        }

        Ok(item.clone())
    }

    async fn set_order_if(
        &self,
        item_id: i64,
        expected: Option<i64>,
        order_id: Option<i64>,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET order_id = $3
            WHERE id = $1 AND order_id IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(item_id)
        .bind(expected)
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to reassign inventory item", e))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        match InventoryRepository::find(self, item_id).await? {
            Some(_) => Ok(false),
            None => Err(DomainError::not_found(format!(
                "Inventory item {} not found",
                item_id
            ))),
        }
    }

    async fn delete(&self, id: i64) -> Result<Option<InventoryItem>, DomainError> {
        let row = sqlx::query(
            "DELETE FROM inventory_items WHERE id = $1 RETURNING id, name, quantity, location, order_id",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_error("Failed to delete inventory item", e))?;

        row.as_ref().map(item_from_row).transpose()
    }
}
