use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::services::response::ApiResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockMovementType {
    StockIn,
    StockOut,
    Adjustment,
    Return,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: u32,
    pub product_id: u32,
    #[serde(rename = "type")]
    pub movement_type: StockMovementType,
    pub quantity: u32,
    pub reference: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: u32,
    pub product_id: u32,
    pub quantity_in_stock: u32,
    pub reorder_level: u32,
    pub max_stock_level: u32,
    pub last_updated: DateTime<Utc>,
    pub stock_movements: Vec<StockMovement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStock {
    pub product_id: u32,
    pub quantity: u32,
    pub movement_type: StockMovementType,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub notes: String,
}

/// 库存变更失败原因
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StockError {
    #[error("Inventory item not found for this product")]
    NotFound,
    #[error("Insufficient stock available")]
    Insufficient,
}

/// 库存可用性检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub in_stock: u32,
    pub available: bool,
}

#[derive(Debug)]
struct InventoryTable {
    // product_id -> item
    items: BTreeMap<u32, InventoryItem>,
    next_movement_id: u32,
}

/// 进程内库存存储
#[derive(Debug, Clone)]
pub struct InventoryStore {
    table: Arc<RwLock<InventoryTable>>,
}

impl InventoryStore {
    pub fn new(items: impl IntoIterator<Item = InventoryItem>) -> Self {
        let items: BTreeMap<u32, InventoryItem> = items.into_iter().map(|i| (i.product_id, i)).collect();
        let next_movement_id = items
            .values()
            .flat_map(|i| i.stock_movements.iter().map(|m| m.id))
            .max()
            .map_or(1, |id| id + 1);
        Self {
            table: Arc::new(RwLock::new(InventoryTable {
                items,
                next_movement_id,
            })),
        }
    }

    pub fn seeded() -> Self {
        let now = Utc::now();
        let item = |id: u32, quantity: u32, reorder: u32, max: u32, days: i64| InventoryItem {
            id,
            product_id: id,
            quantity_in_stock: quantity,
            reorder_level: reorder,
            max_stock_level: max,
            last_updated: now - Duration::days(days),
            stock_movements: Vec::new(),
        };

        Self::new([
            item(1, 50, 10, 100, 5),
            item(2, 75, 15, 150, 3),
            item(3, 25, 5, 50, 2),
            item(4, 100, 20, 200, 1),
        ])
    }

    pub async fn list(&self) -> Vec<InventoryItem> {
        let table = self.table.read().await;
        table.items.values().cloned().collect()
    }

    pub async fn by_product(&self, product_id: u32) -> Option<InventoryItem> {
        let table = self.table.read().await;
        table.items.get(&product_id).cloned()
    }

    /// 记录一次库存变动；出库数量超过库存时拒绝且不记录
    pub async fn update_stock(&self, update: UpdateStock) -> Result<InventoryItem, StockError> {
        let mut guard = self.table.write().await;
        let table = &mut *guard;
        let item = table.items.get_mut(&update.product_id).ok_or(StockError::NotFound)?;

        item.quantity_in_stock = match update.movement_type {
            StockMovementType::StockIn | StockMovementType::Return => {
                item.quantity_in_stock.saturating_add(update.quantity)
            }
            StockMovementType::StockOut => item
                .quantity_in_stock
                .checked_sub(update.quantity)
                .ok_or(StockError::Insufficient)?,
            StockMovementType::Adjustment => update.quantity,
        };

        let now = Utc::now();
        item.stock_movements.push(StockMovement {
            id: table.next_movement_id,
            product_id: update.product_id,
            movement_type: update.movement_type,
            quantity: update.quantity,
            reference: update.reference,
            notes: update.notes,
            created_at: now,
        });
        item.last_updated = now;
        table.next_movement_id += 1;

        Ok(item.clone())
    }

    pub async fn check_availability(&self, product_id: u32, quantity: u32) -> Option<Availability> {
        let table = self.table.read().await;
        table.items.get(&product_id).map(|item| Availability {
            in_stock: item.quantity_in_stock,
            available: item.quantity_in_stock >= quantity,
        })
    }
}

/// `/api/inventory` 路由
pub fn router(store: InventoryStore) -> Router {
    Router::new()
        .route("/api/inventory", get(list_inventory))
        .route("/api/inventory/product/{product_id}", get(inventory_by_product))
        .route("/api/inventory/update-stock", post(update_stock))
        .route("/api/inventory/check-availability", get(check_availability))
        .with_state(store)
}

type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

async fn list_inventory(State(store): State<InventoryStore>) -> Reply<Vec<InventoryItem>> {
    tracing::info!("Getting all inventory items");
    let items = store.list().await;
    let message = format!("Retrieved {} inventory items", items.len());
    ApiResponse::ok(items, message).with_status(StatusCode::OK)
}

async fn inventory_by_product(
    State(store): State<InventoryStore>,
    Path(product_id): Path<u32>,
) -> Reply<InventoryItem> {
    tracing::info!(product_id, "Getting inventory for product");
    match store.by_product(product_id).await {
        Some(item) => ApiResponse::ok(item, "Inventory item retrieved successfully").with_status(StatusCode::OK),
        None => ApiResponse::fail(StockError::NotFound.to_string()).with_status(StatusCode::NOT_FOUND),
    }
}

async fn update_stock(State(store): State<InventoryStore>, Json(update): Json<UpdateStock>) -> Reply<bool> {
    tracing::info!(
        product_id = update.product_id,
        movement_type = ?update.movement_type,
        quantity = update.quantity,
        "Updating stock"
    );
    match store.update_stock(update).await {
        Ok(_) => ApiResponse::ok(true, "Stock updated successfully").with_status(StatusCode::OK),
        Err(e) => {
            tracing::warn!(error = %e, "Stock update rejected");
            ApiResponse {
                data: Some(false),
                ..ApiResponse::fail(e.to_string())
            }
            .with_status(StatusCode::BAD_REQUEST)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityQuery {
    product_id: u32,
    quantity: u32,
}

async fn check_availability(
    State(store): State<InventoryStore>,
    Query(query): Query<AvailabilityQuery>,
) -> Reply<bool> {
    tracing::info!(
        product_id = query.product_id,
        quantity = query.quantity,
        "Checking stock availability"
    );
    match store.check_availability(query.product_id, query.quantity).await {
        Some(Availability { in_stock, available: true }) => {
            ApiResponse::ok(true, format!("Stock available. Current stock: {in_stock}")).with_status(StatusCode::OK)
        }
        Some(Availability { in_stock, available: false }) => ApiResponse::ok(
            false,
            format!(
                "Insufficient stock. Current stock: {in_stock}, Required: {}",
                query.quantity
            ),
        )
        .with_status(StatusCode::OK),
        None => ApiResponse {
            data: Some(false),
            ..ApiResponse::fail("Product not found in inventory")
        }
        .with_status(StatusCode::OK),
    }
}
