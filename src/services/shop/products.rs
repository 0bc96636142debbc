use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::services::response::ApiResponse;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub brand: String,
    pub model: String,
    pub specifications: Vec<String>,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateProduct {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub brand: String,
    pub model: String,
    pub specifications: Vec<String>,
    pub image_url: String,
}

/// 只更新提供了的字段；空字符串视为未提供
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub specifications: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug)]
struct ProductTable {
    items: BTreeMap<u32, Product>,
    next_id: u32,
}

/// 进程内商品存储，由服务进程在启动时创建并持有
#[derive(Debug, Clone)]
pub struct ProductStore {
    table: Arc<RwLock<ProductTable>>,
}

impl ProductStore {
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        let items: BTreeMap<u32, Product> = products.into_iter().map(|p| (p.id, p)).collect();
        let next_id = items.keys().next_back().map_or(1, |id| id + 1);
        Self {
            table: Arc::new(RwLock::new(ProductTable { items, next_id })),
        }
    }

    /// 预置的演示数据
    pub fn seeded() -> Self {
        let now = Utc::now();
        let product = |id: u32, name: &str, description: &str, price: f64, category: &str, brand: &str, specs: &[&str], days: (i64, i64)| Product {
            id,
            name: name.to_string(),
            description: description.to_string(),
            price,
            category: category.to_string(),
            brand: brand.to_string(),
            model: name.to_string(),
            specifications: specs.iter().map(|s| s.to_string()).collect(),
            image_url: format!("https://example.com/products/{id}.jpg"),
            created_at: now - Duration::days(days.0),
            updated_at: now - Duration::days(days.1),
            is_active: true,
        };

        Self::new([
            product(
                1,
                "iPhone 15 Pro",
                "Latest iPhone with advanced camera system",
                999.99,
                "Smartphones",
                "Apple",
                &["6.1-inch display", "A17 Pro chip", "48MP camera", "128GB storage"],
                (30, 5),
            ),
            product(
                2,
                "Samsung Galaxy S24",
                "Premium Android smartphone with AI features",
                849.99,
                "Smartphones",
                "Samsung",
                &["6.2-inch display", "Snapdragon 8 Gen 3", "50MP camera", "256GB storage"],
                (25, 3),
            ),
            product(
                3,
                "MacBook Pro 14\"",
                "Professional laptop with M3 chip",
                1999.99,
                "Laptops",
                "Apple",
                &["14-inch Liquid Retina XDR", "M3 chip", "16GB RAM", "512GB SSD"],
                (20, 2),
            ),
            product(
                4,
                "Sony WH-1000XM5",
                "Wireless noise-canceling headphones",
                399.99,
                "Audio",
                "Sony",
                &["30-hour battery", "Advanced ANC", "Bluetooth 5.2", "Quick charge"],
                (15, 1),
            ),
        ])
    }

    pub async fn list(&self) -> Vec<Product> {
        self.filtered(|_| true).await
    }

    pub async fn get(&self, id: u32) -> Option<Product> {
        let table = self.table.read().await;
        table.items.get(&id).filter(|p| p.is_active).cloned()
    }

    pub async fn create(&self, input: CreateProduct) -> Product {
        let mut table = self.table.write().await;
        let now = Utc::now();
        let id = table.next_id;
        table.next_id += 1;

        let product = Product {
            id,
            name: input.name,
            description: input.description,
            price: input.price,
            category: input.category,
            brand: input.brand,
            model: input.model,
            specifications: input.specifications,
            image_url: input.image_url,
            created_at: now,
            updated_at: now,
            is_active: true,
        };
        table.items.insert(id, product.clone());
        product
    }

    pub async fn update(&self, id: u32, input: UpdateProduct) -> Option<Product> {
        let mut table = self.table.write().await;
        let product = table.items.get_mut(&id).filter(|p| p.is_active)?;

        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        if let Some(v) = non_empty(input.name) {
            product.name = v;
        }
        if let Some(v) = non_empty(input.description) {
            product.description = v;
        }
        if let Some(v) = input.price {
            product.price = v;
        }
        if let Some(v) = non_empty(input.category) {
            product.category = v;
        }
        if let Some(v) = non_empty(input.brand) {
            product.brand = v;
        }
        if let Some(v) = non_empty(input.model) {
            product.model = v;
        }
        if let Some(v) = input.specifications {
            product.specifications = v;
        }
        if let Some(v) = non_empty(input.image_url) {
            product.image_url = v;
        }
        if let Some(v) = input.is_active {
            product.is_active = v;
        }
        product.updated_at = Utc::now();

        Some(product.clone())
    }

    /// 软删除：只把 `is_active` 置为 false
    pub async fn delete(&self, id: u32) -> bool {
        let mut table = self.table.write().await;
        match table.items.get_mut(&id).filter(|p| p.is_active) {
            Some(product) => {
                product.is_active = false;
                product.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn by_category(&self, category: &str) -> Vec<Product> {
        self.filtered(|p| p.category.eq_ignore_ascii_case(category)).await
    }

    pub async fn search(&self, term: &str) -> Vec<Product> {
        let term = term.to_lowercase();
        self.filtered(|p| {
            [&p.name, &p.description, &p.brand, &p.category]
                .iter()
                .any(|field| field.to_lowercase().contains(&term))
        })
        .await
    }

    async fn filtered(&self, predicate: impl Fn(&Product) -> bool) -> Vec<Product> {
        let table = self.table.read().await;
        table
            .items
            .values()
            .filter(|p| p.is_active && predicate(p))
            .cloned()
            .collect()
    }
}

/// `/api/products` 路由
pub fn router(store: ProductStore) -> Router {
    Router::new()
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/products/search", get(search_products))
        .route("/api/products/category/{category}", get(products_by_category))
        .route(
            "/api/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .with_state(store)
}

type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

async fn list_products(State(store): State<ProductStore>) -> Reply<Vec<Product>> {
    tracing::info!("Getting all products");
    let products = store.list().await;
    let message = format!("Retrieved {} products", products.len());
    ApiResponse::ok(products, message).with_status(StatusCode::OK)
}

async fn get_product(State(store): State<ProductStore>, Path(id): Path<u32>) -> Reply<Product> {
    tracing::info!(product_id = id, "Getting product");
    match store.get(id).await {
        Some(product) => ApiResponse::ok(product, "Product retrieved successfully").with_status(StatusCode::OK),
        None => ApiResponse::fail("Product not found").with_status(StatusCode::NOT_FOUND),
    }
}

async fn create_product(State(store): State<ProductStore>, Json(input): Json<CreateProduct>) -> Reply<Product> {
    tracing::info!(product_name = %input.name, "Creating new product");
    let product = store.create(input).await;
    ApiResponse::ok(product, "Product created successfully").with_status(StatusCode::CREATED)
}

async fn update_product(
    State(store): State<ProductStore>,
    Path(id): Path<u32>,
    Json(input): Json<UpdateProduct>,
) -> Reply<Product> {
    tracing::info!(product_id = id, "Updating product");
    match store.update(id, input).await {
        Some(product) => ApiResponse::ok(product, "Product updated successfully").with_status(StatusCode::OK),
        None => ApiResponse::fail("Product not found").with_status(StatusCode::NOT_FOUND),
    }
}

async fn delete_product(State(store): State<ProductStore>, Path(id): Path<u32>) -> Reply<bool> {
    tracing::info!(product_id = id, "Deleting product");
    if store.delete(id).await {
        ApiResponse::ok(true, "Product deleted successfully").with_status(StatusCode::OK)
    } else {
        ApiResponse::fail("Product not found").with_status(StatusCode::NOT_FOUND)
    }
}

async fn products_by_category(
    State(store): State<ProductStore>,
    Path(category): Path<String>,
) -> Reply<Vec<Product>> {
    tracing::info!(category = %category, "Getting products in category");
    let products = store.by_category(&category).await;
    let message = format!("Retrieved {} products in category '{}'", products.len(), category);
    ApiResponse::ok(products, message).with_status(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search_products(State(store): State<ProductStore>, Query(query): Query<SearchQuery>) -> Reply<Vec<Product>> {
    if query.q.trim().is_empty() {
        return ApiResponse::fail("Search query cannot be empty").with_status(StatusCode::BAD_REQUEST);
    }

    tracing::info!(query = %query.q, "Searching products");
    let products = store.search(&query.q).await;
    let message = format!("Found {} products matching '{}'", products.len(), query.q);
    ApiResponse::ok(products, message).with_status(StatusCode::OK)
}
