use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::services::response::ApiResponse;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: u32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: Address,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: Address,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateCustomer {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub is_active: Option<bool>,
}

/// 客户存储操作错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustomerError {
    #[error("Customer not found")]
    NotFound,
    #[error("Customer with this email already exists")]
    DuplicateEmail,
}

#[derive(Debug)]
struct CustomerTable {
    items: BTreeMap<u32, Customer>,
    next_id: u32,
}

impl CustomerTable {
    // 邮箱在活跃客户中唯一（忽略大小写）
    fn email_taken(&self, email: &str, except: Option<u32>) -> bool {
        self.items
            .values()
            .any(|c| c.is_active && Some(c.id) != except && c.email.eq_ignore_ascii_case(email))
    }
}

/// 进程内客户存储
#[derive(Debug, Clone)]
pub struct CustomerStore {
    table: Arc<RwLock<CustomerTable>>,
}

impl CustomerStore {
    pub fn new(customers: impl IntoIterator<Item = Customer>) -> Self {
        let items: BTreeMap<u32, Customer> = customers.into_iter().map(|c| (c.id, c)).collect();
        let next_id = items.keys().next_back().map_or(1, |id| id + 1);
        Self {
            table: Arc::new(RwLock::new(CustomerTable { items, next_id })),
        }
    }

    pub fn seeded() -> Self {
        let now = Utc::now();
        Self::new([
            Customer {
                id: 1,
                first_name: "John".into(),
                last_name: "Doe".into(),
                email: "john.doe@email.com".into(),
                phone: "+1-555-0101".into(),
                address: Address {
                    street: "123 Main St".into(),
                    city: "New York".into(),
                    state: "NY".into(),
                    country: "USA".into(),
                    postal_code: "10001".into(),
                },
                created_at: now - Duration::days(60),
                updated_at: now - Duration::days(10),
                is_active: true,
            },
            Customer {
                id: 2,
                first_name: "Jane".into(),
                last_name: "Smith".into(),
                email: "jane.smith@email.com".into(),
                phone: "+1-555-0102".into(),
                address: Address {
                    street: "456 Oak Ave".into(),
                    city: "Los Angeles".into(),
                    state: "CA".into(),
                    country: "USA".into(),
                    postal_code: "90210".into(),
                },
                created_at: now - Duration::days(45),
                updated_at: now - Duration::days(5),
                is_active: true,
            },
        ])
    }

    pub async fn list(&self) -> Vec<Customer> {
        let table = self.table.read().await;
        table.items.values().filter(|c| c.is_active).cloned().collect()
    }

    pub async fn get(&self, id: u32) -> Option<Customer> {
        let table = self.table.read().await;
        table.items.get(&id).filter(|c| c.is_active).cloned()
    }

    pub async fn by_email(&self, email: &str) -> Option<Customer> {
        let table = self.table.read().await;
        table
            .items
            .values()
            .find(|c| c.is_active && c.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    pub async fn create(&self, input: CreateCustomer) -> Result<Customer, CustomerError> {
        let mut table = self.table.write().await;
        if table.email_taken(&input.email, None) {
            return Err(CustomerError::DuplicateEmail);
        }

        let now = Utc::now();
        let id = table.next_id;
        table.next_id += 1;
        let customer = Customer {
            id,
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            phone: input.phone,
            address: input.address,
            created_at: now,
            updated_at: now,
            is_active: true,
        };
        table.items.insert(id, customer.clone());
        Ok(customer)
    }

    pub async fn update(&self, id: u32, input: UpdateCustomer) -> Result<Customer, CustomerError> {
        let mut table = self.table.write().await;
        if !table.items.get(&id).is_some_and(|c| c.is_active) {
            return Err(CustomerError::NotFound);
        }

        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        let email = non_empty(input.email);
        if email.as_deref().is_some_and(|e| table.email_taken(e, Some(id))) {
            return Err(CustomerError::DuplicateEmail);
        }

        let customer = table.items.get_mut(&id).ok_or(CustomerError::NotFound)?;
        if let Some(v) = non_empty(input.first_name) {
            customer.first_name = v;
        }
        if let Some(v) = non_empty(input.last_name) {
            customer.last_name = v;
        }
        if let Some(v) = email {
            customer.email = v;
        }
        if let Some(v) = non_empty(input.phone) {
            customer.phone = v;
        }
        if let Some(v) = input.address {
            customer.address = v;
        }
        if let Some(v) = input.is_active {
            customer.is_active = v;
        }
        customer.updated_at = Utc::now();

        Ok(customer.clone())
    }

    /// 软删除
    pub async fn delete(&self, id: u32) -> bool {
        let mut table = self.table.write().await;
        match table.items.get_mut(&id).filter(|c| c.is_active) {
            Some(customer) => {
                customer.is_active = false;
                customer.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

/// `/api/customers` 路由
pub fn router(store: CustomerStore) -> Router {
    Router::new()
        .route("/api/customers", get(list_customers).post(create_customer))
        .route("/api/customers/email/{email}", get(get_customer_by_email))
        .route(
            "/api/customers/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .with_state(store)
}

type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

fn rejected<T>(err: CustomerError) -> Reply<T> {
    let status = match err {
        CustomerError::NotFound => StatusCode::NOT_FOUND,
        CustomerError::DuplicateEmail => StatusCode::BAD_REQUEST,
    };
    ApiResponse::fail(err.to_string()).with_status(status)
}

async fn list_customers(State(store): State<CustomerStore>) -> Reply<Vec<Customer>> {
    tracing::info!("Getting all customers");
    let customers = store.list().await;
    let message = format!("Retrieved {} customers", customers.len());
    ApiResponse::ok(customers, message).with_status(StatusCode::OK)
}

async fn get_customer(State(store): State<CustomerStore>, Path(id): Path<u32>) -> Reply<Customer> {
    tracing::info!(customer_id = id, "Getting customer");
    match store.get(id).await {
        Some(customer) => ApiResponse::ok(customer, "Customer retrieved successfully").with_status(StatusCode::OK),
        None => rejected(CustomerError::NotFound),
    }
}

async fn get_customer_by_email(State(store): State<CustomerStore>, Path(email): Path<String>) -> Reply<Customer> {
    tracing::info!(email = %email, "Getting customer by email");
    match store.by_email(&email).await {
        Some(customer) => ApiResponse::ok(customer, "Customer retrieved successfully").with_status(StatusCode::OK),
        None => rejected(CustomerError::NotFound),
    }
}

async fn create_customer(State(store): State<CustomerStore>, Json(input): Json<CreateCustomer>) -> Reply<Customer> {
    tracing::info!(email = %input.email, "Creating new customer");
    match store.create(input).await {
        Ok(customer) => ApiResponse::ok(customer, "Customer created successfully").with_status(StatusCode::CREATED),
        Err(e) => rejected(e),
    }
}

async fn update_customer(
    State(store): State<CustomerStore>,
    Path(id): Path<u32>,
    Json(input): Json<UpdateCustomer>,
) -> Reply<Customer> {
    tracing::info!(customer_id = id, "Updating customer");
    match store.update(id, input).await {
        Ok(customer) => ApiResponse::ok(customer, "Customer updated successfully").with_status(StatusCode::OK),
        Err(e) => rejected(e),
    }
}

async fn delete_customer(State(store): State<CustomerStore>, Path(id): Path<u32>) -> Reply<bool> {
    tracing::info!(customer_id = id, "Deleting customer");
    if store.delete(id).await {
        ApiResponse::ok(true, "Customer deleted successfully").with_status(StatusCode::OK)
    } else {
        rejected(CustomerError::NotFound)
    }
}
