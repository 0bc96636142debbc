use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;

use shop_discovery::services::discovery::{
    InMemoryRegistryClient, RegistryClient, ServiceRegistration, ServiceRegistry,
};
use shop_discovery::services::gateway_client::{ApiGatewayClient, GatewayClientConfig, GatewayClientError};
use shop_discovery::services::shop::{self, InventoryItem, ShopService};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Product {
    id: u32,
    name: String,
}

async fn get_product(Path(id): Path<u32>, headers: HeaderMap) -> (StatusCode, Json<serde_json::Value>) {
    if !headers.contains_key("x-request-id") {
        return (StatusCode::BAD_REQUEST, Json(json!({ "success": false, "message": "missing request id" })));
    }
    if id == 1 {
        (
            StatusCode::OK,
            Json(json!({ "success": true, "data": { "id": 1, "name": "Laptop" }, "message": "", "errors": [] })),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "data": null, "message": "Product not found", "errors": [] })),
        )
    }
}

async fn create_product(Json(product): Json<Product>) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "data": product, "message": "Created" }))
}

async fn spawn_product_service() -> SocketAddr {
    let app = Router::new()
        .route("/api/products/{id}", get(get_product))
        .route("/api/products", post(create_product));
    spawn(app).await
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn gateway_with_product_service() -> (ApiGatewayClient, InMemoryRegistryClient) {
    let addr = spawn_product_service().await;
    gateway_with("product-1", "product-service", addr).await
}

async fn gateway_with(id: &str, name: &str, addr: SocketAddr) -> (ApiGatewayClient, InMemoryRegistryClient) {
    let client = InMemoryRegistryClient::new();
    client
        .register(&ServiceRegistration::with_id(id, name, addr.ip().to_string(), addr.port()))
        .await
        .unwrap();

    let registry = ServiceRegistry::new(Arc::new(client.clone()), Duration::from_secs(1));
    let gateway = ApiGatewayClient::new(registry, GatewayClientConfig::default()).unwrap();
    (gateway, client)
}

#[tokio::test]
async fn test_get_resolves_and_calls_instance() {
    let (gateway, _client) = gateway_with_product_service().await;

    let response = gateway
        .get::<Product>("product-service", "/api/products/1")
        .await
        .expect("call should succeed");
    assert!(response.success);
    assert_eq!(
        response.data,
        Some(Product {
            id: 1,
            name: "Laptop".to_string()
        })
    );
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let (gateway, _client) = gateway_with_product_service().await;
    let product = Product {
        id: 7,
        name: "Phone".to_string(),
    };

    let response = gateway
        .post::<Product, _>("product-service", "/api/products", &product)
        .await
        .unwrap();
    assert_eq!(response.data, Some(product));
    assert_eq!(response.message, "Created");
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let (gateway, _client) = gateway_with_product_service().await;

    let err = gateway
        .get::<Product>("product-service", "/api/products/99")
        .await
        .expect_err("404 should surface");
    match err {
        GatewayClientError::Http { service, status, body } => {
            assert_eq!(service, "product-service");
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert!(body.contains("Product not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_service_is_unavailable_without_call() {
    let (gateway, client) = gateway_with_product_service().await;

    let err = gateway
        .get::<Product>("customer-service", "/api/customers/1")
        .await
        .expect_err("no customer-service registered");
    assert!(matches!(err, GatewayClientError::ServiceUnavailable(name) if name == "customer-service"));

    // 每次调用都重新解析，注销后立即不可用
    client.deregister("product-1").await.unwrap();
    let err = gateway
        .get::<Product>("product-service", "/api/products/1")
        .await
        .expect_err("product-service deregistered");
    assert!(matches!(err, GatewayClientError::ServiceUnavailable(_)));
}

#[tokio::test]
async fn test_registry_outage_is_not_unavailable() {
    let (gateway, client) = gateway_with_product_service().await;
    client.set_unreachable(true);

    let err = gateway
        .get::<Product>("product-service", "/api/products/1")
        .await
        .expect_err("registry is down");
    assert!(matches!(err, GatewayClientError::Discovery(_)));
}

#[tokio::test]
async fn test_available_services_reports_each_name() {
    let (gateway, _client) = gateway_with_product_service().await;

    let report = gateway
        .available_services(&["product-service", "customer-service", "inventory-service"])
        .await;
    assert_eq!(report.len(), 3);
    assert_eq!(report[0].0, "product-service");
    assert!(matches!(&report[0].1, Ok(Some(instance)) if instance.service_id == "product-1"));
    assert!(matches!(&report[1].1, Ok(None)));
    assert!(matches!(&report[2].1, Ok(None)));
}

#[tokio::test]
async fn test_put_and_delete_against_product_service() {
    let addr = spawn(ShopService::Product.router()).await;
    let (gateway, _client) = gateway_with("product-a", "product-service", addr).await;

    let updated = gateway
        .put::<shop::Product, _>("product-service", "/api/products/1", &json!({ "price": 899.0, "name": "" }))
        .await
        .expect("update should succeed");
    let product = updated.data.expect("updated product returned");
    assert_eq!(product.name, "iPhone 15 Pro");
    assert_eq!(product.price, 899.0);

    let deleted = gateway
        .delete::<bool>("product-service", "/api/products/1")
        .await
        .expect("delete should succeed");
    assert_eq!(deleted.data, Some(true));

    // 软删除后对外不可见，再次删除返回 404
    for result in [
        gateway.get::<shop::Product>("product-service", "/api/products/1").await.map(|_| ()),
        gateway.delete::<bool>("product-service", "/api/products/1").await.map(|_| ()),
    ] {
        match result {
            Err(GatewayClientError::Http { status, body, .. }) => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert!(body.contains("Product not found"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    let listed = gateway
        .get::<Vec<shop::Product>>("product-service", "/api/products")
        .await
        .unwrap();
    assert_eq!(listed.data.map(|p| p.len()), Some(3));
}

#[tokio::test]
async fn test_customer_service_rejects_duplicate_email() {
    let addr = spawn(ShopService::Customer.router()).await;
    let (gateway, _client) = gateway_with("customer-a", "customer-service", addr).await;

    let created = gateway
        .post::<shop::Customer, _>(
            "customer-service",
            "/api/customers",
            &json!({ "firstName": "Ada", "lastName": "Lovelace", "email": "ada@email.com" }),
        )
        .await
        .expect("new customer should be created");
    assert_eq!(created.data.map(|c| c.id), Some(3));

    let err = gateway
        .post::<shop::Customer, _>(
            "customer-service",
            "/api/customers",
            &json!({ "firstName": "Ada", "lastName": "Again", "email": "ADA@email.com" }),
        )
        .await
        .expect_err("duplicate email must be rejected");
    assert!(matches!(err, GatewayClientError::Http { status, .. } if status == StatusCode::BAD_REQUEST));

    let found = gateway
        .get::<shop::Customer>("customer-service", "/api/customers/email/jane.smith@email.com")
        .await
        .unwrap();
    assert_eq!(found.data.map(|c| c.id), Some(2));
}

#[tokio::test]
async fn test_inventory_service_stock_flow() {
    let addr = spawn(ShopService::Inventory.router()).await;
    let (gateway, _client) = gateway_with("inventory-a", "inventory-service", addr).await;

    let err = gateway
        .post::<bool, _>(
            "inventory-service",
            "/api/inventory/update-stock",
            &json!({ "productId": 1, "quantity": 60, "movementType": "StockOut" }),
        )
        .await
        .expect_err("oversell must be rejected");
    match err {
        GatewayClientError::Http { status, body, .. } => {
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body.contains("Insufficient stock available"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let ok = gateway
        .post::<bool, _>(
            "inventory-service",
            "/api/inventory/update-stock",
            &json!({ "productId": 1, "quantity": 20, "movementType": "StockOut", "reference": "ORD-7" }),
        )
        .await
        .unwrap();
    assert_eq!(ok.data, Some(true));

    let item = gateway
        .get::<InventoryItem>("inventory-service", "/api/inventory/product/1")
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(item.quantity_in_stock, 30);
    assert_eq!(item.stock_movements.len(), 1);

    let availability = gateway
        .get::<bool>("inventory-service", "/api/inventory/check-availability?productId=1&quantity=31")
        .await
        .unwrap();
    assert_eq!(availability.data, Some(false));
    assert!(availability.message.contains("Current stock: 30"));
}
