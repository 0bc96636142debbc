//! 商品、客户、库存三个业务服务的 HTTP 接口
//!
//! 每个服务进程在启动时创建自己的存储，数据只存在于进程内存中。

pub mod customers;
pub mod inventory;
pub mod products;

use axum::Router;

pub use customers::{Customer, CustomerStore};
pub use inventory::{InventoryItem, InventoryStore};
pub use products::{Product, ProductStore};

/// 按注册的服务名选择要挂载的业务服务
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopService {
    Product,
    Customer,
    Inventory,
}

impl ShopService {
    pub fn from_service_name(name: &str) -> Option<Self> {
        match name {
            "product-service" => Some(ShopService::Product),
            "customer-service" => Some(ShopService::Customer),
            "inventory-service" => Some(ShopService::Inventory),
            _ => None,
        }
    }

    /// 创建带预置数据的存储并返回对应路由
    pub fn router(self) -> Router {
        match self {
            ShopService::Product => products::router(ProductStore::seeded()),
            ShopService::Customer => customers::router(CustomerStore::seeded()),
            ShopService::Inventory => inventory::router(InventoryStore::seeded()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_service_names() {
        assert_eq!(ShopService::from_service_name("product-service"), Some(ShopService::Product));
        assert_eq!(ShopService::from_service_name("customer-service"), Some(ShopService::Customer));
        assert_eq!(ShopService::from_service_name("inventory-service"), Some(ShopService::Inventory));
        assert_eq!(ShopService::from_service_name("order-service"), None);
    }
}
