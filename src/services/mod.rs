pub mod discovery;
pub mod gateway_client;
pub mod health;
pub mod response;
pub mod shop;

pub use discovery::{
    DiscoveryError, InMemoryRegistryClient, RegisteredLifecycle, RegistrationLifecycle,
    ServiceInstance, ServiceRegistration, ServiceRegistry,
};
pub use gateway_client::{ApiGatewayClient, GatewayClientError};
pub use response::ApiResponse;
pub use shop::ShopService;
