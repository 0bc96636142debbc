//! Service registration and discovery
//!
//! - `types`: registration input and discovered instance snapshots
//! - `error`: failure taxonomy
//! - `client`: registry transport trait
//! - `consul`: Consul agent HTTP transport
//! - `memory`: in-process registry with the same contract
//! - `registry`: `ServiceRegistry`, the public entry point and selection policy
//! - `lifecycle`: binds one registration to the host process lifetime

pub mod client;
pub mod consul;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod registry;
pub mod types;

pub use client::RegistryClient;
pub use consul::ConsulRegistryClient;
pub use error::{DiscoveryError, DiscoveryResult, RegistryOperation};
pub use lifecycle::{RegisteredLifecycle, RegistrationLifecycle};
pub use memory::InMemoryRegistryClient;
pub use registry::ServiceRegistry;
pub use types::{InstanceHealth, ServiceInstance, ServiceRegistration};
