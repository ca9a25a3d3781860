//! Service discovery for NexRPC
//!
//! - [`RegistryBackend`]: the register/query/deregister contract of a naming service
//! - [`InMemoryRegistry`] and [`StaticRegistry`]: backends shipped with NexRPC
//! - [`LoadBalancer`]: endpoint selection policies (random, round-robin)
//! - [`ServiceDirectory`]: resolves a service name to one endpoint per call

pub mod directory;
pub mod load_balancer;
pub mod registry;

pub use directory::ServiceDirectory;
pub use load_balancer::{LoadBalancePolicy, LoadBalancer, RandomLoadBalancer, RoundRobinLoadBalancer};
pub use registry::{InMemoryRegistry, RegistryBackend, StaticRegistry};
