//! Schema Registry Clients
//!
//! The engine talks to the registry only through [`RegistryClient`], so
//! deployments plug in [`HttpRegistryClient`] and tests use
//! [`InMemoryRegistryClient`].

pub mod memory;
pub mod registry_client;

pub use memory::{InMemoryRegistryClient, SchemaVersion};
pub use registry_client::{AuthConfig, HttpRegistryClient, RegistryClient};
