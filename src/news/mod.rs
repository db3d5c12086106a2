pub mod api_types;
pub mod cached_client;
pub mod client;
pub mod error;
pub mod keys;
pub mod types;

pub use cached_client::CachedNewsClient;
pub use client::NewsClient;
pub use keys::{CredentialSource, KeyRotator};
