#![doc = include_str!("../README.md")]

#[cfg(feature = "client")]
pub mod client;
pub mod config;
pub mod error;
pub mod navigator;
pub mod session;
pub mod store;
pub mod tenant;
pub mod types;

// Re-exports for convenient access
#[cfg(feature = "client")]
pub use client::{
    AlertQuery, ApiClient, COMPANY_HEADER, DashboardResource, RefreshFailure, ValidatedTenant,
};
pub use config::ClientConfig;
pub use error::Error;
pub use navigator::{LogNavigator, Navigator};
pub use session::Session;
pub use store::{CredentialStore, FileStore, MemoryStore};
pub use tenant::{TenantTemplate, normalize_company_name};
pub use types::{
    AccessToken, AuthenticatedUser, CompanyName, Page, RefreshToken, TokenPair, User, UserId,
};
