//! xcast - scheduled posting to X for multiple accounts
//!
//! This library holds everything except the binaries: the credential
//! vault, the post store, the media library, delivery to the X API, the
//! scheduler loop, bulk import and hourly schedule expansion.

pub mod config;
pub mod db;
pub mod delivery;
pub mod error;
pub mod hourly;
pub mod importer;
pub mod logging;
pub mod media;
pub mod scheduler;
pub mod scheduling;
pub mod store;
pub mod types;
pub mod vault;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use delivery::{DeliveryClient, MediaHandle, MockDelivery, PostReceipt, XClient};
pub use error::{DeliveryError, Result, XcastError};
pub use importer::{ImportReport, Importer};
pub use media::{MediaLibrary, Resolution};
pub use scheduler::{Scheduler, SchedulerSettings, TickReport};
pub use store::PostStore;
pub use types::{Account, AccountSummary, NewAccount, NewPost, Post, PostState};
pub use vault::CredentialVault;
