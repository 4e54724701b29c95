//! Infrastructure layer: storage engines, the checkout services built on
//! them, configuration and time.
//!
//! - [`store`]: `Storage` / `StorageTx` boundary with in-memory and Postgres engines
//! - [`ledger`]: the item ledger, sole writer of item quantities
//! - [`workflow`]: checkout and check-in transactions
//! - [`views`]: read-only checkout projections
//! - [`catalog`]: descriptive item data and users

pub mod catalog;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod store;
pub mod views;
pub mod workflow;


pub use catalog::CatalogService;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AppConfig, LogFormat};
pub use error::{CheckoutError, StoreError};
pub use ledger::ItemLedger;
pub use store::{InMemoryStorage, PgStorage, Storage, StorageTx};
pub use views::CheckoutViews;
pub use workflow::CheckoutWorkflow;
