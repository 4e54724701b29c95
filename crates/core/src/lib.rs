//! `kitroom-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers, the domain error model and the entity/value-object markers
//! shared by the inventory and checkout crates.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CheckoutId, CorrelationId, HistoryId, ItemId, UserId};
pub use value_object::ValueObject;
