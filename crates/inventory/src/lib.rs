//! Inventory domain module.
//!
//! This crate contains the business rules for equipment items and their
//! borrowers, implemented purely as deterministic domain logic (no IO, no
//! HTTP, no storage). The quantity arithmetic in [`quantity`] is the only place
//! that computes new `available` / `checked_out` values.

pub mod item;
pub mod quantity;
pub mod user;

pub use item::{Availability, Item, ItemStatus, ItemUpdate, NewItem};
pub use quantity::{Quantities, QuantityError, TransferDirection};
pub use user::{NewUser, User, UserLookup, UserRole, UserUpdate};
