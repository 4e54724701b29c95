//! Value object trait: equality by value, not identity.
//!
//! Quantities and update requests are value objects. They carry no identity and
//! are replaced wholesale instead of being mutated in place.

/// Marker trait for value objects.
///
/// The trait requires:
/// - **Clone**: value objects are cheap to copy
/// - **PartialEq**: value objects are compared by their attribute values
/// - **Debug**: value objects show up in logs and test failures
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Quantities { total: i32, available: i32, checked_out: i32 }
///
/// impl ValueObject for Quantities {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
