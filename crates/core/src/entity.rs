//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Items, users and checkout records are entities: two values with the same id
/// describe the same row, even when their descriptive fields differ.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
