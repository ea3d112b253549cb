//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity** and are compared by their attribute
/// values. An order line is one: `{product, 4, 250}` is equal to any other
/// `{product, 4, 250}`, and it never changes after the order is created.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
