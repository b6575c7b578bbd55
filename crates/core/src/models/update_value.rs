//! Update value types for precise PATCH operations
//!
//! Distinguishes between "set to value", "set to null" and "don't update" so a
//! partial job update can clear a nullable column without touching the others.

use serde::{Serialize, Serializer};

/// Represents a precise update operation for PATCH semantics
///
/// - `Set(T)`: set the field to the specified value
/// - `Unset`: set the field to null
/// - `NoChange`: leave the field alone (omitted from the wire payload)
///
/// # Examples
///
/// ```rust
/// use provisioner_core::models::UpdateValue;
///
/// let ip = UpdateValue::Set("203.0.113.7".to_string());
/// let last_error = UpdateValue::<String>::Unset;
/// let untouched = UpdateValue::<String>::NoChange;
/// assert!(ip.is_change() && last_error.is_unset() && !untouched.is_change());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum UpdateValue<T> {
    Set(T),
    Unset,
    #[default]
    NoChange,
}

impl<T> UpdateValue<T> {
    /// Build `Set` or `Unset` from a nullable value
    pub fn from_nullable(value: Option<T>) -> Self {
        match value {
            Some(value) => UpdateValue::Set(value),
            None => UpdateValue::Unset,
        }
    }

    /// Check if this update represents a change
    pub fn is_change(&self) -> bool {
        !matches!(self, UpdateValue::NoChange)
    }

    /// Used by `skip_serializing_if` so untouched fields never reach the wire
    pub fn is_no_change(&self) -> bool {
        matches!(self, UpdateValue::NoChange)
    }

    /// Check if this update unsets the value
    pub fn is_unset(&self) -> bool {
        matches!(self, UpdateValue::Unset)
    }

    /// Apply this update to an existing nullable value
    pub fn apply_to(self, existing: Option<T>) -> Option<T> {
        match self {
            UpdateValue::Set(value) => Some(value),
            UpdateValue::Unset => None,
            UpdateValue::NoChange => existing,
        }
    }
}

impl<T: Serialize> Serialize for UpdateValue<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            UpdateValue::Set(value) => value.serialize(serializer),
            UpdateValue::Unset | UpdateValue::NoChange => serializer.serialize_none(),
        }
    }
}
