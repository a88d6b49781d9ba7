//! Common serde helpers for handling null columns from the REST layer

use serde::{Deserialize, Deserializer};

/// Deserialize a nullable column, treating null as `T::default()`
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
