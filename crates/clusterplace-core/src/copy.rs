//! Deep copy between serde-compatible values

use crate::error::{ClusterPlaceError, ClusterPlaceResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Copy `src` into a freshly deserialized value of type `U`.
///
/// Useful for moving between structurally compatible types (e.g. a typed
/// object and `serde_json::Value`). For same-type copies prefer `Clone`.
pub fn instance_deep_copy<T, U>(src: &T) -> ClusterPlaceResult<U>
where
    T: Serialize + ?Sized,
    U: DeserializeOwned,
{
    let value = serde_json::to_value(src).map_err(|e| ClusterPlaceError::Copy(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| ClusterPlaceError::Copy(e.to_string()))
}
