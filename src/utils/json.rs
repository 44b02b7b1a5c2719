use serde::{Deserialize, Deserializer};

/// Distinguishes an omitted field (`None`) from an explicit `null` (`Some(None)`).
///
/// Use together with `#[serde(default)]` so omitted fields fall back to `None`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
