//! Custom serde implementations for the Tendermint JSON conventions.

/// Serialize a number as a decimal string, the way Tendermint encodes 64-bit integers.
///
/// Deserialization accepts either a string or a bare JSON number.
pub mod number_as_string {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    /// Implements the serde `serialize` function for a number.
    /// # Errors
    /// Returns an error if the serializer fails to write the string.
    pub fn serialize<T, S>(number: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: ToString,
        S: Serializer,
    {
        serializer.serialize_str(&number.to_string())
    }

    /// Implements the serde `deserialize` function for a number.
    /// # Errors
    /// Returns an error if the value is neither a number nor a string that parses as one.
    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
        D: Deserializer<'de>,
    {
        match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(s) => s.parse().map_err(serde::de::Error::custom),
            StringOrNumber::Number(n) => n.to_string().parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Serialize a [`std::time::Duration`] as a whole number of seconds.
pub mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Implements the serde `serialize` function for a duration.
    /// # Errors
    /// Returns an error if the serializer fails to write the integer.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    /// Implements the serde `deserialize` function for a duration.
    /// # Errors
    /// Returns an error if the value is not an unsigned integer.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
