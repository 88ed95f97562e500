//! JSON encoding of prices.
//!
//! Whole amounts are written as integers (`15`), anything else as a float
//! (`12.99`). Both forms are accepted on input.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserializer, Serializer};

pub fn serialize<S: Serializer>(price: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    let normalized = price.normalize();
    if normalized.scale() == 0
        && let Some(whole) = normalized.to_i64()
    {
        return serializer.serialize_i64(whole);
    }
    rust_decimal::serde::float::serialize(price, serializer)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    rust_decimal::serde::float::deserialize(deserializer)
}

/// The same encoding for optional prices.
pub mod option {
    use rust_decimal::Decimal;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        price: &Option<Decimal>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match price {
            Some(price) => super::serialize(price, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Decimal>, D::Error> {
        rust_decimal::serde::float_option::deserialize(deserializer)
    }
}
