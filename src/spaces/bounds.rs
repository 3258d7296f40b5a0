//! JSON cannot carry infinities, so continuous bounds travel as `null` when
//! unbounded: a missing lower bound reads back as `-inf`, a missing upper
//! bound as `+inf`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub(crate) fn to_optional(bounds: &[f64]) -> Vec<Option<f64>> {
    bounds.iter().map(|b| b.is_finite().then_some(*b)).collect()
}

pub(crate) fn from_optional(bounds: &[Option<f64>], unbounded: f64) -> Vec<f64> {
    bounds.iter().map(|b| b.unwrap_or(unbounded)).collect()
}

pub(crate) mod lower {
    use super::*;

    pub fn serialize<S: Serializer>(bounds: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        to_optional(bounds).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let bounds = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(from_optional(&bounds, f64::NEG_INFINITY))
    }
}

pub(crate) mod upper {
    use super::*;

    pub fn serialize<S: Serializer>(bounds: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        to_optional(bounds).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let bounds = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(from_optional(&bounds, f64::INFINITY))
    }
}
