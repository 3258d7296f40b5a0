use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::bounds;
use crate::error::{Error, Result};

/// Structured description of the domain of an action or an observation.
///
/// Composite spaces are ordered: flattening walks the children depth-first in
/// declaration order. Build spaces through the constructors, which enforce the
/// invariants below; descriptors decoded from disk or from the model are
/// checked with [`Space::validate`].
///
/// - `Discrete`: `n >= 1`.
/// - `Continuous`: `low`/`high` hold one bound per element of `shape` in
///   row-major order, `low[i] <= high[i]`, bounds may be infinite.
/// - `MultiBinary`: `n >= 1`.
/// - `MultiDiscrete`: one `start` per `nvec` entry, every `nvec[i] >= 1`.
/// - `Tuple`: at least two children, none of them a tuple.
/// - `Dict`: at least one child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Space {
    /// Integers in `[start, start + n)`.
    Discrete { n: u64, start: i64 },
    Continuous {
        #[serde(with = "bounds::lower")]
        low: Vec<f64>,
        #[serde(with = "bounds::upper")]
        high: Vec<f64>,
        shape: Vec<usize>,
    },
    MultiBinary { n: usize },
    MultiDiscrete { nvec: Vec<u64>, start: Vec<i64> },
    Tuple { spaces: Vec<Space> },
    Dict { spaces: IndexMap<String, Space> },
}

/// A concrete element of a [`Space`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceValue {
    Discrete(i64),
    /// Row-major elements.
    Continuous(Vec<f64>),
    MultiBinary(Vec<u8>),
    MultiDiscrete(Vec<i64>),
    Tuple(Vec<SpaceValue>),
    Dict(IndexMap<String, SpaceValue>),
}

impl Space {
    pub fn discrete(n: u64) -> Result<Self> {
        Self::discrete_from(n, 0)
    }

    pub fn discrete_from(n: u64, start: i64) -> Result<Self> {
        let space = Space::Discrete { n, start };
        space.validate()?;
        Ok(space)
    }

    /// One-dimensional continuous space with per-element bounds.
    pub fn continuous(low: Vec<f64>, high: Vec<f64>) -> Result<Self> {
        let shape = vec![low.len()];
        Self::continuous_shaped(low, high, shape)
    }

    pub fn continuous_shaped(low: Vec<f64>, high: Vec<f64>, shape: Vec<usize>) -> Result<Self> {
        let space = Space::Continuous { low, high, shape };
        space.validate()?;
        Ok(space)
    }

    /// Continuous space where every element shares the same bounds.
    pub fn bounded(low: f64, high: f64, shape: Vec<usize>) -> Result<Self> {
        let len = shape_len(&shape)?;
        Self::continuous_shaped(vec![low; len], vec![high; len], shape)
    }

    pub fn multi_binary(n: usize) -> Result<Self> {
        let space = Space::MultiBinary { n };
        space.validate()?;
        Ok(space)
    }

    pub fn multi_discrete(nvec: Vec<u64>) -> Result<Self> {
        let start = vec![0; nvec.len()];
        Self::multi_discrete_from(nvec, start)
    }

    pub fn multi_discrete_from(nvec: Vec<u64>, start: Vec<i64>) -> Result<Self> {
        let space = Space::MultiDiscrete { nvec, start };
        space.validate()?;
        Ok(space)
    }

    pub fn tuple(spaces: Vec<Space>) -> Result<Self> {
        let space = Space::Tuple { spaces };
        space.validate()?;
        Ok(space)
    }

    /// Named composite; iteration order of `entries` becomes the flattening order.
    pub fn dict<I, K>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Space)>,
        K: Into<String>,
    {
        let mut spaces = IndexMap::new();
        for (name, child) in entries {
            let name = name.into();
            if spaces.contains_key(&name) {
                return Err(Error::InvalidSpace(format!("duplicate dict key `{name}`")));
            }
            spaces.insert(name, child);
        }
        let space = Space::Dict { spaces };
        space.validate()?;
        Ok(space)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Space::Discrete { .. } => "discrete",
            Space::Continuous { .. } => "continuous",
            Space::MultiBinary { .. } => "multi_binary",
            Space::MultiDiscrete { .. } => "multi_discrete",
            Space::Tuple { .. } => "tuple",
            Space::Dict { .. } => "dict",
        }
    }

    /// Length of the flat vector representing any element of this space.
    pub fn flatdim(&self) -> usize {
        match self {
            Space::Discrete { .. } => 1,
            Space::Continuous { shape, .. } => shape.iter().product(),
            Space::MultiBinary { n } => *n,
            Space::MultiDiscrete { nvec, .. } => nvec.len(),
            Space::Tuple { spaces } => spaces.iter().map(Space::flatdim).sum(),
            Space::Dict { spaces } => spaces.values().map(Space::flatdim).sum(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Space::Discrete { n, .. } => {
                if *n == 0 {
                    return Err(Error::InvalidSpace("discrete space needs n >= 1".into()));
                }
            }
            Space::Continuous { low, high, shape } => {
                if shape.is_empty() || shape.contains(&0) {
                    return Err(Error::InvalidSpace(format!(
                        "continuous shape {shape:?} must have only non-zero dimensions"
                    )));
                }
                let len = shape_len(shape)?;
                if low.len() != len || high.len() != len {
                    return Err(Error::InvalidSpace(format!(
                        "continuous shape {shape:?} needs {len} bounds, got {} low and {} high",
                        low.len(),
                        high.len()
                    )));
                }
                for (i, (lo, hi)) in low.iter().zip(high).enumerate() {
                    if lo.is_nan() || hi.is_nan() || lo > hi {
                        return Err(Error::InvalidSpace(format!(
                            "continuous bounds at index {i} are not ordered: [{lo}, {hi}]"
                        )));
                    }
                }
            }
            Space::MultiBinary { n } => {
                if *n == 0 {
                    return Err(Error::InvalidSpace("multi-binary space needs n >= 1".into()));
                }
            }
            Space::MultiDiscrete { nvec, start } => {
                if nvec.is_empty() {
                    return Err(Error::InvalidSpace("multi-discrete space is empty".into()));
                }
                if nvec.len() != start.len() {
                    return Err(Error::InvalidSpace(format!(
                        "multi-discrete space has {} cardinalities but {} offsets",
                        nvec.len(),
                        start.len()
                    )));
                }
                if nvec.contains(&0) {
                    return Err(Error::InvalidSpace(
                        "multi-discrete cardinalities must be >= 1".into(),
                    ));
                }
            }
            Space::Tuple { spaces } => {
                if spaces.len() < 2 {
                    return Err(Error::InvalidSpace(format!(
                        "tuple space needs at least 2 children, got {}",
                        spaces.len()
                    )));
                }
                for child in spaces {
                    if matches!(child, Space::Tuple { .. }) {
                        return Err(Error::InvalidSpace("tuple spaces cannot be nested".into()));
                    }
                    child.validate()?;
                }
            }
            Space::Dict { spaces } => {
                if spaces.is_empty() {
                    return Err(Error::InvalidSpace("dict space is empty".into()));
                }
                for child in spaces.values() {
                    child.validate()?;
                }
            }
        }
        Ok(())
    }
}

impl SpaceValue {
    pub fn kind(&self) -> &'static str {
        match self {
            SpaceValue::Discrete(_) => "discrete",
            SpaceValue::Continuous(_) => "continuous",
            SpaceValue::MultiBinary(_) => "multi_binary",
            SpaceValue::MultiDiscrete(_) => "multi_discrete",
            SpaceValue::Tuple(_) => "tuple",
            SpaceValue::Dict(_) => "dict",
        }
    }
}

/// Number of elements in a continuous shape, rejecting shapes too large to index.
fn shape_len(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |len, dim| len.checked_mul(*dim))
        .ok_or_else(|| Error::InvalidSpace(format!("continuous shape {shape:?} is too large")))
}
