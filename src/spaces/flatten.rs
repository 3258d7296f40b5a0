use indexmap::IndexMap;

use super::{Space, SpaceValue};
use crate::error::{Error, Result};

/// Flattens `value` into the canonical vector for `space`.
///
/// Leaves are written depth-first in declaration order: discrete values as
/// their integer, continuous arrays row-major, binary and multi-discrete
/// entries element-wise. Dict values are matched to the space by key, so the
/// value's own key order does not matter.
pub fn flatten(space: &Space, value: &SpaceValue) -> Result<Vec<f64>> {
    let mut out = Vec::with_capacity(space.flatdim());
    flatten_into(space, value, &mut out)?;
    Ok(out)
}

fn flatten_into(space: &Space, value: &SpaceValue, out: &mut Vec<f64>) -> Result<()> {
    match (space, value) {
        (Space::Discrete { .. }, SpaceValue::Discrete(v)) => out.push(*v as f64),
        (Space::Continuous { .. }, SpaceValue::Continuous(v)) => {
            expect_len(space, v.len())?;
            out.extend_from_slice(v);
        }
        (Space::MultiBinary { .. }, SpaceValue::MultiBinary(v)) => {
            expect_len(space, v.len())?;
            out.extend(v.iter().map(|b| f64::from(*b)));
        }
        (Space::MultiDiscrete { .. }, SpaceValue::MultiDiscrete(v)) => {
            expect_len(space, v.len())?;
            out.extend(v.iter().map(|x| *x as f64));
        }
        (Space::Tuple { spaces }, SpaceValue::Tuple(values)) => {
            if spaces.len() != values.len() {
                return Err(Error::InvalidValue(format!(
                    "tuple space has {} children, value has {}",
                    spaces.len(),
                    values.len()
                )));
            }
            for (child, v) in spaces.iter().zip(values) {
                flatten_into(child, v, out)?;
            }
        }
        (Space::Dict { spaces }, SpaceValue::Dict(values)) => {
            if spaces.len() != values.len() {
                return Err(Error::InvalidValue(format!(
                    "dict space has {} entries, value has {}",
                    spaces.len(),
                    values.len()
                )));
            }
            for (name, child) in spaces {
                let v = values
                    .get(name)
                    .ok_or_else(|| Error::InvalidValue(format!("dict value is missing `{name}`")))?;
                flatten_into(child, v, out)?;
            }
        }
        _ => {
            return Err(Error::InvalidValue(format!(
                "{} value given for a {} space",
                value.kind(),
                space.kind()
            )));
        }
    }
    Ok(())
}

/// Rebuilds the structured value for `space` from its flat vector.
pub fn unflatten(space: &Space, flat: &[f64]) -> Result<SpaceValue> {
    let expected = space.flatdim();
    if flat.len() != expected {
        return Err(Error::InvalidValue(format!(
            "expected a flat vector of length {expected} for a {} space, got {}",
            space.kind(),
            flat.len()
        )));
    }
    let mut cursor = flat;
    unflatten_from(space, &mut cursor)
}

fn unflatten_from(space: &Space, cursor: &mut &[f64]) -> Result<SpaceValue> {
    let remaining: &[f64] = *cursor;
    let (head, rest) = remaining.split_at(leaf_len(space));
    let value = match space {
        Space::Discrete { .. } => SpaceValue::Discrete(to_int(space, head[0])?),
        Space::Continuous { .. } => SpaceValue::Continuous(head.to_vec()),
        Space::MultiBinary { .. } => SpaceValue::MultiBinary(
            head.iter()
                .map(|x| to_int(space, *x).map(|b| u8::from(b != 0)))
                .collect::<Result<_>>()?,
        ),
        Space::MultiDiscrete { .. } => SpaceValue::MultiDiscrete(
            head.iter()
                .map(|x| to_int(space, *x))
                .collect::<Result<_>>()?,
        ),
        Space::Tuple { spaces } => {
            let mut values = Vec::with_capacity(spaces.len());
            for child in spaces {
                values.push(unflatten_from(child, cursor)?);
            }
            return Ok(SpaceValue::Tuple(values));
        }
        Space::Dict { spaces } => {
            let mut values = IndexMap::with_capacity(spaces.len());
            for (name, child) in spaces {
                values.insert(name.clone(), unflatten_from(child, cursor)?);
            }
            return Ok(SpaceValue::Dict(values));
        }
    };
    *cursor = rest;
    Ok(value)
}

/// Number of elements a leaf consumes; composites consume through their children.
fn leaf_len(space: &Space) -> usize {
    match space {
        Space::Tuple { .. } | Space::Dict { .. } => 0,
        leaf => leaf.flatdim(),
    }
}

fn expect_len(space: &Space, got: usize) -> Result<()> {
    let expected = space.flatdim();
    if got != expected {
        return Err(Error::InvalidValue(format!(
            "{} space expects {expected} elements, value has {got}",
            space.kind()
        )));
    }
    Ok(())
}

/// Rounds an integral entry, refusing NaN and values no `i64` can hold.
fn to_int(space: &Space, x: f64) -> Result<i64> {
    // -2^63 and 2^63 as floats; the upper one is already past i64::MAX.
    const LOWEST: f64 = i64::MIN as f64;
    const PAST_HIGHEST: f64 = -LOWEST;
    let rounded = x.round();
    if !(LOWEST..PAST_HIGHEST).contains(&rounded) {
        return Err(Error::InvalidValue(format!(
            "{} space cannot hold the entry {x}",
            space.kind()
        )));
    }
    Ok(rounded as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple_space() -> Space {
        Space::tuple(vec![
            Space::discrete(3).unwrap(),
            Space::continuous(vec![0.0], vec![1.0]).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn discrete_flattens_to_its_integer() {
        let space = Space::discrete(2).unwrap();
        let flat = flatten(&space, &SpaceValue::Discrete(1)).unwrap();
        assert_eq!(flat, vec![1.0]);
        assert_eq!(unflatten(&space, &flat).unwrap(), SpaceValue::Discrete(1));
    }

    #[test]
    fn continuous_round_trips() {
        let space = Space::continuous(vec![-1.0, -1.0], vec![1.0, 1.0]).unwrap();
        let value = SpaceValue::Continuous(vec![0.3, -0.7]);
        let flat = flatten(&space, &value).unwrap();
        assert_eq!(flat, vec![0.3, -0.7]);
        assert_eq!(unflatten(&space, &flat).unwrap(), value);
    }

    #[test]
    fn tuple_concatenates_children_in_order() {
        let space = tuple_space();
        let value = SpaceValue::Tuple(vec![
            SpaceValue::Discrete(2),
            SpaceValue::Continuous(vec![0.5]),
        ]);
        assert_eq!(flatten(&space, &value).unwrap(), vec![2.0, 0.5]);
        assert_eq!(unflatten(&space, &[2.0, 0.5]).unwrap(), value);
    }

    #[test]
    fn dict_flattens_in_space_order_whatever_the_value_order() {
        let space = Space::dict([
            ("speed", Space::bounded(0.0, 10.0, vec![2]).unwrap()),
            ("gear", Space::discrete_from(4, 1).unwrap()),
        ])
        .unwrap();
        let mut value = IndexMap::new();
        value.insert("gear".to_string(), SpaceValue::Discrete(3));
        value.insert("speed".to_string(), SpaceValue::Continuous(vec![1.5, 2.5]));
        let flat = flatten(&space, &SpaceValue::Dict(value)).unwrap();
        assert_eq!(flat, vec![1.5, 2.5, 3.0]);

        match unflatten(&space, &flat).unwrap() {
            SpaceValue::Dict(back) => {
                let keys: Vec<_> = back.keys().cloned().collect();
                assert_eq!(keys, vec!["speed", "gear"]);
                assert_eq!(back["gear"], SpaceValue::Discrete(3));
            }
            other => panic!("expected dict, got {other:?}"),
        }
    }

    #[test]
    fn nested_dict_inside_tuple_round_trips() {
        let inner = Space::dict([
            ("bits", Space::multi_binary(3).unwrap()),
            ("picks", Space::multi_discrete_from(vec![2, 3], vec![-2, 3]).unwrap()),
        ])
        .unwrap();
        let space = Space::tuple(vec![Space::discrete_from(2, -5).unwrap(), inner]).unwrap();
        let flat = vec![-4.0, 1.0, 0.0, 1.0, -1.0, 5.0];
        let value = unflatten(&space, &flat).unwrap();
        assert_eq!(flatten(&space, &value).unwrap(), flat);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let space = tuple_space();
        assert!(matches!(
            unflatten(&space, &[1.0]),
            Err(Error::InvalidValue(_))
        ));
        let space = Space::multi_binary(3).unwrap();
        assert!(flatten(&space, &SpaceValue::MultiBinary(vec![1, 0])).is_err());
    }

    #[test]
    fn integral_entries_must_be_representable() {
        let space = Space::discrete(2).unwrap();
        assert!(matches!(unflatten(&space, &[f64::NAN]), Err(Error::InvalidValue(_))));
        assert!(matches!(unflatten(&space, &[f64::INFINITY]), Err(Error::InvalidValue(_))));
        assert!(matches!(unflatten(&space, &[1e300]), Err(Error::InvalidValue(_))));
        assert_eq!(unflatten(&space, &[0.8]).unwrap(), SpaceValue::Discrete(1));

        let bits = Space::multi_binary(2).unwrap();
        assert!(matches!(unflatten(&bits, &[1.0, f64::NAN]), Err(Error::InvalidValue(_))));
        let picks = Space::multi_discrete(vec![3, 3]).unwrap();
        assert!(matches!(
            unflatten(&picks, &[f64::NEG_INFINITY, 0.0]),
            Err(Error::InvalidValue(_))
        ));
    }

    #[test]
    fn mismatched_kind_is_rejected() {
        let space = Space::discrete(2).unwrap();
        let err = flatten(&space, &SpaceValue::Continuous(vec![1.0])).unwrap_err();
        assert!(err.to_string().contains("continuous value given for a discrete space"));
    }
}
