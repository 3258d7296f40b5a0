//! Conversions between local space descriptors and the model's mirror of them,
//! plus marshaling of flat actions into the primitives the model consumes.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::protocol::{REMOTE_KINDS, RemoteAction, RemoteSpace};
use crate::spaces::{Space, from_optional, to_optional};

pub fn to_remote(space: &Space) -> Result<RemoteSpace> {
    Ok(match space {
        Space::Discrete { n, start } => RemoteSpace::Discrete {
            n: *n,
            start: *start,
        },
        Space::Continuous { low, high, shape } => match shape.as_slice() {
            [1] => RemoteSpace::BoxScalar {
                lb: to_optional(low)[0],
                ub: to_optional(high)[0],
            },
            [_] => RemoteSpace::BoxVector {
                lb: to_optional(low),
                ub: to_optional(high),
            },
            [rows, cols] => RemoteSpace::BoxMatrix {
                rows: *rows,
                cols: *cols,
                lb: to_optional(low).chunks(*cols).map(<[_]>::to_vec).collect(),
                ub: to_optional(high).chunks(*cols).map(<[_]>::to_vec).collect(),
            },
            _ => return Err(Error::unsupported(space.kind(), shape)),
        },
        Space::MultiBinary { n } => RemoteSpace::MultiBinary { n: *n },
        Space::MultiDiscrete { nvec, start } => RemoteSpace::MultiDiscrete {
            nvec: nvec.clone(),
            start: start.clone(),
        },
        Space::Tuple { spaces } => RemoteSpace::Tuple {
            spaces: spaces.iter().map(to_remote).collect::<Result<_>>()?,
        },
        Space::Dict { spaces } => RemoteSpace::Dict {
            names: spaces.keys().cloned().collect(),
            spaces: spaces.values().map(to_remote).collect::<Result<_>>()?,
        },
    })
}

pub fn from_remote(remote: &RemoteSpace) -> Result<Space> {
    match remote {
        RemoteSpace::Discrete { n, start } => Space::discrete_from(*n, *start),
        RemoteSpace::BoxScalar { lb, ub } => Space::continuous(
            from_optional(&[*lb], f64::NEG_INFINITY),
            from_optional(&[*ub], f64::INFINITY),
        ),
        RemoteSpace::BoxVector { lb, ub } => Space::continuous(
            from_optional(lb, f64::NEG_INFINITY),
            from_optional(ub, f64::INFINITY),
        ),
        RemoteSpace::BoxMatrix { rows, cols, lb, ub } => {
            let low = matrix_bounds(lb, *rows, *cols, f64::NEG_INFINITY)?;
            let high = matrix_bounds(ub, *rows, *cols, f64::INFINITY)?;
            Space::continuous_shaped(low, high, vec![*rows, *cols])
        }
        RemoteSpace::MultiBinary { n } => Space::multi_binary(*n),
        RemoteSpace::MultiDiscrete { nvec, start } => {
            Space::multi_discrete_from(nvec.clone(), start.clone())
        }
        RemoteSpace::Tuple { spaces } => {
            Space::tuple(spaces.iter().map(from_remote).collect::<Result<_>>()?)
        }
        RemoteSpace::Dict { names, spaces } => {
            if names.len() != spaces.len() {
                return Err(Error::InvalidSpace(format!(
                    "remote dict has {} names for {} spaces",
                    names.len(),
                    spaces.len()
                )));
            }
            let children = spaces.iter().map(from_remote).collect::<Result<Vec<_>>>()?;
            Space::dict(names.iter().cloned().zip(children))
        }
    }
}

/// Flattens row-major matrix bounds after checking they are exactly `rows x cols`.
fn matrix_bounds(
    bounds: &[Vec<Option<f64>>],
    rows: usize,
    cols: usize,
    unbounded: f64,
) -> Result<Vec<f64>> {
    if bounds.len() != rows || bounds.iter().any(|row| row.len() != cols) {
        return Err(Error::InvalidSpace(format!(
            "remote {rows}x{cols} matrix bounds have rows of lengths {:?}",
            bounds.iter().map(Vec::len).collect::<Vec<_>>()
        )));
    }
    Ok(bounds
        .iter()
        .flat_map(|row| from_optional(row, unbounded))
        .collect())
}

/// Wraps a space the way the model groups action and observation spaces.
pub fn to_remote_list(space: &Space) -> Result<Vec<RemoteSpace>> {
    Ok(vec![to_remote(space)?])
}

/// A single remote space stands for itself; several form a tuple.
pub fn from_remote_list(remote: &[RemoteSpace]) -> Result<Space> {
    match remote {
        [] => Err(Error::InvalidSpace("model returned an empty space list".into())),
        [single] => from_remote(single),
        many => Space::tuple(many.iter().map(from_remote).collect::<Result<_>>()?),
    }
}

/// Decodes a raw space list received from the model, naming the first
/// unknown space kind if decoding fails because of one.
pub fn decode_remote_list(value: Value) -> Result<Vec<RemoteSpace>> {
    match serde_json::from_value::<Vec<RemoteSpace>>(value.clone()) {
        Ok(spaces) => Ok(spaces),
        Err(e) => match find_unknown_kind(&value) {
            Some(kind) => Err(Error::unsupported(kind, &[])),
            None => Err(Error::Connection(format!("malformed space descriptor: {e}"))),
        },
    }
}

fn find_unknown_kind(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(find_unknown_kind),
        Value::Object(map) => {
            if let Some(kind) = map.get("kind").and_then(Value::as_str) {
                if !REMOTE_KINDS.contains(&kind) {
                    return Some(kind.to_string());
                }
            }
            map.get("spaces").and_then(find_unknown_kind)
        }
        _ => None,
    }
}

/// Converts a flat action into the primitive shape the model expects for `space`.
pub fn marshal_action(space: &Space, flat: &[f64]) -> Result<RemoteAction> {
    if flat.len() != space.flatdim() {
        return Err(Error::InvalidValue(format!(
            "action has {} elements, the action space expects {}",
            flat.len(),
            space.flatdim()
        )));
    }
    marshal(space, flat)
}

fn marshal(space: &Space, flat: &[f64]) -> Result<RemoteAction> {
    Ok(match space {
        Space::Discrete { .. } => RemoteAction::Int(flat[0].round() as i64),
        Space::Continuous { shape, .. } => {
            if flat.len() == 1 {
                RemoteAction::Double(flat[0])
            } else {
                match shape.as_slice() {
                    [_] => RemoteAction::Doubles(flat.to_vec()),
                    [_, cols] => {
                        RemoteAction::Matrix(flat.chunks(*cols).map(<[_]>::to_vec).collect())
                    }
                    _ => return Err(Error::unsupported(space.kind(), shape)),
                }
            }
        }
        Space::MultiBinary { .. } | Space::MultiDiscrete { .. } => {
            RemoteAction::Ints(flat.iter().map(|x| x.round() as i64).collect())
        }
        Space::Tuple { spaces } => RemoteAction::Objects(marshal_children(spaces.iter(), flat)?),
        Space::Dict { spaces } => RemoteAction::Objects(marshal_children(spaces.values(), flat)?),
    })
}

fn marshal_children<'a>(
    children: impl Iterator<Item = &'a Space>,
    mut flat: &[f64],
) -> Result<Vec<RemoteAction>> {
    let mut out = Vec::new();
    for child in children {
        let (head, rest) = flat.split_at(child.flatdim());
        out.push(marshal(child, head)?);
        flat = rest;
    }
    Ok(out)
}
