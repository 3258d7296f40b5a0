//! Wire types exchanged with the model: one JSON document per line.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SETUP_COMPLETE: &str = "finishedModelSetup";
pub const TO_STRING: &str = "toString";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: u64, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(message.into()),
        }
    }
}

/// The model-side mirror of a space descriptor.
///
/// Bounds are `None` where the local bound is infinite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RemoteSpace {
    Discrete {
        n: u64,
        start: i64,
    },
    BoxScalar {
        lb: Option<f64>,
        ub: Option<f64>,
    },
    BoxVector {
        lb: Vec<Option<f64>>,
        ub: Vec<Option<f64>>,
    },
    BoxMatrix {
        rows: usize,
        cols: usize,
        lb: Vec<Vec<Option<f64>>>,
        ub: Vec<Vec<Option<f64>>>,
    },
    MultiBinary {
        n: usize,
    },
    MultiDiscrete {
        nvec: Vec<u64>,
        start: Vec<i64>,
    },
    Tuple {
        spaces: Vec<RemoteSpace>,
    },
    Dict {
        names: Vec<String>,
        spaces: Vec<RemoteSpace>,
    },
}

pub(crate) const REMOTE_KINDS: &[&str] = &[
    "discrete",
    "boxScalar",
    "boxVector",
    "boxMatrix",
    "multiBinary",
    "multiDiscrete",
    "tuple",
    "dict",
];

/// An action in the primitive form the model consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemoteAction {
    Int(i64),
    Double(f64),
    Ints(Vec<i64>),
    Doubles(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
    Objects(Vec<RemoteAction>),
}
