//! Python extension module. Actions and observations cross the boundary as
//! flat float lists; spaces cross as JSON.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::env::{EnvConfig, SimEnv as RustSimEnv};
use crate::error::Error;
use crate::spaces::{Space, flatten, unflatten};

fn runtime_error(e: Error) -> PyErr {
    PyRuntimeError::new_err(e.to_string())
}

fn parse_space(json: &str, which: &str) -> PyResult<Space> {
    let space: Space = serde_json::from_str(json)
        .map_err(|e| PyValueError::new_err(format!("invalid {which} space: {e}")))?;
    space.validate().map_err(runtime_error)?;
    Ok(space)
}

fn space_json(space: &Space) -> PyResult<String> {
    serde_json::to_string(space).map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

/// Gym-style environment backed by an external simulation model.
#[pyclass(name = "SimEnv")]
pub struct SimEnv {
    inner: RustSimEnv,
}

#[pymethods]
impl SimEnv {
    /// Args:
    ///     config_json: environment settings as a JSON object
    ///     action_space_json, observation_space_json: local spaces, both or neither
    #[new]
    #[pyo3(signature = (config_json, action_space_json=None, observation_space_json=None))]
    fn new(
        py: Python<'_>,
        config_json: &str,
        action_space_json: Option<&str>,
        observation_space_json: Option<&str>,
    ) -> PyResult<Self> {
        let config = EnvConfig::from_json_str(config_json).map_err(runtime_error)?;
        let mut builder = RustSimEnv::builder(config);
        match (action_space_json, observation_space_json) {
            (Some(action), Some(observation)) => {
                builder = builder.spaces(
                    parse_space(action, "action")?,
                    parse_space(observation, "observation")?,
                );
            }
            (None, None) => {}
            _ => {
                return Err(PyValueError::new_err(
                    "pass both action_space_json and observation_space_json, or neither",
                ));
            }
        }
        let inner = py.allow_threads(move || builder.build()).map_err(runtime_error)?;
        Ok(Self { inner })
    }

    #[pyo3(signature = (seed=None))]
    fn reset<'py>(
        &mut self,
        py: Python<'py>,
        seed: Option<u64>,
    ) -> PyResult<(Vec<f64>, Bound<'py, PyDict>)> {
        let inner = &mut self.inner;
        let obs = py
            .allow_threads(|| {
                let (obs, _info) = inner.reset(seed)?;
                flatten(inner.observation_space(), &obs)
            })
            .map_err(runtime_error)?;
        Ok((obs, PyDict::new(py)))
    }

    /// Returns `(observation, reward, terminated, truncated, info)`.
    fn step<'py>(
        &mut self,
        py: Python<'py>,
        action: Vec<f64>,
    ) -> PyResult<(Vec<f64>, f64, bool, bool, Bound<'py, PyDict>)> {
        let inner = &mut self.inner;
        let (obs, reward, done, truncated) = py
            .allow_threads(|| {
                let action = unflatten(inner.action_space(), &action)?;
                let t = inner.step(action)?;
                let obs = flatten(inner.observation_space(), &t.obs)?;
                Ok::<_, Error>((obs, t.reward, t.done, t.truncated))
            })
            .map_err(runtime_error)?;
        Ok((obs, reward, done, truncated, PyDict::new(py)))
    }

    fn close(&mut self, py: Python<'_>) -> PyResult<()> {
        let inner = &mut self.inner;
        py.allow_threads(|| inner.close()).map_err(runtime_error)
    }

    fn model_seed(&self, py: Python<'_>) -> PyResult<i64> {
        let inner = &self.inner;
        py.allow_threads(|| inner.model_seed()).map_err(runtime_error)
    }

    fn next_lesson(&mut self) -> PyResult<usize> {
        self.inner.next_lesson().map_err(runtime_error)
    }

    fn action_space_json(&self) -> PyResult<String> {
        space_json(self.inner.action_space())
    }

    fn observation_space_json(&self) -> PyResult<String> {
        space_json(self.inner.observation_space())
    }

    #[getter]
    fn action_dim(&self) -> usize {
        self.inner.action_space().flatdim()
    }

    #[getter]
    fn observation_dim(&self) -> usize {
        self.inner.observation_space().flatdim()
    }
}

/// The name of this function must match the lib.name in Cargo.toml
#[pymodule]
fn simlink(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<SimEnv>()?;
    Ok(())
}
