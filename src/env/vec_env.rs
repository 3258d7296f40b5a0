use super::traits::Env;
use super::types::{Info, Transition};
use crate::error::{Error, Result};

/// A fixed set of independent environments driven in lockstep.
pub struct VecEnv<E> {
    envs: Vec<E>,
}

impl<E: Env> VecEnv<E> {
    pub fn new<F>(make_env: F, num_envs: usize) -> Result<Self>
    where
        F: Fn(usize) -> Result<E>,
    {
        let envs = (0..num_envs).map(make_env).collect::<Result<_>>()?;
        Ok(Self { envs })
    }

    pub fn len(&self) -> usize {
        self.envs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    pub fn envs(&self) -> &[E] {
        &self.envs
    }

    /// Resets every environment; `seed` is offset by the environment index.
    pub fn reset(&mut self, seed: Option<u64>) -> Result<Vec<(E::Obs, Info)>> {
        self.envs
            .iter_mut()
            .enumerate()
            .map(|(i, env)| env.reset(seed.map(|s| s.wrapping_add(i as u64))))
            .collect()
    }

    pub fn step(&mut self, actions: Vec<E::Act>) -> Result<Vec<Transition<E::Obs>>> {
        if actions.len() != self.envs.len() {
            return Err(Error::Configuration(format!(
                "got {} actions for {} environments",
                actions.len(),
                self.envs.len()
            )));
        }

        self.envs
            .iter_mut()
            .zip(actions)
            .map(|(env, action)| env.step(action))
            .collect()
    }

    pub fn close(&mut self) -> Result<()> {
        for env in &mut self.envs {
            env.close()?;
        }
        Ok(())
    }
}
