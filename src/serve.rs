//! Binds a trained policy to the saved environment contract so it can answer
//! flat observation vectors with flat actions, without any model running.

use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::spaces::{Space, SpaceValue, flatten, unflatten};
use crate::store::SpacesStore;

/// A trained decision function.
pub trait Policy: Send {
    fn compute_action(&self, observation: &SpaceValue) -> Result<SpaceValue>;
}

impl<F> Policy for F
where
    F: Fn(&SpaceValue) -> Result<SpaceValue> + Send,
{
    fn compute_action(&self, observation: &SpaceValue) -> Result<SpaceValue> {
        self(observation)
    }
}

pub struct PolicyServer<P> {
    action_space: Space,
    observation_space: Space,
    policy: P,
}

impl<P: Policy> PolicyServer<P> {
    pub fn new(action_space: Space, observation_space: Space, policy: P) -> Result<Self> {
        action_space.validate()?;
        observation_space.validate()?;
        Ok(Self {
            action_space,
            observation_space,
            policy,
        })
    }

    /// Uses the spaces saved with a training checkpoint.
    pub fn load(checkpoint_dir: impl AsRef<Path>, policy: P) -> Result<Self> {
        let (action_space, observation_space) = SpacesStore::new(checkpoint_dir).load()?;
        Self::new(action_space, observation_space, policy)
    }

    pub fn action_space(&self) -> &Space {
        &self.action_space
    }

    pub fn observation_space(&self) -> &Space {
        &self.observation_space
    }

    pub fn predict(&self, observation: &[f64]) -> Result<Vec<f64>> {
        let observation = unflatten(&self.observation_space, observation)?;
        let action = self.policy.compute_action(&observation)?;
        if !self.action_space.contains(&action) {
            return Err(Error::InvalidValue(format!(
                "policy returned a {} action outside the {} action space",
                action.kind(),
                self.action_space.kind()
            )));
        }
        let flat = flatten(&self.action_space, &action)?;
        debug!(?flat, "Predicted action");
        Ok(flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pushes the cart towards the side the pole leans to.
    fn lean_policy(obs: &SpaceValue) -> Result<SpaceValue> {
        match obs {
            SpaceValue::Continuous(v) => Ok(SpaceValue::Discrete(i64::from(v[2] > 0.0))),
            other => Err(Error::InvalidValue(format!("unexpected {}", other.kind()))),
        }
    }

    fn cartpole_spaces() -> (Space, Space) {
        (
            Space::discrete(2).unwrap(),
            Space::continuous(vec![f64::NEG_INFINITY; 4], vec![f64::INFINITY; 4]).unwrap(),
        )
    }

    #[test]
    fn predicts_flat_actions() {
        let (action, observation) = cartpole_spaces();
        let server = PolicyServer::new(action, observation, lean_policy).unwrap();
        assert_eq!(server.predict(&[0.0, 0.1, 0.05, 0.0]).unwrap(), vec![1.0]);
        assert_eq!(server.predict(&[0.0, 0.1, -0.05, 0.0]).unwrap(), vec![0.0]);
    }

    #[test]
    fn wrong_observation_length_is_rejected() {
        let (action, observation) = cartpole_spaces();
        let server = PolicyServer::new(action, observation, lean_policy).unwrap();
        assert!(matches!(server.predict(&[0.0, 1.0]), Err(Error::InvalidValue(_))));
    }

    #[test]
    fn out_of_space_actions_are_rejected() {
        let (action, observation) = cartpole_spaces();
        let always_five = |_: &SpaceValue| -> Result<SpaceValue> { Ok(SpaceValue::Discrete(5)) };
        let server = PolicyServer::new(action, observation, always_five).unwrap();
        assert!(matches!(
            server.predict(&[0.0; 4]),
            Err(Error::InvalidValue(_))
        ));
    }

    #[test]
    fn actions_far_outside_an_offset_space_are_rejected() {
        let (_, observation) = cartpole_spaces();
        let action = Space::discrete_from(2, -1).unwrap();
        let extreme = |_: &SpaceValue| -> Result<SpaceValue> { Ok(SpaceValue::Discrete(i64::MAX)) };
        let server = PolicyServer::new(action, observation, extreme).unwrap();
        assert!(matches!(
            server.predict(&[0.0; 4]),
            Err(Error::InvalidValue(_))
        ));
    }

    #[test]
    fn loads_spaces_from_a_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let (action, observation) = cartpole_spaces();
        SpacesStore::new(dir.path()).save(&action, &observation).unwrap();

        let server = PolicyServer::load(dir.path(), lean_policy).unwrap();
        assert_eq!(server.action_space(), &action);
        assert_eq!(server.observation_space(), &observation);

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(
            PolicyServer::load(empty.path(), lean_policy),
            Err(Error::Persistence(_))
        ));
    }
}
