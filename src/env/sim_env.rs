use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::{Map, Value};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

use super::config::EnvConfig;
use super::traits::Env;
use super::types::{EnvState, Info, Transition};
use crate::error::{Error, Result};
use crate::model::{GatewayConnector, RemoteModel, RemoteSpace};
use crate::spaces::{Space, SpaceValue, flatten, unflatten};
use crate::store::SpacesStore;
use crate::translate::{from_remote_list, marshal_action, to_remote_list};

/// Per-step events go to `info` for verbose environments and `debug` otherwise.
macro_rules! step_event {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+)
        } else {
            debug!($($arg)+)
        }
    };
}

/// Where the environment's spaces come from.
#[derive(Debug, Clone, PartialEq)]
pub enum SpaceSource {
    /// Defined here and mirrored to the model.
    Local { action: Space, observation: Space },
    /// Defined by the model and fetched at construction.
    Remote,
}

pub struct SimEnvBuilder {
    config: EnvConfig,
    spaces: Option<(Space, Space)>,
    discover: bool,
    lessons: Vec<Map<String, Value>>,
    model: Option<Box<dyn RemoteModel>>,
}

impl SimEnvBuilder {
    pub fn spaces(mut self, action: Space, observation: Space) -> Self {
        self.spaces = Some((action, observation));
        self
    }

    /// Fetch the spaces from the model. This is the default when no local
    /// spaces are given.
    pub fn discover_spaces(mut self) -> Self {
        self.discover = true;
        self
    }

    /// Ordered curriculum. Each lesson's parameters are merged over
    /// `env_params` on reset while that lesson is active.
    pub fn lessons(mut self, lessons: Vec<Map<String, Value>>) -> Self {
        self.lessons = lessons;
        self
    }

    /// Drives an already connected model instead of going through the gateway.
    pub fn model(mut self, model: Box<dyn RemoteModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn build(self) -> Result<SimEnv> {
        let source = match (self.spaces, self.discover) {
            (Some(_), true) => {
                return Err(Error::Configuration(
                    "spaces were given locally and also requested from the model; pick one".into(),
                ));
            }
            (Some((action, observation)), false) => {
                action.validate()?;
                observation.validate()?;
                SpaceSource::Local {
                    action,
                    observation,
                }
            }
            (None, _) => SpaceSource::Remote,
        };

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Connection(format!("could not start the async runtime: {e}")))?;
        let config = self.config;
        let mut env = SimEnv {
            runtime,
            model: None,
            action_space: Space::Discrete { n: 1, start: 0 },
            observation_space: Space::Discrete { n: 1, start: 0 },
            state: EnvState::Uninitialized,
            rng: ChaCha8Rng::from_entropy(),
            store: None,
            spaces_saved: false,
            lessons: self.lessons,
            lesson: 0,
            config,
        };

        if env.config.server_mode_on {
            let (action, observation) = match source {
                SpaceSource::Local {
                    action,
                    observation,
                } => (action, observation),
                SpaceSource::Remote => serving_spaces(&env.config)?,
            };
            env.action_space = action;
            env.observation_space = observation;
            env.state = EnvState::ServingOnly;
            debug!("Environment is serving without a model");
            return Ok(env);
        }

        // Translate before connecting so an untranslatable space never starts a model.
        let local = match source {
            SpaceSource::Local {
                action,
                observation,
            } => {
                let remote = (to_remote_list(&action)?, to_remote_list(&observation)?);
                Some(((action, observation), remote))
            }
            SpaceSource::Remote => None,
        };

        let mut model = match self.model {
            Some(model) => model,
            None => {
                let options = env.config.gateway_options();
                let connector = env.runtime.block_on(GatewayConnector::connect(&options))?;
                Box::new(connector) as Box<dyn RemoteModel>
            }
        };
        env.state = EnvState::Connected;

        match env.runtime.block_on(negotiate(model.as_ref(), local)) {
            Ok((action, observation)) => {
                env.action_space = action;
                env.observation_space = observation;
            }
            Err(e) => {
                if let Err(close_error) = env.runtime.block_on(model.close()) {
                    warn!(error = %close_error, "Failed to shut down the model after a failed setup");
                }
                env.state = EnvState::Closed;
                return Err(e);
            }
        }

        env.model = Some(model);
        env.store = env.config.checkpoint_dir.as_ref().map(SpacesStore::new);
        env.state = EnvState::Ready;
        debug!(
            action = env.action_space.kind(),
            observation = env.observation_space.kind(),
            "Environment ready"
        );
        Ok(env)
    }
}

fn serving_spaces(config: &EnvConfig) -> Result<(Space, Space)> {
    let dir = config.checkpoint_dir.as_ref().ok_or_else(|| {
        Error::Configuration(
            "serving without a model needs either local spaces or a checkpoint_dir".into(),
        )
    })?;
    let store = SpacesStore::new(dir);
    if !store.is_saved() {
        return Err(Error::Configuration(format!(
            "no saved spaces under '{}'",
            store.dir().display()
        )));
    }
    store.load()
}

async fn negotiate(
    model: &dyn RemoteModel,
    local: Option<((Space, Space), (Vec<RemoteSpace>, Vec<RemoteSpace>))>,
) -> Result<(Space, Space)> {
    let defined = model.has_spaces_defined().await?;
    match (local, defined) {
        (Some(_), true) => Err(Error::Configuration(
            "the model already defines its spaces; do not pass spaces to the environment".into(),
        )),
        (Some((spaces, (action, observation))), false) => {
            model.define_spaces(action, observation).await?;
            Ok(spaces)
        }
        (None, false) => Err(Error::Configuration(
            "the model defines no spaces; define them in the model or pass them to the environment"
                .into(),
        )),
        (None, true) => {
            let action = from_remote_list(&model.get_action_space().await?)?;
            let observation = from_remote_list(&model.get_observation_space().await?)?;
            Ok((action, observation))
        }
    }
}

/// Gym-style environment backed by an external simulation model.
///
/// All calls block; the environment drives its own single-threaded runtime and
/// must not be used from inside another async runtime.
pub struct SimEnv {
    config: EnvConfig,
    runtime: Runtime,
    model: Option<Box<dyn RemoteModel>>,
    action_space: Space,
    observation_space: Space,
    state: EnvState,
    rng: ChaCha8Rng,
    store: Option<SpacesStore>,
    spaces_saved: bool,
    lessons: Vec<Map<String, Value>>,
    lesson: usize,
}

impl SimEnv {
    pub fn builder(config: EnvConfig) -> SimEnvBuilder {
        SimEnvBuilder {
            config,
            spaces: None,
            discover: false,
            lessons: Vec::new(),
            model: None,
        }
    }

    pub fn state(&self) -> EnvState {
        self.state
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn action_space(&self) -> &Space {
        &self.action_space
    }

    pub fn observation_space(&self) -> &Space {
        &self.observation_space
    }

    /// The seed the model is running with.
    pub fn model_seed(&self) -> Result<i64> {
        let model = self.connected("read the model seed")?;
        self.runtime.block_on(model.get_seed())
    }

    /// Index of the active lesson, if a curriculum was given.
    pub fn lesson(&self) -> Option<usize> {
        (!self.lessons.is_empty()).then_some(self.lesson)
    }

    /// Moves to the next lesson and returns its index.
    pub fn next_lesson(&mut self) -> Result<usize> {
        if self.lesson + 1 >= self.lessons.len() {
            return Err(Error::Configuration(format!(
                "no lesson after lesson {} of {}",
                self.lesson,
                self.lessons.len()
            )));
        }
        self.lesson += 1;
        info!(lesson = self.lesson, "Advanced to the next lesson");
        Ok(self.lesson)
    }

    pub fn reset(&mut self, seed: Option<u64>) -> Result<(SpaceValue, Info)> {
        match self.state {
            EnvState::ServingOnly => {
                if let Some(seed) = seed {
                    self.rng = ChaCha8Rng::seed_from_u64(seed);
                }
                return Ok((self.observation_space.sample(&mut self.rng), Info::new()));
            }
            EnvState::Ready | EnvState::Stepping => {}
            state => {
                return Err(Error::InvalidState {
                    state,
                    operation: "reset",
                });
            }
        }
        if seed.is_some() {
            return Err(Error::Configuration(
                "the model owns its random seed; set it in the model and read it with model_seed()"
                    .into(),
            ));
        }

        let params = self.reset_params();
        let model = self.connected("reset")?;
        let obs = self
            .runtime
            .block_on(model.reset(params))
            .and_then(|flat| unflatten(&self.observation_space, &flat));
        let obs = self.end_episode_on_error(obs)?;
        self.persist_spaces()?;
        self.state = EnvState::Stepping;
        step_event!(self.config.verbose, lesson = ?self.lesson(), "Episode reset");
        Ok((obs, Info::new()))
    }

    pub fn step(&mut self, action: SpaceValue) -> Result<Transition<SpaceValue>> {
        match self.state {
            EnvState::ServingOnly => {
                return Ok(Transition {
                    obs: self.observation_space.sample(&mut self.rng),
                    reward: 0.0,
                    done: true,
                    truncated: false,
                    info: Info::new(),
                });
            }
            EnvState::Stepping => {}
            state => {
                return Err(Error::InvalidState {
                    state,
                    operation: "step",
                });
            }
        }

        let flat = flatten(&self.action_space, &action)?;
        let remote = marshal_action(&self.action_space, &flat)?;
        let model = self.connected("step")?;
        let outcome = self
            .runtime
            .block_on(async {
                model.step(remote).await?;
                let state = model.get_state().await?;
                let reward = model.get_reward().await?;
                let done = model.has_finished().await?;
                Ok::<_, Error>((state, reward, done))
            })
            .and_then(|(state, reward, done)| {
                Ok((unflatten(&self.observation_space, &state)?, reward, done))
            });
        let (obs, reward, done) = self.end_episode_on_error(outcome)?;
        if done {
            self.state = EnvState::Ready;
        }
        step_event!(self.config.verbose, reward, done, "Step");
        Ok(Transition {
            obs,
            reward,
            done,
            truncated: false,
            info: Info::new(),
        })
    }

    /// Saves the spaces if needed and shuts the model down. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.state == EnvState::Closed {
            return Ok(());
        }
        let persisted = if self.state == EnvState::ServingOnly {
            Ok(())
        } else {
            self.persist_spaces()
        };
        let shutdown = match self.model.as_mut() {
            Some(model) => self.runtime.block_on(model.close()),
            None => Ok(()),
        };
        self.model = None;
        self.state = EnvState::Closed;
        debug!("Environment closed");
        persisted.and(shutdown)
    }

    /// The model may have advanced before a failed exchange, so the episode
    /// is over and a new `reset` is required.
    fn end_episode_on_error<T>(&mut self, outcome: Result<T>) -> Result<T> {
        if let Err(e) = &outcome {
            warn!(error = %e, "Remote exchange failed; the episode needs a reset");
            self.state = EnvState::Ready;
        }
        outcome
    }

    fn connected(&self, operation: &'static str) -> Result<&dyn RemoteModel> {
        self.model.as_deref().ok_or(Error::InvalidState {
            state: self.state,
            operation,
        })
    }

    fn reset_params(&self) -> Option<Map<String, Value>> {
        let mut params = self.config.env_params.clone();
        if let Some(lesson) = self.lessons.get(self.lesson) {
            params.extend(lesson.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        (!params.is_empty()).then_some(params)
    }

    fn persist_spaces(&mut self) -> Result<()> {
        if self.spaces_saved {
            return Ok(());
        }
        if let Some(store) = &self.store {
            if store.save(&self.action_space, &self.observation_space)? {
                info!(dir = %store.dir().display(), "Saved environment spaces");
            }
        }
        self.spaces_saved = true;
        Ok(())
    }
}

impl Env for SimEnv {
    type Obs = SpaceValue;
    type Act = SpaceValue;

    fn reset(&mut self, seed: Option<u64>) -> Result<(SpaceValue, Info)> {
        SimEnv::reset(self, seed)
    }

    fn step(&mut self, act: SpaceValue) -> Result<Transition<SpaceValue>> {
        SimEnv::step(self, act)
    }

    fn close(&mut self) -> Result<()> {
        SimEnv::close(self)
    }
}

impl Drop for SimEnv {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "Failed to close the environment on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::model::RemoteAction;

    #[derive(Default)]
    struct Calls {
        log: Vec<String>,
        reset_params: Vec<Option<Map<String, Value>>>,
        closes: usize,
    }

    /// Counts steps and finishes the episode after `horizon` of them.
    struct FakeModel {
        spaces: Option<(Space, Space)>,
        horizon: u32,
        /// `get_state` raises once the step counter reaches this value.
        broken_state_at: Option<u32>,
        steps: Mutex<u32>,
        calls: Arc<Mutex<Calls>>,
    }

    impl FakeModel {
        fn new(spaces: Option<(Space, Space)>, horizon: u32) -> (Self, Arc<Mutex<Calls>>) {
            let calls = Arc::new(Mutex::new(Calls::default()));
            let model = Self {
                spaces,
                horizon,
                broken_state_at: None,
                steps: Mutex::new(0),
                calls: calls.clone(),
            };
            (model, calls)
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().log.push(call.into());
        }

        fn state(&self) -> Vec<f64> {
            let steps = *self.steps.lock().unwrap() as f64;
            vec![steps, -steps]
        }
    }

    #[async_trait]
    impl RemoteModel for FakeModel {
        async fn reset(&self, params: Option<Map<String, Value>>) -> Result<Vec<f64>> {
            self.record("reset");
            self.calls.lock().unwrap().reset_params.push(params);
            *self.steps.lock().unwrap() = 0;
            Ok(self.state())
        }

        async fn step(&self, action: RemoteAction) -> Result<()> {
            self.record(format!("step {action:?}"));
            *self.steps.lock().unwrap() += 1;
            Ok(())
        }

        async fn get_state(&self) -> Result<Vec<f64>> {
            let steps = *self.steps.lock().unwrap();
            if self.broken_state_at.is_some_and(|at| steps >= at) {
                return Err(Error::Connection("model raised an exception in `getState`".into()));
            }
            Ok(self.state())
        }

        async fn get_reward(&self) -> Result<f64> {
            Ok(1.0)
        }

        async fn has_finished(&self) -> Result<bool> {
            Ok(*self.steps.lock().unwrap() >= self.horizon)
        }

        async fn get_seed(&self) -> Result<i64> {
            Ok(42)
        }

        async fn has_spaces_defined(&self) -> Result<bool> {
            self.record("hasSpacesDefined");
            Ok(self.spaces.is_some())
        }

        async fn get_action_space(&self) -> Result<Vec<RemoteSpace>> {
            self.spaces
                .as_ref()
                .map_or(Ok(vec![]), |(action, _)| to_remote_list(action))
        }

        async fn get_observation_space(&self) -> Result<Vec<RemoteSpace>> {
            self.spaces
                .as_ref()
                .map_or(Ok(vec![]), |(_, observation)| to_remote_list(observation))
        }

        async fn define_spaces(
            &self,
            _action: Vec<RemoteSpace>,
            _observation: Vec<RemoteSpace>,
        ) -> Result<()> {
            self.record("defineSpaces");
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.calls.lock().unwrap().closes += 1;
            Ok(())
        }
    }

    fn cartpole() -> (Space, Space) {
        (
            Space::discrete(2).unwrap(),
            Space::continuous(vec![f64::NEG_INFINITY; 2], vec![f64::INFINITY; 2]).unwrap(),
        )
    }

    fn training_config() -> EnvConfig {
        EnvConfig {
            run_exported_model: false,
            ..EnvConfig::default()
        }
    }

    #[test]
    fn discovered_spaces_drive_an_episode() {
        let (model, calls) = FakeModel::new(Some(cartpole()), 3);
        let mut env = SimEnv::builder(training_config())
            .model(Box::new(model))
            .build()
            .unwrap();
        assert_eq!(env.state(), EnvState::Ready);
        assert_eq!(env.action_space(), &cartpole().0);

        let (obs, info) = env.reset(None).unwrap();
        assert_eq!(obs, SpaceValue::Continuous(vec![0.0, 0.0]));
        assert!(info.is_empty());

        let mut done = false;
        let mut steps = 0;
        while !done {
            let t = env.step(SpaceValue::Discrete(1)).unwrap();
            assert_eq!(t.reward, 1.0);
            assert!(!t.truncated);
            done = t.done;
            steps += 1;
        }
        assert_eq!(steps, 3);
        assert_eq!(env.state(), EnvState::Ready);
        assert!(matches!(
            env.step(SpaceValue::Discrete(0)),
            Err(Error::InvalidState {
                state: EnvState::Ready,
                ..
            })
        ));

        env.close().unwrap();
        env.close().unwrap();
        assert_eq!(env.state(), EnvState::Closed);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.closes, 1);
        assert!(calls.log.iter().any(|c| c == "step Int(1)"));
        assert_eq!(calls.reset_params, vec![None]);
    }

    #[test]
    fn failed_exchange_ends_the_episode() {
        let (mut model, calls) = FakeModel::new(Some(cartpole()), 10);
        model.broken_state_at = Some(1);
        let mut env = SimEnv::builder(training_config())
            .model(Box::new(model))
            .build()
            .unwrap();
        env.reset(None).unwrap();

        assert!(matches!(
            env.step(SpaceValue::Discrete(1)),
            Err(Error::Connection(_))
        ));
        assert_eq!(env.state(), EnvState::Ready);
        assert!(matches!(
            env.step(SpaceValue::Discrete(1)),
            Err(Error::InvalidState {
                state: EnvState::Ready,
                operation: "step"
            })
        ));
        let steps = calls.lock().unwrap().log.iter().filter(|c| c.starts_with("step")).count();
        assert_eq!(steps, 1);

        // A malformed action never reaches the model and keeps the episode alive.
        env.reset(None).unwrap();
        assert!(matches!(
            env.step(SpaceValue::Continuous(vec![0.5])),
            Err(Error::InvalidValue(_))
        ));
        assert_eq!(env.state(), EnvState::Stepping);
    }

    #[test]
    fn malformed_reset_observation_requires_a_new_reset() {
        let (model, _) = FakeModel::new(Some(cartpole()), 3);
        let observation = Space::continuous(vec![0.0; 3], vec![1.0; 3]).unwrap();
        let mut env = SimEnv::builder(training_config())
            .model(Box::new(model))
            .build()
            .unwrap();
        // Swap in an observation space the model's two-element states cannot fill.
        env.observation_space = observation;
        assert!(matches!(env.reset(None), Err(Error::InvalidValue(_))));
        assert_eq!(env.state(), EnvState::Ready);
    }

    #[test]
    fn step_before_reset_is_rejected() {
        let (model, _) = FakeModel::new(Some(cartpole()), 3);
        let mut env = SimEnv::builder(training_config())
            .model(Box::new(model))
            .build()
            .unwrap();
        let err = env.step(SpaceValue::Discrete(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidState { operation: "step", .. }));
    }

    #[test]
    fn local_spaces_are_mirrored_to_a_model_without_spaces() {
        let (model, calls) = FakeModel::new(None, 3);
        let (action, observation) = cartpole();
        let env = SimEnv::builder(training_config())
            .spaces(action.clone(), observation)
            .model(Box::new(model))
            .build()
            .unwrap();
        assert_eq!(env.action_space(), &action);
        let log = calls.lock().unwrap().log.clone();
        assert_eq!(log, vec!["hasSpacesDefined", "defineSpaces"]);
    }

    #[test]
    fn contradictory_space_sources_are_configuration_errors() {
        let (action, observation) = cartpole();

        let (model, calls) = FakeModel::new(None, 3);
        let result = SimEnv::builder(training_config())
            .spaces(action.clone(), observation.clone())
            .discover_spaces()
            .model(Box::new(model))
            .build();
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert!(calls.lock().unwrap().log.is_empty());

        let (model, calls) = FakeModel::new(Some(cartpole()), 3);
        let result = SimEnv::builder(training_config())
            .spaces(action, observation)
            .model(Box::new(model))
            .build();
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert_eq!(calls.lock().unwrap().closes, 1);

        let (model, calls) = FakeModel::new(None, 3);
        let result = SimEnv::builder(training_config())
            .model(Box::new(model))
            .build();
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert_eq!(calls.lock().unwrap().closes, 1);
    }

    #[test]
    fn untranslatable_local_spaces_fail_before_any_call() {
        let (model, calls) = FakeModel::new(None, 3);
        let cube = Space::bounded(0.0, 1.0, vec![2, 2, 2]).unwrap();
        let result = SimEnv::builder(training_config())
            .spaces(Space::discrete(2).unwrap(), cube)
            .model(Box::new(model))
            .build();
        assert!(matches!(
            result,
            Err(Error::UnsupportedSpaceKind { ref shape, .. }) if shape == &vec![2, 2, 2]
        ));
        assert!(calls.lock().unwrap().log.is_empty());
    }

    #[test]
    fn custom_seed_is_rejected_in_training_mode() {
        let (model, calls) = FakeModel::new(Some(cartpole()), 3);
        let mut env = SimEnv::builder(training_config())
            .model(Box::new(model))
            .build()
            .unwrap();
        assert!(matches!(env.reset(Some(7)), Err(Error::Configuration(_))));
        assert!(!calls.lock().unwrap().log.iter().any(|c| c == "reset"));
        assert_eq!(env.model_seed().unwrap(), 42);
    }

    #[test]
    fn lessons_override_env_params() {
        let (model, calls) = FakeModel::new(Some(cartpole()), 3);
        let mut config = training_config();
        config.env_params.insert("length".into(), Value::from(1.0));
        config.env_params.insert("mass".into(), Value::from(2.0));
        let lessons = vec![
            Map::from_iter([("length".to_string(), Value::from(0.5))]),
            Map::from_iter([("length".to_string(), Value::from(0.8))]),
        ];
        let mut env = SimEnv::builder(config)
            .lessons(lessons)
            .model(Box::new(model))
            .build()
            .unwrap();

        assert_eq!(env.lesson(), Some(0));
        env.reset(None).unwrap();
        assert_eq!(env.next_lesson().unwrap(), 1);
        env.reset(None).unwrap();
        assert!(matches!(env.next_lesson(), Err(Error::Configuration(_))));

        let calls = calls.lock().unwrap();
        let lengths: Vec<_> = calls
            .reset_params
            .iter()
            .map(|p| p.as_ref().unwrap()["length"].clone())
            .collect();
        assert_eq!(lengths, vec![Value::from(0.5), Value::from(0.8)]);
        assert_eq!(calls.reset_params[0].as_ref().unwrap()["mass"], 2.0);
    }

    #[test]
    fn spaces_are_saved_once_on_first_reset() {
        let dir = tempfile::tempdir().unwrap();
        let (model, _) = FakeModel::new(Some(cartpole()), 3);
        let mut config = training_config();
        config.checkpoint_dir = Some(dir.path().to_path_buf());
        let mut env = SimEnv::builder(config)
            .model(Box::new(model))
            .build()
            .unwrap();
        let store = SpacesStore::new(dir.path());
        assert!(!store.is_saved());
        env.reset(None).unwrap();
        assert!(store.is_saved());
        assert_eq!(store.load().unwrap(), cartpole());
    }

    #[test]
    fn close_saves_spaces_when_never_reset() {
        let dir = tempfile::tempdir().unwrap();
        let (model, _) = FakeModel::new(Some(cartpole()), 3);
        let mut config = training_config();
        config.checkpoint_dir = Some(dir.path().to_path_buf());
        let env = SimEnv::builder(config)
            .model(Box::new(model))
            .build()
            .unwrap();
        drop(env);
        assert!(SpacesStore::new(dir.path()).is_saved());
    }

    #[test]
    fn closed_environment_rejects_calls() {
        let (model, _) = FakeModel::new(Some(cartpole()), 3);
        let mut env = SimEnv::builder(training_config())
            .model(Box::new(model))
            .build()
            .unwrap();
        env.close().unwrap();
        assert!(matches!(
            env.reset(None),
            Err(Error::InvalidState {
                state: EnvState::Closed,
                operation: "reset"
            })
        ));
        assert!(matches!(env.model_seed(), Err(Error::InvalidState { .. })));
    }
}
