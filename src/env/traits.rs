use super::types::{Info, Transition};
use crate::error::Result;

pub trait Env: Send {
    type Obs: Send + Clone + 'static;
    type Act: Send + Clone + 'static;

    fn reset(&mut self, seed: Option<u64>) -> Result<(Self::Obs, Info)>;
    fn step(&mut self, act: Self::Act) -> Result<Transition<Self::Obs>>;
    fn close(&mut self) -> Result<()>;
}
