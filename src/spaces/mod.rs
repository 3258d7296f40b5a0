mod bounds;
mod flatten;
mod sample;
mod types;

pub use flatten::{flatten, unflatten};
pub use types::{Space, SpaceValue};

pub(crate) use bounds::{from_optional, to_optional};
