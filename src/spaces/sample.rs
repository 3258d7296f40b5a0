use indexmap::IndexMap;
use rand::Rng;

use super::{Space, SpaceValue};

impl Space {
    /// Draws a structurally valid element of this space.
    ///
    /// Bounded continuous intervals are sampled uniformly, half-bounded ones
    /// from a shifted exponential and unbounded ones from a standard normal.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> SpaceValue {
        match self {
            Space::Discrete { n, start } => {
                SpaceValue::Discrete(start.wrapping_add(rng.gen_range(0..*n) as i64))
            }
            Space::Continuous { low, high, .. } => SpaceValue::Continuous(
                low.iter()
                    .zip(high)
                    .map(|(lo, hi)| sample_interval(rng, *lo, *hi))
                    .collect(),
            ),
            Space::MultiBinary { n } => {
                SpaceValue::MultiBinary((0..*n).map(|_| u8::from(rng.gen_bool(0.5))).collect())
            }
            Space::MultiDiscrete { nvec, start } => SpaceValue::MultiDiscrete(
                nvec.iter()
                    .zip(start)
                    .map(|(n, s)| s.wrapping_add(rng.gen_range(0..*n) as i64))
                    .collect(),
            ),
            Space::Tuple { spaces } => {
                SpaceValue::Tuple(spaces.iter().map(|child| child.sample(rng)).collect())
            }
            Space::Dict { spaces } => SpaceValue::Dict(
                spaces
                    .iter()
                    .map(|(name, child)| (name.clone(), child.sample(rng)))
                    .collect::<IndexMap<_, _>>(),
            ),
        }
    }

    /// Whether `value` is an element of this space.
    pub fn contains(&self, value: &SpaceValue) -> bool {
        match (self, value) {
            (Space::Discrete { n, start }, SpaceValue::Discrete(v)) => in_range(*v, *start, *n),
            (Space::Continuous { low, high, .. }, SpaceValue::Continuous(v)) => {
                v.len() == low.len()
                    && v.iter()
                        .zip(low.iter().zip(high))
                        .all(|(x, (lo, hi))| *x >= *lo && *x <= *hi)
            }
            (Space::MultiBinary { n }, SpaceValue::MultiBinary(v)) => {
                v.len() == *n && v.iter().all(|b| *b <= 1)
            }
            (Space::MultiDiscrete { nvec, start }, SpaceValue::MultiDiscrete(v)) => {
                v.len() == nvec.len()
                    && v.iter()
                        .zip(nvec.iter().zip(start))
                        .all(|(x, (n, s))| in_range(*x, *s, *n))
            }
            (Space::Tuple { spaces }, SpaceValue::Tuple(values)) => {
                spaces.len() == values.len()
                    && spaces.iter().zip(values).all(|(s, v)| s.contains(v))
            }
            (Space::Dict { spaces }, SpaceValue::Dict(values)) => {
                spaces.len() == values.len()
                    && spaces
                        .iter()
                        .all(|(name, s)| values.get(name).is_some_and(|v| s.contains(v)))
            }
            _ => false,
        }
    }
}

/// Whether `v` lies in `[start, start + n)`, without overflowing at the extremes.
fn in_range(v: i64, start: i64, n: u64) -> bool {
    let offset = i128::from(v) - i128::from(start);
    offset >= 0 && offset < i128::from(n)
}

fn sample_interval<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> f64 {
    match (low.is_finite(), high.is_finite()) {
        (true, true) => low + (high - low) * rng.r#gen::<f64>(),
        (true, false) => low + exponential(rng),
        (false, true) => high - exponential(rng),
        (false, false) => standard_normal(rng),
    }
}

fn exponential<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // Uniform draws are in [0, 1), so 1 - u is never zero.
    -(1.0 - rng.r#gen::<f64>()).ln()
}

fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1 = 1.0 - rng.r#gen::<f64>();
    let u2 = rng.r#gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}
