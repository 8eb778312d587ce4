//! Configuration helpers shared between the core and its drivers

use std::{cmp, fmt};

use rand::distr::uniform::SampleUniform;
use serde::Deserialize;

use crate::Error;

/// Range expression for configuration
///
/// Deserializes from either `constant: n` or `inclusive: { min, max }`.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Copy)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "snake_case")]
pub enum ConfRange<T>
where
    T: PartialEq + cmp::PartialOrd + Clone + Copy,
{
    /// A constant T
    Constant(T),
    /// In which a T is chosen between `min` and `max`, inclusive of `max`.
    Inclusive {
        /// The minimum of the range.
        min: T,
        /// The maximum of the range.
        max: T,
    },
}

impl<T> ConfRange<T>
where
    T: PartialEq + cmp::PartialOrd + Clone + Copy + fmt::Display,
{
    /// Check that the range is well formed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming `field` when `min` exceeds `max`.
    pub fn valid(&self, field: &str) -> Result<(), Error> {
        match self {
            Self::Constant(_) => Ok(()),
            Self::Inclusive { min, max } if min <= max => Ok(()),
            Self::Inclusive { min, max } => Err(Error::Validation(format!(
                "{field} is invalid: min {min} must be less than or equal to max {max}"
            ))),
        }
    }

    /// Lowest value the range can produce
    pub fn start(&self) -> T {
        match self {
            ConfRange::Constant(c) => *c,
            ConfRange::Inclusive { min, .. } => *min,
        }
    }

    /// Highest value the range can produce
    pub fn end(&self) -> T {
        match self {
            ConfRange::Constant(c) => *c,
            ConfRange::Inclusive { max, .. } => *max,
        }
    }
}

impl<T> ConfRange<T>
where
    T: PartialEq + cmp::PartialOrd + Clone + Copy + SampleUniform,
{
    /// Draw a value uniformly from the range
    pub fn sample<R>(&self, rng: &mut R) -> T
    where
        R: rand::Rng + ?Sized,
    {
        match self {
            ConfRange::Constant(c) => *c,
            ConfRange::Inclusive { min, max } => rng.random_range(*min..=*max),
        }
    }
}

impl<T> fmt::Display for ConfRange<T>
where
    T: PartialEq + cmp::PartialOrd + Clone + Copy + fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfRange::Constant(c) => write!(f, "{c}"),
            ConfRange::Inclusive { min, max } if min == max => write!(f, "{min}"),
            ConfRange::Inclusive { min, max } => write!(f, "{min}..={max}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::SmallRng};

    #[test]
    fn inverted_range_rejected() {
        let range = ConfRange::Inclusive { min: 5_u16, max: 1 };
        assert!(matches!(
            range.valid("records_per_pdu"),
            Err(Error::Validation(msg)) if msg.contains("records_per_pdu")
        ));
    }

    #[test]
    fn display_collapses_degenerate_range() {
        assert_eq!(ConfRange::Inclusive { min: 3_u8, max: 3 }.to_string(), "3");
        assert_eq!(ConfRange::Inclusive { min: 1_u8, max: 3 }.to_string(), "1..=3");
        assert_eq!(ConfRange::Constant(7_u8).to_string(), "7");
    }

    proptest! {
        #[test]
        fn sample_within_bounds(seed: u64, a: u16, b: u16) {
            let mut rng = SmallRng::seed_from_u64(seed);
            let (min, max) = if a <= b { (a, b) } else { (b, a) };
            let range = ConfRange::Inclusive { min, max };
            let value = range.sample(&mut rng);
            prop_assert!(value >= range.start());
            prop_assert!(value <= range.end());
        }
    }
}
