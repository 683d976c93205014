use super::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{cmp::Eq, hash::Hash};

/// Represent a simple privacy budget
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Unchecked")]
pub struct DpParameters {
    epsilon: f64,
    /// The composition factor: the number of times the query is expected to be repeated
    repeat: usize,
}

fn default_repeat() -> usize {
    1
}

impl DpParameters {
    pub fn new(epsilon: f64, repeat: usize) -> Result<DpParameters> {
        if !(epsilon.is_finite() && epsilon > 0.) {
            return Err(Error::budget_error(format!("epsilon = {} should be positive", epsilon)));
        }
        if repeat < 1 {
            return Err(Error::budget_error("repeat should be at least 1"));
        }
        Ok(DpParameters { epsilon, repeat })
    }

    pub fn from_epsilon(epsilon: f64) -> Result<DpParameters> {
        DpParameters::new(epsilon, 1)
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn repeat(&self) -> usize {
        self.repeat
    }

    /// The number of releases sharing epsilon when a query noises `columns` raw aggregates
    pub fn composition(&self, columns: usize) -> f64 {
        (columns.max(1) * self.repeat) as f64
    }
}

impl Hash for DpParameters {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Hash::hash(&self.epsilon.to_be_bytes(), state);
        Hash::hash(&self.repeat, state);
    }
}

impl Eq for DpParameters {}

#[derive(Deserialize)]
struct Unchecked {
    epsilon: f64,
    #[serde(default = "default_repeat")]
    repeat: usize,
}

impl TryFrom<Unchecked> for DpParameters {
    type Error = Error;

    fn try_from(value: Unchecked) -> Result<Self> {
        DpParameters::new(value.epsilon, value.repeat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters() {
        let parameters = DpParameters::from_epsilon(0.5).unwrap();
        assert_eq!(parameters.repeat(), 1);
        assert_eq!(parameters.composition(3), 3.);
        assert_eq!(DpParameters::new(1., 4).unwrap().composition(2), 8.);
        for (epsilon, repeat) in [(0., 1), (-1., 1), (f64::INFINITY, 1), (f64::NAN, 1), (1., 0)] {
            assert!(matches!(
                DpParameters::new(epsilon, repeat),
                Err(Error::BudgetError(_))
            ));
        }
    }

    #[test]
    fn test_from_json() {
        let parameters: DpParameters = serde_json::from_str(r#"{"epsilon": 2.0}"#).unwrap();
        assert_eq!(parameters, DpParameters::from_epsilon(2.).unwrap());
        assert!(serde_json::from_str::<DpParameters>(r#"{"epsilon": -2.0, "repeat": 3}"#).is_err());
    }
}
