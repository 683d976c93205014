//! Noise mechanisms
//!
//! A [`Mechanism`] turns a sensitivity, a budget and a composition count into a noise scale,
//! draws noise at this scale and gives the threshold a noised count must exceed for a group to be released.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Laplace as LaplaceDistribution, Normal};
use std::{fmt, str::FromStr};

use super::{DpEvent, Error, Result};

/// The probability of releasing a group that should have been suppressed, for a table of `rows` rows
pub fn delta(rows: usize) -> f64 {
    let n = rows.max(1) as f64;
    1. / (n * n.sqrt())
}

/// Thresholds are only defined for `0 < delta < 1`
fn checked_delta(delta: f64) -> Result<f64> {
    if delta > 0. && delta < 1. {
        Ok(delta)
    } else {
        Err(Error::mechanism_error(format!(
            "delta = {} leaves no threshold to suppress groups",
            delta
        )))
    }
}

pub trait Mechanism {
    /// The scale of the noise for a value of sensitivity `sensitivity`
    /// when the budget is shared between `composition` releases
    fn calibrate(&self, sensitivity: f64, epsilon: f64, composition: f64, delta: f64) -> f64;

    /// A random draw of the noise at `scale`
    fn noise(&self, scale: f64, rng: &mut dyn RngCore) -> Result<f64>;

    /// The noisy release of `value`
    fn release(&self, value: f64, scale: f64, rng: &mut dyn RngCore) -> Result<f64> {
        Ok(value + self.noise(scale, rng)?)
    }

    /// The threshold above which a count noised at `scale` is released
    fn tau(&self, scale: f64, delta: f64, sensitivity: f64) -> Result<f64>;

    /// The accounting of one release
    fn dp_event(&self, scale: f64, sensitivity: f64) -> DpEvent;
}

/// Additive Laplace noise, pure epsilon-DP
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Laplace;

impl Mechanism for Laplace {
    fn calibrate(&self, sensitivity: f64, epsilon: f64, composition: f64, _delta: f64) -> f64 {
        sensitivity * composition / epsilon
    }

    fn noise(&self, scale: f64, rng: &mut dyn RngCore) -> Result<f64> {
        if scale == 0. {
            return Ok(0.);
        }
        let distribution = LaplaceDistribution::new(0., scale).map_err(Error::mechanism_error)?;
        Ok(rand::distributions::Distribution::sample(&distribution, rng))
    }

    fn tau(&self, scale: f64, delta: f64, _sensitivity: f64) -> Result<f64> {
        let delta = checked_delta(delta)?;
        Ok(1. + scale * (1. / (2. * delta)).ln())
    }

    fn dp_event(&self, scale: f64, sensitivity: f64) -> DpEvent {
        DpEvent::laplace(noise_multiplier(scale, sensitivity))
    }
}

/// Additive Gaussian noise, (epsilon, delta)-DP, calibrated for epsilon <= 1
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Gaussian;

impl Mechanism for Gaussian {
    fn calibrate(&self, sensitivity: f64, epsilon: f64, composition: f64, delta: f64) -> f64 {
        let log = (1. / delta).ln();
        composition.sqrt() * sensitivity * (log.sqrt() + (log + epsilon).sqrt())
            / (2f64.sqrt() * epsilon)
    }

    fn noise(&self, scale: f64, rng: &mut dyn RngCore) -> Result<f64> {
        if scale == 0. {
            return Ok(0.);
        }
        let distribution = Normal::new(0., scale).map_err(Error::mechanism_error)?;
        Ok(rand::distributions::Distribution::sample(&distribution, rng))
    }

    fn tau(&self, scale: f64, delta: f64, sensitivity: f64) -> Result<f64> {
        let delta = checked_delta(delta)?;
        let standard = Normal::new(0., 1.).map_err(Error::mechanism_error)?;
        Ok(1. + scale * standard.inverse_cdf((1. - delta / 2.).powf(1. / sensitivity)))
    }

    fn dp_event(&self, scale: f64, sensitivity: f64) -> DpEvent {
        DpEvent::gaussian(noise_multiplier(scale, sensitivity))
    }
}

fn noise_multiplier(scale: f64, sensitivity: f64) -> f64 {
    if sensitivity > 0. {
        scale / sensitivity
    } else {
        0.
    }
}

/// The mechanisms available to a private reader
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MechanismKind {
    #[default]
    Laplace,
    Gaussian,
}

impl MechanismKind {
    fn mechanism(&self) -> &'static dyn Mechanism {
        match self {
            MechanismKind::Laplace => &Laplace,
            MechanismKind::Gaussian => &Gaussian,
        }
    }
}

impl Mechanism for MechanismKind {
    fn calibrate(&self, sensitivity: f64, epsilon: f64, composition: f64, delta: f64) -> f64 {
        self.mechanism().calibrate(sensitivity, epsilon, composition, delta)
    }

    fn noise(&self, scale: f64, rng: &mut dyn RngCore) -> Result<f64> {
        self.mechanism().noise(scale, rng)
    }

    fn tau(&self, scale: f64, delta: f64, sensitivity: f64) -> Result<f64> {
        self.mechanism().tau(scale, delta, sensitivity)
    }

    fn dp_event(&self, scale: f64, sensitivity: f64) -> DpEvent {
        self.mechanism().dp_event(scale, sensitivity)
    }
}

impl fmt::Display for MechanismKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MechanismKind::Laplace => write!(f, "laplace"),
            MechanismKind::Gaussian => write!(f, "gaussian"),
        }
    }
}

impl FromStr for MechanismKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "laplace" => Ok(MechanismKind::Laplace),
            "gaussian" => Ok(MechanismKind::Gaussian),
            _ => Err(Error::mechanism_error(format!("Unknown mechanism {}", s))),
        }
    }
}
