//! Tau-thresholding of the group keys
//!
//! The existence of a group depends on the private data. A group is released only if its noised
//! `COUNT(*)` is above a threshold tau, so that a group with few rows is unlikely to be released.
//! The noised count used is the one released, no budget is spent on the test.

use super::{aggregates::Calibration, mechanisms::Mechanism, Result};
use crate::data_type::Value;

/// The threshold for a count noised according to `calibration`
pub fn tau<M: Mechanism>(calibration: &Calibration, mechanism: &M, delta: f64) -> Result<f64> {
    mechanism.tau(calibration.scale, delta, calibration.sensitivity)
}

/// Keep the rows whose value at `index` is strictly greater than `tau`
pub fn threshold(rows: Vec<Vec<Value>>, index: usize, tau: f64) -> Vec<Vec<Value>> {
    let before = rows.len();
    let rows: Vec<Vec<Value>> = rows
        .into_iter()
        .filter(|row| row[index].as_f64().map_or(false, |count| count > tau))
        .collect();
    log::debug!("tau = {}, {} groups suppressed out of {}", tau, before - rows.len(), before);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::AggregateFunction,
        data_type::DataType,
        differential_privacy::mechanisms::{delta, Gaussian, Laplace},
    };

    fn count(scale: f64) -> Calibration {
        Calibration {
            index: 1,
            function: AggregateFunction::Count,
            data_type: DataType::Integer,
            sensitivity: 1.,
            scale,
        }
    }

    #[test]
    fn test_tau() {
        let delta = delta(1000);
        let laplace = tau(&count(1.), &Laplace, delta).unwrap();
        let gaussian = tau(&count(4.66), &Gaussian, delta).unwrap();
        println!("laplace {}, gaussian {}", laplace, gaussian);
        assert!(laplace > 10. && laplace < 11.);
        assert!(gaussian > 20. && gaussian < 21.);
        // Tighter budgets, larger thresholds
        assert!(tau(&count(10.), &Laplace, delta).unwrap() > laplace);
    }

    #[test]
    fn test_threshold() {
        let rows = vec![
            vec![Value::from("a"), Value::from(100)],
            vec![Value::from("b"), Value::from(3)],
            vec![Value::from("c"), Value::from(11)],
            vec![Value::from("d"), Value::Null],
        ];
        let kept = threshold(rows, 1, 10.7);
        assert_eq!(
            kept.iter().map(|row| row[0].clone()).collect::<Vec<_>>(),
            vec![Value::from("a"), Value::from("c")]
        );
    }
}
