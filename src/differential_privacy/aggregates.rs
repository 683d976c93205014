//! Noising of the raw aggregates of a sub-plan

use rand::RngCore;

use super::{
    mechanisms::{self, Mechanism},
    DpEvent, DpParameters, Error, Result,
};
use crate::{
    ast::AggregateFunction,
    data_type::{DataType, Value},
    rewriting::{InnerColumn, SubPlan},
};

/// The noise of one raw aggregate column
#[derive(Clone, Debug, PartialEq)]
pub struct Calibration {
    /// The position of the column in the exact rowset
    pub index: usize,
    pub function: AggregateFunction,
    pub data_type: DataType,
    pub sensitivity: f64,
    pub scale: f64,
}

impl Calibration {
    fn new<M: Mechanism>(
        index: usize,
        column: &InnerColumn,
        mechanism: &M,
        epsilon: f64,
        composition: f64,
        delta: f64,
    ) -> Result<Calibration> {
        let sensitivity = column.sensitivity.ok_or_else(|| {
            Error::mechanism_error(format!("{} has no sensitivity", column.aggregate))
        })?;
        Ok(Calibration {
            index,
            function: column.function(),
            data_type: column.data_type,
            sensitivity,
            scale: mechanism.calibrate(sensitivity, epsilon, composition, delta),
        })
    }

    /// Noise one exact value, a null exact value is noised from 0
    pub fn release<M: Mechanism>(&self, value: &Value, mechanism: &M, rng: &mut dyn RngCore) -> Result<Value> {
        let exact = match value {
            Value::Null => 0.,
            value => value
                .as_f64()
                .ok_or_else(|| Error::mechanism_error(format!("Cannot noise {}", value)))?,
        };
        let noisy = mechanism.release(exact, self.scale, rng)?;
        Ok(match (self.function, self.data_type) {
            (AggregateFunction::Count, _) => Value::Integer(noisy.round().max(0.) as i64),
            (_, DataType::Integer) => Value::Integer(noisy.round() as i64),
            _ => Value::Float(noisy),
        })
    }
}

/// Calibrate the noise of every raw aggregate of the plan.
///
/// The budget is split evenly between the raw aggregates and the repetitions of the query.
pub fn calibrate<M: Mechanism>(
    plan: &SubPlan,
    parameters: &DpParameters,
    mechanism: &M,
) -> Result<Vec<Calibration>> {
    let composition = parameters.composition(plan.composition());
    let delta = mechanisms::delta(plan.table_rows);
    let offset = plan.key_columns.len();
    plan.inner_columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            Calibration::new(offset + i, column, mechanism, parameters.epsilon(), composition, delta)
        })
        .collect()
}

/// Noise the raw aggregates of every exact row, the keys are kept as is
pub fn noise_rows<M: Mechanism>(
    rows: &[Vec<Value>],
    calibrations: &[Calibration],
    mechanism: &M,
    rng: &mut dyn RngCore,
) -> Result<Vec<Vec<Value>>> {
    rows.iter()
        .map(|row| {
            let mut row = row.clone();
            for calibration in calibrations {
                let noisy = calibration.release(&row[calibration.index], mechanism, rng)?;
                row[calibration.index] = noisy;
            }
            Ok(row)
        })
        .collect()
}

/// The composition of the releases of the calibrated columns
pub fn dp_event<M: Mechanism>(calibrations: &[Calibration], mechanism: &M) -> DpEvent {
    calibrations
        .iter()
        .map(|calibration| mechanism.dp_event(calibration.scale, calibration.sensitivity))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        differential_privacy::{mechanisms::Laplace, MechanismKind},
        io::pums,
        rewriting::preprocess,
        sql::parse,
    };
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_calibrate() {
        let reader = pums::reader();
        let query = parse("SELECT COUNT(*) AS n, SUM(age) AS s FROM PUMS.PUMS").unwrap();
        let plan = preprocess(&query, &reader).unwrap();
        let parameters = DpParameters::new(1., 2).unwrap();
        let calibrations = calibrate(&plan, &parameters, &Laplace).unwrap();
        // 2 columns, repeated twice
        assert_eq!(calibrations[0].scale, 4.);
        assert_eq!(calibrations[1].scale, 400.);
        assert_eq!(dp_event(&calibrations, &Laplace).len(), 2);
    }

    #[test]
    fn test_missing_sensitivity() {
        let column = InnerColumn {
            name: String::from("sum_x"),
            aggregate: crate::ast::Expression::aggregate(
                AggregateFunction::Sum,
                Some(crate::ast::Expression::column("x")),
            ),
            data_type: DataType::Float,
            sensitivity: None,
        };
        assert!(matches!(
            Calibration::new(0, &column, &Laplace, 1., 1., 1e-5),
            Err(Error::MechanismError(_))
        ));
    }

    #[test]
    fn test_release() {
        let mut rng = StdRng::seed_from_u64(1234);
        let count = Calibration {
            index: 0,
            function: AggregateFunction::Count,
            data_type: DataType::Integer,
            sensitivity: 1.,
            scale: 50.,
        };
        let sum = Calibration {
            index: 1,
            function: AggregateFunction::Sum,
            data_type: DataType::Float,
            sensitivity: 1.,
            scale: 1.,
        };
        for _ in 0..100 {
            match count.release(&Value::from(0), &MechanismKind::Gaussian, &mut rng).unwrap() {
                Value::Integer(n) => assert!(n >= 0),
                value => panic!("{} is not a count", value),
            }
            assert!(matches!(
                sum.release(&Value::Null, &Laplace, &mut rng).unwrap(),
                Value::Float(_)
            ));
        }
        let rows = vec![vec![Value::from(10), Value::from(2.5)]; 3];
        let noised = noise_rows(&rows, &[count, sum], &Laplace, &mut rng).unwrap();
        assert_eq!(noised.len(), 3);
        assert_ne!(noised, rows);
    }
}
