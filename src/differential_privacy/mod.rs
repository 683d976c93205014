//! # Differentially private execution of queries
//!
//! A [`PrivateReader`] wraps an exact [`Reader`]:
//! - [`PrivateReader::preprocess`] rewrites a query into a [`SubPlan`] and computes its raw aggregates exactly, once,
//! - [`PrivateReader::postprocess`] noises the raw aggregates, suppresses the groups whose noised count is below tau,
//!   then recombines, filters, orders and limits the result. Each call draws fresh noise.
//!
//! The same [`SubPlan`] can be postprocessed concurrently from many threads.
//!

pub mod aggregates;
pub mod dp_event;
pub mod dp_parameters;
pub mod group_by;
pub mod mechanisms;

use rand::{rngs::StdRng, RngCore, SeedableRng};
use std::{convert::Infallible, error, fmt, result};

use crate::{
    ast::{self, Query},
    data_type,
    io::{self, memory, Reader},
    metadata::Metadata,
    namer::EXACT,
    rewriting::{self, SubPlan},
    rowset::{Rowset, TypedRowset},
};

/// Some exports
pub use dp_event::DpEvent;
pub use dp_parameters::DpParameters;
pub use mechanisms::{Mechanism, MechanismKind};

#[derive(Debug)]
pub enum Error {
    MechanismError(String),
    BudgetError(String),
    Query(ast::Error),
    Reader(io::Error),
    Other(String),
}

impl Error {
    pub fn mechanism_error(desc: impl fmt::Display) -> Error {
        Error::MechanismError(format!("{}", desc))
    }
    pub fn budget_error(desc: impl fmt::Display) -> Error {
        Error::BudgetError(format!("{}", desc))
    }
    pub fn other(desc: impl fmt::Display) -> Error {
        Error::Other(format!("{}", desc))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MechanismError(desc) => writeln!(f, "MechanismError: {}", desc),
            Error::BudgetError(desc) => writeln!(f, "BudgetError: {}", desc),
            Error::Query(err) => writeln!(f, "Query: {}", err),
            Error::Reader(err) => writeln!(f, "Reader: {}", err),
            Error::Other(err) => writeln!(f, "{}", err),
        }
    }
}

impl error::Error for Error {}

impl From<Infallible> for Error {
    fn from(err: Infallible) -> Self {
        Error::Other(err.to_string())
    }
}
impl From<ast::Error> for Error {
    fn from(err: ast::Error) -> Self {
        Error::Query(err)
    }
}
impl From<data_type::Error> for Error {
    fn from(err: data_type::Error) -> Self {
        Error::Other(err.to_string())
    }
}
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err {
            io::Error::Query(err) => Error::Query(err),
            err => Error::Reader(err),
        }
    }
}
impl From<rewriting::Error> for Error {
    fn from(err: rewriting::Error) -> Self {
        match err {
            rewriting::Error::Query(err) => Error::Query(err),
            rewriting::Error::Reader(err) => err.into(),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

impl SubPlan {
    /// The accounting of one postprocessing of the plan
    pub fn dp_event<M: Mechanism>(&self, parameters: &DpParameters, mechanism: &M) -> Result<DpEvent> {
        let calibrations = aggregates::calibrate(self, parameters, mechanism)?;
        Ok(aggregates::dp_event(&calibrations, mechanism))
    }
}

/// Executes queries with differential privacy over an exact reader
#[derive(Clone, Debug)]
pub struct PrivateReader<R: Reader<Error = io::Error>> {
    reader: R,
    parameters: DpParameters,
    mechanism: MechanismKind,
}

impl<R: Reader<Error = io::Error>> PrivateReader<R> {
    pub fn new(reader: R, parameters: DpParameters, mechanism: MechanismKind) -> Self {
        if mechanism == MechanismKind::Gaussian && parameters.epsilon() > 1. {
            // Cf. Theorem A.1. in (Dwork, Roth et al. 2014)
            log::warn!("Warning, epsilon>1 the gaussian mechanism applied will not be exactly epsilon,delta-DP!")
        }
        PrivateReader {
            reader,
            parameters,
            mechanism,
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn parameters(&self) -> &DpParameters {
        &self.parameters
    }

    pub fn mechanism(&self) -> MechanismKind {
        self.mechanism
    }

    /// Rewrite the query and compute its raw aggregates exactly
    pub fn preprocess(&self, query: &Query) -> Result<SubPlan> {
        Ok(rewriting::preprocess(query, &self.reader)?)
    }

    /// A noisy release of the plan, with fresh noise
    pub fn postprocess(&self, plan: &SubPlan) -> Result<TypedRowset> {
        self.postprocess_with_rng(plan, &mut StdRng::from_entropy())
    }

    /// A noisy release of the plan, with the noise drawn from `rng`
    pub fn postprocess_with_rng<G: RngCore>(&self, plan: &SubPlan, rng: &mut G) -> Result<TypedRowset> {
        let rowset = self.release(plan, rng)?;
        Ok(TypedRowset::new(&rowset, &plan.types)?)
    }

    /// The accounting of one release of the plan
    pub fn dp_event(&self, plan: &SubPlan) -> Result<DpEvent> {
        plan.dp_event(&self.parameters, &self.mechanism)
    }

    fn release(&self, plan: &SubPlan, rng: &mut dyn RngCore) -> Result<Rowset> {
        let calibrations = aggregates::calibrate(plan, &self.parameters, &self.mechanism)?;
        for calibration in &calibrations {
            log::debug!(
                "{} noise of scale {} on column {}",
                self.mechanism,
                calibration.scale,
                calibration.index
            );
        }
        let mut rows = aggregates::noise_rows(plan.exact.data(), &calibrations, &self.mechanism, rng)?;
        if let Some(threshold) = plan.threshold_column {
            let count = &calibrations[threshold];
            let tau = group_by::tau(count, &self.mechanism, mechanisms::delta(plan.table_rows))?;
            rows = group_by::threshold(rows, count.index, tau);
        }
        Ok(memory::execute(
            &plan.outer,
            &[EXACT.to_string()],
            &plan.exact_names(),
            &rows,
        )?)
    }
}

impl<R: Reader<Error = io::Error>> Reader for PrivateReader<R> {
    type Error = Error;

    fn metadata(&self) -> &Metadata {
        self.reader.metadata()
    }

    fn execute_query(&self, query: &Query) -> Result<Rowset> {
        let plan = self.preprocess(query)?;
        self.release(&plan, &mut StdRng::from_entropy())
    }

    fn execute_typed(&self, query: &str) -> Result<TypedRowset> {
        let plan = self.preprocess(&self.parse(query)?)?;
        self.postprocess(&plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        builder::{Ready, With},
        data_type::{DataType, Value},
        io::pums,
        metadata::Schema,
        sql::parse,
    };

    fn private_reader(epsilon: f64, mechanism: MechanismKind) -> PrivateReader<io::MemoryReader> {
        PrivateReader::new(
            pums::reader(),
            DpParameters::from_epsilon(epsilon).unwrap(),
            mechanism,
        )
    }

    #[test]
    fn test_count() {
        let reader = private_reader(1., MechanismKind::Laplace);
        let rowset = reader.execute("SELECT COUNT(*) AS n FROM PUMS.PUMS").unwrap();
        println!("{}", rowset);
        assert_eq!(rowset.names(), vec!["n"]);
        let n = rowset[1][0].as_f64().unwrap();
        assert!((n - 1000.).abs() < 50.);
    }

    #[test]
    fn test_reproducible() {
        let reader = private_reader(1., MechanismKind::Gaussian);
        let plan = reader
            .preprocess(&parse("SELECT married, AVG(age) AS a FROM PUMS.PUMS GROUP BY married ORDER BY married").unwrap())
            .unwrap();
        let first = reader
            .postprocess_with_rng(&plan, &mut StdRng::seed_from_u64(42))
            .unwrap();
        let second = reader
            .postprocess_with_rng(&plan, &mut StdRng::seed_from_u64(42))
            .unwrap();
        println!("{}", first);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first["married"], [Value::from(0), Value::from(1)]);
    }

    #[test]
    fn test_zero_count() {
        // On an empty input with little noise, COUNT(age) is released as 0
        let reader = private_reader(100., MechanismKind::Laplace);
        let plan = reader
            .preprocess(
                &parse("SELECT AVG(age) AS a, VAR(age) AS v, STD(age) AS s, COUNT(*) AS n FROM PUMS.PUMS WHERE age > 100")
                    .unwrap(),
            )
            .unwrap();
        for seed in 0..10 {
            let release = reader
                .postprocess_with_rng(&plan, &mut StdRng::seed_from_u64(seed))
                .unwrap();
            println!("{}", release);
            assert_eq!(release.len(), 1);
            assert_eq!(release["a"], [Value::Null]);
            assert_eq!(release["v"], [Value::Null]);
            assert_eq!(release["s"], [Value::Null]);
            assert_eq!(release["n"], [Value::from(0)]);
        }
    }

    #[test]
    fn test_tiny_table() {
        // With delta = 1 no threshold holds, the release is refused
        let schema = Schema::builder()
            .name("t")
            .rows(2)
            .with(("k", DataType::Integer, 0., 10.))
            .try_build()
            .unwrap();
        let table = io::Table::new(schema, vec![vec![Value::from(1)], vec![Value::from(2)]]).unwrap();
        let reader = PrivateReader::new(
            io::MemoryReader::new([table]),
            DpParameters::from_epsilon(1.).unwrap(),
            MechanismKind::Laplace,
        );
        let plan = reader
            .preprocess(&parse("SELECT k, COUNT(*) AS n FROM t GROUP BY k").unwrap())
            .unwrap();
        assert!(reader.postprocess(&plan).is_ok());
        let degenerate = SubPlan { table_rows: 1, ..plan };
        assert!(matches!(reader.postprocess(&degenerate), Err(Error::MechanismError(_))));
    }

    #[test]
    fn test_dp_event() {
        let reader = private_reader(1., MechanismKind::Laplace);
        let plan = reader
            .preprocess(&parse("SELECT educ, COUNT(*), SUM(income) FROM PUMS.PUMS GROUP BY educ").unwrap())
            .unwrap();
        let event = reader.dp_event(&plan).unwrap();
        println!("{}", event);
        // COUNT(*) and SUM(income), noise_multiplier = composition / epsilon
        assert_eq!(event, DpEvent::from(vec![DpEvent::laplace(2.), DpEvent::laplace(2.)]));
    }

    #[test]
    fn test_errors() {
        let reader = private_reader(1., MechanismKind::Laplace);
        assert!(matches!(
            reader.execute("SELECT COUNT(* FROM PUMS.PUMS"),
            Err(Error::Query(ast::Error::ParsingError(_)))
        ));
        assert!(matches!(
            reader.execute("SELECT COUNT(*) FROM PUMS.OTHER"),
            Err(Error::Query(ast::Error::UnresolvedTable(_)))
        ));
        assert!(matches!(
            reader.execute("SELECT income FROM PUMS.PUMS"),
            Err(Error::Query(ast::Error::UnsupportedConstruct(_)))
        ));
    }
}
