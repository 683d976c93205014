use colored::Colorize;
use dpsql::{
    data_type::{DataType, Value},
    differential_privacy::{DpParameters, MechanismKind, PrivateReader},
    io::{pums, MemoryReader, Reader},
    metadata::Metadata,
    rowset::Rowset,
    setup, sql,
};
#[cfg(feature = "sqlite")]
use dpsql::io::sqlite::SqliteReader;
use std::{collections::HashSet, sync::Arc, thread};

const RUNS: usize = 10;

fn private_reader(epsilon: f64, mechanism: MechanismKind) -> PrivateReader<MemoryReader> {
    PrivateReader::new(
        pums::reader(),
        DpParameters::from_epsilon(epsilon).unwrap(),
        mechanism,
    )
}

fn display(query: &str, rowset: &Rowset) {
    println!("{}\n{}", query.red(), format!("{rowset}").yellow());
}

fn count_column(rowset: &Rowset, index: usize) -> Vec<f64> {
    rowset.column(index).filter_map(Value::as_f64).collect()
}

#[test]
fn test_exact_count() {
    setup::init();
    let reader = pums::reader();
    let query = "SELECT COUNT(*) AS n FROM PUMS.PUMS";
    let rowset = reader.execute(query).unwrap();
    display(query, &rowset);
    assert_eq!(rowset[1][0], Value::from(1000));
    let typed = reader.execute_typed(query).unwrap();
    assert_eq!(typed.data_type("n"), Some(DataType::Integer));
    assert_eq!(typed["n"], [Value::from(1000)]);
}

#[test]
fn test_exact_group_by() {
    let reader = pums::reader();
    for (query, expected) in [
        (
            "SELECT COUNT(*) AS c, married AS m FROM PUMS.PUMS GROUP BY married ORDER BY c",
            [451., 549.],
        ),
        (
            "SELECT COUNT(*) AS c, married AS m FROM PUMS.PUMS GROUP BY married ORDER BY c DESC",
            [549., 451.],
        ),
        (
            "SELECT COUNT(*) * 5 AS c, married AS m FROM PUMS.PUMS GROUP BY married ORDER BY c DESC",
            [2745., 2255.],
        ),
    ] {
        let rowset = reader.execute(query).unwrap();
        display(query, &rowset);
        assert_eq!(count_column(&rowset, 0), expected);
    }
}

#[test]
fn test_noisy_order() {
    for mechanism in [MechanismKind::Laplace, MechanismKind::Gaussian] {
        let reader = private_reader(1., mechanism);
        for _ in 0..RUNS {
            let query = "SELECT COUNT(*) AS c, married AS m FROM PUMS.PUMS GROUP BY married ORDER BY c";
            let rowset = reader.execute(query).unwrap();
            display(query, &rowset);
            let counts = count_column(&rowset, 0);
            assert_eq!(counts.len(), 2);
            assert!(counts[0] < counts[1]);
            let query = "SELECT COUNT(*) * 5 AS c, married AS m FROM PUMS.PUMS GROUP BY married ORDER BY c DESC";
            let rowset = reader.execute(query).unwrap();
            let counts = count_column(&rowset, 0);
            assert_eq!(counts.len(), 2);
            assert!(counts[0] > counts[1]);
        }
    }
}

#[test]
fn test_no_tau() {
    // Without GROUP BY, the single row is never suppressed
    let query = "SELECT COUNT(*) AS n, SUM(income) AS s FROM PUMS.PUMS WHERE age > 90 AND educ = 8";
    for epsilon in [4.0, 0.01] {
        for mechanism in [MechanismKind::Laplace, MechanismKind::Gaussian] {
            let reader = private_reader(epsilon, mechanism);
            for _ in 0..RUNS {
                let rowset = reader.execute(query).unwrap();
                assert_eq!(rowset.data().len(), 1);
            }
        }
    }
}

#[test]
fn test_yes_tau() {
    // Groups of 100 rows with a tight budget are sometimes suppressed
    let reader = private_reader(0.1, MechanismKind::Laplace);
    let query = "SELECT COUNT(*) AS c FROM PUMS.PUMS GROUP BY educ";
    let lengths: HashSet<usize> = (0..RUNS)
        .map(|_| {
            let rowset = reader.execute(query).unwrap();
            display(query, &rowset);
            rowset.data().len()
        })
        .collect();
    println!("{}", format!("{lengths:?}").yellow());
    assert!(lengths.len() > 1);
    assert!(lengths.iter().all(|length| *length <= 10));
}

#[test]
fn test_preprocess_postprocess() {
    let reader = private_reader(1., MechanismKind::Gaussian);
    let query = reader
        .parse("SELECT AVG(age) AS a, SUM(income) AS s, STD(age) AS d FROM PUMS.PUMS WHERE age > 30")
        .unwrap();
    let plan = reader.preprocess(&query).unwrap();
    println!("{}", plan);
    let releases: Vec<_> = (0..3).map(|_| reader.postprocess(&plan).unwrap()).collect();
    for release in &releases {
        println!("{}", release);
        assert_eq!(release.len(), 1);
        assert_eq!(release.names(), vec!["a", "s", "d"]);
        assert_eq!(release.data_type("a"), Some(DataType::Float));
    }
    assert_ne!(releases[0], releases[1]);
    assert_ne!(releases[1], releases[2]);
}

#[test]
fn test_empty_results() {
    let reader = pums::reader();
    let typed = reader
        .execute_typed("SELECT age AS a FROM PUMS.PUMS WHERE age > 100")
        .unwrap();
    assert_eq!(typed.len(), 0);
    let typed = reader
        .execute_typed("SELECT COUNT(*) AS n FROM PUMS.PUMS WHERE age > 100")
        .unwrap();
    assert_eq!(typed["n"], [Value::from(0)]);
    let typed = reader
        .execute_typed("SELECT SUM(age) AS s FROM PUMS.PUMS WHERE age > 100")
        .unwrap();
    assert_eq!(typed["s"], [Value::Null]);
    // The private release of an empty input still has one row
    let private = private_reader(1., MechanismKind::Laplace);
    let typed = private
        .execute_typed("SELECT COUNT(*) AS n, SUM(age) AS s FROM PUMS.PUMS WHERE age > 100")
        .unwrap();
    println!("{}", typed);
    assert_eq!(typed.len(), 1);
    assert!(typed["n"][0].as_f64().unwrap() >= 0.);
}

#[test]
fn test_concurrent_postprocess() {
    let reader = private_reader(1., MechanismKind::Laplace);
    let plan = Arc::new(
        reader
            .preprocess(&sql::parse("SELECT educ, COUNT(*) AS n FROM PUMS.PUMS GROUP BY educ ORDER BY educ").unwrap())
            .unwrap(),
    );
    let releases: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let plan = Arc::clone(&plan);
                let reader = &reader;
                scope.spawn(move || reader.postprocess(&plan).unwrap())
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });
    for release in &releases {
        assert_eq!(release["educ"].len(), 10);
    }
    // Independent draws
    let distinct: HashSet<String> = releases.iter().map(|release| release.to_string()).collect();
    assert!(distinct.len() > 1);
}

#[test]
fn test_metadata_from_json() {
    let json = r#"{
        "tables": [{
            "name": "PUMS.PUMS",
            "rows": 1000,
            "columns": [
                {"name": "age", "type": "int", "lower": 0, "upper": 100},
                {"name": "sex", "type": "int", "lower": 0, "upper": 1},
                {"name": "educ", "type": "int", "lower": 1, "upper": 16},
                {"name": "income", "type": "float", "lower": 0, "upper": 500000},
                {"name": "married", "type": "int", "lower": 0, "upper": 1}
            ]
        }]
    }"#;
    let metadata = Metadata::from_json(json).unwrap();
    println!("{}", metadata);
    assert_eq!(metadata, pums::metadata());
    assert_eq!(Metadata::from_json(&metadata.to_json().unwrap()).unwrap(), metadata);
}

const QUERIES: &[&str] = &[
    "SELECT COUNT(*) AS n FROM PUMS.PUMS",
    "SELECT AVG(age) AS a, VAR(income) AS v FROM PUMS.PUMS WHERE sex = 1",
    "SELECT married, COUNT(*) AS n, SUM(age) AS s FROM PUMS.PUMS GROUP BY married ORDER BY married",
    "SELECT educ, AVG(income) AS i, MAX(age) AS m FROM PUMS.PUMS GROUP BY educ HAVING educ > 3 ORDER BY i DESC LIMIT 4",
    "SELECT sex AS s, STD(age) AS d, COUNT(*) + 1 AS n FROM PUMS.PUMS WHERE age BETWEEN 20 AND 60 GROUP BY sex ORDER BY s",
];

fn assert_close(left: &Rowset, right: &Rowset) {
    assert_eq!(left.names(), right.names());
    assert_eq!(left.data().len(), right.data().len());
    for (l, r) in left.data().iter().zip(right.data()) {
        for (l, r) in l.iter().zip(r) {
            match (l.as_f64(), r.as_f64()) {
                (Some(l), Some(r)) => assert!((l - r).abs() <= 1e-6 * r.abs().max(1.)),
                _ => assert_eq!(l, r),
            }
        }
    }
}

#[test]
fn test_rewriting_is_exact() {
    // The recombination of the exact raw aggregates gives the exact result
    let reader = pums::reader();
    let private = private_reader(1., MechanismKind::Laplace);
    for query in QUERIES {
        let plan = private.preprocess(&sql::parse(query).unwrap()).unwrap();
        println!("{}\n{}", query.red(), format!("{plan}").yellow());
        let direct = reader.execute(query).unwrap();
        let recombined = reader.execute_query(&plan.outer).unwrap();
        assert_close(&direct, &recombined);
    }
}

#[cfg(feature = "sqlite")]
fn sorted(rowset: Rowset) -> Rowset {
    let mut rows = rowset.data().to_vec();
    rows.sort_by(|left, right| {
        left.iter()
            .zip(right)
            .map(|(l, r)| l.total_cmp(r))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Rowset::new(rowset.names(), rows)
}

#[cfg(feature = "sqlite")]
#[test]
fn test_on_sqlite() {
    let sqlite = SqliteReader::new([pums::table()]).unwrap();
    let memory = pums::reader();
    let private = private_reader(1., MechanismKind::Laplace);
    for query in QUERIES {
        let plan = private.preprocess(&sql::parse(query).unwrap()).unwrap();
        let inner = plan.inner.to_string();
        println!("{}\n{}", query.red(), inner.yellow());
        // The inner queries are not ordered
        assert_close(
            &sorted(sqlite.execute_query(&plan.inner).unwrap()),
            &sorted(memory.execute_query(&plan.inner).unwrap()),
        );
    }
}
