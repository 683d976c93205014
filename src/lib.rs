//! # dpsql
//! Differentially private execution of simple SQL aggregate queries
//!
//! ## What is dpsql?
//! dpsql parses a subset of SQL (a single table, `WHERE`, `GROUP BY`, `HAVING`, `ORDER BY`, `LIMIT`
//! and the aggregates `COUNT`, `SUM`, `MIN`, `MAX`, `AVG`, `VAR`, `STD`) into its own AST, binds it to
//! the metadata of the tables, and executes it either exactly or with differential privacy.
//!
//! ### Sensitivity from declared bounds
//! The metadata declare the bounds of the columns. They are propagated through the expressions so
//! that every raw aggregate gets a sensitivity: 1 for `COUNT`, the width of the bounds of the
//! argument for `SUM`, `MIN` and `MAX`.
//!
//! ### Preprocess once, postprocess many times
//! A private query is rewritten into a sub-plan: an inner query of raw aggregates, computed exactly once,
//! and an outer query recombining them. Each postprocessing draws fresh Laplace or Gaussian noise,
//! suppresses the groups whose noised count is below a threshold tau, then recombines the noisy aggregates.
//!

pub mod ast;
pub mod builder;
pub mod data_type;
pub mod differential_privacy;
pub mod hierarchy;
pub mod io;
pub mod metadata;
pub mod namer;
pub mod rewriting;
pub mod rowset;
pub mod setup;
pub mod sql;
pub mod visitor;

pub use builder::{Ready, With, WithIterator};
pub use data_type::{value::Value, DataType};
pub use differential_privacy::{DpParameters, MechanismKind, PrivateReader};
pub use io::{MemoryReader, Reader};
pub use metadata::Metadata;
pub use rewriting::SubPlan;
pub use rowset::{Rowset, TypedRowset};
