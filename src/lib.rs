//! # sqlx-placeholders
//!
//! A SQLx extension that turns a parametrized query template plus a flat
//! argument list into executable SQL, and reshapes flat result sets into
//! nested structures by column-name convention.
//!
//! ## Features
//!
//! - **Typed Placeholders**: `?` (escaped scalar), `?d` (integer), `?f`
//!   (float), `?n` (NULL-or-integer), `?a` (value lists / SET clauses),
//!   `?#` (quoted identifiers), `?o` (ORDER BY lists) and `?_` (identifier
//!   prefix)
//! - **Optional Blocks**: `{...}` regions that vanish when a placeholder
//!   inside them receives [`Value::Skip`]
//! - **Result Reshaping**: `ARRAY_KEY*` columns build nested keyed
//!   mappings, `PARENT_KEY*` columns build parent/child forests
//! - **Lenient by Default**: malformed placeholder usage degrades to
//!   inline marker text plus structured diagnostics instead of aborting
//! - **Bounded Expansion Cache**: repeated expansion of identical inputs
//!   (logging + execution) is memoized in an LRU cache
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sqlx = { version = "0.8", features = ["mysql", "runtime-tokio"] }
//! sqlx-placeholders = "0.1"
//! ```
//!
//! ## Examples
//!
//! ### Expanding templates
//!
//! ```rust
//! use sqlx_placeholders::{Expander, MysqlEscaper, Value};
//!
//! let expander = Expander::new(&MysqlEscaper);
//!
//! // Scalars are escaped, optional blocks with a skipped placeholder
//! // disappear.
//! let exp = expander.expand(
//!     "SELECT * FROM users WHERE name = ? { AND age >= ?d } { LIMIT ?d }",
//!     &["O'Brien".into(), Value::Skip, 10.into()],
//! );
//! assert_eq!(
//!     exp.sql,
//!     r"SELECT * FROM users WHERE name = 'O\'Brien'   LIMIT 10 "
//! );
//!
//! // ?a expands mappings into SET clauses.
//! let exp = expander.expand(
//!     "UPDATE users SET ?a WHERE id = ?d",
//!     &[
//!         Value::map([("name", Value::from("Ann")), ("age", Value::Int(30))]),
//!         7.into(),
//!     ],
//! );
//! assert_eq!(
//!     exp.sql,
//!     "UPDATE users SET `name` = 'Ann', `age` = '30' WHERE id = 7"
//! );
//! ```
//!
//! ### Running queries
//!
//! ```rust,no_run
//! use sqlx_placeholders::{Database, Value};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut db = Database::connect("mysql://localhost/test?ident_prefix=app_").await?;
//!
//! let users = db
//!     .select(
//!         "SELECT * FROM ?_users WHERE status = ? { AND age >= ?d }",
//!         &["active".into(), Value::Skip],
//!     )
//!     .await?;
//! println!("{users:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ### Reshaping result sets
//!
//! ```rust,no_run
//! use sqlx_placeholders::{Database, Reshaped};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let mut db = Database::connect("mysql://localhost/test").await?;
//! // One entry per department, keyed by name, each holding the headcount.
//! let by_dept = db
//!     .select(
//!         "SELECT dept AS ARRAY_KEY, COUNT(*) AS cnt FROM users GROUP BY dept",
//!         &[],
//!     )
//!     .await?;
//! println!("{by_dept:?}");
//!
//! // A category tree: id/parent_id turn into nodes with children.
//! let tree = db
//!     .select(
//!         "SELECT id AS ARRAY_KEY, parent_id AS PARENT_KEY, title FROM categories",
//!         &[],
//!     )
//!     .await?;
//! if let Reshaped::Forest(forest) = tree {
//!     for (id, node) in &forest {
//!         println!("root {id}: {} children", node.children.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## How It Works
//!
//! 1. **Expand**: the template is scanned left to right; string literals
//!    and comments are copied verbatim, `{...}` blocks recurse, and each
//!    placeholder consumes the next argument and renders through the
//!    driver-specific [`Escaper`]
//! 2. **Execute**: the finished SQL text goes to SQLx; this crate adds no
//!    pooling or I/O of its own
//! 3. **Reshape**: returned rows are inspected for `ARRAY_KEY*` /
//!    `PARENT_KEY*` columns and rebuilt into a mapping or forest
//!
//! ## Limitations
//!
//! - Currently only supports MySQL (the `Escaper` trait is the seam for
//!   other backends)
//! - Forest reshaping does not detect reference cycles longer than
//!   self-parenting; such rows are silently absent from the result
//! - DECIMAL and temporal columns decode to their string forms
//!
//! ## License
//!
//! Licensed under either of Apache License, Version 2.0 or MIT license at
//! your option.

pub mod cache;
pub mod database;
pub mod dsn;
pub mod error;
pub mod escape;
pub mod expand;
pub mod reshape;
pub mod transform;
pub mod value;

pub use cache::{default_cache, ExpandCache};
pub use database::{
    Database, ErrorHandler, ErrorRecord, ExecResult, QueryLogger, QueryOutcome, Statistics,
};
pub use dsn::Dsn;
pub use error::{Error, Result};
pub use escape::{Escaper, MysqlEscaper};
pub use expand::{Diagnostic, DiagnosticKind, Expander, Expansion};
pub use reshape::{reshape, Forest, ForestNode, Keyed, Reshaped, Row};
pub use value::Value;

/// Convenience re-exports for common use cases
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::Database;
    pub use crate::Expander;
    pub use crate::MysqlEscaper;
    pub use crate::Reshaped;
    pub use crate::Value;
}
