//! Marshalling between host values and the ODBC C call interface.
//!
//! Everything here talks to the driver through an [`OdbcApi`] implementation, normally a
//! [`FunctionTable`] resolved once per process:
//!
//! ```rust,ignore
//! let api = FunctionTable::init_once(|name| resolve_symbol(name))?;
//! let mut stmt = OdbcStatement::new(api, handle);
//! stmt.execute("SELECT id, name FROM users WHERE id > ?", &[HostValue::from(10)])?;
//! for row in stmt.fetch_all()? {
//!     println!("{}", row.get_by_name("name")?);
//! }
//! ```
//!
//! Statement behaviour can be tuned with [`OdbcStatementOptions`], also parseable from a
//! `key=value;` string:
//!
//! ```text
//! buffered=true;batch_memory_limit=67108864;fallback_column_size=8192;stream_lobs=false
//! ```

pub mod api;
pub mod arena;
pub mod codec;
mod column;
pub mod diagnostics;
mod error;
mod numeric;
mod options;
mod query_result;
mod row;
pub mod statement;
pub mod sys;
mod type_info;
pub mod types;
mod value;

pub use api::{FunctionTable, OdbcApi};
pub use arena::{ColumnBuffer, ColumnTable, ParamArena};
pub use codec::{CType, CValue};
pub use column::{ColumnDescriptor, Nullability};
pub use error::{DiagnosticRecord, DriverError, ErrorKind};
pub use numeric::{decimal_separator, set_decimal_separator, FixedPointValue, MAX_PRECISION};
pub use options::{OdbcBufferSettings, OdbcStatementOptions};
pub use query_result::OdbcQueryResult;
pub use row::OdbcRow;
pub use statement::binder::{ParamDirection, ParameterDescriptor};
pub use statement::dae::{DaeState, DaeStreamer};
pub use statement::fetch::ColumnBufferSet;
pub use statement::{OdbcStatement, StatementState};
pub use sys::SqlReturn;
pub use type_info::SqlDataType;
pub use value::HostValue;
