#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use ddbc_core::error::{BoxDynError, Error, Result};

pub use ddbc_core::odbc::{
    ColumnDescriptor, FixedPointValue, FunctionTable, HostValue, Nullability, OdbcApi,
    OdbcBufferSettings, OdbcQueryResult, OdbcRow, OdbcStatement, OdbcStatementOptions,
    ParamDirection, ParameterDescriptor, SqlDataType, SqlReturn, StatementState,
};

#[cfg_attr(docsrs, doc(cfg(feature = "mock")))]
#[cfg(feature = "mock")]
pub use ddbc_core::mock;

/// Lower level building blocks: the raw ODBC surface, buffers and codecs.
pub mod odbc {
    pub use ddbc_core::odbc::*;
}
