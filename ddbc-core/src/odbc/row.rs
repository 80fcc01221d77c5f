use std::sync::Arc;

use crate::error::{Error, Result};
use crate::odbc::{ColumnDescriptor, HostValue};

/// One materialized row. Rows of the same result set share their column metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct OdbcRow {
    pub(crate) columns: Arc<[ColumnDescriptor]>,
    pub(crate) values: Vec<HostValue>,
}

impl OdbcRow {
    pub(crate) fn new(columns: Arc<[ColumnDescriptor]>, values: Vec<HostValue>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[HostValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<HostValue> {
        self.values
    }

    /// Value at ordinal `index`.
    pub fn get(&self, index: usize) -> Result<&HostValue> {
        self.values.get(index).ok_or(Error::ColumnIndexOutOfBounds {
            index,
            len: self.values.len(),
        })
    }

    /// Value of the column called `name`.
    pub fn get_by_name(&self, name: &str) -> Result<&HostValue> {
        let index = self.index_of(name)?;
        self.get(index)
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        // Try exact match first (for performance)
        if let Some(pos) = self.columns.iter().position(|col| col.name == name) {
            return Ok(pos);
        }

        // Fall back to case-insensitive match
        self.columns
            .iter()
            .position(|col| col.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::ColumnNotFound(name.into()))
    }
}
