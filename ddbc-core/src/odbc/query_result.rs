use crate::odbc::sys::SqlReturn;

/// Outcome of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OdbcQueryResult {
    pub(super) rows_affected: u64,
    pub(super) return_code: SqlReturn,
    pub(super) has_result_set: bool,
}

impl Default for OdbcQueryResult {
    fn default() -> Self {
        Self {
            rows_affected: 0,
            return_code: SqlReturn::SUCCESS,
            has_result_set: false,
        }
    }
}

impl OdbcQueryResult {
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Raw code the execution finished with.
    pub fn return_code(&self) -> SqlReturn {
        self.return_code
    }

    /// True if the driver attached diagnostics to an otherwise successful execution.
    pub fn is_partial_success(&self) -> bool {
        self.return_code == SqlReturn::SUCCESS_WITH_INFO
    }

    pub fn has_result_set(&self) -> bool {
        self.has_result_set
    }
}

impl Extend<OdbcQueryResult> for OdbcQueryResult {
    fn extend<T: IntoIterator<Item = OdbcQueryResult>>(&mut self, iter: T) {
        for elem in iter {
            self.rows_affected += elem.rows_affected;
            if elem.return_code == SqlReturn::SUCCESS_WITH_INFO {
                self.return_code = elem.return_code;
            }
            self.has_result_set |= elem.has_result_set;
        }
    }
}
