use crate::error::Result;
use crate::odbc::codec::wide;
use crate::odbc::sys::{HStmt, Pointer, SmallInt, SqlReturn, HANDLE_STMT};
use crate::odbc::{DiagnosticRecord, DriverError, OdbcApi};

const STATE_LEN: usize = 6;
// SQL_MAX_MESSAGE_LENGTH
const INITIAL_MESSAGE_LEN: usize = 512;

/// Reads diagnostic record `rec_number` (1-based), or `None` once the driver reports no
/// further records.
pub fn record<A: OdbcApi + ?Sized>(
    api: &A,
    handle_type: SmallInt,
    handle: Pointer,
    rec_number: SmallInt,
) -> Option<DiagnosticRecord> {
    let mut state = [0u16; STATE_LEN];
    let mut native_error = 0i32;
    let mut message = vec![0u16; INITIAL_MESSAGE_LEN];

    loop {
        let mut text_length: SmallInt = 0;
        let buffer_length = SmallInt::try_from(message.len()).unwrap_or(SmallInt::MAX);
        let ret = unsafe {
            api.get_diag_rec(
                handle_type,
                handle,
                rec_number,
                state.as_mut_ptr(),
                &mut native_error,
                message.as_mut_ptr(),
                buffer_length,
                &mut text_length,
            )
        };
        if !ret.succeeded() {
            return None;
        }

        let text_length = usize::try_from(text_length).unwrap_or(0);
        // the message did not fit; ask again with a buffer large enough for all of it
        if text_length >= message.len() && message.len() < SmallInt::MAX as usize {
            message.resize((text_length + 1).min(SmallInt::MAX as usize), 0);
            continue;
        }

        let text_length = text_length.min(message.len());
        return Some(DiagnosticRecord {
            state: wide::decode_nul_terminated(&state),
            native_error,
            message: wide::decode_lossy(&message[..text_length]),
        });
    }
}

/// The first diagnostic record of a statement handle.
pub fn first_error<A: OdbcApi + ?Sized>(api: &A, stmt: HStmt) -> Option<DiagnosticRecord> {
    record(api, HANDLE_STMT, stmt.as_handle(), 1)
}

/// Every diagnostic record of a statement handle, in driver order.
pub fn all_records<A: OdbcApi + ?Sized>(api: &A, stmt: HStmt) -> Vec<DiagnosticRecord> {
    handle_records(api, HANDLE_STMT, stmt.as_handle())
}

/// Every diagnostic record of any handle, in driver order.
pub fn handle_records<A: OdbcApi + ?Sized>(
    api: &A,
    handle_type: SmallInt,
    handle: Pointer,
) -> Vec<DiagnosticRecord> {
    let mut records = Vec::new();
    let mut rec_number: SmallInt = 1;
    while let Some(record) = record(api, handle_type, handle, rec_number) {
        records.push(record);
        rec_number = match rec_number.checked_add(1) {
            Some(n) => n,
            None => break,
        };
    }
    records
}

/// Turns the return code of `function` into a `Result`.
///
/// `SQL_SUCCESS_WITH_INFO`, `SQL_NEED_DATA` and `SQL_NO_DATA` are control-flow outcomes and
/// come back as `Ok` with the raw code; the caller decides what they mean. Diagnostics
/// attached to a partial success are logged.
pub fn check<A: OdbcApi + ?Sized>(
    api: &A,
    stmt: HStmt,
    function: &'static str,
    ret: SqlReturn,
) -> Result<SqlReturn> {
    match ret {
        SqlReturn::SUCCESS | SqlReturn::NEED_DATA | SqlReturn::NO_DATA => Ok(ret),
        SqlReturn::SUCCESS_WITH_INFO => {
            if log::log_enabled!(log::Level::Warn) {
                for record in all_records(api, stmt) {
                    log::warn!("{} succeeded with info: {}", function, record);
                }
            }
            Ok(ret)
        }
        SqlReturn::INVALID_HANDLE => Err(DriverError {
            function,
            code: ret,
            records: Vec::new(),
        }
        .into()),
        _ => Err(DriverError {
            function,
            code: ret,
            records: all_records(api, stmt),
        }
        .into()),
    }
}

/// Like [`check`] but only success codes are accepted.
pub fn check_success<A: OdbcApi + ?Sized>(
    api: &A,
    stmt: HStmt,
    function: &'static str,
    ret: SqlReturn,
) -> Result<SqlReturn> {
    match check(api, stmt, function, ret)? {
        SqlReturn::NEED_DATA | SqlReturn::NO_DATA => Err(err_protocol!(
            "{} returned {} where only success was expected",
            function,
            ret
        )),
        ret => Ok(ret),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::mock::test_driver;

    #[test]
    fn test_all_records_in_order() {
        let driver = test_driver();
        driver.push_diagnostic("01000", 0, "first");
        driver.push_diagnostic("42S02", 208, "Invalid object name 'nope'.");
        let stmt = driver.statement_handle();

        let records = all_records(&driver, stmt);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].state, "42S02");
        assert_eq!(records[1].native_error, 208);
        assert_eq!(first_error(&driver, stmt).map(|r| r.message), Some("first".to_owned()));
    }

    #[test]
    fn test_long_message_is_read_completely() {
        let driver = test_driver();
        let long = "x".repeat(1500);
        driver.push_diagnostic("HY000", 1, &long);
        let record = first_error(&driver, driver.statement_handle()).unwrap();
        assert_eq!(record.message.len(), 1500);
    }

    #[test]
    fn test_check_maps_error_to_driver_error() {
        let driver = test_driver();
        driver.push_diagnostic("42000", 102, "Incorrect syntax");
        let err = check(&driver, driver.statement_handle(), "SQLExecute", SqlReturn::ERROR)
            .unwrap_err();
        match err {
            Error::Driver(e) => {
                assert_eq!(e.function, "SQLExecute");
                assert_eq!(e.state(), Some("42000"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_check_keeps_partial_success_code() {
        let driver = test_driver();
        let ret = check(
            &driver,
            driver.statement_handle(),
            "SQLFetch",
            SqlReturn::SUCCESS_WITH_INFO,
        )
        .unwrap();
        assert_eq!(ret, SqlReturn::SUCCESS_WITH_INFO);
        let null_stmt = HStmt(std::ptr::null_mut());
        assert!(check_success(&driver, null_stmt, "SQLFetch", SqlReturn::NO_DATA).is_err());
    }
}
