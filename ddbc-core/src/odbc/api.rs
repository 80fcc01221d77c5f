//! The table of ODBC entry points used by the marshalling core.
//!
//! Locating the driver manager and resolving its symbols is the caller's job. This module
//! only turns a symbol resolver into an immutable [`FunctionTable`], and describes the calls
//! the rest of the crate makes through the [`OdbcApi`] trait so that a different
//! implementation (such as the in-process mock driver) can stand in for it.

use std::ffi::c_void;
use std::ptr::NonNull;

use once_cell::sync::OnceCell;

use crate::error::{Error, Result};
use crate::odbc::sys::{
    HDesc, HStmt, Integer, Len, Pointer, SmallInt, SqlReturn, ULen, USmallInt, WChar,
};

/// One method per ODBC function the core calls.
///
/// # Safety
///
/// Every method forwards raw pointers to the driver. Callers must guarantee that each
/// pointer is valid for the access the corresponding ODBC function performs, and that
/// buffers bound with `bind_parameter`/`bind_col` stay valid and unmoved until they are
/// unbound or the statement is reset.
pub trait OdbcApi {
    unsafe fn exec_direct(&self, stmt: HStmt, text: *const WChar, text_len: Integer) -> SqlReturn;

    unsafe fn prepare(&self, stmt: HStmt, text: *const WChar, text_len: Integer) -> SqlReturn;

    unsafe fn execute(&self, stmt: HStmt) -> SqlReturn;

    unsafe fn bind_parameter(
        &self,
        stmt: HStmt,
        parameter_number: USmallInt,
        input_output_type: SmallInt,
        value_type: SmallInt,
        parameter_type: SmallInt,
        column_size: ULen,
        decimal_digits: SmallInt,
        parameter_value: Pointer,
        buffer_length: Len,
        str_len_or_ind: *mut Len,
    ) -> SqlReturn;

    unsafe fn param_data(&self, stmt: HStmt, value: *mut Pointer) -> SqlReturn;

    unsafe fn put_data(&self, stmt: HStmt, data: Pointer, str_len_or_ind: Len) -> SqlReturn;

    unsafe fn num_result_cols(&self, stmt: HStmt, column_count: *mut SmallInt) -> SqlReturn;

    unsafe fn describe_col(
        &self,
        stmt: HStmt,
        column_number: USmallInt,
        column_name: *mut WChar,
        buffer_length: SmallInt,
        name_length: *mut SmallInt,
        data_type: *mut SmallInt,
        column_size: *mut ULen,
        decimal_digits: *mut SmallInt,
        nullable: *mut SmallInt,
    ) -> SqlReturn;

    unsafe fn bind_col(
        &self,
        stmt: HStmt,
        column_number: USmallInt,
        target_type: SmallInt,
        target_value: Pointer,
        buffer_length: Len,
        str_len_or_ind: *mut Len,
    ) -> SqlReturn;

    unsafe fn fetch(&self, stmt: HStmt) -> SqlReturn;

    unsafe fn fetch_scroll(&self, stmt: HStmt, orientation: SmallInt, offset: Len) -> SqlReturn;

    unsafe fn get_data(
        &self,
        stmt: HStmt,
        column_number: USmallInt,
        target_type: SmallInt,
        target_value: Pointer,
        buffer_length: Len,
        str_len_or_ind: *mut Len,
    ) -> SqlReturn;

    unsafe fn more_results(&self, stmt: HStmt) -> SqlReturn;

    unsafe fn row_count(&self, stmt: HStmt, row_count: *mut Len) -> SqlReturn;

    unsafe fn free_stmt(&self, stmt: HStmt, option: USmallInt) -> SqlReturn;

    unsafe fn set_stmt_attr(
        &self,
        stmt: HStmt,
        attribute: Integer,
        value: Pointer,
        string_length: Integer,
    ) -> SqlReturn;

    unsafe fn get_stmt_attr(
        &self,
        stmt: HStmt,
        attribute: Integer,
        value: Pointer,
        buffer_length: Integer,
        string_length: *mut Integer,
    ) -> SqlReturn;

    unsafe fn set_desc_field(
        &self,
        desc: HDesc,
        rec_number: SmallInt,
        field_identifier: SmallInt,
        value: Pointer,
        buffer_length: Integer,
    ) -> SqlReturn;

    unsafe fn get_diag_rec(
        &self,
        handle_type: SmallInt,
        handle: Pointer,
        rec_number: SmallInt,
        state: *mut WChar,
        native_error: *mut Integer,
        message_text: *mut WChar,
        buffer_length: SmallInt,
        text_length: *mut SmallInt,
    ) -> SqlReturn;
}

type ExecDirectFn = unsafe extern "system" fn(HStmt, *const WChar, Integer) -> SqlReturn;
type PrepareFn = unsafe extern "system" fn(HStmt, *const WChar, Integer) -> SqlReturn;
type ExecuteFn = unsafe extern "system" fn(HStmt) -> SqlReturn;
type BindParameterFn = unsafe extern "system" fn(
    HStmt,
    USmallInt,
    SmallInt,
    SmallInt,
    SmallInt,
    ULen,
    SmallInt,
    Pointer,
    Len,
    *mut Len,
) -> SqlReturn;
type ParamDataFn = unsafe extern "system" fn(HStmt, *mut Pointer) -> SqlReturn;
type PutDataFn = unsafe extern "system" fn(HStmt, Pointer, Len) -> SqlReturn;
type NumResultColsFn = unsafe extern "system" fn(HStmt, *mut SmallInt) -> SqlReturn;
type DescribeColFn = unsafe extern "system" fn(
    HStmt,
    USmallInt,
    *mut WChar,
    SmallInt,
    *mut SmallInt,
    *mut SmallInt,
    *mut ULen,
    *mut SmallInt,
    *mut SmallInt,
) -> SqlReturn;
type BindColFn =
    unsafe extern "system" fn(HStmt, USmallInt, SmallInt, Pointer, Len, *mut Len) -> SqlReturn;
type FetchFn = unsafe extern "system" fn(HStmt) -> SqlReturn;
type FetchScrollFn = unsafe extern "system" fn(HStmt, SmallInt, Len) -> SqlReturn;
type GetDataFn =
    unsafe extern "system" fn(HStmt, USmallInt, SmallInt, Pointer, Len, *mut Len) -> SqlReturn;
type MoreResultsFn = unsafe extern "system" fn(HStmt) -> SqlReturn;
type RowCountFn = unsafe extern "system" fn(HStmt, *mut Len) -> SqlReturn;
type FreeStmtFn = unsafe extern "system" fn(HStmt, USmallInt) -> SqlReturn;
type SetStmtAttrFn = unsafe extern "system" fn(HStmt, Integer, Pointer, Integer) -> SqlReturn;
type GetStmtAttrFn =
    unsafe extern "system" fn(HStmt, Integer, Pointer, Integer, *mut Integer) -> SqlReturn;
type SetDescFieldFn =
    unsafe extern "system" fn(HDesc, SmallInt, SmallInt, Pointer, Integer) -> SqlReturn;
type GetDiagRecFn = unsafe extern "system" fn(
    SmallInt,
    Pointer,
    SmallInt,
    *mut WChar,
    *mut Integer,
    *mut WChar,
    SmallInt,
    *mut SmallInt,
) -> SqlReturn;

/// Resolved ODBC entry points. Immutable once built.
#[derive(Clone, Copy)]
pub struct FunctionTable {
    exec_direct: ExecDirectFn,
    prepare: PrepareFn,
    execute: ExecuteFn,
    bind_parameter: BindParameterFn,
    param_data: ParamDataFn,
    put_data: PutDataFn,
    num_result_cols: NumResultColsFn,
    describe_col: DescribeColFn,
    bind_col: BindColFn,
    fetch: FetchFn,
    fetch_scroll: FetchScrollFn,
    get_data: GetDataFn,
    more_results: MoreResultsFn,
    row_count: RowCountFn,
    free_stmt: FreeStmtFn,
    set_stmt_attr: SetStmtAttrFn,
    get_stmt_attr: GetStmtAttrFn,
    set_desc_field: SetDescFieldFn,
    get_diag_rec: GetDiagRecFn,
}

static FUNCTION_TABLE: OnceCell<FunctionTable> = OnceCell::new();

macro_rules! resolve {
    ($resolver:ident, $name:literal) => {{
        let symbol = $resolver($name)
            .ok_or_else(|| Error::config(format!("missing ODBC symbol {}", $name)))?;
        // SAFETY: the caller of `load` guarantees `$name` resolves to the ODBC function
        // of that name, whose signature is the field type.
        unsafe { std::mem::transmute::<*mut c_void, _>(symbol.as_ptr()) }
    }};
}

impl FunctionTable {
    /// Resolves every entry point through `resolver`, which maps an ODBC function name
    /// (for example `"SQLExecDirectW"`) to its address.
    ///
    /// # Safety
    ///
    /// Each address returned by `resolver` must point to a function with the signature
    /// the ODBC specification gives for that name, and must stay loaded for as long as the
    /// table is used.
    pub unsafe fn load<F>(mut resolver: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<NonNull<c_void>>,
    {
        Ok(Self {
            exec_direct: resolve!(resolver, "SQLExecDirectW"),
            prepare: resolve!(resolver, "SQLPrepareW"),
            execute: resolve!(resolver, "SQLExecute"),
            bind_parameter: resolve!(resolver, "SQLBindParameter"),
            param_data: resolve!(resolver, "SQLParamData"),
            put_data: resolve!(resolver, "SQLPutData"),
            num_result_cols: resolve!(resolver, "SQLNumResultCols"),
            describe_col: resolve!(resolver, "SQLDescribeColW"),
            bind_col: resolve!(resolver, "SQLBindCol"),
            fetch: resolve!(resolver, "SQLFetch"),
            fetch_scroll: resolve!(resolver, "SQLFetchScroll"),
            get_data: resolve!(resolver, "SQLGetData"),
            more_results: resolve!(resolver, "SQLMoreResults"),
            row_count: resolve!(resolver, "SQLRowCount"),
            free_stmt: resolve!(resolver, "SQLFreeStmt"),
            set_stmt_attr: resolve!(resolver, "SQLSetStmtAttrW"),
            get_stmt_attr: resolve!(resolver, "SQLGetStmtAttrW"),
            set_desc_field: resolve!(resolver, "SQLSetDescFieldW"),
            get_diag_rec: resolve!(resolver, "SQLGetDiagRecW"),
        })
    }

    /// Builds the process-wide table on first use and returns it on every later call.
    ///
    /// Only the first successful call runs `resolver`; a failed resolution leaves the cell
    /// empty so a later call may retry.
    ///
    /// # Safety
    ///
    /// Same contract as [`FunctionTable::load`].
    pub unsafe fn init_once<F>(resolver: F) -> Result<&'static FunctionTable>
    where
        F: FnMut(&str) -> Option<NonNull<c_void>>,
    {
        FUNCTION_TABLE.get_or_try_init(|| {
            log::debug!("resolving ODBC function table");
            // SAFETY: forwarded from the caller.
            unsafe { Self::load(resolver) }
        })
    }

    /// The table built by [`FunctionTable::init_once`], if any.
    pub fn get() -> Option<&'static FunctionTable> {
        FUNCTION_TABLE.get()
    }
}

impl std::fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTable").finish_non_exhaustive()
    }
}

impl OdbcApi for FunctionTable {
    unsafe fn exec_direct(&self, stmt: HStmt, text: *const WChar, text_len: Integer) -> SqlReturn {
        unsafe { (self.exec_direct)(stmt, text, text_len) }
    }

    unsafe fn prepare(&self, stmt: HStmt, text: *const WChar, text_len: Integer) -> SqlReturn {
        unsafe { (self.prepare)(stmt, text, text_len) }
    }

    unsafe fn execute(&self, stmt: HStmt) -> SqlReturn {
        unsafe { (self.execute)(stmt) }
    }

    unsafe fn bind_parameter(
        &self,
        stmt: HStmt,
        parameter_number: USmallInt,
        input_output_type: SmallInt,
        value_type: SmallInt,
        parameter_type: SmallInt,
        column_size: ULen,
        decimal_digits: SmallInt,
        parameter_value: Pointer,
        buffer_length: Len,
        str_len_or_ind: *mut Len,
    ) -> SqlReturn {
        unsafe {
            (self.bind_parameter)(
                stmt,
                parameter_number,
                input_output_type,
                value_type,
                parameter_type,
                column_size,
                decimal_digits,
                parameter_value,
                buffer_length,
                str_len_or_ind,
            )
        }
    }

    unsafe fn param_data(&self, stmt: HStmt, value: *mut Pointer) -> SqlReturn {
        unsafe { (self.param_data)(stmt, value) }
    }

    unsafe fn put_data(&self, stmt: HStmt, data: Pointer, str_len_or_ind: Len) -> SqlReturn {
        unsafe { (self.put_data)(stmt, data, str_len_or_ind) }
    }

    unsafe fn num_result_cols(&self, stmt: HStmt, column_count: *mut SmallInt) -> SqlReturn {
        unsafe { (self.num_result_cols)(stmt, column_count) }
    }

    unsafe fn describe_col(
        &self,
        stmt: HStmt,
        column_number: USmallInt,
        column_name: *mut WChar,
        buffer_length: SmallInt,
        name_length: *mut SmallInt,
        data_type: *mut SmallInt,
        column_size: *mut ULen,
        decimal_digits: *mut SmallInt,
        nullable: *mut SmallInt,
    ) -> SqlReturn {
        unsafe {
            (self.describe_col)(
                stmt,
                column_number,
                column_name,
                buffer_length,
                name_length,
                data_type,
                column_size,
                decimal_digits,
                nullable,
            )
        }
    }

    unsafe fn bind_col(
        &self,
        stmt: HStmt,
        column_number: USmallInt,
        target_type: SmallInt,
        target_value: Pointer,
        buffer_length: Len,
        str_len_or_ind: *mut Len,
    ) -> SqlReturn {
        unsafe {
            (self.bind_col)(
                stmt,
                column_number,
                target_type,
                target_value,
                buffer_length,
                str_len_or_ind,
            )
        }
    }

    unsafe fn fetch(&self, stmt: HStmt) -> SqlReturn {
        unsafe { (self.fetch)(stmt) }
    }

    unsafe fn fetch_scroll(&self, stmt: HStmt, orientation: SmallInt, offset: Len) -> SqlReturn {
        unsafe { (self.fetch_scroll)(stmt, orientation, offset) }
    }

    unsafe fn get_data(
        &self,
        stmt: HStmt,
        column_number: USmallInt,
        target_type: SmallInt,
        target_value: Pointer,
        buffer_length: Len,
        str_len_or_ind: *mut Len,
    ) -> SqlReturn {
        unsafe {
            (self.get_data)(
                stmt,
                column_number,
                target_type,
                target_value,
                buffer_length,
                str_len_or_ind,
            )
        }
    }

    unsafe fn more_results(&self, stmt: HStmt) -> SqlReturn {
        unsafe { (self.more_results)(stmt) }
    }

    unsafe fn row_count(&self, stmt: HStmt, row_count: *mut Len) -> SqlReturn {
        unsafe { (self.row_count)(stmt, row_count) }
    }

    unsafe fn free_stmt(&self, stmt: HStmt, option: USmallInt) -> SqlReturn {
        unsafe { (self.free_stmt)(stmt, option) }
    }

    unsafe fn set_stmt_attr(
        &self,
        stmt: HStmt,
        attribute: Integer,
        value: Pointer,
        string_length: Integer,
    ) -> SqlReturn {
        unsafe { (self.set_stmt_attr)(stmt, attribute, value, string_length) }
    }

    unsafe fn get_stmt_attr(
        &self,
        stmt: HStmt,
        attribute: Integer,
        value: Pointer,
        buffer_length: Integer,
        string_length: *mut Integer,
    ) -> SqlReturn {
        unsafe { (self.get_stmt_attr)(stmt, attribute, value, buffer_length, string_length) }
    }

    unsafe fn set_desc_field(
        &self,
        desc: HDesc,
        rec_number: SmallInt,
        field_identifier: SmallInt,
        value: Pointer,
        buffer_length: Integer,
    ) -> SqlReturn {
        unsafe { (self.set_desc_field)(desc, rec_number, field_identifier, value, buffer_length) }
    }

    unsafe fn get_diag_rec(
        &self,
        handle_type: SmallInt,
        handle: Pointer,
        rec_number: SmallInt,
        state: *mut WChar,
        native_error: *mut Integer,
        message_text: *mut WChar,
        buffer_length: SmallInt,
        text_length: *mut SmallInt,
    ) -> SqlReturn {
        unsafe {
            (self.get_diag_rec)(
                handle_type,
                handle,
                rec_number,
                state,
                native_error,
                message_text,
                buffer_length,
                text_length,
            )
        }
    }
}
