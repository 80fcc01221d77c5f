//! Executing SQL on one statement handle.
//!
//! [`OdbcStatement`] owns everything bound to its handle for the duration of a call: the
//! parameter arena while executing and the row arrays while fetching. It never leaves a
//! buffer bound after a call returns, so nothing the driver could write to outlives the
//! call that created it.

use std::borrow::Cow;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::odbc::codec::wide;
use crate::odbc::column;
use crate::odbc::diagnostics::{check, check_success};
use crate::odbc::sys::{self, HStmt, Integer, Len, Pointer, SqlReturn};
use crate::odbc::{
    ColumnDescriptor, HostValue, OdbcApi, OdbcBufferSettings, OdbcQueryResult, OdbcRow,
    OdbcStatementOptions, ParamArena,
};

pub mod batch;
pub mod binder;
pub mod dae;
pub mod fetch;

use binder::ParameterDescriptor;
use dae::DaeStreamer;
use fetch::ColumnBufferSet;

/// Lifecycle of an [`OdbcStatement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    Unprepared,
    Prepared,
    /// Execution finished and its outcome is being inspected.
    Executed,
    /// A result set with columns is open.
    ResultsAvailable,
    /// The current result is a row count only, or all results were consumed.
    NoResults,
    Closed,
}

/// A statement handle together with the buffers bound to it.
///
/// The handle is allocated and freed by the caller; this type only uses it.
pub struct OdbcStatement<'a, A: OdbcApi + ?Sized> {
    api: &'a A,
    handle: HStmt,
    options: OdbcStatementOptions,
    state: StatementState,
    prepared_sql: Option<String>,
    columns: Arc<[ColumnDescriptor]>,
    arena: ParamArena,
}

impl<'a, A: OdbcApi + ?Sized> OdbcStatement<'a, A> {
    pub fn new(api: &'a A, handle: HStmt) -> Self {
        Self::with_options(api, handle, OdbcStatementOptions::default())
    }

    pub fn with_options(api: &'a A, handle: HStmt, options: OdbcStatementOptions) -> Self {
        Self {
            api,
            handle,
            options,
            state: StatementState::Unprepared,
            prepared_sql: None,
            columns: Arc::from(Vec::new()),
            arena: ParamArena::new(),
        }
    }

    pub fn handle(&self) -> HStmt {
        self.handle
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    pub fn options(&self) -> &OdbcStatementOptions {
        &self.options
    }

    /// Columns of the active result set, empty if there is none.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Prepares `sql` for repeated execution.
    pub fn prepare(&mut self, sql: &str) -> Result<()> {
        self.close_cursor()?;
        let text = wide::encode(sql);
        let ret = unsafe { self.api.prepare(self.handle, text.as_ptr(), text_len(&text)?) };
        if let Err(e) = check_success(self.api, self.handle, "SQLPrepareW", ret) {
            self.prepared_sql = None;
            self.state = StatementState::Unprepared;
            return Err(e);
        }

        log::debug!("prepared statement: {}", sql);
        self.prepared_sql = Some(sql.to_owned());
        self.columns = Arc::from(Vec::new());
        self.state = StatementState::Prepared;
        Ok(())
    }

    /// Executes `sql` without parameters and without preparing it first.
    pub fn exec_direct(&mut self, sql: &str) -> Result<OdbcQueryResult> {
        self.close_cursor()?;
        self.prepared_sql = None;
        self.state = StatementState::Unprepared;

        let text = wide::encode(sql);
        let len = text_len(&text)?;
        let (api, handle) = (self.api, self.handle);
        let mut streamer = DaeStreamer::new(api, handle, self.options.dae_chunk_size);
        let ret = streamer.run(&self.arena, "SQLExecDirectW", || unsafe {
            api.exec_direct(handle, text.as_ptr(), len)
        })?;
        self.finish_execution(ret)
    }

    /// Executes `sql` with `params`, inferring a descriptor for every value.
    ///
    /// Without parameters the statement is executed directly. Otherwise it is prepared
    /// unless it is the statement prepared last.
    pub fn execute(&mut self, sql: &str, params: &[HostValue]) -> Result<OdbcQueryResult> {
        let descriptors: Vec<_> = params.iter().map(ParameterDescriptor::infer).collect();
        self.execute_with(sql, params, &descriptors)
    }

    /// Executes `sql` binding `params` as described by `descriptors`.
    pub fn execute_with(
        &mut self,
        sql: &str,
        params: &[HostValue],
        descriptors: &[ParameterDescriptor],
    ) -> Result<OdbcQueryResult> {
        if params.is_empty() && descriptors.is_empty() {
            return self.exec_direct(sql);
        }
        self.prepare_once(sql)?;

        let result = self.bind_and_execute(params, descriptors);
        self.after_execution(result)
    }

    /// Executes `sql` once for every row of `rows` with parameter arrays.
    ///
    /// All rows must have the same number of values. Without `descriptors` one is inferred
    /// per parameter from its column of values.
    pub fn execute_many(
        &mut self,
        sql: &str,
        rows: &[Vec<HostValue>],
        descriptors: Option<&[ParameterDescriptor]>,
    ) -> Result<OdbcQueryResult> {
        let width = match rows.first() {
            Some(first) => first.len(),
            None => return Ok(OdbcQueryResult::default()),
        };
        if width == 0 {
            return Err(err_protocol!(
                "set-based execution needs at least one parameter"
            ));
        }

        let mut columns: Vec<Vec<HostValue>> = vec![Vec::with_capacity(rows.len()); width];
        for row in rows {
            if row.len() != width {
                return Err(Error::ArgumentCount {
                    expected: width,
                    actual: row.len(),
                });
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value.clone());
            }
        }

        let descriptors = match descriptors {
            Some(descriptors) => Cow::Borrowed(descriptors),
            None => Cow::Owned(
                columns
                    .iter()
                    .map(|column| ParameterDescriptor::infer_column(column))
                    .collect(),
            ),
        };

        self.prepare_once(sql)?;
        log::debug!("executing {} parameter sets", rows.len());

        let result = self.execute_arrays(&columns, &descriptors, rows.len());

        let restored = self.set_paramset_size(1);
        let result = self.after_execution(result);
        if let Err(e) = restored {
            log::warn!("failed to restore the parameter set size: {}", e);
        }
        result
    }

    /// Fetches the next row one value at a time.
    pub fn fetch_one(&mut self) -> Result<Option<OdbcRow>> {
        self.ensure_result_set()?;
        fetch::fetch_row(
            self.api,
            self.handle,
            &self.columns,
            self.options.lob_chunk_size,
        )
    }

    /// Fetches up to `limit` rows.
    pub fn fetch_many(&mut self, limit: usize) -> Result<Vec<OdbcRow>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.fetch_rows(Some(limit))
    }

    /// Fetches every remaining row of the active result set.
    pub fn fetch_all(&mut self) -> Result<Vec<OdbcRow>> {
        self.fetch_rows(None)
    }

    /// Advances to the next result. Returns `false` once all results are consumed.
    pub fn more_results(&mut self) -> Result<bool> {
        match self.state {
            StatementState::ResultsAvailable
            | StatementState::NoResults
            | StatementState::Executed => {}
            _ => return Ok(false),
        }

        let ret = unsafe { self.api.more_results(self.handle) };
        let ret = check(self.api, self.handle, "SQLMoreResults", ret)?;
        if ret == SqlReturn::NO_DATA {
            self.columns = Arc::from(Vec::new());
            self.state = StatementState::NoResults;
            return Ok(false);
        }
        self.refresh_columns()?;
        Ok(true)
    }

    /// Rows affected by the last execution, 0 if the driver cannot tell.
    pub fn row_count(&self) -> u64 {
        let mut count: Len = 0;
        let ret = unsafe { self.api.row_count(self.handle, &mut count) };
        if let Err(e) = check_success(self.api, self.handle, "SQLRowCount", ret) {
            log::warn!("Failed to get row count: {}", e);
            return 0;
        }
        // -1 when the count is not available, as for most SELECTs
        u64::try_from(count).unwrap_or(0)
    }

    /// Closes any open cursor and resets parameters. The handle can be reused afterwards.
    pub fn close(&mut self) -> Result<()> {
        let ret = unsafe { self.api.free_stmt(self.handle, sys::CLOSE) };
        check_success(self.api, self.handle, "SQLFreeStmt", ret)?;
        self.reset_parameters()?;
        self.prepared_sql = None;
        self.columns = Arc::from(Vec::new());
        self.state = StatementState::Closed;
        log::debug!("statement closed");
        Ok(())
    }

    fn prepare_once(&mut self, sql: &str) -> Result<()> {
        if self.prepared_sql.as_deref() == Some(sql) {
            self.close_cursor()?;
            self.state = StatementState::Prepared;
            log::trace!("reusing prepared statement");
            return Ok(());
        }
        self.prepare(sql)
    }

    fn bind_and_execute(
        &mut self,
        params: &[HostValue],
        descriptors: &[ParameterDescriptor],
    ) -> Result<OdbcQueryResult> {
        binder::bind_parameters(
            self.api,
            self.handle,
            params,
            descriptors,
            self.options.inline_threshold,
            &mut self.arena,
        )?;
        self.run_execute()
    }

    fn execute_arrays(
        &mut self,
        columns: &[Vec<HostValue>],
        descriptors: &[ParameterDescriptor],
        rows: usize,
    ) -> Result<OdbcQueryResult> {
        self.set_paramset_size(rows)?;
        binder::bind_parameter_arrays(
            self.api,
            self.handle,
            columns,
            descriptors,
            rows,
            &mut self.arena,
        )?;
        self.run_execute()
    }

    fn run_execute(&mut self) -> Result<OdbcQueryResult> {
        let (api, handle) = (self.api, self.handle);
        let mut streamer = DaeStreamer::new(api, handle, self.options.dae_chunk_size);
        let ret = streamer.run(&self.arena, "SQLExecute", || unsafe { api.execute(handle) })?;
        self.finish_execution(ret)
    }

    fn finish_execution(&mut self, ret: SqlReturn) -> Result<OdbcQueryResult> {
        self.state = StatementState::Executed;
        self.refresh_columns()?;
        let has_result_set = !self.columns.is_empty();
        let rows_affected = if has_result_set { 0 } else { self.row_count() };
        log::debug!(
            "execution finished with {}: {} rows affected, result set: {}",
            ret,
            rows_affected,
            has_result_set
        );
        Ok(OdbcQueryResult {
            rows_affected,
            return_code: ret,
            has_result_set,
        })
    }

    /// Unbinds the parameters of a finished execution, keeping its outcome.
    fn after_execution(
        &mut self,
        result: Result<OdbcQueryResult>,
    ) -> Result<OdbcQueryResult> {
        if result.is_err() && self.prepared_sql.is_some() {
            self.state = StatementState::Prepared;
        }
        match (result, self.reset_parameters()) {
            (Ok(done), Ok(())) => Ok(done),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), reset) => {
                if let Err(reset) = reset {
                    log::warn!("failed to reset parameters after an error: {}", reset);
                }
                Err(e)
            }
        }
    }

    fn reset_parameters(&mut self) -> Result<()> {
        if self.arena.is_empty() {
            return Ok(());
        }
        let ret = unsafe { self.api.free_stmt(self.handle, sys::RESET_PARAMS) };
        check_success(self.api, self.handle, "SQLFreeStmt", ret)?;
        self.arena.clear();
        Ok(())
    }

    fn set_paramset_size(&self, rows: usize) -> Result<()> {
        let ret = unsafe {
            self.api
                .set_stmt_attr(self.handle, sys::ATTR_PARAMSET_SIZE, rows as Pointer, 0)
        };
        check_success(self.api, self.handle, "SQLSetStmtAttrW", ret)?;
        Ok(())
    }

    fn refresh_columns(&mut self) -> Result<()> {
        let columns = column::describe_all(self.api, self.handle)?;
        self.state = if columns.is_empty() {
            StatementState::NoResults
        } else {
            StatementState::ResultsAvailable
        };
        self.columns = Arc::from(columns);
        Ok(())
    }

    fn close_cursor(&mut self) -> Result<()> {
        if matches!(
            self.state,
            StatementState::Executed | StatementState::ResultsAvailable | StatementState::NoResults
        ) {
            let ret = unsafe { self.api.free_stmt(self.handle, sys::CLOSE) };
            check_success(self.api, self.handle, "SQLFreeStmt", ret)?;
            self.columns = Arc::from(Vec::new());
        }
        Ok(())
    }

    fn ensure_result_set(&self) -> Result<()> {
        if self.state != StatementState::ResultsAvailable {
            return Err(err_protocol!(
                "cannot fetch: the statement has no open result set ({:?})",
                self.state
            ));
        }
        Ok(())
    }

    fn uses_row_path(&self) -> bool {
        self.options.stream_lobs
            && self
                .columns
                .iter()
                .any(|column| fetch::is_lob(column, self.options.inline_threshold))
    }

    fn fetch_rows(&mut self, limit: Option<usize>) -> Result<Vec<OdbcRow>> {
        self.ensure_result_set()?;

        let (memory_limit, fallback) = match self.options.buffer_settings {
            OdbcBufferSettings::Buffered {
                batch_memory_limit,
                fallback_column_size,
            } if !self.uses_row_path() => (batch_memory_limit, fallback_column_size),
            _ => return self.fetch_rows_one_by_one(limit),
        };

        let row_bytes = batch::row_bytes(&self.columns, fallback);
        let batch = batch::rows_per_batch(row_bytes, memory_limit);
        let capacity = limit.map_or(batch, |limit| limit.min(batch));
        log::debug!(
            "fetching in batches of {} rows of {} bytes",
            capacity,
            row_bytes
        );

        let mut buffers = ColumnBufferSet::new(&self.columns, capacity, fallback);
        let result = self.fetch_batches(&mut buffers, limit);
        // the buffers must not be dropped while still bound
        let unbound = fetch::unbind(self.api, self.handle);
        let rows = result?;
        unbound?;
        Ok(rows)
    }

    fn fetch_batches(
        &self,
        buffers: &mut ColumnBufferSet,
        limit: Option<usize>,
    ) -> Result<Vec<OdbcRow>> {
        buffers.bind(self.api, self.handle)?;

        let mut rows = Vec::new();
        loop {
            let wanted = match limit {
                Some(limit) => limit - rows.len(),
                None => buffers.rows(),
            };
            if wanted == 0 {
                break;
            }
            let fetched = match buffers.fetch(self.api, self.handle, wanted)? {
                Some(fetched) => fetched,
                None => break,
            };
            log::trace!("fetched a batch of {} rows", fetched);
            for row in 0..fetched {
                rows.push(buffers.materialize(row, &self.columns)?);
            }
            if fetched == 0 {
                break;
            }
        }
        Ok(rows)
    }

    fn fetch_rows_one_by_one(&mut self, limit: Option<usize>) -> Result<Vec<OdbcRow>> {
        let mut rows = Vec::new();
        while limit.map_or(true, |limit| rows.len() < limit) {
            match fetch::fetch_row(
                self.api,
                self.handle,
                &self.columns,
                self.options.lob_chunk_size,
            )? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }
}

impl<A: OdbcApi + ?Sized> Drop for OdbcStatement<'_, A> {
    fn drop(&mut self) {
        if !self.arena.is_empty() {
            // the driver must not keep pointers into the arena about to be freed
            let ret = unsafe { self.api.free_stmt(self.handle, sys::RESET_PARAMS) };
            if !ret.succeeded() {
                log::warn!("failed to reset parameters of a dropped statement: {}", ret);
            }
        }
    }
}

fn text_len(text: &[u16]) -> Result<Integer> {
    Integer::try_from(text.len())
        .map_err(|_| err_protocol!("statement text of {} units is too long", text.len()))
}
