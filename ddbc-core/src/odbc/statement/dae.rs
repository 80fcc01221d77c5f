//! Sending deferred parameter values after execution started.

use crate::error::Result;
use crate::odbc::arena::ParamSlot;
use crate::odbc::diagnostics::{check, check_success};
use crate::odbc::sys::{HStmt, Len, Pointer, SqlReturn};
use crate::odbc::{CValue, OdbcApi, ParamArena};

/// Progress of one data-at-execution exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaeState {
    Idle,
    /// The execute call is in progress.
    Executing,
    /// The driver asked for the value of a deferred parameter.
    NeedData,
    /// The requested value is being sent.
    Draining,
    Done,
}

/// Drives the `SQLParamData` / `SQLPutData` loop of one execution.
#[derive(Debug)]
pub struct DaeStreamer<'a, A: ?Sized> {
    api: &'a A,
    stmt: HStmt,
    chunk_size: usize,
    state: DaeState,
    put_calls: usize,
}

impl<'a, A: OdbcApi + ?Sized> DaeStreamer<'a, A> {
    /// `chunk_size` is counted in bytes for narrow text and binary, in UTF-16 units for
    /// wide text.
    pub fn new(api: &'a A, stmt: HStmt, chunk_size: usize) -> Self {
        Self {
            api,
            stmt,
            chunk_size: chunk_size.max(1),
            state: DaeState::Idle,
            put_calls: 0,
        }
    }

    pub fn state(&self) -> DaeState {
        self.state
    }

    /// Number of `SQLPutData` calls made so far.
    pub fn put_calls(&self) -> usize {
        self.put_calls
    }

    /// Runs `execute` and, while the driver reports `SQL_NEED_DATA`, sends the deferred
    /// value it asks for. Returns the final return code of the execution.
    ///
    /// Deferred values are looked up in `arena` by the identity of their slot, which is the
    /// token bound in place of their data.
    pub fn run<F>(
        &mut self,
        arena: &ParamArena,
        function: &'static str,
        execute: F,
    ) -> Result<SqlReturn>
    where
        F: FnOnce() -> SqlReturn,
    {
        self.state = DaeState::Executing;
        let ret = check(self.api, self.stmt, function, execute());
        let mut ret = self.fail_on_error(ret)?;
        if ret != SqlReturn::NEED_DATA {
            self.state = DaeState::Done;
            return Ok(ret);
        }
        log::debug!("{} needs data at execution", function);

        while ret == SqlReturn::NEED_DATA {
            self.state = DaeState::NeedData;
            let mut token: Pointer = std::ptr::null_mut();
            let result = check(self.api, self.stmt, "SQLParamData", unsafe {
                self.api.param_data(self.stmt, &mut token)
            });
            ret = self.fail_on_error(result)?;
            if ret != SqlReturn::NEED_DATA {
                break;
            }

            let slot = match arena.find_data_at_exec(token) {
                Some(slot) => slot,
                None => {
                    self.state = DaeState::Idle;
                    return Err(err_protocol!(
                        "driver requested data for unknown parameter token {:p}",
                        token
                    ));
                }
            };
            self.state = DaeState::Draining;
            if let Err(e) = self.send(slot) {
                self.state = DaeState::Idle;
                return Err(e);
            }
        }

        self.state = DaeState::Done;
        log::debug!(
            "data at execution finished after {} chunks with {}",
            self.put_calls,
            ret
        );
        Ok(ret)
    }

    fn fail_on_error(&mut self, result: Result<SqlReturn>) -> Result<SqlReturn> {
        if result.is_err() {
            self.state = DaeState::Idle;
        }
        result
    }

    fn send(&mut self, slot: &ParamSlot) -> Result<()> {
        match &slot.value {
            CValue::Char(bytes) | CValue::Binary(bytes) => self.send_units(slot.index, bytes),
            CValue::WChar(units) => self.send_units(slot.index, units),
            other => Err(err_protocol!(
                "parameter {} of type {:?} cannot be streamed",
                slot.index,
                other.c_type()
            )),
        }
    }

    fn send_units<T>(&mut self, index: usize, data: &[T]) -> Result<()> {
        if data.is_empty() {
            return self.put(data.as_ptr() as Pointer, 0);
        }
        for (n, chunk) in data.chunks(self.chunk_size).enumerate() {
            let len = std::mem::size_of_val(chunk);
            log::trace!("parameter {}: sending chunk {} of {} bytes", index, n, len);
            self.put(chunk.as_ptr() as Pointer, len as Len)?;
        }
        Ok(())
    }

    fn put(&mut self, data: Pointer, len: Len) -> Result<()> {
        self.put_calls += 1;
        let ret = unsafe { self.api.put_data(self.stmt, data, len) };
        check_success(self.api, self.stmt, "SQLPutData", ret)?;
        Ok(())
    }
}
