//! An in-process stand-in for an ODBC driver.
//!
//! [`MockDriver`] implements [`OdbcApi`] over scripted result sets. It honours the parts of
//! the call contract the marshalling core relies on: bound parameter and column buffers,
//! indicator arrays, row-array and parameter-set sizes, data-at-execution tokens, chunked
//! `SQLGetData` and diagnostic records. It is single-threaded and keeps every call it
//! receives for inspection.
//!
//! ```rust,ignore
//! let driver = MockDriver::new();
//! driver.push_result_set(
//!     MockResultSet::new(vec![MockColumn::new("id", SqlDataType::Integer)])
//!         .row(vec![MockCell::Int(1)]),
//! );
//! let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
//! stmt.exec_direct("SELECT id FROM t")?;
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::mem::size_of;
use std::ptr;
use std::slice;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use uuid::Uuid;

use crate::odbc::codec::wide;
use crate::odbc::sys::{
    self, HDesc, HStmt, Integer, Len, Pointer, SmallInt, SqlDate, SqlGuid, SqlNumeric,
    SqlReturn, SqlTime, SqlTimestamp, ULen, USmallInt, WChar,
};
use crate::odbc::{CType, FixedPointValue, OdbcApi, SqlDataType};

const STMT_HANDLE: usize = 0x5157;
const DESC_HANDLE: usize = 0xDE5C;

/// One value of a scripted result set.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCell {
    Null,
    /// Reported as `SQL_NO_TOTAL` by bound fetches and as NULL by `SQLGetData`.
    NoTotal,
    Int(i64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Guid(Uuid),
}

/// Column metadata reported by `SQLDescribeColW`.
#[derive(Debug, Clone, PartialEq)]
pub struct MockColumn {
    pub name: String,
    pub data_type: SqlDataType,
    pub size: usize,
    pub digits: i16,
    pub nullable: bool,
}

impl MockColumn {
    pub fn new(name: &str, data_type: SqlDataType) -> Self {
        Self {
            name: name.to_owned(),
            data_type,
            size: 0,
            digits: 0,
            nullable: true,
        }
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn digits(mut self, digits: i16) -> Self {
        self.digits = digits;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// One result of an execution: rows under columns, or an affected-row count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockResultSet {
    pub columns: Vec<MockColumn>,
    pub rows: Vec<Vec<MockCell>>,
    pub affected: Len,
}

impl MockResultSet {
    pub fn new(columns: Vec<MockColumn>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            affected: -1,
        }
    }

    /// A result without columns reporting `rows` affected rows.
    pub fn affected(rows: Len) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            affected: rows,
        }
    }

    pub fn row(mut self, cells: Vec<MockCell>) -> Self {
        self.rows.push(cells);
        self
    }
}

/// Arguments of one `SQLBindParameter` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundParameter {
    pub number: USmallInt,
    pub direction: SmallInt,
    pub c_type: SmallInt,
    pub sql_type: SmallInt,
    pub column_size: ULen,
    pub decimal_digits: SmallInt,
    pub value_ptr: Pointer,
    pub buffer_length: Len,
    /// Value of the indicator (of the first row) when the parameter was bound.
    pub indicator: Len,
    pub indicator_ptr: *mut Len,
}

/// Arguments of one `SQLSetDescFieldW` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorField {
    pub record: SmallInt,
    pub field: SmallInt,
    pub value: isize,
}

#[derive(Debug, Clone, Copy)]
struct BoundColumn {
    c_type: SmallInt,
    ptr: Pointer,
    buffer_length: Len,
    indicator: *mut Len,
}

#[derive(Debug)]
struct Cursor {
    set: MockResultSet,
    next_row: usize,
    current_row: Option<usize>,
    read_offsets: HashMap<USmallInt, usize>,
    finished: HashSet<USmallInt>,
}

impl Cursor {
    fn new(set: MockResultSet) -> Self {
        Self {
            set,
            next_row: 0,
            current_row: None,
            read_offsets: HashMap::new(),
            finished: HashSet::new(),
        }
    }
}

#[derive(Debug)]
struct Scripted {
    ret: SqlReturn,
    state: String,
    message: String,
}

#[derive(Debug, Default)]
struct State {
    executions: VecDeque<Vec<MockResultSet>>,
    cursor: Option<Cursor>,
    pending: VecDeque<MockResultSet>,
    affected: Len,
    echo: bool,
    no_total_chunks: bool,

    diagnostics: Vec<(String, Integer, String)>,
    scripted: HashMap<String, Scripted>,
    calls: Vec<String>,
    sql: Vec<String>,
    attrs: HashMap<Integer, usize>,

    parameters: BTreeMap<USmallInt, BoundParameter>,
    parameter_log: Vec<BoundParameter>,
    descriptor_fields: Vec<DescriptorField>,
    columns: BTreeMap<USmallInt, BoundColumn>,

    dae_queue: VecDeque<Pointer>,
    dae_current: Option<Pointer>,
    dae_data: HashMap<usize, Vec<u8>>,
    put_lengths: Vec<Len>,
    executed: Vec<Vec<Vec<MockCell>>>,
}

impl State {
    fn diag(&mut self, state: &str, message: impl Into<String>) {
        self.diagnostics
            .push((state.to_owned(), 0, message.into()));
    }

    fn attr(&self, attribute: Integer) -> Option<usize> {
        self.attrs.get(&attribute).copied()
    }

    fn paramset_size(&self) -> usize {
        self.attr(sys::ATTR_PARAMSET_SIZE).unwrap_or(1).max(1)
    }

    fn activate(&mut self, results: Vec<MockResultSet>, default_affected: Len) {
        self.pending = results.into();
        self.cursor = None;
        self.affected = default_affected;
        self.advance_result();
    }

    fn advance_result(&mut self) -> bool {
        match self.pending.pop_front() {
            Some(set) if set.columns.is_empty() => {
                self.affected = set.affected;
                self.cursor = None;
                true
            }
            Some(set) => {
                self.affected = -1;
                self.cursor = Some(Cursor::new(set));
                true
            }
            None => {
                self.cursor = None;
                false
            }
        }
    }

    /// Starts execution: asks for deferred values first, if any are bound.
    fn start_execution(&mut self) -> SqlReturn {
        self.dae_data.clear();
        let tokens: Vec<Pointer> = self
            .parameters
            .values()
            .filter(|p| {
                // SAFETY: indicator pointers stay valid while the parameter is bound.
                let indicator = unsafe { read_indicator(p.indicator_ptr, 0) };
                indicator.map_or(false, sys::is_data_at_exec)
            })
            .map(|p| p.value_ptr)
            .collect();
        if tokens.is_empty() {
            return self.complete_execution();
        }
        self.dae_queue.extend(tokens);
        SqlReturn::NEED_DATA
    }

    fn complete_execution(&mut self) -> SqlReturn {
        let sets = self.paramset_size();
        let rows: Vec<Vec<MockCell>> = if self.parameters.is_empty() {
            Vec::new()
        } else {
            (0..sets)
                .map(|row| {
                    self.parameters
                        .values()
                        // SAFETY: bound buffers stay valid until the parameters are reset.
                        .map(|p| unsafe { read_parameter(p, row, &self.dae_data) })
                        .collect()
                })
                .collect()
        };

        let results = if self.echo && !self.parameters.is_empty() {
            let columns = self
                .parameters
                .values()
                .map(|p| {
                    MockColumn::new(&format!("p{}", p.number), SqlDataType::from_raw(p.sql_type))
                        .size(p.column_size)
                        .digits(p.decimal_digits)
                })
                .collect();
            vec![MockResultSet {
                columns,
                rows: rows.clone(),
                affected: -1,
            }]
        } else {
            self.executions.pop_front().unwrap_or_default()
        };

        let default_affected = rows.len() as Len;
        self.executed.push(rows);
        self.activate(results, default_affected);
        SqlReturn::SUCCESS
    }
}

/// Scripted implementation of [`OdbcApi`].
#[derive(Debug, Default)]
pub struct MockDriver {
    state: RefCell<State>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The statement handle to pass to every call.
    pub fn statement_handle(&self) -> HStmt {
        HStmt(STMT_HANDLE as Pointer)
    }

    /// Queues the result of the next execution.
    pub fn push_result_set(&self, set: MockResultSet) {
        self.state.borrow_mut().executions.push_back(vec![set]);
    }

    /// Queues several results for the next execution, reached with `SQLMoreResults`.
    pub fn push_results(&self, sets: Vec<MockResultSet>) {
        self.state.borrow_mut().executions.push_back(sets);
    }

    /// Makes every execution with parameters return them as a result set: one column per
    /// parameter, typed as bound, and one row per parameter set.
    pub fn echo_parameters(&self) {
        self.state.borrow_mut().echo = true;
    }

    /// Reports `SQL_NO_TOTAL` instead of the remaining length for partial `SQLGetData`
    /// reads.
    pub fn report_no_total(&self, enabled: bool) {
        self.state.borrow_mut().no_total_chunks = enabled;
    }

    /// Adds a diagnostic record to the statement. Cleared by the next call other than
    /// `SQLGetDiagRecW`.
    pub fn push_diagnostic(&self, state: &str, native_error: Integer, message: &str) {
        self.state
            .borrow_mut()
            .diagnostics
            .push((state.to_owned(), native_error, message.to_owned()));
    }

    /// Makes the next call of `function` fail with `SQL_ERROR` and one diagnostic.
    pub fn fail_next(&self, function: &str, state: &str, message: &str) {
        self.script(function, SqlReturn::ERROR, state, message);
    }

    /// Makes the next successful call of `function` return `SQL_SUCCESS_WITH_INFO` with one
    /// diagnostic.
    pub fn warn_next(&self, function: &str, state: &str, message: &str) {
        self.script(function, SqlReturn::SUCCESS_WITH_INFO, state, message);
    }

    fn script(&self, function: &str, ret: SqlReturn, state: &str, message: &str) {
        self.state.borrow_mut().scripted.insert(
            function.to_owned(),
            Scripted {
                ret,
                state: state.to_owned(),
                message: message.to_owned(),
            },
        );
    }

    /// Queues data-at-execution tokens to hand out from `SQLParamData`.
    pub fn request_data(&self, tokens: &[Pointer]) {
        self.state.borrow_mut().dae_queue.extend(tokens.iter().copied());
    }

    /// Every `SQLBindParameter` call so far, in order.
    pub fn bound_parameters(&self) -> Vec<BoundParameter> {
        self.state.borrow().parameter_log.clone()
    }

    /// Every `SQLSetDescFieldW` call so far, in order.
    pub fn descriptor_fields(&self) -> Vec<DescriptorField> {
        self.state.borrow().descriptor_fields.clone()
    }

    /// Length argument of every `SQLPutData` call so far.
    pub fn put_data_lengths(&self) -> Vec<Len> {
        self.state.borrow().put_lengths.clone()
    }

    /// Names of the ODBC functions called so far, diagnostics excluded.
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    /// Number of calls of `function` so far.
    pub fn call_count(&self, function: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|call| *call == function)
            .count()
    }

    /// Statement text of every `SQLExecDirectW` and `SQLPrepareW` call.
    pub fn executed_sql(&self) -> Vec<String> {
        self.state.borrow().sql.clone()
    }

    /// Current value of a statement attribute, if it was ever set.
    pub fn stmt_attr(&self, attribute: Integer) -> Option<usize> {
        self.state.borrow().attr(attribute)
    }

    /// Parameter values the last execution received, one row per parameter set.
    pub fn executed_parameters(&self) -> Vec<Vec<MockCell>> {
        self.state
            .borrow()
            .executed
            .last()
            .cloned()
            .unwrap_or_default()
    }

    /// Number of parameters currently bound.
    pub fn bound_parameter_count(&self) -> usize {
        self.state.borrow().parameters.len()
    }

    /// Number of columns currently bound.
    pub fn bound_column_count(&self) -> usize {
        self.state.borrow().columns.len()
    }

    fn call<F>(&self, function: &'static str, body: F) -> SqlReturn
    where
        F: FnOnce(&mut State) -> SqlReturn,
    {
        let mut state = self.state.borrow_mut();
        state.calls.push(function.to_owned());
        state.diagnostics.clear();

        let scripted = state.scripted.remove(function);
        if let Some(Scripted {
            ret: SqlReturn::ERROR,
            state: sqlstate,
            message,
        }) = &scripted
        {
            state.diag(sqlstate, message.clone());
            return SqlReturn::ERROR;
        }

        let ret = body(&mut *state);
        match scripted {
            Some(warning) if ret == SqlReturn::SUCCESS => {
                state.diag(&warning.state, warning.message);
                warning.ret
            }
            _ => ret,
        }
    }
}

unsafe fn put<T>(target: *mut T, value: T) {
    if !target.is_null() {
        // SAFETY: non-null targets point to caller-owned storage for a `T`.
        unsafe { target.write_unaligned(value) }
    }
}

unsafe fn read_indicator(indicator: *mut Len, row: usize) -> Option<Len> {
    if indicator.is_null() {
        return None;
    }
    // SAFETY: the indicator array has at least `row + 1` elements.
    Some(unsafe { indicator.add(row).read_unaligned() })
}

unsafe fn read_text(text: *const WChar, len: Integer) -> String {
    if text.is_null() {
        return String::new();
    }
    let len = if len as Len == sys::NTS {
        // SAFETY: NTS text is NUL terminated.
        (0..).take_while(|&i| unsafe { *text.add(i) } != 0).count()
    } else {
        usize::try_from(len).unwrap_or(0)
    };
    // SAFETY: the caller passes `len` valid units.
    wide::decode_lossy(unsafe { slice::from_raw_parts(text, len) })
}

fn struct_bytes<T: Copy>(value: T) -> Vec<u8> {
    // SAFETY: `T` is a plain `#[repr(C)]` value or primitive; any bit pattern is readable.
    unsafe { slice::from_raw_parts(&value as *const T as *const u8, size_of::<T>()) }.to_vec()
}

fn wide_bytes(text: &str) -> Vec<u8> {
    wide::encode(text)
        .into_iter()
        .flat_map(u16::to_ne_bytes)
        .collect()
}

fn cell_text(cell: &MockCell) -> Option<String> {
    Some(match cell {
        MockCell::Null | MockCell::NoTotal => return None,
        MockCell::Int(i) => i.to_string(),
        MockCell::Double(f) => f.to_string(),
        MockCell::Text(s) => s.clone(),
        // drivers render binary as hex digits when asked for characters
        MockCell::Bytes(b) => hex::encode_upper(b),
        MockCell::Date(d) => d.format("%Y-%m-%d").to_string(),
        MockCell::Time(t) => t.format("%H:%M:%S").to_string(),
        MockCell::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        MockCell::Guid(g) => g.hyphenated().to_string(),
    })
}

fn int_bytes<T>(cell: &MockCell) -> Option<Vec<u8>>
where
    T: TryFrom<i64> + Copy,
{
    match cell {
        MockCell::Int(i) => T::try_from(*i).ok().map(struct_bytes),
        _ => None,
    }
}

/// The bytes a driver writes for `cell` converted to `c_type`, or `None` if it cannot
/// convert.
fn cell_bytes(cell: &MockCell, c_type: CType) -> Option<Vec<u8>> {
    match c_type {
        CType::Char => cell_text(cell).map(String::into_bytes),
        CType::WChar => cell_text(cell).map(|text| wide_bytes(&text)),
        CType::Binary => match cell {
            MockCell::Bytes(b) => Some(b.clone()),
            MockCell::Text(s) => Some(s.as_bytes().to_vec()),
            _ => None,
        },
        CType::Bit | CType::UTinyInt => int_bytes::<u8>(cell),
        CType::STinyInt => int_bytes::<i8>(cell),
        CType::SShort => int_bytes::<i16>(cell),
        CType::UShort => int_bytes::<u16>(cell),
        CType::SLong => int_bytes::<i32>(cell),
        CType::ULong => int_bytes::<u32>(cell),
        CType::SBigInt => int_bytes::<i64>(cell),
        CType::UBigInt => int_bytes::<u64>(cell),
        CType::Float => match cell {
            MockCell::Double(f) => Some(struct_bytes(*f as f32)),
            MockCell::Int(i) => Some(struct_bytes(*i as f32)),
            _ => None,
        },
        CType::Double => match cell {
            MockCell::Double(f) => Some(struct_bytes(*f)),
            MockCell::Int(i) => Some(struct_bytes(*i as f64)),
            _ => None,
        },
        CType::Numeric => {
            let text = cell_text(cell)?;
            let value = FixedPointValue::parse(&text, None, None).ok()?;
            Some(struct_bytes(value.to_sql_numeric()))
        }
        CType::Date => {
            let date = match cell {
                MockCell::Date(d) => *d,
                MockCell::Timestamp(ts) => ts.date(),
                _ => return None,
            };
            Some(struct_bytes(SqlDate {
                year: date.year() as i16,
                month: date.month() as u16,
                day: date.day() as u16,
            }))
        }
        CType::Time => {
            let time = match cell {
                MockCell::Time(t) => *t,
                MockCell::Timestamp(ts) => ts.time(),
                _ => return None,
            };
            Some(struct_bytes(SqlTime {
                hour: time.hour() as u16,
                minute: time.minute() as u16,
                second: time.second() as u16,
            }))
        }
        CType::Timestamp => {
            let ts = match cell {
                MockCell::Timestamp(ts) => *ts,
                MockCell::Date(d) => d.and_time(NaiveTime::MIN),
                _ => return None,
            };
            Some(struct_bytes(SqlTimestamp {
                year: ts.year() as i16,
                month: ts.month() as u16,
                day: ts.day() as u16,
                hour: ts.hour() as u16,
                minute: ts.minute() as u16,
                second: ts.second() as u16,
                fraction: ts.nanosecond(),
            }))
        }
        CType::Guid => match cell {
            MockCell::Guid(g) => {
                let (d1, d2, d3, d4) = g.as_fields();
                Some(struct_bytes(SqlGuid {
                    d1,
                    d2,
                    d3,
                    d4: *d4,
                }))
            }
            _ => None,
        },
    }
}

fn cell_from_bytes(c_type: CType, bytes: &[u8]) -> MockCell {
    match c_type {
        CType::WChar => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
                .collect();
            MockCell::Text(wide::decode_lossy(&units))
        }
        CType::Binary => MockCell::Bytes(bytes.to_vec()),
        _ => MockCell::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Reads row `row` of a bound parameter the way a driver would at execution.
unsafe fn read_parameter(
    parameter: &BoundParameter,
    row: usize,
    dae_data: &HashMap<usize, Vec<u8>>,
) -> MockCell {
    // SAFETY: forwarded from the caller.
    let indicator = unsafe { read_indicator(parameter.indicator_ptr, row) };
    if indicator == Some(sys::NULL_DATA) {
        return MockCell::Null;
    }
    let c_type = match CType::from_raw(parameter.c_type) {
        Ok(c_type) => c_type,
        Err(_) => return MockCell::Null,
    };

    if indicator.map_or(false, sys::is_data_at_exec) {
        let data = dae_data
            .get(&(parameter.value_ptr as usize))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        return cell_from_bytes(c_type, data);
    }

    if c_type.is_variable() {
        let stride = usize::try_from(parameter.buffer_length).unwrap_or(0);
        let len = match indicator {
            Some(len) if len >= 0 => len as usize,
            _ => stride,
        };
        // SAFETY: row `row` of a column-wise array starts `row * stride` bytes in.
        let bytes = unsafe {
            slice::from_raw_parts((parameter.value_ptr as *const u8).add(row * stride), len)
        };
        return cell_from_bytes(c_type, bytes);
    }

    let size = c_type.fixed_size().unwrap_or(0);
    // SAFETY: fixed-size arrays are packed `size` bytes apart.
    let src = unsafe { (parameter.value_ptr as *const u8).add(row * size) };
    // SAFETY: `src` points to a value of the C type the parameter was bound with.
    unsafe {
        match c_type {
            CType::Bit | CType::UTinyInt => MockCell::Int(i64::from(src.read())),
            CType::STinyInt => MockCell::Int(i64::from((src as *const i8).read())),
            CType::SShort => MockCell::Int(i64::from((src as *const i16).read_unaligned())),
            CType::UShort => MockCell::Int(i64::from((src as *const u16).read_unaligned())),
            CType::SLong => MockCell::Int(i64::from((src as *const i32).read_unaligned())),
            CType::ULong => MockCell::Int(i64::from((src as *const u32).read_unaligned())),
            CType::SBigInt => MockCell::Int((src as *const i64).read_unaligned()),
            CType::UBigInt => MockCell::Int((src as *const u64).read_unaligned() as i64),
            CType::Float => MockCell::Double(f64::from((src as *const f32).read_unaligned())),
            CType::Double => MockCell::Double((src as *const f64).read_unaligned()),
            CType::Numeric => {
                let numeric = (src as *const SqlNumeric).read_unaligned();
                MockCell::Text(FixedPointValue::from_sql_numeric(&numeric).to_string_with('.'))
            }
            CType::Date => {
                let d = (src as *const SqlDate).read_unaligned();
                NaiveDate::from_ymd_opt(i32::from(d.year), u32::from(d.month), u32::from(d.day))
                    .map_or(MockCell::Null, MockCell::Date)
            }
            CType::Time => {
                let t = (src as *const SqlTime).read_unaligned();
                NaiveTime::from_hms_opt(u32::from(t.hour), u32::from(t.minute), u32::from(t.second))
                    .map_or(MockCell::Null, MockCell::Time)
            }
            CType::Timestamp => {
                let ts = (src as *const SqlTimestamp).read_unaligned();
                NaiveDate::from_ymd_opt(i32::from(ts.year), u32::from(ts.month), u32::from(ts.day))
                    .and_then(|d| {
                        d.and_hms_nano_opt(
                            u32::from(ts.hour),
                            u32::from(ts.minute),
                            u32::from(ts.second),
                            ts.fraction,
                        )
                    })
                    .map_or(MockCell::Null, MockCell::Timestamp)
            }
            CType::Guid => {
                let g = (src as *const SqlGuid).read_unaligned();
                MockCell::Guid(Uuid::from_fields(g.d1, g.d2, g.d3, &g.d4))
            }
            CType::Char | CType::WChar | CType::Binary => MockCell::Null,
        }
    }
}

/// Writes `bytes` into a character or binary buffer of `buffer_length` bytes, truncating
/// and terminating like a driver. Returns the number of data bytes written.
unsafe fn write_variable(
    c_type: CType,
    target: Pointer,
    buffer_length: usize,
    bytes: &[u8],
) -> usize {
    let terminator = c_type.terminator_size();
    let capacity = buffer_length.saturating_sub(terminator);
    let unit = c_type.unit_size();
    let n = bytes.len().min(capacity) / unit * unit;
    if target.is_null() {
        return n;
    }
    let target = target as *mut u8;
    // SAFETY: `target` has room for `buffer_length` bytes and `n + terminator` fits.
    unsafe {
        ptr::copy_nonoverlapping(bytes.as_ptr(), target, n);
        if n + terminator <= buffer_length {
            ptr::write_bytes(target.add(n), 0, terminator);
        }
    }
    n
}

impl OdbcApi for MockDriver {
    unsafe fn exec_direct(&self, _stmt: HStmt, text: *const WChar, text_len: Integer) -> SqlReturn {
        // SAFETY: forwarded from the caller.
        let sql = unsafe { read_text(text, text_len) };
        self.call("SQLExecDirectW", |state| {
            state.sql.push(sql);
            state.start_execution()
        })
    }

    unsafe fn prepare(&self, _stmt: HStmt, text: *const WChar, text_len: Integer) -> SqlReturn {
        // SAFETY: forwarded from the caller.
        let sql = unsafe { read_text(text, text_len) };
        self.call("SQLPrepareW", |state| {
            state.sql.push(sql);
            SqlReturn::SUCCESS
        })
    }

    unsafe fn execute(&self, _stmt: HStmt) -> SqlReturn {
        self.call("SQLExecute", State::start_execution)
    }

    unsafe fn bind_parameter(
        &self,
        _stmt: HStmt,
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
        // SAFETY: forwarded from the caller.
        let indicator = unsafe { read_indicator(str_len_or_ind, 0) }.unwrap_or(buffer_length);
        self.call("SQLBindParameter", |state| {
            if parameter_number == 0 {
                state.diag("07009", "Invalid descriptor index");
                return SqlReturn::ERROR;
            }
            let parameter = BoundParameter {
                number: parameter_number,
                direction: input_output_type,
                c_type: value_type,
                sql_type: parameter_type,
                column_size,
                decimal_digits,
                value_ptr: parameter_value,
                buffer_length,
                indicator,
                indicator_ptr: str_len_or_ind,
            };
            state.parameters.insert(parameter_number, parameter);
            state.parameter_log.push(parameter);
            SqlReturn::SUCCESS
        })
    }

    unsafe fn param_data(&self, _stmt: HStmt, value: *mut Pointer) -> SqlReturn {
        self.call("SQLParamData", |state| match state.dae_queue.pop_front() {
            Some(token) => {
                state.dae_current = Some(token);
                // SAFETY: `value` points to caller-owned storage for a pointer.
                unsafe { put(value, token) };
                SqlReturn::NEED_DATA
            }
            None => {
                state.dae_current = None;
                state.complete_execution()
            }
        })
    }

    unsafe fn put_data(&self, _stmt: HStmt, data: Pointer, str_len_or_ind: Len) -> SqlReturn {
        self.call("SQLPutData", |state| {
            let token = match state.dae_current {
                Some(token) => token,
                None => {
                    state.diag("HY010", "Function sequence error");
                    return SqlReturn::ERROR;
                }
            };
            state.put_lengths.push(str_len_or_ind);
            if str_len_or_ind > 0 && !data.is_null() {
                // SAFETY: `data` holds `str_len_or_ind` bytes.
                let bytes =
                    unsafe { slice::from_raw_parts(data as *const u8, str_len_or_ind as usize) };
                state
                    .dae_data
                    .entry(token as usize)
                    .or_default()
                    .extend_from_slice(bytes);
            }
            SqlReturn::SUCCESS
        })
    }

    unsafe fn num_result_cols(&self, _stmt: HStmt, column_count: *mut SmallInt) -> SqlReturn {
        self.call("SQLNumResultCols", |state| {
            let count = state.cursor.as_ref().map_or(0, |c| c.set.columns.len());
            // SAFETY: `column_count` points to caller-owned storage.
            unsafe { put(column_count, count as SmallInt) };
            SqlReturn::SUCCESS
        })
    }

    unsafe fn describe_col(
        &self,
        _stmt: HStmt,
        column_number: USmallInt,
        column_name: *mut WChar,
        buffer_length: SmallInt,
        name_length: *mut SmallInt,
        data_type: *mut SmallInt,
        column_size: *mut ULen,
        decimal_digits: *mut SmallInt,
        nullable: *mut SmallInt,
    ) -> SqlReturn {
        self.call("SQLDescribeColW", |state| {
            let column = match state.cursor.as_ref().and_then(|c| {
                c.set.columns.get(usize::from(column_number).wrapping_sub(1))
            }) {
                Some(column) => column.clone(),
                None => {
                    state.diag("07009", "Invalid descriptor index");
                    return SqlReturn::ERROR;
                }
            };

            let name = wide::encode(&column.name);
            let capacity = usize::try_from(buffer_length).unwrap_or(0);
            let truncated = name.len() >= capacity;
            // SAFETY: every out pointer refers to caller-owned storage; `column_name` has
            // room for `buffer_length` units.
            unsafe {
                if !column_name.is_null() && capacity > 0 {
                    let n = name.len().min(capacity - 1);
                    ptr::copy_nonoverlapping(name.as_ptr(), column_name, n);
                    *column_name.add(n) = 0;
                }
                put(name_length, name.len().min(SmallInt::MAX as usize) as SmallInt);
                put(data_type, column.data_type.raw());
                put(column_size, column.size);
                put(decimal_digits, column.digits);
                put(
                    nullable,
                    if column.nullable {
                        sys::NULLABLE
                    } else {
                        sys::NO_NULLS
                    },
                );
            }

            if truncated {
                state.diag("01004", "String data, right truncation");
                return SqlReturn::SUCCESS_WITH_INFO;
            }
            SqlReturn::SUCCESS
        })
    }

    unsafe fn bind_col(
        &self,
        _stmt: HStmt,
        column_number: USmallInt,
        target_type: SmallInt,
        target_value: Pointer,
        buffer_length: Len,
        str_len_or_ind: *mut Len,
    ) -> SqlReturn {
        self.call("SQLBindCol", |state| {
            if CType::from_raw(target_type).is_err() {
                state.diag("HY003", "Invalid application buffer type");
                return SqlReturn::ERROR;
            }
            if target_value.is_null() {
                state.columns.remove(&column_number);
            } else {
                state.columns.insert(
                    column_number,
                    BoundColumn {
                        c_type: target_type,
                        ptr: target_value,
                        buffer_length,
                        indicator: str_len_or_ind,
                    },
                );
            }
            SqlReturn::SUCCESS
        })
    }

    unsafe fn fetch(&self, _stmt: HStmt) -> SqlReturn {
        self.call("SQLFetch", fetch_next)
    }

    unsafe fn fetch_scroll(&self, _stmt: HStmt, orientation: SmallInt, _offset: Len) -> SqlReturn {
        self.call("SQLFetchScroll", |state| {
            if orientation != sys::FETCH_NEXT {
                state.diag("HY106", "Fetch type out of range");
                return SqlReturn::ERROR;
            }
            fetch_next(state)
        })
    }

    unsafe fn get_data(
        &self,
        _stmt: HStmt,
        column_number: USmallInt,
        target_type: SmallInt,
        target_value: Pointer,
        buffer_length: Len,
        str_len_or_ind: *mut Len,
    ) -> SqlReturn {
        self.call("SQLGetData", |state| {
            let no_total = state.no_total_chunks;
            let (cell, cursor) = match state.cursor.as_mut() {
                Some(cursor) => match cursor.current_row {
                    Some(row) => {
                        let cell = cursor.set.rows[row]
                            .get(usize::from(column_number).wrapping_sub(1))
                            .cloned();
                        (cell, cursor)
                    }
                    None => {
                        state.diag("24000", "Invalid cursor state");
                        return SqlReturn::ERROR;
                    }
                },
                None => {
                    state.diag("24000", "Invalid cursor state");
                    return SqlReturn::ERROR;
                }
            };
            let cell = match cell {
                Some(cell) => cell,
                None => {
                    state.diag("07009", "Invalid descriptor index");
                    return SqlReturn::ERROR;
                }
            };
            let c_type = match CType::from_raw(target_type) {
                Ok(c_type) => c_type,
                Err(_) => {
                    state.diag("HY003", "Invalid application buffer type");
                    return SqlReturn::ERROR;
                }
            };

            if matches!(cell, MockCell::Null | MockCell::NoTotal) {
                // SAFETY: `str_len_or_ind` points to caller-owned storage.
                unsafe { put(str_len_or_ind, sys::NULL_DATA) };
                return SqlReturn::SUCCESS;
            }
            let bytes = match cell_bytes(&cell, c_type) {
                Some(bytes) => bytes,
                None => {
                    state.diag("07006", "Restricted data type attribute violation");
                    return SqlReturn::ERROR;
                }
            };

            if !c_type.is_variable() {
                // SAFETY: `target_value` has room for one value of `c_type`.
                unsafe {
                    ptr::copy_nonoverlapping(bytes.as_ptr(), target_value as *mut u8, bytes.len());
                    put(str_len_or_ind, bytes.len() as Len);
                }
                return SqlReturn::SUCCESS;
            }

            if cursor.finished.contains(&column_number) {
                return SqlReturn::NO_DATA;
            }
            let offset = cursor.read_offsets.get(&column_number).copied().unwrap_or(0);
            let remaining = &bytes[offset.min(bytes.len())..];
            let buffer_length = usize::try_from(buffer_length).unwrap_or(0);
            // SAFETY: `target_value` has room for `buffer_length` bytes.
            let written = unsafe { write_variable(c_type, target_value, buffer_length, remaining) };
            let more = written < remaining.len();
            let indicator = if more && no_total {
                sys::NO_TOTAL
            } else {
                remaining.len() as Len
            };
            // SAFETY: `str_len_or_ind` points to caller-owned storage.
            unsafe { put(str_len_or_ind, indicator) };

            if more {
                cursor.read_offsets.insert(column_number, offset + written);
                state.diag("01004", "String data, right truncation");
                return SqlReturn::SUCCESS_WITH_INFO;
            }
            cursor.finished.insert(column_number);
            SqlReturn::SUCCESS
        })
    }

    unsafe fn more_results(&self, _stmt: HStmt) -> SqlReturn {
        self.call("SQLMoreResults", |state| {
            if state.advance_result() {
                SqlReturn::SUCCESS
            } else {
                SqlReturn::NO_DATA
            }
        })
    }

    unsafe fn row_count(&self, _stmt: HStmt, row_count: *mut Len) -> SqlReturn {
        self.call("SQLRowCount", |state| {
            // SAFETY: `row_count` points to caller-owned storage.
            unsafe { put(row_count, state.affected) };
            SqlReturn::SUCCESS
        })
    }

    unsafe fn free_stmt(&self, _stmt: HStmt, option: USmallInt) -> SqlReturn {
        self.call("SQLFreeStmt", |state| {
            match option {
                sys::CLOSE => {
                    state.cursor = None;
                    state.pending.clear();
                }
                sys::UNBIND => state.columns.clear(),
                sys::RESET_PARAMS => {
                    state.parameters.clear();
                    state.dae_queue.clear();
                    state.dae_current = None;
                }
                _ => {
                    state.diag("HY092", "Invalid attribute/option identifier");
                    return SqlReturn::ERROR;
                }
            }
            SqlReturn::SUCCESS
        })
    }

    unsafe fn set_stmt_attr(
        &self,
        _stmt: HStmt,
        attribute: Integer,
        value: Pointer,
        _string_length: Integer,
    ) -> SqlReturn {
        self.call("SQLSetStmtAttrW", |state| {
            state.attrs.insert(attribute, value as usize);
            SqlReturn::SUCCESS
        })
    }

    unsafe fn get_stmt_attr(
        &self,
        _stmt: HStmt,
        attribute: Integer,
        value: Pointer,
        _buffer_length: Integer,
        _string_length: *mut Integer,
    ) -> SqlReturn {
        self.call("SQLGetStmtAttrW", |state| {
            let current = if attribute == sys::ATTR_APP_PARAM_DESC {
                DESC_HANDLE
            } else {
                match state.attr(attribute) {
                    Some(current) => current,
                    None => {
                        state.diag("HY092", "Invalid attribute/option identifier");
                        return SqlReturn::ERROR;
                    }
                }
            };
            // SAFETY: `value` points to caller-owned storage for a pointer-sized value.
            unsafe { put(value as *mut usize, current) };
            SqlReturn::SUCCESS
        })
    }

    unsafe fn set_desc_field(
        &self,
        desc: HDesc,
        rec_number: SmallInt,
        field_identifier: SmallInt,
        value: Pointer,
        _buffer_length: Integer,
    ) -> SqlReturn {
        self.call("SQLSetDescFieldW", |state| {
            if desc.0 as usize != DESC_HANDLE {
                return SqlReturn::INVALID_HANDLE;
            }
            state.descriptor_fields.push(DescriptorField {
                record: rec_number,
                field: field_identifier,
                value: value as isize,
            });
            SqlReturn::SUCCESS
        })
    }

    unsafe fn get_diag_rec(
        &self,
        _handle_type: SmallInt,
        _handle: Pointer,
        rec_number: SmallInt,
        state: *mut WChar,
        native_error: *mut Integer,
        message_text: *mut WChar,
        buffer_length: SmallInt,
        text_length: *mut SmallInt,
    ) -> SqlReturn {
        let inner = self.state.borrow();
        let index = match usize::try_from(rec_number) {
            Ok(n) if n >= 1 => n - 1,
            _ => return SqlReturn::ERROR,
        };
        let (sqlstate, native, message) = match inner.diagnostics.get(index) {
            Some(record) => record,
            None => return SqlReturn::NO_DATA,
        };

        let sqlstate = wide::encode(sqlstate);
        let message = wide::encode(message);
        let capacity = usize::try_from(buffer_length).unwrap_or(0);
        // SAFETY: `state` has room for 6 units and `message_text` for `buffer_length`
        // units; the other out pointers refer to caller-owned storage.
        unsafe {
            if !state.is_null() {
                let n = sqlstate.len().min(5);
                ptr::copy_nonoverlapping(sqlstate.as_ptr(), state, n);
                *state.add(n) = 0;
            }
            put(native_error, *native);
            if !message_text.is_null() && capacity > 0 {
                let n = message.len().min(capacity - 1);
                ptr::copy_nonoverlapping(message.as_ptr(), message_text, n);
                *message_text.add(n) = 0;
            }
            put(text_length, message.len().min(SmallInt::MAX as usize) as SmallInt);
        }

        if message.len() >= capacity {
            SqlReturn::SUCCESS_WITH_INFO
        } else {
            SqlReturn::SUCCESS
        }
    }
}

/// `SQLFetch` / `SQLFetchScroll(SQL_FETCH_NEXT)`: fills every bound column for up to
/// `SQL_ATTR_ROW_ARRAY_SIZE` rows.
fn fetch_next(state: &mut State) -> SqlReturn {
    let array_size = state.attr(sys::ATTR_ROW_ARRAY_SIZE).unwrap_or(1).max(1);
    let rows_fetched = state.attr(sys::ATTR_ROWS_FETCHED_PTR).unwrap_or(0) as *mut ULen;

    let State {
        cursor,
        columns,
        diagnostics,
        ..
    } = state;
    let cursor = match cursor.as_mut() {
        Some(cursor) => cursor,
        None => {
            diagnostics.push(("24000".into(), 0, "Invalid cursor state".into()));
            return SqlReturn::ERROR;
        }
    };

    let remaining = cursor.set.rows.len().saturating_sub(cursor.next_row);
    cursor.read_offsets.clear();
    cursor.finished.clear();
    if remaining == 0 {
        cursor.current_row = None;
        // SAFETY: the rows-fetched pointer stays valid while it is set.
        unsafe { put(rows_fetched, 0) };
        return SqlReturn::NO_DATA;
    }

    let count = remaining.min(array_size);
    let mut truncated = false;
    for offset in 0..count {
        let row = &cursor.set.rows[cursor.next_row + offset];
        for (number, column) in columns.iter() {
            let cell = match row.get(usize::from(*number).wrapping_sub(1)) {
                Some(cell) => cell,
                None => {
                    diagnostics.push(("07009".into(), 0, "Invalid descriptor index".into()));
                    return SqlReturn::ERROR;
                }
            };
            // SAFETY: bound columns hold `array_size` rows until they are unbound.
            match unsafe { write_bound(column, offset, cell) } {
                Ok(cut) => truncated |= cut,
                Err(()) => {
                    diagnostics.push((
                        "07006".into(),
                        0,
                        "Restricted data type attribute violation".into(),
                    ));
                    return SqlReturn::ERROR;
                }
            }
        }
    }

    cursor.current_row = Some(cursor.next_row + count - 1);
    cursor.next_row += count;
    // SAFETY: the rows-fetched pointer stays valid while it is set.
    unsafe { put(rows_fetched, count) };

    if truncated {
        diagnostics.push(("01004".into(), 0, "String data, right truncation".into()));
        return SqlReturn::SUCCESS_WITH_INFO;
    }
    SqlReturn::SUCCESS
}

/// Writes `cell` into row `row` of a column-wise bound buffer. Returns whether the value
/// was truncated.
unsafe fn write_bound(column: &BoundColumn, row: usize, cell: &MockCell) -> Result<bool, ()> {
    // SAFETY: the indicator array has a slot for every row.
    let indicator = if column.indicator.is_null() {
        ptr::null_mut()
    } else {
        unsafe { column.indicator.add(row) }
    };
    match cell {
        MockCell::Null => {
            // SAFETY: see above.
            unsafe { put(indicator, sys::NULL_DATA) };
            return Ok(false);
        }
        MockCell::NoTotal => {
            // SAFETY: see above.
            unsafe { put(indicator, sys::NO_TOTAL) };
            return Ok(false);
        }
        _ => {}
    }

    let c_type = CType::from_raw(column.c_type).map_err(|_| ())?;
    let bytes = cell_bytes(cell, c_type).ok_or(())?;

    if c_type.is_variable() {
        let stride = usize::try_from(column.buffer_length).unwrap_or(0);
        // SAFETY: row `row` starts `row * stride` bytes into the bound array.
        let target = unsafe { (column.ptr as *mut u8).add(row * stride) };
        // SAFETY: the row has `stride` bytes.
        let written = unsafe { write_variable(c_type, target as Pointer, stride, &bytes) };
        // SAFETY: see above.
        unsafe { put(indicator, bytes.len() as Len) };
        return Ok(written < bytes.len());
    }

    let size = bytes.len();
    // SAFETY: fixed-size values are packed `size` bytes apart.
    unsafe {
        let target = (column.ptr as *mut u8).add(row * size);
        ptr::copy_nonoverlapping(bytes.as_ptr(), target, size);
        put(indicator, size as Len);
    }
    Ok(false)
}

/// A fresh driver for unit tests, with logging routed to the test harness.
#[cfg(test)]
pub(crate) fn test_driver() -> MockDriver {
    let _ = env_logger::builder().is_test(true).try_init();
    MockDriver::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_data_reads_in_chunks() {
        let driver = test_driver();
        driver.push_result_set(
            MockResultSet::new(vec![MockColumn::new("t", SqlDataType::VarChar)])
                .row(vec![MockCell::Text("abcdefgh".into())]),
        );
        let stmt = driver.statement_handle();
        unsafe {
            assert_eq!(driver.exec_direct(stmt, ptr::null(), 0), SqlReturn::SUCCESS);
            assert_eq!(driver.fetch(stmt), SqlReturn::SUCCESS);

            let mut buf = [0u8; 4];
            let mut ind: Len = 0;
            let target = buf.as_mut_ptr() as Pointer;
            let ret = driver.get_data(stmt, 1, sys::C_CHAR, target, 4, &mut ind);
            assert_eq!(ret, SqlReturn::SUCCESS_WITH_INFO);
            assert_eq!((&buf[..3], ind), (&b"abc"[..], 8));

            let ret = driver.get_data(stmt, 1, sys::C_CHAR, target, 4, &mut ind);
            assert_eq!(ret, SqlReturn::SUCCESS_WITH_INFO);
            assert_eq!((&buf[..3], ind), (&b"def"[..], 5));

            let ret = driver.get_data(stmt, 1, sys::C_CHAR, target, 4, &mut ind);
            assert_eq!(ret, SqlReturn::SUCCESS);
            assert_eq!((&buf[..2], ind), (&b"gh"[..], 2));

            let ret = driver.get_data(stmt, 1, sys::C_CHAR, target, 4, &mut ind);
            assert_eq!(ret, SqlReturn::NO_DATA);
        }
    }

    #[test]
    fn test_scripted_failure_sets_diagnostic() {
        let driver = MockDriver::new();
        driver.fail_next("SQLExecute", "40001", "deadlock");
        let stmt = driver.statement_handle();
        assert_eq!(unsafe { driver.execute(stmt) }, SqlReturn::ERROR);
        let record = crate::odbc::diagnostics::first_error(&driver, stmt);
        assert_eq!(record.map(|r| r.state), Some("40001".to_owned()));
        // only the next call fails
        assert_eq!(unsafe { driver.execute(stmt) }, SqlReturn::SUCCESS);
    }
}
