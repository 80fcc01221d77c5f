//! Owned native buffers whose addresses are handed to the driver.
//!
//! Everything here is allocated at its final size before its address is bound and is never
//! resized afterwards, so a bound pointer stays valid until the owner is dropped.

use std::ffi::c_void;
use std::mem::size_of;

use crate::error::Result;
use crate::odbc::sys::{Len, Pointer, SqlDate, SqlGuid, SqlNumeric, SqlTime, SqlTimestamp};
use crate::odbc::{CType, CValue};

/// A table of `rows` rows of `stride` elements each, stored contiguously.
#[derive(Debug, Clone)]
pub struct ColumnTable<T> {
    data: Vec<T>,
    stride: usize,
}

impl<T: Copy + Default> ColumnTable<T> {
    pub fn new(rows: usize, stride: usize) -> Self {
        let stride = stride.max(1);
        Self {
            data: vec![T::default(); rows * stride],
            stride,
        }
    }

    pub fn rows(&self) -> usize {
        self.data.len() / self.stride
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Distance between two rows in bytes.
    pub fn stride_bytes(&self) -> usize {
        self.stride * size_of::<T>()
    }

    pub fn row(&self, row: usize) -> &[T] {
        &self.data[row * self.stride..(row + 1) * self.stride]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [T] {
        &mut self.data[row * self.stride..(row + 1) * self.stride]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_ptr(&mut self) -> Pointer {
        self.data.as_mut_ptr() as *mut c_void
    }
}

macro_rules! column_buffer {
    (
        variable: $($var:ident($vt:ty)),*;
        fixed: $($fix:ident($ft:ty)),* $(,)?
    ) => {
        /// One typed array per column, `rows × width` elements.
        #[derive(Debug, Clone)]
        pub enum ColumnBuffer {
            $($var(ColumnTable<$vt>),)*
            $($fix(ColumnTable<$ft>),)*
        }

        impl ColumnBuffer {
            /// Allocates a buffer for `rows` values of `c_type`. `units` is the element count
            /// per row for character and binary types, including room for a terminator, and
            /// is ignored for fixed-size types.
            pub fn new(c_type: CType, rows: usize, units: usize) -> Self {
                match c_type {
                    $(CType::$var => ColumnBuffer::$var(ColumnTable::new(rows, units)),)*
                    $(CType::$fix => ColumnBuffer::$fix(ColumnTable::new(rows, 1)),)*
                }
            }

            pub fn c_type(&self) -> CType {
                match self {
                    $(ColumnBuffer::$var(_) => CType::$var,)*
                    $(ColumnBuffer::$fix(_) => CType::$fix,)*
                }
            }

            pub fn rows(&self) -> usize {
                match self {
                    $(ColumnBuffer::$var(t) => t.rows(),)*
                    $(ColumnBuffer::$fix(t) => t.rows(),)*
                }
            }

            /// Bytes per row, the `BufferLength` passed when binding.
            pub fn stride_bytes(&self) -> usize {
                match self {
                    $(ColumnBuffer::$var(t) => t.stride_bytes(),)*
                    $(ColumnBuffer::$fix(t) => t.stride_bytes(),)*
                }
            }

            pub fn as_mut_ptr(&mut self) -> Pointer {
                match self {
                    $(ColumnBuffer::$var(t) => t.as_mut_ptr(),)*
                    $(ColumnBuffer::$fix(t) => t.as_mut_ptr(),)*
                }
            }

            /// Reads the value of `row` whose length the driver reported as `len` bytes.
            /// `len` is clamped to the row width and ignored for fixed-size types.
            pub fn read(&self, row: usize, len: usize) -> CValue {
                match self {
                    $(ColumnBuffer::$var(t) => {
                        let units = (len / size_of::<$vt>()).min(t.stride());
                        CValue::$var(t.row(row)[..units].to_vec())
                    })*
                    $(ColumnBuffer::$fix(t) => CValue::$fix(t.row(row)[0]),)*
                }
            }

            /// Stores `value` in `row`.
            pub fn write(&mut self, row: usize, value: &CValue) -> Result<()> {
                match (self, value) {
                    $((ColumnBuffer::$var(t), CValue::$var(data)) => {
                        let dst = t.row_mut(row);
                        if data.len() > dst.len() {
                            return Err(err_protocol!(
                                "{} units do not fit a row of {}",
                                data.len(),
                                dst.len()
                            ));
                        }
                        dst[..data.len()].copy_from_slice(data);
                    })*
                    $((ColumnBuffer::$fix(t), CValue::$fix(v)) => t.row_mut(row)[0] = *v,)*
                    (buffer, value) => {
                        return Err(err_protocol!(
                            "cannot store a {:?} value in a {:?} column buffer",
                            value.c_type(),
                            buffer.c_type()
                        ))
                    }
                }
                Ok(())
            }
        }
    };
}

column_buffer! {
    variable: Char(u8), WChar(u16), Binary(u8);
    fixed:
        Bit(u8),
        STinyInt(i8),
        UTinyInt(u8),
        SShort(i16),
        UShort(u16),
        SLong(i32),
        ULong(u32),
        SBigInt(i64),
        UBigInt(u64),
        Float(f32),
        Double(f64),
        Numeric(SqlNumeric),
        Date(SqlDate),
        Time(SqlTime),
        Timestamp(SqlTimestamp),
        Guid(SqlGuid),
}

impl ColumnBuffer {
    /// Bytes of data one row can hold, excluding the terminator the driver appends.
    pub fn capacity_bytes(&self) -> usize {
        self.stride_bytes()
            .saturating_sub(self.c_type().terminator_size())
    }
}

/// A bound scalar parameter.
#[derive(Debug)]
pub struct ParamSlot {
    /// Parameter position, starting at 0.
    pub index: usize,
    pub value: CValue,
    pub indicator: Len,
    /// Set for values sent with `SQLPutData` after execution starts.
    pub data_at_exec: bool,
}

impl ParamSlot {
    /// Identity of this slot, used as the data-at-execution token.
    pub fn token(&self) -> Pointer {
        self as *const ParamSlot as *mut c_void
    }
}

/// A bound parameter array for set-based execution.
#[derive(Debug)]
pub struct ParamArray {
    pub index: usize,
    pub values: ColumnBuffer,
    pub indicators: ColumnTable<Len>,
}

/// Owns every buffer bound for one execution until the parameters are reset.
#[derive(Debug, Default)]
pub struct ParamArena {
    // boxed so a slot address survives the vector growing
    slots: Vec<Box<ParamSlot>>,
    arrays: Vec<ParamArray>,
}

impl ParamArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `slot` and returns it at its final address.
    pub fn push_slot(&mut self, slot: ParamSlot) -> &mut ParamSlot {
        self.slots.push(Box::new(slot));
        let last = self.slots.len() - 1;
        &mut self.slots[last]
    }

    pub fn push_array(&mut self, array: ParamArray) -> &mut ParamArray {
        self.arrays.push(array);
        let last = self.arrays.len() - 1;
        &mut self.arrays[last]
    }

    pub fn slots(&self) -> impl Iterator<Item = &ParamSlot> {
        self.slots.iter().map(|slot| &**slot)
    }

    pub fn arrays(&self) -> &[ParamArray] {
        &self.arrays
    }

    /// The deferred slot whose identity is `token`.
    pub fn find_data_at_exec(&self, token: Pointer) -> Option<&ParamSlot> {
        self.slots()
            .find(|slot| slot.data_at_exec && slot.token() == token)
    }

    pub fn has_data_at_exec(&self) -> bool {
        self.slots.iter().any(|slot| slot.data_at_exec)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty() && self.arrays.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.arrays.clear();
    }
}
