//! Core of ddbc, the ODBC marshalling layer.
//! Not intended to be used directly.
#![warn(future_incompatible, rust_2018_idioms)]
#![allow(
    clippy::needless_doctest_main,
    clippy::type_complexity,
    clippy::too_many_arguments,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::module_inception,
    clippy::len_without_is_empty,
    clippy::result_large_err
)]
// Allows an API be documented as only available in some specific platforms.
// <https://doc.rust-lang.org/unstable-book/language-features/doc-cfg.html>
#![cfg_attr(docsrs, feature(doc_cfg))]
//
// Talking to the ODBC C API requires unsafe code. Every unsafe block is a call
// through `OdbcApi` or a read of a buffer owned by `odbc::arena`.
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(feature = "bigdecimal")]
extern crate bigdecimal_ as bigdecimal;

#[macro_use]
pub mod error;

pub mod odbc;

#[cfg(any(test, feature = "mock"))]
#[cfg_attr(docsrs, doc(cfg(feature = "mock")))]
pub mod mock;
