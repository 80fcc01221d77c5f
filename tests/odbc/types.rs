use ddbc::odbc::{sys, CType};
use ddbc::{
    Error, FixedPointValue, HostValue, OdbcStatement, ParameterDescriptor, SqlDataType,
};
use ddbc_core::mock::MockCell;

mod common;
use common::setup;

#[test]
fn it_executes_parameter_arrays() -> anyhow::Result<()> {
    let driver = setup();
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    let rows = vec![
        vec![HostValue::from(1), HostValue::from("a")],
        vec![HostValue::from(2), HostValue::from("bb")],
        vec![HostValue::from(3), HostValue::Null],
    ];

    let done = stmt.execute_many("INSERT INTO t (id, name) VALUES (?, ?)", &rows, None)?;

    assert_eq!(done.rows_affected(), 3);
    assert_eq!(driver.call_count("SQLExecute"), 1);
    assert_eq!(driver.call_count("SQLBindParameter"), 2);
    assert_eq!(
        driver.executed_parameters(),
        vec![
            vec![MockCell::Int(1), MockCell::Text("a".into())],
            vec![MockCell::Int(2), MockCell::Text("bb".into())],
            vec![MockCell::Int(3), MockCell::Null],
        ]
    );
    // back to one parameter set for the next execution
    assert_eq!(driver.stmt_attr(sys::ATTR_PARAMSET_SIZE), Some(1));
    assert_eq!(driver.bound_parameter_count(), 0);
    Ok(())
}

#[test]
fn it_widens_inferred_array_types_to_every_row() -> anyhow::Result<()> {
    let driver = setup();
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    let rows = vec![
        vec![HostValue::from(1), HostValue::from(1.5)],
        vec![HostValue::from(100_000), HostValue::Null],
        vec![HostValue::Null, HostValue::from(-2.25)],
    ];

    stmt.execute_many("INSERT INTO t (n, x) VALUES (?, ?)", &rows, None)?;

    let bound = driver.bound_parameters();
    assert_eq!(bound[0].c_type, sys::C_SLONG);
    assert_eq!(bound[1].c_type, sys::C_DOUBLE);
    assert_eq!(
        driver.executed_parameters(),
        vec![
            vec![MockCell::Int(1), MockCell::Double(1.5)],
            vec![MockCell::Int(100_000), MockCell::Null],
            vec![MockCell::Null, MockCell::Double(-2.25)],
        ]
    );
    Ok(())
}

#[test]
fn it_rejects_array_values_wider_than_declared() -> anyhow::Result<()> {
    let driver = setup();
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    let descriptors = [ParameterDescriptor::new(CType::Char, SqlDataType::VarChar, 3)];
    let rows = vec![vec![HostValue::from("abc")], vec![HostValue::from("abcd")]];

    let err = stmt
        .execute_many("INSERT INTO t (code) VALUES (?)", &rows, Some(&descriptors))
        .unwrap_err();

    assert!(matches!(
        err,
        Error::ParameterTooLong { parameter: 0, row: 1, len: 4, size: 3 }
    ));
    assert_eq!(driver.call_count("SQLExecute"), 0);
    assert_eq!(driver.stmt_attr(sys::ATTR_PARAMSET_SIZE), Some(1));
    Ok(())
}

#[test]
fn it_rejects_ragged_parameter_rows() -> anyhow::Result<()> {
    let driver = setup();
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    let rows = vec![
        vec![HostValue::from(1), HostValue::from(2)],
        vec![HostValue::from(3)],
    ];

    let err = stmt
        .execute_many("INSERT INTO t (a, b) VALUES (?, ?)", &rows, None)
        .unwrap_err();

    assert!(matches!(err, Error::ArgumentCount { expected: 2, actual: 1 }));
    assert!(stmt.execute_many("SELECT 1", &[], None)?.rows_affected() == 0);
    assert_eq!(driver.call_count("SQLExecute"), 0);
    Ok(())
}

#[test]
fn it_checks_integer_ranges() -> anyhow::Result<()> {
    let driver = setup();
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    let descriptors = [ParameterDescriptor::new(CType::SShort, SqlDataType::SmallInt, 5)];

    stmt.execute_with("SELECT ?", &[HostValue::from(-32_768)], &descriptors)?;
    let err = stmt
        .execute_with("SELECT ?", &[HostValue::from(40_000)], &descriptors)
        .unwrap_err();

    assert!(matches!(err, Error::Range { .. }), "{:?}", err);
    assert_eq!(driver.call_count("SQLExecute"), 1);
    Ok(())
}

#[test]
fn it_names_the_parameter_of_a_type_mismatch() -> anyhow::Result<()> {
    let driver = setup();
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    let descriptors = [
        ParameterDescriptor::new(CType::SLong, SqlDataType::Integer, 10),
        ParameterDescriptor::new(CType::SLong, SqlDataType::Integer, 10),
    ];

    let err = stmt
        .execute_with(
            "SELECT ?, ?",
            &[HostValue::from(1), HostValue::from("two")],
            &descriptors,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        Error::TypeMismatch { index: 1, expected: CType::SLong, found: "text" }
    ));
    Ok(())
}

#[test]
fn it_rescales_decimals_to_their_descriptor() -> anyhow::Result<()> {
    let driver = setup();
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    let descriptors = [ParameterDescriptor::new(CType::Numeric, SqlDataType::Decimal, 12)
        .with_decimal_digits(4)];
    let value = FixedPointValue::parse("-42.5", None, None)?;

    stmt.execute_with(
        "INSERT INTO prices (p) VALUES (?)",
        &[HostValue::Decimal(value)],
        &descriptors,
    )?;

    assert_eq!(
        driver.executed_parameters(),
        vec![vec![MockCell::Text("-42.5000".into())]]
    );
    let fields: Vec<_> = driver
        .descriptor_fields()
        .into_iter()
        .map(|field| (field.record, field.field, field.value))
        .collect();
    assert!(fields.contains(&(1, sys::DESC_TYPE, sys::C_NUMERIC as isize)));
    assert!(fields.contains(&(1, sys::DESC_PRECISION, 12)));
    assert!(fields.contains(&(1, sys::DESC_SCALE, 4)));
    Ok(())
}

#[test]
fn it_binds_text_with_non_ascii_characters_as_wide() -> anyhow::Result<()> {
    let driver = setup();
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    let text = "Grüße aus 東京 🍣";

    stmt.execute("INSERT INTO t (s) VALUES (?)", &[HostValue::from(text)])?;

    let bound = driver.bound_parameters();
    assert_eq!(bound[0].c_type, sys::C_WCHAR);
    assert_eq!(bound[0].sql_type, sys::SQL_WVARCHAR);
    assert_eq!(bound[0].column_size, text.encode_utf16().count());
    assert_eq!(
        driver.executed_parameters(),
        vec![vec![MockCell::Text(text.to_owned())]]
    );
    Ok(())
}
