use chrono::{NaiveDate, Timelike};
use ddbc::odbc::sys;
use ddbc::{Error, HostValue, OdbcStatement, SqlDataType, SqlReturn, StatementState};
use ddbc_core::mock::{MockCell, MockColumn, MockResultSet};
use uuid::Uuid;

mod common;
use common::setup;

fn users() -> MockResultSet {
    MockResultSet::new(vec![
        MockColumn::new("id", SqlDataType::Integer).not_null(),
        MockColumn::new("name", SqlDataType::VarChar).size(20),
    ])
    .row(vec![MockCell::Int(1), MockCell::Text("Ada".into())])
    .row(vec![MockCell::Int(2), MockCell::Text("Grace".into())])
    .row(vec![MockCell::Int(3), MockCell::Null])
}

#[test]
fn it_executes_directly_without_parameters() -> anyhow::Result<()> {
    let driver = setup();
    driver.push_result_set(MockResultSet::affected(3));
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());

    let done = stmt.execute("DELETE FROM users", &[])?;

    assert_eq!(done.rows_affected(), 3);
    assert!(!done.has_result_set());
    assert_eq!(stmt.state(), StatementState::NoResults);
    assert_eq!(driver.call_count("SQLExecDirectW"), 1);
    assert_eq!(driver.call_count("SQLPrepareW"), 0);
    assert_eq!(driver.executed_sql(), vec!["DELETE FROM users".to_owned()]);
    Ok(())
}

#[test]
fn it_fetches_all_rows_of_a_select() -> anyhow::Result<()> {
    let driver = setup();
    driver.push_result_set(users());
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());

    let done = stmt.exec_direct("SELECT id, name FROM users")?;
    assert!(done.has_result_set());
    assert_eq!(stmt.state(), StatementState::ResultsAvailable);
    assert_eq!(stmt.columns().len(), 2);
    assert_eq!(stmt.columns()[1].name, "name");
    assert_eq!(stmt.columns()[1].column_size, 20);

    let rows = stmt.fetch_all()?;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].get(0)?, &HostValue::Int(1));
    assert_eq!(rows[1].get_by_name("name")?, &HostValue::from("Grace"));
    assert_eq!(rows[2].get_by_name("NAME")?, &HostValue::Null);

    // nothing stays bound once the fetch returns
    assert_eq!(driver.bound_column_count(), 0);
    assert_eq!(driver.stmt_attr(sys::ATTR_ROW_ARRAY_SIZE), Some(1));
    assert_eq!(driver.stmt_attr(sys::ATTR_ROWS_FETCHED_PTR), Some(0));

    assert!(stmt.fetch_all()?.is_empty());
    Ok(())
}

#[test]
fn it_fetches_rows_in_slices() -> anyhow::Result<()> {
    let driver = setup();
    driver.push_result_set(users());
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    stmt.exec_direct("SELECT id, name FROM users")?;

    assert!(stmt.fetch_many(0)?.is_empty());

    let first = stmt.fetch_many(2)?;
    assert_eq!(first.len(), 2);
    assert_eq!(driver.stmt_attr(sys::ATTR_ROW_ARRAY_SIZE), Some(1));

    let one = stmt.fetch_one()?.expect("a third row");
    assert_eq!(one.get(0)?, &HostValue::Int(3));
    assert_eq!(one.get(1)?, &HostValue::Null);

    assert!(stmt.fetch_one()?.is_none());
    assert!(stmt.fetch_many(10)?.is_empty());
    Ok(())
}

#[test]
fn it_prepares_a_repeated_statement_once() -> anyhow::Result<()> {
    let driver = setup();
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    let sql = "UPDATE users SET name = ? WHERE id = ?";

    let done = stmt.execute(sql, &[HostValue::from("Ada"), HostValue::from(1)])?;
    assert_eq!(done.rows_affected(), 1);
    stmt.execute(sql, &[HostValue::from("Grace"), HostValue::from(2)])?;

    assert_eq!(driver.call_count("SQLPrepareW"), 1);
    assert_eq!(driver.call_count("SQLExecute"), 2);
    assert_eq!(
        driver.executed_parameters(),
        vec![vec![MockCell::Text("Grace".into()), MockCell::Int(2)]]
    );
    // parameters are unbound after every execution
    assert_eq!(driver.bound_parameter_count(), 0);

    stmt.execute("DELETE FROM users WHERE id = ?", &[HostValue::from(2)])?;
    assert_eq!(driver.call_count("SQLPrepareW"), 2);
    Ok(())
}

#[test]
fn it_binds_null_with_a_data_pointer() -> anyhow::Result<()> {
    let driver = setup();
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());

    stmt.execute("INSERT INTO users (name) VALUES (?)", &[HostValue::Null])?;

    let bound = driver.bound_parameters();
    assert_eq!(bound.len(), 1);
    assert!(!bound[0].value_ptr.is_null());
    assert_eq!(bound[0].indicator, sys::NULL_DATA);
    assert_eq!(driver.executed_parameters(), vec![vec![MockCell::Null]]);
    Ok(())
}

#[test]
fn it_round_trips_parameters_through_a_result_set() -> anyhow::Result<()> {
    let driver = setup();
    driver.echo_parameters();
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());

    let timestamp = NaiveDate::from_ymd_opt(2024, 2, 29)
        .and_then(|d| d.and_hms_micro_opt(13, 45, 30, 123_456))
        .expect("valid timestamp");
    let guid = Uuid::from_u128(0x67e5_5044_10b1_426f_9247_bb68_0e5f_e0c8);
    let params = vec![
        HostValue::from(42),
        HostValue::from(-70_000),
        HostValue::from("hello"),
        HostValue::from("héllo wörld 😀"),
        HostValue::from(true),
        HostValue::from(1.5),
        HostValue::Decimal(ddbc::FixedPointValue::new(10, 2, 1, 12345)),
        HostValue::from(timestamp.date()),
        HostValue::from(timestamp.time().with_nanosecond(0).expect("valid time")),
        HostValue::from(timestamp),
        HostValue::from(vec![0xde_u8, 0xad, 0xbe, 0xef]),
        HostValue::Null,
        HostValue::from(guid),
    ];

    stmt.execute("SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?", &params)?;
    let rows = stmt.fetch_all()?;
    assert_eq!(rows.len(), 1);

    let values = rows[0].values();
    assert_eq!(&values[..12], &params[..12]);
    // GUIDs come back as their canonical text
    assert_eq!(
        values[12],
        HostValue::from("67e55044-10b1-426f-9247-bb680e5fe0c8")
    );

    let numeric = driver
        .descriptor_fields()
        .into_iter()
        .filter(|field| field.record == 7)
        .map(|field| (field.field, field.value))
        .collect::<Vec<_>>();
    assert!(numeric.contains(&(sys::DESC_PRECISION, 10)));
    assert!(numeric.contains(&(sys::DESC_SCALE, 2)));
    Ok(())
}

#[test]
fn it_reports_partial_success() -> anyhow::Result<()> {
    let driver = setup();
    driver.warn_next("SQLExecDirectW", "01000", "[mock] statement text was changed");
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());

    let done = stmt.exec_direct("UPDATE users SET name = name")?;

    assert!(done.is_partial_success());
    assert_eq!(done.return_code(), SqlReturn::SUCCESS_WITH_INFO);
    Ok(())
}

#[test]
fn it_surfaces_driver_errors() -> anyhow::Result<()> {
    let driver = setup();
    driver.fail_next("SQLExecDirectW", "42S02", "Invalid object name 'nope'.");
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());

    let err = stmt.exec_direct("SELECT * FROM nope").unwrap_err();
    let driver_error = err.as_driver_error().expect("a driver error");
    assert_eq!(driver_error.function, "SQLExecDirectW");
    assert_eq!(driver_error.code, SqlReturn::ERROR);
    assert_eq!(driver_error.state(), Some("42S02"));
    assert_eq!(driver_error.records[0].message, "Invalid object name 'nope'.");
    assert_eq!(driver_error.kind(), ddbc::odbc::ErrorKind::Programming);

    // the statement is usable again afterwards
    driver.push_result_set(MockResultSet::affected(0));
    stmt.exec_direct("SELECT 1 WHERE 1 = 0")?;
    Ok(())
}

#[test]
fn it_walks_through_multiple_results() -> anyhow::Result<()> {
    let driver = setup();
    driver.push_results(vec![MockResultSet::affected(2), users(), MockResultSet::affected(5)]);
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());

    let done = stmt.exec_direct("UPDATE a SET x = 1; SELECT id, name FROM users; DELETE FROM b")?;
    assert_eq!(done.rows_affected(), 2);
    assert_eq!(stmt.state(), StatementState::NoResults);
    assert!(matches!(stmt.fetch_all(), Err(Error::Protocol(_))));

    assert!(stmt.more_results()?);
    assert_eq!(stmt.state(), StatementState::ResultsAvailable);
    assert_eq!(stmt.fetch_all()?.len(), 3);

    assert!(stmt.more_results()?);
    assert_eq!(stmt.state(), StatementState::NoResults);
    assert_eq!(stmt.row_count(), 5);

    assert!(!stmt.more_results()?);
    assert!(!stmt.more_results()?);
    Ok(())
}

#[test]
fn it_closes_and_reuses_the_handle() -> anyhow::Result<()> {
    let driver = setup();
    driver.push_result_set(users());
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    stmt.exec_direct("SELECT id, name FROM users")?;

    stmt.close()?;
    assert_eq!(stmt.state(), StatementState::Closed);
    assert!(stmt.columns().is_empty());
    assert!(!stmt.more_results()?);
    assert!(matches!(stmt.fetch_one(), Err(Error::Protocol(_))));

    driver.push_result_set(MockResultSet::affected(1));
    assert_eq!(stmt.exec_direct("DELETE FROM users WHERE id = 1")?.rows_affected(), 1);
    Ok(())
}

#[test]
fn it_rejects_mismatched_parameter_counts() -> anyhow::Result<()> {
    let driver = setup();
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    let descriptors = [ddbc::ParameterDescriptor::infer(&HostValue::from(1))];

    let err = stmt
        .execute_with("SELECT ?", &[HostValue::from(1), HostValue::from(2)], &descriptors)
        .unwrap_err();

    assert!(matches!(err, Error::ArgumentCount { expected: 1, actual: 2 }));
    assert_eq!(driver.call_count("SQLExecute"), 0);
    assert_eq!(stmt.state(), StatementState::Prepared);
    Ok(())
}
