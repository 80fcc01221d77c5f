use ddbc::odbc::{sys, CType};
use ddbc::{
    Error, HostValue, OdbcStatement, OdbcStatementOptions, ParameterDescriptor, SqlDataType,
    StatementState,
};
use ddbc_core::mock::MockCell;

mod common;
use common::setup;

#[test]
fn it_streams_long_text_in_chunks() -> anyhow::Result<()> {
    let driver = setup();
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    let body = "x".repeat(20_000);

    stmt.execute("INSERT INTO documents (body) VALUES (?)", &[HostValue::from(body.as_str())])?;

    let bound = driver.bound_parameters();
    assert_eq!(bound[0].indicator, sys::len_data_at_exec(20_000));
    assert_eq!(bound[0].buffer_length, 0);
    assert_eq!(driver.put_data_lengths(), vec![8192, 8192, 3616]);
    assert_eq!(driver.executed_parameters(), vec![vec![MockCell::Text(body)]]);
    assert_eq!(driver.bound_parameter_count(), 0);
    Ok(())
}

#[test]
fn it_sends_full_chunks_for_an_exact_multiple() -> anyhow::Result<()> {
    let driver = setup();
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    let payload = vec![0x5a_u8; 16_384];

    stmt.execute("INSERT INTO files (blob) VALUES (?)", &[HostValue::from(payload.clone())])?;

    assert_eq!(driver.put_data_lengths(), vec![8192, 8192]);
    assert_eq!(driver.executed_parameters(), vec![vec![MockCell::Bytes(payload)]]);
    Ok(())
}

#[test]
fn it_streams_explicitly_deferred_binary() -> anyhow::Result<()> {
    let driver = setup();
    let mut opts = OdbcStatementOptions::new();
    opts.dae_chunk_size(1_000);
    let mut stmt = OdbcStatement::with_options(&driver, driver.statement_handle(), opts);
    let payload: Vec<u8> = (0..2_500u32).map(|i| (i % 251) as u8).collect();
    let descriptor = ParameterDescriptor::new(CType::Binary, SqlDataType::LongVarBinary, 0)
        .with_data_at_exec(true);

    stmt.execute_with(
        "INSERT INTO files (blob) VALUES (?)",
        &[HostValue::from(payload.clone())],
        &[descriptor],
    )?;

    assert_eq!(driver.put_data_lengths(), vec![1000, 1000, 500]);
    assert_eq!(driver.executed_parameters(), vec![vec![MockCell::Bytes(payload)]]);
    Ok(())
}

#[test]
fn it_streams_wide_text_by_characters() -> anyhow::Result<()> {
    let driver = setup();
    let mut opts = OdbcStatementOptions::new();
    opts.inline_threshold(8).dae_chunk_size(4);
    let mut stmt = OdbcStatement::with_options(&driver, driver.statement_handle(), opts);
    // 7 UTF-16 units, 14 bytes
    let text = "äöü 😀!";

    stmt.execute("INSERT INTO t (s) VALUES (?)", &[HostValue::from(text)])?;

    // 4 units, then 3, in bytes
    assert_eq!(driver.put_data_lengths(), vec![8, 6]);
    assert_eq!(
        driver.executed_parameters(),
        vec![vec![MockCell::Text(text.to_owned())]]
    );
    Ok(())
}

#[test]
fn it_sends_an_empty_deferred_value_once() -> anyhow::Result<()> {
    let driver = setup();
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    let descriptor =
        ParameterDescriptor::new(CType::Char, SqlDataType::LongVarChar, 0).with_data_at_exec(true);

    stmt.execute_with("INSERT INTO t (s) VALUES (?)", &[HostValue::from("")], &[descriptor])?;

    assert_eq!(driver.put_data_lengths(), vec![0]);
    assert_eq!(
        driver.executed_parameters(),
        vec![vec![MockCell::Text(String::new())]]
    );
    Ok(())
}

#[test]
fn it_reads_back_what_it_streamed() -> anyhow::Result<()> {
    let driver = setup();
    driver.echo_parameters();
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    let body: String = ('a'..='z').cycle().take(30_000).collect();

    stmt.execute("SELECT ?", &[HostValue::from(body.as_str()), HostValue::from(7)])?;
    let rows = stmt.fetch_all()?;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values(), &[HostValue::Text(body), HostValue::Int(7)]);
    Ok(())
}

#[test]
fn it_aborts_on_a_failed_chunk() -> anyhow::Result<()> {
    let driver = setup();
    driver.fail_next("SQLPutData", "22001", "String data, right truncation");
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    let sql = "INSERT INTO documents (body) VALUES (?)";

    let err = stmt
        .execute(sql, &[HostValue::from("y".repeat(9_000))])
        .unwrap_err();

    match &err {
        Error::Driver(e) => {
            assert_eq!(e.function, "SQLPutData");
            assert_eq!(e.state(), Some("22001"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(driver.put_data_lengths(), Vec::<isize>::new());
    assert_eq!(stmt.state(), StatementState::Prepared);
    // the deferred buffers are no longer bound
    assert_eq!(driver.bound_parameter_count(), 0);

    // the prepared statement is reused for the retry
    stmt.execute(sql, &[HostValue::from("short")])?;
    assert_eq!(driver.call_count("SQLPrepareW"), 1);
    Ok(())
}

#[test]
fn it_rejects_deferred_values_that_cannot_stream() -> anyhow::Result<()> {
    let driver = setup();
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    let descriptor =
        ParameterDescriptor::new(CType::SLong, SqlDataType::Integer, 10).with_data_at_exec(true);

    let err = stmt
        .execute_with("INSERT INTO t (n) VALUES (?)", &[HostValue::from(5)], &[descriptor])
        .unwrap_err();

    assert!(matches!(
        err,
        Error::UnsupportedStreamingType { index: 0, found: "int" }
    ));
    assert_eq!(driver.call_count("SQLExecute"), 0);
    Ok(())
}
