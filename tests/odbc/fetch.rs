use ddbc::odbc::sys;
use ddbc::{
    Error, FixedPointValue, HostValue, OdbcBufferSettings, OdbcStatement, OdbcStatementOptions,
    SqlDataType,
};
use ddbc_core::mock::{MockCell, MockColumn, MockResultSet};

mod common;
use common::{options, setup};

fn numbers(count: i64) -> MockResultSet {
    (0..count).fold(
        MockResultSet::new(vec![MockColumn::new("n", SqlDataType::Integer)]),
        |set, n| set.row(vec![MockCell::Int(n)]),
    )
}

#[test]
fn it_fetches_in_batches_sized_by_the_memory_limit() -> anyhow::Result<()> {
    let driver = setup();
    driver.push_result_set(numbers(25));
    // 4 byte rows under 400 bytes: 100 rows fit, snapped to batches of 10
    let mut opts = OdbcStatementOptions::new();
    opts.batch_memory_limit(400);
    let mut stmt = OdbcStatement::with_options(&driver, driver.statement_handle(), opts);
    stmt.exec_direct("SELECT n FROM numbers")?;

    let rows = stmt.fetch_all()?;

    let values: Vec<i64> = rows
        .iter()
        .filter_map(|row| row.values()[0].as_i64())
        .collect();
    assert_eq!(values, (0..25).collect::<Vec<_>>());
    // 10 + 10 + 5, then the end of the result set
    assert_eq!(driver.call_count("SQLFetchScroll"), 4);
    assert_eq!(driver.call_count("SQLBindCol"), 1);
    Ok(())
}

#[test]
fn it_maps_null_and_unknown_lengths_to_null() -> anyhow::Result<()> {
    let driver = setup();
    driver.push_result_set(
        MockResultSet::new(vec![
            MockColumn::new("a", SqlDataType::VarChar).size(10),
            MockColumn::new("b", SqlDataType::WVarChar).size(10),
        ])
        .row(vec![MockCell::Null, MockCell::Text("x".into())])
        .row(vec![MockCell::Text("y".into()), MockCell::NoTotal]),
    );
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    stmt.exec_direct("SELECT a, b FROM t")?;

    let rows = stmt.fetch_all()?;

    assert_eq!(rows[0].values(), &[HostValue::Null, HostValue::from("x")]);
    assert_eq!(rows[1].values(), &[HostValue::from("y"), HostValue::Null]);
    Ok(())
}

#[test]
fn it_refuses_to_truncate_values() -> anyhow::Result<()> {
    let driver = setup();
    driver.push_result_set(
        MockResultSet::new(vec![
            MockColumn::new("id", SqlDataType::Integer),
            MockColumn::new("code", SqlDataType::VarChar).size(4),
        ])
        .row(vec![MockCell::Int(1), MockCell::Text("abcd".into())])
        .row(vec![MockCell::Int(2), MockCell::Text("abcdefgh".into())]),
    );
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    stmt.exec_direct("SELECT id, code FROM t")?;

    let err = stmt.fetch_all().unwrap_err();

    assert!(
        matches!(err, Error::BufferTooSmall { column: 1, row: 1, actual: 8, .. }),
        "{:?}",
        err
    );
    // the row arrays are unbound even though the fetch failed
    assert_eq!(driver.bound_column_count(), 0);
    Ok(())
}

#[test]
fn it_reads_unbounded_columns_in_chunks() -> anyhow::Result<()> {
    let driver = setup();
    let text: String = "ünïcödé 😀 ".repeat(1_000);
    let units = text.encode_utf16().count();
    driver.push_result_set(
        MockResultSet::new(vec![MockColumn::new("body", SqlDataType::WLongVarChar)])
            .row(vec![MockCell::Text(text.clone())]),
    );
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    stmt.exec_direct("SELECT body FROM documents")?;

    let rows = stmt.fetch_all()?;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values()[0], HostValue::Text(text));
    // read with SQLGetData, 4096 characters at a time
    assert_eq!(driver.call_count("SQLBindCol"), 0);
    assert_eq!(driver.call_count("SQLGetData"), (units + 4095) / 4096);
    Ok(())
}

#[test]
fn it_reads_chunks_of_unknown_total_length() -> anyhow::Result<()> {
    let driver = setup();
    driver.report_no_total(true);
    let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    driver.push_result_set(
        MockResultSet::new(vec![MockColumn::new("blob", SqlDataType::LongVarBinary)])
            .row(vec![MockCell::Bytes(payload.clone())])
            .row(vec![MockCell::Null]),
    );
    let mut opts = OdbcStatementOptions::new();
    opts.lob_chunk_size(3_000);
    let mut stmt = OdbcStatement::with_options(&driver, driver.statement_handle(), opts);
    stmt.exec_direct("SELECT blob FROM files")?;

    let rows = stmt.fetch_all()?;

    assert_eq!(rows[0].values()[0], HostValue::Bytes(payload));
    assert_eq!(rows[1].values()[0], HostValue::Null);
    Ok(())
}

#[test]
fn it_falls_back_to_a_fixed_width_without_lob_streaming() -> anyhow::Result<()> {
    let driver = setup();
    driver.push_result_set(
        MockResultSet::new(vec![MockColumn::new("body", SqlDataType::LongVarChar)])
            .row(vec![MockCell::Text("a".repeat(100))])
            .row(vec![MockCell::Text("b".repeat(300))]),
    );
    let opts = options("stream_lobs=false;fallback_column_size=256")?;
    let mut stmt = OdbcStatement::with_options(&driver, driver.statement_handle(), opts);
    stmt.exec_direct("SELECT body FROM documents")?;

    let err = stmt.fetch_all().unwrap_err();

    assert!(matches!(
        err,
        Error::BufferTooSmall { column: 0, row: 1, actual: 300, .. }
    ));
    Ok(())
}

#[test]
fn it_fetches_row_by_row_when_unbuffered() -> anyhow::Result<()> {
    let driver = setup();
    driver.push_result_set(numbers(3));
    let mut opts = OdbcStatementOptions::new();
    opts.buffer_settings(OdbcBufferSettings::Unbuffered);
    let mut stmt = OdbcStatement::with_options(&driver, driver.statement_handle(), opts);
    stmt.exec_direct("SELECT n FROM numbers")?;

    let rows = stmt.fetch_many(2)?;
    assert_eq!(rows.len(), 2);
    let rest = stmt.fetch_all()?;
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].values()[0], HostValue::Int(2));

    assert_eq!(driver.call_count("SQLBindCol"), 0);
    assert_eq!(driver.call_count("SQLFetch"), 4);
    assert_eq!(driver.stmt_attr(sys::ATTR_ROW_ARRAY_SIZE), None);
    Ok(())
}

#[test]
fn it_parses_decimals_with_the_column_shape() -> anyhow::Result<()> {
    let driver = setup();
    driver.push_result_set(
        MockResultSet::new(vec![MockColumn::new("price", SqlDataType::Decimal)
            .size(10)
            .digits(2)])
        .row(vec![MockCell::Text("-123.4".into())])
        .row(vec![MockCell::Text("0.05".into())]),
    );
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    stmt.exec_direct("SELECT price FROM items")?;

    let rows = stmt.fetch_all()?;

    assert_eq!(
        rows[0].values()[0],
        HostValue::Decimal(FixedPointValue::new(10, 2, 0, 12340))
    );
    assert_eq!(
        rows[1].values()[0],
        HostValue::Decimal(FixedPointValue::new(10, 2, 1, 5))
    );
    Ok(())
}

#[test]
fn it_reports_undecodable_cells_with_their_column() -> anyhow::Result<()> {
    let driver = setup();
    driver.push_result_set(
        MockResultSet::new(vec![
            MockColumn::new("id", SqlDataType::Integer),
            MockColumn::new("price", SqlDataType::Numeric).size(5).digits(2),
        ])
        .row(vec![MockCell::Int(1), MockCell::Text("not a number".into())]),
    );
    let mut stmt = OdbcStatement::new(&driver, driver.statement_handle());
    stmt.exec_direct("SELECT id, price FROM items")?;

    let err = stmt.fetch_all().unwrap_err();

    assert!(matches!(err, Error::ColumnDecode { index: 1, .. }));
    Ok(())
}
