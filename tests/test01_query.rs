mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{LogEvent, RecordingApi, RecordingLogger, connect_with, memory_driver};
use embedded_sql_driver::engine::codes;
use embedded_sql_driver::prelude::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::test]
async fn select_one_returns_single_row() -> TestResult {
    let (_driver, runner) = memory_driver().await?;

    let result = runner.query_structured("SELECT 1", &[]).await?;
    assert_eq!(result.affected, 0);
    assert_eq!(result.records.len(), 1);
    let row = result.records[0].as_row().expect("row record");
    assert_eq!(row.column_names(), ["1".to_string()]);
    assert_eq!(row.get("1"), Some(&RowValues::Int(1)));
    assert_eq!(result.raw().len(), result.records.len());
    Ok(())
}

#[tokio::test]
async fn rows_keep_statement_column_order() -> TestResult {
    let (_driver, runner) = memory_driver().await?;
    runner
        .query("CREATE TABLE people (name TEXT, age INTEGER, score REAL)", &[])
        .await?;
    runner
        .query(
            "INSERT INTO people (name, age, score) VALUES (?, ?, ?), (?, ?, ?)",
            &[
                Some("ann".into()),
                Some(RowValues::Int(31)),
                Some(RowValues::Float(1.5)),
                Some("bob".into()),
                Some(RowValues::Int(27)),
                Some(RowValues::Float(2.5)),
            ],
        )
        .await?;

    let records = runner
        .query("SELECT score, name, age FROM people ORDER BY name", &[])
        .await?;
    assert_eq!(records.len(), 2);
    let first = records[0].as_row().expect("row record");
    let columns: Vec<&str> = first.iter().map(|(column, _)| column).collect();
    assert_eq!(columns, ["score", "name", "age"]);
    assert_eq!(first.get("name").and_then(RowValues::as_text), Some("ann"));
    assert_eq!(records[1].get("age").and_then(RowValues::as_int), Some(27));
    Ok(())
}

#[tokio::test]
async fn insert_appends_generated_row_id() -> TestResult {
    let (_driver, runner) = memory_driver().await?;
    runner
        .query("CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, x INTEGER)", &[])
        .await?;

    let first = runner
        .query("INSERT INTO t (x) VALUES (?)", &[Some(RowValues::Int(5))])
        .await?;
    let first_id = first
        .last()
        .and_then(Record::as_value)
        .and_then(RowValues::as_int)
        .expect("row id");

    let direct = runner.query("SELECT last_insert_rowid() AS id", &[]).await?;
    assert_eq!(direct[0].get("id").and_then(RowValues::as_int), Some(first_id));

    let second = runner
        .query_structured("INSERT INTO t (x) VALUES (?)", &[Some(RowValues::Int(6))])
        .await?;
    assert_eq!(second.affected, 1);
    let second_id = second
        .records
        .last()
        .and_then(Record::as_value)
        .and_then(RowValues::as_int)
        .expect("row id");
    assert!(second_id > first_id);
    Ok(())
}

#[tokio::test]
async fn lowercase_insert_gets_no_row_id() -> TestResult {
    let (_driver, runner) = memory_driver().await?;
    runner.query("CREATE TABLE t (x INTEGER)", &[]).await?;
    let records = runner
        .query("insert into t (x) values (?)", &[Some(RowValues::Int(1))])
        .await?;
    assert!(records.is_empty());
    Ok(())
}

#[tokio::test]
async fn unset_parameters_bind_as_null() -> TestResult {
    let api = RecordingApi::new();
    let logger = Arc::new(RecordingLogger::default());
    let (_driver, runner) = connect_with(Arc::clone(&api), Arc::clone(&logger)).await?;

    let records = runner
        .query(
            "SELECT ? AS a, ? AS b, ? AS c",
            &[Some(RowValues::Int(1)), None, Some(RowValues::Bool(true))],
        )
        .await?;
    let row = records[0].as_row().expect("row record");
    assert_eq!(row.get("a"), Some(&RowValues::Int(1)));
    assert_eq!(row.get("b"), Some(&RowValues::Null));
    assert_eq!(row.get("c").and_then(RowValues::as_int), Some(1));

    assert!(logger.events().contains(&LogEvent::Query(
        "SELECT ? AS a, ? AS b, ? AS c".to_string(),
        vec![RowValues::Int(1), RowValues::Null, RowValues::Bool(true)],
    )));
    Ok(())
}

#[tokio::test]
async fn failed_query_carries_query_and_parameters() -> TestResult {
    let logger = Arc::new(RecordingLogger::default());
    let (_driver, runner) = connect_with(RecordingApi::new(), Arc::clone(&logger)).await?;

    let err = runner
        .query("SELECT * FROM missing WHERE id = ?", &[Some(RowValues::Int(3))])
        .await
        .expect_err("missing table");
    match &err {
        DriverError::QueryFailed {
            query, parameters, ..
        } => {
            assert_eq!(query, "SELECT * FROM missing WHERE id = ?");
            assert_eq!(parameters, &vec![RowValues::Int(3)]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.backend_error().is_some());
    assert_eq!(
        logger.events().last(),
        Some(&LogEvent::Error("SELECT * FROM missing WHERE id = ?".to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn too_many_parameters_is_a_range_error() -> TestResult {
    let (_driver, runner) = memory_driver().await?;
    let err = runner
        .query("SELECT ?", &[Some(RowValues::Int(1)), Some(RowValues::Int(2))])
        .await
        .expect_err("extra parameter");
    assert_eq!(
        err.backend_error().map(|e| e.code),
        Some(codes::SQLITE_RANGE)
    );
    Ok(())
}

#[tokio::test]
async fn blank_sql_returns_no_records() -> TestResult {
    let (_driver, runner) = memory_driver().await?;
    let result = runner.query_structured("   ", &[]).await?;
    assert!(result.records.is_empty());
    Ok(())
}

#[tokio::test]
async fn multiple_statements_are_rejected_whole() -> TestResult {
    let api = RecordingApi::new();
    let (_driver, runner) =
        connect_with(Arc::clone(&api), Arc::new(RecordingLogger::default())).await?;
    runner.query("CREATE TABLE t (x INTEGER)", &[]).await?;

    let err = runner
        .query("INSERT INTO t (x) VALUES (1); INSERT INTO t (x) VALUES (2)", &[])
        .await
        .expect_err("two statements");
    assert!(matches!(err, DriverError::QueryFailed { .. }));
    assert_eq!(api.prepares(), api.finalizes());

    // neither statement ran
    let count = runner.query("SELECT count(*) AS c FROM t", &[]).await?;
    assert_eq!(count[0].get("c"), Some(&RowValues::Int(0)));
    Ok(())
}

#[tokio::test]
async fn slow_queries_are_reported_but_still_run() -> TestResult {
    let logger = Arc::new(RecordingLogger::default());
    let driver = EmbeddedOptionsBuilder::new(":memory:")
        .driver(RecordingApi::new())
        .logger(Arc::clone(&logger) as Arc<dyn QueryLogger>)
        .max_query_execution_time(Duration::ZERO)
        .build();
    driver.connect().await?;
    let runner = driver.create_query_runner(ReplicationMode::Master);

    let records = runner.query("SELECT 2 AS two", &[]).await?;
    assert_eq!(records[0].get("two"), Some(&RowValues::Int(2)));
    assert!(
        logger
            .events()
            .contains(&LogEvent::Slow("SELECT 2 AS two".to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn released_runner_rejects_queries() -> TestResult {
    let (driver, runner) = memory_driver().await?;
    assert!(Arc::ptr_eq(
        &runner,
        &driver.create_query_runner(ReplicationMode::Slave)
    ));

    driver.disconnect().await?;
    assert!(runner.is_released());
    let err = runner.query("SELECT 1", &[]).await.expect_err("released");
    assert!(matches!(err, DriverError::RunnerReleased));
    Ok(())
}

#[tokio::test]
async fn values_round_trip_through_storage() -> TestResult {
    let (_driver, runner) = memory_driver().await?;
    runner
        .query("CREATE TABLE v (t TEXT, b BLOB, j TEXT, ts TEXT)", &[])
        .await?;
    let ts = chrono::NaiveDate::from_ymd_opt(2024, 5, 17)
        .and_then(|d| d.and_hms_opt(8, 30, 0))
        .expect("valid timestamp");
    runner
        .query(
            "INSERT INTO v (t, b, j, ts) VALUES (?, ?, ?, ?)",
            &[
                Some("hello".into()),
                Some(RowValues::Blob(vec![0, 1, 2])),
                Some(serde_json::json!({"k": [1, 2]}).into()),
                Some(ts.into()),
            ],
        )
        .await?;

    let records = runner.query("SELECT t, b, j, ts FROM v", &[]).await?;
    let row = records[0].as_row().expect("row record");
    assert_eq!(row.get("t").and_then(RowValues::as_text), Some("hello"));
    assert_eq!(row.get("b").and_then(RowValues::as_blob), Some(&[0u8, 1, 2][..]));
    assert_eq!(
        row.get("j").and_then(RowValues::as_text),
        Some(r#"{"k":[1,2]}"#)
    );
    assert_eq!(row.get("ts").and_then(RowValues::as_timestamp), Some(ts));
    Ok(())
}
