use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, OpenFlags, params};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::CollaboratorError;
use crate::model::{
    Column, ResultRow, ResultSet, SampleRow, SampleSet, SchemaSnapshot, Table, TableSample,
};
use crate::timeout::CallTimeout;

/// Schema introspection and query execution for one dataset.
pub trait DataStore {
    fn dataset_id(&self) -> &str;

    fn fetch_schema(&self) -> Result<SchemaSnapshot, CollaboratorError>;

    fn fetch_samples(
        &self,
        table_names: &[String],
        row_limit: usize,
    ) -> Result<SampleSet, CollaboratorError>;

    fn execute_query(&self, query_text: &str) -> Result<ResultSet, CollaboratorError>;
}

/// Resolves a dataset identifier to a live store.
pub trait DatasetConnector {
    fn connect(&self, dataset_id: &str) -> Result<Box<dyn DataStore>, CollaboratorError>;
}

#[derive(Debug, Clone)]
pub struct SqliteConnector {
    data_root: PathBuf,
    timeout: CallTimeout,
}

impl SqliteConnector {
    pub fn new(data_root: impl Into<PathBuf>, timeout: CallTimeout) -> Self {
        Self {
            data_root: data_root.into(),
            timeout,
        }
    }

    pub fn resolve_dataset_path(&self, dataset_id: &str) -> Option<PathBuf> {
        resolve_dataset_path(&self.data_root, dataset_id)
    }
}

impl DatasetConnector for SqliteConnector {
    fn connect(&self, dataset_id: &str) -> Result<Box<dyn DataStore>, CollaboratorError> {
        let Some(db_path) = self.resolve_dataset_path(dataset_id) else {
            return Err(CollaboratorError::Connection(format!(
                "dataset `{}` not found under {}",
                dataset_id,
                self.data_root.display()
            )));
        };

        let store = SqliteDataStore::open(dataset_id, &db_path, self.timeout)?;
        info!(dataset = %dataset_id, path = %db_path.display(), "connected to dataset");
        Ok(Box::new(store))
    }
}

pub fn resolve_dataset_path(data_root: &Path, dataset_id: &str) -> Option<PathBuf> {
    let dataset_id = dataset_id.trim();
    if dataset_id.is_empty() {
        return None;
    }

    [
        data_root.join(format!("{dataset_id}.sqlite")),
        data_root.join(format!("{dataset_id}.db")),
        data_root.join(dataset_id).join(format!("{dataset_id}.sqlite")),
    ]
    .into_iter()
    .find(|candidate| candidate.is_file())
}

pub struct SqliteDataStore {
    dataset_id: String,
    connection: Connection,
    timeout: CallTimeout,
}

impl SqliteDataStore {
    pub fn open(
        dataset_id: &str,
        db_path: &Path,
        timeout: CallTimeout,
    ) -> Result<Self, CollaboratorError> {
        let connection = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|err| {
            classify_sqlite_error(
                err,
                &format!("open {}", db_path.display()),
                timeout,
                CollaboratorError::Connection,
            )
        })?;

        Ok(Self::from_connection(dataset_id, connection, timeout))
    }

    /// Lock waits are bounded by the call budget so a held writer lock cannot outlast it.
    pub fn from_connection(dataset_id: &str, connection: Connection, timeout: CallTimeout) -> Self {
        if let Some(budget) = timeout.duration()
            && let Err(err) = connection.busy_timeout(budget)
        {
            warn!(dataset = %dataset_id, error = %err, "failed to bound the lock wait");
        }
        Self {
            dataset_id: dataset_id.to_string(),
            connection,
            timeout,
        }
    }

    fn list_tables(&self) -> rusqlite::Result<Vec<String>> {
        let mut statement = self.connection.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let mut rows = statement.query([])?;

        let mut names = Vec::<String>::new();
        while let Some(row) = rows.next()? {
            names.push(row.get(0)?);
        }
        Ok(names)
    }

    fn table_columns(&self, table: &str) -> rusqlite::Result<Vec<Column>> {
        let sql = format!("PRAGMA table_info({})", quote_identifier(table));
        let mut statement = self.connection.prepare(&sql)?;
        let mut rows = statement.query([])?;

        let mut columns = Vec::<Column>::new();
        while let Some(row) = rows.next()? {
            let name: String = row.get(1)?;
            let data_type: String = row.get::<_, Option<String>>(2)?.unwrap_or_default();
            let not_null: i64 = row.get(3)?;
            let primary_key: i64 = row.get(5)?;
            columns.push(Column {
                name,
                data_type,
                nullable: not_null == 0 && primary_key == 0,
            });
        }
        Ok(columns)
    }

    fn sample_table(&self, table: &str, row_limit: usize) -> rusqlite::Result<TableSample> {
        let quoted = quote_identifier(table);
        let approximate_row_count: i64 = self.connection.query_row(
            &format!("SELECT COUNT(*) FROM {quoted}"),
            [],
            |row| row.get(0),
        )?;

        let mut statement = self
            .connection
            .prepare(&format!("SELECT * FROM {quoted} LIMIT ?1"))?;
        let column_names = owned_column_names(&statement);
        let mut rows = statement.query(params![row_limit as i64])?;

        let mut sample_rows = Vec::<SampleRow>::new();
        while let Some(row) = rows.next()? {
            sample_rows.push(read_row(row, &column_names)?);
        }

        Ok(TableSample {
            rows: sample_rows,
            approximate_row_count: approximate_row_count.max(0) as u64,
        })
    }

    fn run_query(&self, query_text: &str) -> Result<ResultSet, CollaboratorError> {
        let execution_error = |err| {
            classify_sqlite_error(err, "query", self.timeout, CollaboratorError::Execution)
        };

        let mut statement = self
            .connection
            .prepare(query_text)
            .map_err(execution_error)?;
        if !statement.readonly() {
            return Err(CollaboratorError::Execution(
                "only read-only queries can be evaluated".to_string(),
            ));
        }

        let column_names = owned_column_names(&statement);
        let mut rows = statement.query([]).map_err(execution_error)?;

        let mut result_rows = Vec::<ResultRow>::new();
        while let Some(row) = rows.next().map_err(execution_error)? {
            result_rows.push(read_row(row, &column_names).map_err(execution_error)?);
        }

        Ok(ResultSet::new(result_rows))
    }
}

impl DataStore for SqliteDataStore {
    fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    fn fetch_schema(&self) -> Result<SchemaSnapshot, CollaboratorError> {
        let _guard = self
            .timeout
            .arm_interrupt(self.connection.get_interrupt_handle());
        let schema_error =
            |err| classify_sqlite_error(err, "schema", self.timeout, CollaboratorError::Connection);

        let mut tables = Vec::<Table>::new();
        for name in self.list_tables().map_err(schema_error)? {
            let columns = self.table_columns(&name).map_err(schema_error)?;
            tables.push(Table { name, columns });
        }

        debug!(dataset = %self.dataset_id, tables = tables.len(), "schema fetched");
        Ok(SchemaSnapshot {
            dataset_id: self.dataset_id.clone(),
            tables,
        })
    }

    fn fetch_samples(
        &self,
        table_names: &[String],
        row_limit: usize,
    ) -> Result<SampleSet, CollaboratorError> {
        let _guard = self
            .timeout
            .arm_interrupt(self.connection.get_interrupt_handle());

        let mut samples = SampleSet {
            row_limit,
            ..SampleSet::default()
        };
        for table in table_names {
            let sample = self.sample_table(table, row_limit).map_err(|err| {
                classify_sqlite_error(
                    err,
                    &format!("samples for `{table}`"),
                    self.timeout,
                    CollaboratorError::Connection,
                )
            })?;
            samples.tables.insert(table.clone(), sample);
        }

        Ok(samples)
    }

    fn execute_query(&self, query_text: &str) -> Result<ResultSet, CollaboratorError> {
        let guard = self
            .timeout
            .arm_interrupt(self.connection.get_interrupt_handle());
        let result = self.run_query(query_text);
        debug!(
            dataset = %self.dataset_id,
            duration_ms = guard.elapsed_ms(),
            ok = result.is_ok(),
            "query executed"
        );
        result
    }
}

/// Maps SQLite failures onto the collaborator taxonomy; unclassified errors use `fallback`.
pub fn classify_sqlite_error(
    error: rusqlite::Error,
    operation: &str,
    timeout: CallTimeout,
    fallback: fn(String) -> CollaboratorError,
) -> CollaboratorError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &error {
        match failure.code {
            ErrorCode::OperationInterrupted => return timeout.timed_out(operation),
            ErrorCode::PermissionDenied | ErrorCode::AuthorizationForStatementDenied => {
                return CollaboratorError::Credential(format!("{operation}: {error}"));
            }
            ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::SystemIoFailure => {
                return CollaboratorError::Connection(format!("{operation}: {error}"));
            }
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                return CollaboratorError::Execution(format!("{operation}: {error}"));
            }
            _ => {}
        }
    }

    fallback(error.to_string())
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn owned_column_names(statement: &rusqlite::Statement<'_>) -> Vec<String> {
    let mut names = Vec::<String>::new();
    for name in statement.column_names() {
        let mut key = name.to_string();
        let mut suffix = 1usize;
        while names.contains(&key) {
            key = format!("{name}:{suffix}");
            suffix += 1;
        }
        names.push(key);
    }
    names
}

fn read_row(row: &rusqlite::Row<'_>, column_names: &[String]) -> rusqlite::Result<ResultRow> {
    let mut values = ResultRow::new();
    for (index, name) in column_names.iter().enumerate() {
        values.insert(name.clone(), value_to_json(row.get_ref(index)?));
    }
    Ok(values)
}

pub fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(number) => Value::from(number),
        ValueRef::Real(number) => serde_json::Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<blob {} bytes>", bytes.len())),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;

    use super::*;

    pub(crate) fn car_fixture() -> Connection {
        let connection = Connection::open_in_memory().expect("in-memory db should open");
        connection
            .execute_batch(
                "
                CREATE TABLE cars (
                  car_id INTEGER PRIMARY KEY,
                  model TEXT NOT NULL,
                  model_year INTEGER NOT NULL,
                  status TEXT
                );
                CREATE TABLE loans (
                  loan_id INTEGER PRIMARY KEY,
                  car_id INTEGER NOT NULL REFERENCES cars(car_id),
                  monthly_payment REAL NOT NULL
                );
                INSERT INTO cars VALUES (1, 'Civic', 2019, 'sold');
                INSERT INTO cars VALUES (2, 'Model 3', 2021, 'available');
                INSERT INTO cars VALUES (3, 'Corolla', 2022, 'pending');
                INSERT INTO cars VALUES (4, 'Accord', 2020, 'available');
                INSERT INTO loans VALUES (10, 1, 156.23);
                INSERT INTO loans VALUES (11, 2, 520.0);
                INSERT INTO loans VALUES (12, 3, 430.0);
                INSERT INTO loans VALUES (13, 4, 467.5);
                ",
            )
            .expect("fixture should load");
        connection
    }

    pub(crate) fn car_store() -> SqliteDataStore {
        SqliteDataStore::from_connection("car_1", car_fixture(), CallTimeout::from_millis(5_000))
    }

    #[test]
    fn fetch_schema_lists_tables_and_nullability() {
        let schema = car_store().fetch_schema().expect("schema should load");
        assert_eq!(schema.dataset_id, "car_1");
        assert_eq!(schema.table_names(), vec!["cars", "loans"]);

        let cars = &schema.tables[0];
        assert_eq!(cars.columns.len(), 4);
        assert_eq!(cars.columns[0].name, "car_id");
        assert!(!cars.columns[0].nullable);
        assert!(!cars.columns[1].nullable);
        assert!(cars.columns[3].nullable);
        assert_eq!(cars.columns[3].data_type, "TEXT");
    }

    #[test]
    fn fetch_samples_respects_row_limit_and_counts_rows() {
        let store = car_store();
        let samples = store
            .fetch_samples(&["cars".to_string()], 2)
            .expect("samples should load");
        let cars = samples.tables.get("cars").expect("cars sample");
        assert_eq!(cars.rows.len(), 2);
        assert_eq!(cars.approximate_row_count, 4);
        assert_eq!(cars.rows[0].get("model"), Some(&json!("Civic")));
    }

    #[test]
    fn execute_query_returns_rows_in_engine_order() {
        let result = car_store()
            .execute_query("SELECT car_id, model FROM cars WHERE model_year >= 2021 ORDER BY car_id")
            .expect("query should run");
        assert_eq!(result.len(), 2);
        assert_eq!(result.rows[0].get("car_id"), Some(&json!(2)));
        assert_eq!(result.rows[1].get("model"), Some(&json!("Corolla")));
    }

    #[test]
    fn execute_query_disambiguates_duplicate_column_names() {
        let result = car_store()
            .execute_query("SELECT c.car_id, l.car_id FROM cars c JOIN loans l ON l.car_id = c.car_id LIMIT 1")
            .expect("join should run");
        let row = &result.rows[0];
        assert!(row.contains_key("car_id"));
        assert!(row.contains_key("car_id:1"));
    }

    #[test]
    fn execute_query_reports_execution_errors() {
        let error = car_store()
            .execute_query("SELECT price FROM cars")
            .expect_err("unknown column should fail");
        match error {
            CollaboratorError::Execution(message) => {
                assert!(message.contains("price"), "unexpected message: {message}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn execute_query_rejects_writes() {
        let error = car_store()
            .execute_query("DELETE FROM cars")
            .expect_err("writes should be rejected");
        assert_eq!(
            error,
            CollaboratorError::Execution("only read-only queries can be evaluated".to_string())
        );
    }

    #[test]
    fn connector_reports_missing_dataset_as_connection_error() {
        let connector = SqliteConnector::new("/nonexistent/data-root", CallTimeout::disabled());
        let error = connector
            .connect("car_1")
            .err()
            .expect("missing dataset should fail");
        assert!(matches!(error, CollaboratorError::Connection(_)));
        assert!(error.is_fatal());
    }

    #[test]
    fn held_writer_lock_fails_the_query_within_budget() {
        let root = std::env::temp_dir().join(format!("annoteval-locked-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).expect("scratch dir");
        let db_path = root.join("locked.sqlite");

        let writer = Connection::open(&db_path).expect("writer should open");
        writer
            .execute_batch("CREATE TABLE t (a INTEGER); INSERT INTO t VALUES (1); BEGIN EXCLUSIVE;")
            .expect("writer should take the lock");

        let store = SqliteDataStore::open("locked", &db_path, CallTimeout::from_millis(200))
            .expect("read-only open does not lock");
        let started = std::time::Instant::now();
        let error = store
            .execute_query("SELECT a FROM t")
            .expect_err("locked database should fail the query");

        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        assert!(!error.is_fatal(), "lock wait treated as fatal: {error:?}");
        assert!(!matches!(error, CollaboratorError::Connection(_)));

        writer.execute_batch("ROLLBACK;").expect("release lock");
        drop(writer);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn quote_identifier_escapes_embedded_quotes() {
        assert_eq!(quote_identifier("order"), "\"order\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
