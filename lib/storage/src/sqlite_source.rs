// Relational record source backed by a SQLite table
use anyhow::{anyhow, Context, Result};
use moldrec_core::{Column, DesignRecord, Error, RecordSource, RecordTable};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::path::{Path, PathBuf};

use crate::csv_source::CsvSource;

pub const DEFAULT_TABLE: &str = "designs";

/// Records stored one per row in a SQLite table, scanned in rowid order.
pub struct SqliteSource {
    path: PathBuf,
    table: String,
    conn: Mutex<Connection>,
}

fn validate_table_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(anyhow!("Invalid table name: {:?}", name))
    }
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}

impl SqliteSource {
    /// Open (or create) the database file and make sure the table exists.
    pub fn open<P: AsRef<Path>>(path: P, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        let source = Self {
            path,
            table: table.to_string(),
            conn: Mutex::new(conn),
        };
        source.ensure_schema()?;
        Ok(source)
    }

    /// In-memory database, mostly for tests.
    pub fn open_in_memory(table: &str) -> Result<Self> {
        validate_table_name(table)?;
        let source = Self {
            path: PathBuf::from(":memory:"),
            table: table.to_string(),
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        source.ensure_schema()?;
        Ok(source)
    }

    #[inline]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the table when it does not exist yet. An existing table is
    /// left alone even if it lacks some columns.
    pub fn ensure_schema(&self) -> Result<()> {
        let columns: Vec<String> = Column::ALL
            .iter()
            .map(|c| format!("\"{}\" TEXT", c.db_name()))
            .collect();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (id INTEGER PRIMARY KEY AUTOINCREMENT, {})",
            self.table,
            columns.join(", ")
        );
        self.conn.lock().execute_batch(&sql)?;
        Ok(())
    }

    /// Known columns present in `table`, with the name they carry there.
    /// Tables created by older loaders use the export headers (`제번`, ...)
    /// instead of the ASCII names; both are accepted.
    fn existing_columns(conn: &Connection, table: &str) -> Result<Vec<(Column, String)>> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Column::ALL
            .into_iter()
            .filter_map(|c| {
                names
                    .iter()
                    .find(|n| n.eq_ignore_ascii_case(c.db_name()) || n.eq_ignore_ascii_case(c.header()))
                    .map(|n| (c, n.clone()))
            })
            .collect())
    }

    fn known_columns(conn: &Connection, table: &str) -> Result<Vec<(Column, String)>> {
        let columns = Self::existing_columns(conn, table)?;
        if columns.is_empty() {
            return Err(anyhow!("Table {} does not exist or has no known columns", table));
        }
        Ok(columns)
    }

    /// Scan the whole table in insertion order.
    pub fn read_records(&self) -> Result<Vec<DesignRecord>> {
        let conn = self.conn.lock();
        let columns = Self::known_columns(&conn, &self.table)?;
        if columns.len() < Column::ALL.len() {
            tracing::debug!(
                table = %self.table,
                found = columns.len(),
                "Table is missing columns, reading them as empty"
            );
        }

        let select: Vec<String> = columns.iter().map(|(_, name)| format!("\"{}\"", name)).collect();
        let sql = format!(
            "SELECT {} FROM \"{}\" ORDER BY rowid",
            select.join(", "),
            self.table
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            let mut record = DesignRecord::default();
            for (i, (column, _)) in columns.iter().enumerate() {
                let value = value_to_text(row.get::<_, Value>(i)?);
                record.set(*column, value.as_deref());
            }
            Ok(record)
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to scan table {}", self.table))
    }

    fn insert_sql(&self, columns: &[(Column, String)]) -> String {
        let names: Vec<String> = columns.iter().map(|(_, name)| format!("\"{}\"", name)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            self.table,
            names.join(", "),
            placeholders.join(", ")
        )
    }

    fn row_values(columns: &[(Column, String)], record: &DesignRecord) -> Vec<Option<String>> {
        columns
            .iter()
            .map(|(c, _)| record.get(*c).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()))
            .collect()
    }

    pub fn insert_record(&self, record: &DesignRecord) -> Result<()> {
        let conn = self.conn.lock();
        let columns = Self::known_columns(&conn, &self.table)?;
        conn.execute(&self.insert_sql(&columns), params_from_iter(Self::row_values(&columns, record)))?;
        Ok(())
    }

    /// Bulk-load a CSV export into the table in one transaction.
    ///
    /// Either every row is inserted or none is. `batch_size` only controls
    /// how often progress is logged. Returns the number of inserted rows.
    pub fn import_csv<P: AsRef<Path>>(&self, csv_path: P, batch_size: usize) -> Result<usize> {
        let records = CsvSource::new(csv_path.as_ref()).read_records()?;
        let batch_size = batch_size.max(1);

        let mut conn = self.conn.lock();
        let columns = Self::known_columns(&conn, &self.table)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&self.insert_sql(&columns))?;
            for (i, record) in records.iter().enumerate() {
                stmt.execute(params_from_iter(Self::row_values(&columns, record)))
                    .with_context(|| format!("Failed to insert CSV row {}", i + 2))?;
                if (i + 1) % batch_size == 0 {
                    tracing::debug!(inserted = i + 1, total = records.len(), "Import progress");
                }
            }
        }
        tx.commit()?;

        tracing::info!(
            rows = records.len(),
            table = %self.table,
            "Imported {}",
            csv_path.as_ref().display()
        );
        Ok(records.len())
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", self.table), [], |r| r.get(0))?;
        Ok(n as usize)
    }
}

impl RecordSource for SqliteSource {
    fn load(&self) -> moldrec_core::Result<RecordTable> {
        self.read_records()
            .map(RecordTable::new)
            .map_err(|e| Error::Database(format!("{:#}", e)))
    }

    fn append(&self, record: &DesignRecord) -> moldrec_core::Result<()> {
        self.insert_record(record)
            .map_err(|e| Error::Database(format!("{:#}", e)))
    }

    fn describe(&self) -> String {
        format!("sqlite:{}#{}", self.path.display(), self.table)
    }
}
