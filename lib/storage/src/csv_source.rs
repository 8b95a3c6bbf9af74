// Delimited-text record source (the exported design list)
use anyhow::{Context, Result};
use moldrec_core::{Column, DesignRecord, Error, RecordSource, RecordTable};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const BOM: char = '\u{feff}';

/// Records stored in a CSV file with a header row.
///
/// Columns are matched by header name (see [`Column::from_header`]); unknown
/// headers are ignored and absent ones read as empty.
pub struct CsvSource {
    path: PathBuf,
    delimiter: u8,
    // serializes reads against appends
    write_lock: Mutex<()>,
}

impl CsvSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            delimiter: b',',
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_raw(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).with_context(|| format!("Failed to read {}", self.path.display()))
    }

    /// Whole file as stored, never in the middle of an append.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        let _guard = self.write_lock.lock();
        self.read_raw()
    }

    fn read_text(&self) -> Result<String> {
        let bytes = self.read_raw()?;
        let text = String::from_utf8(bytes)
            .with_context(|| format!("{} is not valid UTF-8", self.path.display()))?;
        Ok(match text.strip_prefix(BOM) {
            Some(rest) => rest.to_string(),
            None => text,
        })
    }

    fn reader<'a>(&self, text: &'a str) -> csv::Reader<&'a [u8]> {
        csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(text.as_bytes())
    }

    /// Header cells of the file, or `None` when the file is absent or empty.
    pub fn read_headers(&self) -> Result<Option<Vec<String>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = self.read_text()?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        let mut reader = self.reader(&text);
        let headers = reader.headers().context("Failed to read CSV headers")?;
        Ok(Some(headers.iter().map(str::to_string).collect()))
    }

    /// Read every row in file order.
    pub fn read_records(&self) -> Result<Vec<DesignRecord>> {
        let text = {
            let _guard = self.write_lock.lock();
            self.read_text()?
        };
        let mut reader = self.reader(&text);

        let columns: Vec<Option<Column>> = reader
            .headers()
            .context("Failed to read CSV headers")?
            .iter()
            .map(Column::from_header)
            .collect();

        let missing: Vec<&str> = Column::ALL
            .iter()
            .filter(|c| !columns.contains(&Some(**c)))
            .map(|c| c.header())
            .collect();
        if !missing.is_empty() {
            tracing::debug!(?missing, "CSV is missing columns, reading them as empty");
        }

        let mut records = Vec::new();
        for (line, row) in reader.records().enumerate() {
            // +2: header row and 1-based numbering
            let row = row.with_context(|| format!("Malformed CSV row {}", line + 2))?;
            let mut record = DesignRecord::default();
            for (cell, column) in row.iter().zip(&columns) {
                if let Some(column) = column {
                    record.set(*column, Some(cell));
                }
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Append one record as a new row. The row follows the file's own header
    /// order; a missing file is created with the full header first.
    pub fn append_record(&self, record: &DesignRecord) -> Result<()> {
        let _guard = self.write_lock.lock();

        let headers = match self.read_headers()? {
            Some(h) => h,
            None => {
                let headers: Vec<String> =
                    Column::ALL.iter().map(|c| c.header().to_string()).collect();
                let mut writer = csv::WriterBuilder::new()
                    .delimiter(self.delimiter)
                    .from_path(&self.path)
                    .with_context(|| format!("Failed to create {}", self.path.display()))?;
                writer.write_record(&headers)?;
                writer.flush()?;
                headers
            }
        };

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {} for append", self.path.display()))?;

        if !ends_with_newline(&mut file)? {
            file.write_all(b"\n")?;
        }

        let row: Vec<&str> = headers
            .iter()
            .map(|h| {
                Column::from_header(h)
                    .and_then(|c| record.get(c))
                    .unwrap_or("")
            })
            .collect();

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .from_writer(file);
        writer.write_record(&row)?;
        writer.flush()?;
        Ok(())
    }
}

fn ends_with_newline(file: &mut fs::File) -> Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

impl RecordSource for CsvSource {
    fn load(&self) -> moldrec_core::Result<RecordTable> {
        self.read_records()
            .map(RecordTable::new)
            .map_err(|e| Error::Csv(format!("{:#}", e)))
    }

    fn append(&self, record: &DesignRecord) -> moldrec_core::Result<()> {
        self.append_record(record)
            .map_err(|e| Error::Csv(format!("{:#}", e)))
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    fn file_path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn read_file(&self) -> Option<moldrec_core::Result<Vec<u8>>> {
        Some(self.read_bytes().map_err(|e| Error::Csv(format!("{:#}", e))))
    }
}
