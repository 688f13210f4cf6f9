use crate::dto::DataFile;
use crate::error::ServiceError;
use crate::model::{AttributedRecord, RecordCollection};
use csv::{ReaderBuilder, Trim};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// Reads records from a CSV file with a header row.
///
/// The id column names each record; every other column becomes an attribute.
/// A cell holding several values joined by the separator is split into
/// separate values of the same attribute.
#[derive(Clone, Debug)]
pub struct CsvRecordLoader {
    id_column: String,
    value_separator: char,
}

impl CsvRecordLoader {
    pub fn new(id_column: &str, value_separator: char) -> Self {
        Self {
            id_column: id_column.to_string(),
            value_separator,
        }
    }

    pub fn from_data_file(data: &DataFile) -> Self {
        Self::new(&data.id_column, data.value_separator)
    }

    pub fn load_file(&self, path: &Path) -> Result<RecordCollection, ServiceError> {
        let start = std::time::Instant::now();
        let file = std::fs::File::open(path).map_err(|err| {
            ServiceError::not_found(format!("input file {}: {}", path.display(), err))
        })?;
        let collection = self.load_reader(file)?;
        if collection.is_empty() {
            warn!(path = %path.display(), "no records found in input file");
        }
        info!(
            path = %path.display(),
            records = collection.len(),
            "File loaded in {:.4} secs",
            start.elapsed().as_secs_f64()
        );
        Ok(collection)
    }

    pub fn load_reader<R: Read>(&self, reader: R) -> Result<RecordCollection, ServiceError> {
        let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
        let headers = reader.headers()?.clone();
        let id_index = headers
            .iter()
            .position(|name| name == self.id_column)
            .ok_or_else(|| {
                ServiceError::configuration(format!(
                    "file must contain an id column '{}'",
                    self.id_column
                ))
            })?;
        let mut collection = RecordCollection::new();
        for row in reader.records() {
            let row = row?;
            let id = row.get(id_index).unwrap_or_default();
            if id.is_empty() {
                let line = row.position().map_or(0, |pos| pos.line());
                warn!(line, "skipping row without an id");
                continue;
            }
            let mut record = AttributedRecord::new(id);
            for (index, (name, cell)) in headers.iter().zip(row.iter()).enumerate() {
                if index == id_index {
                    continue;
                }
                for value in cell.split(self.value_separator) {
                    record.add_attribute(name, value);
                }
            }
            collection.insert(record);
        }
        Ok(collection)
    }
}
