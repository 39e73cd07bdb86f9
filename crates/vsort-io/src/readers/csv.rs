//! CSV files decoded into typed `Block`s.
//!
//! The first line is the header. Unless a schema is supplied, column types
//! are inferred from the first batch: a column is `Int64` if every non-empty
//! value parses as an integer, `Float64` if every value parses as a number,
//! `Boolean` for `true`/`false`, and `Utf8` otherwise. Empty fields are null.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use vsort_core::prelude::{Block, Column, DataType, Field, Scalar, Schema};

use crate::error::{Error, Result};

pub struct CsvBlockReader<R: Read> {
    reader: csv::Reader<R>,
    schema: Schema,
    batch_rows: usize,
    /// Records read ahead for type inference, not yet emitted.
    pending: Vec<csv::StringRecord>,
    done: bool,
}

impl CsvBlockReader<File> {
    pub fn from_path(path: impl AsRef<Path>, batch_rows: usize) -> Result<Self> {
        Self::new(File::open(path)?, batch_rows)
    }
}

impl<R: Read> CsvBlockReader<R> {
    /// Read the header and infer column types from the first batch.
    pub fn new(input: R, batch_rows: usize) -> Result<Self> {
        let batch_rows = check_batch_rows(batch_rows)?;
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(input);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut pending = Vec::with_capacity(batch_rows);
        let mut done = false;
        while pending.len() < batch_rows {
            let mut rec = csv::StringRecord::new();
            if !reader.read_record(&mut rec)? {
                done = true;
                break;
            }
            pending.push(rec);
        }

        let fields = headers
            .iter()
            .enumerate()
            .map(|(i, name)| Field::new(name.clone(), infer_type(&pending, i), true))
            .collect();
        Ok(Self {
            reader,
            schema: Schema::new(fields),
            batch_rows,
            pending,
            done,
        })
    }

    /// Decode with a known schema; header names must match it.
    pub fn with_schema(input: R, schema: Schema, batch_rows: usize) -> Result<Self> {
        let batch_rows = check_batch_rows(batch_rows)?;
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(input);
        let headers = reader.headers()?;
        let names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        if headers.iter().ne(names.iter().copied()) {
            return Err(Error::Core(vsort_core::Error::Schema(format!(
                "csv header {:?} does not match schema {names:?}",
                headers.iter().collect::<Vec<_>>()
            ))));
        }
        Ok(Self {
            reader,
            schema,
            batch_rows,
            pending: Vec::new(),
            done: false,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Next batch of up to `batch_rows` rows, `None` at end of file.
    pub fn next_block(&mut self) -> Result<Option<Block>> {
        let mut records = std::mem::take(&mut self.pending);
        while !self.done && records.len() < self.batch_rows {
            let mut rec = csv::StringRecord::new();
            if !self.reader.read_record(&mut rec)? {
                self.done = true;
                break;
            }
            records.push(rec);
        }
        if records.is_empty() {
            return Ok(None);
        }
        self.decode(&records).map(Some)
    }

    fn decode(&self, records: &[csv::StringRecord]) -> Result<Block> {
        let mut columns: Vec<Column> = self
            .schema
            .fields
            .iter()
            .map(|f| Column::new(f.name.clone(), Vec::with_capacity(records.len())))
            .collect();
        for rec in records {
            let line = rec.position().map_or(0, |p| p.line());
            for (i, (field, column)) in self.schema.fields.iter().zip(columns.iter_mut()).enumerate() {
                let raw = rec.get(i).unwrap_or("");
                column.values.push(parse_value(raw, field, line)?);
            }
        }
        Ok(Block::try_new(columns)?)
    }
}

impl<R: Read> Iterator for CsvBlockReader<R> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_block().transpose()
    }
}

fn check_batch_rows(batch_rows: usize) -> Result<usize> {
    if batch_rows == 0 {
        return Err(Error::Config("batch_rows must be positive".into()));
    }
    Ok(batch_rows)
}

fn infer_type(records: &[csv::StringRecord], idx: usize) -> DataType {
    let values = || {
        records
            .iter()
            .filter_map(move |r| r.get(idx))
            .filter(|v| !v.is_empty())
    };
    if values().next().is_none() {
        return DataType::Utf8;
    }
    if values().all(|v| v.parse::<i64>().is_ok()) {
        DataType::Int64
    } else if values().all(|v| v.parse::<f64>().is_ok()) {
        DataType::Float64
    } else if values().all(|v| v == "true" || v == "false") {
        DataType::Boolean
    } else {
        DataType::Utf8
    }
}

fn parse_value(raw: &str, field: &Field, line: u64) -> Result<Scalar> {
    if raw.is_empty() {
        return Ok(Scalar::Null);
    }
    let err = |message: String| Error::Parse {
        line,
        column: field.name.clone(),
        message,
    };
    let value = match field.data_type {
        DataType::Boolean => match raw {
            "true" => Scalar::Bool(true),
            "false" => Scalar::Bool(false),
            other => return Err(err(format!("'{other}' is not a boolean"))),
        },
        DataType::Int32 => Scalar::I32(raw.parse().map_err(|e| err(format!("'{raw}': {e}")))?),
        DataType::Int64 => Scalar::I64(raw.parse().map_err(|e| err(format!("'{raw}': {e}")))?),
        DataType::Float32 => Scalar::F32(raw.parse().map_err(|e| err(format!("'{raw}': {e}")))?),
        DataType::Float64 => Scalar::F64(raw.parse().map_err(|e| err(format!("'{raw}': {e}")))?),
        DataType::Utf8 => Scalar::Str(raw.to_string()),
        DataType::Binary => Scalar::Bin(raw.as_bytes().to_vec()),
    };
    Ok(value)
}
