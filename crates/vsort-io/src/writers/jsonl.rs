//! Streaming NDJSON writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::{Map, Value};
use vsort_core::prelude::{Block, Scalar};

use crate::error::Result;

pub struct JsonlWriter<W: Write> {
    writer: BufWriter<W>,
    // header order to keep column ordering stable across batches
    columns: Vec<String>,
    rows_written: usize,
}

impl JsonlWriter<File> {
    pub fn to_path(path: impl AsRef<Path>, columns: Option<Vec<String>>) -> Result<Self> {
        let f = File::create(path)?;
        Ok(Self::to_writer(f, columns))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn to_writer(writer: W, columns: Option<Vec<String>>) -> Self {
        Self {
            writer: BufWriter::new(writer),
            columns: columns.unwrap_or_default(),
            rows_written: 0,
        }
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Write a block as one JSON object per line.
    /// If `columns` was empty, take the names from the first block.
    pub fn write_block(&mut self, block: &Block) -> Result<()> {
        if self.columns.is_empty() {
            self.columns = block.columns.iter().map(|c| c.name.clone()).collect();
        }
        for r in 0..block.num_rows() {
            let mut obj = Map::with_capacity(self.columns.len());
            for (name, col) in self.columns.iter().zip(&block.columns) {
                obj.insert(name.clone(), scalar_to_json(&col.values[r]));
            }
            serde_json::to_writer(&mut self.writer, &Value::Object(obj))?;
            self.writer.write_all(b"\n")?;
        }
        self.rows_written += block.num_rows();
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| crate::error::Error::Io(e.into_error()))
    }
}

fn scalar_to_json(v: &Scalar) -> Value {
    use Scalar::*;
    match v {
        Null => Value::Null,
        Bool(b) => Value::Bool(*b),
        I32(i) => Value::from(*i),
        I64(i) => Value::from(*i),
        F32(f) => Value::from(*f as f64),
        F64(f) => Value::from(*f),
        Str(s) => Value::String(s.clone()),
        Bin(b) => Value::String(b.iter().map(|byte| format!("{byte:02x}")).collect()),
    }
}
