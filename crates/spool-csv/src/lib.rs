//! CSV dataset handlers for Spool's built-in table frame.
//!
//! Registers an encoder/decoder pair for [`Table`] under the `"csv"` storage
//! format. CSV is flat: cells must be primitives, and decoded cells parse
//! against the column types named in the dataset literal (untyped columns
//! stay strings).

use spool_core::context::TransformContext;
use spool_core::dataset::{DatasetDecoder, DatasetEncoder, DatasetEngine, StructuredDataset};
use spool_core::error::TransformError;
use spool_core::literal::{DatasetLiteral, DatasetMetadata};
use spool_core::native::NativeValue;
use spool_core::storage::StorageError;
use spool_core::table::Table;
use spool_core::types::{
    DatasetColumn, LiteralType, SimpleType, StructuredDatasetType, TypeKind,
};
use std::any::TypeId;
use std::fs;
use std::sync::Arc;

/// Storage format tag for comma-separated values.
pub const CSV: &str = "csv";

/// Register the CSV pair into a dataset engine.
pub fn register_all(engine: &mut DatasetEngine) -> Result<(), TransformError> {
    engine.register_encoder(Arc::new(TableCsvEncoder), false)?;
    engine.register_decoder(Arc::new(TableCsvDecoder), false)?;
    Ok(())
}

fn cell_to_string(value: &NativeValue) -> Result<String, TransformError> {
    Ok(match value {
        NativeValue::None => String::new(),
        NativeValue::Bool(v) => v.to_string(),
        NativeValue::Int(v) => v.to_string(),
        NativeValue::Float(v) => v.to_string(),
        NativeValue::Str(v) => v.clone(),
        NativeValue::Datetime(v) => v.to_string(),
        NativeValue::Duration(v) => v.to_string(),
        other => {
            return Err(TransformError::InvalidValue(format!(
                "csv cells must be primitives, got {}",
                other.kind_name()
            )));
        }
    })
}

fn cell_from_string(text: &str, column_type: Option<&LiteralType>) -> Result<NativeValue, TransformError> {
    let Some(lt) = column_type else {
        return Ok(NativeValue::Str(text.to_string()));
    };
    let TypeKind::Simple(simple) = &lt.kind else {
        return Ok(NativeValue::Str(text.to_string()));
    };
    if text.is_empty() && *simple != SimpleType::Str {
        return Ok(NativeValue::None);
    }
    match simple {
        SimpleType::Int => text
            .parse()
            .map(NativeValue::Int)
            .map_err(|_| TransformError::mismatch("int", text)),
        SimpleType::Float => text
            .parse()
            .map(NativeValue::Float)
            .map_err(|_| TransformError::mismatch("float", text)),
        SimpleType::Bool => text
            .parse()
            .map(NativeValue::Bool)
            .map_err(|_| TransformError::mismatch("bool", text)),
        SimpleType::Datetime => text
            .parse()
            .map(NativeValue::Datetime)
            .map_err(|_| TransformError::mismatch("datetime", text)),
        SimpleType::Duration => text
            .parse()
            .map(NativeValue::Duration)
            .map_err(|_| TransformError::mismatch("duration", text)),
        _ => Ok(NativeValue::Str(text.to_string())),
    }
}

/// Encoder: `Table` → CSV bytes in storage.
pub struct TableCsvEncoder;

impl DatasetEncoder for TableCsvEncoder {
    fn frame_type(&self) -> TypeId {
        TypeId::of::<Table>()
    }

    fn frame_name(&self) -> &'static str {
        "Table"
    }

    fn format(&self) -> &str {
        CSV
    }

    fn encode(
        &self,
        ctx: &TransformContext,
        dataset: &StructuredDataset,
        requested: &StructuredDatasetType,
    ) -> Result<DatasetLiteral, TransformError> {
        let frame = dataset
            .frame()
            .ok_or_else(|| TransformError::InvalidValue("dataset has no frame".into()))?;
        let table: &Table = frame
            .downcast_ref()
            .ok_or_else(|| TransformError::mismatch("Table", frame.type_name()))?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(table.columns())
            .map_err(|e| TransformError::Serialization(e.to_string()))?;
        for row in table.rows() {
            let mut record = Vec::with_capacity(row.len());
            for value in row {
                record.push(cell_to_string(value)?);
            }
            writer
                .write_record(&record)
                .map_err(|e| TransformError::Serialization(e.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| TransformError::Serialization(e.to_string()))?;

        let access = ctx.file_access();
        let staged = access.random_local_path();
        if let Some(parent) = staged.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StorageError::io(parent.display().to_string(), e))?;
        }
        fs::write(&staged, bytes)
            .map_err(|e| StorageError::io(staged.display().to_string(), e))?;
        let uri = match dataset.uri() {
            Some(dest) => access.put_data(&staged, dest, false)?,
            None => access.put_raw_data(&staged)?,
        };

        let columns = if requested.columns.is_empty() {
            table
                .columns()
                .iter()
                .map(|name| DatasetColumn::new(name.clone(), LiteralType::string()))
                .collect()
        } else {
            requested.columns.clone()
        };
        Ok(DatasetLiteral {
            uri,
            metadata: DatasetMetadata {
                dataset_type: StructuredDatasetType::new(columns, CSV),
            },
        })
    }
}

/// Decoder: CSV bytes in storage → `Table`, with column projection.
pub struct TableCsvDecoder;

impl DatasetDecoder for TableCsvDecoder {
    fn frame_type(&self) -> TypeId {
        TypeId::of::<Table>()
    }

    fn frame_name(&self) -> &'static str {
        "Table"
    }

    fn format(&self) -> &str {
        CSV
    }

    fn decode(
        &self,
        ctx: &TransformContext,
        literal: &DatasetLiteral,
        metadata: &DatasetMetadata,
    ) -> Result<Box<dyn std::any::Any + Send + Sync>, TransformError> {
        let access = ctx.file_access();
        let local = if access.is_remote(&literal.uri) {
            let staged = access.random_local_path();
            access.get_data(&literal.uri, &staged, false)?;
            staged
        } else {
            literal.uri.clone().into()
        };
        let mut reader = csv::Reader::from_path(&local)
            .map_err(|e| TransformError::Serialization(e.to_string()))?;
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| TransformError::Serialization(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        // The metadata's column list is the selection: indices into the
        // stored header row, in selection order.
        let selection = &metadata.dataset_type.columns;
        let (names, indices): (Vec<String>, Vec<usize>) = if selection.is_empty() {
            (headers.clone(), (0..headers.len()).collect())
        } else {
            let mut names = Vec::with_capacity(selection.len());
            let mut indices = Vec::with_capacity(selection.len());
            for column in selection {
                let index = headers.iter().position(|h| *h == column.name).ok_or_else(|| {
                    TransformError::InvalidValue(format!("no column named {}", column.name))
                })?;
                names.push(column.name.clone());
                indices.push(index);
            }
            (names, indices)
        };

        let mut table = Table::new(names);
        for record in reader.records() {
            let record = record.map_err(|e| TransformError::Serialization(e.to_string()))?;
            let mut row = Vec::with_capacity(indices.len());
            for (slot, index) in indices.iter().enumerate() {
                let text = record.get(*index).unwrap_or("");
                let column_type = selection.get(slot).map(|c| &c.literal_type);
                row.push(cell_from_string(text, column_type)?);
            }
            table.push_row(row)?;
        }
        Ok(Box::new(table))
    }
}
