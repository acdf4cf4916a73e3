//! The built-in tabular frame and its NDJSON handlers.

use crate::builtin::write_bytes;
use crate::context::TransformContext;
use crate::dataset::{DatasetDecoder, DatasetEncoder, Frame, FrameRenderer, StructuredDataset};
use crate::error::TransformError;
use crate::literal::{DatasetLiteral, DatasetMetadata};
use crate::native::NativeValue;
use crate::storage::StorageError;
use crate::types::{DatasetColumn, LiteralType, SimpleType, StructuredDatasetType, TypeKind};
use serde_json::Value as JsonValue;
use std::any::{Any, TypeId};
use std::fs;

/// Storage format tag for newline-delimited JSON.
pub const NDJSON: &str = "ndjson";

/// A small, ordered, row-oriented table.
///
/// Deliberately minimal: it exists so the dataset machinery has a concrete
/// frame to negotiate over without pulling in a dataframe stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<NativeValue>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<NativeValue>) -> Result<(), TransformError> {
        if row.len() != self.columns.len() {
            return Err(TransformError::InvalidValue(format!(
                "row has {} values, table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<NativeValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// A copy narrowed to the named columns, in the requested order.
    pub fn project(&self, names: &[&str]) -> Result<Table, TransformError> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let index = self.column_index(name).ok_or_else(|| {
                TransformError::InvalidValue(format!("no column named {name}"))
            })?;
            indices.push(index);
        }
        let mut projected = Table::new(names.iter().map(|n| n.to_string()).collect());
        for row in &self.rows {
            let narrowed = indices.iter().map(|&i| row[i].clone()).collect();
            projected.rows.push(narrowed);
        }
        Ok(projected)
    }

    /// Serialize as newline-delimited JSON objects.
    pub fn to_ndjson(&self) -> Result<String, TransformError> {
        let mut out = String::new();
        for row in &self.rows {
            let mut object = serde_json::Map::new();
            for (column, value) in self.columns.iter().zip(row) {
                object.insert(column.clone(), value.to_json()?);
            }
            let line = serde_json::to_string(&JsonValue::Object(object))
                .map_err(|e| TransformError::Serialization(e.to_string()))?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }

    /// Parse newline-delimited JSON, optionally guided by a column schema.
    ///
    /// When `columns` is non-empty it also acts as a projection: only the
    /// named columns are kept, in that order.
    pub fn from_ndjson(
        text: &str,
        columns: &[DatasetColumn],
    ) -> Result<Table, TransformError> {
        let mut parsed_rows: Vec<serde_json::Map<String, JsonValue>> = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(JsonValue::Object(object)) => parsed_rows.push(object),
                Ok(other) => {
                    return Err(TransformError::Serialization(format!(
                        "expected object rows, got {other}"
                    )));
                }
                Err(e) => return Err(TransformError::Serialization(e.to_string())),
            }
        }

        let names: Vec<String> = if columns.is_empty() {
            match parsed_rows.first() {
                Some(first) => first.keys().cloned().collect(),
                None => Vec::new(),
            }
        } else {
            columns.iter().map(|c| c.name.clone()).collect()
        };

        let mut table = Table::new(names.clone());
        for object in parsed_rows {
            let mut row = Vec::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                let json = object.get(name).unwrap_or(&JsonValue::Null);
                let column_type = columns.get(i).map(|c| &c.literal_type);
                row.push(cell_from_json(json, column_type)?);
            }
            table.rows.push(row);
        }
        Ok(table)
    }
}

/// Best-effort JSON → value conversion, honoring a column's literal type
/// when one is declared.
fn cell_from_json(
    json: &JsonValue,
    column_type: Option<&LiteralType>,
) -> Result<NativeValue, TransformError> {
    if let Some(lt) = column_type {
        if let TypeKind::Simple(simple) = &lt.kind {
            return typed_cell(json, *simple);
        }
    }
    Ok(untyped_cell(json))
}

fn typed_cell(json: &JsonValue, simple: SimpleType) -> Result<NativeValue, TransformError> {
    if json.is_null() {
        return Ok(NativeValue::None);
    }
    match simple {
        SimpleType::Int => json
            .as_i64()
            .map(NativeValue::Int)
            .ok_or_else(|| TransformError::mismatch("int", json)),
        SimpleType::Float => json
            .as_f64()
            .map(NativeValue::Float)
            .ok_or_else(|| TransformError::mismatch("float", json)),
        SimpleType::Bool => json
            .as_bool()
            .map(NativeValue::Bool)
            .ok_or_else(|| TransformError::mismatch("bool", json)),
        SimpleType::Str => json
            .as_str()
            .map(|s| NativeValue::Str(s.to_string()))
            .ok_or_else(|| TransformError::mismatch("str", json)),
        SimpleType::Datetime => json
            .as_str()
            .and_then(|s| s.parse().ok())
            .map(NativeValue::Datetime)
            .ok_or_else(|| TransformError::mismatch("datetime", json)),
        SimpleType::Duration => json
            .as_str()
            .and_then(|s| s.parse().ok())
            .map(NativeValue::Duration)
            .ok_or_else(|| TransformError::mismatch("duration", json)),
        _ => Ok(untyped_cell(json)),
    }
}

fn untyped_cell(json: &JsonValue) -> NativeValue {
    match json {
        JsonValue::Null => NativeValue::None,
        JsonValue::Bool(b) => NativeValue::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(v) => NativeValue::Int(v),
            None => NativeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => NativeValue::Str(s.clone()),
        JsonValue::Array(items) => NativeValue::List(items.iter().map(untyped_cell).collect()),
        JsonValue::Object(entries) => NativeValue::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), untyped_cell(v)))
                .collect(),
        ),
    }
}

/// Column layout to advertise in a dataset literal: the requested columns
/// when given, otherwise untyped columns named after the table's.
pub(crate) fn advertised_columns(
    table: &Table,
    requested: &StructuredDatasetType,
) -> Vec<DatasetColumn> {
    if !requested.columns.is_empty() {
        return requested.columns.clone();
    }
    table
        .columns()
        .iter()
        .map(|name| DatasetColumn::new(name.clone(), LiteralType::string()))
        .collect()
}

/// Encoder: `Table` → NDJSON bytes in storage.
pub struct TableNdjsonEncoder;

impl DatasetEncoder for TableNdjsonEncoder {
    fn frame_type(&self) -> TypeId {
        TypeId::of::<Table>()
    }

    fn frame_name(&self) -> &'static str {
        "Table"
    }

    fn format(&self) -> &str {
        NDJSON
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

        let access = ctx.file_access();
        let staged = access.random_local_path();
        write_bytes(&staged, table.to_ndjson()?.as_bytes())?;
        let uri = match dataset.uri() {
            Some(dest) => access.put_data(&staged, dest, false)?,
            None => access.put_raw_data(&staged)?,
        };

        Ok(DatasetLiteral {
            uri,
            metadata: DatasetMetadata {
                dataset_type: StructuredDatasetType::new(
                    advertised_columns(table, requested),
                    NDJSON,
                ),
            },
        })
    }
}

/// Decoder: NDJSON bytes in storage → `Table`, with column projection.
pub struct TableNdjsonDecoder;

impl DatasetDecoder for TableNdjsonDecoder {
    fn frame_type(&self) -> TypeId {
        TypeId::of::<Table>()
    }

    fn frame_name(&self) -> &'static str {
        "Table"
    }

    fn format(&self) -> &str {
        NDJSON
    }

    fn decode(
        &self,
        ctx: &TransformContext,
        literal: &DatasetLiteral,
        metadata: &DatasetMetadata,
    ) -> Result<Box<dyn Any + Send + Sync>, TransformError> {
        let access = ctx.file_access();
        let local = if access.is_remote(&literal.uri) {
            let staged = access.random_local_path();
            access.get_data(&literal.uri, &staged, false)?;
            staged
        } else {
            literal.uri.clone().into()
        };
        let text = fs::read_to_string(&local)
            .map_err(|e| StorageError::io(local.display().to_string(), e))?;
        let table = Table::from_ndjson(&text, &metadata.dataset_type.columns)?;
        Ok(Box::new(table))
    }
}

/// Diagnostic HTML preview for tables.
pub struct TableRenderer;

impl FrameRenderer for TableRenderer {
    fn to_html(&self, frame: &Frame) -> Option<String> {
        let table: &Table = frame.downcast_ref()?;
        let mut html = String::from("<table><thead><tr>");
        for column in table.columns() {
            html.push_str(&format!("<th>{column}</th>"));
        }
        html.push_str("</tr></thead><tbody>");
        for row in table.rows() {
            html.push_str("<tr>");
            for value in row {
                html.push_str(&format!("<td>{value:?}</td>"));
            }
            html.push_str("</tr>");
        }
        html.push_str("</tbody></table>");
        Some(html)
    }
}
