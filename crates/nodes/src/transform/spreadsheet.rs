//! CSV ↔ JSON conversion.

use async_trait::async_trait;
use indexmap::IndexSet;
use serde_json::{json, Map, Number, Value};
use weft_core::value::{coerce_string, get_path};
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// Converts between CSV text and JSON row objects.
///
/// `csvToJson` infers scalar types from cell text (`42` → integer,
/// `3.14` → float, `true` → boolean, everything else string); declare
/// precision-sensitive columns as strings upstream if that matters.
/// `jsonToCsv` writes headers in first-seen key order across all rows.
pub struct Spreadsheet {
    meta: HandlerMetadata,
}

impl Spreadsheet {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["csvToJson", "jsonToCsv"],
                    "default": "csvToJson",
                },
                "field": {"type": "string", "description": "Source path; defaults to input.csv / input.rows"},
                "delimiter": {"type": "string", "default": ","},
            },
        });
        Self {
            meta: HandlerMetadata::new("spreadsheet", "Spreadsheet", "Convert between CSV and JSON")
                .with_category("transform")
                .with_icon("table")
                .with_config_schema(schema),
        }
    }

    fn infer_cell(cell: &str) -> Value {
        if cell.is_empty() {
            return Value::String(String::new());
        }
        if cell == "true" {
            return Value::Bool(true);
        }
        if cell == "false" {
            return Value::Bool(false);
        }
        if let Ok(int) = cell.parse::<i64>() {
            return Value::Number(int.into());
        }
        if let Ok(float) = cell.parse::<f64>() {
            if let Some(number) = Number::from_f64(float) {
                return Value::Number(number);
            }
        }
        Value::String(cell.to_owned())
    }

    fn csv_to_json(text: &str, delimiter: u8) -> Result<Vec<Value>, HandlerError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|err| HandlerError::validation(format!("invalid CSV: {err}")))?
            .clone();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|err| HandlerError::validation(format!("invalid CSV: {err}")))?;
            let mut row = Map::new();
            for (index, header) in headers.iter().enumerate() {
                let cell = record.get(index).unwrap_or_default();
                row.insert(header.to_owned(), Self::infer_cell(cell));
            }
            rows.push(Value::Object(row));
        }
        Ok(rows)
    }

    fn json_to_csv(rows: &[Value], delimiter: u8) -> Result<String, HandlerError> {
        let mut headers: IndexSet<String> = IndexSet::new();
        for row in rows {
            if let Some(map) = row.as_object() {
                headers.extend(map.keys().cloned());
            }
        }

        if headers.is_empty() {
            return Ok(String::new());
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(Vec::new());
        writer
            .write_record(headers.iter())
            .map_err(|err| HandlerError::internal(err.to_string()))?;

        for row in rows {
            let record: Vec<String> = headers
                .iter()
                .map(|header| row.get(header).map(coerce_string).unwrap_or_default())
                .collect();
            writer
                .write_record(&record)
                .map_err(|err| HandlerError::internal(err.to_string()))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|err| HandlerError::internal(err.to_string()))?;
        String::from_utf8(bytes).map_err(|err| HandlerError::internal(err.to_string()))
    }

    fn delimiter_byte(ctx: &NodeExecutionContext) -> u8 {
        ctx.config_str("delimiter")
            .and_then(|d| d.bytes().next())
            .unwrap_or(b',')
    }
}

impl Default for Spreadsheet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for Spreadsheet {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let delimiter = Self::delimiter_byte(ctx);
        let output = match ctx.config_str("operation").unwrap_or("csvToJson") {
            "jsonToCsv" => {
                let path = ctx.config_str("field").unwrap_or("rows");
                let rows = get_path(ctx.input(), path)
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                json!({"csv": Self::json_to_csv(&rows, delimiter)?, "rowCount": rows.len()})
            }
            _ => {
                let path = ctx.config_str("field").unwrap_or("csv");
                let text = get_path(ctx.input(), path)
                    .map(coerce_string)
                    .unwrap_or_default();
                let rows = Self::csv_to_json(&text, delimiter)?;
                let row_count = rows.len();
                json!({"rows": rows, "rowCount": row_count})
            }
        };
        Ok(NodeExecutionResult::success(output))
    }
}
