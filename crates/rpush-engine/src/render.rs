//! Pure row -> byte transformations. No I/O: these functions only adapt a
//! [`RowStream`] into a [`ByteStream`] with a single forward pass and no
//! side effects.

use bytes::Bytes;
use futures_util::StreamExt;
use rpush_types::{CellValue, ColumnMeta, ExecutionError, Row, RowStream};

use crate::ByteStream;

/// CSV rendering configuration. `quote_all` forces quoting on every field;
/// otherwise only fields containing the delimiter, a quote, or a newline
/// are quoted.
#[derive(Clone, Debug)]
pub struct CsvRenderConfig {
    pub delimiter: u8,
    pub quote_all: bool,
}

impl Default for CsvRenderConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote_all: false,
        }
    }
}

/// JSON rendering configuration: the framing around each rendered row.
/// Defaults to array-of-objects framing (`[{...},{...}]`).
#[derive(Clone, Debug)]
pub struct JsonRenderConfig {
    pub prefix: String,
    pub delimiter: String,
    pub suffix: String,
}

impl Default for JsonRenderConfig {
    fn default() -> Self {
        Self {
            prefix: "[".to_string(),
            delimiter: ",".to_string(),
            suffix: "]".to_string(),
        }
    }
}

fn csv_escape(field: &str, config: &CsvRenderConfig) -> String {
    let delim = config.delimiter as char;
    let needs_quoting =
        config.quote_all || field.contains(delim) || field.contains('"') || field.contains('\n');
    if !needs_quoting {
        return field.to_string();
    }
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn cell_to_string(cell: &CellValue) -> String {
    match cell {
        CellValue::Text(s) => s.clone(),
        CellValue::Integer(i) => i.to_string(),
        CellValue::Float(f) => f.to_string(),
        CellValue::Boolean(b) => b.to_string(),
        CellValue::Timestamp(t) => t.to_rfc3339(),
        CellValue::Null => String::new(),
    }
}

fn render_row_csv(row: &Row, config: &CsvRenderConfig) -> Bytes {
    let line = row
        .0
        .iter()
        .map(|cell| csv_escape(&cell_to_string(cell), config))
        .collect::<Vec<_>>()
        .join(&(config.delimiter as char).to_string());
    Bytes::from(format!("{line}\n"))
}

fn csv_header(columns: &[ColumnMeta], config: &CsvRenderConfig) -> Bytes {
    let line = columns
        .iter()
        .map(|c| csv_escape(&c.name, config))
        .collect::<Vec<_>>()
        .join(&(config.delimiter as char).to_string());
    Bytes::from(format!("{line}\n"))
}

/// Render a row stream as CSV bytes: a header line followed by one line per
/// row, truncated to `limit` rows when set.
pub fn render_csv(
    rows: RowStream,
    columns: Vec<ColumnMeta>,
    config: CsvRenderConfig,
    limit: Option<u64>,
) -> ByteStream {
    let limited: RowStream = match limit {
        Some(n) => rows.take(n as usize).boxed(),
        None => rows,
    };

    let header = csv_header(&columns, &config);
    let body = limited.map(move |row| row.map(|r| render_row_csv(&r, &config)));

    Box::pin(futures_util::stream::once(async move { Ok(header) }).chain(body))
}

fn row_to_json(row: &Row, columns: &[ColumnMeta]) -> serde_json::Value {
    let mut obj = serde_json::Map::with_capacity(row.0.len());
    for (column, cell) in columns.iter().zip(row.0.iter()) {
        let value = match cell {
            CellValue::Text(s) => serde_json::Value::String(s.clone()),
            CellValue::Integer(i) => serde_json::json!(i),
            CellValue::Float(f) => serde_json::json!(f),
            CellValue::Boolean(b) => serde_json::json!(b),
            CellValue::Timestamp(t) => serde_json::Value::String(t.to_rfc3339()),
            CellValue::Null => serde_json::Value::Null,
        };
        obj.insert(column.name.clone(), value);
    }
    serde_json::Value::Object(obj)
}

/// Render a row stream as JSON bytes, framed by `prefix`/`delimiter`/`suffix`.
pub fn render_json(
    rows: RowStream,
    columns: Vec<ColumnMeta>,
    config: JsonRenderConfig,
    limit: Option<u64>,
) -> ByteStream {
    let limited: RowStream = match limit {
        Some(n) => rows.take(n as usize).boxed(),
        None => rows,
    };

    let prefix = Bytes::from(config.prefix.clone());
    let suffix = Bytes::from(config.suffix.clone());
    let delimiter = config.delimiter.clone();

    let mut first = true;
    let body = limited.map(move |row| {
        row.map(|r| {
            let json = row_to_json(&r, &columns);
            let mut out = String::new();
            if !first {
                out.push_str(&delimiter);
            }
            first = false;
            out.push_str(&json.to_string());
            Bytes::from(out)
        })
    });

    Box::pin(
        futures_util::stream::once(async move { Ok(prefix) })
            .chain(body)
            .chain(futures_util::stream::once(async move { Ok(suffix) })),
    )
}
