//! Spreadsheet model: named sheets of header-keyed rows.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};
use serde_json::{Map, Number, Value};

use super::ImportError;

/// One data row keyed by the sheet's header cells.
pub type Row = Map<String, Value>;

/// A named table.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Row>,
}

/// A parsed workbook.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// Parse `.xlsx` bytes. The first row of every sheet is its header.
    pub fn from_xlsx_bytes(bytes: &[u8]) -> Result<Self, ImportError> {
        let mut xlsx: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
            .map_err(|e: calamine::XlsxError| ImportError::Workbook(e.to_string()))?;

        let mut sheets = Vec::new();
        for name in xlsx.sheet_names() {
            let range = xlsx
                .worksheet_range(&name)
                .map_err(|e| ImportError::Workbook(format!("sheet '{name}': {e}")))?;
            let mut rows = range.rows();
            let Some(header) = rows.next() else {
                sheets.push(Sheet { name, rows: Vec::new() });
                continue;
            };
            let columns: Vec<Option<String>> = header
                .iter()
                .map(|cell| {
                    let title = cell.to_string();
                    let title = title.trim();
                    (!title.is_empty()).then(|| title.to_string())
                })
                .collect();

            let parsed = rows
                .map(|cells| {
                    columns
                        .iter()
                        .zip(cells)
                        .filter_map(|(column, cell)| {
                            let column = column.as_ref()?;
                            let value = cell_value(cell)?;
                            Some((column.clone(), value))
                        })
                        .collect::<Row>()
                })
                .filter(|row| !row.is_empty())
                .collect();
            sheets.push(Sheet { name, rows: parsed });
        }
        Ok(Self { sheets })
    }

    /// Sheet lookup ignoring ASCII case.
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name.eq_ignore_ascii_case(name))
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|sheet| sheet.name.as_str())
    }
}

/// JSON form of a cell; empty cells are dropped.
fn cell_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(Value::String(s.clone())),
        Data::Int(i) => Some(Value::Number((*i).into())),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
            Some(Value::Number((*f as i64).into()))
        }
        Data::Float(f) => Number::from_f64(*f).map(Value::Number),
        Data::Bool(b) => Some(Value::Bool(*b)),
        other => Some(Value::String(other.to_string())),
    }
}

/// Trimmed text of a field. Numbers render without a trailing `.0`, so a
/// numeric id cell `7` reads as `"7"`.
pub fn text(row: &Row, key: &str) -> Option<String> {
    raw_text(row, key).map(|s| s.trim().to_string())
}

/// Text of a field exactly as the cell holds it. Blank cells read as absent.
/// Identifiers use this so they survive byte-for-byte.
pub fn raw_text(row: &Row, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) => (!s.trim().is_empty()).then(|| s.clone()),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if f.fract() == 0.0 && n.is_f64() => format!("{}", f as i64),
            _ => n.to_string(),
        }),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First present text among several field names.
pub fn text_any(row: &Row, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text(row, key))
}

/// Integer value of a field, parsing text when needed.
pub fn integer(row: &Row, key: &str) -> Option<i64> {
    match row.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
