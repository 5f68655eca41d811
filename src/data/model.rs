use std::collections::BTreeMap;
use std::fmt;

use super::error::DataError;

// ---------------------------------------------------------------------------
// Field names
// ---------------------------------------------------------------------------

pub const FIELD_SEQUENCE: &str = "ลำดับ";
pub const FIELD_PROJECT: &str = "โครงการ";
pub const FIELD_BUDGET_TYPE: &str = "รูปแบบงบประมาณ";
pub const FIELD_FISCAL_YEAR: &str = "ปีงบประมาณ";
pub const FIELD_DEPARTMENT: &str = "หน่วยงาน";
pub const FIELD_SITE: &str = "สถานที่";
pub const FIELD_VILLAGE: &str = "หมู่ที่";
pub const FIELD_SUB_DISTRICT: &str = "ตำบล";
pub const FIELD_DISTRICT: &str = "อำเภอ";
pub const FIELD_PROVINCE: &str = "จังหวัด";

/// Fields every source and every upload must carry, in canonical order.
pub const REQUIRED_FIELDS: [&str; 10] = [
    FIELD_SEQUENCE,
    FIELD_PROJECT,
    FIELD_BUDGET_TYPE,
    FIELD_FISCAL_YEAR,
    FIELD_DEPARTMENT,
    FIELD_SITE,
    FIELD_VILLAGE,
    FIELD_SUB_DISTRICT,
    FIELD_DISTRICT,
    FIELD_PROVINCE,
];

/// Return the required fields absent from `columns`, in canonical order.
pub fn missing_required<S: AsRef<str>>(columns: &[S]) -> Vec<String> {
    REQUIRED_FIELDS
        .iter()
        .filter(|req| !columns.iter().any(|c| c.as_ref() == **req))
        .map(|req| req.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// CellValue – a single spreadsheet cell
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value as it arrives from a sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Empty,
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Text coercion used for option lists and equality predicates.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            // f64's Display already drops a trailing ".0"
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(true) => write!(f, "TRUE"),
            CellValue::Bool(false) => write!(f, "FALSE"),
            CellValue::Empty => Ok(()),
        }
    }
}

/// Type shared by every cell of a text-sourced column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Float,
    Text,
}

impl ColumnKind {
    /// Narrowest kind that fits `s`; blank cells fit any kind.
    fn of(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.parse::<i64>().is_ok() {
            Some(ColumnKind::Integer)
        } else if trimmed.parse::<f64>().is_ok_and(f64::is_finite) {
            Some(ColumnKind::Float)
        } else {
            Some(ColumnKind::Text)
        }
    }

    fn widen(self, other: Self) -> Self {
        match (self, other) {
            (ColumnKind::Text, _) | (_, ColumnKind::Text) => ColumnKind::Text,
            (ColumnKind::Float, _) | (_, ColumnKind::Float) => ColumnKind::Float,
            _ => ColumnKind::Integer,
        }
    }

    fn cell(self, s: String) -> CellValue {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        match self {
            ColumnKind::Integer => match trimmed.parse() {
                Ok(i) => CellValue::Integer(i),
                Err(_) => CellValue::Text(s),
            },
            ColumnKind::Float => match trimmed.parse() {
                Ok(f) => CellValue::Float(f),
                Err(_) => CellValue::Text(s),
            },
            ColumnKind::Text => CellValue::Text(s),
        }
    }
}

/// Type raw text rows one column at a time.
///
/// A column becomes numeric only when every non-blank cell in it parses;
/// otherwise every cell keeps its text exactly, so `"0012"` next to `"กอง3"`
/// stays `"0012"`. Blank cells become [`CellValue::Empty`].
pub fn type_columns(rows: Vec<Vec<String>>) -> Vec<Vec<CellValue>> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut kinds: Vec<Option<ColumnKind>> = vec![None; width];
    for row in &rows {
        for (kind, s) in kinds.iter_mut().zip(row) {
            if let Some(k) = ColumnKind::of(s) {
                *kind = Some(kind.map_or(k, |seen| seen.widen(k)));
            }
        }
    }

    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&kinds)
                .map(|(s, kind)| kind.unwrap_or(ColumnKind::Text).cell(s))
                .collect()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Record – one row of the sheet
// ---------------------------------------------------------------------------

/// A single budget record: field name → value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub fields: BTreeMap<String, CellValue>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&CellValue> {
        self.fields.get(field)
    }

    /// Text of a field; absent fields read as empty text.
    pub fn text(&self, field: &str) -> String {
        self.get(field).map(CellValue::to_text).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Table – raw header + rows straight from a source
// ---------------------------------------------------------------------------

/// Unvalidated rectangular data as read from a sheet or uploaded file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Convert rows into records keyed by header name.
    ///
    /// Short rows are padded with empty cells; fully empty rows are dropped.
    pub fn into_records(self) -> (Vec<String>, Vec<Record>) {
        let Table { header, rows } = self;
        let records = rows
            .into_iter()
            .filter(|row| row.iter().any(|c| !c.is_empty()))
            .map(|row| {
                let mut cells = row.into_iter();
                let fields = header
                    .iter()
                    .map(|name| (name.clone(), cells.next().unwrap_or(CellValue::Empty)))
                    .collect();
                Record { fields }
            })
            .collect();
        (header, records)
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded record set
// ---------------------------------------------------------------------------

/// The validated record set for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    /// Column names in source order.
    pub columns: Vec<String>,
    /// All records (rows) in source order.
    pub records: Vec<Record>,
}

impl Dataset {
    /// Validate a raw table against the required fields and build a dataset.
    pub fn from_table(table: Table) -> Result<Self, DataError> {
        let missing = missing_required(&table.header);
        if !missing.is_empty() {
            return Err(DataError::SchemaMismatch { missing });
        }
        let (columns, records) = table.into_records();
        Ok(Dataset { columns, records })
    }

    /// Materialize a subset of rows, keeping the column list.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            columns: self.columns.clone(),
            records: indices
                .iter()
                .filter_map(|&i| self.records.get(i).cloned())
                .collect(),
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
