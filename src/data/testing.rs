//! In-memory source for exercising loaders, uploads and session state.

use super::error::DataError;
use super::loader::DatasetSource;
use super::model::{CellValue, Dataset, Table, REQUIRED_FIELDS};

pub struct FakeSource {
    table: Table,
    fail: bool,
    writable: bool,
    loads: usize,
    appended: Vec<Vec<CellValue>>,
}

impl FakeSource {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            fail: false,
            writable: true,
            loads: 0,
            appended: Vec::new(),
        }
    }

    /// Four records over budget types A/B, years 2561/2563, three departments.
    pub fn sample() -> Self {
        let rows = [
            (1, "ถนน", "A", 2563, "กอง3"),
            (2, "ประปา", "B", 2561, "X"),
            (3, "ถนน", "A", 2561, "กอง10"),
            (4, "ไฟฟ้า", "B", 2563, "กอง3"),
        ];
        Self::new(Table {
            header: REQUIRED_FIELDS.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|(seq, project, budget, year, dept)| {
                    vec![
                        CellValue::Integer(*seq),
                        CellValue::Text(project.to_string()),
                        CellValue::Text(budget.to_string()),
                        CellValue::Integer(*year),
                        CellValue::Text(dept.to_string()),
                        CellValue::Text("วัด".into()),
                        CellValue::Integer(5),
                        CellValue::Text("ตำบลก".into()),
                        CellValue::Text("อำเภอข".into()),
                        CellValue::Text("จังหวัดค".into()),
                    ]
                })
                .collect(),
        })
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Table::default())
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn loads(&self) -> usize {
        self.loads
    }

    pub fn appended(&self) -> &[Vec<CellValue>] {
        &self.appended
    }
}

impl DatasetSource for FakeSource {
    fn describe(&self) -> String {
        "fake".into()
    }

    fn load(&mut self) -> Result<Dataset, DataError> {
        self.loads += 1;
        if self.fail {
            return Err(DataError::DataUnavailable("connection refused".into()));
        }
        let mut table = self.table.clone();
        table.rows.extend(self.appended.iter().cloned());
        Dataset::from_table(table)
    }

    fn supports_append(&self) -> bool {
        self.writable
    }

    fn append(&mut self, rows: &[Vec<CellValue>]) -> Result<usize, DataError> {
        if !self.writable {
            return Err(DataError::AppendUnsupported);
        }
        self.appended.extend(rows.iter().cloned());
        Ok(rows.len())
    }
}
