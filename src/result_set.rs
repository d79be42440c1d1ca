//! Buffered result sets held by the DB-Library extension.

use chrono::{Duration, NaiveDate, NaiveDateTime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: i32,
    pub column_size: u32,
}

/// A decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Binary(Vec<u8>),
    DateTime(NaiveDateTime),
}

/// Converts a server `DATETIME` (days since 1900-01-01 and 1/300 second
/// ticks since midnight) into a calendar date-time.
pub fn datetime_from_parts(days: i32, ticks: i32) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1900, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let millis = (i64::from(ticks) * 1000 + 150) / 300;
    epoch
        .checked_add_signed(Duration::days(i64::from(days)))?
        .checked_add_signed(Duration::milliseconds(millis))
}

/// Converts a server `SMALLDATETIME` (days since 1900-01-01 and minutes since
/// midnight) into a calendar date-time.
pub fn smalldatetime_from_parts(days: u16, minutes: u16) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1900, 1, 1)?.and_hms_opt(0, 0, 0)?;
    epoch
        .checked_add_signed(Duration::days(i64::from(days)))?
        .checked_add_signed(Duration::minutes(i64::from(minutes)))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Vec<ColumnMetadata>,
    rows: Vec<Vec<Cell>>,
    row_cursor: usize,
    field_cursor: usize,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnMetadata>, rows: Vec<Vec<Cell>>) -> Self {
        ResultSet {
            columns,
            rows,
            row_cursor: 0,
            field_cursor: 0,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_fields(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    /// Positions the row pointer; `false` when `row` is out of range.
    pub fn seek_row(&mut self, row: i64) -> bool {
        match usize::try_from(row) {
            Ok(row) if row < self.rows.len() => {
                self.row_cursor = row;
                true
            }
            _ => false,
        }
    }

    /// Positions the field pointer; `false` when `field` is out of range.
    pub fn seek_field(&mut self, field: i64) -> bool {
        match usize::try_from(field) {
            Ok(field) if field < self.columns.len() => {
                self.field_cursor = field;
                true
            }
            _ => false,
        }
    }

    pub fn fetch_row(&mut self) -> Option<&[Cell]> {
        let row = self.rows.get(self.row_cursor)?;
        self.row_cursor += 1;
        Some(row)
    }

    pub fn fetch_field(&mut self) -> Option<&ColumnMetadata> {
        let column = self.columns.get(self.field_cursor)?;
        self.field_cursor += 1;
        Some(column)
    }
}
