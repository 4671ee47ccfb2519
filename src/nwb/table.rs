// src/nwb/table.rs
use crate::error::{NwbError, Result};
use crate::types::DataType;

/// Values of one table column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Str(Vec<String>),
    I64(Vec<i64>),
    F64(Vec<f64>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Str(values) => values.len(),
            ColumnValues::I64(values) => values.len(),
            ColumnValues::F64(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type for numeric columns; string columns have none.
    pub fn dtype(&self) -> Option<DataType> {
        match self {
            ColumnValues::Str(_) => None,
            ColumnValues::I64(_) => Some(DataType::I64),
            ColumnValues::F64(_) => Some(DataType::F64),
        }
    }
}

/// A named, described column of a [`DynamicTable`].
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub description: String,
    pub values: ColumnValues,
}

/// Ragged-free dynamic table: every column holds one value per row.
///
/// Rows are appended a whole row at a time, so the equal-length invariant
/// holds by construction.
#[derive(Debug, Clone)]
pub struct DynamicTable {
    pub name: String,
    pub description: String,
    columns: Vec<Column>,
    num_rows: usize,
}

impl DynamicTable {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        DynamicTable {
            name: name.into(),
            description: description.into(),
            columns: Vec::new(),
            num_rows: 0,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    /// Declare a column before any rows exist.
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: ColumnValues,
    ) -> Result<()> {
        let name = name.into();
        if self.column(&name).is_some() {
            return Err(NwbError::DuplicateObject(format!(
                "column {name} in table {}",
                self.name
            )));
        }
        if values.len() != self.num_rows {
            return Err(NwbError::InvalidShape(format!(
                "column {name} has {} values, table {} has {} rows",
                values.len(),
                self.name,
                self.num_rows
            )));
        }
        self.columns.push(Column {
            name,
            description: description.into(),
            values,
        });
        Ok(())
    }

    /// Update a column's description (used when metadata supplies one).
    pub fn describe_column(&mut self, name: &str, description: impl Into<String>) -> Result<()> {
        let column = self
            .columns
            .iter_mut()
            .find(|column| column.name == name)
            .ok_or_else(|| NwbError::ObjectNotFound(format!("column {name}")))?;
        column.description = description.into();
        Ok(())
    }

    /// Append one row; `values` must cover every column in declaration order.
    pub fn append_row(&mut self, values: Vec<RowValue>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(NwbError::InvalidShape(format!(
                "row has {} values, table {} has {} columns",
                values.len(),
                self.name,
                self.columns.len()
            )));
        }
        for (column, value) in self.columns.iter().zip(&values) {
            let matches = matches!(
                (&column.values, value),
                (ColumnValues::Str(_), RowValue::Str(_))
                    | (ColumnValues::I64(_), RowValue::I64(_))
                    | (ColumnValues::F64(_), RowValue::F64(_))
            );
            if !matches {
                return Err(NwbError::TypeMismatch {
                    expected: format!("column {} value kind", column.name),
                    found: format!("{value:?}"),
                });
            }
        }
        for (column, value) in self.columns.iter_mut().zip(values) {
            match (&mut column.values, value) {
                (ColumnValues::Str(column), RowValue::Str(value)) => column.push(value),
                (ColumnValues::I64(column), RowValue::I64(value)) => column.push(value),
                (ColumnValues::F64(column), RowValue::F64(value)) => column.push(value),
                _ => unreachable!("checked above"),
            }
        }
        self.num_rows += 1;
        Ok(())
    }
}

/// One cell of an appended row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowValue {
    Str(String),
    I64(i64),
    F64(f64),
}
