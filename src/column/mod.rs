mod block;
mod fixed;
mod string;

pub use fixed::FixedStringColumn;
pub use string::StringColumn;

use crate::error::Result;
use std::io::{Read, Write};

/// Run-time tag for the concrete column kind backing a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    FixedString,
}

/// One element's bytes together with the kind of column they came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemView<'a> {
    pub column_type: ColumnType,
    pub data: &'a [u8],
}

/// The closed set of string column kinds, dispatching the shared
/// capability set over the concrete implementations.
///
/// Cross-kind `append_column` and `swap` are silent no-ops (logged at
/// debug level), matching the protocol contract rather than erroring.
pub enum Column {
    String(StringColumn),
    FixedString(FixedStringColumn),
}

impl From<StringColumn> for Column {
    fn from(column: StringColumn) -> Self {
        Column::String(column)
    }
}

impl From<FixedStringColumn> for Column {
    fn from(column: FixedStringColumn) -> Self {
        Column::FixedString(column)
    }
}

impl Column {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::String(_) => ColumnType::String,
            Column::FixedString(_) => ColumnType::FixedString,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Column::String(column) => column.size(),
            Column::FixedString(column) => column.size(),
        }
    }

    pub fn reserve(&mut self, additional: usize) {
        match self {
            Column::String(column) => column.reserve(additional),
            Column::FixedString(column) => column.reserve(additional),
        }
    }

    pub fn clear(&mut self) {
        match self {
            Column::String(column) => column.clear(),
            Column::FixedString(column) => column.clear(),
        }
    }

    pub fn at(&self, index: usize) -> Result<&[u8]> {
        match self {
            Column::String(column) => column.at(index),
            Column::FixedString(column) => column.at(index),
        }
    }

    /// Appends every element of `other` of the same concrete kind; a
    /// mismatched kind is ignored.
    pub fn append_column(&mut self, other: &Column) {
        match (self, other) {
            (Column::String(target), Column::String(source)) => target.append_column(source),
            (Column::FixedString(target), Column::FixedString(source)) => {
                target.append_column(source)
            }
            (target, source) => {
                tracing::debug!(
                    ours = ?target.column_type(),
                    theirs = ?source.column_type(),
                    "ignoring append between mismatched column kinds"
                );
            }
        }
    }

    pub fn load_body<R: Read>(&mut self, reader: &mut R, rows: usize) -> Result<()> {
        match self {
            Column::String(column) => column.load_body(reader, rows),
            Column::FixedString(column) => column.load_body(reader, rows),
        }
    }

    pub fn save_body<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Column::String(column) => column.save_body(writer),
            Column::FixedString(column) => column.save_body(writer),
        }
    }

    pub fn slice(&self, begin: usize, len: usize) -> Column {
        match self {
            Column::String(column) => Column::String(column.slice(begin, len)),
            Column::FixedString(column) => Column::FixedString(column.slice(begin, len)),
        }
    }

    pub fn clone_empty(&self) -> Column {
        match self {
            Column::String(column) => Column::String(column.clone_empty()),
            Column::FixedString(column) => Column::FixedString(column.clone_empty()),
        }
    }

    /// Exchanges the contents of two columns of the same concrete kind in
    /// constant time; a mismatched kind is ignored.
    pub fn swap(&mut self, other: &mut Column) {
        match (self, other) {
            (Column::String(left), Column::String(right)) => left.swap(right),
            (Column::FixedString(left), Column::FixedString(right)) => left.swap(right),
            (left, right) => {
                tracing::debug!(
                    ours = ?left.column_type(),
                    theirs = ?right.column_type(),
                    "ignoring swap between mismatched column kinds"
                );
            }
        }
    }

    pub fn memory_usage(&self) -> usize {
        match self {
            Column::String(column) => column.memory_usage(),
            Column::FixedString(column) => column.memory_usage(),
        }
    }

    pub fn get_item(&self, index: usize) -> Result<ItemView<'_>> {
        Ok(ItemView {
            column_type: self.column_type(),
            data: self.at(index)?,
        })
    }
}
