pub mod column;
pub mod error;
pub mod wire;

pub use column::{Column, ColumnType, FixedStringColumn, ItemView, StringColumn};
pub use error::{Error, Result};
pub use wire::WireFormat;
