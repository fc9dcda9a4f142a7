pub mod error;
pub mod types;
pub mod value;

pub use error::{DbError, Result};
pub use types::{Column, ColumnType, Row, parse_date, parse_time, parse_timestamp};
pub use value::Value;
