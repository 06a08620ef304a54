pub mod csv;

pub use self::csv::{parse_table, read_table, Table};
