pub mod format;

pub use format::{format_date, format_injury, format_money, format_number, format_optional};
