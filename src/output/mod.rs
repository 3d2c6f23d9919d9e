// Output module
pub mod table;

pub use table::{
    ModelBreakdownRow, OutputFormat, RecordRow, SummaryRow, format_currency, format_number,
    render_table,
};
