pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Render a command's result in the requested format. JSON and CSV report
/// write failures; the table and minimal printers are best-effort.
pub fn format_output(
    format: &OutputFormat,
    value: &Value,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Table => {
            table::print_table(value);
            Ok(())
        }
        OutputFormat::Minimal => {
            minimal::print_minimal(value);
            Ok(())
        }
    }
}
