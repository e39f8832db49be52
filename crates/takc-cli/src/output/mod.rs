//! Output formatters

pub mod json;
pub mod terminal;

use crate::app::OutputFormat;
use serde::Serialize;

/// Print `value` as JSON, or with `render` for the terminal
pub fn emit<T, F>(value: &T, format: OutputFormat, render: F) -> anyhow::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> std::io::Result<()>,
{
    match format {
        OutputFormat::Json => json::print(value),
        OutputFormat::Cli => Ok(render(value)?),
    }
}
