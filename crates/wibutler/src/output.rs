//! Rendering for `--output`.
//!
//! Lists become a `tabled` table, single items use a caller-supplied
//! detail view. JSON and YAML go through serde; `plain` prints ids only.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};

pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// Timestamps in `watch` output.
pub fn dim(text: &str, color: bool) -> String {
    if color { text.dimmed().to_string() } else { text.to_owned() }
}

/// Entity ids in `watch` output.
pub fn accent(text: &str, color: bool) -> String {
    if color { text.cyan().bold().to_string() } else { text.to_owned() }
}

/// Serde-backed formats. `None` for `table` and `plain`.
fn structured<T: Serialize + ?Sized>(format: &OutputFormat, data: &T) -> Option<String> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(data).map_err(|e| e.to_string()),
        OutputFormat::JsonCompact => serde_json::to_string(data).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(|e| e.to_string()),
        OutputFormat::Table | OutputFormat::Plain => return None,
    };
    Some(rendered.unwrap_or_else(|e| {
        tracing::error!(error = %e, "cannot serialize output");
        String::new()
    }))
}

/// One line of compact JSON.
pub fn json_line<T: Serialize + ?Sized>(data: &T) -> String {
    structured(&OutputFormat::JsonCompact, data).unwrap_or_default()
}

pub fn render_list<T, R>(
    format: &OutputFormat,
    items: &[T],
    to_row: impl Fn(&T) -> R,
    id_of: impl Fn(&T) -> String,
) -> String
where
    T: Serialize,
    R: Tabled,
{
    if let Some(out) = structured(format, items) {
        return out;
    }
    if matches!(format, OutputFormat::Plain) {
        return items.iter().map(id_of).collect::<Vec<_>>().join("\n");
    }
    let rows: Vec<R> = items.iter().map(to_row).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn render_single<T: Serialize>(
    format: &OutputFormat,
    item: &T,
    detail: impl Fn(&T) -> String,
    id_of: impl Fn(&T) -> String,
) -> String {
    structured(format, item).unwrap_or_else(|| match format {
        OutputFormat::Plain => id_of(item),
        _ => detail(item),
    })
}

/// Write to stdout unless `quiet` or there is nothing to say.
pub fn print_output(text: &str, quiet: bool) {
    if quiet || text.is_empty() {
        return;
    }
    let _ = writeln!(io::stdout().lock(), "{text}");
}
