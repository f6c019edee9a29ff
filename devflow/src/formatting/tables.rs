//! Table formatting utilities using comfy-table.

use comfy_table::{Cell, Table};

use super::Status;

/// One line of a pipeline summary.
pub struct CommandRow {
    pub command: String,
    pub status: Status,
    pub detail: String,
}

/// Prints the per-command result table of a pipeline run.
pub fn print_command_table(rows: &[CommandRow]) {
    let mut table = Table::new();
    table
        .set_header(vec![
            Cell::new("Status").add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Command").add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Details").add_attribute(comfy_table::Attribute::Bold),
        ])
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic);

    for row in rows {
        let color = match row.status {
            Status::Success => comfy_table::Color::Green,
            Status::Error => comfy_table::Color::Red,
            Status::Warning => comfy_table::Color::Yellow,
        };
        table.add_row(vec![
            Cell::new(row.status.symbol()).fg(color),
            Cell::new(&row.command).fg(comfy_table::Color::White),
            Cell::new(&row.detail).fg(color),
        ]);
    }

    println!("{}", table);
}
