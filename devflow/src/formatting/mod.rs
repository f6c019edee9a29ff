//! CLI formatting utilities.
//!
//! Shared colors and layout for everything the CLI prints, so pipeline,
//! clean and watch output look alike.

mod headers;
mod output;
mod progress;
mod status;
mod tables;

pub use headers::{print_section_header, SectionStyle};
pub use output::{format_duration, print_key_value, print_separator, print_summary_box};
pub use progress::create_progress_bar;
pub use status::{print_error, print_success, print_warning, Status};
pub use tables::{print_command_table, CommandRow};
