//! Table output formatting for CLI commands
//!
//! Formatted table output for tasks and stuck-task reports using comfy-table,
//! with color-coded status cells and icon fallbacks for no-color terminals.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use crate::domain::models::{Task, TaskStatus};
use crate::services::StuckTask;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<usize>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    /// Create a formatter with explicit settings
    pub fn with_config(use_colors: bool, max_width: Option<usize>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Format a list of tasks as a table
    pub fn format_tasks(&self, tasks: &[Task]) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Spec").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Phase").add_attribute(Attribute::Bold),
        ]);

        for task in tasks {
            let id_short = &task.id.to_string()[..8];
            table.add_row(vec![
                Cell::new(id_short),
                Cell::new(&task.spec_id),
                Cell::new(truncate_text(&task.title, 40)),
                self.status_cell(task.status),
                Cell::new(task.current_phase().as_str()),
            ]);
        }

        table.to_string()
    }

    /// Format a stuck-task report as a table
    pub fn format_stuck_tasks(&self, stuck: &[StuckTask]) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Project").add_attribute(Attribute::Bold),
            Cell::new("Spec").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Stale").add_attribute(Attribute::Bold),
            Cell::new("Attempts").add_attribute(Attribute::Bold),
        ]);

        for task in stuck {
            let id_short = &task.task_id.to_string()[..8];
            let attempts = if task.exhausted {
                format!("{} (exhausted)", task.attempts)
            } else {
                task.attempts.to_string()
            };
            let attempts_cell = if self.use_colors && task.exhausted {
                Cell::new(&attempts).fg(Color::Red)
            } else {
                Cell::new(&attempts)
            };
            table.add_row(vec![
                Cell::new(id_short),
                Cell::new(&task.project_name),
                Cell::new(&task.spec_id),
                self.status_cell(task.status),
                Cell::new(format_stale(task.stale_ms)),
                attempts_cell,
            ]);
        }

        table.to_string()
    }

    fn status_cell(&self, status: TaskStatus) -> Cell {
        if self.use_colors {
            Cell::new(status.to_string()).fg(status_color(status))
        } else {
            Cell::new(format!("{} {status}", status_icon(status)))
        }
    }

    /// Create a base table with common settings
    fn create_base_table(&self) -> Table {
        let mut table = Table::new();

        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(u16::try_from(width).unwrap_or(u16::MAX));
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }
    true
}

/// Map task status to color
fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Backlog => Color::White,
        TaskStatus::InProgress => Color::Cyan,
        TaskStatus::AiReview => Color::Magenta,
        TaskStatus::HumanReview => Color::Yellow,
        TaskStatus::Error => Color::Red,
        TaskStatus::Done => Color::Green,
    }
}

/// Map task status to icon
fn status_icon(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Backlog => "○",
        TaskStatus::InProgress => "⟳",
        TaskStatus::AiReview => "⧗",
        TaskStatus::HumanReview => "●",
        TaskStatus::Error => "✗",
        TaskStatus::Done => "✓",
    }
}

/// Human-readable staleness
fn format_stale(ms: u64) -> String {
    let secs = ms / 1000;
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Truncate text with ellipsis
fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
