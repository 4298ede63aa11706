//! Table output formatting for CLI commands using comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use crate::domain::models::{Experiment, GoalTestResult, TestStatus, VariantStats};

/// Table formatter for CLI output
pub struct TableFormatter {
    use_colors: bool,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: console::colors_enabled(),
        }
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table
    }

    /// Format suite results as a table.
    pub fn format_results(&self, results: &[GoalTestResult]) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("Test").add_attribute(Attribute::Bold),
            Cell::new("Outcome").add_attribute(Attribute::Bold),
            Cell::new("Turns").add_attribute(Attribute::Bold),
            Cell::new("Duration").add_attribute(Attribute::Bold),
            Cell::new("Stop Reason").add_attribute(Attribute::Bold),
            Cell::new("Issues").add_attribute(Attribute::Bold),
        ]);

        for result in results {
            let outcome = match (result.status, result.passed) {
                (TestStatus::Error, _) => self.colored("ERROR", Color::Yellow),
                (_, true) => self.colored("PASS", Color::Green),
                (_, false) => self.colored("FAIL", Color::Red),
            };
            table.add_row(vec![
                Cell::new(&result.test_id),
                outcome,
                Cell::new(result.turn_count),
                Cell::new(format!("{:.1}s", result.duration_ms as f64 / 1000.0)),
                Cell::new(&result.stop_reason),
                Cell::new(result.issues.len()),
            ]);
        }
        table.to_string()
    }

    /// Format experiments for `experiment list`.
    pub fn format_experiments(&self, experiments: &[Experiment]) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Arms").add_attribute(Attribute::Bold),
            Cell::new("Samples").add_attribute(Attribute::Bold),
            Cell::new("Created").add_attribute(Attribute::Bold),
        ]);

        for exp in experiments {
            table.add_row(vec![
                Cell::new(&exp.experiment_id.to_string()[..8]),
                Cell::new(&exp.name),
                Cell::new(exp.status.as_str()),
                Cell::new(exp.arms.len()),
                Cell::new(format!("{}-{}", exp.min_sample_size, exp.max_sample_size)),
                Cell::new(exp.created_at.format("%Y-%m-%d %H:%M").to_string()),
            ]);
        }
        table.to_string()
    }

    /// Format per-variant aggregates for `experiment show`/`analyze`.
    pub fn format_variant_stats(&self, stats: &[VariantStats]) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("Variant").add_attribute(Attribute::Bold),
            Cell::new("N").add_attribute(Attribute::Bold),
            Cell::new("Pass Rate").add_attribute(Attribute::Bold),
            Cell::new("95% CI").add_attribute(Attribute::Bold),
            Cell::new("Turns (mean/med)").add_attribute(Attribute::Bold),
            Cell::new("Errors").add_attribute(Attribute::Bold),
        ]);

        for s in stats {
            table.add_row(vec![
                Cell::new(&s.variant_id.to_string()[..8]),
                Cell::new(s.sample_size),
                Cell::new(format!("{:.1}%", s.pass_rate * 100.0)),
                Cell::new(format!(
                    "[{:.1}%, {:.1}%]",
                    s.pass_rate_ci.0 * 100.0,
                    s.pass_rate_ci.1 * 100.0
                )),
                Cell::new(format!("{:.1} / {:.1}", s.mean_turns, s.median_turns)),
                Cell::new(s.error_count),
            ]);
        }
        table.to_string()
    }

    fn colored(&self, text: &str, color: Color) -> Cell {
        if self.use_colors {
            Cell::new(text).fg(color)
        } else {
            Cell::new(text)
        }
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}
