//! Duration formatting for the popup

/// Render milliseconds as `H:MM`, or `-` when there is no value.
pub fn format_hours_minutes(ms: Option<u64>) -> String {
    let Some(ms) = ms else {
        return "-".to_string();
    };
    let total_minutes = ms / 60_000;
    format!("{}:{:02}", total_minutes / 60, total_minutes % 60)
}
