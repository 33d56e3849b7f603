use snipq_core::{HistoryEntry, Params, Snippet};

const PREVIEW_WIDTH: usize = 60;

/// Shorten text to one line for listings.
pub fn one_line(text: &str, width: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' || c == '\t' { ' ' } else { c })
        .collect();
    if flat.chars().count() <= width {
        return flat;
    }
    let cut: String = flat.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", cut)
}

pub fn format_snippet_line(snippet: &Snippet) -> String {
    let mut line = format!("  {} - {}", snippet.trigger, snippet.name);
    if !snippet.tags.is_empty() {
        line.push_str(&format!(" [{}]", snippet.tags.join(", ")));
    }
    line.push('\n');
    if let Some(description) = &snippet.description {
        line.push_str(&format!("     {}\n", one_line(description, PREVIEW_WIDTH)));
    }
    line
}

pub fn format_params(params: &Params) -> String {
    let mut out = String::new();
    for (key, value) in params {
        out.push_str(&format!("  {}: {}\n", key, value));
    }
    out
}

pub fn format_history_line(entry: &HistoryEntry) -> String {
    let app = entry
        .app_id
        .as_deref()
        .map(|app| format!(" ({})", app))
        .unwrap_or_default();
    format!(
        "{:>8}  {}{}  {}\n",
        entry.formatted_time(),
        entry.snippet_id,
        app,
        one_line(&entry.output, PREVIEW_WIDTH)
    )
}
