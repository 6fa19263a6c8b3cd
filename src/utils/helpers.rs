use chrono::Local;

/// Renders raw bytes for a log line: printable ASCII as is, everything else escaped
pub fn render_payload(payload: &[u8]) -> String {
    payload.escape_ascii().to_string()
}

/// Local wall-clock prefix for event lines
pub fn timestamp() -> String {
    Local::now().format("[%H:%M:%S%.3f]").to_string()
}

/// Splits an operator line on single spaces, keeping empty tokens so that
/// re-joining a message preserves its spacing
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split(' ').collect()
}
