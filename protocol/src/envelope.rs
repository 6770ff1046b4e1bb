//! `data: {...}\n\n` line framing for server-sent events (spec.md §6).

use crate::event::ProtocolEvent;

/// Formats one protocol event as a complete SSE `data:` line, including the
/// trailing blank line the SSE wire format requires between frames.
pub fn to_sse_line(event: &ProtocolEvent) -> Result<String, serde_json::Error> {
    let value = event.to_value()?;
    Ok(format!("data: {}\n\n", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_data_line_with_trailing_blank_line() {
        let line = to_sse_line(&ProtocolEvent::Done).unwrap();
        assert!(line.starts_with("data: "));
        assert!(line.ends_with("\n\n"));
    }
}
