//! Incremental demultiplexing of the raw response body.

use crate::event::{ToolEvent, parse_tool_event_line};

/// An item recovered from the byte stream.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamItem {
    /// Text to display, in stream order.
    Text(String),
    /// A complete tool event line.
    Event(ToolEvent),
}

/// Splits a chunked body into text and tool events.
///
/// Chunk boundaries are arbitrary: a UTF-8 sequence or a JSON event line
/// may be cut anywhere. Text is forwarded as soon as it is decodable,
/// except for a line starting with `{`, which is held until its newline
/// arrives so that an event line is never split.
#[derive(Debug)]
pub struct LineDemux {
    // Undecoded trailing bytes of an incomplete UTF-8 sequence.
    pending_bytes: Vec<u8>,
    // The current line, when it may still turn out to be an event.
    held_line: String,
    // Whether the next decoded character starts a new line.
    at_line_start: bool,
}

impl Default for LineDemux {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDemux {
    /// Creates a new demultiplexer.
    #[inline]
    pub fn new() -> Self {
        Self {
            pending_bytes: vec![],
            held_line: String::new(),
            at_line_start: true,
        }
    }

    /// Feeds a chunk and returns the items that became available.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamItem> {
        self.pending_bytes.extend_from_slice(chunk);
        let decoded = self.take_decoded();

        let mut items = vec![];
        let mut text = String::new();
        for line in decoded.split_inclusive('\n') {
            let complete = line.ends_with('\n');
            if !self.held_line.is_empty() {
                self.held_line.push_str(line);
                if complete {
                    let held = std::mem::take(&mut self.held_line);
                    emit_line(held, &mut text, &mut items);
                }
            } else if self.at_line_start && line.starts_with('{') {
                if complete {
                    emit_line(line.to_owned(), &mut text, &mut items);
                } else {
                    self.held_line.push_str(line);
                }
            } else {
                text.push_str(line);
            }
            self.at_line_start = complete;
        }
        flush_text(&mut text, &mut items);
        items
    }

    /// Flushes everything that is still held back, as text.
    pub fn finish(&mut self) -> Vec<StreamItem> {
        let mut rest = std::mem::take(&mut self.held_line);
        if !self.pending_bytes.is_empty() {
            rest.push_str(&String::from_utf8_lossy(&self.pending_bytes));
            self.pending_bytes.clear();
        }
        self.at_line_start = true;
        if rest.is_empty() {
            return vec![];
        }
        // A final line without a newline may still be a complete event.
        match parse_tool_event_line(&rest) {
            Some(event) => vec![StreamItem::Event(event)],
            None => vec![StreamItem::Text(rest)],
        }
    }

    fn take_decoded(&mut self) -> String {
        let mut decoded = String::new();
        loop {
            match std::str::from_utf8(&self.pending_bytes) {
                Ok(valid) => {
                    decoded.push_str(valid);
                    self.pending_bytes.clear();
                    return decoded;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    if let Ok(valid) = std::str::from_utf8(&self.pending_bytes[..valid_up_to]) {
                        decoded.push_str(valid);
                    }
                    match err.error_len() {
                        // Incomplete sequence at the end, wait for more.
                        None => {
                            self.pending_bytes.drain(..valid_up_to);
                            return decoded;
                        }
                        Some(len) => {
                            decoded.push(char::REPLACEMENT_CHARACTER);
                            self.pending_bytes.drain(..valid_up_to + len);
                        }
                    }
                }
            }
        }
    }
}

fn emit_line(line: String, text: &mut String, items: &mut Vec<StreamItem>) {
    match parse_tool_event_line(&line) {
        Some(event) => {
            flush_text(text, items);
            items.push(StreamItem::Event(event));
        }
        None => text.push_str(&line),
    }
}

fn flush_text(text: &mut String, items: &mut Vec<StreamItem>) {
    if !text.is_empty() {
        items.push(StreamItem::Text(std::mem::take(text)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ToolEventKind;

    fn collect(chunks: &[&[u8]]) -> Vec<StreamItem> {
        let mut demux = LineDemux::new();
        let mut items = vec![];
        for chunk in chunks {
            items.extend(demux.push(chunk));
        }
        items.extend(demux.finish());
        items
    }

    fn text_of(items: &[StreamItem]) -> String {
        items
            .iter()
            .filter_map(|item| match item {
                StreamItem::Text(text) => Some(text.as_str()),
                StreamItem::Event(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_text_is_forwarded_promptly() {
        let mut demux = LineDemux::new();
        assert_eq!(demux.push(b"Hel"), vec![StreamItem::Text("Hel".into())]);
        assert_eq!(demux.push(b"lo"), vec![StreamItem::Text("lo".into())]);
        assert!(demux.finish().is_empty());
    }

    #[test]
    fn test_event_line_split_across_chunks() {
        let line = br#"{"event":"on_tool_start","name":"get_weather","run_id":"call_1"}"#;
        let (head, tail) = line.split_at(17);
        let items = collect(&[&b"Checking.\n"[..], head, tail, &b"\nDone."[..]]);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], StreamItem::Text("Checking.\n".into()));
        assert!(
            matches!(&items[1], StreamItem::Event(ev) if ev.kind() == ToolEventKind::Start)
        );
        assert_eq!(items[2], StreamItem::Text("Done.".into()));
    }

    #[test]
    fn test_brace_in_the_middle_of_a_line_is_text() {
        let items = collect(&[&b"a {"[..], &b"b}\n{not an event}\n"[..]]);
        assert_eq!(text_of(&items), "a {b}\n{not an event}\n");
        assert!(items.iter().all(|item| matches!(item, StreamItem::Text(_))));
    }

    #[test]
    fn test_multibyte_split() {
        let bytes = "✔ get_weather done\n".as_bytes();
        let items = collect(&[&bytes[..1], &bytes[1..2], &bytes[2..]]);
        assert_eq!(text_of(&items), "✔ get_weather done\n");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let check = "✔".as_bytes();
        let items = collect(&[&b"ok \xff "[..], &check[..1], &check[1..], &b"\xc3(\n"[..]]);
        assert_eq!(text_of(&items), "ok \u{fffd} ✔\u{fffd}(\n");
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let items = collect(&[&b"{\"event\":\"on_tool_end\",\"run_id\":\"r\"}"[..]]);
        assert!(matches!(&items[..], [StreamItem::Event(_)]));

        let items = collect(&[&b"{\"partial"[..]]);
        assert_eq!(items, vec![StreamItem::Text("{\"partial".into())]);
    }
}
