//! Minimal line editing for chat sessions

/// What a chunk of terminal input amounts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineInput {
    /// Bytes to write back to the terminal
    Echo(String),
    /// A completed, non-empty line
    Line(String),
    /// Ctrl-C or Ctrl-D: the user wants to leave
    Interrupt,
}

const CTRL_C: char = '\u{3}';
const CTRL_D: char = '\u{4}';
const BACKSPACE: char = '\u{8}';
const DELETE: char = '\u{7f}';

/// Default limit on the bytes buffered for one line
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;

/// Accumulates keystrokes into lines
///
/// Terminals in raw mode send one character at a time and expect the server
/// to echo. Printable characters are echoed and buffered, backspace erases
/// one character, CR or LF completes the line. Other control characters are
/// dropped, and so is input past the line length limit.
///
/// Input is UTF-8. A character split across two chunks is held back until
/// the rest of it arrives.
#[derive(Debug)]
pub struct LineEditor {
    buffer: String,
    partial: Vec<u8>,
    max_len: usize,
    last_was_cr: bool,
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl LineEditor {
    /// Create an empty editor
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an editor that buffers at most `max_len` bytes per line
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buffer: String::new(),
            partial: Vec::new(),
            max_len,
            last_was_cr: false,
        }
    }

    /// Text typed so far on the current line
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Process a chunk of input
    pub fn feed(&mut self, data: &[u8]) -> Vec<LineInput> {
        let mut out = Vec::new();
        let mut echo = String::new();

        for c in self.decode(data).chars() {
            let after_cr = std::mem::replace(&mut self.last_was_cr, false);

            match c {
                CTRL_C | CTRL_D => {
                    flush(&mut echo, &mut out);
                    out.push(LineInput::Interrupt);
                    return out;
                }
                '\n' if after_cr => {}
                '\r' | '\n' => {
                    self.last_was_cr = c == '\r';
                    echo.push_str("\r\n");
                    flush(&mut echo, &mut out);
                    let line = std::mem::take(&mut self.buffer);
                    if !line.trim().is_empty() {
                        out.push(LineInput::Line(line));
                    }
                }
                BACKSPACE | DELETE => {
                    if self.buffer.pop().is_some() {
                        echo.push_str("\u{8} \u{8}");
                    }
                }
                c if c.is_control() => {}
                c if self.buffer.len() + c.len_utf8() > self.max_len => {}
                c => {
                    self.buffer.push(c);
                    echo.push(c);
                }
            }
        }

        flush(&mut echo, &mut out);
        out
    }

    /// Decode a chunk, keeping an incomplete trailing character for later
    fn decode(&mut self, data: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.partial);
        bytes.extend_from_slice(data);

        let mut text = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        while !rest.is_empty() {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.partial = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        text
    }
}

fn flush(echo: &mut String, out: &mut Vec<LineInput>) {
    if !echo.is_empty() {
        out.push(LineInput::Echo(std::mem::take(echo)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keystrokes_build_a_line() {
        let mut editor = LineEditor::new();
        assert_eq!(editor.feed(b"h"), vec![LineInput::Echo("h".into())]);
        assert_eq!(editor.feed(b"i"), vec![LineInput::Echo("i".into())]);
        assert_eq!(editor.pending(), "hi");
        assert_eq!(
            editor.feed(b"\r"),
            vec![LineInput::Echo("\r\n".into()), LineInput::Line("hi".into())]
        );
        assert_eq!(editor.pending(), "");
    }

    #[test]
    fn test_crlf_completes_one_line() {
        let mut editor = LineEditor::new();
        let out = editor.feed(b"one\r\ntwo\n");
        assert_eq!(
            out,
            vec![
                LineInput::Echo("one\r\n".into()),
                LineInput::Line("one".into()),
                LineInput::Echo("two\r\n".into()),
                LineInput::Line("two".into()),
            ]
        );
    }

    #[test]
    fn test_backspace() {
        let mut editor = LineEditor::new();
        editor.feed(b"ab");
        assert_eq!(editor.feed(b"\x7f"), vec![LineInput::Echo("\u{8} \u{8}".into())]);
        assert_eq!(editor.pending(), "a");
        editor.feed(b"\x7f");
        assert!(editor.feed(b"\x7f").is_empty());
    }

    #[test]
    fn test_blank_line_not_emitted() {
        let mut editor = LineEditor::new();
        assert_eq!(editor.feed(b"   \r"), vec![LineInput::Echo("   \r\n".into())]);
    }

    #[test]
    fn test_interrupt_stops_processing() {
        let mut editor = LineEditor::new();
        assert_eq!(
            editor.feed(b"x\x03y"),
            vec![LineInput::Echo("x".into()), LineInput::Interrupt]
        );
        assert_eq!(editor.feed(b"\x04"), vec![LineInput::Interrupt]);
    }

    #[test]
    fn test_character_split_across_chunks() {
        let mut editor = LineEditor::new();
        let bytes = "é".as_bytes();

        assert!(editor.feed(&bytes[..1]).is_empty());
        assert_eq!(editor.feed(&bytes[1..]), vec![LineInput::Echo("é".into())]);
        assert_eq!(
            editor.feed(b"\r"),
            vec![LineInput::Echo("\r\n".into()), LineInput::Line("é".into())]
        );
    }

    #[test]
    fn test_four_byte_character_in_three_chunks() {
        let mut editor = LineEditor::new();
        let bytes = "🦀".as_bytes();

        editor.feed(&bytes[..1]);
        editor.feed(&bytes[1..3]);
        editor.feed(&bytes[3..]);
        assert_eq!(editor.pending(), "🦀");
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        let mut editor = LineEditor::new();
        editor.feed(b"a\xffb");
        assert_eq!(editor.pending(), "a\u{fffd}b");
    }

    #[test]
    fn test_line_length_limit() {
        let mut editor = LineEditor::with_max_len(4);
        let chunk = vec![b'x'; 32 * 1024];
        for _ in 0..64 {
            editor.feed(&chunk);
        }
        assert_eq!(editor.pending(), "xxxx");

        // A multi-byte character that does not fit is dropped whole
        let mut editor = LineEditor::with_max_len(4);
        editor.feed("abcé".as_bytes());
        assert_eq!(editor.pending(), "abc");

        assert_eq!(
            editor.feed(b"\r"),
            vec![LineInput::Echo("\r\n".into()), LineInput::Line("abc".into())]
        );
        editor.feed(b"wxyz");
        assert_eq!(editor.pending(), "wxyz");
    }

    #[test]
    fn test_backspace_after_limit_frees_room() {
        let mut editor = LineEditor::with_max_len(2);
        editor.feed(b"abc\x7fd");
        assert_eq!(editor.pending(), "ad");
    }

    #[test]
    fn test_escape_sequences_dropped() {
        let mut editor = LineEditor::new();
        editor.feed(b"\x1b");
        assert_eq!(editor.pending(), "");
    }
}
