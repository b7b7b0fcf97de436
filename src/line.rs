//! Binary-safe line framing for the MUCK text stream

use std::collections::VecDeque;

/// Splits incoming bytes into lines without decoding them
///
/// Lines end at `\n`, and one `\r` before it is dropped. A partial line
/// that grows past `max_line_length` is handed out on its own so a server
/// that never sends a newline cannot grow the buffer forever.
#[derive(Debug)]
pub struct LineBuffer {
    pending: VecDeque<u8>,
    unread: VecDeque<Vec<u8>>,
    max_line_length: usize,
}

impl LineBuffer {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            unread: VecDeque::new(),
            max_line_length: max_line_length.max(1),
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.pending.extend(data);
    }

    /// Next complete line, unread lines first
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        if let Some(line) = self.unread.pop_front() {
            return Some(line);
        }

        match self.pending.iter().position(|&b| b == b'\n') {
            Some(end) => {
                let mut line: Vec<u8> = self.pending.drain(..=end).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                Some(line)
            }
            None if self.unterminated_len() > self.max_line_length => {
                tracing::warn!(
                    "Line exceeded {} bytes without a newline; splitting it",
                    self.max_line_length
                );
                let split = self.split_point();
                Some(self.pending.drain(..split).collect())
            }
            None => None,
        }
    }

    /// Pending length, not counting a trailing `\r` that may start a CRLF
    fn unterminated_len(&self) -> usize {
        match self.pending.back() {
            Some(b'\r') => self.pending.len() - 1,
            _ => self.pending.len(),
        }
    }

    /// Where to cut an overlong line: `max_line_length`, moved back to the
    /// start of a UTF-8 sequence when that would cut a character
    fn split_point(&self) -> usize {
        let max = self.max_line_length;
        (max.saturating_sub(3)..=max)
            .rev()
            .find(|&i| i > 0 && !is_continuation_byte(self.pending[i]))
            .unwrap_or(max)
    }

    /// Put a line back so the next `next_line` returns it
    pub fn push_front(&mut self, line: Vec<u8>) {
        self.unread.push_front(line);
    }

    /// Whatever is left of an unterminated line, for use at end of stream
    pub fn take_partial(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            return None;
        }
        let mut partial: Vec<u8> = self.pending.drain(..).collect();
        if partial.last() == Some(&b'\r') {
            partial.pop();
        }
        Some(partial)
    }

    /// Up to `max` raw bytes; unread lines come back with CRLF terminators
    pub fn take_bytes(&mut self, max: usize) -> Vec<u8> {
        while let Some(mut line) = self.unread.pop_back() {
            line.extend_from_slice(b"\r\n");
            for byte in line.into_iter().rev() {
                self.pending.push_front(byte);
            }
        }

        let count = max.min(self.pending.len());
        self.pending.drain(..count).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.unread.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.unread.clear();
    }
}

fn is_continuation_byte(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crlf_and_lf_framing() {
        let mut buffer = LineBuffer::new(1024);
        buffer.push(b"first\r\nsecond\n\r\nthird");

        assert_eq!(buffer.next_line().unwrap(), b"first");
        assert_eq!(buffer.next_line().unwrap(), b"second");
        assert_eq!(buffer.next_line().unwrap(), b"");
        assert!(buffer.next_line().is_none());
        assert!(!buffer.is_empty());

        buffer.push(b" line\r\n");
        assert_eq!(buffer.next_line().unwrap(), b"third line");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_crlf_split_across_pushes() {
        let mut buffer = LineBuffer::new(1024);
        buffer.push(b"look\r");
        assert!(buffer.next_line().is_none());
        buffer.push(b"\n");
        assert_eq!(buffer.next_line().unwrap(), b"look");
    }

    #[test]
    fn test_bytes_are_not_decoded() {
        let mut buffer = LineBuffer::new(1024);
        buffer.push(b"\xff\xfe bad utf8\n");
        assert_eq!(buffer.next_line().unwrap(), b"\xff\xfe bad utf8");
    }

    #[test]
    fn test_overlong_partial_line_is_split() {
        let mut buffer = LineBuffer::new(4);
        buffer.push(b"abcdefg");

        assert_eq!(buffer.next_line().unwrap(), b"abcd");
        assert!(buffer.next_line().is_none());
        assert_eq!(buffer.take_partial().unwrap(), b"efg");
        assert!(buffer.take_partial().is_none());
    }

    #[test]
    fn test_overlong_split_keeps_crlf_together() {
        let mut buffer = LineBuffer::new(4);
        buffer.push(b"abcd\r");
        assert!(buffer.next_line().is_none());

        buffer.push(b"\nnext\n");
        assert_eq!(buffer.next_line().unwrap(), b"abcd");
        assert_eq!(buffer.next_line().unwrap(), b"next");
        assert!(buffer.next_line().is_none());
    }

    #[test]
    fn test_overlong_split_keeps_characters_whole() {
        let mut buffer = LineBuffer::new(4);
        buffer.push("abc\u{e9}x".as_bytes());

        assert_eq!(buffer.next_line().unwrap(), b"abc");
        assert_eq!(buffer.take_partial().unwrap(), "\u{e9}x".as_bytes());

        buffer.push("\u{20ac}\u{20ac}\u{20ac}".as_bytes());
        let first = buffer.next_line().unwrap();
        assert_eq!(String::from_utf8(first).unwrap(), "\u{20ac}");
    }

    #[test]
    fn test_unread_lines_come_first() {
        let mut buffer = LineBuffer::new(1024);
        buffer.push(b"two\n");
        buffer.push_front(b"one".to_vec());

        assert_eq!(buffer.next_line().unwrap(), b"one");
        assert_eq!(buffer.next_line().unwrap(), b"two");
    }

    #[test]
    fn test_take_bytes_restores_terminators() {
        let mut buffer = LineBuffer::new(1024);
        buffer.push(b"rest\npartial");
        buffer.push_front(b"back".to_vec());

        assert_eq!(buffer.take_bytes(6), b"back\r\n");
        assert_eq!(buffer.take_bytes(100), b"rest\npartial");
        assert!(buffer.is_empty());
    }
}
