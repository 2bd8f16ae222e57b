//! Boundary-delimited iteration over the children of a multipart body
//! (RFC 2046 §5.1.1).

use tracing::trace;

use crate::error::{ParseError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    InParts,
    Done,
}

/// A delimiter line found in the body.
struct Delimiter {
    line_start: usize,
    next_line: usize,
    close: bool,
}

/// Iterator over the raw entities (headers and body) of one multipart body.
///
/// Preamble and epilogue are skipped. The line break before each delimiter
/// belongs to the delimiter, not to the part. A body that ends before the
/// close delimiter yields an [`ParseError::UnterminatedMultipart`] error and
/// then stops.
#[derive(Debug)]
pub struct Parts<'a> {
    body: &'a [u8],
    boundary: &'a str,
    pos: usize,
    state: State,
}

impl<'a> Parts<'a> {
    pub fn new(body: &'a [u8], boundary: &'a str) -> Self {
        Self {
            body,
            boundary,
            pos: 0,
            state: State::Preamble,
        }
    }

    /// Find the next delimiter line at or after `from`, which is a line start.
    fn next_delimiter(&self, from: usize) -> Option<Delimiter> {
        let mut line_start = from;
        while line_start < self.body.len() {
            let rest = &self.body[line_start..];
            let (line, next_line) = match rest.iter().position(|&b| b == b'\n') {
                Some(i) => (&rest[..i], line_start + i + 1),
                None => (rest, self.body.len()),
            };
            if let Some(close) = self.match_delimiter(line) {
                trace!(offset = line_start, close, "Found boundary delimiter");
                return Some(Delimiter {
                    line_start,
                    next_line,
                    close,
                });
            }
            line_start = next_line;
        }
        None
    }

    /// `Some(is_close)` if `line` is `--boundary` or `--boundary--`, with
    /// optional trailing whitespace.
    fn match_delimiter(&self, line: &[u8]) -> Option<bool> {
        let rest = line
            .strip_prefix(b"--")?
            .strip_prefix(self.boundary.as_bytes())?;
        let (close, tail) = match rest.strip_prefix(b"--") {
            Some(tail) => (true, tail),
            None => (false, rest),
        };
        tail.iter()
            .all(|b| b.is_ascii_whitespace())
            .then_some(close)
    }

    fn unterminated(&mut self) -> Option<Result<&'a [u8]>> {
        self.state = State::Done;
        Some(Err(ParseError::UnterminatedMultipart(
            self.boundary.to_string(),
        )))
    }
}

impl<'a> Iterator for Parts<'a> {
    type Item = Result<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == State::Preamble {
            let Some(first) = self.next_delimiter(0) else {
                return self.unterminated();
            };
            if first.close {
                self.state = State::Done;
                return None;
            }
            self.pos = first.next_line;
            self.state = State::InParts;
        }
        if self.state == State::Done {
            return None;
        }

        let Some(delim) = self.next_delimiter(self.pos) else {
            return self.unterminated();
        };

        let start = self.pos;
        let mut end = delim.line_start;
        if end > start && self.body[end - 1] == b'\n' {
            end -= 1;
            if end > start && self.body[end - 1] == b'\r' {
                end -= 1;
            }
        }

        if delim.close {
            self.state = State::Done;
        } else {
            self.pos = delim.next_line;
        }
        Some(Ok(&self.body[start..end]))
    }
}
