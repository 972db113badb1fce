//! # Non-blocking line framing over a child's output stream.
//!
//! [`LineReader`] pulls whatever bytes are currently available from a stream
//! whose descriptor is in non-blocking mode and yields completed lines.
//! A trailing fragment without a terminator is carried over and prepended to
//! the next call's input, so line boundaries survive arbitrary chunking.
//!
//! ## Rules
//! - A read that would block means "nothing ready": the call returns an empty vec.
//! - A read of zero bytes means EOF: the carried fragment (if any) is flushed
//!   as a single final element and the reader goes quiet for good.
//! - Terminators are `\n` or `\r\n`; both are stripped from the yielded lines.
//! - At most one mebibyte is drained per call; callers are expected to call
//!   repeatedly from their `while_alive` hook.

use std::io::{ErrorKind, Read};

/// Upper bound on bytes drained in a single `read_lines` call.
const MAX_DRAIN: usize = 1024 * 1024;

const CHUNK: usize = 8 * 1024;

/// Line framer with a carry-over buffer for partial lines.
///
/// The wrapped stream must already be in non-blocking mode; `WouldBlock` is
/// how the reader learns that no more bytes are ready.
#[derive(Debug)]
pub struct LineReader<R> {
    src: R,
    carry: Vec<u8>,
    eof: bool,
}

impl<R: Read> LineReader<R> {
    /// Wraps a non-blocking stream.
    pub fn new(src: R) -> Self {
        Self {
            src,
            carry: Vec::new(),
            eof: false,
        }
    }

    /// Returns true once the stream has reported EOF.
    pub fn at_eof(&self) -> bool {
        self.eof
    }

    /// Returns every complete line currently available, without blocking.
    ///
    /// On EOF the buffered fragment (if any) is returned as one final element;
    /// every later call returns an empty vec.
    pub fn read_lines(&mut self) -> std::io::Result<Vec<String>> {
        if self.eof {
            return Ok(Vec::new());
        }

        let mut drained = 0;
        let mut chunk = [0u8; CHUNK];
        while drained < MAX_DRAIN {
            match self.src.read(&mut chunk) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => {
                    self.carry.extend_from_slice(&chunk[..n]);
                    drained += n;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        let mut lines = self.split_complete();
        if self.eof && !self.carry.is_empty() {
            let tail = std::mem::take(&mut self.carry);
            lines.push(String::from_utf8_lossy(&tail).into_owned());
        }
        Ok(lines)
    }

    /// Splits off every terminated line from the carry buffer, leaving the
    /// unterminated tail in place.
    fn split_complete(&mut self) -> Vec<String> {
        let Some(last) = self.carry.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };
        let complete: Vec<u8> = self.carry.drain(..=last).collect();

        let mut lines: Vec<String> = complete
            .split(|&b| b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect();
        // split() yields one empty remainder after the final terminator
        lines.pop();
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// Replays a script of read outcomes: data, not-ready, or EOF.
    struct Scripted {
        events: VecDeque<Option<Vec<u8>>>,
    }

    impl Scripted {
        fn new(events: Vec<Option<Vec<u8>>>) -> Self {
            Self {
                events: events.into(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.events.pop_front() {
                Some(Some(data)) => {
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(data.len())
                }
                Some(None) | None => Err(io::Error::new(ErrorKind::WouldBlock, "not ready")),
            }
        }
    }

    #[test]
    fn carries_partial_lines_across_calls() {
        let mut r = LineReader::new(Scripted::new(vec![
            Some(b"abc".to_vec()),
            None,
            Some(b"def\nghi\n".to_vec()),
            None,
            Some(b"".to_vec()),
        ]));
        assert_eq!(r.read_lines().unwrap(), Vec::<String>::new());
        assert_eq!(r.read_lines().unwrap(), vec!["abcdef", "ghi"]);
        assert_eq!(r.read_lines().unwrap(), Vec::<String>::new());
        assert!(r.at_eof());
    }

    #[test]
    fn flushes_partial_tail_at_eof() {
        let mut r = LineReader::new(Scripted::new(vec![Some(b"one\ntwo".to_vec()), None, Some(b"".to_vec())]));
        assert_eq!(r.read_lines().unwrap(), vec!["one"]);
        assert_eq!(r.read_lines().unwrap(), vec!["two"]);
        assert_eq!(r.read_lines().unwrap(), Vec::<String>::new());
    }

    #[test]
    fn strips_crlf_terminators() {
        let mut r = LineReader::new(Scripted::new(vec![Some(b"a\r\nb\nc\r\n".to_vec())]));
        assert_eq!(r.read_lines().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn not_ready_yields_nothing() {
        let mut r = LineReader::new(Scripted::new(vec![None, Some(b"x\n".to_vec())]));
        assert_eq!(r.read_lines().unwrap(), Vec::<String>::new());
        assert_eq!(r.read_lines().unwrap(), vec!["x"]);
    }

    #[test]
    fn chunked_contents_reassemble_exactly() {
        // Emitted lines equal the full stream contents split on \r?\n,
        // however the chunks land.
        let mut r = LineReader::new(Scripted::new(vec![
            Some(b"al".to_vec()),
            Some(b"pha\nbe".to_vec()),
            Some(b"ta\r".to_vec()),
            Some(b"\ngam".to_vec()),
            Some(b"ma".to_vec()),
            Some(b"".to_vec()),
        ]));
        let mut all = Vec::new();
        for _ in 0..6 {
            all.extend(r.read_lines().unwrap());
        }
        assert_eq!(all, vec!["alpha", "beta", "gamma"]);
    }
}
