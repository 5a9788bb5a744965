//! ASCII DXF pair framing.

use std::io::BufRead;

use crate::dxf::code_pair::{parse_value, CodePair, PairSource};
use crate::error::{DwgError, Result};

/// Reads `(code, value)` pairs from line-oriented ASCII DXF.
pub struct TextPairReader<R: BufRead> {
    input: R,
    line: u64,
}

impl<R: BufRead> TextPairReader<R> {
    pub fn new(input: R) -> Self {
        Self { input, line: 0 }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        let mut buf = String::new();
        let n = self.input.read_line(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.line += 1;
        while buf.ends_with(['\n', '\r']) {
            buf.pop();
        }
        Ok(Some(buf))
    }
}

impl<R: BufRead> PairSource for TextPairReader<R> {
    fn next_pair(&mut self) -> Result<Option<CodePair>> {
        let Some(code_line) = self.next_line()? else {
            return Ok(None);
        };
        let code: i16 = code_line.trim().parse().map_err(|_| {
            DwgError::Parse(format!(
                "line {}: expected group code, got {:?}",
                self.line, code_line
            ))
        })?;
        let Some(value_line) = self.next_line()? else {
            return Err(DwgError::Parse(format!(
                "line {}: group code {} without a value",
                self.line, code
            )));
        };
        Ok(Some(CodePair::new(code, parse_value(code, &value_line)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dxf::code_pair::PairValue;

    fn pairs(text: &str) -> Vec<CodePair> {
        let mut r = TextPairReader::new(text.as_bytes());
        let mut out = Vec::new();
        while let Some(p) = r.next_pair().unwrap() {
            out.push(p);
        }
        out
    }

    #[test]
    fn test_basic_pairs() {
        let out = pairs("  0\nSECTION\n  2\nHEADER\n 40\n1.5\n");
        assert_eq!(out.len(), 3);
        assert!(out[0].is_marker("SECTION"));
        assert_eq!(out[1].as_str(), Some("HEADER"));
        assert_eq!(out[2].value, PairValue::F64(1.5));
    }

    #[test]
    fn test_crlf_line_endings() {
        let out = pairs("  0\r\nEOF\r\n");
        assert!(out[0].is_marker("EOF"));
    }

    #[test]
    fn test_truncated_pair() {
        let mut r = TextPairReader::new("  0\n".as_bytes());
        assert!(r.next_pair().is_err());
    }

    #[test]
    fn test_garbage_code() {
        let mut r = TextPairReader::new("notacode\nvalue\n".as_bytes());
        assert!(r.next_pair().is_err());
    }
}
