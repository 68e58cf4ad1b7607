//! Token scanner for legacy assembly-program text
//!
//! Lexes `!!ARBvp1.0` / `!!ARBfp1.0` program text into typed tokens carrying
//! their byte offset. Whitespace and `#` comments advance the cursor without
//! producing tokens. An unrecognized byte sequence yields a `ScanError` with
//! the offending offset; the parser turns it into a user-facing error.

/// Lexical category of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Program-type header (`!!ARBvp1.0` or `!!ARBfp1.0`)
    Header {
        /// True for the vertex-program header
        vertex: bool,
    },
    /// Identifier: opcode, declaration keyword, or register-path component
    Ident,
    /// Integer literal
    Integer,
    /// Floating-point literal
    Float,
    Dot,
    Comma,
    Semicolon,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Equals,
    Plus,
    Minus,
    /// End of input
    Eof,
}

/// A token with its source slice and byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub offset: usize,
}

/// Lexical error at a byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanError {
    pub offset: usize,
}

/// Cursor over assembly-program text
pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Current byte offset of the cursor
    pub fn offset(&self) -> usize {
        self.pos
    }

    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    fn skip_trivia(&mut self) {
        let bytes = self.bytes();
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'#' => {
                    while self.pos < bytes.len() && bytes[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    /// Produce the next token, or `Eof` at end of input
    pub fn next(&mut self) -> Result<Token<'a>, ScanError> {
        self.skip_trivia();
        let bytes = self.bytes();
        let start = self.pos;
        if start >= bytes.len() {
            return Ok(Token {
                kind: TokenKind::Eof,
                text: "",
                offset: start,
            });
        }
        let kind = match bytes[start] {
            b'!' => return self.scan_header(start),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'$' => return Ok(self.scan_ident(start)),
            b'0'..=b'9' => return Ok(self.scan_number(start)),
            b'.' => {
                // `.5` style float literal vs member/swizzle dot; a dot
                // preceded by another dot is the second half of a `..` range
                if start + 1 < bytes.len()
                    && bytes[start + 1].is_ascii_digit()
                    && (start == 0 || bytes[start - 1] != b'.')
                {
                    return Ok(self.scan_number(start));
                }
                TokenKind::Dot
            }
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semicolon,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'=' => TokenKind::Equals,
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            _ => return Err(ScanError { offset: start }),
        };
        self.pos += 1;
        Ok(Token {
            kind,
            text: &self.src[start..start + 1],
            offset: start,
        })
    }

    fn scan_header(&mut self, start: usize) -> Result<Token<'a>, ScanError> {
        let bytes = self.bytes();
        let mut end = start;
        while end < bytes.len() && !bytes[end].is_ascii_whitespace() {
            end += 1;
        }
        let text = &self.src[start..end];
        let vertex = match text {
            "!!ARBvp1.0" => true,
            "!!ARBfp1.0" => false,
            _ => return Err(ScanError { offset: start }),
        };
        self.pos = end;
        Ok(Token {
            kind: TokenKind::Header { vertex },
            text,
            offset: start,
        })
    }

    fn scan_ident(&mut self, start: usize) -> Token<'a> {
        let bytes = self.bytes();
        let mut end = start + 1;
        while end < bytes.len()
            && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_' || bytes[end] == b'$')
        {
            end += 1;
        }
        self.pos = end;
        Token {
            kind: TokenKind::Ident,
            text: &self.src[start..end],
            offset: start,
        }
    }

    fn scan_number(&mut self, start: usize) -> Token<'a> {
        let bytes = self.bytes();
        let mut end = start;
        let mut is_float = false;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end < bytes.len() && bytes[end] == b'.' {
            // A dot only joins the literal when digits follow; `0.x` is the
            // integer 0 and a swizzle
            if end + 1 < bytes.len() && bytes[end + 1].is_ascii_digit() {
                is_float = true;
                end += 1;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
            }
        }
        if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
            let mut exp = end + 1;
            if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
                exp += 1;
            }
            if exp < bytes.len() && bytes[exp].is_ascii_digit() {
                is_float = true;
                end = exp;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
            }
        }
        self.pos = end;
        Token {
            kind: if is_float {
                TokenKind::Float
            } else {
                TokenKind::Integer
            },
            text: &self.src[start..end],
            offset: start,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod tests;
