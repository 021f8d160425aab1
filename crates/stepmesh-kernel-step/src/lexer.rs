//! Part 21 (STEP physical file format) lexer.
//!
//! Produces tokens for keywords (including user-defined `!NAME`), entity
//! references, strings, binary literals, numbers, enumerations and
//! punctuation. Comments `/* ... */` are skipped.

use crate::error::StepError;

/// A token in a STEP file.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Keyword or identifier, uppercased (e.g., `CARTESIAN_POINT`, `DATA`).
    Keyword(String),
    /// Entity reference (`#123` becomes `EntityRef(123)`).
    EntityRef(u64),
    /// String literal (contents without quotes, `''` unescaped).
    String(String),
    /// Binary literal (`"0A1F"`), kept as hex text.
    Binary(String),
    /// Real number.
    Real(f64),
    /// Integer number.
    Integer(i64),
    /// Enumeration (`.T.` becomes `Enum("T")`).
    Enum(String),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `=`
    Equals,
    /// `*` (derived value marker).
    Asterisk,
    /// `$` (unset value marker).
    Dollar,
}

/// Where a token starts in the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub col: usize,
}

/// A token with its position in the source.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    /// The token.
    pub token: Token,
    /// Position where the token starts.
    pub pos: Position,
}

/// Lexer for Part 21 STEP files.
pub struct Lexer<'a> {
    input: &'a [u8],
    offset: usize,
    pos: Position,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            offset: 0,
            pos: Position { line: 1, col: 1 },
        }
    }

    /// Tokenize the entire input.
    pub fn tokenize(&mut self) -> Result<Vec<SpannedToken>, StepError> {
        let mut tokens = Vec::with_capacity(self.input.len() / 4);
        while let Some(tok) = self.next_token()? {
            tokens.push(tok);
        }
        Ok(tokens)
    }

    /// Get the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<SpannedToken>, StepError> {
        self.skip_trivia()?;
        let Some(ch) = self.peek() else {
            return Ok(None);
        };
        let pos = self.pos;

        let token = match ch {
            b'(' | b')' | b',' | b';' | b'=' | b'*' | b'$' => {
                self.bump();
                match ch {
                    b'(' => Token::LParen,
                    b')' => Token::RParen,
                    b',' => Token::Comma,
                    b';' => Token::Semicolon,
                    b'=' => Token::Equals,
                    b'*' => Token::Asterisk,
                    _ => Token::Dollar,
                }
            }
            b'#' => self.entity_ref()?,
            b'\'' => self.string()?,
            b'"' => self.binary()?,
            b'.' if self.peek_at(1).is_some_and(|c| c.is_ascii_alphabetic()) => self.enumeration()?,
            b'-' | b'+' | b'.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit() || c == b'.') => {
                self.number()?
            }
            b'0'..=b'9' => self.number()?,
            b'!' => {
                self.bump();
                match self.keyword() {
                    Token::Keyword(k) if !k.is_empty() => Token::Keyword(format!("!{k}")),
                    _ => return Err(self.error_at(pos, "expected user-defined keyword after '!'")),
                }
            }
            c if c.is_ascii_alphabetic() || c == b'_' => self.keyword(),
            other => {
                return Err(self.error_at(
                    pos,
                    format!("unexpected character: '{}'", other.escape_ascii()),
                ));
            }
        };

        Ok(Some(SpannedToken { token, pos }))
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.offset).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.input.get(self.offset + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.offset += 1;
        if ch == b'\n' {
            self.pos.line += 1;
            self.pos.col = 1;
        } else {
            self.pos.col += 1;
        }
        Some(ch)
    }

    fn take_while(&mut self, mut pred: impl FnMut(u8) -> bool) -> &'a [u8] {
        let input = self.input;
        let start = self.offset;
        while self.peek().is_some_and(&mut pred) {
            self.bump();
        }
        &input[start..self.offset]
    }

    fn error_at(&self, pos: Position, message: impl Into<String>) -> StepError {
        StepError::lexer(pos.line, pos.col, message)
    }

    fn skip_trivia(&mut self) -> Result<(), StepError> {
        loop {
            self.take_while(|c| c.is_ascii_whitespace());
            if self.peek() == Some(b'/') && self.peek_at(1) == Some(b'*') {
                let start = self.pos;
                self.bump();
                self.bump();
                loop {
                    match (self.peek(), self.peek_at(1)) {
                        (Some(b'*'), Some(b'/')) => {
                            self.bump();
                            self.bump();
                            break;
                        }
                        (Some(_), _) => {
                            self.bump();
                        }
                        (None, _) => return Err(self.error_at(start, "unterminated comment")),
                    }
                }
                continue;
            }
            return Ok(());
        }
    }

    fn entity_ref(&mut self) -> Result<Token, StepError> {
        let pos = self.pos;
        self.bump();
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Err(self.error_at(pos, "expected digits after '#'"));
        }
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Token::EntityRef)
            .ok_or_else(|| self.error_at(pos, "entity ID out of range"))
    }

    fn string(&mut self) -> Result<Token, StepError> {
        let pos = self.pos;
        self.bump();
        let mut content = Vec::new();
        loop {
            match self.bump() {
                None => return Err(self.error_at(pos, "unterminated string")),
                Some(b'\'') if self.peek() == Some(b'\'') => {
                    self.bump();
                    content.push(b'\'');
                }
                Some(b'\'') => break,
                Some(b'\r' | b'\n') => {}
                Some(c) => content.push(c),
            }
        }
        Ok(Token::String(String::from_utf8_lossy(&content).into_owned()))
    }

    fn binary(&mut self) -> Result<Token, StepError> {
        let pos = self.pos;
        self.bump();
        let hex = self.take_while(|c| c.is_ascii_hexdigit());
        if self.bump() != Some(b'"') {
            return Err(self.error_at(pos, "unterminated binary literal"));
        }
        Ok(Token::Binary(String::from_utf8_lossy(hex).into_owned()))
    }

    fn enumeration(&mut self) -> Result<Token, StepError> {
        let pos = self.pos;
        self.bump();
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_');
        if self.bump() != Some(b'.') {
            return Err(self.error_at(pos, "unterminated enumeration"));
        }
        Ok(Token::Enum(
            String::from_utf8_lossy(name).to_ascii_uppercase(),
        ))
    }

    fn number(&mut self) -> Result<Token, StepError> {
        let pos = self.pos;
        let start = self.offset;
        let mut is_real = false;

        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.bump();
        }
        self.take_while(|c| c.is_ascii_digit());
        if self.peek() == Some(b'.') {
            is_real = true;
            self.bump();
            self.take_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek(), Some(b'E' | b'e')) {
            is_real = true;
            self.bump();
            if matches!(self.peek(), Some(b'-' | b'+')) {
                self.bump();
            }
            self.take_while(|c| c.is_ascii_digit());
        }

        let text = String::from_utf8_lossy(&self.input[start..self.offset]);
        if is_real {
            // Part 21 allows "1." with no fraction digits; Rust parses that too.
            text.parse()
                .map(Token::Real)
                .map_err(|_| self.error_at(pos, format!("invalid real number: {text}")))
        } else {
            text.parse()
                .map(Token::Integer)
                .map_err(|_| self.error_at(pos, format!("invalid integer: {text}")))
        }
    }

    fn keyword(&mut self) -> Token {
        // Hyphens appear in ISO-10303-21 / END-ISO-10303-21.
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'-');
        Token::Keyword(String::from_utf8_lossy(name).to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<Token> {
        Lexer::new(input.as_bytes())
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|st| st.token)
            .collect()
    }

    #[test]
    fn test_entity_ref() {
        assert_eq!(tokenize("#123"), vec![Token::EntityRef(123)]);
        assert!(Lexer::new(b"#").tokenize().is_err());
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(tokenize("'it''s'"), vec![Token::String("it's".into())]);
        assert_eq!(tokenize("''"), vec![Token::String(String::new())]);
        assert!(Lexer::new(b"'open").tokenize().is_err());
    }

    #[test]
    fn test_enum_and_numbers() {
        assert_eq!(tokenize(".T."), vec![Token::Enum("T".into())]);
        assert_eq!(tokenize("-7"), vec![Token::Integer(-7)]);
        assert_eq!(tokenize("-1.5E-10"), vec![Token::Real(-1.5e-10)]);
        assert_eq!(tokenize("10."), vec![Token::Real(10.0)]);
        assert_eq!(tokenize(".5"), vec![Token::Real(0.5)]);
    }

    #[test]
    fn test_keywords_are_uppercased() {
        assert_eq!(tokenize("data"), vec![Token::Keyword("DATA".into())]);
        assert_eq!(
            tokenize("END-ISO-10303-21"),
            vec![Token::Keyword("END-ISO-10303-21".into())]
        );
        assert_eq!(tokenize("!MY_TYPE"), vec![Token::Keyword("!MY_TYPE".into())]);
    }

    #[test]
    fn test_binary_literal() {
        assert_eq!(tokenize("\"0AF\""), vec![Token::Binary("0AF".into())]);
    }

    #[test]
    fn test_comments_and_positions() {
        let toks = Lexer::new(b"/* a\ncomment */\n  #1").tokenize().unwrap();
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].pos, Position { line: 3, col: 3 });
        assert!(Lexer::new(b"/* never closed").tokenize().is_err());
    }

    #[test]
    fn test_complete_entity() {
        assert_eq!(
            tokenize("#1 = CARTESIAN_POINT('', (0.0, 1.5E-2, -3.));"),
            vec![
                Token::EntityRef(1),
                Token::Equals,
                Token::Keyword("CARTESIAN_POINT".into()),
                Token::LParen,
                Token::String(String::new()),
                Token::Comma,
                Token::LParen,
                Token::Real(0.0),
                Token::Comma,
                Token::Real(0.015),
                Token::Comma,
                Token::Real(-3.0),
                Token::RParen,
                Token::RParen,
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new(b"#1 = @").tokenize().unwrap_err();
        assert!(matches!(err, StepError::Lexer { line: 1, col: 6, .. }));
    }
}
