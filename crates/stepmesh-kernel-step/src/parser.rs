//! Part 21 parser: builds a raw entity graph from tokens.
//!
//! Entities are kept uninterpreted: an ID, a type name and nested argument
//! values. Complex instances (`#7 = (A() B());`) are stored under
//! [`COMPLEX_INSTANCE`] with one [`StepValue::Typed`] argument per part.

use crate::error::StepError;
use crate::lexer::{Lexer, SpannedToken, Token};
use std::collections::HashMap;

/// Type name given to complex (multi-part) entity instances.
pub const COMPLEX_INSTANCE: &str = "COMPLEX_INSTANCE";

/// Deepest list or typed-value nesting accepted in an argument list.
pub const MAX_NESTING: usize = 64;

/// A single argument value in a STEP entity.
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    /// Entity reference (e.g., `#123`).
    EntityRef(u64),
    /// String literal.
    String(String),
    /// Binary literal, as hex text.
    Binary(String),
    /// Real number.
    Real(f64),
    /// Integer number.
    Integer(i64),
    /// Enumeration (e.g., `.T.`).
    Enum(String),
    /// List of values (nested in parentheses).
    List(Vec<StepValue>),
    /// Derived value (`*`).
    Derived,
    /// Unset value (`$`).
    Null,
    /// Typed value, `TYPE_NAME(args)`, either inline or a complex part.
    Typed {
        /// The type name.
        type_name: String,
        /// Arguments.
        args: Vec<StepValue>,
    },
}

impl StepValue {
    /// Try to get as an entity reference.
    pub fn as_entity_ref(&self) -> Option<u64> {
        match self {
            StepValue::EntityRef(id) => Some(*id),
            _ => None,
        }
    }

    /// Try to get as a real number (also accepts integers and typed measures).
    pub fn as_real(&self) -> Option<f64> {
        match self {
            StepValue::Real(v) => Some(*v),
            StepValue::Integer(v) => Some(*v as f64),
            StepValue::Typed { args, .. } if args.len() == 1 => args[0].as_real(),
            _ => None,
        }
    }

    /// Try to get as a string.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            StepValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as an enum.
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            StepValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as a list.
    pub fn as_list(&self) -> Option<&[StepValue]> {
        match self {
            StepValue::List(v) => Some(v),
            _ => None,
        }
    }

    /// Check if this is an unset value.
    pub fn is_null(&self) -> bool {
        matches!(self, StepValue::Null)
    }
}

/// A parsed STEP entity.
#[derive(Debug, Clone)]
pub struct StepEntity {
    /// Entity ID (from `#123`).
    pub id: u64,
    /// Entity type name (e.g., `CARTESIAN_POINT`).
    pub type_name: String,
    /// Arguments to the entity constructor.
    pub args: Vec<StepValue>,
}

impl StepEntity {
    /// Whether this is a complex instance.
    pub fn is_complex(&self) -> bool {
        self.type_name == COMPLEX_INSTANCE
    }

    /// Whether this entity is, or has a complex part, of the given type.
    pub fn has_type(&self, type_name: &str) -> bool {
        self.type_name == type_name || self.part(type_name).is_some()
    }

    /// Extract a named part of a complex instance as a standalone entity
    /// sharing this entity's ID.
    pub fn part(&self, type_name: &str) -> Option<StepEntity> {
        if !self.is_complex() {
            return None;
        }
        self.args.iter().find_map(|value| match value {
            StepValue::Typed { type_name: t, args } if t == type_name => Some(StepEntity {
                id: self.id,
                type_name: t.clone(),
                args: args.clone(),
            }),
            _ => None,
        })
    }
}

/// The data section of a STEP file.
#[derive(Debug, Clone)]
pub struct StepFile {
    /// Data section entities, indexed by ID.
    pub entities: HashMap<u64, StepEntity>,
    /// Factor converting the file's length unit to millimetres.
    pub length_scale: f64,
    /// Factor converting the file's plane angle unit to radians.
    pub angle_scale: f64,
}

impl Default for StepFile {
    fn default() -> Self {
        Self {
            entities: HashMap::new(),
            length_scale: 1.0,
            angle_scale: 1.0,
        }
    }
}

impl StepFile {
    /// Get an entity by ID, returning an error if not found.
    pub fn require(&self, id: u64) -> Result<&StepEntity, StepError> {
        self.entities.get(&id).ok_or(StepError::MissingEntity(id))
    }

    /// All entities of a given type, sorted by ID.
    pub fn entities_of_type(&self, type_name: &str) -> Vec<&StepEntity> {
        let mut found: Vec<_> = self
            .entities
            .values()
            .filter(|e| e.type_name == type_name)
            .collect();
        found.sort_by_key(|e| e.id);
        found
    }

    /// All complex instances containing a part of the given type, sorted by ID.
    pub fn complex_with_part(&self, type_name: &str) -> Vec<&StepEntity> {
        let mut found: Vec<_> = self
            .entities
            .values()
            .filter(|e| e.is_complex() && e.part(type_name).is_some())
            .collect();
        found.sort_by_key(|e| e.id);
        found
    }
}

/// Parser for Part 21 STEP files.
pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    /// Parse a STEP file from bytes.
    pub fn parse(input: &[u8]) -> Result<StepFile, StepError> {
        let tokens = Lexer::new(input).tokenize()?;
        Parser { tokens, pos: 0 }.parse_file()
    }

    fn parse_file(&mut self) -> Result<StepFile, StepError> {
        let mut file = StepFile::default();

        self.expect_keyword("ISO-10303-21")?;
        self.expect_token(&Token::Semicolon)?;

        loop {
            let Some(keyword) = self.peek_keyword() else {
                return Err(self.unexpected("section keyword"));
            };
            match keyword {
                "HEADER" => {
                    self.advance();
                    self.expect_token(&Token::Semicolon)?;
                    self.skip_header()?;
                    self.expect_keyword("ENDSEC")?;
                    self.expect_token(&Token::Semicolon)?;
                }
                "DATA" => {
                    self.advance();
                    // DATA may carry a parameter list in editions >= 3.
                    if self.check_token(&Token::LParen) {
                        self.parse_list(0)?;
                    }
                    self.expect_token(&Token::Semicolon)?;
                    self.parse_data_section(&mut file)?;
                    self.expect_keyword("ENDSEC")?;
                    self.expect_token(&Token::Semicolon)?;
                }
                "END-ISO-10303-21" => {
                    self.advance();
                    self.expect_token(&Token::Semicolon)?;
                    return Ok(file);
                }
                _ => return Err(self.unexpected("section keyword")),
            }
        }
    }

    fn skip_header(&mut self) -> Result<(), StepError> {
        while !self.check_keyword("ENDSEC") {
            if self.peek_keyword().is_none() {
                return Err(self.unexpected("header entity"));
            }
            self.advance();
            self.parse_list(0)?;
            self.expect_token(&Token::Semicolon)?;
        }
        Ok(())
    }

    fn parse_data_section(&mut self, file: &mut StepFile) -> Result<(), StepError> {
        while !self.check_keyword("ENDSEC") {
            let Some(Token::EntityRef(id)) = self.peek().map(|t| &t.token) else {
                return Err(self.unexpected("entity instance"));
            };
            let id = *id;
            self.advance();
            self.expect_token(&Token::Equals)?;

            let entity = match self.peek().map(|t| t.token.clone()) {
                Some(Token::Keyword(type_name)) => {
                    self.advance();
                    let args = self.parse_list(0).map_err(|e| with_entity(e, id))?;
                    StepEntity { id, type_name, args }
                }
                Some(Token::LParen) => {
                    let args = self.parse_complex_parts(id)?;
                    StepEntity {
                        id,
                        type_name: COMPLEX_INSTANCE.to_string(),
                        args,
                    }
                }
                other => {
                    return Err(StepError::parser(
                        Some(id),
                        format!("expected type name, got {other:?}"),
                    ));
                }
            };
            self.expect_token(&Token::Semicolon)
                .map_err(|e| with_entity(e, id))?;

            if file.entities.insert(id, entity).is_some() {
                return Err(StepError::parser(Some(id), "duplicate entity ID"));
            }
        }
        Ok(())
    }

    /// `( NAME(args) NAME(args) ... )` with no separators between parts.
    fn parse_complex_parts(&mut self, id: u64) -> Result<Vec<StepValue>, StepError> {
        self.expect_token(&Token::LParen)?;
        let mut parts = Vec::new();
        while !self.check_token(&Token::RParen) {
            let Some(Token::Keyword(type_name)) = self.peek().map(|t| t.token.clone()) else {
                return Err(with_entity(self.unexpected("complex instance part"), id));
            };
            self.advance();
            let args = self.parse_list(1).map_err(|e| with_entity(e, id))?;
            parts.push(StepValue::Typed { type_name, args });
        }
        self.advance();
        if parts.is_empty() {
            return Err(StepError::parser(Some(id), "empty complex instance"));
        }
        Ok(parts)
    }

    /// `( value, value, ... )` at nesting level `depth`.
    fn parse_list(&mut self, depth: usize) -> Result<Vec<StepValue>, StepError> {
        if depth >= MAX_NESTING {
            return Err(self.unexpected_nesting());
        }
        self.expect_token(&Token::LParen)?;
        let mut values = Vec::new();
        if !self.check_token(&Token::RParen) {
            values.push(self.parse_value(depth)?);
            while self.check_token(&Token::Comma) {
                self.advance();
                values.push(self.parse_value(depth)?);
            }
        }
        self.expect_token(&Token::RParen)?;
        Ok(values)
    }

    fn parse_value(&mut self, depth: usize) -> Result<StepValue, StepError> {
        let Some(token) = self.peek().map(|t| t.token.clone()) else {
            return Err(self.unexpected("value"));
        };
        let value = match token {
            Token::LParen => return self.parse_list(depth + 1).map(StepValue::List),
            Token::Keyword(type_name) => {
                self.advance();
                let args = self.parse_list(depth + 1)?;
                return Ok(StepValue::Typed { type_name, args });
            }
            Token::EntityRef(id) => StepValue::EntityRef(id),
            Token::String(s) => StepValue::String(s),
            Token::Binary(b) => StepValue::Binary(b),
            Token::Real(v) => StepValue::Real(v),
            Token::Integer(v) => StepValue::Integer(v),
            Token::Enum(s) => StepValue::Enum(s),
            Token::Asterisk => StepValue::Derived,
            Token::Dollar => StepValue::Null,
            _ => return Err(self.unexpected("value")),
        };
        self.advance();
        Ok(value)
    }

    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn peek_keyword(&self) -> Option<&str> {
        match self.peek() {
            Some(SpannedToken {
                token: Token::Keyword(k),
                ..
            }) => Some(k),
            _ => None,
        }
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn check_token(&self, expected: &Token) -> bool {
        self.peek().is_some_and(|t| &t.token == expected)
    }

    fn check_keyword(&self, name: &str) -> bool {
        self.peek_keyword() == Some(name)
    }

    fn unexpected(&self, wanted: &str) -> StepError {
        match self.peek() {
            Some(t) => StepError::parser(
                None,
                format!(
                    "expected {wanted} at line {}, column {}, got {:?}",
                    t.pos.line, t.pos.col, t.token
                ),
            ),
            None => StepError::parser(None, format!("expected {wanted}, got end of file")),
        }
    }

    fn unexpected_nesting(&self) -> StepError {
        match self.peek() {
            Some(t) => StepError::parser(
                None,
                format!(
                    "nesting too deep at line {}, column {} (limit {MAX_NESTING})",
                    t.pos.line, t.pos.col
                ),
            ),
            None => StepError::parser(None, "nesting too deep"),
        }
    }

    fn expect_token(&mut self, expected: &Token) -> Result<(), StepError> {
        if self.check_token(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("{expected:?}")))
        }
    }

    fn expect_keyword(&mut self, name: &str) -> Result<(), StepError> {
        if self.check_keyword(name) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("keyword '{name}'")))
        }
    }
}

fn with_entity(err: StepError, id: u64) -> StepError {
    match err {
        StepError::Parser {
            entity_id: None,
            message,
        } => StepError::Parser {
            entity_id: Some(id),
            message,
        },
        other => other,
    }
}
