//! Attribute Data Parser
//!
//! Component data is written inline in markup, e.g. `fly-data="{count: 5}"`.
//! The accepted grammar is JSON relaxed in the ways hand-written attribute
//! values tend to need:
//!
//! - object keys may be bare identifiers (`{count: 5}`)
//! - strings may be single- or double-quoted
//! - arrays and objects may end with a trailing comma
//! - `undefined` is accepted and read as `null`
//!
//! Nothing is evaluated. The result is a plain [`serde_json::Value`].

use serde_json::{Map, Number, Value};

use crate::error::{ComponentError, DataError};

/// How deeply arrays and objects may nest.
pub const MAX_DEPTH: usize = 128;

/// Parse a complete attribute value.
pub fn parse(input: &str) -> Result<Value, DataError> {
    let mut parser = Parser {
        src: input,
        pos: 0,
        depth: 0,
    };
    parser.skip_whitespace();
    let value = parser.value()?;
    parser.skip_whitespace();
    if parser.pos < input.len() {
        return Err(DataError::TrailingInput { offset: parser.pos });
    }
    Ok(value)
}

/// Parse component data, which must be a non-empty object.
pub fn parse_component_data(input: &str, prefix: &str) -> Result<Map<String, Value>, ComponentError> {
    match parse(input)? {
        Value::Object(map) if !map.is_empty() => Ok(map),
        _ => Err(ComponentError::InvalidData {
            prefix: prefix.to_string(),
        }),
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn expect(&mut self, wanted: char, expected: &'static str) -> Result<(), DataError> {
        match self.peek() {
            Some(c) if c == wanted => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(found) => Err(DataError::UnexpectedChar {
                found,
                offset: self.pos,
                expected,
            }),
            None => Err(DataError::UnexpectedEnd { expected }),
        }
    }

    fn value(&mut self) -> Result<Value, DataError> {
        const EXPECTED: &str = "a value";
        match self.peek() {
            None => Err(DataError::UnexpectedEnd { expected: EXPECTED }),
            Some('{') => self.nested(Self::object),
            Some('[') => self.nested(Self::array),
            Some(quote @ ('"' | '\'')) => self.string(quote).map(Value::String),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(c) if is_ident_start(c) => {
                let start = self.pos;
                match self.identifier() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    "null" | "undefined" => Ok(Value::Null),
                    _ => Err(DataError::UnexpectedChar {
                        found: c,
                        offset: start,
                        expected: EXPECTED,
                    }),
                }
            }
            Some(found) => Err(DataError::UnexpectedChar {
                found,
                offset: self.pos,
                expected: EXPECTED,
            }),
        }
    }

    fn nested(&mut self, parse: fn(&mut Self) -> Result<Value, DataError>) -> Result<Value, DataError> {
        if self.depth == MAX_DEPTH {
            return Err(DataError::TooDeep { offset: self.pos });
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn object(&mut self) -> Result<Value, DataError> {
        self.expect('{', "'{'")?;
        let mut map = Map::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }

            let key = self.key()?;
            self.skip_whitespace();
            self.expect(':', "':'")?;
            self.skip_whitespace();
            let value = self.value()?;
            map.insert(key, value);

            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                Some(found) => {
                    return Err(DataError::UnexpectedChar {
                        found,
                        offset: self.pos - found.len_utf8(),
                        expected: "',' or '}'",
                    })
                }
                None => {
                    return Err(DataError::UnexpectedEnd {
                        expected: "',' or '}'",
                    })
                }
            }
        }
    }

    fn key(&mut self) -> Result<String, DataError> {
        const EXPECTED: &str = "an object key";
        match self.peek() {
            Some(quote @ ('"' | '\'')) => self.string(quote),
            Some(c) if is_ident_start(c) => Ok(self.identifier().to_string()),
            Some(found) => Err(DataError::UnexpectedChar {
                found,
                offset: self.pos,
                expected: EXPECTED,
            }),
            None => Err(DataError::UnexpectedEnd { expected: EXPECTED }),
        }
    }

    fn array(&mut self) -> Result<Value, DataError> {
        self.expect('[', "'['")?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(']') {
                self.pos += 1;
                return Ok(Value::Array(items));
            }

            items.push(self.value()?);

            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(Value::Array(items)),
                Some(found) => {
                    return Err(DataError::UnexpectedChar {
                        found,
                        offset: self.pos - found.len_utf8(),
                        expected: "',' or ']'",
                    })
                }
                None => {
                    return Err(DataError::UnexpectedEnd {
                        expected: "',' or ']'",
                    })
                }
            }
        }
    }

    fn identifier(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !is_ident_continue(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }

    fn string(&mut self, quote: char) -> Result<String, DataError> {
        self.pos += quote.len_utf8();
        let mut out = String::new();
        loop {
            let offset = self.pos;
            match self.bump() {
                None => return Err(DataError::UnexpectedEnd { expected: "closing quote" }),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.escape(offset)?),
                Some(c) => out.push(c),
            }
        }
    }

    fn escape(&mut self, offset: usize) -> Result<char, DataError> {
        let c = match self.bump() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('b') => '\u{0008}',
            Some('f') => '\u{000C}',
            Some('0') => '\0',
            Some('u') => {
                let hex = self
                    .src
                    .get(self.pos..self.pos + 4)
                    .ok_or(DataError::InvalidEscape { offset })?;
                let code = u32::from_str_radix(hex, 16).map_err(|_| DataError::InvalidEscape { offset })?;
                self.pos += 4;
                char::from_u32(code).ok_or(DataError::InvalidEscape { offset })?
            }
            Some(c @ ('\\' | '/' | '"' | '\'')) => c,
            _ => return Err(DataError::InvalidEscape { offset }),
        };
        Ok(c)
    }

    fn number(&mut self) -> Result<Value, DataError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {}
                '.' | 'e' | 'E' => is_float = true,
                '+' | '-' if is_float => {}
                _ => break,
            }
            self.pos += 1;
        }

        let text = &self.src[start..self.pos];
        let invalid = || DataError::InvalidNumber {
            text: text.to_string(),
            offset: start,
        };

        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Value::Number(n.into()));
            }
            if let Ok(n) = text.parse::<u64>() {
                return Ok(Value::Number(n.into()));
            }
        }
        let n: f64 = text.parse().map_err(|_| invalid())?;
        Number::from_f64(n).map(Value::Number).ok_or_else(invalid)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}
