//! Ticket body decoder.
//!
//! DESIGN
//! ======
//! Ticket bodies arrive from an external system in one of two shapes:
//!
//! - plain text, rendered as a single customer bubble
//! - a JSON array of `{text?, picture?, role?}` records
//!
//! A record's `text` is sometimes an object serialized into a string with
//! loose quoting (`{size: L}`, `{'size':'L'}`, `{\"size\":\"L\"}`). Those are
//! read with a small recursive-descent parser ([`parse_lenient_object`])
//! whose failures are enumerated by [`LenientError`]; any failure falls
//! back to showing the text verbatim.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Customer,
    Support,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BubbleBody {
    Text(String),
    Fields(Vec<Field>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bubble {
    pub side: Side,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<BubbleBody>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// Decode a raw ticket body into display bubbles.
#[must_use]
pub fn render_ticket_body(raw: &str) -> Vec<Bubble> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(records)) => records.iter().filter_map(render_record).collect(),
        Ok(Value::String(text)) if !text.trim().is_empty() => vec![customer_text(text)],
        Ok(Value::String(_)) => Vec::new(),
        _ => vec![customer_text(raw.to_string())],
    }
}

fn customer_text(text: String) -> Bubble {
    Bubble { side: Side::Customer, body: Some(BubbleBody::Text(text)), images: Vec::new() }
}

fn render_record(record: &Value) -> Option<Bubble> {
    let record = match record {
        Value::Object(map) => map,
        Value::String(text) if !text.trim().is_empty() => return Some(customer_text(text.clone())),
        _ => return None,
    };

    let side = match record.get("role").and_then(Value::as_str) {
        None | Some("customer") => Side::Customer,
        Some(_) => Side::Support,
    };
    let images: Vec<String> = record
        .get("picture")
        .and_then(Value::as_str)
        .map(|p| p.split(';').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect())
        .unwrap_or_default();
    let body = record.get("text").and_then(render_text);

    if body.is_none() && images.is_empty() {
        return None;
    }
    Some(Bubble { side, body, images })
}

fn render_text(text: &Value) -> Option<BubbleBody> {
    match text {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(decode_text(s)),
        Value::Object(map) => Some(BubbleBody::Fields(
            map.iter()
                .map(|(label, value)| Field { label: label.clone(), value: scalar_text(value) })
                .collect(),
        )),
        other => Some(BubbleBody::Text(other.to_string())),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Text that looks like an object becomes fields; anything else stays text.
fn decode_text(text: &str) -> BubbleBody {
    let trimmed = text.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return BubbleBody::Text(text.to_string());
    }
    match parse_lenient_object(trimmed) {
        Ok(fields) if !fields.is_empty() => BubbleBody::Fields(
            fields.into_iter().map(|(label, value)| Field { label, value }).collect(),
        ),
        Ok(_) => BubbleBody::Text(text.to_string()),
        Err(e) => {
            debug!(error = %e, "ticket body: object-like text kept verbatim");
            BubbleBody::Text(text.to_string())
        }
    }
}

// =============================================================================
// LENIENT OBJECT PARSER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LenientError {
    #[error("expected '{expected}' at {at}")]
    Expected { expected: char, at: usize },

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unterminated string starting at {at}")]
    UnterminatedString { at: usize },

    #[error("empty key at {at}")]
    EmptyKey { at: usize },

    #[error("trailing input at {at}")]
    TrailingInput { at: usize },
}

/// Parse a loosely quoted flat object into ordered `(key, value)` pairs.
///
/// Keys and values may be double-quoted, single-quoted, quoted with
/// backslash-escaped double quotes, or bare. Nested objects and arrays are
/// returned as their source text.
///
/// # Errors
///
/// Returns a [`LenientError`] describing the first position that does not
/// fit the grammar.
pub fn parse_lenient_object(input: &str) -> Result<Vec<(String, String)>, LenientError> {
    let mut parser = Parser { chars: input.chars().collect(), pos: 0 };
    let fields = parser.object()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(LenientError::TrailingInput { at: parser.pos });
    }
    Ok(fields)
}

/// Quote styles accepted around keys and values.
#[derive(Clone, Copy)]
enum Quote {
    Double,
    Single,
    EscapedDouble,
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), LenientError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(LenientError::Expected { expected, at: self.pos }),
            None => Err(LenientError::UnexpectedEnd),
        }
    }

    fn object(&mut self) -> Result<Vec<(String, String)>, LenientError> {
        self.skip_ws();
        self.expect('{')?;
        let mut fields = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(fields);
            }
            let key_at = self.pos;
            let key = self.scalar(&[':'])?;
            if key.is_empty() {
                return Err(LenientError::EmptyKey { at: key_at });
            }
            self.skip_ws();
            self.expect(':')?;
            self.skip_ws();
            let value = match self.peek() {
                Some('{') => self.balanced('{', '}')?,
                Some('[') => self.balanced('[', ']')?,
                _ => self.scalar(&[',', '}'])?,
            };
            fields.push((key, value));
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {
                    self.pos += 1;
                    return Ok(fields);
                }
                Some(_) => return Err(LenientError::Expected { expected: ',', at: self.pos }),
                None => return Err(LenientError::UnexpectedEnd),
            }
        }
    }

    fn opening_quote(&self) -> Option<Quote> {
        match (self.peek(), self.peek_at(1)) {
            (Some('"'), _) => Some(Quote::Double),
            (Some('\''), _) => Some(Quote::Single),
            (Some('\\'), Some('"')) => Some(Quote::EscapedDouble),
            _ => None,
        }
    }

    /// A quoted string, or bare text up to one of `stops`.
    fn scalar(&mut self, stops: &[char]) -> Result<String, LenientError> {
        if let Some(quote) = self.opening_quote() {
            return self.quoted(quote);
        }
        let start = self.pos;
        while let Some(c) = self.peek() {
            if stops.contains(&c) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start && self.peek().is_none() {
            return Err(LenientError::UnexpectedEnd);
        }
        Ok(self.chars[start..self.pos].iter().collect::<String>().trim().to_string())
    }

    fn quoted(&mut self, quote: Quote) -> Result<String, LenientError> {
        let start = self.pos;
        self.pos += match quote {
            Quote::EscapedDouble => 2,
            Quote::Double | Quote::Single => 1,
        };
        let mut out = String::new();
        while let Some(c) = self.peek() {
            match (quote, c) {
                (Quote::Double, '"') | (Quote::Single, '\'') => {
                    self.pos += 1;
                    return Ok(out);
                }
                (Quote::EscapedDouble, '\\') if self.peek_at(1) == Some('"') => {
                    self.pos += 2;
                    return Ok(out);
                }
                (_, '\\') => {
                    let Some(escaped) = self.peek_at(1) else {
                        break;
                    };
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                    self.pos += 2;
                }
                _ => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
        Err(LenientError::UnterminatedString { at: start })
    }

    /// Source text of a nested `open`..`close` group, quotes respected.
    fn balanced(&mut self, open: char, close: char) -> Result<String, LenientError> {
        let start = self.pos;
        let mut depth = 0usize;
        let mut in_string: Option<char> = None;
        while let Some(c) = self.peek() {
            self.pos += 1;
            match in_string {
                Some(_) if c == '\\' => self.pos += 1,
                Some(q) if c == q => in_string = None,
                Some(_) => {}
                None if c == '"' || c == '\'' => in_string = Some(c),
                None if c == open => depth += 1,
                None if c == close => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(self.chars[start..self.pos].iter().collect());
                    }
                }
                None => {}
            }
        }
        Err(LenientError::UnexpectedEnd)
    }
}

#[cfg(test)]
#[path = "ticket_body_test.rs"]
mod tests;
