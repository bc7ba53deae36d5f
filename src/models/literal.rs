//! Reader for the Python literals embedded in the backend profile
//!
//! Handles dicts, lists, tuples, quoted strings, numbers, `True`, `False`
//! and `None`. Nothing is evaluated; anything else is a parse error.

use serde_json::{Map, Number, Value};
use std::iter::Peekable;
use std::str::CharIndices;

/// Parse one literal, allowing surrounding whitespace.
pub fn parse_literal(text: &str) -> Result<Value, String> {
    let mut parser = Parser { text, chars: text.char_indices().peekable() };
    let value = parser.value()?;
    parser.skip_whitespace();
    match parser.chars.peek() {
        None => Ok(value),
        Some(&(pos, c)) => Err(format!("unexpected '{}' at {}", c, pos)),
    }
}

struct Parser<'t> {
    text: &'t str,
    chars: Peekable<CharIndices<'t>>,
}

impl Parser<'_> {
    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), String> {
        self.skip_whitespace();
        match self.chars.next() {
            Some((_, c)) if c == wanted => Ok(()),
            Some((pos, c)) => Err(format!("expected '{}', found '{}' at {}", wanted, c, pos)),
            None => Err(format!("expected '{}', found end of input", wanted)),
        }
    }

    fn value(&mut self) -> Result<Value, String> {
        self.skip_whitespace();
        let Some(&(pos, c)) = self.chars.peek() else {
            return Err("unexpected end of input".to_string());
        };
        match c {
            '{' => self.dict(),
            '[' => self.sequence('[', ']'),
            '(' => self.sequence('(', ')'),
            '\'' | '"' => self.string().map(Value::String),
            '-' | '+' | '.' | '0'..='9' => self.number(),
            c if c.is_alphabetic() => self.word(),
            _ => Err(format!("unexpected '{}' at {}", c, pos)),
        }
    }

    /// Items up to `close`, with an optional trailing comma.
    fn items(&mut self, close: char, mut item: impl FnMut(&mut Self) -> Result<(), String>) -> Result<(), String> {
        loop {
            self.skip_whitespace();
            if let Some(&(_, c)) = self.chars.peek() {
                if c == close {
                    self.chars.next();
                    return Ok(());
                }
            }
            item(self)?;
            self.skip_whitespace();
            match self.chars.next() {
                Some((_, ',')) => continue,
                Some((_, c)) if c == close => return Ok(()),
                Some((pos, c)) => return Err(format!("expected ',' or '{}', found '{}' at {}", close, c, pos)),
                None => return Err(format!("missing '{}'", close)),
            }
        }
    }

    fn sequence(&mut self, open: char, close: char) -> Result<Value, String> {
        self.expect(open)?;
        let mut items = Vec::new();
        self.items(close, |p| {
            items.push(p.value()?);
            Ok(())
        })?;
        Ok(Value::Array(items))
    }

    fn dict(&mut self) -> Result<Value, String> {
        self.expect('{')?;
        let mut map = Map::new();
        self.items('}', |p| {
            let key = match p.value()? {
                Value::String(s) => s,
                other => other.to_string(),
            };
            p.expect(':')?;
            map.insert(key, p.value()?);
            Ok(())
        })?;
        Ok(Value::Object(map))
    }

    fn string(&mut self) -> Result<String, String> {
        let Some((start, quote)) = self.chars.next() else {
            return Err("unexpected end of input".to_string());
        };
        let mut out = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                c if c == quote => return Ok(out),
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, '0')) => out.push('\0'),
                    Some((_, other)) => out.push(other),
                    None => break,
                },
                c => out.push(c),
            }
        }
        Err(format!("unterminated string starting at {}", start))
    }

    fn number(&mut self) -> Result<Value, String> {
        let start = self.chars.peek().map(|&(pos, _)| pos).unwrap_or(self.text.len());
        let mut end = start;
        while let Some(&(pos, c)) = self.chars.peek() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
                end = pos + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        let token = &self.text[start..end];
        if let Ok(i) = token.parse::<i64>() {
            return Ok(Value::Number(i.into()));
        }
        token
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("invalid number '{}'", token))
    }

    fn word(&mut self) -> Result<Value, String> {
        let mut word = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        match word.as_str() {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::Null),
            other => Err(format!("'{}' is not a literal", other)),
        }
    }
}
