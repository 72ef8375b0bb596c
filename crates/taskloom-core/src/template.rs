//! `{{ path.to.value | default('literal') }}` substitution.
//!
//! The language is deliberately tiny: a dot-separated path looked up in the
//! [`Context`], optionally followed by one `default(...)` filter carrying a
//! quoted literal. Nothing is evaluated, and substituted text is never
//! scanned again.
//!
//! ```
//! use taskloom_core::{template, Context};
//!
//! let mut ctx = Context::new();
//! assert_eq!(template::render("Hello {{ name | default('World') }}", &ctx), "Hello World");
//!
//! ctx.insert("name", "Ann");
//! assert_eq!(template::render("Hello {{ name | default('World') }}", &ctx), "Hello Ann");
//! assert_eq!(template::render("{{ missing }}", &ctx), "{{ missing }}");
//! ```

use crate::context::Context;
use serde_json::{Map, Value};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// A parsed marker body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    /// Path segments, e.g. `["env", "HOME"]`.
    pub path: Vec<String>,
    /// Literal used when the path does not resolve.
    pub default: Option<String>,
}

impl Expression {
    /// Parses a marker body (the text between `{{` and `}}`).
    ///
    /// Returns `None` if the body is not a path with an optional
    /// `default('...')` filter.
    pub fn parse(body: &str) -> Option<Self> {
        Parser::new(body).expression()
    }

    /// Resolves the expression against `ctx`, falling back to the default.
    pub fn evaluate(&self, ctx: &Context) -> Option<String> {
        match ctx.lookup(self.path.as_slice()) {
            Some(value) => Some(stringify(value)),
            None => self.default.clone(),
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn expression(mut self) -> Option<Expression> {
        self.skip_ws();
        let path = self.path()?;
        self.skip_ws();
        if self.at_end() {
            return Some(Expression {
                path,
                default: None,
            });
        }
        self.expect(b'|')?;
        self.skip_ws();
        if self.word()? != "default" {
            return None;
        }
        self.skip_ws();
        self.expect(b'(')?;
        self.skip_ws();
        let literal = self.literal()?;
        self.skip_ws();
        self.expect(b')')?;
        self.skip_ws();
        if !self.at_end() {
            return None;
        }
        Some(Expression {
            path,
            default: Some(literal),
        })
    }

    fn path(&mut self) -> Option<Vec<String>> {
        let mut segments = vec![self.word()?.to_string()];
        while self.peek() == Some(b'.') {
            self.pos += 1;
            segments.push(self.word()?.to_string());
        }
        Some(segments)
    }

    fn word(&mut self) -> Option<&'a str> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            self.pos += 1;
        }
        if self.pos == start {
            None
        } else {
            Some(&self.src[start..self.pos])
        }
    }

    fn literal(&mut self) -> Option<String> {
        let quote = self.peek().filter(|b| *b == b'\'' || *b == b'"')?;
        self.pos += 1;
        let rest = &self.src[self.pos..];
        let len = rest.find(quote as char)?;
        self.pos += len + 1;
        Some(rest[..len].to_string())
    }

    fn expect(&mut self, byte: u8) -> Option<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Some(())
        } else {
            None
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }
}

/// Formats a value for substitution into text.
///
/// Strings are inserted raw; mappings and sequences as compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Replaces every `{{ ... }}` marker in `input`.
///
/// Markers that fail to parse, or that resolve to nothing and carry no
/// default, are copied through unchanged. A marker body never contains
/// `{{`: scanning restarts at the innermost opening before a `}}`, so
/// `"{{ {{ name }}"` renders the inner marker.
pub fn render(input: &str, ctx: &Context) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            out.push_str(&rest[start..]);
            return out;
        };
        let body = &after_open[..end];
        if let Some(inner) = body.find(OPEN) {
            let skip = start + OPEN.len() + inner;
            out.push_str(&rest[start..skip]);
            rest = &rest[skip..];
            continue;
        }
        match Expression::parse(body).and_then(|expr| expr.evaluate(ctx)) {
            Some(text) => out.push_str(&text),
            None => out.push_str(&rest[start..start + OPEN.len() + end + CLOSE.len()]),
        }
        rest = &after_open[end + CLOSE.len()..];
    }

    out.push_str(rest);
    out
}

/// Renders a string value; any other value is returned unchanged.
pub fn render_value(value: &Value, ctx: &Context) -> Value {
    match value {
        Value::String(s) => Value::String(render(s, ctx)),
        other => other.clone(),
    }
}

/// Renders every top-level string in a parameter map.
pub fn render_params(params: &Map<String, Value>, ctx: &Context) -> Map<String, Value> {
    params
        .iter()
        .map(|(key, value)| (key.clone(), render_value(value, ctx)))
        .collect()
}

/// Lists the raw marker bodies found in `input`, trimmed.
pub fn extract_expressions(input: &str) -> Vec<String> {
    let mut expressions = Vec::new();
    let mut rest = input;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        if let Some(inner) = after_open[..end].find(OPEN) {
            rest = &after_open[inner..];
            continue;
        }
        let expression = after_open[..end].trim();
        if !expression.is_empty() {
            expressions.push(expression.to_string());
        }
        rest = &after_open[end + CLOSE.len()..];
    }

    expressions
}
