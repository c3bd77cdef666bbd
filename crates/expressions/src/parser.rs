//! Recursive-descent parser for the embedded formula language.
//!
//! A template string takes one of three shapes:
//! - `@expr` — the whole string is a single expression (result keeps its type);
//! - literal text with `@{expr}` spans interpolated into it;
//! - plain literal text. A leading `@@` escapes a literal `@`.
//!
//! Expression grammar:
//! ```text
//! expression := primary accessor*
//! primary    := 'text' | number | true | false | null | ident '(' args? ')'
//! args       := expression (',' expression)*
//! accessor   := '.' ident | '?.' ident | '[' expression ']' | '?[' expression ']'
//! ```
//! Text literals are single-quoted; `''` escapes a quote.

use crate::ast::{Expression, ParsedTemplate, TemplateSpan};
use crate::error::ParseError;
use crate::ValueContainer;

/// Parse a full template string, applying the escape rules above.
pub fn parse_template(source: &str) -> Result<ParsedTemplate, ParseError> {
    if let Some(rest) = source.strip_prefix("@@") {
        return Ok(ParsedTemplate::Literal(format!("@{rest}")));
    }
    if let Some(rest) = source.strip_prefix('@') {
        if !rest.starts_with('{') {
            return Ok(ParsedTemplate::Expression(parse_expression(rest)?));
        }
    }
    if !source.contains("@{") {
        return Ok(ParsedTemplate::Literal(source.to_owned()));
    }
    parse_interpolated(source)
}

/// Parse a bare expression (no `@` prefix); the whole input must be consumed.
pub fn parse_expression(source: &str) -> Result<Expression, ParseError> {
    let mut parser = Parser::new(source);
    parser.skip_whitespace();
    let expr = parser.expression()?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

fn parse_interpolated(source: &str) -> Result<ParsedTemplate, ParseError> {
    let mut spans = Vec::new();
    let mut literal = String::new();
    let mut rest = source;
    let mut offset = 0usize;

    while let Some(open) = rest.find("@{") {
        literal.push_str(&rest[..open]);
        if !literal.is_empty() {
            spans.push(TemplateSpan::Text(std::mem::take(&mut literal)));
        }
        let body_start = open + 2;
        let body = &rest[body_start..];
        let close = find_span_end(body)
            .ok_or_else(|| ParseError::new(offset + open, "unterminated '@{' span"))?;
        let expr = parse_expression(&body[..close]).map_err(|e| {
            ParseError::new(offset + body_start + e.offset, e.message)
        })?;
        spans.push(TemplateSpan::Embedded(expr));
        rest = &body[close + 1..];
        offset += body_start + close + 1;
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        spans.push(TemplateSpan::Text(literal));
    }
    Ok(ParsedTemplate::Interpolated(spans))
}

/// Locate the `}` closing an embedded span, skipping over quoted text.
fn find_span_end(body: &str) -> Option<usize> {
    let mut in_quote = false;
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b'}' if !in_quote => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.pos, message)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{expected}'")))
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    // -- grammar ------------------------------------------------------------

    fn expression(&mut self) -> Result<Expression, ParseError> {
        let primary = self.primary()?;
        self.accessors(primary)
    }

    fn primary(&mut self) -> Result<Expression, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some('\'') => self.text_literal(),
            Some(c) if c.is_ascii_digit() || c == '-' => self.number_literal(),
            Some(c) if c.is_alphabetic() || c == '_' => self.identifier_or_call(),
            Some(c) => Err(self.error(format!("unexpected character '{c}'"))),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn accessors(&mut self, mut expr: Expression) -> Result<Expression, ParseError> {
        loop {
            self.skip_whitespace();
            let optional = self.peek() == Some('?');
            let lookahead = if optional { 1 } else { 0 };
            match self.src[self.pos + lookahead..].chars().next() {
                Some('.') => {
                    self.pos += lookahead + 1;
                    let name = self.identifier()?;
                    expr = access(expr, Expression::Literal(name.into()), optional);
                }
                Some('[') => {
                    self.pos += lookahead + 1;
                    self.skip_whitespace();
                    let index = self.expression()?;
                    self.skip_whitespace();
                    self.expect(']')?;
                    expr = access(expr, index, optional);
                }
                _ => {
                    if optional {
                        return Err(self.error("expected '.' or '[' after '?'"));
                    }
                    return Ok(expr);
                }
            }
        }
    }

    fn identifier_or_call(&mut self) -> Result<Expression, ParseError> {
        let start = self.pos;
        let name = self.identifier()?;
        self.skip_whitespace();
        if self.eat('(') {
            let mut args = Vec::new();
            self.skip_whitespace();
            if !self.eat(')') {
                loop {
                    args.push(self.expression()?);
                    self.skip_whitespace();
                    if self.eat(')') {
                        break;
                    }
                    self.expect(',')?;
                }
            }
            return Ok(Expression::Call {
                function: name,
                args,
            });
        }
        match name.as_str() {
            "true" => Ok(Expression::Literal(ValueContainer::Boolean(true))),
            "false" => Ok(Expression::Literal(ValueContainer::Boolean(false))),
            "null" => Ok(Expression::Literal(ValueContainer::Null)),
            _ => Err(ParseError::new(
                start,
                format!("'{name}' is not a literal or function call"),
            )),
        }
    }

    fn identifier(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        Ok(self.src[start..self.pos].to_owned())
    }

    fn text_literal(&mut self) -> Result<Expression, ParseError> {
        self.expect('\'')?;
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('\'') => {
                    // A doubled quote is an escaped quote.
                    if self.eat('\'') {
                        text.push('\'');
                    } else {
                        return Ok(Expression::Literal(ValueContainer::Text(text)));
                    }
                }
                Some(c) => text.push(c),
                None => return Err(self.error("unterminated text literal")),
            }
        }
    }

    fn number_literal(&mut self) -> Result<Expression, ParseError> {
        let start = self.pos;
        self.eat('-');
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if self.eat('.') {
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        let literal = &self.src[start..self.pos];
        literal
            .parse::<f64>()
            .map(|n| Expression::Literal(ValueContainer::Number(n)))
            .map_err(|_| ParseError::new(start, format!("invalid number '{literal}'")))
    }
}

fn access(base: Expression, index: Expression, optional: bool) -> Expression {
    Expression::Access {
        base: Box::new(base),
        index: Box::new(index),
        optional,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn call(function: &str, args: Vec<Expression>) -> Expression {
        Expression::Call {
            function: function.into(),
            args,
        }
    }

    #[test]
    fn plain_text_is_literal() {
        assert_eq!(
            parse_template("hello world").unwrap(),
            ParsedTemplate::Literal("hello world".into())
        );
    }

    #[test]
    fn leading_double_at_escapes() {
        assert_eq!(
            parse_template("@@not an expression").unwrap(),
            ParsedTemplate::Literal("@not an expression".into())
        );
    }

    #[test]
    fn whole_string_expression() {
        let parsed = parse_template("@guid()").unwrap();
        assert_eq!(parsed, ParsedTemplate::Expression(call("guid", vec![])));
    }

    #[test]
    fn interpolation_splits_spans() {
        let parsed = parse_template("With the name of @{triggerBody()?['fullname']}").unwrap();
        let ParsedTemplate::Interpolated(spans) = parsed else {
            panic!("expected interpolated template");
        };
        assert_eq!(spans.len(), 2);
        assert_eq!(
            spans[0],
            TemplateSpan::Text("With the name of ".into())
        );
        assert!(matches!(
            spans[1],
            TemplateSpan::Embedded(Expression::Access { optional: true, .. })
        ));
    }

    #[test]
    fn span_end_skips_quoted_braces() {
        let parsed = parse_template("x@{concat('}', 'y')}z").unwrap();
        let ParsedTemplate::Interpolated(spans) = parsed else {
            panic!("expected interpolated template");
        };
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[2], TemplateSpan::Text("z".into()));
    }

    #[test]
    fn nested_calls_and_accessor_chain() {
        let expr = parse_expression("outputs('fetch')['body'].items[0]?.id").unwrap();
        // outermost accessor is the optional `.id`
        let Expression::Access { optional, index, base } = expr else {
            panic!("expected access chain");
        };
        assert!(optional);
        assert_eq!(*index, Expression::Literal("id".into()));
        assert!(matches!(*base, Expression::Access { optional: false, .. }));
    }

    #[test]
    fn quoted_text_escapes_doubled_quote() {
        let expr = parse_expression("'it''s'").unwrap();
        assert_eq!(expr, Expression::Literal("it's".into()));
    }

    #[test]
    fn keyword_literals() {
        assert_eq!(
            parse_expression("true").unwrap(),
            Expression::Literal(ValueContainer::Boolean(true))
        );
        assert_eq!(
            parse_expression("null").unwrap(),
            Expression::Literal(ValueContainer::Null)
        );
        assert_eq!(
            parse_expression("-3.5").unwrap(),
            Expression::Literal(ValueContainer::Number(-3.5))
        );
    }

    #[test]
    fn bare_identifier_is_rejected() {
        assert!(parse_expression("fullname").is_err());
    }

    #[test]
    fn unterminated_span_is_a_parse_error() {
        assert!(parse_template("broken @{concat('a'").is_err());
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(parse_expression("guid() guid()").is_err());
    }

    #[test]
    fn arguments_separated_by_commas() {
        let expr = parse_expression("concat('a', 'b', concat('c', 'd'))").unwrap();
        let Expression::Call { function, args } = expr else {
            panic!("expected call");
        };
        assert_eq!(function, "concat");
        assert_eq!(args.len(), 3);
        assert!(matches!(&args[2], Expression::Call { function, .. } if function == "concat"));
    }
}
