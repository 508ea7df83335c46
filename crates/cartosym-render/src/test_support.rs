//! Test doubles: a small arithmetic expression engine and a layer that
//! records what the session asks of it.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use cartosym_core::expression::{ExpressionContext, ExpressionEngine};
use cartosym_core::feature::{AttributeValue, FeatureId};
use cartosym_core::geometry::Point;
use cartosym_core::{Color, EvalError};

use crate::layer::{LayerCommon, SymbolLayer};
use crate::symbol::{SymbolRenderContext, SymbolType};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Text(String),
    Field(String),
    Variable(String),
    Ident(String),
    Op(char),
    Concat,
    LParen,
    RParen,
}

fn tokenize(source: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == 'e') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse()
                    .map_err(|_| EvalError::Parse(format!("bad number '{}'", text)))?;
                tokens.push(Token::Number(n));
            }
            '"' | '\'' => {
                let start = i + 1;
                i = start;
                while i < chars.len() && chars[i] != c {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(EvalError::Parse("unterminated quote".into()));
                }
                let text: String = chars[start..i].iter().collect();
                i += 1;
                tokens.push(if c == '"' { Token::Field(text) } else { Token::Text(text) });
            }
            '@' | 'a'..='z' | 'A'..='Z' | '_' => {
                let start = if c == '@' { i + 1 } else { i };
                i = start;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                tokens.push(if c == '@' { Token::Variable(name) } else { Token::Ident(name) });
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::Concat);
                i += 2;
            }
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            other => return Err(EvalError::Parse(format!("unexpected '{}'", other))),
        }
    }
    Ok(tokens)
}

struct Parser<'t, 'c> {
    tokens: &'t [Token],
    pos: usize,
    context: &'t ExpressionContext<'c>,
}

impl Parser<'_, '_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn number(value: &AttributeValue) -> Result<f64, EvalError> {
        value.as_f64().ok_or(EvalError::TypeMismatch {
            expected: "double",
            found: value.type_name(),
        })
    }

    fn concat(&mut self) -> Result<AttributeValue, EvalError> {
        let mut left = self.additive()?;
        while self.peek() == Some(&Token::Concat) {
            self.pos += 1;
            let right = self.additive()?;
            left = AttributeValue::Text(format!("{}{}", left, right));
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<AttributeValue, EvalError> {
        let mut left = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let right = self.term()?;
            let (a, b) = (Self::number(&left)?, Self::number(&right)?);
            left = AttributeValue::Double(if op == '+' { a + b } else { a - b });
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<AttributeValue, EvalError> {
        let mut left = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek().cloned() {
            self.pos += 1;
            let right = self.unary()?;
            let (a, b) = (Self::number(&left)?, Self::number(&right)?);
            left = AttributeValue::Double(if op == '*' { a * b } else { a / b });
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<AttributeValue, EvalError> {
        if self.peek() == Some(&Token::Op('-')) {
            self.pos += 1;
            let v = self.unary()?;
            return Ok(AttributeValue::Double(-Self::number(&v)?));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<AttributeValue, EvalError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(AttributeValue::Double(n)),
            Some(Token::Text(s)) => Ok(AttributeValue::Text(s)),
            Some(Token::Field(name)) => self
                .context
                .feature()
                .ok_or(EvalError::NoFeature)?
                .attribute(&name)
                .cloned()
                .ok_or(EvalError::MissingField(name)),
            Some(Token::Variable(name)) => self
                .context
                .variable(&name)
                .cloned()
                .ok_or_else(|| EvalError::Engine(format!("unknown variable @{}", name))),
            Some(Token::Ident(name)) if name == "tostring" => {
                self.expect(Token::LParen)?;
                let inner = self.concat()?;
                self.expect(Token::RParen)?;
                Ok(AttributeValue::Text(inner.to_string()))
            }
            Some(Token::LParen) => {
                let inner = self.concat()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            other => Err(EvalError::Parse(format!("unexpected token {:?}", other))),
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), EvalError> {
        match self.next() {
            Some(t) if t == token => Ok(()),
            other => Err(EvalError::Parse(format!("expected {:?}, found {:?}", token, other))),
        }
    }
}

/// Numbers, `"field"`, `@variable`, `'text'`, `+ - * /`, `||` and
/// `tostring(...)`.
#[derive(Debug, Default)]
pub struct TestEngine;

impl ExpressionEngine for TestEngine {
    fn evaluate(&self, expression: &str, context: &ExpressionContext<'_>) -> Result<AttributeValue, EvalError> {
        let tokens = tokenize(expression)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            context,
        };
        let value = parser.concat()?;
        if parser.pos != tokens.len() {
            return Err(EvalError::Parse(format!("trailing input in '{}'", expression)));
        }
        Ok(value)
    }

    fn referenced_columns(&self, expression: &str) -> Result<BTreeSet<String>, EvalError> {
        Ok(tokenize(expression)?
            .into_iter()
            .filter_map(|t| match t {
                Token::Field(name) => Some(name),
                _ => None,
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
struct Call {
    event: &'static str,
    feature: Option<FeatureId>,
    part: (usize, usize),
}

/// Shared record of the calls made on one or more [`ProbeLayer`]s.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn record(&self, event: &'static str, ctx: &SymbolRenderContext<'_>) {
        let call = Call {
            event,
            feature: ctx.feature().map(|f| f.id),
            part: (ctx.geometry_part_num(), ctx.geometry_part_count()),
        };
        self.0.lock().unwrap().push(call);
    }

    pub fn count(&self, event: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|c| c.event == event).count()
    }

    /// Feature seen by every recorded call, in order.
    pub fn features(&self) -> Vec<Option<FeatureId>> {
        self.0.lock().unwrap().iter().map(|c| c.feature).collect()
    }

    /// Part counters of every painted point.
    pub fn parts(&self) -> Vec<(usize, usize)> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.event == "point")
            .map(|c| c.part)
            .collect()
    }
}

/// Layer of any kind that paints nothing and logs every call.
#[derive(Debug)]
pub struct ProbeLayer {
    common: LayerCommon,
    kind: SymbolType,
    log: CallLog,
}

impl ProbeLayer {
    pub fn new(kind: SymbolType, log: CallLog) -> Self {
        Self {
            common: LayerCommon::new(Color::BLACK),
            kind,
            log,
        }
    }
}

impl SymbolLayer for ProbeLayer {
    fn common(&self) -> &LayerCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut LayerCommon {
        &mut self.common
    }

    fn layer_type(&self) -> &'static str {
        "Probe"
    }

    fn kind(&self) -> SymbolType {
        self.kind
    }

    fn clone_layer(&self) -> Box<dyn SymbolLayer> {
        Box::new(Self {
            common: self.common.duplicate(),
            kind: self.kind,
            log: self.log.clone(),
        })
    }

    fn start_render(&mut self, ctx: &mut SymbolRenderContext<'_>) {
        self.log.record("start", ctx);
    }

    fn stop_render(&mut self, ctx: &mut SymbolRenderContext<'_>) {
        self.log.record("stop", ctx);
    }

    fn render_point(&mut self, point: Option<Point>, ctx: &mut SymbolRenderContext<'_>) {
        self.log.record(if point.is_some() { "point" } else { "empty_point" }, ctx);
    }

    fn render_polyline(&mut self, points: &[Point], ctx: &mut SymbolRenderContext<'_>) {
        self.log.record(if points.is_empty() { "empty_line" } else { "line" }, ctx);
    }

    fn render_polygon(
        &mut self,
        exterior: &[Point],
        _holes: Option<&[Vec<Point>]>,
        ctx: &mut SymbolRenderContext<'_>,
    ) {
        self.log.record(if exterior.is_empty() { "empty_polygon" } else { "polygon" }, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartosym_core::expression::ExpressionContextScope;
    use cartosym_core::feature::{Feature, FieldType, Fields};

    #[test]
    fn test_engine_arithmetic_and_concat() {
        let fields = Fields::new().with_field("a", FieldType::Double);
        let feature = Feature::new(1, fields).with_attribute("a", 4.0);
        let mut scope = ExpressionContextScope::new("s");
        scope.set_variable("value", 2.0);
        let mut ctx = ExpressionContext::new().with_feature(Some(&feature));
        ctx.push_scope(&scope);

        let v = TestEngine.evaluate("-1 + 2 * (\"a\" - @value)", &ctx).unwrap();
        assert_eq!(v, AttributeValue::Double(3.0));
        let s = TestEngine
            .evaluate("tostring(0.5*(\"a\"))||','||tostring(2*(\"a\"))", &ctx)
            .unwrap();
        assert_eq!(s, AttributeValue::Text("2,8".into()));
    }

    #[test]
    fn test_engine_referenced_columns() {
        let cols = TestEngine.referenced_columns("\"x\" + 'y' * @z").unwrap();
        assert_eq!(cols, BTreeSet::from(["x".to_string()]));
        assert!(TestEngine.referenced_columns("'open").is_err());
    }
}
