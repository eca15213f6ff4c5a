// [libs/domain/transform/src/expr.rs]
//! A restricted expression evaluator for `CALCULATION` and `CONDITIONAL`
//! rules. No corpus crate
//! offers expression evaluation, so this is a small hand-rolled recursive
//! descent parser rather than a fabricated dependency.
//!
//! Grammar (lowest to highest precedence):
//! or := and ( "||" and )*
//! and := cmp ( "&&" cmp )*
//! cmp := add ( ("==" | "!=" | "<" | "<=" | ">" | ">=") add )?
//! add := mul ( ("+" | "-") mul )*
//! mul := unary ( ("*" | "/" | "%") unary )*
//! unary := "!" unary | "-" unary | atom
//! atom := number | string | "true" | "false" | "$." path | ident "(" args ")" | "(" or ")"

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ExprError {
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expected token '{0}'")]
    ExpectedToken(&'static str),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("function '{0}' expects {1} argument(s)")]
    ArityMismatch(String, usize),
    #[error("operand is not numeric")]
    NotNumeric,
    #[error("trailing input after expression")]
    TrailingInput,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    FieldRef(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '+' | '-' | '*' | '%' => {
                tokens.push(Token::Op(match c {
                            '+' => "+",
                            '-' => "-",
                            '*' => "*",
                            _ => "%",
                        }));
                i += 1;
            }
            '/' => {
                tokens.push(Token::Op("/"));
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op("=="));
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op("!="));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Op("!"));
                i += 1;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op("<="));
                i += 2;
            }
            '<' => {
                tokens.push(Token::Op("<"));
                i += 1;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(">="));
                i += 2;
            }
            '>' => {
                tokens.push(Token::Op(">"));
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::Op("&&"));
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::Op("||"));
                i += 2;
            }
            '"' | '\'' => {
                let quote = c;
                let mut buf = String::new();
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    buf.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(ExprError::UnexpectedEnd);
                }
                i += 1;
                tokens.push(Token::Str(buf));
            }
            '$' if chars.get(i + 1) == Some(&'.') => {
                let mut buf = String::new();
                i += 2;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    buf.push(chars[i]);
                    i += 1;
                }
                tokens.push(Token::FieldRef(buf));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                tokens.push(Token::Number(literal.parse().map_err(|_| ExprError::UnexpectedChar(c, start))?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(ExprError::UnexpectedChar(other, i)),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    document: &'a Value,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn parse_or(&mut self) -> Result<Value, ExprError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Op("||"))) {
            self.advance();
            let right = self.parse_and()?;
            left = Value::Bool(truthy(&left) || truthy(&right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Value, ExprError> {
        let mut left = self.parse_cmp()?;
        while matches!(self.peek(), Some(Token::Op("&&"))) {
            self.advance();
            let right = self.parse_cmp()?;
            left = Value::Bool(truthy(&left) && truthy(&right));
        }
        Ok(left)
    }

    fn parse_cmp(&mut self) -> Result<Value, ExprError> {
        let left = self.parse_add()?;
        if let Some(Token::Op(op @ ("==" | "!=" | "<" | "<=" | ">" | ">="))) = self.peek().cloned() {
            self.advance();
            let right = self.parse_add()?;
            return Ok(Value::Bool(compare(&left, &right, op)?));
        }
        Ok(left)
    }

    fn parse_add(&mut self) -> Result<Value, ExprError> {
        let mut left = self.parse_mul()?;
        loop {
            match self.peek().cloned() {
                Some(Token::Op(op @ ("+" | "-"))) => {
                    self.advance();
                    let right = self.parse_mul()?;
                    left = if op == "+" {
                        arith_or_concat(&left, &right)?
                    } else {
                        Value::from(as_number(&left)? - as_number(&right)?)
                    };
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_mul(&mut self) -> Result<Value, ExprError> {
        let mut left = self.parse_unary()?;
        loop {
            match self.peek().cloned() {
                Some(Token::Op(op @ ("*" | "/" | "%"))) => {
                    self.advance();
                    let right = self.parse_unary()?;
                    let (a, b) = (as_number(&left)?, as_number(&right)?);
                    left = Value::from(match op {
                            "*" => a * b,
                            "/" => a / b,
                            _ => a % b,
                        });
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Value, ExprError> {
        match self.peek() {
            Some(Token::Op("!")) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Value::Bool(!truthy(&operand)))
            }
            Some(Token::Op("-")) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Value::from(-as_number(&operand)?))
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<Value, ExprError> {
        match self.advance().cloned() {
            Some(Token::Number(n)) => Ok(Value::from(n)),
            Some(Token::Str(s)) => Ok(Value::String(s)),
            Some(Token::FieldRef(path)) => Ok(crate::paths::get_path(self.document, &path).cloned().unwrap_or(Value::Null)),
            Some(Token::Ident(name)) if name == "true" => Ok(Value::Bool(true)),
            Some(Token::Ident(name)) if name == "false" => Ok(Value::Bool(false)),
            Some(Token::Ident(name)) => self.parse_call(name),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ExprError::ExpectedToken(")")),
                }
            }
            _ => Err(ExprError::UnexpectedEnd),
        }
    }

    fn parse_call(&mut self, name: String) -> Result<Value, ExprError> {
        match self.advance() {
            Some(Token::LParen) => {}
            _ => return Err(ExprError::ExpectedToken("(")),
        }
        let mut args = Vec::new();
        if !matches!(self.peek(), Some(Token::RParen)) {
            args.push(self.parse_or()?);
            while matches!(self.peek(), Some(Token::Comma)) {
                self.advance();
                args.push(self.parse_or()?);
            }
        }
        match self.advance() {
            Some(Token::RParen) => {}
            _ => return Err(ExprError::ExpectedToken(")")),
        }
        call_math_fn(&name, &args)
    }
}

fn call_math_fn(name: &str, args: &[Value]) -> Result<Value, ExprError> {
    let nums = || -> Result<Vec<f64>, ExprError> { args.iter().map(as_number).collect() };
    match name {
        "abs" if args.len() == 1 => Ok(Value::from(as_number(&args[0])?.abs())),
        "round" if args.len() == 1 => Ok(Value::from(as_number(&args[0])?.round())),
        "floor" if args.len() == 1 => Ok(Value::from(as_number(&args[0])?.floor())),
            "ceil" if args.len() == 1 => Ok(Value::from(as_number(&args[0])?.ceil())),
        "min" if args.len() == 2 => Ok(Value::from(nums()?.into_iter().fold(f64::INFINITY, f64::min))),
        "max" if args.len() == 2 => Ok(Value::from(nums()?.into_iter().fold(f64::NEG_INFINITY, f64::max))),
        "abs" | "round" | "floor" | "ceil" => Err(ExprError::ArityMismatch(name.to_string(), 1)),
        "min" | "max" => Err(ExprError::ArityMismatch(name.to_string(), 2)),
        other => Err(ExprError::UnknownFunction(other.to_string())),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn as_number(value: &Value) -> Result<f64, ExprError> {
    value.as_f64().ok_or(ExprError::NotNumeric)
}

fn arith_or_concat(left: &Value, right: &Value) -> Result<Value, ExprError> {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Ok(Value::String(format!("{a}{b}")));
    }
    Ok(Value::from(as_number(left)? + as_number(right)?))
}

fn compare(left: &Value, right: &Value, op: &str) -> Result<bool, ExprError> {
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return Ok(match op {
                "==" => a == b,
                "!=" => a != b,
                "<" => a < b,
                "<=" => a <= b,
                ">" => a > b,
                _ => a >= b,
            });
    }
    Ok(match op {
            "==" => left == right,
            "!=" => left != right,
            _ => return Err(ExprError::NotNumeric),
        })
}

/// Evaluates `expression` against `document`, the only data the
/// environment exposes.
pub fn evaluate(expression: &str, document: &Value) -> Result<Value, ExprError> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens: &tokens, pos: 0, document };
    let result = parser.parse_or()?;
    if parser.pos != tokens.len() {
        return Err(ExprError::TrailingInput);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arithmetic_precedence() {
        let doc = json!({});
        assert_eq!(evaluate("2 + 3 * 4", &doc).unwrap(), json!(14.0));
    }

    #[test]
    fn field_reference_and_comparison() {
        let doc = json!({"age": 42});
        assert_eq!(evaluate("$.age >= 18", &doc).unwrap(), json!(true));
    }

    #[test]
    fn boolean_combinators() {
        let doc = json!({"a": true, "b": false});
        assert_eq!(evaluate("$.a && !$.b", &doc).unwrap(), json!(true));
    }

    #[test]
    fn math_functions() {
        let doc = json!({});
        assert_eq!(evaluate("round(max(1, 3.7))", &doc).unwrap(), json!(4.0));
    }

    #[test]
    fn unknown_function_rejected() {
        let doc = json!({});
        assert!(matches!(evaluate("exec(1)", &doc), Err(ExprError::UnknownFunction(_))));
    }
}



