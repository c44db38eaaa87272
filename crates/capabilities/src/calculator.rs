use async_trait::async_trait;
use conductor_core::{Error, Result};
use serde_json::{json, Value};

use crate::{CallContext, Capability, CapabilitySchema};

/// Arithmetic capability: evaluates an expression (+ - * / and parentheses)
/// or computes BMI from weight/height. When only free text is supplied, the
/// first arithmetic expression found in it is evaluated.
pub struct CalculatorCapability;

#[async_trait]
impl Capability for CalculatorCapability {
    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema {
            name: "calculator",
            description: "Evaluate arithmetic expressions (+, -, *, /, parentheses) or compute BMI from weight_kg and height_m. Extracts the expression from free text when only 'query' is given.",
            default_timeout_ms: 2_000,
            parameters: json!({
                "type": "object",
                "properties": {
                    "expression": {
                        "type": "string",
                        "description": "Arithmetic expression to evaluate, e.g. '(3 + 4) * 2'"
                    },
                    "query": {
                        "type": "string",
                        "description": "Free text to extract an expression from"
                    },
                    "weight_kg": {
                        "type": "number",
                        "description": "Body weight in kilograms (BMI form)"
                    },
                    "height_m": {
                        "type": "number",
                        "description": "Body height in meters (BMI form)"
                    }
                }
            }),
        }
    }

    fn validate(&self, input: &Value) -> Result<()> {
        if !input.is_object() {
            return Err(Error::Validation("input must be an object".into()));
        }
        let has_expression = input.get("expression").and_then(|v| v.as_str()).is_some();
        let has_query = input.get("query").and_then(|v| v.as_str()).is_some();
        let has_bmi = input.get("weight_kg").is_some() && input.get("height_m").is_some();
        if !has_expression && !has_query && !has_bmi {
            return Err(Error::Validation(
                "one of 'expression', 'query' or 'weight_kg'+'height_m' is required".into(),
            ));
        }
        Ok(())
    }

    async fn call(&self, _ctx: CallContext, input: Value) -> Result<Value> {
        if let (Some(weight), Some(height)) = (
            input.get("weight_kg").and_then(|v| v.as_f64()),
            input.get("height_m").and_then(|v| v.as_f64()),
        ) {
            return bmi(weight, height);
        }

        let expression = match input.get("expression").and_then(|v| v.as_str()) {
            Some(expr) => expr.to_string(),
            None => {
                let query = input.get("query").and_then(|v| v.as_str()).unwrap_or("");
                extract_expression(query).ok_or_else(|| {
                    Error::Capability(format!("no arithmetic expression found in: {}", query))
                })?
            }
        };

        let value = evaluate(&expression)?;
        Ok(json!({
            "expression": expression.trim(),
            "value": value,
        }))
    }
}

fn bmi(weight_kg: f64, height_m: f64) -> Result<Value> {
    if weight_kg <= 0.0 || height_m <= 0.0 {
        return Err(Error::Capability("weight and height must be positive".into()));
    }
    let bmi = weight_kg / (height_m * height_m);
    let category = match bmi {
        b if b < 18.5 => "underweight",
        b if b < 25.0 => "normal",
        b if b < 30.0 => "overweight",
        _ => "obese",
    };
    Ok(json!({
        "bmi": (bmi * 10.0).round() / 10.0,
        "category": category,
        "weight_kg": weight_kg,
        "height_m": height_m,
    }))
}

/// Find the longest run of expression characters in free text that contains
/// at least one digit and one operator.
fn extract_expression(text: &str) -> Option<String> {
    let mut best: Option<String> = None;
    let mut current = String::new();

    let flush = |current: &mut String, best: &mut Option<String>| {
        let candidate = current.trim().trim_matches(|c| c == '+' || c == '*' || c == '/');
        let has_digit = candidate.chars().any(|c| c.is_ascii_digit());
        let has_operator = candidate.chars().any(|c| matches!(c, '+' | '-' | '*' | '/'));
        if has_digit && has_operator && best.as_ref().map_or(true, |b: &String| candidate.len() > b.len()) {
            *best = Some(candidate.to_string());
        }
        current.clear();
    };

    for c in text.chars() {
        if c.is_ascii_digit() || matches!(c, '+' | '-' | '*' | '/' | '(' | ')' | '.' | ' ') {
            current.push(c);
        } else {
            flush(&mut current, &mut best);
        }
    }
    flush(&mut current, &mut best);
    best
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' | 'x' | '×' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' | '÷' => {
                tokens.push(Token::Slash);
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
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| Error::Capability(format!("invalid number: {}", literal)))?;
                tokens.push(Token::Number(value));
            }
            other => {
                return Err(Error::Capability(format!("unexpected character: {}", other)));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.advance();
                    value += self.term()?;
                }
                Token::Minus => {
                    self.advance();
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<f64> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.advance();
                    value *= self.factor()?;
                }
                Token::Slash => {
                    self.advance();
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err(Error::Capability("division by zero".into()));
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // factor := '-' factor | number | '(' expr ')'
    fn factor(&mut self) -> Result<f64> {
        match self.advance() {
            Some(Token::Minus) => Ok(-self.factor()?),
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(Error::Capability("missing closing parenthesis".into())),
                }
            }
            other => Err(Error::Capability(format!("unexpected token: {:?}", other))),
        }
    }
}

pub fn evaluate(expression: &str) -> Result<f64> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(Error::Capability("empty expression".into()));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(Error::Capability(format!(
            "trailing input after expression: {}",
            expression
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::Config;
    use std::path::PathBuf;

    fn ctx() -> CallContext {
        CallContext::new(Config::default(), PathBuf::from("/tmp"))
    }

    #[test]
    fn test_evaluate_precedence() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("10 / 4").unwrap(), 2.5);
        assert_eq!(evaluate("-3 + 5").unwrap(), 2.0);
        assert_eq!(evaluate("2 * -3").unwrap(), -6.0);
    }

    #[test]
    fn test_evaluate_unicode_operators() {
        assert_eq!(evaluate("6 × 7").unwrap(), 42.0);
        assert_eq!(evaluate("84 ÷ 2").unwrap(), 42.0);
    }

    #[test]
    fn test_evaluate_errors() {
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("1 + foo").is_err());
    }

    #[test]
    fn test_extract_expression_from_text() {
        assert_eq!(
            extract_expression("what is 12 * (3 + 4) please").as_deref(),
            Some("12 * (3 + 4)")
        );
        assert!(extract_expression("no math here").is_none());
        // A lone number without an operator is not an expression.
        assert!(extract_expression("the year 2024").is_none());
    }

    #[tokio::test]
    async fn test_call_with_query() {
        let cap = CalculatorCapability;
        let input = serde_json::json!({"query": "compute 7 * 6 for me"});
        cap.validate(&input).unwrap();
        let out = cap.call(ctx(), input).await.unwrap();
        assert_eq!(out["value"].as_f64().unwrap(), 42.0);
    }

    #[tokio::test]
    async fn test_call_bmi() {
        let cap = CalculatorCapability;
        let input = serde_json::json!({"weight_kg": 70.0, "height_m": 1.75});
        let out = cap.call(ctx(), input).await.unwrap();
        assert_eq!(out["bmi"].as_f64().unwrap(), 22.9);
        assert_eq!(out["category"], "normal");
    }

    #[test]
    fn test_validate_rejects_empty() {
        let cap = CalculatorCapability;
        assert!(cap.validate(&serde_json::json!({})).is_err());
        assert!(cap.validate(&serde_json::json!({"expression": "1+1"})).is_ok());
    }
}
