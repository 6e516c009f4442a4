//! Condition language for transform rules.
//!
//! The grammar is intentionally small:
//!
//! ```text
//! expr       := and_expr ( "||" and_expr )*
//! and_expr   := comparison ( "&&" comparison )*
//! comparison := field ( "===" | "!==" ) literal
//! field      := [A-Za-z_$][A-Za-z0-9_$]*
//! literal    := '"' ... '"' | "'" ... "'"
//! ```
//!
//! Fields are looked up at the top level of the message object. A missing
//! field never equals a literal, so `===` is false and `!==` is true.

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors produced while parsing a condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("empty condition")]
    Empty,
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    #[error("unterminated string literal starting at {0}")]
    UnterminatedString(usize),
    #[error("expected {expected}, found {found}")]
    UnexpectedToken { expected: &'static str, found: String },
    #[error("unexpected end of condition, expected {0}")]
    UnexpectedEnd(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Field(String),
    Literal(String),
    StrictEq,
    StrictNe,
    And,
    Or,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Field(name) => format!("field `{}`", name),
            Token::Literal(lit) => format!("literal \"{}\"", lit),
            Token::StrictEq => "`===`".to_string(),
            Token::StrictNe => "`!==`".to_string(),
            Token::And => "`&&`".to_string(),
            Token::Or => "`||`".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ConditionError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '"' | '\'' => {
                let start = i;
                let quote = ch;
                i += 1;
                let mut literal = String::new();
                loop {
                    match chars.get(i) {
                        None => return Err(ConditionError::UnterminatedString(start)),
                        Some('\\') if chars.get(i + 1).is_some() => {
                            literal.push(chars[i + 1]);
                            i += 2;
                        }
                        Some(&c) if c == quote => {
                            i += 1;
                            break;
                        }
                        Some(&c) => {
                            literal.push(c);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Literal(literal));
            }
            '=' | '!' => {
                let op: String = chars[i..chars.len().min(i + 3)].iter().collect();
                match op.as_str() {
                    "===" => tokens.push(Token::StrictEq),
                    "!==" => tokens.push(Token::StrictNe),
                    _ => return Err(ConditionError::UnexpectedChar { pos: i, ch }),
                }
                i += 3;
            }
            '&' | '|' => {
                if chars.get(i + 1) != Some(&ch) {
                    return Err(ConditionError::UnexpectedChar { pos: i, ch });
                }
                tokens.push(if ch == '&' { Token::And } else { Token::Or });
                i += 2;
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                tokens.push(Token::Field(chars[start..i].iter().collect()));
            }
            _ => return Err(ConditionError::UnexpectedChar { pos: i, ch }),
        }
    }

    Ok(tokens)
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
}

/// Parsed condition tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Or(Vec<Condition>),
    And(Vec<Condition>),
    Compare {
        field: String,
        op: CompareOp,
        literal: String,
    },
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn parse_or(&mut self) -> Result<Condition, ConditionError> {
        let mut terms = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.parse_and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Condition::Or(terms)
        })
    }

    fn parse_and(&mut self) -> Result<Condition, ConditionError> {
        let mut terms = vec![self.parse_comparison()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.parse_comparison()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Condition::And(terms)
        })
    }

    fn parse_comparison(&mut self) -> Result<Condition, ConditionError> {
        let field = match self.next() {
            Some(Token::Field(name)) => name,
            Some(other) => {
                return Err(ConditionError::UnexpectedToken {
                    expected: "field name",
                    found: other.describe(),
                })
            }
            None => return Err(ConditionError::UnexpectedEnd("field name")),
        };
        let op = match self.next() {
            Some(Token::StrictEq) => CompareOp::Equal,
            Some(Token::StrictNe) => CompareOp::NotEqual,
            Some(other) => {
                return Err(ConditionError::UnexpectedToken {
                    expected: "`===` or `!==`",
                    found: other.describe(),
                })
            }
            None => return Err(ConditionError::UnexpectedEnd("`===` or `!==`")),
        };
        let literal = match self.next() {
            Some(Token::Literal(lit)) => lit,
            Some(other) => {
                return Err(ConditionError::UnexpectedToken {
                    expected: "string literal",
                    found: other.describe(),
                })
            }
            None => return Err(ConditionError::UnexpectedEnd("string literal")),
        };
        Ok(Condition::Compare { field, op, literal })
    }
}

impl Condition {
    /// Parses a condition expression.
    pub fn parse(input: &str) -> Result<Self, ConditionError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(ConditionError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let condition = parser.parse_or()?;
        if let Some(extra) = parser.next() {
            return Err(ConditionError::UnexpectedToken {
                expected: "`&&`, `||` or end of condition",
                found: extra.describe(),
            });
        }
        Ok(condition)
    }

    /// Evaluates the condition against a message object.
    pub fn evaluate(&self, fields: &Map<String, Value>) -> bool {
        match self {
            Condition::Or(terms) => terms.iter().any(|t| t.evaluate(fields)),
            Condition::And(terms) => terms.iter().all(|t| t.evaluate(fields)),
            Condition::Compare { field, op, literal } => {
                let equal = fields
                    .get(field)
                    .map(|value| value_matches(value, literal))
                    .unwrap_or(false);
                match op {
                    CompareOp::Equal => equal,
                    CompareOp::NotEqual => !equal,
                }
            }
        }
    }
}

fn value_matches(value: &Value, literal: &str) -> bool {
    match value {
        Value::String(s) => s == literal,
        Value::Number(n) => n.to_string() == literal,
        Value::Bool(b) => b.to_string() == literal,
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

/// Parses and evaluates `expr` in one step.
pub fn evaluate_condition(expr: &str, fields: &Map<String, Value>) -> Result<bool, ConditionError> {
    Ok(Condition::parse(expr)?.evaluate(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn simple_equality() {
        let f = fields(json!({"messageType": "urgent"}));
        assert!(evaluate_condition(r#"messageType === "urgent""#, &f).unwrap());
        assert!(!evaluate_condition(r#"messageType === "text""#, &f).unwrap());
        assert!(evaluate_condition("messageType !== 'text'", &f).unwrap());
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let f = fields(json!({"a": "1", "b": "2", "c": "3"}));
        // false && false || true  => true
        assert!(evaluate_condition(r#"a === "x" && b === "y" || c === "3""#, &f).unwrap());
        // true || false && false => true
        assert!(evaluate_condition(r#"a === "1" || b === "y" && c === "z""#, &f).unwrap());
        // true && false || false => false
        assert!(!evaluate_condition(r#"a === "1" && b === "y" || c === "z""#, &f).unwrap());
    }

    #[test]
    fn missing_fields() {
        let f = fields(json!({}));
        assert!(!evaluate_condition(r#"ghost === "x""#, &f).unwrap());
        assert!(evaluate_condition(r#"ghost !== "x""#, &f).unwrap());
    }

    #[test]
    fn non_string_values() {
        let f = fields(json!({"retryCount": 2, "requiresAck": true, "tags": ["a"]}));
        assert!(evaluate_condition(r#"retryCount === "2""#, &f).unwrap());
        assert!(evaluate_condition(r#"requiresAck === "true""#, &f).unwrap());
        assert!(!evaluate_condition(r#"tags === "a""#, &f).unwrap());
    }

    #[test]
    fn escaped_quotes_in_literal() {
        let f = fields(json!({"payload": "say \"hi\""}));
        assert!(evaluate_condition(r#"payload === "say \"hi\"""#, &f).unwrap());
    }

    #[test]
    fn rejects_anything_outside_the_grammar() {
        let f = fields(json!({"a": "1"}));
        assert_eq!(evaluate_condition("", &f), Err(ConditionError::Empty));
        assert!(matches!(
            evaluate_condition(r#"a == "1""#, &f),
            Err(ConditionError::UnexpectedChar { .. })
        ));
        assert!(matches!(
            evaluate_condition(r#"a === "1"#, &f),
            Err(ConditionError::UnterminatedString(_))
        ));
        assert!(matches!(
            evaluate_condition(r#"a === b"#, &f),
            Err(ConditionError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            evaluate_condition(r#"a === "1" &&"#, &f),
            Err(ConditionError::UnexpectedEnd(_))
        ));
        assert!(matches!(
            evaluate_condition(r#"process.exit() === "1""#, &f),
            Err(ConditionError::UnexpectedChar { .. })
        ));
        assert!(matches!(
            evaluate_condition(r#"a === "1" "2""#, &f),
            Err(ConditionError::UnexpectedToken { .. })
        ));
    }
}
