//! Numeric input evaluation for the editor fields
//!
//! Accepts plain numbers or small arithmetic expressions such as
//! `v + 10`, `pi / 4` or `-(2 * 3.5)`. `value`, `v`, `x` and `pos` stand
//! for the field's current value. Anything outside digits, `+ - * / ( ) .`
//! and whitespace is rejected.

/// Evaluate editor text. Returns NaN when the text is empty, malformed,
/// or evaluates to a non-finite number.
pub fn evaluate_numeric_input(text: &str, fallback: f32) -> f32 {
    let text = text.trim();
    if text.is_empty() {
        return f32::NAN;
    }
    if is_plain_number(text) {
        return text.parse::<f64>().ok().filter(|v| v.is_finite()).map_or(f32::NAN, |v| v as f32);
    }

    let base = if fallback.is_finite() { fallback as f64 } else { 0.0 };
    let Some(tokens) = tokenize(text, base) else {
        return f32::NAN;
    };
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let Some(result) = parser.expression() else {
        return f32::NAN;
    };
    if parser.pos != tokens.len() {
        return f32::NAN;
    }
    let result = result as f32;
    if result.is_finite() {
        result
    } else {
        f32::NAN
    }
}

/// `[+-]?\d*\.?\d+`
fn is_plain_number(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (int, frac) = match body.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (body, None),
    };
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    match frac {
        Some(frac) => digits(int) && !frac.is_empty() && digits(frac),
        None => !int.is_empty() && digits(int),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(text: &str, base: f64) -> Option<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
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
                tokens.push(Token::Num(literal.parse().ok()?));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect::<String>().to_ascii_lowercase();
                let value = match word.as_str() {
                    "value" | "v" | "x" | "pos" => base,
                    "pi" => std::f64::consts::PI,
                    "e" => std::f64::consts::E,
                    _ => return None,
                };
                tokens.push(Token::Num(value));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

/// expression := term (('+' | '-') term)*
/// term       := unary (('*' | '/') unary)*
/// unary      := ('+' | '-') unary | primary
/// primary    := number | '(' expression ')'
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expression(&mut self) -> Option<f64> {
        let mut value = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == Token::Plus { value + rhs } else { value - rhs };
        }
        Some(value)
    }

    fn term(&mut self) -> Option<f64> {
        let mut value = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = if op == Token::Star { value * rhs } else { value / rhs };
        }
        Some(value)
    }

    fn unary(&mut self) -> Option<f64> {
        match self.peek()? {
            Token::Plus => {
                self.pos += 1;
                self.unary()
            }
            Token::Minus => {
                self.pos += 1;
                Some(-self.unary()?)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Option<f64> {
        match self.next()? {
            Token::Num(v) => Some(v),
            Token::LParen => {
                let value = self.expression()?;
                match self.next()? {
                    Token::RParen => Some(value),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_plain_numbers() {
        assert_eq!(evaluate_numeric_input("12.5", 0.0), 12.5);
        assert_eq!(evaluate_numeric_input("-.5", 0.0), -0.5);
        assert_eq!(evaluate_numeric_input("  +3 ", 0.0), 3.0);
        assert!(evaluate_numeric_input("", 1.0).is_nan());
        assert!(evaluate_numeric_input("   ", 1.0).is_nan());
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        assert!(close(evaluate_numeric_input("1 + 2 * 3", 0.0), 7.0));
        assert!(close(evaluate_numeric_input("(1 + 2) * 3", 0.0), 9.0));
        assert!(close(evaluate_numeric_input("10 / 4 - 1", 0.0), 1.5));
        assert!(close(evaluate_numeric_input("-(2 * 3.5)", 0.0), -7.0));
        assert!(close(evaluate_numeric_input("2 * -3", 0.0), -6.0));
    }

    #[test]
    fn test_constants_and_fallback() {
        assert!(close(evaluate_numeric_input("pi / 2", 0.0), std::f32::consts::FRAC_PI_2));
        assert!(close(evaluate_numeric_input("E", 0.0), std::f32::consts::E));
        assert!(close(evaluate_numeric_input("v + 10", 5.0), 15.0));
        assert!(close(evaluate_numeric_input("Value * 2", 1.5), 3.0));
        assert!(close(evaluate_numeric_input("pos - 1", f32::NAN), -1.0));
    }

    #[test]
    fn test_rejects_other_input() {
        assert!(evaluate_numeric_input("alert(1)", 0.0).is_nan());
        assert!(evaluate_numeric_input("2 ** 3", 0.0).is_nan());
        assert!(evaluate_numeric_input("1 +", 0.0).is_nan());
        assert!(evaluate_numeric_input("(1 + 2", 0.0).is_nan());
        assert!(evaluate_numeric_input("1.2.3", 0.0).is_nan());
        assert!(evaluate_numeric_input("1 / 0", 0.0).is_nan());
        assert!(evaluate_numeric_input("3 % 2", 0.0).is_nan());
    }
}
