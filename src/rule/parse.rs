use crate::error::ParseError;

use super::node::Rule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Surf(i32),
    Open,
    Close,
    Union,
    Not,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Union);
                i += 1;
            }
            '#' => {
                tokens.push(Token::Not);
                i += 1;
            }
            _ => {
                let start = i;
                while i < chars.len() && !is_delimiter(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let value = parse_literal(&word).ok_or_else(|| ParseError::BadToken {
                    token: word.clone(),
                    expr: expr.to_string(),
                })?;
                tokens.push(Token::Surf(value));
            }
        }
    }
    Ok(tokens)
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | ':' | '#')
}

fn parse_literal(word: &str) -> Option<i32> {
    let digits = word.strip_prefix(['+', '-']).unwrap_or(word);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: i32 = word.parse().ok()?;
    // i32::MIN has no negation, so it cannot be complemented
    (value != 0 && value != i32::MIN).then_some(value)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    expr: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn unbalanced(&self) -> ParseError {
        ParseError::UnbalancedParenthesis(self.expr.to_string())
    }

    fn dangling(&self) -> ParseError {
        ParseError::TrailingOperator(self.expr.to_string())
    }

    // expr := term (':' term)*
    fn expr(&mut self) -> Result<Rule, ParseError> {
        let mut terms = vec![self.term()?];
        while self.peek() == Some(Token::Union) {
            self.pos += 1;
            terms.push(self.term()?);
        }
        Ok(Rule::or(terms))
    }

    // term := factor+
    fn term(&mut self) -> Result<Rule, ParseError> {
        let mut factors = Vec::new();
        while let Some(token) = self.peek() {
            if matches!(token, Token::Union | Token::Close) {
                break;
            }
            factors.push(self.factor()?);
        }
        if factors.is_empty() {
            return Err(self.dangling());
        }
        Ok(Rule::and(factors))
    }

    // factor := SURF | '(' expr ')' | '#' factor
    fn factor(&mut self) -> Result<Rule, ParseError> {
        let token = self.peek().ok_or_else(|| self.dangling())?;
        self.pos += 1;
        match token {
            Token::Surf(n) => Ok(Rule::Literal(n)),
            Token::Open => {
                let inner = self.expr()?;
                if self.peek() != Some(Token::Close) {
                    return Err(self.unbalanced());
                }
                self.pos += 1;
                Ok(inner)
            }
            Token::Not => Ok(self.factor()?.complement()),
            Token::Close => Err(self.unbalanced()),
            Token::Union => Err(self.dangling()),
        }
    }
}

/// Parses expression text into a rule tree.
///
/// Juxtaposition is intersection, `:` is union (binding looser than
/// intersection), parentheses group and `#` complements the following
/// literal or group. Blank text yields `None`, the universal region.
pub(crate) fn parse_rule(expr: &str) -> Result<Option<Rule>, ParseError> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        expr,
    };
    let rule = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        // Only a stray ')' can stop the top-level expression early
        return Err(parser.unbalanced());
    }
    Ok(Some(rule))
}
