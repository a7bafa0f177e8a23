use crate::error::ParseError;

/// Which offset a template token is shifted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    /// Already a real surface id; no offset (`T` suffix).
    True,
    /// Primary offset (no suffix).
    Primary,
    /// Minor offset (`M` suffix).
    Minor,
    /// Secondary offset (`N` suffix).
    Secondary,
}

impl Channel {
    fn from_suffix(c: char) -> Option<Self> {
        match c {
            'T' => Some(Self::True),
            'M' => Some(Self::Minor),
            'N' => Some(Self::Secondary),
            _ => None,
        }
    }
}

/// A lexical element of a composite template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateToken {
    /// A signed surface number bound to an offset channel.
    Surf { value: i32, channel: Channel },
    /// `(`
    Open,
    /// `)`
    Close,
    /// `:`
    Union,
    /// `#`
    Not,
}

/// Splits a template into typed tokens.
///
/// # Errors
///
/// Returns an error for a non-numeric token, a zero surface number or
/// unbalanced parentheses.
pub fn tokenize(template: &str) -> Result<Vec<TemplateToken>, ParseError> {
    let mut tokens = Vec::new();
    let mut depth = 0_i32;
    let mut chars = template.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => {
                depth += 1;
                tokens.push(TemplateToken::Open);
            }
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(ParseError::UnbalancedParenthesis(template.to_string()));
                }
                tokens.push(TemplateToken::Close);
            }
            ':' => tokens.push(TemplateToken::Union),
            '#' => tokens.push(TemplateToken::Not),
            _ => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, n)) = chars.peek() {
                    if n.is_whitespace() || matches!(n, '(' | ')' | ':' | '#') {
                        break;
                    }
                    end = i + n.len_utf8();
                    chars.next();
                }
                let word = &template[start..end];
                tokens.push(surf_token(word).ok_or_else(|| ParseError::BadToken {
                    token: word.to_string(),
                    expr: template.to_string(),
                })?);
            }
        }
    }
    if depth != 0 {
        return Err(ParseError::UnbalancedParenthesis(template.to_string()));
    }
    Ok(tokens)
}

fn surf_token(word: &str) -> Option<TemplateToken> {
    let (number, channel) = match word.chars().last().and_then(Channel::from_suffix) {
        Some(channel) => (&word[..word.len() - 1], channel),
        None => (word, Channel::Primary),
    };
    let digits = number.strip_prefix(['+', '-']).unwrap_or(number);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: i32 = number.parse().ok()?;
    (value != 0 && value != i32::MIN).then_some(TemplateToken::Surf { value, channel })
}

/// Writes tokens back out as expression text.
#[must_use]
pub fn render(tokens: &[TemplateToken]) -> String {
    let mut out = String::new();
    let mut prev: Option<TemplateToken> = None;
    for token in tokens {
        let needs_space = match (prev, token) {
            (None | Some(TemplateToken::Open | TemplateToken::Not), _)
            | (_, TemplateToken::Close) => false,
            _ => true,
        };
        if needs_space {
            out.push(' ');
        }
        match token {
            TemplateToken::Surf { value, .. } => out.push_str(&value.to_string()),
            TemplateToken::Open => out.push('('),
            TemplateToken::Close => out.push(')'),
            TemplateToken::Union => out.push(':'),
            TemplateToken::Not => out.push('#'),
        }
        prev = Some(*token);
    }
    out
}

/// Removes operators and groups left without operands after tokens were
/// dropped: empty `()` pairs, `#` with nothing to complement and `:` with a
/// missing side.
#[must_use]
pub fn tidy(mut tokens: Vec<TemplateToken>) -> Vec<TemplateToken> {
    use TemplateToken::{Close, Not, Open, Union};
    loop {
        let before = tokens.len();
        let mut out: Vec<TemplateToken> = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let token = tokens[i];
            let next = tokens.get(i + 1).copied();
            match token {
                Open if next == Some(Close) => {
                    if out.last() == Some(&Not) {
                        out.pop();
                    }
                    i += 2;
                    continue;
                }
                Not if matches!(next, None | Some(Close | Union)) => {}
                Union
                    if matches!(out.last(), None | Some(Open | Union | Not))
                        || matches!(next, None | Some(Close | Union)) => {}
                _ => out.push(token),
            }
            i += 1;
        }
        tokens = out;
        if tokens.len() == before {
            return tokens;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn surf(value: i32, channel: Channel) -> TemplateToken {
        TemplateToken::Surf { value, channel }
    }

    #[test]
    fn suffixes_select_channels() {
        let tokens = tokenize("1 -2M 3N -4T").unwrap();
        assert_eq!(
            tokens,
            vec![
                surf(1, Channel::Primary),
                surf(-2, Channel::Minor),
                surf(3, Channel::Secondary),
                surf(-4, Channel::True),
            ]
        );
    }

    #[test]
    fn punctuation_splits_words() {
        let tokens = tokenize("#(1:-2M)").unwrap();
        assert_eq!(
            tokens,
            vec![
                TemplateToken::Not,
                TemplateToken::Open,
                surf(1, Channel::Primary),
                TemplateToken::Union,
                surf(-2, Channel::Minor),
                TemplateToken::Close,
            ]
        );
        assert_eq!(render(&tokens), "#(1 : -2)");
    }

    #[test]
    fn malformed() {
        assert!(matches!(tokenize("1 2X"), Err(ParseError::BadToken { .. })));
        assert!(matches!(tokenize("M"), Err(ParseError::BadToken { .. })));
        assert!(matches!(tokenize("0"), Err(ParseError::BadToken { .. })));
        assert!(matches!(
            tokenize("-2147483648M"),
            Err(ParseError::BadToken { .. })
        ));
        assert!(matches!(
            tokenize("(1 2"),
            Err(ParseError::UnbalancedParenthesis(_))
        ));
        assert!(matches!(
            tokenize("1 2)("),
            Err(ParseError::UnbalancedParenthesis(_))
        ));
    }

    #[test]
    fn tidy_removes_orphans() {
        let t = |s: &str| render(&tidy(tokenize(s).unwrap()));
        assert_eq!(t("1 : ()"), "1");
        assert_eq!(t("(: 2) 3"), "(2) 3");
        assert_eq!(t("#() 4 :"), "4");
        assert_eq!(t("(()) : : 5"), "5");
    }
}
