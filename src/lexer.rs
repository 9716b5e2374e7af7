use std::{iter::Peekable, num::ParseIntError};

use crate::{
    token::{Span, Spanned, Token, TokenKind, KEYWORDS},
    util::BreakableIteratorExt,
};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 8_192;

/// Lexes the provided string, producing the tokens into the provided buffer.
///
/// Stops at the first malformed token. The buffer always ends with an
/// [`TokenKind::Eof`] token on success.
pub fn lex(src: &str, tokens: &mut Vec<Token>) -> Result<(), Spanned<Error>> {
    assert!(tokens.is_empty(), "must pass clean tokens buffer");
    for token in Lexer::new(src).up_to(Token::is_eof) {
        match token.kind {
            TokenKind::ErrorUnexpectedChar => {
                let c = token.span().substr(src).chars().next().unwrap_or('\0');
                return Err(token.span().wrap(Error::UnexpectedChar(c)));
            }
            TokenKind::ErrorUnclosedString => {
                return Err(token.span().wrap(Error::UnclosedString));
            }
            _ => tokens.push(token),
        }
    }
    tracing::trace!(count = tokens.len(), "lexed source");
    Ok(())
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(src: &str) -> Result<Vec<Token>, Spanned<Error>> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lex(src, &mut tokens)?;
    Ok(tokens)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unrecognized character {0:?}")]
    UnexpectedChar(char),
    #[error("unterminated string literal")]
    UnclosedString,
}

/// The lexer. Whitespace and comments never produce tokens.
///
/// After the source is exhausted it keeps yielding [`TokenKind::Eof`].
pub struct Lexer<'src> {
    src: &'src str,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    current_lo: usize,
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.skip_trivia();
        let kind = self.scan_token_kind();
        Some(Token::new(kind, self.span()))
    }
}

impl Lexer<'_> {
    /// Tries to scan the current character.
    fn scan_token_kind(&mut self) -> TokenKind {
        use TokenKind::*;
        match self.mark_advance() {
            '\0' => Eof,
            '+' => Plus,
            '-' => match self.peek() {
                '>' => self.advance_with(Arrow),
                _ => Minus,
            },
            '*' => Star,
            '/' => Slash,
            '%' => Percent,
            '=' => match self.peek() {
                '=' => self.advance_with(EqEq),
                _ => Assign,
            },
            '!' => match self.peek() {
                '=' => self.advance_with(NotEq),
                _ => ErrorUnexpectedChar,
            },
            '<' => match self.peek() {
                '=' => self.advance_with(LessEq),
                _ => Less,
            },
            '>' => match self.peek() {
                '=' => self.advance_with(GreaterEq),
                _ => Greater,
            },
            '.' => Dot,
            ',' => Comma,
            ';' => Semicolon,
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            '[' => LBracket,
            ']' => RBracket,
            '"' => self.string(),
            c if c.is_ascii_alphabetic() => self.identifier_keyword_or_path(),
            c if c.is_ascii_digit() => self.number(),
            _ => ErrorUnexpectedChar,
        }
    }

    /// Tries to lex a string token.
    ///
    /// Escapes are only resolved later, by [`extract::escaped_string`], so
    /// strings without escape sequences never pay for a buffer.
    fn string(&mut self) -> TokenKind {
        // Whether any escaping did happen inside this string token
        let mut has_escaped = false;
        // Whether the current character is being escaped
        let mut is_escaping = false;
        loop {
            match (is_escaping, self.advance()) {
                (_, '\0') => return TokenKind::ErrorUnclosedString,
                (false, '"') => {
                    return if has_escaped {
                        TokenKind::EscapedString
                    } else {
                        TokenKind::String
                    };
                }
                (false, '\\') => {
                    has_escaped = true;
                    is_escaping = true;
                }
                (_, _) => is_escaping = false,
            }
        }
    }

    fn identifier_keyword_or_path(&mut self) -> TokenKind {
        self.identifier_tail();
        if let Some(keyword) = KEYWORDS.get(self.substr()).copied() {
            return keyword;
        }

        let mut kind = TokenKind::Identifier;
        while self.peek() == '/' && self.peek_second().is_ascii_alphabetic() {
            self.advance(); // `/`
            self.advance(); // first segment character
            self.identifier_tail();
            kind = TokenKind::Path;
        }
        kind
    }

    /// Consumes the rest of an identifier. A hyphen is only part of the name
    /// when a letter follows it.
    fn identifier_tail(&mut self) {
        loop {
            match self.peek() {
                c if c.is_ascii_alphanumeric() || c == '_' => {
                    self.advance();
                }
                '-' if self.peek_second().is_ascii_alphabetic() => {
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        TokenKind::Number
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                c if c.is_ascii_whitespace() => {
                    self.advance();
                }
                '#' => {
                    while !matches!(self.peek(), '\n' | '\0') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }
}

impl Lexer<'_> {
    /// Constructs a new lexer with the default state.
    pub fn new(src: &str) -> Lexer<'_> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
        }
    }

    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> char {
        self.current_lo = self.cursor;
        self.advance()
    }

    /// Returns the next character and advances the iterator.
    fn advance(&mut self) -> char {
        self.iter
            .next()
            .inspect(|c| self.cursor += c.len_utf8())
            .unwrap_or('\0')
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next character without advancing the iterator.
    fn peek(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    /// Returns the character after the next one.
    fn peek_second(&self) -> char {
        self.src[self.cursor..].chars().nth(1).unwrap_or('\0')
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        self.span().substr(self.src)
    }
}

pub mod extract {
    use super::*;

    pub fn int(token: Token, src: &str) -> Result<i64, ParseIntError> {
        debug_assert_eq!(token.kind, TokenKind::Number);
        token.span().substr(src).parse()
    }

    pub fn ident(token: Token, src: &str) -> &str {
        debug_assert_eq!(token.kind, TokenKind::Identifier);
        token.span().substr(src)
    }

    /// Splits a path token into its segments, each with its own span.
    pub fn path(token: Token, src: &str) -> Vec<(&str, Span)> {
        debug_assert_eq!(token.kind, TokenKind::Path);
        let mut lo = token.span().lo;
        token
            .span()
            .substr(src)
            .split('/')
            .map(|segment| {
                let span = Span::new_of_bounds(lo..lo + segment.len());
                lo += segment.len() + 1;
                (segment, span)
            })
            .collect()
    }

    pub fn string(token: Token, src: &str) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::String);
        let s = token.span().offset(1, -1).substr(src);
        s.to_string().into_boxed_str()
    }

    pub fn escaped_string(token: Token, src: &str) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::EscapedString);
        let s = token.span().offset(1, -1).substr(src);
        perform_escape(s).into_boxed_str()
    }
}

fn perform_escape(raw: &str) -> String {
    let mut buf = String::with_capacity(raw.len());
    let mut escaped = false;
    for char in raw.chars() {
        let char = match (escaped, char) {
            (true, 't') => '\t',
            (true, 'n') => '\n',
            (true, 'r') => '\r',
            (true, '0') => '\0',
            (false, '\\') => {
                escaped = true;
                continue;
            }
            (_, char) => char,
        };
        escaped = false;
        buf.push(char);
    }
    buf.shrink_to_fit();
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_demo_programs_lex() {
        for input in [
            include_str!("../demos/functions.sp"),
            include_str!("../demos/vectors.sp"),
            include_str!("../demos/animals.sp"),
            include_str!("../demos/arrays.sp"),
        ] {
            assert!(lex_in_new(input).is_ok());
        }
    }

    #[test]
    fn tests_with_span() {
        use TokenKind::*;
        let cases = cases!(match .. {
            "+-*/%" => [
                (Plus, 0..1),
                (Minus, 1..2),
                (Star, 2..3),
                (Slash, 3..4),
                (Percent, 4..5),
                (Eof, 5..5),
            ],
            "fn Add [x int] -> int" => [
                (Fn, 0..2),
                (Identifier, 3..6),
                (LBracket, 7..8),
                (Identifier, 8..9),
                (Identifier, 10..13),
                (RBracket, 13..14),
                (Arrow, 15..17),
                (Identifier, 18..21),
                (Eof, 21..21),
            ],
            "Is-Even Add-10 x-1 a - b" => [
                (Identifier, 0..7),
                (Identifier, 8..11),
                (Minus, 11..12),
                (Number, 12..14),
                (Identifier, 15..16),
                (Minus, 16..17),
                (Number, 17..18),
                (Identifier, 19..20),
                (Minus, 21..22),
                (Identifier, 23..24),
                (Eof, 24..24),
            ],
            "Factorial/Multiply/Accumulator a / b c/1" => [
                (Path, 0..30),
                (Identifier, 31..32),
                (Slash, 33..34),
                (Identifier, 35..36),
                (Identifier, 37..38),
                (Slash, 38..39),
                (Number, 39..40),
                (Eof, 40..40),
            ],
            "== != = < <= > >= ->" => [
                (EqEq, 0..2),
                (NotEq, 3..5),
                (Assign, 6..7),
                (Less, 8..9),
                (LessEq, 10..12),
                (Greater, 13..14),
                (GreaterEq, 15..17),
                (Arrow, 18..20),
                (Eof, 20..20),
            ],
            "if # a comment\nelse" => [(If, 0..2), (Else, 15..19), (Eof, 19..19)],
            r#""hi" "a\"b""# => [(String, 0..4), (EscapedString, 5..11), (Eof, 11..11)],
            "x.y(1, 2)" => [
                (Identifier, 0..1),
                (Dot, 1..2),
                (Identifier, 2..3),
                (LParen, 3..4),
                (Number, 4..5),
                (Comma, 5..6),
                (Number, 7..8),
                (RParen, 8..9),
                (Eof, 9..9),
            ],
        });

        for (input, tokens) in cases {
            let lexed = lex_in_new(input).expect("lexes");
            assert_eq!(lexed, tokens.as_slice(), "input: {input:?}");
        }
    }

    #[test]
    fn test_lazy_lexer_keeps_yielding_eof() {
        let mut lexer = Lexer::new("a");
        assert_eq!(lexer.next().map(|t| t.kind), Some(TokenKind::Identifier));
        assert_eq!(lexer.next().map(|t| t.kind), Some(TokenKind::Eof));
        assert_eq!(lexer.next().map(|t| t.kind), Some(TokenKind::Eof));
    }

    #[test]
    fn test_errors() {
        let error = lex_in_new("fn $").unwrap_err();
        assert_eq!(error, Span::new_of_bounds(3..4).wrap(Error::UnexpectedChar('$')));

        let error = lex_in_new("let s = \"unterminated").unwrap_err();
        assert_eq!(error, Span::new_of_bounds(8..21).wrap(Error::UnclosedString));

        let error = lex_in_new("_hidden").unwrap_err();
        assert_eq!(error.inner, Error::UnexpectedChar('_'));
    }

    #[test]
    fn test_extract() {
        let src = r#"Add/Add2 "a\tb""#;
        let tokens = lex_in_new(src).unwrap();
        let segments = extract::path(tokens[0], src);
        assert_eq!(
            segments,
            [
                ("Add", Span::new_of_bounds(0..3)),
                ("Add2", Span::new_of_bounds(4..8)),
            ]
        );
        assert_eq!(&*extract::escaped_string(tokens[1], src), "a\tb");
    }

    macro_rules! cases {
        (match .. {
            $($str:expr => [$(($kind:expr, $range:expr)),* $(,)?]),* $(,)?
        }) => {{
            &[$((
                $str,
                vec![
                    $(Token::new($kind, Span::new_of_bounds($range.start..$range.end))),*
                ],
            )),*]
        }};
    }
    use cases;
}
