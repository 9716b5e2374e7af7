use std::{fmt, ops::Range};

#[derive(Copy, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Token {
    pub kind: TokenKind,
    lo: usize,
    len: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Token {
        Token {
            kind,
            len: span.len,
            lo: span.lo,
        }
    }

    /// Returns an end of file token positioned at the end of the source.
    pub fn eof_for(src: &str) -> Token {
        Token::new(TokenKind::Eof, Span::new_of_length(src.len(), 0))
    }

    pub fn span(&self) -> Span {
        Span {
            len: self.len,
            lo: self.lo,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {})", self.kind, self.span())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub len: u32,
    pub lo: usize,
}

impl Span {
    /// A span that points nowhere, used for compiler-synthesized nodes.
    pub const DUMMY: Span = Span { len: 0, lo: 0 };

    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>) -> Span {
        debug_assert!(hi >= lo);
        let len = u32::try_from(hi - lo).expect("token longer than u32::MAX bytes");
        Self::new_of_length(lo, len)
    }

    pub fn new_of_length(lo: usize, len: u32) -> Span {
        Span { len, lo }
    }

    pub fn hi(&self) -> usize {
        self.lo + self.len as usize
    }

    /// Returns a span that covers both `self` and `other`.
    pub fn to(&self, other: Span) -> Span {
        let lo = self.lo.min(other.lo);
        let hi = self.hi().max(other.hi());
        Span::new_of_bounds(lo..hi)
    }

    /// Shrinks or grows the span bounds by the given signed amounts.
    pub fn offset(&self, lo: isize, hi: isize) -> Span {
        let new_lo = self.lo.checked_add_signed(lo).expect("span underflow");
        let new_hi = self.hi().checked_add_signed(hi).expect("span underflow");
        Span::new_of_bounds(new_lo..new_hi)
    }

    pub fn substr<'src>(&self, src: &'src str) -> &'src str {
        &src[self.lo..self.hi()]
    }

    /// Whether `other` starts exactly where `self` ends.
    pub fn touches(&self, other: Span) -> bool {
        self.hi() == other.lo
    }

    /// Computes the one-based line and column of the span start.
    pub fn line_col(&self, src: &str) -> (usize, usize) {
        let before = &src[..self.lo.min(src.len())];
        let line = before.bytes().filter(|&b| b == b'\n').count() + 1;
        let col = match before.rfind('\n') {
            Some(nl) => before[nl + 1..].chars().count() + 1,
            None => before.chars().count() + 1,
        };
        (line, col)
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { span: self, inner }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, len: {})", self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.lo;
        let hi = self.hi();
        write!(f, "{lo}..{hi}")
    }
}

/// A value paired with the source region it originated from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub inner: T,
}

impl<T: fmt::Display> fmt::Display for Spanned<T> {
    /// The alternate form (`{:#}`) prefixes the span.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{}: ", self.span)?;
        }
        write!(f, "{}", self.inner)
    }
}

impl<T: std::error::Error> std::error::Error for Spanned<T> {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Fn,
    Struct,
    Interface,
    Impl,
    Enum,
    Static,
    For,
    In,
    Return,
    If,
    Else,
    Let,
    Set,
    While,
    Not,
    And,
    Or,

    True,
    False,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    /// `=`
    Assign,
    /// `->`
    Arrow,
    Dot,
    Comma,
    Semicolon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Identifier,
    /// Two or more identifiers joined by `/`, with no whitespace in between.
    Path,
    Number,
    /// A string without escape sequences.
    String,
    /// A string which contains escape sequences.
    EscapedString,

    Eof,
    ErrorUnexpectedChar,
    ErrorUnclosedString,
}

impl TokenKind {
    pub fn is_error(self) -> bool {
        matches!(
            self,
            TokenKind::ErrorUnexpectedChar | TokenKind::ErrorUnclosedString
        )
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "fn" => TokenKind::Fn,
    "struct" => TokenKind::Struct,
    "interface" => TokenKind::Interface,
    "impl" => TokenKind::Impl,
    "enum" => TokenKind::Enum,
    "static" => TokenKind::Static,
    "for" => TokenKind::For,
    "in" => TokenKind::In,
    "return" => TokenKind::Return,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "let" => TokenKind::Let,
    "set" => TokenKind::Set,
    "while" => TokenKind::While,
    "not" => TokenKind::Not,
    "and" => TokenKind::And,
    "or" => TokenKind::Or,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col() {
        let src = "fn A\n  [x int]\nfoo";
        assert_eq!(Span::new_of_length(0, 2).line_col(src), (1, 1));
        assert_eq!(Span::new_of_length(8, 1).line_col(src), (2, 4));
        assert_eq!(Span::new_of_length(15, 3).line_col(src), (3, 1));
    }

    #[test]
    fn span_to_and_touches() {
        let a = Span::new_of_bounds(2..5);
        let b = Span::new_of_bounds(5..9);
        assert!(a.touches(b));
        assert!(!b.touches(a));
        assert_eq!(a.to(b), Span::new_of_bounds(2..9));
    }
}
