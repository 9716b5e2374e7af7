use std::fmt;

use crate::{
    codegen, lexer, mono, parser, resolver,
    token::{Span, Spanned},
    type_checker,
};

/// Any error produced by a compilation run. Every stage fails fast, so a run
/// produces at most one.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0:#}")]
    Lex(#[from] Spanned<lexer::Error>),
    #[error("{0:#}")]
    Parse(#[from] Spanned<parser::Error>),
    #[error("{0:#}")]
    Resolve(#[from] Spanned<resolver::Error>),
    #[error("{0:#}")]
    Type(#[from] Spanned<type_checker::Error>),
    #[error(transparent)]
    Mono(#[from] mono::Error),
    #[error(transparent)]
    Codegen(#[from] codegen::Error),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    LexError,
    ParseError,
    UnresolvedReference,
    DuplicateDeclaration,
    TypeMismatch,
    AmbiguousMember,
    UnknownMember,
    UnknownGeneric,
    MonomorphizationConflict,
    MangledNameCollision,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use type_checker::Error as T;

        match self {
            Error::Lex(_) => ErrorKind::LexError,
            Error::Parse(_) => ErrorKind::ParseError,
            Error::Resolve(e) => match e.inner {
                resolver::Error::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
                resolver::Error::DuplicateDeclaration { .. } => ErrorKind::DuplicateDeclaration,
            },
            Error::Type(e) => match e.inner {
                T::AmbiguousMember { .. } => ErrorKind::AmbiguousMember,
                T::UnknownMember { .. }
                | T::StaticThroughValue { .. }
                | T::ReceiverRequired { .. }
                | T::MissingImplementation { .. } => ErrorKind::UnknownMember,
                T::UnknownGeneric { .. }
                | T::MissingTypeArgument { .. }
                | T::InvalidTypeArgument { .. }
                | T::UnboundTypeParameter { .. } => ErrorKind::UnknownGeneric,
                T::TypeMismatch { .. }
                | T::ArityMismatch { .. }
                | T::NotCallable { .. }
                | T::NotAValue { .. }
                | T::InvalidAssignmentTarget
                | T::VoidBinding { .. }
                | T::NotComparable { .. }
                | T::NotIterable { .. }
                | T::ImplSignatureMismatch { .. }
                | T::InvalidImplTarget { .. }
                | T::NotAnInterface { .. }
                | T::MissingReceiver { .. }
                | T::MisplacedSelf => ErrorKind::TypeMismatch,
            },
            Error::Mono(_) => ErrorKind::MonomorphizationConflict,
            Error::Codegen(_) => ErrorKind::MangledNameCollision,
        }
    }

    /// The source position, for errors raised before generation.
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Lex(e) => Some(e.span),
            Error::Parse(e) => Some(e.span),
            Error::Resolve(e) => Some(e.span),
            Error::Type(e) => Some(e.span),
            Error::Mono(_) | Error::Codegen(_) => None,
        }
    }

    /// The offending declaration, for generation-stage errors.
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::Mono(e) => Some(e.path()),
            Error::Codegen(e) => Some(e.path()),
            _ => None,
        }
    }

    /// Renders the error for humans, as `error[Kind] at line:col: message`.
    pub fn render(&self, src: &str) -> String {
        let kind = self.kind();
        match (self.span(), self.path()) {
            (Some(span), _) => {
                let (line, col) = span.line_col(src);
                let message = self.message();
                format!("error[{kind}] at {line}:{col}: {message}")
            }
            (None, Some(path)) => format!("error[{kind}] in {path}: {self}"),
            (None, None) => format!("error[{kind}]: {self}"),
        }
    }

    /// The message without its span prefix.
    fn message(&self) -> String {
        match self {
            Error::Lex(e) => e.inner.to_string(),
            Error::Parse(e) => e.inner.to_string(),
            Error::Resolve(e) => e.inner.to_string(),
            Error::Type(e) => e.inner.to_string(),
            Error::Mono(e) => e.to_string(),
            Error::Codegen(e) => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_uses_line_and_column() {
        let src = "let a = 1\nlet b = $";
        let span = Span::new_of_length(18, 1);
        let error = Error::from(span.wrap(lexer::Error::UnexpectedChar('$')));
        assert_eq!(error.kind(), ErrorKind::LexError);
        assert_eq!(error.to_string(), "18..19: unrecognized character '$'");
        assert_eq!(
            error.render(src),
            "error[LexError] at 2:9: unrecognized character '$'"
        );
    }

    #[test]
    fn render_names_the_declaration_for_generation_errors() {
        let error = Error::from(mono::Error::TooDeep {
            name: "Node__Node__Int".to_string(),
            limit: 8,
        });
        assert_eq!(error.kind(), ErrorKind::MonomorphizationConflict);
        assert_eq!(
            error.render(""),
            "error[MonomorphizationConflict] in Node__Node__Int: \
             instance Node__Node__Int nests deeper than 8 levels"
        );
    }
}
