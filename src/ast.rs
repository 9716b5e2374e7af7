// program   ::= (item | stmt)*
// item      ::= function | struct | interface | impl | enum
// function  ::= fn header '{' stmt* '}'
// header    ::= '(' NAME param* ')' ['->' type]
//             | ID param* ['->' type]
// param     ::= '[' ID [type] ']'
// type      ::= ID ['<' type '>']
// struct    ::= struct ID ['<' ID '>'] '{' (field | static field | function)* '}'
// field     ::= '[' ID type ']'
// interface ::= interface ID '{' (fn header)* '}'
// impl      ::= impl ID for ID ['{' function* '}']
// enum      ::= enum ID '{' ID* '}'
// stmt      ::= function
//             | return [expr]
//             | let ID [type] '=' expr
//             | if expr block [else (block | if)]
//             | while expr block
//             | for ID in expr block
//             | block
//             | expr ['=' expr]
//             | '(' return [expr] ')'
//             | '(' let (ID | '[' ID type ']') expr ')'
//             | '(' set expr expr ')'
//             | '(' if expr block [else block] ')'
//             | '(' while expr block ')'
//             | '(' for ID expr block ')'
// expr      ::= expr (or | and | == | != | < | <= | > | >= | + | - | * | / | %) expr
//             | ('-' | not) expr
//             | expr '.' ID ['(' [expr (',' expr)*] ')']
//             | '(' expr expr* ')'
//             | ID '<' type '>' '.' ID
//             | '(' expr ')'
//             | ID | PATH | integer | string | true | false

// Precedence
//
// .
// - not
// * / %
// + -
// < <= > >=
// == !=
// and
// or

use crate::{
    token::Span,
    util::intern::{Interner, Symbol},
};

#[derive(Debug, Default, PartialEq)]
pub struct Program {
    pub items: Vec<Item>,
    /// Top-level statements, executed in order as the user main.
    pub body: Vec<Stmt>,
}

#[derive(Debug, PartialEq)]
pub enum Item {
    Function(Function),
    Struct(Struct),
    Interface(Interface),
    Impl(Impl),
    Enum(Enum),
}

#[derive(Debug, PartialEq)]
pub struct Function {
    /// A single segment for nested and surface declarations; the full path
    /// once flattened (or when written in canonical form).
    pub name: Path,
    pub params: Vec<Param>,
    pub return_ty: Option<TypeExpr>,
    pub body: Vec<Stmt>,
    pub kind: FunctionKind,
    pub span: Span,
}

impl Function {
    pub fn receiver(&self) -> Option<&Param> {
        self.params.first().filter(|p| p.ty.is_none())
    }
}

/// What a function is attached to. Filled by the flattener.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FunctionKind {
    Free,
    /// Declared in the body of struct `owner`.
    Method { owner: Ident },
    /// Declared in `impl interface for owner`.
    ImplMethod { owner: Ident, interface: Ident },
}

#[derive(Debug, PartialEq)]
pub struct Param {
    pub name: Ident,
    /// `None` only for the `self` receiver.
    pub ty: Option<TypeExpr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeExpr {
    pub name: Ident,
    pub arg: Option<Box<TypeExpr>>,
    pub span: Span,
}

impl TypeExpr {
    pub fn show(&self, idents: &Interner<str>) -> String {
        match &self.arg {
            Some(arg) => format!("{}<{}>", idents.get(self.name), arg.show(idents)),
            None => idents.get(self.name).to_string(),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Struct {
    pub name: Ident,
    pub type_param: Option<Ident>,
    pub fields: Vec<Field>,
    pub statics: Vec<Field>,
    /// Emptied by the flattener, which lifts methods to top-level functions.
    pub methods: Vec<Function>,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub struct Field {
    pub name: Ident,
    pub ty: TypeExpr,
}

#[derive(Debug, PartialEq)]
pub struct Interface {
    pub name: Ident,
    pub methods: Vec<Signature>,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub struct Signature {
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_ty: Option<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub struct Impl {
    pub interface: Ident,
    pub target: Ident,
    /// Emptied by the flattener, which lifts methods to top-level functions.
    pub methods: Vec<Function>,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub struct Enum {
    pub name: Ident,
    pub variants: Vec<Ident>,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum StmtKind {
    /// A nested declaration. Never present after flattening.
    Function(Box<Function>),
    Return(Option<Expr>),
    Let {
        name: Ident,
        ty: Option<TypeExpr>,
        value: Expr,
    },
    Assign {
        target: Expr,
        value: Expr,
    },
    If {
        predicate: Expr,
        then_body: Vec<Stmt>,
        /// An `else if` is an else body holding a single `if` statement.
        else_body: Option<Vec<Stmt>>,
    },
    While {
        predicate: Expr,
        body: Vec<Stmt>,
    },
    For {
        binding: Ident,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Block(Vec<Stmt>),
    Expr(Expr),
}

#[derive(Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    /// `target.member`, a field read or (as a callee) a method.
    Member {
        target: Box<Expr>,
        member: Ident,
    },
    /// `Type.member`, a static member, constructor, or enum variant.
    Static {
        ty: TypeExpr,
        member: Ident,
    },
    Name(Name),
    Int(i64),
    String(Box<str>),
    Bool(bool),
}

/// A reference by name, as written, plus what it resolved to.
#[derive(Debug, PartialEq)]
pub struct Name {
    pub path: Path,
    pub res: Option<Res>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Res {
    /// A parameter or local variable of the current function.
    Local,
    /// A function declaration, by its fully-qualified path.
    Function(QualifiedPath),
    /// A top-level type (struct, interface or enum).
    Type,
    /// The built-in `Range` constructor.
    Range,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Neg,
    Not,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::Eq => "==",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        }
    }
}

/// A path as written in the source, one identifier per segment.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    pub segments: Vec<Ident>,
}

impl Path {
    pub fn single(ident: Ident) -> Path {
        Path {
            segments: vec![ident],
        }
    }

    pub fn span(&self) -> Span {
        let first = self.segments[0].span;
        let last = self.segments[self.segments.len() - 1].span;
        first.to(last)
    }

    pub fn last(&self) -> Ident {
        self.segments[self.segments.len() - 1]
    }

    pub fn is_single(&self) -> bool {
        self.segments.len() == 1
    }

    pub fn qualified(&self) -> QualifiedPath {
        QualifiedPath(self.segments.iter().map(|s| s.name).collect())
    }

    pub fn show(&self, idents: &Interner<str>) -> String {
        self.qualified().show(idents)
    }
}

/// A fully-qualified declaration path, such as `Factorial/Accumulator`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedPath(pub Vec<Symbol>);

impl QualifiedPath {
    pub fn root() -> QualifiedPath {
        QualifiedPath(Vec::new())
    }

    pub fn child(&self, name: Symbol) -> QualifiedPath {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend_from_slice(&self.0);
        segments.push(name);
        QualifiedPath(segments)
    }

    pub fn segments(&self) -> &[Symbol] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders the path with `/` separators.
    pub fn show(&self, idents: &Interner<str>) -> String {
        let mut buf = String::new();
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                buf.push('/');
            }
            buf.push_str(idents.get(segment));
        }
        buf
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub name: Symbol,
    pub span: Span,
}

impl From<Ident> for Symbol {
    fn from(value: Ident) -> Self {
        value.name
    }
}

impl From<&Ident> for Symbol {
    fn from(value: &Ident) -> Self {
        value.name
    }
}
