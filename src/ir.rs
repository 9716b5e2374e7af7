//! The typed, fully resolved program handed from the checker to the code
//! generator. Every expression carries its type and every call names its
//! concrete target, so code generation needs no further lookups beyond
//! struct layouts.

use crate::{
    ast::{BinaryOperator, QualifiedPath, UnaryOperator},
    types::{FnSig, StructLayout, Type},
    util::intern::Symbol,
};

#[derive(Debug, Default)]
pub struct Program {
    pub enums: Vec<EnumDef>,
    pub interfaces: Vec<InterfaceDef>,
    /// Declared structs in declaration order, then template instances in
    /// first-use order.
    pub structs: Vec<StructDef>,
    /// Element types of every `Array<T>` instance, in first-use order.
    pub arrays: Vec<Type>,
    pub functions: Vec<Function>,
    /// Top-level statements, in source order.
    pub body: Vec<Stmt>,
}

impl Program {
    pub fn struct_def(&self, ty: &Type) -> Option<&StructDef> {
        self.structs.iter().find(|s| &s.ty == ty)
    }
}

#[derive(Debug)]
pub struct EnumDef {
    pub name: Symbol,
    pub variants: Vec<Symbol>,
}

#[derive(Debug)]
pub struct InterfaceDef {
    pub name: Symbol,
    pub methods: Vec<(Symbol, FnSig)>,
    /// Concrete types with a declared `impl`, in declaration order. This is
    /// the discriminant set of the interface's tagged union.
    pub implementors: Vec<Type>,
}

#[derive(Debug)]
pub struct StructDef {
    pub ty: Type,
    pub layout: StructLayout,
    pub statics: StructLayout,
}

#[derive(Debug)]
pub struct Function {
    pub target: FnRef,
    pub params: Vec<Param>,
    pub ret: Type,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: Symbol,
    pub ty: Type,
    pub receiver: bool,
}

/// A callable entity. Each variant maps to exactly one generated symbol.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FnRef {
    Free(QualifiedPath),
    /// A struct method, with or without a receiver.
    Method {
        owner: Type,
        name: Symbol,
    },
    /// A method supplied by `impl interface for owner`.
    Impl {
        owner: Type,
        interface: Symbol,
        name: Symbol,
    },
    /// The implicit `New` of a struct or template instance.
    Constructor(Type),
    Array {
        elem: Type,
        op: ArrayOp,
    },
    /// The built-in numeric range.
    Range,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArrayOp {
    New,
    Length,
    Get,
    Set,
    Iterate,
    Reversed,
}

impl ArrayOp {
    pub const ALL: [ArrayOp; 6] = [
        ArrayOp::New,
        ArrayOp::Length,
        ArrayOp::Get,
        ArrayOp::Set,
        ArrayOp::Iterate,
        ArrayOp::Reversed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ArrayOp::New => "New",
            ArrayOp::Length => "Length",
            ArrayOp::Get => "Get",
            ArrayOp::Set => "Set",
            ArrayOp::Iterate => "Iterate",
            ArrayOp::Reversed => "Reversed",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Let {
        name: Symbol,
        ty: Type,
        value: Expr,
    },
    Assign {
        target: Expr,
        value: Expr,
    },
    Return(Option<Expr>),
    If {
        predicate: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While {
        predicate: Expr,
        body: Vec<Stmt>,
    },
    For {
        binding: Symbol,
        binding_ty: Type,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Block(Vec<Stmt>),
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Bool(bool),
    String(Box<str>),
    /// A parameter or local variable.
    Local(Symbol),
    Call {
        target: FnRef,
        receiver: Option<Box<Expr>>,
        args: Vec<Expr>,
    },
    /// A method call on an interface-typed receiver, resolved at run time.
    Dispatch {
        interface: Symbol,
        method: Symbol,
        receiver: Box<Expr>,
        args: Vec<Expr>,
    },
    Field {
        target: Box<Expr>,
        field: Symbol,
    },
    StaticField {
        owner: Type,
        field: Symbol,
    },
    Variant {
        owner: Symbol,
        variant: Symbol,
    },
    /// Wraps a concrete struct value into an interface's tagged union.
    Upcast {
        interface: Symbol,
        expr: Box<Expr>,
    },
    Unary {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}
