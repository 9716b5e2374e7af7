//! Flattening and scope resolution.
//!
//! Every function, however deeply nested, becomes one top-level item named by
//! its fully-qualified path. Struct methods become `S/m` and impl methods
//! `S/I/m`. Every name in a body is resolved to a local, a function path, a
//! type, or the built-in `Range`.

use std::collections::{HashMap, HashSet};

use crate::{
    ast::{
        Expr, ExprKind, Function, FunctionKind, Ident, Item, Name, Path, Program, QualifiedPath,
        Res, Stmt, StmtKind, TypeExpr,
    },
    token::{Span, Spanned},
    types::{self, well_known},
    util::intern::{Interner, Symbol},
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// Flattens the program into its canonical shape.
pub fn flatten(program: Program, idents: &Interner<str>) -> Result<Program> {
    let _span = tracing::debug_span!("flatten").entered();
    let mut f = Flattener::new(idents);
    f.declare_items(&program.items)?;
    f.declare_functions(&program)?;

    let Program { items, body } = program;
    for item in items {
        f.flatten_item(item)?;
    }

    let mut scope = Scope::new(QualifiedPath::root());
    let mut nested = Vec::new();
    let body = f.resolve_body(body, &mut scope, &[], &mut nested)?;
    for (function, path) in nested {
        f.lift(function, path, FunctionKind::Free, None)?;
    }

    tracing::debug!(items = f.out.len(), "flattened program");
    Ok(Program {
        items: f.out,
        body,
    })
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unresolved reference {name} in {context}")]
    UnresolvedReference { name: String, context: String },
    #[error("duplicate declaration {path}")]
    DuplicateDeclaration { path: String },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TypeKind {
    Struct,
    Template,
    Interface,
    Enum,
}

struct Flattener<'i> {
    idents: &'i Interner<str>,
    types: HashMap<Symbol, TypeKind>,
    /// Type parameter of each generic struct.
    type_params: HashMap<Symbol, Symbol>,
    /// Declared `(target, interface)` pairs.
    impls: HashSet<(Symbol, Symbol)>,
    /// Every declared path: functions, methods, and struct members.
    declared: HashSet<QualifiedPath>,
    /// Paths that plain names may resolve to. Methods are not among them.
    functions: HashSet<QualifiedPath>,
    out: Vec<Item>,
}

impl<'i> Flattener<'i> {
    fn new(idents: &'i Interner<str>) -> Flattener<'i> {
        Flattener {
            idents,
            types: HashMap::new(),
            type_params: HashMap::new(),
            impls: HashSet::new(),
            declared: HashSet::new(),
            functions: HashSet::new(),
            out: Vec::new(),
        }
    }

    /// Registers type names, struct members, interface methods, enum variants
    /// and impl pairs.
    fn declare_items(&mut self, items: &[Item]) -> Result<()> {
        for item in items {
            match item {
                Item::Struct(s) => {
                    let kind = match s.type_param {
                        Some(param) => {
                            self.type_params.insert(s.name.name, param.name);
                            TypeKind::Template
                        }
                        None => TypeKind::Struct,
                    };
                    self.declare_type(s.name, kind)?;
                    let owner = QualifiedPath::root().child(s.name.name);
                    self.declared.insert(owner.child(well_known::NEW));
                    for member in s.fields.iter().chain(&s.statics) {
                        self.declare_path(owner.child(member.name.name), member.name.span)?;
                    }
                }
                Item::Interface(interface) => {
                    self.declare_type(interface.name, TypeKind::Interface)?;
                    let mut seen = HashSet::new();
                    for signature in &interface.methods {
                        if !seen.insert(signature.name.name) {
                            let path = [interface.name, signature.name];
                            return Err(self.duplicate(&path));
                        }
                    }
                }
                Item::Enum(e) => {
                    self.declare_type(e.name, TypeKind::Enum)?;
                    let mut seen = HashSet::new();
                    for variant in &e.variants {
                        if !seen.insert(variant.name) {
                            return Err(self.duplicate(&[e.name, *variant]));
                        }
                    }
                }
                Item::Impl(_) | Item::Function(_) => {}
            }
        }

        for item in items {
            if let Item::Impl(i) = item {
                self.check_type_exists(i.target, "impl")?;
                self.check_type_exists(i.interface, "impl")?;
                if !self.impls.insert((i.target.name, i.interface.name)) {
                    return Err(self.duplicate(&[i.target, i.interface]));
                }
            }
        }
        Ok(())
    }

    fn declare_type(&mut self, name: Ident, kind: TypeKind) -> Result<()> {
        if self.types.insert(name.name, kind).is_some() {
            return Err(self.duplicate(&[name]));
        }
        Ok(())
    }

    fn declare_path(&mut self, path: QualifiedPath, span: Span) -> Result<()> {
        if !self.declared.insert(path.clone()) {
            let path = path.show(self.idents);
            return Err(span.wrap(Error::DuplicateDeclaration { path }));
        }
        Ok(())
    }

    fn check_type_exists(&self, name: Ident, context: &str) -> Result<()> {
        if self.types.contains_key(&name.name) {
            return Ok(());
        }
        Err(name.span.wrap(Error::UnresolvedReference {
            name: self.idents.get(name).to_string(),
            context: context.to_string(),
        }))
    }

    /// Registers the path of every function, including nested ones, before
    /// any body is resolved, so that references may point forward.
    fn declare_functions(&mut self, program: &Program) -> Result<()> {
        for item in &program.items {
            match item {
                Item::Function(function) => {
                    let path = &function.name.segments;
                    if let [single] = path.as_slice() {
                        if self.types.contains_key(&single.name) {
                            return Err(self.duplicate(path));
                        }
                    }
                    let free = self.classify(&function.name) == FunctionKind::Free;
                    self.declare_function(path, &function.body, free)?;
                }
                Item::Struct(s) => {
                    for method in &s.methods {
                        let path = [s.name, method.name.last()];
                        self.declare_function(&path, &method.body, false)?;
                    }
                }
                Item::Impl(i) => {
                    for method in &i.methods {
                        let path = [i.target, i.interface, method.name.last()];
                        self.declare_function(&path, &method.body, false)?;
                    }
                }
                Item::Interface(_) | Item::Enum(_) => {}
            }
        }
        self.declare_nested(&[], &program.body)
    }

    fn declare_function(&mut self, path: &[Ident], body: &[Stmt], free: bool) -> Result<()> {
        let qualified = qualify(path);
        let span = path[path.len() - 1].span;
        self.declare_path(qualified.clone(), span)?;
        if free {
            self.functions.insert(qualified);
        }
        self.declare_nested(path, body)
    }

    fn declare_nested(&mut self, parent: &[Ident], body: &[Stmt]) -> Result<()> {
        for stmt in body {
            match &stmt.kind {
                StmtKind::Function(function) => {
                    let path = child_path(parent, function.name.last());
                    self.declare_function(&path, &function.body, true)?;
                }
                StmtKind::If {
                    then_body,
                    else_body,
                    ..
                } => {
                    self.declare_nested(parent, then_body)?;
                    if let Some(else_body) = else_body {
                        self.declare_nested(parent, else_body)?;
                    }
                }
                StmtKind::While { body, .. }
                | StmtKind::For { body, .. }
                | StmtKind::Block(body) => self.declare_nested(parent, body)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Decides what a top-level function declared by path is attached to.
    fn classify(&self, name: &Path) -> FunctionKind {
        match name.segments.as_slice() {
            [owner, _] if self.is_struct(owner.name) => FunctionKind::Method { owner: *owner },
            [owner, interface, _]
                if self.is_struct(owner.name)
                    && self.impls.contains(&(owner.name, interface.name)) =>
            {
                FunctionKind::ImplMethod {
                    owner: *owner,
                    interface: *interface,
                }
            }
            _ => FunctionKind::Free,
        }
    }

    fn is_struct(&self, name: Symbol) -> bool {
        matches!(
            self.types.get(&name),
            Some(TypeKind::Struct | TypeKind::Template)
        )
    }

    fn flatten_item(&mut self, item: Item) -> Result<()> {
        match item {
            Item::Function(function) => {
                let kind = self.classify(&function.name);
                let type_param = match kind {
                    FunctionKind::Method { owner } => self.struct_type_param(owner.name),
                    _ => None,
                };
                let path = function.name.segments.clone();
                self.lift(function, path, kind, type_param)?;
            }
            Item::Struct(mut s) => {
                let type_param = s.type_param.map(|p| p.name);
                for field in s.fields.iter().chain(&s.statics) {
                    self.resolve_type(&field.ty, type_param, &[s.name])?;
                }
                let methods = std::mem::take(&mut s.methods);
                let owner = s.name;
                self.out.push(Item::Struct(s));
                for method in methods {
                    let path = vec![owner, method.name.last()];
                    self.lift(method, path, FunctionKind::Method { owner }, type_param)?;
                }
            }
            Item::Interface(interface) => {
                for signature in &interface.methods {
                    let context = [interface.name, signature.name];
                    for param in &signature.params {
                        if let Some(ty) = &param.ty {
                            self.resolve_type(ty, None, &context)?;
                        }
                    }
                    if let Some(ty) = &signature.return_ty {
                        self.resolve_type(ty, None, &context)?;
                    }
                }
                self.out.push(Item::Interface(interface));
            }
            Item::Impl(mut i) => {
                let methods = std::mem::take(&mut i.methods);
                let (owner, interface) = (i.target, i.interface);
                self.out.push(Item::Impl(i));
                for method in methods {
                    let path = vec![owner, interface, method.name.last()];
                    let kind = FunctionKind::ImplMethod { owner, interface };
                    self.lift(method, path, kind, None)?;
                }
            }
            Item::Enum(e) => self.out.push(Item::Enum(e)),
        }
        Ok(())
    }

    fn struct_type_param(&self, owner: Symbol) -> Option<Symbol> {
        self.type_params.get(&owner).copied()
    }

    /// Resolves a function's body and emits it, followed by every function
    /// nested in it (pre-order).
    fn lift(
        &mut self,
        mut function: Function,
        path: Vec<Ident>,
        kind: FunctionKind,
        type_param: Option<Symbol>,
    ) -> Result<()> {
        let qualified = qualify(&path);
        tracing::trace!(path = %qualified.show(self.idents), "lifting declaration");

        for param in &function.params {
            if let Some(ty) = &param.ty {
                self.resolve_type(ty, type_param, &path)?;
            }
        }
        if let Some(ty) = &function.return_ty {
            self.resolve_type(ty, type_param, &path)?;
        }

        let mut scope = Scope::new(qualified);
        for param in &function.params {
            self.declare_local(&mut scope, param.name)?;
        }
        scope.type_param = type_param;

        let mut nested = Vec::new();
        let body = std::mem::take(&mut function.body);
        function.body = self.resolve_body(body, &mut scope, &path, &mut nested)?;
        function.name = Path { segments: path };
        function.kind = kind;
        self.out.push(Item::Function(function));

        for (child, child_path) in nested {
            self.lift(child, child_path, FunctionKind::Free, type_param)?;
        }
        Ok(())
    }

    /// Resolves a statement list, moving nested declarations out into
    /// `nested`.
    fn resolve_body(
        &mut self,
        body: Vec<Stmt>,
        scope: &mut Scope,
        path: &[Ident],
        nested: &mut Vec<(Function, Vec<Ident>)>,
    ) -> Result<Vec<Stmt>> {
        let mut out = Vec::with_capacity(body.len());
        for stmt in body {
            let span = stmt.span;
            let kind = match stmt.kind {
                StmtKind::Function(function) => {
                    let child = child_path(path, function.name.last());
                    nested.push((*function, child));
                    continue;
                }
                StmtKind::Return(value) => {
                    let value = value.map(|v| self.resolve_expr(v, scope)).transpose()?;
                    StmtKind::Return(value)
                }
                StmtKind::Let { name, ty, value } => {
                    let value = self.resolve_expr(value, scope)?;
                    if let Some(ty) = &ty {
                        self.resolve_type(ty, scope.type_param, path)?;
                    }
                    self.declare_local(scope, name)?;
                    StmtKind::Let { name, ty, value }
                }
                StmtKind::Assign { target, value } => StmtKind::Assign {
                    target: self.resolve_expr(target, scope)?,
                    value: self.resolve_expr(value, scope)?,
                },
                StmtKind::If {
                    predicate,
                    then_body,
                    else_body,
                } => {
                    let predicate = self.resolve_expr(predicate, scope)?;
                    let then_body = self.resolve_scoped(then_body, scope, path, nested, None)?;
                    let else_body = else_body
                        .map(|body| self.resolve_scoped(body, scope, path, nested, None))
                        .transpose()?;
                    StmtKind::If {
                        predicate,
                        then_body,
                        else_body,
                    }
                }
                StmtKind::While { predicate, body } => StmtKind::While {
                    predicate: self.resolve_expr(predicate, scope)?,
                    body: self.resolve_scoped(body, scope, path, nested, None)?,
                },
                StmtKind::For {
                    binding,
                    iterable,
                    body,
                } => {
                    let iterable = self.resolve_expr(iterable, scope)?;
                    let body = self.resolve_scoped(body, scope, path, nested, Some(binding))?;
                    StmtKind::For {
                        binding,
                        iterable,
                        body,
                    }
                }
                StmtKind::Block(body) => {
                    StmtKind::Block(self.resolve_scoped(body, scope, path, nested, None)?)
                }
                StmtKind::Expr(expr) => StmtKind::Expr(self.resolve_expr(expr, scope)?),
            };
            out.push(Stmt { kind, span });
        }
        Ok(out)
    }

    /// Resolves a nested statement list in a fresh local scope. Declarations
    /// nested in it still belong to the enclosing function.
    fn resolve_scoped(
        &mut self,
        body: Vec<Stmt>,
        scope: &mut Scope,
        path: &[Ident],
        nested: &mut Vec<(Function, Vec<Ident>)>,
        binding: Option<Ident>,
    ) -> Result<Vec<Stmt>> {
        scope.locals.push(Vec::new());
        let result = binding
            .map_or(Ok(()), |binding| self.declare_local(scope, binding))
            .and_then(|()| self.resolve_body(body, scope, path, nested));
        scope.locals.pop();
        result
    }

    fn declare_local(&self, scope: &mut Scope, name: Ident) -> Result<()> {
        if scope.is_local(name.name) {
            let path = scope.path.child(name.name).show(self.idents);
            return Err(name.span.wrap(Error::DuplicateDeclaration { path }));
        }
        scope.declare(name.name);
        Ok(())
    }

    fn resolve_expr(&self, expr: Expr, scope: &Scope) -> Result<Expr> {
        let Expr { kind, span } = expr;
        let kind = match kind {
            ExprKind::Call { callee, args } => ExprKind::Call {
                callee: Box::new(self.resolve_expr(*callee, scope)?),
                args: args
                    .into_iter()
                    .map(|arg| self.resolve_expr(arg, scope))
                    .collect::<Result<_>>()?,
            },
            ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
                op,
                lhs: Box::new(self.resolve_expr(*lhs, scope)?),
                rhs: Box::new(self.resolve_expr(*rhs, scope)?),
            },
            ExprKind::Unary { op, expr } => ExprKind::Unary {
                op,
                expr: Box::new(self.resolve_expr(*expr, scope)?),
            },
            ExprKind::Member { target, member } => {
                let target = self.resolve_expr(*target, scope)?;
                // `Type.member` is a static access
                if let ExprKind::Name(Name {
                    path,
                    res: Some(Res::Type),
                }) = &target.kind
                {
                    let ty = TypeExpr {
                        name: path.last(),
                        arg: None,
                        span: target.span,
                    };
                    ExprKind::Static { ty, member }
                } else {
                    ExprKind::Member {
                        target: Box::new(target),
                        member,
                    }
                }
            }
            ExprKind::Static { ty, member } => {
                self.resolve_type(&ty, scope.type_param, &[])?;
                ExprKind::Static { ty, member }
            }
            ExprKind::Name(name) => ExprKind::Name(self.resolve_name(name, scope)?),
            kind @ (ExprKind::Int(_) | ExprKind::String(_) | ExprKind::Bool(_)) => kind,
        };
        Ok(Expr { kind, span })
    }

    fn resolve_name(&self, name: Name, scope: &Scope) -> Result<Name> {
        let Name { path, .. } = name;
        let res = match path.segments.as_slice() {
            [single] => self.resolve_single(single.name, scope),
            _ => {
                let qualified = path.qualified();
                self.functions
                    .contains(&qualified)
                    .then_some(Res::Function(qualified))
            }
        };
        match res {
            Some(res) => Ok(Name {
                path,
                res: Some(res),
            }),
            None => Err(path.span().wrap(Error::UnresolvedReference {
                name: path.show(self.idents),
                context: scope.context(self.idents),
            })),
        }
    }

    /// Locals first, then functions along the enclosing path (innermost
    /// first), then types and built-ins.
    fn resolve_single(&self, name: Symbol, scope: &Scope) -> Option<Res> {
        if scope.is_local(name) {
            return Some(Res::Local);
        }
        let ancestors = scope.path.segments();
        for k in (0..=ancestors.len()).rev() {
            let mut candidate = ancestors[..k].to_vec();
            candidate.push(name);
            let candidate = QualifiedPath(candidate);
            if self.functions.contains(&candidate) {
                return Some(Res::Function(candidate));
            }
        }
        if self.types.contains_key(&name) {
            return Some(Res::Type);
        }
        if name == well_known::RANGE {
            return Some(Res::Range);
        }
        None
    }

    /// Checks that every plain type name in `ty` refers to something.
    /// Template applications are validated by the checker.
    fn resolve_type(&self, ty: &TypeExpr, type_param: Option<Symbol>, context: &[Ident]) -> Result<()> {
        if let Some(arg) = &ty.arg {
            return self.resolve_type(arg, type_param, context);
        }
        let name = ty.name.name;
        let known = type_param == Some(name)
            || self.types.contains_key(&name)
            || well_known::is_builtin_template(name)
            || types::primitive(self.idents.get(name)).is_some();
        if known {
            return Ok(());
        }
        let context = if context.is_empty() {
            PROGRAM_CONTEXT.to_string()
        } else {
            qualify(context).show(self.idents)
        };
        Err(ty.span.wrap(Error::UnresolvedReference {
            name: self.idents.get(name).to_string(),
            context,
        }))
    }

    fn duplicate(&self, path: &[Ident]) -> Spanned<Error> {
        let span = path[path.len() - 1].span;
        let path = qualify(path).show(self.idents);
        span.wrap(Error::DuplicateDeclaration { path })
    }
}

const PROGRAM_CONTEXT: &str = "<program>";

/// The names visible inside one function body.
struct Scope {
    path: QualifiedPath,
    /// One frame per open block; the first frame holds the parameters.
    locals: Vec<Vec<Symbol>>,
    type_param: Option<Symbol>,
}

impl Scope {
    fn new(path: QualifiedPath) -> Scope {
        Scope {
            path,
            locals: vec![Vec::new()],
            type_param: None,
        }
    }

    fn is_local(&self, name: Symbol) -> bool {
        self.locals.iter().any(|frame| frame.contains(&name))
    }

    fn declare(&mut self, name: Symbol) {
        if let Some(frame) = self.locals.last_mut() {
            frame.push(name);
        }
    }

    fn context(&self, idents: &Interner<str>) -> String {
        if self.path.is_empty() {
            PROGRAM_CONTEXT.to_string()
        } else {
            self.path.show(idents)
        }
    }
}

fn qualify(path: &[Ident]) -> QualifiedPath {
    QualifiedPath(path.iter().map(|segment| segment.name).collect())
}

fn child_path(parent: &[Ident], name: Ident) -> Vec<Ident> {
    let mut path = Vec::with_capacity(parent.len() + 1);
    path.extend_from_slice(parent);
    path.push(name);
    path
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use resolver;

        fn test_nested_functions_are_lifted_in_pre_order() {
            let program = "
                fn Add [x int] [y int] -> int {
                    fn Add2 [a int] [b int] -> int {
                        return a + b
                    }
                    return (Add2 x y)
                }
                (Add 1 2)
            ";
            let tree_ok = "
                fn (Add [x int] [y int]) -> int {
                    (return (Add/Add2 x y))
                }

                fn (Add/Add2 [a int] [b int]) -> int {
                    (return (a + b))
                }

                (Add 1 2)
            ";
        }

        fn test_innermost_declaration_wins() {
            let program = "
                fn Helper -> int { return 1 }
                fn Outer -> int {
                    fn Helper -> int { return 2 }
                    fn Inner -> int { return (Helper) }
                    return (Inner)
                }
            ";
            let tree_ok = "
                fn (Helper) -> int {
                    (return 1)
                }

                fn (Outer) -> int {
                    (return (Outer/Inner))
                }

                fn (Outer/Helper) -> int {
                    (return 2)
                }

                fn (Outer/Inner) -> int {
                    (return (Outer/Helper))
                }
            ";
        }

        fn test_explicit_path_reference() {
            let program = "
                fn Factorial [n int] -> int {
                    fn Accumulator [n int] [acc int] -> int {
                        if n == 0 { return acc }
                        return (Factorial/Accumulator (n - 1) (acc * n))
                    }
                    return (Accumulator n 1)
                }
            ";
            let tree_ok = "
                fn (Factorial [n int]) -> int {
                    (return (Factorial/Accumulator n 1))
                }

                fn (Factorial/Accumulator [n int] [acc int]) -> int {
                    (if (n == 0) {
                        (return acc)
                    })
                    (return (Factorial/Accumulator (n - 1) (acc * n)))
                }
            ";
        }

        fn test_methods_and_statics_are_lifted() {
            let program = "
                struct Vector2 {
                    [x int]
                    [y int]
                    static [Count int]
                    fn Add [self] [other Vector2] -> Vector2 {
                        return Vector2.New(self.x + other.x, self.y + other.y)
                    }
                }
                interface Shape { fn Area [self] -> int }
                impl Shape for Vector2 {
                    fn Area [self] -> int { return self.x * self.y }
                }
                let v = Vector2.New(1, 2).Add(Vector2.New(3, 4))
                Vector2.Count = v.x
            ";
            let tree_ok = "
                struct Vector2 {
                    [x int]
                    [y int]
                    static [Count int]
                }

                fn (Vector2/Add [self] [other Vector2]) -> Vector2 {
                    (return (Vector2.New (self.x + other.x) (self.y + other.y)))
                }

                interface Shape {
                    fn (Area [self]) -> int
                }

                impl Shape for Vector2

                fn (Vector2/Shape/Area [self]) -> int {
                    (return (self.x * self.y))
                }

                (let v ((Vector2.New 1 2).Add (Vector2.New 3 4)))
                (set Vector2.Count v.x)
            ";
        }

        fn test_blocks_scope_locals_but_not_declarations() {
            let program = "
                fn Main {
                    if true {
                        let x = 1
                        fn Nested { }
                    } else {
                        let x = 2
                    }
                    (Nested)
                }
            ";
            let tree_ok = "
                fn (Main) {
                    (if true {
                        (let x 1)
                    } else {
                        (let x 2)
                    })
                    (Main/Nested)
                }

                fn (Main/Nested) { }
            ";
        }

        fn test_enum_and_range() {
            let program = "
                enum Color { Red Green }
                let c = Color.Red
                for i in (Range 0 3) { (Print-Int i) }
                fn Print-Int [n int] { }
            ";
            let tree_ok = "
                enum Color { Red Green }

                fn (Print-Int [n int]) { }

                (let c Color.Red)
                (for i (Range 0 3) {
                    (Print-Int i)
                })
            ";
        }

        fn test_unresolved_reference() {
            let program = "fn Add [x int] -> int { return (Missing x) }";
            let expected_errors = &["32..39: unresolved reference Missing in Add"];
        }

        fn test_no_captured_variables() {
            let program = "fn Outer [x int] -> int { fn Inner -> int { return x } return (Inner) }";
            let expected_errors = &["51..52: unresolved reference x in Outer/Inner"];
        }

        fn test_duplicate_sibling_functions() {
            let program = "fn P { fn A { } fn A { } }";
            let expected_errors = &["19..20: duplicate declaration P/A"];
        }

        fn test_duplicate_constructor() {
            let program = "struct S { [x int] fn New [x int] -> S { return S.New(x) } }";
            let expected_errors = &["22..25: duplicate declaration S/New"];
        }

        fn test_shadowing_is_rejected() {
            let program = "fn F [x int] { let x = 1 }";
            let expected_errors = &["19..20: duplicate declaration F/x"];
        }

        fn test_unknown_type() {
            let program = "fn F [x Vector3] { }";
            let expected_errors = &["8..15: unresolved reference Vector3 in F"];
        }
    );
}
