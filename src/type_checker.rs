//! Type checking and member resolution.
//!
//! Consumes the flattened program and produces the typed [`ir::Program`].
//! Generic instances are recorded as they are encountered; the methods of a
//! user template are checked once per instance, from a worklist drained after
//! every declared function has been checked.

use std::collections::{HashMap, HashSet};

use crate::{
    ast::{
        self, BinaryOperator, ExprKind, FunctionKind, Ident, Item, Name, Param, QualifiedPath,
        Res, StmtKind, TypeExpr, UnaryOperator,
    },
    ir::{self, ArrayOp, FnRef},
    mono::{self, Monomorphizer},
    token::Span,
    types::{
        self, well_known, FnSig, InterfaceInfo, MethodInfo, MethodLookup, StructInfo,
        StructLayout, Type, TypeDecl, TypeRegistry,
    },
    util::intern::{Interner, Symbol},
};

type Result<T, E = crate::Error> = std::result::Result<T, E>;

/// Checks the flattened program.
pub fn check(program: ast::Program, idents: &Interner<str>) -> Result<ir::Program> {
    let _span = tracing::debug_span!("check").entered();
    let ast::Program { items, body } = program;

    let mut c = Checker::new(idents);
    c.declare_types(&items)?;
    c.define_types(&items)?;
    c.define_impls(&items)?;

    let functions: Vec<&ast::Function> = items
        .iter()
        .filter_map(|item| match item {
            Item::Function(function) => Some(function),
            _ => None,
        })
        .collect();
    for (idx, function) in functions.iter().enumerate() {
        c.declare_function(idx, function)?;
    }
    c.check_impls_complete(&items)?;

    c.declaring = false;
    for ty in std::mem::take(&mut c.deferred) {
        c.require(&ty)?;
    }
    c.emit_declarations(&items);

    for function in &functions {
        let checked = match function.kind {
            FunctionKind::Free => {
                let target = FnRef::Free(function.name.qualified());
                c.check_function(function, target, None, None)?
            }
            FunctionKind::Method { owner } if c.templates.contains_key(&owner.name) => continue,
            FunctionKind::Method { owner } => {
                let owner = Type::Struct(owner.name);
                let target = FnRef::Method {
                    owner: owner.clone(),
                    name: function.name.last().name,
                };
                c.check_function(function, target, Some(owner), None)?
            }
            FunctionKind::ImplMethod { owner, interface } => {
                let owner = Type::Struct(owner.name);
                let target = FnRef::Impl {
                    owner: owner.clone(),
                    interface: interface.name,
                    name: function.name.last().name,
                };
                c.check_function(function, target, Some(owner), None)?
            }
        };
        c.out.functions.push(checked);
    }

    let mut cx = FnCx::new(None, Type::Int);
    c.out.body = c.stmts(&mut cx, &body)?;

    while let Some(instance) = c.mono.next_pending() {
        let Type::Generic(template, arg) = &instance else {
            unreachable!("only generic instances are pending");
        };
        let template = &c.templates[template];
        let param = template.param;
        let bodies = template.bodies.clone();
        tracing::trace!(instance = %instance.show(idents), "checking instance methods");
        for idx in bodies {
            let function = functions[idx];
            let target = FnRef::Method {
                owner: instance.clone(),
                name: function.name.last().name,
            };
            let binding = Binding {
                param,
                arg: (**arg).clone(),
            };
            let checked = c.check_function(function, target, Some(instance.clone()), Some(binding))?;
            c.out.functions.push(checked);
        }
    }

    c.emit_instances();
    tracing::debug!(
        functions = c.out.functions.len(),
        instances = c.mono.len(),
        "checked program"
    );
    Ok(c.out)
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("expected {expected}, found {actual}")]
    TypeMismatch { expected: String, actual: String },
    #[error("member {member} of {ty} is ambiguous between {candidates}")]
    AmbiguousMember {
        member: String,
        ty: String,
        candidates: String,
    },
    #[error("{ty} has no member {member}")]
    UnknownMember { ty: String, member: String },
    #[error("{name} is not a generic template")]
    UnknownGeneric { name: String },
    #[error("generic {name} requires a type argument")]
    MissingTypeArgument { name: String },
    #[error("{ty} is not a valid type argument")]
    InvalidTypeArgument { ty: String },
    #[error("type {name} is not bound here")]
    UnboundTypeParameter { name: String },
    #[error("expected {expected} arguments, found {actual}")]
    ArityMismatch { expected: usize, actual: usize },
    #[error("{what} is not callable")]
    NotCallable { what: String },
    #[error("{what} is not a value")]
    NotAValue { what: String },
    #[error("{ty}.{member} is static and takes no receiver")]
    StaticThroughValue { ty: String, member: String },
    #[error("{ty}.{member} needs a receiver")]
    ReceiverRequired { ty: String, member: String },
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
    #[error("cannot bind {name} to a void value")]
    VoidBinding { name: String },
    #[error("cannot compare values of type {ty}")]
    NotComparable { ty: String },
    #[error("cannot iterate over {ty}")]
    NotIterable { ty: String },
    #[error("{ty} does not implement {interface}/{method}")]
    MissingImplementation {
        ty: String,
        interface: String,
        method: String,
    },
    #[error("{method} does not match its interface: expected{expected}, found{actual}")]
    ImplSignatureMismatch {
        method: String,
        expected: String,
        actual: String,
    },
    #[error("impl target {name} must be a non-generic struct")]
    InvalidImplTarget { name: String },
    #[error("{name} is not an interface")]
    NotAnInterface { name: String },
    #[error("{method} must take self as its first parameter")]
    MissingReceiver { method: String },
    #[error("self is only allowed as the first parameter of a method")]
    MisplacedSelf,
}

/// A template's type parameter bound to a type. Declarations bind it to
/// `Type::Param` itself; instances bind it to the concrete argument.
#[derive(Clone, Debug)]
struct Binding {
    param: Symbol,
    arg: Type,
}

/// A generic struct, with its layout and method signatures expressed over
/// `Type::Param`.
struct Template {
    param: Symbol,
    layout: StructLayout,
    statics: StructLayout,
    methods: HashMap<Symbol, MethodInfo>,
    /// Indices of the template's methods in the flattened function list.
    bodies: Vec<usize>,
}

struct Checker<'i> {
    idents: &'i Interner<str>,
    registry: TypeRegistry,
    templates: HashMap<Symbol, Template>,
    functions: HashMap<QualifiedPath, FnSig>,
    /// Declared `(owner, interface, method)` implementations.
    impl_methods: HashSet<(Symbol, Symbol, Symbol)>,
    mono: Monomorphizer,
    /// While declarations are being read, instances are only recorded here,
    /// since templates may be declared after their first use.
    declaring: bool,
    deferred: Vec<Type>,
    out: ir::Program,
}

impl<'i> Checker<'i> {
    fn new(idents: &'i Interner<str>) -> Checker<'i> {
        Checker {
            idents,
            registry: TypeRegistry::with_capacity(32),
            templates: HashMap::new(),
            functions: HashMap::new(),
            impl_methods: HashSet::new(),
            mono: Monomorphizer::new(),
            declaring: true,
            deferred: Vec::new(),
            out: ir::Program::default(),
        }
    }

    fn declare_types(&mut self, items: &[Item]) -> Result<()> {
        for item in items {
            let (name, decl) = match item {
                Item::Struct(s) => match s.type_param {
                    Some(param) => (s.name, TypeDecl::Template { param: param.name }),
                    None => (s.name, TypeDecl::Struct),
                },
                Item::Interface(interface) => (interface.name, TypeDecl::Interface),
                Item::Enum(e) => {
                    let variants = e.variants.iter().map(|v| v.name).collect();
                    (e.name, TypeDecl::Enum { variants })
                }
                Item::Function(_) | Item::Impl(_) => continue,
            };
            self.registry
                .declare(name.name, decl)
                .expect("type names are unique after flattening");
        }
        Ok(())
    }

    /// Resolves struct layouts and interface signatures.
    fn define_types(&mut self, items: &[Item]) -> Result<()> {
        for item in items {
            match item {
                Item::Struct(s) => {
                    let binding = s.type_param.map(|param| Binding {
                        param: param.name,
                        arg: Type::Param(param.name),
                    });
                    let layout = self.layout(&s.fields, binding.as_ref())?;
                    let statics = self.layout(&s.statics, binding.as_ref())?;
                    match binding {
                        Some(binding) => {
                            let template = Template {
                                param: binding.param,
                                layout,
                                statics,
                                methods: HashMap::new(),
                                bodies: Vec::new(),
                            };
                            self.templates.insert(s.name.name, template);
                        }
                        None => {
                            let info = StructInfo {
                                layout,
                                statics,
                                ..StructInfo::default()
                            };
                            self.registry.define_struct(Type::Struct(s.name.name), info);
                        }
                    }
                }
                Item::Interface(interface) => {
                    let mut methods = Vec::with_capacity(interface.methods.len());
                    for signature in &interface.methods {
                        let path = [interface.name.name, signature.name.name];
                        if !has_receiver(&signature.params) {
                            return Err(self.missing_receiver(&path, signature.span));
                        }
                        let sig = self.signature(
                            &signature.params[1..],
                            &signature.return_ty,
                            None,
                        )?;
                        methods.push((signature.name.name, sig));
                    }
                    let info = InterfaceInfo {
                        methods,
                        implementors: Vec::new(),
                    };
                    self.registry.define_interface(interface.name.name, info);
                }
                Item::Enum(_) | Item::Function(_) | Item::Impl(_) => {}
            }
        }
        Ok(())
    }

    fn layout(&mut self, fields: &[ast::Field], binding: Option<&Binding>) -> Result<StructLayout> {
        let mut layout = StructLayout::default();
        for field in fields {
            let ty = self.resolve_type(&field.ty, binding)?;
            layout.fields.push((field.name.name, ty));
        }
        Ok(layout)
    }

    fn define_impls(&mut self, items: &[Item]) -> Result<()> {
        for item in items {
            let Item::Impl(i) = item else {
                continue;
            };
            if self.registry.decl(i.target.name) != Some(&TypeDecl::Struct) {
                let name = self.idents.get(i.target).to_string();
                return Err(i.target.span.wrap(Error::InvalidImplTarget { name }).into());
            }
            if self.registry.decl(i.interface.name) != Some(&TypeDecl::Interface) {
                let name = self.idents.get(i.interface).to_string();
                return Err(i.interface.span.wrap(Error::NotAnInterface { name }).into());
            }
            let target = Type::Struct(i.target.name);
            if let Some(info) = self.registry.struct_info_mut(&target) {
                info.implements.push(i.interface.name);
            }
            if let Some(info) = self.registry.interface_mut(i.interface.name) {
                info.implementors.push(target);
            }
        }
        Ok(())
    }

    /// Records the signature of a flattened function.
    fn declare_function(&mut self, idx: usize, function: &ast::Function) -> Result<()> {
        let path = function.name.qualified();
        let name = function.name.last().name;
        match function.kind {
            FunctionKind::Free => {
                let sig = self.signature(&function.params, &function.return_ty, None)?;
                self.functions.insert(path, sig);
            }
            FunctionKind::Method { owner } => {
                let receiver = has_receiver(&function.params);
                let params = if receiver {
                    &function.params[1..]
                } else {
                    &function.params[..]
                };
                let binding = self.templates.get(&owner.name).map(|t| Binding {
                    param: t.param,
                    arg: Type::Param(t.param),
                });
                let sig = self.signature(params, &function.return_ty, binding.as_ref())?;
                let info = MethodInfo { sig, receiver };
                if let Some(template) = self.templates.get_mut(&owner.name) {
                    template.methods.insert(name, info);
                    template.bodies.push(idx);
                } else if let Some(s) = self.registry.struct_info_mut(&Type::Struct(owner.name)) {
                    s.methods.insert(name, info);
                }
            }
            FunctionKind::ImplMethod { owner, interface } => {
                if !has_receiver(&function.params) {
                    return Err(self.missing_receiver(path.segments(), function.span));
                }
                let sig = self.signature(&function.params[1..], &function.return_ty, None)?;
                let expected = self
                    .registry
                    .interface(interface.name)
                    .and_then(|info| info.method(name))
                    .cloned();
                let Some(expected) = expected else {
                    let error = Error::UnknownMember {
                        ty: self.idents.get(interface).to_string(),
                        member: self.idents.get(name).to_string(),
                    };
                    return Err(function.name.last().span.wrap(error).into());
                };
                if expected != sig {
                    let error = Error::ImplSignatureMismatch {
                        method: path.show(self.idents),
                        expected: self.show_sig(&expected),
                        actual: self.show_sig(&sig),
                    };
                    return Err(function.span.wrap(error).into());
                }
                self.impl_methods.insert((owner.name, interface.name, name));
            }
        }
        Ok(())
    }

    fn check_impls_complete(&self, items: &[Item]) -> Result<()> {
        for item in items {
            let Item::Impl(i) = item else {
                continue;
            };
            let Some(info) = self.registry.interface(i.interface.name) else {
                continue;
            };
            for (method, _) in &info.methods {
                let key = (i.target.name, i.interface.name, *method);
                if !self.impl_methods.contains(&key) {
                    let error = Error::MissingImplementation {
                        ty: self.idents.get(i.target).to_string(),
                        interface: self.idents.get(i.interface).to_string(),
                        method: self.idents.get(method).to_string(),
                    };
                    return Err(i.span.wrap(error).into());
                }
            }
        }
        Ok(())
    }

    /// Resolves a parameter list (receiver excluded) and a return type.
    fn signature(
        &mut self,
        params: &[Param],
        return_ty: &Option<TypeExpr>,
        binding: Option<&Binding>,
    ) -> Result<FnSig> {
        let mut types = Vec::with_capacity(params.len());
        for param in params {
            let Some(ty) = &param.ty else {
                return Err(param.name.span.wrap(Error::MisplacedSelf).into());
            };
            types.push(self.resolve_type(ty, binding)?);
        }
        let ret = match return_ty {
            Some(ty) => self.resolve_type(ty, binding)?,
            None => Type::Void,
        };
        Ok(FnSig { params: types, ret })
    }

    fn emit_declarations(&mut self, items: &[Item]) {
        for item in items {
            match item {
                Item::Enum(e) => self.out.enums.push(ir::EnumDef {
                    name: e.name.name,
                    variants: e.variants.iter().map(|v| v.name).collect(),
                }),
                Item::Interface(interface) => {
                    let Some(info) = self.registry.interface(interface.name.name) else {
                        continue;
                    };
                    self.out.interfaces.push(ir::InterfaceDef {
                        name: interface.name.name,
                        methods: info.methods.clone(),
                        implementors: info.implementors.clone(),
                    });
                }
                Item::Struct(s) if s.type_param.is_none() => {
                    let ty = Type::Struct(s.name.name);
                    if let Some(def) = self.struct_def(ty) {
                        self.out.structs.push(def);
                    }
                }
                _ => {}
            }
        }
    }

    fn emit_instances(&mut self) {
        let instances: Vec<Type> = self.mono.instances().cloned().collect();
        for ty in instances {
            if let Some(elem) = ty.array_element() {
                self.out.arrays.push(elem.clone());
            } else if ty.iterator_element().is_none() {
                if let Some(def) = self.struct_def(ty) {
                    self.out.structs.push(def);
                }
            }
        }
    }

    fn struct_def(&self, ty: Type) -> Option<ir::StructDef> {
        let info = self.registry.struct_info(&ty)?;
        Some(ir::StructDef {
            layout: info.layout.clone(),
            statics: info.statics.clone(),
            ty,
        })
    }

    fn resolve_type(&mut self, ty: &TypeExpr, binding: Option<&Binding>) -> Result<Type> {
        let resolved = self.lookup_type(ty, binding)?;
        if matches!(resolved, Type::Generic(..)) && !resolved.has_param() {
            if self.declaring {
                self.deferred.push(resolved.clone());
            } else {
                self.require(&resolved)?;
            }
        }
        Ok(resolved)
    }

    fn lookup_type(&self, ty: &TypeExpr, binding: Option<&Binding>) -> Result<Type> {
        let name = ty.name.name;
        let Some(arg) = &ty.arg else {
            if let Some(binding) = binding.filter(|b| b.param == name) {
                return Ok(binding.arg.clone());
            }
            let missing_arg = || {
                let name = self.idents.get(name).to_string();
                ty.span.wrap(Error::MissingTypeArgument { name })
            };
            return match self.registry.decl(name) {
                Some(TypeDecl::Struct) => Ok(Type::Struct(name)),
                Some(TypeDecl::Interface) => Ok(Type::Interface(name)),
                Some(TypeDecl::Enum { .. }) => Ok(Type::Enum(name)),
                Some(TypeDecl::Template { .. }) => Err(missing_arg().into()),
                None if well_known::is_builtin_template(name) => Err(missing_arg().into()),
                None => types::primitive(self.idents.get(name)).ok_or_else(|| {
                    let name = self.idents.get(name).to_string();
                    ty.span.wrap(Error::UnboundTypeParameter { name }).into()
                }),
            };
        };

        let is_template = well_known::is_builtin_template(name)
            || matches!(self.registry.decl(name), Some(TypeDecl::Template { .. }));
        if !is_template {
            let name = self.idents.get(name).to_string();
            return Err(ty.name.span.wrap(Error::UnknownGeneric { name }).into());
        }
        let arg_ty = self.lookup_type(arg, binding)?;
        if arg_ty == Type::Void {
            let error = Error::InvalidTypeArgument {
                ty: arg_ty.show(self.idents),
            };
            return Err(arg.span.wrap(error).into());
        }
        Ok(Type::Generic(name, Box::new(arg_ty)))
    }

    /// Makes sure the instance `ty` (and every instance it mentions) exists.
    fn require(&mut self, ty: &Type) -> Result<()> {
        let Type::Generic(template, arg) = ty else {
            return Ok(());
        };
        self.require(arg)?;
        if !self.mono.request(ty, self.idents)? {
            return Ok(());
        }
        if *template == well_known::ARRAY {
            return Ok(());
        }
        if *template == well_known::ARRAY_ITERATOR {
            return self.require(&Type::Generic(well_known::ARRAY, arg.clone()));
        }

        let t = self
            .templates
            .get(template)
            .expect("template names are validated on lookup");
        let methods = t
            .methods
            .iter()
            .map(|(name, method)| {
                let info = MethodInfo {
                    sig: mono::instantiate_sig(&method.sig, t.param, arg),
                    receiver: method.receiver,
                };
                (*name, info)
            })
            .collect::<HashMap<_, _>>();
        let info = StructInfo {
            layout: mono::instantiate_layout(&t.layout, t.param, arg),
            statics: mono::instantiate_layout(&t.statics, t.param, arg),
            methods,
            implements: Vec::new(),
        };

        let mut mentioned: Vec<Type> = info
            .layout
            .fields
            .iter()
            .chain(&info.statics.fields)
            .map(|(_, ty)| ty.clone())
            .collect();
        for method in info.methods.values() {
            mentioned.extend(method.sig.params.iter().cloned());
            mentioned.push(method.sig.ret.clone());
        }
        self.registry.define_struct(ty.clone(), info);
        for ty in &mentioned {
            self.require(ty)?;
        }
        Ok(())
    }

    fn check_function(
        &mut self,
        function: &ast::Function,
        target: FnRef,
        owner: Option<Type>,
        binding: Option<Binding>,
    ) -> Result<ir::Function> {
        tracing::trace!(function = %function.name.show(self.idents), "checking function");
        let mut cx = FnCx::new(binding, Type::Void);
        let mut params = Vec::with_capacity(function.params.len());
        for param in &function.params {
            let ty = match (&param.ty, &owner) {
                (Some(ty), _) => self.resolve_type(ty, cx.binding.as_ref())?,
                (None, Some(owner)) => owner.clone(),
                (None, None) => return Err(param.name.span.wrap(Error::MisplacedSelf).into()),
            };
            cx.declare(param.name.name, ty.clone());
            params.push(ir::Param {
                name: param.name.name,
                ty,
                receiver: param.ty.is_none(),
            });
        }
        cx.ret = match &function.return_ty {
            Some(ty) => self.resolve_type(ty, cx.binding.as_ref())?,
            None => Type::Void,
        };

        let body = self.stmts(&mut cx, &function.body)?;
        Ok(ir::Function {
            target,
            params,
            ret: cx.ret,
            body,
        })
    }

    fn stmts(&mut self, cx: &mut FnCx, body: &[ast::Stmt]) -> Result<Vec<ir::Stmt>> {
        let mut out = Vec::with_capacity(body.len());
        for stmt in body {
            out.push(self.stmt(cx, stmt)?);
        }
        Ok(out)
    }

    fn scoped(
        &mut self,
        cx: &mut FnCx,
        body: &[ast::Stmt],
        binding: Option<(Symbol, Type)>,
    ) -> Result<Vec<ir::Stmt>> {
        cx.locals.push(binding.into_iter().collect());
        let result = self.stmts(cx, body);
        cx.locals.pop();
        result
    }

    fn stmt(&mut self, cx: &mut FnCx, stmt: &ast::Stmt) -> Result<ir::Stmt> {
        let checked = match &stmt.kind {
            StmtKind::Function(_) => unreachable!("nested declarations are lifted before checking"),
            StmtKind::Return(value) => {
                let ret = cx.ret.clone();
                match value {
                    Some(value) => {
                        let span = value.span;
                        let value = self.expr(cx, value)?;
                        if ret == Type::Void {
                            return Err(self.mismatch(&ret, &value.ty, span));
                        }
                        ir::Stmt::Return(Some(self.coerce(value, &ret, span)?))
                    }
                    None if ret != Type::Void => {
                        return Err(self.mismatch(&ret, &Type::Void, stmt.span));
                    }
                    None => ir::Stmt::Return(None),
                }
            }
            StmtKind::Let { name, ty, value } => {
                let span = value.span;
                let value = self.expr(cx, value)?;
                let ty = match ty {
                    Some(ty) => self.resolve_type(ty, cx.binding.as_ref())?,
                    None => value.ty.clone(),
                };
                if ty == Type::Void || value.ty == Type::Void {
                    let name = self.idents.get(name).to_string();
                    return Err(span.wrap(Error::VoidBinding { name }).into());
                }
                let value = self.coerce(value, &ty, span)?;
                cx.declare(name.name, ty.clone());
                ir::Stmt::Let {
                    name: name.name,
                    ty,
                    value,
                }
            }
            StmtKind::Assign { target, value } => {
                let assignable = matches!(
                    target.kind,
                    ExprKind::Name(Name {
                        res: Some(Res::Local),
                        ..
                    }) | ExprKind::Member { .. }
                        | ExprKind::Static { .. }
                );
                let invalid = || target.span.wrap(Error::InvalidAssignmentTarget);
                if !assignable {
                    return Err(invalid().into());
                }
                let target_ir = self.expr(cx, target)?;
                if !matches!(
                    target_ir.kind,
                    ir::ExprKind::Local(_) | ir::ExprKind::Field { .. } | ir::ExprKind::StaticField { .. }
                ) {
                    return Err(invalid().into());
                }
                let span = value.span;
                let value = self.expr(cx, value)?;
                let value = self.coerce(value, &target_ir.ty, span)?;
                ir::Stmt::Assign {
                    target: target_ir,
                    value,
                }
            }
            StmtKind::If {
                predicate,
                then_body,
                else_body,
            } => {
                let predicate = self.condition(cx, predicate)?;
                let then_body = self.scoped(cx, then_body, None)?;
                let else_body = match else_body {
                    Some(body) => self.scoped(cx, body, None)?,
                    None => Vec::new(),
                };
                ir::Stmt::If {
                    predicate,
                    then_body,
                    else_body,
                }
            }
            StmtKind::While { predicate, body } => ir::Stmt::While {
                predicate: self.condition(cx, predicate)?,
                body: self.scoped(cx, body, None)?,
            },
            StmtKind::For {
                binding,
                iterable,
                body,
            } => {
                let span = iterable.span;
                let iterable = self.expr(cx, iterable)?;
                let binding_ty = match &iterable.ty {
                    Type::Range => Type::Int,
                    ty => match ty.array_element().or_else(|| ty.iterator_element()) {
                        Some(elem) => elem.clone(),
                        None => {
                            let ty = ty.show(self.idents);
                            return Err(span.wrap(Error::NotIterable { ty }).into());
                        }
                    },
                };
                let body = self.scoped(cx, body, Some((binding.name, binding_ty.clone())))?;
                ir::Stmt::For {
                    binding: binding.name,
                    binding_ty,
                    iterable,
                    body,
                }
            }
            StmtKind::Block(body) => ir::Stmt::Block(self.scoped(cx, body, None)?),
            StmtKind::Expr(expr) => ir::Stmt::Expr(self.expr(cx, expr)?),
        };
        Ok(checked)
    }

    fn condition(&mut self, cx: &FnCx, predicate: &ast::Expr) -> Result<ir::Expr> {
        let checked = self.expr(cx, predicate)?;
        self.expect(&checked, &Type::Bool, predicate.span)?;
        Ok(checked)
    }

    fn expr(&mut self, cx: &FnCx, expr: &ast::Expr) -> Result<ir::Expr> {
        let span = expr.span;
        let (kind, ty) = match &expr.kind {
            ExprKind::Int(val) => (ir::ExprKind::Int(*val), Type::Int),
            ExprKind::Bool(val) => (ir::ExprKind::Bool(*val), Type::Bool),
            ExprKind::String(val) => (ir::ExprKind::String(val.clone()), Type::String),
            ExprKind::Name(name) => return self.name(cx, name, span),
            ExprKind::Call { callee, args } => return self.call(cx, callee, args, span),
            ExprKind::Member { target, member } => {
                let target = self.expr(cx, target)?;
                return self.field(target, *member);
            }
            ExprKind::Static { ty, member } => {
                let owner = self.resolve_type(ty, cx.binding.as_ref())?;
                return self.static_value(owner, *member);
            }
            ExprKind::Unary { op, expr: operand } => {
                let checked = self.expr(cx, operand)?;
                let ty = match op {
                    UnaryOperator::Neg => Type::Int,
                    UnaryOperator::Not => Type::Bool,
                };
                self.expect(&checked, &ty, operand.span)?;
                let kind = ir::ExprKind::Unary {
                    op: *op,
                    expr: Box::new(checked),
                };
                (kind, ty)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let (lhs_span, rhs_span) = (lhs.span, rhs.span);
                let lhs = self.expr(cx, lhs)?;
                let rhs = self.expr(cx, rhs)?;
                let ty = match op {
                    BinaryOperator::Add
                    | BinaryOperator::Sub
                    | BinaryOperator::Mul
                    | BinaryOperator::Div
                    | BinaryOperator::Rem => {
                        self.expect(&lhs, &Type::Int, lhs_span)?;
                        self.expect(&rhs, &Type::Int, rhs_span)?;
                        Type::Int
                    }
                    BinaryOperator::Lt
                    | BinaryOperator::LtEq
                    | BinaryOperator::Gt
                    | BinaryOperator::GtEq => {
                        self.expect(&lhs, &Type::Int, lhs_span)?;
                        self.expect(&rhs, &Type::Int, rhs_span)?;
                        Type::Bool
                    }
                    BinaryOperator::And | BinaryOperator::Or => {
                        self.expect(&lhs, &Type::Bool, lhs_span)?;
                        self.expect(&rhs, &Type::Bool, rhs_span)?;
                        Type::Bool
                    }
                    BinaryOperator::Eq | BinaryOperator::NotEq => {
                        let comparable = matches!(
                            lhs.ty,
                            Type::Int | Type::Bool | Type::String | Type::Enum(_)
                        );
                        if !comparable {
                            let ty = lhs.ty.show(self.idents);
                            return Err(lhs_span.wrap(Error::NotComparable { ty }).into());
                        }
                        self.expect(&rhs, &lhs.ty, rhs_span)?;
                        Type::Bool
                    }
                };
                let kind = ir::ExprKind::Binary {
                    op: *op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                };
                (kind, ty)
            }
        };
        Ok(ir::Expr { kind, ty })
    }

    fn name(&mut self, cx: &FnCx, name: &Name, span: Span) -> Result<ir::Expr> {
        let what = match &name.res {
            Some(Res::Local) => {
                let local = name.path.last().name;
                let ty = cx
                    .lookup(local)
                    .cloned()
                    .expect("locals are resolved before checking");
                return Ok(ir::Expr {
                    kind: ir::ExprKind::Local(local),
                    ty,
                });
            }
            Some(Res::Function(path)) => format!("function {}", path.show(self.idents)),
            Some(Res::Type) => format!("type {}", name.path.show(self.idents)),
            Some(Res::Range) => "Range".to_string(),
            None => unreachable!("names are resolved before checking"),
        };
        Err(span.wrap(Error::NotAValue { what }).into())
    }

    fn call(
        &mut self,
        cx: &FnCx,
        callee: &ast::Expr,
        args: &[ast::Expr],
        span: Span,
    ) -> Result<ir::Expr> {
        match &callee.kind {
            ExprKind::Name(name) => match &name.res {
                Some(Res::Function(path)) => {
                    let sig = self
                        .functions
                        .get(path)
                        .cloned()
                        .expect("function paths are resolved before checking");
                    let args = self.args(cx, &sig.params, args, span)?;
                    Ok(call(FnRef::Free(path.clone()), None, args, sig.ret))
                }
                Some(Res::Range) => {
                    let args = self.args(cx, &[Type::Int, Type::Int], args, span)?;
                    Ok(call(FnRef::Range, None, args, Type::Range))
                }
                _ => {
                    let what = name.path.show(self.idents);
                    Err(callee.span.wrap(Error::NotCallable { what }).into())
                }
            },
            ExprKind::Member { target, member } => {
                let receiver = self.expr(cx, target)?;
                self.method_call(cx, receiver, *member, args, span)
            }
            ExprKind::Static { ty, member } => {
                let owner = self.resolve_type(ty, cx.binding.as_ref())?;
                self.static_call(cx, owner, *member, args, span)
            }
            _ => {
                let what = "expression".to_string();
                Err(callee.span.wrap(Error::NotCallable { what }).into())
            }
        }
    }

    fn method_call(
        &mut self,
        cx: &FnCx,
        receiver: ir::Expr,
        member: Ident,
        args: &[ast::Expr],
        span: Span,
    ) -> Result<ir::Expr> {
        let ty = receiver.ty.clone();
        if let Some(elem) = ty.array_element() {
            return self.array_call(cx, receiver, elem.clone(), member, args, span);
        }

        if let Type::Interface(interface) = ty {
            let sig = self
                .registry
                .interface(interface)
                .and_then(|info| info.method(member.name))
                .cloned();
            let Some(sig) = sig else {
                return Err(self.unknown_member(&ty, member));
            };
            let args = self.args(cx, &sig.params, args, span)?;
            let kind = ir::ExprKind::Dispatch {
                interface,
                method: member.name,
                receiver: Box::new(receiver),
                args,
            };
            return Ok(ir::Expr { kind, ty: sig.ret });
        }

        if !ty.is_record() {
            return Err(self.unknown_member(&ty, member));
        }
        let (target, sig) = match self.registry.lookup_method(&ty, member.name) {
            MethodLookup::Own(info) if info.receiver => {
                let target = FnRef::Method {
                    owner: ty.clone(),
                    name: member.name,
                };
                (target, info.sig)
            }
            MethodLookup::Own(_) => {
                let error = Error::StaticThroughValue {
                    ty: ty.show(self.idents),
                    member: self.idents.get(member).to_string(),
                };
                return Err(member.span.wrap(error).into());
            }
            MethodLookup::Interface { interface, sig } => {
                let target = FnRef::Impl {
                    owner: ty.clone(),
                    interface,
                    name: member.name,
                };
                (target, sig)
            }
            MethodLookup::Ambiguous(candidates) => {
                let candidates = candidates
                    .iter()
                    .map(|interface| self.idents.get(interface))
                    .collect::<Vec<_>>()
                    .join(", ");
                let error = Error::AmbiguousMember {
                    member: self.idents.get(member).to_string(),
                    ty: ty.show(self.idents),
                    candidates,
                };
                return Err(member.span.wrap(error).into());
            }
            MethodLookup::Missing => return Err(self.unknown_member(&ty, member)),
        };
        let args = self.args(cx, &sig.params, args, span)?;
        Ok(call(target, Some(receiver), args, sig.ret))
    }

    fn array_call(
        &mut self,
        cx: &FnCx,
        receiver: ir::Expr,
        elem: Type,
        member: Ident,
        args: &[ast::Expr],
        span: Span,
    ) -> Result<ir::Expr> {
        let Some(op) = array_op(member.name) else {
            return Err(self.unknown_member(&receiver.ty, member));
        };
        let iterator = Type::Generic(well_known::ARRAY_ITERATOR, Box::new(elem.clone()));
        let (params, ret) = match op {
            ArrayOp::Length => (vec![], Type::Int),
            ArrayOp::Get => (vec![Type::Int], elem.clone()),
            ArrayOp::Set => (vec![Type::Int, elem.clone()], Type::Void),
            ArrayOp::Iterate | ArrayOp::Reversed => (vec![], iterator),
            ArrayOp::New => return Err(self.unknown_member(&receiver.ty, member)),
        };
        self.require(&ret)?;
        let args = self.args(cx, &params, args, span)?;
        Ok(call(FnRef::Array { elem, op }, Some(receiver), args, ret))
    }

    fn static_call(
        &mut self,
        cx: &FnCx,
        owner: Type,
        member: Ident,
        args: &[ast::Expr],
        span: Span,
    ) -> Result<ir::Expr> {
        if let Some(elem) = owner.array_element() {
            if member.name != well_known::NEW {
                return Err(self.unknown_member(&owner, member));
            }
            let args = self.args(cx, &[Type::Int], args, span)?;
            let target = FnRef::Array {
                elem: elem.clone(),
                op: ArrayOp::New,
            };
            return Ok(call(target, None, args, owner));
        }

        let info = match self.registry.struct_info(&owner) {
            Some(info) if owner.is_record() => info,
            _ if matches!(owner, Type::Enum(_)) => {
                let what = format!("{}.{}", owner.show(self.idents), self.idents.get(member));
                return Err(span.wrap(Error::NotCallable { what }).into());
            }
            _ => return Err(self.unknown_member(&owner, member)),
        };

        if member.name == well_known::NEW {
            let fields: Vec<Type> = info.layout.fields.iter().map(|(_, ty)| ty.clone()).collect();
            let args = self.args(cx, &fields, args, span)?;
            return Ok(call(FnRef::Constructor(owner.clone()), None, args, owner));
        }
        match info.methods.get(&member.name).cloned() {
            Some(method) if !method.receiver => {
                let args = self.args(cx, &method.sig.params, args, span)?;
                let target = FnRef::Method {
                    owner,
                    name: member.name,
                };
                Ok(call(target, None, args, method.sig.ret))
            }
            Some(_) => {
                let error = Error::ReceiverRequired {
                    ty: owner.show(self.idents),
                    member: self.idents.get(member).to_string(),
                };
                Err(member.span.wrap(error).into())
            }
            None if info.statics.get(member.name).is_some() => {
                let what = format!("{}.{}", owner.show(self.idents), self.idents.get(member));
                Err(span.wrap(Error::NotCallable { what }).into())
            }
            None => Err(self.unknown_member(&owner, member)),
        }
    }

    /// Checks `target.member` outside of call position: a field read.
    fn field(&mut self, target: ir::Expr, member: Ident) -> Result<ir::Expr> {
        let info = match self.registry.struct_info(&target.ty) {
            Some(info) if target.ty.is_record() => info,
            _ => return Err(self.unknown_member(&target.ty, member)),
        };
        if let Some(ty) = info.layout.get(member.name).cloned() {
            let kind = ir::ExprKind::Field {
                target: Box::new(target),
                field: member.name,
            };
            return Ok(ir::Expr { kind, ty });
        }
        if let MethodLookup::Missing = self.registry.lookup_method(&target.ty, member.name) {
            return Err(self.unknown_member(&target.ty, member));
        }
        let what = format!("method {}", self.idents.get(member));
        Err(member.span.wrap(Error::NotAValue { what }).into())
    }

    /// Checks `Type.member` outside of call position: an enum variant or a
    /// static field.
    fn static_value(&mut self, owner: Type, member: Ident) -> Result<ir::Expr> {
        if let Type::Enum(name) = owner {
            let known = matches!(
                self.registry.decl(name),
                Some(TypeDecl::Enum { variants }) if variants.contains(&member.name)
            );
            if !known {
                return Err(self.unknown_member(&owner, member));
            }
            let kind = ir::ExprKind::Variant {
                owner: name,
                variant: member.name,
            };
            return Ok(ir::Expr { kind, ty: owner });
        }

        let info = match self.registry.struct_info(&owner) {
            Some(info) if owner.is_record() => info,
            _ => return Err(self.unknown_member(&owner, member)),
        };
        if let Some(ty) = info.statics.get(member.name).cloned() {
            let kind = ir::ExprKind::StaticField {
                owner,
                field: member.name,
            };
            return Ok(ir::Expr { kind, ty });
        }
        if member.name == well_known::NEW || info.methods.contains_key(&member.name) {
            let what = format!("{}.{}", owner.show(self.idents), self.idents.get(member));
            return Err(member.span.wrap(Error::NotAValue { what }).into());
        }
        Err(self.unknown_member(&owner, member))
    }

    fn args(
        &mut self,
        cx: &FnCx,
        params: &[Type],
        args: &[ast::Expr],
        span: Span,
    ) -> Result<Vec<ir::Expr>> {
        if params.len() != args.len() {
            let error = Error::ArityMismatch {
                expected: params.len(),
                actual: args.len(),
            };
            return Err(span.wrap(error).into());
        }
        let mut checked = Vec::with_capacity(args.len());
        for (param, arg) in params.iter().zip(args) {
            let value = self.expr(cx, arg)?;
            checked.push(self.coerce(value, param, arg.span)?);
        }
        Ok(checked)
    }

    /// Accepts `expr` where `expected` is required, wrapping concrete values
    /// passed as an interface they implement.
    fn coerce(&self, expr: ir::Expr, expected: &Type, span: Span) -> Result<ir::Expr> {
        if expr.ty == *expected {
            return Ok(expr);
        }
        if let Type::Interface(interface) = expected {
            if self.registry.implements(&expr.ty, *interface) {
                let kind = ir::ExprKind::Upcast {
                    interface: *interface,
                    expr: Box::new(expr),
                };
                return Ok(ir::Expr {
                    kind,
                    ty: expected.clone(),
                });
            }
        }
        Err(self.mismatch(expected, &expr.ty, span))
    }

    fn expect(&self, expr: &ir::Expr, expected: &Type, span: Span) -> Result<()> {
        if expr.ty == *expected {
            Ok(())
        } else {
            Err(self.mismatch(expected, &expr.ty, span))
        }
    }

    fn mismatch(&self, expected: &Type, actual: &Type, span: Span) -> crate::Error {
        let error = Error::TypeMismatch {
            expected: expected.show(self.idents),
            actual: actual.show(self.idents),
        };
        span.wrap(error).into()
    }

    fn unknown_member(&self, ty: &Type, member: Ident) -> crate::Error {
        let error = Error::UnknownMember {
            ty: ty.show(self.idents),
            member: self.idents.get(member).to_string(),
        };
        member.span.wrap(error).into()
    }

    fn missing_receiver(&self, path: &[Symbol], span: Span) -> crate::Error {
        let method = QualifiedPath(path.to_vec()).show(self.idents);
        span.wrap(Error::MissingReceiver { method }).into()
    }

    fn show_sig(&self, sig: &FnSig) -> String {
        let mut buf = String::new();
        for param in &sig.params {
            buf.push(' ');
            buf.push_str(&param.show(self.idents));
        }
        buf.push_str(" -> ");
        buf.push_str(&sig.ret.show(self.idents));
        buf
    }
}

/// Per-function checking state.
struct FnCx {
    binding: Option<Binding>,
    ret: Type,
    /// One frame per open block; the first holds the parameters.
    locals: Vec<Vec<(Symbol, Type)>>,
}

impl FnCx {
    fn new(binding: Option<Binding>, ret: Type) -> FnCx {
        FnCx {
            binding,
            ret,
            locals: vec![Vec::new()],
        }
    }

    fn declare(&mut self, name: Symbol, ty: Type) {
        if let Some(frame) = self.locals.last_mut() {
            frame.push((name, ty));
        }
    }

    fn lookup(&self, name: Symbol) -> Option<&Type> {
        self.locals
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find_map(|(local, ty)| (*local == name).then_some(ty))
    }
}

fn has_receiver(params: &[Param]) -> bool {
    params.first().is_some_and(|p| p.ty.is_none())
}

fn array_op(name: Symbol) -> Option<ArrayOp> {
    const OPS: [(Symbol, ArrayOp); 5] = [
        (well_known::LENGTH, ArrayOp::Length),
        (well_known::GET, ArrayOp::Get),
        (well_known::SET, ArrayOp::Set),
        (well_known::ITERATE, ArrayOp::Iterate),
        (well_known::REVERSED, ArrayOp::Reversed),
    ];
    OPS.iter().find_map(|&(op_name, op)| (op_name == name).then_some(op))
}

fn call(target: FnRef, receiver: Option<ir::Expr>, args: Vec<ir::Expr>, ty: Type) -> ir::Expr {
    let kind = ir::ExprKind::Call {
        target,
        receiver: receiver.map(Box::new),
        args,
    };
    ir::Expr { kind, ty }
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use checker;

        fn test_interface_dispatch_and_upcast() {
            let program = r#"
                interface Animal { fn GetSpecies [self] -> string }
                struct Dog { }
                impl Animal for Dog {
                    fn GetSpecies [self] -> string { return "canis familiaris" }
                }
                let a Animal = Dog.New()
                let s = a.GetSpecies()
            "#;
            let tree_ok = r#"
                interface Animal <- Dog
                  method GetSpecies -> string
                struct Dog
                fn Dog/Animal/GetSpecies [self Dog] -> string
                  return
                    string "canis familiaris" : string
                body
                  let a Animal
                    upcast Animal : Animal
                      call Dog/New : Dog
                  let s string
                    dispatch Animal.GetSpecies : string
                      local a : Animal
            "#;
        }

        fn test_non_implementor_is_rejected() {
            let program = "interface Animal { fn GetSpecies [self] -> string } struct Rock { [mass int] } let pet Animal = Rock.New(3)";
            let expected_errors = &["96..107: expected Animal, found Rock"];
        }

        fn test_array_operations() {
            let program = "
                let xs = Array<int>.New(2)
                xs.Set(0, 7)
                for x in xs.Reversed() { }
            ";
            let tree_ok = "
                array int
                body
                  let xs Array<int>
                    call Array<int>/New : Array<int>
                      int 2 : int
                  expr
                    call Array<int>/Set : void
                      local xs : Array<int>
                      int 0 : int
                      int 7 : int
                  for x int
                    call Array<int>/Reversed : ArrayIterator<int>
                      local xs : Array<int>
            ";
        }

        fn test_template_instance_methods() {
            let program = "
                struct Box<T> {
                    [value T]
                    fn Get [self] -> T { return self.value }
                }
                let b = Box<int>.New(4)
                let v = b.Get()
            ";
            let tree_ok = "
                struct Box<int>
                  field value int
                fn Box<int>/Get [self Box<int>] -> int
                  return
                    field value : int
                      local self : Box<int>
                body
                  let b Box<int>
                    call Box<int>/New : Box<int>
                      int 4 : int
                  let v int
                    call Box<int>/Get : int
                      local b : Box<int>
            ";
        }

        fn test_ambiguous_interface_member() {
            let program = r#"interface A { fn Name [self] -> string } interface B { fn Name [self] [n int] -> string } struct S { } impl A for S { fn Name [self] -> string { return "a" } } impl B for S { fn Name [self] [n int] -> string { return "b" } } let s = S.New() let n = s.Name()"#;
            let expected_errors = &["251..255: member Name of S is ambiguous between A, B"];
        }

        fn test_unknown_field() {
            let program = "struct P { [x int] } let p = P.New(1) let y = p.z";
            let expected_errors = &["48..49: P has no member z"];
        }

        fn test_type_arguments_need_a_template() {
            let program = "struct P { [x int] } let p = P<int>.New(1)";
            let expected_errors = &["29..30: P is not a generic template"];
        }

        fn test_arity_mismatch() {
            let program = "fn Add [x int] [y int] -> int { return x + y } let z = (Add 1)";
            let expected_errors = &["55..62: expected 2 arguments, found 1"];
        }

        fn test_static_method_through_value() {
            let program = "struct P { [x int] fn Zero -> P { return P.New(0) } } let p = P.New(1) let q = p.Zero()";
            let expected_errors = &["81..85: P.Zero is static and takes no receiver"];
        }

        fn test_structs_are_not_comparable() {
            let program = "struct P { [x int] } let p = P.New(1) let same = p == p";
            let expected_errors = &["49..50: cannot compare values of type P"];
        }

        fn test_integers_are_not_iterable() {
            let program = "for i in 3 { }";
            let expected_errors = &["9..10: cannot iterate over int"];
        }
    );
}
