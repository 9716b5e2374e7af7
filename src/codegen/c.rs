use std::{collections::HashMap, fmt::Write, format_args as f};

use crate::{
    ast::{BinaryOperator, UnaryOperator},
    codegen::{
        mangle::{self, Mangler, SymbolTable},
        Error,
    },
    config::Config,
    ir::{self, ArrayOp, Expr, ExprKind, FnRef, InterfaceDef, Stmt, StructDef},
    types::{well_known, FnSig, StructLayout, Type},
    util::{
        fmt::tree::show_fn_ref,
        intern::{Interner, Symbol},
    },
};

const DEFAULT_CODE_CAPACITY: usize = 16 * 1024;

/// Statements that must run before the expression they were hoisted out of.
type Pre = Vec<String>;

pub struct Generator<'a> {
    code: String,
    program: &'a ir::Program,
    idents: &'a Interner<str>,
    config: &'a Config,
    names: Mangler<'a>,
    indent: usize,
    temps: usize,
    /// Parameters of the current function that arrive as one scalar per
    /// field, keyed by name.
    decomposed: HashMap<Symbol, Type>,
}

impl<'a> Generator<'a> {
    pub fn new(
        program: &'a ir::Program,
        idents: &'a Interner<str>,
        config: &'a Config,
    ) -> Generator<'a> {
        Generator {
            code: String::with_capacity(DEFAULT_CODE_CAPACITY),
            program,
            idents,
            config,
            names: Mangler::new(idents, &config.nested_prefix),
            indent: 0,
            temps: 0,
            decomposed: HashMap::new(),
        }
    }

    pub fn generate(mut self) -> Result<String, Error> {
        self.claim_symbols()?;
        self.g_prologue();
        self.g_type_declarations();
        self.g_type_definitions();
        self.g_function_declarations();
        self.g_function_definitions();
        self.g_program_body();
        if self.config.entry_point {
            self.g_entry_point();
        }
        Ok(self.code)
    }

    /// Registers every global symbol once, so that two entities mangling to
    /// the same identifier are reported instead of emitted.
    fn claim_symbols(&self) -> Result<(), Error> {
        let program = self.program;
        let show = |target: &FnRef| show_fn_ref(self.idents, target);
        let table = &mut SymbolTable::default();

        for reserved in ["main", mangle::USER_MAIN, mangle::ALLOCATE, mangle::TYPE_ID] {
            table.claim(reserved.to_string(), "the runtime")?;
        }
        for def in &program.enums {
            let name = self.idents.get(def.name);
            table.claim(self.names.ident(def.name), format!("enum {name}"))?;
            for variant in &def.variants {
                let owner = format!("variant {name}.{}", self.idents.get(variant));
                table.claim(self.names.variant(def.name, *variant), owner)?;
            }
        }
        for interface in &program.interfaces {
            let name = self.idents.get(interface.name);
            table.claim(self.names.ident(interface.name), format!("interface {name}"))?;
            for (method, _) in &interface.methods {
                let owner = format!("dispatch {name}/{}", self.idents.get(method));
                table.claim(self.names.dispatch(interface.name, *method), owner)?;
            }
            for ty in &interface.implementors {
                let owner = format!("conversion from {} to {name}", ty.show(self.idents));
                table.claim(self.names.upcast(interface.name, ty), owner)?;
            }
        }
        for ty in self.tagged_types() {
            let owner = format!("type tag of {}", ty.show(self.idents));
            table.claim(self.names.type_id(ty), owner)?;
        }
        for elem in &program.arrays {
            let shown = elem.show(self.idents);
            table.claim(self.names.array(elem), format!("type Array<{shown}>"))?;
            let iterator = self.names.array_iterator(elem);
            table.claim(iterator.clone(), format!("type ArrayIterator<{shown}>"))?;
            for op in ArrayOp::ALL {
                let target = FnRef::Array {
                    elem: elem.clone(),
                    op,
                };
                table.claim(self.names.function(&target), show(&target))?;
            }
            for helper in ["HasNext", "Next"] {
                let owner = format!("ArrayIterator<{shown}>/{helper}");
                table.claim(format!("{iterator}__{helper}"), owner)?;
            }
        }
        for def in &program.structs {
            let shown = def.ty.show(self.idents);
            table.claim(self.names.type_name(&def.ty), format!("struct {shown}"))?;
            let constructor = FnRef::Constructor(def.ty.clone());
            table.claim(self.names.function(&constructor), show(&constructor))?;
            if !def.statics.is_empty() {
                table.claim(self.names.statics(&def.ty), format!("statics of {shown}"))?;
            }
        }
        for function in &program.functions {
            table.claim(self.names.function(&function.target), show(&function.target))?;
        }
        Ok(())
    }

    fn g_prologue(&mut self) {
        let header = &self.config.runtime_header;
        self.out(f!("#include \"{header}\""));
    }

    fn g_type_declarations(&mut self) {
        let program = self.program;
        self.g_section("Type Declarations");

        let tags = self.tagged_types();
        if !tags.is_empty() {
            let ids = tags
                .iter()
                .map(|ty| self.names.type_id(ty))
                .collect::<Vec<_>>()
                .join(", ");
            let id = mangle::TYPE_ID;
            self.out(f!("typedef enum {id} {{ {ids} }} {id};"));
        }
        for def in &program.enums {
            let name = self.names.ident(def.name);
            if def.variants.is_empty() {
                self.out(f!("typedef int {name};"));
                continue;
            }
            let variants = def
                .variants
                .iter()
                .map(|variant| self.names.variant(def.name, *variant))
                .collect::<Vec<_>>()
                .join(", ");
            self.out(f!("typedef enum {name} {{ {variants} }} {name};"));
        }
        for interface in &program.interfaces {
            let name = self.names.ident(interface.name);
            self.out(f!("typedef struct {name} {name};"));
        }
        for elem in &program.arrays {
            let array = self.names.array(elem);
            let iterator = self.names.array_iterator(elem);
            self.out(f!("typedef struct {array} {array};"));
            self.out(f!("typedef struct {iterator} {iterator};"));
        }
        for def in &program.structs {
            let name = self.names.type_name(&def.ty);
            self.out(f!("typedef struct {name} {name};"));
        }
    }

    /// Interfaces come first since they are embedded by value; array and
    /// struct definitions only hold other records behind pointers.
    fn g_type_definitions(&mut self) {
        let program = self.program;
        self.g_section("Type Definitions");

        for interface in &program.interfaces {
            self.g_interface_union(interface);
        }
        for elem in &program.arrays {
            self.g_array_structs(elem);
        }
        for def in &program.structs {
            let name = self.names.type_name(&def.ty);
            self.out(f!("struct {name}"));
            self.g_fields(&def.layout);
            self.out_line();
        }
        for def in program.structs.iter().filter(|def| !def.statics.is_empty()) {
            let name = self.names.statics(&def.ty);
            self.out("struct");
            self.braced(f!("}} {name};"), |this| {
                for (field, ty) in &def.statics.fields {
                    let (ty, field) = (this.names.c_type(ty), this.names.ident(*field));
                    this.out(f!("{ty} {field};"));
                }
            });
            self.out_line();
        }
    }

    fn g_interface_union(&mut self, interface: &InterfaceDef) {
        let name = self.names.ident(interface.name);
        self.out(f!("struct {name}"));
        self.braced("};", |this| {
            this.out(f!("{} type;", mangle::TYPE_ID));
            if interface.implementors.is_empty() {
                return;
            }
            this.out("union");
            this.braced("} value;", |this| {
                for ty in &interface.implementors {
                    let (c_type, member) = (this.names.c_type(ty), this.names.type_name(ty));
                    this.out(f!("{c_type} {member};"));
                }
            });
        });
        self.out_line();
    }

    fn g_array_structs(&mut self, elem: &Type) {
        let array = self.names.array(elem);
        let iterator = self.names.array_iterator(elem);
        let item = self.names.c_type(elem);

        self.out(f!("struct {array}"));
        self.braced("};", |this| {
            this.out("int length;");
            this.out(f!("{item} items[];"));
        });
        self.out_line();
        self.out(f!("struct {iterator}"));
        self.braced("};", |this| {
            this.out(f!("{array}* array;"));
            this.out("int index;");
            this.out("int step;");
        });
        self.out_line();
    }

    fn g_fields(&mut self, layout: &StructLayout) {
        self.braced("};", |this| {
            if layout.is_empty() {
                this.out("char _specs__empty;");
            }
            for (field, ty) in &layout.fields {
                let (ty, field) = (this.names.c_type(ty), this.names.ident(*field));
                this.out(f!("{ty} {field};"));
            }
        });
    }

    fn g_function_declarations(&mut self) {
        let program = self.program;
        self.g_section("Function Declarations");

        for def in &program.structs {
            let signature = self.constructor_signature(def);
            self.out(f!("{signature};"));
        }
        for interface in &program.interfaces {
            for ty in &interface.implementors {
                let signature = self.upcast_signature(interface.name, ty);
                self.out(f!("{signature};"));
            }
        }
        for elem in &program.arrays {
            for op in ArrayOp::ALL {
                let signature = self.array_signature(elem, op);
                self.out(f!("{signature};"));
            }
            for signature in self.iterator_signatures(elem) {
                self.out(f!("{signature};"));
            }
        }
        for interface in &program.interfaces {
            for (method, sig) in &interface.methods {
                let signature = self.dispatch_signature(interface.name, *method, sig);
                self.out(f!("{signature};"));
            }
        }
        for function in &program.functions {
            let signature = self.function_signature(function);
            self.out(f!("{signature};"));
        }
        self.out(f!("int {}(void);", mangle::USER_MAIN));
    }

    fn g_function_definitions(&mut self) {
        let program = self.program;
        self.g_section("Function Definitions");

        for def in &program.structs {
            self.g_constructor(def);
        }
        for interface in &program.interfaces {
            for ty in &interface.implementors {
                self.g_upcast(interface.name, ty);
            }
        }
        for elem in &program.arrays {
            self.g_array_ops(elem);
        }
        for interface in &program.interfaces {
            for (method, sig) in &interface.methods {
                self.g_dispatch(interface, *method, sig);
            }
        }
        for function in &program.functions {
            self.g_function(function);
        }
    }

    fn g_constructor(&mut self, def: &StructDef) {
        let name = self.names.type_name(&def.ty);
        let signature = self.constructor_signature(def);
        self.out(signature);
        self.braced("}", |this| {
            this.out(f!("{name}* _self = {}(sizeof({name}));", mangle::ALLOCATE));
            for (field, _) in &def.layout.fields {
                let field = this.names.ident(*field);
                this.out(f!("_self->{field} = {field};"));
            }
            this.out("return _self;");
        });
        self.out_line();
    }

    fn g_upcast(&mut self, interface: Symbol, ty: &Type) {
        let signature = self.upcast_signature(interface, ty);
        let (name, member) = (self.names.ident(interface), self.names.type_name(ty));
        let tag = self.names.type_id(ty);
        self.out(signature);
        self.braced("}", |this| {
            this.out(f!("{name} result;"));
            this.out(f!("result.type = {tag};"));
            this.out(f!("result.value.{member} = value;"));
            this.out("return result;");
        });
        self.out_line();
    }

    fn g_array_ops(&mut self, elem: &Type) {
        let array = self.names.array(elem);
        let iterator = self.names.array_iterator(elem);
        let item = self.names.c_type(elem);

        for op in ArrayOp::ALL {
            let signature = self.array_signature(elem, op);
            self.out(signature);
            self.braced("}", |this| match op {
                ArrayOp::New => {
                    this.g_guard("length < 0");
                    let size = format!("sizeof({array}) + sizeof({item}) * length");
                    this.out(f!("{array}* self = {}({size});", mangle::ALLOCATE));
                    this.out("self->length = length;");
                    this.out("return self;");
                }
                ArrayOp::Length => this.out("return self->length;"),
                ArrayOp::Get => {
                    this.g_guard("index < 0 || index >= self->length");
                    this.out("return self->items[index];");
                }
                ArrayOp::Set => {
                    this.g_guard("index < 0 || index >= self->length");
                    this.out("self->items[index] = value;");
                }
                ArrayOp::Iterate => {
                    this.out(f!("{iterator} iterator = {{ self, 0, 1 }};"));
                    this.out("return iterator;");
                }
                ArrayOp::Reversed => {
                    this.out(f!("{iterator} iterator = {{ self, self->length - 1, -1 }};"));
                    this.out("return iterator;");
                }
            });
            self.out_line();
        }

        let [has_next, next] = self.iterator_signatures(elem);
        self.out(has_next);
        self.braced("}", |this| {
            this.out("return self->index >= 0 && self->index < self->array->length;");
        });
        self.out_line();
        self.out(next);
        self.braced("}", |this| {
            this.out(f!("{item} item = self->array->items[self->index];"));
            this.out("self->index += self->step;");
            this.out("return item;");
        });
        self.out_line();
    }

    /// Terminates the process when `condition` holds.
    fn g_guard(&mut self, condition: &str) {
        self.out(f!("if ({condition})"));
        self.braced("}", |this| this.out("exit(1);"));
    }

    fn g_dispatch(&mut self, interface: &InterfaceDef, method: Symbol, sig: &FnSig) {
        let signature = self.dispatch_signature(interface.name, method, sig);
        let forwarded = self
            .dispatch_params(sig)
            .into_iter()
            .map(|(_, name)| format!(", {name}"))
            .collect::<String>();
        self.out(signature);
        self.braced("}", |this| {
            this.out("switch (self.type)");
            this.braced("}", |this| {
                for ty in &interface.implementors {
                    let target = FnRef::Impl {
                        owner: ty.clone(),
                        interface: interface.name,
                        name: method,
                    };
                    let callee = this.names.function(&target);
                    let member = this.names.type_name(ty);
                    let call = format!("{callee}(self.value.{member}{forwarded})");
                    this.out(f!("case {}:", this.names.type_id(ty)));
                    this.nested(|this| {
                        if sig.ret == Type::Void {
                            this.out(f!("{call};"));
                            this.out("return;");
                        } else {
                            this.out(f!("return {call};"));
                        }
                    });
                }
                this.out("default:");
                this.nested(|this| this.out("exit(1);"));
            });
        });
        self.out_line();
    }

    fn g_function(&mut self, function: &ir::Function) {
        self.temps = 0;
        self.decomposed = function
            .params
            .iter()
            .filter(|param| decomposes(param))
            .map(|param| (param.name, param.ty.clone()))
            .collect();

        let signature = self.function_signature(function);
        self.out(signature);
        self.braced("}", |this| this.g_stmts(&function.body));
        self.out_line();
        self.decomposed.clear();
    }

    fn g_program_body(&mut self) {
        let program = self.program;
        self.g_section("Program Body");
        self.temps = 0;

        self.out(f!("int {}(void)", mangle::USER_MAIN));
        self.braced("}", |this| {
            this.g_stmts(&program.body);
            if !matches!(program.body.last(), Some(Stmt::Return(_))) {
                this.out("return 0;");
            }
        });
    }

    fn g_entry_point(&mut self) {
        self.out_line();
        self.out("int main(void)");
        self.braced("}", |this| {
            this.out(f!("return {}();", mangle::USER_MAIN));
        });
    }
}

/// Statements.
impl Generator<'_> {
    fn g_stmts(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.g_stmt(stmt);
        }
    }

    fn g_stmt(&mut self, stmt: &Stmt) {
        let mut pre = Pre::new();
        match stmt {
            Stmt::Let { name, ty, value } => {
                let value = self.g_expr(value, &mut pre);
                let (ty, name) = (self.names.c_type(ty), self.names.ident(*name));
                self.flush(pre);
                self.out(f!("{ty} {name} = {};", unwrap_parens(&value)));
            }
            Stmt::Assign { target, value } => self.g_assign(target, value),
            Stmt::Return(None) => self.out("return;"),
            Stmt::Return(Some(value)) => {
                let value = self.g_expr(value, &mut pre);
                self.flush(pre);
                self.out(f!("return {};", unwrap_parens(&value)));
            }
            Stmt::If {
                predicate,
                then_body,
                else_body,
            } => {
                let predicate = self.g_expr(predicate, &mut pre);
                self.flush(pre);
                self.out(f!("if ({})", unwrap_parens(&predicate)));
                self.braced("}", |this| this.g_stmts(then_body));
                if !else_body.is_empty() {
                    self.out("else");
                    self.braced("}", |this| this.g_stmts(else_body));
                }
            }
            Stmt::While { predicate, body } => {
                let predicate = self.g_expr(predicate, &mut pre);
                if pre.is_empty() {
                    self.out(f!("while ({})", unwrap_parens(&predicate)));
                    self.braced("}", |this| this.g_stmts(body));
                } else {
                    self.out("while (true)");
                    self.braced("}", |this| {
                        this.flush(pre);
                        this.g_guard_break(&predicate);
                        this.g_stmts(body);
                    });
                }
            }
            Stmt::For {
                binding,
                binding_ty,
                iterable,
                body,
            } => self.g_for(*binding, binding_ty, iterable, body),
            Stmt::Block(body) => self.braced("}", |this| this.g_stmts(body)),
            Stmt::Expr(expr) => {
                let expr = self.g_expr(expr, &mut pre);
                self.flush(pre);
                self.out(f!("{};", unwrap_parens(&expr)));
            }
        }
    }

    fn g_guard_break(&mut self, predicate: &str) {
        self.out(f!("if (!{predicate})"));
        self.braced("}", |this| this.out("break;"));
    }

    fn g_assign(&mut self, target: &Expr, value: &Expr) {
        let mut pre = Pre::new();
        if let ExprKind::Local(name) = target.kind {
            if let Some(ty) = self.decomposed.get(&name).cloned() {
                let parts = self.g_spread(value, &mut pre);
                self.flush(pre);
                for ((field, _), part) in self.layout(&ty).fields.iter().zip(parts) {
                    let scalar = self.names.decomposed(name, *field);
                    self.out(f!("{scalar} = {part};"));
                }
                return;
            }
        }
        let target = self.g_expr(target, &mut pre);
        let value = self.g_expr(value, &mut pre);
        self.flush(pre);
        self.out(f!("{target} = {};", unwrap_parens(&value)));
    }

    fn g_for(&mut self, binding: Symbol, binding_ty: &Type, iterable: &Expr, body: &[Stmt]) {
        let mut pre = Pre::new();
        let mut value = self.g_expr(iterable, &mut pre);
        let iterator_ty = match iterable.ty.array_element() {
            Some(elem) => {
                let iterate = FnRef::Array {
                    elem: elem.clone(),
                    op: ArrayOp::Iterate,
                };
                value = format!("{}({value})", self.names.function(&iterate));
                Type::Generic(well_known::ARRAY_ITERATOR, Box::new(elem.clone()))
            }
            None => iterable.ty.clone(),
        };
        self.flush(pre);

        let iterator = self.names.c_type(&iterator_ty);
        let temp = self.temp();
        let (ty, binding) = (self.names.c_type(binding_ty), self.names.ident(binding));
        self.out(f!("{iterator} {temp} = {value};"));
        self.out(f!("while ({iterator}__HasNext(&{temp}))"));
        self.braced("}", |this| {
            this.out(f!("{ty} {binding} = {iterator}__Next(&{temp});"));
            this.g_stmts(body);
        });
    }
}

/// Expressions.
impl Generator<'_> {
    fn g_expr(&mut self, e: &Expr, pre: &mut Pre) -> String {
        match &e.kind {
            ExprKind::Int(int) if *int < 0 => format!("({int})"),
            ExprKind::Int(int) => int.to_string(),
            ExprKind::Bool(value) => value.to_string(),
            ExprKind::String(string) => string_literal(string),
            ExprKind::Local(name) => match self.decomposed.get(name) {
                // The whole value of a decomposed parameter is rebuilt.
                Some(ty) => {
                    let constructor = self.names.function(&FnRef::Constructor(ty.clone()));
                    let fields = self
                        .layout(ty)
                        .fields
                        .iter()
                        .map(|(field, _)| self.names.decomposed(*name, *field))
                        .collect::<Vec<_>>();
                    format!("{constructor}({})", fields.join(", "))
                }
                None => self.names.ident(*name),
            },
            ExprKind::Call {
                target,
                receiver,
                args,
            } => {
                let mut list = Vec::with_capacity(args.len() + 1);
                if let Some(receiver) = receiver {
                    list.push(self.g_expr(receiver, pre));
                }
                let spread = matches!(
                    target,
                    FnRef::Free(_) | FnRef::Method { .. } | FnRef::Impl { .. }
                );
                self.g_args(args, spread, &mut list, pre);
                if *target == FnRef::Range {
                    list.push("1".to_string());
                }
                format!("{}({})", self.names.function(target), list.join(", "))
            }
            ExprKind::Dispatch {
                interface,
                method,
                receiver,
                args,
            } => {
                let mut list = vec![self.g_expr(receiver, pre)];
                self.g_args(args, true, &mut list, pre);
                let callee = self.names.dispatch(*interface, *method);
                format!("{callee}({})", list.join(", "))
            }
            ExprKind::Field { target, field } => {
                if let ExprKind::Local(name) = target.kind {
                    if self.decomposed.contains_key(&name) {
                        return self.names.decomposed(name, *field);
                    }
                }
                let target = self.g_expr(target, pre);
                format!("{target}->{}", self.names.ident(*field))
            }
            ExprKind::StaticField { owner, field } => {
                format!("{}.{}", self.names.statics(owner), self.names.ident(*field))
            }
            ExprKind::Variant { owner, variant } => self.names.variant(*owner, *variant),
            ExprKind::Upcast { interface, expr } => {
                let upcast = self.names.upcast(*interface, &expr.ty);
                let value = self.g_expr(expr, pre);
                format!("{upcast}({})", unwrap_parens(&value))
            }
            ExprKind::Unary { op, expr } => {
                let value = self.g_expr(expr, pre);
                match op {
                    UnaryOperator::Neg => format!("(-{value})"),
                    UnaryOperator::Not => format!("(!{value})"),
                }
            }
            ExprKind::Binary { op, lhs, rhs } => self.g_binary(*op, lhs, rhs, pre),
        }
    }

    fn g_binary(&mut self, op: BinaryOperator, lhs: &Expr, rhs: &Expr, pre: &mut Pre) -> String {
        if matches!(op, BinaryOperator::And | BinaryOperator::Or) {
            return self.g_logical(op, lhs, rhs, pre);
        }
        let l = self.g_expr(lhs, pre);
        let r = self.g_expr(rhs, pre);
        let symbol = op.symbol();
        if lhs.ty == Type::String {
            format!("(strcmp({l}, {r}) {symbol} 0)")
        } else {
            format!("({l} {symbol} {r})")
        }
    }

    /// `and` and `or` keep short-circuiting even when the right operand needs
    /// hoisted statements: those only run under the guarding branch.
    fn g_logical(&mut self, op: BinaryOperator, lhs: &Expr, rhs: &Expr, pre: &mut Pre) -> String {
        let l = self.g_expr(lhs, pre);
        let mut rhs_pre = Pre::new();
        let r = self.g_expr(rhs, &mut rhs_pre);
        let and = op == BinaryOperator::And;
        if rhs_pre.is_empty() {
            let symbol = if and { "&&" } else { "||" };
            return format!("({l} {symbol} {r})");
        }

        let temp = self.temp();
        pre.push(format!("bool {temp} = {};", unwrap_parens(&l)));
        pre.push(if and {
            format!("if ({temp})")
        } else {
            format!("if (!{temp})")
        });
        pre.push("{".to_string());
        pre.extend(rhs_pre.into_iter().map(|line| format!("\t{line}")));
        pre.push(format!("\t{temp} = {};", unwrap_parens(&r)));
        pre.push("}".to_string());
        temp
    }

    /// Appends call arguments to `list`. With `spread`, record arguments are
    /// passed one field at a time.
    fn g_args(&mut self, args: &[Expr], spread: bool, list: &mut Vec<String>, pre: &mut Pre) {
        for arg in args {
            if spread && arg.ty.is_record() {
                let parts = self.g_spread(arg, pre);
                list.extend(parts);
            } else {
                let value = self.g_expr(arg, pre);
                list.push(unwrap_parens(&value).to_string());
            }
        }
    }

    /// The field values of a record expression, in layout order. Anything but
    /// a local is evaluated once into a temporary first.
    fn g_spread(&mut self, arg: &Expr, pre: &mut Pre) -> Vec<String> {
        let fields = &self.layout(&arg.ty).fields;
        let base = match arg.kind {
            ExprKind::Local(name) if self.decomposed.contains_key(&name) => {
                return fields
                    .iter()
                    .map(|(field, _)| self.names.decomposed(name, *field))
                    .collect();
            }
            ExprKind::Local(name) => self.names.ident(name),
            _ => {
                let value = self.g_expr(arg, pre);
                let temp = self.temp();
                pre.push(format!("{} {temp} = {value};", self.names.c_type(&arg.ty)));
                temp
            }
        };
        fields
            .iter()
            .map(|(field, _)| format!("{base}->{}", self.names.ident(*field)))
            .collect()
    }
}

/// Signatures.
impl Generator<'_> {
    fn constructor_signature(&self, def: &StructDef) -> String {
        let name = self.names.type_name(&def.ty);
        let constructor = self.names.function(&FnRef::Constructor(def.ty.clone()));
        let params = def
            .layout
            .fields
            .iter()
            .map(|(field, ty)| format!("{} {}", self.names.c_type(ty), self.names.ident(*field)))
            .collect::<Vec<_>>();
        format!("{name}* {constructor}({})", param_list(params))
    }

    fn upcast_signature(&self, interface: Symbol, ty: &Type) -> String {
        let name = self.names.ident(interface);
        let upcast = self.names.upcast(interface, ty);
        format!("{name} {upcast}({} value)", self.names.c_type(ty))
    }

    fn array_signature(&self, elem: &Type, op: ArrayOp) -> String {
        let array = self.names.array(elem);
        let iterator = self.names.array_iterator(elem);
        let item = self.names.c_type(elem);
        let name = self.names.function(&FnRef::Array {
            elem: elem.clone(),
            op,
        });
        match op {
            ArrayOp::New => format!("{array}* {name}(int length)"),
            ArrayOp::Length => format!("int {name}({array}* self)"),
            ArrayOp::Get => format!("{item} {name}({array}* self, int index)"),
            ArrayOp::Set => format!("void {name}({array}* self, int index, {item} value)"),
            ArrayOp::Iterate | ArrayOp::Reversed => format!("{iterator} {name}({array}* self)"),
        }
    }

    fn iterator_signatures(&self, elem: &Type) -> [String; 2] {
        let iterator = self.names.array_iterator(elem);
        let item = self.names.c_type(elem);
        [
            format!("bool {iterator}__HasNext({iterator}* self)"),
            format!("{item} {iterator}__Next({iterator}* self)"),
        ]
    }

    /// Interface signatures carry no parameter names, so positional ones are
    /// made up. Returns `(type, name)` pairs after decomposition.
    fn dispatch_params(&self, sig: &FnSig) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(sig.params.len());
        for (i, ty) in sig.params.iter().enumerate() {
            if ty.is_record() {
                for (field, field_ty) in &self.layout(ty).fields {
                    let name = format!("_a{i}__{}", self.names.ident(*field));
                    params.push((self.names.c_type(field_ty), name));
                }
            } else {
                params.push((self.names.c_type(ty), format!("_a{i}")));
            }
        }
        params
    }

    fn dispatch_signature(&self, interface: Symbol, method: Symbol, sig: &FnSig) -> String {
        let mut params = vec![format!("{} self", self.names.ident(interface))];
        params.extend(
            self.dispatch_params(sig)
                .into_iter()
                .map(|(ty, name)| format!("{ty} {name}")),
        );
        let ret = self.names.c_type(&sig.ret);
        let name = self.names.dispatch(interface, method);
        format!("{ret} {name}({})", params.join(", "))
    }

    fn function_signature(&self, function: &ir::Function) -> String {
        let mut params = Vec::with_capacity(function.params.len());
        for param in &function.params {
            if decomposes(param) {
                for (field, ty) in &self.layout(&param.ty).fields {
                    let name = self.names.decomposed(param.name, *field);
                    params.push(format!("{} {name}", self.names.c_type(ty)));
                }
            } else {
                let (ty, name) = (self.names.c_type(&param.ty), self.names.ident(param.name));
                params.push(format!("{ty} {name}"));
            }
        }
        let ret = self.names.c_type(&function.ret);
        let name = self.names.function(&function.target);
        format!("{ret} {name}({})", param_list(params))
    }
}

/// Utility functions.
impl<'a> Generator<'a> {
    /// Prints a line at the current indentation.
    fn out(&mut self, f: impl std::fmt::Display) {
        for _ in 0..self.indent {
            self.code.push('\t');
        }
        writeln!(self.code, "{f}").expect("code emit should be infallible");
    }

    /// Prints an empty line.
    fn out_line(&mut self) {
        self.code.push('\n');
    }

    fn g_section(&mut self, title: &str) {
        self.out_line();
        self.out_line();
        self.out(f!("/* {title} */"));
        self.out_line();
    }

    /// Prints hoisted statements at the current indentation.
    fn flush(&mut self, pre: Pre) {
        for line in pre {
            self.out(line);
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.indent += 1;
        let res = f(self);
        self.indent -= 1;
        res
    }

    /// Writes a `{` block, closed by `close`.
    fn braced<T>(&mut self, close: impl std::fmt::Display, f: impl FnOnce(&mut Self) -> T) -> T {
        self.out("{");
        let res = self.nested(f);
        self.out(close);
        res
    }

    fn temp(&mut self) -> String {
        self.temps += 1;
        format!("_t{}", self.temps)
    }

    fn layout(&self, ty: &Type) -> &'a StructLayout {
        &self
            .program
            .struct_def(ty)
            .expect("record types have a definition")
            .layout
    }

    /// Every type that some interface can hold, in first-appearance order.
    fn tagged_types(&self) -> Vec<&'a Type> {
        let mut tagged: Vec<&'a Type> = Vec::new();
        let program = self.program;
        for ty in program.interfaces.iter().flat_map(|i| &i.implementors) {
            if !tagged.contains(&ty) {
                tagged.push(ty);
            }
        }
        tagged
    }
}

fn decomposes(param: &ir::Param) -> bool {
    !param.receiver && param.ty.is_record()
}

fn param_list(params: Vec<String>) -> String {
    if params.is_empty() {
        "void".to_string()
    } else {
        params.join(", ")
    }
}

/// Strips one pair of parentheses wrapping the whole expression.
fn unwrap_parens(expr: &str) -> &str {
    let Some(inner) = expr.strip_prefix('(').and_then(|e| e.strip_suffix(')')) else {
        return expr;
    };
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for c in inner.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' => depth += 1,
            ')' if depth == 0 => return expr,
            ')' => depth -= 1,
            _ => {}
        }
    }
    inner
}

fn string_literal(value: &str) -> String {
    let mut buf = String::with_capacity(value.len() + 2);
    buf.push('"');
    for c in value.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\t' => buf.push_str("\\t"),
            '\r' => buf.push_str("\\r"),
            c if c.is_ascii_control() => {
                write!(buf, "\\{:03o}", c as u32).expect("code emit should be infallible");
            }
            c => buf.push(c),
        }
    }
    buf.push('"');
    buf
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ErrorKind;

    fn compile(src: &str) -> String {
        crate::compile(src, &Config::default()).expect("program should compile")
    }

    #[test]
    fn test_nested_function_program() {
        let config = Config {
            nested_prefix: String::new(),
            ..Config::default()
        };
        let src = indoc! {"
            fn Add [x int] [y int] -> int {
                fn Add2 [a int] [b int] -> int {
                    return a + b
                }
                return (Add2 x y)
            }
            let three = (Add 1 2)
        "};
        let code = crate::compile(src, &config).expect("program should compile");
        let expected = indoc! {r#"
            #include "specs_runtime.h"


            /* Type Declarations */



            /* Type Definitions */



            /* Function Declarations */

            int Add(int x, int y);
            int Add__Add2(int a, int b);
            int _specs__UserMain(void);


            /* Function Definitions */

            int Add(int x, int y)
            {
                return Add__Add2(x, y);
            }

            int Add__Add2(int a, int b)
            {
                return a + b;
            }



            /* Program Body */

            int _specs__UserMain(void)
            {
                int three = Add(1, 2);
                return 0;
            }

            int main(void)
            {
                return _specs__UserMain();
            }
        "#};
        assert_eq!(code.replace('\t', "    "), expected);
    }

    #[test]
    fn test_nested_functions_are_prefixed() {
        let code = compile(include_str!("../../demos/functions.sp"));
        assert!(code.contains("int _Factorial__Accumulator(int n, int acc);\n"));
        assert!(code.contains("\treturn _Factorial__Accumulator(n, 1);\n"));
        assert!(code.contains("\treturn _Factorial__Accumulator(n - 1, acc * n);\n"));
        assert_eq!(code.matches("_Factorial__Accumulator(").count(), 4);
        assert!(code.contains("bool Is__Even(int n);\n"));
    }

    #[test]
    fn test_range_loops() {
        let code = compile(include_str!("../../demos/functions.sp"));
        assert!(code.contains(indoc! {"
            \t_Specs_NumericIterator _t1 = _Specs_NumericIterator__New(0, n, 1);
            \twhile (_Specs_NumericIterator__HasNext(&_t1))
            \t{
            \t\tint i = _Specs_NumericIterator__Next(&_t1);
            \t\ttotal = total + i;
            \t}
        "}));
    }

    #[test]
    fn test_struct_parameters_are_decomposed() {
        let code = compile(include_str!("../../demos/vectors.sp"));

        assert!(code.contains("int Dot(int a__x, int a__y, int b__x, int b__y);\n"));
        assert!(code.contains("\treturn (a__x * b__x) + (a__y * b__y);\n"));
        assert!(code.contains("Vector2* Scale(int v__x, int v__y, int k);\n"));
        assert!(code.contains("\tv__x = v__x * k;\n"));
        assert!(code.contains("\treturn Vector2__New(v__x, v__y);\n"));
        assert!(code.contains("Vector2* Vector2__Add(Vector2* self, int other__x, int other__y);\n"));
        assert!(code.contains("\tVector2__static.Created = Vector2__static.Created + 1;\n"));

        // Call sites pass the same fields in the same order.
        assert!(code.contains(indoc! {"
            \tVector2* _t1 = Vector2__New(3, 4);
            \tVector2* sum = Vector2__Add(Vector2__New(1, 2), _t1->x, _t1->y);
            \tVector2* scaled = Scale(sum->x, sum->y, 2);
            \tVector2* _t2 = Vector2__Zero();
            \treturn Dot(scaled->x, scaled->y, _t2->x, _t2->y) + sum->x;
        "}));
    }

    #[test]
    fn test_constructors_allocate_once() {
        let code = compile(include_str!("../../demos/vectors.sp"));
        assert!(code.contains(indoc! {"
            Vector2* Vector2__New(int x, int y)
            {
            \tVector2* _self = _specs__Allocate(sizeof(Vector2));
            \t_self->x = x;
            \t_self->y = y;
            \treturn _self;
            }
        "}));
        assert!(code.contains("struct\n{\n\tint Created;\n} Vector2__static;\n"));
    }

    #[test]
    fn test_dispatch_falls_back_to_exit() {
        let code = compile(include_str!("../../demos/animals.sp"));

        assert!(code.contains(
            "typedef enum _specs__TypeID { _specs__TypeID__Dog, _specs__TypeID__Cat, \
             _specs__TypeID__Person } _specs__TypeID;\n"
        ));
        assert!(code.contains(indoc! {"
            char* Animal__GetSpecies(Animal self)
            {
            \tswitch (self.type)
            \t{
            \t\tcase _specs__TypeID__Dog:
            \t\t\treturn Dog__Animal__GetSpecies(self.value.Dog);
        "}));
        assert_eq!(code.matches("\t\tdefault:\n\t\t\texit(1);\n").count(), 2);
        assert!(code.contains("\tint legs = Count__Legs(Animal__From__Dog(dog), "));
        assert!(code.contains("(strcmp(species, \"canis familiaris\") == 0)"));
    }

    #[test]
    fn test_instances_are_emitted_once() {
        let code = compile(indoc! {"
            let a = Array<int>.New(2)
            let b = Array<int>.New(3)
            let c = Array<bool>.New(1)
            for x in a { }
        "});
        assert_eq!(code.matches("typedef struct Array__Int Array__Int;").count(), 1);
        assert_eq!(code.matches("struct Array__Int\n").count(), 1);
        assert_eq!(code.matches("Array__Int* Array__Int__New(int length)\n").count(), 1);
        assert!(code.contains("Array__Bool* c = Array__Bool__New(1);"));
        let int_block = code.find("struct Array__Int\n").expect("int block");
        let bool_block = code.find("struct Array__Bool\n").expect("bool block");
        assert!(int_block < bool_block);
    }

    #[test]
    fn test_short_circuit_keeps_hoisted_work_guarded() {
        let code = compile(indoc! {"
            struct Vector2 { [x int] [y int] }
            fn Positive [v Vector2] -> bool { return v.x > 0 }
            let flag = true
            let ok = flag and (Positive Vector2.New(1, 2))
        "});
        assert!(code.contains(indoc! {"
            \tbool _t2 = flag;
            \tif (_t2)
            \t{
            \t\tVector2* _t1 = Vector2__New(1, 2);
            \t\t_t2 = Positive(_t1->x, _t1->y);
            \t}
            \tbool ok = _t2;
        "}));
    }

    #[test]
    fn test_mangled_name_collision() {
        let src = "struct Dog { fn Bark [self] { } } fn Dog-Bark { }";
        let error = crate::compile(src, &Config::default()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MangledNameCollision);
        assert_eq!(
            error.render(src),
            "error[MangledNameCollision] in Dog-Bark: \
             Dog__Bark is generated for both Dog/Bark and Dog-Bark"
        );
    }

    #[test]
    fn test_without_entry_point() {
        let config = Config {
            entry_point: false,
            runtime_header: "rt.h".to_string(),
            ..Config::default()
        };
        let code = crate::compile("let x = 1", &config).expect("program should compile");
        assert!(code.starts_with("#include \"rt.h\"\n"));
        assert!(!code.contains("int main(void)"));
    }

    #[test]
    fn test_parens_are_only_stripped_when_they_wrap_everything() {
        assert_eq!(unwrap_parens("(a < b)"), "a < b");
        assert_eq!(unwrap_parens("(a) + (b)"), "(a) + (b)");
        assert_eq!(unwrap_parens("(strcmp(s, \")\") == 0)"), "strcmp(s, \")\") == 0");
        assert_eq!(unwrap_parens("F(x)"), "F(x)");
    }

    #[test]
    fn test_string_literals_are_escaped() {
        assert_eq!(string_literal("say \"hi\"\n"), r#""say \"hi\"\n""#);
        assert_eq!(string_literal("a\0b"), r#""a\000b""#);
    }
}
