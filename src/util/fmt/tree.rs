use std::io::Write;

use crate::{
    ast::*,
    ir,
    types::{FnSig, Type},
    util::intern::Interner,
};

const INDENT_WIDTH: usize = 2;

pub fn print_program_string(idents: &Interner<str>, program: &Program) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, idents, program).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_expr_string(idents: &Interner<str>, expr: &Expr) -> String {
    let mut buf = Vec::with_capacity(512);
    print_expr(&mut buf, idents, 0, expr).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_ir_string(idents: &Interner<str>, program: &ir::Program) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_ir(&mut buf, idents, program).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_program(
    w: &mut impl Write,
    idents: &Interner<str>,
    program: &Program,
) -> std::io::Result<()> {
    for item in &program.items {
        match item {
            Item::Function(function) => print_function(w, idents, 0, function)?,
            Item::Struct(s) => print_struct(w, idents, s)?,
            Item::Interface(interface) => {
                writeln!(
                    w,
                    "interface {} ({})",
                    idents.get(interface.name),
                    interface.span
                )?;
                for signature in &interface.methods {
                    sp(w, 1)?;
                    write!(w, "signature {}", idents.get(signature.name))?;
                    print_signature_tail(w, idents, &signature.params, &signature.return_ty)?;
                    writeln!(w)?;
                }
            }
            Item::Impl(i) => {
                writeln!(
                    w,
                    "impl {} for {} ({})",
                    idents.get(i.interface),
                    idents.get(i.target),
                    i.span
                )?;
                for method in &i.methods {
                    print_function(w, idents, 1, method)?;
                }
            }
            Item::Enum(e) => {
                writeln!(w, "enum {} ({})", idents.get(e.name), e.span)?;
                for variant in &e.variants {
                    sp(w, 1)?;
                    writeln!(w, "variant {}", idents.get(variant))?;
                }
            }
        }
    }
    if !program.body.is_empty() {
        writeln!(w, "body")?;
        for stmt in &program.body {
            print_stmt(w, idents, 1, stmt)?;
        }
    }
    Ok(())
}

fn print_struct(w: &mut impl Write, idents: &Interner<str>, s: &Struct) -> std::io::Result<()> {
    write!(w, "struct {}", idents.get(s.name))?;
    if let Some(param) = s.type_param {
        write!(w, "<{}>", idents.get(param))?;
    }
    writeln!(w, " ({})", s.span)?;
    for field in &s.fields {
        sp(w, 1)?;
        writeln!(
            w,
            "field {} {}",
            idents.get(field.name),
            field.ty.show(idents)
        )?;
    }
    for field in &s.statics {
        sp(w, 1)?;
        writeln!(
            w,
            "static {} {}",
            idents.get(field.name),
            field.ty.show(idents)
        )?;
    }
    for method in &s.methods {
        print_function(w, idents, 1, method)?;
    }
    Ok(())
}

fn print_function(
    w: &mut impl Write,
    idents: &Interner<str>,
    i: usize,
    function: &Function,
) -> std::io::Result<()> {
    sp(w, i)?;
    write!(w, "fn {}", function.name.show(idents))?;
    print_signature_tail(w, idents, &function.params, &function.return_ty)?;
    match function.kind {
        FunctionKind::Free => {}
        FunctionKind::Method { owner } => write!(w, " in {}", idents.get(owner))?,
        FunctionKind::ImplMethod { owner, interface } => write!(
            w,
            " in {} for {}",
            idents.get(interface),
            idents.get(owner)
        )?,
    }
    writeln!(w, " ({})", function.span)?;
    for stmt in &function.body {
        print_stmt(w, idents, i + 1, stmt)?;
    }
    Ok(())
}

fn print_signature_tail(
    w: &mut impl Write,
    idents: &Interner<str>,
    params: &[Param],
    return_ty: &Option<TypeExpr>,
) -> std::io::Result<()> {
    for param in params {
        match &param.ty {
            Some(ty) => write!(w, " [{} {}]", idents.get(param.name), ty.show(idents))?,
            None => write!(w, " [{}]", idents.get(param.name))?,
        }
    }
    if let Some(ty) = return_ty {
        write!(w, " -> {}", ty.show(idents))?;
    }
    Ok(())
}

pub fn print_stmt(
    w: &mut impl Write,
    idents: &Interner<str>,
    i: usize,
    stmt: &Stmt,
) -> std::io::Result<()> {
    let span = stmt.span;
    match &stmt.kind {
        StmtKind::Function(function) => print_function(w, idents, i, function)?,
        StmtKind::Return(value) => {
            sp(w, i)?;
            writeln!(w, "return ({span})")?;
            if let Some(value) = value {
                print_expr(w, idents, i + 1, value)?;
            }
        }
        StmtKind::Let { name, ty, value } => {
            sp(w, i)?;
            write!(w, "let {}", idents.get(name))?;
            if let Some(ty) = ty {
                write!(w, " {}", ty.show(idents))?;
            }
            writeln!(w, " ({span})")?;
            print_expr(w, idents, i + 1, value)?;
        }
        StmtKind::Assign { target, value } => {
            sp(w, i)?;
            writeln!(w, "assign ({span})")?;
            print_expr(w, idents, i + 1, target)?;
            print_expr(w, idents, i + 1, value)?;
        }
        StmtKind::If {
            predicate,
            then_body,
            else_body,
        } => {
            sp(w, i)?;
            writeln!(w, "if ({span})")?;
            print_expr(w, idents, i + 1, predicate)?;
            sp(w, i + 1)?;
            writeln!(w, "then")?;
            for stmt in then_body {
                print_stmt(w, idents, i + 2, stmt)?;
            }
            if let Some(else_body) = else_body {
                sp(w, i + 1)?;
                writeln!(w, "else")?;
                for stmt in else_body {
                    print_stmt(w, idents, i + 2, stmt)?;
                }
            }
        }
        StmtKind::While { predicate, body } => {
            sp(w, i)?;
            writeln!(w, "while ({span})")?;
            print_expr(w, idents, i + 1, predicate)?;
            for stmt in body {
                print_stmt(w, idents, i + 1, stmt)?;
            }
        }
        StmtKind::For {
            binding,
            iterable,
            body,
        } => {
            sp(w, i)?;
            writeln!(w, "for {} ({span})", idents.get(binding))?;
            print_expr(w, idents, i + 1, iterable)?;
            for stmt in body {
                print_stmt(w, idents, i + 1, stmt)?;
            }
        }
        StmtKind::Block(body) => {
            sp(w, i)?;
            writeln!(w, "block ({span})")?;
            for stmt in body {
                print_stmt(w, idents, i + 1, stmt)?;
            }
        }
        StmtKind::Expr(expr) => print_expr(w, idents, i, expr)?,
    }
    Ok(())
}

pub fn print_expr(
    w: &mut impl Write,
    idents: &Interner<str>,
    i: usize,
    expr: &Expr,
) -> std::io::Result<()> {
    sp(w, i)?;
    let span = expr.span;
    match &expr.kind {
        ExprKind::Call { callee, args } => {
            writeln!(w, "call ({span})")?;
            print_expr(w, idents, i + 1, callee)?;
            for arg in args {
                print_expr(w, idents, i + 1, arg)?;
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            writeln!(w, "binary {op:?} ({span})")?;
            print_expr(w, idents, i + 1, lhs)?;
            print_expr(w, idents, i + 1, rhs)?;
        }
        ExprKind::Unary {
            op,
            expr: inner_expr,
        } => {
            writeln!(w, "unary {op:?} ({span})")?;
            print_expr(w, idents, i + 1, inner_expr)?;
        }
        ExprKind::Member { target, member } => {
            writeln!(w, "member {} ({span})", idents.get(member))?;
            print_expr(w, idents, i + 1, target)?;
        }
        ExprKind::Static { ty, member } => {
            writeln!(
                w,
                "static {}.{} ({span})",
                ty.show(idents),
                idents.get(member)
            )?;
        }
        ExprKind::Name(name) => {
            write!(w, "name {} ({span}", name.path.show(idents))?;
            match &name.res {
                None => {}
                Some(Res::Local) => write!(w, " => local")?,
                Some(Res::Type) => write!(w, " => type")?,
                Some(Res::Range) => write!(w, " => range")?,
                Some(Res::Function(path)) => write!(w, " => fn {}", path.show(idents))?,
            }
            writeln!(w, ")")?;
        }
        ExprKind::Int(val) => writeln!(w, "int {val} ({span})")?,
        ExprKind::String(val) => writeln!(w, "string {val:?} ({span})")?,
        ExprKind::Bool(val) => writeln!(w, "bool {val} ({span})")?,
    }
    Ok(())
}

pub fn print_ir(
    w: &mut impl Write,
    idents: &Interner<str>,
    program: &ir::Program,
) -> std::io::Result<()> {
    for e in &program.enums {
        write!(w, "enum {}", idents.get(e.name))?;
        for variant in &e.variants {
            write!(w, " {}", idents.get(variant))?;
        }
        writeln!(w)?;
    }
    for interface in &program.interfaces {
        write!(w, "interface {}", idents.get(interface.name))?;
        for (idx, ty) in interface.implementors.iter().enumerate() {
            let sep = if idx == 0 { " <- " } else { ", " };
            write!(w, "{sep}{}", ty.show(idents))?;
        }
        writeln!(w)?;
        for (name, sig) in &interface.methods {
            sp(w, 1)?;
            writeln!(w, "method {}{}", idents.get(name), show_sig(idents, sig))?;
        }
    }
    for s in &program.structs {
        writeln!(w, "struct {}", s.ty.show(idents))?;
        for (name, ty) in &s.layout.fields {
            sp(w, 1)?;
            writeln!(w, "field {} {}", idents.get(name), ty.show(idents))?;
        }
        for (name, ty) in &s.statics.fields {
            sp(w, 1)?;
            writeln!(w, "static {} {}", idents.get(name), ty.show(idents))?;
        }
    }
    for elem in &program.arrays {
        writeln!(w, "array {}", elem.show(idents))?;
    }
    for function in &program.functions {
        write!(w, "fn {}", show_fn_ref(idents, &function.target))?;
        for param in &function.params {
            write!(w, " [{} {}]", idents.get(param.name), param.ty.show(idents))?;
        }
        writeln!(w, " -> {}", function.ret.show(idents))?;
        for stmt in &function.body {
            print_ir_stmt(w, idents, 1, stmt)?;
        }
    }
    if !program.body.is_empty() {
        writeln!(w, "body")?;
        for stmt in &program.body {
            print_ir_stmt(w, idents, 1, stmt)?;
        }
    }
    Ok(())
}

fn print_ir_stmt(
    w: &mut impl Write,
    idents: &Interner<str>,
    i: usize,
    stmt: &ir::Stmt,
) -> std::io::Result<()> {
    sp(w, i)?;
    match stmt {
        ir::Stmt::Let { name, ty, value } => {
            writeln!(w, "let {} {}", idents.get(name), ty.show(idents))?;
            print_ir_expr(w, idents, i + 1, value)?;
        }
        ir::Stmt::Assign { target, value } => {
            writeln!(w, "assign")?;
            print_ir_expr(w, idents, i + 1, target)?;
            print_ir_expr(w, idents, i + 1, value)?;
        }
        ir::Stmt::Return(value) => {
            writeln!(w, "return")?;
            if let Some(value) = value {
                print_ir_expr(w, idents, i + 1, value)?;
            }
        }
        ir::Stmt::If {
            predicate,
            then_body,
            else_body,
        } => {
            writeln!(w, "if")?;
            print_ir_expr(w, idents, i + 1, predicate)?;
            sp(w, i + 1)?;
            writeln!(w, "then")?;
            for stmt in then_body {
                print_ir_stmt(w, idents, i + 2, stmt)?;
            }
            if !else_body.is_empty() {
                sp(w, i + 1)?;
                writeln!(w, "else")?;
                for stmt in else_body {
                    print_ir_stmt(w, idents, i + 2, stmt)?;
                }
            }
        }
        ir::Stmt::While { predicate, body } => {
            writeln!(w, "while")?;
            print_ir_expr(w, idents, i + 1, predicate)?;
            for stmt in body {
                print_ir_stmt(w, idents, i + 1, stmt)?;
            }
        }
        ir::Stmt::For {
            binding,
            binding_ty,
            iterable,
            body,
        } => {
            writeln!(
                w,
                "for {} {}",
                idents.get(binding),
                binding_ty.show(idents)
            )?;
            print_ir_expr(w, idents, i + 1, iterable)?;
            for stmt in body {
                print_ir_stmt(w, idents, i + 1, stmt)?;
            }
        }
        ir::Stmt::Block(body) => {
            writeln!(w, "block")?;
            for stmt in body {
                print_ir_stmt(w, idents, i + 1, stmt)?;
            }
        }
        ir::Stmt::Expr(expr) => {
            writeln!(w, "expr")?;
            print_ir_expr(w, idents, i + 1, expr)?;
        }
    }
    Ok(())
}

fn print_ir_expr(
    w: &mut impl Write,
    idents: &Interner<str>,
    i: usize,
    expr: &ir::Expr,
) -> std::io::Result<()> {
    use ir::ExprKind as K;

    sp(w, i)?;
    let ty = expr.ty.show(idents);
    match &expr.kind {
        K::Int(val) => writeln!(w, "int {val} : {ty}")?,
        K::Bool(val) => writeln!(w, "bool {val} : {ty}")?,
        K::String(val) => writeln!(w, "string {val:?} : {ty}")?,
        K::Local(name) => writeln!(w, "local {} : {ty}", idents.get(name))?,
        K::Call {
            target,
            receiver,
            args,
        } => {
            writeln!(w, "call {} : {ty}", show_fn_ref(idents, target))?;
            if let Some(receiver) = receiver {
                print_ir_expr(w, idents, i + 1, receiver)?;
            }
            for arg in args {
                print_ir_expr(w, idents, i + 1, arg)?;
            }
        }
        K::Dispatch {
            interface,
            method,
            receiver,
            args,
        } => {
            writeln!(
                w,
                "dispatch {}.{} : {ty}",
                idents.get(interface),
                idents.get(method)
            )?;
            print_ir_expr(w, idents, i + 1, receiver)?;
            for arg in args {
                print_ir_expr(w, idents, i + 1, arg)?;
            }
        }
        K::Field { target, field } => {
            writeln!(w, "field {} : {ty}", idents.get(field))?;
            print_ir_expr(w, idents, i + 1, target)?;
        }
        K::StaticField { owner, field } => {
            writeln!(
                w,
                "static {}.{} : {ty}",
                owner.show(idents),
                idents.get(field)
            )?;
        }
        K::Variant { owner, variant } => {
            writeln!(
                w,
                "variant {}.{} : {ty}",
                idents.get(owner),
                idents.get(variant)
            )?;
        }
        K::Upcast { interface, expr } => {
            writeln!(w, "upcast {} : {ty}", idents.get(interface))?;
            print_ir_expr(w, idents, i + 1, expr)?;
        }
        K::Unary { op, expr } => {
            writeln!(w, "unary {op:?} : {ty}")?;
            print_ir_expr(w, idents, i + 1, expr)?;
        }
        K::Binary { op, lhs, rhs } => {
            writeln!(w, "binary {op:?} : {ty}")?;
            print_ir_expr(w, idents, i + 1, lhs)?;
            print_ir_expr(w, idents, i + 1, rhs)?;
        }
    }
    Ok(())
}

pub fn show_fn_ref(idents: &Interner<str>, target: &ir::FnRef) -> String {
    match target {
        ir::FnRef::Free(path) => path.show(idents),
        ir::FnRef::Method { owner, name } => {
            format!("{}/{}", owner.show(idents), idents.get(name))
        }
        ir::FnRef::Impl {
            owner,
            interface,
            name,
        } => format!(
            "{}/{}/{}",
            owner.show(idents),
            idents.get(interface),
            idents.get(name)
        ),
        ir::FnRef::Constructor(ty) => format!("{}/New", ty.show(idents)),
        ir::FnRef::Array { elem, op } => {
            format!("Array<{}>/{}", elem.show(idents), op.name())
        }
        ir::FnRef::Range => "Range".to_string(),
    }
}

fn show_sig(idents: &Interner<str>, sig: &FnSig) -> String {
    let mut buf = String::new();
    for param in &sig.params {
        buf.push(' ');
        buf.push_str(&param.show(idents));
    }
    if sig.ret != Type::Void {
        buf.push_str(" -> ");
        buf.push_str(&sig.ret.show(idents));
    }
    buf
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}
