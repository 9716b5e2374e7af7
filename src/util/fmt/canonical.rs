//! Renders a flattened program in the canonical s-expression form. The
//! output parses back (through the same parser and flattener) to a program
//! that renders identically.

use std::fmt::{self, Write};

use crate::{
    ast::*,
    util::{
        fmt::{Context, Show},
        intern::Interner,
    },
};

const INDENT: &str = "    ";

impl Show for Program {
    fn show(&self, f: &mut fmt::Formatter<'_>, ctx: &Context<'_>) -> fmt::Result {
        print_program(f, ctx.ident_interner, self)
    }
}

pub fn program_string(idents: &Interner<str>, program: &Program) -> String {
    let ctx = Context {
        ident_interner: idents,
    };
    let text = program.display(&ctx).to_string();
    text
}

pub fn print_program(w: &mut impl Write, idents: &Interner<str>, program: &Program) -> fmt::Result {
    let mut first = true;
    for item in &program.items {
        if !first {
            writeln!(w)?;
        }
        first = false;
        print_item(w, idents, item)?;
    }
    if !program.body.is_empty() && !first {
        writeln!(w)?;
    }
    for stmt in &program.body {
        print_stmt(w, idents, 0, stmt)?;
        writeln!(w)?;
    }
    Ok(())
}

fn print_item(w: &mut impl Write, idents: &Interner<str>, item: &Item) -> fmt::Result {
    match item {
        Item::Function(function) => {
            write!(w, "fn ")?;
            print_header(w, idents, &function.name, &function.params, &function.return_ty)?;
            write!(w, " ")?;
            print_block(w, idents, 0, &function.body)?;
            writeln!(w)
        }
        Item::Struct(s) => {
            write!(w, "struct {}", idents.get(s.name))?;
            if let Some(param) = s.type_param {
                write!(w, "<{}>", idents.get(param))?;
            }
            if s.fields.is_empty() && s.statics.is_empty() {
                return writeln!(w, " {{ }}");
            }
            writeln!(w, " {{")?;
            for field in &s.fields {
                writeln!(
                    w,
                    "{INDENT}[{} {}]",
                    idents.get(field.name),
                    field.ty.show(idents)
                )?;
            }
            for field in &s.statics {
                writeln!(
                    w,
                    "{INDENT}static [{} {}]",
                    idents.get(field.name),
                    field.ty.show(idents)
                )?;
            }
            writeln!(w, "}}")
        }
        Item::Interface(interface) => {
            write!(w, "interface {}", idents.get(interface.name))?;
            if interface.methods.is_empty() {
                return writeln!(w, " {{ }}");
            }
            writeln!(w, " {{")?;
            for signature in &interface.methods {
                write!(w, "{INDENT}fn ")?;
                let name = Path::single(signature.name);
                print_header(w, idents, &name, &signature.params, &signature.return_ty)?;
                writeln!(w)?;
            }
            writeln!(w, "}}")
        }
        Item::Impl(i) => writeln!(
            w,
            "impl {} for {}",
            idents.get(i.interface),
            idents.get(i.target)
        ),
        Item::Enum(e) => {
            write!(w, "enum {} {{", idents.get(e.name))?;
            for variant in &e.variants {
                write!(w, " {}", idents.get(variant))?;
            }
            writeln!(w, " }}")
        }
    }
}

fn print_header(
    w: &mut impl Write,
    idents: &Interner<str>,
    name: &Path,
    params: &[Param],
    return_ty: &Option<TypeExpr>,
) -> fmt::Result {
    write!(w, "({}", name.show(idents))?;
    for param in params {
        match &param.ty {
            Some(ty) => write!(w, " [{} {}]", idents.get(param.name), ty.show(idents))?,
            None => write!(w, " [{}]", idents.get(param.name))?,
        }
    }
    write!(w, ")")?;
    if let Some(ty) = return_ty {
        write!(w, " -> {}", ty.show(idents))?;
    }
    Ok(())
}

/// Writes `{ ... }`, leaving the cursor after the closing brace.
fn print_block(w: &mut impl Write, idents: &Interner<str>, i: usize, body: &[Stmt]) -> fmt::Result {
    if body.is_empty() {
        return write!(w, "{{ }}");
    }
    writeln!(w, "{{")?;
    for stmt in body {
        indent(w, i + 1)?;
        print_stmt(w, idents, i + 1, stmt)?;
        writeln!(w)?;
    }
    indent(w, i)?;
    write!(w, "}}")
}

/// Writes a statement without leading indentation or trailing newline.
fn print_stmt(w: &mut impl Write, idents: &Interner<str>, i: usize, stmt: &Stmt) -> fmt::Result {
    match &stmt.kind {
        StmtKind::Function(_) => unreachable!("canonical programs have no nested declarations"),
        StmtKind::Return(None) => write!(w, "(return)"),
        StmtKind::Return(Some(value)) => {
            write!(w, "(return ")?;
            print_expr(w, idents, value)?;
            write!(w, ")")
        }
        StmtKind::Let { name, ty, value } => {
            match ty {
                Some(ty) => write!(w, "(let [{} {}] ", idents.get(name), ty.show(idents))?,
                None => write!(w, "(let {} ", idents.get(name))?,
            }
            print_expr(w, idents, value)?;
            write!(w, ")")
        }
        StmtKind::Assign { target, value } => {
            write!(w, "(set ")?;
            print_expr(w, idents, target)?;
            write!(w, " ")?;
            print_expr(w, idents, value)?;
            write!(w, ")")
        }
        StmtKind::If {
            predicate,
            then_body,
            else_body,
        } => {
            write!(w, "(if ")?;
            print_expr(w, idents, predicate)?;
            write!(w, " ")?;
            print_block(w, idents, i, then_body)?;
            if let Some(else_body) = else_body {
                write!(w, " else ")?;
                print_block(w, idents, i, else_body)?;
            }
            write!(w, ")")
        }
        StmtKind::While { predicate, body } => {
            write!(w, "(while ")?;
            print_expr(w, idents, predicate)?;
            write!(w, " ")?;
            print_block(w, idents, i, body)?;
            write!(w, ")")
        }
        StmtKind::For {
            binding,
            iterable,
            body,
        } => {
            write!(w, "(for {} ", idents.get(binding))?;
            print_expr(w, idents, iterable)?;
            write!(w, " ")?;
            print_block(w, idents, i, body)?;
            write!(w, ")")
        }
        StmtKind::Block(body) => print_block(w, idents, i, body),
        StmtKind::Expr(expr) => print_expr(w, idents, expr),
    }
}

pub fn print_expr(w: &mut impl Write, idents: &Interner<str>, expr: &Expr) -> fmt::Result {
    match &expr.kind {
        ExprKind::Call { callee, args } => {
            write!(w, "(")?;
            print_expr(w, idents, callee)?;
            for arg in args {
                write!(w, " ")?;
                print_expr(w, idents, arg)?;
            }
            write!(w, ")")
        }
        ExprKind::Binary { op, lhs, rhs } => {
            write!(w, "(")?;
            print_expr(w, idents, lhs)?;
            write!(w, " {} ", op.symbol())?;
            print_expr(w, idents, rhs)?;
            write!(w, ")")
        }
        ExprKind::Unary { op, expr } => {
            match op {
                UnaryOperator::Neg => write!(w, "-")?,
                UnaryOperator::Not => write!(w, "not ")?,
            }
            print_expr(w, idents, expr)
        }
        ExprKind::Member { target, member } => {
            print_expr(w, idents, target)?;
            write!(w, ".{}", idents.get(member))
        }
        ExprKind::Static { ty, member } => {
            write!(w, "{}.{}", ty.show(idents), idents.get(member))
        }
        ExprKind::Name(name) => match &name.res {
            Some(Res::Function(path)) => write!(w, "{}", path.show(idents)),
            _ => write!(w, "{}", name.path.show(idents)),
        },
        ExprKind::Int(val) => write!(w, "{val}"),
        ExprKind::String(val) => write!(w, "\"{}\"", escape(val)),
        ExprKind::Bool(val) => write!(w, "{val}"),
    }
}

fn escape(raw: &str) -> String {
    let mut buf = String::with_capacity(raw.len() + 2);
    for c in raw.chars() {
        match c {
            '\n' => buf.push_str("\\n"),
            '\t' => buf.push_str("\\t"),
            '\r' => buf.push_str("\\r"),
            '\0' => buf.push_str("\\0"),
            '\\' => buf.push_str("\\\\"),
            '"' => buf.push_str("\\\""),
            c => buf.push(c),
        }
    }
    buf
}

fn indent(w: &mut impl Write, i: usize) -> fmt::Result {
    for _ in 0..i {
        w.write_str(INDENT)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{lexer, parser, resolver};

    #[test]
    fn program_string_renders_flattened_program() {
        let src = "fn Twice [n int] -> int { fn Add [a int] [b int] -> int { return a + b } return (Add n n) }";
        let idents = &mut Interner::with_capacity(32);
        let tokens = lexer::lex_in_new(src).unwrap();
        let program = parser::parse_program(src, &tokens, idents).unwrap();
        let program = resolver::flatten(program, idents).unwrap();

        let text = program_string(idents, &program);
        let expected = indoc! {"
            fn (Twice [n int]) -> int {
                (return (Twice/Add n n))
            }

            fn (Twice/Add [a int] [b int]) -> int {
                (return (a + b))
            }
        "};
        assert_eq!(text.trim(), expected.trim());
    }
}
