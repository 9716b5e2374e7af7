/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The resolver hoists nested functions to the top level and resolves every
/// name against the scope it appears in.
pub mod resolver;

/// The type checker takes a flattened AST, checks the soundness of its types,
/// resolves members and maps it into the typed IR.
pub mod type_checker;

/// Records generic instances as the checker discovers them.
pub mod mono;

/// The code generator lowers the typed IR to C source.
pub mod codegen {
    pub mod c;
    pub mod interface;
    pub mod mangle;

    pub use interface::{generate, Error};
}

pub mod ast;
pub mod config;
pub mod error;
pub mod ir;
pub mod token;
pub mod types;
pub mod util;

pub use config::Config;
pub use error::{Error, ErrorKind};

use util::intern::Interner;

/// Compiles a whole source file into a C translation unit.
///
/// Every stage fails fast: the first error stops the run.
pub fn compile(src: &str, config: &Config) -> Result<String, Error> {
    let _span = tracing::info_span!("compile", bytes = src.len()).entered();

    let tokens = lexer::lex_in_new(src)?;
    let mut idents = Interner::with_capacity(256);
    let program = parser::parse_program(src, &tokens, &mut idents)?;
    let program = resolver::flatten(program, &idents)?;
    let program = type_checker::check(program, &idents)?;
    tracing::debug!(
        structs = program.structs.len(),
        functions = program.functions.len(),
        "checked program"
    );
    Ok(codegen::generate(&program, &idents, config)?)
}
