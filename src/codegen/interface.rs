use crate::{codegen::c::Generator, config::Config, ir, util::intern::Interner};

/// Lowers a checked program to a single C translation unit.
pub fn generate(
    program: &ir::Program,
    ident_interner: &Interner<str>,
    config: &Config,
) -> Result<String, Error> {
    let _span = tracing::debug_span!("generate").entered();
    let code = Generator::new(program, ident_interner, config).generate()?;
    tracing::debug!(bytes = code.len(), "generated code");
    Ok(code)
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("{symbol} is generated for both {first} and {second}")]
    MangledNameCollision {
        symbol: String,
        first: String,
        second: String,
    },
}

impl Error {
    /// The declaration that was mangled last, which is the one reported.
    pub fn path(&self) -> &str {
        match self {
            Error::MangledNameCollision { second, .. } => second,
        }
    }
}
