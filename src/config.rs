/// Knobs for the code generator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Prepended to the mangled name of every nested function, so that
    /// `Factorial/Accumulator` becomes `_Factorial__Accumulator`.
    pub nested_prefix: String,
    /// The support library header named by the leading `#include`.
    pub runtime_header: String,
    /// Whether to close the output with a `main` that runs the program body.
    pub entry_point: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            nested_prefix: "_".to_string(),
            runtime_header: "specs_runtime.h".to_string(),
            entry_point: true,
        }
    }
}
