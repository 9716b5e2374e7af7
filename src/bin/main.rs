use std::{env, error::Error, fs, io::Write, process::ExitCode};

use specs::Config;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: specsc <input> [output]";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("failed to run: {error}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether compilation succeeded. Compile errors are reported here;
/// only I/O and usage problems bubble up.
fn run() -> Result<bool, Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let input = args.next().ok_or(USAGE)?;
    let output = args.next();
    if args.next().is_some() {
        return Err(USAGE.into());
    }

    let src = fs::read_to_string(&input)?;
    let config = config_from_env();
    tracing::debug!(?config, %input, "compiling");

    let code = match specs::compile(&src, &config) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{input}: {}", error.render(&src));
            return Ok(false);
        }
    };

    match output {
        Some(path) => fs::write(path, code)?,
        None => std::io::stdout().write_all(code.as_bytes())?,
    }
    Ok(true)
}

fn config_from_env() -> Config {
    let mut config = Config::default();
    if let Ok(prefix) = env::var("SPECS_NESTED_PREFIX") {
        config.nested_prefix = prefix;
    }
    if let Ok(header) = env::var("SPECS_RUNTIME_HEADER") {
        config.runtime_header = header;
    }
    config
}
