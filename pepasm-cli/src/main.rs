use std::process::ExitCode;

use pepasm::{AsmConfig, Driver, MacroRegistry};

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let src = match read_in() {
        Ok(src) => src,
        Err(e) => {
            eprintln!("unable to read stdin: {e}");
            return ExitCode::FAILURE;
        }
    };
    let mut registry = MacroRegistry::new();
    let mut driver = Driver::new(&mut registry, AsmConfig::default());
    let result = if src.to_ascii_uppercase().contains(".BURN") {
        driver.assemble_operating_system(&src)
    } else {
        driver.assemble_user_program(&src, None)
    };
    match result {
        Ok(output) => {
            println!("{}", output.object_text);
            println!();
            print!("{}", output.listing);
            println!();
            print!("{}", output.symbol_listing);
            if !output.diagnostics.is_empty() {
                eprint!("{}", output.diagnostics.annotate_source(&src));
            }
            ExitCode::SUCCESS
        }
        Err(failure) => {
            tracing::error!("{failure}");
            print!("{}", failure.errors.annotate_source(&src));
            ExitCode::FAILURE
        }
    }
}

fn read_in() -> std::io::Result<String> {
    use std::io::{stdin, Read};
    let mut out = String::new();
    stdin().read_to_string(&mut out)?;
    Ok(out)
}
