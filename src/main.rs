use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::debug;

use macchiato::jvm::{read_class_file, JVMParser};
use macchiato::program::Program;
use macchiato::runtime::Runtime;

/// Minimal JVM for the integer subset of the bytecode instruction set.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the class file to execute.
    class_file: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();

    // Usage errors exit with status 1, the message goes to stderr.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error)
            if matches!(
                error.kind(),
                clap::error::ErrorKind::DisplayHelp
                    | clap::error::ErrorKind::DisplayVersion
            ) =>
        {
            let _ = error.print();
            return ExitCode::SUCCESS;
        }
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::from(1);
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        // Fatal startup and runtime errors terminate abnormally with a
        // descriptive message.
        Err(message) => {
            eprintln!("macchiato: {message}");
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> Result<(), String> {
    let class_file_bytes = read_class_file(&args.class_file).map_err(|e| {
        format!("failed to read {}: {e}", args.class_file.display())
    })?;
    let class_file =
        JVMParser::parse(&class_file_bytes).map_err(|e| e.to_string())?;
    debug!("parsed class file, version {:?}", class_file.version());

    let program = Program::new(&class_file).map_err(|e| e.to_string())?;
    let mut runtime = Runtime::new(program).map_err(|e| e.to_string())?;
    let stdout = io::stdout();
    runtime
        .run(&mut stdout.lock())
        .map_err(|e| e.to_string())?;
    Ok(())
}
