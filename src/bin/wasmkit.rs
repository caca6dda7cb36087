//! Command-line driver: loads a module from binary or text form and
//! optionally instantiates it and runs one export.

use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use wasmkit::interpreter::{ExecutionPolicy, ModuleInstance, SpecTestImporter};
use wasmkit::{assemble_text, parse_binary};

/// Load a WebAssembly module and optionally run one of its exports.
#[derive(Parser)]
#[command(name = "wasmkit", version)]
struct Arguments {
    /// The module to load: binary format for `.wasm`, text format otherwise.
    file: PathBuf,

    /// Instantiate the module against the spectest importer and invoke this
    /// export with no arguments.
    #[arg(long, value_name = "EXPORT")]
    run: Option<String>,
}

fn main() -> ExitCode {
    env_logger::init();

    let arguments = Arguments::parse();

    match run(&arguments) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");

            ExitCode::FAILURE
        }
    }
}

fn run(arguments: &Arguments) -> Result<(), Box<dyn std::error::Error>> {
    let extension = arguments.file.extension().and_then(|extension| extension.to_str());
    let module = if extension == Some("wasm") {
        parse_binary(&fs::read(&arguments.file)?)?
    } else {
        assemble_text(&fs::read_to_string(&arguments.file)?)?
    };

    log::info!("loaded {}", arguments.file.display());

    if let Some(name) = &arguments.run {
        let mut importer = SpecTestImporter::new(std::io::stderr());
        let instance =
            ModuleInstance::instantiate(&module, &mut importer, ExecutionPolicy::default())?;
        let results = instance.invoke(name, &[])?;

        if !results.is_empty() {
            let rendered: Vec<String> = results.iter().map(ToString::to_string).collect();

            println!("{}", rendered.join(" "));
        }
    }

    Ok(())
}
