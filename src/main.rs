use std::path::PathBuf;
use std::process;

use clap::Parser;

use tracemark::error::Error;
use tracemark::rewrite::{self, DEFAULT_MARKER, Options, Outcome};
use tracemark::scan::Attachment;

#[derive(Parser)]
#[command(
    name = "tracemark",
    about = "Inject entry/exit trace logging into functions marked with a comment",
    version,
    after_help = "Writes <FILE>.generated next to the input; the input is never modified.\n\
                  Named arguments of marked functions are logged with `?`,\n\
                  so their types must implement Debug for the output to compile."
)]
struct Cli {
    /// Rust source file to instrument.
    file: PathBuf,

    /// Comment text that marks a function for instrumentation.
    #[arg(long, default_value = DEFAULT_MARKER, value_name = "TEXT")]
    marker: String,

    /// Which comments count as attached to a function.
    #[arg(long, value_enum, default_value_t = Attachment::Nearest)]
    attach: Attachment,
}

fn main() {
    tracemark::init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    let options = Options {
        marker: cli.marker,
        attach: cli.attach,
    };
    match rewrite::instrument_file(&cli.file, &options)? {
        Outcome::NothingToDo => {
            println!(
                "No functions with //{} comment found in {}",
                options.marker,
                cli.file.display()
            );
        }
        Outcome::Generated { output, result } => {
            tracing::debug!(
                functions = ?result.functions,
                imports = ?result.imports_added,
                setup = ?result.setup,
                "instrumented"
            );
            println!("Generated {} with logging injected", output.display());
        }
    }
    Ok(())
}
