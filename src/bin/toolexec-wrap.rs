use std::ffi::OsString;
use std::process;

use clap::Parser;

/// Run a build sub-tool, reporting its command line and how long it took.
#[derive(Parser)]
#[command(name = "toolexec-wrap", version)]
struct Cli {
    /// The tool to run.
    tool: OsString,

    /// Arguments passed through to the tool unchanged.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<OsString>,
}

fn main() {
    tracemark::init_tracing();
    let cli = Cli::parse();
    match tracemark::toolexec::run(&cli.tool, &cli.args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
