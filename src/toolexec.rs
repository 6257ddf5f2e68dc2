//! Run a sub-tool with inherited streams, announcing and timing it.

use std::ffi::OsString;
use std::process::Command;
use std::time::Instant;

use crate::error::Error;

/// Exit code reported when the tool ends without one (killed by a signal).
pub const SIGNALED_EXIT: i32 = 1;

/// Run `tool` with `args`, echoing the command line and its duration to
/// stderr. Returns the tool's exit code.
pub fn run(tool: &OsString, args: &[OsString]) -> Result<i32, Error> {
    eprintln!("TOOLEXEC: {}", command_line(tool, args));

    let start = Instant::now();
    let status = Command::new(tool)
        .args(args)
        .status()
        .map_err(|source| Error::ToolFailed {
            tool: tool.to_string_lossy().into_owned(),
            source,
        })?;
    let elapsed = start.elapsed();

    eprintln!("TOOLEXEC: completed in {elapsed:?}");
    let code = status.code().unwrap_or(SIGNALED_EXIT);
    tracing::debug!(code, ?elapsed, "tool finished");
    Ok(code)
}

fn command_line(tool: &OsString, args: &[OsString]) -> String {
    std::iter::once(tool)
        .chain(args)
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_joins_with_spaces() {
        let args = [OsString::from("-o"), OsString::from("out.o")];
        assert_eq!(command_line(&OsString::from("cc"), &args), "cc -o out.o");
        assert_eq!(command_line(&OsString::from("cc"), &[]), "cc");
    }

    #[test]
    fn missing_tool_is_an_error() {
        let err = run(&OsString::from("tracemark-no-such-tool"), &[]).unwrap_err();
        assert!(matches!(err, Error::ToolFailed { .. }), "got: {err}");
        assert!(err.to_string().contains("tracemark-no-such-tool"));
    }

    #[cfg(unix)]
    #[test]
    fn exit_code_is_returned() {
        let args = [OsString::from("-c"), OsString::from("exit 7")];
        assert_eq!(run(&OsString::from("sh"), &args).unwrap(), 7);
    }
}
