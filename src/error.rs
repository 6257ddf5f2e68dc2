use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    ParseError {
        path: PathBuf,
        #[source]
        source: syn::Error,
    },

    #[error("instrumented output for {} does not parse (internal error): {source}", path.display())]
    InvalidOutput {
        path: PathBuf,
        #[source]
        source: syn::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run {tool}: {source}")]
    ToolFailed {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of the in-memory pipeline, before any path is attached.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("{0}")]
    Parse(#[source] syn::Error),

    #[error("generated source does not parse: {0}")]
    Emit(#[source] syn::Error),
}

impl RewriteError {
    /// Attach the file the pipeline was run on.
    pub fn at(self, path: impl Into<PathBuf>) -> Error {
        match self {
            RewriteError::Parse(source) => Error::ParseError {
                path: path.into(),
                source,
            },
            RewriteError::Emit(source) => Error::InvalidOutput {
                path: path.into(),
                source,
            },
        }
    }
}
