use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The only conditions that abort a run: everything else is a collected
/// diagnostic and the output is still written.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unable to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
