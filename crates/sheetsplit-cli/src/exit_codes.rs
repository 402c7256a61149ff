//! Exit codes of the `sheetsplit` binary.
//!
//! Scripts rely on these; change them only with a changelog entry.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | All sheets exported                                  |
//! | 1    | Unexpected failure (runtime could not start)         |
//! | 2    | Usage error, missing input, output not a directory   |
//! | 3    | Office process unreachable or bootstrap failed       |
//! | 4    | Document could not be opened                         |
//! | 5    | Document misbehaved while listing or activating      |
//! | 6    | A sheet could not be exported                        |

use sheetsplit::ConvertError;

pub const EXIT_SUCCESS: u8 = 0;

/// Avoid; prefer a specific code.
pub const EXIT_ERROR: u8 = 1;

/// Bad arguments or paths. clap also exits with 2 on parse errors.
pub const EXIT_USAGE: u8 = 2;

pub const EXIT_CONNECTION: u8 = 3;

pub const EXIT_DOCUMENT_OPEN: u8 = 4;

pub const EXIT_DOCUMENT_STATE: u8 = 5;

pub const EXIT_EXPORT: u8 = 6;

/// Exit code for a failed conversion.
pub fn for_error(err: &ConvertError) -> u8 {
    match err {
        ConvertError::Connection { .. } => EXIT_CONNECTION,
        ConvertError::DocumentOpen { .. } => EXIT_DOCUMENT_OPEN,
        ConvertError::DocumentState { .. } => EXIT_DOCUMENT_STATE,
        ConvertError::Export { .. } => EXIT_EXPORT,
    }
}
