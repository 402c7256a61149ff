//! Split a spreadsheet into one CSV file per sheet by driving a running
//! LibreOffice over the UNO Remote Protocol.
//!
//! ```text
//! convert()
//!     └── OfficeSession (sheetsplit-urp over TCP)
//!           └── Document ── SheetCursor ── ExportDriver (activate, pace, store)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use sheetsplit::{ConvertOptions, OfficeSession, SessionConfig};
//!
//! # async fn example() -> sheetsplit::Result<()> {
//! let mut session = OfficeSession::connect(&SessionConfig::default()).await?;
//! let report = sheetsplit::convert(
//!     &mut session,
//!     Path::new("book.ods"),
//!     Path::new("out"),
//!     &ConvertOptions::default(),
//! )
//! .await?;
//! println!("wrote {} file(s)", report.len());
//! session.disconnect().await;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod file_url;
pub mod naming;
pub mod pacing;
pub mod session;
pub mod sheets;

pub use config::{ConvertOptions, LoadOptions, SessionConfig};
pub use document::Document;
pub use error::{ConvertError, Result};
pub use export::{ExportDriver, ExportReport, ExportedSheet};
pub use naming::NamePolicy;
pub use pacing::{Pacer, PACING_DELAY};
pub use session::OfficeSession;
pub use sheets::{Sheet, SheetCursor};

/// Open `input`, export each sheet into `out_dir`, and close the document.
///
/// The document is closed exactly once on every path after a successful
/// open. A failed close is logged and never replaces the outcome of the
/// export.
pub async fn convert(
    session: &mut OfficeSession,
    input: &Path,
    out_dir: &Path,
    options: &ConvertOptions,
) -> Result<ExportReport> {
    let doc = Document::open(session, input, &options.load).await?;

    let mut driver = ExportDriver::new(out_dir, options);
    let outcome = driver.export_all(session, &doc).await;

    if let Err(e) = doc.close(session).await {
        tracing::warn!("{e}");
    }

    match &outcome {
        Ok(report) => tracing::info!(
            "exported {} sheet(s) from {}",
            report.len(),
            input.display()
        ),
        Err(e) => tracing::debug!("aborted after {} pause(s): {e}", driver.pacer().steps()),
    }
    outcome
}

/// Connect, [`convert`], and disconnect.
pub async fn convert_file(
    config: &SessionConfig,
    input: &Path,
    out_dir: &Path,
    options: &ConvertOptions,
) -> Result<ExportReport> {
    let mut session = OfficeSession::connect(config).await?;
    tracing::info!("connected to {}", session.endpoint());
    let outcome = convert(&mut session, input, out_dir, options).await;
    session.disconnect().await;
    outcome
}
