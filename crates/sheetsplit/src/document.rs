//! A spreadsheet document loaded into the office process.

use std::path::{Path, PathBuf};

use sheetsplit_urp::interface;
use sheetsplit_urp::marshal::property_value;
use sheetsplit_urp::{type_names, Type, UnoProxy, UnoValue, UrpError};
use url::Url;

use crate::config::LoadOptions;
use crate::error::{ConvertError, Result};
use crate::file_url::file_url;
use crate::session::OfficeSession;
use crate::sheets::{Sheet, SheetCursor};

/// Import filter for delimited text: comma separated, double-quoted.
const CSV_IMPORT_FILTER: (&str, &str) = ("Text - txt - csv (StarCalc)", "44,34,0");
const TXT_IMPORT_FILTER: (&str, &str) = ("Text (encoded)", "utf8");

/// Load properties for `path`. Text inputs get an explicit import filter;
/// everything else is detected by the server.
pub fn load_properties(path: &Path, options: &LoadOptions) -> Vec<UnoValue> {
    let mut props = vec![
        property_value("Hidden", UnoValue::Bool(options.hidden), Type::boolean()),
        property_value("ReadOnly", UnoValue::Bool(options.read_only), Type::boolean()),
    ];
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let filter = match extension.as_deref() {
        Some("csv") => Some(CSV_IMPORT_FILTER),
        Some("txt") => Some(TXT_IMPORT_FILTER),
        _ => None,
    };
    if let Some((name, options)) = filter {
        props.push(property_value("FilterName", UnoValue::String(name.into()), Type::string()));
        props.push(property_value(
            "FilterOptions",
            UnoValue::String(options.into()),
            Type::string(),
        ));
    }
    props
}

/// An open spreadsheet document.
///
/// [`Document::close`] consumes the handle, so a document is closed at most
/// once.
#[derive(Debug)]
pub struct Document {
    path: PathBuf,
    /// The loaded component, as `XComponent`.
    component: UnoProxy,
    /// The same object as `XSpreadsheetDocument`.
    spreadsheet: UnoProxy,
}

impl Document {
    /// Load `path` into a new hidden frame.
    pub async fn open(
        session: &mut OfficeSession,
        path: &Path,
        options: &LoadOptions,
    ) -> Result<Self> {
        let failed = |source| ConvertError::DocumentOpen {
            path: path.to_path_buf(),
            source,
        };

        let url = file_url(path).map_err(|e| failed(UrpError::Io(e)))?;
        let props = load_properties(path, options);
        tracing::debug!("loading {url}");

        let desktop = session.desktop().clone();
        let conn = session.conn();
        let component = conn
            .call_for_object(
                &desktop,
                &interface::LOAD_COMPONENT_FROM_URL,
                &[
                    UnoValue::String(url.to_string()),
                    UnoValue::String("_blank".into()),
                    UnoValue::Long(0),
                    UnoValue::Sequence(props),
                ],
                type_names::X_COMPONENT,
            )
            .await
            .map_err(failed)?;

        let spreadsheet = match conn
            .query_interface(&component, type_names::X_SPREADSHEET_DOCUMENT)
            .await
        {
            Ok(Some(spreadsheet)) => spreadsheet,
            Ok(None) => {
                close_component(session, &component).await;
                return Err(failed(UrpError::Unsupported(
                    type_names::X_SPREADSHEET_DOCUMENT.to_string(),
                )));
            }
            Err(e) => {
                close_component(session, &component).await;
                return Err(failed(e));
            }
        };

        let doc = Self {
            path: path.to_path_buf(),
            component,
            spreadsheet,
        };
        doc.refresh(session).await;
        tracing::info!("opened {}", doc.path.display());
        Ok(doc)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best effort: not every document type is refreshable.
    async fn refresh(&self, session: &mut OfficeSession) {
        let conn = session.conn();
        match conn
            .query_interface(&self.component, type_names::X_REFRESHABLE)
            .await
        {
            Ok(Some(refreshable)) => {
                if let Err(e) = conn.call(&refreshable, &interface::REFRESH, &[]).await {
                    tracing::warn!("refresh of {} failed: {e}", self.path.display());
                }
            }
            Ok(None) => tracing::trace!("{} is not refreshable", self.path.display()),
            Err(e) => tracing::warn!("refresh of {} failed: {e}", self.path.display()),
        }
    }

    /// Start a pass over the document's sheets.
    pub async fn sheets(&self, session: &mut OfficeSession) -> Result<SheetCursor> {
        SheetCursor::open(session, &self.spreadsheet).await
    }

    /// Make `sheet` the active sheet of the document's current view. The
    /// text export filter writes the active sheet only.
    pub async fn activate(&self, session: &mut OfficeSession, sheet: &Sheet) -> Result<()> {
        let action = || format!("activating sheet {:?}", sheet.name);
        let conn = session.conn();

        let model = conn
            .require_interface(&self.component, type_names::X_MODEL)
            .await
            .map_err(|e| ConvertError::state(action(), e))?;
        let controller = conn
            .call_for_object(
                &model,
                &interface::GET_CURRENT_CONTROLLER,
                &[],
                type_names::X_INTERFACE,
            )
            .await
            .map_err(|e| ConvertError::state(action(), e))?;
        let view = conn
            .require_interface(&controller, type_names::X_SPREADSHEET_VIEW)
            .await
            .map_err(|e| ConvertError::state(action(), e))?;

        conn.call(&view, &interface::SET_ACTIVE_SHEET, &[sheet.proxy.to_value()])
            .await
            .map_err(|e| ConvertError::state(action(), e))?;
        Ok(())
    }

    /// `XStorable.storeToURL` with the given media descriptor.
    pub(crate) async fn store_to_url(
        &self,
        session: &mut OfficeSession,
        url: &Url,
        props: Vec<UnoValue>,
    ) -> std::result::Result<(), UrpError> {
        let conn = session.conn();
        let storable = conn
            .require_interface(&self.component, type_names::X_STORABLE)
            .await?;
        conn.call(
            &storable,
            &interface::STORE_TO_URL,
            &[UnoValue::String(url.to_string()), UnoValue::Sequence(props)],
        )
        .await?;
        Ok(())
    }

    /// Close the document, discarding changes.
    pub async fn close(self, session: &mut OfficeSession) -> Result<()> {
        try_close(session, &self.component)
            .await
            .map_err(|e| ConvertError::state("closing the document", e))?;
        tracing::info!("closed {}", self.path.display());
        Ok(())
    }
}

/// `XCloseable.close(true)`, or `XComponent.dispose()` for components that
/// cannot be closed.
async fn try_close(
    session: &mut OfficeSession,
    component: &UnoProxy,
) -> std::result::Result<(), UrpError> {
    let conn = session.conn();
    match conn.query_interface(component, type_names::X_CLOSEABLE).await? {
        Some(closeable) => {
            conn.call(&closeable, &interface::CLOSE, &[UnoValue::Bool(true)])
                .await?;
        }
        None => {
            let disposable = component.retyped(type_names::X_COMPONENT);
            conn.call(&disposable, &interface::DISPOSE, &[]).await?;
        }
    }
    Ok(())
}

/// Close a component that never became a `Document`.
async fn close_component(session: &mut OfficeSession, component: &UnoProxy) {
    if let Err(e) = try_close(session, component).await {
        tracing::warn!("failed to close rejected component {}: {e}", component.oid);
    }
}
