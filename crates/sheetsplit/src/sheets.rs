//! Walking the sheets of an open spreadsheet document.

use sheetsplit_urp::interface;
use sheetsplit_urp::{type_names, UnoProxy, UnoValue};

use crate::error::{ConvertError, Result};
use crate::session::OfficeSession;

/// One sheet as the server reports it.
///
/// A view into the owning document; it must not outlive that document's
/// session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    /// 0-based position in server order.
    pub index: usize,
    /// Display name, untrusted for filesystem use.
    pub name: String,
    pub(crate) proxy: UnoProxy,
}

/// A single pass over a document's sheets, in server order.
#[derive(Debug)]
pub struct SheetCursor {
    sheets: UnoProxy,
    count: usize,
    next: usize,
}

impl SheetCursor {
    /// Fetch the sheet container of `spreadsheet` (an `XSpreadsheetDocument`)
    /// and read the sheet count once.
    pub(crate) async fn open(session: &mut OfficeSession, spreadsheet: &UnoProxy) -> Result<Self> {
        let conn = session.conn();
        let sheets = conn
            .call_for_object(
                spreadsheet,
                &interface::GET_SHEETS,
                &[],
                type_names::X_SPREADSHEETS,
            )
            .await
            .map_err(|e| ConvertError::state("listing sheets", e))?;
        let sheets = conn
            .require_interface(&sheets, type_names::X_INDEX_ACCESS)
            .await
            .map_err(|e| ConvertError::state("listing sheets", e))?;

        let count = conn
            .call(&sheets, &interface::GET_COUNT, &[])
            .await
            .map_err(|e| ConvertError::state("counting sheets", e))?
            .as_long()
            .unwrap_or(0);
        let count = usize::try_from(count).unwrap_or(0);
        tracing::debug!("document has {count} sheet(s)");

        Ok(Self {
            sheets,
            count,
            next: 0,
        })
    }

    /// Total number of sheets.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The next sheet, or `None` once all have been visited.
    pub async fn next(&mut self, session: &mut OfficeSession) -> Result<Option<Sheet>> {
        if self.next >= self.count {
            return Ok(None);
        }
        let index = self.next;
        let action = || format!("reading sheet {}", index + 1);
        let conn = session.conn();

        let element = conn
            .call(
                &self.sheets,
                &interface::GET_BY_INDEX,
                &[UnoValue::Long(index as i32)],
            )
            .await
            .map_err(|e| ConvertError::state(action(), e))?;
        let proxy = UnoProxy::from_value(&element, type_names::X_SPREADSHEET).ok_or_else(|| {
            ConvertError::state(
                action(),
                sheetsplit_urp::UrpError::NullReference(interface::GET_BY_INDEX.name),
            )
        })?;

        let named = conn
            .require_interface(&proxy, type_names::X_NAMED)
            .await
            .map_err(|e| ConvertError::state(action(), e))?;
        let name = conn
            .call(&named, &interface::GET_NAME, &[])
            .await
            .map_err(|e| ConvertError::state(action(), e))?
            .as_str()
            .unwrap_or_default()
            .to_string();

        self.next += 1;
        tracing::trace!("sheet {} is {name:?}", index + 1);
        Ok(Some(Sheet { index, name, proxy }))
    }
}
