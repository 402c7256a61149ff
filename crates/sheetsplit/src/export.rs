//! Writing each sheet of a document to its own CSV file.

use std::path::{Path, PathBuf};

use sheetsplit_urp::marshal::property_value;
use sheetsplit_urp::{Type, UnoValue, UrpError};

use crate::config::ConvertOptions;
use crate::document::Document;
use crate::error::{ConvertError, Result};
use crate::file_url::file_url;
use crate::naming::TargetNamer;
use crate::pacing::Pacer;
use crate::session::OfficeSession;
use crate::sheets::Sheet;

/// Calc's CSV export filter.
pub const EXPORT_FILTER: &str = "Text - txt - csv (StarCalc)";
/// Field separator `,` (44), text delimiter `"` (34), system character set.
pub const EXPORT_FILTER_OPTIONS: &str = "44,34,0";

/// Media descriptor for `storeToURL`.
pub fn export_properties() -> Vec<UnoValue> {
    vec![
        property_value("FilterName", UnoValue::String(EXPORT_FILTER.into()), Type::string()),
        property_value(
            "FilterOptions",
            UnoValue::String(EXPORT_FILTER_OPTIONS.into()),
            Type::string(),
        ),
        property_value("Overwrite", UnoValue::Bool(true), Type::boolean()),
    ]
}

/// A sheet that made it to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedSheet {
    pub index: usize,
    pub name: String,
    pub path: PathBuf,
}

/// Outcome of a successful run, in sheet order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub sheets: Vec<ExportedSheet>,
}

impl ExportReport {
    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.sheets.iter().map(|sheet| sheet.path.as_path())
    }
}

/// Activates, paces and exports sheets one at a time.
#[derive(Debug)]
pub struct ExportDriver {
    namer: TargetNamer,
    pacer: Pacer,
}

impl ExportDriver {
    pub fn new(out_dir: &Path, options: &ConvertOptions) -> Self {
        Self {
            namer: TargetNamer::new(out_dir, options.naming),
            pacer: Pacer::new(options.slow),
        }
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    /// Export one sheet and return the file written.
    pub async fn export_sheet(
        &mut self,
        session: &mut OfficeSession,
        doc: &Document,
        sheet: &Sheet,
    ) -> Result<PathBuf> {
        doc.activate(session, sheet).await?;
        self.pacer.pace().await;

        let target = self.namer.target(sheet.index, &sheet.name);
        let failed = |source| ConvertError::Export {
            sheet: sheet.name.clone(),
            target: target.clone(),
            source,
        };
        let url = file_url(&target).map_err(|e| failed(UrpError::Io(e)))?;

        tracing::debug!("storing sheet {} to {url}", sheet.index + 1);
        doc.store_to_url(session, &url, export_properties())
            .await
            .map_err(failed)?;
        tracing::info!("exported sheet {:?} to {}", sheet.name, target.display());

        self.pacer.pace().await;
        Ok(target)
    }

    /// Export every sheet in server order, stopping at the first failure.
    /// Files written before the failure stay on disk.
    pub async fn export_all(
        &mut self,
        session: &mut OfficeSession,
        doc: &Document,
    ) -> Result<ExportReport> {
        let mut cursor = doc.sheets(session).await?;
        let mut report = ExportReport::default();
        while let Some(sheet) = cursor.next(session).await? {
            let path = self.export_sheet(session, doc, &sheet).await?;
            report.sheets.push(ExportedSheet {
                index: sheet.index,
                name: sheet.name,
                path,
            });
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_descriptor_overwrites_with_csv_filter() {
        let props = export_properties();
        let names: Vec<&str> = props
            .iter()
            .filter_map(|prop| match prop {
                UnoValue::Struct(fields) => fields[0].as_str(),
                _ => None,
            })
            .collect();
        assert_eq!(names, ["FilterName", "FilterOptions", "Overwrite"]);
        assert_eq!(props[2], property_value("Overwrite", UnoValue::Bool(true), Type::boolean()));
    }
}
