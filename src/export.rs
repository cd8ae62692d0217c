// Spreadsheet export of a downloaded dataset.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use rust_xlsxwriter::{Format, Workbook};
use tracing::info;

use crate::error::ExportError;
use crate::model::Dataset;

pub const SHEET_NAME: &str = "DataDB";
pub const HEADER: [&str; 4] = ["Name", "Value", "Quality", "TimeStamp"];

/// Destination for a downloaded dataset.
pub trait ExportSink {
    /// Write `dataset` and return the path of the produced file.
    fn export(&self, dataset: &Dataset) -> Result<PathBuf, ExportError>;
}

/// Writes `.xlsx` workbooks into a directory.
#[derive(Debug, Clone)]
pub struct XlsxExporter {
    dir: PathBuf,
}

impl XlsxExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        XlsxExporter { dir: dir.into() }
    }

    /// File name used for a dataset exported at `created`.
    pub fn file_name(dataset: &Dataset, created: NaiveDateTime) -> String {
        format!(
            "exportData_{}_{}.xlsx",
            dataset.date,
            created.format("%Y%m%d-%H%M%S")
        )
    }

    /// Same as `export`, with an explicit creation time.
    pub fn export_at(
        &self,
        dataset: &Dataset,
        created: NaiveDateTime,
    ) -> Result<PathBuf, ExportError> {
        if !self.dir.is_dir() {
            return Err(ExportError::MissingDirectory(self.dir.clone()));
        }
        let path = self.dir.join(Self::file_name(dataset, created));
        write_workbook(&path, dataset)?;
        info!(path = %path.display(), rows = dataset.len(), "dataset exported");
        Ok(path)
    }
}

impl ExportSink for XlsxExporter {
    fn export(&self, dataset: &Dataset) -> Result<PathBuf, ExportError> {
        self.export_at(dataset, Local::now().naive_local())
    }
}

/// Cell values of the sheet, header first, in dataset order.
pub fn sheet_rows(dataset: &Dataset) -> impl Iterator<Item = [&str; 4]> {
    std::iter::once(HEADER).chain(dataset.records.iter().map(|r| {
        [
            r.name.as_str(),
            r.value.as_str(),
            r.quality.as_str(),
            r.timestamp.as_str(),
        ]
    }))
}

fn write_workbook(path: &Path, dataset: &Dataset) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (row, cells) in sheet_rows(dataset).enumerate() {
        let row = row as u32;
        for (col, value) in cells.iter().enumerate() {
            if row == 0 {
                sheet.write_string_with_format(row, col as u16, *value, &bold)?;
            } else {
                sheet.write_string(row, col as u16, *value)?;
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}
