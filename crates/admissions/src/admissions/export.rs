use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook, XlsxError};

use super::domain::DecidedStudent;

pub const EXPORT_FILE_NAME: &str = "confirmed_students.xlsx";
pub const WORKSHEET_NAME: &str = "Confirmed Students";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportColumn {
    pub header: &'static str,
    pub width: f64,
}

pub const EXPORT_COLUMNS: [ExportColumn; 11] = [
    ExportColumn { header: "Student ID", width: 15.0 },
    ExportColumn { header: "Student Number", width: 20.0 },
    ExportColumn { header: "First Name", width: 20.0 },
    ExportColumn { header: "Last Name", width: 20.0 },
    ExportColumn { header: "Degree Program", width: 30.0 },
    ExportColumn { header: "Year Level", width: 10.0 },
    ExportColumn { header: "Gmail", width: 25.0 },
    ExportColumn { header: "Phone Number", width: 15.0 },
    ExportColumn { header: "Zip Code", width: 10.0 },
    ExportColumn { header: "Enrolled Units", width: 15.0 },
    ExportColumn { header: "Updated At", width: 20.0 },
];

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Empty,
}

impl CellValue {
    fn text(value: Option<&str>) -> Self {
        match value {
            Some(value) => CellValue::Text(value.to_string()),
            None => CellValue::Empty,
        }
    }
}

/// Cells for one confirmed student, in [`EXPORT_COLUMNS`] order.
pub fn export_row(decided: &DecidedStudent) -> [CellValue; 11] {
    let student = &decided.student;
    [
        CellValue::Text(student.student_id.0.clone()),
        CellValue::text(student.student_number.as_deref()),
        CellValue::Text(student.first_name.clone()),
        CellValue::Text(student.last_name.clone()),
        CellValue::text(student.degree_program.as_deref()),
        student
            .year_level
            .map_or(CellValue::Empty, |level| CellValue::Number(f64::from(level))),
        CellValue::text(student.gmail.as_deref()),
        CellValue::text(student.phone_number.as_deref()),
        CellValue::text(student.zip_code.as_deref()),
        student
            .enrolled_units
            .map_or(CellValue::Empty, |units| CellValue::Number(f64::from(units))),
        CellValue::Text(decided.updated_at.format("%Y-%m-%d %H:%M:%S").to_string()),
    ]
}

/// Data rows below the header, one per confirmed student in the given order.
pub fn export_rows(students: &[DecidedStudent]) -> Vec<[CellValue; 11]> {
    students.iter().map(export_row).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("cannot prepare export directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] XlsxError),
    #[error("export task failed: {0}")]
    Task(String),
}

/// Writes the confirmed-students workbook to a fixed location, replacing earlier exports.
#[derive(Debug, Clone)]
pub struct SpreadsheetExporter {
    dir: PathBuf,
}

impl SpreadsheetExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(EXPORT_FILE_NAME)
    }

    pub fn write(&self, students: &[DecidedStudent]) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| ExportError::Directory {
            path: self.dir.clone(),
            source,
        })?;

        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(WORKSHEET_NAME)?;

        for (col, column) in EXPORT_COLUMNS.iter().enumerate() {
            let col = col as u16;
            worksheet.set_column_width(col, column.width)?;
            worksheet.write_string_with_format(0, col, column.header, &header_format)?;
        }

        for (index, cells) in export_rows(students).into_iter().enumerate() {
            let row = index as u32 + 1;
            for (col, cell) in cells.into_iter().enumerate() {
                let col = col as u16;
                match cell {
                    CellValue::Text(value) => {
                        worksheet.write_string(row, col, &value)?;
                    }
                    CellValue::Number(value) => {
                        worksheet.write_number(row, col, value)?;
                    }
                    CellValue::Empty => {}
                }
            }
        }

        let path = self.path();
        workbook.save(&path)?;
        Ok(path)
    }

    /// Runs [`Self::write`] on the blocking pool.
    pub async fn write_async(
        &self,
        students: Vec<DecidedStudent>,
    ) -> Result<PathBuf, ExportError> {
        let exporter = self.clone();
        tokio::task::spawn_blocking(move || exporter.write(&students))
            .await
            .map_err(|err| ExportError::Task(err.to_string()))?
    }
}
