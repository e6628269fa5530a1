// Primitives for reading spreadsheet workbooks.

use calamine::{open_workbook_auto, DataType, Range, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::split::*;

fn excel_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

/// Converts a workbook date serial (days since 1899-12-30) to a date,
/// rounded to the millisecond.
pub fn from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !(0.0..2_958_466.0).contains(&serial) {
        return None;
    }
    let ms = (serial * 86_400_000.0).round() as i64;
    excel_epoch()?.checked_add_signed(Duration::milliseconds(ms))
}

pub fn to_excel_serial(date: &NaiveDateTime) -> Option<f64> {
    let delta = *date - excel_epoch()?;
    Some(delta.num_milliseconds() as f64 / 86_400_000.0)
}

pub fn read_cell(cell: &DataType) -> Cell {
    match cell {
        DataType::String(s) => Cell::Text(s.clone()),
        DataType::Float(f) => Cell::Number(*f),
        DataType::Int(i) => Cell::Number(*i as f64),
        DataType::Bool(b) => Cell::Bool(*b),
        DataType::DateTime(f) => from_excel_serial(*f)
            .map(Cell::Date)
            .unwrap_or(Cell::Number(*f)),
        _ => Cell::Missing,
    }
}

fn header_cell(cell: &DataType) -> Option<String> {
    match read_cell(cell) {
        Cell::Missing => None,
        c => Some(c.to_label()),
    }
}

fn get_range(path: &str, worksheet_name_o: Option<&str>) -> SplitResult<Range<DataType>> {
    debug!(
        "read_excel_table: path: {:?} worksheet: {:?}",
        &path, &worksheet_name_o
    );
    let mut workbook = open_workbook_auto(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(worksheet_name) = worksheet_name_o {
        let wrange = workbook
            .worksheet_range(worksheet_name)
            .context(MissingWorksheetSnafu {
                name: worksheet_name,
                path,
            })?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    } else {
        workbook
            .worksheet_range_at(0)
            .context(EmptyInputSnafu { path })?
            .context(OpeningExcelSnafu { path })
    }
}

/// Reads one worksheet as a table. The header is read from row `header_row`
/// (from 0), the rows above it are ignored, and so are the rows without any
/// value.
pub fn read_excel_table(
    path: &str,
    worksheet_name: Option<&str>,
    header_row: usize,
) -> SplitResult<Table> {
    let wrange = get_range(path, worksheet_name)?;
    let mut iter = wrange.rows().skip(header_row);
    let header = iter.next().context(EmptyInputSnafu { path })?;
    let header: Vec<Option<String>> = header.iter().map(header_cell).collect();
    debug!("read_excel_table: header: {:?}", header);

    let mut builder = TableBuilder::new(&header);
    for (idx, row) in iter.enumerate() {
        let cells: Vec<Cell> = row.iter().map(read_cell).collect();
        if cells.iter().all(|c| c.is_blank()) {
            debug!("read_excel_table: skipping empty row {}", idx + header_row + 1);
            continue;
        }
        builder.add_row(cells).context(TableShapeSnafu {})?;
    }
    let table = builder.build();
    info!(
        "read_excel_table: {:?}: {} rows, {} columns",
        simplify_file_name(path),
        table.num_rows(),
        table.num_columns()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    #[test]
    fn serial_dates() {
        let d = from_excel_serial(45292.5).unwrap();
        assert_eq!(d.to_string(), "2024-01-01 12:00:00");
        assert_eq!(to_excel_serial(&d), Some(45292.5));
        assert_eq!(from_excel_serial(-1.0), None);
        assert_eq!(read_cell(&DataType::Int(3)), Cell::Number(3.0));
        assert_eq!(read_cell(&DataType::Empty), Cell::Missing);
    }

    #[test]
    fn reads_sheet_with_header_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registro.xlsx");
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet().set_name("Datos").unwrap();
        ws.write_string(0, 0, "Formulario de registro").unwrap();
        ws.write_string(1, 0, "ID").unwrap();
        ws.write_string(1, 1, "Sede").unwrap();
        ws.write_string(1, 2, "Sede").unwrap();
        ws.write_number(2, 0, 1.0).unwrap();
        ws.write_string(2, 1, "Norte").unwrap();
        ws.write_number(4, 0, 2.0).unwrap();
        ws.write_string(4, 2, "Sur").unwrap();
        wb.save(&path).unwrap();
        let p = path.display().to_string();

        let t = read_excel_table(&p, Some("Datos"), 1).unwrap();
        assert_eq!(t.columns(), &["ID", "Sede", "Sede.1"]);
        assert_eq!(t.num_rows(), 2);
        assert_eq!(t.cell(1, "Sede.1"), Some(&Cell::Text("Sur".to_string())));
        assert_eq!(t.cell(0, "ID"), Some(&Cell::Number(1.0)));

        assert!(matches!(
            read_excel_table(&p, Some("Otra"), 0),
            Err(SplitError::MissingWorksheet { .. })
        ));
        assert!(matches!(
            read_excel_table(&p, None, 10),
            Err(SplitError::EmptyInput { .. })
        ));
        assert!(matches!(
            read_excel_table("/nonexistent.xlsx", None, 0),
            Err(SplitError::OpeningExcel { .. })
        ));
    }
}
