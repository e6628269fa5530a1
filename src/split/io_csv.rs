// Primitives for reading CSV files.

use csv::ReaderBuilder;

use crate::split::*;

fn read_field(s: &str) -> Cell {
    let t = s.trim();
    if t.is_empty() {
        return Cell::Missing;
    }
    match t.parse::<f64>() {
        Ok(f) if f.is_finite() => Cell::Number(f),
        _ => Cell::Text(s.to_string()),
    }
}

/// Reads a CSV file as a table, with the header on line `header_row`
/// (from 0). Numeric fields are read as numbers, like in workbooks.
pub fn read_csv_table(path: &str, header_row: usize) -> SplitResult<Table> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(OpeningCsvSnafu { path })?;

    let mut records = reader.records().enumerate().skip(header_row);
    let (_, header_r) = records.next().context(EmptyInputSnafu { path })?;
    let header_rec = header_r.context(CsvLineParseSnafu {
        lineno: header_row + 1,
    })?;
    let header: Vec<Option<String>> = header_rec
        .iter()
        .map(|s| Some(s.to_string()).filter(|s| !s.trim().is_empty()))
        .collect();
    debug!("read_csv_table: header: {:?}", header);

    let mut builder = TableBuilder::new(&header);
    for (idx, line_r) in records {
        let lineno = idx + 1;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        let cells: Vec<Cell> = line.iter().map(read_field).collect();
        if cells.iter().all(|c| c.is_blank()) {
            continue;
        }
        builder
            .add_row(cells)
            .context(CsvLineTooLongSnafu { lineno })?;
    }
    let table = builder.build();
    info!(
        "read_csv_table: {:?}: {} rows, {} columns",
        simplify_file_name(path),
        table.num_rows(),
        table.num_columns()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_csv(content: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("evaluaciones.csv");
        fs::write(&p, content).unwrap();
        let s = p.display().to_string();
        (dir, s)
    }

    #[test]
    fn reads_numbers_and_texts() {
        let (_dir, p) = write_csv("ID,Nota,Comentario\n1,6.5,bien\n2,,\n\n007,x,\"a, b\"\n");
        let t = read_csv_table(&p, 0).unwrap();
        assert_eq!(t.columns(), &["ID", "Nota", "Comentario"]);
        assert_eq!(t.num_rows(), 3);
        assert_eq!(t.cell(0, "Nota"), Some(&Cell::Number(6.5)));
        assert_eq!(t.cell(1, "Comentario"), Some(&Cell::Missing));
        assert_eq!(t.cell(2, "ID"), Some(&Cell::Number(7.0)));
        assert_eq!(t.cell(2, "Comentario"), Some(&Cell::Text("a, b".to_string())));
    }

    #[test]
    fn header_offset_and_errors() {
        let (_dir, p) = write_csv("titulo\nID,ID\n1,2,3\n");
        assert!(matches!(
            read_csv_table(&p, 1),
            Err(SplitError::CsvLineTooLong { lineno: 3, .. })
        ));
        let (_dir2, p2) = write_csv("titulo\nID,ID,\n1,2\n");
        let t = read_csv_table(&p2, 1).unwrap();
        assert_eq!(t.columns(), &["ID", "ID.1", "Unnamed: 2"]);
        assert!(matches!(
            read_csv_table(&p2, 5),
            Err(SplitError::EmptyInput { .. })
        ));
    }
}
