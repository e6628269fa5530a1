pub use crate::config::*;

/// A builder for assembling a table out of raw spreadsheet rows.
///
/// The header is cleaned up the way spreadsheet exports expect it:
/// an empty header cell becomes `Unnamed: <position>`, and a repeated name
/// gets a `.1`, `.2`, ... suffix. Short rows are padded with missing cells and
/// blank texts are read as missing.
///
/// ```
/// use unit_partition::builder::TableBuilder;
/// # use unit_partition::TableError;
///
/// let mut builder = TableBuilder::new(&[
///     Some("ID".to_string()),
///     Some("Sede".to_string()),
///     Some("Sede".to_string()),
/// ]);
/// builder.add_row_simple(&["1", "Norte"])?;
/// let table = builder.build();
///
/// assert_eq!(table.columns(), &["ID", "Sede", "Sede.1"]);
/// assert!(table.rows()[0][2].is_missing());
/// # Ok::<(), TableError>(())
/// ```
pub struct TableBuilder {
    pub(crate) _table: Table,
}

impl TableBuilder {
    pub fn new(header: &[Option<String>]) -> TableBuilder {
        let mut columns: Vec<String> = Vec::new();
        for (idx, h) in header.iter().enumerate() {
            let base = match h {
                Some(s) if !s.trim().is_empty() => s.clone(),
                _ => format!("Unnamed: {}", idx),
            };
            let mut name = base.clone();
            let mut suffix = 1;
            while columns.contains(&name) {
                name = format!("{}.{}", base, suffix);
                suffix += 1;
            }
            columns.push(name);
        }
        TableBuilder {
            _table: Table::new(columns),
        }
    }

    /// Adds a row of texts. Empty texts are missing values.
    pub fn add_row_simple<S: AsRef<str>>(&mut self, cells: &[S]) -> Result<(), TableError> {
        self.add_row(
            cells
                .iter()
                .map(|s| Cell::Text(s.as_ref().to_string()))
                .collect(),
        )
    }

    /// Adds a row of cells.
    ///
    /// A row shorter than the header is padded with missing cells. A longer
    /// row is only accepted if the extra cells are all blank.
    pub fn add_row(&mut self, cells: Vec<Cell>) -> Result<(), TableError> {
        let width = self._table.num_columns();
        if cells.len() > width && cells[width..].iter().any(|c| !c.is_blank()) {
            return Err(TableError::RowWidth {
                expected: width,
                found: cells.len(),
            });
        }
        let mut row: Vec<Cell> = cells
            .into_iter()
            .take(width)
            .map(|c| if c.is_blank() { Cell::Missing } else { c })
            .collect();
        row.resize(width, Cell::Missing);
        self._table.push_row(row)
    }

    pub fn build(self) -> Table {
        self._table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangles_duplicate_and_empty_headers() {
        let b = TableBuilder::new(&[
            Some("A".to_string()),
            None,
            Some("A".to_string()),
            Some(" ".to_string()),
            Some("A".to_string()),
        ]);
        let t = b.build();
        assert_eq!(t.columns(), &["A", "Unnamed: 1", "A.1", "Unnamed: 3", "A.2"]);
    }

    #[test]
    fn rejects_long_rows_with_content() {
        let mut b = TableBuilder::new(&[Some("A".to_string())]);
        assert!(b.add_row_simple(&["x", ""]).is_ok());
        assert_eq!(
            b.add_row_simple(&["x", "y"]),
            Err(TableError::RowWidth { expected: 1, found: 2 })
        );
        assert_eq!(b.build().num_rows(), 1);
    }

    #[test]
    fn blank_cells_are_missing() {
        let mut b = TableBuilder::new(&[Some("A".to_string()), Some("B".to_string())]);
        b.add_row(vec![Cell::Text("   ".to_string()), Cell::Number(2.0)]).unwrap();
        let t = b.build();
        assert_eq!(t.rows()[0], vec![Cell::Missing, Cell::Number(2.0)]);
    }
}
