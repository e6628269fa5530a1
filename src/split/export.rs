// Writing partitions to workbooks.

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::split::io_common::{sanitize, FileNames, SheetNames};
use crate::split::io_excel::to_excel_serial;
use crate::split::*;

/// The names shared by all the workbooks of one export.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ExportSettings {
    pub primary_sheet: String,
    pub secondary_sheet: String,
    pub status_column: String,
    pub join_key: String,
}

impl Default for ExportSettings {
    fn default() -> ExportSettings {
        ExportSettings {
            primary_sheet: "Iniciativas".to_string(),
            secondary_sheet: "Sintesis Evaluativa".to_string(),
            status_column: "Estado".to_string(),
            join_key: "ID".to_string(),
        }
    }
}

/// The outcome of an export. Files are written independently: a failure is
/// recorded against its partition and the other partitions are still written.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    /// (partition, error message)
    pub failures: Vec<(String, String)>,
    pub reconciled: Vec<ReconciledPair>,
}

impl ExportReport {
    pub fn success_count(&self) -> usize {
        self.written.len()
    }
}

fn write_sheet(ws: &mut Worksheet, table: &Table, date_format: &Format) -> Result<(), XlsxError> {
    for (col, name) in table.columns().iter().enumerate() {
        let col = u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)?;
        ws.write_string(0, col, name)?;
    }
    for (r, row) in table.rows().iter().enumerate() {
        let r = u32::try_from(r + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
        for (c, cell) in row.iter().enumerate() {
            let c = u16::try_from(c).map_err(|_| XlsxError::RowColumnLimitError)?;
            match cell {
                Cell::Missing => {}
                Cell::Text(s) => {
                    ws.write_string(r, c, s)?;
                }
                Cell::Number(n) => {
                    ws.write_number(r, c, *n)?;
                }
                Cell::Bool(b) => {
                    ws.write_boolean(r, c, *b)?;
                }
                Cell::Date(d) => match to_excel_serial(d) {
                    Some(serial) => {
                        ws.write_number_with_format(r, c, serial, date_format)?;
                    }
                    None => {
                        ws.write_string(r, c, cell.to_label())?;
                    }
                },
            }
        }
    }
    Ok(())
}

/// Writes one workbook with the given sheets, in order.
pub fn write_workbook(path: &Path, sheets: &[(String, Table)]) -> SplitResult<()> {
    let p = path.display().to_string();
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    for (name, table) in sheets.iter() {
        let ws = workbook
            .add_worksheet()
            .set_name(name)
            .context(WritingExcelSnafu { path: p.clone() })?;
        write_sheet(ws, table, &date_format).context(WritingExcelSnafu { path: p.clone() })?;
    }
    workbook.save(path).context(WritingExcelSnafu { path: p.clone() })?;
    debug!("write_workbook: {:?}: {} sheet(s)", p, sheets.len());
    Ok(())
}

/// One table per distinct non-blank value of `column`, in first-occurrence
/// order. Nothing if the column does not exist.
pub fn status_slices(table: &Table, column: &str) -> Vec<(String, Table)> {
    let idx = match table.column_index(column) {
        Some(idx) => idx,
        None => return Vec::new(),
    };
    let mut seen: HashSet<CellKey> = HashSet::new();
    let mut res: Vec<(String, Table)> = Vec::new();
    for cell in table.column_values(idx) {
        if cell.is_blank() {
            continue;
        }
        if let Some(k) = cell.key() {
            if seen.insert(k.clone()) {
                let slice = table.filter_rows(|row| row[idx].key().as_ref() == Some(&k));
                res.push((cell.to_label(), slice));
            }
        }
    }
    res
}

/// The sheets of the workbook of one partition: the primary rows, the
/// reconciled secondary rows if any, then both again split by status.
pub fn partition_sheets(
    primary: &Table,
    secondary: Option<&Table>,
    settings: &ExportSettings,
) -> Vec<(String, Table)> {
    let mut names = SheetNames::new();
    let mut res: Vec<(String, Table)> = vec![(names.unique(&settings.primary_sheet), primary.clone())];
    if let Some(s) = secondary {
        res.push((names.unique(&settings.secondary_sheet), s.clone()));
    }
    for (status, t) in status_slices(primary, &settings.status_column) {
        let name = names.unique(&format!("{} ({})", settings.primary_sheet, sanitize(&status)));
        res.push((name, t));
    }
    if let Some(s) = secondary {
        for (status, t) in status_slices(s, &settings.status_column) {
            let name = names.unique(&format!("{} ({})", settings.secondary_sheet, sanitize(&status)));
            res.push((name, t));
        }
    }
    res
}

fn ensure_dir(path: &Path) -> SplitResult<()> {
    fs::create_dir_all(path).context(CreatingDirSnafu {
        path: path.display().to_string(),
    })
}

fn remove_if_empty(path: &Path) {
    let empty = fs::read_dir(path)
        .map(|mut d| d.next().is_none())
        .unwrap_or(false);
    if empty {
        debug!("remove_if_empty: removing {:?}", path);
        if let Err(e) = fs::remove_dir(path) {
            warn!("Could not remove empty directory {:?}: {}", path, e);
        }
    }
}

struct Leaf<'a> {
    unit: &'a str,
    sub_unit: &'a str,
    table: &'a Table,
    dir: PathBuf,
}

fn export_leaves(
    leaves: Vec<Leaf<'_>>,
    secondary: Option<&Table>,
    settings: &ExportSettings,
    diagnostics: &mut Diagnostics,
) -> ExportReport {
    let mut report = ExportReport::default();
    let mut files = FileNames::new();
    for leaf in leaves {
        let label = if leaf.unit == leaf.sub_unit {
            leaf.unit.to_string()
        } else {
            format!("{} / {}", leaf.unit, leaf.sub_unit)
        };
        diagnostics.info(format!("Processing {}", label));
        let reconciled = secondary.map(|s| reconcile(leaf.table, s, &settings.join_key, diagnostics));
        let file_name = files.unique(leaf.sub_unit);
        if file_name != sanitize(leaf.sub_unit) {
            diagnostics.warn(format!(
                "  {}: the file name is already taken, writing {}.xlsx",
                label, file_name
            ));
        }
        let path = leaf.dir.join(format!("{}.xlsx", file_name));
        let sheets = partition_sheets(leaf.table, reconciled.as_ref(), settings);
        match ensure_dir(&leaf.dir).and_then(|_| write_workbook(&path, &sheets)) {
            Ok(()) => {
                diagnostics.info(format!("  File written: {}", path.display()));
                report.written.push(path);
            }
            Err(e) => {
                diagnostics.error(format!("  {}: {}", label, e));
                report.failures.push((label, e.to_string()));
            }
        }
        if let Some(table) = reconciled {
            report.reconciled.push(ReconciledPair {
                unit: leaf.unit.to_string(),
                sub_unit: leaf.sub_unit.to_string(),
                table,
            });
        }
    }
    report
}

/// Writes one workbook per selected unit: `<root>/<unit>.xlsx`.
pub fn export_units(
    groups: &[UnitGroup],
    selection: &Selection,
    secondary: Option<&Table>,
    settings: &ExportSettings,
    root: &Path,
    diagnostics: &mut Diagnostics,
) -> ExportReport {
    let root_existed = root.exists();
    let leaves: Vec<Leaf> = groups
        .iter()
        .filter(|g| selection.includes_unit(&g.label))
        .map(|g| Leaf {
            unit: &g.label,
            sub_unit: &g.label,
            table: &g.table,
            dir: root.to_path_buf(),
        })
        .collect();
    let report = export_leaves(leaves, secondary, settings, diagnostics);
    if !root_existed {
        remove_if_empty(root);
    }
    diagnostics.info(format!("{} file(s) written", report.success_count()));
    report
}

/// Writes one workbook per selected sub-unit: `<root>/<unit>/<sub-unit>.xlsx`.
/// A unit folder left empty is removed.
pub fn export_sub_units(
    partition: &Partition,
    selection: &Selection,
    secondary: Option<&Table>,
    settings: &ExportSettings,
    root: &Path,
    diagnostics: &mut Diagnostics,
) -> ExportReport {
    let root_existed = root.exists();
    let selected = partition.select(selection);
    let mut report = ExportReport::default();
    let mut folders = FileNames::new();
    for unit in selected.units.iter() {
        let dir = root.join(folders.unique(&unit.label));
        let dir_existed = dir.exists();
        let leaves: Vec<Leaf> = unit
            .sub_units()
            .into_iter()
            .map(|(sub_unit, table)| Leaf {
                unit: &unit.label,
                sub_unit,
                table,
                dir: dir.clone(),
            })
            .collect();
        let r = export_leaves(leaves, secondary, settings, diagnostics);
        report.written.extend(r.written);
        report.failures.extend(r.failures);
        report.reconciled.extend(r.reconciled);
        if !dir_existed {
            remove_if_empty(&dir);
        }
    }
    if !root_existed {
        remove_if_empty(root);
    }
    diagnostics.info(format!("{} file(s) written", report.success_count()));
    report
}

/// Writes a joined table as `<root>/<name>.xlsx`, with one more sheet per
/// status.
pub fn export_union(
    table: &Table,
    name: &str,
    settings: &ExportSettings,
    root: &Path,
    diagnostics: &mut Diagnostics,
) -> ExportReport {
    let mut report = ExportReport::default();
    let mut names = SheetNames::new();
    let mut sheets: Vec<(String, Table)> = vec![(names.unique("Dataset Unificado"), table.clone())];
    // after a join, the primary status column may carry a suffix
    let status_column = if table.has_column(&settings.status_column) {
        settings.status_column.clone()
    } else {
        format!("{}_x", settings.status_column)
    };
    let slices = status_slices(table, &status_column);
    diagnostics.info(format!(
        "Joined table: {} rows, {} columns, {} status(es)",
        table.num_rows(),
        table.num_columns(),
        slices.len()
    ));
    for (status, t) in slices {
        sheets.push((names.unique(&format!("Dataset ({})", sanitize(&status))), t));
    }
    let path = root.join(format!("{}.xlsx", sanitize(name)));
    match ensure_dir(root).and_then(|_| write_workbook(&path, &sheets)) {
        Ok(()) => {
            diagnostics.info(format!("File written: {}", path.display()));
            report.written.push(path);
        }
        Err(e) => {
            diagnostics.error(format!("{}: {}", name, e));
            report.failures.push((name.to_string(), e.to_string()));
        }
    }
    report
}
