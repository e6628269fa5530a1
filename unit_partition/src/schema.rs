use log::debug;
use std::collections::BTreeSet;

use crate::config::*;
use crate::diagnostics::Diagnostics;

/// Collapses every whitespace run of a column name to one space and trims it.
pub fn clean_column_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Renames the column at `index` (0-based) to `value`.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnRename {
    pub index: usize,
    pub value: String,
}

/// The differences between the columns of a table and the expected ones.
/// Both lists are sorted.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SchemaCheck {
    pub missing: Vec<String>,
    pub extra: Vec<String>,
}

impl SchemaCheck {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Compares two column sets after whitespace cleaning. Order does not
/// matter, case does.
pub fn check_columns<S, T>(actual: &[S], expected: &[T]) -> SchemaCheck
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    let actual: BTreeSet<String> = actual.iter().map(|c| clean_column_name(c.as_ref())).collect();
    let expected: BTreeSet<String> = expected
        .iter()
        .map(|c| clean_column_name(c.as_ref()))
        .collect();
    SchemaCheck {
        missing: expected.difference(&actual).cloned().collect(),
        extra: actual.difference(&expected).cloned().collect(),
    }
}

/// Checks the columns of a table and records every missing or extra column.
pub fn validate_table<T: AsRef<str>>(
    table: &Table,
    expected: &[T],
    diagnostics: &mut Diagnostics,
) -> SchemaCheck {
    let check = check_columns(table.columns(), expected);
    diagnostics.info(format!(
        "Comparing columns: {} in the file, {} expected",
        table.num_columns(),
        expected.len()
    ));
    if !check.missing.is_empty() {
        diagnostics.warn("Missing columns:");
        for c in check.missing.iter() {
            diagnostics.warn(format!("   - {}", c));
        }
    }
    if !check.extra.is_empty() {
        diagnostics.warn("Unexpected columns:");
        for c in check.extra.iter() {
            diagnostics.warn(format!("   - {}", c));
        }
    }
    if check.is_valid() {
        diagnostics.info("The file has the expected structure.");
    } else {
        diagnostics.error("The file does not have the expected structure.");
    }
    check
}

/// Cleans all the column names, then applies the positional renames.
/// Positions past the last column are skipped.
///
/// Returns the number of renamed columns.
pub fn normalize_columns(
    table: &mut Table,
    renames: &[ColumnRename],
    diagnostics: &mut Diagnostics,
) -> usize {
    let cleaned: Vec<String> = table.columns().iter().map(|c| clean_column_name(c)).collect();
    for (idx, name) in cleaned.iter().enumerate() {
        // The index always exists: it comes from the table itself.
        let _ = table.rename_column(idx, name);
    }
    let mut renamed = 0;
    for r in renames.iter() {
        match table.rename_column(r.index, &r.value) {
            Ok(()) => renamed += 1,
            Err(e) => debug!("normalize_columns: skipping rename {:?}: {}", r, e),
        }
    }
    diagnostics.info(format!("Columns cleaned, {} renamed", renamed));
    renamed
}
