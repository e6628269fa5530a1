mod config;
pub mod builder;
pub mod diagnostics;
pub mod fuzzy;
pub mod manual;
pub mod reconcile;
pub mod schema;
pub mod summary;

use chrono::NaiveDate;
use log::{debug, info};

use std::collections::{BTreeSet, HashMap};

pub use crate::config::*;
pub use crate::diagnostics::{Diagnostics, Level};
pub use crate::reconcile::{left_join, reconcile, reconcile_partition};
pub use crate::schema::{
    check_columns, clean_column_name, normalize_columns, validate_table, ColumnRename, SchemaCheck,
};

// **** Units ****

/// Finds the position of the unit column. A name is looked up exactly first,
/// then with cleaned whitespace on both sides.
pub fn resolve_unit_column(table: &Table, unit_column: &UnitColumn) -> Result<usize, TableError> {
    match unit_column {
        UnitColumn::Position(p) if *p < table.num_columns() => Ok(*p),
        UnitColumn::Position(p) => Err(TableError::PositionOutOfRange {
            position: *p,
            width: table.num_columns(),
        }),
        UnitColumn::Name(name) => table
            .column_index(name)
            .or_else(|| {
                let wanted = clean_column_name(name);
                table
                    .columns()
                    .iter()
                    .position(|c| clean_column_name(c) == wanted)
            })
            .ok_or_else(|| TableError::UnknownColumn(name.clone())),
    }
}

/// The unit of a row, or None if the row is left out of the partition.
fn unit_label(cell: &Cell, policy: BlankUnitPolicy) -> Option<String> {
    match (cell.is_blank(), policy) {
        (true, BlankUnitPolicy::Sentinel) => Some(BLANK_UNIT.to_string()),
        (true, BlankUnitPolicy::Exclude) => None,
        (false, _) => Some(cell.to_label()),
    }
}

/// The distinct units of a table, sorted for display.
///
/// Labels are the raw values `partition_units` groups by, so that a listed
/// label can be selected as is. Under the sentinel policy the `EN BLANCO`
/// unit is always listed, and listed first.
pub fn list_units(table: &Table, rules: &PartitionRules) -> Result<Vec<String>, TableError> {
    let idx = resolve_unit_column(table, &rules.unit_column)?;
    let labels: BTreeSet<String> = table
        .column_values(idx)
        .filter_map(|c| unit_label(c, rules.blank_units))
        .filter(|s| s != BLANK_UNIT)
        .collect();
    let mut res: Vec<String> = Vec::new();
    if rules.blank_units == BlankUnitPolicy::Sentinel {
        res.push(BLANK_UNIT.to_string());
    }
    res.extend(labels);
    Ok(res)
}

/// Splits a table into one table per unit.
///
/// Units come in the order of their first row, rows keep their order, and
/// each unit table loses the columns that are empty for all of its rows.
pub fn partition_units(
    table: &Table,
    rules: &PartitionRules,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<UnitGroup>, TableError> {
    let idx = resolve_unit_column(table, &rules.unit_column)?;
    diagnostics.info(format!(
        "Table received: {} rows, {} columns",
        table.num_rows(),
        table.num_columns()
    ));
    diagnostics.info(format!("Unit column: {}", table.columns()[idx]));

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    let mut excluded = 0;
    for (row_idx, cell) in table.column_values(idx).enumerate() {
        match unit_label(cell, rules.blank_units) {
            Some(label) => {
                if !groups.contains_key(&label) {
                    order.push(label.clone());
                }
                groups.entry(label).or_default().push(row_idx);
            }
            None => excluded += 1,
        }
    }
    if excluded > 0 {
        diagnostics.info(format!("{} row(s) without unit left out", excluded));
    }

    let mut res: Vec<UnitGroup> = Vec::new();
    for label in order {
        let rows = groups.remove(&label).unwrap_or_default();
        let (pruned, dropped) = table.select_rows(&rows).drop_empty_columns();
        if !dropped.is_empty() {
            diagnostics.info(format!(
                "  - '{}': {} empty column(s) removed",
                label,
                dropped.len()
            ));
        }
        debug!(
            "partition_units: unit {:?}: {} rows, dropped {:?}",
            label,
            pruned.num_rows(),
            dropped
        );
        res.push(UnitGroup {
            label,
            table: pruned,
        });
    }
    diagnostics.info(format!("{} unit table(s) generated", res.len()));
    info!("partition_units: {} units from {} rows", res.len(), table.num_rows());
    Ok(res)
}

// **** Sub-units ****

/// Where the sub-unit of each row of a unit is read from.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SubUnitColumn {
    Single(usize),
    /// The primary column, unless its value is `other_value` and the
    /// companion column exists.
    WithCompanion {
        primary: usize,
        companion: Option<usize>,
        other_value: String,
    },
}

fn match_key(text: &str, strict: bool) -> String {
    if strict {
        fuzzy::normalize_strict(text)
    } else {
        fuzzy::normalize(text)
    }
}

/// Looks for the column holding the sub-units of a unit.
///
/// In order: a fixed column for units matching an override, a column whose
/// normalized name equals the normalized unit, the closest column name above
/// the cutoff. The unit column itself and the generic unit column never
/// qualify.
pub fn find_sub_unit_column(
    table: &Table,
    unit: &str,
    rules: &PartitionRules,
) -> Option<SubUnitColumn> {
    let unit_norm = fuzzy::normalize(unit);
    if let Some(o) = rules
        .overrides
        .iter()
        .find(|o| unit_norm.contains(&fuzzy::normalize(&o.unit_contains)))
    {
        debug!("find_sub_unit_column: {:?} uses override {:?}", unit, o);
        let primary = table.column_index(&o.column)?;
        return Some(SubUnitColumn::WithCompanion {
            primary,
            companion: table.column_index(&format!("{}.1", o.column)),
            other_value: o.other_value.clone(),
        });
    }

    let unit_key = match_key(unit, rules.strict_matching);
    let column_keys: Vec<String> = table
        .columns()
        .iter()
        .map(|c| match_key(c, rules.strict_matching))
        .collect();
    let found = column_keys
        .iter()
        .position(|k| *k == unit_key)
        .or_else(|| fuzzy::closest(&unit_key, &column_keys, rules.sub_unit_cutoff).map(|p| p.0))?;

    let name = &table.columns()[found];
    let unit_idx = resolve_unit_column(table, &rules.unit_column).ok();
    if name.to_lowercase() == rules.generic_unit_column.to_lowercase() || unit_idx == Some(found) {
        debug!("find_sub_unit_column: {:?} matched the unit column {:?}", unit, name);
        return None;
    }
    Some(SubUnitColumn::Single(found))
}

fn sub_unit_cell<'a>(row: &'a [Cell], column: &SubUnitColumn) -> &'a Cell {
    match column {
        SubUnitColumn::Single(idx) => &row[*idx],
        SubUnitColumn::WithCompanion {
            primary,
            companion: Some(companion),
            other_value,
        } if row[*primary].as_text().map(|s| s.trim()) == Some(other_value.as_str()) => {
            &row[*companion]
        }
        SubUnitColumn::WithCompanion { primary, .. } => &row[*primary],
    }
}

/// Splits the table of one unit by sub-unit.
///
/// Values equal under `fuzzy::normalize_strict` belong to the same sub-unit,
/// labelled by the first trimmed value seen. Missing or blank values fall
/// back to the unit itself, so no row is ever lost.
pub fn resolve_sub_units(
    group: UnitGroup,
    rules: &PartitionRules,
    diagnostics: &mut Diagnostics,
) -> UnitPartition {
    diagnostics.info(format!("Processing unit: {}", group.label));
    let column = match find_sub_unit_column(&group.table, &group.label, rules) {
        Some(c) => c,
        None => {
            diagnostics.info("  No sub-unit column, the unit is not subdivided.");
            return UnitPartition {
                label: group.label,
                children: UnitChildren::Direct(group.table),
            };
        }
    };
    let column_name = match &column {
        SubUnitColumn::Single(idx) => &group.table.columns()[*idx],
        SubUnitColumn::WithCompanion { primary, .. } => &group.table.columns()[*primary],
    };
    diagnostics.info(format!("  Sub-unit column: {}", column_name));

    // normalized value -> display label, first seen wins
    let mut labels: HashMap<String, String> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut rows_by_label: HashMap<String, Vec<usize>> = HashMap::new();
    for (row_idx, row) in group.table.rows().iter().enumerate() {
        let cell = sub_unit_cell(row, &column);
        let raw = if cell.is_missing() {
            group.label.clone()
        } else {
            cell.to_label()
        };
        let norm = fuzzy::normalize_strict(&raw);
        let label = labels
            .entry(norm)
            .or_insert_with(|| {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    group.label.clone()
                } else {
                    trimmed.to_string()
                }
            })
            .clone();
        if !rows_by_label.contains_key(&label) {
            order.push(label.clone());
        }
        rows_by_label.entry(label).or_default().push(row_idx);
    }

    let subs: Vec<SubUnit> = order
        .into_iter()
        .map(|label| {
            let rows = rows_by_label.remove(&label).unwrap_or_default();
            let (table, _) = group.table.select_rows(&rows).drop_empty_columns();
            SubUnit { label, table }
        })
        .collect();
    diagnostics.info(format!("  -> {} sub-unit(s)", subs.len()));
    UnitPartition {
        label: group.label,
        children: UnitChildren::Subdivided(subs),
    }
}

/// Runs both partitioning passes.
pub fn partition(
    table: &Table,
    rules: &PartitionRules,
    diagnostics: &mut Diagnostics,
) -> Result<Partition, TableError> {
    let groups = partition_units(table, rules, diagnostics)?;
    let units = groups
        .into_iter()
        .map(|g| resolve_sub_units(g, rules, diagnostics))
        .collect();
    Ok(Partition { units })
}

// **** Filters ****

/// Keeps the rows whose date lies within `[from, to]`, and the rows without
/// a readable date. A missing bound is open.
pub fn filter_by_date_range(
    table: &Table,
    column: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    diagnostics: &mut Diagnostics,
) -> Table {
    let idx = match table.column_index(column) {
        Some(idx) => idx,
        None => {
            diagnostics.warn(format!("No date column '{}', rows are not filtered", column));
            return table.clone();
        }
    };
    let res = table.filter_rows(|row| match row[idx].as_date() {
        None => true,
        Some(d) => from.map_or(true, |f| d >= f) && to.map_or(true, |t| d <= t),
    });
    diagnostics.info(format!(
        "Date range {:?} -> {:?}: {} of {} rows kept",
        from,
        to,
        res.num_rows(),
        table.num_rows()
    ));
    res
}
