// ********* Input data structures ***********

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use std::error::Error;
use std::fmt::Display;

/// The label given to rows whose unit is null or blank.
pub const BLANK_UNIT: &str = "EN BLANCO";

/// A single untyped spreadsheet value.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Missing,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Missing, or a text made only of whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Reads a date from a date cell, or from a text in one of the usual
    /// day-first or ISO layouts.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(d.date()),
            Cell::Text(s) => {
                let s = s.trim();
                for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
                    if let Ok(d) = NaiveDateTime::parse_from_str(s, fmt) {
                        return Some(d.date());
                    }
                }
                ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d"]
                    .iter()
                    .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
            }
            _ => None,
        }
    }

    /// The hashable identity of a value, used by joins and membership tests.
    /// Missing values have no identity.
    pub fn key(&self) -> Option<CellKey> {
        match self {
            Cell::Missing => None,
            Cell::Text(s) => Some(CellKey::Text(s.clone())),
            // -0.0 and 0.0 are the same identifier
            Cell::Number(n) if *n == 0.0 => Some(CellKey::Number(0f64.to_bits())),
            Cell::Number(n) => Some(CellKey::Number(n.to_bits())),
            Cell::Bool(b) => Some(CellKey::Bool(*b)),
            Cell::Date(d) => Some(CellKey::Date(*d)),
        }
    }

    /// The string form used for labels, sheet names and file names.
    pub fn to_label(&self) -> String {
        match self {
            Cell::Missing => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => format!("{}", n),
            Cell::Bool(b) => format!("{}", b),
            Cell::Date(d) if d.num_seconds_from_midnight() == 0 && d.nanosecond() == 0 => {
                d.date().to_string()
            }
            Cell::Date(d) => d.to_string(),
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_label())
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum CellKey {
    Text(String),
    Number(u64),
    Bool(bool),
    Date(NaiveDateTime),
}

/// A table with named columns and untyped cells.
///
/// Tables are values: every operation that selects rows or columns returns a
/// fresh copy that shares nothing with its source.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Table {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    /// A table without columns nor rows.
    pub fn empty() -> Table {
        Table::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// The position of the first column with exactly this name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |r| &r[idx])
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn rename_column(&mut self, idx: usize, name: &str) -> Result<(), TableError> {
        let width = self.columns.len();
        let col = self
            .columns
            .get_mut(idx)
            .ok_or(TableError::PositionOutOfRange {
                position: idx,
                width,
            })?;
        *col = name.to_string();
        Ok(())
    }

    /// Copies the given rows, in the given order, into a new table.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|i| self.rows.get(*i).cloned())
                .collect(),
        }
    }

    pub fn filter_rows<F>(&self, keep: F) -> Table
    where
        F: Fn(&[Cell]) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Drops every column whose cells are all missing.
    ///
    /// Returns the pruned table and the names of the dropped columns.
    /// A table without rows loses all its columns.
    pub fn drop_empty_columns(&self) -> (Table, Vec<String>) {
        let keep: Vec<bool> = (0..self.columns.len())
            .map(|idx| self.column_values(idx).any(|c| !c.is_missing()))
            .collect();
        let dropped: Vec<String> = self
            .columns
            .iter()
            .zip(keep.iter())
            .filter(|(_, k)| !**k)
            .map(|(c, _)| c.clone())
            .collect();
        let columns: Vec<String> = self
            .columns
            .iter()
            .zip(keep.iter())
            .filter(|(_, k)| **k)
            .map(|(c, _)| c.clone())
            .collect();
        let rows: Vec<Vec<Cell>> = self
            .rows
            .iter()
            .map(|r| {
                r.iter()
                    .zip(keep.iter())
                    .filter(|(_, k)| **k)
                    .map(|(c, _)| c.clone())
                    .collect()
            })
            .collect();
        (Table { columns, rows }, dropped)
    }
}

/// Errors raised when a table is accessed with an inconsistent shape.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TableError {
    RowWidth { expected: usize, found: usize },
    UnknownColumn(String),
    PositionOutOfRange { position: usize, width: usize },
}

impl Error for TableError {}

impl Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableError::RowWidth { expected, found } => {
                write!(f, "row has {} cells, the table has {} columns", found, expected)
            }
            TableError::UnknownColumn(name) => write!(f, "unknown column {:?}", name),
            TableError::PositionOutOfRange { position, width } => write!(
                f,
                "column position {} is out of range for a table of {} columns",
                position, width
            ),
        }
    }
}

// ******** Output data structures *********

/// One unit and its rows, as produced by the first partitioning pass.
#[derive(PartialEq, Debug, Clone)]
pub struct UnitGroup {
    pub label: String,
    pub table: Table,
}

#[derive(PartialEq, Debug, Clone)]
pub struct SubUnit {
    pub label: String,
    pub table: Table,
}

/// The children of a unit: either its whole table, when no sub-unit column
/// could be resolved, or one table per sub-unit.
#[derive(PartialEq, Debug, Clone)]
pub enum UnitChildren {
    Direct(Table),
    Subdivided(Vec<SubUnit>),
}

#[derive(PartialEq, Debug, Clone)]
pub struct UnitPartition {
    pub label: String,
    pub children: UnitChildren,
}

impl UnitPartition {
    /// The (sub-unit label, table) pairs of this unit.
    /// A unit without sub-units yields itself as its single sub-unit.
    pub fn sub_units(&self) -> Vec<(&str, &Table)> {
        match &self.children {
            UnitChildren::Direct(t) => vec![(self.label.as_str(), t)],
            UnitChildren::Subdivided(subs) => subs
                .iter()
                .map(|s| (s.label.as_str(), &s.table))
                .collect(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.sub_units().iter().map(|(_, t)| t.num_rows()).sum()
    }
}

/// A flattened view of one leaf of a partition.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct PartitionEntry<'a> {
    pub unit: &'a str,
    pub sub_unit: &'a str,
    pub table: &'a Table,
}

/// The two-level hierarchy unit -> sub-unit, in first-occurrence order.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Partition {
    pub units: Vec<UnitPartition>,
}

impl Partition {
    pub fn get(&self, unit: &str) -> Option<&UnitPartition> {
        self.units.iter().find(|u| u.label == unit)
    }

    pub fn entries(&self) -> Vec<PartitionEntry<'_>> {
        self.units
            .iter()
            .flat_map(|u| {
                u.sub_units()
                    .into_iter()
                    .map(move |(sub_unit, table)| PartitionEntry {
                        unit: u.label.as_str(),
                        sub_unit,
                        table,
                    })
            })
            .collect()
    }

    /// The sub-unit labels of every unit, as shown by selection screens.
    pub fn hierarchy(&self) -> Vec<(String, Vec<String>)> {
        self.units
            .iter()
            .map(|u| {
                (
                    u.label.clone(),
                    u.sub_units().iter().map(|(s, _)| s.to_string()).collect(),
                )
            })
            .collect()
    }

    /// Keeps only the selected units and sub-units.
    /// Units left without any sub-unit are removed.
    pub fn select(&self, selection: &Selection) -> Partition {
        let mut units: Vec<UnitPartition> = Vec::new();
        for u in self.units.iter() {
            if !selection.includes_unit(&u.label) {
                continue;
            }
            match &u.children {
                UnitChildren::Direct(_) => {
                    if selection.includes(&u.label, &u.label) {
                        units.push(u.clone());
                    }
                }
                UnitChildren::Subdivided(subs) => {
                    let kept: Vec<SubUnit> = subs
                        .iter()
                        .filter(|s| selection.includes(&u.label, &s.label))
                        .cloned()
                        .collect();
                    if !kept.is_empty() {
                        units.push(UnitPartition {
                            label: u.label.clone(),
                            children: UnitChildren::Subdivided(kept),
                        });
                    }
                }
            }
        }
        Partition { units }
    }
}

/// A filtered slice of the secondary table for one (unit, sub-unit) key.
#[derive(PartialEq, Debug, Clone)]
pub struct ReconciledPair {
    pub unit: String,
    pub sub_unit: String,
    pub table: Table,
}

/// The user's choice of what to export.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Selection {
    All,
    Units(Vec<String>),
    SubUnits(Vec<(String, String)>),
}

impl Selection {
    pub fn includes_unit(&self, unit: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Units(us) => us.iter().any(|u| u == unit),
            Selection::SubUnits(pairs) => pairs.iter().any(|(u, _)| u == unit),
        }
    }

    pub fn includes(&self, unit: &str, sub_unit: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Units(us) => us.iter().any(|u| u == unit),
            Selection::SubUnits(pairs) => pairs.iter().any(|(u, s)| u == unit && s == sub_unit),
        }
    }
}

// ********* Configuration **********

/// How rows with a null or blank unit are treated.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum BlankUnitPolicy {
    /// The rows are gathered under the `EN BLANCO` unit.
    Sentinel,
    /// The rows are left out of the partition.
    Exclude,
}

/// Where the unit of a row is read from.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum UnitColumn {
    Position(usize),
    Name(String),
}

/// A unit whose sub-units always live in a fixed column.
///
/// When the value of `column` is `other_value` and a `<column>.1` companion
/// column exists, the companion value is used for that row instead.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SubUnitOverride {
    /// Matched against the normalized unit label.
    pub unit_contains: String,
    pub column: String,
    pub other_value: String,
}

#[derive(PartialEq, Debug, Clone)]
pub struct PartitionRules {
    pub unit_column: UnitColumn,
    pub blank_units: BlankUnitPolicy,
    /// Minimum similarity for a column name to be taken as a sub-unit column.
    pub sub_unit_cutoff: f64,
    /// Strip plural suffixes before matching unit labels against column names.
    pub strict_matching: bool,
    /// A resolved column with this name (case-insensitive) never subdivides.
    pub generic_unit_column: String,
    pub overrides: Vec<SubUnitOverride>,
}

impl Default for PartitionRules {
    fn default() -> PartitionRules {
        PartitionRules {
            unit_column: UnitColumn::Name("Dependencia".to_string()),
            blank_units: BlankUnitPolicy::Sentinel,
            sub_unit_cutoff: 0.6,
            strict_matching: false,
            generic_unit_column: "Dependencia".to_string(),
            overrides: Vec::new(),
        }
    }
}
