//! Grouped data behind the summary charts of a partition.
//!
//! Nothing here renders anything: the functions return plain counts and bars
//! that a report writer can turn into tables and charts.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use crate::config::*;

/// How the values of a column are counted.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct CountOptions {
    /// Cells holding several values separated by this character are counted
    /// once per value.
    pub separator: Option<char>,
    /// Values are title-cased before counting ("norte" and "NORTE" become "Norte").
    pub title_case: bool,
}

impl CountOptions {
    pub const MULTI_VALUED: CountOptions = CountOptions {
        separator: Some(';'),
        title_case: false,
    };
}

fn title_case(s: &str) -> String {
    let mut res = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if prev_alpha {
            res.extend(c.to_lowercase());
        } else {
            res.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    res
}

fn count_values<'a, I>(cells: I, options: CountOptions) -> Vec<(String, usize)>
where
    I: Iterator<Item = &'a Cell>,
{
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for cell in cells.filter(|c| !c.is_blank()) {
        let label = cell.to_label();
        let values: Vec<&str> = match options.separator {
            Some(sep) => label.split(sep).map(|v| v.trim()).collect(),
            None => vec![label.trim()],
        };
        for v in values.into_iter().filter(|v| !v.is_empty()) {
            let v = if options.title_case {
                title_case(v)
            } else {
                v.to_string()
            };
            let n = counts.entry(v.clone()).or_insert(0);
            if *n == 0 {
                order.push(v);
            }
            *n += 1;
        }
    }
    let mut res: Vec<(String, usize)> = order
        .into_iter()
        .map(|v| {
            let n = counts.get(&v).copied().unwrap_or_default();
            (v, n)
        })
        .collect();
    // stable: equal counts keep their first-occurrence order
    res.sort_by(|a, b| b.1.cmp(&a.1));
    res
}

/// The number of rows per value of a column, most frequent first.
///
/// Blank cells are not counted. Returns None if the column does not exist.
pub fn value_counts(table: &Table, column: &str, options: CountOptions) -> Option<Vec<(String, usize)>> {
    let idx = table.column_index(column)?;
    Some(count_values(table.column_values(idx), options))
}

/// The headline numbers of a partition.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Overview {
    pub total: usize,
    pub by_status: Vec<(String, usize)>,
    pub by_campus: Vec<(String, usize)>,
}

/// Counts rows, and rows per status and per campus. An absent column gives
/// no counts.
pub fn overview(table: &Table, status_column: &str, campus_column: &str) -> Overview {
    Overview {
        total: table.num_rows(),
        by_status: value_counts(table, status_column, CountOptions::default()).unwrap_or_default(),
        by_campus: value_counts(table, campus_column, CountOptions::default()).unwrap_or_default(),
    }
}

/// Value counts of `value_column` for every value of `group_column`, groups
/// sorted by name. Groups without any value are skipped.
pub fn counts_by_group(
    table: &Table,
    group_column: &str,
    value_column: &str,
    options: CountOptions,
) -> Option<Vec<(String, Vec<(String, usize)>)>> {
    let g_idx = table.column_index(group_column)?;
    let v_idx = table.column_index(value_column)?;
    let mut groups: BTreeMap<String, Vec<&Cell>> = BTreeMap::new();
    for row in table.rows() {
        if row[g_idx].is_blank() {
            continue;
        }
        groups.entry(row[g_idx].to_label()).or_default().push(&row[v_idx]);
    }
    Some(
        groups
            .into_iter()
            .map(|(g, cells)| (g, count_values(cells.into_iter(), options)))
            .filter(|(_, counts)| !counts.is_empty())
            .collect(),
    )
}

/// One bar of a participation timeline.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TimelineBar {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimelineBar {
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// The rows having both dates, as bars sorted by start date.
///
/// Bars are labelled by `label_column` when the table has it, by their
/// position (from 1) otherwise. Returns None if a date column is absent.
pub fn timeline(
    table: &Table,
    start_column: &str,
    end_column: &str,
    label_column: &str,
) -> Option<Vec<TimelineBar>> {
    let s_idx = table.column_index(start_column)?;
    let e_idx = table.column_index(end_column)?;
    let l_idx = table.column_index(label_column);
    let mut bars: Vec<(NaiveDate, NaiveDate, String)> = table
        .rows()
        .iter()
        .filter_map(|row| {
            let start = row[s_idx].as_date()?;
            let end = row[e_idx].as_date()?;
            let label = l_idx.map(|i| row[i].to_label()).unwrap_or_default();
            Some((start, end, label))
        })
        .collect();
    bars.sort_by_key(|b| b.0);
    Some(
        bars.into_iter()
            .enumerate()
            .map(|(pos, (start, end, label))| TimelineBar {
                label: if l_idx.is_some() {
                    label
                } else {
                    (pos + 1).to_string()
                },
                start,
                end,
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TableBuilder;

    fn make(header: &[&str], rows: &[&[&str]]) -> Table {
        let h: Vec<Option<String>> = header.iter().map(|s| Some(s.to_string())).collect();
        let mut b = TableBuilder::new(&h);
        for r in rows {
            b.add_row_simple(*r).unwrap();
        }
        b.build()
    }

    fn pairs(v: &[(&str, usize)]) -> Vec<(String, usize)> {
        v.iter().map(|(s, n)| (s.to_string(), *n)).collect()
    }

    #[test]
    fn counts_split_multi_valued_cells() {
        let t = make(
            &["Sede"],
            &[&["norte; SUR"], &["Sur"], &[""], &["centro;"], &["Norte"]],
        );
        let opts = CountOptions {
            separator: Some(';'),
            title_case: true,
        };
        assert_eq!(
            value_counts(&t, "Sede", opts),
            Some(pairs(&[("Norte", 2), ("Sur", 2), ("Centro", 1)]))
        );
        assert_eq!(
            value_counts(&t, "Sede", CountOptions::default()),
            Some(pairs(&[
                ("norte; SUR", 1),
                ("Sur", 1),
                ("centro;", 1),
                ("Norte", 1)
            ]))
        );
        assert_eq!(value_counts(&t, "Nope", opts), None);
    }

    #[test]
    fn overview_counts() {
        let t = make(
            &["ID", "Estado"],
            &[&["1", "Activa"], &["2", "Cerrada"], &["3", "Activa"], &["4", ""]],
        );
        let o = overview(&t, "Estado", "Sede");
        assert_eq!(o.total, 4);
        assert_eq!(o.by_status, pairs(&[("Activa", 2), ("Cerrada", 1)]));
        assert!(o.by_campus.is_empty());
    }

    #[test]
    fn counts_per_group() {
        let t = make(
            &["Tipo", "Ámbitos"],
            &[
                &["Socio", "Salud;Educación"],
                &["Docente", "Salud"],
                &["Socio", "Salud"],
                &["", "Cultura"],
                &["Alumno", ""],
            ],
        );
        let res = counts_by_group(&t, "Tipo", "Ámbitos", CountOptions::MULTI_VALUED).unwrap();
        assert_eq!(
            res,
            vec![
                ("Docente".to_string(), pairs(&[("Salud", 1)])),
                ("Socio".to_string(), pairs(&[("Salud", 2), ("Educación", 1)])),
            ]
        );
    }

    #[test]
    fn timeline_drops_undated_rows_and_sorts() {
        let t = make(
            &["Id", "Inicio", "Fin"],
            &[
                &["a", "2024-03-01", "2024-03-10"],
                &["b", "2024-01-05", "2024-02-01"],
                &["c", "", "2024-02-01"],
                &["d", "2024-02-01", "later"],
            ],
        );
        let bars = timeline(&t, "Inicio", "Fin", "Id").unwrap();
        let labels: Vec<&str> = bars.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "a"]);
        assert_eq!(bars[1].days(), 9);

        let numbered = timeline(&t, "Inicio", "Fin", "Nombre").unwrap();
        let labels: Vec<&str> = numbered.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["1", "2"]);
        assert!(timeline(&t, "Inicio", "Nope", "Id").is_none());
    }

    #[test]
    fn title_case_like_spreadsheets() {
        assert_eq!(title_case("san JOSÉ de-la mar"), "San José De-La Mar");
    }
}
