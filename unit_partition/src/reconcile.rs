use log::{debug, warn};
use std::collections::{HashMap, HashSet};

use crate::config::*;
use crate::diagnostics::Diagnostics;

/// The rows of `secondary` whose key appears among the non-missing keys of
/// `primary`, in the order of `secondary`.
///
/// Every matching row is kept, duplicated keys included. If either table has
/// no `key` column, the result is an empty table and a warning is recorded.
pub fn reconcile(
    primary: &Table,
    secondary: &Table,
    key: &str,
    diagnostics: &mut Diagnostics,
) -> Table {
    let (p_idx, s_idx) = match (primary.column_index(key), secondary.column_index(key)) {
        (Some(p), Some(s)) => (p, s),
        (p, s) => {
            let side = match (p, s) {
                (None, None) => "both tables",
                (None, _) => "the primary table",
                _ => "the secondary table",
            };
            diagnostics.warn(format!("Column '{}' not found in {}", key, side));
            warn!("reconcile: join key {:?} missing in {}", key, side);
            return Table::empty();
        }
    };
    let ids: HashSet<CellKey> = primary.column_values(p_idx).filter_map(|c| c.key()).collect();
    let res = secondary.filter_rows(|row| match row[s_idx].key() {
        Some(k) => ids.contains(&k),
        None => false,
    });
    debug!(
        "reconcile: {} distinct ids, {} of {} secondary rows",
        ids.len(),
        res.num_rows(),
        secondary.num_rows()
    );
    res
}

/// Reconciles the secondary table against every leaf of a partition.
///
/// Membership is computed per leaf, never for the whole partition at once.
pub fn reconcile_partition(
    partition: &Partition,
    secondary: &Table,
    key: &str,
    diagnostics: &mut Diagnostics,
) -> Vec<ReconciledPair> {
    partition
        .entries()
        .into_iter()
        .map(|e| {
            let table = reconcile(e.table, secondary, key, diagnostics);
            diagnostics.info(format!(
                "  {} / {}: {} secondary row(s)",
                e.unit,
                e.sub_unit,
                table.num_rows()
            ));
            ReconciledPair {
                unit: e.unit.to_string(),
                sub_unit: e.sub_unit.to_string(),
                table,
            }
        })
        .collect()
}

/// Keeps every row of `left` and appends the non-key columns of `right` for
/// the rows sharing the same key.
///
/// A left row matching several right rows is repeated once per match. A
/// column name present on both sides is suffixed `_x` (left) and `_y`
/// (right). Missing keys never match.
pub fn left_join(left: &Table, right: &Table, key: &str) -> Result<Table, TableError> {
    let l_idx = left
        .column_index(key)
        .ok_or_else(|| TableError::UnknownColumn(key.to_string()))?;
    let r_idx = right
        .column_index(key)
        .ok_or_else(|| TableError::UnknownColumn(key.to_string()))?;

    let right_cols: Vec<usize> = (0..right.num_columns()).filter(|i| *i != r_idx).collect();
    let overlaps = |name: &str, other: &Table, skip: usize| {
        other
            .columns()
            .iter()
            .enumerate()
            .any(|(i, c)| i != skip && c == name)
    };
    let mut columns: Vec<String> = left
        .columns()
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i != l_idx && overlaps(c.as_str(), right, r_idx) {
                format!("{}_x", c)
            } else {
                c.clone()
            }
        })
        .collect();
    for i in right_cols.iter() {
        let c = &right.columns()[*i];
        if overlaps(c.as_str(), left, l_idx) {
            columns.push(format!("{}_y", c));
        } else {
            columns.push(c.clone());
        }
    }

    let mut by_key: HashMap<CellKey, Vec<usize>> = HashMap::new();
    for (row_idx, cell) in right.column_values(r_idx).enumerate() {
        if let Some(k) = cell.key() {
            by_key.entry(k).or_default().push(row_idx);
        }
    }

    let mut res = Table::new(columns);
    for row in left.rows() {
        let matches = row[l_idx].key().and_then(|k| by_key.get(&k));
        match matches {
            Some(rs) => {
                for r in rs {
                    let mut out = row.clone();
                    out.extend(right_cols.iter().map(|i| right.rows()[*r][*i].clone()));
                    res.push_row(out)?;
                }
            }
            None => {
                let mut out = row.clone();
                out.resize(row.len() + right_cols.len(), Cell::Missing);
                res.push_row(out)?;
            }
        }
    }
    Ok(res)
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

    fn ids(t: &Table, col: &str) -> Vec<String> {
        let idx = t.column_index(col).unwrap();
        t.column_values(idx).map(|c| c.to_label()).collect()
    }

    #[test]
    fn keeps_every_matching_row() {
        let p = make(&["ID", "Nombre"], &[&["1", "a"], &["3", "c"], &["", "d"]]);
        let s = make(
            &["ID", "Nota"],
            &[&["1", "x"], &["2", "y"], &["1", "z"], &["", "w"], &["3", "v"]],
        );
        let mut d = Diagnostics::new();
        let r = reconcile(&p, &s, "ID", &mut d);
        assert_eq!(ids(&r, "Nota"), vec!["x", "z", "v"]);
        assert!(!d.has_warnings());
    }

    #[test]
    fn subset_property() {
        let p = make(&["ID"], &[&["2"], &["4"]]);
        let s = make(&["ID"], &[&["1"], &["2"], &["3"], &["4"], &["4"]]);
        let mut d = Diagnostics::new();
        let r = reconcile(&p, &s, "ID", &mut d);
        let p_ids = ids(&p, "ID");
        for id in ids(&r, "ID") {
            assert!(p_ids.contains(&id));
        }
        assert_eq!(r.num_rows(), 3);
    }

    #[test]
    fn numbers_and_texts_do_not_match() {
        let mut b = TableBuilder::new(&[Some("ID".to_string())]);
        b.add_row(vec![Cell::Number(7.0)]).unwrap();
        let p = b.build();
        let s = make(&["ID"], &[&["7"]]);
        let mut d = Diagnostics::new();
        assert!(reconcile(&p, &s, "ID", &mut d).is_empty());
    }

    #[test]
    fn missing_key_gives_empty_table() {
        let p = make(&["Codigo"], &[&["1"]]);
        let s = make(&["ID"], &[&["1"]]);
        let mut d = Diagnostics::new();
        let r = reconcile(&p, &s, "ID", &mut d);
        assert_eq!(r, Table::empty());
        assert!(d.contains("not found in the primary table"));
    }

    #[test]
    fn key_missing_from_secondary_gives_empty_table() {
        let p = make(&["ID", "Nombre"], &[&["1", "a"]]);
        let s = make(&["Codigo", "Nota"], &[&["1", "x"]]);
        let mut d = Diagnostics::new();
        let r = reconcile(&p, &s, "ID", &mut d);
        assert_eq!(r, Table::empty());
        assert!(d.contains("not found in the secondary table"));
        assert!(d.has_warnings());
    }

    #[test]
    fn reconciles_each_leaf() {
        let p = make(
            &["ID", "Dependencia"],
            &[&["1", "A"], &["2", "B"], &["3", "A"]],
        );
        let s = make(&["ID", "Nota"], &[&["3", "x"], &["2", "y"], &["9", "z"]]);
        let mut d = Diagnostics::new();
        let rules = PartitionRules::default();
        let part = crate::partition(&p, &rules, &mut d).unwrap();
        let pairs = reconcile_partition(&part, &s, "ID", &mut d);
        let summary: Vec<(&str, &str, Vec<String>)> = pairs
            .iter()
            .map(|p| (p.unit.as_str(), p.sub_unit.as_str(), ids(&p.table, "Nota")))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("A", "A", vec!["x".to_string()]),
                ("B", "B", vec!["y".to_string()]),
            ]
        );
    }

    #[test]
    fn left_join_suffixes_and_repeats() {
        let l = make(
            &["ID", "Estado", "Nombre"],
            &[&["1", "Activa", "a"], &["2", "Cerrada", "b"], &["", "Activa", "c"]],
        );
        let r = make(
            &["Estado", "ID", "Nota"],
            &[&["ok", "1", "x"], &["ok", "1", "y"], &["?", "", "z"]],
        );
        let j = left_join(&l, &r, "ID").unwrap();
        assert_eq!(j.columns(), &["ID", "Estado_x", "Nombre", "Estado_y", "Nota"]);
        assert_eq!(ids(&j, "Nombre"), vec!["a", "a", "b", "c"]);
        assert_eq!(ids(&j, "Nota"), vec!["x", "y", "", ""]);
        assert_eq!(
            left_join(&l, &make(&["Codigo"], &[]), "ID"),
            Err(TableError::UnknownColumn("ID".to_string()))
        );
    }
}
