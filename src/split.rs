use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use unit_partition::builder::TableBuilder;
use unit_partition::summary::{overview, Overview};
use unit_partition::*;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::split::config_reader::*;
use crate::split::export::*;
use crate::split::io_common::{output_root, simplify_file_name};

pub mod config_reader;
pub mod export;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;

#[derive(Debug, Snafu)]
pub enum SplitError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::Error,
        path: String,
    },
    #[snafu(display("No data found in {path}"))]
    EmptyInput { path: String },
    #[snafu(display("Worksheet {name} not found in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display("Error opening JSON file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Expected a non-negative integer in the JSON configuration"))]
    ParsingJsonNumber {},
    #[snafu(display("Form variant {form} is not described in the configuration"))]
    UnknownForm { form: String },
    #[snafu(display("Invalid unit column: {content}"))]
    InvalidUnitColumn { content: String },
    #[snafu(display("Error opening CSV file {path}"))]
    OpeningCsv { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of the CSV file"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Line {lineno} of the CSV file has more fields than the header"))]
    CsvLineTooLong {
        source: TableError,
        lineno: usize,
    },
    #[snafu(display("Inconsistent table"))]
    TableShape { source: TableError },
    #[snafu(display("Error writing workbook {path}"))]
    WritingExcel {
        source: rust_xlsxwriter::XlsxError,
        path: String,
    },
    #[snafu(display("Error creating directory {path}"))]
    CreatingDir {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid date {content}, expected YYYY-MM-DD"))]
    InvalidDate { content: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SplitResult<T> = Result<T, SplitError>;

/// What the command line asked for.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Mode {
    Validate,
    List,
    Units,
    SubUnits,
    Union,
}

impl Mode {
    fn parse(s: Option<&str>) -> SplitResult<Mode> {
        match s.unwrap_or("subunits") {
            "validate" => Ok(Mode::Validate),
            "list" => Ok(Mode::List),
            "units" => Ok(Mode::Units),
            "subunits" => Ok(Mode::SubUnits),
            "union" => Ok(Mode::Union),
            x => whatever!("Unknown mode {:?}: expected validate, list, units, subunits or union", x),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Mode::Validate => "validate",
            Mode::List => "list",
            Mode::Units => "units",
            Mode::SubUnits => "subunits",
            Mode::Union => "union",
        }
    }
}

/// The outcome of checking an input file against its form variant.
#[derive(PartialEq, Debug, Clone)]
pub enum Validation {
    /// The file could not be read as a table.
    Unreadable(String),
    /// The schema of the form variant could not be loaded.
    SchemaUnavailable(String),
    /// The file was read. The table is returned even when the columns do not
    /// match, so that it can still be inspected.
    Checked { table: Table, check: SchemaCheck },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Checked { check, .. } if check.is_valid())
    }
}

/// Reads a table from a workbook or a CSV file, chosen by extension.
pub fn read_table(path: &str, worksheet: Option<&str>, header_row: usize) -> SplitResult<Table> {
    let is_csv = Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        io_csv::read_csv_table(path, header_row)
    } else {
        io_excel::read_excel_table(path, worksheet, header_row)
    }
}

/// Checks an input file against the columns of its form variant.
///
/// Never fails: every problem is reported in the outcome and in the
/// diagnostics.
pub fn validate_input(
    path: &str,
    config_path: &str,
    form: &str,
    diagnostics: &mut Diagnostics,
) -> Validation {
    let schema = match read_form(config_path, form) {
        Ok(s) => s,
        Err(e) => {
            diagnostics.error(format!("Could not load the schema of {:?}: {}", form, e));
            return Validation::SchemaUnavailable(e.to_string());
        }
    };
    if let Some(expected) = &schema.expected_file_name {
        let name = simplify_file_name(path);
        if &name != expected {
            diagnostics.error(format!(
                "The file is named {:?}, {:?} was expected",
                name, expected
            ));
            return Validation::Unreadable(format!("unexpected file name {:?}", name));
        }
    }
    let header_row = match schema.header_row() {
        Ok(h) => h,
        Err(e) => {
            diagnostics.error(format!("Invalid header row for {:?}: {}", form, e));
            return Validation::SchemaUnavailable(e.to_string());
        }
    };
    let table = match read_table(path, schema.primary_sheet.as_deref(), header_row) {
        Ok(t) => t,
        Err(e) => {
            diagnostics.error(format!("Could not read {:?}: {}", path, e));
            return Validation::Unreadable(e.to_string());
        }
    };
    let check = validate_table(&table, &schema.columns, diagnostics);
    Validation::Checked { table, check }
}

fn parse_date(s: &Option<String>) -> SplitResult<Option<NaiveDate>> {
    match s {
        None => Ok(None),
        Some(x) => NaiveDate::parse_from_str(x.trim(), "%Y-%m-%d")
            .ok()
            .map(Some)
            .context(InvalidDateSnafu { content: x }),
    }
}

fn selection_from_args(args: &Args) -> SplitResult<Selection> {
    if !args.select_sub.is_empty() {
        let mut pairs: Vec<(String, String)> = Vec::new();
        for s in args.select_sub.iter() {
            match s.split_once("::") {
                Some((u, sub)) => pairs.push((u.to_string(), sub.to_string())),
                None => whatever!("Sub-unit selections are written UNIT::SUB-UNIT, got {:?}", s),
            }
        }
        Ok(Selection::SubUnits(pairs))
    } else if !args.select.is_empty() {
        Ok(Selection::Units(args.select.clone()))
    } else {
        Ok(Selection::All)
    }
}

fn overview_to_json(o: &Overview) -> JSValue {
    let mut statuses: JSMap<String, JSValue> = JSMap::new();
    for (status, count) in o.by_status.iter() {
        statuses.insert(status.clone(), json!(count));
    }
    json!({"rows": o.total, "statuses": statuses})
}

/// The JSON summary of a run. Paths are relative to the output folder, so
/// that reports of different days can be compared.
fn build_report_js(
    form: &str,
    mode: Mode,
    leaves: &[(String, String, Overview)],
    report: &ExportReport,
    root: &Path,
) -> JSValue {
    let partitions: Vec<JSValue> = leaves
        .iter()
        .map(|(unit, sub_unit, o)| {
            let secondary_rows = report
                .reconciled
                .iter()
                .find(|p| &p.unit == unit && &p.sub_unit == sub_unit)
                .map(|p| p.table.num_rows());
            let mut js = overview_to_json(o);
            js["unit"] = json!(unit);
            js["subUnit"] = json!(sub_unit);
            if let Some(n) = secondary_rows {
                js["secondaryRows"] = json!(n);
            }
            js
        })
        .collect();
    let files: Vec<String> = report
        .written
        .iter()
        .map(|p| {
            p.strip_prefix(root)
                .unwrap_or(p.as_path())
                .display()
                .to_string()
        })
        .collect();
    let failures: Vec<JSValue> = report
        .failures
        .iter()
        .map(|(label, msg)| json!({"partition": label, "error": msg}))
        .collect();
    json!({
        "form": form,
        "mode": mode.name(),
        "partitions": partitions,
        "files": files,
        "failures": failures,
    })
}

fn check_reference(report_js: &JSValue, reference: &Option<String>) -> SplitResult<()> {
    let pretty_js_report = serde_json::to_string_pretty(report_js).context(ParsingJsonSnafu {})?;
    println!("report:{}", pretty_js_report);

    // The reference report, if provided for comparison
    if let Some(reference_p) = reference {
        let report_ref = read_summary(reference_p)?;
        let pretty_js_report_ref =
            serde_json::to_string_pretty(&report_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_report_ref != pretty_js_report {
            warn!("Found differences with the reference report");
            print_diff(
                pretty_js_report_ref.as_str(),
                pretty_js_report.as_ref(),
                "\n",
            );
            whatever!("Difference detected between the report and the reference report")
        }
    }
    Ok(())
}

fn read_secondary(args: &Args, schema: &FormSchema) -> SplitResult<Option<Table>> {
    match (&args.secondary, &schema.secondary_sheet) {
        (Some(p), _) => Ok(Some(read_table(p, schema.secondary_sheet.as_deref(), 0)?)),
        (None, Some(sheet)) => Ok(Some(io_excel::read_excel_table(&args.input, Some(sheet), 0)?)),
        (None, None) => Ok(None),
    }
}

/// Runs the whole pipeline for the command line arguments.
pub fn run(args: &Args) -> SplitResult<()> {
    let mode = Mode::parse(args.mode.as_deref())?;
    let selection = selection_from_args(args)?;
    let mut diagnostics = Diagnostics::new();

    let validation = validate_input(&args.input, &args.config, &args.form, &mut diagnostics);
    diagnostics.flush();
    let mut table = match validation {
        Validation::Checked { table, check } if check.is_valid() => table,
        Validation::Checked { .. } => {
            whatever!("{} does not have the columns of the form {}", args.input, args.form)
        }
        Validation::Unreadable(msg) | Validation::SchemaUnavailable(msg) => {
            whatever!("{}", msg)
        }
    };
    if mode == Mode::Validate {
        println!("{} is a valid {} file", args.input, args.form);
        return Ok(());
    }

    let schema = read_form(&args.config, &args.form)?;
    let rules = schema.partition_rules()?;
    normalize_columns(&mut table, &schema.renames()?, &mut diagnostics);

    if let Some(date_column) = &args.date_column {
        let from = parse_date(&args.from)?;
        let to = parse_date(&args.to)?;
        table = filter_by_date_range(&table, date_column, from, to, &mut diagnostics);
    }
    diagnostics.flush();

    let settings = ExportSettings {
        primary_sheet: schema
            .primary_sheet
            .clone()
            .unwrap_or_else(|| ExportSettings::default().primary_sheet),
        secondary_sheet: schema
            .secondary_sheet
            .clone()
            .unwrap_or_else(|| ExportSettings::default().secondary_sheet),
        status_column: schema.status_column().to_string(),
        join_key: schema.join_key().to_string(),
    };
    let secondary = read_secondary(args, &schema)?;
    let out: PathBuf = args.out.clone().unwrap_or_else(|| ".".to_string()).into();
    let today = Local::now().date_naive();

    let (leaves, report, root) = match mode {
        Mode::Validate => return Ok(()),
        Mode::List => {
            let units = list_units(&table, &rules).context(TableShapeSnafu {})?;
            let partition = partition(&table, &rules, &mut diagnostics).context(TableShapeSnafu {})?;
            diagnostics.flush();
            let hierarchy: JSMap<String, JSValue> = partition
                .hierarchy()
                .into_iter()
                .map(|(u, subs)| (u, json!(subs)))
                .collect();
            let js = json!({"units": units, "hierarchy": hierarchy});
            let pretty = serde_json::to_string_pretty(&js).context(ParsingJsonSnafu {})?;
            println!("units:{}", pretty);
            return Ok(());
        }
        Mode::Units => {
            let root = output_root(&out, schema.category.as_deref().unwrap_or("Dependencias"), today);
            let groups = partition_units(&table, &rules, &mut diagnostics).context(TableShapeSnafu {})?;
            let report = export_units(
                &groups,
                &selection,
                secondary.as_ref(),
                &settings,
                &root,
                &mut diagnostics,
            );
            let leaves: Vec<(String, String, Overview)> = groups
                .iter()
                .filter(|g| selection.includes_unit(&g.label))
                .map(|g| {
                    let o = overview(&g.table, &settings.status_column, "Sede");
                    (g.label.clone(), g.label.clone(), o)
                })
                .collect();
            (leaves, report, root)
        }
        Mode::SubUnits => {
            let root = output_root(
                &out,
                schema.category.as_deref().unwrap_or("Subdependencias"),
                today,
            );
            let partition = partition(&table, &rules, &mut diagnostics).context(TableShapeSnafu {})?;
            let report = export_sub_units(
                &partition,
                &selection,
                secondary.as_ref(),
                &settings,
                &root,
                &mut diagnostics,
            );
            let leaves: Vec<(String, String, Overview)> = partition
                .select(&selection)
                .entries()
                .iter()
                .map(|e| {
                    let o = overview(e.table, &settings.status_column, "Sede");
                    (e.unit.to_string(), e.sub_unit.to_string(), o)
                })
                .collect();
            (leaves, report, root)
        }
        Mode::Union => {
            let root = output_root(&out, schema.category.as_deref().unwrap_or("Union"), today);
            let secondary = match secondary {
                Some(s) => s,
                None => whatever!("The union needs a secondary table (--secondary or secondarySheet)"),
            };
            let joined = left_join(&table, &secondary, &settings.join_key).context(TableShapeSnafu {})?;
            diagnostics.info(format!(
                "Joined {} primary and {} secondary rows into {} rows",
                table.num_rows(),
                secondary.num_rows(),
                joined.num_rows()
            ));
            let report = export_union(&joined, "Union", &settings, &root, &mut diagnostics);
            let o = overview(&joined, &settings.status_column, "Sede");
            (vec![("Union".to_string(), "Union".to_string(), o)], report, root)
        }
    };
    diagnostics.flush();
    info!(
        "{} file(s) written in {:?}, {} failure(s)",
        report.success_count(),
        root,
        report.failures.len()
    );

    let report_js = build_report_js(&args.form, mode, &leaves, &report, &root);
    debug!("run: report: {:?}", report_js);
    check_reference(&report_js, &args.reference)?;
    if !report.failures.is_empty() {
        whatever!("{} partition(s) could not be written", report.failures.len())
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    const CONFIG: &str = r#"{
        "iniciativas": {
            "columnas": ["ID", "Unidad o Dependencia Responsable", "Facultad de Ciencias", "Estado"],
            "columnas_nuevas": [{"index": 1, "value": "Dependencia"}],
            "category": "Dependencias",
            "secondarySheet": "Sintesis Evaluativa"
        }
    }"#;

    // A registration workbook with its evaluation sheet.
    fn write_input(dir: &Path) -> (String, String) {
        let config = dir.join("config.json");
        fs::write(&config, CONFIG).unwrap();
        let input = dir.join("registro.xlsx");
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet().set_name("Iniciativas").unwrap();
        let rows: [[&str; 4]; 4] = [
            ["ID", "Unidad o Dependencia Responsable", "Facultad de Ciencias", "Estado"],
            ["1", "Facultad de Ciencias", "Física", "Activa"],
            ["2", "Facultad de Ciencias", "Química", "Cerrada"],
            ["3", "Rectoría", "", "Activa"],
        ];
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                if !v.is_empty() {
                    ws.write_string(r as u32, c as u16, *v).unwrap();
                }
            }
        }
        let ws2 = wb.add_worksheet().set_name("Sintesis Evaluativa").unwrap();
        ws2.write_string(0, 0, "ID").unwrap();
        ws2.write_string(0, 1, "Nota").unwrap();
        ws2.write_string(1, 0, "2").unwrap();
        ws2.write_string(1, 1, "bien").unwrap();
        wb.save(&input).unwrap();
        (config.display().to_string(), input.display().to_string())
    }

    fn args(config: &str, input: &str, out: &Path, mode: &str) -> Args {
        Args {
            config: config.to_string(),
            form: "iniciativas".to_string(),
            input: input.to_string(),
            secondary: None,
            out: Some(out.display().to_string()),
            mode: Some(mode.to_string()),
            select: vec![],
            select_sub: vec![],
            date_column: None,
            from: None,
            to: None,
            reference: None,
            verbose: false,
        }
    }

    #[test]
    fn validation_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let (config, input) = write_input(dir.path());
        let mut d = Diagnostics::new();
        let v = validate_input(&input, &config, "iniciativas", &mut d);
        assert!(v.is_valid());

        assert!(matches!(
            validate_input(&input, &config, "otra", &mut d),
            Validation::SchemaUnavailable(_)
        ));
        assert!(matches!(
            validate_input("/nonexistent.xlsx", &config, "iniciativas", &mut d),
            Validation::Unreadable(_)
        ));
        assert!(d.contains("Could not read"));
    }

    #[test]
    fn invalid_columns_are_reported_with_the_table() {
        let dir = tempfile::tempdir().unwrap();
        let (_, input) = write_input(dir.path());
        let config = dir.path().join("other.json");
        fs::write(
            &config,
            r#"{"iniciativas": {"columnas": ["ID", "Estado", "Sede"]}}"#,
        )
        .unwrap();
        let mut d = Diagnostics::new();
        match validate_input(&input, &config.display().to_string(), "iniciativas", &mut d) {
            Validation::Checked { table, check } => {
                assert_eq!(table.num_rows(), 3);
                assert_eq!(check.missing, vec!["Sede".to_string()]);
                assert_eq!(check.extra.len(), 2);
            }
            v => panic!("unexpected outcome {:?}", v),
        }
    }

    #[test]
    fn expected_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let (_, input) = write_input(dir.path());
        let config = dir.path().join("named.json");
        fs::write(
            &config,
            r#"{"v": {"columnas": ["ID"], "expectedFileName": "Registro VcM.xlsx"}}"#,
        )
        .unwrap();
        let mut d = Diagnostics::new();
        assert!(matches!(
            validate_input(&input, &config.display().to_string(), "v", &mut d),
            Validation::Unreadable(_)
        ));
    }

    #[test]
    fn sub_unit_run_writes_nested_workbooks() {
        let dir = tempfile::tempdir().unwrap();
        let (config, input) = write_input(dir.path());
        let out = dir.path().join("out");
        run(&args(&config, &input, &out, "subunits")).unwrap();
        let root = output_root(&out, "Dependencias", Local::now().date_naive());
        assert!(root.join("Facultad de Ciencias").join("Física.xlsx").is_file());
        assert!(root.join("Facultad de Ciencias").join("Química.xlsx").is_file());
        assert!(root.join("Rectoría").join("Rectoría.xlsx").is_file());
    }

    #[test]
    fn selected_units_only() {
        let dir = tempfile::tempdir().unwrap();
        let (config, input) = write_input(dir.path());
        let out = dir.path().join("out");
        let mut a = args(&config, &input, &out, "units");
        a.select = vec!["Rectoría".to_string()];
        run(&a).unwrap();
        let root = output_root(&out, "Dependencias", Local::now().date_naive());
        let files: Vec<String> = fs::read_dir(&root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(files, vec!["Rectoría.xlsx".to_string()]);
    }

    #[test]
    fn report_matches_reference() {
        let dir = tempfile::tempdir().unwrap();
        let (config, input) = write_input(dir.path());
        let out = dir.path().join("out");
        let reference = dir.path().join("reference.json");
        let expected = json!({
            "form": "iniciativas",
            "mode": "units",
            "partitions": [
                {"unit": "Rectoría", "subUnit": "Rectoría", "rows": 1,
                 "statuses": {"Activa": 1}, "secondaryRows": 0}
            ],
            "files": ["Rectoría.xlsx"],
            "failures": [],
        });
        fs::write(&reference, serde_json::to_string(&expected).unwrap()).unwrap();
        let mut a = args(&config, &input, &out, "units");
        a.select = vec!["Rectoría".to_string()];
        a.reference = Some(reference.display().to_string());
        run(&a).unwrap();

        a.select = vec!["Facultad de Ciencias".to_string()];
        assert!(run(&a).is_err());
    }

    #[test]
    fn bad_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let (config, input) = write_input(dir.path());
        let out = dir.path().join("out");
        assert!(run(&args(&config, &input, &out, "pdf")).is_err());
        let mut a = args(&config, &input, &out, "subunits");
        a.select_sub = vec!["Rectoría".to_string()];
        assert!(run(&a).is_err());
        let mut a = args(&config, &input, &out, "subunits");
        a.date_column = Some("Fecha".to_string());
        a.from = Some("01/02/2024".to_string());
        assert!(matches!(run(&a), Err(SplitError::InvalidDate { .. })));
        assert!(!out.exists());
    }

    #[test]
    fn union_run() {
        let dir = tempfile::tempdir().unwrap();
        let (config, input) = write_input(dir.path());
        let out = dir.path().join("out");
        run(&args(&config, &input, &out, "union")).unwrap();
        let root = output_root(&out, "Dependencias", Local::now().date_naive());
        assert!(root.join("Union.xlsx").is_file());
    }
}
