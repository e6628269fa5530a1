use crate::split::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use std::collections::BTreeMap;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RenameDirective {
    index: JSValue,
    pub value: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OverrideDirective {
    #[serde(rename = "unitContains")]
    pub unit_contains: String,
    pub column: String,
    #[serde(rename = "otherValue")]
    pub other_value: Option<String>,
}

/// The description of one form variant.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FormSchema {
    #[serde(rename = "columnas")]
    pub columns: Vec<String>,
    #[serde(rename = "columnas_nuevas", default)]
    pub new_columns: Vec<RenameDirective>,
    #[serde(rename = "headerRow")]
    _header_row: Option<JSValue>,
    #[serde(rename = "unitColumn")]
    _unit_column: Option<JSValue>,
    #[serde(rename = "joinKey")]
    _join_key: Option<String>,
    #[serde(rename = "statusColumn")]
    _status_column: Option<String>,
    #[serde(rename = "blankUnits")]
    pub blank_units: Option<String>,
    #[serde(rename = "subUnitCutoff")]
    pub sub_unit_cutoff: Option<f64>,
    #[serde(rename = "strictMatching")]
    pub strict_matching: Option<bool>,
    #[serde(rename = "subUnitOverrides")]
    pub sub_unit_overrides: Option<Vec<OverrideDirective>>,
    #[serde(rename = "expectedFileName")]
    pub expected_file_name: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "primarySheet")]
    pub primary_sheet: Option<String>,
    #[serde(rename = "secondarySheet")]
    pub secondary_sheet: Option<String>,
}

/// All the form variants, by identifier.
pub type SchemaConfig = BTreeMap<String, FormSchema>;

impl FormSchema {
    pub fn header_row(&self) -> SplitResult<usize> {
        match &self._header_row {
            None => Ok(0),
            x => read_js_int(x),
        }
    }

    pub fn unit_column(&self) -> SplitResult<UnitColumn> {
        match &self._unit_column {
            None => Ok(UnitColumn::Name("Dependencia".to_string())),
            Some(JSValue::String(s)) => Ok(UnitColumn::Name(s.clone())),
            Some(JSValue::Number(n)) => n
                .as_u64()
                .map(|x| UnitColumn::Position(x as usize))
                .context(InvalidUnitColumnSnafu {
                    content: n.to_string(),
                }),
            Some(x) => InvalidUnitColumnSnafu {
                content: x.to_string(),
            }
            .fail(),
        }
    }

    pub fn join_key(&self) -> &str {
        self._join_key.as_deref().unwrap_or("ID")
    }

    pub fn status_column(&self) -> &str {
        self._status_column.as_deref().unwrap_or("Estado")
    }

    pub fn renames(&self) -> SplitResult<Vec<ColumnRename>> {
        let mut res: Vec<ColumnRename> = Vec::new();
        for r in self.new_columns.iter() {
            res.push(ColumnRename {
                index: read_js_int(&Some(r.index.clone()))?,
                value: r.value.clone(),
            });
        }
        Ok(res)
    }

    pub fn partition_rules(&self) -> SplitResult<PartitionRules> {
        let defaults = PartitionRules::default();
        let blank_units = match self.blank_units.as_deref() {
            None | Some("sentinel") => BlankUnitPolicy::Sentinel,
            Some("exclude") => BlankUnitPolicy::Exclude,
            Some(x) => whatever!("blankUnits must be 'sentinel' or 'exclude', got {:?}", x),
        };
        let overrides = self
            .sub_unit_overrides
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|o| SubUnitOverride {
                unit_contains: o.unit_contains,
                column: o.column,
                other_value: o.other_value.unwrap_or_else(|| "Otra".to_string()),
            })
            .collect();
        Ok(PartitionRules {
            unit_column: self.unit_column()?,
            blank_units,
            sub_unit_cutoff: self.sub_unit_cutoff.unwrap_or(defaults.sub_unit_cutoff),
            strict_matching: self.strict_matching.unwrap_or(defaults.strict_matching),
            generic_unit_column: defaults.generic_unit_column,
            overrides,
        })
    }
}

pub fn read_config(path: &str) -> SplitResult<SchemaConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: SchemaConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    debug!("read_config: variants: {:?}", config.keys().collect::<Vec<_>>());
    Ok(config)
}

pub fn read_form(path: &str, form: &str) -> SplitResult<FormSchema> {
    let mut config = read_config(path)?;
    config.remove(form).context(UnknownFormSnafu { form })
}

pub fn read_summary(path: &str) -> SplitResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read content: {:?}", contents);
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

fn read_js_int(x: &Option<JSValue>) -> SplitResult<usize> {
    match x {
        Some(JSValue::Number(n)) => n
            .as_u64()
            .map(|x| x as usize)
            .context(ParsingJsonNumberSnafu {}),
        Some(JSValue::String(s)) => s.parse::<usize>().ok().context(ParsingJsonNumberSnafu {}),
        _ => None.context(ParsingJsonNumberSnafu {}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "instancias_externas": {
            "columnas": ["Id", "Dependencia", "Sede"],
            "columnas_nuevas": [{"index": 1, "value": "Dependencia"}, {"index": "2", "value": "Sede"}],
            "blankUnits": "exclude",
            "subUnitOverrides": [{"unitContains": "otras unidad", "column": "Otras Unidades No Académicas"}]
        },
        "iniciativas": {
            "columnas": ["ID", "Estado"],
            "headerRow": 1,
            "unitColumn": 13,
            "strictMatching": true,
            "subUnitCutoff": 0.7,
            "joinKey": "Codigo"
        }
    }"#;

    #[test]
    fn reads_variants_with_defaults() {
        let config: SchemaConfig = serde_json::from_str(CONFIG).unwrap();
        let ext = &config["instancias_externas"];
        assert_eq!(ext.header_row().unwrap(), 0);
        assert_eq!(ext.join_key(), "ID");
        assert_eq!(ext.status_column(), "Estado");
        assert_eq!(
            ext.renames().unwrap(),
            vec![
                ColumnRename { index: 1, value: "Dependencia".to_string() },
                ColumnRename { index: 2, value: "Sede".to_string() },
            ]
        );
        let rules = ext.partition_rules().unwrap();
        assert_eq!(rules.unit_column, UnitColumn::Name("Dependencia".to_string()));
        assert_eq!(rules.blank_units, BlankUnitPolicy::Exclude);
        assert_eq!(rules.overrides[0].other_value, "Otra");

        let ini = &config["iniciativas"];
        assert_eq!(ini.header_row().unwrap(), 1);
        assert_eq!(ini.join_key(), "Codigo");
        let rules = ini.partition_rules().unwrap();
        assert_eq!(rules.unit_column, UnitColumn::Position(13));
        assert!(rules.strict_matching);
        assert_eq!(rules.sub_unit_cutoff, 0.7);
        assert_eq!(rules.blank_units, BlankUnitPolicy::Sentinel);
    }

    #[test]
    fn rejects_bad_descriptors() {
        let mut config: SchemaConfig = serde_json::from_str(CONFIG).unwrap();
        let mut ini = config.remove("iniciativas").unwrap();
        ini._unit_column = Some(serde_json::json!(-2));
        assert!(matches!(
            ini.unit_column(),
            Err(SplitError::InvalidUnitColumn { .. })
        ));
        ini._unit_column = Some(serde_json::json!([1]));
        assert!(ini.partition_rules().is_err());
        ini.blank_units = Some("drop".to_string());
        assert!(ini.partition_rules().is_err());
    }

    #[test]
    fn unknown_form() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.json");
        fs::write(&p, CONFIG).unwrap();
        let p = p.display().to_string();
        assert!(read_form(&p, "iniciativas").is_ok());
        assert!(matches!(
            read_form(&p, "otra"),
            Err(SplitError::UnknownForm { .. })
        ));
        assert!(matches!(
            read_form("/nonexistent/config.json", "iniciativas"),
            Err(SplitError::OpeningJson { .. })
        ));
    }
}
