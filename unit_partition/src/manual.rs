/*!

This is the long-form manual for `unit_partition` and `vcmsplit`.

## Overview

An export from the outreach office is one table per file: one row per
registration, one column per question. `vcmsplit` checks that the file has
the columns its form is expected to have, then splits it in two levels:

* by **unit** (faculty, school, office), read from a configured column;
* inside each unit, by **sub-unit**, read from the column whose name looks
  like the unit itself (the "Facultad de Ciencias" column lists the
  departments of that faculty).

Each piece loses the columns that are empty for all of its rows, and is
written to its own workbook.

## Form variants

Two form variants ship with the program:

* `instancias_externas` External instances: one row per participant, with
  the participation dates used for timelines.
* `iniciativas` Outreach initiatives: a primary sheet of initiatives and a
  secondary sheet of evaluations, linked by the `ID` column.

Any other variant can be described in the configuration file.

## Configuration

The configuration is a JSON document keyed by variant:

```json
{
  "iniciativas": {
    "columnas": ["ID", "Estado", "Unidad o Dependencia Responsable"],
    "columnas_nuevas": [{ "index": 2, "value": "Dependencia" }],
    "unitColumn": "Dependencia",
    "joinKey": "ID",
    "statusColumn": "Estado",
    "category": "Iniciativas",
    "primarySheet": "Iniciativas",
    "secondarySheet": "Sintesis Evaluativa"
  }
}
```

Fields:

- `columnas` (array of strings): the exact set of columns of the file,
  compared after collapsing whitespace. The comparison is case sensitive.
- `columnas_nuevas` (array of `{index, value}`): renames applied by position
  (from 0) after validation. Positions past the last column are skipped.
- `headerRow` (number, optional): the row holding the header. Defaults to 0.
- `unitColumn` (string or number, optional): the name or the position of the
  unit column. Defaults to `Dependencia`.
- `joinKey` (string, optional): the column linking both sheets. Defaults to `ID`.
- `statusColumn` (string, optional): the column used to add one sheet per
  status to every workbook. Defaults to `Estado`.
- `blankUnits` (`sentinel` or `exclude`, optional): rows without a unit are
  either gathered under `EN BLANCO` (the default) or left out.
- `subUnitCutoff` (number, optional): the minimum similarity between a unit
  and a column name for that column to hold the sub-units. Defaults to 0.6.
- `strictMatching` (boolean, optional): drop plural suffixes before comparing
  units and column names.
- `subUnitOverrides` (array, optional): units whose sub-units live in a fixed
  column. Each entry is `{unitContains, column, otherValue}`: when the value
  read is `otherValue` and a `<column>.1` column exists, that column is read
  instead.
- `expectedFileName` (string, optional): the input must carry this file name.
- `category` (string, optional): the prefix of the output folder.
- `primarySheet`, `secondarySheet` (strings, optional): the worksheets read
  from the input workbook.

## Modes

- `validate` only checks the columns.
- `list` prints the units and their sub-units.
- `units` writes `<Category>_<date>/<unit>.xlsx`.
- `subunits` writes `<Category>_<date>/<unit>/<sub-unit>.xlsx`.
- `union` joins both sheets on the join key and writes one workbook.

`--select` and `--select-sub UNIT::SUB` restrict what is written. Without
them, everything is written.

## Matching

Labels are compared after folding case, removing accents and collapsing
spaces. Similarity is the ratio `2 * M / T` between two labels, `T` being the
total number of characters and `M` the number of characters in common
blocks. When two columns are equally close to a unit, the leftmost one wins.

 */
