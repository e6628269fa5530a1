use clap::Parser;

/// Validates outreach registration spreadsheets and splits them by unit and sub-unit.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file describing the expected columns of every form variant.
    /// See the manual of the unit_partition crate for the format.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (string) The form variant of the input, as named in the configuration file.
    #[clap(short, long, value_parser)]
    pub form: String,

    /// (file path) The spreadsheet to process (.xlsx, .xls, .ods or .csv).
    #[clap(short, long, value_parser)]
    pub input: String,

    /// (file path, optional) The secondary table, when it is not a worksheet of the input.
    #[clap(long, value_parser)]
    pub secondary: Option<String>,

    /// (directory, default '.') Where the output folder is created.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (default subunits) One of: validate, list, units, subunits, union.
    #[clap(short, long, value_parser)]
    pub mode: Option<String>,

    /// (repeated, optional) Only export these units.
    #[clap(long, value_parser)]
    pub select: Vec<String>,

    /// (repeated, optional) Only export these sub-units, written as UNIT::SUB-UNIT.
    #[clap(long, value_parser)]
    pub select_sub: Vec<String>,

    /// (column name, optional) The date column used by --from and --to.
    #[clap(long, value_parser)]
    pub date_column: Option<String>,

    /// (YYYY-MM-DD, optional) Drop the rows dated before this day.
    #[clap(long, value_parser)]
    pub from: Option<String>,

    /// (YYYY-MM-DD, optional) Drop the rows dated after this day.
    #[clap(long, value_parser)]
    pub to: Option<String>,

    /// (file path) A reference run report in JSON format. If provided, vcmsplit will
    /// check that the report of this run matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
