use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// The longest sheet name a workbook accepts.
pub const MAX_SHEET_NAME: usize = 31;

/// The name of a file, without its directory. Empty if the path has none.
pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Makes a label usable as a file or folder name. Labels that would name the
/// current or the parent folder become `_`.
pub fn sanitize(name: &str) -> String {
    let res = name
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string();
    if res.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        res
    }
}

// Workbooks refuse sheet names starting or ending with an apostrophe.
fn fit_sheet_name(name: &str, max: usize) -> String {
    let cut: String = name.chars().take(max).collect();
    cut.trim_matches('\'').to_string()
}

/// Makes a label usable as a sheet name: sanitized, without brackets or
/// surrounding quotes, and at most 31 characters long.
pub fn sheet_name(name: &str) -> String {
    let cleaned: String = sanitize(name)
        .chars()
        .map(|c| if c == '[' || c == ']' { '_' } else { c })
        .collect();
    let res = fit_sheet_name(cleaned.trim_matches('\''), MAX_SHEET_NAME);
    if res.trim().is_empty() {
        "Sheet".to_string()
    } else {
        res
    }
}

/// Hands out the sheet names of one workbook.
///
/// Workbooks compare sheet names without case, and truncation can make two
/// labels collide: a colliding name gets a ` (2)`, ` (3)`, ... suffix that
/// still fits in 31 characters.
#[derive(Debug, Default)]
pub struct SheetNames {
    used: Vec<String>,
}

impl SheetNames {
    pub fn new() -> SheetNames {
        SheetNames::default()
    }

    pub fn unique(&mut self, label: &str) -> String {
        let base = sheet_name(label);
        let mut candidate = base.clone();
        let mut n = 2;
        while self.is_used(&candidate) {
            let suffix = format!(" ({})", n);
            let stem = fit_sheet_name(&base, MAX_SHEET_NAME - suffix.chars().count());
            candidate = format!("{}{}", stem, suffix);
            n += 1;
        }
        self.used.push(candidate.clone());
        candidate
    }

    fn is_used(&self, name: &str) -> bool {
        contains_ignoring_case(&self.used, name)
    }
}

fn contains_ignoring_case(used: &[String], name: &str) -> bool {
    let lower = name.to_lowercase();
    used.iter().any(|u| u.to_lowercase() == lower)
}

/// Hands out the file or folder names of one directory.
///
/// Distinct labels can sanitize to the same name, and file systems may ignore
/// case: the later label gets a ` (2)`, ` (3)`, ... suffix.
#[derive(Debug, Default)]
pub struct FileNames {
    used: Vec<String>,
}

impl FileNames {
    pub fn new() -> FileNames {
        FileNames::default()
    }

    pub fn unique(&mut self, label: &str) -> String {
        let base = sanitize(label);
        let mut candidate = base.clone();
        let mut n = 2;
        while contains_ignoring_case(&self.used, &candidate) {
            candidate = format!("{} ({})", base, n);
            n += 1;
        }
        self.used.push(candidate.clone());
        candidate
    }
}

/// `<out>/<Category>_<YYYY-MM-DD>`
pub fn output_root(out: &Path, category: &str, date: NaiveDate) -> PathBuf {
    out.join(format!("{}_{}", sanitize(category), date.format("%Y-%m-%d")))
}
