//! CSV-based mortality table loader
//!
//! Loads `<dir>/<TABLE>.csv` files in the German spreadsheet export format:
//!
//! ```text
//! Alter;qx;qy
//! 0;0,011687;0,009003
//! 1;0,001008;0,000867
//! ```
//!
//! `qx` is the male column, `qy` the female column. Decimal commas and
//! decimal points are both accepted. Any failure here means the table is
//! unavailable; nothing is defaulted.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::{MortalityTable, TableId, OMEGA, TABLE_LEN};
use crate::error::LoadError;

/// Default directory holding table CSV files
pub const DEFAULT_TABLES_PATH: &str = "data";

const AGE_COLUMN: &str = "Alter";
const MALE_COLUMN: &str = "qx";
const FEMALE_COLUMN: &str = "qy";

/// Path of the CSV file for `id` inside `dir`
pub fn table_path(dir: &Path, id: TableId) -> PathBuf {
    dir.join(format!("{}.csv", id.name()))
}

/// Load one table from `<dir>/<id>.csv`
pub fn load_table(dir: &Path, id: TableId) -> Result<MortalityTable, LoadError> {
    let path = table_path(dir, id);
    let file = File::open(&path).map_err(|source| LoadError::Io {
        path: path.clone(),
        source,
    })?;

    let table = read_table(file, id, &path)?;
    info!("Loaded mortality table {} from {}", id, path.display());
    Ok(table)
}

/// Parse a table from any reader; `source` is only used in error messages
pub fn read_table<R: Read>(reader: R, id: TableId, source: &Path) -> Result<MortalityTable, LoadError> {
    let csv_error = |e: csv::Error| LoadError::Csv {
        path: source.to_path_buf(),
        source: e,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers().map_err(csv_error)?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| LoadError::MalformedRow {
                path: source.to_path_buf(),
                line: 1,
                reason: format!(
                    "expected header '{AGE_COLUMN};{MALE_COLUMN};{FEMALE_COLUMN}', found '{}'",
                    headers.iter().collect::<Vec<_>>().join("|")
                ),
            })
    };
    let age_idx = column(AGE_COLUMN)?;
    let male_idx = column(MALE_COLUMN)?;
    let female_idx = column(FEMALE_COLUMN)?;

    let mut male: Vec<Option<f64>> = vec![None; TABLE_LEN];
    let mut female: Vec<Option<f64>> = vec![None; TABLE_LEN];
    let mut skipped = 0usize;

    for result in reader.records() {
        let record = result.map_err(csv_error)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let malformed = |reason: String| LoadError::MalformedRow {
            path: source.to_path_buf(),
            line,
            reason,
        };

        let field = |idx: usize, name: &str| {
            record
                .get(idx)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| malformed(format!("missing '{name}' value")))
        };

        let age_text = field(age_idx, AGE_COLUMN)?;
        let age: u32 = age_text
            .parse()
            .map_err(|_| malformed(format!("age '{age_text}' is not a non-negative integer")))?;

        if age > OMEGA {
            skipped += 1;
            continue;
        }

        let male_qx = parse_decimal(field(male_idx, MALE_COLUMN)?).map_err(&malformed)?;
        let female_qx = parse_decimal(field(female_idx, FEMALE_COLUMN)?).map_err(&malformed)?;

        male[age as usize] = Some(male_qx);
        female[age as usize] = Some(female_qx);
    }

    if skipped > 0 {
        warn!(
            "{}: ignored {} rows above terminal age {}",
            source.display(),
            skipped,
            OMEGA
        );
    }

    let male = complete(id, male)?;
    let female = complete(id, female)?;
    MortalityTable::new(id, male, female)
}

/// Parse a rate written with either a decimal comma or a decimal point
fn parse_decimal(text: &str) -> Result<f64, String> {
    let normalized = text.replace(',', ".");
    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("'{text}' is not a decimal number"))
}

fn complete(id: TableId, rates: Vec<Option<f64>>) -> Result<Vec<f64>, LoadError> {
    rates
        .into_iter()
        .enumerate()
        .map(|(age, qx)| qx.ok_or(LoadError::MissingAge { table: id, age: age as u32 }))
        .collect()
}
