//! Mortality tables: identifiers, per-sex death probabilities and the
//! read-only registry shared by both present-value engines

mod table;
mod survival;
pub mod loader;

pub use table::MortalityTable;
pub use survival::{SurvivalKernel, SurvivalStep, SurvivalSteps};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::LookupError;

/// Terminal age of every supported table; death is certain during this year
pub const OMEGA: u32 = 123;

/// Number of table entries per sex (ages `0..=OMEGA`)
pub const TABLE_LEN: usize = OMEGA as usize + 1;

/// Sex of the insured life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    pub const ALL: [Sex; 2] = [Sex::Male, Sex::Female];
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Male => f.write_str("M"),
            Sex::Female => f.write_str("F"),
        }
    }
}

impl FromStr for Sex {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "M" => Ok(Sex::Male),
            "F" => Ok(Sex::Female),
            _ => Err(LookupError::UnknownSex(s.to_string())),
        }
    }
}

/// Supported mortality tables
///
/// The DAV tables are read from CSV files; the IAM 2012 tables are compiled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TableId {
    /// DAV 1994 T (German term-insurance table)
    Dav1994T,
    /// DAV 2008 T
    Dav2008T,
    /// IAM 2012 Basic, unadjusted
    Iam2012Basic,
    /// IAM 2012 Basic with age factors graded from 0.6 (age 60) to 1.0 (age 90)
    Iam2012Graded,
}

impl TableId {
    pub const ALL: [TableId; 4] = [
        TableId::Dav1994T,
        TableId::Dav2008T,
        TableId::Iam2012Basic,
        TableId::Iam2012Graded,
    ];

    /// Canonical name, also the CSV file stem for loaded tables
    pub fn name(&self) -> &'static str {
        match self {
            TableId::Dav1994T => "DAV1994T",
            TableId::Dav2008T => "DAV2008T",
            TableId::Iam2012Basic => "IAM2012",
            TableId::Iam2012Graded => "IAM2012G",
        }
    }

    /// Whether the table ships with the crate
    pub fn is_builtin(&self) -> bool {
        matches!(self, TableId::Iam2012Basic | TableId::Iam2012Graded)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TableId {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAV1994T" | "T1994" => Ok(TableId::Dav1994T),
            "DAV2008T" | "DAV2008_T" => Ok(TableId::Dav2008T),
            "IAM2012" => Ok(TableId::Iam2012Basic),
            "IAM2012G" => Ok(TableId::Iam2012Graded),
            _ => Err(LookupError::UnknownTable(s.to_string())),
        }
    }
}

impl TryFrom<String> for TableId {
    type Error = LookupError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TableId> for String {
    fn from(id: TableId) -> Self {
        id.name().to_string()
    }
}

/// Read-only collection of loaded tables, keyed by identifier
///
/// Cloning is cheap; tables are shared behind `Arc`.
#[derive(Debug, Clone, Default)]
pub struct MortalityTables {
    tables: BTreeMap<TableId, Arc<MortalityTable>>,
}

impl MortalityTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the compiled-in IAM 2012 tables
    pub fn builtin() -> Self {
        let mut tables = Self::new();
        tables.insert(MortalityTable::iam_2012_basic());
        tables.insert(MortalityTable::iam_2012_graded());
        tables
    }

    /// Add or replace a table
    pub fn insert(&mut self, table: MortalityTable) {
        self.tables.insert(table.id(), Arc::new(table));
    }

    pub fn contains(&self, id: TableId) -> bool {
        self.tables.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = TableId> + '_ {
        self.tables.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn get(&self, id: TableId) -> Result<&MortalityTable, LookupError> {
        self.tables
            .get(&id)
            .map(|t| t.as_ref())
            .ok_or(LookupError::TableNotLoaded(id))
    }

    /// One-year death probability
    pub fn qx(&self, age: u32, sex: Sex, id: TableId) -> Result<f64, LookupError> {
        self.get(id)?.qx(age, sex)
    }

    /// One-year survival probability
    pub fn px(&self, age: u32, sex: Sex, id: TableId) -> Result<f64, LookupError> {
        Ok(1.0 - self.qx(age, sex, id)?)
    }

    /// Survival kernel for one (table, sex) pair
    pub fn kernel(&self, id: TableId, sex: Sex) -> Result<SurvivalKernel<'_>, LookupError> {
        Ok(SurvivalKernel::new(self.get(id)?, sex))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sex_parsing() {
        assert_eq!("M".parse::<Sex>().unwrap(), Sex::Male);
        assert_eq!("f".parse::<Sex>().unwrap(), Sex::Female);
        assert_eq!(
            "W".parse::<Sex>(),
            Err(LookupError::UnknownSex("W".to_string()))
        );
    }

    #[test]
    fn test_table_id_aliases() {
        assert_eq!("DAV1994T".parse::<TableId>().unwrap(), TableId::Dav1994T);
        assert_eq!("t1994".parse::<TableId>().unwrap(), TableId::Dav1994T);
        assert_eq!("DAV2008_T".parse::<TableId>().unwrap(), TableId::Dav2008T);
        assert!("DAV2004R".parse::<TableId>().is_err());
    }

    #[test]
    fn test_table_id_serde_round_trip() {
        let json = serde_json::to_string(&TableId::Iam2012Graded).unwrap();
        assert_eq!(json, "\"IAM2012G\"");
        let back: TableId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TableId::Iam2012Graded);
        assert!(serde_json::from_str::<TableId>("\"XYZ\"").is_err());
    }

    #[test]
    fn test_registry_lookup_failures() {
        let tables = MortalityTables::builtin();
        assert_eq!(tables.len(), 2);
        assert_eq!(
            tables.qx(40, Sex::Male, TableId::Dav1994T),
            Err(LookupError::TableNotLoaded(TableId::Dav1994T))
        );
        assert!(matches!(
            tables.qx(OMEGA + 1, Sex::Male, TableId::Iam2012Basic),
            Err(LookupError::AgeOutOfRange { .. })
        ));
    }

    #[test]
    fn test_registry_px() {
        let tables = MortalityTables::builtin();
        let qx = tables.qx(77, Sex::Male, TableId::Iam2012Basic).unwrap();
        let px = tables.px(77, Sex::Male, TableId::Iam2012Basic).unwrap();
        assert_eq!(qx, 0.026155);
        assert_eq!(px, 1.0 - 0.026155);
        assert_eq!(tables.qx(OMEGA, Sex::Female, TableId::Iam2012Graded).unwrap(), 1.0);
    }
}
