use std::collections::BTreeSet;

use serde::Serialize;

use super::enums::Domain;
use crate::error::AnalyticsError;

/// Which columns a loaded table actually carries.
///
/// Built once from the header row at load time and handed to every
/// computation, so optional metrics are skipped without re-probing rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub domain: Domain,
    columns: BTreeSet<String>,
}

impl TableSchema {
    pub fn new<I, S>(domain: Domain, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domain,
            columns: columns
                .into_iter()
                .map(|c| c.into().trim().to_string())
                .collect(),
        }
    }

    /// A schema with no columns, for tables that failed to load or tests.
    pub fn empty(domain: Domain) -> Self {
        Self {
            domain,
            columns: BTreeSet::new(),
        }
    }

    pub fn has(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    pub fn has_all(&self, columns: &[&str]) -> bool {
        columns.iter().all(|c| self.has(c))
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.columns.iter().any(|c| c.starts_with(prefix))
    }

    pub fn missing(&self, columns: &[&str]) -> Vec<String> {
        columns
            .iter()
            .filter(|c| !self.has(c))
            .map(|c| c.to_string())
            .collect()
    }

    /// Hard requirement: every column must be present.
    pub fn require(&self, columns: &[&str]) -> Result<(), AnalyticsError> {
        let missing = self.missing(columns);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AnalyticsError::MissingColumns {
                domain: self.domain,
                columns: missing,
            })
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }
}
