//! Record Store: the five source extracts, parsed once into typed tables.
//!
//! A store is immutable after load. `StoreCache` memoises the load on the
//! content fingerprint of the source files so an unchanged data directory
//! is never re-parsed, and a changed one is replaced wholesale.

pub mod fields;
pub mod hash;
pub mod loader;

pub use hash::SourceFingerprint;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use crate::config::{
    AnalyticsConfig, EQUIPMENT_FILE, FINANCIAL_FILE, OPERATIONS_FILE, PATIENT_FILE, STAFF_FILE,
};
use crate::error::AnalyticsError;
use crate::models::*;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Malformed delimited data in {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("{0} data contains no rows")]
    EmptyTable(Domain),
}

/// Rows of one domain plus the columns its header carried.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<R> {
    pub rows: Vec<R>,
    pub schema: TableSchema,
}

impl<R> Table<R> {
    pub fn empty(domain: Domain) -> Self {
        Self {
            rows: Vec::new(),
            schema: TableSchema::empty(domain),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Same schema, rows narrowed by `keep`. Never mutates `self`.
    pub fn filtered(&self, keep: impl Fn(&R) -> bool) -> Self
    where
        R: Clone,
    {
        Self {
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
            schema: self.schema.clone(),
        }
    }

    pub fn with_rows(&self, rows: Vec<R>) -> Self {
        Self {
            rows,
            schema: self.schema.clone(),
        }
    }
}

impl<R: Dated> Table<R> {
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.rows.iter().filter_map(|r| r.date());
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }
}

// ═══════════════════════════════════════════════════════════
// RecordStore
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct RecordStore {
    pub financial: Table<FinancialRecord>,
    pub operations: Table<OperationsRecord>,
    pub patient: Table<PatientVisit>,
    pub staff: Table<StaffShift>,
    pub equipment: Table<EquipmentUsage>,
    pub fingerprint: SourceFingerprint,
}

/// Raw bytes of the five extracts, read once per load attempt.
struct RawSources {
    financial: Vec<u8>,
    operations: Vec<u8>,
    patient: Vec<u8>,
    staff: Vec<u8>,
    equipment: Vec<u8>,
}

impl RawSources {
    fn read(dir: &Path) -> Result<Self, LoadError> {
        Ok(Self {
            financial: read_source(dir, FINANCIAL_FILE)?,
            operations: read_source(dir, OPERATIONS_FILE)?,
            patient: read_source(dir, PATIENT_FILE)?,
            staff: read_source(dir, STAFF_FILE)?,
            equipment: read_source(dir, EQUIPMENT_FILE)?,
        })
    }

    fn fingerprint(&self) -> SourceFingerprint {
        SourceFingerprint::compute([
            self.financial.as_slice(),
            self.operations.as_slice(),
            self.patient.as_slice(),
            self.staff.as_slice(),
            self.equipment.as_slice(),
        ])
    }
}

fn read_source(dir: &Path, name: &str) -> Result<Vec<u8>, LoadError> {
    let path = dir.join(name);
    if !path.exists() {
        return Err(LoadError::MissingFile(path));
    }
    std::fs::read(&path).map_err(|source| LoadError::Io { path, source })
}

impl RecordStore {
    /// Read and parse every extract in `dir`.
    pub fn load(dir: &Path) -> Result<Self, LoadError> {
        let sources = RawSources::read(dir)?;
        let fingerprint = sources.fingerprint();
        Self::from_sources(&sources, fingerprint)
    }

    fn from_sources(sources: &RawSources, fingerprint: SourceFingerprint) -> Result<Self, LoadError> {
        let span = tracing::info_span!("load_store", fingerprint = %fingerprint);
        let _guard = span.enter();

        let financial = loader::parse_financial(&sources.financial, FINANCIAL_FILE)?;
        if financial.is_empty() {
            return Err(LoadError::EmptyTable(Domain::Financial));
        }
        let operations = loader::parse_operations(&sources.operations, OPERATIONS_FILE)?;
        let patient = loader::parse_patients(&sources.patient, PATIENT_FILE)?;
        let staff = loader::parse_staff(&sources.staff, STAFF_FILE)?;
        let equipment = loader::parse_equipment(&sources.equipment, EQUIPMENT_FILE)?;

        tracing::info!(
            financial = financial.len(),
            operations = operations.len(),
            patient = patient.len(),
            staff = staff.len(),
            equipment = equipment.len(),
            "Record store loaded"
        );

        Ok(Self {
            financial,
            operations,
            patient,
            staff,
            equipment,
            fingerprint,
        })
    }

    /// Earliest and latest Financial dates.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.financial.date_bounds()
    }

}

impl FilterContext {
    /// Initial selection for a freshly loaded store. `None` when no Financial
    /// row carries a usable date.
    pub fn defaults_for(store: &RecordStore, config: &AnalyticsConfig) -> Option<Self> {
        let (min, max) = store.date_bounds()?;
        Some(Self::with_defaults(min, max, config.default_start_date))
    }
}

// ═══════════════════════════════════════════════════════════
// StoreCache
// ═══════════════════════════════════════════════════════════

/// Memoised store, keyed by source content.
#[derive(Debug, Default)]
pub struct StoreCache {
    entry: Option<Arc<RecordStore>>,
}

impl StoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached store when the sources are unchanged, otherwise
    /// load afresh. A failed load leaves the cache empty.
    pub fn get_or_load(&mut self, dir: &Path) -> Result<Arc<RecordStore>, LoadError> {
        let sources = match RawSources::read(dir) {
            Ok(sources) => sources,
            Err(e) => {
                self.entry = None;
                return Err(e);
            }
        };
        let fingerprint = sources.fingerprint();

        if let Some(store) = &self.entry {
            if store.fingerprint == fingerprint {
                tracing::debug!(fingerprint = %fingerprint, "Record store cache hit");
                return Ok(Arc::clone(store));
            }
            tracing::info!("Source files changed; replacing record store");
        }

        match RecordStore::from_sources(&sources, fingerprint) {
            Ok(store) => {
                let store = Arc::new(store);
                self.entry = Some(Arc::clone(&store));
                Ok(store)
            }
            Err(e) => {
                tracing::error!(error = %e, dir = %dir.display(), "Record store load failed");
                self.entry = None;
                Err(e)
            }
        }
    }

    /// The loaded store, or `StoreNotLoaded` so dependent pages can stop early.
    pub fn current(&self) -> Result<Arc<RecordStore>, AnalyticsError> {
        self.entry.clone().ok_or(AnalyticsError::StoreNotLoaded)
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }
}
