use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::data::point::Point;

/// Polarity of the ions recorded in a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IonMode {
    Positive,
    Negative,
    InSilico,
    Neutral,
}

impl IonMode {
    /// Label of the protonated / deprotonated reference ion in this mode
    pub fn reference_label(&self) -> &'static str {
        match self {
            IonMode::Positive => "M+H",
            IonMode::Negative => "M-H",
            IonMode::InSilico | IonMode::Neutral => "M",
        }
    }
}

/// A single scan: an ascending-by-m/z list of (m/z, intensity) points at one retention time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    pub index: usize,
    pub ms_level: u8,
    pub ion_mode: IonMode,
    pub retention_time: f64,
    pub data: Vec<Point>,
    #[serde(default)]
    pub parent_scan: Option<usize>,
    #[serde(default)]
    pub parent_charge: Option<i32>,
    #[serde(default)]
    pub parent_mz: Option<f64>,
}

impl Scan {
    /// Creates a new scan, sorting the points by m/z
    ///
    /// # Arguments
    ///
    /// * `index` - scan index within the run
    /// * `ms_level` - MS level, 1 for survey scans
    /// * `ion_mode` - ion polarity
    /// * `retention_time` - retention time of the scan
    /// * `data` - (m/z, intensity) points in any order
    ///
    /// # Returns
    ///
    /// * `Scan` - the new scan
    pub fn new(index: usize, ms_level: u8, ion_mode: IonMode, retention_time: f64, mut data: Vec<Point>) -> Self {
        data.sort_by(|a, b| a.x.total_cmp(&b.x));
        Scan {
            index,
            ms_level,
            ion_mode,
            retention_time,
            data,
            parent_scan: None,
            parent_charge: None,
            parent_mz: None,
        }
    }

    /// Copy of this scan's metadata carrying different points
    pub fn with_data(&self, mut data: Vec<Point>) -> Self {
        data.sort_by(|a, b| a.x.total_cmp(&b.x));
        Scan { data, ..self.clone() }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn total_ion_current(&self) -> f64 {
        self.data.iter().map(|p| p.y).sum()
    }

    pub fn base_peak(&self) -> Option<Point> {
        self.data.iter().copied().max_by(|a, b| a.y.total_cmp(&b.y))
    }
}

/// An in-memory run: the scans of one raw file in acquisition order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanContainer {
    pub id: String,
    pub ion_mode: IonMode,
    pub scans: Vec<Scan>,
}

impl ScanContainer {
    pub fn new(id: impl Into<String>, ion_mode: IonMode) -> Self {
        ScanContainer { id: id.into(), ion_mode, scans: Vec::new() }
    }

    /// An empty container of the same kind whose id carries `suffix`
    pub fn derive(&self, suffix: &str) -> Self {
        ScanContainer::new(format!("{}{}", self.id, suffix), self.ion_mode)
    }

    pub fn push(&mut self, scan: Scan) {
        self.scans.push(scan);
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    /// Scans of one MS level in acquisition order
    pub fn scans_at_level(&self, ms_level: u8) -> impl Iterator<Item = &Scan> {
        self.scans.iter().filter(move |scan| scan.ms_level == ms_level)
    }

    /// Distinct MS levels present in the run, ascending
    pub fn ms_levels(&self) -> Vec<u8> {
        self.scans.iter().map(|scan| scan.ms_level).sorted().dedup().collect()
    }
}
