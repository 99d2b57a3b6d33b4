//! The fixed paper-writing stage catalog.
//!
//! Thirteen stages traversed in canonical order, each with a static search
//! policy, a stage-data key whitelist and the fields required before a stage
//! can be submitted for validation. Everything that cascades over "later
//! stages" is index arithmetic over [`Stage::ALL`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PfError, Result};

/// One canonical workflow stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Gagasan,
    Topik,
    Outline,
    Abstrak,
    Pendahuluan,
    TinjauanLiteratur,
    Metodologi,
    Hasil,
    Diskusi,
    Kesimpulan,
    DaftarPustaka,
    Lampiran,
    Judul,
}

/// Whether a stage's skill may drive web search on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPolicy {
    Active,
    Passive,
}

impl SearchPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Passive => "passive",
        }
    }
}

impl fmt::Display for SearchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchPolicy {
    type Err = PfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "passive" => Ok(Self::Passive),
            other => Err(PfError::InvalidInput(format!(
                "unknown search policy '{other}' (expected active or passive)"
            ))),
        }
    }
}

const ACTIVE_SEARCH_STAGES: [Stage; 6] = [
    Stage::Gagasan,
    Stage::Topik,
    Stage::Pendahuluan,
    Stage::TinjauanLiteratur,
    Stage::Metodologi,
    Stage::Diskusi,
];

/// Keys every stage entry may carry regardless of stage.
const COMMON_KEYS: [&str; 6] = [
    "ringkasan",
    "ringkasanDetail",
    "webSearchReferences",
    "artifactId",
    "validatedAt",
    "revisionCount",
];

impl Stage {
    pub const ALL: [Self; 13] = [
        Self::Gagasan,
        Self::Topik,
        Self::Outline,
        Self::Abstrak,
        Self::Pendahuluan,
        Self::TinjauanLiteratur,
        Self::Metodologi,
        Self::Hasil,
        Self::Diskusi,
        Self::Kesimpulan,
        Self::DaftarPustaka,
        Self::Lampiran,
        Self::Judul,
    ];

    pub const FIRST: Self = Self::Gagasan;
    pub const LAST: Self = Self::Judul;

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gagasan => "gagasan",
            Self::Topik => "topik",
            Self::Outline => "outline",
            Self::Abstrak => "abstrak",
            Self::Pendahuluan => "pendahuluan",
            Self::TinjauanLiteratur => "tinjauan_literatur",
            Self::Metodologi => "metodologi",
            Self::Hasil => "hasil",
            Self::Diskusi => "diskusi",
            Self::Kesimpulan => "kesimpulan",
            Self::DaftarPustaka => "daftar_pustaka",
            Self::Lampiran => "lampiran",
            Self::Judul => "judul",
        }
    }

    /// Position in canonical order (0-based).
    #[must_use]
    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|stage| *stage == self)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The position that follows this stage once it is approved.
    #[must_use]
    pub fn next(self) -> StagePosition {
        Self::from_index(self.index() + 1).map_or(StagePosition::Completed, StagePosition::Stage)
    }

    /// Default catalog id for the skill bound to this stage.
    #[must_use]
    pub fn default_skill_id(self) -> String {
        format!("{}-skill", self.as_str().replace('_', "-"))
    }

    #[must_use]
    pub fn expected_search_policy(self) -> SearchPolicy {
        if ACTIVE_SEARCH_STAGES.contains(&self) {
            SearchPolicy::Active
        } else {
            SearchPolicy::Passive
        }
    }

    /// Stages whose skills must read the living outline checklist.
    #[must_use]
    pub fn is_post_outline(self) -> bool {
        self.index() > Self::Outline.index()
    }

    /// Keys allowed in this stage's data entry (and in its skill's output contract).
    #[must_use]
    pub fn whitelisted_keys(self) -> Vec<&'static str> {
        let specific: &[&str] = match self {
            Self::Gagasan => &["ideKasar", "analisis", "angle", "novelty", "referensiAwal"],
            Self::Topik => &[
                "definitif",
                "angleSpesifik",
                "argumentasiKebaruan",
                "researchGap",
                "referensiPendukung",
            ],
            Self::Outline => &["sections", "totalWordCount", "completenessScore"],
            Self::Abstrak => &["ringkasanPenelitian", "keywords", "wordCount"],
            Self::Pendahuluan => &[
                "latarBelakang",
                "rumusanMasalah",
                "researchGapAnalysis",
                "tujuanPenelitian",
                "signifikansiPenelitian",
                "hipotesis",
                "sitasiAPA",
            ],
            Self::TinjauanLiteratur => &[
                "kerangkaTeoretis",
                "reviewLiteratur",
                "gapAnalysis",
                "justifikasiPenelitian",
                "referensi",
            ],
            Self::Metodologi => &[
                "desainPenelitian",
                "metodePerolehanData",
                "teknikAnalisis",
                "etikaPenelitian",
                "alatInstrumen",
                "pendekatanPenelitian",
            ],
            Self::Hasil => &["temuanUtama", "metodePenyajian", "dataPoints"],
            Self::Diskusi => &[
                "interpretasiTemuan",
                "perbandinganLiteratur",
                "implikasiTeoretis",
                "implikasiPraktis",
                "keterbatasanPenelitian",
                "saranPenelitianMendatang",
                "sitasiTambahan",
            ],
            Self::Kesimpulan => &[
                "ringkasanHasil",
                "jawabanRumusanMasalah",
                "implikasiPraktis",
                "saranPraktisi",
                "saranPeneliti",
                "saranKebijakan",
            ],
            Self::DaftarPustaka => &[
                "entries",
                "totalCount",
                "incompleteCount",
                "duplicatesMerged",
            ],
            Self::Lampiran => &["items", "tidakAdaLampiran", "alasanTidakAda"],
            Self::Judul => &["opsiJudul", "judulTerpilih", "alasanPemilihan"],
        };

        let mut keys: Vec<&'static str> = COMMON_KEYS.to_vec();
        keys.extend_from_slice(specific);
        keys
    }

    #[must_use]
    pub fn is_whitelisted_key(self, key: &str) -> bool {
        COMMON_KEYS.contains(&key) || self.whitelisted_keys().contains(&key)
    }

    /// Fields that must be present before the stage can be submitted.
    #[must_use]
    pub const fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::Topik => &["ringkasan", "definitif"],
            Self::Outline => &["ringkasan", "sections"],
            Self::Judul => &["ringkasan", "judulTerpilih"],
            _ => &["ringkasan"],
        }
    }

    /// Every stage strictly after `self`.
    #[must_use]
    pub fn stages_after(self) -> &'static [Self] {
        &Self::ALL[self.index() + 1..]
    }

    /// Stages strictly after `self` up to and including `through`.
    ///
    /// Empty when `through` is not after `self`.
    #[must_use]
    pub fn stages_after_through(self, through: Self) -> &'static [Self] {
        let start = self.index() + 1;
        let end = through.index() + 1;
        if start >= end {
            return &[];
        }
        &Self::ALL[start..end]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = PfError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == normalized)
            .ok_or_else(|| PfError::InvalidInput(format!("unknown stage '{s}'")))
    }
}

/// Where a session currently is: on one of the stages, or past the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum StagePosition {
    Stage(Stage),
    Completed,
}

impl StagePosition {
    pub const COMPLETED: &'static str = "completed";

    #[must_use]
    pub const fn stage(self) -> Option<Stage> {
        match self {
            Self::Stage(stage) => Some(stage),
            Self::Completed => None,
        }
    }

    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Ordinal where `Completed` sorts after every stage.
    #[must_use]
    pub fn ordinal(self) -> usize {
        match self {
            Self::Stage(stage) => stage.index(),
            Self::Completed => Stage::ALL.len(),
        }
    }

    /// Last stage the session has reached (the final stage once completed).
    #[must_use]
    pub const fn reached_stage(self) -> Stage {
        match self {
            Self::Stage(stage) => stage,
            Self::Completed => Stage::LAST,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stage(stage) => stage.as_str(),
            Self::Completed => Self::COMPLETED,
        }
    }
}

impl fmt::Display for StagePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StagePosition {
    type Err = PfError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case(Self::COMPLETED) {
            return Ok(Self::Completed);
        }
        s.parse().map(Self::Stage)
    }
}

impl From<StagePosition> for String {
    fn from(value: StagePosition) -> Self {
        value.as_str().to_string()
    }
}

impl TryFrom<String> for StagePosition {
    type Error = PfError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Stage> for StagePosition {
    fn from(stage: Stage) -> Self {
        Self::Stage(stage)
    }
}
