//! The persistent, self-learning section database.
//!
//! A single database maps canonical section names to their observed
//! heading variants. It is shared across parses: readers take an immutable
//! [`Snapshot`] at the start of a parse, learned variants are buffered in a
//! [`LearnedBatch`], and the batch is committed under a coarse lock at
//! end-of-document. Commits replace the whole file through a temporary
//! file and an atomic rename; unknown JSON keys survive the rewrite.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::embed::{cosine_similarity, update_centroid, SharedEmbedder};
use crate::error::{Error, Result};
use crate::layout::HeaderLookup;
use crate::model::{CanonicalSection, MatchKind, SectionMatch};

use super::{normalize_heading, surface_form};

/// Default cosine similarity floor for an embedding match.
pub const DEFAULT_EMBEDDING_THRESHOLD: f32 = 0.68;

/// Score below which a non-exact match is not worth learning.
const LEARN_SCORE_FLOOR: f32 = 0.70;

/// One canonical section's learned state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionEntry {
    /// Observed heading variants, lowercase with collapsed whitespace
    #[serde(default)]
    pub variants: BTreeSet<String>,
    /// How many times the learner touched this entry
    #[serde(default)]
    pub usage_count: u64,
    /// Running mean of learned variants' embeddings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_centroid: Option<Vec<f32>>,
    /// Fields written by other tools; preserved verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// On-disk shape of the database document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbFile {
    version: String,
    sections: BTreeMap<String, SectionEntry>,
    /// Top-level fields written by other tools; preserved verbatim
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl DbFile {
    fn seeded() -> Self {
        let mut sections = BTreeMap::new();
        for (section, variants) in seed_variants() {
            let entry = SectionEntry {
                variants: variants.iter().map(|v| v.to_string()).collect(),
                ..Default::default()
            };
            sections.insert(section.as_str().to_string(), entry);
        }
        Self {
            version: "1.0.0".to_string(),
            sections,
            extra: serde_json::Map::new(),
        }
    }
}

/// Built-in heading vocabulary used when no database file exists yet.
fn seed_variants() -> Vec<(CanonicalSection, &'static [&'static str])> {
    use CanonicalSection::*;
    vec![
        (
            Contact,
            &[
                "contact",
                "contact information",
                "contact details",
                "personal details",
                "personal information",
            ][..],
        ),
        (
            Summary,
            &[
                "summary",
                "professional summary",
                "profile",
                "objective",
                "career objective",
                "about me",
            ][..],
        ),
        (
            Skills,
            &[
                "skills",
                "technical skills",
                "skill set",
                "core competencies",
                "expertise",
                "technologies",
                "key skills",
            ][..],
        ),
        (
            Experience,
            &[
                "experience",
                "work experience",
                "professional experience",
                "employment history",
                "work history",
                "career history",
            ][..],
        ),
        (
            Projects,
            &[
                "projects",
                "personal projects",
                "academic projects",
                "key projects",
                "portfolio",
            ][..],
        ),
        (
            Education,
            &[
                "education",
                "academic background",
                "educational qualifications",
                "academics",
                "qualifications",
            ][..],
        ),
        (
            Certifications,
            &[
                "certifications",
                "certificates",
                "licenses",
                "courses",
                "certifications and licenses",
            ][..],
        ),
        (
            Achievements,
            &[
                "achievements",
                "accomplishments",
                "awards",
                "honors",
                "awards and achievements",
            ][..],
        ),
        (
            Publications,
            &["publications", "research publications", "papers"][..],
        ),
        (
            Languages,
            &["languages", "language proficiency", "languages known"][..],
        ),
        (
            Volunteer,
            &[
                "volunteer",
                "volunteering",
                "volunteer experience",
                "community service",
            ][..],
        ),
        (
            Hobbies,
            &[
                "hobbies",
                "interests",
                "hobbies and interests",
                "extracurricular activities",
            ][..],
        ),
        (References, &["references", "referees"][..]),
        (Declarations, &["declaration", "declarations"][..]),
    ]
}

/// Substring rule applied when no variant matches.
struct PatternRule {
    pattern: &'static str,
    section: CanonicalSection,
    score: f32,
}

const PATTERN_RULES: &[PatternRule] = &[
    PatternRule {
        pattern: r"developer|engineer|analyst",
        section: CanonicalSection::Experience,
        score: 0.8,
    },
    PatternRule {
        pattern: r"university|bachelor|b\.?tech|m\.s\.",
        section: CanonicalSection::Education,
        score: 0.8,
    },
    PatternRule {
        pattern: r"certified|certification",
        section: CanonicalSection::Certifications,
        score: 0.8,
    },
    PatternRule {
        pattern: r"project|portfolio",
        section: CanonicalSection::Projects,
        score: 0.8,
    },
    PatternRule {
        pattern: r"skill|expertise|proficiency",
        section: CanonicalSection::Skills,
        score: 0.75,
    },
];

fn compiled_rules() -> &'static Vec<(Regex, CanonicalSection, f32)> {
    static RULES: OnceLock<Vec<(Regex, CanonicalSection, f32)>> = OnceLock::new();
    RULES.get_or_init(|| {
        PATTERN_RULES
            .iter()
            .map(|r| {
                (
                    Regex::new(r.pattern).expect("pattern rule must compile"),
                    r.section,
                    r.score,
                )
            })
            .collect()
    })
}

/// Heuristics that keep obvious non-headings (dates, company names,
/// boilerplate) out of the learned vocabulary. Word counting happens on
/// the normalized form so letter-spaced headings are not rejected.
fn looks_like_false_positive(surface: &str) -> bool {
    if surface.chars().count() < 3 || surface.chars().count() > 60 {
        return true;
    }
    if surface.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }
    let normalized = normalize_heading(surface);
    if normalized.split_whitespace().count() > 6 {
        return true;
    }
    const GENERIC: &[&str] = &[
        "details",
        "information",
        "description",
        "other",
        "misc",
        "miscellaneous",
    ];
    if GENERIC.contains(&normalized.as_str()) {
        return true;
    }
    const COMPANY_SUFFIXES: &[&str] = &["inc", "corp", "corporation", "ltd", "llc", "pvt", "limited"];
    surface
        .split_whitespace()
        .any(|w| COMPANY_SUFFIXES.contains(&w.trim_matches('.')))
}

/// Variants buffered during one parse, applied at commit time.
#[derive(Debug, Default)]
pub struct LearnedBatch {
    items: Vec<LearnedItem>,
}

#[derive(Debug)]
struct LearnedItem {
    section: CanonicalSection,
    surface: String,
    embedding: Option<Vec<f32>>,
}

impl LearnedBatch {
    /// Record a newly observed surface form for a section. Silently drops
    /// strings the false-positive guard rejects.
    pub fn record(&mut self, section: CanonicalSection, raw_surface: &str) {
        if section == CanonicalSection::Unknown {
            return;
        }
        let surface = surface_form(raw_surface);
        if surface.is_empty() || looks_like_false_positive(&surface) {
            return;
        }
        if self
            .items
            .iter()
            .any(|i| i.section == section && i.surface == surface)
        {
            return;
        }
        self.items.push(LearnedItem {
            section,
            surface,
            embedding: None,
        });
    }

    /// Attach an embedding to the most recently recorded surface form.
    fn attach_embedding(&mut self, section: CanonicalSection, surface: &str, vector: Vec<f32>) {
        if let Some(item) = self
            .items
            .iter_mut()
            .find(|i| i.section == section && i.surface == surface)
        {
            item.embedding = Some(vector);
        }
    }

    /// Whether anything was learned this parse.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Human-readable "surface -> Section" descriptions for diagnostics.
    pub fn descriptions(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|i| format!("{} -> {}", i.surface, i.section))
            .collect()
    }
}

/// Immutable view of the database taken at the start of a parse.
#[derive(Clone)]
pub struct Snapshot {
    surface: HashMap<String, CanonicalSection>,
    normalized: HashMap<String, CanonicalSection>,
    centroids: Vec<(CanonicalSection, Vec<f32>)>,
    embedder: Option<SharedEmbedder>,
    embedding_threshold: f32,
}

impl Snapshot {
    /// Match a candidate heading against the database.
    ///
    /// Pipeline: exact variant, normalized variant, trailing-colon retry,
    /// pattern rules, then (when an embedder is configured) cosine
    /// similarity against learned centroids.
    pub fn resolve(&self, raw: &str) -> SectionMatch {
        let surface = surface_form(raw);
        let normalized = normalize_heading(raw);

        if let Some(m) = self.resolve_variants(&surface, &normalized) {
            return m;
        }

        // Trailing-colon retry.
        let trimmed = surface.trim_end_matches(':').trim_end();
        if trimmed != surface {
            let trimmed_norm = normalize_heading(trimmed);
            if let Some(m) = self.resolve_variants(trimmed, &trimmed_norm) {
                return m;
            }
        }

        for (regex, section, score) in compiled_rules() {
            if regex.is_match(&surface) {
                return SectionMatch {
                    section: *section,
                    kind: MatchKind::Pattern,
                    score: *score,
                };
            }
        }

        if let Some(m) = self.resolve_embedding(&normalized) {
            return m;
        }

        SectionMatch::unknown()
    }

    fn resolve_variants(&self, surface: &str, normalized: &str) -> Option<SectionMatch> {
        if let Some(&section) = self.surface.get(surface) {
            return Some(SectionMatch {
                section,
                kind: MatchKind::Exact,
                score: 1.0,
            });
        }
        if let Some(&section) = self.normalized.get(normalized) {
            return Some(SectionMatch {
                section,
                kind: MatchKind::Normalized,
                score: 0.9,
            });
        }
        None
    }

    fn resolve_embedding(&self, normalized: &str) -> Option<SectionMatch> {
        let embedder = self.embedder.as_ref()?;
        if normalized.is_empty() || self.centroids.is_empty() {
            return None;
        }
        let vector = match embedder.embed(normalized) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("embedding failed for heading match: {e}");
                return None;
            }
        };
        let (section, similarity) = self
            .centroids
            .iter()
            .map(|(s, c)| (*s, cosine_similarity(&vector, c)))
            .max_by(|a, b| a.1.total_cmp(&b.1))?;
        if similarity >= self.embedding_threshold {
            Some(SectionMatch {
                section,
                kind: MatchKind::Embedding,
                score: similarity,
            })
        } else {
            None
        }
    }

    /// Resolve and learn in one step: a successful non-exact match above
    /// the learning floor buffers the observed surface form.
    pub fn resolve_learning(&self, raw: &str, batch: &mut LearnedBatch) -> SectionMatch {
        let matched = self.resolve(raw);
        if matched.is_known() && matched.kind != MatchKind::Exact && matched.score >= LEARN_SCORE_FLOOR
        {
            batch.record(matched.section, raw);
            if let Some(embedder) = &self.embedder {
                let surface = surface_form(raw);
                if let Ok(vector) = embedder.embed(&normalize_heading(raw)) {
                    batch.attach_embedding(matched.section, &surface, vector);
                }
            }
        }
        matched
    }

    /// Closest canonical sections for an unmatched heading, best first.
    pub fn suggestions(&self, raw: &str, limit: usize) -> Vec<(CanonicalSection, f32)> {
        let normalized = normalize_heading(raw);
        if normalized.is_empty() {
            return Vec::new();
        }
        let mut best: HashMap<CanonicalSection, f32> = HashMap::new();
        for (variant, &section) in &self.normalized {
            let score = strsim::jaro_winkler(&normalized, variant) as f32;
            let slot = best.entry(section).or_insert(0.0);
            if score > *slot {
                *slot = score;
            }
        }
        let mut ranked: Vec<(CanonicalSection, f32)> = best.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(limit);
        ranked
    }

    /// Number of distinct variants visible to this snapshot.
    pub fn variant_count(&self) -> usize {
        self.surface.len()
    }
}

impl HeaderLookup for Snapshot {
    fn canonical_for(&self, text: &str) -> Option<CanonicalSection> {
        let surface = surface_form(text);
        let normalized = normalize_heading(text);
        self.resolve_variants(&surface, &normalized)
            .map(|m| m.section)
    }
}

/// The shared section database.
pub struct SectionDb {
    path: Option<PathBuf>,
    embedder: Option<SharedEmbedder>,
    embedding_threshold: f32,
    inner: Mutex<DbFile>,
}

impl SectionDb {
    /// Load the database from `path`, seeding the built-in vocabulary when
    /// the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = if path.exists() {
            let data = fs::read_to_string(path)?;
            serde_json::from_str(&data).map_err(|e| Error::DatabaseLoad(e.to_string()))?
        } else {
            log::info!(
                "section database not found at {}, seeding defaults",
                path.display()
            );
            DbFile::seeded()
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            embedder: None,
            embedding_threshold: DEFAULT_EMBEDDING_THRESHOLD,
            inner: Mutex::new(file),
        })
    }

    /// An in-memory database with the built-in vocabulary; nothing is
    /// persisted.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            embedder: None,
            embedding_threshold: DEFAULT_EMBEDDING_THRESHOLD,
            inner: Mutex::new(DbFile::seeded()),
        }
    }

    /// Attach an embedding provider.
    pub fn with_embedder(mut self, embedder: SharedEmbedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Override the embedding similarity threshold.
    pub fn with_embedding_threshold(mut self, threshold: f32) -> Self {
        self.embedding_threshold = threshold;
        self
    }

    /// Take an immutable snapshot for one parse.
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.lock().expect("section db lock poisoned");
        let mut surface = HashMap::new();
        let mut normalized = HashMap::new();
        let mut centroids = Vec::new();
        for (key, entry) in &inner.sections {
            let Some(section) = CanonicalSection::from_key(key) else {
                continue;
            };
            for variant in &entry.variants {
                surface.insert(variant.clone(), section);
                let norm = normalize_heading(variant);
                if !norm.is_empty() {
                    normalized.entry(norm).or_insert(section);
                }
            }
            if let Some(centroid) = &entry.embedding_centroid {
                centroids.push((section, centroid.clone()));
            }
        }
        Snapshot {
            surface,
            normalized,
            centroids,
            embedder: self.embedder.clone(),
            embedding_threshold: self.embedding_threshold,
        }
    }

    /// Apply a learned batch and persist the database.
    ///
    /// The in-memory state is updated first; a failed write leaves it
    /// intact and returns [`Error::DatabaseWrite`].
    pub fn commit(&self, batch: &LearnedBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let snapshot = {
            let mut inner = self.inner.lock().expect("section db lock poisoned");
            for item in &batch.items {
                let entry = inner
                    .sections
                    .entry(item.section.as_str().to_string())
                    .or_default();
                if entry.variants.insert(item.surface.clone()) {
                    entry.usage_count += 1;
                    if let Some(vector) = &item.embedding {
                        match &mut entry.embedding_centroid {
                            Some(centroid) => {
                                update_centroid(centroid, vector, entry.usage_count.max(1) - 1)
                            }
                            None => entry.embedding_centroid = Some(vector.clone()),
                        }
                    }
                    log::debug!("learned variant '{}' -> {}", item.surface, item.section);
                }
            }
            inner.clone()
        };
        self.persist(&snapshot)
    }

    /// Force a write of the current state.
    pub fn flush(&self) -> Result<()> {
        let snapshot = self.inner.lock().expect("section db lock poisoned").clone();
        self.persist(&snapshot)
    }

    fn persist(&self, file: &DbFile) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(file)
            .map_err(|e| Error::DatabaseWrite(e.to_string()))?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| Error::DatabaseWrite(e.to_string()))?;
        fs::write(tmp.path(), json).map_err(|e| Error::DatabaseWrite(e.to_string()))?;
        tmp.persist(path)
            .map_err(|e| Error::DatabaseWrite(e.to_string()))?;
        Ok(())
    }

    /// Total variant count across all sections.
    pub fn variant_count(&self) -> usize {
        let inner = self.inner.lock().expect("section db lock poisoned");
        inner.sections.values().map(|e| e.variants.len()).sum()
    }
}
