//! # Stage: Static Migration Planning
//!
//! ## Responsibility
//! Read source artifacts (never execute them), score how ready each one is
//! to move from the legacy SDK to REST, and group them into a phased
//! rollout plan with effort estimates and recommendations.
//!
//! ## Guarantees
//! - Pure: the same artifacts always yield the same scores and ordering
//! - Total: malformed artifacts (empty, binary, not UTF-8) are scored as
//!   low-priority with low confidence instead of failing
//! - Bounded: scores stay in `0..=100`, effort is at least one hour
//!
//! ## NOT Responsible For
//! - Parsing the source language (all signals are regex counts)
//! - Performing the migration

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::PlannerConfig;

pub mod analyzer;
pub mod insights;
pub mod plan;
pub mod scoring;

// Re-exports for convenience
pub use analyzer::{PatternCounts, SourceAnalyzer};
pub use insights::{insights, render_json, render_text, Insight, InsightKind};
pub use plan::{build_plan, ComponentAnalysis, MigrationPlan, Phase, PlanSummary};
pub use scoring::{Confidence, Level};

/// Errors from reading artifacts or configuring patterns.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// A configured regex did not compile.
    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        /// Compiler error.
        #[source]
        source: regex::Error,
    },

    /// The analysis root could not be read.
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Analyzes artifacts and builds plans.
///
/// # Example
/// ```rust
/// use backend_migrator::planner::{Level, MigrationPlanner};
///
/// let planner = MigrationPlanner::new().ok();
/// let analysis = planner.map(|p| p.analyze_source("Empty.jsx", ""));
/// assert_eq!(analysis.map(|a| a.priority), Some(Level::Low));
/// ```
#[derive(Debug, Clone)]
pub struct MigrationPlanner {
    analyzer: SourceAnalyzer,
    extensions: Vec<String>,
    skip_dirs: Vec<String>,
}

impl MigrationPlanner {
    /// Planner with the built-in patterns and file filters.
    ///
    /// # Errors
    ///
    /// Never in practice; see [`SourceAnalyzer::new`].
    pub fn new() -> Result<Self, PlannerError> {
        Self::from_config(&PlannerConfig::default())
    }

    /// Planner using the `[planner]` config section.
    ///
    /// # Errors
    ///
    /// [`PlannerError::Pattern`] if a configured regex does not compile.
    pub fn from_config(config: &PlannerConfig) -> Result<Self, PlannerError> {
        Ok(Self {
            analyzer: SourceAnalyzer::from_config(config)?,
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            skip_dirs: config.skip_dirs.clone(),
        })
    }

    /// Analyze one artifact's text.
    ///
    /// Blank text is treated as malformed.
    pub fn analyze_source(&self, path: &str, text: &str) -> ComponentAnalysis {
        if text.trim().is_empty() || text.contains('\0') {
            return malformed(path);
        }
        let patterns = self.analyzer.count(text);
        let a = scoring::assess(&patterns);
        ComponentAnalysis {
            path: path.to_string(),
            patterns,
            complexity_score: a.complexity_score,
            complexity: a.complexity,
            migration_score: a.migration_score,
            risk_level: a.risk,
            effort_hours: a.effort_hours,
            priority: a.priority,
            confidence: Confidence::High,
        }
    }

    /// Analyze raw bytes; non-UTF-8 input is scored as malformed.
    pub fn analyze_bytes(&self, path: &str, bytes: &[u8]) -> ComponentAnalysis {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.analyze_source(path, text),
            Err(_) => malformed(path),
        }
    }

    /// Analyze every matching file under `root`.
    ///
    /// Skips hidden directories and the configured `skip_dirs`. Files that
    /// cannot be read are scored as malformed. Paths are reported relative
    /// to `root`.
    ///
    /// # Errors
    ///
    /// [`PlannerError::Io`] if `root` itself cannot be read.
    pub fn analyze_dir(&self, root: &Path) -> Result<Vec<ComponentAnalysis>, PlannerError> {
        std::fs::metadata(root).map_err(|source| PlannerError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        let mut analyses = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_skipped_dir(e));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.has_source_extension(entry.path()) {
                continue;
            }
            let rel_path = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            let analysis = match std::fs::read(entry.path()) {
                Ok(bytes) => self.analyze_bytes(&rel_path, &bytes),
                Err(e) => {
                    warn!(path = %rel_path, error = %e, "cannot read artifact");
                    malformed(&rel_path)
                }
            };
            debug!(
                path = %analysis.path,
                score = analysis.migration_score,
                priority = %analysis.priority,
                "artifact analysed"
            );
            analyses.push(analysis);
        }

        info!(root = %root.display(), components = analyses.len(), "directory analysed");
        Ok(analyses)
    }

    /// Build a phased plan from analyses.
    pub fn plan(&self, analyses: Vec<ComponentAnalysis>) -> MigrationPlan {
        build_plan(analyses)
    }

    /// Analyze `root` and plan it.
    ///
    /// # Errors
    ///
    /// See [`analyze_dir`](Self::analyze_dir).
    pub fn plan_dir(&self, root: &Path) -> Result<MigrationPlan, PlannerError> {
        Ok(self.plan(self.analyze_dir(root)?))
    }

    fn is_skipped_dir(&self, entry: &walkdir::DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.') || self.skip_dirs.iter().any(|d| d == name.as_ref())
    }

    fn has_source_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_ascii_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            })
            .unwrap_or(false)
    }
}

fn malformed(path: &str) -> ComponentAnalysis {
    let a = scoring::unreadable();
    ComponentAnalysis {
        path: path.to_string(),
        patterns: PatternCounts::default(),
        complexity_score: a.complexity_score,
        complexity: a.complexity,
        migration_score: a.migration_score,
        risk_level: a.risk,
        effort_hours: a.effort_hours,
        priority: a.priority,
        confidence: Confidence::Low,
    }
}
