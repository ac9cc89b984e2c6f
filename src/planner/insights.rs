//! Recommendations derived from a plan's totals, and report rendering.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::plan::MigrationPlan;
use super::scoring::Level;

/// Phase-1 size at which starting immediately is recommended.
pub const QUICK_WIN_THRESHOLD: usize = 3;
/// High-risk share above which tests are recommended first.
pub const HIGH_RISK_SHARE: f64 = 0.3;
/// Total effort above which the work should be split across sprints.
pub const SPRINT_SPLIT_HOURS: f64 = 80.0;
/// Number of entities suggested as first candidates.
pub const ENTITY_CANDIDATES: usize = 3;

/// Category of an insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// Enough easy components to start now.
    QuickWins,
    /// Many components are risky.
    TestCoverage,
    /// Too much work for one iteration.
    Scheduling,
    /// A heavily referenced entity worth moving first.
    EntityCandidate,
    /// Some artifacts could not be analysed.
    LowConfidence,
}

/// One recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// Category.
    pub kind: InsightKind,
    /// Recommendation text.
    pub message: String,
}

/// Derive recommendations from `plan`.
///
/// # Panics
///
/// This function never panics.
pub fn insights(plan: &MigrationPlan) -> Vec<Insight> {
    let summary = &plan.summary;
    let mut out = Vec::new();

    let quick_wins = plan.phase(1).map(|p| p.components.len()).unwrap_or(0);
    if quick_wins >= QUICK_WIN_THRESHOLD {
        out.push(Insight {
            kind: InsightKind::QuickWins,
            message: format!(
                "Start with phase 1 immediately: {quick_wins} low-risk components are ready to migrate"
            ),
        });
    }

    if summary.high_risk_share() > HIGH_RISK_SHARE {
        out.push(Insight {
            kind: InsightKind::TestCoverage,
            message: format!(
                "Add tests before migrating high-risk components ({} of {})",
                summary.high_risk, summary.total_components
            ),
        });
    }

    if summary.total_effort_hours > SPRINT_SPLIT_HOURS {
        out.push(Insight {
            kind: InsightKind::Scheduling,
            message: format!(
                "Split the migration across multiple sprints ({:.1}h estimated)",
                summary.total_effort_hours
            ),
        });
    }

    let mut entities: Vec<(&String, &usize)> = summary.entity_refs.iter().collect();
    entities.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (entity, refs) in entities.into_iter().take(ENTITY_CANDIDATES) {
        out.push(Insight {
            kind: InsightKind::EntityCandidate,
            message: format!("Migrate entity {entity} first ({refs} references)"),
        });
    }

    if summary.low_confidence > 0 {
        out.push(Insight {
            kind: InsightKind::LowConfidence,
            message: format!(
                "Review {} artifact(s) that could not be analysed as text",
                summary.low_confidence
            ),
        });
    }

    out
}

/// Pretty-printed JSON report.
///
/// # Errors
///
/// Returns the serializer error; does not occur for plans built by this
/// crate.
pub fn render_json(plan: &MigrationPlan) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(plan)
}

/// Human-readable report.
pub fn render_text(plan: &MigrationPlan) -> String {
    let summary = &plan.summary;
    let count = |level: Level| summary.by_priority.get(&level).copied().unwrap_or(0);

    let mut out = String::new();
    let _ = writeln!(out, "Migration plan ({})", plan.generated_at.to_rfc3339());
    let _ = writeln!(
        out,
        "{} components, {:.1}h total effort (priority high {} / medium {} / low {})",
        summary.total_components,
        summary.total_effort_hours,
        count(Level::High),
        count(Level::Medium),
        count(Level::Low),
    );

    for phase in &plan.phases {
        let _ = writeln!(
            out,
            "\nPhase {}: {} ({} components, {:.1}h)",
            phase.number,
            phase.name,
            phase.components.len(),
            phase.effort_hours
        );
        for c in &phase.components {
            let _ = writeln!(
                out,
                "  {:<48} score {:>3}  risk {:<6}  effort {:>5.1}h",
                c.path, c.migration_score, c.risk_level, c.effort_hours
            );
        }
    }

    let notes = insights(plan);
    if !notes.is_empty() {
        let _ = writeln!(out, "\nInsights:");
        for note in notes {
            let _ = writeln!(out, "  - {}", note.message);
        }
    }
    out
}
