//! Component analyses and their grouping into rollout phases.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analyzer::PatternCounts;
use super::scoring::{Confidence, Level};

/// Analysis of one source artifact.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentAnalysis {
    /// Artifact path as given to the analyzer.
    pub path: String,
    /// Raw signal counts.
    pub patterns: PatternCounts,
    /// `lines/50 + branches*0.5 + loops*0.75`.
    pub complexity_score: f64,
    /// Bucketed complexity.
    pub complexity: Level,
    /// Readiness in `0..=100`.
    pub migration_score: u8,
    /// Migration risk.
    pub risk_level: Level,
    /// Estimated hours.
    pub effort_hours: f64,
    /// Migration priority.
    pub priority: Level,
    /// `Low` when the artifact was not readable text.
    pub confidence: Confidence,
}

/// One rollout phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    /// 1-based phase number.
    pub number: u8,
    /// Human-readable label.
    pub name: String,
    /// Components in rollout order.
    pub components: Vec<ComponentAnalysis>,
    /// Sum of the components' effort.
    pub effort_hours: f64,
}

/// Totals across the whole plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    /// Components analysed.
    pub total_components: usize,
    /// Effort across every phase.
    pub total_effort_hours: f64,
    /// Components per priority.
    pub by_priority: BTreeMap<Level, usize>,
    /// Components with high risk.
    pub high_risk: usize,
    /// Components analysed with low confidence.
    pub low_confidence: usize,
    /// Entity references summed over all components.
    pub entity_refs: BTreeMap<String, usize>,
}

impl PlanSummary {
    /// Share of components with high risk, `0` for an empty plan.
    pub fn high_risk_share(&self) -> f64 {
        if self.total_components == 0 {
            0.0
        } else {
            self.high_risk as f64 / self.total_components as f64
        }
    }
}

/// A phased migration plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlan {
    /// Phases 1 to 3, always present, possibly empty.
    pub phases: Vec<Phase>,
    /// Plan totals.
    pub summary: PlanSummary,
    /// When the plan was built.
    pub generated_at: DateTime<Utc>,
}

impl MigrationPlan {
    /// Phase by 1-based number.
    pub fn phase(&self, number: u8) -> Option<&Phase> {
        self.phases.iter().find(|p| p.number == number)
    }

    /// Every component in rollout order.
    pub fn components(&self) -> impl Iterator<Item = &ComponentAnalysis> {
        self.phases.iter().flat_map(|p| p.components.iter())
    }
}

const PHASES: [(u8, &str, Level); 3] = [
    (1, "Low risk / high impact", Level::High),
    (2, "Medium priority", Level::Medium),
    (3, "High risk / low impact", Level::Low),
];

/// Order components and bucket them into phases by priority.
///
/// Components are sorted by priority (high first), then risk (low first),
/// then score (high first), then path.
///
/// # Panics
///
/// This function never panics.
pub fn build_plan(mut analyses: Vec<ComponentAnalysis>) -> MigrationPlan {
    analyses.sort_by(|a, b| {
        (Reverse(a.priority), a.risk_level, Reverse(a.migration_score), &a.path).cmp(&(
            Reverse(b.priority),
            b.risk_level,
            Reverse(b.migration_score),
            &b.path,
        ))
    });

    let mut summary = PlanSummary {
        total_components: analyses.len(),
        ..PlanSummary::default()
    };
    for analysis in &analyses {
        *summary.by_priority.entry(analysis.priority).or_default() += 1;
        if analysis.risk_level == Level::High {
            summary.high_risk += 1;
        }
        if analysis.confidence == Confidence::Low {
            summary.low_confidence += 1;
        }
        for (entity, n) in &analysis.patterns.entities {
            *summary.entity_refs.entry(entity.clone()).or_default() += n;
        }
    }

    let phases: Vec<Phase> = PHASES
        .iter()
        .map(|&(number, name, priority)| {
            let components: Vec<ComponentAnalysis> = analyses
                .iter()
                .filter(|a| a.priority == priority)
                .cloned()
                .collect();
            Phase {
                number,
                name: name.to_string(),
                effort_hours: components.iter().map(|c| c.effort_hours).sum(),
                components,
            }
        })
        .collect();
    summary.total_effort_hours = phases.iter().map(|p| p.effort_hours).sum();

    MigrationPlan {
        phases,
        summary,
        generated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(path: &str, priority: Level, risk: Level, score: u8, effort: f64) -> ComponentAnalysis {
        ComponentAnalysis {
            path: path.into(),
            patterns: PatternCounts::default(),
            complexity_score: 1.0,
            complexity: Level::Low,
            migration_score: score,
            risk_level: risk,
            effort_hours: effort,
            priority,
            confidence: Confidence::High,
        }
    }

    #[test]
    fn test_phases_follow_priority() {
        let plan = build_plan(vec![
            component("c.js", Level::Low, Level::High, 10, 5.0),
            component("a.js", Level::High, Level::Low, 90, 2.0),
            component("b.js", Level::Medium, Level::Medium, 50, 3.0),
        ]);
        assert_eq!(plan.phases.len(), 3);
        assert_eq!(plan.phase(1).unwrap().components[0].path, "a.js");
        assert_eq!(plan.phase(2).unwrap().components[0].path, "b.js");
        assert_eq!(plan.phase(3).unwrap().components[0].path, "c.js");
        assert_eq!(plan.summary.total_effort_hours, 10.0);
        assert_eq!(plan.summary.high_risk, 1);
    }

    #[test]
    fn test_within_phase_sorted_by_risk_then_score() {
        let plan = build_plan(vec![
            component("medium-risk.js", Level::Medium, Level::Medium, 90, 1.0),
            component("low-score.js", Level::Medium, Level::Low, 40, 1.0),
            component("high-score.js", Level::Medium, Level::Low, 60, 1.0),
        ]);
        let order: Vec<&str> = plan.components().map(|c| c.path.as_str()).collect();
        assert_eq!(order, vec!["high-score.js", "low-score.js", "medium-risk.js"]);
        assert_eq!(plan.phase(2).unwrap().effort_hours, 3.0);
    }

    #[test]
    fn test_empty_plan() {
        let plan = build_plan(Vec::new());
        assert!(plan.phases.iter().all(|p| p.components.is_empty()));
        assert_eq!(plan.summary.high_risk_share(), 0.0);
    }
}
