//! Readiness score, risk, effort and priority from pattern counts.
//!
//! | Signal                         | Effect on score            |
//! |--------------------------------|----------------------------|
//! | any legacy reference           | +40, plus `min(refs*8, 40)`|
//! | CRUD calls                     | `+min(calls*3, 15)`        |
//! | distinct entities              | `+min(entities*4, 12)`     |
//! | modern data hooks              | +10                        |
//! | explicit legacy import         | +10                        |
//! | complexity medium / high       | −10 / −20                  |
//! | REST dependencies present      | −15                        |
//!
//! The sum is clamped to `0..=100`.

use serde::{Deserialize, Serialize};

use super::analyzer::PatternCounts;

/// Three-step scale used for complexity, risk and priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Low.
    Low,
    /// Medium.
    Medium,
    /// High.
    High,
}

impl Level {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// How far the analysis can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// The artifact was readable text.
    High,
    /// The artifact was empty, binary or not UTF-8.
    Low,
}

/// Scores derived from one artifact's counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// `lines/50 + branches*0.5 + loops*0.75`.
    pub complexity_score: f64,
    /// Bucketed complexity.
    pub complexity: Level,
    /// Migration readiness in `0..=100`.
    pub migration_score: u8,
    /// Migration risk.
    pub risk: Level,
    /// Estimated hours, at least 1.
    pub effort_hours: f64,
    /// Migration priority.
    pub priority: Level,
}

/// Score `counts`.
///
/// # Panics
///
/// This function never panics.
pub fn assess(counts: &PatternCounts) -> Assessment {
    let complexity_score = complexity_score(counts);
    let complexity = complexity_level(complexity_score);
    let migration_score = migration_score(counts, complexity);
    let risk = risk_level(counts, complexity);
    Assessment {
        complexity_score,
        complexity,
        migration_score,
        risk,
        effort_hours: effort_hours(counts, complexity),
        priority: priority(migration_score, risk),
    }
}

/// The fixed assessment of an artifact that could not be read as text.
pub fn unreadable() -> Assessment {
    Assessment {
        complexity_score: 0.0,
        complexity: Level::Low,
        migration_score: 0,
        risk: Level::Low,
        effort_hours: 1.0,
        priority: Level::Low,
    }
}

/// Raw complexity.
pub fn complexity_score(counts: &PatternCounts) -> f64 {
    counts.lines as f64 / 50.0 + counts.branches as f64 * 0.5 + counts.loops as f64 * 0.75
}

/// `low` below 10, `medium` below 25, else `high`.
pub fn complexity_level(score: f64) -> Level {
    if score < 10.0 {
        Level::Low
    } else if score < 25.0 {
        Level::Medium
    } else {
        Level::High
    }
}

/// Readiness score, see the module table.
pub fn migration_score(counts: &PatternCounts, complexity: Level) -> u8 {
    let mut score: i64 = 0;
    if counts.legacy_refs > 0 {
        score += 40 + capped(counts.legacy_refs, 8, 40);
    }
    score += capped(counts.api_calls(), 3, 15);
    score += capped(counts.entities.len(), 4, 12);
    if counts.modern_hooks {
        score += 10;
    }
    score -= match complexity {
        Level::Low => 0,
        Level::Medium => 10,
        Level::High => 20,
    };
    if counts.explicit_legacy_import {
        score += 10;
    }
    if counts.rest_deps > 0 {
        score -= 15;
    }
    score.clamp(0, 100) as u8
}

/// Risk from complexity, mutating calls and external imports.
pub fn risk_level(counts: &PatternCounts, complexity: Level) -> Level {
    let mut points = match complexity {
        Level::Low => 0,
        Level::Medium => 1,
        Level::High => 2,
    };
    points += match counts.mutating_calls() {
        0 => 0,
        1..=3 => 1,
        _ => 2,
    };
    if counts.external_imports > 10 {
        points += 1;
    }
    match points {
        0..=1 => Level::Low,
        2..=3 => Level::Medium,
        _ => Level::High,
    }
}

/// Estimated hours, floored at 1.
pub fn effort_hours(counts: &PatternCounts, complexity: Level) -> f64 {
    let multiplier = match complexity {
        Level::Low => 1.0,
        Level::Medium => 2.0,
        Level::High => 4.0,
    };
    let hours = multiplier * 2.0
        + counts.api_calls() as f64 * 0.5
        + counts.entities.len() as f64
        + counts.imports() as f64 * 0.25;
    hours.max(1.0)
}

/// `high` above 70 with low risk; `low` below 30 or with high risk.
pub fn priority(score: u8, risk: Level) -> Level {
    if score > 70 && risk == Level::Low {
        Level::High
    } else if score < 30 || risk == Level::High {
        Level::Low
    } else {
        Level::Medium
    }
}

fn capped(count: usize, weight: i64, cap: i64) -> i64 {
    (count as i64).saturating_mul(weight).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn counts() -> PatternCounts {
        PatternCounts {
            legacy_refs: 5,
            explicit_legacy_import: true,
            reads: 3,
            updates: 1,
            entities: BTreeMap::from([("Users".to_string(), 3), ("Teams".to_string(), 1)]),
            modern_hooks: true,
            lines: 40,
            branches: 2,
            loops: 1,
            internal_imports: 2,
            external_imports: 2,
            ..PatternCounts::default()
        }
    }

    #[test]
    fn test_ready_component_scores_high_priority() {
        let a = assess(&counts());
        // 40 + 40 + 12 + 8 + 10 + 10, clamped
        assert_eq!(a.migration_score, 100);
        assert_eq!(a.complexity, Level::Low);
        assert_eq!(a.risk, Level::Low);
        assert_eq!(a.priority, Level::High);
    }

    #[test]
    fn test_rest_dependency_and_complexity_penalties() {
        let mut c = counts();
        c.rest_deps = 1;
        c.branches = 30;
        let a = assess(&c);
        assert_eq!(a.complexity, Level::Medium);
        assert_eq!(a.migration_score, 120 - 15 - 10);
        assert_eq!(a.priority, Level::Medium);
    }

    #[test]
    fn test_legacy_references_alone_reach_high_priority() {
        let c = PatternCounts {
            legacy_refs: 5,
            lines: 5,
            ..PatternCounts::default()
        };
        let a = assess(&c);
        assert_eq!(a.migration_score, 80);
        assert_eq!(a.complexity, Level::Low);
        assert_eq!(a.risk, Level::Low);
        assert_eq!(a.priority, Level::High);

        let single = PatternCounts {
            legacy_refs: 1,
            ..PatternCounts::default()
        };
        assert_eq!(assess(&single).priority, Level::Medium);
    }

    #[test]
    fn test_score_clamped_at_zero() {
        let c = PatternCounts {
            rest_deps: 3,
            lines: 5000,
            ..PatternCounts::default()
        };
        let a = assess(&c);
        assert_eq!(a.migration_score, 0);
        assert_eq!(a.complexity, Level::High);
        assert_eq!(a.priority, Level::Low);
    }

    #[test]
    fn test_risk_points() {
        let mut c = PatternCounts::default();
        assert_eq!(risk_level(&c, Level::Low), Level::Low);
        c.updates = 4;
        assert_eq!(risk_level(&c, Level::Low), Level::Medium);
        c.external_imports = 11;
        assert_eq!(risk_level(&c, Level::Medium), Level::High);
    }

    #[test]
    fn test_effort_floor_and_formula() {
        assert_eq!(effort_hours(&PatternCounts::default(), Level::Low), 2.0);
        // 4*2 + 4*0.5 + 2 + 4*0.25
        assert_eq!(effort_hours(&counts(), Level::High), 13.0);
        assert_eq!(unreadable().effort_hours, 1.0);
    }

    #[test]
    fn test_priority_boundaries() {
        assert_eq!(priority(71, Level::Low), Level::High);
        assert_eq!(priority(70, Level::Low), Level::Medium);
        assert_eq!(priority(29, Level::Low), Level::Low);
        assert_eq!(priority(95, Level::High), Level::Low);
    }
}
