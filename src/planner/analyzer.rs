//! Pattern extraction from a single source artifact.
//!
//! Every signal the planner scores is a regex hit count over the raw text.
//! Nothing is parsed or executed, so the analyzer accepts any text and
//! never fails on odd input.
//!
//! ## Signals
//!
//! 1. **Legacy references**: SDK client identifiers (`base44.`,
//!    `@base44/sdk`, `entities.<Name>`, `integrations.<name>`) plus any
//!    configured patterns
//! 2. **CRUD calls**: `.create(`, `.list(` / `.filter(` / `.get(`,
//!    `.update(`, `.delete(`
//! 3. **Entities**: names used as `entities.<Name>` or `<Name>.<crud>(`
//! 4. **Hooks**: `useQuery`, `useMutation`, `useEffect`, `useState`,
//!    `useSWR`, `fetch(`
//! 5. **Shape**: lines, branches and loops
//! 6. **Imports**: internal (relative or `@/`) and external
//! 7. **REST dependencies**: `apiClient`, `axios`, `fetch(`, `/api/`

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::PlannerError;
use crate::config::PlannerConfig;

const LEGACY_PATTERNS: &[&str] = &[
    r"\bbase44\.",
    r"@base44/sdk",
    r"\bentities\.[A-Z]\w*",
    r"\bintegrations\.\w+",
];

const REST_PATTERNS: &[&str] = &[r"\bapiClient\b", r"\baxios\b", r"\bfetch\(", r#"['"`]/api/"#];

const MODERN_HOOKS: &[&str] = &["useQuery", "useMutation", "useSWR"];

/// Raw signal counts for one artifact.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternCounts {
    /// Legacy-SDK reference hits.
    pub legacy_refs: usize,
    /// The file imports the legacy SDK or its client explicitly.
    pub explicit_legacy_import: bool,
    /// `.create(` calls.
    pub creates: usize,
    /// `.list(`, `.filter(` and `.get(` calls.
    pub reads: usize,
    /// `.update(` calls.
    pub updates: usize,
    /// `.delete(` calls.
    pub deletes: usize,
    /// Reference count per entity name.
    pub entities: BTreeMap<String, usize>,
    /// Most referenced entity; ties go to the alphabetically first name.
    pub dominant_entity: Option<String>,
    /// Hit count per hook or data-fetching call.
    pub hooks: BTreeMap<String, usize>,
    /// `useQuery`, `useMutation` or `useSWR` is present.
    pub modern_hooks: bool,
    /// Line count.
    pub lines: usize,
    /// Branch count.
    pub branches: usize,
    /// Loop count.
    pub loops: usize,
    /// Relative or `@/` imports.
    pub internal_imports: usize,
    /// Package imports.
    pub external_imports: usize,
    /// REST-client dependency hits.
    pub rest_deps: usize,
}

impl PatternCounts {
    /// Total CRUD calls.
    pub fn api_calls(&self) -> usize {
        self.creates + self.reads + self.updates + self.deletes
    }

    /// Calls that change data (`update` + `delete`).
    pub fn mutating_calls(&self) -> usize {
        self.updates + self.deletes
    }

    /// Total imports.
    pub fn imports(&self) -> usize {
        self.internal_imports + self.external_imports
    }
}

/// Compiled pattern set.
#[derive(Debug, Clone)]
pub struct SourceAnalyzer {
    legacy: Vec<Regex>,
    rest: Vec<Regex>,
    explicit_import: Regex,
    create: Regex,
    read: Regex,
    update: Regex,
    delete: Regex,
    entity_sdk: Regex,
    entity_call: Regex,
    hook: Regex,
    branch: Regex,
    looping: Regex,
    import: Regex,
}

impl SourceAnalyzer {
    /// Analyzer with the built-in patterns only.
    ///
    /// # Errors
    ///
    /// Never in practice; the built-in patterns are valid.
    pub fn new() -> Result<Self, PlannerError> {
        Self::from_config(&PlannerConfig::default())
    }

    /// Analyzer with the built-in patterns plus the configured extras.
    ///
    /// # Errors
    ///
    /// [`PlannerError::Pattern`] if a configured regex does not compile.
    pub fn from_config(config: &PlannerConfig) -> Result<Self, PlannerError> {
        let compile_all = |builtin: &[&str], extra: &[String]| -> Result<Vec<Regex>, PlannerError> {
            builtin
                .iter()
                .copied()
                .chain(extra.iter().map(String::as_str))
                .map(compile)
                .collect()
        };
        Ok(Self {
            legacy: compile_all(LEGACY_PATTERNS, &config.legacy_patterns)?,
            rest: compile_all(REST_PATTERNS, &config.rest_patterns)?,
            explicit_import: compile(
                r#"(?m)^\s*(?:import\b[^;]*(?:@base44/sdk|\bbase44\b)|.*require\(\s*['"]@base44/sdk['"])"#,
            )?,
            create: compile(r"\.create\(")?,
            read: compile(r"\.(?:list|filter|get)\(")?,
            update: compile(r"\.update\(")?,
            delete: compile(r"\.delete\(")?,
            entity_sdk: compile(r"\bentities\.([A-Z]\w*)")?,
            entity_call: compile(r"(?:^|[^.\w])([A-Z]\w*)\.(?:create|list|filter|get|update|delete)\(")?,
            hook: compile(r"\b(useQuery|useMutation|useEffect|useState|useSWR)\b|\b(fetch)\(")?,
            branch: compile(r"\bif\b|\bswitch\b|\bcase\b|\s\?\s|&&|\|\|")?,
            looping: compile(r"\bfor\b|\bwhile\b|\.map\(|\.forEach\(")?,
            import: compile(
                r#"(?m)^\s*import\b(?:[^'"]*?\bfrom\s*)?\s*['"]([^'"]+)['"]|\brequire\(\s*['"]([^'"]+)['"]\s*\)"#,
            )?,
        })
    }

    /// Count every signal in `text`.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn count(&self, text: &str) -> PatternCounts {
        let hits = |re: &Regex| re.find_iter(text).count();

        let mut entities: BTreeMap<String, usize> = BTreeMap::new();
        for caps in self
            .entity_sdk
            .captures_iter(text)
            .chain(self.entity_call.captures_iter(text))
        {
            if let Some(name) = caps.get(1) {
                *entities.entry(name.as_str().to_string()).or_default() += 1;
            }
        }
        let dominant_entity = entities
            .iter()
            .fold(None::<(&String, usize)>, |best, (name, &n)| match best {
                Some((_, top)) if top >= n => best,
                _ => Some((name, n)),
            })
            .map(|(name, _)| name.clone());

        let mut hooks: BTreeMap<String, usize> = BTreeMap::new();
        for caps in self.hook.captures_iter(text) {
            if let Some(name) = caps.get(1).or_else(|| caps.get(2)) {
                *hooks.entry(name.as_str().to_string()).or_default() += 1;
            }
        }
        let modern_hooks = MODERN_HOOKS.iter().any(|h| hooks.contains_key(*h));

        let (mut internal_imports, mut external_imports) = (0, 0);
        for caps in self.import.captures_iter(text) {
            if let Some(source) = caps.get(1).or_else(|| caps.get(2)) {
                let source = source.as_str();
                if source.starts_with('.') || source.starts_with("@/") {
                    internal_imports += 1;
                } else {
                    external_imports += 1;
                }
            }
        }

        PatternCounts {
            legacy_refs: self.legacy.iter().map(hits).sum(),
            explicit_legacy_import: self.explicit_import.is_match(text),
            creates: hits(&self.create),
            reads: hits(&self.read),
            updates: hits(&self.update),
            deletes: hits(&self.delete),
            entities,
            dominant_entity,
            hooks,
            modern_hooks,
            lines: text.lines().count(),
            branches: hits(&self.branch),
            loops: hits(&self.looping),
            internal_imports,
            external_imports,
            rest_deps: self.rest.iter().map(hits).sum(),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, PlannerError> {
    Regex::new(pattern).map_err(|source| PlannerError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> SourceAnalyzer {
        SourceAnalyzer::new().expect("test: built-in patterns compile")
    }

    #[test]
    fn test_counts_legacy_usage() {
        let src = r#"
import { base44 } from "@/api/base44Client";
const users = await base44.entities.Users.list();
await base44.entities.Teams.update(id, data);
"#;
        let counts = analyzer().count(src);
        assert!(counts.explicit_legacy_import);
        // base44. x2, entities.Users, entities.Teams
        assert_eq!(counts.legacy_refs, 4);
        assert_eq!(counts.reads, 1);
        assert_eq!(counts.updates, 1);
        assert_eq!(counts.entities.get("Users"), Some(&1));
        assert_eq!(counts.entities.get("Teams"), Some(&1));
        assert_eq!(counts.internal_imports, 1);
    }

    #[test]
    fn test_entity_call_without_sdk_prefix() {
        let counts = analyzer().count("await Goal.create(x);\nawait Goal.delete(y);\n");
        assert_eq!(counts.entities.get("Goal"), Some(&2));
        assert_eq!(counts.dominant_entity.as_deref(), Some("Goal"));
        assert_eq!(counts.mutating_calls(), 1);
        assert_eq!(counts.api_calls(), 2);
    }

    #[test]
    fn test_hooks_and_rest_deps() {
        let src = r#"
import axios from "axios";
import { useQuery } from "@tanstack/react-query";
const [a, setA] = useState(0);
const q = useQuery({ queryFn: () => fetch("/api/teams") });
"#;
        let counts = analyzer().count(src);
        assert!(counts.modern_hooks);
        assert_eq!(counts.hooks.get("useState"), Some(&1));
        assert_eq!(counts.hooks.get("fetch"), Some(&1));
        // axios x2 (import name + source), fetch(, "/api/
        assert_eq!(counts.rest_deps, 4);
        assert_eq!(counts.external_imports, 2);
        assert!(!counts.explicit_legacy_import);
    }

    #[test]
    fn test_branches_and_loops() {
        let src = "if (a && b) {}\nelse if (c || d) {}\nitems.map(x => x);\nfor (;;) {}\n";
        let counts = analyzer().count(src);
        assert_eq!(counts.branches, 4);
        assert_eq!(counts.loops, 2);
        assert_eq!(counts.lines, 4);
    }

    #[test]
    fn test_configured_pattern_counts_as_legacy() {
        let config = PlannerConfig {
            legacy_patterns: vec![r"\blegacyClient\b".into()],
            ..PlannerConfig::default()
        };
        let analyzer = SourceAnalyzer::from_config(&config).expect("test: valid pattern");
        assert_eq!(analyzer.count("legacyClient.call(); legacyClient.x").legacy_refs, 2);
    }

    #[test]
    fn test_invalid_configured_pattern_rejected() {
        let config = PlannerConfig {
            rest_patterns: vec!["(".into()],
            ..PlannerConfig::default()
        };
        assert!(matches!(
            SourceAnalyzer::from_config(&config),
            Err(PlannerError::Pattern { .. })
        ));
    }
}
