//! Static planner tests over a temporary source tree.
//!
//! Tests in this module verify:
//! - a ready legacy component lands in phase 1 with low risk
//! - skipped directories, hidden directories and foreign extensions are ignored
//! - unreadable artifacts are scored low-confidence instead of failing
//! - the CLI writes a JSON plan and prints insights
//! - log lines go to stderr, leaving stdout parseable

use std::fs;
use std::path::Path;
use std::process::Command;

use backend_migrator::planner::{Confidence, Level, MigrationPlanner};
use serde_json::Value;

const TEAM_PANEL: &str = r#"import { base44 } from "@/api/base44Client";
import { useQuery, useMutation } from "@tanstack/react-query";

const { Team } = base44.entities;

export function TeamPanel({ teamId }) {
  const teams = useQuery({ queryKey: ["teams"], queryFn: () => base44.entities.Team.list() });
  const members = useQuery({ queryKey: ["members"], queryFn: () => base44.entities.TeamMember.filter({ teamId }) });
  const rename = useMutation({ mutationFn: (name) => Team.update(teamId, { name }) });
  return { teams, members, rename };
}
"#;

const REST_CLIENT: &str = r#"import axios from "axios";

export const getTeams = () => axios.get("/api/teams");
"#;

fn write(root: &Path, rel: &str, bytes: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("test: create dirs");
    }
    fs::write(path, bytes).expect("test: write fixture");
}

fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("test: tempdir");
    let root = dir.path();
    write(root, "src/components/TeamPanel.jsx", TEAM_PANEL.as_bytes());
    write(root, "src/api/client.ts", REST_CLIENT.as_bytes());
    write(root, "src/assets/logo.js", &[0xff, 0xd8, 0xff, 0x00, 0x10]);
    write(root, "node_modules/pkg/index.js", TEAM_PANEL.as_bytes());
    write(root, ".cache/TeamPanel.jsx", TEAM_PANEL.as_bytes());
    write(root, "README.md", b"base44.entities.Team.list()");
    dir
}

#[test]
fn test_ready_legacy_component_is_high_priority_low_risk() {
    let planner = MigrationPlanner::new().expect("test: planner");
    let analysis = planner.analyze_source("TeamPanel.jsx", TEAM_PANEL);

    assert_eq!(analysis.patterns.legacy_refs, 5);
    assert_eq!(analysis.patterns.rest_deps, 0);
    assert_eq!(analysis.complexity, Level::Low);
    assert_eq!(analysis.risk_level, Level::Low);
    assert_eq!(analysis.priority, Level::High);
    assert_eq!(analysis.patterns.dominant_entity.as_deref(), Some("Team"));
}

#[test]
fn test_plain_legacy_references_are_high_priority() {
    let src = "const a = base44.auth;\nconst b = base44.config;\nconst c = base44.appId;\nconst d = base44.storage;\nconst e = base44.functions;\n";
    let planner = MigrationPlanner::new().expect("test: planner");
    let analysis = planner.analyze_source("Settings.jsx", src);

    assert_eq!(analysis.patterns.legacy_refs, 5);
    assert_eq!(analysis.patterns.rest_deps, 0);
    assert_eq!(analysis.complexity, Level::Low);
    assert_eq!(analysis.risk_level, Level::Low);
    assert_eq!(analysis.priority, Level::High);
}

#[test]
fn test_analyze_dir_filters_and_scores() {
    let dir = fixture();
    let planner = MigrationPlanner::new().expect("test: planner");
    let analyses = planner.analyze_dir(dir.path()).expect("test: analyze");

    let mut paths: Vec<&str> = analyses.iter().map(|a| a.path.as_str()).collect();
    paths.sort_unstable();
    assert_eq!(
        paths,
        vec![
            "src/api/client.ts",
            "src/assets/logo.js",
            "src/components/TeamPanel.jsx"
        ]
    );

    let logo = analyses
        .iter()
        .find(|a| a.path.ends_with("logo.js"))
        .expect("test: logo analysed");
    assert_eq!(logo.confidence, Confidence::Low);
    assert_eq!(logo.priority, Level::Low);

    let client = analyses
        .iter()
        .find(|a| a.path.ends_with("client.ts"))
        .expect("test: client analysed");
    assert!(client.patterns.rest_deps > 0);
    assert_eq!(client.priority, Level::Low);
}

#[test]
fn test_plan_dir_puts_ready_component_in_phase_one() {
    let dir = fixture();
    let planner = MigrationPlanner::new().expect("test: planner");
    let plan = planner.plan_dir(dir.path()).expect("test: plan");

    let phase1 = plan.phase(1).expect("test: phase 1");
    assert_eq!(phase1.components.len(), 1);
    assert_eq!(phase1.components[0].path, "src/components/TeamPanel.jsx");
    assert_eq!(plan.phase(3).expect("test: phase 3").components.len(), 2);
    assert_eq!(plan.summary.total_components, 3);
    assert_eq!(plan.summary.low_confidence, 1);
    assert_eq!(plan.summary.entity_refs.get("Team"), Some(&2));
}

#[test]
fn test_cli_writes_json_plan_and_prints_insights() {
    let dir = fixture();
    let out = dir.path().join("plan.json");
    let bin = env!("CARGO_BIN_EXE_migration-planner");

    let status = Command::new(bin)
        .arg("analyze")
        .arg(dir.path())
        .args(["--format", "json", "--output"])
        .arg(&out)
        .status()
        .expect("test: run analyze");
    assert!(status.success());

    let plan: Value =
        serde_json::from_str(&fs::read_to_string(&out).expect("test: read plan")).expect("test: json");
    assert_eq!(plan["phases"].as_array().map(Vec::len), Some(3));
    assert_eq!(plan["summary"]["total_components"], 3);

    let output = Command::new(bin)
        .arg("insights")
        .arg(dir.path())
        .output()
        .expect("test: run insights");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Migrate entity Team first"), "got: {stdout}");
}

#[test]
fn test_cli_json_on_stdout_is_not_mixed_with_logs() {
    let dir = fixture();
    let output = Command::new(env!("CARGO_BIN_EXE_migration-planner"))
        .env("RUST_LOG", "debug")
        .env("LOG_FORMAT", "json")
        .arg("analyze")
        .arg(dir.path())
        .args(["--format", "json"])
        .output()
        .expect("test: run analyze");
    assert!(output.status.success());

    let plan: Value = serde_json::from_slice(&output.stdout).expect("test: stdout is one JSON plan");
    assert_eq!(plan["summary"]["total_components"], 3);
    assert!(String::from_utf8_lossy(&output.stderr).contains("directory analysed"));
}
