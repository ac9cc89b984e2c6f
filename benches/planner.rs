//! Planner benchmarks: pattern extraction and plan building.
//!
//! - Analyse one 200-line component:  well under 1ms
//! - Build a plan over 1 000 analyses: dominated by sorting

use backend_migrator::planner::{build_plan, MigrationPlanner};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn component(lines: usize) -> String {
    let mut src = String::from(
        "import { base44 } from \"@/api/base44Client\";\nimport { useQuery } from \"@tanstack/react-query\";\n",
    );
    for i in 0..lines {
        src.push_str(&format!(
            "const r{i} = useQuery({{ queryFn: () => base44.entities.Team.filter({{ page: {i} }}) }});\n"
        ));
    }
    src
}

fn bench_analyze_source(c: &mut Criterion) {
    let planner = MigrationPlanner::new().expect("planner");
    let src = component(200);
    c.bench_function("planner_analyze_200_lines", |b| {
        b.iter(|| black_box(planner.analyze_source("Bench.jsx", black_box(&src))))
    });
}

fn bench_build_plan(c: &mut Criterion) {
    let planner = MigrationPlanner::new().expect("planner");
    let analyses: Vec<_> = (0..1_000)
        .map(|i| planner.analyze_source(&format!("C{i}.jsx"), &component(i % 40 + 1)))
        .collect();
    c.bench_function("planner_build_plan_1000", |b| {
        b.iter(|| black_box(build_plan(black_box(analyses.clone()))))
    });
}

criterion_group!(benches, bench_analyze_source, bench_build_plan);
criterion_main!(benches);
