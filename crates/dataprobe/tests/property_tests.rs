//! Property-based tests for dataprobe.
//!
//! These tests use proptest to generate random columns, tables and graphs
//! and check that the engine keeps its invariants on all of them.
//!
//! # Running Property Tests
//!
//! ```bash
//! cargo test -p dataprobe --test property_tests
//!
//! # More cases
//! PROPTEST_CASES=10000 cargo test -p dataprobe --test property_tests
//! ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use proptest::prelude::*;

use dataprobe::inference::StatisticalAnalyzer;
use dataprobe::validation::{DetectionContext, DetectorSet};
use dataprobe::{
    generate_fix, ColumnRef, DataTable, IssueType, LineageGraph, Probe, ProbeConfig, RunId,
    TableId, TransformType, Value,
};

// =============================================================================
// Test Strategies
// =============================================================================

/// A single cell: mostly text that may look numeric, a date, or blank.
fn cell() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => "[a-zA-Z0-9 _\\-\\.!@]{0,12}".prop_map(Value::text),
        3 => (-1000i64..1000).prop_map(|n| Value::Number(n as f64)),
        2 => (-1.0e6f64..1.0e6).prop_map(Value::Number),
        1 => "20[0-2][0-9]-0[1-9]-1[0-9]".prop_map(Value::text),
        1 => Just(Value::Null),
        1 => Just(Value::text("NA")),
        1 => any::<bool>().prop_map(Value::Bool),
    ]
}

fn column() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(cell(), 1..60)
}

/// Rows for a table with 1-4 columns.
fn rows() -> impl Strategy<Value = (usize, Vec<Vec<Value>>)> {
    (1usize..5).prop_flat_map(|width| {
        (
            Just(width),
            prop::collection::vec(prop::collection::vec(cell(), width), 1..30),
        )
    })
}

fn issue_type() -> impl Strategy<Value = IssueType> {
    prop::sample::select(IssueType::ALL.to_vec())
}

// =============================================================================
// Profiling
// =============================================================================

proptest! {
    #[test]
    fn prop_profile_is_deterministic(values in column()) {
        let config = ProbeConfig::default();
        let analyzer = StatisticalAnalyzer::new(&config);
        let run = RunId::from("run_000001");
        let a = analyzer.profile_column("c", 0, &values, &run, DateTime::<Utc>::UNIX_EPOCH);
        let b = analyzer.profile_column("c", 0, &values, &run, DateTime::<Utc>::UNIX_EPOCH);
        prop_assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn prop_profile_counts_are_consistent(values in column()) {
        let config = ProbeConfig::default();
        let analyzer = StatisticalAnalyzer::new(&config);
        let profile = analyzer.profile_column(
            "c", 0, &values, &RunId::from("run_000001"), DateTime::<Utc>::UNIX_EPOCH,
        );

        prop_assert_eq!(profile.total_count, values.len());
        prop_assert!(profile.null_count <= profile.total_count);
        prop_assert!(profile.distinct_count <= profile.non_null_count());
        prop_assert!((0.0..=1.0).contains(&profile.cardinality_ratio));
        prop_assert!(profile.sample_values.len() <= config.sample_cap);
        if let (Some(stats), Some(bounds)) = (&profile.numeric, &profile.outlier_bounds) {
            prop_assert!(stats.q1 <= stats.median && stats.median <= stats.q3);
            prop_assert!(bounds.lower <= stats.q1 && bounds.upper >= stats.q3);
        }
    }

    #[test]
    fn prop_one_issue_per_type_per_column(values in column()) {
        let config = ProbeConfig::default();
        let analyzer = StatisticalAnalyzer::new(&config);
        let run = RunId::from("run_000001");
        let table = TableId::from("tbl_prop");
        let profile = analyzer.profile_column("amount", 0, &values, &run, DateTime::<Utc>::UNIX_EPOCH);

        let ctx = DetectionContext {
            config: &config,
            dates: analyzer.dates(),
            table_id: &table,
            run_id: &run,
            detected_at: DateTime::<Utc>::UNIX_EPOCH,
        };
        let issues = DetectorSet::new().detect_column(&profile, &values, &ctx);

        let mut seen = HashSet::new();
        for issue in &issues {
            prop_assert!(seen.insert(issue.issue_type));
            prop_assert!(issue.affected_count <= values.len());
            prop_assert!((0.0..=1.0).contains(&issue.affected_fraction));
            prop_assert!(issue.issue_type != IssueType::GenericIssue);
        }
    }

    #[test]
    fn prop_runs_always_commit((width, rows) in rows()) {
        let headers = (0..width).map(|i| format!("col_{}", i)).collect();
        let data = DataTable::new(headers, rows).unwrap();

        let probe = Probe::new();
        let id = probe.register_table("prop", "prop.csv");
        let report = probe.profile_table(&id, &data).unwrap();

        prop_assert!(report.is_committed());
        prop_assert_eq!(report.bundle.profiles.len(), width);
        prop_assert_eq!(report.bundle.fixes.len(), report.bundle.issues.len());
    }
}

// =============================================================================
// Fixes
// =============================================================================

proptest! {
    #[test]
    fn prop_fix_is_total(kind in issue_type(), column in proptest::option::of("[a-z_]{1,10}")) {
        let probe = Probe::new();
        let id = probe.register_table("fixes", "fixes.csv");
        let data = DataTable::new(vec!["x".to_string()], vec![vec![Value::Null]]).unwrap();
        let report = probe.profile_table(&id, &data).unwrap();

        let mut issue = report.bundle.issues[0].clone();
        issue.issue_type = kind;
        issue.column = column.clone();

        let fix = generate_fix(&issue);
        prop_assert_eq!(fix.issue_type, kind);
        prop_assert!(!fix.sql_template.is_empty());
        prop_assert!(fix.render().contains(id.as_str()));
        prop_assert_eq!(fix.params.contains_key("column"), column.is_some());
    }
}

// =============================================================================
// Lineage
// =============================================================================

proptest! {
    #[test]
    fn prop_traversal_visits_each_node_once(
        edges in prop::collection::vec((0usize..8, 0usize..8), 0..30),
        start in 0usize..8,
    ) {
        let graph = LineageGraph::new();
        let node = |i: usize| ColumnRef::new("t", format!("c{}", i));
        for (from, to) in &edges {
            graph.add_edge(node(*from), node(*to), TransformType::Direct);
        }

        for hops in [graph.downstream(&node(start), None), graph.upstream(&node(start), None)] {
            let mut seen = HashSet::new();
            let mut last_depth = 1;
            for hop in &hops {
                prop_assert!(hop.column != node(start));
                prop_assert!(seen.insert(hop.column.clone()));
                prop_assert!(hop.depth >= last_depth);
                last_depth = hop.depth;
            }
            prop_assert!(hops.len() < 8);
        }
    }
}
