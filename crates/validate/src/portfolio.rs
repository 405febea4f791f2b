use serde::Serialize;

use crate::model::{ComparisonRun, Finding, OverallStatus, Severity, SeverityCounts};

/// One line per run in a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOverview {
    pub name: String,
    pub base_name: String,
    pub compare_name: String,
    pub status: OverallStatus,
    pub discrepancies: usize,
    pub severity: SeverityCounts,
}

/// A non-Info finding tagged with the run it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioFinding {
    pub run: String,
    #[serde(flatten)]
    pub finding: Finding,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub runs: usize,
    pub passed: usize,
    pub warnings: usize,
    pub failed: usize,
    /// Worst run status; Pass for an empty portfolio.
    pub verdict: OverallStatus,
    pub severity: SeverityCounts,
    pub overview: Vec<RunOverview>,
    pub findings: Vec<PortfolioFinding>,
}

/// Aggregate runs, naming each by its base result set.
pub fn summarize(runs: &[ComparisonRun]) -> PortfolioSummary {
    let labeled: Vec<(&str, &ComparisonRun)> = runs.iter().map(|r| (r.base_name(), r)).collect();
    summarize_labeled(&labeled)
}

/// Aggregate runs under caller-chosen names.
pub fn summarize_labeled(runs: &[(&str, &ComparisonRun)]) -> PortfolioSummary {
    let mut summary = PortfolioSummary {
        runs: runs.len(),
        passed: 0,
        warnings: 0,
        failed: 0,
        verdict: OverallStatus::Pass,
        severity: SeverityCounts::default(),
        overview: Vec::with_capacity(runs.len()),
        findings: Vec::new(),
    };

    for (name, run) in runs {
        let status = run.overall_status();
        match status {
            OverallStatus::Pass => summary.passed += 1,
            OverallStatus::Warning => summary.warnings += 1,
            OverallStatus::Fail => summary.failed += 1,
        }
        summary.verdict = summary.verdict.max(status);
        summary.severity.merge(&run.summary().severity);

        summary.overview.push(RunOverview {
            name: name.to_string(),
            base_name: run.base_name().to_string(),
            compare_name: run.compare_name().to_string(),
            status,
            discrepancies: run.discrepancies().count(),
            severity: run.summary().severity,
        });

        summary.findings.extend(
            run.findings()
                .iter()
                .filter(|f| f.severity > Severity::Info)
                .map(|f| PortfolioFinding {
                    run: name.to_string(),
                    finding: f.clone(),
                }),
        );
    }

    summary
        .findings
        .sort_by(|a, b| a.run.cmp(&b.run).then_with(|| Finding::report_order(&a.finding, &b.finding)));
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompareOptions, FieldSpec};
    use crate::engine::compare;
    use crate::model::{Record, ResultSet};

    fn run(name: &str, base_rows: Vec<Record>, qc_rows: Vec<Record>) -> ComparisonRun {
        let base = ResultSet::new(name, ["id"], base_rows).unwrap();
        let qc = ResultSet::new(format!("{name}_qc"), ["id"], qc_rows).unwrap();
        let options = CompareOptions::default().with_fields(vec![FieldSpec::numeric("val").abs(0.01)]);
        compare(&base, &qc, &options).unwrap()
    }

    fn row(id: i32, val: f64) -> Record {
        Record::new().with("id", id).with("val", val)
    }

    #[test]
    fn empty_portfolio_passes() {
        let summary = summarize(&[]);
        assert_eq!(summary.runs, 0);
        assert_eq!(summary.verdict, OverallStatus::Pass);
        assert!(summary.findings.is_empty());
    }

    #[test]
    fn counts_and_verdict() {
        let runs = vec![
            run("t14_1", vec![row(1, 1.0)], vec![row(1, 1.0)]),
            run("t14_2", vec![row(1, 1.0)], vec![row(1, 2.0)]),
            run("l16_1", vec![row(1, 1.0)], vec![row(1, 1.0).with("extra", 1)]),
        ];
        let summary = summarize(&runs);
        assert_eq!(summary.runs, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.warnings, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.verdict, OverallStatus::Fail);
        assert_eq!(summary.overview[1].name, "t14_2");
        assert_eq!(summary.overview[1].discrepancies, 1);
    }

    #[test]
    fn findings_exclude_info_and_sort_by_run() {
        let runs = vec![
            run("t14_2", vec![row(2, 1.0), row(1, 1.0)], vec![row(1, 5.0), row(2, 5.0)]),
            run("l16_1", vec![row(1, 1.0)], vec![row(1, 1.0), row(9, 0.0)]),
        ];
        let summary = summarize(&runs);
        let order: Vec<(String, String)> = summary
            .findings
            .iter()
            .map(|f| (f.run.clone(), f.finding.key.to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("l16_1".to_string(), "9".to_string()),
                ("t14_2".to_string(), "1".to_string()),
                ("t14_2".to_string(), "2".to_string()),
            ]
        );
        assert!(summary.findings.iter().all(|f| f.finding.severity > Severity::Info));
    }

    #[test]
    fn labels_override_base_names() {
        let a = run("adsl", vec![row(1, 1.0)], vec![row(1, 1.0)]);
        let summary = summarize_labeled(&[("ADSL v2", &a)]);
        assert_eq!(summary.overview[0].name, "ADSL v2");
        assert_eq!(summary.overview[0].base_name, "adsl");
    }
}
