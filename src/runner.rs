// src/runner.rs - Sequential suite execution and reports

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::client::ApiClient;
use crate::config::Config;
use crate::error::ConformanceError;
use crate::suites::Suite;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed(String),
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub name: String,
    #[serde(flatten)]
    pub status: CaseStatus,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub suite: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<CaseOutcome>,
    /// Set when the after-all hook failed
    pub teardown_error: Option<String>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.count(|s| matches!(s, CaseStatus::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, CaseStatus::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, CaseStatus::Skipped))
    }

    fn count(&self, pred: impl Fn(&CaseStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.teardown_error.is_none()
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.suite)?;
        for outcome in &self.outcomes {
            match &outcome.status {
                CaseStatus::Passed => writeln!(f, "  ✅ {} ({}ms)", outcome.name, outcome.duration_ms)?,
                CaseStatus::Skipped => writeln!(f, "  ⏭️  {} (skipped)", outcome.name)?,
                CaseStatus::Failed(message) => {
                    writeln!(f, "  ❌ {} ({}ms)", outcome.name, outcome.duration_ms)?;
                    writeln!(f, "     {}", message)?;
                }
            }
        }
        if let Some(teardown) = &self.teardown_error {
            writeln!(f, "  ⚠️  after-all failed: {}", teardown)?;
        }
        write!(
            f,
            "  {} passed, {} failed, {} skipped",
            self.passed(),
            self.failed(),
            self.skipped()
        )
    }
}

/// Object-safe view of a [`Suite`], used by the registry and the CLI
#[async_trait]
pub trait RunnableSuite: Send + Sync {
    fn name(&self) -> String;

    /// Case names with their skip flag
    fn case_names(&self) -> Vec<(String, bool)>;

    async fn run(&self, client: &ApiClient, config: &Config) -> SuiteReport;
}

#[async_trait]
impl<S> RunnableSuite for S
where
    S: Suite,
{
    fn name(&self) -> String {
        Suite::name(self)
    }

    fn case_names(&self) -> Vec<(String, bool)> {
        self.cases().into_iter().map(|c| (c.name, c.skip)).collect()
    }

    async fn run(&self, client: &ApiClient, config: &Config) -> SuiteReport {
        run_suite(self, client, config).await
    }
}

/// Run one suite: before-all, each case under the case timeout followed by
/// after-each, then after-all regardless of failures.
pub async fn run_suite<S: Suite>(suite: &S, client: &ApiClient, config: &Config) -> SuiteReport {
    let name = Suite::name(suite);
    let started_at = Utc::now();
    let cases = suite.cases();
    let mut ctx = suite.context(client.clone(), config);
    let mut outcomes = Vec::with_capacity(cases.len());

    info!(suite = %name, cases = cases.len(), "Running suite");

    match suite.before_all(&mut ctx).await {
        Err(e) => {
            error!(suite = %name, error = %e, "before-all failed, no case will run");
            let message = format!("before-all failed: {}", e);
            for case in &cases {
                let status = if case.skip {
                    CaseStatus::Skipped
                } else {
                    CaseStatus::Failed(message.clone())
                };
                outcomes.push(CaseOutcome {
                    name: case.name.clone(),
                    status,
                    duration_ms: 0,
                });
            }
        }
        Ok(()) => {
            for case in &cases {
                if case.skip {
                    outcomes.push(CaseOutcome {
                        name: case.name.clone(),
                        status: CaseStatus::Skipped,
                        duration_ms: 0,
                    });
                    continue;
                }

                let started = Instant::now();
                let mut status = match tokio::time::timeout(config.case_timeout(), case.run(&ctx)).await {
                    Ok(Ok(())) => CaseStatus::Passed,
                    Ok(Err(e)) => CaseStatus::Failed(e.to_string()),
                    Err(_) => CaseStatus::Failed(
                        ConformanceError::Timeout {
                            timeout_seconds: config.timing.case_timeout_seconds,
                        }
                        .to_string(),
                    ),
                };

                if let Err(e) = suite.after_each(&ctx).await {
                    warn!(suite = %name, case = %case.name, error = %e, "after-each failed");
                    if status == CaseStatus::Passed {
                        status = CaseStatus::Failed(format!("after-each failed: {}", e));
                    }
                }

                let duration_ms = started.elapsed().as_millis() as u64;
                match &status {
                    CaseStatus::Failed(message) => {
                        warn!(suite = %name, case = %case.name, duration_ms, "Case failed: {}", message)
                    }
                    _ => info!(suite = %name, case = %case.name, duration_ms, "Case passed"),
                }

                outcomes.push(CaseOutcome {
                    name: case.name.clone(),
                    status,
                    duration_ms,
                });
            }
        }
    }

    let teardown_error = match suite.after_all(&ctx).await {
        Ok(()) => None,
        Err(e) => {
            warn!(suite = %name, error = %e, "after-all failed");
            Some(e.to_string())
        }
    };

    let report = SuiteReport {
        suite: name,
        started_at,
        finished_at: Utc::now(),
        outcomes,
        teardown_error,
    };

    info!(
        suite = %report.suite,
        passed = report.passed(),
        failed = report.failed(),
        skipped = report.skipped(),
        "Suite finished"
    );
    report
}

/// Run suites one after the other
pub async fn run_all(
    suites: &[Box<dyn RunnableSuite>],
    client: &ApiClient,
    config: &Config,
) -> Vec<SuiteReport> {
    let mut reports = Vec::with_capacity(suites.len());
    for suite in suites {
        reports.push(suite.run(client, config).await);
    }
    reports
}
