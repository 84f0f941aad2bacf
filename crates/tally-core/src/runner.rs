// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Runs every configured aggregation strategy once

use crate::config::{ProcessingPlan, ProcessingSpec};
use crate::error::{AggregationError, ConfigError};
use crate::store::TimeSeriesStore;
use crate::strategy::{AggregationKind, AggregationStrategy, StrategyReport, build_strategy};
use crate::time::LocalDay;
use chrono_tz::Tz;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{Instrument, Span, error, info, warn};

/// How a single strategy ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    Completed(StrategyReport),
    Failed {
        name: String,
        error: AggregationError,
    },
    Panicked {
        name: String,
        message: String,
    },
}

impl StrategyOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Outcome of one `run_all` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub today: LocalDay,
    pub outcomes: Vec<StrategyOutcome>,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn days_written(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                StrategyOutcome::Completed(report) => report.days_written(),
                StrategyOutcome::Failed { .. } | StrategyOutcome::Panicked { .. } => 0,
            })
            .sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} strategies completed, {} failed, {} days written",
            self.completed(),
            self.failed(),
            self.days_written()
        )
    }
}

/// Owns the configured strategies and executes each one in isolation.
///
/// A strategy that errors or panics is logged and the remaining strategies
/// still run. Nothing is rolled back; the next run resumes from the store.
#[derive(Debug)]
pub struct AggregationRunner {
    strategies: Vec<Arc<dyn AggregationStrategy>>,
    timezone: Tz,
    span: Span,
}

impl AggregationRunner {
    pub fn new(timezone: Tz, span: Span) -> Self {
        Self {
            strategies: Vec::new(),
            timezone,
            span,
        }
    }

    /// Validate `spec` and build every strategy it configures.
    ///
    /// Configuration is checked before the store is contacted. The first raw
    /// data day is looked up once and shared by all entities; if that lookup
    /// fails the runner is still built and entities without prior output are
    /// skipped.
    pub async fn build(
        store: Arc<dyn TimeSeriesStore>,
        spec: &ProcessingSpec,
        timezone: Tz,
        span: Span,
    ) -> Result<Self, ConfigError> {
        let plan = spec.validate()?;

        let first_data_day = match store
            .read_earliest_day(&plan.input_bucket)
            .instrument(span.clone())
            .await
        {
            Ok(Some(day)) => {
                span.in_scope(|| {
                    info!("📅 First raw data day in '{}': {}", plan.input_bucket, day);
                });
                Some(day)
            }
            Ok(None) => {
                span.in_scope(|| warn!("⚠️ Bucket '{}' holds no raw data", plan.input_bucket));
                None
            }
            Err(e) => {
                span.in_scope(|| {
                    error!(
                        "❌ Could not look up first raw data day in '{}': {}",
                        plan.input_bucket, e
                    );
                });
                None
            }
        };

        Ok(Self::from_plan(&store, &plan, first_data_day.as_ref(), timezone, span))
    }

    /// Build from an already validated plan without touching the store
    pub fn from_plan(
        store: &Arc<dyn TimeSeriesStore>,
        plan: &ProcessingPlan,
        first_data_day: Option<&LocalDay>,
        timezone: Tz,
        span: Span,
    ) -> Self {
        let mut runner = Self::new(timezone, span);
        for kind_plan in &plan.kinds {
            let strategy = build_strategy(
                store,
                kind_plan,
                &plan.input_bucket,
                &plan.output_bucket,
                first_data_day,
                &runner.span,
            );
            runner.register(strategy);
        }
        runner
    }

    pub fn register(&mut self, strategy: Arc<dyn AggregationStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn strategies(&self) -> &[Arc<dyn AggregationStrategy>] {
        &self.strategies
    }

    pub fn kinds(&self) -> Vec<AggregationKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Run every strategy up to yesterday in the runner's zone
    pub async fn run_all(&self) -> RunSummary {
        self.run_all_at(&LocalDay::today(self.timezone)).await
    }

    /// Run every strategy, treating `today` as the current local day
    pub async fn run_all_at(&self, today: &LocalDay) -> RunSummary {
        self.run_strategies(today).instrument(self.span.clone()).await
    }

    async fn run_strategies(&self, today: &LocalDay) -> RunSummary {
        info!(
            "🚀 Running {} aggregation strategies (today = {})",
            self.strategies.len(),
            today
        );

        let mut outcomes = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            let name = strategy.name();

            // Spawned so a panic inside one strategy is contained
            let task = {
                let strategy = Arc::clone(strategy);
                let today = today.clone();
                tokio::spawn(
                    async move { strategy.process(&today).await }.instrument(Span::current()),
                )
            };

            let outcome = match task.await {
                Ok(Ok(report)) => {
                    info!(
                        "✅ {}: {} written, {} missing, {} failed days",
                        name,
                        report.days_written(),
                        report.days_missing(),
                        report.days_failed()
                    );
                    StrategyOutcome::Completed(report)
                }
                Ok(Err(error)) => {
                    error!("❌ Strategy {} failed: {}", name, error);
                    StrategyOutcome::Failed { name, error }
                }
                Err(join_error) => {
                    let message = if join_error.is_panic() {
                        panic_message(&*join_error.into_panic())
                    } else {
                        "task cancelled".to_string()
                    };
                    error!("💥 Strategy {} panicked: {}", name, message);
                    StrategyOutcome::Panicked { name, message }
                }
            };
            outcomes.push(outcome);
        }

        let summary = RunSummary {
            today: today.clone(),
            outcomes,
        };
        info!("🏁 Aggregation run finished: {}", summary);
        summary
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
