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

//! Aggregation kinds and the strategies that implement them

use crate::aggregation::{AggregationSettings, DayReport, EntityAggregator};
use crate::config::KindPlan;
use crate::error::{AggregationError, ConfigError};
use crate::store::TimeSeriesStore;
use crate::time::LocalDay;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{Span, error, info, info_span};

/// Supported aggregation kinds.
/// Each kind is configured under its config value in `entities_to_process`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    /// One value per entity per local day
    DailyAggregate,
    // Future kinds can be added here:
    // WeeklyAggregate,
    // MonthlyAggregate,
}

impl AggregationKind {
    /// Get human-readable name for the kind
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::DailyAggregate => "Daily aggregate",
        }
    }

    /// Get config key (snake_case)
    pub fn to_config_value(&self) -> &'static str {
        match self {
            Self::DailyAggregate => "daily_aggregate",
        }
    }

    /// List all supported kinds
    pub fn all() -> &'static [AggregationKind] {
        &[Self::DailyAggregate]
    }

    /// Comma separated config values of all supported kinds
    pub fn supported_list() -> String {
        Self::all()
            .iter()
            .map(AggregationKind::to_config_value)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_config_value())
    }
}

impl FromStr for AggregationKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily_aggregate" => Ok(Self::DailyAggregate),
            _ => Err(ConfigError::UnknownKind(s.to_string())),
        }
    }
}

/// Result of one successful strategy pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyReport {
    pub kind: AggregationKind,
    pub entities: Vec<DayReport>,
}

impl StrategyReport {
    pub fn days_written(&self) -> usize {
        self.entities.iter().map(|r| r.written.len()).sum()
    }

    pub fn days_missing(&self) -> usize {
        self.entities.iter().map(|r| r.missing.len()).sum()
    }

    pub fn days_failed(&self) -> usize {
        self.entities.iter().map(|r| r.failed.len()).sum()
    }
}

/// One configured aggregation kind, ready to run
#[async_trait]
pub trait AggregationStrategy: Send + Sync + fmt::Debug {
    fn kind(&self) -> AggregationKind;

    /// Name used in logs
    fn name(&self) -> String {
        self.kind().display_name().to_string()
    }

    /// Process every configured entity up to the day before `today`
    async fn process(&self, today: &LocalDay) -> Result<StrategyReport, AggregationError>;
}

/// Build the strategy for a validated kind
pub fn build_strategy(
    store: &Arc<dyn TimeSeriesStore>,
    plan: &KindPlan,
    input_bucket: &str,
    output_bucket: &str,
    first_data_day: Option<&LocalDay>,
    parent: &Span,
) -> Arc<dyn AggregationStrategy> {
    match plan.kind {
        AggregationKind::DailyAggregate => Arc::new(DailyAggregate::new(
            store,
            plan,
            input_bucket,
            output_bucket,
            first_data_day,
            parent,
        )),
    }
}

/// Writes the largest raw value of each local day, one point per entity per day
#[derive(Debug)]
pub struct DailyAggregate {
    aggregators: Vec<EntityAggregator>,
    span: Span,
}

impl DailyAggregate {
    pub fn new(
        store: &Arc<dyn TimeSeriesStore>,
        plan: &KindPlan,
        input_bucket: &str,
        output_bucket: &str,
        first_data_day: Option<&LocalDay>,
        parent: &Span,
    ) -> Self {
        let span = info_span!(parent: parent, "daily_aggregate", version = %plan.version);
        let settings = Arc::new(AggregationSettings {
            input_bucket: input_bucket.to_string(),
            output_bucket: output_bucket.to_string(),
            version: plan.version.clone(),
            scenario: plan.scenario.clone(),
            field: plan.field.clone(),
            unit: plan.unit.clone(),
            source_field: plan.source_field.clone(),
        });

        let aggregators = plan
            .entities
            .iter()
            .map(|entity_id| {
                EntityAggregator::new(
                    Arc::clone(store),
                    entity_id.clone(),
                    Arc::clone(&settings),
                    first_data_day.cloned(),
                    &span,
                )
            })
            .collect();

        Self { aggregators, span }
    }

    pub fn entity_ids(&self) -> Vec<&str> {
        self.aggregators.iter().map(EntityAggregator::entity_id).collect()
    }
}

#[async_trait]
impl AggregationStrategy for DailyAggregate {
    fn kind(&self) -> AggregationKind {
        AggregationKind::DailyAggregate
    }

    async fn process(&self, today: &LocalDay) -> Result<StrategyReport, AggregationError> {
        self.span.in_scope(|| {
            info!(
                "🔄 Daily aggregation for {} entities up to {}",
                self.aggregators.len(),
                today.pred()
            );
        });

        let mut entities = Vec::with_capacity(self.aggregators.len());
        let mut failed_entities = Vec::new();

        for aggregator in &self.aggregators {
            match aggregator.process(today).await {
                Ok(report) => entities.push(report),
                Err(e) => {
                    self.span.in_scope(|| {
                        error!("❌ Skipping {}: {}", aggregator.entity_id(), e);
                    });
                    failed_entities.push(aggregator.entity_id().to_string());
                }
            }
        }

        if failed_entities.is_empty() {
            Ok(StrategyReport {
                kind: self.kind(),
                entities,
            })
        } else {
            Err(AggregationError::Incomplete {
                kind: self.kind(),
                failed_entities,
            })
        }
    }
}
