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

pub mod aggregation;
pub mod config;
pub mod error;
pub mod runner;
pub mod store;
pub mod strategy;
pub mod time;
pub mod window;

pub use aggregation::{AggregationSettings, DayReport, EntityAggregator};
pub use config::{KindPlan, KindSpec, ProcessingPlan, ProcessingSpec};
pub use error::{AggregationError, ConfigError, StoreError, StoreResult};
pub use runner::{AggregationRunner, RunSummary, StrategyOutcome};
pub use store::{AggregatePoint, SeriesTags, TimeSeriesStore};
pub use strategy::{AggregationKind, AggregationStrategy, DailyAggregate, StrategyReport};
pub use time::{DEFAULT_TIMEZONE, LocalDay, Timestamp};
pub use window::pending_days;
