#![forbid(unsafe_code)]

pub mod analysis_client;
pub mod app_services;
pub mod error;
pub mod job_monitor;
pub mod quote_adapter;
pub mod row_builder;
pub mod settings_service;
pub mod sheet;

pub use quote_core::Clock;

pub use analysis_client::{AnalysisClient, AnalysisConfig, HttpAnalysisClient};
pub use app_services::{AppServices, AppServicesError};
pub use error::{AnalysisClientError, SheetError};
pub use job_monitor::{DEFAULT_POLL_INTERVAL, JobMonitor, JobMonitorHandle};
pub use quote_adapter::{QuoteLine, QuotePayload};
pub use settings_service::SettingsService;
pub use sheet::{SaveFailure, SaveReport, Sheet, SheetService, SheetTotals};
