//! CSV input tables and the billing-record export.
//!
//! RULE: Only loader.rs touches the filesystem for data.
//! Rows are kept as read; date parsing and cleaning belong to the normalizer.

use crate::{
    billing::BillingRecord,
    config::PipelineConfig,
    error::{PipelineError, PipelineResult},
    rate_table::Plan,
    types::{PlanName, UserId},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::File;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRow {
    pub user_id:   UserId,
    pub call_date: String,
    pub duration:  f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRow {
    pub user_id:      UserId,
    pub message_date: String,
}

/// Internet sessions tolerate blank ids and volumes; the normalizer drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRow {
    pub user_id:      Option<UserId>,
    pub session_date: String,
    pub mb_used:      Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRow {
    pub user_id:    UserId,
    pub plan:       PlanName,
    pub city:       String,
    #[serde(default)]
    pub churn_date: Option<String>,
}

/// The five source tables exactly as read from disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDataset {
    pub calls:    Vec<CallRow>,
    pub internet: Vec<SessionRow>,
    pub messages: Vec<MessageRow>,
    pub plans:    Vec<Plan>,
    pub users:    Vec<UserRow>,
}

/// Read all five tables from `data_dir`. Any unreadable or malformed table
/// fails the load; nothing partial is returned.
pub fn load_dataset(data_dir: &str, config: &PipelineConfig) -> PipelineResult<RawDataset> {
    let files = &config.sources;
    let dataset = RawDataset {
        calls:    read_table(&format!("{data_dir}/{}", files.calls), "calls")?,
        internet: read_table(&format!("{data_dir}/{}", files.internet), "internet")?,
        messages: read_table(&format!("{data_dir}/{}", files.messages), "messages")?,
        plans:    read_table(&format!("{data_dir}/{}", files.plans), "plans")?,
        users:    read_table(&format!("{data_dir}/{}", files.users), "users")?,
    };
    log::info!(
        "loader: {} calls, {} sessions, {} messages, {} plans, {} users from {data_dir}",
        dataset.calls.len(),
        dataset.internet.len(),
        dataset.messages.len(),
        dataset.plans.len(),
        dataset.users.len(),
    );
    Ok(dataset)
}

pub fn read_table<T: DeserializeOwned>(path: &str, source_name: &str) -> PipelineResult<Vec<T>> {
    let file = File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_string(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|source| PipelineError::Csv {
            source_name: source_name.to_string(),
            source,
        })
}

/// Write the billing record stream as CSV, one row per user-month.
pub fn write_billing_csv(path: &str, records: &[BillingRecord]) -> PipelineResult<()> {
    let csv_err = |source| PipelineError::Csv {
        source_name: path.to_string(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for record in records {
        writer.serialize(record).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| PipelineError::Io {
        path: path.to_string(),
        source,
    })?;
    log::info!("loader: wrote {} billing records to {path}", records.len());
    Ok(())
}
