// Job Domain Model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::domain::blob::BlobId;
use crate::domain::error::{DomainError, Result};

/// Job ID (opaque, assigned by the pipeline stage that created the job)
pub type JobId = String;

/// Job State shared with the other stages of the migration pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    PendingReconciliation,
    Done,
    Error,
    Aborted,
    PendingSruHarvester,
    PendingOaiPmhHarvester,
    PendingFintoHarvester,
}

impl JobState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            JobState::PendingReconciliation => "PENDING_RECONCILIATION",
            JobState::Done => "DONE",
            JobState::Error => "ERROR",
            JobState::Aborted => "ABORTED",
            JobState::PendingSruHarvester => "PENDING_SRU_HARVESTER",
            JobState::PendingOaiPmhHarvester => "PENDING_OAI_PMH_HARVESTER",
            JobState::PendingFintoHarvester => "PENDING_FINTO_HARVESTER",
        }
    }

    /// Terminal states never leave the store's watched set again
    pub const fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Error | JobState::Aborted)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING_RECONCILIATION" => Ok(JobState::PendingReconciliation),
            "DONE" => Ok(JobState::Done),
            "ERROR" => Ok(JobState::Error),
            "ABORTED" => Ok(JobState::Aborted),
            "PENDING_SRU_HARVESTER" => Ok(JobState::PendingSruHarvester),
            "PENDING_OAI_PMH_HARVESTER" => Ok(JobState::PendingOaiPmhHarvester),
            "PENDING_FINTO_HARVESTER" => Ok(JobState::PendingFintoHarvester),
            other => Err(DomainError::UnknownJobState(other.to_string())),
        }
    }
}

/// Harvest search type. Unknown values are kept verbatim so a reset can
/// report them instead of losing them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HarvestType {
    Sru,
    OaiPmh,
    Finto,
    Other(String),
}

impl HarvestType {
    pub fn as_str(&self) -> &str {
        match self {
            HarvestType::Sru => "sru",
            HarvestType::OaiPmh => "oai-pmh",
            HarvestType::Finto => "finto",
            HarvestType::Other(s) => s,
        }
    }
}

impl From<String> for HarvestType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "sru" => HarvestType::Sru,
            "oai-pmh" => HarvestType::OaiPmh,
            "finto" => HarvestType::Finto,
            _ => HarvestType::Other(s),
        }
    }
}

impl From<HarvestType> for String {
    fn from(t: HarvestType) -> Self {
        match t {
            HarvestType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for HarvestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Harvest cursor descriptor (`linkDataHarvestSearch`)
///
/// Apart from `type`, every key is kept as stored in `fields`: absent keys
/// stay absent and explicit `null`s stay `null`. Only the cursor keys
/// (`offset`, `resumptionToken`) are ever rewritten by the watcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestSearch {
    #[serde(rename = "type")]
    pub harvest_type: HarvestType,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// SRU cursor key
pub const OFFSET_KEY: &str = "offset";

/// OAI-PMH cursor key
pub const RESUMPTION_TOKEN_KEY: &str = "resumptionToken";

impl HarvestSearch {
    pub fn new(harvest_type: HarvestType) -> Self {
        Self {
            harvest_type,
            fields: Map::new(),
        }
    }

    /// Builder-style insert of a stored key
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Stored SRU offset, if it is a non-negative integer
    pub fn offset(&self) -> Option<u64> {
        self.get(OFFSET_KEY).and_then(Value::as_u64)
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.fields.insert(OFFSET_KEY.to_string(), Value::from(offset));
    }

    /// Stored OAI-PMH resumption token, if it is a string
    pub fn resumption_token(&self) -> Option<&str> {
        self.get(RESUMPTION_TOKEN_KEY).and_then(Value::as_str)
    }

    pub fn set_resumption_token(&mut self, token: impl Into<String>) {
        self.fields
            .insert(RESUMPTION_TOKEN_KEY.to_string(), Value::String(token.into()));
    }
}

/// Harvest configuration of a job (`jobConfig`)
///
/// Only `linkDataHarvestSearch` is typed. `sourceRecord`, the harvester
/// profile, validation filters and any other key live in `fields` exactly
/// as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    pub link_data_harvest_search: HarvestSearch,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl JobConfig {
    pub fn new(link_data_harvest_search: HarvestSearch) -> Self {
        Self {
            link_data_harvest_search,
            fields: Map::new(),
        }
    }

    /// Builder-style insert of a stored top-level key
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn harvest_type(&self) -> &HarvestType {
        &self.link_data_harvest_search.harvest_type
    }
}

/// Job Entity - one migration unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: JobId,
    pub state: JobState,
    /// Evaluated in stored order
    pub blob_ids: Vec<BlobId>,
    pub job_config: JobConfig,
}

impl Job {
    /// Create a job waiting for blob reconciliation
    pub fn new(job_id: impl Into<String>, blob_ids: Vec<BlobId>, job_config: JobConfig) -> Self {
        Self {
            job_id: job_id.into(),
            state: JobState::PendingReconciliation,
            blob_ids,
            job_config,
        }
    }

    /// A job must reference at least one blob before it can be reconciled
    pub fn validate(&self) -> Result<()> {
        if self.blob_ids.is_empty() {
            return Err(DomainError::EmptyBlobList(self.job_id.clone()));
        }
        Ok(())
    }
}
