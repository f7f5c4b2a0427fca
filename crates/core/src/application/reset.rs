// Harvest Config Resetter - rewind a job's harvest cursor for a restart

use crate::domain::{HarvestType, JobConfig, JobState};

/// Rewound configuration and the harvester state that should pick it up
#[derive(Debug, Clone, PartialEq)]
pub struct ResetPlan {
    pub job_config: JobConfig,
    pub target_state: JobState,
}

impl ResetPlan {
    /// Unrecognized harvest type: needs manual intervention, never retried
    pub fn is_config_error(&self) -> bool {
        self.target_state == JobState::Error
    }
}

/// Compute the restart plan for a job configuration.
///
/// Only the cursor of the harvest search is touched: `offset` for SRU,
/// `resumptionToken` for OAI-PMH. Finto has no cursor. Every other field,
/// known or not, is copied as is.
pub fn reset_job_config(job_config: &JobConfig) -> ResetPlan {
    let mut rewound = job_config.clone();
    let search = &mut rewound.link_data_harvest_search;

    let target_state = match &search.harvest_type {
        HarvestType::Sru => {
            search.set_offset(0);
            JobState::PendingSruHarvester
        }
        HarvestType::OaiPmh => {
            search.set_resumption_token("");
            JobState::PendingOaiPmhHarvester
        }
        HarvestType::Finto => JobState::PendingFintoHarvester,
        HarvestType::Other(_) => {
            return ResetPlan {
                job_config: job_config.clone(),
                target_state: JobState::Error,
            }
        }
    };

    ResetPlan {
        job_config: rewound,
        target_state,
    }
}
