//! Paged fleet scan and lifecycle-status classification.
//!
//! The scanner walks the provider's paginated inventory for one fleet
//! scope and classifies every labeled instance:
//! - Mid-transition statuses count against the operation budget
//! - Stopped instances become unconditional start candidates
//! - Running instances become stop candidates, filtered later by the
//!   restart eligibility rules

use anyhow::Result;
use tracing::{debug, warn};

use crate::compute::{ComputeApi, Instance, InstanceStatus};

/// Classified result of one full fleet scan.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Labeled instances currently stopped, in scan order.
    pub stopped: Vec<Instance>,

    /// Labeled instances currently running, in scan order.
    pub running: Vec<Instance>,

    /// Labeled instances already mid-transition.
    pub ops_in_flight: usize,
}

/// Scan the fleet scope, following continuation cursors until exhausted.
///
/// Instances without the restart label are not fleet members and are
/// skipped. Any page-fetch error aborts the whole scan; partial results
/// are never used.
pub async fn scan_fleet(
    api: &dyn ComputeApi,
    scope: &str,
    restart_label: &str,
) -> Result<ScanOutcome> {
    let mut outcome = ScanOutcome::default();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = api.list_instances(scope, page_token.as_deref()).await?;
        pages += 1;

        for instance in page.instances {
            if !instance.labels.contains_key(restart_label) {
                continue;
            }

            match instance.status {
                InstanceStatus::Provisioning
                | InstanceStatus::Starting
                | InstanceStatus::Updating
                | InstanceStatus::Restarting
                | InstanceStatus::Stopping
                | InstanceStatus::Deleting => outcome.ops_in_flight += 1,
                InstanceStatus::Stopped => outcome.stopped.push(instance),
                InstanceStatus::Running => outcome.running.push(instance),
                InstanceStatus::Error | InstanceStatus::Crashed => {}
                InstanceStatus::Unspecified => {
                    warn!(
                        instance_id = %instance.id,
                        status = %instance.status,
                        "Unexpected instance status, ignoring"
                    );
                }
            }
        }

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    debug!(
        pages,
        stopped = outcome.stopped.len(),
        running = outcome.running.len(),
        ops_in_flight = outcome.ops_in_flight,
        "Fleet scan complete"
    );

    Ok(outcome)
}
