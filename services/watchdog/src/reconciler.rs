//! Recycling pass driver and periodic loop.
//!
//! Each pass:
//! - Evaluates the maintenance window at pass start
//! - Scans the fleet and classifies instance state
//! - Filters running instances through the restart eligibility rules
//! - Allocates the operation budget across candidates, stopped first
//! - Issues stop / label-update / start requests, tolerating per-instance
//!   failures

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info};

use rotor_recycle::{allocate, should_restart, Transition, LABEL_LAST_RESTARTED};

use crate::compute::{ComputeApi, Instance};
use crate::config::Config;
use crate::scanner::{scan_fleet, ScanOutcome};

/// Fleet-recycling watchdog.
pub struct Watchdog {
    /// Compute provider client.
    api: Arc<dyn ComputeApi>,

    /// Configuration.
    config: Config,
}

impl Watchdog {
    /// Create a new watchdog.
    pub fn new(api: Arc<dyn ComputeApi>, config: Config) -> Self {
        Self { api, config }
    }

    /// Run the recycling loop until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            scan_interval_secs = self.config.scan_interval_secs,
            ops_limit = self.config.ops_limit,
            "Starting recycling loop"
        );

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.scan_interval_secs));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_pass(&shutdown).await {
                        error!(error = %e, "Recycling pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Recycling loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Perform a single recycling pass.
    ///
    /// Returns an error only for pass-level failures (scan abort,
    /// cancellation); per-instance operation failures are logged and
    /// absorbed.
    pub async fn run_pass(&self, shutdown: &watch::Receiver<bool>) -> Result<()> {
        let now = Utc::now();
        let in_window = self.config.window.contains(now);
        debug!(in_window, "Starting recycling pass");

        let ScanOutcome {
            stopped,
            running,
            ops_in_flight,
        } = scan_fleet(
            self.api.as_ref(),
            &self.config.fleet_scope,
            &self.config.restart_label,
        )
        .await?;

        let eligible: Vec<Instance> = running
            .into_iter()
            .filter(|instance| {
                should_restart(
                    in_window,
                    instance.created_at,
                    instance.labels.get(LABEL_LAST_RESTARTED).map(String::as_str),
                    now,
                    self.config.min_age_hours,
                )
            })
            .collect();

        let allocation = allocate(stopped, eligible, ops_in_flight, self.config.ops_limit);
        if allocation.deferred > 0 {
            info!(
                deferred = allocation.deferred,
                ops_in_flight,
                ops_limit = self.config.ops_limit,
                "Postponing operations beyond the budget"
            );
        }

        let mut stops_submitted = 0usize;
        let mut starts_submitted = 0usize;

        for (instance, transition) in allocation.worklist {
            if *shutdown.borrow() {
                anyhow::bail!("recycling pass cancelled");
            }

            match transition {
                Transition::Stop => {
                    info!(instance_id = %instance.id, "Stopping instance");
                    match self.api.stop_instance(&instance.id).await {
                        Ok(operation) => {
                            stops_submitted += 1;
                            debug!(
                                instance_id = %instance.id,
                                operation_id = %operation.id,
                                "Stop submitted"
                            );
                        }
                        Err(e) => {
                            error!(instance_id = %instance.id, error = %e, "Failed to stop instance");
                        }
                    }
                }
                Transition::Start => {
                    info!(instance_id = %instance.id, "Starting instance");

                    // Never start without a recorded restart timestamp
                    let mut labels = instance.labels.clone();
                    labels.insert(
                        LABEL_LAST_RESTARTED.to_string(),
                        Utc::now().timestamp().to_string(),
                    );
                    if let Err(e) = self
                        .api
                        .update_labels(&instance.id, labels, &["labels"])
                        .await
                    {
                        error!(
                            instance_id = %instance.id,
                            error = %e,
                            "Failed to update instance labels"
                        );
                        continue;
                    }

                    match self.api.start_instance(&instance.id).await {
                        Ok(operation) => {
                            starts_submitted += 1;
                            debug!(
                                instance_id = %instance.id,
                                operation_id = %operation.id,
                                "Start submitted"
                            );
                        }
                        Err(e) => {
                            error!(instance_id = %instance.id, error = %e, "Failed to start instance");
                        }
                    }
                }
            }
        }

        info!(
            stops_submitted,
            starts_submitted,
            "Recycling pass complete"
        );
        Ok(())
    }
}
