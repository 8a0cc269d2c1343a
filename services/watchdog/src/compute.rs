//! Compute provider interface and mock implementation.
//!
//! The provider interface abstracts the fleet inventory and lifecycle
//! operations:
//! - Paginated instance listing
//! - Stop/start requests
//! - Label updates (the watchdog's only durable state)
//!
//! A mock implementation is provided for testing and development.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a fleet instance.
///
/// Values the provider may add later deserialize as `Unspecified`; callers
/// must treat that arm as "unrecognized, do not act".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Provisioning,
    Starting,
    Running,
    Stopping,
    Stopped,
    Restarting,
    Updating,
    Deleting,
    Error,
    Crashed,
    #[serde(other)]
    Unspecified,
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::Provisioning => write!(f, "PROVISIONING"),
            InstanceStatus::Starting => write!(f, "STARTING"),
            InstanceStatus::Running => write!(f, "RUNNING"),
            InstanceStatus::Stopping => write!(f, "STOPPING"),
            InstanceStatus::Stopped => write!(f, "STOPPED"),
            InstanceStatus::Restarting => write!(f, "RESTARTING"),
            InstanceStatus::Updating => write!(f, "UPDATING"),
            InstanceStatus::Deleting => write!(f, "DELETING"),
            InstanceStatus::Error => write!(f, "ERROR"),
            InstanceStatus::Crashed => write!(f, "CRASHED"),
            InstanceStatus::Unspecified => write!(f, "UNSPECIFIED"),
        }
    }
}

/// A fleet instance as observed from the provider.
///
/// Read-only except for `labels`, which the watchdog annotates with the
/// `last-restarted` bookkeeping key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub status: InstanceStatus,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// One page of the fleet inventory.
#[derive(Debug, Clone, Deserialize)]
pub struct InstancePage {
    pub instances: Vec<Instance>,

    /// Continuation cursor; absent or empty on the last page.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Handle for a submitted lifecycle operation.
///
/// The watchdog treats submission success as the observable result and
/// never polls for completion.
#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    pub id: String,
    #[serde(default)]
    pub done: bool,
}

/// Compute provider interface.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Fetch one page of instances for a fleet scope.
    async fn list_instances(&self, scope: &str, page_token: Option<&str>) -> Result<InstancePage>;

    /// Request that a running instance stop.
    async fn stop_instance(&self, id: &str) -> Result<Operation>;

    /// Request that a stopped instance start.
    async fn start_instance(&self, id: &str) -> Result<Operation>;

    /// Replace the labels named by `paths` on an instance.
    async fn update_labels(
        &self,
        id: &str,
        labels: HashMap<String, String>,
        paths: &[&str],
    ) -> Result<Operation>;
}

/// Calls recorded by [`MockCompute`].
#[derive(Debug, Clone, Default)]
pub struct ComputeCalls {
    pub list_requests: usize,
    pub stopped: Vec<String>,
    pub started: Vec<String>,
    pub label_updates: Vec<(String, HashMap<String, String>)>,
}

/// Mock compute provider for testing and development.
pub struct MockCompute {
    /// Inventory pages returned by `list_instances`, in order.
    pages: Vec<Vec<Instance>>,

    fail_list: bool,
    fail_stop: HashSet<String>,
    fail_start: HashSet<String>,
    fail_update: HashSet<String>,

    calls: Mutex<ComputeCalls>,
}

impl MockCompute {
    /// Create a mock with a single inventory page.
    pub fn new(instances: Vec<Instance>) -> Self {
        Self::paged(vec![instances])
    }

    /// Create a mock with multiple inventory pages.
    pub fn paged(pages: Vec<Vec<Instance>>) -> Self {
        Self {
            pages,
            fail_list: false,
            fail_stop: HashSet::new(),
            fail_start: HashSet::new(),
            fail_update: HashSet::new(),
            calls: Mutex::new(ComputeCalls::default()),
        }
    }

    /// Fail every listing request.
    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    /// Fail stop requests for one instance.
    pub fn failing_stop(mut self, id: &str) -> Self {
        self.fail_stop.insert(id.to_string());
        self
    }

    /// Fail start requests for one instance.
    pub fn failing_start(mut self, id: &str) -> Self {
        self.fail_start.insert(id.to_string());
        self
    }

    /// Fail label updates for one instance.
    pub fn failing_update(mut self, id: &str) -> Self {
        self.fail_update.insert(id.to_string());
        self
    }

    /// Snapshot of the calls submitted so far.
    pub fn calls(&self) -> ComputeCalls {
        self.calls.lock().expect("mock call state poisoned").clone()
    }

    fn record<F: FnOnce(&mut ComputeCalls)>(&self, f: F) {
        f(&mut self.calls.lock().expect("mock call state poisoned"));
    }
}

#[async_trait]
impl ComputeApi for MockCompute {
    async fn list_instances(&self, _scope: &str, page_token: Option<&str>) -> Result<InstancePage> {
        self.record(|calls| calls.list_requests += 1);

        if self.fail_list {
            anyhow::bail!("mock compute configured to fail listings");
        }

        let index: usize = match page_token {
            None => 0,
            Some(token) => token.parse().context("invalid mock page token")?,
        };
        let instances = self.pages.get(index).cloned().unwrap_or_default();
        let next_page_token = if index + 1 < self.pages.len() {
            Some((index + 1).to_string())
        } else {
            None
        };

        Ok(InstancePage {
            instances,
            next_page_token,
        })
    }

    async fn stop_instance(&self, id: &str) -> Result<Operation> {
        if self.fail_stop.contains(id) {
            anyhow::bail!("mock stop failure for {id}");
        }
        self.record(|calls| calls.stopped.push(id.to_string()));

        Ok(Operation {
            id: format!("op-stop-{id}"),
            done: false,
        })
    }

    async fn start_instance(&self, id: &str) -> Result<Operation> {
        if self.fail_start.contains(id) {
            anyhow::bail!("mock start failure for {id}");
        }
        self.record(|calls| calls.started.push(id.to_string()));

        Ok(Operation {
            id: format!("op-start-{id}"),
            done: false,
        })
    }

    async fn update_labels(
        &self,
        id: &str,
        labels: HashMap<String, String>,
        _paths: &[&str],
    ) -> Result<Operation> {
        if self.fail_update.contains(id) {
            anyhow::bail!("mock label-update failure for {id}");
        }
        self.record(|calls| calls.label_updates.push((id.to_string(), labels)));

        Ok(Operation {
            id: format!("op-update-{id}"),
            done: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_page_deserialization() {
        let json = r#"{
            "instances": [
                {
                    "id": "vm-1",
                    "status": "RUNNING",
                    "labels": {"recycle": "", "last-restarted": "1754300000"},
                    "created_at": "2026-07-01T00:00:00Z"
                },
                {
                    "id": "vm-2",
                    "status": "STOPPED",
                    "created_at": "2026-07-02T12:30:00Z"
                }
            ],
            "next_page_token": "page-2"
        }"#;

        let page: InstancePage = serde_json::from_str(json).unwrap();
        assert_eq!(page.instances.len(), 2);
        assert_eq!(page.instances[0].id, "vm-1");
        assert_eq!(page.instances[0].status, InstanceStatus::Running);
        assert_eq!(
            page.instances[0].labels.get("last-restarted").map(String::as_str),
            Some("1754300000")
        );
        assert_eq!(page.instances[1].status, InstanceStatus::Stopped);
        assert!(page.instances[1].labels.is_empty());
        assert_eq!(page.next_page_token.as_deref(), Some("page-2"));
    }

    #[test]
    fn test_last_page_has_no_token() {
        let json = r#"{"instances": []}"#;
        let page: InstancePage = serde_json::from_str(json).unwrap();
        assert!(page.instances.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_unrecognized_status_deserializes_as_unspecified() {
        let json = r#"{
            "id": "vm-3",
            "status": "SOME_FUTURE_STATE",
            "labels": {},
            "created_at": "2026-07-01T00:00:00Z"
        }"#;

        let instance: Instance = serde_json::from_str(json).unwrap();
        assert_eq!(instance.status, InstanceStatus::Unspecified);
    }

    #[tokio::test]
    async fn test_mock_pagination() {
        let mock = MockCompute::paged(vec![vec![], vec![]]);

        let first = mock.list_instances("scope", None).await.unwrap();
        assert_eq!(first.next_page_token.as_deref(), Some("1"));

        let second = mock.list_instances("scope", Some("1")).await.unwrap();
        assert!(second.next_page_token.is_none());

        assert_eq!(mock.calls().list_requests, 2);
    }
}
