//! Named workflow registry.
//!
//! Stores validated definitions by name so runs can be started by name.
//! Callers own the store and pass it where it is needed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use super::types::WorkflowDefinition;
use super::validator::validate_workflow;
use crate::error::{Error, Result};

/// Summary row returned by [`WorkflowStore::list`].
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSummary {
    pub name: String,
    pub version: String,
    pub description: String,
    pub base_price: f64,
    pub currency: String,
    pub step_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// Storage for named workflow definitions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Add a new definition. Fails if the name is taken.
    async fn register(&self, workflow: WorkflowDefinition) -> Result<Arc<WorkflowDefinition>>;

    async fn get(&self, name: &str) -> Result<Option<Arc<WorkflowDefinition>>>;

    /// Replace an existing definition with the same name.
    async fn update(&self, workflow: WorkflowDefinition) -> Result<Arc<WorkflowDefinition>>;

    /// Remove a definition. Returns whether it existed.
    async fn remove(&self, name: &str) -> Result<bool>;

    /// All stored definitions, sorted by name.
    async fn list(&self) -> Result<Vec<WorkflowSummary>>;
}

struct Entry {
    workflow: Arc<WorkflowDefinition>,
    updated_at: DateTime<Utc>,
}

/// Process-local [`WorkflowStore`].
#[derive(Clone, Default)]
pub struct InMemoryWorkflowStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn register(&self, workflow: WorkflowDefinition) -> Result<Arc<WorkflowDefinition>> {
        validate_workflow(&workflow)?;

        let mut entries = self.entries.write().await;
        if entries.contains_key(&workflow.name) {
            return Err(Error::Registry(format!(
                "Workflow '{}' is already registered",
                workflow.name
            )));
        }

        let name = workflow.name.clone();
        let workflow = Arc::new(workflow);
        entries.insert(
            name.clone(),
            Entry {
                workflow: workflow.clone(),
                updated_at: Utc::now(),
            },
        );
        info!(workflow = %name, "Registered workflow");
        Ok(workflow)
    }

    async fn get(&self, name: &str) -> Result<Option<Arc<WorkflowDefinition>>> {
        Ok(self
            .entries
            .read()
            .await
            .get(name)
            .map(|entry| entry.workflow.clone()))
    }

    async fn update(&self, workflow: WorkflowDefinition) -> Result<Arc<WorkflowDefinition>> {
        validate_workflow(&workflow)?;

        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(&workflow.name) else {
            return Err(Error::Registry(format!(
                "Workflow '{}' is not registered",
                workflow.name
            )));
        };

        let workflow = Arc::new(workflow);
        entry.workflow = workflow.clone();
        entry.updated_at = Utc::now();
        info!(workflow = %workflow.name, version = %workflow.version, "Updated workflow");
        Ok(workflow)
    }

    async fn remove(&self, name: &str) -> Result<bool> {
        let removed = self.entries.write().await.remove(name).is_some();
        if removed {
            info!(workflow = %name, "Removed workflow");
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<WorkflowSummary>> {
        let entries = self.entries.read().await;
        let mut summaries: Vec<WorkflowSummary> = entries
            .values()
            .map(|entry| {
                let wf = &entry.workflow;
                WorkflowSummary {
                    name: wf.name.clone(),
                    version: wf.version.clone(),
                    description: wf.description.clone(),
                    base_price: wf.pricing.base_price,
                    currency: wf.pricing.currency.clone(),
                    step_count: wf.steps.len(),
                    updated_at: entry.updated_at,
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }
}
