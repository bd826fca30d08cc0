//! Workflow, Stage, and Role records.
//!
//! A workflow is a named template of ordered stages plus advisory roles.
//! Stages carry a total execution order (`order_index`) and an
//! `is_parallel` flag; roles describe the capabilities expected of the
//! executors and handlers servicing the workflow's tasks, and are never
//! executed themselves.

use super::states::WorkflowStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request payload for creating a workflow with its stages and roles
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stages: Vec<StageSpec>,
    #[serde(default)]
    pub roles: Vec<RoleSpec>,
}

/// One stage within a [`WorkflowSpec`]; list position defines execution order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    #[serde(default)]
    pub is_parallel: bool,
    #[serde(default)]
    pub max_tasks: Option<u32>,
}

impl StageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_parallel: false,
            max_tasks: None,
        }
    }

    pub fn parallel(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_parallel: true,
            max_tasks: None,
        }
    }
}

/// One role within a [`WorkflowSpec`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// A named, versioned template of ordered stages executed as one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Stage ids in execution order
    pub stage_ids: Vec<Uuid>,
    pub role_ids: Vec<Uuid>,
    pub status: WorkflowStatus,
    pub execution_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Create a new workflow record in Draft
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            stage_ids: Vec::new(),
            role_ids: Vec::new(),
            status: WorkflowStatus::Draft,
            execution_count: 0,
            success_count: 0,
            failure_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update status and touch the modification timestamp
    pub fn set_status(&mut self, status: WorkflowStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// An ordered phase of a workflow, optionally executing its tasks in parallel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub name: String,
    /// Defines total execution order within the workflow
    pub order_index: u32,
    pub is_parallel: bool,
    pub max_tasks: u32,
    pub created_at: DateTime<Utc>,
}

impl Stage {
    pub fn new(workflow_id: Uuid, spec: &StageSpec, order_index: u32, default_max_tasks: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            name: spec.name.clone(),
            order_index,
            is_parallel: spec.is_parallel,
            max_tasks: spec.max_tasks.unwrap_or(default_max_tasks),
            created_at: Utc::now(),
        }
    }
}

/// Advisory capability metadata used to select executors or handlers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub name: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Role {
    pub fn new(workflow_id: Uuid, spec: &RoleSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            name: spec.name.clone(),
            description: spec.description.clone(),
            capabilities: spec.capabilities.clone(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_workflow_starts_draft() {
        let workflow = Workflow::new("content-pipeline", "");
        assert_eq!(workflow.status, WorkflowStatus::Draft);
        assert_eq!(workflow.execution_count, 0);
        assert!(workflow.stage_ids.is_empty());
    }

    #[test]
    fn test_stage_from_spec() {
        let workflow = Workflow::new("content-pipeline", "");
        let spec = StageSpec::parallel("fan-out");
        let stage = Stage::new(workflow.id, &spec, 2, 50);
        assert_eq!(stage.workflow_id, workflow.id);
        assert_eq!(stage.order_index, 2);
        assert!(stage.is_parallel);
        assert_eq!(stage.max_tasks, 50);
    }

    #[test]
    fn test_stage_spec_max_tasks_override() {
        let workflow = Workflow::new("w", "");
        let mut spec = StageSpec::new("collect");
        spec.max_tasks = Some(3);
        let stage = Stage::new(workflow.id, &spec, 0, 50);
        assert_eq!(stage.max_tasks, 3);
    }
}
