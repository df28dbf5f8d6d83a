// ABOUTME: Explicit task actions
// ABOUTME: Admin approval and rejection, undo and start

use chrono::Utc;
use tracing::info;

use estately_core::types::{Task, TaskStatus, Viewer};
use estately_storage::{Query, SortOrder};

use crate::error::{WorkflowError, WorkflowResult};
use crate::{require_admin, Workflow};

fn ensure_assignee_or_admin(task: &Task, viewer: &Viewer) -> WorkflowResult<()> {
    if viewer.is_admin || task.assignee_id.as_deref() == Some(viewer.profile_id.as_str()) {
        Ok(())
    } else {
        Err(WorkflowError::PermissionDenied(format!(
            "Task {} is not assigned to {}",
            task.id, viewer.profile_id
        )))
    }
}

impl Workflow {
    /// Admin sign-off; also clears a pending review flag
    pub async fn approve_task(&self, id: &str, viewer: &Viewer) -> WorkflowResult<Task> {
        require_admin(viewer, "approve tasks")?;
        let mut task = self.stores.tasks.get(id).await?;
        task.status = TaskStatus::Completed;
        task.needs_review = false;
        task.completed_at.get_or_insert_with(Utc::now);
        let saved = self.stores.tasks.save(&task).await?;
        info!(task_id = %id, "Task approved");
        Ok(saved)
    }

    /// Admin rejection sends the task back to the assignee
    pub async fn reject_task(&self, id: &str, viewer: &Viewer) -> WorkflowResult<Task> {
        require_admin(viewer, "reject tasks")?;
        self.reset_task(id, "rejected").await
    }

    /// Undo a completion
    pub async fn reopen_task(&self, id: &str, viewer: &Viewer) -> WorkflowResult<Task> {
        let task = self.stores.tasks.get(id).await?;
        ensure_assignee_or_admin(&task, viewer)?;
        self.reset_task(id, "reopened").await
    }

    pub async fn start_task(&self, id: &str, viewer: &Viewer) -> WorkflowResult<Task> {
        let mut task = self.stores.tasks.get(id).await?;
        ensure_assignee_or_admin(&task, viewer)?;
        if task.status != TaskStatus::Todo {
            return Err(WorkflowError::transition("task", task.status, TaskStatus::InProgress));
        }
        task.status = TaskStatus::InProgress;
        let saved = self.stores.tasks.save(&task).await?;
        info!(task_id = %id, "Task started");
        Ok(saved)
    }

    async fn reset_task(&self, id: &str, action: &str) -> WorkflowResult<Task> {
        let mut task = self.stores.tasks.get(id).await?;
        task.status = TaskStatus::Todo;
        task.completion_file_id = None;
        task.completed_at = None;
        task.needs_review = false;
        let saved = self.stores.tasks.save(&task).await?;
        info!(task_id = %id, action, "Task back to todo");
        Ok(saved)
    }

    /// Tasks of a project ordered by due date
    pub async fn project_tasks(&self, project_id: &str) -> WorkflowResult<Vec<Task>> {
        let query = Query::new()
            .eq("project_id", project_id)
            .order_by("due_date", SortOrder::Asc);
        Ok(self.stores.tasks.list(&query).await?)
    }
}
