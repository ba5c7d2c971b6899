use std::collections::HashMap;

use entity::{activities, comments, notifications, projects};
use platform_authz::Action;
use platform_backend::{Direction, Select};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{ProjectsError, ProjectsResult, Workspace, validation::required_text};

#[derive(Clone, Debug)]
pub struct NewComment {
    pub project_id: Uuid,
    pub activity_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub content: String,
}

/// A comment with its replies, oldest first.
#[derive(Clone, Debug, PartialEq)]
pub struct CommentThread {
    pub comment: comments::Model,
    pub replies: Vec<CommentThread>,
}

/// Arrange flat comments into threads. A reply whose parent is missing is
/// shown as a top-level comment.
pub fn build_threads(mut flat: Vec<comments::Model>) -> Vec<CommentThread> {
    flat.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    let known: Vec<Uuid> = flat.iter().map(|c| c.id).collect();
    let mut children: HashMap<Uuid, Vec<comments::Model>> = HashMap::new();
    let mut roots = Vec::new();
    for comment in flat {
        match comment.parent_id.filter(|parent| known.contains(parent)) {
            Some(parent) => children.entry(parent).or_default().push(comment),
            None => roots.push(comment),
        }
    }
    roots
        .into_iter()
        .map(|root| attach(root, &mut children))
        .collect()
}

fn attach(comment: comments::Model, children: &mut HashMap<Uuid, Vec<comments::Model>>) -> CommentThread {
    let replies = children
        .remove(&comment.id)
        .unwrap_or_default()
        .into_iter()
        .map(|reply| attach(reply, children))
        .collect();
    CommentThread { comment, replies }
}

impl Workspace {
    pub async fn comment_threads(&self, project_id: Uuid) -> ProjectsResult<Vec<CommentThread>> {
        let flat = self
            .client
            .fetch::<comments::Model>(
                &Select::of::<comments::Model>()
                    .eq("project_id", project_id)
                    .order_by("created_at", Direction::Asc),
            )
            .await?;
        Ok(build_threads(flat))
    }

    /// Post a comment. The project owner is notified when someone else
    /// comments; a failed notification does not fail the comment.
    #[instrument(skip_all, fields(project_id = %input.project_id))]
    pub async fn add_comment(&self, input: NewComment) -> ProjectsResult<comments::Model> {
        let content = required_text("content", &input.content)
            .map_err(|err| ProjectsError::Validation(vec![err]))?;
        let project = self
            .client
            .find::<projects::Model>(input.project_id)
            .await?
            .ok_or(ProjectsError::NotFound("project"))?;

        if let Some(parent_id) = input.parent_id {
            let parent = self.client.find::<comments::Model>(parent_id).await?;
            if parent.is_none_or(|p| p.project_id != project.id) {
                return Err(ProjectsError::invalid(
                    "parentId",
                    "must be a comment on the same project",
                ));
            }
        }
        if let Some(activity_id) = input.activity_id {
            let activity = self.client.find::<activities::Model>(activity_id).await?;
            if activity.is_none_or(|a| a.project_id != project.id) {
                return Err(ProjectsError::invalid(
                    "activityId",
                    "does not belong to this project",
                ));
            }
        }

        let comment: comments::Model = self
            .client
            .insert_one(&comments::Draft {
                project_id: project.id,
                activity_id: input.activity_id,
                user_id: self.actor.user_id,
                content,
                parent_id: input.parent_id,
            })
            .await?;
        info!(comment_id = %comment.id, "comment added");

        if project.created_by != self.actor.user_id {
            let note = notifications::Draft::unread(
                project.created_by,
                format!("New comment on project \"{}\"", project.name),
                Some(format!("/projects/{}", project.id)),
            );
            if let Err(err) = self
                .client
                .insert::<notifications::Model, _>(std::slice::from_ref(&note))
                .await
            {
                warn!(error = %err, "failed to notify project owner");
            }
        }
        Ok(comment)
    }

    pub async fn delete_comment(&self, comment_id: Uuid) -> ProjectsResult<()> {
        let comment = self
            .client
            .find::<comments::Model>(comment_id)
            .await?
            .ok_or(ProjectsError::NotFound("comment"))?;
        self.authorize(Action::DeleteComment {
            author: comment.user_id,
        })?;
        self.client.delete_by_id::<comments::Model>(comment_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn comment(id: u128, parent: Option<u128>, minute: u32) -> comments::Model {
        comments::Model {
            id: Uuid::from_u128(id),
            project_id: Uuid::nil(),
            activity_id: None,
            user_id: Uuid::nil(),
            content: format!("c{id}"),
            parent_id: parent.map(Uuid::from_u128),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).single(),
        }
    }

    #[test]
    fn nests_replies_under_parents() {
        let threads = build_threads(vec![
            comment(3, Some(1), 3),
            comment(1, None, 1),
            comment(2, None, 2),
            comment(4, Some(3), 4),
            comment(5, Some(99), 5),
        ]);
        let roots: Vec<u128> = threads.iter().map(|t| t.comment.id.as_u128()).collect();
        assert_eq!(roots, vec![1, 2, 5]);
        assert_eq!(threads[0].replies[0].comment.id, Uuid::from_u128(3));
        assert_eq!(threads[0].replies[0].replies[0].comment.id, Uuid::from_u128(4));
        assert!(threads[1].replies.is_empty());
    }
}
