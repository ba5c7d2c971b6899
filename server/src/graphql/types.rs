use async_graphql::{Enum, ID, InputObject, SimpleObject};
use chrono::{DateTime, NaiveDate, Utc};
use entity::{activities, files, notifications, projects, settings, users};
use products_projects::{
    ActivityRow, BudgetPreview,
    comments::CommentThread,
    dashboard::{DashboardSummary, StatusCounts},
    projects::{ProjectDetail, ProjectFilter, ProjectForm, ProjectInput, ProjectSummary},
    reports::ProjectReport,
    settings::SettingsInput as SettingsForm,
};
use uuid::Uuid;

fn id(value: Uuid) -> ID {
    ID(value.to_string())
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProjectStatus {
    #[graphql(name = "ONGOING")]
    Ongoing,
    #[graphql(name = "COMPLETED")]
    Completed,
    #[graphql(name = "DELAYED")]
    Delayed,
}

impl From<projects::Status> for ProjectStatus {
    fn from(value: projects::Status) -> Self {
        match value {
            projects::Status::Ongoing => ProjectStatus::Ongoing,
            projects::Status::Completed => ProjectStatus::Completed,
            projects::Status::Delayed => ProjectStatus::Delayed,
        }
    }
}

impl From<ProjectStatus> for projects::Status {
    fn from(value: ProjectStatus) -> Self {
        match value {
            ProjectStatus::Ongoing => projects::Status::Ongoing,
            ProjectStatus::Completed => projects::Status::Completed,
            ProjectStatus::Delayed => projects::Status::Delayed,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum UserRole {
    #[graphql(name = "PENDING")]
    Pending,
    #[graphql(name = "ADMIN")]
    Admin,
    #[graphql(name = "MANAGER")]
    Manager,
    #[graphql(name = "VENDOR")]
    Vendor,
    #[graphql(name = "EMPLOYEE")]
    Employee,
}

impl From<users::Role> for UserRole {
    fn from(value: users::Role) -> Self {
        match value {
            users::Role::Pending => UserRole::Pending,
            users::Role::Admin => UserRole::Admin,
            users::Role::Manager => UserRole::Manager,
            users::Role::Vendor => UserRole::Vendor,
            users::Role::Employee => UserRole::Employee,
        }
    }
}

impl From<UserRole> for users::Role {
    fn from(value: UserRole) -> Self {
        match value {
            UserRole::Pending => users::Role::Pending,
            UserRole::Admin => users::Role::Admin,
            UserRole::Manager => users::Role::Manager,
            UserRole::Vendor => users::Role::Vendor,
            UserRole::Employee => users::Role::Employee,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ProjectNode {
    pub id: ID,
    pub name: String,
    pub project_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub vendor: Option<String>,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub completion_percentage: i32,
    pub created_by: ID,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<projects::Model> for ProjectNode {
    fn from(model: projects::Model) -> Self {
        Self {
            id: id(model.id),
            name: model.name,
            project_type: model.project_type,
            start_date: model.start_date,
            end_date: model.end_date,
            vendor: model.vendor,
            description: model.description,
            status: model.status.into(),
            completion_percentage: model.completion_percentage,
            created_by: id(model.created_by),
            created_at: model.created_at,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ProjectSummaryNode {
    pub project: ProjectNode,
    pub budget: f64,
    pub activity_count: i32,
}

impl From<ProjectSummary> for ProjectSummaryNode {
    fn from(summary: ProjectSummary) -> Self {
        Self {
            project: summary.project.into(),
            budget: summary.budget,
            activity_count: i32::try_from(summary.activity_count).unwrap_or(i32::MAX),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ActivityNode {
    pub id: ID,
    pub project_id: ID,
    pub name: String,
    pub quantity: f64,
    pub unit: Option<String>,
    pub rate: f64,
    pub amount: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub assigned_to: Option<ID>,
}

impl From<activities::Model> for ActivityNode {
    fn from(model: activities::Model) -> Self {
        Self {
            amount: model.amount(),
            id: id(model.id),
            project_id: id(model.project_id),
            name: model.name,
            quantity: model.quantity,
            unit: model.unit,
            rate: model.rate,
            start_date: model.start_date,
            end_date: model.end_date,
            assigned_to: model.assigned_to.map(id),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct FileNode {
    pub id: ID,
    pub project_id: ID,
    pub activity_id: Option<ID>,
    pub uploaded_by: ID,
    pub name: String,
    pub url: String,
    pub content_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<files::Model> for FileNode {
    fn from(model: files::Model) -> Self {
        Self {
            id: id(model.id),
            project_id: id(model.project_id),
            activity_id: model.activity_id.map(id),
            uploaded_by: id(model.uploaded_by),
            name: model.name,
            url: model.url,
            content_type: model.content_type,
            size_bytes: model.size_bytes,
            created_at: model.created_at,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct CommentNode {
    pub id: ID,
    pub project_id: ID,
    pub activity_id: Option<ID>,
    pub user_id: ID,
    pub content: String,
    pub parent_id: Option<ID>,
    pub created_at: Option<DateTime<Utc>>,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    pub fn from_model(model: entity::comments::Model, replies: Vec<CommentNode>) -> Self {
        Self {
            id: id(model.id),
            project_id: id(model.project_id),
            activity_id: model.activity_id.map(id),
            user_id: id(model.user_id),
            content: model.content,
            parent_id: model.parent_id.map(id),
            created_at: model.created_at,
            replies,
        }
    }
}

impl From<CommentThread> for CommentNode {
    fn from(thread: CommentThread) -> Self {
        let replies = thread.replies.into_iter().map(CommentNode::from).collect();
        CommentNode::from_model(thread.comment, replies)
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct NotificationNode {
    pub id: ID,
    pub message: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<notifications::Model> for NotificationNode {
    fn from(model: notifications::Model) -> Self {
        Self {
            id: id(model.id),
            message: model.message,
            link: model.link,
            read: model.read,
            created_at: model.created_at,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct UserNode {
    pub id: ID,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub approved: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<users::Model> for UserNode {
    fn from(model: users::Model) -> Self {
        Self {
            id: id(model.id),
            name: model.name,
            email: model.email,
            role: model.role.into(),
            approved: model.approved,
            created_at: model.created_at,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct SettingsNode {
    pub allowed_file_types: Vec<String>,
    pub project_types: Vec<String>,
    pub vendors: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<settings::Model> for SettingsNode {
    fn from(model: settings::Model) -> Self {
        Self {
            allowed_file_types: model.allowed_file_types,
            project_types: model.project_types,
            vendors: model.vendors,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct StatusCountsNode {
    pub ongoing: i32,
    pub completed: i32,
    pub delayed: i32,
}

fn count(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl From<StatusCounts> for StatusCountsNode {
    fn from(counts: StatusCounts) -> Self {
        Self {
            ongoing: count(counts.ongoing),
            completed: count(counts.completed),
            delayed: count(counts.delayed),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct DashboardNode {
    pub total_projects: i32,
    pub status_counts: StatusCountsNode,
    pub total_budget: f64,
    pub recent_projects: Vec<ProjectSummaryNode>,
    pub unread_notifications: i32,
}

impl From<DashboardSummary> for DashboardNode {
    fn from(summary: DashboardSummary) -> Self {
        Self {
            total_projects: count(summary.total_projects),
            status_counts: summary.status_counts.into(),
            total_budget: summary.total_budget,
            recent_projects: summary.recent_projects.into_iter().map(Into::into).collect(),
            unread_notifications: count(summary.unread_notifications),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ReportNode {
    pub rows: Vec<ProjectSummaryNode>,
    pub total_budget: f64,
    pub status_counts: StatusCountsNode,
    pub average_completion: f64,
}

impl From<ProjectReport> for ReportNode {
    fn from(report: ProjectReport) -> Self {
        Self {
            rows: report.rows.into_iter().map(Into::into).collect(),
            total_budget: report.total_budget,
            status_counts: report.status_counts.into(),
            average_completion: report.average_completion,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ProjectDetailNode {
    pub project: ProjectNode,
    pub activities: Vec<ActivityNode>,
    pub budget: f64,
    pub files: Vec<FileNode>,
    pub comments: Vec<CommentNode>,
    pub can_edit: bool,
}

impl From<ProjectDetail> for ProjectDetailNode {
    fn from(detail: ProjectDetail) -> Self {
        Self {
            project: detail.project.into(),
            activities: detail.activities.into_iter().map(Into::into).collect(),
            budget: detail.budget,
            files: detail.files.into_iter().map(Into::into).collect(),
            comments: detail.comments.into_iter().map(Into::into).collect(),
            can_edit: detail.can_edit,
        }
    }
}

/// Activity line as shown on the project form.
#[derive(Clone, Debug, SimpleObject)]
pub struct ActivityRowNode {
    pub name: String,
    pub quantity: String,
    pub unit: String,
    pub rate: String,
    pub amount: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub assigned_to: Option<ID>,
}

impl From<ActivityRow> for ActivityRowNode {
    fn from(row: ActivityRow) -> Self {
        Self {
            amount: row.amount(),
            name: row.name,
            quantity: row.quantity,
            unit: row.unit,
            rate: row.rate,
            start_date: row.start_date,
            end_date: row.end_date,
            assigned_to: row.assigned_to.map(id),
        }
    }
}

/// Activity line as submitted. Quantity and rate are taken as typed.
#[derive(Clone, Debug, InputObject)]
pub struct ActivityRowInput {
    pub name: String,
    #[graphql(default)]
    pub quantity: String,
    #[graphql(default)]
    pub unit: String,
    #[graphql(default)]
    pub rate: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub assigned_to: Option<ID>,
}

impl ActivityRowInput {
    pub fn into_row(self) -> async_graphql::Result<ActivityRow> {
        let assigned_to = super::parse_optional_uuid(self.assigned_to.as_ref())?;
        Ok(ActivityRow {
            name: self.name,
            quantity: self.quantity,
            unit: self.unit,
            rate: self.rate,
            start_date: self.start_date,
            end_date: self.end_date,
            assigned_to,
        })
    }
}

pub fn into_rows(rows: Vec<ActivityRowInput>) -> async_graphql::Result<Vec<ActivityRow>> {
    rows.into_iter().map(ActivityRowInput::into_row).collect()
}

#[derive(Clone, Debug, SimpleObject)]
pub struct BudgetPreviewNode {
    pub amounts: Vec<f64>,
    pub total: f64,
}

impl From<BudgetPreview> for BudgetPreviewNode {
    fn from(preview: BudgetPreview) -> Self {
        Self {
            amounts: preview.amounts,
            total: preview.total,
        }
    }
}

#[derive(Clone, Debug, InputObject)]
pub struct ProjectFieldsInput {
    pub name: String,
    pub project_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub vendor: Option<String>,
    pub description: Option<String>,
    #[graphql(default_with = "ProjectStatus::Ongoing")]
    pub status: ProjectStatus,
    #[graphql(default)]
    pub completion_percentage: i32,
}

impl From<ProjectFieldsInput> for ProjectInput {
    fn from(input: ProjectFieldsInput) -> Self {
        Self {
            name: input.name,
            project_type: input.project_type,
            start_date: input.start_date,
            end_date: input.end_date,
            vendor: input.vendor,
            description: input.description,
            status: input.status.into(),
            completion_percentage: input.completion_percentage,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ProjectFieldsNode {
    pub name: String,
    pub project_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub vendor: Option<String>,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub completion_percentage: i32,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ProjectFormNode {
    pub project: ProjectNode,
    pub fields: ProjectFieldsNode,
    pub activities: Vec<ActivityRowNode>,
    pub budget: BudgetPreviewNode,
}

impl From<ProjectForm> for ProjectFormNode {
    fn from(form: ProjectForm) -> Self {
        Self {
            project: form.project.into(),
            fields: ProjectFieldsNode {
                name: form.input.name,
                project_type: form.input.project_type,
                start_date: form.input.start_date,
                end_date: form.input.end_date,
                vendor: form.input.vendor,
                description: form.input.description,
                status: form.input.status.into(),
                completion_percentage: form.input.completion_percentage,
            },
            activities: form.activities.into_iter().map(Into::into).collect(),
            budget: form.budget.into(),
        }
    }
}

#[derive(Clone, Debug, Default, InputObject)]
pub struct ProjectFilterInput {
    pub status: Option<ProjectStatus>,
    pub vendor: Option<String>,
    pub search: Option<String>,
}

impl From<ProjectFilterInput> for ProjectFilter {
    fn from(input: ProjectFilterInput) -> Self {
        Self {
            status: input.status.map(Into::into),
            vendor: input.vendor,
            search: input.search,
        }
    }
}

#[derive(Clone, Debug, InputObject)]
pub struct SettingsInput {
    #[graphql(default)]
    pub allowed_file_types: Vec<String>,
    #[graphql(default)]
    pub project_types: Vec<String>,
    #[graphql(default)]
    pub vendors: Vec<String>,
}

impl From<SettingsInput> for SettingsForm {
    fn from(input: SettingsInput) -> Self {
        Self {
            allowed_file_types: input.allowed_file_types,
            project_types: input.project_types,
            vendors: input.vendors,
        }
    }
}
