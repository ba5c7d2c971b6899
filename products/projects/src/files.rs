use chrono::Utc;
use entity::{activities, files, projects};
use platform_api::FieldError;
use platform_authz::Action;
use platform_backend::{Direction, ObjectUpload, Select};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{ProjectsError, ProjectsResult, Workspace, saga::Saga};

/// A file chosen for upload.
#[derive(Clone, Debug)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub activity_id: Option<Uuid>,
}

/// Keep a storage-safe version of a client supplied file name.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Lower-cased extension without the dot.
pub fn file_extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn guess_content_type(extension: Option<&str>) -> &'static str {
    match extension {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("csv") => "text/csv",
        Some("txt") => "text/plain",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

/// Object key of a stored file. Rows written before the path was recorded
/// only have the public URL, so the key is recovered from it.
pub fn storage_path_of(file: &files::Model, bucket: &str) -> Option<String> {
    if let Some(path) = file.storage_path.as_deref().filter(|p| !p.is_empty()) {
        return Some(path.to_string());
    }
    let marker = format!("/object/public/{bucket}/");
    let derived = file
        .url
        .split_once(&marker)
        .map(|(_, path)| path.split(['?', '#']).next().unwrap_or(path).to_string())
        .filter(|path| !path.is_empty());
    match &derived {
        Some(path) => debug!(file_id = %file.id, %path, "storage path derived from url"),
        None => warn!(file_id = %file.id, url = %file.url, "cannot determine storage path"),
    }
    derived
}

impl Workspace {
    pub async fn list_files(
        &self,
        project_id: Uuid,
        activity_id: Option<Uuid>,
    ) -> ProjectsResult<Vec<files::Model>> {
        let mut query = Select::of::<files::Model>()
            .eq("project_id", project_id)
            .order_by("created_at", Direction::Desc);
        if let Some(activity_id) = activity_id {
            query = query.eq("activity_id", activity_id);
        }
        Ok(self.client.fetch::<files::Model>(&query).await?)
    }

    fn check_upload(
        &self,
        upload: &FileUpload,
        allowed: &[String],
    ) -> Result<Option<String>, Vec<FieldError>> {
        let mut errors = Vec::new();
        let extension = file_extension(&upload.file_name);
        if upload.file_name.trim().is_empty() {
            errors.push(FieldError::new("file", "a file name is required"));
        }
        if upload.bytes.is_empty() {
            errors.push(FieldError::new("file", "the file is empty"));
        }
        if upload.bytes.len() > self.options.max_upload_bytes {
            errors.push(FieldError::new(
                "file",
                format!(
                    "the file exceeds the {} byte upload limit",
                    self.options.max_upload_bytes
                ),
            ));
        }
        if !allowed.is_empty() {
            let permitted = extension
                .as_ref()
                .is_some_and(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)));
            if !permitted {
                errors.push(FieldError::new(
                    "file",
                    format!("file type not allowed; allowed types: {}", allowed.join(", ")),
                ));
            }
        }
        if errors.is_empty() {
            Ok(extension)
        } else {
            Err(errors)
        }
    }

    /// Store a file for a project.
    ///
    /// The blob is uploaded first, then its metadata row is written. If the
    /// row cannot be written the blob is removed again.
    #[instrument(skip_all, fields(%project_id, file = %upload.file_name, bytes = upload.bytes.len()))]
    pub async fn upload_file(
        &self,
        project_id: Uuid,
        upload: FileUpload,
    ) -> ProjectsResult<files::Model> {
        self.client
            .find::<projects::Model>(project_id)
            .await?
            .ok_or(ProjectsError::NotFound("project"))?;
        if let Some(activity_id) = upload.activity_id {
            let activity = self
                .client
                .fetch_one::<activities::Model>(
                    &Select::of::<activities::Model>()
                        .eq("id", activity_id)
                        .eq("project_id", project_id),
                )
                .await?;
            if activity.is_none() {
                return Err(ProjectsError::invalid(
                    "activityId",
                    "does not belong to this project",
                ));
            }
        }
        let settings = self.load_settings().await?;
        let extension = self
            .check_upload(&upload, &settings.allowed_file_types)
            .map_err(ProjectsError::Validation)?;

        let name = upload.file_name.trim().to_string();
        let path = format!(
            "{project_id}/{}_{}",
            Utc::now().timestamp_millis(),
            sanitize_file_name(&name)
        );
        let content_type = upload
            .content_type
            .filter(|ct| !ct.trim().is_empty() && ct != "application/octet-stream")
            .unwrap_or_else(|| guess_content_type(extension.as_deref()).to_string());
        let size_bytes = i64::try_from(upload.bytes.len()).unwrap_or(i64::MAX);

        let mut saga = Saga::new("upload_file");
        self.client
            .upload(
                &path,
                ObjectUpload {
                    bytes: upload.bytes,
                    content_type: content_type.clone(),
                },
            )
            .await?;
        let client = self.client.clone();
        let uploaded = path.clone();
        saga.on_abort("upload blob", async move { client.remove(&[uploaded]).await });

        let draft = files::Draft {
            project_id,
            activity_id: upload.activity_id,
            uploaded_by: self.actor.user_id,
            name,
            url: self.client.public_url(&path),
            storage_path: path,
            content_type: Some(content_type),
            size_bytes,
        };
        match self.client.insert_one::<files::Model, _>(&draft).await {
            Ok(file) => {
                saga.commit();
                info!(file_id = %file.id, "file uploaded");
                Ok(file)
            }
            Err(err) => {
                warn!(error = %err, "file metadata insert failed, removing blob");
                saga.abort().await;
                Err(err.into())
            }
        }
    }

    /// Delete a file's metadata row, then try to remove its blob. A blob
    /// that cannot be removed is logged and left behind.
    #[instrument(skip_all, fields(%file_id))]
    pub async fn delete_file(&self, file_id: Uuid) -> ProjectsResult<()> {
        let file = self
            .client
            .find::<files::Model>(file_id)
            .await?
            .ok_or(ProjectsError::NotFound("file"))?;
        let project_owner = self
            .client
            .find::<projects::Model>(file.project_id)
            .await?
            .map(|project| project.created_by)
            .unwrap_or(file.uploaded_by);
        self.authorize(Action::DeleteFile {
            uploaded_by: file.uploaded_by,
            project_owner,
        })?;

        self.client.delete_by_id::<files::Model>(file_id).await?;
        if let Some(path) = storage_path_of(&file, self.client.bucket()) {
            if let Err(err) = self.client.remove(&[path]).await {
                warn!(error = %err, "failed to remove file from storage");
            }
        }
        info!("file deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(url: &str, storage_path: Option<&str>) -> files::Model {
        files::Model {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            activity_id: None,
            uploaded_by: Uuid::new_v4(),
            name: "plan.pdf".into(),
            url: url.into(),
            storage_path: storage_path.map(String::from),
            content_type: None,
            size_bytes: None,
            created_at: None,
        }
    }

    #[test]
    fn file_names_are_made_storage_safe() {
        assert_eq!(sanitize_file_name("site plan (v2).pdf"), "site_plan__v2_.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\Ré.pdf"), "R_.pdf");
        assert_eq!(sanitize_file_name(".."), "file");
    }

    #[test]
    fn extensions_are_lower_cased() {
        assert_eq!(file_extension("Plan.PDF").as_deref(), Some("pdf"));
        assert_eq!(file_extension(".env"), None);
        assert_eq!(file_extension("README"), None);
    }

    #[test]
    fn storage_path_prefers_the_recorded_key() {
        let recorded = file(
            "https://x.test/storage/v1/object/public/project-files/p/1_a.pdf",
            Some("p/1_other.pdf"),
        );
        assert_eq!(
            storage_path_of(&recorded, "project-files").as_deref(),
            Some("p/1_other.pdf")
        );

        let legacy = file(
            "https://x.test/storage/v1/object/public/project-files/p/1_a.pdf?download=1",
            None,
        );
        assert_eq!(
            storage_path_of(&legacy, "project-files").as_deref(),
            Some("p/1_a.pdf")
        );
        assert_eq!(storage_path_of(&file("https://elsewhere.test/a.pdf", None), "project-files"), None);
    }
}
