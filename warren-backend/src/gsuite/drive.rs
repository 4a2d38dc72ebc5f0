//! Google Drive v3 operations.

use reqwest::multipart;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};

const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_API: &str = "https://www.googleapis.com/upload/drive/v3";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Deserialize)]
struct FileListResponse {
    files: Option<Vec<DriveFile>>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: String,
    #[serde(rename = "webViewLink")]
    web_view_link: Option<String>,
}

pub struct GoogleDrive {
    client: Client,
    access_token: String,
}

impl GoogleDrive {
    pub fn new(access_token: &str) -> Self {
        GoogleDrive {
            client: Client::new(),
            access_token: access_token.to_string(),
        }
    }

    /// Find a folder by name under the Drive root, creating it if missing.
    pub async fn get_or_create_folder(&self, folder_name: &str) -> Result<String> {
        let escaped = folder_name.replace('\'', "\\'");
        let query = format!(
            "name='{}' and mimeType='{}' and 'root' in parents and trashed=false",
            escaped, FOLDER_MIME
        );

        let response = self
            .client
            .get(format!("{}/files", DRIVE_API))
            .bearer_auth(&self.access_token)
            .query(&[("q", query.as_str()), ("fields", "files(id)")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GSuite(format!(
                "folder search returned {}: {}",
                status, body
            )));
        }

        let listing: FileListResponse = response.json().await?;
        if let Some(existing) = listing.files.unwrap_or_default().into_iter().next() {
            return Ok(existing.id);
        }

        self.create_folder(folder_name).await
    }

    async fn create_folder(&self, folder_name: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/files", DRIVE_API))
            .bearer_auth(&self.access_token)
            .json(&json!({
                "name": folder_name,
                "mimeType": FOLDER_MIME,
                "parents": ["root"],
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GSuite(format!(
                "folder create returned {}: {}",
                status, body
            )));
        }

        let created: DriveFile = response.json().await?;
        Ok(created.id)
    }

    /// Upload file bytes into a folder, make them link-readable and
    /// return the view link.
    pub async fn upload_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        folder_id: &str,
    ) -> Result<String> {
        let metadata = json!({
            "name": file_name,
            "parents": [folder_id],
        });

        let form = multipart::Form::new()
            .part(
                "metadata",
                multipart::Part::text(metadata.to_string())
                    .mime_str("application/json")
                    .map_err(|e| Error::GSuite(format!("metadata part: {}", e)))?,
            )
            .part(
                "file",
                multipart::Part::bytes(bytes).file_name(file_name.to_string()),
            );

        let response = self
            .client
            .post(format!("{}/files", DRIVE_UPLOAD_API))
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "multipart"), ("fields", "id,webViewLink")])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GSuite(format!(
                "file upload returned {}: {}",
                status, body
            )));
        }

        let uploaded: UploadedFile = response.json().await?;
        self.share_with_anyone(&uploaded.id).await?;

        Ok(uploaded
            .web_view_link
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", uploaded.id)))
    }

    async fn share_with_anyone(&self, file_id: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/files/{}/permissions", DRIVE_API, file_id))
            .bearer_auth(&self.access_token)
            .json(&json!({ "type": "anyone", "role": "reader" }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GSuite(format!(
                "permission insert returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}
