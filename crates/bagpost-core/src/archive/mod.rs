//! The central recording archive, reached over an authenticated HTTP session.

pub mod http;
pub mod token;

pub use http::HttpArchiveClient;
pub use token::extract_csrf_token;

use crate::error::Error;
use std::path::{Path, PathBuf};

pub const UPLOAD_ROUTE: &str = "/bags/upload";
pub const TARGET_DIRECTORY: &str = ".";
pub const STORAGE_ID: &str = "default";
pub const FILE_MIME: &str = "application/octet-stream";

/// A multipart upload: plain text fields plus one binary file attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadForm {
    pub fields: Vec<(String, String)>,
    pub file_field: String,
    pub file_path: PathBuf,
    pub file_name: String,
    pub mime: String,
}

impl UploadForm {
    /// The archive's upload form for one recording.
    pub fn for_recording(path: &Path, token: &str) -> Self {
        Self {
            fields: vec![
                ("targetDirectory".to_string(), TARGET_DIRECTORY.to_string()),
                ("storageId".to_string(), STORAGE_ID.to_string()),
                ("_csrf".to_string(), token.to_string()),
            ],
            file_field: "file".to_string(),
            file_path: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            mime: FILE_MIME.to_string(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Session with the archive. The token is fetched once per run and reused;
/// there is no re-authentication.
pub trait ArchiveClient {
    /// Anti-forgery token for this session.
    fn fetch_token(&self) -> Result<String, Error>;

    /// POST `form` to `url` and return the HTTP status code.
    fn post_multipart(&self, url: &str, form: UploadForm) -> Result<u16, Error>;
}

pub fn upload_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), UPLOAD_ROUTE)
}

pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_form_fields() {
        let form = UploadForm::for_recording(
            Path::new("/data/shadow/remus_shadow_2024-01-01-00-00-00.bag"),
            "tok123",
        );
        assert_eq!(form.field("targetDirectory"), Some("."));
        assert_eq!(form.field("storageId"), Some("default"));
        assert_eq!(form.field("_csrf"), Some("tok123"));
        assert_eq!(form.file_field, "file");
        assert_eq!(form.file_name, "remus_shadow_2024-01-01-00-00-00.bag");
        assert_eq!(form.mime, "application/octet-stream");
    }

    #[test]
    fn test_upload_url() {
        assert_eq!(
            upload_url("http://archive:8080/"),
            "http://archive:8080/bags/upload"
        );
        assert_eq!(upload_url("http://archive"), "http://archive/bags/upload");
    }

    #[test]
    fn test_success_range() {
        assert!(is_success(200));
        assert!(is_success(204));
        assert!(!is_success(302));
        assert!(!is_success(403));
        assert!(!is_success(500));
    }
}
