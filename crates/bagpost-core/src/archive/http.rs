use super::{extract_csrf_token, ArchiveClient, UploadForm};
use crate::error::Error;
use reqwest::blocking::{multipart, Client};
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("bagpost/", env!("CARGO_PKG_VERSION"));

/// Blocking HTTP session. The cookie store keeps the session that issued the
/// CSRF token alive for every later upload.
pub struct HttpArchiveClient {
    base_url: String,
    client: Client,
}

impl HttpArchiveClient {
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(30))
            .timeout(None::<Duration>)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ArchiveClient for HttpArchiveClient {
    fn fetch_token(&self) -> Result<String, Error> {
        info!("Retrieving CSRF token from {}", self.base_url);
        let html = self
            .client
            .get(&self.base_url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Auth(format!("could not load {}: {}", self.base_url, e)))?
            .text()
            .map_err(|e| Error::Auth(format!("could not read landing page: {}", e)))?;

        let token = extract_csrf_token(&html)
            .ok_or_else(|| Error::Auth("no csrfToken found in landing page".to_string()))?;
        debug!("Token: {}", token);
        Ok(token)
    }

    fn post_multipart(&self, url: &str, form: UploadForm) -> Result<u16, Error> {
        let file_part = multipart::Part::file(&form.file_path)?
            .file_name(form.file_name.clone())
            .mime_str(&form.mime)?;

        let mut multipart_form = multipart::Form::new();
        for (name, value) in form.fields {
            multipart_form = multipart_form.text(name, value);
        }
        multipart_form = multipart_form.part(form.file_field, file_part);

        debug!("POST {} ({})", url, form.file_name);
        let response = self.client.post(url).multipart(multipart_form).send()?;
        Ok(response.status().as_u16())
    }
}
