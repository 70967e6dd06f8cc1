// Backend capability consumed by the controller

use std::path::Path;
use std::sync::Arc;

use datadesk_backend_client::{AgentEditResponse, BackendClient, BackendError, FileEntry, LoadResponse};
use datadesk_engine::{FileRef, Record};

/// The remote operations a session needs. `BackendClient` is the HTTP
/// implementation; tests substitute scripted fakes.
pub trait Backend: Send + Sync {
    fn upload(&self, path: &Path) -> Result<FileRef, BackendError>;
    fn load(&self, url: &str) -> Result<LoadResponse, BackendError>;
    fn save(&self, filename: &str, rows: &[Record]) -> Result<(), BackendError>;
    fn agent_edit(&self, url: &str, command: &str) -> Result<AgentEditResponse, BackendError>;
    fn export_xlsx(&self, filename: &str) -> Result<Vec<u8>, BackendError>;
    fn list_files(&self) -> Result<Vec<FileEntry>, BackendError>;
}

impl Backend for BackendClient {
    fn upload(&self, path: &Path) -> Result<FileRef, BackendError> {
        BackendClient::upload(self, path)
    }

    fn load(&self, url: &str) -> Result<LoadResponse, BackendError> {
        BackendClient::load(self, url)
    }

    fn save(&self, filename: &str, rows: &[Record]) -> Result<(), BackendError> {
        BackendClient::save(self, filename, rows)
    }

    fn agent_edit(&self, url: &str, command: &str) -> Result<AgentEditResponse, BackendError> {
        BackendClient::agent_edit(self, url, command)
    }

    fn export_xlsx(&self, filename: &str) -> Result<Vec<u8>, BackendError> {
        BackendClient::export_xlsx(self, filename)
    }

    fn list_files(&self) -> Result<Vec<FileEntry>, BackendError> {
        BackendClient::list_files(self)
    }
}

impl<T: Backend + ?Sized> Backend for Arc<T> {
    fn upload(&self, path: &Path) -> Result<FileRef, BackendError> {
        (**self).upload(path)
    }

    fn load(&self, url: &str) -> Result<LoadResponse, BackendError> {
        (**self).load(url)
    }

    fn save(&self, filename: &str, rows: &[Record]) -> Result<(), BackendError> {
        (**self).save(filename, rows)
    }

    fn agent_edit(&self, url: &str, command: &str) -> Result<AgentEditResponse, BackendError> {
        (**self).agent_edit(url, command)
    }

    fn export_xlsx(&self, filename: &str) -> Result<Vec<u8>, BackendError> {
        (**self).export_xlsx(filename)
    }

    fn list_files(&self) -> Result<Vec<FileEntry>, BackendError> {
        (**self).list_files()
    }
}
