//! Collaborators that supply section content and convert Word documents

use crate::types::{AttachmentDescriptor, SourceError};
use async_trait::async_trait;

/// Supplies the pre-rendered content of each service section.
#[async_trait]
pub trait SectionSource: Send + Sync {
    /// Section HTML, or `None` when the service holds no data for the subject.
    async fn get_section_html(
        &self,
        request_id: &str,
        service_name: &str,
    ) -> Result<Option<String>, SourceError>;

    /// Attachments of a section, in any order.
    async fn list_attachments(
        &self,
        request_id: &str,
        service_name: &str,
    ) -> Result<Vec<AttachmentDescriptor>, SourceError>;

    /// Raw bytes of one attachment.
    async fn get_attachment(&self, descriptor: &AttachmentDescriptor) -> Result<Vec<u8>, SourceError>;
}

/// Turns a Word document into PDF bytes.
#[async_trait]
pub trait WordConverter: Send + Sync {
    async fn convert_word_to_pdf(&self, bytes: Vec<u8>, filename: &str) -> Result<Vec<u8>, SourceError>;
}

/// Converter for deployments without a conversion service.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectingConverter;

#[async_trait]
impl WordConverter for RejectingConverter {
    async fn convert_word_to_pdf(&self, _bytes: Vec<u8>, filename: &str) -> Result<Vec<u8>, SourceError> {
        Err(format!("no Word conversion service is configured for '{}'", filename).into())
    }
}

#[cfg(feature = "serde")]
pub use directory::DirectorySource;

#[cfg(feature = "serde")]
mod directory {
    use super::*;
    use std::io::ErrorKind;
    use std::path::{Component, Path, PathBuf};

    const SECTION_FILE: &str = "section.html";
    const ATTACHMENTS_FILE: &str = "attachments.json";

    /// Section content laid out on disk:
    ///
    /// ```text
    /// {root}/{service}/section.html      section HTML (absent: no data held)
    /// {root}/{service}/attachments.json  attachment descriptors (absent: none)
    /// {root}/{storage_key}               attachment bytes
    /// ```
    #[derive(Debug, Clone)]
    pub struct DirectorySource {
        root: PathBuf,
    }

    impl DirectorySource {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }

        /// Join a relative path below the root, refusing anything that escapes it.
        fn resolve(&self, relative: &str) -> Result<PathBuf, SourceError> {
            let path = Path::new(relative);
            let escapes = path
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if relative.is_empty() || escapes {
                return Err(format!("path '{}' is outside the content directory", relative).into());
            }
            Ok(self.root.join(path))
        }
    }

    async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, SourceError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    #[async_trait]
    impl SectionSource for DirectorySource {
        async fn get_section_html(
            &self,
            _request_id: &str,
            service_name: &str,
        ) -> Result<Option<String>, SourceError> {
            let path = self.resolve(service_name)?.join(SECTION_FILE);
            match read_optional(&path).await? {
                Some(bytes) => Ok(Some(String::from_utf8(bytes)?)),
                None => Ok(None),
            }
        }

        async fn list_attachments(
            &self,
            _request_id: &str,
            service_name: &str,
        ) -> Result<Vec<AttachmentDescriptor>, SourceError> {
            let path = self.resolve(service_name)?.join(ATTACHMENTS_FILE);
            match read_optional(&path).await? {
                Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
                None => Ok(Vec::new()),
            }
        }

        async fn get_attachment(
            &self,
            descriptor: &AttachmentDescriptor,
        ) -> Result<Vec<u8>, SourceError> {
            let path = self.resolve(&descriptor.storage_key)?;
            Ok(tokio::fs::read(path).await?)
        }
    }

}
