use chrono::NaiveDate;
use thiserror::Error;

/// Boxed error returned by the content and conversion collaborators.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
    #[error("Failed to fetch {item} for service '{service}': {source}")]
    ContentFetch {
        service: String,
        item: String,
        #[source]
        source: SourceError,
    },
    #[error(
        "Unsupported attachment '{storage_key}' in service '{service}': content type '{content_type}'"
    )]
    UnsupportedAttachment {
        service: String,
        storage_key: String,
        content_type: String,
    },
    #[error("Invalid attachment '{storage_key}' in service '{service}': {reason}")]
    InvalidAttachment {
        service: String,
        storage_key: String,
        reason: String,
    },
    #[error("Word conversion failed for '{filename}': {source}")]
    Conversion {
        filename: String,
        #[source]
        source: SourceError,
    },
    #[error("Malformed HTML in service '{service}': {message}")]
    Html { service: String, message: String },
    #[error("Layout error: {0}")]
    Layout(String),
    #[error("Merge error: {0}")]
    Merge(String),
}

pub type Result<T> = std::result::Result<T, ReportError>;

/// Identifies one subject access request for the duration of a render.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ReportRequest {
    pub id: String,
    pub subject_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub nomis_id: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub probation_id: Option<String>,
    pub case_reference: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub date_from: Option<NaiveDate>,
    pub date_to: NaiveDate,
}

impl ReportRequest {
    pub fn validate(&self) -> Result<()> {
        if self.subject_name.trim().is_empty() {
            return Err(ReportError::Config(format!(
                "Request {} has no subject name",
                self.id
            )));
        }

        if non_blank(&self.nomis_id).is_none() && non_blank(&self.probation_id).is_none() {
            return Err(ReportError::Config(format!(
                "Request {} needs a NOMIS ID or a probation ID",
                self.id
            )));
        }

        if let Some(from) = self.date_from {
            if from > self.date_to {
                return Err(ReportError::Config(format!(
                    "Request {} date range starts after it ends ({} > {})",
                    self.id, from, self.date_to
                )));
            }
        }

        Ok(())
    }

    /// "NOMIS ID: ..." when a NOMIS id is present, otherwise the probation id.
    pub fn identity_line(&self) -> String {
        match (non_blank(&self.nomis_id), non_blank(&self.probation_id)) {
            (Some(nomis), _) => format!("NOMIS ID: {}", nomis),
            (None, Some(probation)) => format!("Probation ID: {}", probation),
            (None, None) => String::new(),
        }
    }

    pub fn date_range_line(&self) -> String {
        let from = self
            .date_from
            .map(format_date)
            .unwrap_or_else(|| "Start of record".to_string());
        format!("Report date range: {} - {}", from, format_date(self.date_to))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Dates are printed day first, as on the rest of the report.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// A service whose data is included in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SelectedService {
    pub service_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub display_label: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub order_position: Option<u32>,
}

impl SelectedService {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            display_label: None,
            order_position: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.display_label = Some(label.into());
        self
    }

    pub fn with_position(mut self, position: u32) -> Self {
        self.order_position = Some(position);
        self
    }

    /// The label shown in the contents list and the no-data block.
    pub fn label(&self) -> String {
        match self.display_label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => title_case_service_name(&self.service_name),
        }
    }
}

/// `keyworker-api` becomes `Keyworker Api`.
pub fn title_case_service_name(name: &str) -> String {
    name.split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Final rendering order: positioned services ascending, then the rest by name.
pub fn order_services(services: &[SelectedService]) -> Vec<SelectedService> {
    let mut ordered = services.to_vec();
    ordered.sort_by(|a, b| match (a.order_position, b.order_position) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.service_name.cmp(&b.service_name)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.service_name.cmp(&b.service_name),
    });
    ordered
}

/// Metadata for one attachment supplied by a service.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct AttachmentDescriptor {
    pub storage_key: String,
    pub attachment_number: u32,
    pub display_name: String,
    pub content_type: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub size_bytes: u64,
    pub filename: String,
}

impl AttachmentDescriptor {
    pub fn kind(&self) -> AttachmentKind {
        AttachmentKind::from_content_type(&self.content_type)
    }

    /// Second line of the metadata summary printed above the attachment.
    pub fn summary_line(&self) -> String {
        format!("{} - {}", self.filename, self.display_name)
    }
}

/// How an attachment is turned into pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Pdf,
    Word,
    Unsupported,
}

impl AttachmentKind {
    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/pdf" => AttachmentKind::Pdf,
            "application/msword"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                AttachmentKind::Word
            }
            other if other.starts_with("image/") => AttachmentKind::Image,
            _ => AttachmentKind::Unsupported,
        }
    }

    /// Word used in the "Attachment ... content follows" line.
    pub fn label(self) -> &'static str {
        match self {
            AttachmentKind::Image => "Image",
            AttachmentKind::Pdf => "PDF",
            AttachmentKind::Word => "Word",
            AttachmentKind::Unsupported => "Unsupported",
        }
    }
}

/// Paper sizes supported for generated pages
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PaperSize {
    #[default]
    A4,
    Letter,
    Legal,
    Custom {
        width_mm: f32,
        height_mm: f32,
    },
}

impl PaperSize {
    /// Portrait dimensions in millimetres
    pub fn dimensions_mm(self) -> (f32, f32) {
        match self {
            PaperSize::A4 => (210.0, 297.0),
            PaperSize::Letter => (215.9, 279.4),
            PaperSize::Legal => (215.9, 355.6),
            PaperSize::Custom {
                width_mm,
                height_mm,
            } => (width_mm, height_mm),
        }
    }

    pub fn dimensions_pt(self) -> (f32, f32) {
        let (w, h) = self.dimensions_mm();
        (mm_to_pt(w), mm_to_pt(h))
    }
}

/// Convert millimeters to points
pub fn mm_to_pt(mm: f32) -> f32 {
    mm * 2.83465
}

/// The merged report handed back to the caller.
#[derive(Debug, Clone)]
pub struct FinalDocument {
    pub bytes: Vec<u8>,
    pub summary: crate::stats::ReportSummary,
}
