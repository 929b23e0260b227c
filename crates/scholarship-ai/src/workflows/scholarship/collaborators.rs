//! Narrow interfaces to the collaborators the review engine depends on but does not
//! implement: document storage, document analysis and reviewer authorization.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{AcademicRecord, DocumentReference, ValidationError};

/// Upper bound for uploaded grade documents.
pub const MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

/// A validated upload. Construction enforces the size limit and the content type
/// allow-list, so a store never receives anything else.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    file_name: String,
    content_type: mime::Mime,
    bytes: Vec<u8>,
}

impl DocumentUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Self, ValidationError> {
        if bytes.is_empty() {
            return Err(ValidationError::EmptyDocument);
        }
        if bytes.len() > MAX_DOCUMENT_BYTES {
            return Err(ValidationError::DocumentTooLarge {
                size: bytes.len(),
                limit: MAX_DOCUMENT_BYTES,
            });
        }

        let content_type = accepted_content_type(content_type)?;

        Ok(Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &mime::Mime {
        &self.content_type
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

fn accepted_content_type(raw: &str) -> Result<mime::Mime, ValidationError> {
    let parsed: mime::Mime = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::UnsupportedContentType(raw.to_string()))?;

    let essence = parsed.essence_str();
    let accepted = [mime::APPLICATION_PDF, mime::IMAGE_JPEG, mime::IMAGE_PNG]
        .iter()
        .any(|allowed| essence.eq_ignore_ascii_case(allowed.essence_str()));
    if accepted {
        Ok(parsed)
    } else {
        Err(ValidationError::UnsupportedContentType(raw.to_string()))
    }
}

/// Failure talking to an external collaborator. Always recoverable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{0} unavailable")]
    Unavailable(String),
    #[error("no response within {0:?}")]
    TimedOut(Duration),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn store(&self, upload: DocumentUpload) -> Result<DocumentReference, CollaboratorError>;
}

/// Facts the document-analysis collaborator extracted from a grade document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFacts {
    pub record: AcademicRecord,
    /// Extraction confidence on a 0-100 scale.
    #[serde(default)]
    pub confidence: Option<Decimal>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationReport {
    Extracted(ExtractedFacts),
    ExtractionFailed { reason: String },
}

impl VerificationReport {
    pub fn confidence(&self) -> Option<Decimal> {
        match self {
            VerificationReport::Extracted(facts) => facts.confidence,
            VerificationReport::ExtractionFailed { .. } => None,
        }
    }
}

#[async_trait]
pub trait VerificationClient: Send + Sync {
    async fn verify(
        &self,
        document: &DocumentReference,
    ) -> Result<VerificationReport, CollaboratorError>;
}

/// Reviewer identity issued by a [`ReviewerAuthorizer`] once a credential was accepted.
///
/// Authorizer implementations construct it; the service only ever obtains one through
/// its configured authorizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewerCapability {
    reviewer: String,
}

impl ReviewerCapability {
    pub fn new(reviewer: impl Into<String>) -> Self {
        Self {
            reviewer: reviewer.into(),
        }
    }

    pub fn reviewer(&self) -> &str {
        &self.reviewer
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    #[error("reviewer credential required")]
    MissingCredential,
    #[error("credential does not carry reviewer authority")]
    NotReviewer,
}

pub trait ReviewerAuthorizer: Send + Sync {
    fn authorize(
        &self,
        credential: Option<&str>,
    ) -> Result<ReviewerCapability, AuthorizationError>;
}

/// Authorizer backed by a fixed list of bearer tokens.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthorizer {
    tokens: Vec<String>,
}

impl StaticTokenAuthorizer {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }
}

impl ReviewerAuthorizer for StaticTokenAuthorizer {
    fn authorize(
        &self,
        credential: Option<&str>,
    ) -> Result<ReviewerCapability, AuthorizationError> {
        let credential = credential
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(AuthorizationError::MissingCredential)?;

        match self.tokens.iter().position(|token| token == credential) {
            Some(index) => Ok(ReviewerCapability::new(format!("reviewer-{}", index + 1))),
            None => Err(AuthorizationError::NotReviewer),
        }
    }
}
