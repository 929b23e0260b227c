//! CSV import of extracted academic facts.
//!
//! Columns: `document,units_enrolled,swa_grade,gpa,is_first_time_applicant,
//! has_incomplete_or_withdrawn,has_failed_or_dropped,confidence`, plus optional `notes` and
//! `failure_reason`. Empty cells are missing facts. A non-empty `failure_reason` turns the
//! row into a failed extraction.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use super::collaborators::{ExtractedFacts, VerificationReport};
use super::domain::{AcademicRecord, DocumentReference, ValidationError};

/// One parsed row, keyed by the document reference it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedReport {
    /// 1-based line number in the source, counting the header.
    pub line: usize,
    pub document: DocumentReference,
    pub report: VerificationReport,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("unable to read academic records: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed academic records csv: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

pub fn parse_reports<R: Read>(reader: R) -> Result<Vec<ImportedReport>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut reports = Vec::new();

    for (index, row) in csv_reader.deserialize::<RecordRow>().enumerate() {
        let line = index + 2;
        let row = row?;
        let report = row.to_report().map_err(|source| ValidationError::Row {
            row: line,
            source: Box::new(source),
        })?;

        reports.push(ImportedReport {
            line,
            document: DocumentReference(row.document),
            report,
        });
    }

    Ok(reports)
}

pub fn parse_reports_from_path(path: impl AsRef<Path>) -> Result<Vec<ImportedReport>, ImportError> {
    let file = File::open(path)?;
    parse_reports(file)
}

#[derive(Debug, Deserialize)]
struct RecordRow {
    document: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    units_enrolled: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    swa_grade: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    gpa: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    is_first_time_applicant: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    has_incomplete_or_withdrawn: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    has_failed_or_dropped: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    confidence: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    notes: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    failure_reason: Option<String>,
}

impl RecordRow {
    fn to_report(&self) -> Result<VerificationReport, ValidationError> {
        if self.document.trim().is_empty() {
            return Err(ValidationError::MissingField("document"));
        }
        if let Some(reason) = &self.failure_reason {
            return Ok(VerificationReport::ExtractionFailed {
                reason: reason.clone(),
            });
        }

        let record = AcademicRecord {
            units_enrolled: parse_number("units_enrolled", self.units_enrolled.as_deref())?,
            swa_grade: parse_number("swa_grade", self.swa_grade.as_deref())?,
            gpa: parse_number("gpa", self.gpa.as_deref())?,
            is_first_time_applicant: parse_flag(
                "is_first_time_applicant",
                self.is_first_time_applicant.as_deref(),
            )?,
            has_incomplete_or_withdrawn: parse_flag(
                "has_incomplete_or_withdrawn",
                self.has_incomplete_or_withdrawn.as_deref(),
            )?,
            has_failed_or_dropped: parse_flag(
                "has_failed_or_dropped",
                self.has_failed_or_dropped.as_deref(),
            )?,
        };
        let confidence: Option<Decimal> =
            parse_number("confidence", self.confidence.as_deref())?;

        Ok(VerificationReport::Extracted(ExtractedFacts {
            record,
            confidence,
            notes: self.notes.clone().unwrap_or_default(),
        }))
    }
}

fn parse_number<T: FromStr>(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<T>, ValidationError> {
    value
        .map(|raw| {
            raw.parse::<T>().map_err(|_| ValidationError::NonNumeric {
                field,
                value: raw.to_string(),
            })
        })
        .transpose()
}

fn parse_flag(field: &'static str, value: Option<&str>) -> Result<Option<bool>, ValidationError> {
    let Some(raw) = value else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(Some(true)),
        "false" | "no" | "n" | "0" => Ok(Some(false)),
        _ => Err(ValidationError::InvalidFlag {
            field,
            value: raw.to_string(),
        }),
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
