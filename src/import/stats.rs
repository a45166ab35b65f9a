//! Import accounting.
//!
//! Folds per-document outcomes into run statistics. The final counts plus
//! the error list are the run's only durable output.

use std::fmt;

/// Outcome of one document import attempt.
///
/// Produced by the importer and folded into [`ImportStats`] immediately;
/// never persisted. Per-item failures are data here, not propagated errors,
/// so a single failure cannot abort the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// Uploaded as a new document.
    Imported,
    /// The target already holds this document (HTTP 409 on upload).
    AlreadyExists,
    /// Upload failed; carries the error's message text.
    Failed(String),
}

/// One failed document, kept verbatim for the operator report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportErrorEntry {
    pub file_name: String,
    pub error: String,
}

/// Statistics for a single import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub documents_imported: usize,
    pub documents_skipped: usize,
    pub documents_failed: usize,
    /// Successful tag creation calls. Back-filled mappings onto tags that
    /// already existed do not count.
    pub tags_created: usize,
    pub errors: Vec<ImportErrorEntry>,
}

impl ImportStats {
    /// Fold one document outcome into the counters.
    pub fn record(&mut self, file_name: &str, outcome: DocumentOutcome) {
        match outcome {
            DocumentOutcome::Imported => self.documents_imported += 1,
            DocumentOutcome::AlreadyExists => self.documents_skipped += 1,
            DocumentOutcome::Failed(error) => {
                self.documents_failed += 1;
                self.errors.push(ImportErrorEntry {
                    file_name: file_name.to_string(),
                    error,
                });
            }
        }
    }

    /// Total documents that reached an outcome.
    pub fn documents_processed(&self) -> usize {
        self.documents_imported + self.documents_skipped + self.documents_failed
    }
}

impl fmt::Display for ImportStats {
    /// Operator-facing summary: counts first, then each failure with its
    /// file name and error text.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tags_created > 0 {
            writeln!(f, "{} tag(s) created", self.tags_created)?;
        }
        write!(f, "{} document(s) imported", self.documents_imported)?;
        if self.documents_skipped > 0 {
            write!(
                f,
                "\n{} document(s) skipped (already exist)",
                self.documents_skipped
            )?;
        }
        if self.documents_failed > 0 {
            write!(f, "\n{} document(s) failed", self.documents_failed)?;
        }
        if !self.errors.is_empty() {
            write!(f, "\nerrors ({}):", self.errors.len())?;
            for entry in &self.errors {
                write!(f, "\n  - {}: {}", entry.file_name, entry.error)?;
            }
        }
        Ok(())
    }
}
