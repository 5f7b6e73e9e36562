//! Pipeline folder catalog and folder-condition matching
//!
//! Folder names are compared in normalized form (trimmed, lower-cased).
//! A folder is a *system* folder when its normalized name is in the catalog;
//! every other non-empty folder is a *client* folder.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Internal workflow stages known to the pipeline
pub const SYSTEM_FOLDERS: &[&str] = &[
    "Inbox",
    "Unresponsive",
    "Completed",
    "Unresponsive Talkscore",
    "Passed MQ",
    "Failed MQ",
    "TalkScore Retake",
    "Unresponsive Talkscore Retake",
    "Failed TalkScore",
    "Cold Leads",
    "Cold Leads Talkscore",
    "Cold Leads Talkscore Retake",
    "On hold",
    "Rejected",
    "Talent Pool",
    "Shortlisted",
    "Hired",
    "Candidate Databank",
    "For Talkscore",
    "Tier 2 Program",
    "Tier 1 Program",
    "For Versant",
    "For Reengagement",
];

/// Normalize a folder name for comparison
pub fn normalize_folder(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A non-empty folder cell, kept in raw and normalized form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderName {
    raw: String,
    key: String,
}

impl FolderName {
    /// Parse a CSV cell; blank cells are missing folders
    pub fn parse(cell: &str) -> Option<Self> {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(FolderName {
            raw: cell.to_string(),
            key: trimmed.to_lowercase(),
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Normalized name
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Set of system folder names (normalized)
#[derive(Debug, Clone)]
pub struct FolderCatalog {
    names: HashSet<String>,
}

impl FolderCatalog {
    /// The built-in catalog
    pub fn standard() -> Self {
        FolderCatalog {
            names: SYSTEM_FOLDERS.iter().map(|s| normalize_folder(s)).collect(),
        }
    }

    /// The built-in catalog extended with site-specific system folders
    pub fn with_extra<S: AsRef<str>>(extra: &[S]) -> Self {
        let mut catalog = Self::standard();
        for name in extra {
            let key = normalize_folder(name.as_ref());
            if !key.is_empty() {
                catalog.names.insert(key);
            }
        }
        catalog
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether a normalized name is a system folder
    pub fn is_system(&self, key: &str) -> bool {
        self.names.contains(key)
    }

    /// Whether a normalized name is a client folder
    pub fn is_client(&self, key: &str) -> bool {
        !key.is_empty() && !self.is_system(key)
    }

    /// Whether a (possibly missing) folder is a client folder
    pub fn is_client_folder(&self, folder: Option<&FolderName>) -> bool {
        folder.is_some_and(|f| self.is_client(f.key()))
    }
}

impl Default for FolderCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// One side of a funnel transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FolderCondition {
    /// Any non-missing folder
    Any,
    /// Any folder outside the system catalog
    ClientFolder,
    /// One specific folder (normalized name)
    Named(String),
}

impl FolderCondition {
    /// Resolve a condition literal: `any`, `client folder`, or a folder name
    pub fn parse(literal: &str) -> Self {
        let key = normalize_folder(literal);
        match key.as_str() {
            "any" => FolderCondition::Any,
            "client folder" => FolderCondition::ClientFolder,
            _ => FolderCondition::Named(key),
        }
    }

    pub fn matches(&self, folder: Option<&FolderName>, catalog: &FolderCatalog) -> bool {
        match self {
            FolderCondition::Any => folder.is_some(),
            FolderCondition::ClientFolder => catalog.is_client_folder(folder),
            FolderCondition::Named(key) => folder.is_some_and(|f| f.key() == key),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, FolderCondition::Any)
    }
}

impl From<String> for FolderCondition {
    fn from(literal: String) -> Self {
        FolderCondition::parse(&literal)
    }
}

impl From<FolderCondition> for String {
    fn from(condition: FolderCondition) -> Self {
        condition.to_string()
    }
}

impl fmt::Display for FolderCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FolderCondition::Any => write!(f, "any"),
            FolderCondition::ClientFolder => write!(f, "client folder"),
            FolderCondition::Named(key) => write!(f, "{}", key),
        }
    }
}
