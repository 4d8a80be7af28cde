//! # Core Domain Entities
//!
//! Compliance data as stored by the hosted backend.
//!
//! ## Clusters
//!
//! - **Identity**: `UserId`, `UserRole`, `ComplianceTier`
//! - **Records**: `ComplianceRecord`, `ComplianceStatus`, `RecordId`
//! - **Catalog**: `RequirementTemplate`, `TierSummary`

use crate::errors::TypeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Identifier of a platform user (auth subject).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Platform role of a user.
///
/// Roles are ordered along the instructor certification path; the wire
/// representation is the two-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserRole {
    /// Instructor trainee.
    IT,
    /// Instructor provisional.
    IP,
    /// Instructor certified.
    IC,
    /// Authorized provider.
    AP,
    /// Administrator.
    AD,
    /// System administrator.
    SA,
}

impl UserRole {
    /// Wire code for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IT => "IT",
            Self::IP => "IP",
            Self::IC => "IC",
            Self::AP => "AP",
            Self::AD => "AD",
            Self::SA => "SA",
        }
    }

    /// Whether the role carries administrative rights.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::AD | Self::SA)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IT" => Ok(Self::IT),
            "IP" => Ok(Self::IP),
            "IC" => Ok(Self::IC),
            "AP" => Ok(Self::AP),
            "AD" => Ok(Self::AD),
            "SA" => Ok(Self::SA),
            _ => Err(TypeError::UnknownRole(s.to_string())),
        }
    }
}

/// Compliance tier a user is enrolled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceTier {
    /// Reduced requirement set.
    Basic,
    /// Full requirement set.
    Robust,
}

impl ComplianceTier {
    /// Wire name for this tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Robust => "robust",
        }
    }
}

impl fmt::Display for ComplianceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplianceTier {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "robust" => Ok(Self::Robust),
            _ => Err(TypeError::UnknownTier(s.to_string())),
        }
    }
}

// =============================================================================
// CLUSTER B: RECORDS
// =============================================================================

/// Identifier of a compliance record row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Status of a single requirement for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    /// Requirement satisfied.
    Compliant,
    /// Awaiting submission or review.
    Pending,
    /// Satisfied but close to expiry or otherwise flagged.
    Warning,
    /// Requirement not met.
    NonCompliant,
}

impl ComplianceStatus {
    /// Wire name for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::Pending => "pending",
            Self::Warning => "warning",
            Self::NonCompliant => "non_compliant",
        }
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-user, per-requirement compliance entry.
///
/// The backend owns these rows; `updated_at` is the version token used to
/// detect collisions between cached copies and incoming changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRecord {
    /// Row identifier.
    pub id: RecordId,
    /// Owning user.
    pub user_id: UserId,
    /// Metric / category this record tracks.
    pub metric_id: String,
    /// Current status.
    pub status: ComplianceStatus,
    /// Measured value, when the metric is quantitative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_value: Option<serde_json::Value>,
    /// Free-form reviewer notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl ComplianceRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        id: impl Into<RecordId>,
        user_id: impl Into<UserId>,
        metric_id: impl Into<String>,
        status: ComplianceStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            metric_id: metric_id.into(),
            status,
            current_value: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: set `updated_at` (and `created_at` when it would be later).
    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        if self.created_at > updated_at {
            self.created_at = updated_at;
        }
        self
    }

    /// Builder: set reviewer notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Whether the requirement is satisfied.
    pub fn is_compliant(&self) -> bool {
        self.status == ComplianceStatus::Compliant
    }
}

// =============================================================================
// CLUSTER C: CATALOG
// =============================================================================

/// A requirement that applies to every user of a role and tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementTemplate {
    /// Template identifier.
    pub id: String,
    /// Role the requirement applies to.
    pub role: UserRole,
    /// Tier the requirement applies to.
    pub tier: ComplianceTier,
    /// Display name.
    pub name: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// Grouping category (documents, training, ...).
    #[serde(default)]
    pub category: String,
    /// Whether completion is required for the tier.
    #[serde(default)]
    pub is_mandatory: bool,
    /// Sort key for display.
    #[serde(default)]
    pub display_order: i32,
}

/// Tier progress roll-up for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSummary {
    /// User the summary belongs to.
    pub user_id: UserId,
    /// Tier being summarized.
    pub tier: ComplianceTier,
    /// Number of requirements in the tier.
    pub total_requirements: u32,
    /// Number of completed requirements.
    pub completed_requirements: u32,
    /// Completion ratio in percent (0-100).
    pub completion_percentage: f64,
    /// Last recalculation time.
    pub updated_at: DateTime<Utc>,
}

impl TierSummary {
    /// Whether every requirement in the tier is complete.
    pub fn is_complete(&self) -> bool {
        self.total_requirements > 0 && self.completed_requirements >= self.total_requirements
    }
}
