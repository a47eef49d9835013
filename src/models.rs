use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse classification of a tutor's likelihood of causing student churn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Sort rank for display: high > medium > low, with unassessed below all.
    pub fn rank(level: Option<RiskLevel>) -> u8 {
        match level {
            Some(RiskLevel::High) => 3,
            Some(RiskLevel::Medium) => 2,
            Some(RiskLevel::Low) => 1,
            None => 0,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// How a session ended. A session has exactly one outcome; the completed
/// variant covers every session that actually took place as scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed,
    Rescheduled,
    NoShow,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    FirstSession,
    Reliability,
    Engagement,
    Profile,
}

impl fmt::Display for RecommendationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationCategory::FirstSession => write!(f, "first_session"),
            RecommendationCategory::Reliability => write!(f, "reliability"),
            RecommendationCategory::Engagement => write!(f, "engagement"),
            RecommendationCategory::Profile => write!(f, "profile"),
        }
    }
}

/// One actionable coaching suggestion attached to a tutor. The pipeline
/// replaces a tutor's whole recommendation set atomically on each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    pub priority: Priority,
    pub category: RecommendationCategory,
    pub action: String,
    pub reasoning: String,
}

/// A tutoring professional. The derived metric fields are always a pure
/// function of the current session set for this tutor id and are rewritten
/// wholesale by `metrics::enrich_tutors`, never hand-edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tutor {
    pub id: String,
    pub name: String,
    pub email: String,
    pub join_date: DateTime<Utc>,
    #[serde(default)]
    pub total_sessions: usize,
    #[serde(default)]
    pub avg_rating: f64,
    #[serde(default)]
    pub first_session_success_rate: f64,
    #[serde(default)]
    pub reschedule_rate: f64,
    #[serde(default)]
    pub no_show_count: usize,
    /// Distinct students served in the trailing 30 days.
    #[serde(default)]
    pub current_student_count: usize,
    /// Support tickets opened about this tutor in the trailing 48 hours.
    /// Independently sourced; not derived from sessions.
    #[serde(default)]
    pub support_ticket_count: usize,
    /// Profile completion percentage, 0-100. Independently sourced.
    #[serde(default)]
    pub profile_completion_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score_generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

impl Tutor {
    pub fn risk_rank(&self) -> u8 {
        RiskLevel::rank(self.risk_score)
    }
}

/// One tutoring appointment. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub tutor_id: String,
    pub student_id: String,
    pub date: DateTime<Utc>,
    pub is_first_session: bool,
    /// Student rating, 1-5 stars.
    pub rating: u8,
    /// Duration in minutes.
    pub duration: u32,
    pub outcome: SessionOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightPatterns {
    pub first_session_failures: Vec<String>,
    pub common_risk_factors: Vec<String>,
}

/// System-wide analysis snapshot, fully replaced on each analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub generated_at: DateTime<Utc>,
    pub patterns: InsightPatterns,
    pub system_recommendations: Vec<String>,
}
