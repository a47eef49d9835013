use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Priority, Recommendation, RecommendationCategory, RiskLevel};

/// A completion came back but did not carry the labeled fields the prompt
/// asked for. Expected from a generative source; callers skip and continue.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("completion has no recognizable RISK_LEVEL line")]
    MissingRiskLevel,
    #[error("completion has no REASONING section")]
    MissingReasoning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub reasoning: String,
}

static RISK_LEVEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)RISK_LEVEL:\s*(low|medium|high)").unwrap());
static RISK_REASONING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)REASONING:\s*(.+)").unwrap());

static PRIORITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*PRIORITY:\s*(high|medium)\b").unwrap());
static CATEGORY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*CATEGORY:\s*(first_session|reliability|engagement|profile)\b").unwrap()
});
static ACTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^\s*ACTION:\s*(.+)$").unwrap());
static REC_REASONING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*REASONING:\s*(.+)$").unwrap());

fn risk_level_from_token(token: &str) -> RiskLevel {
    match token.to_ascii_lowercase().as_str() {
        "high" => RiskLevel::High,
        "medium" => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

/// Extract the `RISK_LEVEL:` token and the `REASONING:` block from a risk
/// classification completion.
pub fn parse_risk_assessment(text: &str) -> Result<RiskAssessment, ParseError> {
    let level = RISK_LEVEL_RE
        .captures(text)
        .map(|caps| risk_level_from_token(&caps[1]))
        .ok_or(ParseError::MissingRiskLevel)?;

    let reasoning = RISK_REASONING_RE
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|reasoning| !reasoning.is_empty())
        .ok_or(ParseError::MissingReasoning)?;

    Ok(RiskAssessment { level, reasoning })
}

/// Extract recommendations from a `---`-delimited completion. A block
/// missing any of PRIORITY, CATEGORY, ACTION, or REASONING is discarded
/// rather than treated as an error. At most 4 recommendations are kept, in
/// response order.
pub fn parse_recommendations(text: &str, tutor_id: &str) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    for block in text.split("---") {
        if block.trim().is_empty() {
            continue;
        }

        let priority = PRIORITY_RE.captures(block).map(|caps| {
            if caps[1].eq_ignore_ascii_case("high") {
                Priority::High
            } else {
                Priority::Medium
            }
        });
        let category = CATEGORY_RE
            .captures(block)
            .map(|caps| match caps[1].to_ascii_lowercase().as_str() {
                "first_session" => RecommendationCategory::FirstSession,
                "reliability" => RecommendationCategory::Reliability,
                "engagement" => RecommendationCategory::Engagement,
                _ => RecommendationCategory::Profile,
            });
        let action = ACTION_RE
            .captures(block)
            .map(|caps| caps[1].trim().to_string())
            .filter(|action| !action.is_empty());
        let reasoning = REC_REASONING_RE
            .captures(block)
            .map(|caps| caps[1].trim().to_string())
            .filter(|reasoning| !reasoning.is_empty());

        if let (Some(priority), Some(category), Some(action), Some(reasoning)) =
            (priority, category, action, reasoning)
        {
            recommendations.push(Recommendation {
                id: format!("rec-{}-{}", tutor_id, recommendations.len() + 1),
                priority,
                category,
                action,
                reasoning,
            });
        }
    }

    recommendations.truncate(4);
    recommendations
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsightSections {
    pub first_session_patterns: Vec<String>,
    pub common_risk_factors: Vec<String>,
    pub system_recommendations: Vec<String>,
}

/// Collect the three labeled bullet sections from a pattern-analysis
/// completion. A section that never appears yields an empty list.
pub fn parse_insight_sections(text: &str) -> InsightSections {
    enum Section {
        None,
        FirstSession,
        RiskFactors,
        SystemRecs,
    }

    let mut sections = InsightSections::default();
    let mut current = Section::None;

    for line in text.lines() {
        let trimmed = line.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper.contains("FIRST_SESSION_PATTERNS") {
            current = Section::FirstSession;
            continue;
        }
        if upper.contains("COMMON_RISK_FACTORS") {
            current = Section::RiskFactors;
            continue;
        }
        if upper.contains("SYSTEM_RECOMMENDATIONS") {
            current = Section::SystemRecs;
            continue;
        }

        let item = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix('-'))
            .or_else(|| trimmed.strip_prefix("* "))
            .or_else(|| trimmed.strip_prefix('*'))
            .map(str::trim);

        if let Some(item) = item.filter(|item| !item.is_empty()) {
            match current {
                Section::None => {}
                Section::FirstSession => sections.first_session_patterns.push(item.to_string()),
                Section::RiskFactors => sections.common_risk_factors.push(item.to_string()),
                Section::SystemRecs => sections.system_recommendations.push(item.to_string()),
            }
        }
    }

    sections
}
