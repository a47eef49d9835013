use std::time::Duration;

use anyhow::Context;
use chrono::Utc;

use crate::llm::{LlmError, TextGenerator};
use crate::models::{
    InsightPatterns, Insights, Priority, Recommendation, RecommendationCategory, RiskLevel, Tutor,
};
use crate::parse;
use crate::prompts;
use crate::store::Store;

/// Fixed pacing between consecutive external-service calls. The service is
/// shared and externally rate-limited, so the pause runs after every call
/// whether it succeeded or not.
pub struct RateLimiter {
    interval: Duration,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub async fn pause(&self) {
        tokio::time::sleep(self.interval).await;
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScoreSummary {
    pub processed: usize,
    pub skipped: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AnalysisSummary {
    pub tutors_analyzed: usize,
    pub recommendations_generated: usize,
    pub skipped: usize,
}

/// Classify every tutor's risk level in one sequential batch. A tutor whose
/// call or parse fails keeps its prior risk fields and the batch continues.
/// The tutor collection is read once up front and written once at the end.
pub async fn run_risk_scoring(
    store: &dyn Store,
    generator: &dyn TextGenerator,
    limiter: &RateLimiter,
) -> anyhow::Result<ScoreSummary> {
    let mut tutors = store
        .load_tutors()
        .context("failed to load tutor collection")?;
    tracing::info!(tutors = tutors.len(), "starting risk classification batch");

    let mut summary = ScoreSummary::default();

    for tutor in tutors.iter_mut() {
        let prompt = prompts::risk_prompt(tutor);
        let completion = generator.generate(&prompt, prompts::RISK_TEMPERATURE).await;
        limiter.pause().await;

        let completion = match completion {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(tutor = %tutor.id, error = %err, "risk classification call failed, skipping tutor");
                summary.skipped += 1;
                continue;
            }
        };

        match parse::parse_risk_assessment(&completion) {
            Ok(assessment) => {
                tutor.risk_score = Some(assessment.level);
                tutor.risk_reasoning = Some(assessment.reasoning);
                tutor.risk_score_generated_at = Some(Utc::now());
                summary.processed += 1;
                match assessment.level {
                    RiskLevel::High => summary.high += 1,
                    RiskLevel::Medium => summary.medium += 1,
                    RiskLevel::Low => summary.low += 1,
                }
                tracing::info!(tutor = %tutor.id, level = %assessment.level, "tutor classified");
            }
            Err(err) => {
                tracing::warn!(tutor = %tutor.id, error = %err, "unparseable risk completion, skipping tutor");
                summary.skipped += 1;
            }
        }
    }

    store
        .save_tutors(&tutors)
        .context("failed to save tutor collection")?;
    Ok(summary)
}

/// One call to the generator producing the system-wide insights snapshot.
/// Section parsing cannot fail; a section the model omits comes back empty.
pub async fn generate_system_insights(
    tutors: &[Tutor],
    generator: &dyn TextGenerator,
) -> Result<Insights, LlmError> {
    let prompt = prompts::insights_prompt(tutors);
    let completion = generator.generate(&prompt, prompts::INSIGHT_TEMPERATURE).await?;
    let sections = parse::parse_insight_sections(&completion);

    Ok(Insights {
        generated_at: Utc::now(),
        patterns: InsightPatterns {
            first_session_failures: sections.first_session_patterns,
            common_risk_factors: sections.common_risk_factors,
        },
        system_recommendations: sections.system_recommendations,
    })
}

/// Deterministic recommendations synthesized from threshold rules when the
/// generator returns nothing parseable, so an at-risk tutor is never left
/// without an actionable item the rules can produce.
fn fallback_recommendations(tutor: &Tutor) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if tutor.first_session_success_rate < 60.0 {
        recommendations.push(Recommendation {
            id: format!("rec-{}-{}", tutor.id, recommendations.len() + 1),
            priority: Priority::High,
            category: RecommendationCategory::FirstSession,
            action: "Schedule first session preparation training".to_string(),
            reasoning: "Low first session success rate needs immediate attention".to_string(),
        });
    }
    if tutor.profile_completion_rate < 70.0 {
        recommendations.push(Recommendation {
            id: format!("rec-{}-{}", tutor.id, recommendations.len() + 1),
            priority: Priority::Medium,
            category: RecommendationCategory::Profile,
            action: "Complete tutor profile to at least 80%".to_string(),
            reasoning: "Incomplete profiles correlate with lower performance".to_string(),
        });
    }

    recommendations
}

/// Generate the system insights snapshot, then coaching recommendations for
/// every medium- and high-risk tutor. Low-risk and unassessed tutors have
/// their recommendation lists cleared. Each tutor's recommendation set is
/// replaced whole; a failed call keeps the prior set.
pub async fn run_pattern_analysis(
    store: &dyn Store,
    generator: &dyn TextGenerator,
    limiter: &RateLimiter,
) -> anyhow::Result<AnalysisSummary> {
    let mut tutors = store
        .load_tutors()
        .context("failed to load tutor collection")?;
    tracing::info!(tutors = tutors.len(), "starting pattern analysis batch");

    let insights = generate_system_insights(&tutors, generator)
        .await
        .context("failed to generate system insights")?;
    limiter.pause().await;
    store
        .save_insights(&insights)
        .context("failed to save insights snapshot")?;

    let mut summary = AnalysisSummary::default();

    for tutor in tutors.iter_mut() {
        match tutor.risk_score {
            Some(RiskLevel::Medium) | Some(RiskLevel::High) => {}
            _ => {
                tutor.recommendations.clear();
                continue;
            }
        }
        summary.tutors_analyzed += 1;

        let prompt = prompts::recommendation_prompt(tutor);
        let completion = generator
            .generate(&prompt, prompts::INSIGHT_TEMPERATURE)
            .await;
        limiter.pause().await;

        let completion = match completion {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(tutor = %tutor.id, error = %err, "recommendation call failed, keeping prior recommendations");
                summary.skipped += 1;
                continue;
            }
        };

        let mut recommendations = parse::parse_recommendations(&completion, &tutor.id);
        if recommendations.is_empty() {
            recommendations = fallback_recommendations(tutor);
        }
        tutor.recommendations = recommendations;
        summary.recommendations_generated += 1;
    }

    store
        .save_tutors(&tutors)
        .context("failed to save tutor collection")?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    use async_trait::async_trait;

    use crate::store::MemoryStore;

    /// Replays canned completions in order; an exhausted script keeps
    /// returning empty completions.
    #[derive(Default)]
    struct ScriptedGenerator {
        replies: Mutex<VecDeque<Result<String, ()>>>,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<Result<&str, ()>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(())) => Err(LlmError::EmptyCompletion),
                None => Ok(String::new()),
            }
        }
    }

    fn tutor(id: &str, risk: Option<RiskLevel>) -> Tutor {
        Tutor {
            id: id.to_string(),
            name: format!("Tutor {id}"),
            email: format!("{id}@example.com"),
            join_date: Utc::now(),
            total_sessions: 20,
            avg_rating: 4.1,
            first_session_success_rate: 70.0,
            reschedule_rate: 5.0,
            no_show_count: 0,
            current_student_count: 4,
            support_ticket_count: 0,
            profile_completion_rate: 90.0,
            risk_score: risk,
            risk_reasoning: risk.map(|_| "prior reasoning".to_string()),
            risk_score_generated_at: risk.map(|_| Utc::now()),
            recommendations: Vec::new(),
        }
    }

    fn limiter() -> RateLimiter {
        RateLimiter::new(Duration::ZERO)
    }

    const INSIGHTS_REPLY: &str = "FIRST_SESSION_PATTERNS:\n- Rushed introductions\nCOMMON_RISK_FACTORS:\n- High reschedule rates\nSYSTEM_RECOMMENDATIONS:\n- Publish a first-session checklist";

    #[tokio::test]
    async fn risk_scoring_classifies_and_skips_unparseable() {
        let store = MemoryStore::with_data(
            vec![tutor("t1", None), tutor("t2", None), tutor("t3", None)],
            Vec::new(),
        );
        let generator = ScriptedGenerator::new(vec![
            Ok("RISK_LEVEL: high\nREASONING: Reschedules well above benchmark."),
            Ok("I am unable to classify this tutor."),
            Ok("RISK_LEVEL: low\nREASONING: Strong across the board."),
        ]);

        let summary = run_risk_scoring(&store, &generator, &limiter())
            .await
            .unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.high, 1);
        assert_eq!(summary.medium, 0);
        assert_eq!(summary.low, 1);
        assert_eq!(generator.call_count(), 3);

        let tutors = store.load_tutors().unwrap();
        assert_eq!(tutors[0].risk_score, Some(RiskLevel::High));
        assert!(tutors[0].risk_score_generated_at.is_some());
        assert_eq!(tutors[1].risk_score, None);
        assert_eq!(tutors[2].risk_score, Some(RiskLevel::Low));
    }

    #[tokio::test]
    async fn parse_failure_leaves_prior_assessment_untouched() {
        let mut assessed = tutor("t1", Some(RiskLevel::Low));
        assessed.risk_reasoning = Some("previously solid".to_string());
        let store = MemoryStore::with_data(vec![assessed], Vec::new());
        let generator = ScriptedGenerator::new(vec![Ok("no markers here")]);

        let summary = run_risk_scoring(&store, &generator, &limiter())
            .await
            .unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.skipped, 1);

        let tutors = store.load_tutors().unwrap();
        assert_eq!(tutors[0].risk_score, Some(RiskLevel::Low));
        assert_eq!(tutors[0].risk_reasoning.as_deref(), Some("previously solid"));
    }

    #[tokio::test]
    async fn call_failure_skips_tutor_and_batch_continues() {
        let store = MemoryStore::with_data(vec![tutor("t1", None), tutor("t2", None)], Vec::new());
        let generator = ScriptedGenerator::new(vec![
            Err(()),
            Ok("RISK_LEVEL: medium\nREASONING: Watchlist material."),
        ]);

        let summary = run_risk_scoring(&store, &generator, &limiter())
            .await
            .unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.medium, 1);

        let tutors = store.load_tutors().unwrap();
        assert!(tutors[0].risk_score.is_none());
        assert_eq!(tutors[1].risk_score, Some(RiskLevel::Medium));
    }

    fn stale_recommendation(tutor_id: &str) -> Recommendation {
        Recommendation {
            id: format!("rec-{tutor_id}-1"),
            priority: Priority::Medium,
            category: RecommendationCategory::Engagement,
            action: "stale action".to_string(),
            reasoning: "stale reasoning".to_string(),
        }
    }

    #[tokio::test]
    async fn analysis_clears_low_risk_and_recommends_for_at_risk() {
        let mut low = tutor("t-low", Some(RiskLevel::Low));
        low.recommendations = vec![stale_recommendation("t-low")];
        let mut unassessed = tutor("t-new", None);
        unassessed.recommendations = vec![stale_recommendation("t-new")];
        let high = tutor("t-high", Some(RiskLevel::High));

        let store = MemoryStore::with_data(vec![low, unassessed, high], Vec::new());
        let generator = ScriptedGenerator::new(vec![
            Ok(INSIGHTS_REPLY),
            Ok("---\nPRIORITY: high\nCATEGORY: reliability\nACTION: Confirm every session a day ahead.\nREASONING: Reschedules drive churn.\n---\nPRIORITY: medium\nCATEGORY: engagement\nACTION: Send a recap note after each session.\nREASONING: Keeps students invested.\n---"),
        ]);

        let summary = run_pattern_analysis(&store, &generator, &limiter())
            .await
            .unwrap();
        assert_eq!(summary.tutors_analyzed, 1);
        assert_eq!(summary.recommendations_generated, 1);
        assert_eq!(summary.skipped, 0);

        let tutors = store.load_tutors().unwrap();
        assert!(tutors[0].recommendations.is_empty());
        assert!(tutors[1].recommendations.is_empty());
        assert_eq!(tutors[2].recommendations.len(), 2);
        assert_eq!(tutors[2].recommendations[0].id, "rec-t-high-1");
        assert_eq!(
            tutors[2].recommendations[0].category,
            RecommendationCategory::Reliability
        );

        let insights = store.load_insights().unwrap().unwrap();
        assert_eq!(
            insights.patterns.first_session_failures,
            vec!["Rushed introductions".to_string()]
        );
        assert_eq!(insights.system_recommendations.len(), 1);
    }

    #[tokio::test]
    async fn unparseable_recommendations_fall_back_to_threshold_rules() {
        let mut at_risk = tutor("t1", Some(RiskLevel::Medium));
        at_risk.first_session_success_rate = 40.0;
        at_risk.profile_completion_rate = 65.0;

        let store = MemoryStore::with_data(vec![at_risk], Vec::new());
        let generator = ScriptedGenerator::new(vec![
            Ok(INSIGHTS_REPLY),
            Ok("Sorry, I can't format that."),
        ]);

        run_pattern_analysis(&store, &generator, &limiter())
            .await
            .unwrap();

        let tutors = store.load_tutors().unwrap();
        let recs = &tutors[0].recommendations;
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].category, RecommendationCategory::FirstSession);
        assert_eq!(recs[0].priority, Priority::High);
        assert_eq!(recs[1].category, RecommendationCategory::Profile);
        assert_eq!(recs[1].priority, Priority::Medium);
        assert_eq!(recs[0].id, "rec-t1-1");
        assert_eq!(recs[1].id, "rec-t1-2");
        for rec in recs {
            assert!(!rec.action.is_empty());
            assert!(!rec.reasoning.is_empty());
        }
    }

    #[tokio::test]
    async fn failed_recommendation_call_keeps_prior_set() {
        let mut at_risk = tutor("t1", Some(RiskLevel::High));
        at_risk.recommendations = vec![Recommendation {
            id: "rec-t1-1".to_string(),
            priority: Priority::High,
            category: RecommendationCategory::Reliability,
            action: "existing action".to_string(),
            reasoning: "existing reasoning".to_string(),
        }];

        let store = MemoryStore::with_data(vec![at_risk], Vec::new());
        let generator = ScriptedGenerator::new(vec![Ok(INSIGHTS_REPLY), Err(())]);

        let summary = run_pattern_analysis(&store, &generator, &limiter())
            .await
            .unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.recommendations_generated, 0);

        let tutors = store.load_tutors().unwrap();
        assert_eq!(tutors[0].recommendations.len(), 1);
        assert_eq!(tutors[0].recommendations[0].action, "existing action");
    }

    #[tokio::test]
    async fn insights_survive_empty_high_risk_cohort() {
        // No high-risk tutors at all; the cohort contrast must not fail.
        let store = MemoryStore::with_data(
            vec![tutor("t1", Some(RiskLevel::Low)), tutor("t2", None)],
            Vec::new(),
        );
        let generator = ScriptedGenerator::new(vec![Ok(INSIGHTS_REPLY)]);

        let summary = run_pattern_analysis(&store, &generator, &limiter())
            .await
            .unwrap();
        assert_eq!(summary.tutors_analyzed, 0);
        assert!(store.load_insights().unwrap().is_some());
    }

    #[tokio::test]
    async fn rate_limiter_waits_its_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(30));
        let start = Instant::now();
        limiter.pause().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
