use crate::metrics::cohort_averages;
use crate::models::{RiskLevel, Tutor};

// Platform benchmarks quoted to the model as fixed context. These come from
// platform research, not from the session data.
const FIRST_SESSION_CHURN_PCT: f64 = 24.0;
const TUTOR_INITIATED_RESCHEDULE_PCT: f64 = 98.2;
const NO_SHOW_REPLACEMENT_PCT: f64 = 16.0;

/// Sampling temperature for risk classification. Kept low so repeated runs
/// over the same metrics classify consistently.
pub const RISK_TEMPERATURE: f32 = 0.3;
/// Sampling temperature for recommendation and insight generation.
pub const INSIGHT_TEMPERATURE: f32 = 0.7;

/// Prompt asking for a risk classification of one tutor. The caller must
/// have refreshed the tutor's derived metrics first.
pub fn risk_prompt(tutor: &Tutor) -> String {
    format!(
        "You are an expert tutor performance analyst. Analyze this tutor's performance metrics and classify their risk level.\n\
         \n\
         Tutor Metrics:\n\
         - Average Rating: {avg:.2}/5.0\n\
         - First Session Success Rate: {first:.1}% (percentage of first sessions rated 4+ stars)\n\
         - Total Sessions: {total}\n\
         - Reschedule Rate: {resched:.1}% (percentage of sessions rescheduled by tutor)\n\
         - No-Show Count: {no_shows} (total sessions where tutor didn't attend)\n\
         - Current Student Count: {students} (active students in last 30 days)\n\
         - Support Ticket Count (48h): {tickets} (recent support tickets about this tutor)\n\
         - Profile Completion: {profile:.0}%\n\
         \n\
         Context:\n\
         - First session experience is critical: {churn:.0}% of tutor churn correlates with poor first sessions\n\
         - No-shows are serious: {replacement:.0}% of tutor replacements are due to no-shows\n\
         - Reschedules impact student experience: {tutor_resched:.1}% are tutor-initiated\n\
         \n\
         Risk Level Guidelines:\n\
         - LOW: Performing well across all metrics, reliable, no concerning patterns\n\
         - MEDIUM: Some concerning patterns or declining metrics, needs monitoring\n\
         - HIGH: Multiple red flags, likely to churn or negatively impact students\n\
         \n\
         Provide your assessment in this exact format:\n\
         RISK_LEVEL: [low|medium|high]\n\
         REASONING: [2-3 sentences explaining the risk classification, focusing on specific metrics and patterns]",
        avg = tutor.avg_rating,
        first = tutor.first_session_success_rate,
        total = tutor.total_sessions,
        resched = tutor.reschedule_rate,
        no_shows = tutor.no_show_count,
        students = tutor.current_student_count,
        tickets = tutor.support_ticket_count,
        profile = tutor.profile_completion_rate,
        churn = FIRST_SESSION_CHURN_PCT,
        replacement = NO_SHOW_REPLACEMENT_PCT,
        tutor_resched = TUTOR_INITIATED_RESCHEDULE_PCT,
    )
}

/// Prompt asking for coaching recommendations for one at-risk tutor,
/// carrying the prior risk reasoning as context when it exists.
pub fn recommendation_prompt(tutor: &Tutor) -> String {
    let risk_label = tutor
        .risk_score
        .map(|level| level.to_string().to_uppercase())
        .unwrap_or_else(|| "UNASSESSED".to_string());
    let context = tutor
        .risk_reasoning
        .as_deref()
        .unwrap_or("No specific risk reasoning available.");

    format!(
        "You are a coaching advisor for a tutoring platform. Generate specific, actionable recommendations for this tutor.\n\
         \n\
         TUTOR PROFILE:\n\
         - Name: {name}\n\
         - Risk Level: {risk}\n\
         - Average Rating: {avg:.2}/5.0\n\
         - First Session Success Rate: {first:.1}%\n\
         - Total Sessions: {total}\n\
         - Reschedule Rate: {resched:.1}%\n\
         - No-Shows: {no_shows}\n\
         - Support Tickets (48h): {tickets}\n\
         - Profile Completion: {profile:.1}%\n\
         - Current Students: {students}\n\
         \n\
         CONTEXT:\n\
         {context}\n\
         \n\
         TASK:\n\
         Generate 2-4 specific, actionable recommendations for this tutor. Each recommendation should:\n\
         1. Address a specific performance issue\n\
         2. Be actionable (coach can implement it)\n\
         3. Have clear impact on student experience\n\
         4. Be prioritized by urgency/impact\n\
         \n\
         FORMAT EACH RECOMMENDATION EXACTLY AS:\n\
         ---\n\
         PRIORITY: [high/medium]\n\
         CATEGORY: [first_session/reliability/engagement/profile]\n\
         ACTION: [One clear sentence describing the action]\n\
         REASONING: [One sentence explaining why this matters]\n\
         ---\n\
         \n\
         Provide 2-4 recommendations.",
        name = tutor.name,
        risk = risk_label,
        avg = tutor.avg_rating,
        first = tutor.first_session_success_rate,
        total = tutor.total_sessions,
        resched = tutor.reschedule_rate,
        no_shows = tutor.no_show_count,
        tickets = tutor.support_ticket_count,
        profile = tutor.profile_completion_rate,
        students = tutor.current_student_count,
        context = context,
    )
}

/// Prompt contrasting the high-risk and low-risk cohorts for system-wide
/// pattern analysis.
pub fn insights_prompt(tutors: &[Tutor]) -> String {
    let total = tutors.len();
    let at_risk = tutors
        .iter()
        .filter(|t| !matches!(t.risk_score, Some(RiskLevel::Low)))
        .count();
    let low_first_session = tutors
        .iter()
        .filter(|t| t.first_session_success_rate < 50.0)
        .count();
    let low_profile = tutors
        .iter()
        .filter(|t| t.profile_completion_rate < 70.0)
        .count();
    let high_ticket = tutors.iter().filter(|t| t.support_ticket_count >= 2).count();

    let high_cohort: Vec<&Tutor> = tutors
        .iter()
        .filter(|t| t.risk_score == Some(RiskLevel::High))
        .collect();
    let low_cohort: Vec<&Tutor> = tutors
        .iter()
        .filter(|t| t.risk_score == Some(RiskLevel::Low))
        .collect();
    let high_avg = cohort_averages(&high_cohort);
    let low_avg = cohort_averages(&low_cohort);

    let pct_of_total = |count: usize| {
        if total > 0 {
            count as f64 / total as f64 * 100.0
        } else {
            0.0
        }
    };

    format!(
        "You are analyzing a tutoring platform to identify patterns causing poor performance and student churn.\n\
         \n\
         BUSINESS CONTEXT:\n\
         - {churn:.0}% of students churn after poor first sessions\n\
         - {tutor_resched:.1}% of reschedules are tutor-initiated (tutors being unreliable)\n\
         - {replacement:.0}% of students need replacement tutors due to no-shows\n\
         - Our goal is to identify root causes and systemic improvements\n\
         \n\
         AGGREGATE DATA:\n\
         Total Tutors: {total}\n\
         At-Risk Tutors (medium/high): {at_risk} ({at_risk_pct:.1}%)\n\
         Tutors with <50% First Session Success: {low_first}\n\
         \n\
         HIGH-RISK TUTORS AVERAGE METRICS:\n\
         - Average Rating: {h_rating:.2}/5.0\n\
         - Reschedule Rate: {h_resched:.1}%\n\
         - First Session Success: {h_first:.1}%\n\
         - Profile Completion: {h_profile:.1}%\n\
         \n\
         LOW-RISK TUTORS AVERAGE METRICS:\n\
         - Average Rating: {l_rating:.2}/5.0\n\
         - Reschedule Rate: {l_resched:.1}%\n\
         - First Session Success: {l_first:.1}%\n\
         - Profile Completion: {l_profile:.1}%\n\
         \n\
         ADDITIONAL INSIGHTS:\n\
         - Tutors with <70% profile completion: {low_profile} ({low_profile_pct:.1}%)\n\
         - Tutors with 2+ support tickets (48hr): {high_ticket}\n\
         \n\
         TASK:\n\
         Identify key patterns and provide actionable recommendations.\n\
         \n\
         FORMAT YOUR RESPONSE EXACTLY AS:\n\
         FIRST_SESSION_PATTERNS:\n\
         - [Pattern 1 about first sessions]\n\
         - [Pattern 2 about first sessions]\n\
         - [Pattern 3 about first sessions]\n\
         \n\
         COMMON_RISK_FACTORS:\n\
         - [Risk factor 1]\n\
         - [Risk factor 2]\n\
         - [Risk factor 3]\n\
         \n\
         SYSTEM_RECOMMENDATIONS:\n\
         - [System-wide recommendation 1]\n\
         - [System-wide recommendation 2]\n\
         \n\
         Be specific and data-driven. Focus on actionable insights.",
        churn = FIRST_SESSION_CHURN_PCT,
        tutor_resched = TUTOR_INITIATED_RESCHEDULE_PCT,
        replacement = NO_SHOW_REPLACEMENT_PCT,
        total = total,
        at_risk = at_risk,
        at_risk_pct = pct_of_total(at_risk),
        low_first = low_first_session,
        h_rating = high_avg.rating,
        h_resched = high_avg.reschedule_rate,
        h_first = high_avg.first_session_rate,
        h_profile = high_avg.profile_completion,
        l_rating = low_avg.rating,
        l_resched = low_avg.reschedule_rate,
        l_first = low_avg.first_session_rate,
        l_profile = low_avg.profile_completion,
        low_profile = low_profile,
        low_profile_pct = pct_of_total(low_profile),
        high_ticket = high_ticket,
    )
}
