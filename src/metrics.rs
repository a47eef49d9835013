use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::models::{Session, SessionOutcome, Tutor};

/// Sessions this far back count toward "current" activity.
const ACTIVITY_WINDOW_DAYS: i64 = 30;

/// Derived per-tutor statistics, recomputed from the full session set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TutorMetrics {
    pub total_sessions: usize,
    pub avg_rating: f64,
    pub first_session_success_rate: f64,
    pub reschedule_rate: f64,
    pub no_show_count: usize,
    pub current_student_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemMetrics {
    pub total_tutors: usize,
    pub total_sessions: usize,
    pub avg_rating: f64,
    /// Tutors with at least one session in the trailing 30 days.
    pub active_tutors: usize,
    /// Session counts for ratings 1 through 5, ascending.
    pub rating_distribution: [usize; 5],
}

/// Mean metrics for a cohort of tutors. An empty cohort divides by 1 and
/// therefore reports zeros rather than failing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CohortAverages {
    pub rating: f64,
    pub reschedule_rate: f64,
    pub first_session_rate: f64,
    pub profile_completion: f64,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Compute one tutor's derived metrics from the full session set. A tutor
/// with no sessions gets the all-zero tuple.
pub fn compute_tutor_metrics(
    tutor_id: &str,
    sessions: &[Session],
    now: DateTime<Utc>,
) -> TutorMetrics {
    let tutor_sessions: Vec<&Session> =
        sessions.iter().filter(|s| s.tutor_id == tutor_id).collect();

    if tutor_sessions.is_empty() {
        return TutorMetrics::default();
    }

    let total = tutor_sessions.len();
    let rating_sum: u32 = tutor_sessions.iter().map(|s| s.rating as u32).sum();
    let avg_rating = round1(rating_sum as f64 / total as f64);

    let first_sessions = tutor_sessions.iter().filter(|s| s.is_first_session).count();
    let successful_first = tutor_sessions
        .iter()
        .filter(|s| s.is_first_session && s.rating >= 4)
        .count();
    // Zero first sessions reports 0, not an error. This is a policy choice,
    // not a true rate.
    let first_session_success_rate = if first_sessions > 0 {
        round1(successful_first as f64 / first_sessions as f64 * 100.0)
    } else {
        0.0
    };

    let rescheduled = tutor_sessions
        .iter()
        .filter(|s| s.outcome == SessionOutcome::Rescheduled)
        .count();
    let reschedule_rate = round1(rescheduled as f64 / total as f64 * 100.0);

    let no_show_count = tutor_sessions
        .iter()
        .filter(|s| s.outcome == SessionOutcome::NoShow)
        .count();

    let window_start = now - Duration::days(ACTIVITY_WINDOW_DAYS);
    let current_students: HashSet<&str> = tutor_sessions
        .iter()
        .filter(|s| s.date >= window_start)
        .map(|s| s.student_id.as_str())
        .collect();

    TutorMetrics {
        total_sessions: total,
        avg_rating,
        first_session_success_rate,
        reschedule_rate,
        no_show_count,
        current_student_count: current_students.len(),
    }
}

/// Overwrite every tutor's derived metric fields from the session set.
pub fn enrich_tutors(tutors: &mut [Tutor], sessions: &[Session], now: DateTime<Utc>) {
    for tutor in tutors.iter_mut() {
        let metrics = compute_tutor_metrics(&tutor.id, sessions, now);
        tutor.total_sessions = metrics.total_sessions;
        tutor.avg_rating = metrics.avg_rating;
        tutor.first_session_success_rate = metrics.first_session_success_rate;
        tutor.reschedule_rate = metrics.reschedule_rate;
        tutor.no_show_count = metrics.no_show_count;
        tutor.current_student_count = metrics.current_student_count;
    }
}

pub fn compute_system_metrics(
    tutors: &[Tutor],
    sessions: &[Session],
    now: DateTime<Utc>,
) -> SystemMetrics {
    let total_sessions = sessions.len();
    let rating_sum: u32 = sessions.iter().map(|s| s.rating as u32).sum();
    let avg_rating = if total_sessions > 0 {
        round1(rating_sum as f64 / total_sessions as f64)
    } else {
        0.0
    };

    let window_start = now - Duration::days(ACTIVITY_WINDOW_DAYS);
    let active_tutor_ids: HashSet<&str> = sessions
        .iter()
        .filter(|s| s.date >= window_start)
        .map(|s| s.tutor_id.as_str())
        .collect();

    let mut rating_distribution = [0usize; 5];
    for session in sessions {
        if (1..=5).contains(&session.rating) {
            rating_distribution[(session.rating - 1) as usize] += 1;
        }
    }

    SystemMetrics {
        total_tutors: tutors.len(),
        total_sessions,
        avg_rating,
        active_tutors: active_tutor_ids.len(),
        rating_distribution,
    }
}

/// Mean metrics across a cohort, dividing by max(len, 1) so an empty cohort
/// reports zeros.
pub fn cohort_averages(cohort: &[&Tutor]) -> CohortAverages {
    let divisor = cohort.len().max(1) as f64;
    // An empty `sum::<f64>()` is -0.0; adding 0.0 normalizes the sign so an
    // empty cohort formats as "0.0" rather than "-0.0".
    CohortAverages {
        rating: (cohort.iter().map(|t| t.avg_rating).sum::<f64>() + 0.0) / divisor,
        reschedule_rate: (cohort.iter().map(|t| t.reschedule_rate).sum::<f64>() + 0.0) / divisor,
        first_session_rate: (cohort
            .iter()
            .map(|t| t.first_session_success_rate)
            .sum::<f64>()
            + 0.0)
            / divisor,
        profile_completion: (cohort
            .iter()
            .map(|t| t.profile_completion_rate)
            .sum::<f64>()
            + 0.0)
            / divisor,
    }
}
