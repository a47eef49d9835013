use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::metrics;
use crate::models::{Insights, Session, Tutor};

/// Render the markdown dashboard report: platform overview, the tutor table
/// ordered by risk, their coaching recommendations, and the latest insights
/// snapshot.
pub fn build_report(
    tutors: &[Tutor],
    sessions: &[Session],
    insights: Option<&Insights>,
    now: DateTime<Utc>,
) -> String {
    let system = metrics::compute_system_metrics(tutors, sessions, now);

    let mut output = String::new();
    let _ = writeln!(output, "# Tutor Quality Report");
    let _ = writeln!(output, "Generated {}", now.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Platform Overview");
    let _ = writeln!(output, "- Tutors: {}", system.total_tutors);
    let _ = writeln!(output, "- Sessions: {}", system.total_sessions);
    let _ = writeln!(output, "- Average rating: {:.1}/5.0", system.avg_rating);
    let _ = writeln!(
        output,
        "- Active tutors (last 30 days): {}",
        system.active_tutors
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Rating Distribution");

    if system.total_sessions == 0 {
        let _ = writeln!(output, "No sessions recorded.");
    } else {
        for (index, count) in system.rating_distribution.iter().enumerate() {
            let _ = writeln!(output, "- {} star: {} sessions", index + 1, count);
        }
    }

    // Stable sort keeps collection order within each risk band.
    let mut ranked: Vec<&Tutor> = tutors.iter().collect();
    ranked.sort_by(|a, b| b.risk_rank().cmp(&a.risk_rank()));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Tutors");

    if ranked.is_empty() {
        let _ = writeln!(output, "No tutors on record.");
    } else {
        for tutor in ranked.iter().take(10) {
            let risk_label = tutor
                .risk_score
                .map(|level| level.to_string())
                .unwrap_or_else(|| "unassessed".to_string());
            let _ = writeln!(
                output,
                "- {} ({}) risk {} | rating {:.1} | first-session {:.1}% | reschedule {:.1}%",
                tutor.name,
                tutor.email,
                risk_label,
                tutor.avg_rating,
                tutor.first_session_success_rate,
                tutor.reschedule_rate
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Coaching Recommendations");

    let with_recommendations: Vec<&&Tutor> = ranked
        .iter()
        .filter(|t| !t.recommendations.is_empty())
        .collect();
    if with_recommendations.is_empty() {
        let _ = writeln!(output, "No open recommendations.");
    } else {
        for tutor in with_recommendations {
            let _ = writeln!(output, "### {}", tutor.name);
            for rec in &tutor.recommendations {
                let _ = writeln!(
                    output,
                    "- [{}] {}: {} ({})",
                    rec.priority, rec.category, rec.action, rec.reasoning
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## System Insights");

    match insights {
        None => {
            let _ = writeln!(output, "No insights snapshot. Run the analyze command first.");
        }
        Some(insights) => {
            let _ = writeln!(
                output,
                "Snapshot from {}",
                insights.generated_at.format("%Y-%m-%d %H:%M UTC")
            );
            let _ = writeln!(output);
            let _ = writeln!(output, "### First Session Patterns");
            for pattern in &insights.patterns.first_session_failures {
                let _ = writeln!(output, "- {pattern}");
            }
            let _ = writeln!(output, "### Common Risk Factors");
            for factor in &insights.patterns.common_risk_factors {
                let _ = writeln!(output, "- {factor}");
            }
            let _ = writeln!(output, "### System Recommendations");
            for recommendation in &insights.system_recommendations {
                let _ = writeln!(output, "- {recommendation}");
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        InsightPatterns, Priority, Recommendation, RecommendationCategory, RiskLevel,
    };

    fn tutor(id: &str, name: &str, risk: Option<RiskLevel>) -> Tutor {
        Tutor {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("{id}@example.com"),
            join_date: Utc::now(),
            total_sessions: 10,
            avg_rating: 4.0,
            first_session_success_rate: 50.0,
            reschedule_rate: 10.0,
            no_show_count: 0,
            current_student_count: 2,
            support_ticket_count: 0,
            profile_completion_rate: 80.0,
            risk_score: risk,
            risk_reasoning: None,
            risk_score_generated_at: None,
            recommendations: Vec::new(),
        }
    }

    #[test]
    fn tutors_are_ordered_high_medium_low_unassessed() {
        let tutors = vec![
            tutor("t1", "Low One", Some(RiskLevel::Low)),
            tutor("t2", "None One", None),
            tutor("t3", "High One", Some(RiskLevel::High)),
            tutor("t4", "Medium One", Some(RiskLevel::Medium)),
            tutor("t5", "High Two", Some(RiskLevel::High)),
        ];
        let report = build_report(&tutors, &[], None, Utc::now());

        let high_one = report.find("High One").unwrap();
        let high_two = report.find("High Two").unwrap();
        let medium_one = report.find("Medium One").unwrap();
        let low_one = report.find("Low One").unwrap();
        let none_one = report.find("None One").unwrap();

        assert!(high_one < high_two, "stable within the high band");
        assert!(high_two < medium_one);
        assert!(medium_one < low_one);
        assert!(low_one < none_one);
    }

    #[test]
    fn empty_data_renders_placeholders() {
        let report = build_report(&[], &[], None, Utc::now());
        assert!(report.contains("No sessions recorded."));
        assert!(report.contains("No tutors on record."));
        assert!(report.contains("No open recommendations."));
        assert!(report.contains("No insights snapshot."));
    }

    #[test]
    fn recommendations_and_insights_are_listed() {
        let mut at_risk = tutor("t1", "Jules Moreno", Some(RiskLevel::High));
        at_risk.recommendations = vec![Recommendation {
            id: "rec-t1-1".to_string(),
            priority: Priority::High,
            category: RecommendationCategory::Reliability,
            action: "Confirm sessions a day ahead".to_string(),
            reasoning: "Cuts reschedules".to_string(),
        }];
        let insights = Insights {
            generated_at: Utc::now(),
            patterns: InsightPatterns {
                first_session_failures: vec!["Rushed introductions".to_string()],
                common_risk_factors: vec!["High reschedule rates".to_string()],
            },
            system_recommendations: vec!["Publish a first-session checklist".to_string()],
        };

        let report = build_report(&[at_risk], &[], Some(&insights), Utc::now());
        assert!(report.contains("### Jules Moreno"));
        assert!(report.contains("Confirm sessions a day ahead"));
        assert!(report.contains("Rushed introductions"));
        assert!(report.contains("Publish a first-session checklist"));
    }
}
