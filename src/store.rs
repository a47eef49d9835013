use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{Insights, Session, SessionOutcome, Tutor};

/// Whole-collection persistence. Each batch run reads everything once,
/// mutates in memory, and writes everything once; the trait is the
/// transaction boundary.
pub trait Store {
    fn load_tutors(&self) -> anyhow::Result<Vec<Tutor>>;
    fn save_tutors(&self, tutors: &[Tutor]) -> anyhow::Result<()>;
    fn load_sessions(&self) -> anyhow::Result<Vec<Session>>;
    fn save_sessions(&self, sessions: &[Session]) -> anyhow::Result<()>;
    fn load_insights(&self) -> anyhow::Result<Option<Insights>>;
    fn save_insights(&self, insights: &Insights) -> anyhow::Result<()>;
}

/// JSON-file backend: tutors.json, sessions.json, and insights.json under
/// one data directory. A missing file reads as an empty collection; a file
/// that exists but does not parse is an error.
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read_collection<T: serde::de::DeserializeOwned>(
        &self,
        file_name: &str,
    ) -> anyhow::Result<Vec<T>> {
        let path = self.dir.join(file_name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    fn write_json<T: serde::Serialize>(&self, file_name: &str, value: &T) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.dir.join(file_name);
        let contents = serde_json::to_string_pretty(value)?;
        fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

impl Store for JsonStore {
    fn load_tutors(&self) -> anyhow::Result<Vec<Tutor>> {
        self.read_collection("tutors.json")
    }

    fn save_tutors(&self, tutors: &[Tutor]) -> anyhow::Result<()> {
        self.write_json("tutors.json", &tutors)
    }

    fn load_sessions(&self) -> anyhow::Result<Vec<Session>> {
        self.read_collection("sessions.json")
    }

    fn save_sessions(&self, sessions: &[Session]) -> anyhow::Result<()> {
        self.write_json("sessions.json", &sessions)
    }

    fn load_insights(&self) -> anyhow::Result<Option<Insights>> {
        let path = self.dir.join("insights.json");
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let insights = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(insights))
    }

    fn save_insights(&self, insights: &Insights) -> anyhow::Result<()> {
        self.write_json("insights.json", insights)
    }
}

/// In-memory backend for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    tutors: std::sync::Mutex<Vec<Tutor>>,
    sessions: std::sync::Mutex<Vec<Session>>,
    insights: std::sync::Mutex<Option<Insights>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with_data(tutors: Vec<Tutor>, sessions: Vec<Session>) -> Self {
        Self {
            tutors: std::sync::Mutex::new(tutors),
            sessions: std::sync::Mutex::new(sessions),
            insights: std::sync::Mutex::new(None),
        }
    }
}

#[cfg(test)]
impl Store for MemoryStore {
    fn load_tutors(&self) -> anyhow::Result<Vec<Tutor>> {
        Ok(self.tutors.lock().unwrap().clone())
    }

    fn save_tutors(&self, tutors: &[Tutor]) -> anyhow::Result<()> {
        *self.tutors.lock().unwrap() = tutors.to_vec();
        Ok(())
    }

    fn load_sessions(&self) -> anyhow::Result<Vec<Session>> {
        Ok(self.sessions.lock().unwrap().clone())
    }

    fn save_sessions(&self, sessions: &[Session]) -> anyhow::Result<()> {
        *self.sessions.lock().unwrap() = sessions.to_vec();
        Ok(())
    }

    fn load_insights(&self) -> anyhow::Result<Option<Insights>> {
        Ok(self.insights.lock().unwrap().clone())
    }

    fn save_insights(&self, insights: &Insights) -> anyhow::Result<()> {
        *self.insights.lock().unwrap() = Some(insights.clone());
        Ok(())
    }
}

/// Append sessions from a CSV file, skipping rows whose id is already
/// recorded. Rows without an id get a generated import id. Returns the
/// number of sessions inserted.
pub fn import_sessions_csv(store: &dyn Store, csv_path: &Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        id: Option<String>,
        tutor_id: String,
        student_id: String,
        date: DateTime<Utc>,
        is_first_session: bool,
        rating: u8,
        duration: u32,
        outcome: SessionOutcome,
        feedback: Option<String>,
    }

    let mut sessions = store.load_sessions()?;
    let mut known_ids: HashSet<String> = sessions.iter().map(|s| s.id.clone()).collect();

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let id = row
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
        if !known_ids.insert(id.clone()) {
            continue;
        }

        sessions.push(Session {
            id,
            tutor_id: row.tutor_id,
            student_id: row.student_id,
            date: row.date,
            is_first_session: row.is_first_session,
            rating: row.rating,
            duration: row.duration,
            outcome: row.outcome,
            feedback: row.feedback.filter(|f| !f.is_empty()),
        });
        inserted += 1;
    }

    store.save_sessions(&sessions)?;
    Ok(inserted)
}

/// Insert a small fixed data set for local runs. Returns the tutor and
/// session counts written.
pub fn seed(store: &dyn Store) -> anyhow::Result<(usize, usize)> {
    let now = Utc::now();

    let tutor_rows = vec![
        ("tutor-001", "Avery Lee", "avery.lee@example.com", 420, 92.0, 0),
        ("tutor-002", "Jules Moreno", "jules.moreno@example.com", 280, 64.0, 2),
        ("tutor-003", "Kiara Patel", "kiara.patel@example.com", 150, 88.0, 0),
    ];

    let tutors: Vec<Tutor> = tutor_rows
        .into_iter()
        .map(|(id, name, email, joined_days_ago, profile, tickets)| Tutor {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            join_date: now - Duration::days(joined_days_ago),
            total_sessions: 0,
            avg_rating: 0.0,
            first_session_success_rate: 0.0,
            reschedule_rate: 0.0,
            no_show_count: 0,
            current_student_count: 0,
            support_ticket_count: tickets,
            profile_completion_rate: profile,
            risk_score: None,
            risk_reasoning: None,
            risk_score_generated_at: None,
            recommendations: Vec::new(),
        })
        .collect();

    let session_rows = vec![
        ("sess-001", "tutor-001", "student-101", 3, true, 5, SessionOutcome::Completed),
        ("sess-002", "tutor-001", "student-102", 7, false, 5, SessionOutcome::Completed),
        ("sess-003", "tutor-001", "student-103", 12, true, 4, SessionOutcome::Completed),
        ("sess-004", "tutor-001", "student-102", 20, false, 4, SessionOutcome::Completed),
        ("sess-005", "tutor-002", "student-201", 2, true, 2, SessionOutcome::Completed),
        ("sess-006", "tutor-002", "student-202", 6, false, 3, SessionOutcome::Rescheduled),
        ("sess-007", "tutor-002", "student-203", 10, false, 1, SessionOutcome::NoShow),
        ("sess-008", "tutor-002", "student-201", 18, false, 3, SessionOutcome::Completed),
        ("sess-009", "tutor-003", "student-301", 4, true, 4, SessionOutcome::Completed),
        ("sess-010", "tutor-003", "student-302", 9, false, 5, SessionOutcome::Completed),
        ("sess-011", "tutor-003", "student-303", 40, false, 4, SessionOutcome::Cancelled),
    ];

    let sessions: Vec<Session> = session_rows
        .into_iter()
        .map(|(id, tutor_id, student_id, days_ago, is_first, rating, outcome)| Session {
            id: id.to_string(),
            tutor_id: tutor_id.to_string(),
            student_id: student_id.to_string(),
            date: now - Duration::days(days_ago),
            is_first_session: is_first,
            rating,
            duration: 60,
            outcome,
            feedback: None,
        })
        .collect();

    store.save_tutors(&tutors)?;
    store.save_sessions(&sessions)?;
    Ok((tutors.len(), sessions.len()))
}
