use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};

pub const ALL: &str = "All";
pub const MAX_SCORE: u16 = 720;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExamType {
    Weekly,
    Cumulative,
    GrandTest,
}

impl ExamType {
    pub const ALL: [ExamType; 3] = [ExamType::Weekly, ExamType::Cumulative, ExamType::GrandTest];

    /// Name used by the backend's `test_type` filter.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::Weekly => "Weekly",
            ExamType::Cumulative => "Cumulative",
            ExamType::GrandTest => "Grand Test",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subject {
    Physics,
    Chemistry,
    Botany,
    Zoology,
    PhysicsBotany,
    ChemistryZoology,
}

impl Subject {
    pub const ALL: [Subject; 6] = [
        Subject::Physics,
        Subject::Chemistry,
        Subject::Botany,
        Subject::Zoology,
        Subject::PhysicsBotany,
        Subject::ChemistryZoology,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Physics => "Physics",
            Subject::Chemistry => "Chemistry",
            Subject::Botany => "Botany",
            Subject::Zoology => "Zoology",
            Subject::PhysicsBotany => "Physics + Botany",
            Subject::ChemistryZoology => "Chemistry + Zoology",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    /// The 30 days ending on `today`, inclusive.
    pub fn last_month(today: NaiveDate) -> Self {
        Self {
            from: today - Duration::days(29),
            to: today,
        }
    }
}

/// Cross-page filter selection shared by every metrics view.
///
/// One instance lives for the whole session and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardFilter {
    pub institution: String,
    pub batch: String,
    pub student_class: String,
    pub section: String,
    pub exam_type: ExamType,
    pub subject: Option<Subject>,
    pub date_range: DateRange,
    pub score_range: (u16, u16),
}

impl Default for DashboardFilter {
    fn default() -> Self {
        Self::for_day(Local::now().date_naive())
    }
}

impl DashboardFilter {
    pub fn for_day(today: NaiveDate) -> Self {
        Self {
            institution: ALL.to_string(),
            batch: ALL.to_string(),
            student_class: ALL.to_string(),
            section: ALL.to_string(),
            exam_type: ExamType::GrandTest,
            subject: None,
            date_range: DateRange::last_month(today),
            score_range: (0, MAX_SCORE),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Query parameters understood by the `/excelhandler/*` endpoints.
    /// "All" selections are left out so the backend applies no filter.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        push_selection(&mut query, "institution", &self.institution);
        push_selection(&mut query, "batch", &self.batch);
        push_selection(&mut query, "student_class", &self.student_class);
        push_selection(&mut query, "section", &self.section);
        query.push(("test_type", self.exam_type.as_str().to_string()));
        if let Some(subject) = self.subject {
            query.push(("subject", subject.as_str().to_string()));
        }
        query.push(("from", self.date_range.from.format("%Y-%m-%d").to_string()));
        query.push(("to", self.date_range.to.format("%Y-%m-%d").to_string()));
        query
    }
}

fn push_selection(query: &mut Vec<(&'static str, String)>, key: &'static str, value: &str) {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case(ALL) {
        return;
    }
    query.push((key, value.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn default_covers_last_thirty_days() {
        let filter = DashboardFilter::for_day(day(2026, 3, 30));
        assert_eq!(filter.date_range.from, day(2026, 3, 1));
        assert_eq!(filter.date_range.to, day(2026, 3, 30));
        assert_eq!(filter.exam_type, ExamType::GrandTest);
        assert_eq!(filter.score_range, (0, 720));
    }

    #[test]
    fn all_selections_are_omitted_from_query() {
        let filter = DashboardFilter::for_day(day(2026, 1, 31));
        let query = filter.to_query();
        assert_eq!(
            query,
            vec![
                ("test_type", "Grand Test".to_string()),
                ("from", "2026-01-02".to_string()),
                ("to", "2026-01-31".to_string()),
            ]
        );
    }

    #[test]
    fn concrete_selections_are_sent() {
        let mut filter = DashboardFilter::for_day(day(2026, 1, 31));
        filter.institution = "North Campus".into();
        filter.section = " B ".into();
        filter.exam_type = ExamType::Weekly;
        filter.subject = Some(Subject::PhysicsBotany);

        let query = filter.to_query();
        assert!(query.contains(&("institution", "North Campus".to_string())));
        assert!(query.contains(&("section", "B".to_string())));
        assert!(query.contains(&("test_type", "Weekly".to_string())));
        assert!(query.contains(&("subject", "Physics + Botany".to_string())));
        assert!(!query.iter().any(|(k, _)| *k == "batch"));
    }
}
