use serde::{Deserialize, Serialize};

/// Headline numbers from `/excelhandler/cards`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardCards {
    #[serde(default)]
    pub total_tests_conducted: u64,
    #[serde(default)]
    pub average_accuracy_percent: f64,
    #[serde(default)]
    pub average_total_score: f64,
    #[serde(default)]
    pub average_attempt_rate_percent: f64,
    #[serde(default)]
    pub top_10_avg_score: f64,
    #[serde(default)]
    pub bottom_10_avg_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NeetReadiness {
    #[serde(default, rename = "percentage_students_above_550")]
    pub percentage_above_cutoff: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskBreakdown {
    #[serde(default)]
    pub safe: Bucket,
    #[serde(default)]
    pub medium_risk: Bucket,
    #[serde(default)]
    pub at_risk: Bucket,
    #[serde(default)]
    pub total_students_considered: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    #[serde(default)]
    pub score_gt_600: Bucket,
    #[serde(default)]
    pub score_gt_550: Bucket,
    #[serde(default)]
    pub score_gt_500: Bucket,
    #[serde(default)]
    pub score_gt_400: Bucket,
    #[serde(default)]
    pub score_gt_300: Bucket,
}

impl ScoreDistribution {
    pub fn rows(&self) -> [(&'static str, &Bucket); 5] {
        [
            ("> 600", &self.score_gt_600),
            ("> 550", &self.score_gt_550),
            ("> 500", &self.score_gt_500),
            ("> 400", &self.score_gt_400),
            ("> 300", &self.score_gt_300),
        ]
    }
}

/// Everything the metrics panel shows for one filter selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub cards: DashboardCards,
    pub readiness: NeetReadiness,
    pub risk: RiskBreakdown,
    pub distribution: ScoreDistribution,
    /// Shapes the desk does not interpret; shown as formatted JSON.
    pub overall: serde_json::Value,
    pub trend: serde_json::Value,
}
