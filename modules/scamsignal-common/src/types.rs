use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Geo Types ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Placeholder coordinate for regions without a known position.
    pub fn unknown() -> Self {
        Self { lat: 0.0, lng: 0.0 }
    }
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl Severity {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Reported,
    UnderReview,
    Resolved,
    Fake,
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncidentStatus::Reported => write!(f, "reported"),
            IncidentStatus::UnderReview => write!(f, "under_review"),
            IncidentStatus::Resolved => write!(f, "resolved"),
            IncidentStatus::Fake => write!(f, "fake"),
        }
    }
}

impl IncidentStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reported" => Some(IncidentStatus::Reported),
            "under_review" => Some(IncidentStatus::UnderReview),
            "resolved" => Some(IncidentStatus::Resolved),
            "fake" => Some(IncidentStatus::Fake),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScamCategory {
    Identity,
    Financial,
    Commerce,
    Employment,
    Lottery,
    Investment,
    Romance,
    TechSupport,
    SocialMedia,
    Institutional,
    Other,
}

impl std::fmt::Display for ScamCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScamCategory::Identity => write!(f, "identity"),
            ScamCategory::Financial => write!(f, "financial"),
            ScamCategory::Commerce => write!(f, "commerce"),
            ScamCategory::Employment => write!(f, "employment"),
            ScamCategory::Lottery => write!(f, "lottery"),
            ScamCategory::Investment => write!(f, "investment"),
            ScamCategory::Romance => write!(f, "romance"),
            ScamCategory::TechSupport => write!(f, "tech_support"),
            ScamCategory::SocialMedia => write!(f, "social_media"),
            ScamCategory::Institutional => write!(f, "institutional"),
            ScamCategory::Other => write!(f, "other"),
        }
    }
}

/// The parent-category vocabulary the external classifier is known to emit.
/// `from_parent_category` must map every entry here to a non-`Other` variant.
pub const KNOWN_PARENT_CATEGORIES: &[&str] = &[
    "identity and account scams",
    "financial and payment scams",
    "commerce and delivery scams",
    "employment and education scams",
    "lottery prize and reward scams",
    "investment and trading scams",
    "romance and social scams",
    "tech support and service scams",
    "online content and social media scams",
    "banking and institutional scams",
];

impl ScamCategory {
    /// Fixed lookup from the classifier's parent-category string.
    /// Unmapped categories fall back to `Other`.
    pub fn from_parent_category(parent: &str) -> Self {
        match parent.trim().to_ascii_lowercase().as_str() {
            "identity and account scams" => ScamCategory::Identity,
            "financial and payment scams" => ScamCategory::Financial,
            "commerce and delivery scams" => ScamCategory::Commerce,
            "employment and education scams" => ScamCategory::Employment,
            "lottery prize and reward scams" => ScamCategory::Lottery,
            "investment and trading scams" => ScamCategory::Investment,
            "romance and social scams" => ScamCategory::Romance,
            "tech support and service scams" => ScamCategory::TechSupport,
            "online content and social media scams" => ScamCategory::SocialMedia,
            "banking and institutional scams" => ScamCategory::Institutional,
            _ => ScamCategory::Other,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "identity" => Some(ScamCategory::Identity),
            "financial" => Some(ScamCategory::Financial),
            "commerce" => Some(ScamCategory::Commerce),
            "employment" => Some(ScamCategory::Employment),
            "lottery" => Some(ScamCategory::Lottery),
            "investment" => Some(ScamCategory::Investment),
            "romance" => Some(ScamCategory::Romance),
            "tech_support" => Some(ScamCategory::TechSupport),
            "social_media" => Some(ScamCategory::SocialMedia),
            "institutional" => Some(ScamCategory::Institutional),
            "other" => Some(ScamCategory::Other),
            _ => None,
        }
    }
}

// --- Incident ---

/// Structured details about the scammer, all optional and reporter-supplied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScammerDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// UPI-style payment handle (e.g. "name@bank").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub social_handles: Vec<String>,
    /// Free-text scam-type tag as entered by the reporter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scam_type: Option<String>,
}

/// Classifier output written back onto an incident. Exactly one per incident;
/// a later aggregation run overwrites, never appends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlAnnotation {
    pub parent_category: String,
    pub child_label: String,
    pub parent_confidence: f32,
    pub child_confidence: f32,
    pub summary: String,
    pub topic_id: i64,
    pub topic_name: String,
    pub analyzed_at: DateTime<Utc>,
}

/// One citizen-submitted scam report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub coordinates: Option<GeoPoint>,
    pub scammer_details: Option<ScammerDetails>,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub reported_by: Uuid,
    pub image_url: Option<String>,
    /// Written only by the aggregation engine.
    pub analysis: Option<MlAnnotation>,
    pub created_at: DateTime<Utc>,
}

// --- Scam Pattern ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub word: String,
    pub weight: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionCount {
    pub region: String,
    pub count: u32,
    pub coordinates: GeoPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourCount {
    /// Hour of day, 0-23.
    pub hour: u8,
    pub count: u32,
}

/// Relative weights of frequency and confidence in the trend score.
/// Dashboard consumers depend on this exact formula.
const TREND_FREQUENCY_WEIGHT: f32 = 0.7;
const TREND_CONFIDENCE_WEIGHT: f32 = 0.3;

/// A derived cluster of incidents sharing a classifier-assigned topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScamPattern {
    pub id: Uuid,
    /// Stable external key, `topic_<topicId>`.
    pub pattern_key: String,
    pub name: String,
    pub description: String,
    pub keywords: Vec<Keyword>,
    pub severity: Severity,
    pub category: ScamCategory,
    /// Classifier certainty, 0.0-1.0.
    pub confidence: f32,
    /// Count of distinct incidents attributed to this pattern.
    pub frequency: u32,
    pub trend_score: f32,
    pub geographic_distribution: Vec<RegionCount>,
    pub time_distribution: Vec<HourCount>,
    pub related_incidents: Vec<Uuid>,
    /// Patterns are deactivated, never deleted.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl ScamPattern {
    pub fn pattern_key_for(topic_id: i64) -> String {
        format!("topic_{topic_id}")
    }

    /// Recompute the trend score from frequency and confidence. This is the
    /// only way the score changes; call after every mutation of its inputs.
    pub fn update_trend_score(&mut self) {
        self.trend_score =
            self.frequency as f32 * TREND_FREQUENCY_WEIGHT + self.confidence * TREND_CONFIDENCE_WEIGHT;
        self.last_updated = Utc::now();
    }

    /// Attribute an incident to this pattern. Set semantics: an id already
    /// present neither duplicates the reference nor grows the frequency.
    /// Returns true if the incident was newly added.
    pub fn add_incident(&mut self, incident_id: Uuid) -> bool {
        if self.related_incidents.contains(&incident_id) {
            return false;
        }
        self.related_incidents.push(incident_id);
        self.frequency += 1;
        self.update_trend_score();
        true
    }

    /// Increment-or-insert a region in the geographic distribution.
    pub fn note_region(&mut self, region: &str, coordinates: GeoPoint) {
        if let Some(entry) = self
            .geographic_distribution
            .iter_mut()
            .find(|g| g.region == region)
        {
            entry.count += 1;
        } else {
            self.geographic_distribution.push(RegionCount {
                region: region.to_string(),
                count: 1,
                coordinates,
            });
        }
    }

    /// Increment-or-insert an hour bucket in the time distribution.
    pub fn note_hour(&mut self, hour: u8) {
        debug_assert!(hour < 24);
        if let Some(entry) = self.time_distribution.iter_mut().find(|t| t.hour == hour) {
            entry.count += 1;
        } else {
            self.time_distribution.push(HourCount { hour, count: 1 });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> ScamPattern {
        let now = Utc::now();
        ScamPattern {
            id: Uuid::new_v4(),
            pattern_key: ScamPattern::pattern_key_for(5),
            name: "UPI payment fraud".into(),
            description: "Fake payment requests".into(),
            keywords: vec![],
            severity: Severity::High,
            category: ScamCategory::Financial,
            confidence: 0.7,
            frequency: 2,
            trend_score: 0.0,
            geographic_distribution: vec![],
            time_distribution: vec![],
            related_incidents: vec![Uuid::new_v4(), Uuid::new_v4()],
            active: true,
            created_at: now,
            last_updated: now,
        }
    }

    #[test]
    fn trend_score_formula() {
        let mut p = pattern();
        p.update_trend_score();
        assert!((p.trend_score - (2.0 * 0.7 + 0.7 * 0.3)).abs() < f32::EPSILON);
        assert!((p.trend_score - 1.61).abs() < 1e-6);
    }

    #[test]
    fn add_incident_is_a_set() {
        let mut p = pattern();
        let id = Uuid::new_v4();
        assert!(p.add_incident(id));
        assert_eq!(p.frequency, 3);
        assert!(!p.add_incident(id));
        assert_eq!(p.frequency, 3);
        assert_eq!(p.related_incidents.len(), 3);
    }

    #[test]
    fn add_incident_keeps_trend_score_fresh() {
        let mut p = pattern();
        p.add_incident(Uuid::new_v4());
        assert!((p.trend_score - (3.0 * 0.7 + 0.7 * 0.3)).abs() < 1e-6);
    }

    #[test]
    fn distributions_increment_or_insert() {
        let mut p = pattern();
        p.note_region("Mumbai", GeoPoint::unknown());
        p.note_region("Mumbai", GeoPoint::unknown());
        p.note_region("Delhi", GeoPoint::unknown());
        assert_eq!(p.geographic_distribution.len(), 2);
        assert_eq!(p.geographic_distribution[0].count, 2);

        p.note_hour(14);
        p.note_hour(14);
        p.note_hour(3);
        assert_eq!(p.time_distribution.len(), 2);
        assert_eq!(p.time_distribution[0].count, 2);
    }

    #[test]
    fn every_known_parent_category_maps_off_other() {
        for parent in KNOWN_PARENT_CATEGORIES {
            assert_ne!(
                ScamCategory::from_parent_category(parent),
                ScamCategory::Other,
                "unmapped vocabulary entry: {parent}"
            );
        }
        assert_eq!(
            ScamCategory::from_parent_category("weather scams"),
            ScamCategory::Other
        );
    }

    #[test]
    fn severity_is_ordered() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }
}
