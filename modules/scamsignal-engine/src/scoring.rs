//! Pattern derivation helpers: everything a new pattern's fields are seeded
//! from when a topic group is folded for the first time.

use std::collections::HashMap;

use chrono::{Timelike, Utc};
use uuid::Uuid;

use scamsignal_classifier::Classification;
use scamsignal_common::{
    GeoPoint, Incident, Keyword, ScamCategory, ScamPattern, Severity,
};

/// Terms must be longer than this many characters to count as keywords.
const KEYWORD_MIN_LEN: usize = 3;
/// Keyword list cap, top entries by raw count.
const KEYWORD_TOP_N: usize = 20;

/// Best available confidence for one classification: child preferred, else
/// parent, else 0.
pub fn best_confidence(c: &Classification) -> f32 {
    if c.child_confidence > 0.0 {
        c.child_confidence
    } else if c.parent_confidence > 0.0 {
        c.parent_confidence
    } else {
        0.0
    }
}

/// Mean best-available confidence across a group.
pub fn mean_confidence(group: &[&Classification]) -> f32 {
    if group.is_empty() {
        return 0.0;
    }
    group.iter().map(|c| best_confidence(c)).sum::<f32>() / group.len() as f32
}

/// Most frequent severity in the group; ties broken by first-seen order.
pub fn dominant_severity(incidents: &[&Incident]) -> Severity {
    let mut counts: Vec<(Severity, u32)> = Vec::new();
    for incident in incidents {
        if let Some(entry) = counts.iter_mut().find(|(s, _)| *s == incident.severity) {
            entry.1 += 1;
        } else {
            counts.push((incident.severity, 1));
        }
    }

    let mut best = (Severity::Medium, 0u32);
    for (severity, count) in counts {
        if count > best.1 {
            best = (severity, count);
        }
    }
    best.0
}

/// Term-frequency keywords over titles and descriptions: lowercase terms
/// longer than three characters, top 20 by count, weight = count / group
/// size. Count ties are ordered alphabetically for determinism.
pub fn extract_keywords(incidents: &[&Incident]) -> Vec<Keyword> {
    let term = regex::Regex::new(r"[a-z0-9]+").expect("valid regex");

    let mut counts: HashMap<String, u32> = HashMap::new();
    for incident in incidents {
        let text = format!("{} {}", incident.title, incident.description).to_lowercase();
        for m in term.find_iter(&text) {
            let word = m.as_str();
            if word.len() > KEYWORD_MIN_LEN {
                *counts.entry(word.to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut entries: Vec<(String, u32)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(KEYWORD_TOP_N);

    let group_size = incidents.len().max(1) as f32;
    entries
        .into_iter()
        .map(|(word, count)| Keyword {
            word,
            weight: count as f32 / group_size,
        })
        .collect()
}

/// Region key for the geographic distribution: the incident's location
/// string, or "Unknown" when empty.
pub fn region_of(incident: &Incident) -> String {
    let trimmed = incident.location.trim();
    if trimmed.is_empty() {
        "Unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

/// UTC hour-of-day bucket for the time distribution.
pub fn hour_of(incident: &Incident) -> u8 {
    incident.created_at.hour() as u8
}

/// Build a brand-new pattern from the first fold of a topic group. Name and
/// description are seeded from the first incident's topic name and summary.
pub fn build_pattern(
    topic_id: i64,
    group: &[&Classification],
    incidents_by_id: &HashMap<Uuid, &Incident>,
) -> ScamPattern {
    let first = group[0];
    let incidents: Vec<&Incident> = group
        .iter()
        .filter_map(|c| incidents_by_id.get(&c.id).copied())
        .collect();

    let now = Utc::now();
    let mut pattern = ScamPattern {
        id: Uuid::new_v4(),
        pattern_key: ScamPattern::pattern_key_for(topic_id),
        name: first.topic_name.clone(),
        description: first.summary.clone(),
        keywords: extract_keywords(&incidents),
        severity: dominant_severity(&incidents),
        category: ScamCategory::from_parent_category(&first.parent_category),
        confidence: mean_confidence(group),
        frequency: 0,
        trend_score: 0.0,
        geographic_distribution: Vec::new(),
        time_distribution: Vec::new(),
        related_incidents: Vec::new(),
        active: true,
        created_at: now,
        last_updated: now,
    };

    for classification in group {
        if !pattern.add_incident(classification.id) {
            continue;
        }
        if let Some(incident) = incidents_by_id.get(&classification.id) {
            let coordinates = incident.coordinates.unwrap_or_else(GeoPoint::unknown);
            pattern.note_region(&region_of(incident), coordinates);
            pattern.note_hour(hour_of(incident));
        }
    }

    pattern.update_trend_score();
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use scamsignal_common::IncidentStatus;

    fn incident(title: &str, description: &str, severity: Severity, location: &str) -> Incident {
        Incident {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            location: location.into(),
            coordinates: None,
            scammer_details: None,
            severity,
            status: IncidentStatus::Reported,
            reported_by: Uuid::new_v4(),
            image_url: None,
            analysis: None,
            created_at: chrono::Utc.with_ymd_and_hms(2026, 8, 20, 14, 30, 0).unwrap(),
        }
    }

    fn classification(id: Uuid, parent_conf: f32, child_conf: f32) -> Classification {
        Classification {
            id,
            topic_id: 5,
            topic_name: "UPI payment fraud".into(),
            parent_category: "financial and payment scams".into(),
            child_label: "fake payment request".into(),
            parent_confidence: parent_conf,
            child_confidence: child_conf,
            summary: "Fake UPI payment requests".into(),
        }
    }

    #[test]
    fn child_confidence_is_preferred() {
        let c = classification(Uuid::new_v4(), 0.9, 0.6);
        assert!((best_confidence(&c) - 0.6).abs() < 1e-6);

        let c = classification(Uuid::new_v4(), 0.9, 0.0);
        assert!((best_confidence(&c) - 0.9).abs() < 1e-6);

        let c = classification(Uuid::new_v4(), 0.0, 0.0);
        assert_eq!(best_confidence(&c), 0.0);
    }

    #[test]
    fn severity_ties_break_first_seen() {
        let a = incident("a", "", Severity::High, "Mumbai");
        let b = incident("b", "", Severity::Low, "Delhi");
        let c = incident("c", "", Severity::Low, "Delhi");
        let d = incident("d", "", Severity::High, "Pune");
        // High and Low both occur twice; High was seen first.
        assert_eq!(dominant_severity(&[&a, &b, &c, &d]), Severity::High);
        assert_eq!(dominant_severity(&[&b, &a, &d, &c]), Severity::Low);
    }

    #[test]
    fn keywords_filter_short_terms_and_weight_by_group_size() {
        let a = incident(
            "Fake UPI payment request",
            "payment link asked for my PIN",
            Severity::High,
            "Mumbai",
        );
        let b = incident("payment fraud", "the app was fake", Severity::High, "Delhi");

        let keywords = extract_keywords(&[&a, &b]);
        let payment = keywords.iter().find(|k| k.word == "payment").unwrap();
        assert!((payment.weight - 1.5).abs() < 1e-6); // 3 occurrences / 2 incidents
        assert!(keywords.iter().all(|k| k.word.len() > 3));
        assert!(!keywords.iter().any(|k| k.word == "pin"));
    }

    #[test]
    fn new_pattern_matches_first_fold_semantics() {
        let a = incident("Fake UPI payment request", "asked for PIN", Severity::High, "Mumbai");
        let b = incident("UPI scam", "payment request was fake", Severity::High, "Mumbai");
        let ca = classification(a.id, 0.9, 0.8);
        let cb = classification(b.id, 0.7, 0.6);
        let by_id: HashMap<Uuid, &Incident> = [(a.id, &a), (b.id, &b)].into_iter().collect();

        let pattern = build_pattern(5, &[&ca, &cb], &by_id);

        assert_eq!(pattern.pattern_key, "topic_5");
        assert_eq!(pattern.frequency, 2);
        assert_eq!(pattern.related_incidents.len(), 2);
        assert!((pattern.confidence - 0.7).abs() < 1e-6);
        assert!((pattern.trend_score - 1.61).abs() < 1e-6);
        assert_eq!(pattern.category, ScamCategory::Financial);
        assert_eq!(pattern.severity, Severity::High);
        assert_eq!(pattern.geographic_distribution.len(), 1);
        assert_eq!(pattern.geographic_distribution[0].region, "Mumbai");
        assert_eq!(pattern.geographic_distribution[0].count, 2);
        assert_eq!(pattern.time_distribution, vec![scamsignal_common::HourCount { hour: 14, count: 2 }]);
    }

    #[test]
    fn unknown_region_falls_back() {
        let i = incident("t", "d", Severity::Low, "  ");
        assert_eq!(region_of(&i), "Unknown");
    }
}
