//! Read-side views over the active pattern set. Pure functions: the caller
//! loads the active patterns once and each view is derived in memory.

use serde::Serialize;
use uuid::Uuid;

use scamsignal_common::{GeoPoint, ScamCategory, ScamPattern, Severity};

#[derive(Debug, Clone, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct HourBucket {
    pub hour: u8,
    pub count: u32,
}

/// A map marker for a geographic scam cluster.
#[derive(Debug, Clone, Serialize)]
pub struct Hotspot {
    pub id: Uuid,
    pub name: String,
    pub center: GeoPoint,
    /// Number of incidents behind the marker.
    pub size: u32,
    pub risk_score: f32,
    pub incidents: Vec<Uuid>,
    pub category: ScamCategory,
    pub severity: Severity,
}

/// Top patterns by trend score, optionally narrowed to a category and to
/// patterns seen in a given region. Input order is preserved for ties, so
/// callers passing store output (already trend-ordered) stay stable.
pub fn top_by_trend(
    patterns: &[ScamPattern],
    limit: usize,
    category: Option<ScamCategory>,
    region: Option<&str>,
) -> Vec<ScamPattern> {
    let mut selected: Vec<ScamPattern> = patterns
        .iter()
        .filter(|p| category.map_or(true, |c| p.category == c))
        .filter(|p| {
            region.map_or(true, |r| {
                p.geographic_distribution.iter().any(|g| g.region == r)
            })
        })
        .cloned()
        .collect();
    selected.sort_by(|a, b| {
        b.trend_score
            .partial_cmp(&a.trend_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    selected.truncate(limit);
    selected
}

/// Pattern counts per category, most common first.
pub fn category_distribution(patterns: &[ScamPattern]) -> Vec<LabelCount> {
    label_counts(patterns.iter().map(|p| p.category.to_string()))
}

/// Pattern counts per severity, most common first.
pub fn severity_distribution(patterns: &[ScamPattern]) -> Vec<LabelCount> {
    label_counts(patterns.iter().map(|p| p.severity.to_string()))
}

fn label_counts(labels: impl Iterator<Item = String>) -> Vec<LabelCount> {
    let mut counts: Vec<LabelCount> = Vec::new();
    for label in labels {
        if let Some(entry) = counts.iter_mut().find(|c| c.label == label) {
            entry.count += 1;
        } else {
            counts.push(LabelCount { label, count: 1 });
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    counts
}

/// Incident counts per UTC hour of day, summed across all patterns and
/// ordered by hour.
pub fn hour_distribution(patterns: &[ScamPattern]) -> Vec<HourBucket> {
    let mut buckets: Vec<HourBucket> = Vec::new();
    for pattern in patterns {
        for hc in &pattern.time_distribution {
            if let Some(bucket) = buckets.iter_mut().find(|b| b.hour == hc.hour) {
                bucket.count += hc.count;
            } else {
                buckets.push(HourBucket {
                    hour: hc.hour,
                    count: hc.count,
                });
            }
        }
    }
    buckets.sort_by_key(|b| b.hour);
    buckets
}

/// Map markers for the highest-risk patterns. The marker sits on the
/// pattern's first recorded region coordinate; patterns with no geography
/// yet fall back to the null island placeholder.
pub fn hotspots(patterns: &[ScamPattern], limit: usize) -> Vec<Hotspot> {
    top_by_trend(patterns, limit, None, None)
        .into_iter()
        .map(|p| Hotspot {
            id: p.id,
            name: p.name.clone(),
            center: p
                .geographic_distribution
                .first()
                .map(|g| g.coordinates)
                .unwrap_or_else(GeoPoint::unknown),
            size: p.related_incidents.len() as u32,
            risk_score: p.trend_score,
            incidents: p.related_incidents.clone(),
            category: p.category,
            severity: p.severity,
        })
        .collect()
}
