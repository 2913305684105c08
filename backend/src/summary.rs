use std::collections::HashMap;

use crate::network::StreetSegment;

/// Sentinel replacing tag values below the rarity threshold.
pub fn rare_sentinel(tag: &str) -> String {
    format!("{tag}_rare")
}

/// Cleaned attribute distribution over a matched segment set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSummary {
    /// Pre-collapse relative frequencies in percent, descending.
    pub distribution: Vec<(String, f64)>,
    /// Values strictly below the rarity threshold.
    pub rare_values: Vec<String>,
    /// Post-collapse value per input segment, `None` where the tag is
    /// absent. Parallel to the input slice.
    pub canonical: Vec<Option<String>>,
}

impl AttributeSummary {
    /// Share of the matched set that collapsed into the rare bucket.
    pub fn rare_share_pct(&self) -> f64 {
        self.distribution
            .iter()
            .filter(|(value, _)| self.rare_values.contains(value))
            .map(|(_, pct)| pct)
            .sum()
    }
}

/// Summarize one tag dimension over a de-duplicated matched segment set.
///
/// Segments missing the tag are dropped from the denominator; relative
/// frequencies are computed over the remainder and sum to 100 % before
/// collapsing. A value is rare when its frequency is *strictly* below
/// `rarity_threshold_pct`, so a value sitting exactly on the threshold is
/// kept. With no tagged segment at all the result is empty rather than a
/// division error.
pub fn summarize_attribute(
    segments: &[&StreetSegment],
    tag: &str,
    rarity_threshold_pct: f64,
) -> AttributeSummary {
    let values: Vec<Option<&str>> = segments.iter().map(|segment| segment.tag(tag)).collect();
    let tagged = values.iter().filter_map(|value| *value).count();
    if tagged == 0 {
        return AttributeSummary {
            canonical: vec![None; segments.len()],
            ..Default::default()
        };
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values.iter().filter_map(|value| *value) {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut distribution: Vec<(String, f64)> = counts
        .into_iter()
        .map(|(value, count)| (value.to_string(), count as f64 * 100.0 / tagged as f64))
        .collect();
    distribution.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let rare_values: Vec<String> = distribution
        .iter()
        .filter(|(_, pct)| *pct < rarity_threshold_pct)
        .map(|(value, _)| value.clone())
        .collect();

    let sentinel = rare_sentinel(tag);
    let canonical = values
        .iter()
        .map(|value| {
            value.map(|value| {
                if rare_values.iter().any(|rare| rare == value) {
                    sentinel.clone()
                } else {
                    value.to_string()
                }
            })
        })
        .collect();

    AttributeSummary {
        distribution,
        rare_values,
        canonical,
    }
}
