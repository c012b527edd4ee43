//! Bundled sample stage records used when no source is configured or the
//! configured one cannot be read.

use crate::data::record::StageRecord;

const SAMPLE_PERIOD: &str = "2024-H1";

/// (function, level, country, source, stage PTRs in funnel order)
const SAMPLE_FUNNELS: &[(&str, &str, &str, &str, &[f64])] = &[
    ("Engineering", "L3", "Germany", "Inbound", &[0.35, 0.5, 0.4, 0.55, 0.85, 0.9]),
    ("Engineering", "L3", "Germany", "Referral", &[0.6, 0.65, 0.5, 0.6, 0.9, 0.95]),
    ("Engineering", "L3", "United States", "Inbound", &[0.3, 0.45, 0.35, 0.5, 0.8, 0.85]),
    ("Engineering", "L5", "United States", "Agency", &[0.45, 0.5, 0.3, 0.45, 0.75, 0.8]),
    ("Engineering", "L5", "United States", "Referral", &[0.55, 0.6, 0.4, 0.5, 0.85, 0.9]),
    ("Sales", "L2", "Germany", "Inbound", &[0.4, 0.55, 0.5, 0.6, 0.9, 0.9]),
    ("Sales", "L2", "Brazil", "Sourced", &[0.25, 0.5, 0.45, 0.6, 0.85, 0.95]),
    ("Sales", "L4", "United States", "Referral", &[0.5, 0.6, 0.45, 0.55, 0.8, 0.9]),
];

const SAMPLE_STAGES: &[&str] = &[
    "Application Review",
    "Recruiter Screen",
    "Hiring Manager Interview",
    "Onsite",
    "Offer",
    "Hire",
];

pub fn sample_records() -> Vec<StageRecord> {
    SAMPLE_FUNNELS
        .iter()
        .flat_map(|(function, level, country, source, ptrs)| {
            SAMPLE_STAGES
                .iter()
                .zip(ptrs.iter())
                .enumerate()
                .map(move |(index, (stage, ptr))| StageRecord {
                    function: (*function).to_string(),
                    level: (*level).to_string(),
                    country: (*country).to_string(),
                    source: (*source).to_string(),
                    period: SAMPLE_PERIOD.to_string(),
                    stage: (*stage).to_string(),
                    order: index as u32 + 1,
                    ptr: *ptr,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_sample_funnel_has_all_stages() {
        let records = sample_records();
        assert_eq!(records.len(), SAMPLE_FUNNELS.len() * SAMPLE_STAGES.len());
        assert!(records.iter().all(|r| r.order >= 1 && r.ptr > 0.0 && r.ptr <= 1.0));
    }
}
