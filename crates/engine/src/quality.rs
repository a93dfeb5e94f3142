//! Blends objective schedule metrics with subjective dimension scores.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use lineup_core::{ContentCatalog, DaySchedule, SchedulingWindow};
use lineup_rules::{check_violations, SchedulingConstraints};

/// The blended quality verdict for one schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Equal-weight mean over every dimension present.
    pub overall_score: f64,
    /// Breakdown in insertion order: coverage, constraint_adherence, then
    /// the subjective dimensions as supplied.
    pub dimension_scores: IndexMap<String, f64>,
    pub coverage: f64,
    pub constraint_adherence: f64,
    pub violation_count: usize,
}

/// Compute the objective dimensions locally and blend in the caller's
/// subjective scores. Subjective values are clamped to `[0, 1]`, never
/// rejected; the subjective judgment itself always comes from outside.
pub fn evaluate_quality(
    schedule: &DaySchedule,
    window: &SchedulingWindow,
    constraints: Option<&SchedulingConstraints>,
    catalog: &ContentCatalog,
    subjective: &IndexMap<String, f64>,
) -> QualityReport {
    let total = window.total_minutes();
    let coverage = if total > 0 {
        schedule.filled_minutes_within(window) as f64 / total as f64
    } else {
        0.0
    };

    let violation_count = constraints
        .map(|c| check_violations(schedule, c, catalog).len())
        .unwrap_or(0);
    let constraint_adherence = (1.0 - 0.1 * violation_count as f64).max(0.0);

    let mut dimension_scores = IndexMap::new();
    dimension_scores.insert("coverage".to_string(), coverage);
    dimension_scores.insert("constraint_adherence".to_string(), constraint_adherence);
    for (dimension, score) in subjective {
        dimension_scores.insert(dimension.clone(), score.clamp(0.0, 1.0));
    }

    let overall_score =
        dimension_scores.values().sum::<f64>() / dimension_scores.len() as f64;

    QualityReport {
        overall_score,
        dimension_scores,
        coverage,
        constraint_adherence,
        violation_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use lineup_core::{ImmutableSet, TimeSlot};
    use lineup_rules::RepetitionRule;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    fn half_filled() -> (DaySchedule, SchedulingWindow) {
        let mut schedule = DaySchedule::new();
        schedule
            .fill(
                TimeSlot::new(
                    dt("2026-02-01T08:00:00"),
                    dt("2026-02-01T15:00:00"),
                    Some("series:friends".into()),
                )
                .unwrap(),
                &ImmutableSet::new(),
            )
            .unwrap();
        let window =
            SchedulingWindow::new(dt("2026-02-01T08:00:00"), dt("2026-02-01T22:00:00")).unwrap();
        (schedule, window)
    }

    #[test]
    fn objective_dimensions_only() {
        let (schedule, window) = half_filled();
        let report =
            evaluate_quality(&schedule, &window, None, &ContentCatalog::default(), &IndexMap::new());

        assert!((report.coverage - 0.5).abs() < 1e-9);
        assert_eq!(report.constraint_adherence, 1.0);
        assert_eq!(report.violation_count, 0);
        assert!((report.overall_score - 0.75).abs() < 1e-9);
        let dims: Vec<&str> = report.dimension_scores.keys().map(String::as_str).collect();
        assert_eq!(dims, ["coverage", "constraint_adherence"]);
    }

    #[test]
    fn subjective_scores_blend_and_clamp() {
        let (schedule, window) = half_filled();
        let mut subjective = IndexMap::new();
        subjective.insert("variety".to_string(), 0.8);
        subjective.insert("flow".to_string(), 1.7); // clamped to 1.0

        let report = evaluate_quality(
            &schedule,
            &window,
            None,
            &ContentCatalog::default(),
            &subjective,
        );
        assert_eq!(report.dimension_scores["flow"], 1.0);
        // (0.5 + 1.0 + 0.8 + 1.0) / 4
        assert!((report.overall_score - 0.825).abs() < 1e-9);
        let dims: Vec<&str> = report.dimension_scores.keys().map(String::as_str).collect();
        assert_eq!(
            dims,
            ["coverage", "constraint_adherence", "variety", "flow"]
        );
    }

    #[test]
    fn violations_pull_adherence_down() {
        let mut schedule = DaySchedule::new();
        for (start, end) in [
            ("2026-02-01T08:00:00", "2026-02-01T09:00:00"),
            ("2026-02-01T10:00:00", "2026-02-01T11:00:00"),
            ("2026-02-01T12:00:00", "2026-02-01T13:00:00"),
        ] {
            schedule
                .fill(
                    TimeSlot::new(dt(start), dt(end), Some("series:friends".into())).unwrap(),
                    &ImmutableSet::new(),
                )
                .unwrap();
        }
        let window =
            SchedulingWindow::new(dt("2026-02-01T08:00:00"), dt("2026-02-01T13:00:00")).unwrap();
        let constraints = SchedulingConstraints {
            content_rules: vec![],
            repetition: Some(RepetitionRule {
                min_hours_between_repeats: 24.0,
            }),
        };

        let report = evaluate_quality(
            &schedule,
            &window,
            Some(&constraints),
            &ContentCatalog::default(),
            &IndexMap::new(),
        );
        assert_eq!(report.violation_count, 2);
        assert!((report.constraint_adherence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn many_violations_floor_at_zero() {
        let mut schedule = DaySchedule::new();
        for hour in 6..18 {
            schedule
                .fill(
                    TimeSlot::new(
                        dt(&format!("2026-02-01T{hour:02}:00:00")),
                        dt(&format!("2026-02-01T{hour:02}:30:00")),
                        Some("series:friends".into()),
                    )
                    .unwrap(),
                    &ImmutableSet::new(),
                )
                .unwrap();
        }
        let window =
            SchedulingWindow::new(dt("2026-02-01T06:00:00"), dt("2026-02-01T18:00:00")).unwrap();
        let constraints = SchedulingConstraints {
            content_rules: vec![],
            repetition: Some(RepetitionRule {
                min_hours_between_repeats: 48.0,
            }),
        };

        let report = evaluate_quality(
            &schedule,
            &window,
            Some(&constraints),
            &ContentCatalog::default(),
            &IndexMap::new(),
        );
        assert_eq!(report.violation_count, 11);
        assert_eq!(report.constraint_adherence, 0.0);
    }
}
