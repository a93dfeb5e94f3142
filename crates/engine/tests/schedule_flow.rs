//! End-to-end runs of the scheduling loop on the offline capability set.
//!
//! No mocks here: these runs exercise the real loop against the real
//! deterministic capabilities, the same wiring the worker falls back to
//! when no LLM is configured.

use chrono::{NaiveDate, NaiveTime};
use lineup_core::{Channel, MediaItem, TimeSlot};
use lineup_engine::{
    offline_capabilities, CompletionStatus, CostTier, ScheduleRequest, ScheduleRunner,
};

fn channel() -> Channel {
    Channel {
        name: "Retro TV".into(),
        description: Some("around-the-clock reruns".into()),
    }
}

fn media() -> Vec<MediaItem> {
    vec![
        MediaItem {
            id: "series:friends".into(),
            title: "Friends".into(),
            description: None,
            categories: vec!["sitcom".into(), "family".into()],
            duration_minutes: Some(30),
            rating: None,
            audience_score: Some(0.9),
        },
        MediaItem {
            id: "series:cartoons".into(),
            title: "Saturday Cartoons".into(),
            description: None,
            categories: vec!["cartoons".into(), "family".into()],
            duration_minutes: Some(30),
            rating: None,
            audience_score: Some(0.8),
        },
        MediaItem {
            id: "movie:alien".into(),
            title: "Alien".into(),
            description: None,
            categories: vec!["scifi".into(), "horror".into()],
            duration_minutes: Some(120),
            rating: Some("R".into()),
            audience_score: Some(0.95),
        },
    ]
}

fn request(window_days: u32, max_iterations: u32) -> ScheduleRequest {
    ScheduleRequest {
        channel: channel(),
        media: media(),
        start_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
        window_days,
        day_start: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        day_end_hour: 26,
        user_instructions: None,
        preferred_boundaries: vec![],
        daily_slots: vec![],
        cost_tier: CostTier::Balanced,
        max_iterations,
        quality_threshold: 0.7,
        evaluation_criteria: vec!["variety".into(), "flow".into()],
    }
}

fn assert_no_overlaps(slots: &[TimeSlot]) {
    let mut sorted = slots.to_vec();
    sorted.sort_by_key(|s| s.start);
    for pair in sorted.windows(2) {
        assert!(
            pair[0].end <= pair[1].start,
            "slots overlap: {}..{} and {}..{}",
            pair[0].start,
            pair[0].end,
            pair[1].start,
            pair[1].end
        );
    }
}

#[tokio::test]
async fn offline_run_fills_a_two_day_window() {
    let runner = ScheduleRunner::new(offline_capabilities());
    let response = runner.run(request(2, 12)).await.unwrap();

    let summary = &response.summary;
    assert_eq!(summary.completion_status, CompletionStatus::Complete);
    assert_eq!(summary.open_gaps, 0);
    assert_eq!(summary.unfilled_minutes, 0);
    assert!(summary.total_iterations <= 12);
    assert_no_overlaps(&response.slots);

    // slots tile the whole 2026-02-01 06:00 .. 2026-02-03 02:00 window
    let scheduled: i64 = response.slots.iter().map(TimeSlot::duration_minutes).sum();
    assert_eq!(scheduled, 2640);

    let quality = &summary.quality;
    assert_eq!(quality.coverage, 1.0);
    assert_eq!(quality.violation_count, 0);
    assert_eq!(quality.dimension_scores["variety"], 0.7);
    assert_eq!(quality.dimension_scores["flow"], 0.7);
    assert!(quality.overall_score > 0.0 && quality.overall_score <= 1.0);

    assert!(summary.cost.total_usd > 0.0);
    assert!(summary.cost.per_action.contains_key("select_content"));
    assert!(summary
        .key_decisions
        .iter()
        .any(|d| d.contains("proposer_finished")));
    assert!(response.overview.contains("Retro TV"));
}

#[tokio::test]
async fn fixed_daily_slots_come_back_untouched() {
    let news = TimeSlot::new(
        NaiveDate::from_ymd_opt(2026, 2, 1)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap(),
        NaiveDate::from_ymd_opt(2026, 2, 1)
            .unwrap()
            .and_hms_opt(19, 0, 0)
            .unwrap(),
        Some("series:news".into()),
    )
    .unwrap();
    let mut fixed = news.clone();
    fixed.notes = vec!["sponsored block, do not move".into()];
    fixed.category_filters = vec!["news".into()];

    let mut req = request(1, 12);
    req.daily_slots = vec![fixed.clone()];

    let runner = ScheduleRunner::new(offline_capabilities());
    let response = runner.run(req).await.unwrap();

    assert!(
        response.slots.contains(&fixed),
        "the fixed slot must come back exactly as submitted"
    );
    assert_no_overlaps(&response.slots);
    assert_eq!(response.summary.completion_status, CompletionStatus::Complete);
}

#[tokio::test]
async fn no_media_and_no_fixed_slots_fails() {
    let mut req = request(1, 6);
    req.media = vec![];

    let runner = ScheduleRunner::new(offline_capabilities());
    let response = runner.run(req).await.unwrap();

    let summary = &response.summary;
    assert_eq!(summary.completion_status, CompletionStatus::Failed);
    assert!(response.slots.is_empty());
    assert_eq!(summary.unfilled_minutes, 1200);
    assert_eq!(summary.open_gaps, 2);
    assert!(summary
        .key_decisions
        .iter()
        .any(|d| d.contains("no eligible content")));
}

#[tokio::test]
async fn no_media_with_a_fixed_slot_is_partial() {
    let anchor = TimeSlot::new(
        NaiveDate::from_ymd_opt(2026, 2, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap(),
        NaiveDate::from_ymd_opt(2026, 2, 1)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap(),
        Some("series:news".into()),
    )
    .unwrap();
    let mut req = request(1, 6);
    req.media = vec![];
    req.daily_slots = vec![anchor];

    let runner = ScheduleRunner::new(offline_capabilities());
    let response = runner.run(req).await.unwrap();

    assert_eq!(
        response.summary.completion_status,
        CompletionStatus::Partial
    );
    assert_eq!(response.slots.len(), 1);
    assert_eq!(response.summary.unfilled_minutes, 1140);
}

#[tokio::test]
async fn coverage_grows_with_the_iteration_budget() {
    let mut last_coverage = -1.0;
    for budget in [2, 4, 6, 12] {
        let runner = ScheduleRunner::new(offline_capabilities());
        let response = runner.run(request(2, budget)).await.unwrap();
        let coverage = response.summary.quality.coverage;
        assert!(
            coverage >= last_coverage,
            "coverage shrank from {last_coverage} to {coverage} at budget {budget}"
        );
        assert!(response.summary.total_iterations <= budget + 1);
        last_coverage = coverage;
    }
    assert_eq!(last_coverage, 1.0);
}

#[tokio::test]
async fn constraint_json_instructions_shape_selection() {
    let mut req = request(1, 8);
    // a self-contained day so one rule window can cover every span
    req.day_start = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
    req.day_end_hour = 20;
    req.user_instructions = Some(
        r#"{
            "content_rules": [
                {
                    "label": "family daytime",
                    "allowed_content": ["series:cartoons"],
                    "time_windows": [
                        {"days": "all", "start_time": "06:00", "end_time": "22:00"}
                    ]
                }
            ]
        }"#
        .into(),
    );

    let runner = ScheduleRunner::new(offline_capabilities());
    let response = runner.run(req).await.unwrap();

    let summary = &response.summary;
    assert_eq!(summary.completion_status, CompletionStatus::Complete);
    let applied = summary
        .constraints_applied
        .as_ref()
        .expect("parsed constraints travel into the summary");
    assert_eq!(applied.content_rules.len(), 1);
    assert!(!response.slots.is_empty());
    for slot in &response.slots {
        assert_eq!(slot.content_ref.as_deref(), Some("series:cartoons"));
    }
    assert_eq!(summary.quality.violation_count, 0);
}

#[tokio::test]
async fn response_serializes_for_the_wire() {
    let runner = ScheduleRunner::new(offline_capabilities());
    let response = runner.run(request(1, 12)).await.unwrap();

    let wire = serde_json::to_value(&response).unwrap();
    assert_eq!(wire["summary"]["completion_status"], "complete");
    assert!(wire["slots"].as_array().is_some_and(|s| !s.is_empty()));
    assert!(wire["summary"]["quality"]["overall_score"].is_number());
    assert!(wire["summary"]["cost"]["total_usd"].is_number());
    assert!(wire["overview"].is_string());
}
