//! Pure schedule-vs-rules evaluation.
//!
//! Two passes over the schedule: repetition spacing first, then each
//! content rule in declaration order. Evaluation never mutates anything;
//! the output is a list of structured violations a caller can log,
//! display, or count.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lineup_core::{ContentCatalog, DaySchedule, MediaItem, TimeSlot};

use crate::schema::SchedulingConstraints;

/// One constraint breach, with enough detail to reproduce it for the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    Repetition {
        content_ref: String,
        first_end: NaiveDateTime,
        next_start: NaiveDateTime,
        hours_between: f64,
        min_hours: f64,
    },
    NotAllowed {
        rule: String,
        slot_start: NaiveDateTime,
        content_ref: Option<String>,
    },
    MissingRequiredCategory {
        rule: String,
        slot_start: NaiveDateTime,
        required: Vec<String>,
    },
    ExcludedCategory {
        rule: String,
        slot_start: NaiveDateTime,
        category: String,
    },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::Repetition {
                content_ref,
                next_start,
                hours_between,
                min_hours,
                ..
            } => write!(
                f,
                "{} repeats at {} only {:.1}h after its previous airing, minimum is {}h",
                content_ref, next_start, hours_between, min_hours
            ),
            Violation::NotAllowed {
                rule,
                slot_start,
                content_ref,
            } => write!(
                f,
                "{}: content {} at {} is not in the allowed list",
                rule,
                content_ref.as_deref().unwrap_or("(unassigned)"),
                slot_start
            ),
            Violation::MissingRequiredCategory {
                rule,
                slot_start,
                required,
            } => write!(
                f,
                "{}: slot at {} has none of the required categories [{}]",
                rule,
                slot_start,
                required.join(", ")
            ),
            Violation::ExcludedCategory {
                rule,
                slot_start,
                category,
            } => write!(
                f,
                "{}: slot at {} carries excluded category '{}'",
                rule, slot_start, category
            ),
        }
    }
}

/// Check the whole schedule against the rule set.
///
/// Output order is deterministic: repetition violations first (content ref
/// lexicographic, then chronological), then content violations rule-major
/// with slots chronological within each rule.
pub fn check_violations(
    schedule: &DaySchedule,
    constraints: &SchedulingConstraints,
    catalog: &ContentCatalog,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    repetition_pass(schedule, constraints, &mut violations);
    content_pass(schedule, constraints, catalog, &mut violations);
    debug!(
        slots = schedule.slot_count(),
        rules = constraints.content_rules.len(),
        violations = violations.len(),
        "violation check complete"
    );
    violations
}

fn repetition_pass(
    schedule: &DaySchedule,
    constraints: &SchedulingConstraints,
    violations: &mut Vec<Violation>,
) {
    let Some(rep) = &constraints.repetition else {
        return;
    };

    let mut occurrences: BTreeMap<&str, Vec<&TimeSlot>> = BTreeMap::new();
    for slot in schedule.iter() {
        if let Some(id) = &slot.content_ref {
            occurrences.entry(id.as_str()).or_default().push(slot);
        }
    }

    for (content_ref, slots) in occurrences {
        for pair in slots.windows(2) {
            let hours = (pair[1].start - pair[0].end).num_minutes() as f64 / 60.0;
            if hours < rep.min_hours_between_repeats {
                violations.push(Violation::Repetition {
                    content_ref: content_ref.to_string(),
                    first_end: pair[0].end,
                    next_start: pair[1].start,
                    hours_between: hours,
                    min_hours: rep.min_hours_between_repeats,
                });
            }
        }
    }
}

fn content_pass(
    schedule: &DaySchedule,
    constraints: &SchedulingConstraints,
    catalog: &ContentCatalog,
    violations: &mut Vec<Violation>,
) {
    for (idx, rule) in constraints.content_rules.iter().enumerate() {
        let label = rule.display_label(idx);
        for slot in schedule.iter() {
            // A slot matching zero rule windows is exempt.
            if !rule.matches_span(slot.start, slot.end) {
                continue;
            }
            let categories = slot_categories(slot, catalog);

            if !rule.allowed_content.is_empty() {
                let allowed = slot
                    .content_ref
                    .as_deref()
                    .map_or(false, |id| rule.allowed_content.iter().any(|a| a == id));
                if !allowed {
                    violations.push(Violation::NotAllowed {
                        rule: label.clone(),
                        slot_start: slot.start,
                        content_ref: slot.content_ref.clone(),
                    });
                }
            }

            if !rule.required_categories.is_empty()
                && !categories
                    .iter()
                    .any(|c| rule.required_categories.iter().any(|r| r == c))
            {
                violations.push(Violation::MissingRequiredCategory {
                    rule: label.clone(),
                    slot_start: slot.start,
                    required: rule.required_categories.clone(),
                });
            }

            if let Some(cat) = categories
                .iter()
                .find(|c| rule.excluded_categories.iter().any(|e| e == *c))
            {
                violations.push(Violation::ExcludedCategory {
                    rule: label.clone(),
                    slot_start: slot.start,
                    category: cat.to_string(),
                });
            }
        }
    }
}

/// The category set checked for a slot: its own filters plus the catalog
/// categories of its content.
fn slot_categories<'a>(slot: &'a TimeSlot, catalog: &'a ContentCatalog) -> Vec<&'a str> {
    let mut cats: Vec<&str> = slot.category_filters.iter().map(String::as_str).collect();
    if let Some(id) = &slot.content_ref {
        for c in catalog.categories_for(id) {
            if !cats.contains(&c.as_str()) {
                cats.push(c);
            }
        }
    }
    cats
}

/// Catalog items that could legally occupy `[start, end)` under the rules.
/// Items are returned in library order; with no matching rules the whole
/// catalog is eligible.
pub fn eligible_content<'a>(
    start: NaiveDateTime,
    end: NaiveDateTime,
    constraints: &SchedulingConstraints,
    catalog: &'a ContentCatalog,
) -> Vec<&'a MediaItem> {
    catalog
        .iter()
        .filter(|item| {
            constraints.content_rules.iter().all(|rule| {
                if !rule.matches_span(start, end) {
                    return true;
                }
                if !rule.allowed_content.is_empty()
                    && !rule.allowed_content.iter().any(|a| a == &item.id)
                {
                    return false;
                }
                if !rule.required_categories.is_empty()
                    && !item
                        .categories
                        .iter()
                        .any(|c| rule.required_categories.contains(c))
                {
                    return false;
                }
                !item
                    .categories
                    .iter()
                    .any(|c| rule.excluded_categories.contains(c))
            })
        })
        .collect()
}
