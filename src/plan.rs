//! This module provides the `SchedulePlan` type and the revision scheduler
//! that builds it from an ordered list of topics.
//!
//! Each topic gets a study date, and (optionally) two follow-up review dates
//! two and five days later. Study dates accumulate: every topic after the
//! first is scheduled `gap_days` after the previous topic's study date, so
//! a weekend roll early in the plan pushes back everything after it.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::slice;

use chrono::{Datelike, Duration, Local, NaiveDate};

use super::errors::*;
use super::files;

/// Days after the study date of the first review session.
const FIRST_REVIEW_OFFSET: i64 = 2;
/// Days after the study date of the second review session.
const SECOND_REVIEW_OFFSET: i64 = 5;

/// A single topic in a plan, with the day it should be studied and
/// any review sessions that follow.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    topic: String,
    study_on: NaiveDate,
    /// Empty when revision is disabled; omitted from the JSON form in that case.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    reviews: Vec<NaiveDate>,
}

impl ScheduleEntry {
    /// Returns the topic, exactly as it was given to the scheduler.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the day the topic should first be studied.
    pub fn study_on(&self) -> NaiveDate {
        self.study_on
    }

    /// Returns the review dates, in order.
    pub fn reviews(&self) -> &[NaiveDate] {
        &self.reviews
    }
}

/// An ordered revision schedule, one entry per topic in input order.
///
/// Plans are never modified after they are computed; to change a plan,
/// compute a new one.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct SchedulePlan {
    entries: Vec<ScheduleEntry>,
}

impl SchedulePlan {
    /// Returns the number of entries in the plan.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the plan has no entries. Computed plans are never
    /// empty, but a hand-edited plan file might be.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over entries in the plan, of type `&ScheduleEntry`
    pub fn entries(&self) -> slice::Iter<'_, ScheduleEntry> {
        self.entries.iter()
    }

    /// Returns the entry for the given (0-based) position, if any.
    pub fn get(&self, index: usize) -> Option<&ScheduleEntry> {
        self.entries.get(index)
    }

    /// Returns the first and last dates appearing anywhere in the plan
    /// (study or review), or `None` for an empty plan.
    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let dates = self
            .entries
            .iter()
            .flat_map(|e| Some(e.study_on).into_iter().chain(e.reviews.iter().cloned()));
        dates.fold(None, |acc, d| match acc {
            None => Some((d, d)),
            Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
        })
    }
}

/// Options controlling how a plan is laid out. Every option has a default,
/// see `PlanOptions::default`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOptions {
    start_date: Option<NaiveDate>,
    gap_days: u32,
    include_revision: bool,
    skip_weekends: bool,
}

impl Default for PlanOptions {
    /// Starts today, two days between topics, with revision, skipping weekends.
    fn default() -> PlanOptions {
        PlanOptions {
            start_date: None,
            gap_days: 2,
            include_revision: true,
            skip_weekends: true,
        }
    }
}

impl PlanOptions {
    /// Sets the date of the first study session. Without this, the plan
    /// starts on the local date at the time it is computed.
    pub fn start_date(mut self, date: NaiveDate) -> PlanOptions {
        self.start_date = Some(date);
        self
    }

    /// Sets the number of days between consecutive topics' study dates.
    pub fn gap_days(mut self, days: u32) -> PlanOptions {
        self.gap_days = days;
        self
    }

    /// Sets whether review dates are scheduled.
    pub fn include_revision(mut self, include: bool) -> PlanOptions {
        self.include_revision = include;
        self
    }

    /// Sets whether Saturdays and Sundays are avoided for every scheduled date.
    pub fn skip_weekends(mut self, skip: bool) -> PlanOptions {
        self.skip_weekends = skip;
        self
    }
}

/// Computes a revision plan for the given topics without saving it.
///
/// Fails with `InvalidInput` if `topics` is empty or the gap is zero.
pub fn compute_plan<S: AsRef<str>>(topics: &[S], options: &PlanOptions) -> Result<SchedulePlan> {
    if topics.is_empty() {
        bail!(ErrorKind::InvalidInput("cannot schedule an empty list of topics".into()));
    }
    if options.gap_days == 0 {
        bail!(ErrorKind::InvalidInput("gap between topics must be at least one day".into()));
    }

    let start = options.start_date.unwrap_or_else(|| Local::now().date_naive());
    let mut current = start;
    let mut entries = Vec::with_capacity(topics.len());

    for (i, topic) in topics.iter().enumerate() {
        if i > 0 {
            current = add_days(current, i64::from(options.gap_days))?;
        }
        if options.skip_weekends {
            while is_weekend(current) {
                current = add_days(current, 1)?;
            }
        }

        let reviews = if options.include_revision {
            let mut reviews = Vec::with_capacity(2);
            for &offset in &[FIRST_REVIEW_OFFSET, SECOND_REVIEW_OFFSET] {
                let mut review = add_days(current, offset)?;
                if options.skip_weekends && is_weekend(review) {
                    // Jump straight to Monday
                    let weekday = i64::from(review.weekday().num_days_from_monday());
                    review = add_days(review, 7 - weekday)?;
                }
                reviews.push(review);
            }
            reviews
        } else {
            Vec::new()
        };

        entries.push(ScheduleEntry {
            topic: topic.as_ref().to_owned(),
            study_on: current,
            reviews: reviews,
        });
    }

    debug!("scheduled {} topics starting {} (first study day {})",
           entries.len(),
           start,
           entries[0].study_on);

    Ok(SchedulePlan { entries: entries })
}

/// Computes a revision plan and writes it to `output`, overwriting any
/// file already there. The file is written exactly once per call.
pub fn make_plan<S: AsRef<str>>(topics: &[S],
                                options: &PlanOptions,
                                output: &Path)
                                -> Result<SchedulePlan> {
    let plan = compute_plan(topics, options)?;
    files::save_plan(&plan, output)?;
    info!("saved plan with {} topics to {}", plan.len(), output.display());
    Ok(plan)
}

/// Reads a list of topics from plain text, one topic per line.
///
/// Surrounding whitespace is trimmed and blank lines are skipped. An
/// input with no topics at all is an error, since it cannot be scheduled.
pub fn read_topics<T: Read>(input: T) -> Result<Vec<String>> {
    let r = BufReader::new(input);
    let mut topics = Vec::new();

    for l in r.lines() {
        let l = l.chain_err(|| ErrorKind::Persistence("could not read line".into()))?;
        let topic = l.trim();
        if !topic.is_empty() {
            topics.push(topic.to_owned());
        }
    }

    if topics.is_empty() {
        Err(ErrorKind::InvalidInput("no topics found in input".into()).into())
    } else {
        Ok(topics)
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    date.weekday().num_days_from_monday() >= 5
}

fn add_days(date: NaiveDate, days: i64) -> Result<NaiveDate> {
    date.checked_add_signed(Duration::days(days))
        .ok_or_else(|| ErrorKind::InvalidInput(format!("date out of range after {}", date)).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn options_from(start: NaiveDate) -> PlanOptions {
        PlanOptions::default().start_date(start)
    }

    #[test]
    fn worked_example() {
        let plan = compute_plan(&["Math", "Physics"], &options_from(date(2024, 1, 1))).unwrap();

        let math = plan.get(0).unwrap();
        assert_eq!(math.topic(), "Math");
        assert_eq!(math.study_on(), date(2024, 1, 1));
        // Jan 6 is a Saturday
        assert_eq!(math.reviews(), &[date(2024, 1, 3), date(2024, 1, 8)]);

        let physics = plan.get(1).unwrap();
        assert_eq!(physics.topic(), "Physics");
        assert_eq!(physics.study_on(), date(2024, 1, 3));
        assert_eq!(physics.reviews(), &[date(2024, 1, 5), date(2024, 1, 8)]);
    }

    #[test]
    fn empty_topics_rejected() {
        let topics: Vec<String> = Vec::new();
        match compute_plan(&topics, &PlanOptions::default()) {
            Err(Error(ErrorKind::InvalidInput(_), _)) => {}
            other => panic!("expected invalid input, got {:?}", other),
        }
    }

    #[test]
    fn zero_gap_rejected() {
        let options = PlanOptions::default().gap_days(0);
        match compute_plan(&["a"], &options) {
            Err(Error(ErrorKind::InvalidInput(_), _)) => {}
            other => panic!("expected invalid input, got {:?}", other),
        }
    }

    #[test]
    fn topics_kept_in_order() {
        let topics = vec!["c", "a", "b", "a"];
        let plan = compute_plan(&topics, &options_from(date(2024, 3, 4))).unwrap();
        assert_eq!(plan.len(), topics.len());
        for (entry, topic) in plan.entries().zip(&topics) {
            assert_eq!(entry.topic(), *topic);
        }
    }

    #[test]
    fn first_day_is_start_without_weekend_skipping() {
        // A Saturday
        let start = date(2024, 1, 6);
        let options = options_from(start).skip_weekends(false);
        let plan = compute_plan(&["x"], &options).unwrap();
        assert_eq!(plan.get(0).unwrap().study_on(), start);
        assert_eq!(plan.get(0).unwrap().reviews(), &[date(2024, 1, 8), date(2024, 1, 11)]);
    }

    #[test]
    fn first_day_rolls_to_monday() {
        let plan = compute_plan(&["x"], &options_from(date(2024, 1, 6))).unwrap();
        assert_eq!(plan.get(0).unwrap().study_on(), date(2024, 1, 8));
    }

    #[test]
    fn gaps_accumulate_from_previous_entry() {
        // Friday start: the second topic lands on Sunday and rolls to Monday,
        // and the third counts from that Monday.
        let plan = compute_plan(&["a", "b", "c"], &options_from(date(2024, 1, 5))).unwrap();
        let days: Vec<_> = plan.entries().map(|e| e.study_on()).collect();
        assert_eq!(days, vec![date(2024, 1, 5), date(2024, 1, 8), date(2024, 1, 10)]);

        for w in days.windows(2) {
            assert!(w[1] >= w[0] + Duration::days(2));
        }
    }

    #[test]
    fn exact_gaps_without_weekend_skipping() {
        let options = options_from(date(2024, 1, 1)).gap_days(3).skip_weekends(false);
        let plan = compute_plan(&["a", "b", "c", "d"], &options).unwrap();
        let days: Vec<_> = plan.entries().map(|e| e.study_on()).collect();
        for w in days.windows(2) {
            assert_eq!(w[1], w[0] + Duration::days(3));
        }
    }

    #[test]
    fn no_weekend_dates_when_skipping() {
        let topics: Vec<String> = (0..40).map(|i| format!("topic {}", i)).collect();
        for start_day in 1..8 {
            for gap in 1..6 {
                let options = options_from(date(2024, 1, start_day)).gap_days(gap);
                let plan = compute_plan(&topics, &options).unwrap();
                for e in plan.entries() {
                    assert!(!is_weekend(e.study_on()), "{:?}", e);
                    for r in e.reviews() {
                        assert!(!is_weekend(*r), "{:?}", e);
                    }
                }
            }
        }
    }

    #[test]
    fn no_reviews_without_revision() {
        let options = options_from(date(2024, 1, 1)).include_revision(false);
        let plan = compute_plan(&["a", "b"], &options).unwrap();
        assert!(plan.entries().all(|e| e.reviews().is_empty()));

        let json = serde_json::to_value(&plan).unwrap();
        for entry in json.as_array().unwrap() {
            assert!(entry.get("reviews").is_none());
        }
    }

    #[test]
    fn serialized_format() {
        let plan = compute_plan(&["Math"], &options_from(date(2024, 1, 1))).unwrap();
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json,
                   serde_json::json!([{
                       "topic": "Math",
                       "study_on": "2024-01-01",
                       "reviews": ["2024-01-03", "2024-01-08"]
                   }]));
    }

    #[test]
    fn repeated_calls_are_identical() {
        let options = options_from(date(2024, 2, 28)).gap_days(4);
        let topics = ["a", "b", "c"];
        let first = compute_plan(&topics, &options).unwrap();
        let second = compute_plan(&topics, &options).unwrap();
        assert_eq!(first, second);
        assert_eq!(serde_json::to_string_pretty(&first).unwrap(),
                   serde_json::to_string_pretty(&second).unwrap());
    }

    #[test]
    fn span_covers_reviews() {
        let plan = compute_plan(&["Math", "Physics"], &options_from(date(2024, 1, 1))).unwrap();
        assert_eq!(plan.span(), Some((date(2024, 1, 1), date(2024, 1, 8))));
    }

    #[test]
    fn topics_from_text() {
        let input = "Math\n\n  Physics  \nAI\n";
        assert_eq!(read_topics(input.as_bytes()).unwrap(), vec!["Math", "Physics", "AI"]);
        assert!(read_topics("\n   \n".as_bytes()).is_err());
    }
}
