use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::NaiveDate;
use regex::Regex;
use serde::{
  Deserialize,
  Serialize
};
use tracing::trace;

use crate::datetime::add_days;
use crate::task::{
  Category,
  CategoryId,
  Priority,
  Task
};

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum StatusFilter {
  #[default]
  All,
  Active,
  Completed
}

impl StatusFilter {
  pub fn matches(
    self,
    task: &Task
  ) -> bool {
    match self {
      | StatusFilter::All => true,
      | StatusFilter::Active => {
        !task.completed
      }
      | StatusFilter::Completed => {
        task.completed
      }
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      | StatusFilter::All => "all",
      | StatusFilter::Active => "active",
      | StatusFilter::Completed => {
        "completed"
      }
    }
  }
}

impl FromStr for StatusFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(StatusFilter::All),
      | "active" | "open" => {
        Ok(StatusFilter::Active)
      }
      | "completed" | "done" => {
        Ok(StatusFilter::Completed)
      }
      | other => {
        Err(anyhow!(
          "invalid status filter: \
           {other} (expected all, \
           active or completed)"
        ))
      }
    }
  }
}

/// Relative due-date window, evaluated
/// against a calendar date for "today".
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum DueBucket {
  Today,
  Tomorrow,
  ThisWeek,
  NextWeek,
  Overdue,
  NoDueDate
}

impl DueBucket {
  pub const ALL: [DueBucket; 6] = [
    DueBucket::Today,
    DueBucket::Tomorrow,
    DueBucket::ThisWeek,
    DueBucket::NextWeek,
    DueBucket::Overdue,
    DueBucket::NoDueDate
  ];

  pub fn contains(
    self,
    due: Option<NaiveDate>,
    today: NaiveDate
  ) -> bool {
    let Some(due) = due else {
      return self
        == DueBucket::NoDueDate;
    };

    match self {
      | DueBucket::Today => due == today,
      | DueBucket::Tomorrow => {
        days_after(today, 1) == Some(due)
      }
      | DueBucket::ThisWeek => {
        due >= today
          && days_after(today, 7)
            .is_some_and(|end| due <= end)
      }
      | DueBucket::NextWeek => {
        let start = days_after(today, 7);
        let end = days_after(today, 14);
        match (start, end) {
          | (Some(start), Some(end)) => {
            due >= start && due <= end
          }
          | _ => false
        }
      }
      | DueBucket::Overdue => due < today,
      | DueBucket::NoDueDate => false
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      | DueBucket::Today => "today",
      | DueBucket::Tomorrow => {
        "tomorrow"
      }
      | DueBucket::ThisWeek => {
        "this-week"
      }
      | DueBucket::NextWeek => {
        "next-week"
      }
      | DueBucket::Overdue => "overdue",
      | DueBucket::NoDueDate => {
        "no-due-date"
      }
    }
  }
}

impl fmt::Display for DueBucket {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for DueBucket {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let normalized = s
      .trim()
      .to_ascii_lowercase()
      .replace('_', "-");
    DueBucket::ALL
      .into_iter()
      .find(|bucket| {
        bucket.as_str() == normalized
      })
      .ok_or_else(|| {
        anyhow!(
          "invalid due-date bucket: {s} \
           (expected today, tomorrow, \
           this-week, next-week, \
           overdue or no-due-date)"
        )
      })
  }
}

fn days_after(
  today: NaiveDate,
  days: u64
) -> Option<NaiveDate> {
  add_days(today, days).ok()
}

/// Structured filters layered on top of
/// the free-text query. Empty sets and an
/// unset bucket place no constraint.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
  #[serde(default)]
  pub status:     StatusFilter,
  #[serde(default)]
  pub priority:   BTreeSet<Priority>,
  #[serde(default)]
  pub categories: BTreeSet<CategoryId>,
  #[serde(default)]
  pub due_date:   Option<DueBucket>
}

impl FilterState {
  pub fn matches(
    &self,
    task: &Task,
    today: NaiveDate
  ) -> bool {
    if !self.status.matches(task) {
      return false;
    }

    if !self.priority.is_empty()
      && !self
        .priority
        .contains(&task.priority)
    {
      return false;
    }

    if !self.categories.is_empty()
      && !task.category_id.is_some_and(
        |id| self.categories.contains(&id)
      )
    {
      return false;
    }

    match self.due_date {
      | Some(bucket) => {
        bucket
          .contains(task.due_date, today)
      }
      | None => true
    }
  }

  pub fn is_unconstrained(
    &self
  ) -> bool {
    self.status == StatusFilter::All
      && self.priority.is_empty()
      && self.categories.is_empty()
      && self.due_date.is_none()
  }

  /// True when either the query or any
  /// filter dimension narrows the list.
  pub fn is_active(
    &self,
    query: &str
  ) -> bool {
    !query.is_empty()
      || !self.is_unconstrained()
  }

  /// Number of individual constraints:
  /// each selected priority and category
  /// counts on its own.
  pub fn active_filter_count(
    &self
  ) -> usize {
    usize::from(
      self.status != StatusFilter::All
    ) + self.priority.len()
      + self.categories.len()
      + usize::from(
        self.due_date.is_some()
      )
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Operator {
  Category,
  Priority,
  Due
}

impl Operator {
  /// Precedence order; the first kind
  /// present in the query wins.
  const ORDER: [Operator; 3] = [
    Operator::Category,
    Operator::Priority,
    Operator::Due
  ];

  fn keyword(self) -> &'static str {
    match self {
      | Operator::Category => {
        "category:"
      }
      | Operator::Priority => {
        "priority:"
      }
      | Operator::Due => "due:"
    }
  }

  fn value_regex(
    self
  ) -> Option<&'static Regex> {
    static CATEGORY: OnceLock<
      Option<Regex>
    > = OnceLock::new();
    static PRIORITY: OnceLock<
      Option<Regex>
    > = OnceLock::new();
    static DUE: OnceLock<Option<Regex>> =
      OnceLock::new();

    let (cell, pattern) = match self {
      | Operator::Category => {
        (&CATEGORY, r"category:([a-z0-9_]+)")
      }
      | Operator::Priority => {
        (&PRIORITY, r"priority:([a-z0-9_]+)")
      }
      | Operator::Due => {
        (&DUE, r"due:([a-z0-9_]+)")
      }
    };
    cell
      .get_or_init(|| {
        Regex::new(pattern).ok()
      })
      .as_ref()
  }
}

/// The parsed free-text half of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
  Any,
  Text(String),
  Operator {
    kind:  Operator,
    value: String
  },
  /// An operator keyword with no usable
  /// value. Places no constraint and does
  /// not fall back to text matching.
  Malformed(Operator)
}

impl SearchQuery {
  pub fn parse(raw: &str) -> Self {
    if raw.is_empty() {
      return SearchQuery::Any;
    }

    let lower = raw.to_lowercase();
    for kind in Operator::ORDER {
      if !lower.contains(kind.keyword())
      {
        continue;
      }

      let value = kind
        .value_regex()
        .and_then(|re| re.captures(&lower))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

      return match value {
        | Some(value) => {
          SearchQuery::Operator {
            kind,
            value
          }
        }
        | None => {
          trace!(operator = ?kind, "operator without value; ignoring");
          SearchQuery::Malformed(kind)
        }
      };
    }

    SearchQuery::Text(lower)
  }

  pub fn matches(
    &self,
    task: &Task,
    categories: &[Category],
    today: NaiveDate
  ) -> bool {
    match self {
      | SearchQuery::Any
      | SearchQuery::Malformed(_) => true,
      | SearchQuery::Text(needle) => {
        text_matches(task, needle)
      }
      | SearchQuery::Operator {
        kind: Operator::Category,
        value
      } => {
        task
          .category_id
          .and_then(|id| {
            categories
              .iter()
              .find(|c| c.id == id)
          })
          .is_some_and(|c| {
            c.name
              .to_lowercase()
              .contains(value.as_str())
          })
      }
      | SearchQuery::Operator {
        kind: Operator::Priority,
        value
      } => {
        task
          .priority
          .as_str()
          .contains(value.as_str())
      }
      | SearchQuery::Operator {
        kind: Operator::Due,
        value
      } => {
        let Some(due) = task.due_date
        else {
          return value == "none";
        };
        match value.as_str() {
          | "today" => {
            DueBucket::Today
              .contains(Some(due), today)
          }
          | "tomorrow" => {
            DueBucket::Tomorrow
              .contains(Some(due), today)
          }
          | _ => false
        }
      }
    }
  }
}

fn text_matches(
  task: &Task,
  needle: &str
) -> bool {
  task
    .title
    .to_lowercase()
    .contains(needle)
    || task
      .description
      .as_deref()
      .is_some_and(|d| {
        d.to_lowercase().contains(needle)
      })
    || task.tags.iter().any(|tag| {
      tag.to_lowercase().contains(needle)
    })
}

/// Query AND filter state, ready to test
/// tasks against a fixed "today".
#[derive(Debug, Clone)]
pub struct Predicate<'a> {
  query:      SearchQuery,
  filter:     &'a FilterState,
  categories: &'a [Category],
  today:      NaiveDate
}

impl<'a> Predicate<'a> {
  #[tracing::instrument(skip(
    filter, categories
  ))]
  pub fn new(
    query: &str,
    filter: &'a FilterState,
    categories: &'a [Category],
    today: NaiveDate
  ) -> Self {
    let query = SearchQuery::parse(query);
    trace!(?query, ?filter, "built predicate");
    Self {
      query,
      filter,
      categories,
      today
    }
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    let ok = self.query.matches(
      task,
      self.categories,
      self.today
    ) && self
      .filter
      .matches(task, self.today);
    trace!(id = task.id, ok, "predicate evaluation");
    ok
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    DueBucket,
    FilterState,
    Operator,
    Predicate,
    SearchQuery,
    StatusFilter
  };
  use crate::task::{
    Category,
    Priority,
    Task
  };

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 15)
      .expect("valid date")
  }

  fn task(
    id: u64,
    title: &str,
    priority: Priority
  ) -> Task {
    let now = Utc
      .with_ymd_and_hms(
        2025, 1, 10, 9, 0, 0
      )
      .unwrap();
    let mut t = Task::new(
      id,
      title.to_string(),
      now
    );
    t.priority = priority;
    t
  }

  fn categories() -> Vec<Category> {
    let now = Utc
      .with_ymd_and_hms(
        2025, 1, 1, 0, 0, 0
      )
      .unwrap();
    vec![
      Category::new(
        1,
        "Work".to_string(),
        "#2563EB".to_string(),
        now
      ),
      Category::new(
        2,
        "Health & Fitness".to_string(),
        "#DC2626".to_string(),
        now
      ),
    ]
  }

  #[test]
  fn parse_picks_operator_by_precedence()
  {
    assert_eq!(
      SearchQuery::parse(
        "due:today priority:high category:work"
      ),
      SearchQuery::Operator {
        kind:  Operator::Category,
        value: "work".to_string()
      }
    );
    assert_eq!(
      SearchQuery::parse(
        "due:today Priority:HIGH"
      ),
      SearchQuery::Operator {
        kind:  Operator::Priority,
        value: "high".to_string()
      }
    );
    assert_eq!(
      SearchQuery::parse("category:"),
      SearchQuery::Malformed(
        Operator::Category
      )
    );
    assert_eq!(
      SearchQuery::parse(""),
      SearchQuery::Any
    );
  }

  #[test]
  fn priority_operator_keeps_only_that_priority()
  {
    let filter = FilterState::default();
    let cats = categories();
    let pred = Predicate::new(
      "priority:high",
      &filter,
      &cats,
      today()
    );

    let high =
      task(1, "a", Priority::High);
    let low = task(2, "b", Priority::Low);
    assert!(pred.matches(&high));
    assert!(!pred.matches(&low));
  }

  #[test]
  fn operator_ignores_remaining_free_text()
  {
    let filter = FilterState::default();
    let cats = categories();
    let pred = Predicate::new(
      "groceries priority:low",
      &filter,
      &cats,
      today()
    );
    let t = task(
      1,
      "Read chapter 5",
      Priority::Low
    );
    assert!(pred.matches(&t));
  }

  #[test]
  fn malformed_operator_skips_text_fallback()
  {
    let filter = FilterState::default();
    let cats = categories();
    let pred = Predicate::new(
      "category: zzz",
      &filter,
      &cats,
      today()
    );
    let t =
      task(1, "nothing", Priority::Low);
    assert!(pred.matches(&t));
  }

  #[test]
  fn category_operator_matches_name_substring()
  {
    let filter = FilterState::default();
    let cats = categories();
    let pred = Predicate::new(
      "category:fit",
      &filter,
      &cats,
      today()
    );

    let mut gym =
      task(1, "gym", Priority::Low);
    gym.category_id = Some(2);
    let mut report =
      task(2, "report", Priority::Low);
    report.category_id = Some(1);
    let mut orphan =
      task(3, "orphan", Priority::Low);
    orphan.category_id = Some(42);

    assert!(pred.matches(&gym));
    assert!(!pred.matches(&report));
    assert!(!pred.matches(&orphan));
  }

  #[test]
  fn due_operator_handles_none_and_unknown_values()
  {
    let filter = FilterState::default();
    let cats = categories();
    let undated =
      task(1, "a", Priority::Low);
    let mut dated =
      task(2, "b", Priority::Low);
    dated.due_date = Some(today());

    let none = Predicate::new(
      "due:none",
      &filter,
      &cats,
      today()
    );
    assert!(none.matches(&undated));
    assert!(!none.matches(&dated));

    let on_today = Predicate::new(
      "due:today",
      &filter,
      &cats,
      today()
    );
    assert!(on_today.matches(&dated));
    assert!(!on_today.matches(&undated));

    let later = Predicate::new(
      "due:later",
      &filter,
      &cats,
      today()
    );
    assert!(!later.matches(&dated));
  }

  #[test]
  fn text_search_covers_title_description_and_tags()
  {
    let filter = FilterState::default();
    let cats = categories();
    let pred = Predicate::new(
      "Weekend",
      &filter,
      &cats,
      today()
    );

    let by_title = task(
      1,
      "Plan weekend trip",
      Priority::Low
    );
    let mut by_desc =
      task(2, "Trip", Priority::Low);
    by_desc.description = Some(
      "book a WEEKEND cabin".to_string()
    );
    let mut by_tag =
      task(3, "Dinner", Priority::Low);
    by_tag.tags =
      vec!["weekend".to_string()];
    let miss =
      task(4, "Taxes", Priority::Low);

    assert!(pred.matches(&by_title));
    assert!(pred.matches(&by_desc));
    assert!(pred.matches(&by_tag));
    assert!(!pred.matches(&miss));
  }

  #[test]
  fn filter_state_is_anded_with_query() {
    let filter = FilterState {
      status: StatusFilter::Active,
      priority: [Priority::High]
        .into_iter()
        .collect(),
      categories: [1].into_iter().collect(),
      due_date: None
    };
    let cats = categories();
    let pred = Predicate::new(
      "",
      &filter,
      &cats,
      today()
    );

    let mut hit =
      task(1, "a", Priority::High);
    hit.category_id = Some(1);
    let mut done = hit.clone();
    done.completed = true;
    let mut wrong_cat = hit.clone();
    wrong_cat.category_id = Some(2);
    let mut uncategorized = hit.clone();
    uncategorized.category_id = None;
    let mut low = hit.clone();
    low.priority = Priority::Low;

    assert!(pred.matches(&hit));
    assert!(!pred.matches(&done));
    assert!(!pred.matches(&wrong_cat));
    assert!(!pred.matches(&uncategorized));
    assert!(!pred.matches(&low));
  }

  #[test]
  fn due_buckets_follow_calendar_windows() {
    let t = today();
    let d = |offset: i64| {
      Some(
        t + chrono::Duration::days(
          offset
        )
      )
    };

    assert!(
      DueBucket::Today.contains(d(0), t)
    );
    assert!(
      !DueBucket::Today.contains(d(1), t)
    );
    assert!(
      DueBucket::Tomorrow
        .contains(d(1), t)
    );
    assert!(
      DueBucket::ThisWeek
        .contains(d(0), t)
    );
    assert!(
      DueBucket::ThisWeek
        .contains(d(7), t)
    );
    assert!(
      !DueBucket::ThisWeek
        .contains(d(8), t)
    );
    assert!(
      DueBucket::NextWeek
        .contains(d(7), t)
    );
    assert!(
      DueBucket::NextWeek
        .contains(d(14), t)
    );
    assert!(
      !DueBucket::NextWeek
        .contains(d(15), t)
    );
    assert!(
      DueBucket::Overdue
        .contains(d(-1), t)
    );
    assert!(
      !DueBucket::Overdue
        .contains(d(0), t)
    );
    assert!(
      !DueBucket::Overdue
        .contains(d(3), t)
    );
    assert!(
      DueBucket::NoDueDate
        .contains(None, t)
    );
    assert!(
      !DueBucket::Overdue
        .contains(None, t)
    );
  }

  #[test]
  fn filter_activity_counts_each_selection()
  {
    let mut filter =
      FilterState::default();
    assert!(!filter.is_active(""));
    assert!(filter.is_active("x"));

    filter.priority = [
      Priority::High,
      Priority::Low
    ]
    .into_iter()
    .collect();
    filter.due_date =
      Some(DueBucket::Overdue);
    assert!(filter.is_active(""));
    assert_eq!(
      filter.active_filter_count(),
      3
    );
  }

  #[test]
  fn bucket_names_round_trip_through_from_str()
  {
    for bucket in DueBucket::ALL {
      assert_eq!(
        bucket
          .as_str()
          .parse::<DueBucket>()
          .expect("parse"),
        bucket
      );
    }
    assert_eq!(
      "this_week"
        .parse::<DueBucket>()
        .expect("underscore"),
      DueBucket::ThisWeek
    );
  }
}
