use anyhow::anyhow;
use chrono::NaiveDate;
use tracing::{
  instrument,
  warn
};

use crate::datetime::parse_due_expr;
use crate::task::{
  Category,
  CategoryId,
  Priority
};
use crate::validate::TaskDraft;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mod {
  TagAdd(String),
  TagRemove(String),
  Priority(Priority),
  Category(Option<String>),
  Due(Option<NaiveDate>),
  Description(String)
}

/// Splits `add`/`modify` arguments into
/// title words and modifiers. Everything
/// after `--` is title text.
#[instrument(skip(args, today))]
pub(crate) fn parse_title_and_mods(
  args: &[String],
  today: NaiveDate
) -> anyhow::Result<(String, Vec<Mod>)>
{
  let mut title_parts = Vec::new();
  let mut mods = Vec::new();

  let mut literal = false;
  for arg in args {
    if arg == "--" {
      literal = true;
      continue;
    }

    if !literal
      && let Some(one_mod) =
        parse_one_mod(arg, today)?
    {
      mods.push(one_mod);
      continue;
    }

    title_parts.push(arg.clone());
  }

  Ok((title_parts.join(" "), mods))
}

fn parse_one_mod(
  tok: &str,
  today: NaiveDate
) -> anyhow::Result<Option<Mod>> {
  if let Some(tag) =
    tok.strip_prefix('+')
    && !tag.is_empty()
  {
    return Ok(Some(Mod::TagAdd(
      tag.to_string()
    )));
  }
  if let Some(tag) =
    tok.strip_prefix('-')
    && !tag.is_empty()
    && !tag.starts_with('-')
  {
    return Ok(Some(Mod::TagRemove(
      tag.to_string()
    )));
  }

  let Some((key, value)) =
    tok.split_once(':')
  else {
    return Ok(None);
  };

  let key = key.to_ascii_lowercase();
  let cleared = value.is_empty()
    || value.eq_ignore_ascii_case("none");

  match key.as_str() {
    | "pri" | "priority" => {
      Ok(Some(Mod::Priority(
        value.parse()?
      )))
    }
    | "cat" | "category" => {
      Ok(Some(Mod::Category(
        (!cleared)
          .then(|| value.to_string())
      )))
    }
    | "due" => {
      let due = if cleared {
        None
      } else {
        Some(parse_due_expr(
          value, today
        )?)
      };
      Ok(Some(Mod::Due(due)))
    }
    | "desc" | "description" => {
      Ok(Some(Mod::Description(
        value.to_string()
      )))
    }
    | _ => Ok(None)
  }
}

/// Resolves a category token: a numeric
/// id, or a name matched without regard
/// to case.
pub(crate) fn resolve_category(
  categories: &[Category],
  token: &str
) -> anyhow::Result<CategoryId> {
  if let Ok(id) = token.parse::<u64>()
  {
    if categories
      .iter()
      .any(|c| c.id == id)
    {
      return Ok(id);
    }
    return Err(anyhow!(
      "category {id} not found"
    ));
  }

  let wanted = token.to_lowercase();
  categories
    .iter()
    .find(|c| {
      c.name.to_lowercase() == wanted
    })
    .map(|c| c.id)
    .ok_or_else(|| {
      anyhow!(
        "no category named {token}"
      )
    })
}

pub(crate) fn apply_mods(
  draft: &mut TaskDraft,
  mods: &[Mod],
  categories: &[Category]
) -> anyhow::Result<()> {
  for one_mod in mods {
    match one_mod {
      | Mod::TagAdd(tag) => {
        if !has_tag(draft, tag) {
          draft.toggle_tag(tag);
        }
      }
      | Mod::TagRemove(tag) => {
        if has_tag(draft, tag) {
          draft.toggle_tag(tag);
        } else {
          warn!(tag = %tag, "tag not present; nothing to remove");
        }
      }
      | Mod::Priority(priority) => {
        draft.priority = *priority;
      }
      | Mod::Category(None) => {
        draft.category_id = None;
      }
      | Mod::Category(Some(token)) => {
        draft.category_id =
          Some(resolve_category(
            categories, token
          )?);
      }
      | Mod::Due(due) => {
        draft.due_date = *due;
      }
      | Mod::Description(text) => {
        draft.description =
          text.clone();
      }
    }
  }

  Ok(())
}

fn has_tag(
  draft: &TaskDraft,
  tag: &str
) -> bool {
  draft
    .tags
    .iter()
    .any(|existing| existing == tag)
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    Mod,
    apply_mods,
    parse_title_and_mods,
    resolve_category
  };
  use crate::task::{
    Category,
    Priority
  };
  use crate::validate::TaskDraft;

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 16)
      .unwrap()
  }

  fn words(s: &str) -> Vec<String> {
    s.split_whitespace()
      .map(str::to_string)
      .collect()
  }

  fn categories() -> Vec<Category> {
    let now = Utc
      .with_ymd_and_hms(2025, 7, 1, 0, 0, 0)
      .unwrap();
    vec![
      Category::new(
        1,
        "Work".into(),
        "#3B82F6".into(),
        now
      ),
      Category::new(
        2,
        "Health".into(),
        "#EF4444".into(),
        now
      ),
    ]
  }

  #[test]
  fn splits_title_from_modifiers() {
    let (title, mods) =
      parse_title_and_mods(
        &words(
          "Meet at 10:30 pri:high \
           cat:work due:tomorrow +client"
        ),
        today()
      )
      .expect("parse");

    assert_eq!(title, "Meet at 10:30");
    assert_eq!(mods, vec![
      Mod::Priority(Priority::High),
      Mod::Category(Some(
        "work".into()
      )),
      Mod::Due(NaiveDate::from_ymd_opt(
        2025, 7, 17
      )),
      Mod::TagAdd("client".into()),
    ]);
  }

  #[test]
  fn double_dash_makes_the_rest_literal()
  {
    let (title, mods) =
      parse_title_and_mods(
        &words("-- +not a:tag"),
        today()
      )
      .expect("parse");
    assert_eq!(title, "+not a:tag");
    assert!(mods.is_empty());
  }

  #[test]
  fn bad_values_are_errors() {
    assert!(
      parse_title_and_mods(
        &words("x pri:urgent"),
        today()
      )
      .is_err()
    );
    assert!(
      parse_title_and_mods(
        &words("x due:someday"),
        today()
      )
      .is_err()
    );
  }

  #[test]
  fn mods_edit_a_draft() {
    let mut draft = TaskDraft {
      title: "t".into(),
      tags: vec!["old".into()],
      ..TaskDraft::default()
    };
    let (_, mods) = parse_title_and_mods(
      &words(
        "cat:2 -old +new due:none \
         desc:checkup"
      ),
      today()
    )
    .expect("parse");

    apply_mods(&mut draft, &mods, &categories())
      .expect("apply");
    assert_eq!(draft.category_id, Some(2));
    assert_eq!(draft.tags, vec!["new"]);
    assert_eq!(draft.due_date, None);
    assert_eq!(draft.description, "checkup");
  }

  #[test]
  fn categories_resolve_by_id_or_name() {
    let cats = categories();
    assert_eq!(
      resolve_category(&cats, "HEALTH")
        .unwrap(),
      2
    );
    assert_eq!(
      resolve_category(&cats, "1").unwrap(),
      1
    );
    assert!(
      resolve_category(&cats, "9").is_err()
    );
    assert!(
      resolve_category(&cats, "Home")
        .is_err()
    );
  }

  #[test]
  fn repeated_tag_mods_are_idempotent() {
    let mut draft = TaskDraft {
      title: "t".into(),
      tags: vec!["client".into()],
      ..TaskDraft::default()
    };
    let (_, mods) = parse_title_and_mods(
      &words(
        "+client +urgent +urgent \
         -missing"
      ),
      today()
    )
    .expect("parse");

    apply_mods(&mut draft, &mods, &categories())
      .expect("apply");
    assert_eq!(draft.tags, vec![
      "client", "urgent"
    ]);
  }
}
