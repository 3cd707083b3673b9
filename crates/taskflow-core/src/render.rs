use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_iso_timestamp;
use crate::saved::SavedSearch;
use crate::stats::{CategoryStats, Facets};
use crate::task::{Category, Priority, Task, Workspace};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    /// One row per visible task; `#` is the position used by `move`.
    #[tracing::instrument(skip(self, tasks, ws, today))]
    pub fn print_task_table(
        &mut self,
        tasks: &[&Task],
        ws: &Workspace,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if tasks.is_empty() {
            writeln!(out, "No tasks found.")?;
            return Ok(());
        }

        let headers = ["#", "ID", "", "Pri", "Due", "Category", "Title", "Tags"]
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::with_capacity(tasks.len());
        for (pos, task) in tasks.iter().enumerate() {
            let mark = if task.completed { "[x]" } else { "[ ]" };

            let due = task
                .due_date
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            let due = match task.due_date {
                Some(date) if !task.completed && date < today => self.paint(&due, "31"),
                Some(date) if !task.completed && date == today => self.paint(&due, "33"),
                _ => due,
            };

            let title = if task.completed {
                self.paint(&task.title, "2")
            } else {
                task.title.clone()
            };

            rows.push(vec![
                pos.to_string(),
                self.paint(&task.id.to_string(), "33"),
                mark.to_string(),
                self.paint_priority(task.priority),
                due,
                ws.category_name(task.category_id).to_string(),
                title,
                format_tags(&task.tags),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task, ws))]
    pub fn print_task_info(&mut self, task: &Task, ws: &Workspace) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        if let Some(description) = &task.description {
            writeln!(out, "description {description}")?;
        }
        writeln!(
            out,
            "status      {}",
            if task.completed { "completed" } else { "active" }
        )?;
        writeln!(out, "priority    {}", task.priority)?;
        writeln!(out, "category    {}", ws.category_name(task.category_id))?;
        if let Some(due) = task.due_date {
            writeln!(out, "due         {}", due.format("%Y-%m-%d"))?;
        }
        if !task.tags.is_empty() {
            writeln!(out, "tags        {}", format_tags(&task.tags))?;
        }
        writeln!(out, "created     {}", format_iso_timestamp(task.created_at))?;
        if let Some(updated) = task.updated_at {
            writeln!(out, "updated     {}", format_iso_timestamp(updated))?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, categories))]
    pub fn print_categories(&mut self, categories: &[&Category]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if categories.is_empty() {
            writeln!(out, "No categories found.")?;
            return Ok(());
        }

        let headers = ["#", "ID", "Name", "Color", "Tasks", "Last used"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let rows = categories
            .iter()
            .enumerate()
            .map(|(pos, c)| {
                vec![
                    pos.to_string(),
                    self.paint(&c.id.to_string(), "33"),
                    c.name.clone(),
                    c.color.clone(),
                    c.task_count.to_string(),
                    c.last_used.format("%Y-%m-%d").to_string(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, saved))]
    pub fn print_saved_searches(&mut self, saved: &[SavedSearch]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if saved.is_empty() {
            writeln!(out, "No saved searches.")?;
            return Ok(());
        }

        let headers = ["ID", "Name", "Query", "Filters", "Created"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let rows = saved
            .iter()
            .map(|s| {
                vec![
                    self.paint(&s.id.to_string(), "33"),
                    s.name.clone(),
                    s.query.clone(),
                    s.filters.active_filter_count().to_string(),
                    s.created_at.format("%Y-%m-%d").to_string(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn print_recent(&mut self, recent: &[String]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if recent.is_empty() {
            writeln!(out, "No recent searches.")?;
        }
        for query in recent {
            writeln!(out, "{query}")?;
        }
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn print_stats(
        &mut self,
        facets: &Facets,
        category_stats: &CategoryStats<'_>,
        ws: &Workspace,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let counts = facets.counts;

        writeln!(out, "Tasks       {}", counts.total)?;
        writeln!(out, "Active      {}", counts.active)?;
        writeln!(out, "Completed   {}", counts.completed)?;
        writeln!(out, "Progress    {}%", counts.completion_percent())?;
        writeln!(out)?;

        for priority in Priority::ALL {
            writeln!(
                out,
                "{:<11} {}",
                format!("{priority}"),
                facets.priority(priority)
            )?;
        }
        writeln!(out)?;

        for (id, count) in &facets.by_category {
            writeln!(out, "{:<11} {count}", ws.category_name(Some(*id)))?;
        }
        writeln!(out)?;

        writeln!(out, "Categories  {}", category_stats.categories)?;
        writeln!(out, "Total tasks {}", category_stats.total_tasks)?;
        writeln!(
            out,
            "Most used   {}",
            category_stats
                .most_used
                .map(|c| c.name.as_str())
                .unwrap_or("-")
        )?;
        writeln!(out, "Average     {:.1}", category_stats.average_tasks)?;

        Ok(())
    }

    fn paint_priority(&self, priority: Priority) -> String {
        let code = match priority {
            Priority::High => "31",
            Priority::Medium => "33",
            Priority::Low => "32",
        };
        self.paint(priority.as_str(), code)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("+{tag}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| pad(header, *width))
        .collect();
    writeln!(writer, "{}", header_line.join(" ").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    writeln!(writer, "{}", rule.join(" "))?;

    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| pad(cell, *width))
            .collect();
        writeln!(writer, "{}", line.join(" ").trim_end())?;
    }

    Ok(())
}

fn pad(cell: &str, width: usize) -> String {
    let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
    format!("{cell}{}", " ".repeat(width.saturating_sub(visible_width)))
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{format_tags, strip_ansi, write_table};

    #[test]
    fn table_pads_by_display_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["ID".into(), "Title".into(), "Tags".into()],
            vec![
                vec!["1".into(), "Café ☕".into(), "+a".into()],
                vec!["\x1b[33m10\x1b[0m".into(), "x".into(), "".into()],
            ],
        )
        .expect("write");

        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ID Title   Tags");
        assert_eq!(lines[1], "-- ------- ----");
        assert_eq!(lines[2], "1  Café ☕ +a");
        assert_eq!(strip_ansi(lines[3]), "10 x");
    }

    #[test]
    fn tags_are_prefixed() {
        assert_eq!(format_tags(&["urgent".into(), "client".into()]), "+urgent +client");
        assert_eq!(format_tags(&[]), "");
    }
}
