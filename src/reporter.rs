use chrono::Utc;
use tracing::info;

use crate::events::{Event, format_duration};
use crate::model::Operation;

/// Reporter renders events and task listings as human or JSON output.
pub struct Reporter {
    json_mode: bool,
    reported: usize,
}

impl Reporter {
    pub fn new(json_mode: bool) -> Self {
        Self {
            json_mode,
            reported: 0,
        }
    }

    /// Report one event. `remaining` is the number of unfinished tasks.
    pub fn event(&mut self, event: &Event, remaining: usize, watched: bool) {
        if self.json_mode {
            if let Ok(mut value) = serde_json::to_value(event) {
                value["remaining"] = remaining.into();
                value["watched"] = watched.into();
                println!("{}", value);
            }
        } else {
            info!(
                kind = %event.kind(),
                watched,
                "[{}] {}",
                event.title(),
                event_line(event, remaining)
            );
        }
        self.reported += 1;
    }

    /// Print the task listing, newest active first.
    pub fn tasks(&self, tasks: &[Operation], max_tasks: usize) {
        if self.json_mode {
            let shown = &tasks[..tasks.len().min(max_tasks)];
            if let Ok(line) = serde_json::to_string(shown) {
                println!("{}", line);
            }
        } else {
            print!("{}", task_table(tasks, max_tasks));
        }
    }

    pub fn summary(&self) -> String {
        format!("{} events reported", self.reported)
    }
}

/// Event message, with the remaining task count appended for terminal
/// events. Only the console line carries the count; notifications get
/// [`Event::message`] unchanged.
pub fn event_line(event: &Event, remaining: usize) -> String {
    let message = event.message();
    if event.is_terminal() {
        format!("{message} ({remaining} tasks remaining)")
    } else {
        message
    }
}

/// Plain-text table of tasks.
pub fn task_table(tasks: &[Operation], max_tasks: usize) -> String {
    let now = Utc::now();
    let mut out = format!(
        "{:>10}  {:<40}  {:>12}  {:>12}\n",
        "STATE", "DESCRIPTION", "CREATED", "ELAPSED"
    );
    for task in tasks.iter().take(max_tasks) {
        let created = format!("{} ago", format_duration(now - task.metadata.create_time));
        out.push_str(&format!(
            "{:>10}  {:<40}  {:>12}  {:>12}\n",
            task.state().as_str(),
            truncate(task.description(), 40),
            created,
            format_duration(task.time_elapsed())
        ));
    }
    if tasks.is_empty() {
        out.push_str("No tasks found.\n");
    } else if tasks.len() > max_tasks {
        out.push_str(&format!("... {} more\n", tasks.len() - max_tasks));
    }
    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
