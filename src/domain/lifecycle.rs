use crate::domain::codes::TaskStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub status: TaskStatus,
    pub completed_at: Option<String>,
}

/// Moves a task to `target`. Entering `done` stamps `now` unless the task was
/// already done with a completion time; leaving `done` keeps the old stamp.
pub fn transition(
    current: Option<TaskStatus>,
    completed_at: Option<&str>,
    target: TaskStatus,
    now: &str,
) -> Transition {
    let freshly_completed =
        target == TaskStatus::Done && (current != Some(TaskStatus::Done) || completed_at.is_none());

    Transition {
        status: target,
        completed_at: if freshly_completed {
            Some(now.to_string())
        } else {
            completed_at.map(ToOwned::to_owned)
        },
    }
}

/// Status requested through a raw status-update; unknown codes yield `None`
/// and the caller leaves the task untouched.
pub fn requested_status(value: &str) -> Option<TaskStatus> {
    TaskStatus::parse(value)
}

/// Start only applies to open tasks.
pub fn start(current: Option<TaskStatus>) -> Option<TaskStatus> {
    match current {
        Some(status) if status.is_open() => Some(TaskStatus::InProgress),
        _ => None,
    }
}
