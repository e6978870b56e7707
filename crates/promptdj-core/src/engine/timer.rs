//! Cancellable deferred tasks on the output clock

/// Handle for cancelling a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

#[derive(Debug)]
struct Scheduled<T> {
    id: TaskId,
    due: f64,
    task: T,
}

/// Tasks due at a time, fired by polling
#[derive(Debug)]
pub struct TaskQueue<T> {
    tasks: Vec<Scheduled<T>>,
    next_id: u64,
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 0,
        }
    }

    pub fn schedule(&mut self, due: f64, task: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.push(Scheduled { id, due, task });
        id
    }

    /// Cancel a task; returns whether it was still pending
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Remove and return every task due at or before `now`, earliest first
    pub fn take_due(&mut self, now: f64) -> Vec<(TaskId, T)> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.tasks.drain(..).partition(|t| t.due <= now);
        self.tasks = pending;
        due.sort_by(|a, b| a.due.total_cmp(&b.due));
        due.into_iter().map(|t| (t.id, t.task)).collect()
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_tasks_in_order() {
        let mut queue = TaskQueue::new();
        queue.schedule(3.0, "c");
        queue.schedule(1.0, "a");
        queue.schedule(2.0, "b");

        let due: Vec<_> = queue.take_due(2.5).into_iter().map(|(_, t)| t).collect();
        assert_eq!(due, vec!["a", "b"]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_cancelled_task_never_fires() {
        let mut queue = TaskQueue::new();
        let id = queue.schedule(1.0, ());
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));
        assert!(queue.take_due(5.0).is_empty());
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut queue = TaskQueue::new();
        let first = queue.schedule(1.0, ());
        queue.take_due(1.0);
        let second = queue.schedule(1.0, ());
        assert_ne!(first, second);
        assert!(!queue.is_pending(first));
        assert!(queue.is_pending(second));
    }
}
