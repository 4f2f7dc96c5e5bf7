use std::collections::VecDeque;

use crate::model::GameEvent;

/// Work items for the control thread. Ticks and discrete events share one
/// queue so they are processed strictly in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    Tick,
    Event(GameEvent),
}

impl From<GameEvent> for Task {
    fn from(event: GameEvent) -> Self {
        Task::Event(event)
    }
}

#[derive(Debug, Default)]
pub struct TaskQueue {
    pending: VecDeque<Task>,
    processed: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: Task) {
        self.pending.push_back(task);
    }

    pub fn next(&mut self) -> Option<Task> {
        let task = self.pending.pop_front()?;
        self.processed += 1;
        Some(task)
    }

    pub fn peek(&self) -> Option<&Task> {
        self.pending.front()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::{Task, TaskQueue};
    use crate::model::fixtures::champion;
    use crate::model::{GameEvent, TeamId};

    #[test]
    fn queue_preserves_arrival_order() {
        let mover = GameEvent::MoveCreate {
            actor: champion(2, "Annie", TeamId::CHAOS),
        };
        let mut queue = TaskQueue::new();
        queue.push(Task::Tick);
        queue.push(mover.clone().into());
        queue.push(Task::Tick);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek(), Some(&Task::Tick));

        let mut drained = Vec::new();
        while let Some(task) = queue.next() {
            drained.push(task);
        }

        assert!(queue.is_empty());
        assert_eq!(drained, vec![Task::Tick, Task::Event(mover), Task::Tick]);
        assert_eq!(queue.processed(), 3);
    }

    #[test]
    fn clear_drops_pending_without_counting() {
        let mut queue = TaskQueue::new();
        queue.push(Task::Tick);
        queue.push(Task::Tick);
        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.processed(), 0);
        assert!(queue.next().is_none());
    }
}
