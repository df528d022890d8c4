//! Dismissible operator notices.
//!
//! Failures caught at the panel boundary end up here instead of
//! propagating. Notices stay until dismissed; the oldest are dropped once
//! the backlog exceeds its capacity.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

impl NoticeLevel {
    /// Short tag for plain-text output.
    pub fn tag(self) -> &'static str {
        match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Notices {
    items: VecDeque<Notice>,
    next_id: u64,
    capacity: usize,
}

impl Default for Notices {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl Notices {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            next_id: 1,
            capacity: capacity.max(1),
        }
    }

    /// Add a notice and return its id.
    pub fn push(
        &mut self,
        level: NoticeLevel,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push_back(Notice {
            id,
            level,
            title: title.into(),
            message: message.into(),
            created_at: Utc::now(),
        });
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
        id
    }

    pub fn error(&mut self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.push(NoticeLevel::Error, title, message)
    }

    pub fn success(&mut self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.push(NoticeLevel::Success, title, message)
    }

    pub fn info(&mut self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.push(NoticeLevel::Info, title, message)
    }

    /// Remove a notice. Returns false if it was already gone.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }

    /// Oldest first.
    pub fn active(&self) -> Vec<Notice> {
        self.items.iter().cloned().collect()
    }

    /// Take every notice, leaving none.
    pub fn drain(&mut self) -> Vec<Notice> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
