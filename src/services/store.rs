use crate::models::meeting::{Meeting, MeetingId};

/// Ordered in-memory collection of every known meeting, canceled ones
/// included. Records are kept sorted by start time and never removed.
#[derive(Debug, Default, Clone)]
pub struct EventStore {
    meetings: Vec<Meeting>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sort(&mut self) {
        self.meetings.sort_by_key(|meeting| meeting.start);
    }

    pub fn all(&self) -> &[Meeting] {
        &self.meetings
    }

    pub fn get(&self, id: MeetingId) -> Option<&Meeting> {
        self.meetings.iter().find(|meeting| meeting.id == id)
    }

    /// Replace the record with the same id, or append it.
    pub fn upsert(&mut self, meeting: Meeting) {
        match self.meetings.iter_mut().find(|existing| existing.id == meeting.id) {
            Some(existing) => *existing = meeting,
            None => self.meetings.push(meeting),
        }
        self.sort();
    }

    /// Swap the whole collection, as after a fresh fetch from the data store.
    pub fn replace_all(&mut self, meetings: Vec<Meeting>) {
        self.meetings = meetings;
        self.sort();
    }
}
