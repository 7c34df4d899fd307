//! Broadcasting "searchables changed" to interested listeners
use crossbeam_channel::{Receiver, Sender, unbounded};
use log::debug;
use parking_lot::Mutex;
use std::fmt;

/// Payload-free notification tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announcement {
    SearchablesChanged,
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Announcement::SearchablesChanged => write!(f, "searchables-changed"),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait Announcer: Send + Sync {
    fn announce(&self, announcement: Announcement);
}

/// Fans announcements out to every live listener channel.
#[derive(Default)]
pub struct ChannelAnnouncer {
    listeners: Mutex<Vec<Sender<Announcement>>>,
}

impl ChannelAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen(&self) -> Receiver<Announcement> {
        let (sender, receiver) = unbounded();
        self.listeners.lock().push(sender);
        receiver
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl Announcer for ChannelAnnouncer {
    fn announce(&self, announcement: Announcement) {
        let mut listeners = self.listeners.lock();
        // Listeners that dropped their receiver are forgotten.
        listeners.retain(|listener| listener.send(announcement).is_ok());
        debug!("Announced {} to {} listener(s)", announcement, listeners.len());
    }
}
