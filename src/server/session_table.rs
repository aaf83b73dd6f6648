//! the sessions the server is currently rendering, one per source
//!
//! Lookup is a linear scan.  The table is capped at `max_sessions`, which is
//! small, and a new source is refused once the cap is hit.  Nobody gets kicked
//! out to make room.
use log::info;
use std::fmt;

use super::session::Session;
use crate::common::{config::ServerConfig, packet::SourceId};

pub struct SessionTable {
    sessions: Vec<Session>,
    config: ServerConfig,
    created: u64,
    removed: u64,
}

impl SessionTable {
    pub fn new(config: &ServerConfig) -> SessionTable {
        SessionTable {
            sessions: vec![],
            config: config.clone(),
            created: 0,
            removed: 0,
        }
    }
    pub fn num_sessions(&self) -> usize {
        self.sessions.len()
    }
    pub fn is_full(&self) -> bool {
        self.sessions.len() >= self.config.max_sessions
    }
    pub fn created(&self) -> u64 {
        self.created
    }
    pub fn removed(&self) -> u64 {
        self.removed
    }
    /// session for this source, making one if there is room
    pub fn resolve_or_create(&mut self, source: SourceId) -> Option<&mut Session> {
        match self.sessions.iter().position(|s| s.source() == source) {
            Some(idx) => self.sessions.get_mut(idx),
            None => {
                if self.is_full() {
                    return None;
                }
                info!("new session {} ({} active)", source, self.sessions.len() + 1);
                self.sessions.push(Session::new(source, &self.config));
                self.created += 1;
                self.sessions.last_mut()
            }
        }
    }
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.iter_mut()
    }
    /// take out every session that has terminated and hand them back
    pub fn remove_terminated(&mut self) -> Vec<Session> {
        if self.sessions.iter().all(|s| s.is_active()) {
            return vec![];
        }
        let (active, done): (Vec<Session>, Vec<Session>) =
            self.sessions.drain(..).partition(|s| s.is_active());
        self.sessions = active;
        for s in &done {
            info!("removed session {}: {:?}", s.source(), s.state());
        }
        self.removed += done.len() as u64;
        done
    }
    pub fn get_status(&self) -> serde_json::Value {
        let sessions: Vec<serde_json::Value> = self.sessions.iter().map(|s| s.get_status()).collect();
        serde_json::json!({
            "sessions": sessions,
        })
    }
}

impl fmt::Display for SessionTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[ ")?;
        for session in &self.sessions {
            write!(f, " {},", session)?;
        }
        write!(f, " ]")
    }
}
