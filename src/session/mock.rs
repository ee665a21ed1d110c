//! Scripted session platform for testing and demos
//!
//! Plays back queued matches. Participants are present exactly while a
//! scripted match is waiting to be played, unless participant counts are
//! scripted explicitly.

use crate::error::{RankingError, Result};
use crate::session::platform::SessionPlatform;
use crate::session::results::{MatchRoster, ReportedScore};
use crate::types::{JoinReference, LIVE_JOIN_REFERENCE};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// A match the mock platform will play
#[derive(Debug, Clone)]
pub struct ScriptedMatch {
    pub roster: MatchRoster,
    pub reports: Vec<ReportedScore>,
}

/// In-memory [`SessionPlatform`] that plays back scripted matches
#[derive(Debug)]
pub struct MockSessionPlatform {
    state: Mutex<MockPlatformState>,
}

#[derive(Debug)]
struct MockPlatformState {
    connected: bool,
    connection_checks_left: Option<u32>,
    participant_counts: VecDeque<usize>,
    matches: VecDeque<ScriptedMatch>,
    current: Option<ScriptedMatch>,
    match_length_polls: u32,
    polls_left: u32,
    notices: Vec<String>,
    created_sessions: Vec<bool>,
    matches_started: usize,
    resets: usize,
}

impl Default for MockSessionPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSessionPlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockPlatformState {
                connected: true,
                connection_checks_left: None,
                participant_counts: VecDeque::new(),
                matches: VecDeque::new(),
                current: None,
                match_length_polls: 2,
                polls_left: 0,
                notices: Vec::new(),
                created_sessions: Vec::new(),
                matches_started: 0,
                resets: 0,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockPlatformState>> {
        self.state.lock().map_err(|_| {
            RankingError::InternalError {
                message: "Failed to acquire mock platform lock".to_string(),
            }
            .into()
        })
    }

    /// Queue a match to be played once enough participants are "present"
    pub fn queue_match(&self, roster: MatchRoster, reports: Vec<ReportedScore>) {
        if let Ok(mut state) = self.lock() {
            state.matches.push_back(ScriptedMatch { roster, reports });
        }
    }

    /// Answer the next participant checks with these counts, in order
    pub fn script_participant_counts(&self, counts: impl IntoIterator<Item = usize>) {
        if let Ok(mut state) = self.lock() {
            state.participant_counts.extend(counts);
        }
    }

    /// Number of "still running" polls before a started match ends
    pub fn set_match_length(&self, polls: u32) {
        if let Ok(mut state) = self.lock() {
            state.match_length_polls = polls;
        }
    }

    pub fn set_connected(&self, connected: bool) {
        if let Ok(mut state) = self.lock() {
            state.connected = connected;
        }
    }

    /// Lose the connection after this many successful connection checks
    pub fn disconnect_after_checks(&self, checks: u32) {
        if let Ok(mut state) = self.lock() {
            state.connection_checks_left = Some(checks);
        }
    }

    pub fn notices(&self) -> Vec<String> {
        self.lock()
            .map(|state| state.notices.clone())
            .unwrap_or_default()
    }

    /// The `live` flag of every session created so far
    pub fn created_sessions(&self) -> Vec<bool> {
        self.lock()
            .map(|state| state.created_sessions.clone())
            .unwrap_or_default()
    }

    pub fn matches_started(&self) -> usize {
        self.lock()
            .map(|state| state.matches_started)
            .unwrap_or_default()
    }

    pub fn pending_matches(&self) -> usize {
        self.lock()
            .map(|state| state.matches.len())
            .unwrap_or_default()
    }

    pub fn reset_count(&self) -> usize {
        self.lock().map(|state| state.resets).unwrap_or_default()
    }
}

impl SessionPlatform for MockSessionPlatform {
    fn create_session(&self, live: bool) -> Result<JoinReference> {
        let mut state = self.lock()?;
        state.created_sessions.push(live);

        if live {
            Ok(LIVE_JOIN_REFERENCE.to_string())
        } else {
            Ok(format!(
                "https://sessions.example/room/{}",
                state.created_sessions.len()
            ))
        }
    }

    fn participant_count(&self) -> Result<usize> {
        let mut state = self.lock()?;
        if let Some(count) = state.participant_counts.pop_front() {
            return Ok(count);
        }
        Ok(state
            .matches
            .front()
            .map(|scripted| scripted.roster.len())
            .unwrap_or(0))
    }

    fn start_match(&self) -> Result<MatchRoster> {
        let mut state = self.lock()?;
        let scripted = state
            .matches
            .pop_front()
            .ok_or_else(|| RankingError::DriverFault {
                message: "No scripted match to start".to_string(),
            })?;

        let roster = scripted.roster.clone();
        state.current = Some(scripted);
        state.polls_left = state.match_length_polls;
        state.matches_started += 1;
        Ok(roster)
    }

    fn has_match_ended(&self) -> Result<bool> {
        let mut state = self.lock()?;
        if state.polls_left == 0 {
            return Ok(true);
        }
        state.polls_left -= 1;
        Ok(false)
    }

    fn fetch_results(&self) -> Result<Vec<ReportedScore>> {
        let mut state = self.lock()?;
        state
            .current
            .take()
            .map(|scripted| scripted.reports)
            .ok_or_else(|| {
                RankingError::DriverFault {
                    message: "No match has been played".to_string(),
                }
                .into()
            })
    }

    fn check_connection(&self) -> Result<()> {
        let mut state = self.lock()?;
        let checks_left = state.connection_checks_left;
        match checks_left {
            Some(0) => state.connected = false,
            Some(left) => state.connection_checks_left = Some(left - 1),
            None => {}
        }

        if state.connected {
            Ok(())
        } else {
            Err(RankingError::Disconnected {
                message: "Mock platform connection lost".to_string(),
            }
            .into())
        }
    }

    fn send_notice(&self, text: &str) -> Result<()> {
        self.lock()?.notices.push(text.to_string());
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.resets += 1;
        state.connected = true;
        state.connection_checks_left = None;
        state.current = None;
        Ok(())
    }
}
