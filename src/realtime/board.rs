//! Live sensor board: latest reading per sensor plus recent live alerts,
//! fed by a realtime subscription.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::Serialize;

use super::frame::{RealtimeEvent, RealtimeMessage};
use super::hub::{RealtimeHub, Subscription};
use crate::models::{Alert, LiveReading};

// ---

/// Live alerts kept on the board, newest first.
pub const DEFAULT_ALERT_CAPACITY: usize = 50;

#[derive(Debug, Default)]
struct BoardState {
    readings: BTreeMap<String, LiveReading>,
    alerts: VecDeque<Alert>,
}

/// Point-in-time copy of the board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSnapshot {
    pub readings: Vec<LiveReading>,
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone)]
pub struct SensorBoard {
    state: Arc<Mutex<BoardState>>,
    alert_capacity: usize,
}

impl Default for SensorBoard {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_CAPACITY)
    }
}

impl SensorBoard {
    pub fn new(alert_capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BoardState::default())),
            alert_capacity: alert_capacity.max(1),
        }
    }

    /// Feed the board from `hub` for as long as the returned subscription lives.
    pub fn attach(&self, hub: &RealtimeHub) -> Subscription {
        let board = self.clone();
        hub.subscribe(move |message| board.apply(message))
    }

    /// Readings overwrite the previous value for their sensor; alerts go to
    /// the front, replacing an older copy with the same id.
    pub fn apply(&self, message: &RealtimeMessage) {
        // ---
        let mut state = self.lock();
        match &message.event {
            RealtimeEvent::Reading(reading) => {
                state.readings.insert(reading.sensor_id.clone(), reading.clone());
            }
            RealtimeEvent::Alert(alert) => {
                state.alerts.retain(|a| a.id != alert.id);
                state.alerts.push_front(alert.clone());
                state.alerts.truncate(self.alert_capacity);
            }
            RealtimeEvent::Other { .. } => {}
        }
    }

    pub fn latest(&self, sensor_id: &str) -> Option<LiveReading> {
        self.lock().readings.get(sensor_id).cloned()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        // ---
        let state = self.lock();
        BoardSnapshot {
            readings: state.readings.values().cloned().collect(),
            alerts: state.alerts.iter().cloned().collect(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
