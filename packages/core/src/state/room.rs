// Состояние комнаты relay
// Какая комната занята, в какую идёт вход, куда уйти при переполнении

use crate::config::Config;
use rand::Rng;

/// Номер комнаты на relay
pub type RoomId = u32;

/// Состояние подключения к комнате
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Outside,
    Joining(RoomId),
    Joined(RoomId),
}

#[derive(Debug, Clone)]
pub struct RoomTracker {
    state: RoomState,
}

impl Default for RoomTracker {
    fn default() -> Self {
        Self {
            state: RoomState::Outside,
        }
    }
}

impl RoomTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn current(&self) -> Option<RoomId> {
        match self.state {
            RoomState::Joined(room) => Some(room),
            _ => None,
        }
    }

    /// Запросить вход в комнату
    pub fn request(&mut self, room: RoomId) -> RoomId {
        self.state = RoomState::Joining(room);
        room
    }

    /// Relay подтвердил вход. Возвращает `true`, если комната сменилась.
    pub fn joined(&mut self, room: RoomId) -> bool {
        let changed = self.current() != Some(room);
        self.state = RoomState::Joined(room);
        changed
    }

    /// Комната переполнена: выбрать случайную другую из `0..room_count`
    pub fn fallback(&mut self, full: RoomId) -> RoomId {
        let room_count = Config::global().room_count.max(1);
        let mut rng = rand::thread_rng();
        let mut room = rng.gen_range(0..room_count);
        if room_count > 1 {
            while room == full {
                room = rng.gen_range(0..room_count);
            }
        }
        tracing::info!(target: "state::room", full, fallback = room, "Room full, moving");
        self.request(room)
    }
}
