//! State machines from spec §4.6.

/// Process registry entry lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Absent,
    Spawning,
    Running,
    Defunct,
}

impl ProcessState {
    pub fn on_authenticated_request(self) -> ProcessState {
        match self {
            ProcessState::Absent => ProcessState::Spawning,
            other => other,
        }
    }

    pub fn on_spawned(self) -> ProcessState {
        match self {
            ProcessState::Spawning => ProcessState::Running,
            other => other,
        }
    }

    pub fn on_session_expired(self) -> ProcessState {
        match self {
            ProcessState::Running => ProcessState::Defunct,
            other => other,
        }
    }

    pub fn on_reaped(self) -> ProcessState {
        match self {
            ProcessState::Defunct => ProcessState::Absent,
            other => other,
        }
    }
}

/// Image buffer entry lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    EmptyWriting,
    ReadyReading,
    Idle,
    Evicting,
}

impl BufferState {
    pub fn on_populated(self) -> BufferState {
        match self {
            BufferState::EmptyWriting => BufferState::ReadyReading,
            other => other,
        }
    }

    pub fn on_last_reader_released(self) -> BufferState {
        match self {
            BufferState::ReadyReading => BufferState::Idle,
            other => other,
        }
    }

    /// Compaction may only move an `Idle` entry to eviction.
    pub fn try_evict(self) -> Result<BufferState, BufferState> {
        match self {
            BufferState::Idle => Ok(BufferState::Evicting),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_lifecycle() {
        let s = ProcessState::Absent;
        let s = s.on_authenticated_request();
        assert_eq!(s, ProcessState::Spawning);
        let s = s.on_spawned();
        assert_eq!(s, ProcessState::Running);
        let s = s.on_session_expired();
        assert_eq!(s, ProcessState::Defunct);
        let s = s.on_reaped();
        assert_eq!(s, ProcessState::Absent);
    }

    #[test]
    fn buffer_eviction_requires_idle() {
        assert!(BufferState::ReadyReading.try_evict().is_err());
        assert_eq!(BufferState::Idle.try_evict(), Ok(BufferState::Evicting));
    }
}
