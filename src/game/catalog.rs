use serde::Serialize;
use std::fmt;

/// One slot of a rhythm pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Beat {
    Clap,
    Stamp,
    Pause,
}

impl Beat {
    /// The tap that reproduces this beat, `None` for a pause.
    pub fn action(self) -> Option<Action> {
        match self {
            Beat::Clap => Some(Action::Clap),
            Beat::Stamp => Some(Action::Stamp),
            Beat::Pause => None,
        }
    }
}

/// What the player can tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Clap,
    Stamp,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Clap => write!(f, "clap"),
            Action::Stamp => write!(f, "stamp"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct RhythmPattern {
    pub id: u8,
    pub name: &'static str,
    pub beats: &'static [Beat],
    pub difficulty: u8,
    pub character: &'static str,
    pub character_color: &'static str,
}

impl RhythmPattern {
    /// Beats with pauses dropped, i.e. what the player must tap.
    pub fn expected_actions(&self) -> Vec<Action> {
        self.beats.iter().filter_map(|beat| beat.action()).collect()
    }
}

/// Game level, always within `1..=Level::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Level(u8);

impl Level {
    pub const MAX: u8 = 5;
    pub const FIRST: Level = Level(1);
    pub const LAST: Level = Level(Self::MAX);

    pub fn new(value: u8) -> Option<Self> {
        (1..=Self::MAX).contains(&value).then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// The following level, `None` once the last one is reached.
    pub fn next(self) -> Option<Self> {
        Self::new(self.0 + 1)
    }

    fn index(self) -> usize {
        self.0 as usize - 1
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static CATALOG: [RhythmPattern; Level::MAX as usize] = [
    RhythmPattern {
        id: 1,
        name: "Simple Clap",
        beats: &[Beat::Clap, Beat::Pause, Beat::Clap, Beat::Pause],
        difficulty: 1,
        character: "🎵",
        character_color: "#FF6B6B",
    },
    RhythmPattern {
        id: 2,
        name: "Quick Claps",
        beats: &[Beat::Clap, Beat::Clap, Beat::Pause, Beat::Clap],
        difficulty: 2,
        character: "🎼",
        character_color: "#4ECDC4",
    },
    RhythmPattern {
        id: 3,
        name: "Clap & Stamp",
        beats: &[Beat::Clap, Beat::Stamp, Beat::Clap, Beat::Pause],
        difficulty: 3,
        character: "🎶",
        character_color: "#45B7D1",
    },
    RhythmPattern {
        id: 4,
        name: "Complex Mix",
        beats: &[Beat::Clap, Beat::Clap, Beat::Stamp, Beat::Pause, Beat::Clap],
        difficulty: 4,
        character: "🎤",
        character_color: "#96CEB4",
    },
    RhythmPattern {
        id: 5,
        name: "Master Beat",
        beats: &[Beat::Clap, Beat::Stamp, Beat::Clap, Beat::Stamp, Beat::Clap],
        difficulty: 5,
        character: "🌟",
        character_color: "#FFEAA7",
    },
];

/// Number of easy patterns Simon Says draws from.
const SIMON_POOL_SIZE: usize = 3;

pub fn get(level: Level) -> &'static RhythmPattern {
    &CATALOG[level.index()]
}

pub fn all() -> &'static [RhythmPattern] {
    &CATALOG
}

pub fn simon_pool() -> &'static [RhythmPattern] {
    &CATALOG[..SIMON_POOL_SIZE]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_map_to_catalog_entries() {
        for value in 1..=Level::MAX {
            let level = Level::new(value).unwrap();
            let pattern = get(level);
            assert_eq!(pattern.id, value);
            assert_eq!(pattern.difficulty, value);
        }
    }

    #[test]
    fn test_level_bounds() {
        assert!(Level::new(0).is_none());
        assert!(Level::new(6).is_none());
        assert_eq!(Level::FIRST.next(), Level::new(2));
        assert!(Level::LAST.next().is_none());
    }

    #[test]
    fn test_expected_actions_drop_pauses() {
        for pattern in all() {
            let non_pause = pattern
                .beats
                .iter()
                .filter(|beat| **beat != Beat::Pause)
                .count();
            assert_eq!(pattern.expected_actions().len(), non_pause);
        }

        assert_eq!(
            get(Level::FIRST).expected_actions(),
            vec![Action::Clap, Action::Clap]
        );
    }

    #[test]
    fn test_difficulty_strictly_increases() {
        assert!(all().windows(2).all(|w| w[0].difficulty < w[1].difficulty));
    }

    #[test]
    fn test_simon_pool_is_easy_patterns() {
        let ids: Vec<u8> = simon_pool().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
