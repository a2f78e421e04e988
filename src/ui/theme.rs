//! Team color palettes.
//!
//! The `team` identifier only ever affects colors. Known team names map to a
//! fixed palette; any other identifier is hashed onto one, so a given team
//! always gets the same colors.

use ratatui::style::Color;
use std::time::Duration;

/// Colors used by the recording screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    /// Waveform bars and highlights
    pub accent: Color,
    pub background: Color,
    pub foreground: Color,
    /// Padding bars and help text
    pub muted: Color,
}

const DEFAULT: Theme = Theme {
    accent: Color::Rgb(206, 224, 220),
    background: Color::Rgb(0, 0, 0),
    foreground: Color::Rgb(185, 207, 212),
    muted: Color::Rgb(90, 100, 104),
};

const PALETTES: [(&str, Theme); 5] = [
    (
        "red",
        Theme {
            accent: Color::Rgb(239, 83, 80),
            ..DEFAULT
        },
    ),
    (
        "blue",
        Theme {
            accent: Color::Rgb(66, 165, 245),
            ..DEFAULT
        },
    ),
    (
        "green",
        Theme {
            accent: Color::Rgb(102, 187, 106),
            ..DEFAULT
        },
    ),
    (
        "orange",
        Theme {
            accent: Color::Rgb(255, 167, 38),
            ..DEFAULT
        },
    ),
    (
        "purple",
        Theme {
            accent: Color::Rgb(171, 71, 188),
            ..DEFAULT
        },
    ),
];

/// Recordings past this length show the timer in the warning color.
const TIMER_WARN_AFTER: Duration = Duration::from_secs(60);
/// Recordings past this length show the timer in red.
const TIMER_ALERT_AFTER: Duration = Duration::from_secs(120);

impl Default for Theme {
    fn default() -> Self {
        DEFAULT
    }
}

impl Theme {
    pub fn for_team(team: &str) -> Self {
        let team = team.trim().to_lowercase();
        if team.is_empty() || team == "default" {
            return DEFAULT;
        }
        if let Some((_, theme)) = PALETTES.iter().find(|(name, _)| *name == team) {
            return *theme;
        }
        // FNV-1a, stable across runs and platforms.
        let hash = team.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
            (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
        });
        PALETTES[(hash % PALETTES.len() as u64) as usize].1
    }

    /// Color of the elapsed-time display.
    pub fn timer_color(&self, elapsed: Duration) -> Color {
        if elapsed >= TIMER_ALERT_AFTER {
            Color::Red
        } else if elapsed >= TIMER_WARN_AFTER {
            Color::Yellow
        } else {
            self.foreground
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_teams_get_their_palette() {
        assert_eq!(Theme::for_team("Blue").accent, Color::Rgb(66, 165, 245));
        assert_eq!(Theme::for_team("default"), Theme::default());
        assert_eq!(Theme::for_team(""), Theme::default());
    }

    #[test]
    fn test_unknown_team_is_stable() {
        let first = Theme::for_team("falcons");
        assert_eq!(first, Theme::for_team("falcons"));
        assert!(PALETTES.iter().any(|(_, theme)| *theme == first));
    }

    #[test]
    fn test_timer_color_thresholds() {
        let theme = Theme::default();
        assert_eq!(theme.timer_color(Duration::from_secs(10)), theme.foreground);
        assert_eq!(theme.timer_color(Duration::from_secs(61)), Color::Yellow);
        assert_eq!(theme.timer_color(Duration::from_secs(300)), Color::Red);
    }
}
