use clap::ValueEnum;
use log::debug;
use serde::{ Deserialize, Serialize };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    System,
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

/// Guesses the terminal background from `COLORFGBG` ("fg;bg", as set by
/// rxvt, Konsole and friends). Background colours 0-6 and 8 are dark.
pub fn detect_system_theme(colorfgbg: Option<&str>) -> Theme {
    let bg = colorfgbg
        .and_then(|value| value.rsplit(';').next())
        .and_then(|bg| bg.trim().parse::<u8>().ok());
    match bg {
        Some(7) | Some(9..=15) => Theme::Light,
        _ => Theme::Dark,
    }
}

#[derive(Debug, Clone)]
pub struct ThemeState {
    preference: ThemePreference,
    current: Theme,
}

impl ThemeState {
    pub fn init(preference: ThemePreference, system: Theme) -> Self {
        let current = match preference {
            ThemePreference::System => system,
            ThemePreference::Light => Theme::Light,
            ThemePreference::Dark => Theme::Dark,
        };
        debug!("Theme initialised: preference={:?}, resolved={}", preference, current.label());
        Self { preference, current }
    }

    pub fn from_env(preference: ThemePreference) -> Self {
        let colorfgbg = std::env::var("COLORFGBG").ok();
        Self::init(preference, detect_system_theme(colorfgbg.as_deref()))
    }

    pub fn current(&self) -> Theme {
        self.current
    }

    pub fn preference(&self) -> ThemePreference {
        self.preference
    }

    /// Flips the active theme. An explicit choice stops tracking the system.
    pub fn toggle(&mut self) -> Theme {
        self.current = self.current.toggled();
        self.preference = match self.current {
            Theme::Light => ThemePreference::Light,
            Theme::Dark => ThemePreference::Dark,
        };
        self.current
    }
}
