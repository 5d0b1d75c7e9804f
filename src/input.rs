//! Line-oriented keyboard commands for the terminal player.

use crate::config::KeyBindings;
use once_cell::sync::Lazy;
use readaloud_core::SessionCommand;
use regex::Regex;
use std::path::PathBuf;

/// Speeds visited by the speed-up and speed-down keys.
pub const SPEED_STEPS: [f64; 4] = [0.75, 1.0, 1.25, 1.5];

static RE_VOICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:v|voice)\s+(\S+)$").unwrap());
static RE_EXPORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^export\s+(.+)$").unwrap());
static RE_SEEK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^seek\s+([+-]?\d+(?:\.\d+)?)$").unwrap());
static RE_SPEED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^speed\s+(\d+(?:\.\d+)?)$").unwrap());
static RE_PAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^page\s+(\d+)$").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerInput {
    Session(SessionCommand),
    SpeedUp,
    SpeedDown,
    Export(PathBuf),
    Status,
    Help,
    Quit,
}

/// Map one line of input to an action. A blank line is the space key.
pub fn parse_input(line: &str, keys: &KeyBindings) -> Option<PlayerInput> {
    let trimmed = line.trim();
    let key = if trimmed.is_empty() { "space" } else { trimmed };

    if key == keys.toggle_play_pause || key == "p" {
        return Some(PlayerInput::Session(SessionCommand::TogglePlayback));
    }
    if key == keys.quit {
        return Some(PlayerInput::Quit);
    }
    if key == keys.next_page || key == "right" {
        return Some(PlayerInput::Session(SessionCommand::NextPage));
    }
    if key == keys.prev_page || key == "left" {
        return Some(PlayerInput::Session(SessionCommand::PrevPage));
    }
    if key == keys.speed_up {
        return Some(PlayerInput::SpeedUp);
    }
    if key == keys.speed_down {
        return Some(PlayerInput::SpeedDown);
    }

    match key {
        "s" | "stop" => return Some(PlayerInput::Session(SessionCommand::Stop)),
        "status" => return Some(PlayerInput::Status),
        "h" | "help" | "?" => return Some(PlayerInput::Help),
        _ => {}
    }

    if let Some(caps) = RE_VOICE.captures(key) {
        return Some(PlayerInput::Session(SessionCommand::SetVoice {
            voice: caps[1].to_string(),
        }));
    }
    if let Some(caps) = RE_EXPORT.captures(key) {
        return Some(PlayerInput::Export(PathBuf::from(caps[1].trim())));
    }
    if let Some(caps) = RE_SEEK.captures(key) {
        let delta_secs = caps[1].parse().ok()?;
        return Some(PlayerInput::Session(SessionCommand::Seek { delta_secs }));
    }
    if let Some(caps) = RE_SPEED.captures(key) {
        let speed = caps[1].parse().ok()?;
        return Some(PlayerInput::Session(SessionCommand::ChangeSpeed { speed }));
    }
    if let Some(caps) = RE_PAGE.captures(key) {
        let page: usize = caps[1].parse().ok()?;
        return Some(PlayerInput::Session(SessionCommand::SetPage {
            page: page.saturating_sub(1),
        }));
    }
    None
}

/// Next step in [`SPEED_STEPS`] above or below `current`, staying put at the
/// ends.
pub fn step_speed(current: f64, up: bool) -> f64 {
    const EPS: f64 = 1e-6;
    let next = if up {
        SPEED_STEPS.iter().copied().find(|step| *step > current + EPS)
    } else {
        SPEED_STEPS.iter().rev().copied().find(|step| *step < current - EPS)
    };
    next.unwrap_or(current)
}

pub const HELP: &str = "\
keys: <enter>/space/p play-pause, s stop, n/right next page, b/left previous page,
      +/- speed, seek <secs>, speed <x>, page <n>, v <voice>, export <file.wav>,
      status, q quit";
