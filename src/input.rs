//! Command tokens and their resolution into pedal intents and discrete requests.

use heapless::Vec;
use serde::{Deserialize, Serialize};

/// Throttle falls by this much per tick once the accelerator is released.
pub const THROTTLE_RELEASE_PER_TICK: f64 = 0.1;
/// Brake releases faster than the throttle.
pub const BRAKE_RELEASE_PER_TICK: f64 = 0.2;

/// Distinct discrete requests that can be pending in one tick.
pub const MAX_PENDING_REQUESTS: usize = 12;

const ESC: char = '\u{1b}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandToken {
    Accelerate,
    Brake,
    StartStop,
    SelectDrive,
    SelectReverse,
    SelectNeutral,
    SelectPark,
    Quit,
    Handbrake,
    ToggleLights,
    ResetTrip,
    TurnLeft,
    TurnRight,
    Hazard,
    Unknown,
}

impl CommandToken {
    /// Maps a single keystroke, case-insensitively.
    pub fn from_key(key: char) -> Self {
        match key.to_ascii_uppercase() {
            'A' => CommandToken::Accelerate,
            'B' => CommandToken::Brake,
            'S' => CommandToken::StartStop,
            'D' => CommandToken::SelectDrive,
            'R' => CommandToken::SelectReverse,
            'N' => CommandToken::SelectNeutral,
            'P' => CommandToken::SelectPark,
            'Q' => CommandToken::Quit,
            ' ' => CommandToken::Handbrake,
            'L' => CommandToken::ToggleLights,
            'T' => CommandToken::ResetTrip,
            _ => CommandToken::Unknown,
        }
    }

    pub fn from_word(word: &str) -> Option<Self> {
        let token = match word.to_ascii_lowercase().as_str() {
            "accelerate" | "accel" | "throttle" => CommandToken::Accelerate,
            "brake" => CommandToken::Brake,
            "start" | "stop" | "ignition" => CommandToken::StartStop,
            "drive" => CommandToken::SelectDrive,
            "reverse" => CommandToken::SelectReverse,
            "neutral" => CommandToken::SelectNeutral,
            "park" => CommandToken::SelectPark,
            "quit" | "exit" => CommandToken::Quit,
            "handbrake" | "space" => CommandToken::Handbrake,
            "lights" => CommandToken::ToggleLights,
            "trip" | "reset-trip" => CommandToken::ResetTrip,
            "left" => CommandToken::TurnLeft,
            "right" => CommandToken::TurnRight,
            "hazard" => CommandToken::Hazard,
            _ => return None,
        };
        Some(token)
    }

    fn as_request(self) -> Option<DiscreteRequest> {
        match self {
            CommandToken::StartStop => Some(DiscreteRequest::StartStop),
            CommandToken::SelectDrive => Some(DiscreteRequest::SelectDrive),
            CommandToken::SelectReverse => Some(DiscreteRequest::SelectReverse),
            CommandToken::SelectNeutral => Some(DiscreteRequest::SelectNeutral),
            CommandToken::SelectPark => Some(DiscreteRequest::SelectPark),
            CommandToken::Quit => Some(DiscreteRequest::Quit),
            CommandToken::Handbrake => Some(DiscreteRequest::Handbrake),
            CommandToken::ToggleLights => Some(DiscreteRequest::ToggleLights),
            CommandToken::ResetTrip => Some(DiscreteRequest::ResetTrip),
            CommandToken::TurnLeft => Some(DiscreteRequest::TurnLeft),
            CommandToken::TurnRight => Some(DiscreteRequest::TurnRight),
            CommandToken::Hazard => Some(DiscreteRequest::Hazard),
            CommandToken::Accelerate | CommandToken::Brake | CommandToken::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscapeState {
    Idle,
    Escape,
    Bracket,
}

/// Turns a keystroke stream into tokens, including `ESC [ x` arrow sequences.
#[derive(Debug)]
pub struct KeyDecoder {
    state: EscapeState,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self { state: EscapeState::Idle }
    }

    /// Returns `None` while in the middle of an escape sequence.
    pub fn feed(&mut self, key: char) -> Option<CommandToken> {
        match self.state {
            EscapeState::Idle => {
                if key == ESC {
                    self.state = EscapeState::Escape;
                    None
                } else {
                    Some(CommandToken::from_key(key))
                }
            }
            EscapeState::Escape => {
                if key == '[' {
                    self.state = EscapeState::Bracket;
                    None
                } else {
                    self.state = EscapeState::Idle;
                    Some(CommandToken::Unknown)
                }
            }
            EscapeState::Bracket => {
                self.state = EscapeState::Idle;
                Some(match key {
                    'D' => CommandToken::TurnLeft,
                    'C' => CommandToken::TurnRight,
                    'A' => CommandToken::Hazard,
                    _ => CommandToken::Unknown,
                })
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == EscapeState::Idle
    }
}

impl Default for KeyDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes one line of operator input.
///
/// A line holding a single command word (`left`, `hazard`, ...) yields that
/// command; anything else is treated as raw keystrokes. A dangling escape
/// sequence at the end of the line yields `Unknown`.
pub fn parse_line(line: &str) -> alloc::vec::Vec<CommandToken> {
    let line = line.trim_end_matches(['\r', '\n']);
    if let Some(token) = CommandToken::from_word(line.trim()) {
        return alloc::vec![token];
    }

    let mut decoder = KeyDecoder::new();
    let mut tokens: alloc::vec::Vec<CommandToken> = line.chars().filter_map(|key| decoder.feed(key)).collect();
    if !decoder.is_idle() {
        tokens.push(CommandToken::Unknown);
    }
    tokens
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscreteRequest {
    StartStop,
    SelectDrive,
    SelectReverse,
    SelectNeutral,
    SelectPark,
    Quit,
    Handbrake,
    ToggleLights,
    ResetTrip,
    TurnLeft,
    TurnRight,
    Hazard,
}

pub type RequestList = Vec<DiscreteRequest, MAX_PENDING_REQUESTS>;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PedalIntent {
    pub throttle: f64,
    pub brake: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub intent: PedalIntent,
    /// Each request kind at most once, in order of first appearance.
    pub requests: RequestList,
    pub accelerate: bool,
    pub brake: bool,
    pub ignored: usize,
}

impl Resolution {
    pub fn quit_requested(&self) -> bool {
        self.requests.contains(&DiscreteRequest::Quit)
    }
}

#[derive(Debug, Clone)]
pub struct InputResolver {
    throttle_release: f64,
    brake_release: f64,
}

impl InputResolver {
    pub fn new() -> Self {
        Self {
            throttle_release: THROTTLE_RELEASE_PER_TICK,
            brake_release: BRAKE_RELEASE_PER_TICK,
        }
    }

    pub fn resolve<I>(&self, tokens: I, previous: PedalIntent) -> Resolution
    where
        I: IntoIterator<Item = CommandToken>,
    {
        let mut accelerate = false;
        let mut brake = false;
        let mut ignored = 0;
        let mut requests = RequestList::new();

        for token in tokens {
            match token {
                CommandToken::Accelerate => accelerate = true,
                CommandToken::Brake => brake = true,
                CommandToken::Unknown => ignored += 1,
                other => {
                    if let Some(request) = other.as_request() {
                        if !requests.contains(&request) {
                            // one slot per request kind, so this cannot overflow
                            let _ = requests.push(request);
                        }
                    }
                }
            }
        }

        // Accelerate wins over brake when both are held in the same tick.
        let intent = if accelerate {
            PedalIntent { throttle: 1.0, brake: 0.0 }
        } else if brake {
            PedalIntent { throttle: 0.0, brake: 1.0 }
        } else {
            PedalIntent {
                throttle: (previous.throttle - self.throttle_release).max(0.0),
                brake: (previous.brake - self.brake_release).max(0.0),
            }
        };

        Resolution {
            intent,
            requests,
            accelerate,
            brake,
            ignored,
        }
    }
}

impl Default for InputResolver {
    fn default() -> Self {
        Self::new()
    }
}
