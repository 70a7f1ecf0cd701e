use std::fmt;
use std::str::FromStr;

use crate::viewport::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// Unit offset in image space. Y grows downward, so "up" is negative.
    pub fn offset(self, step: i32) -> Point {
        match self {
            Direction::Left => Point::new(-step, 0),
            Direction::Right => Point::new(step, 0),
            Direction::Up => Point::new(0, -step),
            Direction::Down => Point::new(0, step),
        }
    }
}

/// Everything the navigator can be asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Next,
    Prev,
    Pan(Direction),
    /// Re-clamp and repaint at the current origin (expose, resize, drag start).
    PanOrigin,
    /// Absolute origin, produced by drag gestures.
    PanTo(Point),
    Fit,
    Quit,
    /// Run an external program; `%` tokens become the current file path.
    RunExternal(Vec<String>),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("pan needs one of left, right, up, down, origin (got '{0}')")]
    BadPan(String),
    #[error("'!' needs a program to run")]
    MissingProgram,
    #[error("unexpected argument '{0}'")]
    TrailingArgument(String),
}

impl FromStr for Command {
    type Err = ParseCommandError;

    /// Parses the text form used by key bindings, e.g. `pan left` or
    /// `! mv % .trash/`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let head = words.next().ok_or(ParseCommandError::Empty)?;

        let cmd = match head {
            "next" => Command::Next,
            "prev" => Command::Prev,
            "fit" => Command::Fit,
            "quit" => Command::Quit,
            "pan" => match words.next().unwrap_or("") {
                "left" => Command::Pan(Direction::Left),
                "right" => Command::Pan(Direction::Right),
                "up" => Command::Pan(Direction::Up),
                "down" => Command::Pan(Direction::Down),
                "origin" => Command::PanOrigin,
                other => return Err(ParseCommandError::BadPan(other.to_string())),
            },
            "!" => {
                let argv: Vec<String> = words.by_ref().map(str::to_string).collect();
                if argv.is_empty() {
                    return Err(ParseCommandError::MissingProgram);
                }
                Command::RunExternal(argv)
            }
            other => return Err(ParseCommandError::Unknown(other.to_string())),
        };

        match words.next() {
            Some(extra) => Err(ParseCommandError::TrailingArgument(extra.to_string())),
            None => Ok(cmd),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Next => write!(f, "next"),
            Command::Prev => write!(f, "prev"),
            Command::Pan(dir) => write!(f, "pan {}", format!("{:?}", dir).to_lowercase()),
            Command::PanOrigin => write!(f, "pan origin"),
            Command::PanTo(p) => write!(f, "pan to {},{}", p.x, p.y),
            Command::Fit => write!(f, "fit"),
            Command::Quit => write!(f, "quit"),
            Command::RunExternal(argv) => write!(f, "! {}", argv.join(" ")),
        }
    }
}
