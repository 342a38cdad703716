//! A single task and its color label.

use std::fmt;

use tasksync_types::TaskId;

/// Color coded label of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ColorLabel {
    /// No label.
    #[default]
    None = 0,
    /// Red.
    Red = 1,
    /// Orange.
    Orange = 2,
    /// Yellow.
    Yellow = 3,
    /// Green.
    Green = 4,
    /// Turquoise.
    Turquoise = 5,
    /// Blue.
    Blue = 6,
    /// Purple.
    Purple = 7,
    /// Pink.
    Pink = 8,
}

impl From<u8> for ColorLabel {
    /// Values outside the known range map to [`ColorLabel::None`].
    fn from(value: u8) -> Self {
        match value {
            1 => ColorLabel::Red,
            2 => ColorLabel::Orange,
            3 => ColorLabel::Yellow,
            4 => ColorLabel::Green,
            5 => ColorLabel::Turquoise,
            6 => ColorLabel::Blue,
            7 => ColorLabel::Purple,
            8 => ColorLabel::Pink,
            _ => ColorLabel::None,
        }
    }
}

impl From<ColorLabel> for u8 {
    fn from(value: ColorLabel) -> Self {
        value as u8
    }
}

impl fmt::Display for ColorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorLabel::None => "none",
            ColorLabel::Red => "red",
            ColorLabel::Orange => "orange",
            ColorLabel::Yellow => "yellow",
            ColorLabel::Green => "green",
            ColorLabel::Turquoise => "turquoise",
            ColorLabel::Blue => "blue",
            ColorLabel::Purple => "purple",
            ColorLabel::Pink => "pink",
        };
        f.write_str(name)
    }
}

/// A task on the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    identifier: TaskId,
    completed: bool,
    title: String,
    label: ColorLabel,
}

impl Task {
    /// Create a task.
    pub fn new(identifier: TaskId, completed: bool, title: impl Into<String>, label: ColorLabel) -> Self {
        Self {
            identifier,
            completed,
            title: title.into(),
            label,
        }
    }

    /// Client generated identifier.
    pub fn identifier(&self) -> TaskId {
        self.identifier
    }

    /// Completion state.
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Text description.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Color label.
    pub fn label(&self) -> ColorLabel {
        self.label
    }

    /// Overwrite the fields that are present.
    pub fn update(&mut self, completed: Option<bool>, title: Option<String>, label: Option<ColorLabel>) {
        if let Some(completed) = completed {
            self.completed = completed;
        }
        if let Some(title) = title {
            self.title = title;
        }
        if let Some(label) = label {
            self.label = label;
        }
    }
}
