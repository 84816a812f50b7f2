use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::FixtureError;

/// What a single physical DMX channel of a model carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelFunction {
    Dimmer,
    Red,
    Green,
    Blue,
    White,
    Cyan,
    Magenta,
    Yellow,
    Pan,
    Tilt,
    Zoom,
    Focus,
    /// Always transmits 0.
    Zero,
    /// Always transmits 255.
    Full,
}

impl ChannelFunction {
    /// The function code used in channel strings. Fixed channels have no case.
    pub fn code(&self) -> char {
        match self {
            ChannelFunction::Dimmer => 'D',
            ChannelFunction::Red => 'R',
            ChannelFunction::Green => 'G',
            ChannelFunction::Blue => 'B',
            ChannelFunction::White => 'W',
            ChannelFunction::Cyan => 'C',
            ChannelFunction::Magenta => 'M',
            ChannelFunction::Yellow => 'Y',
            ChannelFunction::Pan => 'P',
            ChannelFunction::Tilt => 'T',
            ChannelFunction::Zoom => 'Z',
            ChannelFunction::Focus => 'F',
            ChannelFunction::Zero => '0',
            ChannelFunction::Full => '1',
        }
    }

    fn from_code(code: char) -> Option<Self> {
        let function = match code.to_ascii_uppercase() {
            'D' => ChannelFunction::Dimmer,
            'R' => ChannelFunction::Red,
            'G' => ChannelFunction::Green,
            'B' => ChannelFunction::Blue,
            'W' => ChannelFunction::White,
            'C' => ChannelFunction::Cyan,
            'M' => ChannelFunction::Magenta,
            'Y' => ChannelFunction::Yellow,
            'P' => ChannelFunction::Pan,
            'T' => ChannelFunction::Tilt,
            'Z' => ChannelFunction::Zoom,
            'F' => ChannelFunction::Focus,
            '0' => ChannelFunction::Zero,
            '1' => ChannelFunction::Full,
            _ => return None,
        };
        Some(function)
    }
}

impl fmt::Display for ChannelFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChannelFunction::Dimmer => write!(f, "Dimmer"),
            ChannelFunction::Red => write!(f, "Red"),
            ChannelFunction::Green => write!(f, "Green"),
            ChannelFunction::Blue => write!(f, "Blue"),
            ChannelFunction::White => write!(f, "White"),
            ChannelFunction::Cyan => write!(f, "Cyan"),
            ChannelFunction::Magenta => write!(f, "Magenta"),
            ChannelFunction::Yellow => write!(f, "Yellow"),
            ChannelFunction::Pan => write!(f, "Pan"),
            ChannelFunction::Tilt => write!(f, "Tilt"),
            ChannelFunction::Zoom => write!(f, "Zoom"),
            ChannelFunction::Focus => write!(f, "Focus"),
            ChannelFunction::Zero => write!(f, "Zero"),
            ChannelFunction::Full => write!(f, "Full"),
        }
    }
}

/// One physical channel: its function and whether it carries the fine (LSB) byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Channel {
    pub function: ChannelFunction,
    pub fine: bool,
}

impl Channel {
    pub fn coarse(function: ChannelFunction) -> Self {
        Self {
            function,
            fine: false,
        }
    }

    pub fn fine(function: ChannelFunction) -> Self {
        Self {
            function,
            fine: true,
        }
    }

    /// Pick this channel's byte out of a 16-bit value.
    pub fn byte_of(&self, value: u16) -> u8 {
        if self.fine {
            (value & 0xff) as u8
        } else {
            (value >> 8) as u8
        }
    }
}

/// Ordered channel functions of a model, parsed from a channel string such as `"PpTtDRGB"`.
///
/// A layout can only be built from a valid string, so rendering never has to re-validate it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelLayout {
    channels: Vec<Channel>,
}

impl ChannelLayout {
    /// Layout used for fixtures without a model: a single dimmer channel.
    pub fn dimmer_only() -> Self {
        Self {
            channels: vec![Channel::coarse(ChannelFunction::Dimmer)],
        }
    }

    pub fn parse(s: &str) -> Result<Self, FixtureError> {
        if s.is_empty() {
            return Err(FixtureError::EmptyLayout);
        }
        if s.chars().count() > crate::DMX_CHANNELS {
            return Err(FixtureError::LayoutTooLong(s.chars().count()));
        }

        let mut channels = Vec::with_capacity(s.len());
        for (position, code) in s.chars().enumerate() {
            let function = ChannelFunction::from_code(code)
                .ok_or(FixtureError::InvalidChannel { code, position })?;
            channels.push(Channel {
                function,
                fine: code.is_ascii_lowercase(),
            });
        }

        Ok(Self { channels })
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn contains(&self, function: ChannelFunction) -> bool {
        self.channels.iter().any(|c| c.function == function)
    }
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self::dimmer_only()
    }
}

impl FromStr for ChannelLayout {
    type Err = FixtureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ChannelLayout {
    type Error = FixtureError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ChannelLayout> for String {
    fn from(layout: ChannelLayout) -> Self {
        layout.to_string()
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for channel in &self.channels {
            let code = channel.function.code();
            if channel.fine {
                write!(f, "{}", code.to_ascii_lowercase())?;
            } else {
                write!(f, "{}", code)?;
            }
        }
        Ok(())
    }
}
