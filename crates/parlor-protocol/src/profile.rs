//! Display profile of a participant: name, avatar, language.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// One of the bundled avatar pictures, numbered `1..=20`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Avatar(pub u8);

impl Avatar {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 20;

    pub fn is_valid(self) -> bool {
        (Self::MIN..=Self::MAX).contains(&self.0)
    }
}

impl Default for Avatar {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

/// Supported UI languages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    #[default]
    Fr,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Fr => "fr",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Self::En),
            "fr" => Ok(Self::Fr),
            other => Err(ProtocolError::UnsupportedLanguage(other.to_string())),
        }
    }
}

/// What other players see of a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub avatar: Avatar,
    pub language: Language,
}

impl Profile {
    /// A profile with default avatar and language.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            avatar: Avatar::default(),
            language: Language::default(),
        }
    }

    pub fn with_avatar(mut self, avatar: Avatar) -> Self {
        self.avatar = avatar;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Checks the name is present and the avatar in range.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.name.trim().is_empty() {
            return Err(ProtocolError::MissingUserName);
        }
        if !self.avatar.is_valid() {
            return Err(ProtocolError::InvalidUserAvatar(self.avatar.0));
        }
        Ok(())
    }
}
