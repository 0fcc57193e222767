//! Entity identity system using type-prefixed ULIDs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Entity type prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityPrefix {
    /// Attribute definition
    Attr,
    /// Attribute group
    Grp,
    /// Item type
    Type,
    /// Category node
    Cat,
    /// Family node
    Fam,
    /// Item instance
    Item,
    /// Association definition
    Assoc,
    /// Association rule
    Rule,
}

impl EntityPrefix {
    /// Get the string representation of the prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPrefix::Attr => "ATTR",
            EntityPrefix::Grp => "GRP",
            EntityPrefix::Type => "TYPE",
            EntityPrefix::Cat => "CAT",
            EntityPrefix::Fam => "FAM",
            EntityPrefix::Item => "ITEM",
            EntityPrefix::Assoc => "ASSOC",
            EntityPrefix::Rule => "RULE",
        }
    }

    /// Get all valid prefixes
    pub fn all() -> &'static [EntityPrefix] {
        &[
            EntityPrefix::Attr,
            EntityPrefix::Grp,
            EntityPrefix::Type,
            EntityPrefix::Cat,
            EntityPrefix::Fam,
            EntityPrefix::Item,
            EntityPrefix::Assoc,
            EntityPrefix::Rule,
        ]
    }

    /// Human-readable noun for error messages ("item type", "category", ...)
    pub fn noun(&self) -> &'static str {
        match self {
            EntityPrefix::Attr => "attribute",
            EntityPrefix::Grp => "attribute group",
            EntityPrefix::Type => "item type",
            EntityPrefix::Cat => "category",
            EntityPrefix::Fam => "family",
            EntityPrefix::Item => "item",
            EntityPrefix::Assoc => "association",
            EntityPrefix::Rule => "association rule",
        }
    }
}

impl fmt::Display for EntityPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityPrefix {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ATTR" => Ok(EntityPrefix::Attr),
            "GRP" => Ok(EntityPrefix::Grp),
            "TYPE" => Ok(EntityPrefix::Type),
            "CAT" => Ok(EntityPrefix::Cat),
            "FAM" => Ok(EntityPrefix::Fam),
            "ITEM" => Ok(EntityPrefix::Item),
            "ASSOC" => Ok(EntityPrefix::Assoc),
            "RULE" => Ok(EntityPrefix::Rule),
            _ => Err(IdParseError::InvalidPrefix(s.to_string())),
        }
    }
}

/// A unique entity identifier combining a type prefix and ULID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId {
    prefix: EntityPrefix,
    ulid: Ulid,
}

impl EntityId {
    /// Create a new EntityId with the given prefix
    pub fn new(prefix: EntityPrefix) -> Self {
        Self {
            prefix,
            ulid: Ulid::new(),
        }
    }

    /// Create an EntityId from a prefix and existing ULID
    pub fn from_parts(prefix: EntityPrefix, ulid: Ulid) -> Self {
        Self { prefix, ulid }
    }

    /// Get the entity prefix
    pub fn prefix(&self) -> EntityPrefix {
        self.prefix
    }

    /// Get the ULID component
    pub fn ulid(&self) -> Ulid {
        self.ulid
    }

    /// Parse an EntityId from a string
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        s.parse()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.ulid)
    }
}

impl FromStr for EntityId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix_str, ulid_str) = s
            .split_once('-')
            .ok_or_else(|| IdParseError::MissingDelimiter(s.to_string()))?;

        let prefix = prefix_str.parse()?;
        let ulid = Ulid::from_string(ulid_str)
            .map_err(|e| IdParseError::InvalidUlid(ulid_str.to_string(), e.to_string()))?;

        Ok(Self { prefix, ulid })
    }
}

impl Serialize for EntityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when parsing entity IDs
#[derive(Debug, Error)]
pub enum IdParseError {
    #[error("invalid entity prefix: '{0}' (valid: ATTR, GRP, TYPE, CAT, FAM, ITEM, ASSOC, RULE)")]
    InvalidPrefix(String),

    #[error("missing '-' delimiter in entity ID: '{0}'")]
    MissingDelimiter(String),

    #[error("invalid ULID '{0}': {1}")]
    InvalidUlid(String, String),
}
