//! Save/load request types

use crate::error::{ProtocolError, ProtocolResult};
use crate::payload::encode_snapshot;
use shelf_core::Snapshot;

/// Remote operation selector, sent as the `action` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Save,
    Load,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Save => "save",
            Action::Load => "load",
        }
    }
}

impl std::str::FromStr for Action {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "save" => Ok(Action::Save),
            "load" => Ok(Action::Load),
            other => Err(ProtocolError::UnknownAction(other.to_string())),
        }
    }
}

/// A parsed request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// action=save, data=<snapshot json>, [key=<secret>]
    Save { data: String, key: Option<String> },

    /// action=load, [key=<secret>]
    Load { key: Option<String> },
}

impl Request {
    /// Build a save request carrying the full serialized snapshot
    pub fn save(snapshot: &Snapshot, key: Option<&str>) -> ProtocolResult<Self> {
        Ok(Request::Save {
            data: encode_snapshot(snapshot)?,
            key: key.map(str::to_string),
        })
    }

    pub fn load(key: Option<&str>) -> Self {
        Request::Load {
            key: key.map(str::to_string),
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Request::Save { .. } => Action::Save,
            Request::Load { .. } => Action::Load,
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Request::Save { key, .. } | Request::Load { key } => key.as_deref(),
        }
    }

    /// Name/value pairs, for a form body (save) or a query string (load).
    /// The key is only sent when configured.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("action", self.action().as_str().to_string())];
        if let Request::Save { data, .. } = self {
            pairs.push(("data", data.clone()));
        }
        if let Some(key) = self.key() {
            pairs.push(("key", key.to_string()));
        }
        pairs
    }

    /// Parse a request back from name/value pairs
    pub fn from_pairs<'a, I>(pairs: I) -> ProtocolResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut action = None;
        let mut data = None;
        let mut key = None;

        for (name, value) in pairs {
            match name {
                "action" => action = Some(value.parse::<Action>()?),
                "data" => data = Some(value.to_string()),
                "key" if !value.is_empty() => key = Some(value.to_string()),
                _ => {}
            }
        }

        match action.ok_or(ProtocolError::MissingArgument("action"))? {
            Action::Save => Ok(Request::Save {
                data: data.ok_or(ProtocolError::MissingArgument("data"))?,
                key,
            }),
            Action::Load => Ok(Request::Load { key }),
        }
    }
}
