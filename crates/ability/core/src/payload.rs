//! Typed payload bag passed through a state transition.
//!
//! A bag holds at most one value per payload type. Values are stored
//! bincode-encoded under the type's [`Payload::KIND`], so a bag is already in
//! wire form and travels inside net messages without further conversion.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::PayloadError;

/// A small value record that can ride along with a state transition.
///
/// `KIND` must be unique per payload type; it is the key on the wire.
pub trait Payload: Serialize + DeserializeOwned + Clone + 'static {
    const KIND: &'static str;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct PayloadEntry {
    kind: String,
    bytes: Vec<u8>,
}

/// Heterogeneous, at-most-one-per-type payload container.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPayloadBag")]
pub struct PayloadBag {
    entries: Vec<PayloadEntry>,
}

/// Undecoded wire form; a kind may only appear once.
#[derive(Deserialize)]
struct RawPayloadBag {
    entries: Vec<PayloadEntry>,
}

impl TryFrom<RawPayloadBag> for PayloadBag {
    type Error = PayloadError;

    fn try_from(raw: RawPayloadBag) -> Result<Self, Self::Error> {
        for (index, entry) in raw.entries.iter().enumerate() {
            if raw.entries[..index].iter().any(|seen| seen.kind == entry.kind) {
                return Err(PayloadError::Duplicate {
                    kind: entry.kind.clone(),
                });
            }
        }
        Ok(Self {
            entries: raw.entries,
        })
    }
}

impl PayloadBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a bag holding a single value.
    pub fn with<T: Payload>(value: &T) -> Self {
        let mut bag = Self::new();
        bag.add(value);
        bag
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stores `value` under its type.
    ///
    /// With `replace == false` an existing value of the same type is kept and
    /// the call returns `Ok(false)`.
    pub fn insert<T: Payload>(&mut self, value: &T, replace: bool) -> Result<bool, PayloadError> {
        let bytes = bincode::serialize(value).map_err(|err| PayloadError::Encode {
            kind: T::KIND.to_string(),
            message: err.to_string(),
        })?;

        match self.entries.iter_mut().find(|entry| entry.kind == T::KIND) {
            Some(_) if !replace => Ok(false),
            Some(entry) => {
                entry.bytes = bytes;
                Ok(true)
            }
            None => {
                self.entries.push(PayloadEntry {
                    kind: T::KIND.to_string(),
                    bytes,
                });
                Ok(true)
            }
        }
    }

    /// Stores `value`, replacing any previous value of the same type.
    ///
    /// Encoding failures are logged and reported as `false`.
    pub fn add<T: Payload>(&mut self, value: &T) -> bool {
        match self.insert(value, true) {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(target: "ability::state", %err, "dropping payload");
                false
            }
        }
    }

    /// Decodes the stored value of type `T`.
    pub fn try_get<T: Payload>(&self) -> Result<Option<T>, PayloadError> {
        let Some(entry) = self.entries.iter().find(|entry| entry.kind == T::KIND) else {
            return Ok(None);
        };
        bincode::deserialize(&entry.bytes)
            .map(Some)
            .map_err(|err| PayloadError::Decode {
                kind: T::KIND.to_string(),
                message: err.to_string(),
            })
    }

    /// Decodes the stored value of type `T`, treating a corrupt entry as absent.
    pub fn get<T: Payload>(&self) -> Option<T> {
        self.try_get().unwrap_or_else(|err| {
            tracing::warn!(target: "ability::state", %err, "ignoring corrupt payload");
            None
        })
    }

    pub fn has<T: Payload>(&self) -> bool {
        self.contains_kind(T::KIND)
    }

    pub fn contains_kind(&self, kind: &str) -> bool {
        self.entries.iter().any(|entry| entry.kind == kind)
    }

    /// Removes the value of type `T`, returning true if one was present.
    pub fn remove<T: Payload>(&mut self) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.kind != T::KIND);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Payload kinds stored in insertion order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|entry| entry.kind.as_str())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PayloadError> {
        bincode::serialize(self).map_err(|err| PayloadError::Encode {
            kind: "PayloadBag".to_string(),
            message: err.to_string(),
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PayloadError> {
        bincode::deserialize(bytes).map_err(|err| PayloadError::Decode {
            kind: "PayloadBag".to_string(),
            message: err.to_string(),
        })
    }
}
