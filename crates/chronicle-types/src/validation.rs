//! Outcome of validating an action before it is queued.
//!
//! A rejection is a normal result, not an error. The caller decides what to
//! do with it: a command surface reports the message to the player, the
//! scheduler treats it as "skip this decision".

use serde::{Deserialize, Serialize};

/// Why an action was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// An autonomous actor already has a pending action.
    AlreadyBusy,
    /// The target entity does not exist or cannot be used.
    InvalidTarget,
    /// The action would not change anything (e.g. moving to where you are).
    NoEffect,
    /// A required property is missing or out of range.
    InvalidProperty,
    /// A reason defined by a collaborator's action kind.
    Other(String),
}

/// A structured rejection: a machine-readable code plus a human message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionDetails {
    /// Machine-readable reason code.
    pub reason: RejectionReason,
    /// Explanation suitable for showing to a player.
    pub message: String,
}

impl RejectionDetails {
    /// Build a rejection.
    pub fn new(reason: RejectionReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

impl core::fmt::Display for RejectionDetails {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}: {}", self.reason, self.message)
    }
}

/// Result of an action kind's `validate` hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "details", rename_all = "snake_case")]
pub enum Validation {
    /// The action may be queued.
    Accepted,
    /// The action was refused.
    Rejected(RejectionDetails),
}

impl Validation {
    /// Shorthand for a rejection.
    pub fn reject(reason: RejectionReason, message: impl Into<String>) -> Self {
        Self::Rejected(RejectionDetails::new(reason, message))
    }

    /// Whether the action was accepted.
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_builds_details() {
        let v = Validation::reject(RejectionReason::NoEffect, "You are already there.");
        assert!(!v.is_accepted());
        assert!(matches!(
            v,
            Validation::Rejected(ref d)
                if d.reason == RejectionReason::NoEffect && d.message == "You are already there."
        ));
    }

    #[test]
    fn validation_serializes_with_outcome_tag() {
        let json = serde_json::to_value(Validation::Accepted).ok();
        assert_eq!(
            json,
            Some(serde_json::json!({ "outcome": "accepted" }))
        );
    }
}
