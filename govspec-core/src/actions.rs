//! Action Taxonomy - Frozen, Closed Vocabulary
//!
//! Spec trees carry actions as authored (`RawAction`). Governance resolves
//! them into `GovernedAction`, a closed union where every action that needs a
//! destination carries a non-optional target.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contract::ContractLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Navigate,
    ExternalLink,
    ShowInformation,
    Input,
    Submit,
    Search,
    Toggle,
    Download,
    PhoneCall,
    Sms,
    Email,
}

impl ActionKind {
    pub const ALL: [ActionKind; 11] = [
        ActionKind::Navigate,
        ActionKind::ExternalLink,
        ActionKind::ShowInformation,
        ActionKind::Input,
        ActionKind::Submit,
        ActionKind::Search,
        ActionKind::Toggle,
        ActionKind::Download,
        ActionKind::PhoneCall,
        ActionKind::Sms,
        ActionKind::Email,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Navigate => "navigate",
            ActionKind::ExternalLink => "external_link",
            ActionKind::ShowInformation => "show_information",
            ActionKind::Input => "input",
            ActionKind::Submit => "submit",
            ActionKind::Search => "search",
            ActionKind::Toggle => "toggle",
            ActionKind::Download => "download",
            ActionKind::PhoneCall => "phone_call",
            ActionKind::Sms => "sms",
            ActionKind::Email => "email",
        }
    }

    /// Whether the variant carries a mandatory target at the type level.
    ///
    /// A contract lock may require targets for more actions, never fewer.
    pub fn requires_target(&self) -> bool {
        matches!(
            self,
            ActionKind::Navigate | ActionKind::ExternalLink | ActionKind::ShowInformation
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized action tag '{0}'")]
pub struct UnknownAction(pub String);

impl FromStr for ActionKind {
    type Err = UnknownAction;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| UnknownAction(tag.to_string()))
    }
}

/// An action exactly as it appears in an input tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawAction<'a> {
    pub tag: &'a str,
    pub target: Option<&'a str>,
}

/// Why a raw action could not be admitted into the governed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionViolation {
    #[error("unrecognized action '{tag}'")]
    Unrecognized { tag: String },

    #[error("action '{kind}' is not allowed by the contract lock")]
    NotAllowed { kind: ActionKind },

    #[error("{kind} requires non-empty target")]
    MissingTarget { kind: ActionKind },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GovernedAction {
    Navigate {
        target: String,
    },
    ExternalLink {
        target: String,
    },
    ShowInformation {
        target: String,
    },
    Input {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Submit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Search {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Toggle {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Download {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    PhoneCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Sms {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Email {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
}

impl GovernedAction {
    /// Admit a raw action under the given contract lock.
    ///
    /// Targets are trimmed; a blank target counts as missing.
    pub fn resolve(raw: RawAction<'_>, lock: &ContractLock) -> Result<Self, ActionViolation> {
        let kind = ActionKind::from_str(raw.tag).map_err(|e| ActionViolation::Unrecognized { tag: e.0 })?;

        if !lock.allows(kind) {
            return Err(ActionViolation::NotAllowed { kind });
        }

        let target = raw
            .target
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        if target.is_none() && lock.requires_target(kind) {
            return Err(ActionViolation::MissingTarget { kind });
        }

        Self::build(kind, target)
    }

    fn build(kind: ActionKind, target: Option<String>) -> Result<Self, ActionViolation> {
        let required = |target: Option<String>| target.ok_or(ActionViolation::MissingTarget { kind });

        Ok(match kind {
            ActionKind::Navigate => Self::Navigate { target: required(target)? },
            ActionKind::ExternalLink => Self::ExternalLink { target: required(target)? },
            ActionKind::ShowInformation => Self::ShowInformation { target: required(target)? },
            ActionKind::Input => Self::Input { target },
            ActionKind::Submit => Self::Submit { target },
            ActionKind::Search => Self::Search { target },
            ActionKind::Toggle => Self::Toggle { target },
            ActionKind::Download => Self::Download { target },
            ActionKind::PhoneCall => Self::PhoneCall { target },
            ActionKind::Sms => Self::Sms { target },
            ActionKind::Email => Self::Email { target },
        })
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Navigate { .. } => ActionKind::Navigate,
            Self::ExternalLink { .. } => ActionKind::ExternalLink,
            Self::ShowInformation { .. } => ActionKind::ShowInformation,
            Self::Input { .. } => ActionKind::Input,
            Self::Submit { .. } => ActionKind::Submit,
            Self::Search { .. } => ActionKind::Search,
            Self::Toggle { .. } => ActionKind::Toggle,
            Self::Download { .. } => ActionKind::Download,
            Self::PhoneCall { .. } => ActionKind::PhoneCall,
            Self::Sms { .. } => ActionKind::Sms,
            Self::Email { .. } => ActionKind::Email,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Navigate { target }
            | Self::ExternalLink { target }
            | Self::ShowInformation { target } => Some(target),
            Self::Input { target }
            | Self::Submit { target }
            | Self::Search { target }
            | Self::Toggle { target }
            | Self::Download { target }
            | Self::PhoneCall { target }
            | Self::Sms { target }
            | Self::Email { target } => target.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw<'a>(tag: &'a str, target: Option<&'a str>) -> RawAction<'a> {
        RawAction { tag, target }
    }

    #[test]
    fn test_every_kind_round_trips_through_its_tag() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.as_str().parse::<ActionKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_tags_are_case_sensitive() {
        assert!("Navigate".parse::<ActionKind>().is_err());
        assert!("modal_open".parse::<ActionKind>().is_err());
    }

    #[test]
    fn test_resolve_unknown_tag() {
        let lock = ContractLock::frozen();
        let err = GovernedAction::resolve(raw("teleport", Some("/x")), &lock).unwrap_err();
        assert_eq!(err, ActionViolation::Unrecognized { tag: "teleport".into() });
    }

    #[test]
    fn test_resolve_blank_target_is_missing() {
        let lock = ContractLock::frozen();
        let err = GovernedAction::resolve(raw("navigate", Some("   ")), &lock).unwrap_err();
        assert_eq!(err.to_string(), "navigate requires non-empty target");
    }

    #[test]
    fn test_resolve_trims_target() {
        let lock = ContractLock::frozen();
        let action = GovernedAction::resolve(raw("external_link", Some(" https://example.com ")), &lock).unwrap();
        assert_eq!(action.kind(), ActionKind::ExternalLink);
        assert_eq!(action.target(), Some("https://example.com"));
    }

    #[test]
    fn test_optional_target_actions_accept_none() {
        let lock = ContractLock::frozen();
        let action = GovernedAction::resolve(raw("toggle", None), &lock).unwrap();
        assert_eq!(action, GovernedAction::Toggle { target: None });
    }

    #[test]
    fn test_lock_can_narrow_the_vocabulary() {
        let mut lock = ContractLock::frozen();
        lock.allowed_actions.retain(|k| *k != ActionKind::Sms);
        let err = GovernedAction::resolve(raw("sms", Some("555")), &lock).unwrap_err();
        assert_eq!(err, ActionViolation::NotAllowed { kind: ActionKind::Sms });
    }

    #[test]
    fn test_lock_can_tighten_target_requirements() {
        let mut lock = ContractLock::frozen();
        lock.required_target_actions.push(ActionKind::Email);
        let err = GovernedAction::resolve(raw("email", None), &lock).unwrap_err();
        assert_eq!(err, ActionViolation::MissingTarget { kind: ActionKind::Email });
    }

    #[test]
    fn test_deserialization_rejects_unknown_and_untargeted() {
        assert!(serde_json::from_value::<GovernedAction>(json!({"action": "teleport"})).is_err());
        assert!(serde_json::from_value::<GovernedAction>(json!({"action": "navigate"})).is_err());

        let action: GovernedAction =
            serde_json::from_value(json!({"action": "navigate", "target": "/pricing"})).unwrap();
        assert_eq!(action.target(), Some("/pricing"));
    }
}
