/// Merge directives and the triggers that carry them
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Selection rule comparing each open tab's index with the origin tab's
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Directive {
    All,
    Left,
    Right,
    Excluding,
    Only,
}

impl Directive {
    pub fn keeps(self, index: i32, origin: i32) -> bool {
        match self {
            Directive::All => true,
            Directive::Left => index < origin,
            Directive::Right => index > origin,
            Directive::Excluding => index != origin,
            Directive::Only => index == origin,
        }
    }

    pub fn parse(name: &str) -> Option<Directive> {
        match name {
            "all" => Some(Directive::All),
            "left" => Some(Directive::Left),
            "right" => Some(Directive::Right),
            "excluding" => Some(Directive::Excluding),
            "only" => Some(Directive::Only),
            _ => None,
        }
    }
}

/// Which windows the tab controller is asked about
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TabScope {
    CurrentWindow,
    AllWindows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRequest {
    pub directive: Directive,
    pub scope: TabScope,
}

impl MergeRequest {
    pub fn new(directive: Directive) -> MergeRequest {
        MergeRequest {
            directive,
            scope: TabScope::CurrentWindow,
        }
    }
}

/// An external event carrying a merge directive, either a keyboard
/// command or a context-menu click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Shortcut { command: String },
    MenuClick { menu_item_id: String },
}

impl Trigger {
    /// Normalize the trigger into a merge request.
    ///
    /// Both shapes use the same vocabulary: `merge-all-windows`, or
    /// `merge-{directive}` where directive is one of all, left, right,
    /// excluding, only.
    pub fn resolve(&self) -> Result<MergeRequest> {
        let name = match self {
            Trigger::Shortcut { command } => command.as_str(),
            Trigger::MenuClick { menu_item_id } => menu_item_id.as_str(),
        };

        if name == "merge-all-windows" {
            return Ok(MergeRequest {
                directive: Directive::All,
                scope: TabScope::AllWindows,
            });
        }

        name.strip_prefix("merge-")
            .and_then(Directive::parse)
            .map(MergeRequest::new)
            .ok_or_else(|| Error::Validation(format!("unknown merge trigger {:?}", name)))
    }
}
