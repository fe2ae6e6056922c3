use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::executable::Executable;

/// Lifecycle points an [`Executable`] can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    BeforeBoot,
    AfterBoot,
    BeforeRouting,
    AfterRouting,
    AfterResponse,
    NotFound,
    InternalError,
}

impl Hook {
    pub const ALL: [Hook; 7] = [
        Hook::BeforeBoot,
        Hook::AfterBoot,
        Hook::BeforeRouting,
        Hook::AfterRouting,
        Hook::AfterResponse,
        Hook::NotFound,
        Hook::InternalError,
    ];

    /// The dotted key naming this hook in configuration.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Hook::BeforeBoot => "before.boot",
            Hook::AfterBoot => "after.boot",
            Hook::BeforeRouting => "before.routing",
            Hook::AfterRouting => "after.routing",
            Hook::AfterResponse => "after.response",
            Hook::NotFound => "not.found",
            Hook::InternalError => "internal.error",
        }
    }
}

impl FromStr for Hook {
    type Err = ConfigError;

    /// Keys are case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hook::ALL
            .into_iter()
            .find(|h| h.key() == s)
            .ok_or_else(|| ConfigError::UnknownHook(s.to_string()))
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One optional slot per lifecycle point.
#[derive(Debug, Clone, Default)]
pub struct Hooks {
    pub before_boot: Option<Executable>,
    pub after_boot: Option<Executable>,
    pub before_routing: Option<Executable>,
    pub after_routing: Option<Executable>,
    pub after_response: Option<Executable>,
    pub not_found: Option<Executable>,
    pub internal_error: Option<Executable>,
}

impl Hooks {
    fn slot_mut(&mut self, hook: Hook) -> &mut Option<Executable> {
        match hook {
            Hook::BeforeBoot => &mut self.before_boot,
            Hook::AfterBoot => &mut self.after_boot,
            Hook::BeforeRouting => &mut self.before_routing,
            Hook::AfterRouting => &mut self.after_routing,
            Hook::AfterResponse => &mut self.after_response,
            Hook::NotFound => &mut self.not_found,
            Hook::InternalError => &mut self.internal_error,
        }
    }

    #[must_use]
    pub fn get(&self, hook: Hook) -> Option<&Executable> {
        match hook {
            Hook::BeforeBoot => self.before_boot.as_ref(),
            Hook::AfterBoot => self.after_boot.as_ref(),
            Hook::BeforeRouting => self.before_routing.as_ref(),
            Hook::AfterRouting => self.after_routing.as_ref(),
            Hook::AfterResponse => self.after_response.as_ref(),
            Hook::NotFound => self.not_found.as_ref(),
            Hook::InternalError => self.internal_error.as_ref(),
        }
    }

    /// Fill the slot for `hook`, returning what it held.
    pub fn set(&mut self, hook: Hook, executable: Executable) -> Option<Executable> {
        self.slot_mut(hook).replace(executable)
    }

    pub fn clear(&mut self, hook: Hook) -> Option<Executable> {
        self.slot_mut(hook).take()
    }
}
