//! Flat names for 2.0.1 device-model variables
//!
//! Settings are stored under one string per variable:
//! `Component[;instance][;evseId]/Variable[;instance][;attribute]`, for
//! example `OCPPCommCtrlr/HeartbeatInterval` or
//! `EVSE;1/Power;max;Target`. A single suffix after the variable is its
//! instance; the attribute needs both.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use super::v201::{Attribute, Component, Evse, Variable};

const NAME_PATTERN: &str = r"^([A-Za-z0-9*\-_=:+|@.]+)(?:;([A-Za-z0-9*\-_=:+|@.]+))?(?:;(\d+))?/([A-Za-z0-9*\-_=:+|@.]+)(?:;([A-Za-z0-9*\-_=:+|@.]+))?(?:;(Actual|Target|MinSet|MaxSet))?$";

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(NAME_PATTERN).expect("variable name pattern compiles"))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid variable name: {0}")]
pub struct InvalidVariableName(pub String);

#[derive(Debug, Clone, PartialEq)]
pub struct VariableName {
    pub component: Component,
    pub variable: Variable,
    pub attribute: Option<Attribute>,
}

impl VariableName {
    pub fn new(component: Component, variable: Variable, attribute: Option<Attribute>) -> Self {
        Self {
            component,
            variable,
            attribute,
        }
    }
}

fn parse_attribute(text: &str) -> Option<Attribute> {
    match text {
        "Actual" => Some(Attribute::Actual),
        "Target" => Some(Attribute::Target),
        "MinSet" => Some(Attribute::MinSet),
        "MaxSet" => Some(Attribute::MaxSet),
        _ => None,
    }
}

impl FromStr for VariableName {
    type Err = InvalidVariableName;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidVariableName(name.to_string());
        let caps = pattern().captures(name).ok_or_else(invalid)?;
        let text = |i: usize| caps.get(i).map(|m| m.as_str().to_string());

        let evse = match caps.get(3) {
            Some(id) => Some(Evse {
                id: id.as_str().parse().map_err(|_| invalid())?,
                connector_id: None,
            }),
            None => None,
        };

        Ok(Self {
            component: Component {
                name: text(1).ok_or_else(invalid)?,
                instance: text(2),
                evse,
            },
            variable: Variable {
                name: text(4).ok_or_else(invalid)?,
                instance: text(5),
            },
            attribute: caps.get(6).and_then(|m| parse_attribute(m.as_str())),
        })
    }
}

impl fmt::Display for VariableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.component.name)?;
        if let Some(instance) = &self.component.instance {
            write!(f, ";{instance}")?;
        }
        if let Some(evse) = &self.component.evse {
            write!(f, ";{}", evse.id)?;
        }
        write!(f, "/{}", self.variable.name)?;
        if let Some(instance) = &self.variable.instance {
            write!(f, ";{instance}")?;
        }
        if let Some(attribute) = self.attribute {
            write!(f, ";{attribute:?}")?;
        }
        Ok(())
    }
}
