use ecow::EcoString;
use thiserror::Error;

use crate::ast::Location;

pub type Result<Ok, Err = Error> = std::result::Result<Ok, Err>;

/// A fatal compile-time error, reported at the pattern site that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("unable to resolve the type `{name}`")]
    UnresolvedType { location: Location, name: EcoString },

    #[error("`{name}` is not a type")]
    NonType { location: Location, name: EcoString },

    #[error("the field `{label}` is matched more than once")]
    DuplicateNamedField { location: Location, label: EcoString },

    #[error("constructor patterns cannot mix named and positional fields")]
    MixedFieldStyle { location: Location },

    #[error("type {name} has {fields} fields but the pattern expects {patterns} fields")]
    WrongFieldCount {
        location: Location,
        name: EcoString,
        fields: usize,
        patterns: usize,
    },

    #[error("type {name} has no field named `{label}`")]
    UnknownField {
        location: Location,
        name: EcoString,
        label: EcoString,
    },

    #[error("a sequence pattern may contain at most one splat")]
    MultipleSplats { location: Location },

    #[error("unrecognised pattern syntax")]
    UnrecognizedPattern { location: Location },

    #[error("match arms must be a block of `pattern => result` cases")]
    UnrecognizedBlock { location: Location },

    #[error("each match arm must have the shape `pattern => result`")]
    UnrecognizedCase { location: Location },

    #[error("the variable `{name}` is not bound on every alternative of its pattern")]
    UndefinedPatternVariable { location: Location, name: EcoString },
}

impl Error {
    pub fn location(&self) -> &Location {
        match self {
            Error::UnresolvedType { location, .. }
            | Error::NonType { location, .. }
            | Error::DuplicateNamedField { location, .. }
            | Error::MixedFieldStyle { location }
            | Error::WrongFieldCount { location, .. }
            | Error::UnknownField { location, .. }
            | Error::MultipleSplats { location }
            | Error::UnrecognizedPattern { location }
            | Error::UnrecognizedBlock { location }
            | Error::UnrecognizedCase { location }
            | Error::UndefinedPatternVariable { location, .. } => location,
        }
    }

    /// The `file:line: message` rendering used in compiler output.
    pub fn pretty(&self) -> String {
        format!("{}: {self}", self.location())
    }
}

/// A non-fatal diagnostic. Warnings accumulate during automaton
/// construction and are surfaced after compilation finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Action selection never chose this arm: no input can reach it.
    UnreachableArm { location: Location, arm: usize },
}

impl Warning {
    pub fn pretty(&self) -> String {
        match self {
            Warning::UnreachableArm { location, arm } => {
                format!("{location}: arm {arm} of this match can never match")
            }
        }
    }
}
