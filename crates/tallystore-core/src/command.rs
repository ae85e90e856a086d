//! Update commands and the atomic field operations they dispatch to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::storage::{format_number, MetricStore};

/// How a counter or gauge update is applied to its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateCommand {
    /// Add an integral delta.
    IncrementInteger,
    /// Add a floating point delta.
    IncrementFloat,
    /// Overwrite with an absolute value.
    Set,
}

impl UpdateCommand {
    /// All commands, in code order.
    pub const ALL: [UpdateCommand; 3] = [
        UpdateCommand::IncrementInteger,
        UpdateCommand::IncrementFloat,
        UpdateCommand::Set,
    ];

    /// Numeric code used when commands cross a process boundary.
    pub fn code(self) -> u8 {
        match self {
            UpdateCommand::IncrementInteger => 0,
            UpdateCommand::IncrementFloat => 1,
            UpdateCommand::Set => 2,
        }
    }

    /// Short name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            UpdateCommand::IncrementInteger => "inc",
            UpdateCommand::IncrementFloat => "incf",
            UpdateCommand::Set => "set",
        }
    }

    /// Bind `value` to the atomic field operation this command performs.
    pub fn dispatch(self, value: f64) -> Result<FieldOp, Error> {
        match self {
            UpdateCommand::IncrementInteger => {
                if !value.is_finite()
                    || value.fract() != 0.0
                    || value < i64::MIN as f64
                    || value >= i64::MAX as f64
                {
                    return Err(Error::InvalidValue(format!(
                        "integer increment requires an integral delta, got {}",
                        value
                    )));
                }
                Ok(FieldOp::IncrementInteger(value as i64))
            }
            UpdateCommand::IncrementFloat => {
                if value.is_nan() {
                    return Err(Error::InvalidValue("float increment by NaN".to_string()));
                }
                Ok(FieldOp::IncrementFloat(value))
            }
            UpdateCommand::Set => Ok(FieldOp::Set(value)),
        }
    }
}

impl fmt::Display for UpdateCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for UpdateCommand {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        UpdateCommand::ALL
            .into_iter()
            .find(|command| command.code() == code)
            .ok_or_else(|| Error::InvalidCommand(format!("code {}", code)))
    }
}

impl FromStr for UpdateCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inc" | "increment_integer" | "IncrementInteger" => Ok(UpdateCommand::IncrementInteger),
            "incf" | "increment_float" | "IncrementFloat" => Ok(UpdateCommand::IncrementFloat),
            "set" | "Set" => Ok(UpdateCommand::Set),
            other => Err(Error::InvalidCommand(format!("'{}'", other))),
        }
    }
}

/// An atomic single-field store operation with its argument bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldOp {
    /// Integer increment.
    IncrementInteger(i64),
    /// Float increment.
    IncrementFloat(f64),
    /// Unconditional set.
    Set(f64),
}

/// What the store reported back after a [`FieldOp`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldWrite {
    /// Post-increment integer value.
    Integer(i64),
    /// Post-increment float value.
    Float(f64),
    /// Outcome of a set.
    Set {
        /// Whether the field did not exist before.
        created: bool,
    },
}

impl FieldOp {
    /// Run the operation against one field.
    pub fn apply<S: MetricStore + ?Sized>(
        &self,
        store: &S,
        key: &str,
        field: &str,
    ) -> Result<FieldWrite, Error> {
        match *self {
            FieldOp::IncrementInteger(delta) => {
                store.increment_integer(key, field, delta).map(FieldWrite::Integer)
            }
            FieldOp::IncrementFloat(delta) => {
                store.increment_float(key, field, delta).map(FieldWrite::Float)
            }
            FieldOp::Set(value) => store
                .set_field(key, field, &format_number(value))
                .map(|created| FieldWrite::Set { created }),
        }
    }

    /// Whether `outcome` is what a write on a previously absent field returns.
    ///
    /// Increments compare the new value against the delta; a set checks that
    /// it created the field. A racing decrement can make this fire twice,
    /// which only repeats an idempotent metadata write.
    pub fn is_first_write(&self, outcome: FieldWrite) -> bool {
        match (*self, outcome) {
            (FieldOp::IncrementInteger(delta), FieldWrite::Integer(value)) => value == delta,
            (FieldOp::IncrementFloat(delta), FieldWrite::Float(value)) => value == delta,
            (FieldOp::Set(_), FieldWrite::Set { created }) => created,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_code_roundtrip() {
        for command in UpdateCommand::ALL {
            assert_eq!(UpdateCommand::try_from(command.code()).unwrap(), command);
        }
    }

    #[test]
    fn test_unknown_code_is_invalid_command() {
        let err = UpdateCommand::try_from(7).unwrap_err();
        assert!(matches!(err, Error::InvalidCommand(_)));
        assert_eq!(err.to_string(), "invalid update command: code 7");
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("inc".parse::<UpdateCommand>().unwrap(), UpdateCommand::IncrementInteger);
        assert_eq!("incf".parse::<UpdateCommand>().unwrap(), UpdateCommand::IncrementFloat);
        assert_eq!("Set".parse::<UpdateCommand>().unwrap(), UpdateCommand::Set);
        assert!(matches!(
            "decrement".parse::<UpdateCommand>(),
            Err(Error::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_dispatch() {
        assert_eq!(
            UpdateCommand::IncrementInteger.dispatch(3.0).unwrap(),
            FieldOp::IncrementInteger(3)
        );
        assert_eq!(
            UpdateCommand::IncrementFloat.dispatch(0.5).unwrap(),
            FieldOp::IncrementFloat(0.5)
        );
        assert_eq!(UpdateCommand::Set.dispatch(-2.0).unwrap(), FieldOp::Set(-2.0));
    }

    #[test]
    fn test_integer_dispatch_rejects_fractions() {
        for bad in [1.5, f64::NAN, f64::INFINITY, 1e19] {
            assert!(matches!(
                UpdateCommand::IncrementInteger.dispatch(bad),
                Err(Error::InvalidValue(_))
            ));
        }
    }

    #[test]
    fn test_first_write_detection() {
        let store = MemoryStore::new();

        let inc = FieldOp::IncrementInteger(2);
        let first = inc.apply(&store, "k", "a").unwrap();
        assert!(inc.is_first_write(first));
        let second = inc.apply(&store, "k", "a").unwrap();
        assert!(!inc.is_first_write(second));

        let set = FieldOp::Set(10.0);
        let first = set.apply(&store, "k", "b").unwrap();
        assert!(set.is_first_write(first));
        let second = set.apply(&store, "k", "b").unwrap();
        assert!(!set.is_first_write(second));

        let incf = FieldOp::IncrementFloat(0.25);
        assert!(incf.is_first_write(incf.apply(&store, "k", "c").unwrap()));
        assert!(!incf.is_first_write(incf.apply(&store, "k", "c").unwrap()));
    }

    #[test]
    fn test_set_stores_shortest_text() {
        let store = MemoryStore::new();
        FieldOp::Set(42.0).apply(&store, "k", "g").unwrap();
        assert_eq!(store.read_fields("k").unwrap().get("g").unwrap(), "42");
    }
}
