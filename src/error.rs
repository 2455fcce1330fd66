/// An error that occurs when parsing or building a recurrence rule.
///
/// Construction of a rule is all-or-nothing: when this error is returned, no
/// rule is produced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvalidRuleError {
    kind: InvalidRuleErrorKind,
}

/// The specific reason a recurrence rule is invalid.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum InvalidRuleErrorKind {
    /// The rule has no `FREQ` part.
    MissingFrequency,
    /// The `FREQ` part isn't one of the seven frequencies.
    UnknownFrequency(String),
    /// A part has no `=` or no value after its `=`.
    MissingValue(String),
    /// A part that should be an integer (or a list of them) isn't.
    InvalidInteger { part: String, value: String },
    /// A `BYDAY` or `WKST` token isn't a weekday.
    InvalidWeekday(String),
    /// The `UNTIL` part isn't a date or a datetime.
    InvalidUntil(String),
    /// An integer is outside the range permitted for its part.
    OutOfRange { part: String, value: i64, range: &'static str },
    /// The same part was given more than once.
    DuplicatePart(String),
}

impl InvalidRuleError {
    pub(crate) fn new(kind: InvalidRuleErrorKind) -> InvalidRuleError {
        InvalidRuleError { kind }
    }

    pub(crate) fn out_of_range(
        part: &str,
        value: impl Into<i64>,
        range: &'static str,
    ) -> InvalidRuleError {
        InvalidRuleError::new(InvalidRuleErrorKind::OutOfRange {
            part: part.to_string(),
            value: value.into(),
            range,
        })
    }

    pub(crate) fn invalid_integer(
        part: &str,
        value: &str,
    ) -> InvalidRuleError {
        InvalidRuleError::new(InvalidRuleErrorKind::InvalidInteger {
            part: part.to_string(),
            value: value.to_string(),
        })
    }

    /// Returns the reason this rule is invalid.
    pub fn kind(&self) -> &InvalidRuleErrorKind {
        &self.kind
    }
}

impl std::fmt::Display for InvalidRuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use self::InvalidRuleErrorKind::*;

        match self.kind {
            MissingFrequency => {
                write!(f, "recurrence rule is missing required 'FREQ' part")
            }
            UnknownFrequency(ref freq) => write!(
                f,
                "unrecognized frequency `{freq}` (expected one of SECONDLY, \
                 MINUTELY, HOURLY, DAILY, WEEKLY, MONTHLY or YEARLY)",
            ),
            MissingValue(ref part) => {
                write!(f, "recurrence rule part `{part}` has no value")
            }
            InvalidInteger { ref part, ref value } => write!(
                f,
                "invalid '{part}' value `{value}` (expected an integer)",
            ),
            InvalidWeekday(ref value) => write!(
                f,
                "invalid weekday `{value}` (expected an optional signed \
                 ordinal followed by one of MO, TU, WE, TH, FR, SA or SU)",
            ),
            InvalidUntil(ref value) => write!(
                f,
                "invalid 'UNTIL' value `{value}` \
                 (expected a date or a datetime)",
            ),
            OutOfRange { ref part, value, range } => write!(
                f,
                "invalid '{part}' value `{value}` \
                 (values must be in range {range})",
            ),
            DuplicatePart(ref part) => write!(
                f,
                "recurrence rule part `{part}` was given more than once",
            ),
        }
    }
}

impl std::error::Error for InvalidRuleError {}
