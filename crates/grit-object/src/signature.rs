use bstr::{BString, ByteSlice};

use crate::ObjectError;

/// An identity line from a commit or tag header:
/// `"Name <email> <epoch-seconds> <±HHMM>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: BString,
    pub email: BString,
    /// Seconds since the Unix epoch.
    pub when: i64,
    /// Timezone offset in minutes east of UTC.
    pub offset_minutes: i32,
}

impl Signature {
    /// Create a signature with an explicit timestamp and offset.
    pub fn new(
        name: impl Into<BString>,
        email: impl Into<BString>,
        when: i64,
        offset_minutes: i32,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
            offset_minutes,
        }
    }

    /// Parse an identity line.
    ///
    /// The email is delimited by the rightmost `<`/`>` pair; everything
    /// after the `>` is `"<epoch> <±HHMM>"`. A missing timezone is treated
    /// as UTC.
    pub fn parse(input: &[u8]) -> Result<Self, ObjectError> {
        let gt = input
            .iter()
            .rposition(|&b| b == b'>')
            .ok_or_else(|| ObjectError::Signature("missing '>'".into()))?;
        let lt = input[..gt]
            .iter()
            .rposition(|&b| b == b'<')
            .ok_or_else(|| ObjectError::Signature("missing '<'".into()))?;

        let name = BString::from(input[..lt].trim());
        let email = BString::from(&input[lt + 1..gt]);

        let rest = input[gt + 1..].trim();
        let rest = std::str::from_utf8(rest)
            .map_err(|_| ObjectError::Signature("non-ASCII timestamp".into()))?;

        let mut tokens = rest.split_ascii_whitespace();
        let when = tokens
            .next()
            .ok_or_else(|| ObjectError::Signature("missing timestamp".into()))?
            .parse::<i64>()
            .map_err(|_| ObjectError::Signature(format!("invalid timestamp in {rest:?}")))?;

        let offset_minutes = match tokens.next() {
            Some(tz) => {
                let raw = tz
                    .parse::<i32>()
                    .map_err(|_| ObjectError::Signature(format!("invalid timezone {tz:?}")))?;
                hhmm_to_minutes(raw)
            }
            None => 0,
        };

        Ok(Self {
            name,
            email,
            when,
            offset_minutes,
        })
    }

    /// Canonical serialization: `"Name <email> epoch ±HHMM"`.
    pub fn to_bytes(&self) -> BString {
        let mut out = BString::from(Vec::new());
        out.extend_from_slice(&self.name);
        out.extend_from_slice(b" <");
        out.extend_from_slice(&self.email);
        out.extend_from_slice(b"> ");
        out.extend_from_slice(
            format!("{} {:+05}", self.when, minutes_to_hhmm(self.offset_minutes)).as_bytes(),
        );
        out
    }
}

/// Decode the decimal `±HHMM` form (so `-0530` arrives as `-530`) into minutes.
fn hhmm_to_minutes(raw: i32) -> i32 {
    let sign = if raw < 0 { -1 } else { 1 };
    let abs = raw.abs();
    sign * (abs / 100 * 60 + abs % 100)
}

/// Encode minutes east of UTC back into the decimal `±HHMM` form.
fn minutes_to_hhmm(minutes: i32) -> i32 {
    let sign = if minutes < 0 { -1 } else { 1 };
    let abs = minutes.abs();
    sign * (abs / 60 * 100 + abs % 60)
}
