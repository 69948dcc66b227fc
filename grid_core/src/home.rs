//! Parser for the agent home location sent in the login response.
//!
//! The value arrives as loosely-structured text:
//!
//! ```text
//! {'region_handle':[r256000, r256000], 'position':[r128.0, r128.0, r25.0], 'look_at':[r1, r0, r0]}
//! ```
//!
//! Only the three known field names are accepted, and values are limited to
//! integers, floats (optionally `r`-prefixed), tuples or lists of those, and
//! quoted strings. Anything else is rejected.
//!
//! ```
//! use grid_core::home::HomeLocation;
//!
//! let home: HomeLocation = "{'region_handle':[r256000, r254976], \
//!     'position':[r128.0, r64.5, r25.0], 'look_at':[r1, r0, r0]}"
//!     .parse()
//!     .expect("valid home");
//!
//! assert_eq!(home.global_x(), 256_000);
//! assert_eq!(home.local_y(), 64.5);
//! ```

use core::str::FromStr;

use crate::error::HomeParseError;

/// A scalar or composite literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// An integer.
    Int(i64),

    /// A floating-point number.
    Float(f64),

    /// A quoted string.
    Str(String),

    /// A parenthesised tuple or bracketed list.
    Tuple(Vec<Literal>),
}

impl Literal {
    fn as_f64(&self) -> Option<f64> {
        match *self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(n) => Some(n as f64),
            Self::Float(x) => Some(x),
            Self::Str(_) | Self::Tuple(_) => None,
        }
    }

    fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::Int(n) => u64::try_from(n).ok(),
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Self::Float(x) if x >= 0.0 && x.fract() == 0.0 && x <= u64::MAX as f64 => {
                Some(x as u64)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    RegionHandle,
    Position,
    LookAt,
}

impl Field {
    fn from_name(name: &str) -> Result<Self, HomeParseError> {
        match name {
            "region_handle" => Ok(Self::RegionHandle),
            "position" => Ok(Self::Position),
            "look_at" => Ok(Self::LookAt),
            other => Err(HomeParseError::UnknownField(other.to_owned())),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::RegionHandle => "region_handle",
            Self::Position => "position",
            Self::LookAt => "look_at",
        }
    }
}

/// An agent's home: region plus position and facing within it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomeLocation {
    /// Global coordinates of the region's corner.
    pub region_handle: (u64, u64),

    /// Position within the region.
    pub position: [f64; 3],

    /// Facing direction.
    pub look_at: [f64; 3],
}

impl HomeLocation {
    /// Global x of the home region.
    #[must_use]
    pub const fn global_x(&self) -> u64 {
        self.region_handle.0
    }

    /// Global y of the home region.
    #[must_use]
    pub const fn global_y(&self) -> u64 {
        self.region_handle.1
    }

    /// Local x within the region.
    #[must_use]
    pub const fn local_x(&self) -> f64 {
        self.position[0]
    }

    /// Local y within the region.
    #[must_use]
    pub const fn local_y(&self) -> f64 {
        self.position[1]
    }

    /// Height within the region.
    #[must_use]
    pub const fn local_z(&self) -> f64 {
        self.position[2]
    }
}

impl FromStr for HomeLocation {
    type Err = HomeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .trim()
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or_else(|| HomeParseError::Malformed(s.to_owned()))?;

        let mut region_handle: Option<(u64, u64)> = None;
        let mut position: Option<[f64; 3]> = None;
        let mut look_at: Option<[f64; 3]> = None;

        for entry in split_top_level(inner)? {
            let (raw_name, raw_value) = entry
                .split_once(':')
                .ok_or_else(|| HomeParseError::Malformed(entry.to_owned()))?;
            let field = Field::from_name(unquote(raw_name.trim()))?;
            let literal = parse_literal(field.name(), raw_value.trim())?;

            match field {
                Field::RegionHandle => {
                    let [x, y] = components(field, &literal, Literal::as_u64)?;
                    set_once(&mut region_handle, field, (x, y))?;
                }
                Field::Position => {
                    set_once(&mut position, field, components(field, &literal, Literal::as_f64)?)?;
                }
                Field::LookAt => {
                    set_once(&mut look_at, field, components(field, &literal, Literal::as_f64)?)?;
                }
            }
        }

        Ok(Self {
            region_handle: region_handle
                .ok_or(HomeParseError::MissingField(Field::RegionHandle.name()))?,
            position: position.ok_or(HomeParseError::MissingField(Field::Position.name()))?,
            look_at: look_at.ok_or(HomeParseError::MissingField(Field::LookAt.name()))?,
        })
    }
}

fn set_once<T>(slot: &mut Option<T>, field: Field, value: T) -> Result<(), HomeParseError> {
    if slot.is_some() {
        return Err(HomeParseError::DuplicateField(field.name()));
    }
    *slot = Some(value);
    Ok(())
}

fn components<T: Copy + Default, const N: usize>(
    field: Field,
    literal: &Literal,
    convert: fn(&Literal) -> Option<T>,
) -> Result<[T; N], HomeParseError> {
    let Literal::Tuple(items) = literal else {
        return Err(HomeParseError::WrongArity {
            field: field.name(),
            expected: N,
            found: 1,
        });
    };

    if items.len() != N {
        return Err(HomeParseError::WrongArity {
            field: field.name(),
            expected: N,
            found: items.len(),
        });
    }

    let mut out = [T::default(); N];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = convert(item).ok_or_else(|| HomeParseError::InvalidLiteral {
            field: field.name().to_owned(),
            literal: format!("{item:?}"),
        })?;
    }
    Ok(out)
}

/// Split on commas that are not nested inside brackets or quotes.
fn split_top_level(s: &str) -> Result<Vec<&str>, HomeParseError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| HomeParseError::Malformed(s.to_owned()))?;
            }
            (None, ',') if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            (None, _) => {}
        }
    }

    if depth != 0 || quote.is_some() {
        return Err(HomeParseError::Malformed(s.to_owned()));
    }

    let last = s[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    Ok(parts)
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('\'')
        .and_then(|r| r.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|r| r.strip_suffix('"')))
        .unwrap_or(s)
}

/// Deepest tuple nesting [`parse_literal`] accepts.
pub const MAX_LITERAL_DEPTH: usize = 2;

/// Parse one literal.
///
/// # Errors
///
/// Returns [`HomeParseError::InvalidLiteral`] for anything outside the
/// accepted forms, including tuples nested deeper than
/// [`MAX_LITERAL_DEPTH`].
pub fn parse_literal(field: &str, text: &str) -> Result<Literal, HomeParseError> {
    parse_nested(field, text, 0)
}

fn parse_nested(field: &str, text: &str, depth: usize) -> Result<Literal, HomeParseError> {
    let invalid = || HomeParseError::InvalidLiteral {
        field: field.to_owned(),
        literal: text.to_owned(),
    };

    let bracketed = text
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .or_else(|| text.strip_prefix('(').and_then(|r| r.strip_suffix(')')));

    if let Some(inner) = bracketed {
        if depth >= MAX_LITERAL_DEPTH {
            return Err(invalid());
        }
        let items = split_top_level(inner)
            .map_err(|_| invalid())?
            .into_iter()
            .map(|item| parse_nested(field, item, depth + 1))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Literal::Tuple(items));
    }

    for q in ['\'', '"'] {
        if let Some(inner) = text.strip_prefix(q).and_then(|r| r.strip_suffix(q)) {
            if inner.contains(q) {
                return Err(invalid());
            }
            return Ok(Literal::Str(inner.to_owned()));
        }
    }

    let number = text.strip_prefix('r').unwrap_or(text);
    if number.is_empty()
        || !number
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
    {
        return Err(invalid());
    }

    if let Ok(n) = number.parse::<i64>() {
        return Ok(Literal::Int(n));
    }
    number
        .parse::<f64>()
        .ok()
        .filter(|x| x.is_finite())
        .map(Literal::Float)
        .ok_or_else(invalid)
}
