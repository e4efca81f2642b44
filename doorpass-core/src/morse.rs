//! Morse knock-pattern credentials.
//!
//! A knock password is written as seven units, each either a short knock
//! (`.`) or a long knock (`._`). The seventh unit is a fixed terminator and
//! carries no data; the first six map to bits (`.` = 0, `._` = 1) giving the
//! six-bit binary password the lock listens for.

use rand::Rng;
use std::time::Duration;
use thiserror::Error;

/// Units in a complete knock sequence, terminator included.
pub const SEQUENCE_UNITS: usize = 7;

/// Units that carry data.
pub const DATA_UNITS: usize = SEQUENCE_UNITS - 1;

/// Silence between knocks above which the gap decodes as a `1`.
pub const DEFAULT_BIT_THRESHOLD: Duration = Duration::from_millis(600);

const SHORT_MARK: u8 = b'.';
const EXTENSION_MARKS: [u8; 2] = [b'_', b'-'];

/// Morse codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MorseError {
    #[error("sequence has {units} of 7 units")]
    Incomplete { units: usize },

    #[error("sequence has {units} units, expected 7")]
    TooLong { units: usize },

    #[error("unexpected symbol {symbol:?} at byte {position}")]
    InvalidSymbol { position: usize, symbol: char },
}

/// One knock unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MorseUnit {
    Short,
    Long,
}

impl MorseUnit {
    /// Canonical textual form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => ".",
            Self::Long => "._",
        }
    }

    /// Bit carried by this unit.
    pub fn bit(&self) -> char {
        match self {
            Self::Short => '0',
            Self::Long => '1',
        }
    }
}

/// Encoded form of a complete knock sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorseEncoding {
    /// Six-character binary password, first unit most significant.
    pub binary: String,
    /// The raw sequence without its terminator.
    pub knock: String,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    unit: MorseUnit,
    start: usize,
}

fn tokenize(raw: &str) -> Result<Vec<Token>, MorseError> {
    let bytes = raw.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        if byte.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if byte != SHORT_MARK {
            let symbol = raw[i..].chars().next().unwrap_or('?');
            return Err(MorseError::InvalidSymbol {
                position: i,
                symbol,
            });
        }

        // Long unit wins over short when the extension mark follows.
        if bytes
            .get(i + 1)
            .is_some_and(|next| EXTENSION_MARKS.contains(next))
        {
            tokens.push(Token {
                unit: MorseUnit::Long,
                start: i,
            });
            i += 2;
        } else {
            tokens.push(Token {
                unit: MorseUnit::Short,
                start: i,
            });
            i += 1;
        }
    }

    Ok(tokens)
}

/// Split a raw sequence into units.
pub fn parse_units(raw: &str) -> Result<Vec<MorseUnit>, MorseError> {
    Ok(tokenize(raw)?.into_iter().map(|t| t.unit).collect())
}

/// Render units in canonical form (no separators).
pub fn render(units: &[MorseUnit]) -> String {
    units.iter().map(MorseUnit::as_str).collect()
}

/// Encode a complete seven-unit sequence.
///
/// The terminal unit is dropped before encoding and never influences the
/// result.
pub fn encode(raw: &str) -> Result<MorseEncoding, MorseError> {
    let tokens = tokenize(raw)?;

    if tokens.len() < SEQUENCE_UNITS {
        return Err(MorseError::Incomplete {
            units: tokens.len(),
        });
    }
    if tokens.len() > SEQUENCE_UNITS {
        return Err(MorseError::TooLong {
            units: tokens.len(),
        });
    }

    let binary = tokens[..DATA_UNITS].iter().map(|t| t.unit.bit()).collect();
    let knock = raw[..tokens[DATA_UNITS].start].trim_end().to_string();

    Ok(MorseEncoding { binary, knock })
}

/// Generate a random valid sequence using the given RNG.
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut units: Vec<MorseUnit> = (0..DATA_UNITS)
        .map(|_| {
            if rng.gen_bool(0.5) {
                MorseUnit::Long
            } else {
                MorseUnit::Short
            }
        })
        .collect();
    units.push(MorseUnit::Short);
    render(&units)
}

/// Generate a random valid sequence.
pub fn generate() -> String {
    generate_with(&mut rand::thread_rng())
}

/// Interactive collector for a knock sequence.
///
/// Once the sixth data unit is entered the terminator is appended and the
/// collector stops accepting input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MorseInput {
    units: Vec<MorseUnit>,
}

impl MorseInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from an existing sequence, e.g. when editing a stored pass.
    pub fn from_sequence(raw: &str) -> Result<Self, MorseError> {
        let units = parse_units(raw)?;
        if units.len() > SEQUENCE_UNITS {
            return Err(MorseError::TooLong { units: units.len() });
        }
        let mut input = Self::new();
        for unit in units.into_iter().take(DATA_UNITS) {
            input.push(unit);
        }
        Ok(input)
    }

    /// Enter one unit. Returns `false` when the sequence is already complete.
    pub fn push(&mut self, unit: MorseUnit) -> bool {
        if self.units.len() >= DATA_UNITS {
            return false;
        }
        self.units.push(unit);
        if self.units.len() == DATA_UNITS {
            self.units.push(MorseUnit::Short);
        }
        true
    }

    pub fn clear(&mut self) {
        self.units.clear();
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn is_complete(&self) -> bool {
        self.units.len() == SEQUENCE_UNITS
    }

    /// Canonical text of what has been entered so far.
    pub fn sequence(&self) -> String {
        render(&self.units)
    }

    pub fn encode(&self) -> Result<MorseEncoding, MorseError> {
        encode(&self.sequence())
    }
}

/// Decode the silences between consecutive knocks into bits.
pub fn decode_intervals(silences: &[Duration], bit_threshold: Duration) -> String {
    silences
        .iter()
        .map(|gap| if *gap > bit_threshold { '1' } else { '0' })
        .collect()
}

/// Whether a stored binary password appears in a decoded knock stream.
pub fn matches_binary(password: &str, decoded: &str) -> bool {
    !password.is_empty() && decoded.contains(password)
}
