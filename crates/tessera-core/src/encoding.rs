//! Maps claims to the interleaved byte representation consumed by the
//! crypto engine, and computes the issuer encoding flags (`E`).

use chrono::{Datelike, Months, NaiveDate, Utc};

use crate::error::ProtocolError;
use crate::types::{AttributeProperties, Claim, EncodedAttribute, EncodedClaims, RangeMetadata};

/// Date format of date-typed claim values.
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Years looked back from today for the earliest encodable date.
pub const LOOKBACK_YEARS: u32 = 120;

/// Years looked forward from the end of the current year.
pub const LOOKAHEAD_YEARS: u32 = 50;

/// Days reserved per year in the year-and-day encoding.
const DAYS_PER_YEAR: i64 = 366;

/// Direct-encoding flag: the attribute value is placed in the token as is.
pub const FLAG_DIRECT: u8 = 0;

/// Hashed-encoding flag: the attribute value is hashed before use.
pub const FLAG_HASHED: u8 = 1;

/// Encodes claims relative to a fixed "today".
#[derive(Debug, Clone, Copy)]
pub struct AttributeEncoder {
    today: NaiveDate,
}

impl Default for AttributeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeEncoder {
    /// Encoder anchored at the current UTC date.
    pub fn new() -> Self {
        Self::at(Utc::now().date_naive())
    }

    /// Encoder anchored at a given date.
    pub fn at(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Encode `claims`, treating those named in `date_attributes` as dates.
    ///
    /// Date claims must carry exactly one value in `dd.mm.yyyy` form; they
    /// get a [`RangeMetadata`] entry and a fixed-width year-and-day value.
    /// All other claims have their values joined with `", "`.
    pub fn encode<S: AsRef<str>>(
        &self,
        claims: &[Claim],
        date_attributes: &[S],
    ) -> Result<EncodedClaims, ProtocolError> {
        let mut encoded = EncodedClaims::default();
        let (min_year, max_year) = self.year_window()?;

        for (i, claim) in claims.iter().enumerate() {
            let is_date = date_attributes.iter().any(|d| d.as_ref() == claim.name);
            let value = if is_date {
                let date = parse_single_date(claim)?;
                encoded.range_metadata.push(RangeMetadata {
                    attribute_name: claim.name.clone(),
                    encoded_index: 2 * i + 1,
                    min_year,
                    max_year,
                });
                encode_date(date, min_year, max_year)?
            } else {
                claim.values.join(", ").into_bytes()
            };

            let property = AttributeProperties {
                name: claim.name.clone(),
                qualitylevel: claim.quality_level.clone(),
            }
            .to_bytes()?;

            encoded.attributes.push(EncodedAttribute { value, property });
        }

        tracing::debug!(
            claims = claims.len(),
            dates = encoded.range_metadata.len(),
            "claims encoded"
        );

        Ok(encoded)
    }

    /// `(min_year, max_year)` of the encodable window.
    pub fn year_window(&self) -> Result<(i32, i32), ProtocolError> {
        let min_year = self.years_before(LOOKBACK_YEARS)?.year();
        let end_of_year = NaiveDate::from_ymd_opt(self.today.year(), 12, 31)
            .ok_or_else(|| ProtocolError::Encoding("invalid end of year".into()))?;
        let max_year = end_of_year
            .checked_add_months(Months::new(12 * LOOKAHEAD_YEARS))
            .ok_or_else(|| ProtocolError::Encoding("date window overflow".into()))?
            .year();
        Ok((min_year, max_year))
    }

    /// The date `years` calendar years before today.
    pub fn years_before(&self, years: u32) -> Result<NaiveDate, ProtocolError> {
        years_before(self.today, years)
    }
}

/// The date `years` calendar years before `date`. Feb 29 maps to Feb 28.
pub fn years_before(date: NaiveDate, years: u32) -> Result<NaiveDate, ProtocolError> {
    date.checked_sub_months(Months::new(12 * years))
        .ok_or_else(|| ProtocolError::Encoding(format!("cannot go back {} years", years)))
}

fn parse_single_date(claim: &Claim) -> Result<NaiveDate, ProtocolError> {
    let [value] = claim.values.as_slice() else {
        return Err(ProtocolError::Encoding(format!(
            "date attribute '{}' must carry exactly one value, got {}",
            claim.name,
            claim.values.len()
        )));
    };
    parse_date(value)
}

/// Parse a `dd.mm.yyyy` date value.
pub fn parse_date(value: &str) -> Result<NaiveDate, ProtocolError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| ProtocolError::Encoding(format!("invalid date '{}': {}", value, e)))
}

/// Year-and-day offset of `date` relative to January 1st of `min_year`.
pub fn year_and_day(date: NaiveDate, min_year: i32) -> Result<u32, ProtocolError> {
    let years = i64::from(date.year()) - i64::from(min_year);
    if years < 0 {
        return Err(ProtocolError::Encoding(format!(
            "date {} lies before the encodable window starting {}",
            date, min_year
        )));
    }
    let offset = years * DAYS_PER_YEAR + i64::from(date.ordinal0());
    u32::try_from(offset).map_err(|_| ProtocolError::Encoding("date offset overflow".into()))
}

/// Fixed-width (4-byte big-endian) attribute value for a date inside
/// `[min_year, max_year]`.
pub fn encode_date(
    date: NaiveDate,
    min_year: i32,
    max_year: i32,
) -> Result<Vec<u8>, ProtocolError> {
    if date.year() > max_year {
        return Err(ProtocolError::Encoding(format!(
            "date {} lies after the encodable window ending {}",
            date, max_year
        )));
    }
    Ok(year_and_day(date, min_year)?.to_be_bytes().to_vec())
}

/// Inverse of [`encode_date`] for the integer part.
pub fn decode_date_value(bytes: &[u8]) -> Result<u32, ProtocolError> {
    let arr: [u8; 4] = bytes
        .try_into()
        .map_err(|_| ProtocolError::Encoding(format!("expected 4 bytes, got {}", bytes.len())))?;
    Ok(u32::from_be_bytes(arr))
}

/// Issuer encoding flags: `E[2i]` is direct-encoded when claim `i` is a
/// range-proof attribute, every property slot is hashed.
pub fn issuer_encoding_flags<S: AsRef<str>>(claims: &[Claim], range_attributes: &[S]) -> Vec<u8> {
    claims
        .iter()
        .flat_map(|claim| {
            let direct = range_attributes.iter().any(|r| r.as_ref() == claim.name);
            [if direct { FLAG_DIRECT } else { FLAG_HASHED }, FLAG_HASHED]
        })
        .collect()
}
