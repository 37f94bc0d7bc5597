use crate::core::io::traits::FormatReader;
use crate::core::models::frequency::FrequencyReport;
use std::io::{self, BufRead};
use thiserror::Error;

pub const SECTION_HEADER: &str = "VIBRATIONAL FREQUENCIES";
const LINES_AFTER_HEADER: usize = 2;
const UNIT_TOKEN: &str = "cm**-1";

#[derive(Debug, Error)]
pub enum FrequencyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Section '{}' not found", SECTION_HEADER)]
    MissingSection,
    #[error("Section header on line {line} is followed by fewer than two lines")]
    TruncatedHeader { line: usize },
}

/// Reads the vibrational-frequency table of a quantum-chemistry output file.
///
/// The section starts at the first line containing [`SECTION_HEADER`]. The two lines after
/// the header are skipped unconditionally, then records of the form `  6:  -15.30 cm**-1`
/// are collected until a blank line. Lines that are not records are ignored, and blank
/// lines before the first record do not end the section.
pub struct FrequencySection;

impl FormatReader for FrequencySection {
    type Output = FrequencyReport;
    type Error = FrequencyError;

    fn read_from(&self, reader: &mut impl BufRead) -> Result<Self::Output, Self::Error> {
        let mut lines = reader.lines().enumerate();

        let header_line = loop {
            let Some((i, line)) = lines.next() else {
                return Err(FrequencyError::MissingSection);
            };
            if line?.contains(SECTION_HEADER) {
                break i + 1;
            }
        };

        for _ in 0..LINES_AFTER_HEADER {
            match lines.next() {
                Some((_, line)) => {
                    line?;
                }
                None => return Err(FrequencyError::TruncatedHeader { line: header_line }),
            }
        }

        let mut frequencies = Vec::new();
        for (_, line) in lines {
            let line = line?;
            if line.trim().is_empty() {
                if frequencies.is_empty() {
                    continue;
                }
                break;
            }
            if let Some(value) = parse_record(&line) {
                frequencies.push(value);
            }
        }

        Ok(FrequencyReport::new(frequencies))
    }
}

/// Matches `<index>: <signed decimal> cm**-1`, returning the decimal. The unit may also
/// follow the number directly, as in `5: -15.30cm**-1`.
fn parse_record(line: &str) -> Option<f64> {
    let mut tokens = line.split_whitespace();

    let index = tokens.next()?.strip_suffix(':')?;
    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let token = tokens.next()?;
    let value = match token.strip_suffix(UNIT_TOKEN) {
        Some(value) => value,
        None if tokens.next()? == UNIT_TOKEN => token,
        None => return None,
    };
    if !is_decimal(value) {
        return None;
    }
    value.parse().ok()
}

/// `-?\d+\.\d+`
fn is_decimal(token: &str) -> bool {
    let unsigned = token.strip_prefix('-').unwrap_or(token);
    match unsigned.split_once('.') {
        Some((whole, frac)) => {
            !whole.is_empty()
                && !frac.is_empty()
                && whole.chars().all(|c| c.is_ascii_digit())
                && frac.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}
