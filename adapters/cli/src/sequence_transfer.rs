use std::{error::Error, fmt};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use matrix_code_system_sequence::{pack, unpack, SequenceOp, SequenceStep, UnpackError};

const TRANSFER_DOMAIN: &str = "mosaic";
const TRANSFER_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded sequence payload.
pub(crate) const TRANSFER_HEADER: &str = "mosaic:v1";
/// Delimiter used to separate the prefix, grid dimensions and payload.
const FIELD_DELIMITER: char = ':';

/// Generated mosaic sequence together with the logical grid it was sized for.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SequenceTransfer {
    /// Logical columns the sequence was generated for.
    pub(crate) columns: u32,
    /// Logical rows the sequence was generated for.
    pub(crate) rows: u32,
    /// Ordered growth steps.
    pub(crate) steps: Vec<SequenceStep>,
}

impl SequenceTransfer {
    /// Encodes the sequence into a single-line string suitable for copy and paste.
    pub(crate) fn encode(&self) -> Result<String, SequenceTransferError> {
        let json = serde_json::to_vec(&pack(&self.steps))
            .map_err(SequenceTransferError::InvalidPayload)?;
        let encoded = STANDARD_NO_PAD.encode(json);
        Ok(format!(
            "{TRANSFER_HEADER}:{}x{}:{encoded}",
            self.columns, self.rows
        ))
    }

    /// Decodes a sequence from the provided string representation.
    pub(crate) fn decode(value: &str) -> Result<Self, SequenceTransferError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(SequenceTransferError::EmptyPayload);
        }

        let mut parts = trimmed.split(FIELD_DELIMITER);
        let domain = parts.next().ok_or(SequenceTransferError::MissingPrefix)?;
        let version = parts.next().ok_or(SequenceTransferError::MissingVersion)?;
        let dimensions = parts
            .next()
            .ok_or(SequenceTransferError::MissingDimensions)?;
        let payload = parts.next().ok_or(SequenceTransferError::MissingPayload)?;

        if domain != TRANSFER_DOMAIN {
            return Err(SequenceTransferError::InvalidPrefix(domain.to_owned()));
        }
        if version != TRANSFER_VERSION {
            return Err(SequenceTransferError::UnsupportedVersion(
                version.to_owned(),
            ));
        }

        let (columns, rows) = parse_dimensions(dimensions)?;
        let bytes = STANDARD_NO_PAD
            .decode(payload.as_bytes())
            .map_err(SequenceTransferError::InvalidEncoding)?;
        let packed: Vec<Vec<i32>> =
            serde_json::from_slice(&bytes).map_err(SequenceTransferError::InvalidPayload)?;
        let steps = unpack(&packed).map_err(SequenceTransferError::InvalidSteps)?;

        Ok(Self {
            columns,
            rows,
            steps,
        })
    }

    /// Tallies the operations contained in every step.
    #[must_use]
    pub(crate) fn op_counts(&self) -> OpCounts {
        let mut counts = OpCounts::default();
        for op in self.steps.iter().flatten() {
            match op {
                SequenceOp::Add { .. } => counts.add += 1,
                SequenceOp::AddRect { .. } => counts.add_rect += 1,
                SequenceOp::AddLine { .. } => counts.add_line += 1,
                SequenceOp::RemLine { .. } => counts.rem_line += 1,
            }
        }
        counts
    }
}

/// Number of operations of each kind in a sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct OpCounts {
    pub(crate) add: usize,
    pub(crate) add_rect: usize,
    pub(crate) add_line: usize,
    pub(crate) rem_line: usize,
}

impl OpCounts {
    /// Total operations across every kind.
    #[must_use]
    pub(crate) const fn total(&self) -> usize {
        self.add + self.add_rect + self.add_line + self.rem_line
    }
}

/// Errors that can occur while encoding or decoding sequence transfer strings.
#[derive(Debug)]
pub(crate) enum SequenceTransferError {
    /// The provided string was empty or contained only whitespace.
    EmptyPayload,
    /// The prefix segment was missing from the transfer string.
    MissingPrefix,
    /// The transfer string did not contain a version segment.
    MissingVersion,
    /// The transfer string did not include grid dimensions.
    MissingDimensions,
    /// The transfer string did not include the payload segment.
    MissingPayload,
    /// The transfer string used an unexpected prefix segment.
    InvalidPrefix(String),
    /// The transfer string used an unsupported version identifier.
    UnsupportedVersion(String),
    /// The grid dimensions could not be parsed.
    InvalidDimensions(String),
    /// The base64 payload could not be decoded.
    InvalidEncoding(base64::DecodeError),
    /// The payload was not a JSON list of packed steps.
    InvalidPayload(serde_json::Error),
    /// A packed step did not describe valid operations.
    InvalidSteps(UnpackError),
}

impl fmt::Display for SequenceTransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "sequence string was empty"),
            Self::MissingPrefix => write!(f, "sequence string is missing the prefix"),
            Self::MissingVersion => write!(f, "sequence string is missing the version"),
            Self::MissingDimensions => {
                write!(f, "sequence string is missing the grid dimensions")
            }
            Self::MissingPayload => write!(f, "sequence string is missing the payload"),
            Self::InvalidPrefix(prefix) => {
                write!(f, "sequence prefix '{prefix}' is not supported")
            }
            Self::UnsupportedVersion(version) => {
                write!(f, "sequence version '{version}' is not supported")
            }
            Self::InvalidDimensions(dimensions) => {
                write!(f, "could not parse grid dimensions '{dimensions}'")
            }
            Self::InvalidEncoding(error) => {
                write!(f, "could not decode sequence payload: {error}")
            }
            Self::InvalidPayload(error) => {
                write!(f, "could not parse sequence payload: {error}")
            }
            Self::InvalidSteps(error) => write!(f, "sequence steps are malformed: {error}"),
        }
    }
}

impl Error for SequenceTransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEncoding(error) => Some(error),
            Self::InvalidPayload(error) => Some(error),
            Self::InvalidSteps(error) => Some(error),
            _ => None,
        }
    }
}

fn parse_dimensions(dimensions: &str) -> Result<(u32, u32), SequenceTransferError> {
    let invalid = || SequenceTransferError::InvalidDimensions(dimensions.to_owned());
    let (columns, rows) = dimensions.split_once(['x', 'X']).ok_or_else(invalid)?;

    let columns = columns.trim().parse::<u32>().map_err(|_| invalid())?;
    let rows = rows.trim().parse::<u32>().map_err(|_| invalid())?;

    if columns == 0 || rows == 0 {
        return Err(invalid());
    }

    Ok((columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use matrix_code_system_sequence::Face;

    fn sample() -> SequenceTransfer {
        SequenceTransfer {
            columns: 20,
            rows: 15,
            steps: vec![
                vec![SequenceOp::Add {
                    x: 0,
                    y: 0,
                    layer: 0,
                }],
                vec![
                    SequenceOp::AddRect {
                        x1: -2,
                        y1: -1,
                        x2: 1,
                        y2: 2,
                        layer: 1,
                    },
                    SequenceOp::AddLine {
                        x: 1,
                        y: 2,
                        face: Face::East,
                        layer: 1,
                    },
                ],
                vec![SequenceOp::RemLine {
                    x: 1,
                    y: 2,
                    face: Face::East,
                    layer: 1,
                }],
            ],
        }
    }

    #[test]
    fn encoded_string_carries_header_and_dimensions() {
        let encoded = sample().encode().expect("packed steps serialise");
        assert!(encoded.starts_with(&format!("{TRANSFER_HEADER}:20x15:")));

        let decoded = SequenceTransfer::decode(&format!("  {encoded}\n")).expect("decodes");
        assert_eq!(decoded, sample());
    }

    #[test]
    fn empty_sequence_survives_transfer() {
        let transfer = SequenceTransfer {
            columns: 3,
            rows: 4,
            steps: Vec::new(),
        };
        let encoded = transfer.encode().expect("empty list serialises");
        assert_eq!(SequenceTransfer::decode(&encoded).ok(), Some(transfer));
    }

    #[test]
    fn op_counts_tally_each_kind() {
        let counts = sample().op_counts();
        assert_eq!(
            counts,
            OpCounts {
                add: 1,
                add_rect: 1,
                add_line: 1,
                rem_line: 1,
            }
        );
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn structural_errors_name_the_missing_segment() {
        assert!(matches!(
            SequenceTransfer::decode("   "),
            Err(SequenceTransferError::EmptyPayload)
        ));
        assert!(matches!(
            SequenceTransfer::decode("mosaic"),
            Err(SequenceTransferError::MissingVersion)
        ));
        assert!(matches!(
            SequenceTransfer::decode("mosaic:v1"),
            Err(SequenceTransferError::MissingDimensions)
        ));
        assert!(matches!(
            SequenceTransfer::decode("mosaic:v1:4x4"),
            Err(SequenceTransferError::MissingPayload)
        ));
        assert!(matches!(
            SequenceTransfer::decode("glyph:v1:4x4:W10"),
            Err(SequenceTransferError::InvalidPrefix(prefix)) if prefix == "glyph"
        ));
        assert!(matches!(
            SequenceTransfer::decode("mosaic:v2:4x4:W10"),
            Err(SequenceTransferError::UnsupportedVersion(version)) if version == "v2"
        ));
    }

    #[test]
    fn dimensions_must_be_positive_integers() {
        for dimensions in ["4", "0x4", "4x0", "ax4", "4x-1"] {
            let value = format!("mosaic:v1:{dimensions}:W10");
            assert!(
                matches!(
                    SequenceTransfer::decode(&value),
                    Err(SequenceTransferError::InvalidDimensions(_))
                ),
                "{dimensions} should be rejected"
            );
        }
        assert_eq!(parse_dimensions("12X8").ok(), Some((12, 8)));
    }

    #[test]
    fn payload_errors_are_layered() {
        assert!(matches!(
            SequenceTransfer::decode("mosaic:v1:4x4:!!!"),
            Err(SequenceTransferError::InvalidEncoding(_))
        ));

        let not_json = STANDARD_NO_PAD.encode("not json");
        assert!(matches!(
            SequenceTransfer::decode(&format!("mosaic:v1:4x4:{not_json}")),
            Err(SequenceTransferError::InvalidPayload(_))
        ));

        let bad_op = STANDARD_NO_PAD.encode("[[9,0,0,0]]");
        let error = SequenceTransfer::decode(&format!("mosaic:v1:4x4:{bad_op}"))
            .expect_err("op code 9 is unknown");
        assert!(matches!(error, SequenceTransferError::InvalidSteps(_)));
        assert!(error.source().is_some());
    }
}
