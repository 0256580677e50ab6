use thiserror::Error;

use crate::{Face, SequenceOp, SequenceStep};

const OP_ADD: i32 = 1;
const OP_REM_LINE: i32 = 2;
const OP_ADD_RECT: i32 = 3;
const OP_ADD_LINE: i32 = 4;

/// Flattens steps into integer records: an op code, its arguments, then the layer.
#[must_use]
pub fn pack(steps: &[SequenceStep]) -> Vec<Vec<i32>> {
    steps
        .iter()
        .map(|step| {
            let mut packed = Vec::with_capacity(step.len() * 5);
            for op in step {
                match *op {
                    SequenceOp::Add { x, y, layer } => {
                        packed.extend([OP_ADD, x, y, i32::from(layer)]);
                    }
                    SequenceOp::AddRect {
                        x1,
                        y1,
                        x2,
                        y2,
                        layer,
                    } => packed.extend([OP_ADD_RECT, x1, y1, x2, y2, i32::from(layer)]),
                    SequenceOp::AddLine { x, y, face, layer } => {
                        packed.extend([OP_ADD_LINE, x, y, face.mask(), i32::from(layer)]);
                    }
                    SequenceOp::RemLine { x, y, face, layer } => {
                        packed.extend([OP_REM_LINE, x, y, face.mask(), i32::from(layer)]);
                    }
                }
            }
            packed
        })
        .collect()
}

/// Rebuilds steps from records produced by [`pack`].
pub fn unpack(packed: &[Vec<i32>]) -> Result<Vec<SequenceStep>, UnpackError> {
    packed
        .iter()
        .enumerate()
        .map(|(step, record)| unpack_step(step, record))
        .collect()
}

fn unpack_step(step: usize, record: &[i32]) -> Result<SequenceStep, UnpackError> {
    let mut ops = Vec::new();
    let mut cursor = 0;
    while cursor < record.len() {
        let code = record[cursor];
        let arity = match code {
            OP_ADD => 3,
            OP_ADD_RECT => 5,
            OP_ADD_LINE | OP_REM_LINE => 4,
            other => return Err(UnpackError::UnknownOpCode { step, code: other }),
        };
        let args = record
            .get(cursor + 1..cursor + 1 + arity)
            .ok_or(UnpackError::Truncated { step })?;
        let layer = layer_from(step, args[arity - 1])?;

        let op = match code {
            OP_ADD => SequenceOp::Add {
                x: args[0],
                y: args[1],
                layer,
            },
            OP_ADD_RECT => SequenceOp::AddRect {
                x1: args[0],
                y1: args[1],
                x2: args[2],
                y2: args[3],
                layer,
            },
            _ => {
                let face = Face::from_mask(args[2])
                    .ok_or(UnpackError::InvalidFace { step, mask: args[2] })?;
                if code == OP_ADD_LINE {
                    SequenceOp::AddLine {
                        x: args[0],
                        y: args[1],
                        face,
                        layer,
                    }
                } else {
                    SequenceOp::RemLine {
                        x: args[0],
                        y: args[1],
                        face,
                        layer,
                    }
                }
            }
        };
        ops.push(op);
        cursor += 1 + arity;
    }
    Ok(ops)
}

fn layer_from(step: usize, value: i32) -> Result<u8, UnpackError> {
    u8::try_from(value)
        .ok()
        .filter(|layer| usize::from(*layer) < matrix_code_core::LAYER_COUNT)
        .ok_or(UnpackError::InvalidLayer { step, layer: value })
}

/// Errors raised while rebuilding packed steps.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum UnpackError {
    /// A record started with an op code that is not recognised.
    #[error("step {step}: unknown op code {code}")]
    UnknownOpCode {
        /// Index of the offending step.
        step: usize,
        /// Code that was read.
        code: i32,
    },
    /// A record ended before all arguments of its last op were read.
    #[error("step {step}: record ends mid-operation")]
    Truncated {
        /// Index of the offending step.
        step: usize,
    },
    /// A line op carried a face mask that is not a single face.
    #[error("step {step}: invalid face mask {mask}")]
    InvalidFace {
        /// Index of the offending step.
        step: usize,
        /// Mask that was read.
        mask: i32,
    },
    /// A layer index fell outside the available layers.
    #[error("step {step}: invalid layer {layer}")]
    InvalidLayer {
        /// Index of the offending step.
        step: usize,
        /// Layer value that was read.
        layer: i32,
    },
}
