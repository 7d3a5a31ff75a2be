//! Binary codec for message bodies (payload inside a length-delimited frame).
//!
//! Layout: one kind-tag byte, then fields little-endian. Strings and
//! vector collections are u32-length-prefixed; scalars are f64.

use thiserror::Error;

use crate::protocol::{Message, MsgKind, StepType};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload too short")]
    TooShort,
    #[error("unknown message kind: {0}")]
    BadKind(u8),
    #[error("unknown step type: {0}")]
    BadStepType(u8),
    #[error("invalid boolean byte: {0}")]
    BadBool(u8),
    #[error("invalid utf-8 in string field")]
    BadUtf8,
}

pub fn encode_message(msg: &Message) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.push(msg.kind() as u8);
    match msg {
        Message::Init { task, realtime } => {
            put_string(&mut out, task);
            out.push(*realtime as u8);
        }
        Message::Reset { value } => {
            out.push(*value as u8);
        }
        Message::Disconnect { quit } => {
            out.push(*quit as u8);
        }
        Message::SetState { x } => {
            put_vectors(&mut out, x);
        }
        Message::Step {
            dt,
            step_type,
            cmd,
        } => {
            out.extend_from_slice(&dt.to_le_bytes());
            out.push(*step_type as u8);
            put_vectors(&mut out, cmd);
        }
        Message::Ack { error, msg } => {
            out.push(*error as u8);
            put_string(&mut out, msg);
        }
        Message::TaskInfo { timestep, num_uavs } => {
            out.extend_from_slice(&timestep.to_le_bytes());
            out.extend_from_slice(&num_uavs.to_le_bytes());
        }
        Message::State { x, ex } => {
            put_vectors(&mut out, x);
            put_vectors(&mut out, ex);
        }
    }
    out
}

pub fn decode_message(bytes: &[u8]) -> Result<Message, DecodeError> {
    let mut c = Cursor::new(bytes);

    let tag = c.read_u8()?;
    let kind = MsgKind::from_u8(tag).ok_or(DecodeError::BadKind(tag))?;

    let msg = match kind {
        MsgKind::Init => Message::Init {
            task: c.read_string()?,
            realtime: c.read_bool()?,
        },
        MsgKind::Reset => Message::Reset {
            value: c.read_bool()?,
        },
        MsgKind::Disconnect => Message::Disconnect {
            quit: c.read_bool()?,
        },
        MsgKind::SetState => Message::SetState {
            x: c.read_vectors()?,
        },
        MsgKind::Step => {
            let dt = c.read_f64()?;
            let t = c.read_u8()?;
            let step_type = StepType::from_u8(t).ok_or(DecodeError::BadStepType(t))?;
            Message::Step {
                dt,
                step_type,
                cmd: c.read_vectors()?,
            }
        }
        MsgKind::Ack => Message::Ack {
            error: c.read_bool()?,
            msg: c.read_string()?,
        },
        MsgKind::TaskInfo => Message::TaskInfo {
            timestep: c.read_f64()?,
            num_uavs: c.read_u32()?,
        },
        MsgKind::State => Message::State {
            x: c.read_vectors()?,
            ex: c.read_vectors()?,
        },
    };
    Ok(msg)
}

fn put_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn put_vectors(out: &mut Vec<u8>, vs: &[Vec<f64>]) {
    out.extend_from_slice(&(vs.len() as u32).to_le_bytes());
    for v in vs {
        out.extend_from_slice(&(v.len() as u32).to_le_bytes());
        for &f in v {
            out.extend_from_slice(&f.to_le_bytes());
        }
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    off: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, off: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.off + n > self.bytes.len() {
            return Err(DecodeError::TooShort);
        }
        let s = &self.bytes[self.off..self.off + n];
        self.off += n;
        Ok(s)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_bool(&mut self) -> Result<bool, DecodeError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(DecodeError::BadBool(b)),
        }
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u32()? as usize;
        let b = self.take(len)?;
        String::from_utf8(b.to_vec()).map_err(|_| DecodeError::BadUtf8)
    }

    fn read_vectors(&mut self) -> Result<Vec<Vec<f64>>, DecodeError> {
        let count = self.read_u32()? as usize;
        let mut vs = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let len = self.read_u32()? as usize;
            let mut v = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                v.push(self.read_f64()?);
            }
            vs.push(v);
        }
        Ok(vs)
    }
}
