//! `SimClient`: synchronous, blocking session client for the simulator.
//!
//! Every operation is one full request/reply cycle: serialize, framed
//! send, framed receive, reply-type check. There is no background I/O;
//! a blocked receive is released only by the receive timeout or peer
//! closure.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

use crate::codec::{decode_message, encode_message, DecodeError};
use crate::frame::{read_frame, write_frame, FrameError};
use crate::protocol::{Message, MsgKind, StepType, SETSTATE_LENS};

/// Relative tolerance when checking that `dt` is a multiple of the
/// negotiated timestep.
pub const TOL: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum ClientError {
    // Transport: fatal to the in-flight operation, caller may reconnect.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    // Protocol: the remote answered, but not with what we asked for.
    #[error("remote error: {0}")]
    Remote(String),
    #[error("unexpected reply: expected {expected}, got {got}")]
    UnexpectedReply {
        expected: &'static str,
        got: &'static str,
    },

    // Validation: checked before any network I/O.
    #[error("session not initialized; call init() first")]
    NotInitialized,
    #[error("got {got} per-agent vectors instead of the {expected} agents in the task")]
    AgentCountMismatch { got: usize, expected: usize },
    #[error("wrong state vector length {got}; expected one of 3, 6, 12 or 13")]
    BadStateLen { got: usize },
    #[error("wrong command vector length {got}; expected {expected}")]
    BadCommandLen { got: usize, expected: usize },
    #[error("time increment {dt} must be a multiple of the timestep {time_step}")]
    BadTimeIncrement { dt: f64, time_step: f64 },
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Receive timeout for blocking replies. `None` blocks forever.
    pub recv_timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            recv_timeout: Some(Duration::from_secs(20)),
        }
    }
}

/// STATE reply: two parallel per-agent collections.
#[derive(Debug, Clone, PartialEq)]
pub struct StateReply {
    /// Noiseless per-agent state vectors (13 components each).
    pub x: Vec<Vec<f64>>,
    /// Noisy/estimated per-agent state vectors (20 components each).
    pub ex: Vec<Vec<f64>>,
}

/// TASKINFO reply: parameters negotiated at init.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskInfo {
    pub timestep: f64,
    pub num_uavs: usize,
}

/// Blocking protocol client owning one simulator session.
///
/// State machine: connected (uninitialized) after `connect`, initialized
/// after a successful `init`, back to uninitialized after `disconnect`
/// or `quit`. No stepping or state operation is permitted before init.
#[derive(Debug)]
pub struct SimClient {
    stream: TcpStream,
    initialized: bool,
    num_uavs: usize,
    time_step: f64,
}

impl SimClient {
    /// Open a stream socket to the simulator and set the receive timeout.
    ///
    /// A refused or unreachable connection surfaces immediately as an io
    /// error.
    pub fn connect<A: ToSocketAddrs>(addr: A, opts: ClientOptions) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(opts.recv_timeout)?;
        let _ = stream.set_nodelay(true);
        Ok(Self {
            stream,
            initialized: false,
            num_uavs: 0,
            time_step: 0.0,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of agents negotiated at init.
    pub fn num_uavs(&self) -> usize {
        self.num_uavs
    }

    /// Simulator timestep negotiated at init.
    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Initialize the simulator with the given task file.
    ///
    /// Sends INIT, then performs two blocking receives: the initial
    /// STATE and the TASKINFO carrying the negotiated timestep and agent
    /// count. Both must succeed before the session counts as
    /// initialized.
    pub fn init(
        &mut self,
        task: &str,
        realtime: bool,
    ) -> Result<(StateReply, TaskInfo), ClientError> {
        self.send(&Message::Init {
            task: task.to_string(),
            realtime,
        })?;

        let state = self.receive_state()?;
        let info = self.receive_info()?;

        self.num_uavs = info.num_uavs;
        self.time_step = info.timestep;
        self.initialized = true;
        Ok((state, info))
    }

    /// Reset the simulator to the task's initial state.
    pub fn reset(&mut self) -> Result<(), ClientError> {
        self.require_init()?;
        self.send(&Message::Reset { value: true })?;
        self.receive_ack()
    }

    /// Disconnect, leaving the simulator running for other clients.
    pub fn disconnect(&mut self) -> Result<(), ClientError> {
        self.require_init()?;
        self.send(&Message::Disconnect { quit: false })?;
        self.receive_ack()?;
        self.initialized = false;
        Ok(())
    }

    /// Disconnect and flag the simulator for shutdown.
    pub fn quit(&mut self) -> Result<(), ClientError> {
        self.require_init()?;
        self.send(&Message::Disconnect { quit: true })?;
        self.receive_ack()?;
        self.initialized = false;
        Ok(())
    }

    /// Overwrite the agents' noiseless states.
    ///
    /// Each per-agent vector must have one of the permitted lengths
    /// (3, 6, 12 or 13 components); validation happens before any bytes
    /// are written to the socket.
    pub fn set_state(&mut self, x: &[Vec<f64>]) -> Result<(), ClientError> {
        self.require_init()?;
        if x.len() != self.num_uavs {
            return Err(ClientError::AgentCountMismatch {
                got: x.len(),
                expected: self.num_uavs,
            });
        }
        for xi in x {
            if !SETSTATE_LENS.contains(&xi.len()) {
                return Err(ClientError::BadStateLen { got: xi.len() });
            }
        }

        self.send(&Message::SetState { x: x.to_vec() })?;
        self.receive_ack()
    }

    /// Step the simulator with one waypoint [wx, wy, wz, wpsi] per agent.
    pub fn step_waypoint(
        &mut self,
        dt: f64,
        wp: &[Vec<f64>],
    ) -> Result<StateReply, ClientError> {
        self.validate_cmd(wp, StepType::Waypoint)?;
        self.step(StepType::Waypoint, dt, wp)
    }

    /// Step the simulator with one low-level control vector per agent.
    pub fn step_control(
        &mut self,
        dt: f64,
        ctrl: &[Vec<f64>],
    ) -> Result<StateReply, ClientError> {
        self.validate_cmd(ctrl, StepType::Control)?;
        self.step(StepType::Control, dt, ctrl)
    }

    /// Step the simulator with one body-frame velocity [u, v, w] per agent.
    pub fn step_velocity(
        &mut self,
        dt: f64,
        vel: &[Vec<f64>],
    ) -> Result<StateReply, ClientError> {
        self.validate_cmd(vel, StepType::Velocity)?;
        self.step(StepType::Velocity, dt, vel)
    }

    fn validate_cmd(&self, cmd: &[Vec<f64>], step_type: StepType) -> Result<(), ClientError> {
        if cmd.len() != self.num_uavs {
            return Err(ClientError::AgentCountMismatch {
                got: cmd.len(),
                expected: self.num_uavs,
            });
        }
        for ci in cmd {
            if ci.len() != step_type.cmd_len() {
                return Err(ClientError::BadCommandLen {
                    got: ci.len(),
                    expected: step_type.cmd_len(),
                });
            }
        }
        Ok(())
    }

    fn step(
        &mut self,
        step_type: StepType,
        dt: f64,
        cmd: &[Vec<f64>],
    ) -> Result<StateReply, ClientError> {
        self.require_init()?;

        // dt must be an integer multiple of the negotiated timestep:
        // the fractional part of dt/timeStep within TOL of 0 or 1.
        let f = (dt / self.time_step).fract();
        if !(f <= TOL || (1.0 - f).abs() <= TOL) {
            return Err(ClientError::BadTimeIncrement {
                dt,
                time_step: self.time_step,
            });
        }

        self.send(&Message::Step {
            dt,
            step_type,
            cmd: cmd.to_vec(),
        })?;
        self.receive_state()
    }

    fn require_init(&self) -> Result<(), ClientError> {
        if !self.initialized {
            return Err(ClientError::NotInitialized);
        }
        Ok(())
    }

    /// Serialize and send one framed request. A partial write is a hard
    /// transport failure (surfaced by `write_frame`), not retried.
    fn send(&mut self, msg: &Message) -> Result<(), ClientError> {
        let payload = encode_message(msg);
        write_frame(&mut self.stream, &payload)?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Message, ClientError> {
        let payload = read_frame(&mut self.stream)?;
        Ok(decode_message(&payload)?)
    }

    fn receive_ack(&mut self) -> Result<(), ClientError> {
        match self.receive()? {
            Message::Ack { error: false, .. } => Ok(()),
            Message::Ack { error: true, msg } => Err(ClientError::Remote(msg)),
            other => Err(ClientError::UnexpectedReply {
                expected: MsgKind::Ack.name(),
                got: other.kind().name(),
            }),
        }
    }

    fn receive_state(&mut self) -> Result<StateReply, ClientError> {
        match self.receive()? {
            Message::State { x, ex } => Ok(StateReply { x, ex }),
            Message::Ack { error: true, msg } => Err(ClientError::Remote(msg)),
            other => Err(ClientError::UnexpectedReply {
                expected: MsgKind::State.name(),
                got: other.kind().name(),
            }),
        }
    }

    fn receive_info(&mut self) -> Result<TaskInfo, ClientError> {
        match self.receive()? {
            Message::TaskInfo { timestep, num_uavs } => Ok(TaskInfo {
                timestep,
                num_uavs: num_uavs as usize,
            }),
            Message::Ack { error: true, msg } => Err(ClientError::Remote(msg)),
            other => Err(ClientError::UnexpectedReply {
                expected: MsgKind::TaskInfo.name(),
                got: other.kind().name(),
            }),
        }
    }
}
