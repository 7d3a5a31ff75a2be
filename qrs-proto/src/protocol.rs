//! Typed message schema for the simulator session protocol.
//!
//! Requests: INIT, RESET, DISCONNECT, SETSTATE, STEP.
//! Replies: ACK, TASKINFO, STATE.
//!
//! Per-agent vectors are positional numeric sequences; component order is
//! the layout documented on the length constants below.

/// Permitted per-agent vector lengths for SETSTATE.
pub const SETSTATE_LENS: [usize; 4] = [3, 6, 12, 13];

/// Waypoint command: [wx, wy, wz, wpsi].
pub const WAYPOINT_CMD_LEN: usize = 4;

/// Low-level control command: [pitch, roll, throttle, yaw_rate, voltage].
pub const CONTROL_CMD_LEN: usize = 5;

/// Velocity command: [u, v, w] body-frame.
pub const VELOCITY_CMD_LEN: usize = 3;

/// Noiseless per-agent state: position (3, NED), Euler attitude (3),
/// body-frame velocity (3), body-frame angular rate (3), thrust (1).
pub const NOISELESS_STATE_LEN: usize = 13;

/// Noisy/estimated per-agent state: estimated position (3) and attitude
/// (3), three placeholder zeros, measured angular rate (3), a
/// placeholder, measured body-frame acceleration (3), altimeter altitude
/// (positive up), GPS horizontal velocity (2), altitude rate (1).
pub const NOISY_STATE_LEN: usize = 20;

/// Command flavor carried by a STEP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepType {
    Waypoint = 1,
    Control = 2,
    Velocity = 3,
}

impl StepType {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            1 => Some(StepType::Waypoint),
            2 => Some(StepType::Control),
            3 => Some(StepType::Velocity),
            _ => None,
        }
    }

    /// Required per-agent command vector length for this step type.
    pub fn cmd_len(&self) -> usize {
        match self {
            StepType::Waypoint => WAYPOINT_CMD_LEN,
            StepType::Control => CONTROL_CMD_LEN,
            StepType::Velocity => VELOCITY_CMD_LEN,
        }
    }
}

/// One-byte message kind tag, serialized first in every body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgKind {
    Init = 1,
    Reset = 2,
    Disconnect = 3,
    SetState = 4,
    Step = 5,
    Ack = 6,
    TaskInfo = 7,
    State = 8,
}

impl MsgKind {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            1 => Some(MsgKind::Init),
            2 => Some(MsgKind::Reset),
            3 => Some(MsgKind::Disconnect),
            4 => Some(MsgKind::SetState),
            5 => Some(MsgKind::Step),
            6 => Some(MsgKind::Ack),
            7 => Some(MsgKind::TaskInfo),
            8 => Some(MsgKind::State),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MsgKind::Init => "INIT",
            MsgKind::Reset => "RESET",
            MsgKind::Disconnect => "DISCONNECT",
            MsgKind::SetState => "SETSTATE",
            MsgKind::Step => "STEP",
            MsgKind::Ack => "ACK",
            MsgKind::TaskInfo => "TASKINFO",
            MsgKind::State => "STATE",
        }
    }
}

/// Tagged union over all request and reply kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Init {
        task: String,
        realtime: bool,
    },
    Reset {
        value: bool,
    },
    Disconnect {
        quit: bool,
    },
    SetState {
        x: Vec<Vec<f64>>,
    },
    Step {
        dt: f64,
        step_type: StepType,
        cmd: Vec<Vec<f64>>,
    },
    Ack {
        error: bool,
        msg: String,
    },
    TaskInfo {
        timestep: f64,
        num_uavs: u32,
    },
    State {
        /// Noiseless per-agent state vectors.
        x: Vec<Vec<f64>>,
        /// Noisy/estimated per-agent state vectors.
        ex: Vec<Vec<f64>>,
    },
}

impl Message {
    pub fn kind(&self) -> MsgKind {
        match self {
            Message::Init { .. } => MsgKind::Init,
            Message::Reset { .. } => MsgKind::Reset,
            Message::Disconnect { .. } => MsgKind::Disconnect,
            Message::SetState { .. } => MsgKind::SetState,
            Message::Step { .. } => MsgKind::Step,
            Message::Ack { .. } => MsgKind::Ack,
            Message::TaskInfo { .. } => MsgKind::TaskInfo,
            Message::State { .. } => MsgKind::State,
        }
    }
}
