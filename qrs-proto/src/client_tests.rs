use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use crate::client::{ClientError, ClientOptions, SimClient};
use crate::codec::{decode_message, encode_message};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Message, StepType};

/// Spawn a one-connection dummy simulator. `script` gets the accepted
/// socket after the INIT handshake has been answered.
fn spawn_server<F>(
    timestep: f64,
    num_uavs: u32,
    script: F,
) -> (std::net::SocketAddr, JoinHandle<()>)
where
    F: FnOnce(&mut std::net::TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let (mut sock, _peer) = listener.accept().unwrap();

        let payload = read_frame(&mut sock).unwrap();
        let msg = decode_message(&payload).unwrap();
        assert!(matches!(msg, Message::Init { .. }), "first frame not INIT");

        let state = Message::State {
            x: vec![vec![0.0; 13]; num_uavs as usize],
            ex: vec![vec![0.0; 20]; num_uavs as usize],
        };
        write_frame(&mut sock, &encode_message(&state)).unwrap();
        let info = Message::TaskInfo { timestep, num_uavs };
        write_frame(&mut sock, &encode_message(&info)).unwrap();

        script(&mut sock);
    });

    (addr, handle)
}

fn connected_client(addr: std::net::SocketAddr) -> SimClient {
    let mut client = SimClient::connect(addr, ClientOptions::default()).unwrap();
    let (state, info) = client.init("TaskKeepSpot", false).unwrap();
    assert_eq!(state.x.len(), info.num_uavs);
    client
}

fn answer_ack(sock: &mut std::net::TcpStream) {
    let _ = read_frame(sock).unwrap();
    let ack = Message::Ack {
        error: false,
        msg: String::new(),
    };
    write_frame(sock, &encode_message(&ack)).unwrap();
}

fn answer_state(sock: &mut std::net::TcpStream, num_uavs: usize) {
    let _ = read_frame(sock).unwrap();
    let state = Message::State {
        x: vec![vec![0.0; 13]; num_uavs],
        ex: vec![vec![0.0; 20]; num_uavs],
    };
    write_frame(sock, &encode_message(&state)).unwrap();
}

#[test]
fn init_negotiates_session() {
    let (addr, server) = spawn_server(0.02, 3, |_sock| {});

    let mut client = SimClient::connect(addr, ClientOptions::default()).unwrap();
    assert!(!client.is_initialized());

    let (state, info) = client.init("TaskKeepSpot", true).unwrap();
    assert!(client.is_initialized());
    assert_eq!(info.num_uavs, 3);
    assert!((info.timestep - 0.02).abs() < 1e-12);
    assert_eq!(client.num_uavs(), 3);
    assert_eq!(state.x.len(), 3);
    assert_eq!(state.ex.len(), 3);
    assert_eq!(state.x[0].len(), 13);
    assert_eq!(state.ex[0].len(), 20);

    server.join().unwrap();
}

#[test]
fn ops_require_init() {
    let (addr, server) = spawn_server(0.02, 1, |_sock| {});

    // Fresh connection, no handshake from this client instance.
    let mut client = SimClient::connect(addr, ClientOptions::default()).unwrap();
    assert!(matches!(client.reset(), Err(ClientError::NotInitialized)));
    assert!(matches!(
        client.set_state(&[vec![0.0; 13]]),
        Err(ClientError::NotInitialized)
    ));
    assert!(matches!(
        client.quit(),
        Err(ClientError::NotInitialized)
    ));

    // Handshake now so the blocked accept thread can finish.
    let _ = client.init("TaskKeepSpot", false).unwrap();
    server.join().unwrap();
}

#[test]
fn step_accepts_multiples_of_timestep() {
    let (addr, server) = spawn_server(1.0, 1, |sock| {
        answer_state(sock, 1); // dt = 1.0
        answer_state(sock, 1); // dt = 3.0
        answer_state(sock, 1); // dt within tolerance
        answer_ack(sock); // quit
    });

    let mut client = connected_client(addr);

    client.step_velocity(1.0, &[vec![0.5, 0.0, 0.0]]).unwrap();
    client.step_velocity(3.0, &[vec![0.5, 0.0, 0.0]]).unwrap();
    // Inside the tolerance band around an exact multiple.
    client
        .step_velocity(1.0 + 0.5e-6, &[vec![0.5, 0.0, 0.0]])
        .unwrap();

    client.quit().unwrap();
    server.join().unwrap();
}

#[test]
fn step_rejects_non_multiple_dt_before_io() {
    // Server answers exactly one post-handshake request (the quit);
    // rejected steps must never reach it.
    let (addr, server) = spawn_server(1.0, 1, |sock| {
        answer_ack(sock);
    });

    let mut client = connected_client(addr);

    match client.step_velocity(1.5, &[vec![0.0; 3]]) {
        Err(ClientError::BadTimeIncrement { dt, time_step }) => {
            assert!((dt - 1.5).abs() < 1e-12);
            assert!((time_step - 1.0).abs() < 1e-12);
        }
        other => panic!("expected BadTimeIncrement, got {other:?}"),
    }
    // Just past the tolerance band.
    assert!(matches!(
        client.step_velocity(1.0 + 1e-5, &[vec![0.0; 3]]),
        Err(ClientError::BadTimeIncrement { .. })
    ));

    client.quit().unwrap();
    server.join().unwrap();
}

#[test]
fn setstate_wrong_len_rejected_before_io() {
    let (addr, server) = spawn_server(0.02, 2, |sock| {
        // First post-handshake frame must be the RESET, proving the
        // rejected SETSTATE wrote nothing.
        let payload = read_frame(sock).unwrap();
        let msg = decode_message(&payload).unwrap();
        assert!(matches!(msg, Message::Reset { value: true }));
        let ack = Message::Ack {
            error: false,
            msg: String::new(),
        };
        write_frame(sock, &encode_message(&ack)).unwrap();
        answer_ack(sock); // quit
    });

    let mut client = connected_client(addr);

    assert!(matches!(
        client.set_state(&[vec![0.0; 7], vec![0.0; 7]]),
        Err(ClientError::BadStateLen { got: 7 })
    ));
    assert!(matches!(
        client.set_state(&[vec![0.0; 13]]),
        Err(ClientError::AgentCountMismatch {
            got: 1,
            expected: 2
        })
    ));

    client.reset().unwrap();
    client.quit().unwrap();
    server.join().unwrap();
}

#[test]
fn command_len_checked_per_step_type() {
    let (addr, server) = spawn_server(0.02, 1, |sock| {
        answer_ack(sock); // quit
    });

    let mut client = connected_client(addr);

    assert!(matches!(
        client.step_velocity(0.02, &[vec![0.0; 4]]),
        Err(ClientError::BadCommandLen {
            got: 4,
            expected: 3
        })
    ));
    assert!(matches!(
        client.step_waypoint(0.02, &[vec![0.0; 3]]),
        Err(ClientError::BadCommandLen {
            got: 3,
            expected: 4
        })
    ));
    assert!(matches!(
        client.step_control(0.02, &[vec![0.0; 4]]),
        Err(ClientError::BadCommandLen {
            got: 4,
            expected: 5
        })
    ));

    client.quit().unwrap();
    server.join().unwrap();
}

#[test]
fn remote_ack_error_surfaces_message() {
    let (addr, server) = spawn_server(0.02, 1, |sock| {
        let _ = read_frame(sock).unwrap();
        let ack = Message::Ack {
            error: true,
            msg: "task file not found".to_string(),
        };
        write_frame(sock, &encode_message(&ack)).unwrap();
    });

    let mut client = connected_client(addr);

    match client.reset() {
        Err(ClientError::Remote(msg)) => assert!(msg.contains("not found")),
        other => panic!("expected Remote, got {other:?}"),
    }
    server.join().unwrap();
}

#[test]
fn unexpected_reply_kind_is_reported() {
    let (addr, server) = spawn_server(0.02, 1, |sock| {
        let _ = read_frame(sock).unwrap();
        // Answer the RESET with a TASKINFO.
        let info = Message::TaskInfo {
            timestep: 0.02,
            num_uavs: 1,
        };
        write_frame(sock, &encode_message(&info)).unwrap();
    });

    let mut client = connected_client(addr);

    match client.reset() {
        Err(ClientError::UnexpectedReply { expected, got }) => {
            assert_eq!(expected, "ACK");
            assert_eq!(got, "TASKINFO");
        }
        other => panic!("expected UnexpectedReply, got {other:?}"),
    }
    server.join().unwrap();
}

#[test]
fn disconnect_and_quit_clear_session() {
    let (addr, server) = spawn_server(0.02, 1, |sock| {
        answer_ack(sock); // disconnect
    });

    let mut client = connected_client(addr);
    client.disconnect().unwrap();
    assert!(!client.is_initialized());
    assert!(matches!(client.reset(), Err(ClientError::NotInitialized)));
    server.join().unwrap();
}

#[test]
fn step_encodes_velocity_type_on_wire() {
    let (addr, server) = spawn_server(0.1, 1, |sock| {
        let payload = read_frame(sock).unwrap();
        match decode_message(&payload).unwrap() {
            Message::Step { dt, step_type, cmd } => {
                assert!((dt - 0.2).abs() < 1e-12);
                assert_eq!(step_type, StepType::Velocity);
                assert_eq!(cmd, vec![vec![0.7, -0.1, 0.0]]);
            }
            other => panic!("expected STEP, got {other:?}"),
        }
        let state = Message::State {
            x: vec![vec![0.0; 13]],
            ex: vec![vec![0.0; 20]],
        };
        write_frame(sock, &encode_message(&state)).unwrap();
    });

    let mut client = connected_client(addr);
    let reply = client.step_velocity(0.2, &[vec![0.7, -0.1, 0.0]]).unwrap();
    assert_eq!(reply.x.len(), 1);
    server.join().unwrap();
}
