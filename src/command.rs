//! Line-based TCP command server for thruster control.
//!
//! The client protocol (shared with the desktop tester):
//! `C <left_us> <right_us>\n` sets both outputs, `PING\n` asks for a
//! status line. Every handled command is answered with
//! `S <left_us> <right_us>\n`. Two seconds without traffic drops the
//! outputs back to neutral.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

pub const PULSE_MIN: u16 = 1100;
pub const PULSE_MAX: u16 = 1900;
pub const PULSE_NEUTRAL: u16 = 1500;

const IDLE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Thruster { left_us: u16, right_us: u16 },
    Ping,
}

/// Parses a single command line. Unknown or malformed lines yield
/// `None` and are ignored by the server. Thruster values are clamped
/// to the valid pulse range rather than rejected.
pub fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "C" => {
            let left: i32 = parts.next()?.parse().ok()?;
            let right: i32 = parts.next()?.parse().ok()?;
            if parts.next().is_some() {
                return None;
            }
            Some(Command::Thruster {
                left_us: clamp_pulse(left),
                right_us: clamp_pulse(right),
            })
        }
        "PING" => Some(Command::Ping),
        _ => None,
    }
}

fn clamp_pulse(us: i32) -> u16 {
    us.clamp(PULSE_MIN as i32, PULSE_MAX as i32) as u16
}

/// Accepts one client at a time, forever. Outputs return to neutral
/// whenever a client goes away.
pub fn serve(port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    log::info!("Command server listening on port {}", port);

    let mut outputs = (PULSE_NEUTRAL, PULSE_NEUTRAL);
    loop {
        let (stream, peer) = match listener.accept() {
            Ok(conn) => conn,
            Err(e) => {
                log::warn!("Accept failed: {:?}", e);
                continue;
            }
        };
        log::info!("Client connected: {}", peer);

        if let Err(e) = handle_client(stream, &mut outputs) {
            log::warn!("Client error: {:?}", e);
        }
        set_outputs(&mut outputs, PULSE_NEUTRAL, PULSE_NEUTRAL);
        log::info!("Client disconnected");
    }
}

fn handle_client(stream: TcpStream, outputs: &mut (u16, u16)) -> anyhow::Result<()> {
    stream.set_read_timeout(Some(IDLE_TIMEOUT))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);

    let mut line = Vec::new();
    loop {
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => return Ok(()),
            Ok(_) => {
                // Lossy decode: a line of garbage bytes parses to None
                // and is skipped like any other malformed line
                match parse_command(String::from_utf8_lossy(&line).trim()) {
                    Some(Command::Thruster { left_us, right_us }) => {
                        set_outputs(outputs, left_us, right_us);
                        writeln!(writer, "S {} {}", outputs.0, outputs.1)?;
                    }
                    Some(Command::Ping) => {
                        writeln!(writer, "S {} {}", outputs.0, outputs.1)?;
                    }
                    None => {}
                }
                line.clear();
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                // Failsafe: no traffic, stop the thrusters
                if *outputs != (PULSE_NEUTRAL, PULSE_NEUTRAL) {
                    log::warn!("Idle timeout, outputs back to neutral");
                    set_outputs(outputs, PULSE_NEUTRAL, PULSE_NEUTRAL);
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn set_outputs(outputs: &mut (u16, u16), left_us: u16, right_us: u16) {
    if *outputs != (left_us, right_us) {
        *outputs = (left_us, right_us);
        log::info!("Thruster outputs: L={}us R={}us", left_us, right_us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_thruster_command() {
        assert_eq!(
            parse_command("C 1500 1500"),
            Some(Command::Thruster {
                left_us: 1500,
                right_us: 1500
            })
        );
        assert_eq!(
            parse_command("C 1600 1400"),
            Some(Command::Thruster {
                left_us: 1600,
                right_us: 1400
            })
        );
    }

    #[test]
    fn clamps_out_of_range_pulses() {
        assert_eq!(
            parse_command("C 900 2500"),
            Some(Command::Thruster {
                left_us: PULSE_MIN,
                right_us: PULSE_MAX
            })
        );
        assert_eq!(
            parse_command("C -100 1500"),
            Some(Command::Thruster {
                left_us: PULSE_MIN,
                right_us: 1500
            })
        );
    }

    #[test]
    fn parses_ping() {
        assert_eq!(parse_command("PING"), Some(Command::Ping));
    }

    #[test]
    fn garbage_bytes_do_not_end_the_session() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut outputs = (PULSE_NEUTRAL, PULSE_NEUTRAL);
            handle_client(stream, &mut outputs).unwrap();
            outputs
        });

        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"\xff\xfe garbage\n").unwrap();
        client.write_all(b"C 1600 1400\n").unwrap();

        let mut reader = BufReader::new(client.try_clone().unwrap());
        let mut reply = String::new();
        reader.read_line(&mut reply).unwrap();
        assert_eq!(reply.trim(), "S 1600 1400");

        // EOF ends the session cleanly with the last commanded outputs
        drop(reader);
        drop(client);
        assert_eq!(server.join().unwrap(), (1600, 1400));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("C 1500"), None);
        assert_eq!(parse_command("C 1500 1500 1500"), None);
        assert_eq!(parse_command("C abc def"), None);
        assert_eq!(parse_command("X 1 2"), None);
    }
}
