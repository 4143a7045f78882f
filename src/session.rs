use std::time::Duration;

use async_recursion::async_recursion;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::config::Config;
use crate::framer;
use crate::navigator::{self, Command};
use crate::robot::Robot;
use crate::wire::{self, ClientMessage, Expect, ServerMessage, SessionError};

/// How a session ended when the protocol ran to completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    /// A non-empty message was picked up and the client was logged out.
    Delivered,
    /// Every target cell was probed and nothing was found.
    Exhausted,
}

/// One client connection: the handshake, the navigation loop and the
/// recharging sub-mode, ending with the socket closed.
pub(crate) struct Session<S> {
    stream: S,
    robot: Robot,
    server_key: u16,
    client_key: u16,
    read_timeout: Duration,
    recharge_timeout: Duration,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub(crate) fn new(stream: S, config: &Config) -> Self {
        Self {
            stream,
            robot: Robot::new(),
            server_key: config.server_key,
            client_key: config.client_key,
            read_timeout: config.read_timeout(),
            recharge_timeout: config.recharge_timeout(),
        }
    }

    /// Runs the session to completion. Protocol violations are answered with
    /// their wire literal; timeouts and I/O failures close silently. The
    /// connection is dropped on return.
    pub(crate) async fn run(mut self) {
        tracing::info!("connected!");
        match self.serve().await {
            Ok(Outcome::Delivered) => tracing::info!("message delivered, logged out"),
            Ok(Outcome::Exhausted) => tracing::info!("target area exhausted, nothing found"),
            Err(error) => {
                if let Some(reply) = error.response() {
                    let _ = self.send(reply).await;
                }
                match &error {
                    SessionError::TimedOut => tracing::info!("{error}"),
                    SessionError::Io(_) => tracing::error!("{error}"),
                    _ => tracing::warn!("{error}"),
                }
            }
        }
        tracing::info!("disconnected!");
    }

    async fn serve(&mut self) -> Result<Outcome, SessionError> {
        self.authenticate().await?;
        self.guide().await
    }

    /// Challenge/response handshake: username in, server accept code out,
    /// client confirmation checked against the username hash.
    async fn authenticate(&mut self) -> Result<(), SessionError> {
        let name = match self.next_message(Expect::Username).await? {
            ClientMessage::Username(name) => name,
            _ => return Err(SessionError::Syntax),
        };
        tracing::debug!("username: {name:?}");

        let hash = username_hash(name.as_bytes());
        self.send(ServerMessage::Confirmation(hash.wrapping_add(self.server_key)))
            .await?;

        let code = match self.next_message(Expect::Confirmation).await? {
            ClientMessage::Confirmation(code) => code,
            _ => return Err(SessionError::Syntax),
        };
        if code.wrapping_sub(self.client_key) != hash {
            return Err(SessionError::LoginFailed);
        }

        self.send(ServerMessage::Ok).await?;
        Ok(())
    }

    /// Navigation loop: one command out, one report in, until a message is
    /// delivered or the whole area has been probed.
    async fn guide(&mut self) -> Result<Outcome, SessionError> {
        loop {
            match navigator::next_command(&self.robot) {
                Command::Move => {
                    self.send(ServerMessage::Move).await?;
                    self.read_position().await?;
                }
                Command::TurnLeft => {
                    // The robot itself only rotates on the next MOVE; the
                    // model turns now so the reply reads as stationary.
                    self.robot.turn_left();
                    self.send(ServerMessage::TurnLeft).await?;
                    self.read_position().await?;
                }
                Command::TurnRight => {
                    self.robot.turn_right();
                    self.send(ServerMessage::TurnRight).await?;
                    self.read_position().await?;
                }
                Command::GetMessage => {
                    self.send(ServerMessage::PickUp).await?;
                    let secret = match self.next_message(Expect::Pickup).await? {
                        ClientMessage::Secret(secret) => secret,
                        _ => return Err(SessionError::Syntax),
                    };
                    self.robot.mark_searched();
                    if !secret.is_empty() {
                        tracing::debug!(
                            "message found: {:?}",
                            String::from_utf8_lossy(&secret)
                        );
                        self.send(ServerMessage::Logout).await?;
                        return Ok(Outcome::Delivered);
                    }
                }
                Command::Finished => return Ok(Outcome::Exhausted),
            }
        }
    }

    async fn read_position(&mut self) -> Result<(), SessionError> {
        match self.next_message(Expect::Position).await? {
            ClientMessage::Position(report) => {
                self.robot.move_to(report);
                Ok(())
            }
            _ => Err(SessionError::Syntax),
        }
    }

    /// Reads and classifies the next message, transparently handling the
    /// recharging sub-mode: RECHARGING suspends the exchange until FULL POWER
    /// arrives, then the interrupted expectation is read again.
    #[async_recursion]
    async fn next_message(&mut self, expect: Expect) -> Result<ClientMessage, SessionError> {
        let deadline = self.read_deadline();
        let payload = framer::read_frame(&mut self.stream, expect.max_frame(), deadline).await?;
        tracing::trace!("client: {:?}", String::from_utf8_lossy(&payload));

        match wire::parse(expect, &payload)? {
            ClientMessage::Recharging => {
                self.recharge().await?;
                self.next_message(expect).await
            }
            ClientMessage::FullPower => Err(SessionError::Logic),
            message => Ok(message),
        }
    }

    /// Waits out a recharge under the longer deadline. Only FULL POWER may
    /// arrive; resuming sends nothing back.
    async fn recharge(&mut self) -> Result<(), SessionError> {
        self.robot.start_charging();
        tracing::debug!("robot recharging");

        let deadline = self.read_deadline();
        let payload = framer::read_frame(
            &mut self.stream,
            Expect::FullPower.max_frame(),
            deadline,
        )
        .await?;
        tracing::trace!("client: {:?}", String::from_utf8_lossy(&payload));

        match wire::parse(Expect::FullPower, &payload)? {
            ClientMessage::FullPower => {
                self.robot.stop_charging();
                tracing::debug!("robot at full power");
                Ok(())
            }
            _ => Err(SessionError::Logic),
        }
    }

    /// Current read deadline, following the charging state.
    fn read_deadline(&self) -> Duration {
        if self.robot.is_charging() {
            self.recharge_timeout
        } else {
            self.read_timeout
        }
    }

    async fn send(&mut self, message: ServerMessage) -> Result<(), SessionError> {
        tracing::trace!("server: {message:?}");
        self.stream
            .write_all(message.to_string().as_bytes())
            .await?;
        Ok(())
    }
}

/// Hash of a username: the byte sum times 1000, in 16-bit arithmetic.
fn username_hash(name: &[u8]) -> u16 {
    let sum: u16 = name.iter().map(|&byte| u16::from(byte)).sum();
    sum.wrapping_mul(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tokio::io::{AsyncReadExt, DuplexStream};

    // Username "abc": byte sum 294, hash 294000 mod 2^16 = 31856. With the
    // default keys the server sends 20941 and accepts 11648.
    const USERNAME: &[u8] = b"abc\x07\x08";
    const SERVER_CODE: &str = "20941\x07\x08";
    const CLIENT_CODE: &[u8] = b"11648\x07\x08";

    fn spawn_session() -> (DuplexStream, tokio::task::JoinHandle<()>) {
        let (client, server) = tokio::io::duplex(256);
        let config = Config::parse_from(["gridbot-server"]);
        let handle = tokio::spawn(Session::new(server, &config).run());
        (client, handle)
    }

    async fn expect_reply(client: &mut DuplexStream, want: &str) {
        let mut buf = vec![0u8; want.len()];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, want.as_bytes());
    }

    async fn expect_eof(client: &mut DuplexStream) {
        let mut buf = [0u8; 64];
        let read = client.read(&mut buf).await.unwrap();
        assert_eq!(read, 0, "expected close, got {:?}", &buf[..read]);
    }

    /// Full handshake up to the first navigation command.
    async fn authenticate(client: &mut DuplexStream) {
        client.write_all(USERNAME).await.unwrap();
        expect_reply(client, SERVER_CODE).await;
        client.write_all(CLIENT_CODE).await.unwrap();
        expect_reply(client, "200 OK\x07\x08").await;
        expect_reply(client, "102 MOVE\x07\x08").await;
    }

    #[test]
    fn username_hash_is_the_scaled_byte_sum() {
        assert_eq!(username_hash(b"abc"), 31856);
        assert_eq!(username_hash(b""), 0);
        // 730 * 1000 mod 2^16
        assert_eq!(username_hash(b"RECHARGING"), 9104);
    }

    #[tokio::test]
    async fn delivers_a_message_end_to_end() {
        let (mut client, handle) = spawn_session();
        authenticate(&mut client).await;

        client.write_all(b"OK 0 0\x07\x08").await.unwrap();
        expect_reply(&mut client, "102 MOVE\x07\x08").await;

        client.write_all(b"OK 1 0\x07\x08").await.unwrap();
        expect_reply(&mut client, "105 GET MESSAGE\x07\x08").await;

        client.write_all(b"Deep in the cellar.\x07\x08").await.unwrap();
        expect_reply(&mut client, "106 LOGOUT\x07\x08").await;
        expect_eof(&mut client).await;

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn empty_pickup_continues_the_search() {
        let (mut client, handle) = spawn_session();
        authenticate(&mut client).await;

        client.write_all(b"OK 0 0\x07\x08").await.unwrap();
        expect_reply(&mut client, "102 MOVE\x07\x08").await;

        client.write_all(b"OK 1 0\x07\x08").await.unwrap();
        expect_reply(&mut client, "105 GET MESSAGE\x07\x08").await;

        // Nothing here; the search goes on towards the next nearest cell.
        client.write_all(b"\x07\x08").await.unwrap();
        expect_reply(&mut client, "102 MOVE\x07\x08").await;

        client.write_all(b"OK 2 0\x07\x08").await.unwrap();
        expect_reply(&mut client, "105 GET MESSAGE\x07\x08").await;

        client.write_all(b"Found it!\x07\x08").await.unwrap();
        expect_reply(&mut client, "106 LOGOUT\x07\x08").await;
        expect_eof(&mut client).await;

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn stationary_turn_keeps_the_inferred_heading() {
        let (mut client, handle) = spawn_session();
        authenticate(&mut client).await;

        client.write_all(b"OK 0 -1\x07\x08").await.unwrap();
        expect_reply(&mut client, "102 MOVE\x07\x08").await;

        client.write_all(b"OK 0 0\x07\x08").await.unwrap();
        expect_reply(&mut client, "105 GET MESSAGE\x07\x08").await;

        // Empty cell; nearest unsearched is (-1, 0), to the left of the
        // northbound robot.
        client.write_all(b"\x07\x08").await.unwrap();
        expect_reply(&mut client, "103 TURN LEFT\x07\x08").await;

        // The turn acknowledgement repeats the position; the rotated heading
        // must survive it, so the next command is a plain move.
        client.write_all(b"OK 0 0\x07\x08").await.unwrap();
        expect_reply(&mut client, "102 MOVE\x07\x08").await;

        client.write_all(b"OK -1 0\x07\x08").await.unwrap();
        expect_reply(&mut client, "105 GET MESSAGE\x07\x08").await;

        client.write_all(b"Under the mat.\x07\x08").await.unwrap();
        expect_reply(&mut client, "106 LOGOUT\x07\x08").await;
        expect_eof(&mut client).await;

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn wrong_confirmation_code_fails_login() {
        let (mut client, handle) = spawn_session();

        client.write_all(USERNAME).await.unwrap();
        expect_reply(&mut client, SERVER_CODE).await;

        client.write_all(b"11649\x07\x08").await.unwrap();
        expect_reply(&mut client, "300 LOGIN FAILED\x07\x08").await;
        expect_eof(&mut client).await;

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn username_overrun_is_a_syntax_error() {
        let (mut client, handle) = spawn_session();

        client
            .write_all(b"01234567890123456789")
            .await
            .unwrap();
        expect_reply(&mut client, "301 SYNTAX ERROR\x07\x08").await;
        expect_eof(&mut client).await;

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_position_report_is_a_syntax_error() {
        let (mut client, handle) = spawn_session();
        authenticate(&mut client).await;

        client.write_all(b"OK 1\x07\x08").await.unwrap();
        expect_reply(&mut client, "301 SYNTAX ERROR\x07\x08").await;
        expect_eof(&mut client).await;

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn recharging_suspends_and_resumes_the_exchange() {
        let (mut client, handle) = spawn_session();
        authenticate(&mut client).await;

        client.write_all(b"RECHARGING\x07\x08").await.unwrap();
        client.write_all(b"FULL POWER\x07\x08").await.unwrap();

        // No reply to either; the pending position report is still expected.
        client.write_all(b"OK 2 2\x07\x08").await.unwrap();
        expect_reply(&mut client, "102 MOVE\x07\x08").await;

        drop(client);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn non_full_power_while_charging_is_a_logic_error() {
        let (mut client, handle) = spawn_session();
        authenticate(&mut client).await;

        client.write_all(b"RECHARGING\x07\x08").await.unwrap();
        client.write_all(b"OK 0 0\x07\x08").await.unwrap();
        expect_reply(&mut client, "302 LOGIC ERROR\x07\x08").await;
        expect_eof(&mut client).await;

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn full_power_without_recharging_is_a_logic_error() {
        let (mut client, handle) = spawn_session();
        authenticate(&mut client).await;

        client.write_all(b"FULL POWER\x07\x08").await.unwrap();
        expect_reply(&mut client, "302 LOGIC ERROR\x07\x08").await;
        expect_eof(&mut client).await;

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn recharging_before_login_is_just_a_username() {
        let (mut client, handle) = spawn_session();

        client.write_all(b"RECHARGING\x07\x08").await.unwrap();
        // hash("RECHARGING") = 9104, plus the server key.
        expect_reply(&mut client, "63725\x07\x08").await;

        drop(client);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn charging_extends_the_read_deadline() {
        let (mut client, handle) = spawn_session();
        authenticate(&mut client).await;

        client.write_all(b"RECHARGING\x07\x08").await.unwrap();
        // Well past the normal deadline but inside the charging one.
        tokio::time::sleep(Duration::from_millis(3000)).await;
        client.write_all(b"FULL POWER\x07\x08").await.unwrap();

        client.write_all(b"OK 0 0\x07\x08").await.unwrap();
        expect_reply(&mut client, "102 MOVE\x07\x08").await;

        drop(client);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn idle_client_is_dropped_silently() {
        let (mut client, handle) = spawn_session();

        client.write_all(USERNAME).await.unwrap();
        expect_reply(&mut client, SERVER_CODE).await;

        // Say nothing more; the read deadline lapses and the connection just
        // closes.
        expect_eof(&mut client).await;
        handle.await.unwrap();
    }
}
