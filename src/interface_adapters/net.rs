// Session plumbing: two unidirectional pumps share one WebSocket and one
// player. Termination of either pump makes the room remove the player, which
// in turn terminates the other; both close the network session on exit.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::watch;
use tracing::debug;

use crate::interface_adapters::protocol::ClientPacket;
use crate::use_cases::player::{Player, PlayerReceivers, TokenBucket, CHAT_BURST, CHAT_TOKENS_PER_SECOND};
use crate::use_cases::room::ClientPacketEnvelope;

#[derive(Debug)]
pub struct SessionError(pub String);

/// Inbound half of a binary-framed session. `None` means the peer closed.
#[async_trait]
pub trait SessionReader: Send {
    async fn read(&mut self) -> Option<Result<Vec<u8>, SessionError>>;
}

/// Outbound half of a binary-framed session.
#[async_trait]
pub trait SessionWriter: Send {
    async fn write(&mut self, bytes: Vec<u8>) -> Result<(), SessionError>;
    async fn ping(&mut self) -> Result<(), SessionError>;
    async fn close(&mut self);
}

pub struct WsSessionReader {
    inner: SplitStream<WebSocket>,
}

#[async_trait]
impl SessionReader for WsSessionReader {
    async fn read(&mut self) -> Option<Result<Vec<u8>, SessionError>> {
        loop {
            match self.inner.next().await {
                None => return None,
                Some(Err(e)) => return Some(Err(SessionError(e.to_string()))),
                Some(Ok(Message::Binary(bytes))) => return Some(Ok(bytes)),
                Some(Ok(Message::Close(_))) => return None,
                // Text, ping and pong frames are not part of the protocol.
                Some(Ok(_)) => continue,
            }
        }
    }
}

pub struct WsSessionWriter {
    inner: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl SessionWriter for WsSessionWriter {
    async fn write(&mut self, bytes: Vec<u8>) -> Result<(), SessionError> {
        self.inner
            .send(Message::Binary(bytes))
            .await
            .map_err(|e| SessionError(e.to_string()))
    }

    async fn ping(&mut self) -> Result<(), SessionError> {
        self.inner
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| SessionError(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.inner.close().await;
    }
}

/// Splits the socket and runs both pumps until the player is torn down or
/// the connection dies.
pub async fn run_session(socket: WebSocket, player: Player, receivers: PlayerReceivers) {
    let (sink, stream) = socket.split();
    let reader = WsSessionReader { inner: stream };
    let writer = WsSessionWriter { inner: sink };

    let cancel = player.cancel_signal();
    let chat_limiter = TokenBucket::new(CHAT_TOKENS_PER_SECOND, CHAT_BURST);

    let write_task = tokio::spawn(write_pump(writer, player.clone(), receivers));
    read_pump(reader, player, cancel, chat_limiter).await;
    let _ = write_task.await;
}

/// Reads frames, decodes them, applies the chat rate limit and forwards
/// envelopes to the owning room.
pub async fn read_pump<R: SessionReader>(
    mut reader: R,
    player: Player,
    mut cancel: watch::Receiver<bool>,
    mut chat_limiter: TokenBucket,
) {
    loop {
        let frame = tokio::select! {
            frame = reader.read() => frame,
            _ = cancel.wait_for(|c| *c) => return,
        };
        match frame {
            None => {
                request_removal(&player, &mut cancel).await;
                return;
            }
            Some(Err(e)) => {
                debug!(username = player.username(), error = %e.0, "session read failed");
                request_removal(&player, &mut cancel).await;
                return;
            }
            Some(Ok(bytes)) => {
                // Undecodable frames are discarded, the session stays up.
                let Ok(packet) = bincode::deserialize::<ClientPacket>(&bytes) else {
                    continue;
                };
                if matches!(packet, ClientPacket::PlayerMessage { .. }) && !chat_limiter.allow() {
                    continue;
                }
                let Some(room) = player.room() else {
                    continue;
                };
                let envelope = ClientPacketEnvelope {
                    packet,
                    sender: player.username_arc(),
                };
                if !room.send(envelope, &mut cancel).await {
                    return;
                }
            }
        }
    }
}

/// Drains the player's send buffer and ping slot onto the wire. The select
/// is biased towards buffered frames so everything enqueued before teardown
/// still flushes.
pub async fn write_pump<W: SessionWriter>(
    mut writer: W,
    player: Player,
    receivers: PlayerReceivers,
) {
    let PlayerReceivers {
        mut send_rx,
        mut ping_rx,
        mut cancel_rx,
    } = receivers;
    loop {
        tokio::select! {
            biased;
            frame = send_rx.recv() => match frame {
                Some(bytes) => {
                    if let Err(e) = writer.write(bytes).await {
                        debug!(username = player.username(), error = %e.0, "session write failed");
                        request_removal(&player, &mut cancel_rx).await;
                        break;
                    }
                }
                None => break,
            },
            ping = ping_rx.recv() => match ping {
                Some(()) => {
                    if writer.ping().await.is_err() {
                        request_removal(&player, &mut cancel_rx).await;
                        break;
                    }
                }
                None => break,
            },
            _ = async {
                while !*cancel_rx.borrow() {
                    if cancel_rx.changed().await.is_err() {
                        break;
                    }
                }
            } => break,
        }
    }
    writer.close().await;
}

async fn request_removal(player: &Player, cancel: &mut watch::Receiver<bool>) {
    if let Some(room) = player.room() {
        room.remove_me(player.clone(), cancel).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::room::test_room_handle;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::timeout;
    use uuid::Uuid;

    /// Reader that replays a fixed script, then stays silent (or closes).
    struct ScriptedReader {
        frames: VecDeque<Result<Vec<u8>, SessionError>>,
        close_after_script: bool,
    }

    impl ScriptedReader {
        fn of_packets(packets: &[ClientPacket]) -> Self {
            Self {
                frames: packets
                    .iter()
                    .map(|p| Ok(bincode::serialize(p).expect("encode")))
                    .collect(),
                close_after_script: false,
            }
        }

        fn closing(mut self) -> Self {
            self.close_after_script = true;
            self
        }
    }

    #[async_trait]
    impl SessionReader for ScriptedReader {
        async fn read(&mut self) -> Option<Result<Vec<u8>, SessionError>> {
            match self.frames.pop_front() {
                Some(frame) => Some(frame),
                None if self.close_after_script => None,
                None => std::future::pending().await,
            }
        }
    }

    #[derive(Clone, Default)]
    struct RecordingWriter {
        written: Arc<Mutex<Vec<Vec<u8>>>>,
        pings: Arc<Mutex<usize>>,
        closed: Arc<AtomicBool>,
        fail_writes: bool,
    }

    #[async_trait]
    impl SessionWriter for RecordingWriter {
        async fn write(&mut self, bytes: Vec<u8>) -> Result<(), SessionError> {
            if self.fail_writes {
                return Err(SessionError("broken pipe".to_string()));
            }
            self.written.lock().unwrap().push(bytes);
            Ok(())
        }

        async fn ping(&mut self) -> Result<(), SessionError> {
            *self.pings.lock().unwrap() += 1;
            Ok(())
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn chat(text: &str) -> ClientPacket {
        ClientPacket::PlayerMessage {
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn when_frames_arrive_then_envelopes_reach_the_room_in_order() {
        let (handle, mut inbox_rx, _removal_rx) = test_room_handle();
        let (player, _receivers) = Player::connect(Uuid::new_v4(), "naruto");
        player.set_room(handle);

        let reader = ScriptedReader::of_packets(&[
            ClientPacket::StartGame,
            ClientPacket::WordChoice { index: 1 },
        ]);
        tokio::spawn(read_pump(
            reader,
            player.clone(),
            player.cancel_signal(),
            TokenBucket::new(CHAT_TOKENS_PER_SECOND, CHAT_BURST),
        ));

        let first = timeout(Duration::from_secs(1), inbox_rx.recv())
            .await
            .expect("timed out")
            .expect("inbox closed");
        assert_eq!(first.packet, ClientPacket::StartGame);
        assert_eq!(&*first.sender, "naruto");

        let second = timeout(Duration::from_secs(1), inbox_rx.recv())
            .await
            .expect("timed out")
            .expect("inbox closed");
        assert_eq!(second.packet, ClientPacket::WordChoice { index: 1 });
    }

    #[tokio::test]
    async fn when_chat_exceeds_the_burst_then_extra_messages_are_dropped_silently() {
        let (handle, mut inbox_rx, _removal_rx) = test_room_handle();
        let (player, _receivers) = Player::connect(Uuid::new_v4(), "naruto");
        player.set_room(handle);

        let packets: Vec<ClientPacket> = (0..8).map(|i| chat(&format!("m{i}"))).collect();
        let reader = ScriptedReader::of_packets(&packets);
        tokio::spawn(read_pump(
            reader,
            player.clone(),
            player.cancel_signal(),
            TokenBucket::new(CHAT_TOKENS_PER_SECOND, CHAT_BURST),
        ));

        let mut delivered = 0;
        while timeout(Duration::from_millis(200), inbox_rx.recv())
            .await
            .ok()
            .flatten()
            .is_some()
        {
            delivered += 1;
        }
        assert_eq!(delivered, 5);
    }

    #[tokio::test]
    async fn when_drawing_frames_flood_in_then_none_are_rate_limited() {
        let (handle, mut inbox_rx, _removal_rx) = test_room_handle();
        let (player, _receivers) = Player::connect(Uuid::new_v4(), "naruto");
        player.set_room(handle);

        let packets: Vec<ClientPacket> = (0..20)
            .map(|i| ClientPacket::DrawingData { data: vec![i] })
            .collect();
        let reader = ScriptedReader::of_packets(&packets);
        tokio::spawn(read_pump(
            reader,
            player.clone(),
            player.cancel_signal(),
            TokenBucket::new(CHAT_TOKENS_PER_SECOND, CHAT_BURST),
        ));

        let mut delivered = 0;
        while timeout(Duration::from_millis(200), inbox_rx.recv())
            .await
            .ok()
            .flatten()
            .is_some()
        {
            delivered += 1;
        }
        assert_eq!(delivered, 20);
    }

    #[tokio::test]
    async fn when_an_undecodable_frame_arrives_then_it_is_skipped() {
        let (handle, mut inbox_rx, _removal_rx) = test_room_handle();
        let (player, _receivers) = Player::connect(Uuid::new_v4(), "naruto");
        player.set_room(handle);

        let mut reader = ScriptedReader::of_packets(&[ClientPacket::StartGame]);
        reader
            .frames
            .push_front(Ok(vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]));
        tokio::spawn(read_pump(
            reader,
            player.clone(),
            player.cancel_signal(),
            TokenBucket::new(CHAT_TOKENS_PER_SECOND, CHAT_BURST),
        ));

        let delivered = timeout(Duration::from_secs(1), inbox_rx.recv())
            .await
            .expect("timed out")
            .expect("inbox closed");
        assert_eq!(delivered.packet, ClientPacket::StartGame);
    }

    #[tokio::test]
    async fn when_the_peer_closes_then_the_read_pump_requests_removal() {
        let (handle, _inbox_rx, mut removal_rx) = test_room_handle();
        let (player, _receivers) = Player::connect(Uuid::new_v4(), "naruto");
        player.set_room(handle);

        let reader = ScriptedReader::of_packets(&[]).closing();
        tokio::spawn(read_pump(
            reader,
            player.clone(),
            player.cancel_signal(),
            TokenBucket::new(CHAT_TOKENS_PER_SECOND, CHAT_BURST),
        ));

        let removed = timeout(Duration::from_secs(1), removal_rx.recv())
            .await
            .expect("timed out")
            .expect("removal channel closed");
        assert_eq!(removed.conn_id(), player.conn_id());
    }

    #[tokio::test]
    async fn when_cancelled_mid_read_then_the_pump_exits_without_removal() {
        let (handle, _inbox_rx, mut removal_rx) = test_room_handle();
        let (player, _receivers) = Player::connect(Uuid::new_v4(), "naruto");
        player.set_room(handle);

        let reader = ScriptedReader::of_packets(&[]);
        let pump = tokio::spawn(read_pump(
            reader,
            player.clone(),
            player.cancel_signal(),
            TokenBucket::new(CHAT_TOKENS_PER_SECOND, CHAT_BURST),
        ));

        player.cancel_and_release();
        timeout(Duration::from_secs(1), pump)
            .await
            .expect("pump should exit on cancel")
            .expect("pump should not panic");
        assert!(removal_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn when_bytes_are_enqueued_then_the_write_pump_puts_them_on_the_wire() {
        let (player, receivers) = Player::connect(Uuid::new_v4(), "naruto");
        let writer = RecordingWriter::default();
        let written = writer.written.clone();
        tokio::spawn(write_pump(writer, player.clone(), receivers));

        player.enqueue(vec![1, 2]).expect("enqueue");
        player.enqueue(vec![3]).expect("enqueue");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*written.lock().unwrap(), vec![vec![1, 2], vec![3]]);
    }

    #[tokio::test]
    async fn when_a_ping_is_requested_then_the_writer_pings_the_session() {
        let (player, receivers) = Player::connect(Uuid::new_v4(), "naruto");
        let writer = RecordingWriter::default();
        let pings = writer.pings.clone();
        tokio::spawn(write_pump(writer, player.clone(), receivers));

        player.request_ping().expect("ping");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*pings.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn when_cancel_fires_then_buffered_frames_flush_before_the_pump_exits() {
        let (player, receivers) = Player::connect(Uuid::new_v4(), "naruto");
        // Enqueue before the pump starts, then cancel immediately: the biased
        // drain must still deliver every buffered frame.
        player.enqueue(vec![9]).expect("enqueue");
        player.enqueue(vec![8]).expect("enqueue");
        player.cancel_and_release();

        let writer = RecordingWriter::default();
        let written = writer.written.clone();
        let closed = writer.closed.clone();
        let pump = tokio::spawn(write_pump(writer, player.clone(), receivers));

        timeout(Duration::from_secs(1), pump)
            .await
            .expect("pump should exit")
            .expect("pump should not panic");
        assert_eq!(*written.lock().unwrap(), vec![vec![9], vec![8]]);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn when_a_write_fails_then_the_pump_requests_removal_and_closes() {
        let (handle, _inbox_rx, mut removal_rx) = test_room_handle();
        let (player, receivers) = Player::connect(Uuid::new_v4(), "naruto");
        player.set_room(handle);

        let writer = RecordingWriter {
            fail_writes: true,
            ..Default::default()
        };
        let closed = writer.closed.clone();
        tokio::spawn(write_pump(writer, player.clone(), receivers));

        player.enqueue(vec![1]).expect("enqueue");

        let removed = timeout(Duration::from_secs(1), removal_rx.recv())
            .await
            .expect("timed out")
            .expect("removal channel closed");
        assert_eq!(removed.conn_id(), player.conn_id());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(closed.load(Ordering::SeqCst));
    }
}
