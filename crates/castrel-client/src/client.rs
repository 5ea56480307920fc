use castrel_core::{read_frame, write_frame, Envelope, RelayError, RelayResult, Route};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

/// A connected, handshaken relay client.
pub struct Relay {
    sender: RelaySender,
    receiver: RelayReceiver,
}

/// Sending half of a relay connection.
pub struct RelaySender {
    writer: OwnedWriteHalf,
}

/// Receiving half of a relay connection.
pub struct RelayReceiver {
    reader: OwnedReadHalf,
}

impl Relay {
    /// Connect to the relay and claim `name` as the display name.
    ///
    /// The handshake is one framed string and the server sends no
    /// acknowledgement, so a successful return only means the name frame
    /// was written. The server does not check the name for uniqueness.
    pub async fn connect(addr: impl ToSocketAddrs, name: &str) -> RelayResult<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| RelayError::Transport(format!("connect failed: {e}")))?;
        let (reader, mut writer) = stream.into_split();

        write_frame(&mut writer, &name.to_string()).await?;
        debug!(name = %name, "handshake sent");

        Ok(Self {
            sender: RelaySender { writer },
            receiver: RelayReceiver { reader },
        })
    }

    /// Split into independently usable send and receive halves.
    pub fn into_split(self) -> (RelaySender, RelayReceiver) {
        (self.sender, self.receiver)
    }

    /// Send one envelope to the relay.
    pub async fn send(&mut self, envelope: &Envelope) -> RelayResult<()> {
        self.sender.send(envelope).await
    }

    /// Receive the next envelope.
    pub async fn recv(&mut self) -> RelayResult<Option<Envelope>> {
        self.receiver.recv().await
    }
}

impl RelaySender {
    /// Send one envelope to the relay.
    pub async fn send(&mut self, envelope: &Envelope) -> RelayResult<()> {
        write_frame(&mut self.writer, envelope).await
    }

    /// Send a logout envelope. The server ends the session without a reply.
    pub async fn logout(&mut self) -> RelayResult<()> {
        self.send(&Envelope::text(Route::Logout, "")).await
    }
}

impl RelayReceiver {
    /// Receive the next envelope. Returns `None` when the server closes the
    /// connection at a frame boundary.
    pub async fn recv(&mut self) -> RelayResult<Option<Envelope>> {
        read_frame(&mut self.reader).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connect_sends_name_frame_first() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let accept = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let name: String = read_frame(&mut stream)
                .await
                .expect("read")
                .expect("expected name frame");
            name
        });

        let _relay = Relay::connect(addr, "alice").await.expect("connect");
        assert_eq!(accept.await.expect("join"), "alice");
    }

    #[tokio::test]
    async fn send_and_recv_frame_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let echo = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let _name: String = read_frame(&mut stream)
                .await
                .expect("read")
                .expect("expected name frame");
            let envelope: Envelope = read_frame(&mut stream)
                .await
                .expect("read")
                .expect("expected envelope");
            write_frame(&mut stream, &envelope).await.expect("write");
        });

        let mut relay = Relay::connect(addr, "alice").await.expect("connect");
        let sent = Envelope::text(Route::Broadcast, "ping");
        relay.send(&sent).await.expect("send");

        let got = relay.recv().await.expect("recv").expect("envelope");
        assert_eq!(got, sent);
        echo.await.expect("join");
    }
}
