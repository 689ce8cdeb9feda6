use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

use crate::shared::AppError;

/// Chunks in flight between sender and receiver. Only this sliding window
/// is ever buffered, never the whole payload.
const CHANNEL_CAPACITY: usize = 8;

type ChunkResult = Result<Bytes, io::Error>;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Relay codes are 1 to 32 digits")]
    InvalidCode,

    #[error("A receiver is already waiting on this code")]
    AlreadyWaiting,

    #[error("No receiver is waiting on this code")]
    NoReceiver,

    #[error("Timed out waiting for a sender")]
    WaitTimeout,

    #[error("Receive cancelled")]
    Cancelled,

    #[error("Transfer failed: {0}")]
    Broken(String),
}

impl From<RelayError> for AppError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::InvalidCode => AppError::Validation(e.to_string()),
            RelayError::AlreadyWaiting => AppError::Conflict(e.to_string()),
            RelayError::NoReceiver => AppError::NotFound(e.to_string()),
            RelayError::WaitTimeout => AppError::Timeout(e.to_string()),
            RelayError::Cancelled => AppError::Cancelled,
            RelayError::Broken(msg) => AppError::Conflict(msg),
        }
    }
}

/// Pairing slot for one code. The slot mutex is the per-code exclusion
/// domain: pairing, cancellation, and timeout all race through it, and
/// exactly one of them wins the `AwaitingSender` state.
enum Slot {
    AwaitingSender(oneshot::Sender<Offer>),
    Transferring,
    Done(&'static str),
}

struct CodeEntry {
    slot: Mutex<Slot>,
}

/// What the sender hands the waiting receiver at pairing time.
struct Offer {
    filename: String,
    payload: mpsc::Receiver<ChunkResult>,
}

/// A paired transfer from the receiver's point of view
pub struct IncomingTransfer {
    pub filename: String,
    payload: mpsc::Receiver<ChunkResult>,
}

impl IncomingTransfer {
    /// The byte stream relayed from the sender. Ends cleanly on a complete
    /// transfer; yields an `Err` chunk when the sender side broke off.
    pub fn into_stream(self) -> impl Stream<Item = ChunkResult> + Send + 'static {
        futures::stream::unfold(self.payload, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        })
    }
}

type CodeTable = Arc<Mutex<HashMap<String, Arc<CodeEntry>>>>;

/// Removes `entry` from the table, but only if it is still the one
/// registered under `code`; a newer registration for the same value is left
/// alone.
fn release(codes: &CodeTable, code: &str, entry: &Arc<CodeEntry>) {
    let mut codes = codes.lock().unwrap();
    if let Some(current) = codes.get(code) {
        if Arc::ptr_eq(current, entry) {
            codes.remove(code);
        }
    }
}

fn set_done(entry: &Arc<CodeEntry>, state: &'static str) {
    *entry.slot.lock().unwrap() = Slot::Done(state);
}

/// Frees the code when dropped, unless disarmed first. This is what makes
/// caller cancellation synchronous: the moment a waiting future is dropped,
/// the code is registerable again.
struct CodeGuard {
    codes: CodeTable,
    code: String,
    entry: Arc<CodeEntry>,
    disarmed: bool,
}

impl CodeGuard {
    fn new(codes: CodeTable, code: String, entry: Arc<CodeEntry>) -> Self {
        Self {
            codes,
            code,
            entry,
            disarmed: false,
        }
    }

    fn disarm(&mut self) {
        self.disarmed = true;
    }

    fn release_now(&mut self) {
        self.disarmed = true;
        release(&self.codes, &self.code, &self.entry);
    }
}

impl Drop for CodeGuard {
    fn drop(&mut self) {
        if !self.disarmed {
            release(&self.codes, &self.code, &self.entry);
        }
    }
}

/// Feeds chunks to the receiver and guarantees an abandoned transfer does
/// not look like a clean end-of-stream.
struct PumpGuard {
    tx: Option<mpsc::Sender<ChunkResult>>,
}

impl PumpGuard {
    fn new(tx: mpsc::Sender<ChunkResult>) -> Self {
        Self { tx: Some(tx) }
    }

    async fn feed(&mut self, chunk: Bytes) -> Result<(), ()> {
        match &self.tx {
            Some(tx) => tx.send(Ok(chunk)).await.map_err(|_| ()),
            None => Err(()),
        }
    }

    async fn fail(&mut self, err: io::Error) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(err)).await;
        }
    }

    fn complete(&mut self) {
        // Dropping the sender without an error chunk is the clean EOF.
        self.tx = None;
    }
}

impl Drop for PumpGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.try_send(Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "transfer abandoned by sender",
            )));
        }
    }
}

/// Rendezvous broker pairing one waiting receiver with one sender per code
/// and relaying the payload between them without buffering it.
///
/// Codes are single-use: every terminal outcome removes the entry, so the
/// value is immediately free for a fresh registration. Different codes never
/// contend beyond the brief table lock.
pub struct RelayBroker {
    codes: CodeTable,
    default_wait: Duration,
}

impl RelayBroker {
    pub fn new(default_wait: Duration) -> Self {
        Self {
            codes: Arc::new(Mutex::new(HashMap::new())),
            default_wait,
        }
    }

    pub fn default_wait(&self) -> Duration {
        self.default_wait
    }

    /// Registers a receiver on `code` and suspends until a sender pairs, the
    /// wait deadline passes, or the caller cancels. `None` waits until
    /// cancelled.
    ///
    /// Dropping the returned future before pairing frees the code
    /// synchronously.
    #[instrument(skip(self))]
    pub async fn register_and_wait(
        &self,
        code: &str,
        wait: Option<Duration>,
    ) -> Result<IncomingTransfer, RelayError> {
        validate_code(code)?;

        let (offer_tx, offer_rx) = oneshot::channel();
        let entry = Arc::new(CodeEntry {
            slot: Mutex::new(Slot::AwaitingSender(offer_tx)),
        });

        {
            let mut codes = self.codes.lock().unwrap();
            if codes.contains_key(code) {
                debug!(code, "Registration rejected, code already waiting");
                return Err(RelayError::AlreadyWaiting);
            }
            codes.insert(code.to_string(), entry.clone());
        }
        debug!(code, "Receiver registered, awaiting sender");

        let mut guard = CodeGuard::new(self.codes.clone(), code.to_string(), entry.clone());

        let outcome = match wait {
            Some(deadline) => tokio::select! {
                offer = offer_rx => offer.map_err(|_| RelayError::Cancelled),
                _ = tokio::time::sleep(deadline) => Err(RelayError::WaitTimeout),
            },
            None => offer_rx.await.map_err(|_| RelayError::Cancelled),
        };

        match outcome {
            Ok(offer) => {
                // The sender owns the code's lifecycle from here on.
                guard.disarm();
                info!(code, filename = %offer.filename, "Receiver paired");
                Ok(IncomingTransfer {
                    filename: offer.filename,
                    payload: offer.payload,
                })
            }
            Err(e) => {
                {
                    let mut slot = entry.slot.lock().unwrap();
                    if matches!(&*slot, Slot::AwaitingSender(_)) {
                        *slot = Slot::Done(match e {
                            RelayError::WaitTimeout => "expired",
                            _ => "aborted",
                        });
                    }
                }
                guard.release_now();
                debug!(code, outcome = %e, "Receiver wait ended without a transfer");
                Err(e)
            }
        }
    }

    /// Streams `payload` to the receiver waiting on `code`.
    ///
    /// Fails with `NoReceiver` unless a receiver is registered and still
    /// unpaired. On success both sides complete together; on any mid-stream
    /// failure the receiver is unwound with an error chunk. Every exit frees
    /// the code.
    #[instrument(skip(self, payload))]
    pub async fn send<S>(
        &self,
        code: &str,
        filename: &str,
        mut payload: S,
    ) -> Result<u64, RelayError>
    where
        S: Stream<Item = ChunkResult> + Send + Unpin,
    {
        validate_code(code)?;

        let entry = { self.codes.lock().unwrap().get(code).cloned() }
            .ok_or(RelayError::NoReceiver)?;

        // Claim the pairing; exactly one sender can win this slot.
        let offer_tx = {
            let mut slot = entry.slot.lock().unwrap();
            match std::mem::replace(&mut *slot, Slot::Transferring) {
                Slot::AwaitingSender(tx) => tx,
                other => {
                    if let Slot::Done(state) = &other {
                        debug!(code, state, "Send rejected, code already settled");
                    }
                    *slot = other;
                    return Err(RelayError::NoReceiver);
                }
            }
        };

        let mut guard = CodeGuard::new(self.codes.clone(), code.to_string(), entry.clone());

        let (chunk_tx, chunk_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let offer = Offer {
            filename: filename.to_string(),
            payload: chunk_rx,
        };
        if offer_tx.send(offer).is_err() {
            // The receiver gave up between registering and pairing.
            set_done(&entry, "aborted");
            guard.release_now();
            debug!(code, "Receiver vanished before pairing completed");
            return Err(RelayError::NoReceiver);
        }
        debug!(code, filename, "Sender paired, streaming");

        let mut pump = PumpGuard::new(chunk_tx);
        let mut transferred: u64 = 0;
        loop {
            match payload.next().await {
                Some(Ok(chunk)) => {
                    transferred += chunk.len() as u64;
                    if pump.feed(chunk).await.is_err() {
                        set_done(&entry, "aborted");
                        guard.release_now();
                        warn!(code, "Receiver disconnected mid-transfer");
                        return Err(RelayError::Broken(
                            "Receiver disconnected mid-transfer".to_string(),
                        ));
                    }
                }
                Some(Err(e)) => {
                    let kind = e.kind();
                    let message = e.to_string();
                    pump.fail(io::Error::new(kind, message.clone())).await;
                    set_done(&entry, "aborted");
                    guard.release_now();
                    warn!(code, error = %message, "Upload stream failed mid-transfer");
                    return Err(RelayError::Broken(format!(
                        "Upload stream failed: {}",
                        message
                    )));
                }
                None => break,
            }
        }

        pump.complete();
        set_done(&entry, "completed");
        guard.release_now();
        info!(code, transferred, "Transfer completed");
        Ok(transferred)
    }

    /// Cancels a waiting registration. Returns whether a waiting receiver
    /// was actually aborted; a code that is unknown or already paired is
    /// left alone.
    #[instrument(skip(self))]
    pub fn cancel(&self, code: &str) -> bool {
        let entry = { self.codes.lock().unwrap().get(code).cloned() };
        let Some(entry) = entry else {
            return false;
        };

        let aborted = {
            let mut slot = entry.slot.lock().unwrap();
            match std::mem::replace(&mut *slot, Slot::Done("aborted")) {
                // Dropping the offer sender wakes the receiver as cancelled.
                Slot::AwaitingSender(_tx) => true,
                other => {
                    *slot = other;
                    false
                }
            }
        };

        if aborted {
            release(&self.codes, code, &entry);
            info!(code, "Waiting receiver cancelled");
        }
        aborted
    }

    /// Number of codes currently registered or transferring.
    pub fn active_codes(&self) -> usize {
        self.codes.lock().unwrap().len()
    }
}

fn validate_code(code: &str) -> Result<(), RelayError> {
    let ok = !code.is_empty() && code.len() <= 32 && code.bytes().all(|b| b.is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err(RelayError::InvalidCode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = ChunkResult> + Send + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p)))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(transfer: IncomingTransfer) -> Vec<u8> {
        let mut stream = Box::pin(transfer.into_stream());
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    fn broker() -> Arc<RelayBroker> {
        Arc::new(RelayBroker::new(Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn test_pairing_delivers_payload_and_filename() {
        let broker = broker();

        let receiver = {
            let broker = broker.clone();
            tokio::spawn(async move {
                broker
                    .register_and_wait("4821", Some(Duration::from_secs(5)))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let sent = broker
            .send("4821", "a.txt", chunks(&[b"hello ", b"relay"]))
            .await
            .unwrap();
        assert_eq!(sent, 11);

        let transfer = receiver.await.unwrap().unwrap();
        assert_eq!(transfer.filename, "a.txt");
        assert_eq!(collect(transfer).await, b"hello relay");

        // Terminal transfers free the code immediately.
        assert_eq!(broker.active_codes(), 0);
    }

    #[tokio::test]
    async fn test_code_is_reusable_after_completion() {
        let broker = broker();

        for round in 0..2 {
            let receiver = {
                let broker = broker.clone();
                tokio::spawn(async move {
                    broker
                        .register_and_wait("7777", Some(Duration::from_secs(5)))
                        .await
                })
            };
            tokio::time::sleep(Duration::from_millis(20)).await;

            broker
                .send("7777", "again.bin", chunks(&[b"round"]))
                .await
                .unwrap();

            let transfer = receiver.await.unwrap().unwrap();
            assert_eq!(collect(transfer).await, b"round", "round {}", round);
        }
    }

    #[tokio::test]
    async fn test_send_without_receiver() {
        let broker = broker();

        let result = broker.send("1234", "a.txt", chunks(&[b"x"])).await;
        assert!(matches!(result, Err(RelayError::NoReceiver)));
        assert_eq!(broker.active_codes(), 0);
    }

    #[tokio::test]
    async fn test_second_registration_conflicts() {
        let broker = broker();

        let first = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.register_and_wait("9000", None).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = broker
            .register_and_wait("9000", Some(Duration::from_millis(10)))
            .await;
        assert!(matches!(second, Err(RelayError::AlreadyWaiting)));

        broker.cancel("9000");
        let first = first.await.unwrap();
        assert!(matches!(first, Err(RelayError::Cancelled)));
    }

    #[tokio::test]
    async fn test_wait_timeout_frees_code() {
        let broker = broker();

        let result = broker
            .register_and_wait("2222", Some(Duration::from_millis(30)))
            .await;
        assert!(matches!(result, Err(RelayError::WaitTimeout)));

        // Nothing left behind: sends fail, registration works again.
        assert_eq!(broker.active_codes(), 0);
        assert!(matches!(
            broker.send("2222", "a.txt", chunks(&[b"x"])).await,
            Err(RelayError::NoReceiver)
        ));
    }

    #[tokio::test]
    async fn test_cancel_frees_code_for_reuse() {
        let broker = broker();

        let receiver = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.register_and_wait("3333", None).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(broker.cancel("3333"));
        let result = receiver.await.unwrap();
        assert!(matches!(result, Err(RelayError::Cancelled)));

        assert!(matches!(
            broker.send("3333", "a.txt", chunks(&[b"x"])).await,
            Err(RelayError::NoReceiver)
        ));
        assert_eq!(broker.active_codes(), 0);
    }

    #[tokio::test]
    async fn test_cancel_unknown_code() {
        let broker = broker();
        assert!(!broker.cancel("8080"));
    }

    #[tokio::test]
    async fn test_dropped_receiver_frees_code() {
        let broker = broker();

        let receiver = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.register_and_wait("5555", None).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(broker.active_codes(), 1);

        // Simulates the receiver's connection going away.
        receiver.abort();
        let _ = receiver.await;

        assert_eq!(broker.active_codes(), 0);
        assert!(matches!(
            broker.send("5555", "a.txt", chunks(&[b"x"])).await,
            Err(RelayError::NoReceiver)
        ));
    }

    #[tokio::test]
    async fn test_receiver_disconnect_mid_transfer_breaks_sender() {
        let broker = broker();

        let receiver = {
            let broker = broker.clone();
            tokio::spawn(async move {
                let transfer = broker.register_and_wait("6666", None).await.unwrap();
                // Take the pairing, then walk away without reading.
                drop(transfer);
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Plenty of chunks, so the pump outlives the channel buffer.
        let parts: Vec<ChunkResult> = (0..256).map(|_| Ok(Bytes::from_static(&[0u8; 64]))).collect();
        let result = broker.send("6666", "big.bin", stream::iter(parts)).await;

        receiver.await.unwrap();
        assert!(matches!(result, Err(RelayError::Broken(_))));
        assert_eq!(broker.active_codes(), 0);
    }

    #[tokio::test]
    async fn test_source_failure_unwinds_receiver() {
        let broker = broker();

        let receiver = {
            let broker = broker.clone();
            tokio::spawn(async move {
                let transfer = broker.register_and_wait("1111", None).await.unwrap();
                let mut stream = Box::pin(transfer.into_stream());
                let mut chunks_seen = Vec::new();
                while let Some(chunk) = stream.next().await {
                    chunks_seen.push(chunk);
                }
                chunks_seen
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let failing = stream::iter(vec![
            Ok(Bytes::from_static(b"good")),
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "source died")),
        ]);
        let result = broker.send("1111", "a.txt", failing).await;
        assert!(matches!(result, Err(RelayError::Broken(_))));

        let chunks_seen = receiver.await.unwrap();
        assert!(chunks_seen.last().unwrap().is_err());
        assert_eq!(broker.active_codes(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_distinct_codes_pair_independently() {
        let broker = broker();

        let mut receivers = Vec::new();
        for code in ["1001", "1002", "1003"] {
            let broker = broker.clone();
            receivers.push(tokio::spawn(async move {
                broker
                    .register_and_wait(code, Some(Duration::from_secs(5)))
                    .await
            }));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        for code in ["1001", "1002", "1003"] {
            broker
                .send(code, "f.bin", chunks(&[code.as_bytes()]))
                .await
                .unwrap();
        }

        for receiver in receivers {
            let transfer = receiver.await.unwrap().unwrap();
            assert!(!collect(transfer).await.is_empty());
        }
        assert_eq!(broker.active_codes(), 0);
    }

    #[tokio::test]
    async fn test_code_validation() {
        let broker = broker();

        for bad in ["", "abc", "12a4", "123456789012345678901234567890123"] {
            assert!(matches!(
                broker.register_and_wait(bad, None).await,
                Err(RelayError::InvalidCode)
            ));
        }
    }
}
