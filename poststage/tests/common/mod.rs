//! Simulated FastIron switch and in-memory transcripts for integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use poststage::channel::{OpenMode, TranscriptSink, TranscriptStore};
use poststage::error::TransportError;
use poststage::transport::{ConnectionParams, Connector, TelnetTransport};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};

const IAC: u8 = 255;
const WILL: u8 = 251;
const DO: u8 = 253;
const ECHO: u8 = 1;
const SGA: u8 = 3;

const PROMPT: &str = "telnet@ICX6450-48P Switch#";
const CONFIG_PROMPT: &str = "telnet@ICX6450-48P Switch(config)#";

/// How the switch answers a long-running copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyReply {
    Done,
    /// Progress dots, then nothing.
    Stall,
    /// Drop the connection.
    HangUp,
}

#[derive(Debug, Clone, Copy)]
pub struct Behavior {
    pub refuse_connect: bool,
    /// Drop the connection before the login banner.
    pub hang_up_on_connect: bool,
    /// `crypto key zeroize` leaves the key in place.
    pub sticky_key: bool,
    pub bootrom: CopyReply,
    pub flash: CopyReply,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            refuse_connect: false,
            hang_up_on_connect: false,
            sticky_key: false,
            bootrom: CopyReply::Done,
            flash: CopyReply::Done,
        }
    }
}

/// What the switch saw, across every session.
#[derive(Debug, Default)]
pub struct SwitchState {
    pub connections: usize,
    /// Lines received, in order (credentials included).
    pub received: Vec<String>,
    pub has_key: bool,
    pub keys_created: usize,
    pub keys_existing: usize,
}

impl SwitchState {
    pub fn saw(&self, line: &str) -> bool {
        self.received.iter().any(|l| l == line)
    }

    pub fn saw_prefix(&self, prefix: &str) -> bool {
        self.received.iter().any(|l| l.starts_with(prefix))
    }
}

/// Connector attaching each session to a fresh simulated console.
#[derive(Clone, Default)]
pub struct FakeSwitch {
    pub behavior: Behavior,
    pub state: Arc<Mutex<SwitchState>>,
}

impl FakeSwitch {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            state: Arc::default(),
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, SwitchState> {
        self.state.lock().unwrap()
    }
}

impl Connector for FakeSwitch {
    type Transport = TelnetTransport<DuplexStream>;

    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<TelnetTransport<DuplexStream>, TransportError> {
        if self.behavior.refuse_connect {
            return Err(TransportError::ConnectionFailed {
                host: params.host.clone(),
                port: params.port(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            });
        }

        self.state.lock().unwrap().connections += 1;
        let (client, server) = tokio::io::duplex(8192);
        tokio::spawn(console(server, self.behavior, Arc::clone(&self.state)));
        Ok(TelnetTransport::new(client))
    }
}

async fn console(stream: DuplexStream, behavior: Behavior, state: Arc<Mutex<SwitchState>>) {
    if behavior.hang_up_on_connect {
        return;
    }
    // Any error means the client went away.
    let _ = serve(stream, behavior, state).await;
}

async fn serve(
    stream: DuplexStream,
    behavior: Behavior,
    state: Arc<Mutex<SwitchState>>,
) -> io::Result<()> {
    let mut stream = BufReader::new(stream);

    stream
        .write_all(&[IAC, WILL, ECHO, IAC, WILL, SGA])
        .await?;
    stream.write_all(b"\r\nPlease Enter Login Name: ").await?;

    let mut negotiation = [0u8; 6];
    stream.read_exact(&mut negotiation).await?;
    assert_eq!(negotiation, [IAC, DO, ECHO, IAC, DO, SGA]);

    let Some(user) = read_line(&mut stream, &state).await? else {
        return Ok(());
    };
    stream
        .write_all(format!("{}\r\nPlease Enter Password: ", user).as_bytes())
        .await?;

    if read_line(&mut stream, &state).await?.is_none() {
        return Ok(());
    }
    stream
        .write_all(format!("\r\nUser login successful.\r\n\r\n{}", PROMPT).as_bytes())
        .await?;

    while let Some(line) = read_line(&mut stream, &state).await? {
        let reply = match line.as_str() {
            "config t" => CONFIG_PROMPT.to_string(),
            "crypto key zeroize" => {
                if !behavior.sticky_key {
                    state.lock().unwrap().has_key = false;
                }
                CONFIG_PROMPT.to_string()
            }
            "crypto key generate" => {
                let mut state = state.lock().unwrap();
                let existed = std::mem::replace(&mut state.has_key, true);
                if existed {
                    state.keys_existing += 1;
                    format!("Key already exists\r\n{}", CONFIG_PROMPT)
                } else {
                    state.keys_created += 1;
                    format!(
                        "Creating RSA key pair, please wait...\r\nKey pair is successfully created\r\n{}",
                        CONFIG_PROMPT
                    )
                }
            }
            "end" => PROMPT.to_string(),
            "write mem" => format!("Write startup-config done.\r\n{}", PROMPT),
            "logout" => return Ok(()),
            l if l.starts_with("copy tftp flash ") => match behavior.bootrom {
                CopyReply::Done => format!(
                    "Load to buffer (8192 bytes per dot)\r\n.....\r\nTFTP to Flash Done.\r\n{}",
                    PROMPT
                ),
                CopyReply::Stall => "Load to buffer (8192 bytes per dot)\r\n...".to_string(),
                CopyReply::HangUp => return Ok(()),
            },
            "copy flash flash secondary" => match behavior.flash {
                CopyReply::Done => format!("Flash to Flash Done.\r\n{}", PROMPT),
                CopyReply::Stall => "Copy flash to flash...".to_string(),
                CopyReply::HangUp => return Ok(()),
            },
            other => format!("Invalid input -> {}\r\n{}", other, PROMPT),
        };

        stream
            .write_all(format!("{}\r\n{}", line, reply).as_bytes())
            .await?;
    }
    Ok(())
}

async fn read_line(
    stream: &mut BufReader<DuplexStream>,
    state: &Arc<Mutex<SwitchState>>,
) -> io::Result<Option<String>> {
    let mut raw = Vec::new();
    if stream.read_until(b'\n', &mut raw).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(&raw).trim_end().to_string();
    state.lock().unwrap().received.push(line.clone());
    Ok(Some(line))
}

/// Connector whose console shows the login banner, takes the username, then
/// resets the connection.
#[derive(Clone, Copy, Default)]
pub struct ResettingSwitch;

impl Connector for ResettingSwitch {
    type Transport = TelnetTransport<tokio_test::io::Mock>;

    async fn connect(
        &self,
        _params: &ConnectionParams,
    ) -> Result<TelnetTransport<tokio_test::io::Mock>, TransportError> {
        let stream = tokio_test::io::Builder::new()
            .read(b"\r\nPlease Enter Login Name: ")
            .write(b"ansible\r\n")
            .read_error(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ))
            .build();
        Ok(TelnetTransport::new(stream))
    }
}

/// Transcript store recording into memory and counting opens and closes.
#[derive(Clone, Default)]
pub struct MemoryTranscripts {
    pub log: Arc<Mutex<TranscriptLog>>,
}

#[derive(Debug, Default)]
pub struct TranscriptLog {
    pub opens: Vec<OpenMode>,
    pub closes: usize,
    pub bytes: Vec<u8>,
    pub records: usize,
    /// Fail every record after this many have succeeded.
    pub fail_after: Option<usize>,
}

impl MemoryTranscripts {
    pub fn failing_after(records: usize) -> Self {
        let store = Self::default();
        store.log.lock().unwrap().fail_after = Some(records);
        store
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, TranscriptLog> {
        self.log.lock().unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.log().bytes).into_owned()
    }
}

impl TranscriptStore for MemoryTranscripts {
    fn open(&self, _host: &str, mode: OpenMode) -> io::Result<Box<dyn TranscriptSink>> {
        self.log.lock().unwrap().opens.push(mode);
        Ok(Box::new(MemorySink {
            log: Arc::clone(&self.log),
        }))
    }
}

struct MemorySink {
    log: Arc<Mutex<TranscriptLog>>,
}

impl TranscriptSink for MemorySink {
    fn record(&mut self, data: &[u8]) -> io::Result<()> {
        let mut log = self.log.lock().unwrap();
        if log.fail_after.is_some_and(|n| log.records >= n) {
            return Err(io::Error::other("disk full"));
        }
        log.records += 1;
        log.bytes.extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}
