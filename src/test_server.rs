//! Minimal in-process SMTP server used by the tests

use std::{
    io::{self, BufRead, BufReader, Write},
    net::{TcpListener, TcpStream},
    sync::mpsc::{self, Receiver, Sender},
    thread,
    time::Duration,
};

use base64::{engine::general_purpose::STANDARD, Engine};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Auth { accepted: bool },
    Rset,
    MailFrom(String),
    RcptTo(String),
    Data(String),
}

#[derive(Debug, Default, Clone)]
pub struct Behaviour {
    /// Advertise AUTH PLAIN and only accept this username/password
    pub credentials: Option<(String, String)>,
    /// Drop the connection right after answering RCPT TO
    pub hang_up_after_rcpt: bool,
    /// Answer the first DATA of each connection with 554
    pub reject_first_data: bool,
}

pub struct FakeSmtpServer {
    port: u16,
    rx: Receiver<Event>,
}

impl FakeSmtpServer {
    pub fn start(behaviour: Behaviour) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind fake smtp server");
        let port = listener.local_addr().expect("no local addr").port();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let tx = tx.clone();
                let behaviour = behaviour.clone();
                thread::spawn(move || {
                    let _ = handle_client(stream, &behaviour, &tx);
                });
            }
        });
        Self { port, rx }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn next_event(&self) -> Event {
        self.rx
            .recv_timeout(Duration::from_secs(5))
            .expect("fake smtp server saw nothing")
    }

    pub fn assert_quiet(&self) {
        if let Ok(event) = self.rx.recv_timeout(Duration::from_millis(100)) {
            panic!("unexpected event: {event:?}");
        }
    }
}

/// A port nothing is listening on
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind");
    listener.local_addr().expect("no local addr").port()
}

fn handle_client(stream: TcpStream, behaviour: &Behaviour, tx: &Sender<Event>) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    writer.write_all(b"220 fake.test ESMTP\r\n")?;

    let mut data_seen = false;
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let command = line.trim_end();
        let upper = command.to_ascii_uppercase();

        if upper.starts_with("EHLO") {
            match behaviour.credentials {
                Some(_) => writer.write_all(b"250-fake.test\r\n250 AUTH PLAIN\r\n")?,
                None => writer.write_all(b"250 fake.test\r\n")?,
            }
        } else if upper.starts_with("HELO") || upper == "NOOP" {
            writer.write_all(b"250 OK\r\n")?;
        } else if upper == "RSET" {
            let _ = tx.send(Event::Rset);
            writer.write_all(b"250 OK\r\n")?;
        } else if upper.starts_with("AUTH PLAIN ") {
            let accepted = check_plain(&command["AUTH PLAIN ".len()..], behaviour);
            let _ = tx.send(Event::Auth { accepted });
            if accepted {
                writer.write_all(b"235 2.7.0 Authentication successful\r\n")?;
            } else {
                writer.write_all(b"535 5.7.8 Authentication credentials invalid\r\n")?;
            }
        } else if upper.starts_with("MAIL FROM:") {
            let _ = tx.send(Event::MailFrom(path(command)));
            writer.write_all(b"250 OK\r\n")?;
        } else if upper.starts_with("RCPT TO:") {
            let _ = tx.send(Event::RcptTo(path(command)));
            writer.write_all(b"250 OK\r\n")?;
            if behaviour.hang_up_after_rcpt {
                return Ok(());
            }
        } else if upper == "DATA" && behaviour.reject_first_data && !data_seen {
            data_seen = true;
            writer.write_all(b"554 Transaction failed\r\n")?;
        } else if upper == "DATA" {
            data_seen = true;
            writer.write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n")?;
            let data = read_data(&mut reader)?;
            let _ = tx.send(Event::Data(data));
            writer.write_all(b"250 OK queued\r\n")?;
        } else if upper == "QUIT" {
            writer.write_all(b"221 Bye\r\n")?;
            return Ok(());
        } else {
            writer.write_all(b"502 Command not implemented\r\n")?;
        }
    }
}

fn path(command: &str) -> String {
    let start = command.find('<').map_or(0, |i| i + 1);
    let end = command.find('>').unwrap_or(command.len());
    command[start..end].to_string()
}

fn check_plain(encoded: &str, behaviour: &Behaviour) -> bool {
    let Some((username, password)) = &behaviour.credentials else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let decoded = String::from_utf8_lossy(&decoded);
    let mut parts = decoded.rsplit('\0');
    parts.next() == Some(password.as_str()) && parts.next() == Some(username.as_str())
}

/// Reads raw payload bytes up to the terminating dot, undoing dot stuffing
fn read_data(reader: &mut impl BufRead) -> io::Result<String> {
    let mut data = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        if line == b".\r\n" {
            break;
        }
        let unstuffed = if line.starts_with(b"..") { &line[1..] } else { &line[..] };
        data.extend_from_slice(unstuffed);
    }
    // The CRLF before the dot belongs to the terminator
    if data.ends_with(b"\r\n") {
        data.truncate(data.len() - 2);
    }
    Ok(String::from_utf8_lossy(&data).into_owned())
}
