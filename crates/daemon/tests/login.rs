// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The login happy path, end to end over a real socket, against the bootstrap core.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

// The daemon is a binary crate; drive the same modules it assembles by duplicating its
// tiny wiring here against the public library crates.
use loam_kernel::config::Config;
use loam_kernel::tasks::scheduler::Scheduler;

#[path = "../src/bootstrap.rs"]
mod bootstrap;
#[path = "../src/connections.rs"]
mod connections;
#[path = "../src/telnet.rs"]
mod telnet;

use connections::ConnectionRegistry;

fn start_server() -> (std::net::SocketAddr, Arc<Scheduler>) {
    let config = Arc::new(Config {
        listen_address: "127.0.0.1:0".to_string(),
        ..Default::default()
    });
    let world = Arc::new(bootstrap::minimal_core());
    let scheduler = Scheduler::new(world, config.clone());
    let registry = Arc::new(ConnectionRegistry::new());
    let listener = telnet::spawn_listener(config, scheduler.clone(), registry).unwrap();
    (listener.local_addr, scheduler)
}

struct Client {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Client {
    fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        Self { stream, reader }
    }

    fn send(&mut self, line: &str) {
        self.stream
            .write_all(format!("{line}\r\n").as_bytes())
            .unwrap();
    }

    /// Read lines until one satisfies the predicate or the deadline passes.
    fn expect_line<F: Fn(&str) -> bool>(&mut self, what: &str, pred: F) -> String {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut seen = vec![];
        while Instant::now() < deadline {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    let line = line.trim_end().to_string();
                    if pred(&line) {
                        return line;
                    }
                    seen.push(line);
                }
                Err(_) => continue,
            }
        }
        panic!("never saw {what}; got {seen:?}");
    }
}

#[test]
fn test_login_who_say_quit() {
    let (addr, _scheduler) = start_server();
    let mut client = Client::connect(addr);

    client.expect_line("welcome banner", |l| l.contains("Welcome"));

    // A garbled login line gets the usage hint, not a connection.
    client.send("open sesame");
    client.expect_line("login hint", |l| l.contains("connect <player>"));

    // Wrong password is refused.
    client.send("connect Wizard nope");
    client.expect_line("password refusal", |l| l.contains("different password"));

    // The happy path.
    client.send("connect Wizard secret");
    client.expect_line("connection confirmation", |l| l.contains("*** Connected ***"));

    client.send("@who");
    client.expect_line("who table", |l| l.contains("Wizard") && l.contains("#1"));

    client.send("look");
    client.expect_line("room description", |l| l.contains("The First Room"));

    client.send("\"hello there");
    client.expect_line("say echo", |l| l.contains("You say, \"hello there\""));

    client.send("frob the widget");
    client.expect_line("huh response", |l| l.contains("I couldn't understand that."));

    client.send("quit");
    client.expect_line("disconnect notice", |l| l.contains("*** Disconnected ***"));
}

#[test]
fn test_eval_shorthand_over_the_wire() {
    let (addr, _scheduler) = start_server();
    let mut client = Client::connect(addr);
    client.send("connect Wizard secret");
    client.expect_line("connection confirmation", |l| l.contains("*** Connected ***"));

    client.send(";1 + 2 * 3");
    client.expect_line("eval result", |l| l.contains("=> 7"));

    client.send(";;x = 10; return x * x;");
    client.expect_line("eval block result", |l| l.contains("=> 100"));
}

#[test]
fn test_reconnection_boots_old_connection() {
    let (addr, _scheduler) = start_server();
    let mut first = Client::connect(addr);
    first.send("connect Wizard secret");
    first.expect_line("first login", |l| l.contains("*** Connected ***"));

    let mut second = Client::connect(addr);
    second.send("connect Wizard secret");
    second.expect_line("second login", |l| l.contains("*** Connected ***"));

    first.expect_line("boot notice", |l| l.contains("Redirecting connection"));
}
