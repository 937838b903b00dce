//! Console channel wired to a running core

use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use agh_channels::ConsoleWorker;
use agh_core::config::{Config, ConsoleConfig};
use agh_core::core::Core;

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[test]
fn test_console_session_until_quit() {
    let out = SharedBuf::default();
    let mut core = Core::new(Config::default()).unwrap();
    core.register_thread(Box::new(ConsoleWorker::with_io(
        ConsoleConfig::default(),
        Box::new(Cursor::new(
            "AT = ( 1, \"ping\" )\nnot a command\nAT = ( 2, \"quit\" )\n".as_bytes(),
        )),
        Box::new(out.clone()),
    )));

    let handle = thread::spawn(move || core.run());
    handle.join().unwrap().unwrap();

    assert_eq!(
        out.contents(),
        "IH = ( 1, 200, \"pong\" )\nIH = ( 2, 200, \"bye\" )\n"
    );
}

#[test]
fn test_disallowed_console_sender_is_ignored() {
    let out = SharedBuf::default();
    let mut core = Core::new(Config::default()).unwrap();
    let token = core.shutdown_handle();
    core.register_thread(Box::new(ConsoleWorker::with_io(
        ConsoleConfig {
            enabled: true,
            allow_from: vec!["operator".to_string()],
        },
        Box::new(Cursor::new("AT = ( 1, \"ping\" )\n".as_bytes())),
        Box::new(out.clone()),
    )));

    let handle = thread::spawn(move || core.run());

    thread::sleep(Duration::from_millis(300));
    token.cancel();
    handle.join().unwrap().unwrap();

    assert!(out.contents().is_empty());
}
