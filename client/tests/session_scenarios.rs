//! End-to-end client scenarios over a real relay (SPEC_FULL.md §8 S6):
//! two `ClientSession`s talking through a freshly bound `zsm_relay::Acceptor`,
//! exercising the send/receive paths and the session-key cache together.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use zsm_client::{ClientSession, Notifier, SendCommand, SqliteStore, Ui};
use zsm_common::Identity;
use zsm_crypto::{IdentityKeys, SessionKeyStore};
use zsm_relay::Acceptor;

fn test_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

fn spawn_relay() -> std::net::SocketAddr {
    let acceptor = Acceptor::bind(0, 8, Duration::from_secs(900), test_logger()).expect("bind");
    let addr = acceptor.local_addr().expect("local_addr");
    thread::spawn(move || {
        let _ = acceptor.run();
    });
    thread::sleep(Duration::from_millis(50));
    addr
}

#[derive(Default, Clone)]
struct CapturingUi {
    rendered: Vec<(String, u64, String)>,
}

impl Ui for CapturingUi {
    fn render_message(&mut self, sender_label: &str, timestamp: u64, text: &str) {
        self.rendered.push((sender_label.to_string(), timestamp, text.to_string()));
    }
    fn set_status(&mut self, _status: &str) {}
    fn select_conversation(&mut self, _peer: &Identity) {}
    fn read_command(&mut self) -> Option<SendCommand> {
        None
    }
}

struct NullNotifier;
impl Notifier for NullNotifier {
    fn notify(&self, _sender: &Identity, _label: &str, _preview: &str) {}
}

#[test]
fn s6_cache_coherence_across_repeated_sends() {
    let addr = spawn_relay();
    let a_keys = IdentityKeys::generate();
    let b_keys = IdentityKeys::generate();
    let a_identity = a_keys.identity();
    let b_identity = b_keys.identity();

    let a_store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let b_store = Arc::new(SqliteStore::open_in_memory().unwrap());

    let mut a_session =
        ClientSession::connect(a_keys, &addr.to_string(), Arc::clone(&a_store), test_logger()).unwrap();
    let mut b_session =
        ClientSession::connect(b_keys, &addr.to_string(), Arc::clone(&b_store), test_logger()).unwrap();

    let b_ui: Arc<Mutex<CapturingUi>> = Arc::new(Mutex::new(CapturingUi::default()));
    let b_selected = Arc::new(Mutex::new(Some(a_identity)));
    let _b_receive = b_session
        .spawn_receive_task(Arc::new(NullNotifier), Arc::clone(&b_ui), Arc::clone(&b_selected))
        .unwrap();

    let a_ui: Arc<Mutex<CapturingUi>> = Arc::new(Mutex::new(CapturingUi::default()));
    let a_selected = Arc::new(Mutex::new(Some(b_identity)));
    let _a_receive = a_session
        .spawn_receive_task(Arc::new(NullNotifier), Arc::clone(&a_ui), Arc::clone(&a_selected))
        .unwrap();

    assert!(a_store.get_session_keys(&b_identity).unwrap().is_none(), "no key cached before the first send");

    let mut scratch = CapturingUi::default();
    a_session.send(b_identity, "first", &mut scratch).unwrap();
    thread::sleep(Duration::from_millis(150));

    let keys_after_first = a_store.get_session_keys(&b_identity).unwrap().expect("derived lazily on first send");

    // B replies; A's cached entry must still satisfy the decrypt on A's side
    // once A receives it, and must be untouched by B's send (A's cache is
    // local to A and A never re-derives just because B wrote to its own).
    let mut reply_scratch = CapturingUi::default();
    b_session.send(a_identity, "reply", &mut reply_scratch).unwrap();
    thread::sleep(Duration::from_millis(150));

    a_session.send(b_identity, "second", &mut scratch).unwrap();
    thread::sleep(Duration::from_millis(150));

    let keys_after_second = a_store.get_session_keys(&b_identity).unwrap().expect("still cached, not evicted");
    assert_eq!(keys_after_first.send, keys_after_second.send, "send key reused rather than re-derived");
    assert_eq!(keys_after_first.receive, keys_after_second.receive, "receive key reused rather than re-derived");

    let rendered = b_ui.lock().unwrap().rendered.clone();
    assert_eq!(rendered.len(), 2, "B should have decrypted both A-originated messages");
    assert_eq!(rendered[0].2, "first");
    assert_eq!(rendered[1].2, "second");

    let a_rendered = a_ui.lock().unwrap().rendered.clone();
    assert_eq!(a_rendered.len(), 1, "A should have decrypted B's reply");
    assert_eq!(a_rendered[0].2, "reply");
}
