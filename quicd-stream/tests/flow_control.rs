//! Receive streams wired to the real stream and connection flow controllers.

use parking_lot::Mutex;
use quicd_stream::flow_control::SharedConnectionFlowController;
use quicd_stream::{
    ConnectionFlowController, ControlFrame, ControlFrameSource, Error, FlowControlConfig,
    MaxStreamDataFrame, ReceiveStream, ResetStreamFrame, StreamFrame, StreamId, StreamSender,
    TransportError,
};
use std::sync::Arc;
use std::time::Instant;

#[derive(Default)]
struct RecordingSender {
    notified: Mutex<Vec<StreamId>>,
    completed: Mutex<Vec<StreamId>>,
}

impl StreamSender for RecordingSender {
    fn on_has_stream_control_frame(&self, stream_id: StreamId, _stream: &dyn ControlFrameSource) {
        self.notified.lock().push(stream_id);
    }

    fn on_stream_completed(&self, stream_id: StreamId) {
        self.completed.lock().push(stream_id);
    }
}

fn small_config() -> FlowControlConfig {
    FlowControlConfig {
        initial_max_data: 100,
        initial_max_stream_data: 40,
        max_stream_window: 40,
        window_update_threshold: 0.5,
        auto_tune_interval_ms: 0,
    }
}

struct Connection {
    config: FlowControlConfig,
    flow: SharedConnectionFlowController,
    sender: Arc<RecordingSender>,
}

impl Connection {
    fn new(config: FlowControlConfig) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        Self {
            flow: ConnectionFlowController::shared(&config),
            config,
            sender: Arc::new(RecordingSender::default()),
        }
    }

    fn open(&self, id: u64) -> ReceiveStream {
        ReceiveStream::with_config(
            StreamId::new(id),
            self.sender.clone(),
            &self.config,
            Some(self.flow.clone()),
        )
    }
}

fn data(id: u64, offset: u64, len: usize, fin: bool) -> StreamFrame {
    StreamFrame::new(StreamId::new(id), offset, vec![0xab; len], fin)
}

#[test]
fn test_stream_window_violation() {
    let conn = Connection::new(small_config());
    let stream = conn.open(4);

    stream.handle_stream_frame(&data(4, 0, 40, false), Instant::now()).unwrap();
    let err = stream
        .handle_stream_frame(&data(4, 40, 1, false), Instant::now())
        .unwrap_err();
    assert_eq!(err, Error::Transport(TransportError::FlowControlError));
    assert_eq!(err.to_string(), "transport error: FlowControlError (0x3)");
}

#[test]
fn test_connection_window_spans_streams() {
    let conn = Connection::new(small_config());
    let streams: Vec<_> = [0, 4, 8].into_iter().map(|id| conn.open(id)).collect();
    let now = Instant::now();

    streams[0].handle_stream_frame(&data(0, 0, 40, false), now).unwrap();
    streams[1].handle_stream_frame(&data(4, 0, 40, false), now).unwrap();
    let err = streams[2].handle_stream_frame(&data(8, 0, 30, false), now).unwrap_err();
    assert_eq!(err, Error::Transport(TransportError::FlowControlError));
}

#[test]
fn test_reading_queues_max_stream_data() {
    let conn = Connection::new(small_config());
    let stream = conn.open(4);
    stream.handle_stream_frame(&data(4, 0, 40, false), Instant::now()).unwrap();

    // Below the threshold
    assert_eq!(stream.read(&mut [0u8; 19]).unwrap().len, 19);
    assert!(conn.sender.notified.lock().is_empty());

    assert_eq!(stream.read(&mut [0u8; 1]).unwrap().len, 1);
    assert_eq!(*conn.sender.notified.lock(), vec![StreamId::new(4)]);

    let (frame, has_more) = stream.get_control_frame(Instant::now()).unwrap();
    assert_eq!(
        frame,
        ControlFrame::MaxStreamData(MaxStreamDataFrame {
            stream_id: StreamId::new(4),
            maximum_stream_data: 60,
        })
    );
    assert!(!has_more);
    assert_eq!(conn.flow.lock().bytes_read(), 20);

    // The peer may now send up to offset 60
    stream.handle_stream_frame(&data(4, 40, 20, false), Instant::now()).unwrap();
}

#[test]
fn test_reads_on_two_streams_make_max_data_due() {
    let conn = Connection::new(small_config());
    let a = conn.open(0);
    let b = conn.open(4);
    let now = Instant::now();

    a.handle_stream_frame(&data(0, 0, 30, false), now).unwrap();
    b.handle_stream_frame(&data(4, 0, 30, false), now).unwrap();

    assert_eq!(a.read(&mut [0u8; 25]).unwrap().len, 25);
    assert!(!conn.flow.lock().has_window_update());
    assert_eq!(b.read(&mut [0u8; 25]).unwrap().len, 25);
    assert!(conn.flow.lock().has_window_update());

    let max_data = conn.flow.lock().get_window_update(Instant::now());
    assert_eq!(max_data, Some(150));
}

#[test]
fn test_final_size_violations() {
    let conn = Connection::new(small_config());
    let stream = conn.open(4);
    let final_size_error = Error::Transport(TransportError::FinalSizeError);

    stream.handle_stream_frame(&data(4, 0, 10, true), Instant::now()).unwrap();
    assert_eq!(
        stream.handle_stream_frame(&data(4, 8, 4, false), Instant::now()),
        Err(final_size_error.clone())
    );

    let reset = ResetStreamFrame {
        stream_id: StreamId::new(4),
        error_code: 1,
        final_size: 12,
    };
    assert_eq!(
        stream.handle_reset_stream_frame(&reset, Instant::now()),
        Err(final_size_error)
    );
    assert_eq!(stream.remote_error_code(), None);
}

#[test]
fn test_reset_below_received_data() {
    let conn = Connection::new(small_config());
    let stream = conn.open(4);
    stream.handle_stream_frame(&data(4, 0, 20, false), Instant::now()).unwrap();

    let reset = ResetStreamFrame {
        stream_id: StreamId::new(4),
        error_code: 1,
        final_size: 10,
    };
    assert_eq!(
        stream.handle_reset_stream_frame(&reset, Instant::now()),
        Err(Error::Transport(TransportError::FinalSizeError))
    );
}

#[test]
fn test_canceled_stream_returns_unread_credit_to_connection() {
    let conn = Connection::new(small_config());
    let stream = conn.open(4);

    stream.handle_stream_frame(&data(4, 0, 30, false), Instant::now()).unwrap();
    assert_eq!(stream.read(&mut [0u8; 10]).unwrap().len, 10);
    assert_eq!(conn.flow.lock().bytes_read(), 10);

    stream.cancel_read(7);
    // Final size still unknown, nothing released yet
    assert_eq!(conn.flow.lock().bytes_read(), 10);
    assert!(conn.sender.completed.lock().is_empty());

    stream.handle_stream_frame(&data(4, 30, 5, true), Instant::now()).unwrap();
    let flow = conn.flow.lock();
    assert_eq!(flow.bytes_received(), 35);
    assert_eq!(flow.bytes_read(), 35);
    assert_eq!(*conn.sender.completed.lock(), vec![StreamId::new(4)]);
}

#[test]
fn test_reset_returns_credit_once() {
    let conn = Connection::new(small_config());
    let stream = conn.open(4);
    stream.handle_stream_frame(&data(4, 0, 25, false), Instant::now()).unwrap();

    let reset = ResetStreamFrame {
        stream_id: StreamId::new(4),
        error_code: 9,
        final_size: 30,
    };
    stream.handle_reset_stream_frame(&reset, Instant::now()).unwrap();
    stream.handle_reset_stream_frame(&reset, Instant::now()).unwrap();

    let flow = conn.flow.lock();
    assert_eq!(flow.bytes_received(), 30);
    assert_eq!(flow.bytes_read(), 30);
}

#[test]
fn test_drained_stream_sends_no_more_updates() {
    let conn = Connection::new(small_config());
    let stream = conn.open(4);
    stream.handle_stream_frame(&data(4, 0, 40, true), Instant::now()).unwrap();

    let outcome = stream.read(&mut [0u8; 64]).unwrap();
    assert_eq!((outcome.len, outcome.fin), (40, true));
    assert!(conn.sender.notified.lock().is_empty());
    assert_eq!(stream.get_control_frame(Instant::now()), None);
    assert_eq!(conn.flow.lock().bytes_read(), 40);
}

#[test]
fn test_streams_from_toml_config() {
    let config = FlowControlConfig::from_toml_str(
        r#"
        [flow_control]
        initial_max_data = 1000
        initial_max_stream_data = 100
        max_stream_window = 400
        "#,
    )
    .unwrap();
    let conn = Connection::new(config);
    let stream = conn.open(0);

    stream.handle_stream_frame(&data(0, 0, 100, false), Instant::now()).unwrap();
    assert_eq!(
        stream.handle_stream_frame(&data(0, 100, 1, false), Instant::now()),
        Err(Error::Transport(TransportError::FlowControlError))
    );
}
