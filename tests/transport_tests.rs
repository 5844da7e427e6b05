use vehbus::command_source::{parse_remote_line, ChannelCommandSource, CommandSource, ScriptedCommandSource};
use vehbus::telemetry::Frame;
use vehbus::transport::{BroadcastSink, CandumpSink, LogSink, RecordingSink, TransportError, TransportSink};
use vehbus::CommandToken;

#[cfg(test)]
mod sink_tests {
    use super::*;

    #[test]
    fn test_candump_sink_writes_lines() {
        let mut sink = CandumpSink::new(Vec::<u8>::new(), "vcan0");

        sink.send(0x100, &[0x24, 0x00]).unwrap();
        sink.send(0x108, &[b'D']).unwrap();
        sink.flush().unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "  vcan0  100   [2]  24 00\n  vcan0  108   [1]  44\n");
    }

    #[test]
    fn test_candump_sink_uses_interface_label() {
        let mut sink = CandumpSink::new(Vec::<u8>::new(), "can1");

        sink.send(0x109, &[1]).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text.starts_with("  can1  109"));
    }

    #[test]
    fn test_oversized_payload_rejected_by_every_sink() {
        let payload = [0u8; 9];

        let mut candump = CandumpSink::new(Vec::<u8>::new(), "vcan0");
        assert!(matches!(candump.send(0x100, &payload), Err(TransportError::PayloadTooLong { len: 9 })));
        assert!(candump.into_inner().is_empty());

        let mut log = LogSink;
        assert!(matches!(log.send(0x100, &payload), Err(TransportError::PayloadTooLong { len: 9 })));

        let mut recording = RecordingSink::new();
        assert!(matches!(recording.send(0x100, &payload), Err(TransportError::PayloadTooLong { len: 9 })));
        assert!(recording.frames.is_empty());
    }

    #[test]
    fn test_broadcast_without_subscribers_is_not_an_error() {
        let mut sink = BroadcastSink::new(16);

        assert_eq!(sink.subscriber_count(), 0);
        assert!(sink.send(0x100, &[0x24, 0x00]).is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let mut sink = BroadcastSink::new(16);
        let mut first = sink.subscribe();
        let mut second = sink.subscribe();

        sink.send(0x100, &[0x24, 0x00]).unwrap();

        let expected = Frame::new(0x100, &[0x24, 0x00]).unwrap();
        assert_eq!(first.recv().await.unwrap(), expected);
        assert_eq!(second.recv().await.unwrap(), expected);
    }

    #[test]
    fn test_recording_sink_failures() {
        let mut sink = RecordingSink::failing_on(&[0x101]);

        assert!(sink.send(0x100, &[1, 0]).is_ok());
        assert!(matches!(sink.send(0x101, &[1, 0]), Err(TransportError::Closed)));

        assert_eq!(sink.frames.len(), 1);
        sink.clear();
        assert!(sink.frames.is_empty());
    }
}

#[cfg(test)]
mod command_source_tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source_drains_in_order() {
        let (tx, mut source) = ChannelCommandSource::channel(8);
        tx.send(CommandToken::StartStop).await.unwrap();
        tx.send(CommandToken::SelectDrive).await.unwrap();
        tx.send(CommandToken::Accelerate).await.unwrap();

        assert_eq!(
            source.poll_commands(),
            vec![CommandToken::StartStop, CommandToken::SelectDrive, CommandToken::Accelerate]
        );
        assert!(source.poll_commands().is_empty());
        assert!(!source.is_disconnected());
    }

    #[tokio::test]
    async fn test_channel_source_notices_closed_producers() {
        let (tx, mut source) = ChannelCommandSource::channel(8);
        tx.send(CommandToken::Quit).await.unwrap();
        drop(tx);

        assert_eq!(source.poll_commands(), vec![CommandToken::Quit]);
        assert!(source.poll_commands().is_empty());
        assert!(source.is_disconnected());
    }

    #[test]
    fn test_scripted_source_is_bounded() {
        let mut source = ScriptedCommandSource::new();

        let rejected = (0..40).filter(|_| source.push(CommandToken::Accelerate).is_err()).count();

        assert!(rejected > 0);
        assert_eq!(source.len() + rejected, 40);
        assert_eq!(source.poll_commands().len() + rejected, 40);
        assert!(source.is_empty());
    }

    #[test]
    fn test_scripted_source_delivers_once() {
        let mut source = ScriptedCommandSource::default();
        source.push_all(&[CommandToken::TurnLeft, CommandToken::Hazard]).unwrap();

        assert_eq!(source.poll_commands(), vec![CommandToken::TurnLeft, CommandToken::Hazard]);
        assert!(source.poll_commands().is_empty());
    }

    #[test]
    fn test_remote_lines() {
        assert_eq!(parse_remote_line("\"Hazard\""), vec![CommandToken::Hazard]);
        assert_eq!(
            parse_remote_line(r#"["Accelerate", "TurnRight"]"#),
            vec![CommandToken::Accelerate, CommandToken::TurnRight]
        );
        assert_eq!(parse_remote_line("sd"), vec![CommandToken::StartStop, CommandToken::SelectDrive]);
        assert_eq!(parse_remote_line("park\n"), vec![CommandToken::SelectPark]);
        assert!(parse_remote_line("").is_empty());
    }
}
