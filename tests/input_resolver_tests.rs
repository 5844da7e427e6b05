use vehbus::input::{parse_line, CommandToken, DiscreteRequest, InputResolver, KeyDecoder, PedalIntent};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[cfg(test)]
mod pedal_tests {
    use super::*;

    #[test]
    fn test_accelerate_sets_full_throttle() {
        let resolver = InputResolver::new();
        let previous = PedalIntent { throttle: 0.0, brake: 0.6 };

        let resolution = resolver.resolve([CommandToken::Accelerate], previous);

        assert_eq!(resolution.intent, PedalIntent { throttle: 1.0, brake: 0.0 });
        assert!(resolution.accelerate);
        assert!(!resolution.brake);
    }

    #[test]
    fn test_brake_sets_full_brake() {
        let resolver = InputResolver::new();
        let previous = PedalIntent { throttle: 0.8, brake: 0.0 };

        let resolution = resolver.resolve([CommandToken::Brake], previous);

        assert_eq!(resolution.intent, PedalIntent { throttle: 0.0, brake: 1.0 });
    }

    #[test]
    fn test_accelerate_wins_over_brake() {
        let resolver = InputResolver::new();

        let resolution = resolver.resolve(
            [CommandToken::Brake, CommandToken::Accelerate, CommandToken::Brake],
            PedalIntent::default(),
        );

        assert_eq!(resolution.intent.throttle, 1.0);
        assert_eq!(resolution.intent.brake, 0.0);
        assert!(resolution.accelerate && resolution.brake);
    }

    #[test]
    fn test_release_decays_each_pedal_at_its_own_rate() {
        let resolver = InputResolver::new();
        let previous = PedalIntent { throttle: 0.5, brake: 0.5 };

        let resolution = resolver.resolve(core::iter::empty(), previous);

        assert!(approx(resolution.intent.throttle, 0.4));
        assert!(approx(resolution.intent.brake, 0.3));
    }

    #[test]
    fn test_release_never_goes_negative() {
        let resolver = InputResolver::new();
        let mut intent = PedalIntent { throttle: 0.05, brake: 0.15 };

        for _ in 0..3 {
            intent = resolver.resolve(core::iter::empty(), intent).intent;
            assert!(intent.throttle >= 0.0);
            assert!(intent.brake >= 0.0);
        }

        assert_eq!(intent, PedalIntent::default());
    }
}

#[cfg(test)]
mod request_tests {
    use super::*;

    #[test]
    fn test_same_kind_tokens_collapse_in_first_seen_order() {
        let resolver = InputResolver::new();

        let resolution = resolver.resolve(
            [
                CommandToken::ToggleLights,
                CommandToken::ToggleLights,
                CommandToken::SelectDrive,
                CommandToken::ToggleLights,
                CommandToken::StartStop,
            ],
            PedalIntent::default(),
        );

        assert_eq!(
            resolution.requests.as_slice(),
            &[DiscreteRequest::ToggleLights, DiscreteRequest::SelectDrive, DiscreteRequest::StartStop]
        );
    }

    #[test]
    fn test_unknown_tokens_are_counted_not_applied() {
        let resolver = InputResolver::new();

        let resolution = resolver.resolve(
            [CommandToken::Unknown, CommandToken::Unknown, CommandToken::Hazard],
            PedalIntent::default(),
        );

        assert_eq!(resolution.ignored, 2);
        assert_eq!(resolution.requests.as_slice(), &[DiscreteRequest::Hazard]);
    }

    #[test]
    fn test_quit_is_reported() {
        let resolver = InputResolver::new();

        let idle = resolver.resolve([CommandToken::Accelerate], PedalIntent::default());
        assert!(!idle.quit_requested());

        let quit = resolver.resolve([CommandToken::Quit], PedalIntent::default());
        assert!(quit.quit_requested());
    }

    #[test]
    fn test_pedal_tokens_produce_no_requests() {
        let resolver = InputResolver::new();

        let resolution = resolver.resolve([CommandToken::Accelerate, CommandToken::Brake], PedalIntent::default());

        assert!(resolution.requests.is_empty());
        assert_eq!(resolution.ignored, 0);
    }
}

#[cfg(test)]
mod key_decoding_tests {
    use super::*;

    #[test]
    fn test_letter_keys_are_case_insensitive() {
        assert_eq!(CommandToken::from_key('a'), CommandToken::Accelerate);
        assert_eq!(CommandToken::from_key('A'), CommandToken::Accelerate);
        assert_eq!(CommandToken::from_key('s'), CommandToken::StartStop);
        assert_eq!(CommandToken::from_key('t'), CommandToken::ResetTrip);
        assert_eq!(CommandToken::from_key(' '), CommandToken::Handbrake);
        assert_eq!(CommandToken::from_key('x'), CommandToken::Unknown);
    }

    #[test]
    fn test_arrow_sequences() {
        assert_eq!(parse_line("\x1b[D"), vec![CommandToken::TurnLeft]);
        assert_eq!(parse_line("\x1b[C"), vec![CommandToken::TurnRight]);
        assert_eq!(parse_line("\x1b[A"), vec![CommandToken::Hazard]);
        assert_eq!(parse_line("\x1b[Z"), vec![CommandToken::Unknown]);
    }

    #[test]
    fn test_dangling_escape_is_unknown() {
        assert_eq!(parse_line("\x1b"), vec![CommandToken::Unknown]);
        assert_eq!(parse_line("a\x1b["), vec![CommandToken::Accelerate, CommandToken::Unknown]);
    }

    #[test]
    fn test_line_of_keys_keeps_order() {
        assert_eq!(
            parse_line("sda\x1b[Db\n"),
            vec![
                CommandToken::StartStop,
                CommandToken::SelectDrive,
                CommandToken::Accelerate,
                CommandToken::TurnLeft,
                CommandToken::Brake,
            ]
        );
    }

    #[test]
    fn test_command_words() {
        assert_eq!(parse_line("left"), vec![CommandToken::TurnLeft]);
        assert_eq!(parse_line("  Hazard "), vec![CommandToken::Hazard]);
        assert_eq!(parse_line("handbrake"), vec![CommandToken::Handbrake]);
        assert_eq!(parse_line("quit"), vec![CommandToken::Quit]);
        assert!(parse_line("").is_empty());
    }

    #[test]
    fn test_decoder_is_idle_between_sequences() {
        let mut decoder = KeyDecoder::new();
        assert!(decoder.is_idle());

        assert_eq!(decoder.feed('\x1b'), None);
        assert!(!decoder.is_idle());
        assert_eq!(decoder.feed('['), None);
        assert_eq!(decoder.feed('C'), Some(CommandToken::TurnRight));
        assert!(decoder.is_idle());

        // ESC followed by anything but '[' is dropped as unknown
        assert_eq!(decoder.feed('\x1b'), None);
        assert_eq!(decoder.feed('q'), Some(CommandToken::Unknown));
        assert_eq!(decoder.feed('q'), Some(CommandToken::Quit));
    }

    #[test]
    fn test_tokens_serialize_by_name() {
        assert_eq!(serde_json::to_string(&CommandToken::TurnLeft).unwrap(), "\"TurnLeft\"");
        let token: CommandToken = serde_json::from_str("\"SelectPark\"").unwrap();
        assert_eq!(token, CommandToken::SelectPark);
    }
}
