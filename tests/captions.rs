use vttsync::cue_encoder::write_cues;
use vttsync::locator::{ActiveCueChange, CueIndex, PlaybackTracker, locate};
use vttsync::sanitize::clean;
use vttsync::vtt_encoder::VttEncoder;
use vttsync::{
    CaptionSession, Cue, Error, MediaArtifact, SessionStatus, Transcriber, timestamp, vtt_parser,
};

const FENCED: &str = "```vtt\nWEBVTT\n\n00:00:01.000 --> 00:00:03.500\nHello world\n\n00:00:05.000 --> 00:00:06.000\nSecond line\n```";

/// Replies with a fixed engine output.
struct Canned(&'static str);

impl Transcriber for Canned {
    async fn transcribe(&self, _payload: &str, _mime: &str) -> vttsync::Result<String> {
        Ok(self.0.to_owned())
    }
}

#[test]
fn generated_captions_drive_playback() {
    let document = clean(FENCED);
    assert!(document.starts_with("WEBVTT"));
    assert!(!document.contains("```"));

    let cues = vtt_parser::parse(&document);
    assert_eq!(
        cues,
        vec![
            Cue::new(1.0, 3.5, "Hello world"),
            Cue::new(5.0, 6.0, "Second line"),
        ]
    );

    assert_eq!(locate(&cues, 2.0).map(|c| c.text.as_str()), Some("Hello world"));
    assert_eq!(locate(&cues, 4.0), None);
    assert_eq!(locate(&cues, 6.0).map(|c| c.text.as_str()), Some("Second line"));
    assert_eq!(locate(&cues, 0.5), None);
}

#[test]
fn malformed_blocks_are_skipped_without_losing_neighbours() {
    let document = "WEBVTT\n\n\
                    00:00:01.000 --> 00:00:02.000\nfirst\n\n\
                    garbage without timing\n\n\
                    00:00:0x.000 --> 00:00:04.000\nbad timestamp\n\n\
                    00:00:05.000 --> 00:00:06.000\nlast\n";

    let report = vtt_parser::parse_with_report(document);
    let texts: Vec<&str> = report.cues.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "last"]);
    assert!(report.malformed_blocks >= 1);
}

#[test]
fn cleaning_twice_changes_nothing() {
    for raw in [FENCED, "```\nWEBVTT\n```", "  WEBVTT  ", "```vtt\r\n```vtt\nX\n```", ""] {
        let once = clean(raw);
        assert_eq!(clean(&once), once, "not idempotent for {raw:?}");
    }
}

#[test]
fn exported_track_parses_back_to_the_same_cues() -> anyhow::Result<()> {
    let cues = vtt_parser::parse(&clean(FENCED));

    let mut out = Vec::new();
    {
        let mut encoder = VttEncoder::new(&mut out);
        write_cues(&mut encoder, &cues)?;
    }
    let exported = String::from_utf8(out)?;

    assert_eq!(vtt_parser::parse(&exported), cues);
    assert_eq!(timestamp::format(cues[0].end), "00:00:03.500");
    Ok(())
}

#[test]
fn indexed_lookup_agrees_with_linear_scan() {
    let cues = vec![
        Cue::new(0.0, 10.0, "long"),
        Cue::new(2.0, 3.0, "inner"),
        Cue::new(12.0, 14.0, "later"),
        Cue::new(13.0, 20.0, "overlap"),
    ];
    let index = CueIndex::new(&cues);

    let mut t = -1.0;
    while t <= 21.0 {
        assert_eq!(index.locate(&cues, t), locate(&cues, t), "at {t}");
        t += 0.25;
    }
}

#[test]
fn tracker_reports_only_transitions() {
    let cues = vtt_parser::parse(&clean(FENCED));
    let mut tracker = PlaybackTracker::new();

    let mut changes = Vec::new();
    for t in [0.0, 1.0, 2.0, 3.5, 4.0, 5.5, 7.0] {
        match tracker.update(&cues, t) {
            ActiveCueChange::Unchanged => {}
            ActiveCueChange::Entered(cue) => changes.push(format!("enter {}", cue.text)),
            ActiveCueChange::Cleared => changes.push("clear".to_owned()),
        }
    }
    assert_eq!(
        changes,
        vec!["enter Hello world", "clear", "enter Second line", "clear"]
    );
}

#[tokio::test]
async fn session_transcribes_and_retries_cleanly() {
    let artifact = MediaArtifact::from_bytes("youtube_1.mp3", "audio/mp3", b"audio");

    let mut session = CaptionSession::new();
    let err = session
        .transcribe(&Canned("```vtt\n\n```"), &artifact)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TranscriptionFailed(_)));
    assert_eq!(session.status(), SessionStatus::Error);
    assert!(session.cues().is_empty());

    session
        .transcribe(&Canned(FENCED), &artifact)
        .await
        .expect("second run succeeds");
    assert_eq!(session.status(), SessionStatus::Success);
    assert!(session.error().is_none());
    assert_eq!(session.cues().len(), 2);
    assert_eq!(
        session.active_cue(5.5).map(|c| c.text.as_str()),
        Some("Second line")
    );
    assert_eq!(session.export_file_name(), "youtube_1.vtt");
}
