//! Drives the real process path with a stand-in `yt-dlp` script.
//!
//! Kept to a single test: writing an executable while another thread forks can fail with
//! ETXTBSY, so nothing else in this binary spawns processes.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tokio_util::sync::CancellationToken;
use vttsync::{Acquirer, AcquisitionOpts, ErrorKind};

const FAKE_YT_DLP: &str = r#"#!/bin/sh
out=""
url=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    --) url="$2"; shift 2 ;;
    *) shift ;;
  esac
done
case "$url" in
  *missing*) echo "ERROR: Video unavailable" >&2; exit 1 ;;
esac
target=$(printf '%s' "$out" | sed 's/%(ext)s/mp3/')
printf 'ID3fake-audio' > "$target"
echo "[ExtractAudio] Destination: $target"
"#;

fn install_script(dir: &Path) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join("yt-dlp");
    std::fs::write(&path, FAKE_YT_DLP)?;
    let mut perms = std::fs::metadata(&path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms)?;
    Ok(path)
}

#[tokio::test]
async fn script_extractor_success_and_failure() -> anyhow::Result<()> {
    let bin = tempfile::tempdir()?;
    let work = tempfile::tempdir()?;
    let program = install_script(bin.path())?;

    let acquirer = Acquirer::new(AcquisitionOpts {
        program,
        temp_dir: work.path().to_path_buf(),
        ..AcquisitionOpts::default()
    });

    let artifact = acquirer
        .acquire("https://example.com/watch?v=ok", &CancellationToken::new())
        .await?;
    assert_eq!(artifact.decode_payload()?, b"ID3fake-audio");
    assert_eq!(artifact.mime_type, "audio/mp3");
    assert!(artifact.name.starts_with("youtube_") && artifact.name.ends_with(".mp3"));

    let err = acquirer
        .acquire("https://example.com/watch?v=missing", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExtractionFailed);
    assert_eq!(err.diagnostics(), Some("ERROR: Video unavailable"));

    assert_eq!(std::fs::read_dir(work.path())?.count(), 0);
    Ok(())
}
