//! Output checks run after a transform reports success

use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::Path;
use swing_transform::Prober;
use tracing::{debug, warn};

/// Checks that `output` exists, is non-empty and probes to a real video.
///
/// Empty or unreadable outputs are deleted.
pub fn validate_output(output: &Path, prober: &dyn Prober) -> Result<()> {
    let metadata = match fs::metadata(output) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::OutputMissing(output.to_path_buf()));
        }
        Err(e) => return Err(Error::Io(e)),
    };
    if metadata.len() == 0 {
        remove_partial(output);
        return Err(Error::OutputEmpty(output.to_path_buf()));
    }

    let unreadable = |reason: String| {
        remove_partial(output);
        Error::OutputUnreadable {
            path: output.to_path_buf(),
            reason,
        }
    };
    let info = prober.probe(output).map_err(|e| unreadable(e.to_string()))?;
    if !info.is_valid() {
        return Err(unreadable(format!("{}x{}", info.width, info.height)));
    }

    debug!(
        output = %output.display(),
        bytes = metadata.len(),
        width = info.width,
        height = info.height,
        "Output validated"
    );
    Ok(())
}

/// Deletes a partial output if present
pub fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swing_core::VideoInfo;

    struct FixedProbe(Option<VideoInfo>);

    impl Prober for FixedProbe {
        fn probe(&self, _path: &Path) -> swing_transform::Result<VideoInfo> {
            self.0
                .ok_or_else(|| swing_transform::Error::Failed("not a video".into()))
        }
    }

    #[test]
    fn test_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        let probe = FixedProbe(Some(VideoInfo::new(1, 1, 0)));
        assert!(matches!(
            validate_output(&path, &probe),
            Err(Error::OutputMissing(_))
        ));
    }

    #[test]
    fn test_empty_output_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        fs::write(&path, b"").unwrap();
        let probe = FixedProbe(Some(VideoInfo::new(1, 1, 0)));
        assert!(matches!(
            validate_output(&path, &probe),
            Err(Error::OutputEmpty(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_unprobeable_output_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        fs::write(&path, b"junk").unwrap();
        assert!(matches!(
            validate_output(&path, &FixedProbe(None)),
            Err(Error::OutputUnreadable { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_zero_dimension_output_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        fs::write(&path, b"junk").unwrap();
        let probe = FixedProbe(Some(VideoInfo::new(0, 720, 0)));
        assert!(matches!(
            validate_output(&path, &probe),
            Err(Error::OutputUnreadable { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_good_output_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        fs::write(&path, b"video").unwrap();
        let probe = FixedProbe(Some(VideoInfo::new(1280, 720, 0)));
        validate_output(&path, &probe).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_remove_partial_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        remove_partial(&dir.path().join("never-written.mp4"));
    }
}
