use bytes::Bytes;

/// Raw bytes handed over by the camera or an upload.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Producer of captured images.
///
/// Every call to [`CaptureSource::captures`] starts a fresh, lazy sequence of
/// at most one image, so re-running a scan re-reads the same capture.
#[derive(Debug, Clone, Default)]
pub struct CaptureSource {
    image: Option<CapturedImage>,
}

impl CaptureSource {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: Bytes, content_type: Option<String>) -> Self {
        if bytes.is_empty() {
            return Self::empty();
        }
        Self {
            image: Some(CapturedImage {
                bytes,
                content_type,
            }),
        }
    }

    pub fn captures(&self) -> std::option::IntoIter<CapturedImage> {
        self.image.clone().into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_at_most_once_per_invocation_and_restarts() {
        let src = CaptureSource::from_bytes(Bytes::from_static(b"\xFF\xD8\xFF"), None);
        let mut first = src.captures();
        assert!(first.next().is_some());
        assert!(first.next().is_none());

        let again: Vec<_> = src.captures().collect();
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn empty_upload_produces_nothing() {
        assert_eq!(CaptureSource::from_bytes(Bytes::new(), None).captures().count(), 0);
        assert_eq!(CaptureSource::empty().captures().count(), 0);
    }
}
