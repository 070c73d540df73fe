//! Remote document export.

use crate::error::AnalysisError;
use crate::model::AnalysisResult;
use crate::remote::DocumentRenderer;
use std::path::Path;

/// Send the result (and the rasterized chart, when one exists) to the
/// document boundary and deliver the returned binary to `path`.
///
/// The document bytes live only inside this call; nothing is staged or
/// retained across exports.
pub async fn export_document(
    renderer: &dyn DocumentRenderer,
    result: &AnalysisResult,
    image_png: Option<Vec<u8>>,
    path: &Path,
) -> Result<(), AnalysisError> {
    let bytes = renderer.render(result, image_png.as_deref()).await?;
    std::fs::write(path, &bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnalysisConfig;
    use async_trait::async_trait;
    use serde_json::json;

    struct CannedRenderer {
        response: Result<Vec<u8>, ()>,
    }

    #[async_trait]
    impl DocumentRenderer for CannedRenderer {
        async fn render(
            &self,
            _result: &AnalysisResult,
            image_png: Option<&[u8]>,
        ) -> Result<Vec<u8>, AnalysisError> {
            match &self.response {
                Ok(bytes) => {
                    let mut out = bytes.clone();
                    // Echo whether an image rode along, for assertions.
                    out.push(image_png.is_some() as u8);
                    Ok(out)
                }
                Err(()) => Err(AnalysisError::network("render service returned 503")),
            }
        }
    }

    fn result() -> AnalysisResult {
        AnalysisResult {
            analysis: "Linearity".into(),
            config: AnalysisConfig::default(),
            payload: json!({"residuals": [0.1], "r_squared": 0.9,
                "summary": "s", "reasoning": "r", "statistics": {}}),
            completed_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn writes_returned_bytes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Linearity_2026-01-01.docx");
        let renderer = CannedRenderer {
            response: Ok(vec![0x50, 0x4b]),
        };
        export_document(&renderer, &result(), Some(vec![1, 2, 3]), &path)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![0x50, 0x4b, 1]);
    }

    #[tokio::test]
    async fn boundary_failure_is_recoverable_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Linearity_2026-01-01.docx");
        let renderer = CannedRenderer { response: Err(()) };
        let err = export_document(&renderer, &result(), None, &path)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(!path.exists());
    }
}
