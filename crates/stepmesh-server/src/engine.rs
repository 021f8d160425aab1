//! The conversion capability seen by the service.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use stepmesh_kernel::{MeshFormat, Model, TessellationParams};
use thiserror::Error;

/// Totals of a successful conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionSummary {
    /// Solids read from the STEP file.
    pub solids: usize,
    /// Triangles written.
    pub triangles: usize,
    /// Size of the output file in bytes.
    pub bytes: usize,
}

/// A conversion that produced no usable mesh. Carries the kernel's
/// diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ConversionFailure(pub String);

/// Turns a STEP file into a mesh file.
pub trait MeshConverter: Send + Sync {
    /// Convert `input` into `output`.
    ///
    /// Blocking; callers run it off the async executor.
    fn convert(
        &self,
        input: &Path,
        output: &Path,
        params: &TessellationParams,
        format: MeshFormat,
    ) -> Result<ConversionSummary, ConversionFailure>;
}

/// [`MeshConverter`] backed by the bundled B-rep kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelConverter;

impl MeshConverter for KernelConverter {
    fn convert(
        &self,
        input: &Path,
        output: &Path,
        params: &TessellationParams,
        format: MeshFormat,
    ) -> Result<ConversionSummary, ConversionFailure> {
        let model = Model::from_step(input).map_err(|e| ConversionFailure(e.to_string()))?;
        let summary = model
            .export(params, format, output)
            .map_err(|e| ConversionFailure(e.to_string()))?;
        Ok(ConversionSummary {
            solids: summary.solids,
            triangles: summary.triangles,
            bytes: summary.bytes,
        })
    }
}

/// Run `converter` on the blocking pool, giving up after `timeout`.
///
/// `guards` travel with the blocking task. They are handed back on
/// success and dropped otherwise; after a timeout they are dropped only
/// once the kernel call actually returns.
pub async fn run_conversion<G>(
    converter: Arc<dyn MeshConverter>,
    input: &Path,
    output: &Path,
    params: TessellationParams,
    format: MeshFormat,
    timeout: Duration,
    guards: G,
) -> Result<(ConversionSummary, G), ConversionFailure>
where
    G: Send + 'static,
{
    let input = input.to_path_buf();
    let output = output.to_path_buf();
    let task = tokio::task::spawn_blocking(move || {
        let result = converter.convert(&input, &output, &params, format);
        (result, guards)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok((Ok(summary), guards))) => Ok((summary, guards)),
        Ok(Ok((Err(failure), guards))) => {
            drop(guards);
            Err(failure)
        }
        Ok(Err(join)) => Err(ConversionFailure(format!("conversion task failed: {join}"))),
        Err(_) => Err(ConversionFailure(format!(
            "timed out after {}s",
            timeout.as_secs_f64()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    const CUBE: &str = include_str!("../../../testdata/cube.step");

    #[test]
    fn test_kernel_converter_cube() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("cube.step");
        let output = dir.path().join("cube.stl");
        std::fs::write(&input, CUBE).unwrap();

        let summary = KernelConverter
            .convert(
                &input,
                &output,
                &TessellationParams::default(),
                MeshFormat::Stl,
            )
            .unwrap();
        assert_eq!(summary.solids, 1);
        assert!(summary.triangles >= 12);
        assert_eq!(std::fs::metadata(&output).unwrap().len() as usize, summary.bytes);
    }

    #[test]
    fn test_kernel_converter_reports_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.step");
        let output = dir.path().join("bad.stl");
        std::fs::write(&input, "this is not ISO-10303-21").unwrap();

        let err = KernelConverter
            .convert(
                &input,
                &output,
                &TessellationParams::default(),
                MeshFormat::Stl,
            )
            .unwrap_err();
        assert!(!err.0.is_empty());
        assert!(!output.exists());
    }

    struct Slow(Arc<AtomicBool>);

    impl MeshConverter for Slow {
        fn convert(
            &self,
            _: &Path,
            _: &Path,
            _: &TessellationParams,
            _: MeshFormat,
        ) -> Result<ConversionSummary, ConversionFailure> {
            std::thread::sleep(Duration::from_millis(300));
            self.0.store(true, Ordering::SeqCst);
            Ok(ConversionSummary {
                solids: 1,
                triangles: 1,
                bytes: 134,
            })
        }
    }

    #[derive(Debug)]
    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_timeout_fails_and_releases_after_return() {
        let finished = Arc::new(AtomicBool::new(false));
        let released = Arc::new(AtomicBool::new(false));
        let err = run_conversion(
            Arc::new(Slow(finished.clone())),
            Path::new("in"),
            Path::new("out"),
            TessellationParams::default(),
            MeshFormat::Stl,
            Duration::from_millis(20),
            SetOnDrop(released.clone()),
        )
        .await
        .unwrap_err();
        assert!(err.0.starts_with("timed out"), "{err}");
        assert!(!released.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(finished.load(Ordering::SeqCst));
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_completes_within_timeout() {
        let summary = run_conversion(
            Arc::new(Slow(Arc::new(AtomicBool::new(false)))),
            Path::new("in"),
            Path::new("out"),
            TessellationParams::default(),
            MeshFormat::Glb,
            Duration::from_secs(10),
            (),
        )
        .await
        .unwrap();
        assert_eq!(summary.0.triangles, 1);
    }
}
