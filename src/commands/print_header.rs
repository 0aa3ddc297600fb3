use crate::format::Registry;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Print the beam, goniometer, detector and scan of each image followed by its total counts.
///
/// Files are processed in order and the first failure is returned; output for the
/// files before it has already been written.
pub fn print_header<P: AsRef<Path>, W: Write>(
    paths: &[P],
    registry: &Registry,
    out: &mut W,
) -> Result<()> {
    for path in paths {
        let path = path.as_ref();
        let handler = registry
            .find(path)
            .with_context(|| format!("Failed to identify image format: {}", path.display()))?;
        debug!("Reading {} as {}", path.display(), handler.name());

        let image = handler
            .open(path)
            .with_context(|| {
                format!("Failed to read {} image: {}", handler.name(), path.display())
            })?;
        let raw_data = image
            .raw_data()
            .with_context(|| format!("Failed to read pixel data: {}", path.display()))?;

        writeln!(out, "Beam:")?;
        writeln!(out, "{}", image.beam())?;
        writeln!(out, "Goniometer:")?;
        writeln!(out, "{}", image.goniometer())?;
        writeln!(out, "Detector:")?;
        writeln!(out, "{}", image.detector())?;
        writeln!(out, "Scan:")?;
        writeln!(out, "{}", image.scan())?;
        writeln!(out, "Total Counts:")?;
        writeln!(out, "{}", raw_data.total_counts())?;
    }

    Ok(())
}
