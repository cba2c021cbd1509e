use std::path::Path;

use serde::Serialize;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;

use crate::error::{AppError, AppResult, ReportError};

/// Writes `value` as pretty JSON to `path`.
///
/// # Errors
///
/// Returns an error when serialization fails or the file cannot be written.
pub(crate) async fn export_json<T>(path: &str, value: &T) -> AppResult<()>
where
    T: Serialize + ?Sized,
{
    let json = serde_json::to_vec_pretty(value)
        .map_err(|err| AppError::report(ReportError::Serialize { source: err }))?;
    write_file(path, &json)
        .await
        .map_err(|err| {
            AppError::report(ReportError::WriteReport {
                path: Path::new(path).to_path_buf(),
                source: err,
            })
        })?;
    info!("Report written to {}", path);
    Ok(())
}

async fn write_file(path: &str, bytes: &[u8]) -> Result<(), std::io::Error> {
    let file = tokio::fs::File::create(path).await?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
