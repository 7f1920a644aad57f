use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("unable to create report directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to write report {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub fn report_file_name(generated_at: NaiveDateTime) -> String {
    format!(
        "PasswordExpirationReport_{}.html",
        generated_at.format("%Y%m%d_%H%M")
    )
}

/// Write the rendered digest into `dir`, creating the directory if needed.
pub fn write_report(
    dir: &Path,
    generated_at: NaiveDateTime,
    html: &str,
) -> Result<PathBuf, ReportError> {
    fs::create_dir_all(dir).map_err(|source| ReportError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(report_file_name(generated_at));
    fs::write(&path, html).map_err(|source| ReportError::Write {
        path: path.clone(),
        source,
    })?;

    info!(path = %path.display(), bytes = html.len(), "report written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 7)
            .and_then(|date| date.and_hms_opt(6, 5, 59))
            .expect("valid timestamp")
    }

    #[test]
    fn file_name_uses_minute_precision_stamp() {
        assert_eq!(
            report_file_name(stamp()),
            "PasswordExpirationReport_20250307_0605.html"
        );
    }

    #[test]
    fn write_report_creates_nested_directory() {
        let temp = tempfile::tempdir().expect("temp dir");
        let dir = temp.path().join("reports").join("weekly");

        let path = write_report(&dir, stamp(), "<html></html>").expect("report written");

        assert_eq!(path, dir.join("PasswordExpirationReport_20250307_0605.html"));
        let contents = fs::read_to_string(&path).expect("report readable");
        assert_eq!(contents, "<html></html>");
    }
}
