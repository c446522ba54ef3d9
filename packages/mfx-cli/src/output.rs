use crate::cli::CommonArgs;
use crate::exit_codes;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// JSON summary printed by every subcommand
#[derive(Serialize)]
pub struct Summary<'a, T: Serialize> {
    pub command: &'static str,
    pub created_at: String,
    pub out_dir: &'a Path,
    #[serde(flatten)]
    pub result: T,
}

/// Write JSON string to stdout or a file.
pub fn write_output(json: &str, output_path: Option<&str>) -> Result<(), String> {
    match output_path {
        Some(path) => std::fs::write(Path::new(path), json)
            .map_err(|e| format!("Failed to write output file '{}': {}", path, e)),
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(json.as_bytes())
                .and_then(|_| handle.write_all(b"\n"))
                .map_err(|e| format!("Failed to write to stdout: {}", e))
        }
    }
}

/// Serialize a value to JSON (pretty or compact).
pub fn to_json<T: Serialize>(value: &T, compact: bool) -> Result<String, String> {
    if compact {
        serde_json::to_string(value).map_err(|e| format!("JSON serialization failed: {}", e))
    } else {
        serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {}", e))
    }
}

/// Print the summary of a finished command and return its exit code
pub fn emit<T: Serialize>(command: &'static str, result: T, common: &CommonArgs) -> i32 {
    let summary = Summary {
        command,
        created_at: chrono::Utc::now().to_rfc3339(),
        out_dir: &common.out_dir,
        result,
    };
    match to_json(&summary, common.compact)
        .and_then(|json| write_output(&json, common.output.as_deref()))
    {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_codes::EXECUTION_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Files {
        mask_file: String,
    }

    #[test]
    fn test_summary_flattens_result() {
        let summary = Summary {
            command: "mask",
            created_at: "2024-01-01T00:00:00+00:00".to_string(),
            out_dir: Path::new("out"),
            result: Files {
                mask_file: "out/group_mask.nii.gz".to_string(),
            },
        };
        let json = to_json(&summary, true).unwrap();
        let expected = concat!(
            r#"{"command":"mask","created_at":"2024-01-01T00:00:00+00:00","#,
            r#""out_dir":"out","mask_file":"out/group_mask.nii.gz"}"#,
        );
        assert_eq!(json, expected);
    }
}
