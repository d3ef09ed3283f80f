use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Read a parameter file as a generic `serde_json::Value`.
///
/// Files ending in `.yaml` or `.yml` are parsed as YAML, anything else as JSON.
pub fn read_value(path: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    parse_contents(&contents, is_yaml(&canonical))
        .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e).into())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn parse_contents(contents: &str, yaml: bool) -> Result<Value, Box<dyn std::error::Error>> {
    let value = if yaml {
        serde_yaml::from_str(contents)?
    } else {
        serde_json::from_str(contents)?
    };
    Ok(value)
}

/// Resolve the path against the working directory and check it is a file.
fn resolve_path(path: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let canonical = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    if !canonical.exists() {
        return Err(format!("File not found: {}", canonical.display()).into());
    }

    if !canonical.is_file() {
        return Err(format!("Not a file: {}", canonical.display()).into());
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_yaml_and_json_parse_to_same_value() {
        let yaml = "spot_price: 100\nstrike_price: 95\noption_type: put\n";
        let json_text = r#"{"spot_price": 100, "strike_price": 95, "option_type": "put"}"#;
        let a = parse_contents(yaml, true).unwrap();
        let b = parse_contents(json_text, false).unwrap();
        assert_eq!(a, b);
        assert_eq!(a["option_type"], json!("put"));
    }

    #[test]
    fn test_extension_detection() {
        assert!(is_yaml(Path::new("loan.yaml")));
        assert!(is_yaml(Path::new("dir/bond.yml")));
        assert!(!is_yaml(Path::new("dcf.json")));
        assert!(!is_yaml(Path::new("params")));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = read_value("definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn test_reads_yaml_file_from_disk() {
        let path = std::env::temp_dir().join("fincash_cli_read_value_test.yml");
        fs::write(&path, "duration_months: 24\nannual_rate: 0.05\n").unwrap();
        let value = read_value(path.to_str().unwrap()).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(value["duration_months"], json!(24));
    }
}
