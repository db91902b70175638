//! Loading schemas, operations, fixtures and configuration.
//!
//! Schemas come from SDL files, SDL strings, or HTTP URLs.

use std::path::Path;

use serde_json::Value;

use crate::config::WrapConfig;
use crate::document::Document;
use crate::error::LoadError;
use crate::schema::Schema;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

fn read_file(path: &Path) -> Result<String, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a schema from an SDL file.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::Schema` if the SDL doesn't build a valid schema.
pub fn load_schema(path: &Path) -> Result<Schema, LoadError> {
    let content = read_file(path)?;
    load_schema_str(&content)
}

/// Load a schema from an SDL string.
pub fn load_schema_str(sdl: &str) -> Result<Schema, LoadError> {
    Ok(Schema::parse(sdl)?)
}

/// Load a schema from an HTTP/HTTPS URL serving SDL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails,
/// or `LoadError::Schema` if the response isn't a valid schema.
#[cfg(feature = "remote")]
pub fn load_schema_url(url: &str) -> Result<Schema, LoadError> {
    let network = |source: reqwest::Error| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    let response = client.get(url).send().map_err(network)?;

    // Check for HTTP errors before parsing
    let response = response.error_for_status().map_err(network)?;

    let sdl = response.text().map_err(network)?;
    load_schema_str(&sdl)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a schema from a file path or URL.
///
/// URL loading requires the `remote` feature.
pub fn load_schema_auto(source: &str) -> Result<Schema, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_schema_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_schema(Path::new(source))
    }
}

/// Load an operation document.
pub fn load_document(path: &Path) -> Result<Document, LoadError> {
    let content = read_file(path)?;
    Ok(Document::parse(&content)?)
}

/// Load a JSON file (fixtures, variables).
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    let content = read_file(path)?;
    serde_json::from_str(&content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a [`WrapConfig`] from a JSON file.
pub fn load_config(path: &Path) -> Result<WrapConfig, LoadError> {
    let content = read_file(path)?;
    Ok(WrapConfig::from_json_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SDL: &str = "type Query { hello: String }";

    #[test]
    fn load_schema_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", SDL).unwrap();

        let schema = load_schema(file.path()).unwrap();
        assert!(schema.field("Query", "hello").is_some());
    }

    #[test]
    fn load_schema_file_not_found() {
        let result = load_schema(Path::new("/nonexistent/schema.graphql"));
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    #[test]
    fn load_schema_invalid_sdl() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "type Query {{").unwrap();

        let result = load_schema(file.path());
        assert!(matches!(result, Err(LoadError::Schema(_))));
    }

    #[test]
    fn load_schema_str_dangling_reference() {
        let result = load_schema_str("type Query { user: User }");
        assert!(matches!(result, Err(LoadError::Schema(_))));
    }

    #[test]
    fn is_url_https() {
        assert!(is_url("https://example.com/schema.graphql"));
    }

    #[test]
    fn is_url_http() {
        assert!(is_url("http://example.com/schema.graphql"));
    }

    #[test]
    fn is_url_file_path() {
        assert!(!is_url("/path/to/schema.graphql"));
        assert!(!is_url("./schema.graphql"));
        assert!(!is_url("schema.graphql"));
    }

    #[test]
    fn load_schema_auto_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", SDL).unwrap();

        let schema = load_schema_auto(file.path().to_str().unwrap()).unwrap();
        assert_eq!(schema.root_type_name(crate::types::OperationKind::Query), Some("Query"));
    }

    #[test]
    fn load_document_and_json() {
        let mut query = NamedTempFile::new().unwrap();
        writeln!(query, "{{ hello }}").unwrap();
        let document = load_document(query.path()).unwrap();
        assert_eq!(document.operations.len(), 1);

        let mut data = NamedTempFile::new().unwrap();
        writeln!(data, r#"{{"hello": "world"}}"#).unwrap();
        assert_eq!(load_json(data.path()).unwrap()["hello"], "world");

        let mut broken = NamedTempFile::new().unwrap();
        writeln!(broken, "not json").unwrap();
        assert!(matches!(
            load_json(broken.path()),
            Err(LoadError::InvalidJson { .. })
        ));
    }

    #[test]
    fn load_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"transforms": [{{"kind": "rename_types", "prefix": "Up_"}}]}}"#
        )
        .unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.transforms.len(), 1);

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"transforms": [{{"kind": "nope"}}]}}"#).unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(LoadError::Config(_))
        ));
    }

    #[cfg(feature = "remote")]
    mod remote {
        use super::*;

        #[test]
        fn load_schema_url_valid() {
            let mut server = mockito::Server::new();
            let mock = server
                .mock("GET", "/schema.graphql")
                .with_status(200)
                .with_body(SDL)
                .create();

            let schema = load_schema_url(&format!("{}/schema.graphql", server.url())).unwrap();
            assert!(schema.field("Query", "hello").is_some());
            mock.assert();
        }

        #[test]
        fn load_schema_url_404() {
            let mut server = mockito::Server::new();
            server.mock("GET", "/missing").with_status(404).create();

            let result = load_schema_url(&format!("{}/missing", server.url()));
            assert!(matches!(result, Err(LoadError::NetworkError { .. })));
        }

        #[test]
        fn load_schema_url_invalid_sdl() {
            let mut server = mockito::Server::new();
            server
                .mock("GET", "/broken")
                .with_status(200)
                .with_body("type Query {")
                .create();

            let result = load_schema_url(&format!("{}/broken", server.url()));
            assert!(matches!(result, Err(LoadError::Schema(_))));
        }

        #[test]
        fn load_schema_auto_url() {
            let mut server = mockito::Server::new();
            server
                .mock("GET", "/schema.graphql")
                .with_status(200)
                .with_body(SDL)
                .create();

            let result = load_schema_auto(&format!("{}/schema.graphql", server.url()));
            assert!(result.is_ok());
        }
    }
}
