use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::RuleError;
use crate::expr::Expr;

/// Reads a rule document stored as JSON or YAML.
pub fn load_rule(path: impl AsRef<Path>) -> Result<Expr, RuleError> {
    let path = path.as_ref();
    let value: Value = load_document(path)?;
    Ok(Expr::from_value(&value))
}

/// Reads a catalog override and checks it before handing it out.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Catalog, RuleError> {
    let path = path.as_ref();
    let catalog: Catalog = load_document(path)?;
    catalog.validate()?;
    debug!(
        path = %path.display(),
        version = catalog.version,
        variables = catalog.vars.len(),
        "loaded catalog"
    );
    Ok(catalog)
}

fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, RuleError> {
    if !path.exists() {
        return Err(RuleError::MissingPath(path.display().to_string()));
    }
    let raw = fs::read_to_string(path).map_err(|err| RuleError::from_io(path, err))?;
    parse_document(&raw, path)
}

fn parse_document<T: DeserializeOwned>(raw: &str, path: &Path) -> Result<T, RuleError> {
    let mut attempts = Vec::new();

    match serde_json::from_str::<T>(raw) {
        Ok(document) => return Ok(document),
        Err(err) => attempts.push(format!("json: {}", err)),
    }

    match serde_yaml::from_str::<T>(raw) {
        Ok(document) => return Ok(document),
        Err(err) => attempts.push(format!("yaml: {}", err)),
    }

    let message = format!("unable to parse document ({})", attempts.join("; "));
    Err(RuleError::parse_error(path.to_path_buf(), message))
}
