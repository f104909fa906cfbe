// [libs/domain/ledger/src/tenant.rs]
use gateway_error::{ErrorKind, GatewayError};

/// Strict allowlist: alphanumeric plus `-_`, no path separators or `..` —
/// the tenant id becomes a filename component, so this is the only thing
/// standing between a malicious tenant id and a path traversal.
pub fn validate_tenant_id(tenant: &str) -> Result<(), GatewayError> {
    if tenant.is_empty() {
        return Err(GatewayError::new(ErrorKind::ConfigInvalid, "tenant id must not be empty"));
    }
    if tenant == "." || tenant == ".." {
        return Err(GatewayError::new(ErrorKind::ConfigInvalid, "tenant id must not be '.' or '..'"));
    }
    let valid = tenant.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(GatewayError::new(
                ErrorKind::ConfigInvalid,
                format!("tenant id '{tenant}' contains characters outside [A-Za-z0-9_-]"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_alphanumeric_with_dash_and_underscore() {
        assert!(validate_tenant_id("tenant-A_01").is_ok());
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(validate_tenant_id("../etc").is_err());
        assert!(validate_tenant_id("a/b").is_err());
        assert!(validate_tenant_id("..").is_err());
    }
}
