use axum::http::StatusCode;

/// Service banner for `/`; useful as a cheap liveness probe.
pub async fn root() -> (StatusCode, String) {
    (
        StatusCode::OK,
        format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn root_reports_name_and_version() {
        let (status, body) = root().await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("sesio"));
        assert!(body.contains(env!("CARGO_PKG_VERSION")));
    }
}
