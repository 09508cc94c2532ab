/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

#[cfg(test)]
mod tests {
    use crate::endpoints::{get_health, handle_404};
    use crate::error::WebError;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn test_get_health() {
        let response = get_health().await.unwrap();
        assert!(!response.error);
        assert_eq!(response.message, "200 ALIVE");
    }

    #[tokio::test]
    async fn test_handle_404() {
        let response = handle_404().await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_internal_error_hides_details() {
        let err = WebError::from(anyhow::anyhow!("connection refused"));
        assert_eq!(err.to_string(), "Internal error: connection refused");

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_display() {
        let err = WebError::NotFound("Not Found".to_string());
        assert_eq!(err.to_string(), "Not Found: Not Found");
    }
}
