use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::process;

/// Health status of the relay.
///
/// Returns 503 with an `errors` list when a required service credential is
/// missing. The server keeps running either way; chat requests just fall back.
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let config = &state.config;
    let metrics = state.get_metrics_snapshot();
    let missing = config.missing_credentials();

    let errors: Vec<String> = missing
        .iter()
        .map(|name| format!("{} is not configured", name))
        .collect();
    let status = if errors.is_empty() { "healthy" } else { "degraded" };

    let body = json!({
        "status": status,
        "errors": errors,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "services": {
            "transcription": {
                "configured": !missing.contains(&"ASSEMBLYAI_API_KEY"),
                "base_url": config.services.transcription_base_url
            },
            "llm": {
                "configured": !missing.contains(&"GEMINI_API_KEY"),
                "model": config.services.llm_model
            }
        },
        "sessions": {
            "active_chat_sessions": state.store().session_count(),
            "open_streams": state.open_streams()
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": metrics.error_rate()
        },
        "memory": get_memory_info()
    });

    if errors.is_empty() {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats: Vec<_> = metrics
        .endpoint_metrics
        .iter()
        .map(|(endpoint, metric)| {
            json!({
                "endpoint": endpoint,
                "request_count": metric.request_count,
                "error_count": metric.error_count,
                "error_rate": metric.error_rate(),
                "average_duration_ms": metric.average_duration_ms(),
                "total_duration_ms": metric.total_duration_ms
            })
        })
        .collect();
    endpoint_stats.sort_by(|a, b| a["endpoint"].as_str().cmp(&b["endpoint"].as_str()));

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": metrics.error_rate(),
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "sessions": {
            "active_chat_sessions": state.store().session_count(),
            "max_messages_per_session": state.store().max_messages(),
            "open_streams": state.open_streams()
        },
        "endpoints": endpoint_stats,
        "memory": get_memory_info()
    }))
}

#[cfg(target_os = "linux")]
fn get_memory_info() -> serde_json::Value {
    let status = match std::fs::read_to_string(format!("/proc/{}/status", process::id())) {
        Ok(status) => status,
        Err(_) => return memory_unavailable("Could not read /proc status"),
    };

    let read_kb = |prefix: &str| -> u64 {
        status
            .lines()
            .find(|line| line.starts_with(prefix))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|kb| kb.parse::<u64>().ok())
            .unwrap_or(0)
            * 1024
    };

    json!({
        "resident_memory_bytes": read_kb("VmRSS:"),
        "virtual_memory_bytes": read_kb("VmSize:"),
        "available": true
    })
}

#[cfg(not(target_os = "linux"))]
fn get_memory_info() -> serde_json::Value {
    let _ = process::id();
    memory_unavailable("Memory info not available on this platform")
}

fn memory_unavailable(note: &str) -> serde_json::Value {
    json!({
        "resident_memory_bytes": 0,
        "virtual_memory_bytes": 0,
        "available": false,
        "note": note
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::{body::to_bytes, http::StatusCode};

    fn configured() -> AppConfig {
        let mut config = AppConfig::default();
        config.services.transcription_api_key = Some("stt-key".into());
        config.services.llm_api_key = Some("llm-key".into());
        config
    }

    #[actix_web::test]
    async fn test_healthy_with_credentials() {
        let state = web::Data::new(AppState::from_config(configured()).unwrap());
        let response = health_check(state).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value =
            serde_json::from_slice(&to_bytes(response.into_body()).await.unwrap()).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["errors"].as_array().unwrap().len(), 0);
    }

    #[actix_web::test]
    async fn test_degraded_lists_missing_credential() {
        let mut config = configured();
        config.services.llm_api_key = None;
        let state = web::Data::new(AppState::from_config(config).unwrap());

        let response = health_check(state).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body: serde_json::Value =
            serde_json::from_slice(&to_bytes(response.into_body()).await.unwrap()).unwrap();
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["services"]["llm"]["configured"], false);
        assert_eq!(body["services"]["transcription"]["configured"], true);
        assert!(body["errors"][0].as_str().unwrap().contains("GEMINI_API_KEY"));
    }
}
