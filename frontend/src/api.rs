use gloo_file::File as GlooFile;
use gloo_net::http::{Request, Response};
use serde::de::DeserializeOwned;
use shared::{
    CreateUserRequest, ReportView, SearchResult, SubmitReportRequest, UserView, VerifyResponse,
};

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, String> {
    if response.ok() {
        response
            .json::<T>()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or(body);
        Err(format!("Server error: {} - {}", status, message))
    }
}

pub async fn login(email: &str, name: Option<String>) -> Result<UserView, String> {
    let response = Request::post("/api/users")
        .json(&CreateUserRequest {
            email: email.to_string(),
            name,
        })
        .map_err(|e| e.to_string())?
        .send()
        .await
        .map_err(|e| format!("Network error: {}", e))?;
    read_json(response).await
}

/// `Ok(None)` when nobody is logged in.
pub async fn current_user() -> Result<Option<UserView>, String> {
    let response = Request::get("/api/users/me")
        .send()
        .await
        .map_err(|e| format!("Network error: {}", e))?;
    if response.status() == 401 {
        return Ok(None);
    }
    read_json(response).await.map(Some)
}

pub async fn logout() -> Result<(), String> {
    Request::post("/api/logout")
        .send()
        .await
        .map_err(|e| format!("Network error: {}", e))?;
    Ok(())
}

pub async fn verify_image(file: &GlooFile) -> Result<VerifyResponse, String> {
    let form_data = web_sys::FormData::new().map_err(|_| "FormData unavailable".to_string())?;
    form_data
        .append_with_blob("image", file.as_ref())
        .map_err(|_| "Could not attach image".to_string())?;

    let response = Request::post("/api/verify")
        .body(form_data)
        .map_err(|e| e.to_string())?
        .send()
        .await
        .map_err(|e| format!("Network error: {}", e))?;
    read_json(response).await
}

pub async fn submit_report(request: &SubmitReportRequest) -> Result<ReportView, String> {
    let response = Request::post("/api/reports")
        .json(request)
        .map_err(|e| e.to_string())?
        .send()
        .await
        .map_err(|e| format!("Network error: {}", e))?;
    read_json(response).await
}

pub async fn recent_reports() -> Result<Vec<ReportView>, String> {
    let response = Request::get("/api/reports")
        .send()
        .await
        .map_err(|e| format!("Network error: {}", e))?;
    read_json(response).await
}

pub async fn search(query: &str) -> Result<Vec<SearchResult>, String> {
    let response = Request::get("/api/search")
        .query([("q", query)])
        .send()
        .await
        .map_err(|e| format!("Network error: {}", e))?;
    read_json(response).await
}
