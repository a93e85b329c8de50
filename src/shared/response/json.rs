use crate::shared::response::types::Response;
use serde::Serialize;
use serde_json::Value;

pub struct JsonRenderer;

#[derive(Serialize)]
struct JsonResponse<'a> {
    status: u16,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a Value>,
}

impl JsonRenderer {
    pub fn render(&self, response: &Response) -> String {
        let wire = JsonResponse {
            status: response.status.code(),
            message: &response.message,
            result: response.body.as_ref(),
        };
        serde_json::to_string(&wire).unwrap_or_default()
    }
}
