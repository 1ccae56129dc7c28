//! JSON envelope returned by the upload endpoint.

use serde::Serialize;

/// Success envelope: `{"success": true, "code": 200, "message": "success", "result": ...}`.
#[derive(Serialize, Debug)]
pub struct ResultMessage<T: Serialize> {
    pub success: bool,
    pub code: u16,
    pub message: String,
    pub result: T,
}

impl<T: Serialize> ResultMessage<T> {
    pub fn data(result: T) -> Self {
        Self {
            success: true,
            code: 200,
            message: "success".into(),
            result,
        }
    }
}
