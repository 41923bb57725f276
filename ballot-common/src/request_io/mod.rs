use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validators;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CredentialPair {
    pub email: String,
    pub password: String,
    pub otp_code: Option<String>,
}

impl CredentialPair {
    pub fn validate_email_address(&self) -> validators::Validity {
        validators::validate_email_address(&self.email)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputVote {
    pub candidate_id: Uuid,
    pub position_id: Uuid,
    pub vote_count: i32,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputReference {
    pub reference: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputAdminUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputOtpRequired {
    pub status: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_debug: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputSignedIn {
    pub user: OutputAdminUser,
    pub csrf_token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputLoggedOut {
    pub status: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputInitializedPayment {
    pub authorization_url: String,
    pub reference: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputReceipt {
    pub reference: String,
    pub amount: i64,
    pub vote_count: i32,
    pub candidate_name: String,
    pub position_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputCandidateTally {
    pub candidate_id: Uuid,
    pub candidate_name: String,
    pub position_name: String,
    pub votes: i64,
}
