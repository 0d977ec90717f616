//! Typed client for the product's REST backend
//!
//! Every operation is a plain JSON-over-HTTPS request/response pair. The
//! backend owns all clinical logic; this module only shapes requests and
//! maps non-2xx responses onto `ClientError::Backend`.

use serde::{Deserialize, Serialize};

use crate::audio::RecordedAudio;
use crate::error::{ClientError, Result};

/// Which participant a voice enrollment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerRole {
    Doctor,
    Patient,
}

impl SpeakerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakerRole::Doctor => "doctor",
            SpeakerRole::Patient => "patient",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StartSessionRequest<'a> {
    pub patient_id: i64,
    pub title: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct StartSessionResponse {
    pub session_id: i64,
    pub conversation_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Handle returned when a visit ends; the backend generates the summary
/// asynchronously and this names it.
#[derive(Debug, Clone, Deserialize)]
pub struct VisitSummary {
    pub summary_id: i64,
    pub session_id: i64,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRecord {
    pub summary_id: i64,
    pub content: String,
    #[serde(default)]
    pub approved: bool,
}

#[derive(Debug, Serialize)]
pub struct SaveSummaryRequest<'a> {
    pub session_id: i64,
    pub original_text: &'a str,
    pub summary_text: &'a str,
}

#[derive(Debug, Serialize)]
struct EditSummaryRequest<'a> {
    summary_id: i64,
    edited_text: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub medical_record_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IcdCode {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct EnrollmentResponse {
    pub success: bool,
    #[serde(default)]
    pub speaker_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
struct FinalizeIcdRequest<'a> {
    session_id: i64,
    codes: &'a [String],
}

/// REST client for the visit backend.
pub struct BackendApi {
    client: reqwest::Client,
    base_url: String,
}

impl BackendApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-2xx response to `ClientError::Backend` with the body as the
    /// message.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ClientError::Backend {
            status: status.as_u16(),
            message,
        })
    }

    /// Create a visit session; the backend assigns the session id.
    pub async fn start_session(
        &self,
        patient_id: i64,
        title: &str,
    ) -> Result<StartSessionResponse> {
        let response = self
            .client
            .post(self.url("/sessions/start"))
            .json(&StartSessionRequest { patient_id, title })
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// End a visit session, triggering summary generation server-side.
    ///
    /// No per-request timeout is applied; a hung backend hangs the caller.
    /// Callers guard against stale completions with a session-epoch check
    /// instead of cancellation.
    pub async fn end_session(&self, session_id: i64) -> Result<VisitSummary> {
        let response = self
            .client
            .post(self.url(&format!("/sessions/{}/end", session_id)))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn get_summary(&self, session_id: i64) -> Result<SummaryRecord> {
        let response = self
            .client
            .get(self.url(&format!("/summaries/{}", session_id)))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn save_summary(&self, request: &SaveSummaryRequest<'_>) -> Result<SummaryRecord> {
        let response = self
            .client
            .post(self.url("/summaries/save"))
            .json(request)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn edit_summary(&self, summary_id: i64, edited_text: &str) -> Result<SummaryRecord> {
        let response = self
            .client
            .post(self.url("/summaries/edit"))
            .json(&EditSummaryRequest {
                summary_id,
                edited_text,
            })
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Mark a summary as reviewed by the clinician.
    pub async fn approve_summary(&self, summary_id: i64) -> Result<SummaryRecord> {
        let response = self
            .client
            .post(self.url(&format!("/summaries/{}/approve", summary_id)))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Upload an enrollment recording as a multipart WAV file.
    pub async fn enroll_voice(
        &self,
        role: SpeakerRole,
        recording: &RecordedAudio,
    ) -> Result<EnrollmentResponse> {
        let wav = recording.wav_bytes()?;

        let part = reqwest::multipart::Part::bytes(wav)
            .file_name(format!("{}-enrollment.wav", role.as_str()))
            .mime_str("audio/wav")?;
        let form = reqwest::multipart::Form::new()
            .text("role", role.as_str())
            .part("audio", part);

        let response = self
            .client
            .post(self.url("/voice/enroll"))
            .multipart(form)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn search_patients(&self, query: &str) -> Result<Vec<Patient>> {
        let response = self
            .client
            .get(self.url("/patients/search"))
            .query(&[("q", query)])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn search_icd_codes(&self, query: &str) -> Result<Vec<IcdCode>> {
        let response = self
            .client
            .get(self.url("/icd/search"))
            .query(&[("q", query)])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Attach the selected ICD codes to a finished session.
    pub async fn finalize_icd_codes(&self, session_id: i64, codes: &[String]) -> Result<()> {
        let response = self
            .client
            .post(self.url("/icd/finalize"))
            .json(&FinalizeIcdRequest { session_id, codes })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
