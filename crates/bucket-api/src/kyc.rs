use axum::{
    Extension, Json,
    extract::{Path, State},
};
use bucket_db::queries::KycStateUpdate;
use bucket_types::api::{
    ApiResponse, KycSessionData, KycStatusData, KycVerifyBody, SessionClaims,
};
use bucket_types::models::KycStatus;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use crate::account::linked_access_token;
use crate::error::ApiError;
use crate::payid::{KycAddress, KycRequest, KycResult};
use crate::state::AppState;

pub const PROVIDER_QOREID: &str = "qoreid";
pub const PROVIDER_PLAID: &str = "plaid";

/// Turn the client form into a provider submission.
///
/// Nigerian applicants go to QoreID with a NIN or BVN; everyone else goes to
/// Plaid with an address and an id number.
pub fn build_kyc_request(body: KycVerifyBody) -> Result<KycRequest, ApiError> {
    let required = [
        &body.first_name,
        &body.last_name,
        &body.email,
        &body.phone,
        &body.date_of_birth,
        &body.country,
    ];
    if required.iter().any(|field| field.trim().is_empty()) {
        return Err(ApiError::Validation(
            "firstName, lastName, email, phone, dateOfBirth and country are required".into(),
        ));
    }

    let mut request = KycRequest {
        first_name: body.first_name,
        last_name: body.last_name,
        email: body.email,
        phone_number: body.phone,
        date_of_birth: format_birth_date(&body.date_of_birth)?,
        ..Default::default()
    };

    let ids = body.identity_numbers;
    if body.country.trim().eq_ignore_ascii_case("NG") {
        request.provider = PROVIDER_QOREID.into();
        let (document_type, number) = match (ids.nin, ids.bvn) {
            (Some(nin), _) if !nin.is_empty() => ("nin", nin),
            (_, Some(bvn)) if !bvn.is_empty() => ("bvn", bvn),
            _ => {
                return Err(ApiError::Validation(
                    "NIN or BVN is required for Nigerian verification".into(),
                ));
            }
        };
        request.document_type = Some(document_type.into());
        request.document_number = Some(number);
        request.gender = body.gender.filter(|g| !g.is_empty());
    } else {
        request.provider = PROVIDER_PLAID.into();
        request.gave_consent = Some(true);

        let address = body.address.ok_or_else(|| {
            ApiError::Validation("Address is required for Plaid verification".into())
        })?;
        request.address = Some(KycAddress {
            street: address.street,
            street2: address.street2.unwrap_or_default(),
            city: address.city,
            region: address.state,
            postal_code: address.postal_code,
            country: address.country,
        });

        let (number, number_type) = match (ids.id_number, ids.id_number_type, ids.ssn) {
            (Some(number), Some(kind), _) if !number.is_empty() && !kind.is_empty() => {
                (number, kind)
            }
            (_, _, Some(ssn)) if !ssn.is_empty() => (ssn, "us_ssn".to_string()),
            _ => {
                return Err(ApiError::Validation(
                    "idNumber with idNumberType or SSN is required for Plaid".into(),
                ));
            }
        };
        request.id_number = Some(number);
        request.id_number_type = Some(number_type);
    }

    Ok(request)
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp; emits `YYYY-MM-DD`.
fn format_birth_date(raw: &str) -> Result<String, ApiError> {
    let raw = raw.trim();
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
        .ok_or_else(|| ApiError::Validation("Invalid date of birth".into()))?;
    Ok(date.format("%Y-%m-%d").to_string())
}

fn session_data(result: KycResult) -> KycSessionData {
    let message = if result.shareable_url.is_some() {
        "Please complete verification at the provided URL"
    } else {
        "Verification completed successfully"
    };
    KycSessionData {
        kyc_verified: result.status == KycStatus::Verified,
        session_id: result.session_id,
        provider: result.provider,
        kyc_status: result.status,
        verification_level: result.verification_level,
        shareable_url: result.shareable_url,
        message: message.into(),
    }
}

/// POST /api/v1/payid/kyc/verify
pub async fn verify(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Json(body): Json<KycVerifyBody>,
) -> Result<Json<ApiResponse<KycSessionData>>, ApiError> {
    let user = state.session_user(&claims)?;
    let access_token = linked_access_token(&state, &user)?;
    let request = build_kyc_request(body)?;

    let result = state.payid.start_kyc(&access_token, &request).await?;
    state.db.update_kyc_state(
        &user.id,
        &KycStateUpdate {
            session_id: Some(result.session_id.clone()),
            provider: Some(result.provider.clone()),
            kyc_verified: result.status == KycStatus::Verified,
            verification_level: result.verification_level.clone(),
        },
    )?;
    info!(
        "KYC session {} started for {} via {}",
        result.session_id, user.id, result.provider
    );

    Ok(Json(ApiResponse::ok(
        "KYC verification initiated",
        session_data(result),
    )))
}

/// GET /api/v1/payid/kyc/status
pub async fn status(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Json<ApiResponse<KycStatusData>>, ApiError> {
    status_for(&state, &claims, None).await
}

/// GET /api/v1/payid/kyc/status/{sessionId}
pub async fn status_for_session(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<KycStatusData>>, ApiError> {
    status_for(&state, &claims, Some(session_id)).await
}

async fn status_for(
    state: &AppState,
    claims: &SessionClaims,
    requested_session: Option<String>,
) -> Result<Json<ApiResponse<KycStatusData>>, ApiError> {
    const MESSAGE: &str = "Current verification status retrieved";

    let user = state.session_user(claims)?;
    let Some(link) = user
        .payid
        .as_ref()
        .filter(|link| link.access_token.is_some())
    else {
        return Ok(Json(ApiResponse::ok(MESSAGE, KycStatusData::default())));
    };

    let Some(session_id) = requested_session.clone().or_else(|| link.session_id.clone()) else {
        return Ok(Json(ApiResponse::ok(
            MESSAGE,
            KycStatusData {
                is_connected: true,
                kyc_verified: link.kyc_verified,
                verification_level: link.verification_level.clone(),
                ..Default::default()
            },
        )));
    };

    let access_token = linked_access_token(state, &user)?;
    let result = state
        .payid
        .kyc_status(&access_token, requested_session.as_deref())
        .await?;
    let kyc_verified = result.status == KycStatus::Verified;

    state.db.update_kyc_state(
        &user.id,
        &KycStateUpdate {
            kyc_verified,
            verification_level: result.verification_level.clone(),
            ..Default::default()
        },
    )?;

    Ok(Json(ApiResponse::ok(
        MESSAGE,
        KycStatusData {
            has_session: true,
            is_connected: true,
            kyc_verified,
            session_id: Some(session_id),
            kyc_status: Some(result.status),
            verification_level: result.verification_level,
            provider: link.provider.clone().or(Some(result.provider)),
            shareable_url: result.shareable_url,
            updated_at: Some(Utc::now()),
        },
    )))
}

/// POST /api/v1/payid/kyc/retry/{sessionId}
pub async fn retry(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<KycSessionData>>, ApiError> {
    let user = state.session_user(&claims)?;
    let access_token = linked_access_token(&state, &user)?;

    let result = state.payid.retry_kyc(&access_token, &session_id).await?;
    state.db.update_kyc_state(
        &user.id,
        &KycStateUpdate {
            session_id: Some(result.session_id.clone()),
            provider: Some(result.provider.clone()),
            kyc_verified: result.status == KycStatus::Verified,
            verification_level: result.verification_level.clone(),
        },
    )?;
    info!("KYC session {} retried for {}", session_id, user.id);

    Ok(Json(ApiResponse::ok(
        "KYC verification retry initiated",
        session_data(result),
    )))
}
