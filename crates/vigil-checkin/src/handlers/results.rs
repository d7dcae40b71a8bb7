//! `POST /checkin/:device/results`
//!
//! Body: `{"results":[{"deployment":12,"result":"success"}, ...]}`. Each
//! entry upserts one status row; replaying a report is harmless.

use axum::{
  Json,
  extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use vigil_core::{
  deployment::DeploymentResult,
  key::{DeploymentKey, DeviceKey},
  status::RecordOutcome,
  store::MdmStore,
};

use crate::{AppState, Error};

#[derive(Debug, Deserialize)]
pub struct ReportedResult {
  pub deployment: DeploymentKey,
  pub result:     DeploymentResult,
}

#[derive(Debug, Deserialize)]
pub struct ReportBody {
  pub results: Vec<ReportedResult>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
  pub outcomes: Vec<RecordOutcome>,
}

pub async fn handler<S: MdmStore + 'static>(
  State(state): State<AppState<S>>,
  Path(device): Path<DeviceKey>,
  Json(body): Json<ReportBody>,
) -> Result<Json<ReportResponse>, Error> {
  let limit = state.config.max_results_per_report;
  if body.results.len() > limit {
    return Err(Error::BadRequest(format!(
      "{} results in one report; at most {limit} allowed",
      body.results.len()
    )));
  }

  // A storage fault aborts the rest of the batch. Rows already written stay;
  // the device resends the whole report.
  let mut outcomes = Vec::with_capacity(body.results.len());
  for reported in body.results {
    let outcome = state
      .recorder
      .record_result(device, reported.deployment, reported.result)
      .await?;
    outcomes.push(outcome);
  }

  Ok(Json(ReportResponse { outcomes }))
}
