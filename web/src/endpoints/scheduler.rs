/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use axum::extract::{Json, State};
use beanaries_core::types::BaseResponse;
use scraper::scheduler::{SchedulerStatus, TriggerOutcome};
use tracing::info;

use crate::WebState;
use crate::error::WebResult;

pub async fn get_status(
    State(state): State<WebState>,
) -> WebResult<Json<BaseResponse<SchedulerStatus>>> {
    let res = BaseResponse {
        error: false,
        message: state.scheduler.status(),
    };

    Ok(Json(res))
}

/// Fire-and-forget; the outcome of the pass only shows up in the status.
pub async fn post_trigger(State(state): State<WebState>) -> WebResult<Json<BaseResponse<String>>> {
    match state.scheduler.trigger_now() {
        TriggerOutcome::Started => info!("Manual sync pass triggered"),
        TriggerOutcome::Coalesced => info!("Manual trigger folded into running pass"),
    }

    let res = BaseResponse {
        error: false,
        message: "triggered".to_string(),
    };

    Ok(Json(res))
}
