//! Remote forecast service with local fallback

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use finsight_core::constants as core_constants;
use finsight_core::forecast::{Forecast, ForecastSource, history_months, local_forecast};
use finsight_core::ledger::{MonthlyPoint, Transaction, monthly_series};
use finsight_core::FinsightError;
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ForecastService;
use crate::constants;

/// Request body posted to the service
#[derive(Debug, Serialize)]
struct ForecastRequest<'a> {
    months: u32,
    history: &'a [MonthlyPoint],
}

pub struct ForecastClient {
    client: reqwest::Client,
    service: Option<ForecastService>,
    backoff_base: Duration,
}

impl ForecastClient {
    /// The delay before retry `n` is `backoff_base * 2^n`
    pub fn new(service: Option<ForecastService>, backoff_base: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(constants::FORECAST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            service,
            backoff_base,
        })
    }

    /// Ask the service for a forecast. Any failure yields the local one,
    /// marked as a fallback and carrying the service error.
    pub async fn forecast(
        &self,
        transactions: &[Transaction],
        months: u32,
        today: NaiveDate,
    ) -> Forecast {
        let Some(service) = &self.service else {
            debug!("no forecast service configured; using local forecast");
            return local_forecast(transactions, months, today);
        };

        let history = monthly_series(
            transactions,
            &history_months(today, core_constants::FORECAST_HISTORY_MONTHS),
        );
        match self.fetch(service, &history, months).await {
            Ok(mut forecast) => {
                info!(endpoint = %service.endpoint, "forecast received from service");
                forecast.source = ForecastSource::Remote;
                forecast.history = history;
                forecast
            }
            Err(e) => {
                warn!(endpoint = %service.endpoint, error = %e, "forecast service failed; using local forecast");
                let mut forecast = local_forecast(transactions, months, today);
                forecast.source = ForecastSource::Fallback;
                forecast.service_error = Some(FinsightError::ExternalService(format!("{:#}", e)));
                forecast
            }
        }
    }

    async fn fetch(
        &self,
        service: &ForecastService,
        history: &[MonthlyPoint],
        months: u32,
    ) -> Result<Forecast> {
        let body = ForecastRequest { months, history };
        let max_retries = constants::FORECAST_MAX_RETRIES;
        let mut last_error = None;

        for attempt in 0..max_retries {
            if attempt > 0 {
                sleep(self.backoff_base * 2u32.pow(attempt)).await;
            }

            let mut request = self
                .client
                .post(&service.endpoint)
                .header("Accept", "application/json")
                .json(&body);
            if let Some(key) = &service.api_key {
                request = request.bearer_auth(key);
            }

            match request.send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        match response.json::<Forecast>().await {
                            Ok(forecast) if !forecast.base_case.points.is_empty() => {
                                return Ok(forecast);
                            }
                            Ok(_) => {
                                last_error = Some(anyhow!("Service returned an empty forecast"));
                            }
                            Err(e) => {
                                last_error = Some(anyhow!("Parse error: {}", e));
                            }
                        }
                    } else if response.status().as_u16() == 429 {
                        last_error = Some(anyhow!("Rate limited (429)"));
                        continue;
                    } else {
                        last_error = Some(anyhow!(
                            "Forecast service returned status: {}",
                            response.status()
                        ));
                    }
                }
                Err(e) => {
                    last_error = Some(anyhow!("Request failed: {}", e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("Failed after {} retries", max_retries)))
    }
}
