use serde::Serialize;
use serde_json::Value as JsonValue;

use super::ApiClient;
use crate::error::Error;
use crate::types::Page;

const ALERTS_PATH: &str = "/fleet/alerts/";

/// Fleet resources that expose a `dashboard_stats` summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardResource {
    Vehicles,
    Drivers,
    Trips,
    Maintenance,
    Insurance,
    SimCards,
    ObdDevices,
}

impl DashboardResource {
    pub const ALL: [Self; 7] = [
        Self::Vehicles,
        Self::Drivers,
        Self::Trips,
        Self::Maintenance,
        Self::Insurance,
        Self::SimCards,
        Self::ObdDevices,
    ];

    #[must_use]
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Vehicles => "vehicles",
            Self::Drivers => "drivers",
            Self::Trips => "trips",
            Self::Maintenance => "maintenance",
            Self::Insurance => "insurance",
            Self::SimCards => "sim_cards",
            Self::ObdDevices => "obd_devices",
        }
    }

    fn stats_path(self) -> String {
        format!("/fleet/{}/dashboard_stats/", self.path_segment())
    }
}

/// Filters for the alert feed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    /// e.g. `"open"` or `"resolved"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ApiClient {
    /// Dashboard widget counters for one resource. The shape is backend-defined.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn get_dashboard_summary(
        &self,
        resource: DashboardResource,
    ) -> Result<JsonValue, Error> {
        self.get(&resource.stats_path()).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn get_alerts(&self, query: &AlertQuery) -> Result<Page<JsonValue>, Error> {
        self.get_with_query(ALERTS_PATH, query).await
    }
}
