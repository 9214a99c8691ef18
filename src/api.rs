//! Robot API operations built on the authenticated client.

use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::config::Settings;
use crate::core::GraphqlClient;
use crate::error::{ApiError, ClientError};
use crate::extract;

pub const MISSION_REPORTS_QUERY: &str = r#"
query missionReports($robotId: String!) {
    missionReports(input: { robotID: $robotId }) {
        page {
            edges {
                node {
                    id
                    startTimestamp
                }
            }
        }
    }
}
"#;

pub const MISSION_REPORT_QUERY: &str = r#"
query missionReport($id: String!) {
    missionReport(id: $id) {
        id
        dataPayloads {
            poiName
            uri
        }
    }
}
"#;

#[derive(Debug)]
pub struct RobotApi {
    client: GraphqlClient,
}

impl RobotApi {
    pub fn new(client: GraphqlClient) -> Self {
        Self { client }
    }

    pub async fn connect(settings: &Settings) -> Result<Self, ClientError> {
        Ok(Self::new(GraphqlClient::connect(settings).await?))
    }

    /// Underlying client, for queries this type has no method for.
    pub fn client_mut(&mut self) -> &mut GraphqlClient {
        &mut self.client
    }

    /// ID of the most recently started mission report of a robot.
    #[instrument(skip(self))]
    pub async fn latest_mission_report_id(&mut self, robot_id: &str) -> Result<String, ApiError> {
        let data = self
            .client
            .query(MISSION_REPORTS_QUERY, json!({ "robotId": robot_id }))
            .await?;
        let report_id = extract::latest_mission_report_id(&Value::Object(data))?;
        info!(report_id = %report_id, "Found latest mission report");
        Ok(report_id)
    }

    /// URI of the inspection image taken at `poi_name` during a mission.
    #[instrument(skip(self))]
    pub async fn inspection_uri_for_poi(&mut self, mission_report_id: &str, poi_name: &str) -> Result<String, ApiError> {
        let data = self
            .client
            .query(MISSION_REPORT_QUERY, json!({ "id": mission_report_id }))
            .await?;
        Ok(extract::inspection_uri_for_poi(&Value::Object(data), poi_name)?)
    }
}
