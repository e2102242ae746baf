use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    configuration::GoogleSettings,
    domain::sheet_row::{SheetRow, COLUMN_COUNT},
};

use super::{GoogleAuth, RowSink};

const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";
pub const HEADER_RANGE: &str = "Sheet1!A1:L1";
pub const ROW_RANGE: &str = "Sheet1!A:B";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSheet {
    pub id: String,
    pub web_view_link: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridInfo {
    pub sheet_id: i64,
    pub column_count: i64,
}

#[derive(Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetMetadata>,
}

#[derive(Deserialize)]
struct SheetMetadata {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    #[serde(default)]
    grid_properties: GridProperties,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    column_count: i64,
}

/// Thin client over the Drive and Sheets REST endpoints the crawler needs.
pub struct SheetsClient {
    client: Client,
    auth: Arc<GoogleAuth>,
    drive_api_url: String,
    sheets_api_url: String,
    share_with_anyone: bool,
}

impl SheetsClient {
    pub fn new(auth: Arc<GoogleAuth>, settings: &GoogleSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(SheetsClient {
            client,
            auth,
            drive_api_url: settings.drive_api_url.trim_end_matches('/').to_string(),
            sheets_api_url: settings.sheets_api_url.trim_end_matches('/').to_string(),
            share_with_anyone: settings.share_with_anyone,
        })
    }

    async fn send(&self, req: RequestBuilder) -> anyhow::Result<Response> {
        let token = self.auth.access_token().await?;
        let res = req.bearer_auth(token).send().await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            bail!("Google api answered {}: {}", status, body);
        }

        Ok(res)
    }

    /// Creates an empty spreadsheet in drive, shared for editing when configured.
    pub async fn create_spreadsheet(&self, name: &str) -> anyhow::Result<CreatedSheet> {
        let req = self
            .client
            .post(format!("{}/files", self.drive_api_url))
            .query(&[("fields", "id, webViewLink")])
            .json(&json!({ "name": name, "mimeType": SPREADSHEET_MIME_TYPE }));
        let sheet = self
            .send(req)
            .await
            .with_context(|| format!("Failed to create spreadsheet {}", name))?
            .json::<CreatedSheet>()
            .await?;

        if self.share_with_anyone {
            let req = self
                .client
                .post(format!("{}/files/{}/permissions", self.drive_api_url, sheet.id))
                .json(&json!({ "type": "anyone", "role": "writer" }));
            self.send(req)
                .await
                .with_context(|| format!("Failed to share spreadsheet {}", sheet.id))?;
        }

        log::info!("Created spreadsheet {} ({})", name, sheet.id);

        Ok(sheet)
    }

    pub async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[&SheetRow],
    ) -> anyhow::Result<()> {
        let values: Vec<&[String]> = rows.iter().map(|r| r.cells()).collect();
        let req = self
            .client
            .post(format!(
                "{}/spreadsheets/{}/values/{}:append",
                self.sheets_api_url, spreadsheet_id, range
            ))
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&json!({ "values": values }));

        self.send(req).await?;
        Ok(())
    }

    pub async fn grid_info(
        &self,
        spreadsheet_id: &str,
        sheet_index: usize,
    ) -> anyhow::Result<GridInfo> {
        let req = self
            .client
            .get(format!("{}/spreadsheets/{}", self.sheets_api_url, spreadsheet_id));
        let metadata = self.send(req).await?.json::<SpreadsheetMetadata>().await?;

        let Some(sheet) = metadata.sheets.get(sheet_index) else {
            bail!(
                "Spreadsheet {} has no sheet at index {}",
                spreadsheet_id,
                sheet_index
            );
        };

        Ok(GridInfo {
            sheet_id: sheet.properties.sheet_id,
            column_count: sheet.properties.grid_properties.column_count,
        })
    }

    async fn batch_update(&self, spreadsheet_id: &str, requests: Value) -> anyhow::Result<()> {
        let req = self
            .client
            .post(format!(
                "{}/spreadsheets/{}:batchUpdate",
                self.sheets_api_url, spreadsheet_id
            ))
            .json(&json!({ "requests": requests }));

        self.send(req).await?;
        Ok(())
    }

    /// Bolds the header row and drops every column past the last header.
    pub async fn format_header_trim(
        &self,
        spreadsheet_id: &str,
        sheet_index: usize,
    ) -> anyhow::Result<()> {
        let grid = self.grid_info(spreadsheet_id, sheet_index).await?;
        self.batch_update(spreadsheet_id, header_format_requests(grid))
            .await
            .context("Failed to format header row")
    }

    pub async fn auto_resize_columns(
        &self,
        spreadsheet_id: &str,
        sheet_index: usize,
    ) -> anyhow::Result<()> {
        let grid = self.grid_info(spreadsheet_id, sheet_index).await?;
        self.batch_update(spreadsheet_id, auto_resize_requests(grid))
            .await
            .context("Failed to resize columns")
    }
}

#[async_trait]
impl RowSink for SheetsClient {
    async fn append_row(&self, destination_id: &str, row: &SheetRow) -> anyhow::Result<()> {
        self.append_rows(destination_id, ROW_RANGE, &[row]).await
    }
}

fn header_format_requests(grid: GridInfo) -> Value {
    let mut requests = vec![json!({
        "repeatCell": {
            "range": {
                "sheetId": grid.sheet_id,
                "startRowIndex": 0,
                "endRowIndex": 1,
                "startColumnIndex": 0,
                "endColumnIndex": COLUMN_COUNT
            },
            "cell": {
                "userEnteredFormat": {
                    "backgroundColor": { "red": 0.9, "green": 0.9, "blue": 0.9 },
                    "textFormat": { "bold": true }
                }
            },
            "fields": "userEnteredFormat(backgroundColor,textFormat)"
        }
    })];

    if grid.column_count > COLUMN_COUNT as i64 {
        requests.push(json!({
            "deleteDimension": {
                "range": {
                    "sheetId": grid.sheet_id,
                    "dimension": "COLUMNS",
                    "startIndex": COLUMN_COUNT,
                    "endIndex": grid.column_count
                }
            }
        }));
    }

    Value::Array(requests)
}

/// Only the url column is resized; the rest keep the default width.
fn auto_resize_requests(grid: GridInfo) -> Value {
    json!([{
        "autoResizeDimensions": {
            "dimensions": {
                "sheetId": grid.sheet_id,
                "dimension": "COLUMNS",
                "startIndex": 0,
                "endIndex": 1
            }
        }
    }])
}

#[cfg(test)]
mod tests {
    use super::{auto_resize_requests, header_format_requests, GridInfo, SpreadsheetMetadata};

    #[test]
    fn header_format_trims_surplus_columns() {
        let requests = header_format_requests(GridInfo {
            sheet_id: 7,
            column_count: 26,
        });
        let requests = requests.as_array().unwrap();

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["repeatCell"]["range"]["endColumnIndex"], 17);
        assert_eq!(
            requests[0]["repeatCell"]["cell"]["userEnteredFormat"]["textFormat"]["bold"],
            true
        );
        assert_eq!(requests[1]["deleteDimension"]["range"]["sheetId"], 7);
        assert_eq!(requests[1]["deleteDimension"]["range"]["startIndex"], 17);
        assert_eq!(requests[1]["deleteDimension"]["range"]["endIndex"], 26);
    }

    #[test]
    fn header_format_keeps_narrow_grids() {
        let requests = header_format_requests(GridInfo {
            sheet_id: 0,
            column_count: 17,
        });

        assert_eq!(requests.as_array().unwrap().len(), 1);
    }

    #[test]
    fn auto_resize_targets_first_column() {
        let requests = auto_resize_requests(GridInfo {
            sheet_id: 3,
            column_count: 17,
        });
        let dims = &requests[0]["autoResizeDimensions"]["dimensions"];

        assert_eq!(dims["sheetId"], 3);
        assert_eq!(dims["startIndex"], 0);
        assert_eq!(dims["endIndex"], 1);
    }

    #[test]
    fn metadata_tolerates_missing_grid_properties() {
        let metadata: SpreadsheetMetadata =
            serde_json::from_str(r#"{"sheets": [{"properties": {"sheetId": 0}}]}"#).unwrap();

        assert_eq!(metadata.sheets[0].properties.grid_properties.column_count, 0);
    }
}
