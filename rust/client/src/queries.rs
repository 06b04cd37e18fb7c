// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The reads pages perform, each bound to its cache key.

use crate::api::{ApiClient, AssetFilter, InspectionFilter};
use crate::query::{Query, QueryKey};
use bimfm_core::{Asset, AssetStatistics, Inspection, ModelFile};

pub const IFC_FILES: &str = "ifc_files";
pub const IFC_FILE: &str = "ifc_file";
pub const IFC_FILE_ASSETS: &str = "ifc_file_assets";
pub const IFC_FILE_ELEMENTS: &str = "ifc_file_elements";
pub const ASSETS: &str = "assets";
pub const ASSET: &str = "asset";
pub const ASSET_INSPECTIONS: &str = "asset_inspections";
pub const ASSET_STATISTICS: &str = "asset_statistics";
pub const INSPECTIONS: &str = "inspections";
pub const INSPECTION: &str = "inspection";

pub fn model_files(client: &ApiClient) -> Query<Vec<ModelFile>> {
    let client = client.clone();
    Query::new(QueryKey::new(IFC_FILES), move || {
        let client = client.clone();
        async move { client.list_model_files().await }
    })
}

pub fn model_file(client: &ApiClient, id: i64) -> Query<ModelFile> {
    let client = client.clone();
    Query::new(QueryKey::new(IFC_FILE).param("id", id), move || {
        let client = client.clone();
        async move { client.get_model_file(id).await }
    })
}

pub fn model_assets(client: &ApiClient, id: i64) -> Query<Vec<Asset>> {
    let client = client.clone();
    Query::new(QueryKey::new(IFC_FILE_ASSETS).param("id", id), move || {
        let client = client.clone();
        async move { client.model_assets(id).await }
    })
}

pub fn model_elements(client: &ApiClient, id: i64) -> Query<Vec<serde_json::Value>> {
    let client = client.clone();
    Query::new(QueryKey::new(IFC_FILE_ELEMENTS).param("id", id), move || {
        let client = client.clone();
        async move { client.model_elements(id).await }
    })
}

pub fn assets(client: &ApiClient, filter: AssetFilter) -> Query<Vec<Asset>> {
    let client = client.clone();
    Query::new(QueryKey::new(ASSETS).params(filter.query_pairs()), move || {
        let client = client.clone();
        async move { client.list_assets(&filter).await }
    })
}

pub fn asset(client: &ApiClient, id: i64) -> Query<Asset> {
    let client = client.clone();
    Query::new(QueryKey::new(ASSET).param("id", id), move || {
        let client = client.clone();
        async move { client.get_asset(id).await }
    })
}

pub fn asset_inspections(client: &ApiClient, id: i64) -> Query<Vec<Inspection>> {
    let client = client.clone();
    Query::new(QueryKey::new(ASSET_INSPECTIONS).param("id", id), move || {
        let client = client.clone();
        async move { client.asset_inspections(id).await }
    })
}

pub fn asset_statistics(client: &ApiClient, id: i64) -> Query<AssetStatistics> {
    let client = client.clone();
    Query::new(QueryKey::new(ASSET_STATISTICS).param("id", id), move || {
        let client = client.clone();
        async move { client.asset_statistics(id).await }
    })
}

pub fn inspections(client: &ApiClient, filter: InspectionFilter) -> Query<Vec<Inspection>> {
    let client = client.clone();
    Query::new(QueryKey::new(INSPECTIONS).params(filter.query_pairs()), move || {
        let client = client.clone();
        async move { client.list_inspections(&filter).await }
    })
}

pub fn inspection(client: &ApiClient, id: i64) -> Query<Inspection> {
    let client = client.clone();
    Query::new(QueryKey::new(INSPECTION).param("id", id), move || {
        let client = client.clone();
        async move { client.get_inspection(id).await }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimfm_core::ConditionStatus;

    #[test]
    fn test_filtered_lists_have_distinct_keys() {
        let client = ApiClient::new("http://localhost:8000");
        let all = assets(&client, AssetFilter::default());
        let critical = assets(
            &client,
            AssetFilter {
                condition_status: Some(ConditionStatus::Critical),
                ..Default::default()
            },
        );
        assert_eq!(all.key().canonical(), "assets");
        assert_eq!(critical.key().canonical(), "assets?condition_status=Critical");
        assert_eq!(inspection(&client, 4).key(), &QueryKey::new(INSPECTION).param("id", 4));
    }
}
