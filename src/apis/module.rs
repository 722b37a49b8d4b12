use crate::{
    client::SuiteCrmClient,
    error::{CrmError, CrmResult},
    models::{ListDocument, Record, RecordPayload},
    query::{build_query, page_path, FilterSpec},
};
use log::{debug, info};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

/// Record operations on one CRM module
pub struct Module<'a> {
    pub(crate) client: &'a SuiteCrmClient,
    pub(crate) module_name: String,
}

impl<'a> Module<'a> {
    pub fn new(client: &'a SuiteCrmClient, module_name: impl Into<String>) -> Self {
        Self {
            client,
            module_name: module_name.into(),
        }
    }

    /// CRM name of the module
    pub fn name(&self) -> &str {
        &self.module_name
    }

    /// Create a record
    ///
    /// # Arguments
    /// * `attributes` - Fields to populate the new record with
    pub async fn create(&self, attributes: impl Serialize) -> CrmResult<Value> {
        info!("Creating {} record", self.module_name);
        let payload = RecordPayload {
            module: self.module_name.clone(),
            id: uuid::Uuid::new_v4().to_string(),
            attributes: serde_json::to_value(attributes)?,
        };
        debug!("HTTP POST /module with id={}", payload.id);

        self.client
            .request(Method::POST, &self.client.url("/module"), Some(&serde_json::to_value(&payload)?))
            .await
    }

    /// Get records matching the filters.
    ///
    /// Only a single sort field is supported, always descending.
    ///
    /// # Arguments
    /// * `fields` - Attributes to return for each record, all when `None`
    /// * `sort` - Field to sort on
    /// * `filters` - Per-field filters, applied in insertion order
    pub async fn get(
        &self,
        fields: Option<&[&str]>,
        sort: Option<&str>,
        filters: &FilterSpec,
    ) -> CrmResult<Vec<Record>> {
        info!("Getting {} records ({} filters)", self.module_name, filters.len());
        let path = build_query(&self.module_name, fields, sort, filters)?;
        debug!("HTTP GET {}", path);

        let body = self.client.request(Method::GET, &self.client.url(&path), None).await?;
        records(body)
    }

    /// Get every record of the module, one page at a time
    ///
    /// # Arguments
    /// * `page_size` - Records requested per page
    pub async fn get_all(&self, page_size: u64) -> CrmResult<Vec<Record>> {
        if page_size == 0 {
            return Err(CrmError::invalid_param("page_size must be greater than zero"));
        }
        info!("Getting all {} records", self.module_name);

        let probe = self.first_page().await?;
        let Some(total) = probe.total_pages() else {
            debug!("No pagination metadata for {}", self.module_name);
            return Ok(Vec::new());
        };

        // With a page size of one, total-pages is the record count
        let pages = total.div_ceil(page_size);
        debug!("{} records over {} pages of {}", total, pages, page_size);

        let mut result = Vec::new();
        for number in 1..=pages {
            let path = page_path(&self.module_name, number, page_size);
            let body = self.client.request(Method::GET, &self.client.url(&path), None).await?;
            result.extend(records(body)?);
        }
        Ok(result)
    }

    /// Update a record
    ///
    /// # Arguments
    /// * `record_id` - Id of the record
    /// * `attributes` - Fields to change
    pub async fn update(&self, record_id: &str, attributes: impl Serialize) -> CrmResult<Value> {
        info!("Updating {} record {}", self.module_name, record_id);
        let payload = RecordPayload {
            module: self.module_name.clone(),
            id: record_id.to_string(),
            attributes: serde_json::to_value(attributes)?,
        };

        self.client
            .request(Method::PATCH, &self.client.url("/module"), Some(&serde_json::to_value(&payload)?))
            .await
    }

    /// Delete a record
    ///
    /// # Arguments
    /// * `record_id` - Id of the record
    pub async fn delete(&self, record_id: &str) -> CrmResult<Value> {
        info!("Deleting {} record {}", self.module_name, record_id);
        let path = format!("/module/{}/{}", self.module_name, record_id);
        debug!("HTTP DELETE {}", path);

        self.client.request(Method::DELETE, &self.client.url(&path), None).await
    }

    /// Names of the attributes a record of this module carries, sampled
    /// from the first record. Empty when the module has no records.
    pub async fn fields(&self) -> CrmResult<Vec<String>> {
        info!("Getting fields of {}", self.module_name);
        let page = self.first_page().await?;
        Ok(page
            .data
            .into_iter()
            .next()
            .map(|record| record.attributes.into_iter().map(|(name, _)| name).collect())
            .unwrap_or_default())
    }

    async fn first_page(&self) -> CrmResult<ListDocument> {
        let path = page_path(&self.module_name, 1, 1);
        let body = self.client.request(Method::GET, &self.client.url(&path), None).await?;
        list_document(body)
    }
}

fn list_document(body: Value) -> CrmResult<ListDocument> {
    if body.get("data").is_none() {
        return Err(CrmError::invalid_response(format!("missing data member: {}", body)));
    }
    Ok(serde_json::from_value(body)?)
}

fn records(body: Value) -> CrmResult<Vec<Record>> {
    list_document(body).map(|doc| doc.data)
}
