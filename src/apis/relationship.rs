use super::Module;
use crate::{
    error::{CrmError, CrmResult},
    models::RelationshipRef,
};
use log::info;
use reqwest::Method;
use serde_json::Value;

/// Uppercase the first character and lowercase the rest, `contacts` -> `Contacts`
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

impl<'a> Module<'a> {
    fn relationships_path(&self, record_id: &str) -> String {
        format!("/module/{}/{}/relationships", self.module_name, record_id)
    }

    /// Records of another module related to a record
    ///
    /// # Arguments
    /// * `record_id` - Id of the record in this module
    /// * `related_module` - Module to list relationships for, e.g. `Contacts`
    pub async fn get_relationship(&self, record_id: &str, related_module: &str) -> CrmResult<Value> {
        info!(
            "Getting {} related to {} record {}",
            related_module, self.module_name, record_id
        );
        let path = format!(
            "{}/{}",
            self.relationships_path(record_id),
            related_module.to_lowercase()
        );

        let mut body = self.client.request(Method::GET, &self.client.url(&path), None).await?;
        body.get_mut("data")
            .map(Value::take)
            .ok_or_else(|| CrmError::invalid_response(format!("missing data member: {}", body)))
    }

    /// Relate a record to a record of another module
    ///
    /// # Arguments
    /// * `record_id` - Id of the record in this module
    /// * `related_module` - Module of the related record, e.g. `Contacts`
    /// * `related_id` - Id of the related record
    pub async fn create_relationship(
        &self,
        record_id: &str,
        related_module: &str,
        related_id: &str,
    ) -> CrmResult<Value> {
        info!(
            "Relating {} record {} to {} {}",
            self.module_name, record_id, related_module, related_id
        );
        let payload = RelationshipRef {
            module: capitalize(related_module),
            id: related_id.to_string(),
        };

        self.client
            .request(
                Method::POST,
                &self.client.url(&self.relationships_path(record_id)),
                Some(&serde_json::to_value(&payload)?),
            )
            .await
    }

    /// Remove the relationship between two records
    ///
    /// # Arguments
    /// * `record_id` - Id of the record in this module
    /// * `related_module` - Module of the related record
    /// * `related_id` - Id of the related record
    pub async fn delete_relationship(
        &self,
        record_id: &str,
        related_module: &str,
        related_id: &str,
    ) -> CrmResult<Value> {
        info!(
            "Removing relationship between {} record {} and {} {}",
            self.module_name, record_id, related_module, related_id
        );
        let path = format!(
            "{}/{}/{}",
            self.relationships_path(record_id),
            related_module.to_lowercase(),
            related_id
        );

        self.client.request(Method::DELETE, &self.client.url(&path), None).await
    }
}
