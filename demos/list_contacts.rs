//! Lists active contacts created after a date, newest first.
//!
//! Reads `SUITECRM_URL`, `SUITECRM_CLIENT_ID` and `SUITECRM_CLIENT_SECRET`
//! from the environment or a `.env` file.

use suitecrm_client::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = CrmConfig::from_env()?.with_logout_on_exit(true);
    let client = SuiteCrmClient::new(config)?;

    let filters = FilterSpec::new()
        .equals("status", "Active")
        .op("date_entered", ">", "2020-05-08T09:59:00+00:00");

    let contacts = match client
        .module("Contacts")?
        .get(Some(&["first_name", "last_name"][..]), Some("date_entered"), &filters)
        .await
    {
        Ok(contacts) => contacts,
        Err(e) if e.is_backend_query_unsupported() => {
            log::warn!("Filter not supported by this CRM, listing everything instead");
            client.module("Contacts")?.get_all(100).await?
        }
        Err(e) => return Err(e.into()),
    };

    for contact in &contacts {
        println!(
            "{} {} {}",
            contact.id,
            contact.attribute_str("first_name").unwrap_or_default(),
            contact.attribute_str("last_name").unwrap_or_default()
        );
    }
    println!("{} contacts", contacts.len());

    client.close().await?;
    Ok(())
}
