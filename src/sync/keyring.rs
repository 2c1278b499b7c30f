use std::collections::HashMap;

use super::auth::Session;

pub(crate) const SERVICE_NAME: &str = "frontdesk-session";

fn attributes(project_id: &str) -> HashMap<&str, &str> {
    let mut attrs = HashMap::new();
    attrs.insert("service", SERVICE_NAME);
    attrs.insert("project", project_id);
    attrs
}

/// Store the signed-in session in the system keyring via Secret Service.
pub async fn store_session(project_id: &str, session: &Session) -> Result<(), String> {
    let keyring = oo7::Keyring::new()
        .await
        .map_err(|e| format!("Failed to connect to keyring: {}", e))?;

    let secret = serde_json::to_string(session)
        .map_err(|e| format!("Failed to encode session: {}", e))?;

    keyring
        .create_item(
            &format!("Front Desk ({})", project_id),
            &attributes(project_id),
            secret.as_bytes(),
            true, // replace existing
        )
        .await
        .map_err(|e| format!("Failed to store session: {}", e))?;

    Ok(())
}

/// Load the session saved for a project, if any.
pub async fn load_session(project_id: &str) -> Result<Option<Session>, String> {
    let keyring = oo7::Keyring::new()
        .await
        .map_err(|e| format!("Failed to connect to keyring: {}", e))?;

    let items = keyring
        .search_items(&attributes(project_id))
        .await
        .map_err(|e| format!("Failed to search keyring: {}", e))?;

    if let Some(item) = items.first() {
        let secret_bytes = item
            .secret()
            .await
            .map_err(|e| format!("Failed to read secret: {}", e))?;
        let session: Session = serde_json::from_slice(&secret_bytes.to_vec())
            .map_err(|e| format!("Stored session is unreadable: {}", e))?;
        return Ok(Some(session));
    }

    Ok(None)
}

/// Forget the session for a project (sign out).
pub async fn delete_session(project_id: &str) -> Result<(), String> {
    let keyring = oo7::Keyring::new()
        .await
        .map_err(|e| format!("Failed to connect to keyring: {}", e))?;

    let items = keyring
        .search_items(&attributes(project_id))
        .await
        .map_err(|e| format!("Failed to search keyring: {}", e))?;

    for item in items {
        item.delete()
            .await
            .map_err(|e| format!("Failed to delete session: {}", e))?;
    }

    Ok(())
}
