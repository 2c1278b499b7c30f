use std::collections::BTreeMap;

use frontdesk::config::{APP_ID, BoardConfig, CONFIG_VERSION};
use frontdesk::core::status::Status;
use frontdesk::sync::RemoteCollection;
use frontdesk::sync::auth::AuthClient;
use frontdesk::sync::firestore::FirestoreCollection;

#[tokio::main]
async fn main() {
    systemd_journal_logger::JournalLog::new()
        .unwrap()
        .with_syslog_identifier("frontdesk-board-check".to_string())
        .install()
        .unwrap();
    log::set_max_level(log::LevelFilter::Info);

    let cosmic_cfg = cosmic::cosmic_config::Config::new(APP_ID, CONFIG_VERSION)
        .expect("Failed to load config");
    let config = <BoardConfig as cosmic::cosmic_config::CosmicConfigEntry>::get_entry(&cosmic_cfg)
        .unwrap_or_else(|(_, cfg)| cfg);

    println!("=== Appointment Board Check ===\n");

    let Some(settings) = config.firestore_settings() else {
        println!("No Firestore project configured (backend: {}).", config.backend.label());
        return;
    };

    println!("--- {} / {} ---", settings.project_id, settings.collection);
    if let Some(ref field) = settings.order_by {
        println!("  Ordered by: {}", field);
    }

    let client = match FirestoreCollection::new(settings.clone()) {
        Ok(c) => c,
        Err(e) => { println!("  Client error: {}", e); return; }
    };

    let client = match frontdesk::sync::keyring::load_session(&settings.project_id).await {
        Ok(Some(session)) if session.needs_refresh(chrono::Utc::now().timestamp()) => {
            let renewed = match AuthClient::new(&settings.api_key) {
                Ok(auth) => auth.refresh(&session).await,
                Err(e) => Err(e),
            };
            match renewed {
                Ok(session) => {
                    println!("  Signed in as {} (token renewed)", session.email);
                    client.with_id_token(session.id_token)
                }
                Err(e) => { println!("  Saved session expired ({}), reading anonymously", e); client }
            }
        }
        Ok(Some(session)) => {
            println!("  Signed in as {}", session.email);
            client.with_id_token(session.id_token)
        }
        Ok(None) => { println!("  No saved session, reading anonymously"); client }
        Err(e) => { println!("  Keyring error: {}", e); client }
    };

    let appointments = match client.list_all().await {
        Ok(list) => list,
        Err(e) => { println!("  Error listing appointments: {}", e); return; }
    };

    println!("  Remote: {} appointments\n", appointments.len());

    for appt in &appointments {
        println!(
            "    [{}] {}: porter {}, advisor {} at {} ({})",
            appt.status, appt.client, appt.porter, appt.advisor, appt.time, appt.id
        );
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for appt in &appointments {
        *counts.entry(appt.status.as_keyword()).or_default() += 1;
    }

    println!("\n  BY STATUS:");
    for status in Status::ALL.iter().chain([&Status::Unrecognized]) {
        let keyword = status.as_keyword();
        if let Some(n) = counts.get(keyword) {
            println!("    {}: {}", status.label(), n);
        }
    }

    let unoffered = appointments
        .iter()
        .filter(|a| !config.status_set.contains(a.status))
        .count();
    if unoffered > 0 {
        println!("\n  {} appointments carry statuses this board does not offer.", unoffered);
    }

    println!("\n=== Done ===");
}
