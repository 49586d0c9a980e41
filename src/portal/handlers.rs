//! HTTP routes for the config portal.

use std::sync::{Arc, Mutex};

use esp_idf_svc::{
    http::{
        server::{EspHttpConnection, EspHttpServer, Request},
        Headers, Method,
    },
    io::{Read, Write},
    nvs::EspDefaultNvs,
};
use tokio::sync::mpsc::Sender;

use super::{forms, html, PortalEvent};
use crate::profile::{ProfileStore, WifiProfile};

/// Form bodies larger than this are rejected outright.
const MAX_BODY_LEN: usize = 1024;

type SharedStore = Arc<Mutex<(ProfileStore, EspDefaultNvs)>>;

pub fn register_routes(
    server: &mut EspHttpServer<'_>,
    store: SharedStore,
    events: Sender<PortalEvent>,
) -> anyhow::Result<()> {
    // Config page
    server.fn_handler("/", Method::Get, |req| handle_index(req))?;

    // Profile list API (feeds the page's JS)
    let store_list = store.clone();
    server.fn_handler("/api/profiles", Method::Get, move |req| {
        handle_profiles(req, &store_list)
    })?;

    // Form actions: add / delete / switch / priority
    let store_post = store.clone();
    server.fn_handler("/", Method::Post, move |req| {
        handle_action(req, &store_post, &events)
    })?;

    // Captive portal detection endpoints
    server.fn_handler::<anyhow::Error, _>("/generate_204", Method::Get, |req| {
        // Android
        req.into_response(204, None, &[])?;
        Ok(())
    })?;

    server.fn_handler::<anyhow::Error, _>("/hotspot-detect.html", Method::Get, |req| {
        // iOS/macOS
        let mut resp = req.into_ok_response()?;
        resp.write_all(b"<HTML><HEAD><TITLE>Success</TITLE></HEAD><BODY>Success</BODY></HTML>")?;
        Ok(())
    })?;

    server.fn_handler::<anyhow::Error, _>("/connecttest.txt", Method::Get, |req| {
        // Windows
        let mut resp = req.into_ok_response()?;
        resp.write_all(b"Microsoft Connect Test")?;
        Ok(())
    })?;

    Ok(())
}

fn handle_index(req: Request<&mut EspHttpConnection<'_>>) -> anyhow::Result<()> {
    let mut resp = req.into_ok_response()?;
    resp.write_all(html::INDEX_HTML.as_bytes())?;
    Ok(())
}

fn handle_profiles(
    req: Request<&mut EspHttpConnection<'_>>,
    store: &SharedStore,
) -> anyhow::Result<()> {
    let guard = store.lock().unwrap();

    let profiles: Vec<serde_json::Value> = guard
        .0
        .profiles()
        .iter()
        .map(|p| {
            // Passwords never leave the device in the clear
            let pass_masked = if p.password.is_empty() {
                String::new()
            } else {
                "*".repeat(p.password.len().min(8))
            };
            serde_json::json!({
                "ssid": p.ssid,
                "password": pass_masked,
                "priority": p.priority,
                "ip": dotted(p.ip),
                "gateway": dotted(p.gateway),
                "subnet": dotted(p.subnet),
                "port": p.port,
                "dhcp": p.uses_dhcp(),
            })
        })
        .collect();

    let json = serde_json::json!({
        "active": guard.0.active(),
        "profiles": profiles,
    });
    drop(guard);

    let mut resp = req.into_ok_response()?;
    resp.write_all(json.to_string().as_bytes())?;
    Ok(())
}

fn handle_action(
    mut req: Request<&mut EspHttpConnection<'_>>,
    store: &SharedStore,
    events: &Sender<PortalEvent>,
) -> anyhow::Result<()> {
    let len = req.content_len().unwrap_or(0) as usize;
    if len == 0 || len > MAX_BODY_LEN {
        req.into_status_response(413)?
            .write_all(b"Error: Invalid request")?;
        return Ok(());
    }

    let mut buf = vec![0; len];
    req.read_exact(&mut buf)?;
    let body = std::str::from_utf8(&buf)?;

    log::info!("Form action: {} bytes", body.len());

    let result = match forms::field(body, "action") {
        Some("add") => apply_add(body, store).map(|msg| (msg, None)),
        Some("delete") => apply_delete(body, store).map(|msg| (msg, None)),
        Some("switch") => apply_switch(body, store),
        Some("priority") => apply_priority(body, store).map(|msg| (msg, None)),
        _ => Err(anyhow::anyhow!("Unknown action")),
    };

    // The original UI expects a plain-text body either way.
    let (message, event) = match result {
        Ok((msg, event)) => (msg, event),
        Err(e) => (format!("Error: {}", e), None),
    };
    let mut resp = req.into_ok_response()?;
    resp.write_all(message.as_bytes())?;
    resp.flush()?;
    drop(resp);

    // Only notify main once the response is on the wire; the event
    // tears the whole server down.
    if let Some(event) = event {
        if let Err(e) = events.blocking_send(event) {
            log::error!("Failed to notify main task: {:?}", e);
        }
    }
    Ok(())
}

fn apply_add(body: &str, store: &SharedStore) -> anyhow::Result<String> {
    let ssid = forms::required_field(body, "ssid")?;
    if ssid.is_empty() {
        anyhow::bail!("SSID must not be empty");
    }
    let profile = WifiProfile {
        ssid,
        password: forms::decoded_field(body, "password").unwrap_or_default(),
        priority: forms::numeric_field(body, "priority")?,
        ip: forms::ipv4_field(body, "ip")?,
        gateway: forms::ipv4_field(body, "gateway")?,
        subnet: forms::ipv4_field(body, "subnet")?,
        port: forms::numeric_field(body, "port")?,
    };

    let mut guard = store.lock().unwrap();
    let (profiles, nvs) = &mut *guard;
    profiles.add(profile)?;
    profiles.persist(nvs)?;
    Ok("Profile added successfully!".to_string())
}

fn apply_delete(body: &str, store: &SharedStore) -> anyhow::Result<String> {
    let index = forms::numeric_field(body, "index")?;

    let mut guard = store.lock().unwrap();
    let (profiles, nvs) = &mut *guard;
    profiles.delete(index)?;
    profiles.persist(nvs)?;
    Ok("Profile deleted!".to_string())
}

fn apply_switch(body: &str, store: &SharedStore) -> anyhow::Result<(String, Option<PortalEvent>)> {
    let index = forms::numeric_field(body, "index")?;

    let mut guard = store.lock().unwrap();
    let (profiles, nvs) = &mut *guard;
    profiles.set_active(index)?;
    profiles.persist(nvs)?;

    Ok((
        "Switched to profile!".to_string(),
        Some(PortalEvent::Activated(index)),
    ))
}

fn apply_priority(body: &str, store: &SharedStore) -> anyhow::Result<String> {
    let index = forms::numeric_field(body, "index")?;
    let priority = forms::numeric_field(body, "priority")?;

    let mut guard = store.lock().unwrap();
    let (profiles, nvs) = &mut *guard;
    profiles.set_priority(index, priority)?;
    profiles.persist(nvs)?;
    Ok("Priority updated!".to_string())
}

fn dotted(octets: [u8; 4]) -> String {
    format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
}
